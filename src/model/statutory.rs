//! Statutory deduction settings and the four calculators that run on them.
//!
//! A settings row is immutable once stored; the newest row is the active one.
//! Blobs written before the flat-rate NHIF/SHIF regime carry a tiered table
//! under `nhifRates`; they are resolved into [`NhifPolicy`] at load time so the
//! calculators never inspect raw field presence.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Upper bound used for the open-ended top PAYE bracket.
pub const PAYE_SENTINEL: f64 = 999_999_999.0;

/// Fallback amount for a legacy NHIF table that stores no default.
const LEGACY_NHIF_DEFAULT: f64 = 1700.0;

/// Round half-up to two decimal places. Non-finite input degrades to zero.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    ((value * 100.0) + 0.5 + 1e-9).floor() / 100.0
}

/// Treats NaN and infinities as an absent amount.
pub(crate) fn amount(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayeBracket {
    /// Income up to and including this amount is taxed at `rate`.
    #[serde(alias = "thresholdUpperBound", alias = "threshold_upper_bound")]
    pub threshold: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NhifTier {
    pub threshold: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NhifPolicy {
    FlatRate {
        rate: f64,
    },
    TieredTable {
        entries: Vec<NhifTier>,
        #[serde(rename = "defaultAmount", alias = "default_amount")]
        default_amount: f64,
    },
}

/// Active statutory configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawStatutorySettings")]
pub struct StatutoryConfig {
    pub paye_brackets: Vec<PayeBracket>,
    pub personal_relief: f64,
    pub nssf_lower_limit: f64,
    pub nssf_upper_limit: f64,
    pub nssf_rate: f64,
    pub nssf_maximum: f64,
    pub nhif: NhifPolicy,
    pub housing_levy_rate: f64,
    pub effective_date: NaiveDate,
}

impl Default for StatutoryConfig {
    fn default() -> Self {
        Self {
            paye_brackets: default_brackets(),
            personal_relief: 2400.0,
            nssf_lower_limit: 8000.0,
            nssf_upper_limit: 72000.0,
            nssf_rate: 0.06,
            nssf_maximum: 4320.0,
            nhif: NhifPolicy::FlatRate { rate: 0.0275 },
            housing_levy_rate: 0.015,
            effective_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap_or_default(),
        }
    }
}

fn default_brackets() -> Vec<PayeBracket> {
    [
        (24000.0, 0.10),
        (32333.0, 0.25),
        (500000.0, 0.30),
        (800000.0, 0.325),
        (PAYE_SENTINEL, 0.35),
    ]
    .into_iter()
    .map(|(threshold, rate)| PayeBracket { threshold, rate })
    .collect()
}

/// Old NHIF band table, kept for settings saved before the flat-rate levy.
pub fn legacy_nhif_table() -> Vec<NhifTier> {
    [
        (5999.0, 150.0),
        (7999.0, 300.0),
        (11999.0, 400.0),
        (14999.0, 500.0),
        (19999.0, 600.0),
        (24999.0, 750.0),
        (29999.0, 850.0),
        (34999.0, 900.0),
        (39999.0, 950.0),
        (44999.0, 1000.0),
        (49999.0, 1100.0),
        (59999.0, 1200.0),
        (69999.0, 1300.0),
        (79999.0, 1400.0),
        (89999.0, 1500.0),
        (99999.0, 1600.0),
    ]
    .into_iter()
    .map(|(threshold, amount)| NhifTier { threshold, amount })
    .collect()
}

/// Settings blob exactly as it may sit in the store, old or new shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatutorySettings {
    paye_brackets: Option<Vec<PayeBracket>>,
    personal_relief: Option<f64>,
    nssf_lower_limit: Option<f64>,
    nssf_upper_limit: Option<f64>,
    nssf_rate: Option<f64>,
    nssf_maximum: Option<f64>,
    nhif: Option<NhifPolicy>,
    nhif_rate: Option<f64>,
    nhif_rates: Option<Vec<NhifTier>>,
    nhif_default: Option<f64>,
    housing_levy_rate: Option<f64>,
    effective_date: Option<NaiveDate>,
}

impl From<RawStatutorySettings> for StatutoryConfig {
    fn from(raw: RawStatutorySettings) -> Self {
        let defaults = StatutoryConfig::default();

        let nhif = match (raw.nhif, raw.nhif_rate, raw.nhif_rates) {
            (Some(policy), _, _) => policy,
            (None, Some(rate), _) => NhifPolicy::FlatRate { rate },
            (None, None, Some(entries)) if !entries.is_empty() => NhifPolicy::TieredTable {
                entries,
                default_amount: raw.nhif_default.unwrap_or(LEGACY_NHIF_DEFAULT),
            },
            _ => defaults.nhif,
        };

        Self {
            paye_brackets: raw.paye_brackets.unwrap_or(defaults.paye_brackets),
            personal_relief: raw.personal_relief.unwrap_or(defaults.personal_relief),
            nssf_lower_limit: raw.nssf_lower_limit.unwrap_or(defaults.nssf_lower_limit),
            nssf_upper_limit: raw.nssf_upper_limit.unwrap_or(defaults.nssf_upper_limit),
            nssf_rate: raw.nssf_rate.unwrap_or(defaults.nssf_rate),
            nssf_maximum: raw.nssf_maximum.unwrap_or(defaults.nssf_maximum),
            nhif,
            housing_levy_rate: raw.housing_levy_rate.unwrap_or(defaults.housing_levy_rate),
            effective_date: raw.effective_date.unwrap_or(defaults.effective_date),
        }
    }
}

impl StatutoryConfig {
    /// Checks the invariants a new settings version must satisfy before it is stored.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.paye_brackets.len() < 2 {
            return Err(AppError::validation("PAYE needs at least two brackets"));
        }

        let mut previous = 0.0;
        for (i, bracket) in self.paye_brackets.iter().enumerate() {
            if !bracket.threshold.is_finite() || bracket.threshold <= previous {
                return Err(AppError::validation(format!(
                    "PAYE bracket {} threshold must be greater than {}",
                    i + 1,
                    previous
                )));
            }
            if !rate_in_range(bracket.rate) {
                return Err(AppError::validation(format!(
                    "PAYE bracket {} rate must be within [0, 1)",
                    i + 1
                )));
            }
            previous = bracket.threshold;
        }

        for (name, value) in [
            ("personalRelief", self.personal_relief),
            ("nssfLowerLimit", self.nssf_lower_limit),
            ("nssfUpperLimit", self.nssf_upper_limit),
            ("nssfMaximum", self.nssf_maximum),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(format!(
                    "{name} must be a non-negative amount"
                )));
            }
        }

        if self.nssf_lower_limit > self.nssf_upper_limit {
            return Err(AppError::validation(
                "nssfLowerLimit cannot exceed nssfUpperLimit",
            ));
        }

        for (name, rate) in [
            ("nssfRate", self.nssf_rate),
            ("housingLevyRate", self.housing_levy_rate),
        ] {
            if !rate_in_range(rate) {
                return Err(AppError::validation(format!("{name} must be within [0, 1)")));
            }
        }

        match &self.nhif {
            NhifPolicy::FlatRate { rate } => {
                if !rate_in_range(*rate) {
                    return Err(AppError::validation("nhif rate must be within [0, 1)"));
                }
            }
            NhifPolicy::TieredTable {
                entries,
                default_amount,
            } => {
                if entries.is_empty() {
                    return Err(AppError::validation("NHIF table cannot be empty"));
                }
                let ascending = entries.windows(2).all(|w| w[0].threshold < w[1].threshold);
                if !ascending {
                    return Err(AppError::validation(
                        "NHIF table thresholds must be strictly increasing",
                    ));
                }
                if entries.iter().any(|e| e.amount < 0.0) || *default_amount < 0.0 {
                    return Err(AppError::validation("NHIF amounts cannot be negative"));
                }
            }
        }

        Ok(())
    }

    /// Monthly PAYE on income that is already net of NSSF, NHIF and housing levy.
    pub fn calculate_paye(&self, taxable_income: f64) -> f64 {
        let income = amount(taxable_income);
        if income <= 0.0 {
            return 0.0;
        }

        let mut remaining = income;
        let mut lower = 0.0;
        let mut tax = 0.0;
        let last = self.paye_brackets.len().saturating_sub(1);

        for (i, bracket) in self.paye_brackets.iter().enumerate() {
            if remaining <= 0.0 {
                break;
            }
            // the top bracket is open-ended whatever its stored sentinel
            let band = if i == last {
                remaining
            } else {
                (bracket.threshold - lower).max(0.0)
            };
            let taxed = remaining.min(band);
            tax += taxed * bracket.rate;
            remaining -= taxed;
            lower = bracket.threshold;
        }

        round2((tax - self.personal_relief).max(0.0))
    }

    /// Tier I and tier II pension contribution, capped at `nssf_maximum`.
    pub fn calculate_nssf(&self, pensionable_pay: f64) -> f64 {
        let pay = amount(pensionable_pay).max(0.0);

        let tier1 = pay.min(self.nssf_lower_limit) * self.nssf_rate;
        let tier2_band = (self.nssf_upper_limit - self.nssf_lower_limit).max(0.0);
        let tier2 = (pay - self.nssf_lower_limit).max(0.0).min(tier2_band) * self.nssf_rate;

        round2((tier1 + tier2).min(self.nssf_maximum))
    }

    pub fn calculate_nhif(&self, gross_pay: f64) -> f64 {
        let pay = amount(gross_pay);
        if pay <= 0.0 {
            return 0.0;
        }

        match &self.nhif {
            NhifPolicy::FlatRate { rate } => round2(pay * rate),
            NhifPolicy::TieredTable {
                entries,
                default_amount,
            } => entries
                .iter()
                .find(|tier| tier.threshold >= pay)
                .map(|tier| tier.amount)
                .unwrap_or(*default_amount),
        }
    }

    /// Affordable Housing Levy. Zero without a valid tax identifier.
    pub fn calculate_housing_levy(&self, gross_pay: f64, has_valid_identifier: bool) -> f64 {
        let pay = amount(gross_pay);
        if !has_valid_identifier || pay <= 0.0 {
            return 0.0;
        }
        round2(pay * self.housing_levy_rate)
    }
}

fn rate_in_range(rate: f64) -> bool {
    rate.is_finite() && (0.0..1.0).contains(&rate)
}

/// One stored version of the statutory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatutorySettingsRecord {
    pub id: u64,
    pub settings: StatutoryConfig,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn no_relief() -> StatutoryConfig {
        StatutoryConfig {
            personal_relief: 0.0,
            ..StatutoryConfig::default()
        }
    }

    #[test]
    fn paye_is_zero_for_non_positive_income() {
        let cfg = StatutoryConfig::default();
        for income in [0.0, -1.0, -50_000.0, f64::NAN, f64::NEG_INFINITY] {
            assert_eq!(cfg.calculate_paye(income), 0.0);
        }
    }

    #[test]
    fn paye_first_band_is_absorbed_by_relief() {
        let cfg = StatutoryConfig::default();
        assert_eq!(cfg.calculate_paye(24000.0), 0.0);
        assert_eq!(cfg.calculate_paye(18039.75), 0.0);
    }

    #[test]
    fn paye_threshold_belongs_to_lower_band() {
        let cfg = no_relief();
        assert_relative_eq!(cfg.calculate_paye(24000.0), 2400.0);
        // 100 over the first threshold is taxed at 25%
        assert_relative_eq!(cfg.calculate_paye(24100.0), 2425.0);
    }

    #[test]
    fn paye_walks_every_band() {
        let cfg = StatutoryConfig::default();
        // 24000*0.10 + 8333*0.25 + 67667*0.30 - 2400
        let expected = 2400.0 + 2083.25 + 20300.1 - 2400.0;
        assert_relative_eq!(cfg.calculate_paye(100_000.0), expected, epsilon = 1e-6);
    }

    #[test]
    fn paye_taxes_income_past_the_sentinel_at_top_rate() {
        let cfg = StatutoryConfig {
            paye_brackets: vec![
                PayeBracket { threshold: 1000.0, rate: 0.1 },
                PayeBracket { threshold: 2000.0, rate: 0.2 },
            ],
            personal_relief: 0.0,
            ..StatutoryConfig::default()
        };
        assert_relative_eq!(cfg.calculate_paye(3000.0), 100.0 + 400.0);
    }

    #[test]
    fn paye_never_decreases_as_income_rises() {
        let cfg = StatutoryConfig::default();
        let mut previous = 0.0;
        let mut income = 0.0;
        while income < 1_200_000.0 {
            let tax = cfg.calculate_paye(income);
            assert!(
                tax >= previous,
                "tax dropped from {previous} to {tax} at income {income}"
            );
            previous = tax;
            income += 137.37;
        }
    }

    #[test]
    fn nssf_splits_into_two_tiers() {
        let cfg = StatutoryConfig::default();
        assert_relative_eq!(cfg.calculate_nssf(5000.0), 300.0);
        assert_relative_eq!(cfg.calculate_nssf(20100.0), 480.0 + 726.0);
    }

    #[test]
    fn nssf_is_capped_above_the_upper_limit() {
        let cfg = StatutoryConfig::default();
        let cap = (cfg.nssf_lower_limit * cfg.nssf_rate
            + (cfg.nssf_upper_limit - cfg.nssf_lower_limit) * cfg.nssf_rate)
            .min(cfg.nssf_maximum);
        for pay in [72000.0, 90000.0, 1_000_000.0] {
            assert_relative_eq!(cfg.calculate_nssf(pay), cap);
            assert!(cfg.calculate_nssf(pay) <= cfg.nssf_maximum);
        }

        let tight = StatutoryConfig {
            nssf_maximum: 1000.0,
            ..StatutoryConfig::default()
        };
        assert_relative_eq!(tight.calculate_nssf(500_000.0), 1000.0);
    }

    #[test]
    fn nhif_flat_rate_rounds_to_cents() {
        let cfg = StatutoryConfig::default();
        assert_relative_eq!(cfg.calculate_nhif(20100.0), 552.75);
        assert_eq!(cfg.calculate_nhif(0.0), 0.0);
    }

    #[test]
    fn nhif_tiered_table_picks_first_band_covering_pay() {
        let cfg = StatutoryConfig {
            nhif: NhifPolicy::TieredTable {
                entries: legacy_nhif_table(),
                default_amount: 1700.0,
            },
            ..StatutoryConfig::default()
        };
        assert_eq!(cfg.calculate_nhif(5999.0), 150.0);
        assert_eq!(cfg.calculate_nhif(6000.0), 300.0);
        assert_eq!(cfg.calculate_nhif(45000.0), 1100.0);
        assert_eq!(cfg.calculate_nhif(250_000.0), 1700.0);
    }

    #[test]
    fn housing_levy_requires_identifier() {
        let cfg = StatutoryConfig::default();
        for pay in [0.0, 20100.0, 1_000_000.0] {
            assert_eq!(cfg.calculate_housing_levy(pay, false), 0.0);
        }
        assert_relative_eq!(cfg.calculate_housing_levy(20100.0, true), 301.5);
        assert_eq!(cfg.calculate_housing_levy(-5.0, true), 0.0);
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(2.675), 2.68);
        assert_eq!(round2(10.0), 10.0);
        assert_eq!(round2(f64::NAN), 0.0);
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(StatutoryConfig::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_brackets() {
        let single = StatutoryConfig {
            paye_brackets: vec![PayeBracket { threshold: 1000.0, rate: 0.1 }],
            ..StatutoryConfig::default()
        };
        assert!(matches!(single.validate(), Err(AppError::Validation(_))));

        let unordered = StatutoryConfig {
            paye_brackets: vec![
                PayeBracket { threshold: 5000.0, rate: 0.1 },
                PayeBracket { threshold: 5000.0, rate: 0.2 },
            ],
            ..StatutoryConfig::default()
        };
        assert!(unordered.validate().is_err());

        let full_rate = StatutoryConfig {
            paye_brackets: vec![
                PayeBracket { threshold: 5000.0, rate: 0.1 },
                PayeBracket { threshold: 9000.0, rate: 1.0 },
            ],
            ..StatutoryConfig::default()
        };
        assert!(full_rate.validate().is_err());
    }

    #[test]
    fn validation_rejects_inverted_nssf_limits() {
        let cfg = StatutoryConfig {
            nssf_lower_limit: 80000.0,
            ..StatutoryConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn legacy_blob_resolves_to_tiered_policy() {
        let blob = serde_json::json!({
            "payeBrackets": [
                {"threshold": 24000, "rate": 0.1},
                {"threshold": 999999999, "rate": 0.3}
            ],
            "personalRelief": 2400,
            "nhifRates": [
                {"threshold": 5999, "amount": 150},
                {"threshold": 7999, "amount": 300}
            ]
        });
        let cfg: StatutoryConfig = serde_json::from_value(blob).unwrap();
        assert_eq!(
            cfg.nhif,
            NhifPolicy::TieredTable {
                entries: vec![
                    NhifTier { threshold: 5999.0, amount: 150.0 },
                    NhifTier { threshold: 7999.0, amount: 300.0 },
                ],
                default_amount: LEGACY_NHIF_DEFAULT,
            }
        );
        assert_eq!(cfg.paye_brackets.len(), 2);
        assert_eq!(cfg.nssf_rate, 0.06);
    }

    #[test]
    fn flat_rate_blob_and_canonical_form_agree() {
        let blob = serde_json::json!({ "nhifRate": 0.0275, "housingLevyRate": 0.015 });
        let cfg: StatutoryConfig = serde_json::from_value(blob).unwrap();
        assert_eq!(cfg, StatutoryConfig::default());

        let canonical = serde_json::to_value(&cfg).unwrap();
        assert_eq!(canonical["nhif"]["mode"], "flat_rate");
        let reparsed: StatutoryConfig = serde_json::from_value(canonical).unwrap();
        assert_eq!(reparsed, cfg);
    }
}
