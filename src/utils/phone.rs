use crate::error::AppError;

/// Normalizes a Kenyan mobile number to the 12-digit `2547XXXXXXXX` /
/// `2541XXXXXXXX` form the B2C gateway expects.
pub fn normalize_phone(raw: Option<&str>) -> Result<String, AppError> {
    let digits: String = raw
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    if digits.is_empty() {
        return Err(AppError::validation("Phone number is required for payment"));
    }

    let normalized = if let Some(rest) = digits.strip_prefix('0') {
        format!("254{rest}")
    } else if digits.starts_with('7') || digits.starts_with('1') {
        format!("254{digits}")
    } else {
        digits
    };

    let valid = normalized.len() == 12
        && (normalized.starts_with("2547") || normalized.starts_with("2541"));
    if !valid {
        return Err(AppError::validation(format!(
            "Invalid phone number {:?}",
            raw.unwrap_or_default()
        )));
    }

    Ok(normalized)
}
