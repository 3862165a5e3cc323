use serde::{Deserialize, Serialize};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    Checker = 4,
    DisbursementOfficer = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::Checker),
            5 => Some(Role::DisbursementOfficer),
            _ => None,
        }
    }

    /// May skip the approval queue and pay out directly.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::DisbursementOfficer)
    }

    pub fn can_create_payments(&self) -> bool {
        !matches!(self, Role::Employee)
    }

    pub fn can_review_payments(&self) -> bool {
        self.is_privileged() || *self == Role::Checker
    }
}

/// The authenticated principal acting on the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}
