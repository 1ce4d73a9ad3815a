use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParseEnumError;

/// Marketplace role of an authenticated caller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Contractor,
    Supervisor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Contractor => "contractor",
            Role::Supervisor => "supervisor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "contractor" => Ok(Self::Contractor),
            "supervisor" => Ok(Self::Supervisor),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

/// Identity the engine authorizes against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn customer(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn contractor(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Contractor)
    }

    pub fn supervisor(user_id: Uuid) -> Self {
        Self::new(user_id, Role::Supervisor)
    }
}
