use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog requirement type a tender line is priced against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequirementType {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
    pub default_unit: String,
}
