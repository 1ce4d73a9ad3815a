use serde::{Deserialize, Serialize};

/// JWT claims structure for Supabase tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,

    #[serde(default)]
    pub nbf: Option<i64>,

    #[serde(default)]
    pub email: Option<String>,

    /// User metadata from Supabase; carries the marketplace role
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserMetadata {
    /// `customer`, `contractor` or `supervisor`
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub full_name: Option<String>,
}

impl Claims {
    pub fn marketplace_role(&self) -> Option<&str> {
        self.user_metadata.as_ref()?.role.as_deref()
    }
}
