use uuid::Uuid;

use super::Claims;
use crate::domain::{Caller, Role};
use crate::error::ApiError;

/// Authenticated user context extracted from JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    pub email: Option<String>,

    /// Marketplace role, if the token carries a known one
    pub role: Option<Role>,

    claims: Claims,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        let role = match claims.marketplace_role() {
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Ignoring unknown role claim");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            user_id,
            email: claims.email.clone(),
            role,
            claims: claims.clone(),
        })
    }

    /// The identity engine operations authorize against. Tokens without a
    /// marketplace role may read their own profile but nothing else.
    pub fn caller(&self) -> Result<Caller, ApiError> {
        self.role
            .map(|role| Caller::new(self.user_id, role))
            .ok_or_else(|| ApiError::Forbidden("No marketplace role on this account".to_string()))
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::UserMetadata;

    fn claims(role: Option<&str>) -> Claims {
        Claims {
            sub: "6f1c2f0e-8f2b-4c55-9d7e-0d6f4e6b1a11".to_string(),
            aud: "authenticated".to_string(),
            iss: "https://example.supabase.co/auth/v1".to_string(),
            iat: 0,
            exp: 0,
            nbf: None,
            email: Some("sam@example.com".to_string()),
            user_metadata: Some(UserMetadata {
                role: role.map(str::to_string),
                full_name: None,
            }),
        }
    }

    #[test]
    fn test_role_is_read_from_user_metadata() {
        let ctx = AuthContext::from_claims(&claims(Some("Contractor"))).unwrap();
        assert_eq!(ctx.role, Some(Role::Contractor));
        assert_eq!(ctx.caller().unwrap().role, Role::Contractor);
    }

    #[test]
    fn test_missing_or_unknown_role_is_forbidden() {
        let ctx = AuthContext::from_claims(&claims(None)).unwrap();
        assert!(matches!(ctx.caller(), Err(ApiError::Forbidden(_))));

        let ctx = AuthContext::from_claims(&claims(Some("admin"))).unwrap();
        assert!(ctx.role.is_none());
    }

    #[test]
    fn test_bad_subject_is_rejected() {
        let mut bad = claims(Some("customer"));
        bad.sub = "not-a-uuid".to_string();
        assert!(AuthContext::from_claims(&bad).is_err());
    }
}
