//! JWKS cache for Supabase JWT verification

use anyhow::{Context, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Claims;

/// Minimum spacing between two JWKS fetches
const REFETCH_GUARD: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: String,
    e: String,
}

struct KeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

/// RSA decoding keys by `kid`. Non-RSA and malformed keys are skipped.
fn decoding_keys(jwks: JwksResponse) -> HashMap<String, DecodingKey> {
    jwks.keys
        .into_iter()
        .filter(|jwk| jwk.kty == "RSA")
        .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => Some((jwk.kid, key)),
            Err(e) => {
                tracing::warn!(kid = %jwk.kid, error = %e, "Skipping unparsable JWK");
                None
            }
        })
        .collect()
}

/// JWKS cache for validating Supabase JWTs
#[derive(Clone)]
pub struct JwksCache {
    keys: Arc<RwLock<KeySet>>,
    client: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwksCache {
    pub fn new(jwks_url: String, issuer: String, audience: String, ttl_seconds: u64) -> Self {
        Self {
            keys: Arc::new(RwLock::new(KeySet {
                keys: HashMap::new(),
                fetched_at: None,
            })),
            client: reqwest::Client::new(),
            jwks_url,
            issuer,
            audience,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation
    }

    /// Verify a JWT token and return the claims
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).context("Invalid JWT header")?;
        let kid = header.kid.context("JWT missing kid header")?;
        let key = self.key(&kid).await?;

        let token_data =
            decode::<Claims>(token, &key, &self.validation()).context("JWT validation failed")?;
        Ok(token_data.claims)
    }

    fn cached(&self, kid: &str) -> Option<DecodingKey> {
        let set = self.keys.read();
        let fresh = set.fetched_at.is_some_and(|at| at.elapsed() < self.ttl);
        fresh.then(|| set.keys.get(kid).cloned()).flatten()
    }

    async fn key(&self, kid: &str) -> Result<DecodingKey> {
        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }
        self.refresh().await?;
        self.keys
            .read()
            .keys
            .get(kid)
            .cloned()
            .context("Key not found in JWKS")
    }

    async fn refresh(&self) -> Result<()> {
        let recently = self
            .keys
            .read()
            .fetched_at
            .is_some_and(|at| at.elapsed() < REFETCH_GUARD);
        if recently {
            return Ok(());
        }

        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .client
            .get(&self.jwks_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .context("Failed to fetch JWKS")?;
        if !response.status().is_success() {
            anyhow::bail!("JWKS fetch failed with status: {}", response.status());
        }
        let jwks: JwksResponse = response.json().await.context("Failed to parse JWKS")?;

        let keys = decoding_keys(jwks);
        let count = keys.len();
        *self.keys.write() = KeySet {
            keys,
            fetched_at: Some(Instant::now()),
        };

        tracing::info!(keys = count, "JWKS cache refreshed");
        Ok(())
    }

    /// Pre-warm the cache by fetching keys
    pub async fn warm_cache(&self) -> Result<()> {
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rsa_keys_are_kept() {
        let jwks: JwksResponse = serde_json::from_value(serde_json::json!({
            "keys": [
                { "kid": "rsa-1", "kty": "RSA", "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw", "e": "AQAB" },
                { "kid": "ec-1", "kty": "EC", "n": "", "e": "" }
            ]
        }))
        .unwrap();

        let keys = decoding_keys(jwks);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("rsa-1"));
    }
}
