//! JWT signature and claim validation

use std::time::Duration;

use jsonwebtoken::{Algorithm, Validation, decode, decode_header};

use super::error::TokenRejection;
use super::metadata::CachedMetadata;

pub type Claims = serde_json::Map<String, serde_json::Value>;

/// Validates tokens against one identity provider's cached metadata
#[derive(Debug, Clone, Copy)]
pub struct JwtValidator {
    clock_skew: Duration,
}

impl JwtValidator {
    #[must_use]
    pub const fn new(clock_skew: Duration) -> Self {
        Self { clock_skew }
    }

    /// True when the token names a `kid` the cached key set does not hold
    #[must_use]
    pub fn references_unknown_key(token: &str, metadata: &CachedMetadata) -> bool {
        decode_header(token)
            .ok()
            .and_then(|header| header.kid)
            .is_some_and(|kid| !metadata.has_key(&kid))
    }

    /// Verify signature, issuer, audience and lifetime.
    ///
    /// `issuer` must match exactly; the token audience must intersect
    /// `audiences`. Symmetric and unsigned tokens are always rejected.
    pub fn validate(
        &self,
        token: &str,
        metadata: &CachedMetadata,
        issuer: &str,
        audiences: &[String],
    ) -> Result<Claims, TokenRejection> {
        let header = decode_header(token)?;
        if !is_asymmetric(header.alg) {
            return Err(TokenRejection::UnsupportedAlgorithm);
        }

        let candidates: Vec<_> = metadata
            .signing_keys()
            .iter()
            .filter(|key| key.supports(header.alg))
            .filter(|key| header.kid.is_none() || key.kid() == header.kid.as_deref())
            .collect();
        if candidates.is_empty() {
            return Err(header
                .kid
                .map_or(TokenRejection::NoMatchingKey, TokenRejection::KeyNotFound));
        }

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[issuer]);
        validation.set_audience(audiences);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = self.clock_skew.as_secs();

        let mut rejection = TokenRejection::InvalidSignature;
        for key in candidates {
            match decode::<Claims>(token, key.decoding_key(), &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => {
                    rejection = TokenRejection::from(e);
                    if rejection != TokenRejection::InvalidSignature {
                        break;
                    }
                }
            }
        }
        Err(rejection)
    }
}

const fn is_asymmetric(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
    )
}
