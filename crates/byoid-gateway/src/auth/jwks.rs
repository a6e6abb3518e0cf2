//! JSON Web Key Set decoding

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;

use super::error::MetadataError;

/// JSON Web Key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type (RSA, EC)
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub r#use: Option<String>,
    // RSA components
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    // EC components
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// JSON Web Key Set
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    P256,
    P384,
}

/// Public key usable for signature verification
#[derive(Clone)]
pub struct SigningKey {
    kid: Option<String>,
    algorithm: Option<Algorithm>,
    family: KeyFamily,
    key: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    /// True when the key may verify a token signed with `alg`.
    ///
    /// Keys without an `alg` accept every algorithm of their family.
    #[must_use]
    pub fn supports(&self, alg: Algorithm) -> bool {
        if let Some(declared) = self.algorithm {
            return declared == alg;
        }
        match self.family {
            KeyFamily::Rsa => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            KeyFamily::P256 => alg == Algorithm::ES256,
            KeyFamily::P384 => alg == Algorithm::ES384,
        }
    }
}

/// Decode every usable signing key of a set
pub fn signing_keys(set: &JwkSet) -> Result<Vec<SigningKey>, MetadataError> {
    let keys: Vec<SigningKey> = set.keys.iter().filter_map(decode_jwk).collect();
    if keys.is_empty() {
        return Err(MetadataError::NoSigningKeys);
    }
    Ok(keys)
}

fn decode_jwk(jwk: &Jwk) -> Option<SigningKey> {
    if jwk.r#use.as_deref().is_some_and(|u| u != "sig") {
        tracing::debug!(kid = ?jwk.kid, "Skipping non-signature key");
        return None;
    }

    let algorithm = match jwk.alg.as_deref() {
        None => None,
        Some("RS256") => Some(Algorithm::RS256),
        Some("RS384") => Some(Algorithm::RS384),
        Some("RS512") => Some(Algorithm::RS512),
        Some("PS256") => Some(Algorithm::PS256),
        Some("PS384") => Some(Algorithm::PS384),
        Some("PS512") => Some(Algorithm::PS512),
        Some("ES256") => Some(Algorithm::ES256),
        Some("ES384") => Some(Algorithm::ES384),
        Some(other) => {
            tracing::debug!(kid = ?jwk.kid, alg = other, "Skipping key with unsupported algorithm");
            return None;
        }
    };

    let (family, key) = match jwk.kty.as_str() {
        "RSA" => {
            let key = DecodingKey::from_rsa_components(jwk.n.as_deref()?, jwk.e.as_deref()?);
            (KeyFamily::Rsa, key)
        }
        "EC" => {
            let family = match jwk.crv.as_deref() {
                Some("P-256") => KeyFamily::P256,
                Some("P-384") => KeyFamily::P384,
                _ => return None,
            };
            let key = DecodingKey::from_ec_components(jwk.x.as_deref()?, jwk.y.as_deref()?);
            (family, key)
        }
        other => {
            tracing::debug!(kty = other, "Skipping unsupported key type");
            return None;
        }
    };

    match key {
        Ok(key) => Some(SigningKey {
            kid: jwk.kid.clone(),
            algorithm,
            family,
            key,
        }),
        Err(e) => {
            tracing::debug!(kid = ?jwk.kid, error = %e, "Skipping malformed key");
            None
        }
    }
}
