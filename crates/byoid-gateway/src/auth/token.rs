//! Unverified token introspection
//!
//! Reads routing fields out of a compact JWT before any signature check.
//! Nothing read here is trusted for authorization on its own.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::claims::OneOrMany;

#[derive(Debug, Default, Deserialize)]
struct RawHeader {
    #[serde(default)]
    typ: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<OneOrMany>,
    #[serde(default)]
    azp: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
}

/// Fields read from a token without validating it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnverifiedToken {
    pub token_type: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub client_id: Option<String>,
}

impl UnverifiedToken {
    /// Parse the header and payload segments.
    ///
    /// A segment that does not decode leaves its fields empty.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(_), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Self::default();
        };

        let header: RawHeader = decode_segment(header).unwrap_or_default();
        let payload: RawPayload = decode_segment(payload).unwrap_or_default();

        Self {
            token_type: header.typ.filter(|t| !t.is_empty()),
            issuer: payload.iss.filter(|i| !i.is_empty()),
            audience: payload.aud.and_then(|a| a.first().map(ToString::to_string)),
            client_id: payload
                .azp
                .filter(|c| !c.is_empty())
                .or_else(|| payload.client_id.filter(|c| !c.is_empty())),
        }
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}
