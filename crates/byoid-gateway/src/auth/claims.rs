//! Claim sets, provider classification and the authenticated identity

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{AUTH_SCHEME_CLAIM, PROVIDER_TYPE_CLAIM, TENANT_SLUG_CLAIM};

/// Audience can be a single string or array of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(s) => Some(s.as_str()),
            Self::Many(v) => v.first().map(String::as_str),
        }
    }
}

/// One name/value pair; a name may repeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub name: String,
    pub value: String,
}

/// Ordered, multi-valued claim collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClaimSet(Vec<Claim>);

impl ClaimSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Flatten a validated JWT payload. Arrays become repeated claims,
    /// nested objects are kept as JSON text and nulls are dropped.
    #[must_use]
    pub fn from_json(payload: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut set = Self::new();
        for (name, value) in payload {
            match value {
                serde_json::Value::Array(items) => {
                    for item in items {
                        set.push_value(name, item);
                    }
                }
                other => set.push_value(name, other),
            }
        }
        set
    }

    fn push_value(&mut self, name: &str, value: &serde_json::Value) {
        let value = match value {
            serde_json::Value::Null => return,
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.push(name, value);
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(Claim {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Drop every value of a claim
    pub fn remove(&mut self, name: &str) {
        self.0.retain(|c| c.name != name);
    }

    /// First value of a claim
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Rename claims through a source-to-target map; unmapped names pass through
    #[must_use]
    pub fn remap(self, mappings: &HashMap<String, String>) -> Self {
        if mappings.is_empty() {
            return self;
        }
        Self(
            self.0
                .into_iter()
                .map(|claim| match mappings.get(&claim.name) {
                    Some(target) => Claim {
                        name: target.clone(),
                        value: claim.value,
                    },
                    None => claim,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Identity provider family a token was issued by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    EntraId,
    Auth0,
    Okta,
    Keycloak,
    Google,
    Cognito,
    Unknown,
}

impl ProviderType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EntraId => "entra_id",
            Self::Auth0 => "auth0",
            Self::Okta => "okta",
            Self::Keycloak => "keycloak",
            Self::Google => "google",
            Self::Cognito => "cognito",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies which provider family issued a claim set.
///
/// Implementations are pure and must not perform I/O.
pub trait ClaimNormalizer: Send + Sync {
    fn classify(&self, claims: &ClaimSet) -> ProviderType;
}

/// Classifies by the shape of the `iss` claim, falling back to Entra's `tid`
#[derive(Debug, Clone, Copy, Default)]
pub struct IssuerClaimNormalizer;

impl ClaimNormalizer for IssuerClaimNormalizer {
    fn classify(&self, claims: &ClaimSet) -> ProviderType {
        let Some(issuer) = claims.get("iss").and_then(|iss| Url::parse(iss).ok()) else {
            return if claims.get("tid").is_some() {
                ProviderType::EntraId
            } else {
                ProviderType::Unknown
            };
        };
        let host = issuer.host_str().unwrap_or_default().to_ascii_lowercase();

        if host == "login.microsoftonline.com"
            || host == "sts.windows.net"
            || host.ends_with(".ciamlogin.com")
            || claims.get("tid").is_some()
        {
            ProviderType::EntraId
        } else if host.ends_with(".auth0.com") {
            ProviderType::Auth0
        } else if host.ends_with(".okta.com") || host.ends_with(".oktapreview.com") {
            ProviderType::Okta
        } else if host == "accounts.google.com" {
            ProviderType::Google
        } else if host.starts_with("cognito-idp.") && host.ends_with(".amazonaws.com") {
            ProviderType::Cognito
        } else if issuer.path().contains("/realms/") {
            ProviderType::Keycloak
        } else {
            ProviderType::Unknown
        }
    }
}

/// Identity produced by a successful authentication
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedIdentity {
    pub subject: Option<String>,
    pub tenant_slug: String,
    pub scheme: String,
    pub provider_type: ProviderType,
    pub claims: ClaimSet,
}

impl AuthenticatedIdentity {
    /// Build the identity from remapped claims and append the gateway claims.
    ///
    /// Token or mapped claims carrying a gateway claim name are discarded.
    #[must_use]
    pub fn new(
        mut claims: ClaimSet,
        tenant_slug: &str,
        scheme: &str,
        normalizer: &dyn ClaimNormalizer,
    ) -> Self {
        for reserved in [TENANT_SLUG_CLAIM, AUTH_SCHEME_CLAIM, PROVIDER_TYPE_CLAIM] {
            claims.remove(reserved);
        }
        claims.push(TENANT_SLUG_CLAIM, tenant_slug);
        claims.push(AUTH_SCHEME_CLAIM, scheme);
        let provider_type = normalizer.classify(&claims);
        claims.push(PROVIDER_TYPE_CLAIM, provider_type.as_str());

        Self {
            subject: claims.get("sub").map(ToString::to_string),
            tenant_slug: tenant_slug.to_string(),
            scheme: scheme.to_string(),
            provider_type,
            claims,
        }
    }

    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name)
    }
}
