//! Shared fakes and signed-token helpers for unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::discovery::{DiscoveredMetadata, DiscoveryClient};
use super::error::{MetadataError, ResolveError};
use super::jwks::{JwkSet, signing_keys};
use super::tenant::{ResolutionContext, TenantConfig, TenantResolver};

pub const RSA_A_PEM: &str = include_str!("../../testdata/rsa_a.pem");
pub const RSA_B_PEM: &str = include_str!("../../testdata/rsa_b.pem");

pub const RSA_A_N: &str = "u_Nc5eLJg5GcDzLTLKWnp2QnIojANCbvSL6dEtmV3VeMFADdJmy76ygXg8J8qOPTIrK7iCEZK2m8UCysd5uYfpXulq_nm2nUNUd2e12I0UuvTO24BRhD39R5_j7GkNMmFswb06AwvsnH2hapU9oGuwtNzrTDLajeCjfDClFxI2IvDzxgoMvxe6YM3p24CF6_X0nsF8Bl4DwT17VXvjmY5E0C6Io9HOX2ihzDaSMY3f3Ebii8H8D7Hd65RrS8qWEXl07XJno9JLJPh8nu-UA2t4gqcqOn_O8yKBEhGCWLQh-VZjbUELK2_dpa5i-2G9DpI577xpE0LJ6MKFi6UOL7wQ";
pub const RSA_B_N: &str = "qeaPQomfpm2u9O1TQCPtcDOBSqC09s3SC3VKMEDDMxb_8bIjeAnFA4oyBw9q5eUu_L19HVKYI63SW05RwEFgGj5CRdGA113ypRj58SzoLzCgwf-peE_kYk028t4GkwejUE9rr9HYr_sE_7nqrVo-GWNipiisFGhJmdxkj_xPsS_MFzv34ebDWQIkqYtgg1ryHWHKEJRgWaS-NR3ckJaaOexFE_ieNsxh6B7vRdksTc5KWvxgWgwQ2ssEBIemnLkDEGrM94Q0fDjkgfgWPZJr9tSfInk5whHbGeIy5_VrkD_7yYeahH1rV88E3Z3FNYxH4CxL5heiU1Qe-9FaD6vG2Q";

pub const ISSUER: &str = "https://idp.acme.test";
pub const METADATA_ADDRESS: &str = "https://idp.acme.test/.well-known/openid-configuration";
pub const AUDIENCE: &str = "api://todos";

pub fn now() -> i64 {
    i64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs(),
    )
    .unwrap()
}

pub fn rsa_jwk(kid: &str, n: &str) -> serde_json::Value {
    serde_json::json!({"kid": kid, "kty": "RSA", "use": "sig", "alg": "RS256", "n": n, "e": "AQAB"})
}

/// Sign `claims` with RS256
pub fn sign(claims: &serde_json::Value, pem: &str, kid: Option<&str>, typ: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(ToString::to_string);
    header.typ = typ.map(ToString::to_string);
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap(),
    )
    .unwrap()
}

/// Access token for the default tenant signed by key A
pub fn access_token(extra: &serde_json::Value) -> String {
    let mut claims = serde_json::json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "user-1",
        "exp": now() + 600,
        "iat": now(),
    });
    if let (Some(base), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    sign(&claims, RSA_A_PEM, Some("key-a"), Some("at+jwt"))
}

/// Discovery client serving a configurable key set
pub struct FakeDiscovery {
    pub issuer: String,
    pub jwks: Mutex<serde_json::Value>,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    delay: Option<Duration>,
}

impl FakeDiscovery {
    pub fn new(issuer: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            jwks: Mutex::new(serde_json::json!({"keys": [rsa_jwk("key-a", RSA_A_N)]})),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: None,
        }
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_keys(&self, keys: Vec<serde_json::Value>) {
        *self.jwks.lock() = serde_json::json!({ "keys": keys });
    }
}

#[async_trait]
impl DiscoveryClient for FakeDiscovery {
    async fn fetch(
        &self,
        address: &str,
        _require_https: bool,
    ) -> Result<DiscoveredMetadata, MetadataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(MetadataError::Fetch {
                url: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let set: JwkSet = serde_json::from_value(self.jwks.lock().clone())
            .map_err(|e| MetadataError::Parse {
                url: address.to_string(),
                reason: e.to_string(),
            })?;
        Ok(DiscoveredMetadata {
            issuer: self.issuer.clone(),
            signing_keys: signing_keys(&set)?,
        })
    }
}

/// Resolver returning a fixed answer and recording what it was asked
#[derive(Default)]
pub struct FakeResolver {
    pub tenant: Mutex<Option<TenantConfig>>,
    pub calls: AtomicUsize,
    pub last_context: Mutex<Option<ResolutionContext>>,
    pub fail: AtomicBool,
}

impl FakeResolver {
    pub fn returning(tenant: Option<TenantConfig>) -> Arc<Self> {
        Arc::new(Self {
            tenant: Mutex::new(tenant),
            ..Default::default()
        })
    }
}

#[async_trait]
impl TenantResolver for FakeResolver {
    async fn resolve(
        &self,
        context: &ResolutionContext,
        cancel: &CancellationToken,
    ) -> Result<Option<TenantConfig>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_context.lock() = Some(context.clone());
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ResolveError::Unavailable("database offline".to_string()));
        }
        Ok(self.tenant.lock().clone())
    }
}

/// Tenant trusting the fake identity provider
pub fn tenant(slug: &str) -> TenantConfig {
    TenantConfig::new(slug, METADATA_ADDRESS, vec![AUDIENCE.to_string()])
}
