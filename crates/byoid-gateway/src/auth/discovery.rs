//! OIDC discovery and key-set retrieval

use async_trait::async_trait;
use openidconnect::core::CoreProviderMetadata;
use serde::de::DeserializeOwned;
use url::Url;

use super::error::MetadataError;
use super::jwks::{JwkSet, SigningKey, signing_keys};
use crate::constants::DISCOVERY_HTTP_TIMEOUT;

/// Issuer and signing keys advertised by one identity provider
#[derive(Debug, Clone)]
pub struct DiscoveredMetadata {
    pub issuer: String,
    pub signing_keys: Vec<SigningKey>,
}

/// Fetches discovery metadata and the signing-key set it points to
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    async fn fetch(
        &self,
        address: &str,
        require_https: bool,
    ) -> Result<DiscoveredMetadata, MetadataError>;
}

/// Discovery over HTTP.
///
/// When HTTPS is not required the relaxed client skips certificate
/// validation. Use that only against development identity providers.
#[derive(Debug, Clone)]
pub struct HttpDiscoveryClient {
    strict: reqwest::Client,
    relaxed: reqwest::Client,
}

impl HttpDiscoveryClient {
    pub fn new() -> crate::Result<Self> {
        let build = |accept_invalid_certs: bool| {
            reqwest::Client::builder()
                .timeout(DISCOVERY_HTTP_TIMEOUT)
                .danger_accept_invalid_certs(accept_invalid_certs)
                .build()
                .map_err(|e| crate::Error::config(format!("Failed to create HTTP client: {e}")))
        };

        Ok(Self {
            strict: build(false)?,
            relaxed: build(true)?,
        })
    }

    const fn client(&self, require_https: bool) -> &reqwest::Client {
        if require_https {
            &self.strict
        } else {
            &self.relaxed
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        require_https: bool,
    ) -> Result<T, MetadataError> {
        let fetch_error = |reason: String| MetadataError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client(require_https)
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| MetadataError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl DiscoveryClient for HttpDiscoveryClient {
    async fn fetch(
        &self,
        address: &str,
        require_https: bool,
    ) -> Result<DiscoveredMetadata, MetadataError> {
        let metadata_url = checked_url(address, require_https)?;
        tracing::debug!(address = %metadata_url, "Fetching discovery document");

        let provider: CoreProviderMetadata = self.get_json(&metadata_url, require_https).await?;
        let issuer = provider.issuer().as_str().to_string();

        let jwks_url = checked_url(provider.jwks_uri().as_str(), require_https)?;
        let key_set: JwkSet = self.get_json(&jwks_url, require_https).await?;
        let signing_keys = signing_keys(&key_set)?;

        tracing::info!(
            address = %metadata_url,
            issuer = %issuer,
            keys_count = signing_keys.len(),
            "Discovery metadata fetched"
        );

        Ok(DiscoveredMetadata {
            issuer,
            signing_keys,
        })
    }
}

/// Parse an address and enforce the HTTPS requirement before any request
pub fn checked_url(address: &str, require_https: bool) -> Result<Url, MetadataError> {
    let url = Url::parse(address).map_err(|_| MetadataError::InvalidAddress(address.to_string()))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if !require_https => Ok(url),
        "http" => Err(MetadataError::InsecureAddress(address.to_string())),
        _ => Err(MetadataError::InvalidAddress(address.to_string())),
    }
}
