//! Tenant configuration and the resolver contract

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::ResolveError;
use crate::{Error, Result};

/// Request facts handed to the resolver, built fresh per request
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    pub tenant_identifier: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub raw_token: Option<String>,
}

/// Trust settings of one tenant
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TenantConfig {
    pub slug: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Discovery document address of the tenant's identity provider
    pub metadata_address: String,
    pub valid_audiences: Vec<String>,
    /// Expected `iss`, replaces the discovery issuer when set
    #[serde(default)]
    pub issuer_override: Option<String>,
    /// Source claim name to target claim name
    #[serde(default)]
    pub claim_mappings: HashMap<String, String>,
    #[serde(default)]
    pub authorized_client_ids: Option<Vec<String>>,
    #[serde(default)]
    pub require_access_token_type: bool,
}

const fn default_enabled() -> bool {
    true
}

impl TenantConfig {
    #[must_use]
    pub fn new(
        slug: impl Into<String>,
        metadata_address: impl Into<String>,
        valid_audiences: Vec<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            enabled: true,
            display_name: None,
            metadata_address: metadata_address.into(),
            valid_audiences,
            issuer_override: None,
            claim_mappings: HashMap::new(),
            authorized_client_ids: None,
            require_access_token_type: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.slug.trim().is_empty() {
            return Err(Error::config("tenant slug must not be empty"));
        }

        let address = Url::parse(&self.metadata_address).map_err(|e| {
            Error::config(format!(
                "tenant '{}': invalid metadata address '{}': {e}",
                self.slug, self.metadata_address
            ))
        })?;
        if !matches!(address.scheme(), "https" | "http") {
            return Err(Error::config(format!(
                "tenant '{}': metadata address must use http or https",
                self.slug
            )));
        }

        if self.valid_audiences.iter().all(|a| a.trim().is_empty()) {
            return Err(Error::config(format!(
                "tenant '{}': at least one valid audience is required",
                self.slug
            )));
        }

        Ok(())
    }

    /// True when the client allow-list is present and non-empty
    #[must_use]
    pub fn restricts_clients(&self) -> bool {
        self.authorized_client_ids
            .as_ref()
            .is_some_and(|ids| !ids.is_empty())
    }

    #[must_use]
    pub fn is_client_authorized(&self, client_id: &str) -> bool {
        self.authorized_client_ids
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| id.eq_ignore_ascii_case(client_id)))
    }
}

/// Maps a resolution context to a tenant.
///
/// Called at most once per request, after the pre-resolution checks pass.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve(
        &self,
        context: &ResolutionContext,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<TenantConfig>, ResolveError>;
}

/// In-memory resolver keyed by lower-cased tenant slug
#[derive(Debug, Default)]
pub struct StaticTenantResolver {
    tenants: HashMap<String, Arc<TenantConfig>>,
}

impl StaticTenantResolver {
    /// Validate and index tenants; duplicate slugs are rejected
    pub fn new(tenants: impl IntoIterator<Item = TenantConfig>) -> Result<Self> {
        let mut map = HashMap::new();
        for tenant in tenants {
            tenant.validate()?;
            let key = tenant.slug.to_ascii_lowercase();
            if map.contains_key(&key) {
                return Err(Error::config(format!("duplicate tenant slug '{key}'")));
            }
            map.insert(key, Arc::new(tenant));
        }
        Ok(Self { tenants: map })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[async_trait]
impl TenantResolver for StaticTenantResolver {
    async fn resolve(
        &self,
        context: &ResolutionContext,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<TenantConfig>, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        Ok(context
            .tenant_identifier
            .as_deref()
            .and_then(|id| self.tenants.get(&id.to_ascii_lowercase()))
            .map(|tenant| tenant.as_ref().clone()))
    }
}

/// Resolved tenant attached to the request on success
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub identifier: String,
    pub tenant: Arc<TenantConfig>,
}
