//! Multi-tenant bearer-token authentication
//!
//! Each tenant brings its own identity provider. The tenant is identified
//! from the request (header, path segment or subdomain), resolved through a
//! [`TenantResolver`], and the presented token is validated against that
//! tenant's provider metadata held in the [`MetadataCache`].
//!
//! # Components
//!
//! - [`extract_tenant_identifier`] / [`extract_from_path`] - tenant extraction
//! - [`should_handle`] / [`has_conflicting_indicators`] - dispatcher predicates
//! - [`MetadataCache`] - per-provider discovery cache with background refresh
//! - [`TenantAuthenticator`] - the authentication pipeline
//! - [`tenant_auth_middleware`] / [`RequireIdentity`] - axum integration

mod authenticator;
mod claims;
mod classifier;
mod discovery;
mod error;
mod extractor;
mod jwks;
mod jwt;
mod metadata;
mod middleware;
mod options;
mod tenant;
#[cfg(test)]
pub(crate) mod testing;
mod token;

pub use authenticator::{AuthenticationOutcome, TenantAuthenticator};
pub use claims::{
    AuthenticatedIdentity, Claim, ClaimNormalizer, ClaimSet, IssuerClaimNormalizer, ProviderType,
};
pub use classifier::{has_conflicting_indicators, should_handle};
pub use discovery::{DiscoveredMetadata, DiscoveryClient, HttpDiscoveryClient};
pub use error::{AuthError, FaultKind, MetadataError, ResolveError, TokenRejection};
pub use extractor::{
    extract_bearer_token, extract_from_host, extract_from_path, extract_tenant_identifier,
};
pub use jwks::{Jwk, JwkSet, SigningKey};
pub use jwt::JwtValidator;
pub use metadata::{CacheSettings, CachedMetadata, MetadataCache, MetadataRefreshTask};
pub use middleware::{AuthRejection, AuthState, RequireIdentity, tenant_auth_middleware};
pub use options::{
    AuthenticationConfig, AuthenticationConfigBuilder, TenantIdentifierSource,
    TenantNotFoundPolicy, segment_index,
};
pub use tenant::{
    ResolutionContext, StaticTenantResolver, TenantConfig, TenantContext, TenantResolver,
};
pub use token::UnverifiedToken;
