//! Request classification for multi-scheme dispatch

use axum::http::request::Parts;

use super::extractor::{extract_bearer_token, extract_tenant_identifier};
use super::options::{AuthenticationConfig, TenantIdentifierSource};

/// True when the request carries a tenant identifier and a bearer credential
#[must_use]
pub fn should_handle(parts: &Parts, config: &AuthenticationConfig) -> bool {
    extract_tenant_identifier(parts, config).is_some() && extract_bearer_token(parts).is_some()
}

/// True when the tenant header and an alternate-scheme header are both present.
///
/// Only the header source can collide with header-based schemes.
#[must_use]
pub fn has_conflicting_indicators<S: AsRef<str>>(
    parts: &Parts,
    config: &AuthenticationConfig,
    alternate_headers: &[S],
) -> bool {
    if config.identifier_source() != TenantIdentifierSource::Header {
        return false;
    }
    if !parts.headers.contains_key(config.header_name()) {
        return false;
    }
    alternate_headers
        .iter()
        .any(|name| parts.headers.contains_key(name.as_ref()))
}
