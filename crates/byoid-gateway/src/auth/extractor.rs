//! Tenant identifier and bearer credential extraction

use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::request::Parts;

use super::options::{AuthenticationConfig, TenantIdentifierSource};

const BEARER_PREFIX: &str = "Bearer ";

/// Read the tenant identifier using the configured source
#[must_use]
pub fn extract_tenant_identifier(parts: &Parts, config: &AuthenticationConfig) -> Option<String> {
    match config.identifier_source() {
        TenantIdentifierSource::Header => parts
            .headers
            .get(config.header_name())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string),
        TenantIdentifierSource::PathSegment => {
            extract_from_path(parts.uri.path(), config.path_segment_index())
        }
        TenantIdentifierSource::Subdomain => request_host(parts).and_then(extract_from_host),
    }
}

/// Return the 0-based non-empty path segment at `index`
#[must_use]
pub fn extract_from_path(path: &str, index: usize) -> Option<String> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .nth(index)
        .map(ToString::to_string)
}

/// Leftmost DNS label of the host, skipping a leading `www`
#[must_use]
pub fn extract_from_host(host: &str) -> Option<String> {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return None;
    }

    let label = if labels[0].eq_ignore_ascii_case("www") {
        labels.get(1).copied()?
    } else {
        labels[0]
    };

    (!label.is_empty()).then(|| label.to_string())
}

/// Host of the request without the port.
///
/// HTTP/2 requests carry the authority in the URI, HTTP/1.1 in the `Host` header.
fn request_host(parts: &Parts) -> Option<&str> {
    let host = parts.uri.host().or_else(|| {
        parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(|h| h.rsplit_once(':').map_or(h, |(name, _)| name))
    })?;
    let host = host.trim();
    (!host.is_empty()).then_some(host)
}

/// Token text of an `Authorization: Bearer <token>` header.
///
/// The scheme prefix is matched case-insensitively; an empty token is absent.
#[must_use]
pub fn extract_bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let prefix = value.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }

    let token = value[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    fn config(source: TenantIdentifierSource) -> AuthenticationConfig {
        AuthenticationConfig::builder()
            .identifier_source(source)
            .path_segment_index(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_header_source() {
        let config = config(TenantIdentifierSource::Header);
        let req = parts(Request::get("/todos").header("X-Tenant-Slug", "acme"));
        assert_eq!(extract_tenant_identifier(&req, &config).as_deref(), Some("acme"));

        let req = parts(Request::get("/todos"));
        assert_eq!(extract_tenant_identifier(&req, &config), None);
    }

    #[test]
    fn test_header_source_first_value() {
        let config = config(TenantIdentifierSource::Header);
        let req = parts(
            Request::get("/")
                .header("x-tenant-slug", "acme")
                .header("x-tenant-slug", "contoso"),
        );
        assert_eq!(extract_tenant_identifier(&req, &config).as_deref(), Some("acme"));
    }

    #[test]
    fn test_path_source() {
        let config = config(TenantIdentifierSource::PathSegment);
        let req = parts(Request::get("/api/acme/todos"));
        assert_eq!(extract_tenant_identifier(&req, &config).as_deref(), Some("acme"));

        let req = parts(Request::get("/api"));
        assert_eq!(extract_tenant_identifier(&req, &config), None);
    }

    #[test]
    fn test_extract_from_path_skips_empty_segments() {
        assert_eq!(extract_from_path("//acme//todos/", 0).as_deref(), Some("acme"));
        assert_eq!(extract_from_path("//acme//todos/", 1).as_deref(), Some("todos"));
        assert_eq!(extract_from_path("/acme/todos", 2), None);
        assert_eq!(extract_from_path("/", 0), None);
        assert_eq!(extract_from_path("", 0), None);
    }

    #[test]
    fn test_extract_from_host() {
        assert_eq!(extract_from_host("acme.example.com").as_deref(), Some("acme"));
        assert_eq!(extract_from_host("www.acme.example.com").as_deref(), Some("acme"));
        assert_eq!(extract_from_host("WWW.contoso.io").as_deref(), Some("contoso"));
        assert_eq!(extract_from_host("www.example").as_deref(), Some("example"));
        assert_eq!(extract_from_host("localhost"), None);
        assert_eq!(extract_from_host("www"), None);
    }

    #[test]
    fn test_subdomain_source_strips_port() {
        let config = config(TenantIdentifierSource::Subdomain);
        let req = parts(Request::get("/").header("Host", "acme.example.com:8443"));
        assert_eq!(extract_tenant_identifier(&req, &config).as_deref(), Some("acme"));

        let req = parts(Request::get("/").header("Host", "localhost:8080"));
        assert_eq!(extract_tenant_identifier(&req, &config), None);
    }

    #[test]
    fn test_subdomain_source_prefers_uri_authority() {
        let config = config(TenantIdentifierSource::Subdomain);
        let req = parts(Request::get("https://contoso.example.com/todos"));
        assert_eq!(extract_tenant_identifier(&req, &config).as_deref(), Some("contoso"));
    }

    #[test]
    fn test_bearer_token() {
        let req = parts(Request::get("/").header("Authorization", "Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&req).as_deref(), Some("abc.def.ghi"));

        let req = parts(Request::get("/").header("Authorization", "bEaReR abc"));
        assert_eq!(extract_bearer_token(&req).as_deref(), Some("abc"));
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes_and_empty() {
        let req = parts(Request::get("/").header("Authorization", "Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer_token(&req), None);

        let req = parts(Request::get("/").header("Authorization", "Bearer   "));
        assert_eq!(extract_bearer_token(&req), None);

        let req = parts(Request::get("/").header("Authorization", "Bearer"));
        assert_eq!(extract_bearer_token(&req), None);

        let req = parts(Request::get("/"));
        assert_eq!(extract_bearer_token(&req), None);
    }
}
