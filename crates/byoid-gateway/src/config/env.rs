//! Environment variable loading for configuration

use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use super::builder::GatewayConfigBuilder;
use crate::auth::{TenantIdentifierSource, TenantNotFoundPolicy, segment_index};
use crate::{Error, Result};

/// Environment variable names
mod vars {
    pub const BYOID_HOST: &str = "BYOID_HOST";
    pub const BYOID_PORT: &str = "BYOID_PORT";
    pub const BYOID_REQUEST_TIMEOUT_SECS: &str = "BYOID_REQUEST_TIMEOUT_SECS";
    pub const BYOID_CORS_ORIGINS: &str = "BYOID_CORS_ORIGINS";
    pub const BYOID_SCHEME_NAME: &str = "BYOID_SCHEME_NAME";
    pub const BYOID_TENANT_SOURCE: &str = "BYOID_TENANT_SOURCE";
    pub const BYOID_TENANT_HEADER: &str = "BYOID_TENANT_HEADER";
    pub const BYOID_PATH_SEGMENT_INDEX: &str = "BYOID_PATH_SEGMENT_INDEX";
    pub const BYOID_VALIDATE_PATH: &str = "BYOID_VALIDATE_PATH";
    pub const BYOID_PATH_VALIDATION_SEGMENT_INDEX: &str = "BYOID_PATH_VALIDATION_SEGMENT_INDEX";
    pub const BYOID_METADATA_CACHE_MINUTES: &str = "BYOID_METADATA_CACHE_MINUTES";
    pub const BYOID_REQUIRE_HTTPS_METADATA: &str = "BYOID_REQUIRE_HTTPS_METADATA";
    pub const BYOID_NOT_FOUND_POLICY: &str = "BYOID_NOT_FOUND_POLICY";
    pub const BYOID_DETAILED_ERRORS: &str = "BYOID_DETAILED_ERRORS";
    pub const BYOID_CLOCK_SKEW_SECS: &str = "BYOID_CLOCK_SKEW_SECS";
    pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
    pub const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const BYOID_JSON_LOGS: &str = "BYOID_JSON_LOGS";
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: GatewayConfigBuilder) -> Result<GatewayConfigBuilder> {
    // Server
    if let Some(host) = parsed::<IpAddr>(vars::BYOID_HOST)? {
        builder = builder.host(host);
    }

    if let Some(port) = parsed::<u16>(vars::BYOID_PORT)? {
        builder = builder.port(port);
    }

    if let Some(secs) = parsed::<u64>(vars::BYOID_REQUEST_TIMEOUT_SECS)? {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }

    if let Ok(origins) = env::var(vars::BYOID_CORS_ORIGINS) {
        builder = builder.cors_origins(split_list(&origins));
    }

    // Authentication
    let scheme_name = env::var(vars::BYOID_SCHEME_NAME).ok();
    let source = parsed::<TenantIdentifierSource>(vars::BYOID_TENANT_SOURCE)?;
    let header = env::var(vars::BYOID_TENANT_HEADER).ok();
    let path_index = parsed::<i64>(vars::BYOID_PATH_SEGMENT_INDEX)?
        .map(|i| segment_index(i, vars::BYOID_PATH_SEGMENT_INDEX))
        .transpose()?;
    let validate_path = flag(vars::BYOID_VALIDATE_PATH)?;
    let validation_index = parsed::<i64>(vars::BYOID_PATH_VALIDATION_SEGMENT_INDEX)?
        .map(|i| segment_index(i, vars::BYOID_PATH_VALIDATION_SEGMENT_INDEX))
        .transpose()?;
    let cache_minutes = parsed::<u64>(vars::BYOID_METADATA_CACHE_MINUTES)?;
    let require_https = flag(vars::BYOID_REQUIRE_HTTPS_METADATA)?;
    let policy = parsed::<TenantNotFoundPolicy>(vars::BYOID_NOT_FOUND_POLICY)?;
    let detailed = flag(vars::BYOID_DETAILED_ERRORS)?;
    let skew = parsed::<u64>(vars::BYOID_CLOCK_SKEW_SECS)?;

    builder = builder.auth(|mut a| {
        if let Some(name) = scheme_name {
            a = a.scheme_name(name);
        }
        if let Some(source) = source {
            a = a.identifier_source(source);
        }
        if let Some(header) = header {
            a = a.header_name(header);
        }
        if let Some(index) = path_index {
            a = a.path_segment_index(index);
        }
        if let Some(enabled) = validate_path {
            a = a.validate_path(enabled);
        }
        if let Some(index) = validation_index {
            a = a.path_validation_segment_index(index);
        }
        if let Some(minutes) = cache_minutes {
            a = a.metadata_refresh_interval(Duration::from_secs(minutes.saturating_mul(60)));
        }
        if let Some(required) = require_https {
            a = a.require_https_metadata(required);
        }
        if let Some(policy) = policy {
            a = a.not_found_policy(policy);
        }
        if let Some(detailed) = detailed {
            a = a.detailed_errors(detailed);
        }
        if let Some(secs) = skew {
            a = a.clock_skew(Duration::from_secs(secs));
        }
        a
    });

    // Telemetry
    if let Ok(endpoint) = env::var(vars::OTEL_EXPORTER_OTLP_ENDPOINT) {
        builder = builder.otlp_endpoint(Some(endpoint));
    }

    if let Ok(name) = env::var(vars::OTEL_SERVICE_NAME) {
        builder = builder.service_name(name);
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Some(enabled) = flag(vars::BYOID_JSON_LOGS)? {
        builder = builder.json_logs(enabled);
    }

    Ok(builder)
}

/// Read and parse a variable; a present but unparsable value is an error
fn parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(format!("Invalid {name} '{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Read a boolean variable; anything but a recognised spelling is an error
fn flag(name: &str) -> Result<Option<bool>> {
    match env::var(name) {
        Ok(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| Error::config(format!("Invalid {name} '{raw}': expected a boolean"))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
