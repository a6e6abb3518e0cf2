//! TOML configuration file loading

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::builder::GatewayConfigBuilder;
use crate::auth::{TenantConfig, TenantIdentifierSource, TenantNotFoundPolicy, segment_index};
use crate::{Error, Result};

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./byoid-gateway.toml",
    "~/.config/byoid-gateway/config.toml",
    "/etc/byoid-gateway/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: GatewayConfigBuilder) -> Result<GatewayConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        Error::config(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(
    mut builder: GatewayConfigBuilder,
    config: FileConfig,
) -> Result<GatewayConfigBuilder> {
    if let Some(server) = config.server {
        if let Some(host) = server.host {
            let host: IpAddr = host
                .parse()
                .map_err(|e| Error::config(format!("Invalid server host '{host}': {e}")))?;
            builder = builder.host(host);
        }
        if let Some(port) = server.port {
            builder = builder.port(port);
        }
        if let Some(secs) = server.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(origins) = server.cors_origins {
            builder = builder.cors_origins(origins);
        }
    }

    if let Some(auth) = config.auth {
        builder = apply_auth_section(builder, auth)?;
    }

    if let Some(obs) = config.observability {
        if let Some(endpoint) = obs.otlp_endpoint {
            builder = builder.otlp_endpoint(Some(endpoint));
        }
        if let Some(name) = obs.service_name {
            builder = builder.service_name(name);
        }
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }
        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    if let Some(tenants) = config.tenants {
        builder = builder.tenants(tenants);
    }

    Ok(builder)
}

fn apply_auth_section(builder: GatewayConfigBuilder, auth: AuthSection) -> Result<GatewayConfigBuilder> {
    let source = auth
        .identifier_source
        .as_deref()
        .map(str::parse::<TenantIdentifierSource>)
        .transpose()?;
    let policy = auth
        .not_found_policy
        .as_deref()
        .map(str::parse::<TenantNotFoundPolicy>)
        .transpose()?;
    let path_index = auth
        .path_segment_index
        .map(|i| segment_index(i, "auth.path_segment_index"))
        .transpose()?;
    let validation_index = auth
        .path_validation_segment_index
        .map(|i| segment_index(i, "auth.path_validation_segment_index"))
        .transpose()?;
    let clock_skew = auth
        .clock_skew_secs
        .map(|secs| {
            u64::try_from(secs)
                .map(Duration::from_secs)
                .map_err(|_| Error::config("auth.clock_skew_secs must not be negative"))
        })
        .transpose()?;

    Ok(builder.auth(|mut a| {
        if let Some(name) = auth.scheme_name {
            a = a.scheme_name(name);
        }
        if let Some(source) = source {
            a = a.identifier_source(source);
        }
        if let Some(header) = auth.header_name {
            a = a.header_name(header);
        }
        if let Some(index) = path_index {
            a = a.path_segment_index(index);
        }
        if let Some(enabled) = auth.validate_path {
            a = a.validate_path(enabled);
        }
        if let Some(index) = validation_index {
            a = a.path_validation_segment_index(index);
        }
        if let Some(minutes) = auth.metadata_cache_minutes {
            a = a.metadata_refresh_interval(Duration::from_secs(minutes.saturating_mul(60)));
        }
        if let Some(secs) = auth.metadata_refresh_cooldown_secs {
            a = a.metadata_refresh_cooldown(Duration::from_secs(secs));
        }
        if let Some(minutes) = auth.metadata_max_stale_minutes {
            a = a.metadata_max_stale(Duration::from_secs(minutes.saturating_mul(60)));
        }
        if let Some(required) = auth.require_https_metadata {
            a = a.require_https_metadata(required);
        }
        if let Some(policy) = policy {
            a = a.not_found_policy(policy);
        }
        if let Some(detailed) = auth.detailed_errors {
            a = a.detailed_errors(detailed);
        }
        if let Some(skew) = clock_skew {
            a = a.clock_skew(skew);
        }
        if let Some(headers) = auth.alternate_scheme_headers {
            a = a.alternate_scheme_headers(headers);
        }
        a
    }))
}

/// TOML file structure
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server: Option<ServerSection>,
    auth: Option<AuthSection>,
    observability: Option<ObservabilitySection>,
    tenants: Option<Vec<TenantConfig>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    request_timeout_secs: Option<u64>,
    cors_origins: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthSection {
    scheme_name: Option<String>,
    identifier_source: Option<String>,
    header_name: Option<String>,
    path_segment_index: Option<i64>,
    validate_path: Option<bool>,
    path_validation_segment_index: Option<i64>,
    metadata_cache_minutes: Option<u64>,
    metadata_refresh_cooldown_secs: Option<u64>,
    metadata_max_stale_minutes: Option<u64>,
    require_https_metadata: Option<bool>,
    not_found_policy: Option<String>,
    detailed_errors: Option<bool>,
    clock_skew_secs: Option<i64>,
    alternate_scheme_headers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObservabilitySection {
    otlp_endpoint: Option<String>,
    service_name: Option<String>,
    log_level: Option<String>,
    json_logs: Option<bool>,
}
