//! Gateway configuration builder

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::auth::{AuthenticationConfig, AuthenticationConfigBuilder, TenantConfig};
use crate::{Error, Result};

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub auth: AuthenticationConfig,
    pub telemetry: TelemetryConfig,
    pub tenants: Vec<TenantConfig>,
}

impl GatewayConfig {
    #[must_use]
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub request_timeout: Duration,
    /// Allowed CORS origins; empty disables cross-origin access
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            request_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    server: ServerConfig,
    auth: AuthenticationConfigBuilder,
    telemetry: TelemetryConfig,
    tenants: Vec<TenantConfig>,
}

impl GatewayConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn host(mut self, host: IpAddr) -> Self {
        self.server.host = host;
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.server.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn cors_origins(mut self, origins: Vec<String>) -> Self {
        self.server.cors_origins = origins;
        self
    }

    /// Adjust the authentication options
    #[must_use]
    pub fn auth(
        mut self,
        f: impl FnOnce(AuthenticationConfigBuilder) -> AuthenticationConfigBuilder,
    ) -> Self {
        self.auth = f(self.auth);
        self
    }

    #[must_use]
    pub fn tenants(mut self, tenants: Vec<TenantConfig>) -> Self {
        self.tenants = tenants;
        self
    }

    #[must_use]
    pub fn otlp_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.telemetry.otlp_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn service_name(mut self, name: String) -> Self {
        self.telemetry.service_name = name;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<GatewayConfig> {
        let auth = self.auth.build()?;

        if self.server.request_timeout.is_zero() {
            return Err(Error::config("request timeout must be greater than zero"));
        }

        for tenant in &self.tenants {
            tenant.validate()?;
        }

        let service_name = if self.telemetry.service_name.is_empty() {
            env!("CARGO_PKG_NAME").to_string()
        } else {
            self.telemetry.service_name
        };

        let log_level = if self.telemetry.log_level.is_empty() {
            "info".to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(GatewayConfig {
            server: self.server,
            auth,
            telemetry: TelemetryConfig {
                otlp_endpoint: self.telemetry.otlp_endpoint,
                service_name,
                log_level,
                json_logs: self.telemetry.json_logs,
            },
            tenants: self.tenants,
        })
    }
}
