//! Multi-tenant bearer-token authentication gateway for bring-your-own-identity APIs

pub mod auth;
pub mod config;
mod constants;
mod error;
pub mod observability;
pub mod server;

pub use auth::{
    AuthError, AuthState, AuthenticatedIdentity, AuthenticationConfig, AuthenticationOutcome,
    MetadataCache, RequireIdentity, StaticTenantResolver, TenantAuthenticator, TenantConfig,
    TenantResolver,
};
pub use config::{GatewayConfig, GatewayConfigBuilder, TelemetryConfig};
pub use error::{Error, Result};
