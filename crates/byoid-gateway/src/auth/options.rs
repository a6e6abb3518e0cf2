//! Authentication scheme options

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ALTERNATE_SCHEME_HEADER, DEFAULT_CLOCK_SKEW, DEFAULT_METADATA_MAX_STALE,
    DEFAULT_METADATA_REFRESH_COOLDOWN, DEFAULT_METADATA_REFRESH_INTERVAL, DEFAULT_SCHEME_NAME,
    DEFAULT_TENANT_HEADER,
};
use crate::{Error, Result};

/// Where the tenant identifier is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantIdentifierSource {
    #[default]
    Header,
    PathSegment,
    Subdomain,
}

impl TenantIdentifierSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::PathSegment => "path_segment",
            Self::Subdomain => "subdomain",
        }
    }
}

impl fmt::Display for TenantIdentifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantIdentifierSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_token(s).as_str() {
            "header" => Ok(Self::Header),
            "path" | "pathsegment" => Ok(Self::PathSegment),
            "subdomain" | "host" => Ok(Self::Subdomain),
            _ => Err(Error::config(format!(
                "unknown tenant identifier source '{s}' (expected header, path_segment or subdomain)"
            ))),
        }
    }
}

/// What happens when the resolver has no tenant for the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantNotFoundPolicy {
    #[default]
    Reject,
    RejectWithLogging,
    Fallback,
}

impl TenantNotFoundPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::RejectWithLogging => "reject_with_logging",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for TenantNotFoundPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantNotFoundPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_token(s).as_str() {
            "reject" => Ok(Self::Reject),
            "rejectwithlogging" => Ok(Self::RejectWithLogging),
            "fallback" => Ok(Self::Fallback),
            _ => Err(Error::config(format!(
                "unknown tenant-not-found policy '{s}' (expected reject, reject_with_logging or fallback)"
            ))),
        }
    }
}

fn normalize_token(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Options of one configured authentication scheme instance.
///
/// Built through [`AuthenticationConfigBuilder`], which validates every value
/// up front. The struct is immutable once built.
#[derive(Debug, Clone)]
pub struct AuthenticationConfig {
    scheme_name: String,
    identifier_source: TenantIdentifierSource,
    header_name: String,
    path_segment_index: usize,
    validate_path: bool,
    path_validation_segment_index: usize,
    metadata_refresh_interval: Duration,
    metadata_refresh_cooldown: Duration,
    metadata_max_stale: Duration,
    require_https_metadata: bool,
    not_found_policy: TenantNotFoundPolicy,
    detailed_errors: bool,
    clock_skew: Duration,
    alternate_scheme_headers: Vec<String>,
}

impl AuthenticationConfig {
    #[must_use]
    pub fn builder() -> AuthenticationConfigBuilder {
        AuthenticationConfigBuilder::new()
    }

    #[must_use]
    pub fn scheme_name(&self) -> &str {
        &self.scheme_name
    }

    #[must_use]
    pub const fn identifier_source(&self) -> TenantIdentifierSource {
        self.identifier_source
    }

    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    #[must_use]
    pub const fn path_segment_index(&self) -> usize {
        self.path_segment_index
    }

    #[must_use]
    pub const fn validate_path(&self) -> bool {
        self.validate_path
    }

    #[must_use]
    pub const fn path_validation_segment_index(&self) -> usize {
        self.path_validation_segment_index
    }

    #[must_use]
    pub const fn metadata_refresh_interval(&self) -> Duration {
        self.metadata_refresh_interval
    }

    #[must_use]
    pub const fn metadata_refresh_cooldown(&self) -> Duration {
        self.metadata_refresh_cooldown
    }

    #[must_use]
    pub const fn metadata_max_stale(&self) -> Duration {
        self.metadata_max_stale
    }

    #[must_use]
    pub const fn require_https_metadata(&self) -> bool {
        self.require_https_metadata
    }

    #[must_use]
    pub const fn not_found_policy(&self) -> TenantNotFoundPolicy {
        self.not_found_policy
    }

    #[must_use]
    pub const fn detailed_errors(&self) -> bool {
        self.detailed_errors
    }

    #[must_use]
    pub const fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    #[must_use]
    pub fn alternate_scheme_headers(&self) -> &[String] {
        &self.alternate_scheme_headers
    }
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        AuthenticationConfigBuilder::new().into_config()
    }
}

/// Builder with fluent API; `build()` rejects invalid combinations
#[derive(Debug, Clone)]
pub struct AuthenticationConfigBuilder {
    scheme_name: String,
    identifier_source: TenantIdentifierSource,
    header_name: String,
    path_segment_index: usize,
    validate_path: bool,
    path_validation_segment_index: usize,
    metadata_refresh_interval: Duration,
    metadata_refresh_cooldown: Duration,
    metadata_max_stale: Duration,
    require_https_metadata: bool,
    not_found_policy: TenantNotFoundPolicy,
    detailed_errors: bool,
    clock_skew: Duration,
    alternate_scheme_headers: Vec<String>,
}

impl Default for AuthenticationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthenticationConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scheme_name: DEFAULT_SCHEME_NAME.to_string(),
            identifier_source: TenantIdentifierSource::Header,
            header_name: DEFAULT_TENANT_HEADER.to_string(),
            path_segment_index: 0,
            validate_path: false,
            path_validation_segment_index: 0,
            metadata_refresh_interval: DEFAULT_METADATA_REFRESH_INTERVAL,
            metadata_refresh_cooldown: DEFAULT_METADATA_REFRESH_COOLDOWN,
            metadata_max_stale: DEFAULT_METADATA_MAX_STALE,
            require_https_metadata: true,
            not_found_policy: TenantNotFoundPolicy::Reject,
            detailed_errors: false,
            clock_skew: DEFAULT_CLOCK_SKEW,
            alternate_scheme_headers: vec![DEFAULT_ALTERNATE_SCHEME_HEADER.to_string()],
        }
    }

    #[must_use]
    pub fn scheme_name(mut self, name: impl Into<String>) -> Self {
        self.scheme_name = name.into();
        self
    }

    #[must_use]
    pub const fn identifier_source(mut self, source: TenantIdentifierSource) -> Self {
        self.identifier_source = source;
        self
    }

    #[must_use]
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    #[must_use]
    pub const fn path_segment_index(mut self, index: usize) -> Self {
        self.path_segment_index = index;
        self
    }

    #[must_use]
    pub const fn validate_path(mut self, enabled: bool) -> Self {
        self.validate_path = enabled;
        self
    }

    /// Path segment compared against the tenant when path validation is on
    #[must_use]
    pub const fn path_validation_segment_index(mut self, index: usize) -> Self {
        self.path_validation_segment_index = index;
        self
    }

    #[must_use]
    pub const fn metadata_refresh_interval(mut self, interval: Duration) -> Self {
        self.metadata_refresh_interval = interval;
        self
    }

    #[must_use]
    pub const fn metadata_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.metadata_refresh_cooldown = cooldown;
        self
    }

    #[must_use]
    pub const fn metadata_max_stale(mut self, max_stale: Duration) -> Self {
        self.metadata_max_stale = max_stale;
        self
    }

    #[must_use]
    pub const fn require_https_metadata(mut self, required: bool) -> Self {
        self.require_https_metadata = required;
        self
    }

    #[must_use]
    pub const fn not_found_policy(mut self, policy: TenantNotFoundPolicy) -> Self {
        self.not_found_policy = policy;
        self
    }

    #[must_use]
    pub const fn detailed_errors(mut self, enabled: bool) -> Self {
        self.detailed_errors = enabled;
        self
    }

    #[must_use]
    pub const fn clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    #[must_use]
    pub fn alternate_scheme_headers(mut self, headers: Vec<String>) -> Self {
        self.alternate_scheme_headers = headers;
        self
    }

    /// Validate and freeze the options
    pub fn build(self) -> Result<AuthenticationConfig> {
        if self.scheme_name.trim().is_empty() {
            return Err(Error::config("scheme name must not be empty"));
        }

        // The name is the challenge realm, a quoted header parameter
        if self.scheme_name.contains('"')
            || axum::http::HeaderValue::from_str(&self.scheme_name).is_err()
        {
            return Err(Error::config(format!(
                "scheme name '{}' cannot be used as a challenge realm",
                self.scheme_name.escape_default()
            )));
        }

        if self.identifier_source == TenantIdentifierSource::Header {
            axum::http::HeaderName::from_bytes(self.header_name.as_bytes()).map_err(|e| {
                Error::config(format!("invalid tenant header name '{}': {e}", self.header_name))
            })?;
        }

        for name in &self.alternate_scheme_headers {
            axum::http::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::config(format!("invalid alternate scheme header '{name}': {e}"))
            })?;
        }

        if self.metadata_refresh_interval.is_zero() {
            return Err(Error::config(
                "metadata cache duration must be greater than zero",
            ));
        }

        if self.metadata_refresh_cooldown.is_zero() {
            return Err(Error::config(
                "metadata refresh cooldown must be greater than zero",
            ));
        }

        Ok(self.into_config())
    }

    fn into_config(self) -> AuthenticationConfig {
        AuthenticationConfig {
            scheme_name: self.scheme_name,
            identifier_source: self.identifier_source,
            header_name: self.header_name,
            path_segment_index: self.path_segment_index,
            validate_path: self.validate_path,
            path_validation_segment_index: self.path_validation_segment_index,
            metadata_refresh_interval: self.metadata_refresh_interval,
            metadata_refresh_cooldown: self.metadata_refresh_cooldown,
            metadata_max_stale: self.metadata_max_stale,
            require_https_metadata: self.require_https_metadata,
            not_found_policy: self.not_found_policy,
            detailed_errors: self.detailed_errors,
            clock_skew: self.clock_skew,
            alternate_scheme_headers: self.alternate_scheme_headers,
        }
    }
}

/// Convert a signed index from text or TOML, rejecting negatives
pub fn segment_index(value: i64, field: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::config(format!("{field} must be zero or greater, got {value}")))
}
