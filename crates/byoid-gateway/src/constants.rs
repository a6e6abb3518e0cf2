//! Constants shared across the gateway

use std::time::Duration;

/// Default header carrying the tenant identifier
pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-Slug";

/// Default authentication scheme name (used in the challenge realm and the scheme claim)
pub const DEFAULT_SCHEME_NAME: &str = "TenantBearer";

/// Default header that marks a request for the API-key scheme
pub const DEFAULT_ALTERNATE_SCHEME_HEADER: &str = "X-API-Key";

/// Message returned to callers when detailed errors are disabled
pub const GENERIC_FAILURE_MESSAGE: &str = "authentication failed";

/// Default interval after which cached discovery metadata is refreshed
pub const DEFAULT_METADATA_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Minimum time between two refresh attempts for the same metadata address
pub const DEFAULT_METADATA_REFRESH_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// How long a stale entry may still be served after refreshes keep failing
pub const DEFAULT_METADATA_MAX_STALE: Duration = Duration::from_secs(24 * 60 * 60);

/// Timeout for a single discovery or JWKS request
pub const DISCOVERY_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default clock skew tolerance for `exp` validation
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(5 * 60);

/// Claim appended with the resolved tenant slug
pub const TENANT_SLUG_CLAIM: &str = "tenant_slug";

/// Claim appended with the authentication scheme name
pub const AUTH_SCHEME_CLAIM: &str = "auth_scheme";

/// Claim appended with the identity-provider classification
pub const PROVIDER_TYPE_CLAIM: &str = "provider_type";

/// RFC 9068 access token type
pub const ACCESS_TOKEN_TYPE: &str = "at+jwt";

/// Token type that marks an OIDC identity token
pub const ID_TOKEN_TYPE: &str = "id_token";
