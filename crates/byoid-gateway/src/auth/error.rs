//! Authentication error types

use std::fmt;

use thiserror::Error;

use crate::constants::GENERIC_FAILURE_MESSAGE;

/// Failure category, decides logging level and caller exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Malformed or missing credential, mismatched tenant, disallowed token type or client
    Client,
    /// Signature, issuer, audience or expiry failure
    Authn,
    /// Tenant disabled or unknown
    Policy,
    /// Resolver or metadata backend failure
    Operational,
}

impl FaultKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Authn => "authn",
            Self::Policy => "policy",
            Self::Operational => "operational",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the cryptographic validation rejected a token
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("token is malformed")]
    Malformed,

    #[error("token is not signed with a supported algorithm")]
    UnsupportedAlgorithm,

    #[error("token expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid audience")]
    InvalidAudience,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("signing key not found: {0}")]
    KeyNotFound(String),

    #[error("no signing key matches algorithm")]
    NoMatchingKey,

    #[error("missing required claim: {0}")]
    MissingClaim(String),
}

impl From<jsonwebtoken::errors::Error> for TokenRejection {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidAudience => Self::InvalidAudience,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::UnsupportedAlgorithm
            }
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::Malformed,
        }
    }
}

/// Terminal failure of one authentication attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or invalid authorization header")]
    MissingBearerToken,

    #[error("tenant identifier mismatch")]
    TenantMismatch,

    #[error("token type header is missing")]
    MissingTokenType,

    #[error("identity tokens are not accepted as access tokens")]
    IdentityTokenRejected,

    #[error("token must be an access token")]
    AccessTokenRequired,

    #[error("token does not identify a client application")]
    MissingClientId,

    #[error("client '{0}' is not authorized for this tenant")]
    ClientNotAuthorized(String),

    #[error("tenant not found")]
    TenantNotFound,

    #[error("tenant '{0}' not found")]
    UnknownTenant(String),

    #[error("tenant disabled")]
    TenantDisabled,

    #[error("tenant resolution failed")]
    ResolutionFailed,

    #[error("failed to retrieve identity-provider configuration")]
    MetadataUnavailable,

    #[error("invalid token")]
    InvalidToken(#[source] TokenRejection),

    #[error("authentication cancelled")]
    Cancelled,
}

impl AuthError {
    #[must_use]
    pub const fn kind(&self) -> FaultKind {
        match self {
            Self::MissingBearerToken
            | Self::TenantMismatch
            | Self::MissingTokenType
            | Self::IdentityTokenRejected
            | Self::AccessTokenRequired
            | Self::MissingClientId
            | Self::ClientNotAuthorized(_) => FaultKind::Client,
            Self::InvalidToken(_) => FaultKind::Authn,
            Self::TenantNotFound | Self::UnknownTenant(_) | Self::TenantDisabled => {
                FaultKind::Policy
            }
            Self::ResolutionFailed | Self::MetadataUnavailable | Self::Cancelled => {
                FaultKind::Operational
            }
        }
    }

    /// Full internal detail, including the cryptographic cause
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidToken(cause) => format!("{self}: {cause}"),
            _ => self.to_string(),
        }
    }

    /// Message a caller may see, gated by the detailed-errors option
    #[must_use]
    pub fn public_message(&self, detailed_errors: bool) -> String {
        if detailed_errors {
            self.detail()
        } else {
            GENERIC_FAILURE_MESSAGE.to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// Discovery document or signing-key retrieval failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("invalid metadata address '{0}'")]
    InvalidAddress(String),

    #[error("HTTPS is required for metadata address '{0}'")]
    InsecureAddress(String),

    #[error("request to '{url}' failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("invalid document from '{url}': {reason}")]
    Parse { url: String, reason: String },

    #[error("key set contains no usable signing keys")]
    NoSigningKeys,

    #[error("metadata retrieval cancelled")]
    Cancelled,
}

/// Tenant resolver failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("tenant store unavailable: {0}")]
    Unavailable(String),

    #[error("tenant resolution cancelled")]
    Cancelled,
}
