//! Axum integration: authentication middleware and identity extractor

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

use super::authenticator::{AuthenticationOutcome, TenantAuthenticator};
use super::claims::AuthenticatedIdentity;
use super::classifier::has_conflicting_indicators;
use crate::constants::{DEFAULT_SCHEME_NAME, GENERIC_FAILURE_MESSAGE};

/// Authentication state for middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    pub authenticator: Arc<TenantAuthenticator>,
}

impl AuthState {
    #[must_use]
    pub const fn new(authenticator: Arc<TenantAuthenticator>) -> Self {
        Self { authenticator }
    }
}

/// Challenge settings left in request extensions for downstream extractors
#[derive(Debug, Clone)]
struct ChallengeRealm(Arc<str>);

/// Run tenant authentication for every request.
///
/// `NoMatch` continues without an identity; handlers that need one use
/// [`RequireIdentity`]. The authentication work is cancelled if the request
/// is dropped before it completes.
pub async fn tenant_auth_middleware(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let config = state.authenticator.config();
    let realm: Arc<str> = Arc::from(config.scheme_name());
    let (mut parts, body) = request.into_parts();

    if has_conflicting_indicators(&parts, config, config.alternate_scheme_headers()) {
        tracing::debug!("Request carries indicators for more than one scheme");
        let message = if config.detailed_errors() {
            "conflicting authentication indicators"
        } else {
            GENERIC_FAILURE_MESSAGE
        };
        return AuthRejection::unauthorized(&realm, message).into_response();
    }

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let outcome = state.authenticator.authenticate(&mut parts, &cancel).await;
    guard.disarm();

    match outcome {
        AuthenticationOutcome::NoMatch => {
            parts.extensions.insert(ChallengeRealm(realm));
            next.run(Request::from_parts(parts, body)).await
        }
        AuthenticationOutcome::Fail(err) => {
            let message = err.public_message(config.detailed_errors());
            AuthRejection::unauthorized(&realm, &message).into_response()
        }
        AuthenticationOutcome::Success(identity) => {
            parts.extensions.insert(ChallengeRealm(realm));
            parts.extensions.insert(*identity);
            next.run(Request::from_parts(parts, body)).await
        }
    }
}

/// Rejection produced at the HTTP boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    Unauthorized { realm: String, message: String },
    Forbidden,
}

impl AuthRejection {
    #[must_use]
    pub fn unauthorized(realm: &str, message: &str) -> Self {
        Self::Unauthorized {
            realm: realm.to_string(),
            message: message.to_string(),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized { realm, message } => {
                let challenge = format!(
                    "Bearer realm=\"{}\", error=\"invalid_token\"",
                    realm.replace('"', "")
                );
                let body = Json(serde_json::json!({
                    "error": "invalid_token",
                    "error_description": message,
                }));
                let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
                if let Ok(value) = HeaderValue::from_str(&challenge) {
                    response
                        .headers_mut()
                        .insert(header::WWW_AUTHENTICATE, value);
                }
                response
            }
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

/// Extractor for handlers that require an authenticated identity
#[derive(Debug, Clone)]
pub struct RequireIdentity(pub AuthenticatedIdentity);

impl RequireIdentity {
    /// Forbid access when the identity belongs to another tenant
    pub fn ensure_tenant(&self, slug: &str) -> Result<(), AuthRejection> {
        if self.0.tenant_slug.eq_ignore_ascii_case(slug) {
            Ok(())
        } else {
            tracing::debug!(
                tenant = %self.0.tenant_slug,
                requested = slug,
                "Identity used against another tenant"
            );
            Err(AuthRejection::Forbidden)
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequireIdentity {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<AuthenticatedIdentity>() {
            return Ok(Self(identity.clone()));
        }
        let realm = parts
            .extensions
            .get::<ChallengeRealm>()
            .map_or(DEFAULT_SCHEME_NAME, |r| r.0.as_ref());
        Err(AuthRejection::unauthorized(realm, GENERIC_FAILURE_MESSAGE))
    }
}
