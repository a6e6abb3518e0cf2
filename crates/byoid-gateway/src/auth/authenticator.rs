//! Tenant bearer-token authentication pipeline
//!
//! Steps run strictly in order: tenant and credential extraction, fail-fast
//! checks that need no tenant, tenant resolution, tenant policy checks, then
//! cryptographic validation and claim normalization. Any step can end the
//! attempt.

use std::sync::Arc;

use axum::http::request::Parts;
use tokio_util::sync::CancellationToken;

use super::claims::{AuthenticatedIdentity, ClaimNormalizer, ClaimSet};
use super::error::{AuthError, FaultKind, MetadataError, ResolveError};
use super::extractor::{extract_bearer_token, extract_from_path, extract_tenant_identifier};
use super::jwt::{Claims, JwtValidator};
use super::metadata::MetadataCache;
use super::options::{AuthenticationConfig, TenantNotFoundPolicy};
use super::tenant::{ResolutionContext, TenantConfig, TenantContext, TenantResolver};
use super::token::UnverifiedToken;
use crate::constants::{ACCESS_TOKEN_TYPE, ID_TOKEN_TYPE};

/// Terminal result of one authentication attempt
#[derive(Debug)]
pub enum AuthenticationOutcome {
    /// This scheme does not claim the request
    NoMatch,
    Fail(AuthError),
    Success(Box<AuthenticatedIdentity>),
}

impl AuthenticationOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::Fail(_) => "fail",
            Self::Success(_) => "success",
        }
    }
}

/// Per-scheme orchestrator; cheap to share behind an `Arc`
pub struct TenantAuthenticator {
    config: AuthenticationConfig,
    resolver: Arc<dyn TenantResolver>,
    metadata: Arc<MetadataCache>,
    normalizer: Arc<dyn ClaimNormalizer>,
    validator: JwtValidator,
}

impl std::fmt::Debug for TenantAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantAuthenticator")
            .field("scheme", &self.config.scheme_name())
            .field("identifier_source", &self.config.identifier_source())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl TenantAuthenticator {
    #[must_use]
    pub fn new(
        config: AuthenticationConfig,
        resolver: Arc<dyn TenantResolver>,
        metadata: Arc<MetadataCache>,
        normalizer: Arc<dyn ClaimNormalizer>,
    ) -> Self {
        let validator = JwtValidator::new(config.clock_skew());
        Self {
            config,
            resolver,
            metadata,
            normalizer,
            validator,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthenticationConfig {
        &self.config
    }

    #[must_use]
    pub const fn metadata_cache(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    /// Run the pipeline for one request.
    ///
    /// On success the [`TenantContext`] is inserted into `parts.extensions`.
    /// Cancellation never yields `Success`.
    pub async fn authenticate(
        &self,
        parts: &mut Parts,
        cancel: &CancellationToken,
    ) -> AuthenticationOutcome {
        let outcome = match self.run(parts, cancel).await {
            Ok(Some((identity, tenant_context))) if !cancel.is_cancelled() => {
                parts.extensions.insert(tenant_context);
                AuthenticationOutcome::Success(Box::new(identity))
            }
            Ok(Some(_)) => AuthenticationOutcome::Fail(AuthError::Cancelled),
            Ok(None) => AuthenticationOutcome::NoMatch,
            Err(err) => {
                self.log_failure(&err);
                AuthenticationOutcome::Fail(err)
            }
        };
        record_outcome(&outcome);
        outcome
    }

    async fn run(
        &self,
        parts: &Parts,
        cancel: &CancellationToken,
    ) -> Result<Option<(AuthenticatedIdentity, TenantContext)>, AuthError> {
        let Some(identifier) = extract_tenant_identifier(parts, &self.config) else {
            tracing::trace!("No tenant identifier, scheme does not apply");
            return Ok(None);
        };

        let token = extract_bearer_token(parts).ok_or(AuthError::MissingBearerToken)?;

        // The path must name the same tenant
        if self.config.validate_path() {
            let from_path =
                extract_from_path(parts.uri.path(), self.config.path_validation_segment_index());
            if !from_path.is_some_and(|p| p.eq_ignore_ascii_case(&identifier)) {
                return Err(AuthError::TenantMismatch);
            }
        }

        let unverified = UnverifiedToken::parse(&token);

        // Identity tokens are never accepted, whatever the tenant allows
        let token_type = unverified
            .token_type
            .as_deref()
            .ok_or(AuthError::MissingTokenType)?;
        if token_type.eq_ignore_ascii_case(ID_TOKEN_TYPE) {
            return Err(AuthError::IdentityTokenRejected);
        }

        let context = ResolutionContext {
            tenant_identifier: Some(identifier.clone()),
            issuer: unverified.issuer.clone(),
            audience: unverified.audience.clone(),
            raw_token: Some(token.clone()),
        };
        let resolved = self
            .resolver
            .resolve(&context, cancel)
            .await
            .map_err(|e| match e {
                ResolveError::Cancelled => AuthError::Cancelled,
                ResolveError::Unavailable(reason) => {
                    tracing::error!(tenant = %identifier, reason = %reason, "Tenant resolver failed");
                    AuthError::ResolutionFailed
                }
            })?;

        let Some(tenant) = resolved else {
            return match self.config.not_found_policy() {
                TenantNotFoundPolicy::Reject => Err(AuthError::TenantNotFound),
                TenantNotFoundPolicy::RejectWithLogging => {
                    tracing::warn!(tenant = %identifier, "Unknown tenant rejected");
                    Err(AuthError::UnknownTenant(identifier))
                }
                TenantNotFoundPolicy::Fallback => {
                    tracing::debug!(tenant = %identifier, "Unknown tenant, deferring to other schemes");
                    Ok(None)
                }
            };
        };

        if !tenant.enabled {
            return Err(AuthError::TenantDisabled);
        }

        if tenant.require_access_token_type && !token_type.eq_ignore_ascii_case(ACCESS_TOKEN_TYPE)
        {
            return Err(AuthError::AccessTokenRequired);
        }

        if tenant.restricts_clients() {
            let client_id = unverified
                .client_id
                .as_deref()
                .ok_or(AuthError::MissingClientId)?;
            if !tenant.is_client_authorized(client_id) {
                return Err(AuthError::ClientNotAuthorized(client_id.to_string()));
            }
        }

        let claims = self.validate(&token, &tenant, cancel).await?;

        let claims = ClaimSet::from_json(&claims).remap(&tenant.claim_mappings);
        let identity = AuthenticatedIdentity::new(
            claims,
            &tenant.slug,
            self.config.scheme_name(),
            self.normalizer.as_ref(),
        );

        tracing::debug!(
            tenant = %tenant.slug,
            subject = ?identity.subject,
            provider = %identity.provider_type,
            "Authenticated"
        );

        Ok(Some((
            identity,
            TenantContext {
                identifier,
                tenant: Arc::new(tenant),
            },
        )))
    }

    async fn validate(
        &self,
        token: &str,
        tenant: &TenantConfig,
        cancel: &CancellationToken,
    ) -> Result<Claims, AuthError> {
        let require_https = self.config.require_https_metadata();
        let mut metadata = self
            .metadata
            .get_configuration(&tenant.metadata_address, require_https, cancel)
            .await
            .map_err(|e| metadata_failure(&tenant.slug, &e))?;

        // Key rotation: one forced refresh when the token names an unknown key
        if JwtValidator::references_unknown_key(token, &metadata) {
            match self
                .metadata
                .refresh_configuration(&tenant.metadata_address, cancel)
                .await
            {
                Ok(true) => {
                    metadata = self
                        .metadata
                        .get_configuration(&tenant.metadata_address, require_https, cancel)
                        .await
                        .map_err(|e| metadata_failure(&tenant.slug, &e))?;
                }
                Ok(false) => {}
                Err(MetadataError::Cancelled) => return Err(AuthError::Cancelled),
                Err(e) => {
                    tracing::warn!(tenant = %tenant.slug, error = %e, "Key refresh for unknown kid failed");
                }
            }
        }

        let issuer = tenant
            .issuer_override
            .as_deref()
            .unwrap_or_else(|| metadata.issuer());

        self.validator
            .validate(token, &metadata, issuer, &tenant.valid_audiences)
            .map_err(AuthError::InvalidToken)
    }

    fn log_failure(&self, err: &AuthError) {
        let scheme = self.config.scheme_name();
        match err.kind() {
            FaultKind::Authn => {
                tracing::warn!(scheme, reason = %err.detail(), "Token validation failed");
            }
            FaultKind::Operational => {
                tracing::error!(scheme, reason = %err, "Authentication aborted");
            }
            FaultKind::Client | FaultKind::Policy => {
                tracing::debug!(scheme, kind = %err.kind(), reason = %err, "Authentication rejected");
            }
        }
    }
}

fn metadata_failure(tenant: &str, err: &MetadataError) -> AuthError {
    if *err == MetadataError::Cancelled {
        return AuthError::Cancelled;
    }
    tracing::error!(tenant, error = %err, "Identity-provider configuration unavailable");
    AuthError::MetadataUnavailable
}

#[cfg(feature = "metrics")]
fn record_outcome(outcome: &AuthenticationOutcome) {
    let kind = match outcome {
        AuthenticationOutcome::Fail(err) => err.kind().as_str(),
        _ => "none",
    };
    crate::observability::record_authentication(outcome.as_str(), kind);
}

#[cfg(not(feature = "metrics"))]
const fn record_outcome(_outcome: &AuthenticationOutcome) {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use axum::http::Request;

    use super::*;
    use crate::auth::claims::{IssuerClaimNormalizer, ProviderType};
    use crate::auth::discovery::DiscoveryClient;
    use crate::auth::error::TokenRejection;
    use crate::auth::metadata::CacheSettings;
    use crate::auth::options::TenantIdentifierSource;
    use crate::auth::testing::{
        FakeDiscovery, FakeResolver, ISSUER, RSA_A_N, RSA_A_PEM, RSA_B_N, RSA_B_PEM, access_token,
        now, rsa_jwk, sign, tenant,
    };
    use crate::constants::{AUTH_SCHEME_CLAIM, PROVIDER_TYPE_CLAIM, TENANT_SLUG_CLAIM};

    struct Harness {
        resolver: Arc<FakeResolver>,
        discovery: Arc<FakeDiscovery>,
        authenticator: TenantAuthenticator,
    }

    fn harness(config: AuthenticationConfig, tenant: Option<TenantConfig>) -> Harness {
        let resolver = FakeResolver::returning(tenant);
        let discovery = Arc::new(FakeDiscovery::new(ISSUER));
        let cache = Arc::new(MetadataCache::new(
            Arc::clone(&discovery) as Arc<dyn DiscoveryClient>,
            CacheSettings::from(&config),
        ));
        let authenticator = TenantAuthenticator::new(
            config,
            Arc::clone(&resolver) as Arc<dyn TenantResolver>,
            cache,
            Arc::new(IssuerClaimNormalizer),
        );
        Harness {
            resolver,
            discovery,
            authenticator,
        }
    }

    fn default_harness() -> Harness {
        harness(AuthenticationConfig::default(), Some(tenant("acme")))
    }

    fn request(path: &str, tenant: Option<&str>, token: Option<&str>) -> Parts {
        let mut builder = Request::get(path);
        if let Some(tenant) = tenant {
            builder = builder.header("X-Tenant-Slug", tenant);
        }
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    async fn run(h: &Harness, parts: &mut Parts) -> AuthenticationOutcome {
        h.authenticator
            .authenticate(parts, &CancellationToken::new())
            .await
    }

    fn expect_fail(outcome: AuthenticationOutcome) -> AuthError {
        match outcome {
            AuthenticationOutcome::Fail(err) => err,
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    fn expect_success(outcome: AuthenticationOutcome) -> AuthenticatedIdentity {
        match outcome {
            AuthenticationOutcome::Success(identity) => *identity,
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_round_trip_success() {
        let h = default_harness();
        let token = access_token(&serde_json::json!({"roles": ["admin", "reader"]}));
        let mut parts = request("/todos", Some("acme"), Some(&token));

        let identity = expect_success(run(&h, &mut parts).await);

        assert_eq!(identity.subject.as_deref(), Some("user-1"));
        assert_eq!(identity.tenant_slug, "acme");
        assert_eq!(identity.claim(TENANT_SLUG_CLAIM), Some("acme"));
        assert_eq!(identity.claim(AUTH_SCHEME_CLAIM), Some("TenantBearer"));
        assert_eq!(identity.claim(PROVIDER_TYPE_CLAIM), Some("unknown"));
        assert_eq!(identity.provider_type, ProviderType::Unknown);
        assert_eq!(identity.claims.values("roles").count(), 2);

        let context = parts.extensions.get::<TenantContext>().unwrap();
        assert_eq!(context.identifier, "acme");
        assert_eq!(context.tenant.slug, "acme");
    }

    #[tokio::test]
    async fn test_no_identifier_is_no_match_regardless_of_token() {
        let h = default_harness();
        let token = access_token(&serde_json::json!({}));

        for token in [Some(token.as_str()), None] {
            let mut parts = request("/todos", None, token);
            assert!(matches!(run(&h, &mut parts).await, AuthenticationOutcome::NoMatch));
        }
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_bearer_token() {
        let h = default_harness();
        let mut parts = request("/todos", Some("acme"), None);
        assert_eq!(
            expect_fail(run(&h, &mut parts).await),
            AuthError::MissingBearerToken
        );
    }

    #[tokio::test]
    async fn test_path_validation_mismatch() {
        let config = AuthenticationConfig::builder()
            .validate_path(true)
            .build()
            .unwrap();
        let h = harness(config, Some(tenant("acme")));
        let token = access_token(&serde_json::json!({}));

        let mut parts = request("/contoso/todos", Some("acme"), Some(&token));
        let err = expect_fail(run(&h, &mut parts).await);
        assert_eq!(err, AuthError::TenantMismatch);
        assert_eq!(err.to_string(), "tenant identifier mismatch");
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);

        let mut parts = request("/ACME/todos", Some("acme"), Some(&token));
        expect_success(run(&h, &mut parts).await);
    }

    #[tokio::test]
    async fn test_missing_typ_rejected_before_resolution() {
        let h = default_harness();
        let token = sign(
            &serde_json::json!({"iss": ISSUER, "aud": "api://todos", "exp": now() + 600}),
            RSA_A_PEM,
            Some("key-a"),
            None,
        );
        let mut parts = request("/", Some("acme"), Some(&token));
        assert_eq!(expect_fail(run(&h, &mut parts).await), AuthError::MissingTokenType);
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_id_token_always_rejected() {
        // The tenant does not require access-token typing
        let h = default_harness();
        for typ in ["id_token", "ID_TOKEN"] {
            let token = sign(
                &serde_json::json!({"iss": ISSUER, "aud": "api://todos", "exp": now() + 600}),
                RSA_A_PEM,
                Some("key-a"),
                Some(typ),
            );
            let mut parts = request("/", Some("acme"), Some(&token));
            assert_eq!(
                expect_fail(run(&h, &mut parts).await),
                AuthError::IdentityTokenRejected
            );
        }
    }

    #[tokio::test]
    async fn test_resolver_receives_token_facts() {
        let h = default_harness();
        let token = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&token));
        expect_success(run(&h, &mut parts).await);

        let context = h.resolver.last_context.lock().clone().unwrap();
        assert_eq!(context.tenant_identifier.as_deref(), Some("acme"));
        assert_eq!(context.issuer.as_deref(), Some(ISSUER));
        assert_eq!(context.audience.as_deref(), Some("api://todos"));
        assert_eq!(context.raw_token.as_deref(), Some(token.as_str()));
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolver_fault_is_operational() {
        let h = default_harness();
        h.resolver.fail.store(true, Ordering::SeqCst);
        let token = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&token));

        let err = expect_fail(run(&h, &mut parts).await);
        assert_eq!(err, AuthError::ResolutionFailed);
        assert_eq!(err.kind(), FaultKind::Operational);
    }

    #[tokio::test]
    async fn test_not_found_policies() {
        let token = access_token(&serde_json::json!({}));

        let h = harness(AuthenticationConfig::default(), None);
        let mut parts = request("/", Some("contoso"), Some(&token));
        assert_eq!(expect_fail(run(&h, &mut parts).await), AuthError::TenantNotFound);

        let config = AuthenticationConfig::builder()
            .not_found_policy(TenantNotFoundPolicy::RejectWithLogging)
            .build()
            .unwrap();
        let h = harness(config, None);
        let mut parts = request("/", Some("contoso"), Some(&token));
        assert_eq!(
            expect_fail(run(&h, &mut parts).await),
            AuthError::UnknownTenant("contoso".to_string())
        );

        let config = AuthenticationConfig::builder()
            .not_found_policy(TenantNotFoundPolicy::Fallback)
            .build()
            .unwrap();
        let h = harness(config, None);
        let mut parts = request("/", Some("contoso"), Some(&token));
        assert!(matches!(run(&h, &mut parts).await, AuthenticationOutcome::NoMatch));
        assert!(parts.extensions.get::<TenantContext>().is_none());
    }

    #[tokio::test]
    async fn test_disabled_tenant() {
        let mut t = tenant("acme");
        t.enabled = false;
        let h = harness(AuthenticationConfig::default(), Some(t));
        let token = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&token));

        assert_eq!(expect_fail(run(&h, &mut parts).await), AuthError::TenantDisabled);
        assert_eq!(h.discovery.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_access_token_typing_required() {
        let mut t = tenant("acme");
        t.require_access_token_type = true;
        let h = harness(AuthenticationConfig::default(), Some(t));

        let jwt = sign(
            &serde_json::json!({"iss": ISSUER, "aud": "api://todos", "exp": now() + 600}),
            RSA_A_PEM,
            Some("key-a"),
            Some("JWT"),
        );
        let mut parts = request("/", Some("acme"), Some(&jwt));
        assert_eq!(
            expect_fail(run(&h, &mut parts).await),
            AuthError::AccessTokenRequired
        );

        let at = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&at));
        expect_success(run(&h, &mut parts).await);
    }

    #[tokio::test]
    async fn test_client_allow_list() {
        let mut t = tenant("acme");
        t.authorized_client_ids = Some(vec!["Web-App".to_string()]);
        let h = harness(AuthenticationConfig::default(), Some(t));

        let token = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&token));
        assert_eq!(expect_fail(run(&h, &mut parts).await), AuthError::MissingClientId);

        let token = access_token(&serde_json::json!({"azp": "mobile"}));
        let mut parts = request("/", Some("acme"), Some(&token));
        assert_eq!(
            expect_fail(run(&h, &mut parts).await),
            AuthError::ClientNotAuthorized("mobile".to_string())
        );

        let token = access_token(&serde_json::json!({"azp": "web-app"}));
        let mut parts = request("/", Some("acme"), Some(&token));
        expect_success(run(&h, &mut parts).await);

        let token = access_token(&serde_json::json!({"client_id": "WEB-APP"}));
        let mut parts = request("/", Some("acme"), Some(&token));
        expect_success(run(&h, &mut parts).await);
    }

    #[tokio::test]
    async fn test_azp_wins_over_client_id() {
        let mut t = tenant("acme");
        t.authorized_client_ids = Some(vec!["web-app".to_string()]);
        let h = harness(AuthenticationConfig::default(), Some(t));

        let token = access_token(&serde_json::json!({"azp": "mobile", "client_id": "web-app"}));
        let mut parts = request("/", Some("acme"), Some(&token));
        assert_eq!(
            expect_fail(run(&h, &mut parts).await),
            AuthError::ClientNotAuthorized("mobile".to_string())
        );
    }

    #[tokio::test]
    async fn test_metadata_failure_is_operational() {
        let h = default_harness();
        h.discovery.fail.store(true, Ordering::SeqCst);
        let token = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&token));

        let err = expect_fail(run(&h, &mut parts).await);
        assert_eq!(err, AuthError::MetadataUnavailable);
        assert_eq!(err.kind(), FaultKind::Operational);
    }

    #[tokio::test]
    async fn test_issuer_override_replaces_discovery_issuer() {
        let mut t = tenant("acme");
        t.issuer_override = Some("https://override.acme.test".to_string());
        let h = harness(AuthenticationConfig::default(), Some(t));

        let token = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&token));
        assert_eq!(
            expect_fail(run(&h, &mut parts).await),
            AuthError::InvalidToken(TokenRejection::InvalidIssuer)
        );

        let token = access_token(&serde_json::json!({"iss": "https://override.acme.test"}));
        let mut parts = request("/", Some("acme"), Some(&token));
        expect_success(run(&h, &mut parts).await);
    }

    #[tokio::test]
    async fn test_audience_outside_tenant_list_fails() {
        let h = default_harness();
        let token = access_token(&serde_json::json!({"aud": "api://billing"}));
        let mut parts = request("/", Some("acme"), Some(&token));
        let err = expect_fail(run(&h, &mut parts).await);
        assert_eq!(err.kind(), FaultKind::Authn);
        assert_eq!(err.to_string(), "invalid token");
    }

    #[tokio::test]
    async fn test_claim_mappings_applied() {
        let mut t = tenant("acme");
        t.claim_mappings
            .insert("roles".to_string(), "role".to_string());
        let h = harness(AuthenticationConfig::default(), Some(t));

        let token = access_token(&serde_json::json!({"roles": ["admin"]}));
        let mut parts = request("/", Some("acme"), Some(&token));
        let identity = expect_success(run(&h, &mut parts).await);
        assert_eq!(identity.claim("role"), Some("admin"));
        assert_eq!(identity.claim("roles"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_kid_triggers_single_refresh() {
        let h = default_harness();
        let first = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&first));
        expect_success(run(&h, &mut parts).await);

        // Provider rotates to key B
        h.discovery
            .set_keys(vec![rsa_jwk("key-a", RSA_A_N), rsa_jwk("key-b", RSA_B_N)]);
        tokio::time::advance(Duration::from_secs(301)).await;

        let rotated = sign(
            &serde_json::json!({"iss": ISSUER, "aud": "api://todos", "sub": "user-2", "exp": now() + 600}),
            RSA_B_PEM,
            Some("key-b"),
            Some("at+jwt"),
        );
        let mut parts = request("/", Some("acme"), Some(&rotated));
        let identity = expect_success(run(&h, &mut parts).await);
        assert_eq!(identity.subject.as_deref(), Some("user-2"));
        assert_eq!(h.discovery.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_request_never_succeeds() {
        let h = default_harness();
        let token = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&token));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = h.authenticator.authenticate(&mut parts, &cancel).await;
        assert_eq!(expect_fail(outcome), AuthError::Cancelled);
        assert!(parts.extensions.get::<TenantContext>().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_metadata_fetch() {
        let config = AuthenticationConfig::default();
        let discovery = Arc::new(FakeDiscovery::new(ISSUER).with_delay(Duration::from_secs(10)));
        let cache = Arc::new(MetadataCache::new(
            Arc::clone(&discovery) as Arc<dyn DiscoveryClient>,
            CacheSettings::from(&config),
        ));
        let authenticator = TenantAuthenticator::new(
            config,
            FakeResolver::returning(Some(tenant("acme"))) as Arc<dyn TenantResolver>,
            cache,
            Arc::new(IssuerClaimNormalizer),
        );
        let token = access_token(&serde_json::json!({}));
        let mut parts = request("/", Some("acme"), Some(&token));
        let cancel = CancellationToken::new();

        let (outcome, ()) = tokio::join!(authenticator.authenticate(&mut parts, &cancel), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        assert_eq!(expect_fail(outcome), AuthError::Cancelled);
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 1);
        assert!(parts.extensions.get::<TenantContext>().is_none());
    }

    #[tokio::test]
    async fn test_token_cannot_override_gateway_claims() {
        let h = default_harness();
        let token = access_token(&serde_json::json!({
            "tenant_slug": "contoso",
            "auth_scheme": "Admin",
            "provider_type": "entra_id",
        }));
        let mut parts = request("/", Some("acme"), Some(&token));

        let identity = expect_success(run(&h, &mut parts).await);
        assert_eq!(identity.claims.values(TENANT_SLUG_CLAIM).collect::<Vec<_>>(), ["acme"]);
        assert_eq!(
            identity.claims.values(AUTH_SCHEME_CLAIM).collect::<Vec<_>>(),
            ["TenantBearer"]
        );
        assert_eq!(identity.claim(PROVIDER_TYPE_CLAIM), Some("unknown"));
    }

    #[tokio::test]
    async fn test_claim_mapping_cannot_target_gateway_claims() {
        let mut t = tenant("acme");
        t.claim_mappings
            .insert("org".to_string(), TENANT_SLUG_CLAIM.to_string());
        let h = harness(AuthenticationConfig::default(), Some(t));

        let token = access_token(&serde_json::json!({"org": "contoso"}));
        let mut parts = request("/", Some("acme"), Some(&token));
        let identity = expect_success(run(&h, &mut parts).await);
        assert_eq!(identity.claims.values(TENANT_SLUG_CLAIM).collect::<Vec<_>>(), ["acme"]);
    }

    #[tokio::test]
    async fn test_subdomain_source() {
        let config = AuthenticationConfig::builder()
            .identifier_source(TenantIdentifierSource::Subdomain)
            .build()
            .unwrap();
        let h = harness(config, Some(tenant("acme")));
        let token = access_token(&serde_json::json!({}));
        let mut parts = Request::get("/todos")
            .header("Host", "www.acme.example.com")
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts()
            .0;

        expect_success(run(&h, &mut parts).await);
        let context = h.resolver.last_context.lock().clone().unwrap();
        assert_eq!(context.tenant_identifier.as_deref(), Some("acme"));
    }
}
