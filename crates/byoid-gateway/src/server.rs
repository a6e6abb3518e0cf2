//! HTTP surface of the gateway

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::Path;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::{Router, middleware};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthRejection, AuthState, RequireIdentity, tenant_auth_middleware};
use crate::config::ServerConfig;
use crate::{Error, Result};

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the application router with authentication applied to every route
pub fn router(state: AuthState, config: &ServerConfig) -> Router {
    #[allow(unused_mut)]
    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/me", get(me_handler))
        .route("/api/tenants/{tenant}/me", get(tenant_me_handler));

    #[cfg(feature = "metrics")]
    {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.layer(middleware::from_fn_with_state(state, tenant_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(build_cors_layer(&config.cors_origins))
}

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    app: Router,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = SocketAddr::new(config.host, config.port);

    if !config.host.is_loopback() {
        tracing::warn!(%addr, "Binding to a non-loopback address");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Transport(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn me_handler(RequireIdentity(identity): RequireIdentity) -> impl IntoResponse {
    Json(identity)
}

async fn tenant_me_handler(
    Path(tenant): Path<String>,
    identity: RequireIdentity,
) -> std::result::Result<impl IntoResponse, AuthRejection> {
    identity.ensure_tenant(&tenant)?;
    Ok(Json(identity.0))
}

#[cfg(feature = "metrics")]
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        crate::observability::render_metrics(),
    )
}
