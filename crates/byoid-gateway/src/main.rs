use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use byoid_gateway::auth::{
    AuthState, CacheSettings, HttpDiscoveryClient, IssuerClaimNormalizer, MetadataCache,
    MetadataRefreshTask, StaticTenantResolver, TenantAuthenticator, TenantIdentifierSource,
};
use byoid_gateway::config;
use byoid_gateway::observability::{init_observability, shutdown_observability};
use byoid_gateway::server;
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "byoid-gateway")]
#[command(about = "Multi-tenant bearer-token authentication gateway", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "BYOID_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP bind host
    #[arg(long)]
    host: Option<IpAddr>,

    /// HTTP bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Tenant identifier source (header, path_segment, subdomain)
    #[arg(long)]
    tenant_source: Option<TenantIdentifierSource>,

    /// Expose failure reasons to callers
    #[arg(long)]
    detailed_errors: bool,

    /// Allow plain-HTTP metadata addresses
    #[arg(long)]
    allow_insecure_metadata: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Precedence: CLI > env > file > defaults
    let mut builder = if let Some(ref path) = args.config {
        config::load_config_from_path(path)?
    } else {
        config::load_config()?
    };

    if let Some(host) = args.host {
        builder = builder.host(host);
    }
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    builder = builder.auth(|mut a| {
        if let Some(source) = args.tenant_source {
            a = a.identifier_source(source);
        }
        if args.detailed_errors {
            a = a.detailed_errors(true);
        }
        if args.allow_insecure_metadata {
            a = a.require_https_metadata(false);
        }
        a
    });
    if args.verbose {
        builder = builder.log_level("debug".to_string());
    }
    if args.json_logs {
        builder = builder.json_logs(true);
    }

    let config = builder.build()?;

    init_observability(&config.telemetry)?;

    let resolver = Arc::new(StaticTenantResolver::new(config.tenants.clone())?);
    if resolver.is_empty() {
        tracing::warn!("No tenants configured, every tenant request will be rejected");
    }

    let cache = Arc::new(MetadataCache::new(
        Arc::new(HttpDiscoveryClient::new()?),
        CacheSettings::from(&config.auth),
    ));

    let shutdown = CancellationToken::new();
    let refresh = MetadataRefreshTask::new(
        Arc::clone(&cache),
        config.auth.metadata_refresh_interval(),
    )
    .spawn(shutdown.child_token());

    tracing::info!(
        tenants = resolver.len(),
        source = %config.auth.identifier_source(),
        scheme = config.auth.scheme_name(),
        require_https_metadata = config.auth.require_https_metadata(),
        not_found_policy = %config.auth.not_found_policy(),
        "Starting byoid-gateway"
    );

    let authenticator = TenantAuthenticator::new(
        config.auth.clone(),
        resolver,
        cache,
        Arc::new(IssuerClaimNormalizer),
    );
    let app = server::router(AuthState::new(Arc::new(authenticator)), &config.server);

    let signal = shutdown.clone();
    let result = server::serve(app, &config.server, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
        signal.cancel();
    })
    .await;

    shutdown.cancel();
    if let Err(e) = refresh.await {
        tracing::warn!(error = %e, "Metadata refresh task ended abnormally");
    }

    shutdown_observability();

    result.map_err(Into::into)
}
