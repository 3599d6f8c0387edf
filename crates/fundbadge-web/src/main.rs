use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use fundbadge_core::config::AppConfig;
use fundbadge_core::{
    CacheService, FundingDataService, GithubOAuthClient, GithubSponsorsAdapter, HttpClient,
    ProviderRegistry, ReqwestHttpClient,
};
use fundbadge_vault::TokenVault;
use fundbadge_web::{build_router, AppState, HttpSettings, PendingStates};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fundbadge-server")]
#[command(version, about = "Serves GitHub Sponsors funding badges", long_about = None)]
struct Args {
    /// Interface to bind; overrides HOST.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind; overrides PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(&config);

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    let state = build_state(&config).await?;
    let settings = HttpSettings {
        allowed_origins: config.server.allowed_origins.clone(),
        rate_limit: config.rate_limit,
    };
    let router = build_router(state, &settings);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        environment = config.environment.as_str(),
        "server started"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let level = match config.server.log_level.as_str() {
        "fatal" => "error",
        other => other,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.environment.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

    let adapter = Arc::new(
        GithubSponsorsAdapter::new(Arc::clone(&http))
            .with_admin_token(config.github.token.clone())
            .with_timeout_ms(config.github.api_timeout_ms),
    );

    let vault_config = config.vault_config();
    let vault = tokio::task::spawn_blocking(move || TokenVault::open(vault_config))
        .await
        .context("vault task failed")?
        .context("failed to open token vault")?;
    tracing::info!(path = %vault.db_path().display(), "token vault ready");

    let cache = build_cache(config).await?;
    let registry = ProviderRegistry::new().with_provider(adapter.clone());
    let service = FundingDataService::new(registry, cache, Arc::new(vault.clone()))
        .with_ttl_policy(config.ttl_policy())
        .with_fetch_timeout(config.cache.fetch_timeout);

    let oauth = GithubOAuthClient::new(http, config.github.oauth.clone())
        .with_timeout_ms(config.github.api_timeout_ms);

    Ok(AppState {
        service,
        adapter,
        vault,
        oauth,
        pending_states: PendingStates::default(),
        environment: config.environment,
        public_base_url: config.server.public_base_url.clone(),
        started_at: Instant::now(),
    })
}

#[cfg(feature = "redis")]
async fn build_cache(config: &AppConfig) -> anyhow::Result<CacheService> {
    match &config.cache.redis_url {
        Some(url) => {
            let backend = fundbadge_core::cache::RedisCache::connect(url)
                .await
                .context("failed to connect to redis")?;
            tracing::info!("using redis cache");
            Ok(CacheService::new(Arc::new(backend), config.cache.default_ttl))
        }
        None => Ok(CacheService::in_memory(config.cache.default_ttl)),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_cache(config: &AppConfig) -> anyhow::Result<CacheService> {
    if config.cache.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the redis feature is disabled, using in-memory cache");
    }
    Ok(CacheService::in_memory(config.cache.default_ttl))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => tracing::error!(error = %error, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutting down gracefully");
}
