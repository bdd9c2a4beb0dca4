//! dlm-market - consensus and settlement service for the data-labeling marketplace
//!
//! Serves the labeling, verification, reward and settlement operations over
//! HTTP on top of a local SQLite database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dlm_common::config::{
    default_config_path, load_or_default, RootFolderInitializer, RootFolderResolver,
    DEFAULT_BIND_ADDRESS,
};
use dlm_market::config::{resolve_signer_key, MarketConfig};
use dlm_market::signer::{ClaimSigner, EcdsaClaimSigner, UnconfiguredSigner};
use dlm_market::{build_router, AppState, Market};

/// Command-line arguments for dlm-market
#[derive(Parser, Debug)]
#[command(name = "dlm-market")]
#[command(about = "Consensus and settlement service for the data-labeling marketplace")]
#[command(version)]
struct Args {
    /// Root folder holding the database (overrides DLM_ROOT_FOLDER and the config file)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| default_config_path("dlm-market"));
    let toml_config = load_or_default(config_path.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", toml_config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any database work
    info!(
        "Starting dlm-market v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let market_config = MarketConfig::from_toml(&toml_config.market)
        .map_err(|e| anyhow!("Invalid [market] configuration: {}", e))?;
    info!(
        required_votes = market_config.quorum.required_votes,
        majority_threshold = market_config.quorum.majority_threshold,
        labeling_pool_percent = market_config.labeling_pool_percent,
        base_unit_decimals = market_config.base_unit_decimals,
        "Market configuration loaded"
    );

    let root_folder = RootFolderResolver::new(args.root_folder, &toml_config).resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match dlm_common::db::init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let signer: Arc<dyn ClaimSigner> = match resolve_signer_key(&toml_config.market) {
        Some(key) => {
            let signer = EcdsaClaimSigner::from_hex(&key).context("Invalid claim signing key")?;
            info!("✓ Claim signer ready (address {})", signer.address());
            Arc::new(signer)
        }
        None => {
            warn!("No claim signing key configured; claims will be refused");
            Arc::new(UnconfiguredSigner)
        }
    };

    let market = Market::new(pool, market_config, signer);
    let app = build_router(AppState::new(market));

    let bind_address = toml_config
        .server
        .bind_address
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;

    info!("dlm-market listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
