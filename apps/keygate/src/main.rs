use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

mod cli;
mod data_dir;
mod dsn;

use keygate_common::GlobalConfig;
use keygate_core::{
    ApiKeyService, AuthState, BcryptHasher, MemoryPermissionDirectory, PermissionSnapshot,
    TokenService,
};
use keygate_router::{AppState, router};
use keygate_storage::{KeyStore, SeaOrmStorage};

use crate::cli::{Cli, Command};
use crate::data_dir::resolve_data_dir;
use crate::dsn::{ensure_sqlite_dsn, resolve_dsn};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("keygate failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(&cli.data_dir);
    let dsn = resolve_dsn(&cli.dsn, &data_dir);
    let config = cli.patch(dsn).into_config()?;

    match cli.command {
        Some(Command::Token { user_id, username }) => {
            let tokens = TokenService::new(&config.jwt_secret, config.jwt_expire_secs);
            println!("{}", tokens.issue(user_id, &username)?);
            Ok(())
        }
        Some(Command::Serve) | None => serve(config).await,
    }
}

async fn serve(config: GlobalConfig) -> anyhow::Result<()> {
    ensure_sqlite_dsn(&config.dsn)?;
    let storage = SeaOrmStorage::connect(&config.dsn)
        .await
        .context("connect database")?;
    info!(event = "db_connected", backend = %backend_name(&config.dsn));
    storage.sync().await.context("sync schema")?;

    let store: Arc<dyn KeyStore> = Arc::new(storage);
    let keys = ApiKeyService::new(store, Arc::new(BcryptHasher::new(config.bcrypt_cost)));
    let tokens = Arc::new(TokenService::new(
        &config.jwt_secret,
        config.jwt_expire_secs,
    ));
    let directory = Arc::new(MemoryPermissionDirectory::new(PermissionSnapshot::default()));
    let auth = AuthState::new(keys.clone(), tokens, directory);

    let app = router(AppState {
        keys,
        auth,
        expose_error_details: config.expose_error_details,
    });

    let bind = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(
        event = "listening",
        addr = %bind,
        bcrypt_cost = config.bcrypt_cost,
        jwt_expire_secs = config.jwt_expire_secs
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!(event = "shutdown");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keygate=info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(event = "signal_listener_failed", error = %err);
        std::future::pending::<()>().await;
    }
}

// DSNs may embed credentials; only the scheme is logged.
fn backend_name(dsn: &str) -> &str {
    dsn.split(':').next().unwrap_or("unknown")
}
