//! # msgboard Binary
//!
//! The entry point that assembles the board service from its settings and the
//! plugins selected at compile time.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use mb_api::handlers::AppState;
use mb_api::{configure_routes, middleware};
use mb_config::{LogSettings, Settings};
use mb_core::engine::ThreadEngine;
use mb_core::storage::StorageHandle;
use mb_core::traits::ThreadStore;
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

// Feature-gated imports
#[cfg(feature = "db-sqlite")]
use mb_db_sqlite::SqliteThreadStore;

#[cfg(feature = "db-memory")]
use mb_db_memory::MemoryThreadStore;

#[cfg(feature = "auth-simple")]
use mb_auth_simple::Argon2SecretHasher;

#[cfg(not(feature = "auth-simple"))]
compile_error!("msgboard needs a delete-password hasher; enable the `auth-simple` feature");

fn init_tracing(log: &LogSettings) {
    // RUST_LOG wins over the configured filter.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Picks the backend from the URL scheme.
async fn connect_store(url: &str, max_connections: u32) -> anyhow::Result<Arc<dyn ThreadStore>> {
    #[cfg(feature = "db-memory")]
    if url == "memory:" {
        tracing::warn!("using the in-memory store; threads will not survive a restart");
        return Ok(Arc::new(MemoryThreadStore::new()));
    }

    #[cfg(feature = "db-sqlite")]
    if url.starts_with("sqlite:") {
        return Ok(Arc::new(SqliteThreadStore::connect(url, max_connections).await?));
    }

    let scheme = url.split(':').next().unwrap_or_default();
    anyhow::bail!("no storage backend compiled in for scheme {scheme:?} (max_connections {max_connections})")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);
    if let Some(path) = &settings.env_file {
        tracing::debug!("loaded environment from {}", path.display());
    }

    // 1. Delete-password hashing
    let hasher = Argon2SecretHasher::new(
        settings.hashing.memory_kib,
        settings.hashing.iterations,
        settings.hashing.parallelism,
    )?;

    // 2. One shared storage connection, injected into the engine
    let storage = Arc::new(StorageHandle::new());
    let url = settings.database.url.expose_secret().to_string();
    storage
        .init(|| connect_store(&url, settings.database.max_connections))
        .await?;

    let state = web::Data::new(AppState {
        engine: ThreadEngine::new(storage.clone(), Arc::new(hasher)),
        page_size: settings.board.page_size,
    });

    let (host, port) = settings.bind_address();
    tracing::info!("msgboard starting on http://{host}:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::standard_middleware())
            .wrap(middleware::security_headers())
            .wrap(middleware::cors_policy())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    storage.close().await;
    tracing::info!("msgboard stopped");
    Ok(())
}
