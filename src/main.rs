use actix_web::{web, App, HttpServer};
use std::io;
use std::sync::Arc;
use tokio::signal;

mod api_error;
mod config;
mod db;
mod http;
mod middleware;
mod models;
mod service;
mod store;
mod telemetry;

use crate::config::{Config, StoreBackend};
use crate::db::{create_pool, run_migrations};
use crate::http::AppState;
use crate::middleware::cors_middleware;
use crate::service::RegistrationScheduler;
use crate::store::{MemoryStore, PgStore, Stores};
use crate::telemetry::init_telemetry;

async fn open_stores(config: &Config) -> io::Result<Stores> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data will not survive a restart");
            Ok(Stores::memory(Arc::new(MemoryStore::new())))
        }
        StoreBackend::Postgres => {
            let url = config
                .store
                .database_url
                .as_deref()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "DATABASE_URL is not set"))?;
            let pool = create_pool(&config.store, url)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            run_migrations(&pool)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            Ok(Stores::postgres(Arc::new(PgStore::new(pool, config.store.timeout()))))
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    // Load configuration
    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    // Initialize telemetry
    init_telemetry(&config.server.rust_log);

    let stores = open_stores(&config).await?;

    let scheduler = RegistrationScheduler::new(stores.tournaments.clone(), config.scheduler.interval()).start();

    let state = web::Data::new(AppState::new(&stores, config.tournament.name_match));

    tracing::info!("Starting bracket server on {}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_middleware())
            .wrap(actix_web::middleware::Logger::default())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(crate::http::health::health_check))
                    .configure(crate::http::game_handler::configure_routes)
                    .configure(crate::http::tournament_handler::configure_routes)
                    .configure(crate::http::ladder_handler::configure_routes),
            )
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    let result = server.await;
    scheduler.stop().await;
    result
}
