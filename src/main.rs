mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use db::{db::DBClient, store::MarketStore};
use dotenv::dotenv;
use mail::sendmail::MailSettings;
use routes::create_router;
use service::{
    deadline_sweeper::{DeadlineSweeper, IntervalScheduler},
    finalization::FinalizationService,
    listing_service::ListingService,
    notification_service::{NotificationService, Notifier},
    offer_ledger::OfferLedger,
};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub offer_ledger: OfferLedger,
    pub finalization: Arc<FinalizationService>,
    pub listing_service: ListingService,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = Config::init();

    tracing_subscriber::fmt()
        .with_max_level(
            config
                .log_level
                .parse::<LevelFilter>()
                .unwrap_or(LevelFilter::DEBUG),
        )
        .init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client = Arc::new(DBClient::new(pool));

    if config.run_migrations {
        if let Err(err) = db_client.run_migrations().await {
            tracing::error!("Failed to run migrations: {}", err);
            std::process::exit(1);
        }
        tracing::info!("Migrations applied");
    }

    let store: Arc<dyn MarketStore> = db_client.clone();
    let notifier: Arc<dyn Notifier> = Arc::new(NotificationService::new(
        db_client.clone(),
        MailSettings {
            api_key: config.resend_api_key.clone(),
            from_email: config.from_email.clone(),
        },
    ));

    let finalization = Arc::new(FinalizationService::new(store.clone(), notifier));
    let app_state = AppState {
        env: config.clone(),
        offer_ledger: OfferLedger::new(store.clone(), finalization.clone()),
        finalization: finalization.clone(),
        listing_service: ListingService::new(store.clone(), config.bidding_reopen_extension),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = if config.sweep_enabled {
        let sweeper = DeadlineSweeper::new(
            store.clone(),
            finalization,
            config.sweep_lease,
            config.sweep_concurrency,
        );
        let scheduler = IntervalScheduler::new(config.sweep_interval, shutdown_rx);
        Some(tokio::spawn(sweeper.run(scheduler)))
    } else {
        tracing::info!("Deadline sweeper disabled");
        None
    };

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let app = create_router(Arc::new(app_state)).layer(cors);

    tracing::info!("Server is running on http://localhost:{}", config.port);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", err);
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper_handle {
        if let Err(err) = handle.await {
            tracing::error!("Deadline sweeper task failed: {}", err);
        }
    }
}
