//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LogDelivery, QueuedDelivery, SmtpDelivery},
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use chapterhouse_core::ports::{CodeDeliveryService, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Start the Passcode Delivery Worker ---
    let transport: Arc<dyn CodeDeliveryService> = match &config.smtp {
        Some(smtp) => {
            info!("Delivering passcodes through SMTP host {}", smtp.host);
            Arc::new(SmtpDelivery::new(smtp, config.otp_ttl_minutes)?)
        }
        None => {
            warn!("SMTP_HOST is not set; passcodes will be written to the log.");
            Arc::new(LogDelivery)
        }
    };
    let shutdown = CancellationToken::new();
    let (delivery, delivery_worker) = QueuedDelivery::spawn(transport, shutdown.clone());

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        db_adapter,
        Arc::new(delivery),
        Arc::new(SystemClock),
        config.clone(),
    ));

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let stop = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
            stop.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = delivery_worker.await {
        warn!("Passcode delivery worker ended abnormally: {}", e);
    }
    Ok(())
}
