mod blob_store;
mod config;
mod db;
mod errors;
mod history;
mod inference;
mod models;
mod routes;
mod state;
#[cfg(test)]
mod testing;
mod workflow;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::blob_store::S3BlobStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::history::PgHistoryStore;
use crate::inference::{GeminiClient, InferenceClient};
use crate::routes::build_router;
use crate::state::AppState;
use crate::workflow::{Orchestrator, WorkflowSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("bikeid_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting bikeid API v{}", env!("CARGO_PKG_VERSION"));

    // History store (PostgreSQL)
    let db = create_pool(&config.database_url).await?;
    let history = PgHistoryStore::new(db, config.history_table.clone());
    history
        .ensure_schema()
        .await
        .context("Failed to prepare history table")?;

    // Blob store (S3 / MinIO)
    let blobs = S3BlobStore::new(build_s3_client(&config).await, config.s3_bucket.clone());
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Inference client
    let inference = GeminiClient::new(config.inference_endpoint.clone(), config.model.clone())
        .context("Failed to build inference client")?;
    info!("Inference client initialized (model: {})", inference.model());

    let orchestrator = Orchestrator::new(
        Arc::new(blobs),
        Arc::new(inference),
        Arc::new(history),
        WorkflowSettings {
            unknown_markers: config.unknown_markers.clone(),
            image_fetch_timeout: config.image_fetch_timeout,
        },
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        history_limit: config.history_limit,
        max_upload_bytes: config.max_upload_bytes,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "bikeid-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
