mod avatar;
mod config;
mod ctx;
mod db;
mod errors;
mod gen_client;
mod habits;
mod models;
mod profile;
mod routes;
mod state;
mod storage;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::gen_client::GeminiClient;
use crate::habits::store::PgHabitStore;
use crate::profile::store::PgProfileStore;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3AvatarStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    let crate_filter = env!("CARGO_PKG_NAME").replace('-', "_");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", crate_filter, &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Dorian Engine API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize the generation client
    let generator = Arc::new(GeminiClient::new(config.gemini_api_key.clone()));
    info!(
        "Generation client initialized (text: {}, image: {})",
        gen_client::TEXT_MODEL,
        gen_client::IMAGE_MODEL
    );

    let storage = Arc::new(S3AvatarStorage::new(
        s3,
        config.s3_bucket.clone(),
        config.s3_endpoint.clone(),
    ));

    // Build app state — every external collaborator is an explicit handle
    let state = AppState {
        db: db.clone(),
        habits: Arc::new(PgHabitStore::new(db.clone())),
        profiles: Arc::new(PgProfileStore::new(db)),
        text_gen: generator.clone(),
        image_gen: generator,
        storage,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

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
        "dorian-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
