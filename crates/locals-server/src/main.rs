mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use locals_api::auth::{AppState, AppStateInner};
use locals_api::oauth::HttpOAuthVerifier;
use locals_api::uploads::BlobStore;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "locals=debug,locals_api=debug,locals_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = locals_db::Database::open(&config.db_path)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: config.token_ttl,
        oauth: Arc::new(HttpOAuthVerifier::new(
            config.google_client_id.clone(),
            config.apple_client_id.clone(),
        )),
        blobs: BlobStore::new(&config.upload_dir),
        owner_user_id: config.owner_user_id,
        utc_offset: config.utc_offset,
    });

    let app = locals_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Locals server listening on {}", addr);
    info!("Serving uploads from {}", config.upload_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
