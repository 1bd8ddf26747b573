mod config;
mod db;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::fulfillment::{FulfillmentClient, SubmitCollaborator, UnconfiguredSubmitter};
use services::store::{JsonFileStore, PgStore, RecordStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cfg = config::AppConfig::from_env().expect("invalid configuration");

    let store: Arc<dyn RecordStore> = match cfg.database_url.as_deref() {
        Some(url) => {
            let pool = db::init_pool(url).await.expect("database init failed");
            tracing::info!("record store: postgres");
            Arc::new(PgStore::new(pool))
        }
        None => {
            let store = JsonFileStore::new(&cfg.record_path);
            tracing::info!(path = %store.path().display(), "record store: json file");
            Arc::new(store)
        }
    };

    // Non-fatal: submissions fail (and stay retryable) until fulfillment is configured.
    let submitter: Arc<dyn SubmitCollaborator> = match fulfillment_client() {
        Ok(client) => {
            tracing::info!("fulfillment client initialized");
            Arc::new(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, "fulfillment not configured; submissions disabled");
            Arc::new(UnconfiguredSubmitter)
        }
    };

    let state = state::AppState::new(store, submitter, cfg.default_goods_id.clone());

    let app = routes::app(state);
    let port = cfg.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "caseprint listening");
    axum::serve(listener, app).await.expect("server failed");
}

fn fulfillment_client() -> Result<FulfillmentClient, String> {
    let fc = config::FulfillmentConfig::from_env().map_err(|e| e.to_string())?;
    FulfillmentClient::new(&fc).map_err(|e| e.to_string())
}
