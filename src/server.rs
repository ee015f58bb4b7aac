use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument};

use crate::ethereum::CounterSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub message: String,
    pub success: bool,
}

/// State shared by the proxy routes.
#[derive(Clone)]
pub struct ProxyState {
    counter: Arc<dyn CounterSource>,
}

impl ProxyState {
    pub fn new(counter: Arc<dyn CounterSource>) -> Self {
        Self { counter }
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/contracts/:address/counter", get(read_counter))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the proxy HTTP server and runs until the process ends.
#[instrument(skip(state))]
pub async fn serve(addr: SocketAddr, state: ProxyState) -> Result<()> {
    let app = router(state);

    info!("Proxy HTTP server listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn hello() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "Hello bhvr!".to_string(),
        success: true,
    })
}

async fn read_counter(
    State(state): State<ProxyState>,
    Path(address): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.counter.read_counter(&address).await {
        Ok(value) => (
            StatusCode::OK,
            Json(ApiResponse {
                message: format!("Counter value: {}", value),
                success: true,
            }),
        ),
        Err(e) => {
            error!("Failed to read counter at {}: {}", address, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse {
                    message: "Failed to read contract".to_string(),
                    success: false,
                }),
            )
        }
    }
}
