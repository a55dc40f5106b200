//! Infinicanvas development backend
//!
//! Serves the auth, row and object endpoints the cloud client expects, backed
//! by memory. Configure with:
//!
//! - `INFINICANVAS_BIND`: listen address (default `0.0.0.0:3030`)
//! - `INFINICANVAS_BACKEND_ANON_KEY`: accepted `apikey` (default `dev-anon-key`)
//! - `RUST_LOG`: log filter

use infinicanvas_server::{AppState, router};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

const DEFAULT_BIND: &str = "0.0.0.0:3030";
const DEFAULT_ANON_KEY: &str = "dev-anon-key";

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "infinicanvas_server=info,tower_http=info".into()),
        )
        .init();

    let bind = std::env::var("INFINICANVAS_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let addr: SocketAddr = match bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid INFINICANVAS_BIND {:?}: {}", bind, e);
            std::process::exit(2);
        }
    };
    let anon_key = std::env::var("INFINICANVAS_BACKEND_ANON_KEY")
        .unwrap_or_else(|_| DEFAULT_ANON_KEY.to_string());

    let state = Arc::new(AppState::new(anon_key));
    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Infinicanvas backend listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
