//! Small HTTP status server: liveness check and a global history reset.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::assistant::ConversationStore;

pub const ALIVE_TEXT: &str = "Bot is running! Send a message to the Telegram bot to start chatting.";

type SharedStore = Arc<dyn ConversationStore>;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/reset", get(reset_all).post(reset_all))
        .with_state(store)
}

async fn alive() -> &'static str {
    ALIVE_TEXT
}

async fn reset_all(State(store): State<SharedStore>) -> (StatusCode, String) {
    match store.reset_all() {
        Ok(discarded) => {
            info!("🧹 Status reset: {} turn(s) discarded across all chats", discarded);
            (StatusCode::OK, "Conversation history has been reset!".to_string())
        }
        Err(e) => {
            warn!("Status reset failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// Bind `0.0.0.0:port` and serve until the process exits.
pub async fn serve(port: u16, store: SharedStore) -> std::io::Result<()> {
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    info!("Status server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(store)).await
}
