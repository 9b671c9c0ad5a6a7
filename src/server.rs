//! Webhook receiver for Bot API updates

use crate::dispatch::Dispatcher;
use crate::protocol::Update;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Header Telegram sets to the `secret_token` registered with `setWebhook`
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct WebhookState {
    dispatcher: Arc<Dispatcher>,
    secret: Option<Arc<str>>,
}

impl WebhookState {
    /// Check the secret header; everything passes when no secret is configured
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.secret else {
            return true;
        };
        headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|given| constant_time_eq(expected.as_bytes(), given.as_bytes()))
    }
}

/// Constant-time byte comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

pub fn router(dispatcher: Arc<Dispatcher>, secret: Option<String>) -> Router {
    let state = WebhookState {
        dispatcher,
        secret: secret.map(Arc::from),
    };

    Router::new()
        .route("/webhook", post(receive_update))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> StatusCode {
    if !state.authorized(&headers) {
        tracing::warn!("Rejected webhook call with a bad secret token");
        return StatusCode::UNAUTHORIZED;
    }

    let update_id = update.update_id;
    match update.into_event() {
        Some(event) => state.dispatcher.dispatch(event).await,
        None => tracing::debug!("Ignoring update {} with no chat event", update_id),
    }
    // Telegram retries anything but 2xx, so unknown updates are acknowledged too
    StatusCode::OK
}

/// Serve `app` on `addr` until `shutdown` resolves
pub async fn serve(
    addr: SocketAddr,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening for webhook calls on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
        assert!(!constant_time_eq(b"", b"a"));
        assert!(constant_time_eq(b"", b""));
    }
}
