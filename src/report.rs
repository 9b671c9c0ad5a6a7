//! Fault reporting sinks handed to the engine

use crate::config::RollbarConfig;
use crate::types::ChatId;
use serde_json::json;

const ROLLBAR_ITEM_URL: &str = "https://api.rollbar.com/api/1/item/";

/// Where unexpected faults end up
pub trait ErrorReporter: Send + Sync {
    fn report(&self, chat_id: ChatId, error: &dyn std::error::Error);
}

/// Log-only reporter
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, chat_id: ChatId, error: &dyn std::error::Error) {
        tracing::error!("Unhandled fault in chat {}: {}", chat_id, error);
    }
}

/// Sends every fault to Rollbar in the background, and logs it
#[derive(Debug, Clone)]
pub struct RollbarReporter {
    client: reqwest::Client,
    config: RollbarConfig,
}

impl RollbarReporter {
    pub fn new(config: RollbarConfig) -> Self {
        tracing::info!("Reporting faults to Rollbar ({})", config.environment);
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn item(&self, chat_id: ChatId, message: &str) -> serde_json::Value {
        json!({
            "data": {
                "environment": self.config.environment,
                "level": "error",
                "language": "rust",
                "timestamp": chrono::Utc::now().timestamp(),
                "body": { "message": { "body": message } },
                "custom": { "chat_id": chat_id },
            }
        })
    }
}

impl ErrorReporter for RollbarReporter {
    fn report(&self, chat_id: ChatId, error: &dyn std::error::Error) {
        TracingReporter.report(chat_id, error);

        let body = self.item(chat_id, &error.to_string());
        let request = self
            .client
            .post(ROLLBAR_ITEM_URL)
            .header("X-Rollbar-Access-Token", &self.config.token)
            .json(&body);

        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!("Rollbar rejected item: HTTP {}", response.status());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to send item to Rollbar: {}", e),
            }
        });
    }
}
