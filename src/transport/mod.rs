mod recording;
mod telegram;

use crate::content::PhotoSource;
use crate::types::{ChatId, MessageId};
use async_trait::async_trait;

pub use recording::{RecordingTransport, Sent};
pub use telegram::TelegramClient;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while delivering messages
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Reply markup attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Markup {
    /// Leave the current keyboard as it is
    #[default]
    None,
    /// Persistent reply keyboard, one inner Vec per row
    Keyboard(Vec<Vec<String>>),
    /// Single button asking the client to share its phone number
    RequestContact(String),
    /// Hide the reply keyboard
    Remove,
}

impl Markup {
    /// One button per row
    pub fn column<S: AsRef<str>>(buttons: &[S]) -> Self {
        Markup::Keyboard(
            buttons
                .iter()
                .map(|b| vec![b.as_ref().to_string()])
                .collect(),
        )
    }

    /// All buttons on one row
    pub fn row<S: AsRef<str>>(buttons: &[S]) -> Self {
        Markup::Keyboard(vec![buttons.iter().map(|b| b.as_ref().to_string()).collect()])
    }
}

/// Outbound chat capability used by the dialog engine
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str, markup: Markup)
        -> TransportResult<MessageId>;

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: PhotoSource,
        caption: &str,
        markup: Markup,
    ) -> TransportResult<MessageId>;

    /// Non-anonymous poll allowing multiple answers
    async fn send_native_poll(
        &self,
        chat_id: ChatId,
        question: &str,
        options: &[String],
        markup: Markup,
    ) -> TransportResult<MessageId>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> TransportResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_layouts() {
        assert_eq!(
            Markup::column(&["a", "b"]),
            Markup::Keyboard(vec![vec!["a".to_string()], vec!["b".to_string()]])
        );
        assert_eq!(
            Markup::row(&["a", "b"]),
            Markup::Keyboard(vec![vec!["a".to_string(), "b".to_string()]])
        );
    }
}
