use super::*;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// A message the engine delivered (or removed)
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        markup: Markup,
    },
    Photo {
        chat_id: ChatId,
        message_id: MessageId,
        photo: PhotoSource,
        caption: String,
        markup: Markup,
    },
    Poll {
        chat_id: ChatId,
        message_id: MessageId,
        question: String,
        options: Vec<String>,
    },
    Deleted {
        chat_id: ChatId,
        message_id: MessageId,
    },
}

impl Sent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Sent::Text { chat_id, .. }
            | Sent::Photo { chat_id, .. }
            | Sent::Poll { chat_id, .. }
            | Sent::Deleted { chat_id, .. } => *chat_id,
        }
    }

    /// Text body, photo caption or poll question
    pub fn text(&self) -> Option<&str> {
        match self {
            Sent::Text { text, .. } => Some(text),
            Sent::Photo { caption, .. } => Some(caption),
            Sent::Poll { question, .. } => Some(question),
            Sent::Deleted { .. } => None,
        }
    }
}

/// Transport that keeps every outgoing message in memory
#[derive(Debug, Default)]
pub struct RecordingTransport {
    log: RwLock<Vec<Sent>>,
    next_id: AtomicI64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.log.read().await.clone()
    }

    pub async fn sent_to(&self, chat_id: ChatId) -> Vec<Sent> {
        self.log
            .read()
            .await
            .iter()
            .filter(|s| s.chat_id() == chat_id)
            .cloned()
            .collect()
    }

    pub async fn last_to(&self, chat_id: ChatId) -> Option<Sent> {
        self.sent_to(chat_id).await.pop()
    }

    pub async fn clear(&self) {
        self.log.write().await.clear();
    }

    async fn push(&self, make: impl FnOnce(MessageId) -> Sent) -> MessageId {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.write().await.push(make(message_id));
        message_id
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Markup,
    ) -> TransportResult<MessageId> {
        Ok(self
            .push(|message_id| Sent::Text {
                chat_id,
                message_id,
                text: text.to_string(),
                markup,
            })
            .await)
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: PhotoSource,
        caption: &str,
        markup: Markup,
    ) -> TransportResult<MessageId> {
        Ok(self
            .push(|message_id| Sent::Photo {
                chat_id,
                message_id,
                photo,
                caption: caption.to_string(),
                markup,
            })
            .await)
    }

    async fn send_native_poll(
        &self,
        chat_id: ChatId,
        question: &str,
        options: &[String],
        _markup: Markup,
    ) -> TransportResult<MessageId> {
        Ok(self
            .push(|message_id| Sent::Poll {
                chat_id,
                message_id,
                question: question.to_string(),
                options: options.to_vec(),
            })
            .await)
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> TransportResult<()> {
        self.log
            .write()
            .await
            .push(Sent::Deleted { chat_id, message_id });
        Ok(())
    }
}
