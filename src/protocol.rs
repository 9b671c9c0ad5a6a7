use crate::types::*;
use serde::{Deserialize, Serialize};

/// Incoming Bot API update (only the parts the bot reacts to)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub poll_answer: Option<PollAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollAnswer {
    pub poll_id: String,
    pub user: User,
    #[serde(default)]
    pub option_ids: Vec<usize>,
}

/// What the participant did, independent of the wire format
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// `/name`, without the slash and any bot suffix
    Command(String),
    Text(String),
    Contact(String),
    Callback(String),
    PollAnswer(Vec<usize>),
}

/// One inbound event addressed to a chat
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    pub chat_id: ChatId,
    /// The participant's own message, when there is one
    pub message_id: Option<MessageId>,
    pub kind: EventKind,
}

impl ChatEvent {
    pub fn new(chat_id: ChatId, kind: EventKind) -> Self {
        Self {
            chat_id,
            message_id: None,
            kind,
        }
    }

    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self::new(chat_id, EventKind::Text(text.into()))
    }

    pub fn command(chat_id: ChatId, name: impl Into<String>) -> Self {
        Self::new(chat_id, EventKind::Command(name.into()))
    }

    pub fn contact(chat_id: ChatId, phone: impl Into<String>) -> Self {
        Self::new(chat_id, EventKind::Contact(phone.into()))
    }

    pub fn poll_answer(chat_id: ChatId, option_ids: Vec<usize>) -> Self {
        Self::new(chat_id, EventKind::PollAnswer(option_ids))
    }

    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// The `/start` reset command
    pub fn is_reset(&self) -> bool {
        matches!(&self.kind, EventKind::Command(name) if name == "start")
    }
}

/// Split `/start@some_bot args` into `start`
fn parse_command(text: &str) -> Option<String> {
    let rest = text.strip_prefix('/')?;
    let word = rest.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    (!name.is_empty()).then(|| name.to_lowercase())
}

impl Update {
    /// Convert into an engine event; None for updates the bot ignores.
    /// Poll answers carry the user id, which equals the private chat id.
    pub fn into_event(self) -> Option<ChatEvent> {
        if let Some(message) = self.message {
            let chat_id = message.chat.id;
            let kind = if let Some(contact) = message.contact {
                EventKind::Contact(contact.phone_number)
            } else {
                let text = message.text?;
                match parse_command(&text) {
                    Some(name) => EventKind::Command(name),
                    None => EventKind::Text(text),
                }
            };
            return Some(ChatEvent::new(chat_id, kind).with_message_id(message.message_id));
        }

        if let Some(query) = self.callback_query {
            let message = query.message?;
            let data = query.data?;
            return Some(
                ChatEvent::new(message.chat.id, EventKind::Callback(data))
                    .with_message_id(message.message_id),
            );
        }

        if let Some(answer) = self.poll_answer {
            return Some(ChatEvent::new(
                answer.user.id,
                EventKind::PollAnswer(answer.option_ids),
            ));
        }

        None
    }
}
