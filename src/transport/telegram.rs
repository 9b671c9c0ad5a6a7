use super::*;
use crate::protocol::Update;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Telegram Bot API client
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: MessageId,
}

impl TelegramClient {
    /// Create a client for the bot `token` against `api_url`
    /// (normally `https://api.telegram.org`)
    pub fn new(api_url: &str, token: &str) -> TransportResult<Self> {
        // Long polling holds requests open for up to 50s
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> TransportResult<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;
        Self::unwrap_response(method, response).await
    }

    async fn call_multipart<T: DeserializeOwned>(
        &self,
        method: &str,
        form: Form,
    ) -> TransportResult<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await?;
        Self::unwrap_response(method, response).await
    }

    async fn unwrap_response<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> TransportResult<T> {
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::ParseError(format!("{}: {}", method, e)))?;

        if !envelope.ok {
            return Err(TransportError::Api {
                code: envelope.error_code.unwrap_or_default(),
                description: envelope.description.unwrap_or_default(),
            });
        }
        envelope
            .result
            .ok_or_else(|| TransportError::ParseError(format!("{}: missing result", method)))
    }

    /// Fetch updates after `offset`, waiting up to `timeout_secs` for new ones
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> TransportResult<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query", "poll_answer"],
            }),
        )
        .await
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> TransportResult<()> {
        let mut body = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query", "poll_answer"],
        });
        if let Some(secret) = secret {
            body["secret_token"] = json!(secret);
        }
        let _: bool = self.call("setWebhook", body).await?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> TransportResult<()> {
        let _: bool = self.call("deleteWebhook", json!({})).await?;
        Ok(())
    }
}

/// Bot API `reply_markup` object; None when nothing should be attached
fn markup_json(markup: &Markup) -> Option<Value> {
    match markup {
        Markup::None => None,
        Markup::Keyboard(rows) => Some(json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|text| json!({ "text": text })).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "resize_keyboard": true,
            "one_time_keyboard": false,
        })),
        Markup::RequestContact(label) => Some(json!({
            "keyboard": [[{ "text": label, "request_contact": true }]],
            "resize_keyboard": true,
            "one_time_keyboard": false,
        })),
        Markup::Remove => Some(json!({ "remove_keyboard": true })),
    }
}

fn with_markup(mut body: Value, markup: &Markup) -> Value {
    if let Some(reply_markup) = markup_json(markup) {
        body["reply_markup"] = reply_markup;
    }
    body
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Markup,
    ) -> TransportResult<MessageId> {
        let body = with_markup(json!({ "chat_id": chat_id, "text": text }), &markup);
        let sent: SentMessage = self.call("sendMessage", body).await?;
        Ok(sent.message_id)
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: PhotoSource,
        caption: &str,
        markup: Markup,
    ) -> TransportResult<MessageId> {
        let sent: SentMessage = match photo {
            PhotoSource::Url(url) => {
                let body = with_markup(
                    json!({ "chat_id": chat_id, "photo": url, "caption": caption }),
                    &markup,
                );
                self.call("sendPhoto", body).await?
            }
            PhotoSource::Upload { file_name, bytes } => {
                let mut form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .text("caption", caption.to_string())
                    .part("photo", Part::bytes(bytes).file_name(file_name));
                if let Some(reply_markup) = markup_json(&markup) {
                    form = form.text("reply_markup", reply_markup.to_string());
                }
                self.call_multipart("sendPhoto", form).await?
            }
        };
        Ok(sent.message_id)
    }

    async fn send_native_poll(
        &self,
        chat_id: ChatId,
        question: &str,
        options: &[String],
        markup: Markup,
    ) -> TransportResult<MessageId> {
        let body = with_markup(
            json!({
                "chat_id": chat_id,
                "question": question,
                "options": options,
                "is_anonymous": false,
                "allows_multiple_answers": true,
            }),
            &markup,
        );
        let sent: SentMessage = self.call("sendPoll", body).await?;
        Ok(sent.message_id)
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> TransportResult<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }
}
