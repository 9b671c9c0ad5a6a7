use super::*;
use crate::phone;
use crate::store::ProfileUpdate;

impl DialogEngine {
    /// Phone number first (shared contact), then the display name
    pub(super) async fn handle_auth(
        &self,
        participant: &Participant,
        event: &ChatEvent,
    ) -> BotResult<DialogState> {
        let chat_id = event.chat_id;

        match &event.kind {
            EventKind::Contact(raw) => {
                match phone::normalize_ru(raw) {
                    Some(phone) => {
                        tracing::info!("Chat {} shared phone number", chat_id);
                        self.store
                            .update_profile(chat_id, ProfileUpdate::Phone(phone))
                            .await?;
                        self.transport
                            .send_text(chat_id, texts::NAME_PROMPT, Markup::Remove)
                            .await?;
                    }
                    None => {
                        self.transport
                            .send_text(chat_id, texts::INVALID_PHONE, Markup::None)
                            .await?;
                    }
                }
                Ok(DialogState::Auth)
            }

            EventKind::Text(text) if text.contains(texts::AUTH_KEYWORD) => {
                self.transport
                    .send_text(chat_id, texts::CONTACT_PROMPT, texts::contact_keyboard())
                    .await?;
                if let Some(message_id) = event.message_id {
                    if let Err(e) = self.transport.delete_message(chat_id, message_id).await {
                        tracing::warn!("Chat {}: could not delete message {}: {}", chat_id, message_id, e);
                    }
                }
                Ok(DialogState::Auth)
            }

            EventKind::Text(_) if !participant.has_phone() => {
                self.show_auth_prompt(chat_id).await?;
                Ok(DialogState::Auth)
            }

            EventKind::Text(text) => {
                let name = text.trim();
                if name.is_empty() {
                    return Ok(DialogState::Auth);
                }
                self.store
                    .update_profile(chat_id, ProfileUpdate::FullName(name.to_string()))
                    .await?;
                self.show_selection(chat_id, texts::SELECT_PROMPT).await?;
                Ok(DialogState::SelectCompetition)
            }

            _ => Ok(DialogState::Auth),
        }
    }
}
