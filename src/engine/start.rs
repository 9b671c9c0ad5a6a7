use super::*;

impl DialogEngine {
    /// Entry point after a reset: ask for the phone number
    pub(super) async fn handle_start(&self, chat_id: ChatId) -> BotResult<DialogState> {
        self.show_auth_prompt(chat_id).await?;
        Ok(DialogState::Auth)
    }

    pub(super) async fn show_auth_prompt(&self, chat_id: ChatId) -> BotResult<()> {
        self.transport
            .send_text(chat_id, texts::AUTH_PROMPT, texts::auth_keyboard())
            .await?;
        Ok(())
    }
}
