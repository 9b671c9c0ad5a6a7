//! Dialog engine: routes each chat event to the handler for the
//! participant's persisted state and commits the outcome.
//!
//! Every event and every reminder firing for a chat runs under that chat's
//! lock, so handlers own the participant's session exclusively.

mod auth;
mod puzzle;
mod reminders;
mod select;
mod start;
mod survey;
pub mod texts;

use crate::config::GameConfig;
use crate::content::{ContentError, ContentSource};
use crate::protocol::{ChatEvent, EventKind};
use crate::report::ErrorReporter;
use crate::scheduler::{Firing, JobKey, Scheduler};
use crate::session::{ReminderContext, Session};
use crate::store::{StoreError, UserStore};
use crate::transport::{ChatTransport, Markup, TransportError};
use crate::types::*;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex};

/// Repeating in-game reminder (closing-soon notice, end-of-contest summary)
pub const PUZZLE_REMINDER: &str = "show_rebus_reminder";
/// One-shot notice when an upcoming contest window opens
pub const CONTEST_START_NOTICE: &str = "send_message_for_start_draw";

pub type BotResult<T> = Result<T, BotError>;

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

pub struct DialogEngine {
    store: Arc<dyn UserStore>,
    content: Arc<dyn ContentSource>,
    transport: Arc<dyn ChatTransport>,
    reporter: Arc<dyn ErrorReporter>,
    scheduler: Scheduler<ReminderContext>,
    config: GameConfig,
    chat_locks: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl DialogEngine {
    /// Build the engine and spawn the task that delivers reminder firings
    pub fn start(
        store: Arc<dyn UserStore>,
        content: Arc<dyn ContentSource>,
        transport: Arc<dyn ChatTransport>,
        reporter: Arc<dyn ErrorReporter>,
        config: GameConfig,
    ) -> Arc<Self> {
        let (scheduler, firings) = Scheduler::new();
        let engine = Arc::new(Self {
            store,
            content,
            transport,
            reporter,
            scheduler,
            config,
            chat_locks: Mutex::new(HashMap::new()),
        });
        spawn_reminder_loop(Arc::downgrade(&engine), firings);
        engine
    }

    pub fn scheduler(&self) -> &Scheduler<ReminderContext> {
        &self.scheduler
    }

    async fn chat_lock(&self, chat_id: ChatId) -> Arc<Mutex<()>> {
        self.chat_locks
            .lock()
            .await
            .entry(chat_id)
            .or_default()
            .clone()
    }

    /// Drop the chat's lock entry once nobody else holds or waits on it.
    /// Clones are only handed out under the map lock, so the count is exact.
    async fn release_chat_lock(&self, chat_id: ChatId, lock: Arc<Mutex<()>>) {
        let mut locks = self.chat_locks.lock().await;
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&chat_id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn chat_lock_count(&self) -> usize {
        self.chat_locks.lock().await.len()
    }

    /// Process one inbound event to completion
    pub async fn handle(&self, event: ChatEvent) {
        let chat_id = event.chat_id;
        let lock = self.chat_lock(chat_id).await;
        {
            let _guard = lock.lock().await;
            if let Err(error) = self.process(&event).await {
                self.recover(chat_id, error).await;
            }
        }
        self.release_chat_lock(chat_id, lock).await;
    }

    async fn process(&self, event: &ChatEvent) -> BotResult<()> {
        let chat_id = event.chat_id;

        if matches!(&event.kind, EventKind::Command(name) if name == "help") {
            self.transport
                .send_text(chat_id, texts::HELP, Markup::None)
                .await?;
            return Ok(());
        }

        let participant = self.store.get_or_create(chat_id).await?;
        let (mut session, state) = if event.is_reset() {
            tracing::info!("Chat {} reset", chat_id);
            (
                Session::reset(self.store.as_ref(), chat_id).await?,
                DialogState::Start,
            )
        } else {
            (
                Session::hydrate(self.store.as_ref(), self.content.as_ref(), &participant).await?,
                participant.state.unwrap_or(DialogState::Auth),
            )
        };

        let next = match state {
            DialogState::Start => self.handle_start(chat_id).await?,
            DialogState::Auth => self.handle_auth(&participant, event).await?,
            DialogState::SelectCompetition => self.handle_select(&mut session, event).await?,
            DialogState::PuzzleGame => self.handle_puzzle(&mut session, event).await?,
            DialogState::Survey => self.handle_survey(&mut session, event).await?,
        };

        if next != state {
            tracing::debug!("Chat {}: {} -> {}", chat_id, state.as_str(), next.as_str());
        }
        self.store.commit(session.flush(next)).await?;
        Ok(())
    }

    /// Content faults get a short-lived notice and send the participant back
    /// to competition selection; everything else goes to the reporter.
    async fn recover(&self, chat_id: ChatId, error: BotError) {
        let BotError::Content(content_error) = &error else {
            self.reporter.report(chat_id, &error);
            return;
        };

        tracing::warn!("Chat {}: {}", chat_id, content_error);
        if let Err(e) = self.flash_notice(chat_id, texts::CONTENT_MISSING).await {
            self.reporter.report(chat_id, &e);
        }

        self.scheduler
            .cancel(&JobKey::new(chat_id, PUZZLE_REMINDER))
            .await;
        if let Err(e) = self
            .store
            .set_state(chat_id, DialogState::SelectCompetition)
            .await
        {
            self.reporter.report(chat_id, &e);
        }
    }

    /// Send a notice, keep it up for the configured time, then delete it
    async fn flash_notice(&self, chat_id: ChatId, text: &str) -> BotResult<()> {
        let message_id = self.transport.send_text(chat_id, text, Markup::None).await?;
        tokio::time::sleep(self.config.error_notice_ttl).await;
        self.transport.delete_message(chat_id, message_id).await?;
        Ok(())
    }

    async fn show_selection(&self, chat_id: ChatId, text: &str) -> BotResult<()> {
        self.transport
            .send_text(chat_id, text, texts::select_keyboard())
            .await?;
        Ok(())
    }

    /// Leave the current competition and offer the choice again
    async fn end_competition(&self, session: &mut Session) -> BotResult<DialogState> {
        session.competition = None;
        session.assign_puzzle(None);
        session.survey = None;
        self.show_selection(session.chat_id, texts::SELECT_PROMPT)
            .await?;
        Ok(DialogState::SelectCompetition)
    }
}

fn spawn_reminder_loop(
    engine: Weak<DialogEngine>,
    mut firings: mpsc::UnboundedReceiver<Firing<ReminderContext>>,
) {
    tokio::spawn(async move {
        while let Some(firing) = firings.recv().await {
            let Some(engine) = engine.upgrade() else {
                break;
            };
            // Firings for one chat must not hold up other chats
            tokio::spawn(async move { engine.fire(firing).await });
        }
        tracing::debug!("Reminder loop stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContent;
    use crate::report::TracingReporter;
    use crate::store::MemoryStore;
    use crate::transport::{RecordingTransport, Sent};
    use std::time::Duration;

    fn engine_with(
        content: StaticContent,
    ) -> (Arc<DialogEngine>, Arc<MemoryStore>, Arc<RecordingTransport>) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let config = GameConfig {
            error_notice_ttl: Duration::ZERO,
            ..GameConfig::default()
        };
        let engine = DialogEngine::start(
            store.clone(),
            Arc::new(content),
            transport.clone(),
            Arc::new(TracingReporter),
            config,
        );
        (engine, store, transport)
    }

    #[tokio::test]
    async fn test_new_participant_defaults_to_auth() {
        let (engine, store, transport) = engine_with(StaticContent::default());

        engine.handle(ChatEvent::text(1, "hello")).await;

        let participant = store.participant(1).await.unwrap().unwrap();
        assert_eq!(participant.state, Some(DialogState::Auth));
        assert_eq!(
            transport.last_to(1).await.unwrap().text(),
            Some(texts::AUTH_PROMPT)
        );
    }

    #[tokio::test]
    async fn test_help_does_not_touch_state() {
        let (engine, store, transport) = engine_with(StaticContent::default());

        engine.handle(ChatEvent::command(1, "help")).await;

        assert!(store.participant(1).await.unwrap().is_none());
        assert_eq!(transport.last_to(1).await.unwrap().text(), Some(texts::HELP));
    }

    #[tokio::test]
    async fn test_chat_locks_are_released_after_each_event() {
        let (engine, _store, _transport) = engine_with(StaticContent::default());

        for chat_id in 1..=200 {
            engine.handle(ChatEvent::command(chat_id, "help")).await;
        }
        assert_eq!(engine.chat_lock_count().await, 0);

        // Overlapping events for the same chats share an entry until the last one ends
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.handle(ChatEvent::text(500 + i % 3, "hi")).await })
            })
            .collect();
        futures::future::join_all(handles).await;
        assert_eq!(engine.chat_lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_reset_overrides_persisted_state() {
        let (engine, store, _transport) = engine_with(StaticContent::default());
        store.get_or_create(1).await.unwrap();
        store.set_state(1, DialogState::PuzzleGame).await.unwrap();

        engine.handle(ChatEvent::command(1, "start")).await;

        let participant = store.participant(1).await.unwrap().unwrap();
        assert_eq!(participant.state, Some(DialogState::Auth));
        assert_eq!(participant.current_competition, None);
    }

    #[tokio::test]
    async fn test_content_fault_flashes_notice_and_forces_selection() {
        let (engine, store, transport) = engine_with(StaticContent::default());
        store.get_or_create(1).await.unwrap();
        store.set_state(1, DialogState::Survey).await.unwrap();

        engine.handle(ChatEvent::text(1, texts::SURVEY_START)).await;

        let sent = transport.sent_to(1).await;
        let notice = sent
            .iter()
            .find_map(|s| match s {
                Sent::Text {
                    message_id, text, ..
                } if text == texts::CONTENT_MISSING => Some(*message_id),
                _ => None,
            })
            .unwrap();
        assert!(sent.contains(&Sent::Deleted {
            chat_id: 1,
            message_id: notice
        }));
        let participant = store.participant(1).await.unwrap().unwrap();
        assert_eq!(participant.state, Some(DialogState::SelectCompetition));
        assert!(store.active_response(1).await.unwrap().is_none());
    }
}
