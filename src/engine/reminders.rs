use super::*;
use crate::contest::{self, WindowStatus};
use crate::scheduler::FireMode;
use chrono::Utc;

impl DialogEngine {
    /// Run one reminder firing under the chat's lock
    pub(crate) async fn fire(&self, firing: Firing<ReminderContext>) {
        let chat_id = firing.key.chat_id;
        let lock = self.chat_lock(chat_id).await;
        {
            let _guard = lock.lock().await;
            self.fire_locked(&firing).await;
        }
        self.release_chat_lock(chat_id, lock).await;
    }

    async fn fire_locked(&self, firing: &Firing<ReminderContext>) {
        let chat_id = firing.key.chat_id;

        // Cancelled or replaced while the firing was queued
        if !self.scheduler.is_live(firing).await {
            return;
        }

        let result = match firing.key.name.as_str() {
            PUZZLE_REMINDER => self.puzzle_reminder(firing).await,
            CONTEST_START_NOTICE => self.contest_start_notice(&firing.context).await,
            other => {
                tracing::warn!("Unknown reminder {} for chat {}", other, chat_id);
                Ok(())
            }
        };

        if matches!(firing.mode, FireMode::Once { .. }) {
            self.scheduler.complete(firing).await;
        }
        if let Err(e) = result {
            self.reporter.report(chat_id, &e);
        }
    }

    /// Warn when the contest is about to close; once it has closed, send the
    /// participant's summary and stop repeating.
    async fn puzzle_reminder(&self, firing: &Firing<ReminderContext>) -> BotResult<()> {
        let chat_id = firing.context.chat_id;
        let now = Utc::now();
        let open = self
            .store
            .find_window(now)
            .await?
            .filter(|w| contest::status_of(w, now) == WindowStatus::Open);

        let Some(window) = open else {
            let solved = self.store.solved_puzzles(chat_id).await?.len();
            tracing::info!("Contest closed, sending summary to chat {}", chat_id);
            self.transport
                .send_text(
                    chat_id,
                    &texts::summary(solved, self.config.max_puzzles),
                    texts::game_over_keyboard(),
                )
                .await?;
            self.scheduler.cancel(&firing.key).await;
            return Ok(());
        };

        if let Some(left) = contest::remaining(&window, now) {
            if left.hours == 0 && left.minutes <= self.config.closing_soon_minutes {
                self.transport
                    .send_text(chat_id, &contest::waiting_for_end_message(left), Markup::None)
                    .await?;
            }
        }
        Ok(())
    }

    /// Tell a participant who waited at the selection screen that the
    /// contest has opened
    async fn contest_start_notice(&self, context: &ReminderContext) -> BotResult<()> {
        let now = Utc::now();
        let open = self
            .store
            .find_window(now)
            .await?
            .is_some_and(|w| contest::status_of(&w, now) == WindowStatus::Open);
        if !open || context.competition != Some(Competition::Puzzle) {
            return Ok(());
        }

        let still_waiting = self
            .store
            .participant(context.chat_id)
            .await?
            .is_some_and(|p| p.current_competition == Some(Competition::Puzzle));
        if still_waiting {
            self.transport
                .send_text(context.chat_id, texts::CONTEST_STARTED, Markup::None)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContent;
    use crate::report::TracingReporter;
    use crate::store::{MemoryStore, SessionCommit};
    use crate::content::PhotoSource;
    use crate::transport::{ChatTransport, RecordingTransport, TransportResult};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// Holds the first text sent to `held_chat` until `release` is notified
    struct GatedTransport {
        inner: RecordingTransport,
        held_chat: ChatId,
        holding: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedTransport {
        fn new(held_chat: ChatId) -> Self {
            Self {
                inner: RecordingTransport::new(),
                held_chat,
                holding: AtomicBool::new(true),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for GatedTransport {
        async fn send_text(
            &self,
            chat_id: ChatId,
            text: &str,
            markup: Markup,
        ) -> TransportResult<MessageId> {
            if chat_id == self.held_chat && self.holding.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.send_text(chat_id, text, markup).await
        }

        async fn send_photo(
            &self,
            chat_id: ChatId,
            photo: PhotoSource,
            caption: &str,
            markup: Markup,
        ) -> TransportResult<MessageId> {
            self.inner.send_photo(chat_id, photo, caption, markup).await
        }

        async fn send_native_poll(
            &self,
            chat_id: ChatId,
            question: &str,
            options: &[String],
            markup: Markup,
        ) -> TransportResult<MessageId> {
            self.inner
                .send_native_poll(chat_id, question, options, markup)
                .await
        }

        async fn delete_message(
            &self,
            chat_id: ChatId,
            message_id: MessageId,
        ) -> TransportResult<()> {
            self.inner.delete_message(chat_id, message_id).await
        }
    }

    fn engine() -> (Arc<DialogEngine>, Arc<MemoryStore>, Arc<RecordingTransport>) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let engine = DialogEngine::start(
            store.clone(),
            Arc::new(StaticContent::default()),
            transport.clone(),
            Arc::new(TracingReporter),
            GameConfig::default(),
        );
        (engine, store, transport)
    }

    fn firing(chat_id: ChatId, name: &str, mode: FireMode, job_id: &str) -> Firing<ReminderContext> {
        Firing {
            key: JobKey::new(chat_id, name),
            job_id: job_id.to_string(),
            mode,
            context: ReminderContext {
                chat_id,
                competition: Some(Competition::Puzzle),
            },
        }
    }

    /// Schedule a far-off job so that a hand-built firing counts as live
    async fn live_firing(
        engine: &DialogEngine,
        chat_id: ChatId,
        name: &str,
        mode: FireMode,
    ) -> Firing<ReminderContext> {
        let far = FireMode::Once {
            at: Utc::now() + Duration::hours(10),
        };
        let context = ReminderContext {
            chat_id,
            competition: Some(Competition::Puzzle),
        };
        engine
            .scheduler()
            .schedule(JobKey::new(chat_id, name), far, context)
            .await;
        let job_id = engine.scheduler().job_id(&JobKey::new(chat_id, name)).await.unwrap();
        firing(chat_id, name, mode, &job_id)
    }

    #[tokio::test]
    async fn test_stale_firing_is_dropped() {
        let (engine, store, transport) = engine();
        store.get_or_create(1).await.unwrap();

        let every = std::time::Duration::from_secs(60);
        engine
            .fire(firing(1, PUZZLE_REMINDER, FireMode::Repeating { every }, "gone"))
            .await;

        assert!(transport.sent_to(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_contest_sends_summary_and_stops() {
        let (engine, store, transport) = engine();
        store.get_or_create(1).await.unwrap();
        store
            .record_attempt(PuzzleAttempt::new(3, 1, "ответ".to_string(), true, None))
            .await
            .unwrap();

        let every = std::time::Duration::from_secs(60);
        let firing = live_firing(&engine, 1, PUZZLE_REMINDER, FireMode::Repeating { every }).await;
        engine.fire(firing).await;

        assert_eq!(
            transport.last_to(1).await.unwrap().text(),
            Some(texts::summary(1, 10).as_str())
        );
        assert!(!engine
            .scheduler()
            .is_scheduled(&JobKey::new(1, PUZZLE_REMINDER))
            .await);
    }

    #[tokio::test]
    async fn test_closing_soon_warning() {
        let (engine, store, transport) = engine();
        let now = Utc::now();
        store
            .add_window(ContestWindow::new(
                "closing",
                now - Duration::hours(1),
                now + Duration::minutes(3) + Duration::seconds(30),
            ))
            .await
            .unwrap();

        let every = std::time::Duration::from_secs(60);
        let firing = live_firing(&engine, 1, PUZZLE_REMINDER, FireMode::Repeating { every }).await;
        engine.fire(firing).await;

        assert_eq!(
            transport.last_to(1).await.unwrap().text(),
            Some("⏰ До окончания розыгрыша осталось 3 минуты.")
        );
        assert!(engine
            .scheduler()
            .is_scheduled(&JobKey::new(1, PUZZLE_REMINDER))
            .await);
    }

    #[tokio::test]
    async fn test_no_warning_far_from_close() {
        let (engine, store, transport) = engine();
        let now = Utc::now();
        store
            .add_window(ContestWindow::new(
                "long",
                now - Duration::hours(1),
                now + Duration::minutes(30),
            ))
            .await
            .unwrap();

        let every = std::time::Duration::from_secs(60);
        let firing = live_firing(&engine, 1, PUZZLE_REMINDER, FireMode::Repeating { every }).await;
        engine.fire(firing).await;

        assert!(transport.sent_to(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_start_notice_only_for_waiting_participant() {
        let (engine, store, transport) = engine();
        let now = Utc::now();
        store
            .add_window(ContestWindow::new(
                "open",
                now - Duration::minutes(1),
                now + Duration::hours(1),
            ))
            .await
            .unwrap();
        store.get_or_create(1).await.unwrap();
        store.get_or_create(2).await.unwrap();
        store
            .commit(SessionCommit {
                competition: Some(Competition::Puzzle),
                ..Session::fresh(1).flush(DialogState::SelectCompetition)
            })
            .await
            .unwrap();

        let at = FireMode::Once { at: now };
        let first = live_firing(&engine, 1, CONTEST_START_NOTICE, at).await;
        engine.fire(first).await;
        let second = live_firing(&engine, 2, CONTEST_START_NOTICE, at).await;
        engine.fire(second).await;

        assert_eq!(
            transport.last_to(1).await.unwrap().text(),
            Some(texts::CONTEST_STARTED)
        );
        assert!(transport.sent_to(2).await.is_empty());
        assert_eq!(engine.scheduler().job_count().await, 0);
    }

    #[tokio::test]
    async fn test_firing_waits_for_event_on_same_chat() {
        let transport = Arc::new(GatedTransport::new(1));
        let engine = DialogEngine::start(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticContent::default()),
            transport.clone(),
            Arc::new(TracingReporter),
            GameConfig::default(),
        );

        let event = tokio::spawn({
            let engine = engine.clone();
            async move { engine.handle(ChatEvent::command(1, "help")).await }
        });
        transport.entered.notified().await;

        let every = std::time::Duration::from_secs(60);
        let same_chat = live_firing(&engine, 1, PUZZLE_REMINDER, FireMode::Repeating { every }).await;
        let reminder = tokio::spawn({
            let engine = engine.clone();
            async move { engine.fire(same_chat).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(transport.inner.sent_to(1).await.is_empty());
        assert!(!reminder.is_finished());

        // Another chat is not held up
        let other_chat = live_firing(&engine, 2, PUZZLE_REMINDER, FireMode::Repeating { every }).await;
        tokio::time::timeout(std::time::Duration::from_secs(1), engine.fire(other_chat))
            .await
            .unwrap();
        assert_eq!(
            transport.inner.last_to(2).await.unwrap().text(),
            Some(texts::summary(0, 10).as_str())
        );

        transport.release.notify_one();
        event.await.unwrap();
        reminder.await.unwrap();

        let texts_sent: Vec<String> = transport
            .inner
            .sent_to(1)
            .await
            .iter()
            .filter_map(|s| s.text().map(str::to_string))
            .collect();
        assert_eq!(
            texts_sent,
            vec![texts::HELP.to_string(), texts::summary(0, 10)]
        );
    }
}
