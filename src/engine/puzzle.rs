use super::*;
use crate::answer;
use crate::scheduler::FireMode;
use chrono::Utc;

impl DialogEngine {
    pub(super) async fn handle_puzzle(
        &self,
        session: &mut Session,
        event: &ChatEvent,
    ) -> BotResult<DialogState> {
        let EventKind::Text(text) = &event.kind else {
            return Ok(DialogState::PuzzleGame);
        };
        let max = self.config.max_puzzles;

        if text.contains(texts::GAME_OVER) {
            self.end_competition(session).await
        } else if text.contains(texts::END_GAME) {
            let message = texts::summary(session.success_count(), max);
            self.finish_run(session, &message).await
        } else if text == texts::START_GAME || text.contains(texts::CONTINUE_GAME) {
            self.start_puzzle(session).await
        } else if text.contains(texts::NEXT_PUZZLE) {
            self.next_puzzle(session).await
        } else if text.contains(texts::HINT) {
            self.show_hint(session).await?;
            Ok(DialogState::PuzzleGame)
        } else {
            self.check_answer(session, text).await
        }
    }

    /// Greeting shown on entering the contest, depending on progress so far
    pub(super) async fn send_puzzle_intro(&self, session: &Session) -> BotResult<()> {
        let text = match session.success_count() {
            0 => texts::FRESH_INTRO.to_string(),
            solved if solved < self.config.max_puzzles => texts::partial_intro(solved),
            _ => return Ok(()),
        };
        self.transport
            .send_text(session.chat_id, &text, Markup::None)
            .await?;
        Ok(())
    }

    /// Show the current puzzle and arm the in-game reminder
    pub(super) async fn start_puzzle(&self, session: &mut Session) -> BotResult<DialogState> {
        let chat_id = session.chat_id;

        if session.success_count() >= self.config.max_puzzles {
            let text = texts::already_qualified(&self.config.stand_label);
            self.transport
                .send_text(chat_id, &text, Markup::None)
                .await?;
            return self.leave_game(session).await;
        }

        if session.puzzle.is_some_and(|id| session.solved.contains(&id)) {
            let fresh = self.content.random_unsolved(&session.solved).map(|p| p.id);
            session.assign_puzzle(fresh);
        }
        let Some(puzzle) = session.puzzle.and_then(|id| self.content.puzzle(id)) else {
            self.flash_notice(chat_id, texts::NO_PUZZLES).await?;
            return self.leave_game(session).await;
        };

        self.scheduler
            .schedule(
                JobKey::new(chat_id, PUZZLE_REMINDER),
                FireMode::Repeating {
                    every: self.config.reminder_interval,
                },
                session.reminder_context(),
            )
            .await;
        session.puzzle_solved = false;
        self.show_puzzle(session, &puzzle, Some(texts::PUZZLE_HELP))
            .await?;
        Ok(DialogState::PuzzleGame)
    }

    async fn show_puzzle(
        &self,
        session: &mut Session,
        puzzle: &Puzzle,
        help: Option<&str>,
    ) -> BotResult<()> {
        let photo = self.content.photo(puzzle).await?;
        let caption = [Some(puzzle.text.as_str()), help]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        self.transport
            .send_photo(session.chat_id, photo, &caption, texts::puzzle_keyboard())
            .await?;
        session.puzzle = Some(puzzle.id);
        session.puzzle_presented_at = Some(Utc::now());
        tracing::debug!("Chat {} shown puzzle {}", session.chat_id, puzzle.id);
        Ok(())
    }

    async fn show_hint(&self, session: &Session) -> BotResult<()> {
        let hint = session
            .puzzle
            .and_then(|id| self.content.puzzle(id))
            .and_then(|p| p.hint)
            .filter(|hint| !hint.trim().is_empty());
        self.transport
            .send_text(
                session.chat_id,
                hint.as_deref().unwrap_or(texts::NO_HINT),
                texts::puzzle_keyboard(),
            )
            .await?;
        Ok(())
    }

    /// "Continue" after a correct answer
    async fn next_puzzle(&self, session: &mut Session) -> BotResult<DialogState> {
        let solved = session.success_count();
        let max = self.config.max_puzzles;

        if solved >= max {
            let message = texts::qualified(&self.config.stand_label);
            return self.finish_run(session, &message).await;
        }

        let next = if solved >= self.content.puzzle_count() {
            None
        } else {
            self.content.random_unsolved(&session.solved)
        };
        let Some(puzzle) = next else {
            return self
                .finish_run(session, &texts::none_left(solved, max))
                .await;
        };

        session.assign_puzzle(Some(puzzle.id));
        self.show_puzzle(session, &puzzle, None).await?;
        Ok(DialogState::PuzzleGame)
    }

    async fn check_answer(&self, session: &mut Session, text: &str) -> BotResult<DialogState> {
        let chat_id = session.chat_id;
        let max = self.config.max_puzzles;

        if session.success_count() >= max {
            let message = texts::qualified(&self.config.stand_label);
            return self.finish_run(session, &message).await;
        }

        let Some(puzzle) = session.puzzle.and_then(|id| self.content.puzzle(id)) else {
            self.flash_notice(chat_id, texts::NO_PUZZLES).await?;
            return self.leave_game(session).await;
        };

        if answer::is_correct(text, &puzzle.answers) {
            if !session.solved.contains(&puzzle.id) {
                self.record_attempt(session, &puzzle, text, true).await?;
                session.solved.insert(puzzle.id);
                tracing::info!(
                    "Chat {} solved puzzle {} ({} of {})",
                    chat_id,
                    puzzle.id,
                    session.success_count(),
                    max
                );
            }
            session.puzzle_solved = true;
            self.transport
                .send_text(
                    chat_id,
                    texts::CORRECT_ANSWER,
                    texts::continue_keyboard(session.success_count(), max),
                )
                .await?;
        } else if !session.puzzle_solved {
            self.record_attempt(session, &puzzle, text, false).await?;
            self.transport
                .send_text(chat_id, texts::WRONG_ANSWER, texts::puzzle_keyboard())
                .await?;
        }

        Ok(DialogState::PuzzleGame)
    }

    async fn record_attempt(
        &self,
        session: &Session,
        puzzle: &Puzzle,
        text: &str,
        success: bool,
    ) -> BotResult<()> {
        let attempt = PuzzleAttempt::new(
            puzzle.id,
            session.chat_id,
            text.to_string(),
            success,
            session.puzzle_presented_at,
        );
        self.store.record_attempt(attempt).await?;
        Ok(())
    }

    /// End the run with `message` and leave the game
    async fn finish_run(&self, session: &mut Session, message: &str) -> BotResult<DialogState> {
        self.transport
            .send_text(session.chat_id, message, Markup::None)
            .await?;
        self.leave_game(session).await
    }

    async fn leave_game(&self, session: &mut Session) -> BotResult<DialogState> {
        self.scheduler
            .cancel(&JobKey::new(session.chat_id, PUZZLE_REMINDER))
            .await;
        self.end_competition(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContent;
    use crate::report::TracingReporter;
    use crate::store::MemoryStore;
    use crate::transport::{RecordingTransport, Sent};
    use chrono::Duration;

    fn puzzle(id: PuzzleId, answer: &str, hint: Option<&str>) -> Puzzle {
        Puzzle {
            id,
            image: format!("rebus_{}.png", id),
            text: String::new(),
            hint: hint.map(str::to_string),
            answers: vec![answer.to_string()],
            published: true,
        }
    }

    async fn playing(
        puzzles: Vec<Puzzle>,
        max_puzzles: usize,
    ) -> (Arc<DialogEngine>, Arc<MemoryStore>, Arc<RecordingTransport>) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let config = GameConfig {
            max_puzzles,
            error_notice_ttl: std::time::Duration::ZERO,
            ..GameConfig::default()
        };
        let engine = DialogEngine::start(
            store.clone(),
            Arc::new(StaticContent::new(puzzles, None)),
            transport.clone(),
            Arc::new(TracingReporter),
            config,
        );
        open_window(&store).await;
        store.get_or_create(9).await.unwrap();
        store.set_state(9, DialogState::PuzzleGame).await.unwrap();
        engine.handle(ChatEvent::text(9, texts::START_GAME)).await;
        (engine, store, transport)
    }

    async fn open_window(store: &MemoryStore) {
        let now = Utc::now();
        store
            .add_window(ContestWindow::new(
                "Day",
                now - Duration::hours(1),
                now + Duration::hours(2),
            ))
            .await
            .unwrap();
    }

    async fn current_puzzle(store: &MemoryStore) -> PuzzleId {
        store
            .participant(9)
            .await
            .unwrap()
            .unwrap()
            .current_puzzle
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_shows_photo_and_arms_reminder() {
        let (engine, store, transport) = playing(vec![puzzle(1, "кот", None)], 10).await;

        assert!(matches!(
            transport.last_to(9).await.unwrap(),
            Sent::Photo { ref caption, .. } if caption == texts::PUZZLE_HELP
        ));
        assert!(
            engine
                .scheduler()
                .is_scheduled(&JobKey::new(9, PUZZLE_REMINDER))
                .await
        );
        let participant = store.participant(9).await.unwrap().unwrap();
        assert_eq!(participant.current_puzzle, Some(1));
        assert!(participant.puzzle_presented_at.is_some());
    }

    #[tokio::test]
    async fn test_wrong_then_right_answer() {
        let (engine, store, transport) = playing(vec![puzzle(1, "кот", None)], 10).await;

        engine.handle(ChatEvent::text(9, "собака")).await;
        assert_eq!(
            transport.last_to(9).await.unwrap().text(),
            Some(texts::WRONG_ANSWER)
        );

        engine.handle(ChatEvent::text(9, "Кот!")).await;
        assert!(matches!(
            transport.last_to(9).await.unwrap(),
            Sent::Text { ref markup, .. } if *markup == texts::continue_keyboard(1, 10)
        ));

        let attempts = store.attempts_for(9).await;
        assert_eq!(attempts.len(), 2);
        assert!(!attempts[0].success);
        assert!(attempts[1].success);
        assert!(attempts.iter().all(|a| a.presented_at.is_some()));
        assert!(store.participant(9).await.unwrap().unwrap().current_puzzle_solved);
    }

    #[tokio::test]
    async fn test_wrong_answer_after_solving_is_ignored() {
        let (engine, store, transport) =
            playing(vec![puzzle(1, "кот", None), puzzle(2, "дом", None)], 10).await;
        let answer = if current_puzzle(&store).await == 1 { "кот" } else { "дом" };

        engine.handle(ChatEvent::text(9, answer)).await;
        let before = transport.sent_to(9).await.len();
        engine.handle(ChatEvent::text(9, "мимо")).await;
        engine.handle(ChatEvent::text(9, answer)).await;

        let attempts = store.attempts_for(9).await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(store.solved_puzzles(9).await.unwrap().len(), 1);
        // Only the repeated correct answer got a reply
        assert_eq!(transport.sent_to(9).await.len(), before + 1);
    }

    #[tokio::test]
    async fn test_hint_and_missing_hint() {
        let (engine, _store, transport) =
            playing(vec![puzzle(1, "кот", Some("Мяукает"))], 10).await;
        engine.handle(ChatEvent::text(9, texts::HINT_BUTTON)).await;
        assert_eq!(transport.last_to(9).await.unwrap().text(), Some("Мяукает"));

        let (engine, _store, transport) = playing(vec![puzzle(1, "кот", None)], 10).await;
        engine.handle(ChatEvent::text(9, texts::HINT_BUTTON)).await;
        assert_eq!(transport.last_to(9).await.unwrap().text(), Some(texts::NO_HINT));
    }

    #[tokio::test]
    async fn test_reaching_the_cap_finishes_run() {
        let (engine, store, transport) =
            playing(vec![puzzle(1, "кот", None), puzzle(2, "кот", None)], 1).await;

        engine.handle(ChatEvent::text(9, "кот")).await;
        engine
            .handle(ChatEvent::text(9, texts::continue_button(1, 1)))
            .await;

        let texts_sent: Vec<String> = transport
            .sent_to(9)
            .await
            .iter()
            .filter_map(|s| s.text().map(str::to_string))
            .collect();
        assert!(texts_sent.contains(&texts::qualified(&GameConfig::default().stand_label)));
        assert_eq!(texts_sent.last().unwrap(), texts::SELECT_PROMPT);

        let participant = store.participant(9).await.unwrap().unwrap();
        assert_eq!(participant.state, Some(DialogState::SelectCompetition));
        assert_eq!(participant.current_competition, None);
        assert!(
            !engine
                .scheduler()
                .is_scheduled(&JobKey::new(9, PUZZLE_REMINDER))
                .await
        );
    }

    #[tokio::test]
    async fn test_pool_exhausted_before_cap() {
        let (engine, store, transport) = playing(vec![puzzle(1, "кот", None)], 10).await;

        engine.handle(ChatEvent::text(9, "кот")).await;
        engine
            .handle(ChatEvent::text(9, texts::continue_button(1, 10)))
            .await;

        assert!(transport
            .sent_to(9)
            .await
            .iter()
            .any(|s| s.text() == Some(texts::none_left(1, 10).as_str())));
        assert_eq!(
            store.participant(9).await.unwrap().unwrap().state,
            Some(DialogState::SelectCompetition)
        );
    }

    #[tokio::test]
    async fn test_end_game_sends_summary() {
        let (engine, store, transport) = playing(vec![puzzle(1, "кот", None)], 10).await;

        engine.handle(ChatEvent::text(9, texts::END_GAME_BUTTON)).await;

        assert!(transport
            .sent_to(9)
            .await
            .iter()
            .any(|s| s.text() == Some(texts::summary(0, 10).as_str())));
        assert_eq!(
            store.participant(9).await.unwrap().unwrap().state,
            Some(DialogState::SelectCompetition)
        );
        assert_eq!(engine.scheduler().job_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_image_is_content_fault() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let mut content = StaticContent::new(vec![puzzle(1, "кот", None)], None);
        content.images.clear();
        let engine = DialogEngine::start(
            store.clone(),
            Arc::new(content),
            transport.clone(),
            Arc::new(TracingReporter),
            GameConfig {
                error_notice_ttl: std::time::Duration::ZERO,
                ..GameConfig::default()
            },
        );
        open_window(&store).await;
        store.get_or_create(9).await.unwrap();
        store.set_state(9, DialogState::PuzzleGame).await.unwrap();

        engine.handle(ChatEvent::text(9, texts::START_GAME)).await;

        assert!(transport
            .sent_to(9)
            .await
            .iter()
            .any(|s| s.text() == Some(texts::CONTENT_MISSING)));
        assert_eq!(
            store.participant(9).await.unwrap().unwrap().state,
            Some(DialogState::SelectCompetition)
        );
        assert_eq!(engine.scheduler().job_count().await, 0);
    }
}
