use super::*;
use crate::contest::{self, WindowStatus};
use crate::scheduler::FireMode;
use chrono::Utc;

impl DialogEngine {
    pub(super) async fn handle_select(
        &self,
        session: &mut Session,
        event: &ChatEvent,
    ) -> BotResult<DialogState> {
        let chat_id = session.chat_id;
        let EventKind::Text(text) = &event.kind else {
            return Ok(DialogState::SelectCompetition);
        };

        if text.contains(texts::SURVEY_CHOICE) {
            session.competition = Some(Competition::Survey);
            let finished_before = self.store.has_finished_survey(chat_id).await?;
            self.show_survey_start(chat_id, finished_before).await?;
            return Ok(DialogState::Survey);
        }

        if !text.contains(texts::PUZZLE_CHOICE) {
            self.show_selection(chat_id, texts::SELECT_PROMPT).await?;
            return Ok(DialogState::SelectCompetition);
        }

        session.competition = Some(Competition::Puzzle);
        let now = Utc::now();
        let window = self.store.find_window(now).await?;

        match window.map(|w| (contest::status_of(&w, now), w)) {
            Some((WindowStatus::Open, _)) => {
                self.send_puzzle_intro(session).await?;
                self.start_puzzle(session).await
            }
            Some((WindowStatus::Upcoming, window)) => {
                self.scheduler
                    .schedule(
                        JobKey::new(chat_id, CONTEST_START_NOTICE),
                        FireMode::Once {
                            at: window.start_at,
                        },
                        session.reminder_context(),
                    )
                    .await;
                if let Some(left) = contest::remaining(&window, now) {
                    self.show_selection(chat_id, &contest::waiting_for_start_message(left))
                        .await?;
                }
                Ok(DialogState::SelectCompetition)
            }
            Some((WindowStatus::Closed, _)) | None => {
                self.show_selection(chat_id, texts::NO_CONTESTS).await?;
                Ok(DialogState::SelectCompetition)
            }
        }
    }

    pub(super) async fn show_survey_start(
        &self,
        chat_id: ChatId,
        finished_before: bool,
    ) -> BotResult<()> {
        let text = if finished_before {
            texts::SURVEY_REPEAT.to_string()
        } else {
            texts::survey_intro(&self.config.stand_label)
        };
        self.transport
            .send_text(chat_id, &text, texts::survey_start_keyboard(finished_before))
            .await?;
        Ok(())
    }
}
