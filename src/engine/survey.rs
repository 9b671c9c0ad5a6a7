use super::*;
use crate::store::SurveyPointer;
use crate::survey::{NavigationError, Selection};
use chrono::Utc;

impl DialogEngine {
    pub(super) async fn handle_survey(
        &self,
        session: &mut Session,
        event: &ChatEvent,
    ) -> BotResult<DialogState> {
        match &event.kind {
            EventKind::Text(text) => self.handle_survey_text(session, text).await,
            EventKind::PollAnswer(option_ids) if !option_ids.is_empty() => {
                self.answer_survey(session, Selection::PollOptions(option_ids))
                    .await
            }
            _ => Ok(DialogState::Survey),
        }
    }

    async fn handle_survey_text(
        &self,
        session: &mut Session,
        text: &str,
    ) -> BotResult<DialogState> {
        let chat_id = session.chat_id;

        if text == texts::SURVEY_START || text == texts::SURVEY_RESTART {
            // Load the definition first so a broken file leaves no empty run behind
            let survey = self.content.survey().await?;
            let response = self.store.start_response(chat_id).await?;
            tracing::info!("Chat {} started survey run {}", chat_id, response.id);
            session.survey = Some(SurveyPointer {
                response_id: response.id,
                position: 0,
                asked_at: None,
            });
            self.ask(session, &survey, 0).await?;
            return Ok(DialogState::Survey);
        }

        if text.contains(texts::SURVEY_FINISH) || text.contains(texts::SURVEY_DECLINE) {
            self.store.discard_active_response(chat_id).await?;
            return self.end_competition(session).await;
        }

        if session.survey.is_none() {
            let finished_before = self.store.has_finished_survey(chat_id).await?;
            self.show_survey_start(chat_id, finished_before).await?;
            return Ok(DialogState::Survey);
        }

        self.answer_survey(session, Selection::Text(text)).await
    }

    async fn answer_survey(
        &self,
        session: &mut Session,
        selection: Selection<'_>,
    ) -> BotResult<DialogState> {
        let chat_id = session.chat_id;
        let Some(pointer) = session.survey.clone() else {
            return Ok(DialogState::Survey);
        };
        let survey = self.content.survey().await?;

        let step = match survey.advance(pointer.position, selection) {
            Ok(step) => step,
            Err(NavigationError::NoSuchNode(position)) => {
                return Err(ContentError::SurveyMalformed(format!(
                    "run {} points at missing question {}",
                    pointer.response_id, position
                ))
                .into());
            }
            Err(_) => {
                // Unrecognized input: ask the same question again
                self.ask(session, &survey, pointer.position).await?;
                return Ok(DialogState::Survey);
            }
        };

        let pair = survey.answer_pair(pointer.position, &step, pointer.asked_at, Utc::now());
        self.store.append_answer(&pointer.response_id, pair).await?;

        if survey.is_complete_at(step.next) {
            self.store.finish_response(chat_id, step.next).await?;
            tracing::info!("Chat {} finished survey run {}", chat_id, pointer.response_id);
            let text = texts::survey_done(&self.config.stand_label);
            self.transport
                .send_text(chat_id, &text, Markup::Remove)
                .await?;
            return self.end_competition(session).await;
        }

        self.ask(session, &survey, step.next).await?;
        Ok(DialogState::Survey)
    }

    /// Send the question at `position` and move the pointer there
    async fn ask(
        &self,
        session: &mut Session,
        survey: &Survey,
        position: usize,
    ) -> BotResult<()> {
        let chat_id = session.chat_id;
        let node = survey.node(position).ok_or_else(|| {
            ContentError::SurveyMalformed(format!("no question at position {}", position))
        })?;
        let values: Vec<String> = node.options().iter().map(|o| o.value.clone()).collect();

        match node.kind() {
            QuestionKind::Poll => {
                self.transport
                    .send_native_poll(
                        chat_id,
                        &node.question,
                        &values,
                        texts::survey_finish_keyboard(),
                    )
                    .await?;
            }
            QuestionKind::SingleChoice => {
                self.transport
                    .send_text(chat_id, &node.question, Markup::row(&values))
                    .await?;
            }
            QuestionKind::FreeText => {
                self.transport
                    .send_text(chat_id, &node.question, texts::survey_finish_keyboard())
                    .await?;
            }
        }

        if let Some(pointer) = session.survey.as_mut() {
            pointer.position = position;
            pointer.asked_at = Some(Utc::now());
        }
        Ok(())
    }
}
