//! Per-event working copy of a participant's dialog data
//!
//! A [`Session`] is assembled from the store when an event arrives, handed
//! to exactly one handler, and written back as a single [`SessionCommit`].

use crate::content::ContentSource;
use crate::store::{SessionCommit, StoreResult, SurveyPointer, UserStore};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub chat_id: ChatId,
    pub competition: Option<Competition>,
    /// Puzzle on screen, or the next one to show
    pub puzzle: Option<PuzzleId>,
    pub puzzle_solved: bool,
    pub puzzle_presented_at: Option<DateTime<Utc>>,
    /// Distinct puzzles answered correctly
    pub solved: HashSet<PuzzleId>,
    pub survey: Option<SurveyPointer>,
}

/// Immutable copy of the session handed to a reminder job
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderContext {
    pub chat_id: ChatId,
    pub competition: Option<Competition>,
}

impl Session {
    /// Session after a reset: no competition, no puzzle, no survey position
    pub fn fresh(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            competition: None,
            puzzle: None,
            puzzle_solved: false,
            puzzle_presented_at: None,
            solved: HashSet::new(),
            survey: None,
        }
    }

    /// Fresh session that also rewinds an unfinished survey to its first node
    pub async fn reset(store: &dyn UserStore, chat_id: ChatId) -> StoreResult<Self> {
        let mut session = Self::fresh(chat_id);
        session.survey = store
            .active_response(chat_id)
            .await?
            .map(|response| SurveyPointer {
                response_id: response.id,
                position: 0,
                asked_at: None,
            });
        Ok(session)
    }

    pub async fn hydrate(
        store: &dyn UserStore,
        content: &dyn ContentSource,
        participant: &Participant,
    ) -> StoreResult<Self> {
        let chat_id = participant.chat_id;
        let solved = store.solved_puzzles(chat_id).await?;

        // A solved puzzle stays current while its "continue" prompt is pending
        let kept = participant.current_puzzle.filter(|id| {
            content.puzzle(*id).is_some_and(|p| p.published)
                && (!solved.contains(id) || participant.current_puzzle_solved)
        });
        let (puzzle, puzzle_solved, puzzle_presented_at) = match kept {
            Some(id) => (
                Some(id),
                participant.current_puzzle_solved && solved.contains(&id),
                participant.puzzle_presented_at,
            ),
            None => (content.random_unsolved(&solved).map(|p| p.id), false, None),
        };

        let survey = store
            .active_response(chat_id)
            .await?
            .map(|response| SurveyPointer {
                response_id: response.id,
                position: response.current_node,
                asked_at: response.asked_at,
            });

        Ok(Self {
            chat_id,
            competition: participant.current_competition,
            puzzle,
            puzzle_solved,
            puzzle_presented_at,
            solved,
            survey,
        })
    }

    pub fn success_count(&self) -> usize {
        self.solved.len()
    }

    /// Make `puzzle` current and unsolved
    pub fn assign_puzzle(&mut self, puzzle: Option<PuzzleId>) {
        self.puzzle = puzzle;
        self.puzzle_solved = false;
        self.puzzle_presented_at = None;
    }

    pub fn flush(&self, state: DialogState) -> SessionCommit {
        SessionCommit {
            chat_id: self.chat_id,
            state,
            competition: self.competition,
            current_puzzle: self.puzzle,
            puzzle_solved: self.puzzle_solved,
            puzzle_presented_at: self.puzzle_presented_at,
            survey: self.survey.clone(),
        }
    }

    pub fn reminder_context(&self) -> ReminderContext {
        ReminderContext {
            chat_id: self.chat_id,
            competition: self.competition,
        }
    }
}
