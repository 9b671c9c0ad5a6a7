//! Participant records, attempt and survey logs, contest windows

mod memory;
pub mod snapshot;

pub use memory::MemoryStore;

use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Contest window '{0}' must start before it ends")]
    InvalidWindow(String),

    #[error("Contest window '{new}' overlaps existing window '{existing}'")]
    OverlappingWindow { new: String, existing: String },

    #[error("Survey response not found: {0}")]
    ResponseNotFound(ResponseId),

    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Snapshot rejected: {0}")]
    Snapshot(String),
}

/// Profile fields captured during authorization
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileUpdate {
    Phone(String),
    FullName(String),
}

/// Where the participant stands in their unfinished survey
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyPointer {
    pub response_id: ResponseId,
    pub position: usize,
    pub asked_at: Option<DateTime<Utc>>,
}

/// Everything the dialog layer writes back after one event, applied at once
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCommit {
    pub chat_id: ChatId,
    pub state: DialogState,
    pub competition: Option<Competition>,
    pub current_puzzle: Option<PuzzleId>,
    pub puzzle_solved: bool,
    pub puzzle_presented_at: Option<DateTime<Utc>>,
    pub survey: Option<SurveyPointer>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_or_create(&self, chat_id: ChatId) -> StoreResult<Participant>;

    async fn participant(&self, chat_id: ChatId) -> StoreResult<Option<Participant>>;

    async fn update_profile(&self, chat_id: ChatId, update: ProfileUpdate) -> StoreResult<()>;

    /// Overwrite only the dialog state (error recovery)
    async fn set_state(&self, chat_id: ChatId, state: DialogState) -> StoreResult<()>;

    /// Apply the session fields and the new dialog state in one write
    async fn commit(&self, commit: SessionCommit) -> StoreResult<()>;

    async fn record_attempt(&self, attempt: PuzzleAttempt) -> StoreResult<()>;

    /// Puzzles this participant answered correctly at least once
    async fn solved_puzzles(&self, chat_id: ChatId) -> StoreResult<HashSet<PuzzleId>>;

    async fn active_response(&self, chat_id: ChatId) -> StoreResult<Option<SurveyResponse>>;

    /// Drop any unfinished response and open a fresh one at node 0
    async fn start_response(&self, chat_id: ChatId) -> StoreResult<SurveyResponse>;

    async fn append_answer(&self, response_id: &ResponseId, pair: QaPair) -> StoreResult<()>;

    /// Mark the unfinished response finished; false if there was none
    async fn finish_response(&self, chat_id: ChatId, position: usize) -> StoreResult<bool>;

    /// Delete the unfinished response; false if there was none
    async fn discard_active_response(&self, chat_id: ChatId) -> StoreResult<bool>;

    async fn has_finished_survey(&self, chat_id: ChatId) -> StoreResult<bool>;

    /// Add a window; rejects empty ranges and overlaps
    async fn add_window(&self, window: ContestWindow) -> StoreResult<()>;

    /// The open window at `now`, otherwise the earliest upcoming one
    async fn find_window(&self, now: DateTime<Utc>) -> StoreResult<Option<ContestWindow>>;
}
