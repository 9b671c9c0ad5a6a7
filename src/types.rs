use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types
pub type ChatId = i64;
pub type MessageId = i64;
pub type PuzzleId = u32;
pub type AttemptId = String;
pub type ResponseId = String;
pub type WindowId = String;

/// Persisted dialog state; decides which handler gets the next event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogState {
    Start,
    Auth,
    SelectCompetition,
    PuzzleGame,
    Survey,
}

impl DialogState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogState::Start => "START",
            DialogState::Auth => "AUTH",
            DialogState::SelectCompetition => "SELECT_COMPETITION",
            DialogState::PuzzleGame => "PUZZLE_GAME",
            DialogState::Survey => "SURVEY",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Competition {
    Puzzle,
    Survey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub chat_id: ChatId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    /// None for a participant that never finished an event
    #[serde(default)]
    pub state: Option<DialogState>,
    #[serde(default)]
    pub current_competition: Option<Competition>,
    #[serde(default)]
    pub current_puzzle: Option<PuzzleId>,
    #[serde(default)]
    pub current_puzzle_solved: bool,
    /// When the current puzzle was last shown (attempt log timestamp)
    #[serde(default)]
    pub puzzle_presented_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exclude_from_report: bool,
    pub created_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            full_name: String::new(),
            phone_number: String::new(),
            state: None,
            current_competition: None,
            current_puzzle: None,
            current_puzzle_solved: false,
            puzzle_presented_at: None,
            exclude_from_report: false,
            created_at: Utc::now(),
        }
    }

    pub fn has_phone(&self) -> bool {
        !self.phone_number.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Puzzle {
    pub id: PuzzleId,
    /// URL or path relative to the media directory
    pub image: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub hint: Option<String>,
    pub answers: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

/// One submitted answer; append-only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PuzzleAttempt {
    pub id: AttemptId,
    pub puzzle_id: PuzzleId,
    pub chat_id: ChatId,
    pub answer: String,
    pub success: bool,
    pub presented_at: Option<DateTime<Utc>>,
    pub answered_at: DateTime<Utc>,
}

impl PuzzleAttempt {
    pub fn new(
        puzzle_id: PuzzleId,
        chat_id: ChatId,
        answer: String,
        success: bool,
        presented_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            puzzle_id,
            chat_id,
            answer,
            success,
            presented_at,
            answered_at: Utc::now(),
        }
    }
}

/// A scheduled [start, end) interval during which the puzzle contest runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContestWindow {
    #[serde(default = "new_window_id")]
    pub id: WindowId,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

fn new_window_id() -> WindowId {
    ulid::Ulid::new().to_string()
}

impl ContestWindow {
    pub fn new(title: impl Into<String>, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Self {
        Self {
            id: new_window_id(),
            title: title.into(),
            start_at,
            end_at,
        }
    }

    pub fn overlaps(&self, other: &ContestWindow) -> bool {
        self.start_at <= other.end_at && other.start_at <= self.end_at
    }
}

// ========== Survey ==========

/// Edge of the survey graph: picking `value` leads to node `next_question`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveyOption {
    pub value: String,
    pub next_question: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    FreeText,
    /// Reply keyboard, one option per button
    SingleChoice,
    /// Native poll with multiple answers allowed
    Poll,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveyNode {
    pub question: String,
    #[serde(rename = "answer options", default)]
    pub answer_options: Vec<SurveyOption>,
    #[serde(rename = "poll options", default)]
    pub poll_options: Vec<SurveyOption>,
}

impl SurveyNode {
    pub fn kind(&self) -> QuestionKind {
        if !self.poll_options.is_empty() {
            QuestionKind::Poll
        } else if !self.answer_options.is_empty() {
            QuestionKind::SingleChoice
        } else {
            QuestionKind::FreeText
        }
    }

    /// Outgoing edges for the node's kind (empty for free text)
    pub fn options(&self) -> &[SurveyOption] {
        match self.kind() {
            QuestionKind::Poll => &self.poll_options,
            QuestionKind::SingleChoice => &self.answer_options,
            QuestionKind::FreeText => &[],
        }
    }
}

/// Survey graph; nodes are addressed by their position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Survey {
    pub nodes: Vec<SurveyNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaPair {
    pub node: usize,
    pub question: String,
    pub answer: String,
    pub asked_at: Option<DateTime<Utc>>,
    pub answered_at: DateTime<Utc>,
}

/// One participant's survey run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurveyResponse {
    pub id: ResponseId,
    pub chat_id: ChatId,
    pub current_node: usize,
    #[serde(default)]
    pub asked_at: Option<DateTime<Utc>>,
    pub finished: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answers: Vec<QaPair>,
}

impl SurveyResponse {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            chat_id,
            current_node: 0,
            asked_at: None,
            finished: false,
            started_at: Utc::now(),
            ended_at: None,
            answers: Vec::new(),
        }
    }
}
