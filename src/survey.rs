//! Survey graph navigation
//!
//! A survey is a list of question nodes addressed by position. Free-text
//! nodes continue to the next position; choice and poll nodes name the next
//! node on each option. Reaching `nodes.len()` means the survey is complete.

use crate::types::{QaPair, QuestionKind, Survey, SurveyNode};
use chrono::{DateTime, Utc};

/// Separator for multi-select poll answers in the answer log
pub const POLL_ANSWER_SEPARATOR: &str = " | ";

/// What the participant picked on the current node
#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    Text(&'a str),
    PollOptions(&'a [usize]),
}

/// Outcome of one navigation step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next: usize,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavigationError {
    #[error("Survey has no question at position {0}")]
    NoSuchNode(usize),
    #[error("Answer does not match any option")]
    UnrecognizedOption,
    #[error("Question expects a poll answer")]
    ExpectedPollAnswer,
}

impl Survey {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, position: usize) -> Option<&SurveyNode> {
        self.nodes.get(position)
    }

    pub fn is_complete_at(&self, position: usize) -> bool {
        position >= self.nodes.len()
    }

    /// Check that every edge points at a node or at the completion position
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("survey has no questions".to_string());
        }
        for (position, node) in self.nodes.iter().enumerate() {
            if node.question.trim().is_empty() {
                return Err(format!("question {} has no text", position));
            }
            for option in node.options() {
                if option.next_question > self.nodes.len() {
                    return Err(format!(
                        "option '{}' of question {} points to missing question {}",
                        option.value, position, option.next_question
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolve the node that follows `position` for the given selection
    pub fn advance(&self, position: usize, selection: Selection<'_>) -> Result<Step, NavigationError> {
        let node = self
            .node(position)
            .ok_or(NavigationError::NoSuchNode(position))?;

        match (node.kind(), selection) {
            (QuestionKind::FreeText, Selection::Text(text)) => Ok(Step {
                next: position + 1,
                answer: text.to_string(),
            }),
            (QuestionKind::SingleChoice, Selection::Text(text)) => node
                .answer_options
                .iter()
                .find(|option| option.value == text)
                .map(|option| Step {
                    next: option.next_question,
                    answer: option.value.clone(),
                })
                .ok_or(NavigationError::UnrecognizedOption),
            (QuestionKind::Poll, Selection::PollOptions(ids)) => {
                let picked: Vec<_> = node
                    .poll_options
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| ids.contains(index))
                    .map(|(_, option)| option)
                    .collect();

                match picked.iter().map(|option| option.next_question).min() {
                    Some(next) => Ok(Step {
                        next,
                        answer: picked
                            .iter()
                            .map(|option| option.value.as_str())
                            .collect::<Vec<_>>()
                            .join(POLL_ANSWER_SEPARATOR),
                    }),
                    None => Ok(Step {
                        next: position + 1,
                        answer: String::new(),
                    }),
                }
            }
            (QuestionKind::Poll, Selection::Text(_)) => Err(NavigationError::ExpectedPollAnswer),
            // A stray poll answer on a text or keyboard question
            (_, Selection::PollOptions(_)) => Err(NavigationError::UnrecognizedOption),
        }
    }

    /// Log entry for answering the node at `position`
    pub fn answer_pair(
        &self,
        position: usize,
        step: &Step,
        asked_at: Option<DateTime<Utc>>,
        answered_at: DateTime<Utc>,
    ) -> QaPair {
        QaPair {
            node: position,
            question: self
                .node(position)
                .map(|node| node.question.clone())
                .unwrap_or_default(),
            answer: step.answer.clone(),
            asked_at,
            answered_at,
        }
    }
}
