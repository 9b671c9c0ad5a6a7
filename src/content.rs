//! Puzzle, survey and contest-calendar content
//!
//! Content is static for the life of the process: puzzles and contest windows
//! are read at startup, the survey definition is read on demand so that a
//! missing or broken file only affects the participants who need it.

use crate::types::{ContestWindow, Puzzle, PuzzleId, Survey};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const PUZZLES_FILE: &str = "puzzles.json";
pub const SURVEY_FILE: &str = "survey.json";
pub const CONTESTS_FILE: &str = "contests.json";
pub const MEDIA_DIR: &str = "media";

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Survey definition not found at {0}")]
    SurveyMissing(String),

    #[error("Survey definition is malformed: {0}")]
    SurveyMalformed(String),

    #[error("Puzzle image not found: {0}")]
    ImageMissing(String),

    #[error("Failed to load {path}: {reason}")]
    Load { path: String, reason: String },
}

/// How a puzzle image reaches the transport
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoSource {
    Url(String),
    Upload { file_name: String, bytes: Vec<u8> },
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    fn puzzle(&self, id: PuzzleId) -> Option<Puzzle>;

    /// Number of published puzzles
    fn puzzle_count(&self) -> usize;

    /// Pick uniformly among published puzzles not in `solved`
    fn random_unsolved(&self, solved: &HashSet<PuzzleId>) -> Option<Puzzle>;

    async fn photo(&self, puzzle: &Puzzle) -> Result<PhotoSource, ContentError>;

    async fn survey(&self) -> Result<Arc<Survey>, ContentError>;
}

fn pick_unsolved(puzzles: &[Puzzle], solved: &HashSet<PuzzleId>) -> Option<Puzzle> {
    let fresh: Vec<&Puzzle> = puzzles
        .iter()
        .filter(|p| p.published && !solved.contains(&p.id))
        .collect();
    fresh.choose(&mut rand::rng()).map(|p| (*p).clone())
}

fn is_remote(image: &str) -> bool {
    image.starts_with("http://") || image.starts_with("https://")
}

/// Content read from a directory:
/// `puzzles.json`, `survey.json`, `contests.json` and `media/`
#[derive(Debug, Clone)]
pub struct FileContentSource {
    puzzles: Vec<Puzzle>,
    survey_path: PathBuf,
    media_dir: PathBuf,
}

impl FileContentSource {
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self, ContentError> {
        let dir = dir.as_ref();
        let puzzles_path = dir.join(PUZZLES_FILE);
        let puzzles: Vec<Puzzle> = read_json(&puzzles_path).await?;

        let published = puzzles.iter().filter(|p| p.published).count();
        tracing::info!(
            "Loaded {} puzzles ({} published) from {}",
            puzzles.len(),
            published,
            puzzles_path.display()
        );

        Ok(Self {
            puzzles,
            survey_path: dir.join(SURVEY_FILE),
            media_dir: dir.join(MEDIA_DIR),
        })
    }

    /// Contest windows from `contests.json`; an absent file means no contests
    pub async fn load_windows(dir: impl AsRef<Path>) -> Result<Vec<ContestWindow>, ContentError> {
        let path = dir.as_ref().join(CONTESTS_FILE);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::warn!("No contest calendar at {}", path.display());
            return Ok(Vec::new());
        }
        read_json(&path).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ContentError> {
    let load_error = |reason: String| ContentError::Load {
        path: path.display().to_string(),
        reason,
    };
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| load_error(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| load_error(e.to_string()))
}

#[async_trait]
impl ContentSource for FileContentSource {
    fn puzzle(&self, id: PuzzleId) -> Option<Puzzle> {
        self.puzzles.iter().find(|p| p.id == id).cloned()
    }

    fn puzzle_count(&self) -> usize {
        self.puzzles.iter().filter(|p| p.published).count()
    }

    fn random_unsolved(&self, solved: &HashSet<PuzzleId>) -> Option<Puzzle> {
        pick_unsolved(&self.puzzles, solved)
    }

    async fn photo(&self, puzzle: &Puzzle) -> Result<PhotoSource, ContentError> {
        if is_remote(&puzzle.image) {
            return Ok(PhotoSource::Url(puzzle.image.clone()));
        }

        let path = self.media_dir.join(&puzzle.image);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(PhotoSource::Upload {
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("puzzle-{}", puzzle.id)),
                bytes,
            }),
            Err(e) => {
                tracing::warn!("Puzzle {} image {}: {}", puzzle.id, path.display(), e);
                Err(ContentError::ImageMissing(path.display().to_string()))
            }
        }
    }

    async fn survey(&self) -> Result<Arc<Survey>, ContentError> {
        let bytes = tokio::fs::read(&self.survey_path)
            .await
            .map_err(|_| ContentError::SurveyMissing(self.survey_path.display().to_string()))?;
        let survey: Survey = serde_json::from_slice(&bytes)
            .map_err(|e| ContentError::SurveyMalformed(e.to_string()))?;
        survey.validate().map_err(ContentError::SurveyMalformed)?;
        Ok(Arc::new(survey))
    }
}

/// Content held in memory (dry runs and tests)
#[derive(Debug, Clone, Default)]
pub struct StaticContent {
    pub puzzles: Vec<Puzzle>,
    pub survey: Option<Survey>,
    /// Local images that resolve; anything else is missing
    pub images: HashSet<String>,
}

impl StaticContent {
    pub fn new(puzzles: Vec<Puzzle>, survey: Option<Survey>) -> Self {
        let images = puzzles.iter().map(|p| p.image.clone()).collect();
        Self {
            puzzles,
            survey,
            images,
        }
    }
}

#[async_trait]
impl ContentSource for StaticContent {
    fn puzzle(&self, id: PuzzleId) -> Option<Puzzle> {
        self.puzzles.iter().find(|p| p.id == id).cloned()
    }

    fn puzzle_count(&self) -> usize {
        self.puzzles.iter().filter(|p| p.published).count()
    }

    fn random_unsolved(&self, solved: &HashSet<PuzzleId>) -> Option<Puzzle> {
        pick_unsolved(&self.puzzles, solved)
    }

    async fn photo(&self, puzzle: &Puzzle) -> Result<PhotoSource, ContentError> {
        if is_remote(&puzzle.image) {
            return Ok(PhotoSource::Url(puzzle.image.clone()));
        }
        if self.images.contains(&puzzle.image) {
            Ok(PhotoSource::Upload {
                file_name: puzzle.image.clone(),
                bytes: Vec::new(),
            })
        } else {
            Err(ContentError::ImageMissing(puzzle.image.clone()))
        }
    }

    async fn survey(&self) -> Result<Arc<Survey>, ContentError> {
        let survey = self
            .survey
            .clone()
            .ok_or_else(|| ContentError::SurveyMissing("<static>".to_string()))?;
        survey.validate().map_err(ContentError::SurveyMalformed)?;
        Ok(Arc::new(survey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle(id: PuzzleId, published: bool) -> Puzzle {
        Puzzle {
            id,
            image: format!("rebus_{}.png", id),
            text: String::new(),
            hint: None,
            answers: vec!["ответ".to_string()],
            published,
        }
    }

    #[test]
    fn test_random_unsolved_skips_solved_and_unpublished() {
        let content = StaticContent::new(
            vec![puzzle(1, true), puzzle(2, false), puzzle(3, true)],
            None,
        );
        let solved = HashSet::from([1]);

        for _ in 0..20 {
            assert_eq!(content.random_unsolved(&solved).unwrap().id, 3);
        }
        assert!(content.random_unsolved(&HashSet::from([1, 3])).is_none());
        assert_eq!(content.puzzle_count(), 2);
    }

    #[tokio::test]
    async fn test_file_content_source() {
        let dir = tempfile::tempdir().unwrap();
        let puzzles = serde_json::to_vec(&vec![puzzle(1, true), puzzle(2, true)]).unwrap();
        tokio::fs::write(dir.path().join(PUZZLES_FILE), puzzles)
            .await
            .unwrap();
        tokio::fs::create_dir(dir.path().join(MEDIA_DIR)).await.unwrap();
        tokio::fs::write(dir.path().join(MEDIA_DIR).join("rebus_1.png"), b"png")
            .await
            .unwrap();

        let content = FileContentSource::load(dir.path()).await.unwrap();
        assert_eq!(content.puzzle_count(), 2);

        let photo = content.photo(&content.puzzle(1).unwrap()).await.unwrap();
        assert_eq!(
            photo,
            PhotoSource::Upload {
                file_name: "rebus_1.png".to_string(),
                bytes: b"png".to_vec(),
            }
        );
        assert!(matches!(
            content.photo(&content.puzzle(2).unwrap()).await,
            Err(ContentError::ImageMissing(_))
        ));

        assert!(matches!(
            content.survey().await,
            Err(ContentError::SurveyMissing(_))
        ));

        tokio::fs::write(dir.path().join(SURVEY_FILE), b"{not json")
            .await
            .unwrap();
        assert!(matches!(
            content.survey().await,
            Err(ContentError::SurveyMalformed(_))
        ));

        assert!(FileContentSource::load_windows(dir.path())
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_remote_images_are_sent_by_url() {
        let mut remote = puzzle(5, true);
        remote.image = "https://example.org/rebus.png".to_string();
        let content = StaticContent::default();

        let photo = futures::executor::block_on(content.photo(&remote)).unwrap();
        assert_eq!(photo, PhotoSource::Url("https://example.org/rebus.png".to_string()));
    }
}
