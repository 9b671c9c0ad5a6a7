use super::snapshot::StoreSnapshot;
use super::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Records {
    participants: HashMap<ChatId, Participant>,
    attempts: Vec<PuzzleAttempt>,
    responses: HashMap<ResponseId, SurveyResponse>,
    windows: Vec<ContestWindow>,
    /// Successful puzzles per chat, derived from `attempts`
    solved: HashMap<ChatId, HashSet<PuzzleId>>,
    /// Bumped on every persisted change
    revision: u64,
}

/// Serialized state waiting to be written
struct PendingSnapshot {
    revision: u64,
    json: Vec<u8>,
}

impl Records {
    fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut records = Self {
            participants: snapshot.participants,
            attempts: snapshot.attempts,
            responses: snapshot.responses,
            windows: snapshot.windows,
            ..Self::default()
        };
        for attempt in records.attempts.iter().filter(|a| a.success) {
            records
                .solved
                .entry(attempt.chat_id)
                .or_default()
                .insert(attempt.puzzle_id);
        }
        records
    }

    fn participant_mut(&mut self, chat_id: ChatId) -> &mut Participant {
        self.participants
            .entry(chat_id)
            .or_insert_with(|| Participant::new(chat_id))
    }

    fn active_response_mut(&mut self, chat_id: ChatId) -> Option<&mut SurveyResponse> {
        self.responses
            .values_mut()
            .find(|r| r.chat_id == chat_id && !r.finished)
    }

    fn active_response_id(&self, chat_id: ChatId) -> Option<ResponseId> {
        self.responses
            .values()
            .find(|r| r.chat_id == chat_id && !r.finished)
            .map(|r| r.id.clone())
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::new(
            self.participants.clone(),
            self.attempts.clone(),
            self.responses.clone(),
            self.windows.clone(),
        )
    }
}

/// In-memory store, optionally mirrored to a JSON snapshot file.
///
/// All records sit behind one lock so that a [`SessionCommit`] is applied
/// as a single write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
    snapshot_path: Option<PathBuf>,
    /// Revision of the snapshot on disk; serializes file writes
    written: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by `path`, loading the snapshot if one exists
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
                snapshot.validate().map_err(StoreError::Snapshot)?;
                tracing::info!(
                    "Loaded store snapshot from {} ({} participants, exported {})",
                    path.display(),
                    snapshot.participants.len(),
                    snapshot.exported_at
                );
                Records::from_snapshot(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No store snapshot at {}, starting empty", path.display());
                Records::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            records: RwLock::new(records),
            snapshot_path: Some(path),
            written: Mutex::new(0),
        })
    }

    pub async fn export(&self) -> StoreSnapshot {
        self.records.read().await.snapshot()
    }

    pub async fn attempts_for(&self, chat_id: ChatId) -> Vec<PuzzleAttempt> {
        self.records
            .read()
            .await
            .attempts
            .iter()
            .filter(|a| a.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub async fn responses_for(&self, chat_id: ChatId) -> Vec<SurveyResponse> {
        self.records
            .read()
            .await
            .responses
            .values()
            .filter(|r| r.chat_id == chat_id)
            .cloned()
            .collect()
    }

    /// Serialize under the write guard, then release it before touching the
    /// file so other chats are not held up by disk I/O
    async fn persist(&self, mut records: RwLockWriteGuard<'_, Records>) -> StoreResult<()> {
        if self.snapshot_path.is_none() {
            return Ok(());
        }
        records.revision += 1;
        let pending = PendingSnapshot {
            revision: records.revision,
            json: serde_json::to_vec_pretty(&records.snapshot())?,
        };
        drop(records);
        self.write_snapshot(pending).await
    }

    /// Write the snapshot next to the target and rename it into place.
    /// A snapshot older than the one on disk is skipped.
    async fn write_snapshot(&self, pending: PendingSnapshot) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let mut written = self.written.lock().await;
        if pending.revision <= *written {
            return Ok(());
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, pending.json).await?;
        tokio::fs::rename(&tmp, path).await?;
        *written = pending.revision;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_or_create(&self, chat_id: ChatId) -> StoreResult<Participant> {
        if let Some(participant) = self.records.read().await.participants.get(&chat_id) {
            return Ok(participant.clone());
        }

        let mut records = self.records.write().await;
        let created = !records.participants.contains_key(&chat_id);
        let participant = records.participant_mut(chat_id).clone();
        if created {
            tracing::info!("New participant {}", chat_id);
            self.persist(records).await?;
        }
        Ok(participant)
    }

    async fn participant(&self, chat_id: ChatId) -> StoreResult<Option<Participant>> {
        Ok(self.records.read().await.participants.get(&chat_id).cloned())
    }

    async fn update_profile(&self, chat_id: ChatId, update: ProfileUpdate) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let participant = records.participant_mut(chat_id);
        match update {
            ProfileUpdate::Phone(phone) => participant.phone_number = phone,
            ProfileUpdate::FullName(name) => participant.full_name = name,
        }
        self.persist(records).await
    }

    async fn set_state(&self, chat_id: ChatId, state: DialogState) -> StoreResult<()> {
        let mut records = self.records.write().await;
        records.participant_mut(chat_id).state = Some(state);
        self.persist(records).await
    }

    async fn commit(&self, commit: SessionCommit) -> StoreResult<()> {
        let mut records = self.records.write().await;

        let participant = records.participant_mut(commit.chat_id);
        participant.state = Some(commit.state);
        participant.current_competition = commit.competition;
        participant.current_puzzle = commit.current_puzzle;
        participant.current_puzzle_solved = commit.puzzle_solved;
        participant.puzzle_presented_at = commit.puzzle_presented_at;

        // A response finished or discarded during the event keeps its final pointer
        if let Some(pointer) = commit.survey {
            if let Some(response) = records
                .responses
                .get_mut(&pointer.response_id)
                .filter(|r| !r.finished)
            {
                response.current_node = pointer.position;
                response.asked_at = pointer.asked_at;
            }
        }

        self.persist(records).await
    }

    async fn record_attempt(&self, attempt: PuzzleAttempt) -> StoreResult<()> {
        let mut records = self.records.write().await;
        tracing::debug!(
            "Attempt by {} on puzzle {}: success={}",
            attempt.chat_id,
            attempt.puzzle_id,
            attempt.success
        );
        if attempt.success {
            records
                .solved
                .entry(attempt.chat_id)
                .or_default()
                .insert(attempt.puzzle_id);
        }
        records.attempts.push(attempt);
        self.persist(records).await
    }

    async fn solved_puzzles(&self, chat_id: ChatId) -> StoreResult<HashSet<PuzzleId>> {
        Ok(self
            .records
            .read()
            .await
            .solved
            .get(&chat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn active_response(&self, chat_id: ChatId) -> StoreResult<Option<SurveyResponse>> {
        Ok(self
            .records
            .read()
            .await
            .responses
            .values()
            .find(|r| r.chat_id == chat_id && !r.finished)
            .cloned())
    }

    async fn start_response(&self, chat_id: ChatId) -> StoreResult<SurveyResponse> {
        let mut records = self.records.write().await;
        if let Some(stale) = records.active_response_id(chat_id) {
            records.responses.remove(&stale);
        }

        let response = SurveyResponse::new(chat_id);
        records
            .responses
            .insert(response.id.clone(), response.clone());
        self.persist(records).await?;
        Ok(response)
    }

    async fn append_answer(&self, response_id: &ResponseId, pair: QaPair) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let response = records
            .responses
            .get_mut(response_id)
            .ok_or_else(|| StoreError::ResponseNotFound(response_id.clone()))?;
        response.answers.push(pair);
        self.persist(records).await
    }

    async fn finish_response(&self, chat_id: ChatId, position: usize) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let Some(response) = records.active_response_mut(chat_id) else {
            return Ok(false);
        };
        response.current_node = position;
        response.finished = true;
        response.ended_at = Some(Utc::now());
        self.persist(records).await?;
        Ok(true)
    }

    async fn discard_active_response(&self, chat_id: ChatId) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let Some(id) = records.active_response_id(chat_id) else {
            return Ok(false);
        };
        records.responses.remove(&id);
        self.persist(records).await?;
        Ok(true)
    }

    async fn has_finished_survey(&self, chat_id: ChatId) -> StoreResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .responses
            .values()
            .any(|r| r.chat_id == chat_id && r.finished))
    }

    async fn add_window(&self, window: ContestWindow) -> StoreResult<()> {
        if window.start_at >= window.end_at {
            return Err(StoreError::InvalidWindow(window.title));
        }

        let mut records = self.records.write().await;
        // Reloading the calendar after a restart re-adds the same windows
        if records.windows.iter().any(|w| {
            w.title == window.title && w.start_at == window.start_at && w.end_at == window.end_at
        }) {
            return Ok(());
        }
        if let Some(existing) = records.windows.iter().find(|w| w.overlaps(&window)) {
            return Err(StoreError::OverlappingWindow {
                new: window.title,
                existing: existing.title.clone(),
            });
        }

        tracing::info!(
            "Contest window '{}' {} .. {}",
            window.title,
            window.start_at,
            window.end_at
        );
        records.windows.push(window);
        self.persist(records).await
    }

    async fn find_window(&self, now: DateTime<Utc>) -> StoreResult<Option<ContestWindow>> {
        let records = self.records.read().await;
        let open = records
            .windows
            .iter()
            .find(|w| w.start_at <= now && now < w.end_at);
        let upcoming = || {
            records
                .windows
                .iter()
                .filter(|w| w.start_at > now)
                .min_by_key(|w| w.start_at)
        };
        Ok(open.or_else(upcoming).cloned())
    }
}
