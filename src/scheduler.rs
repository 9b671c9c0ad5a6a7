//! Named per-chat reminder jobs
//!
//! Each job is identified by `(chat_id, name)`. Timer tasks never run job
//! logic themselves: every firing is sent as a [`Firing`] message carrying the
//! context captured at schedule time, and the receiver decides what to do with
//! it. That keeps job bodies inside whatever serialization the receiver uses
//! for ordinary chat events.

use crate::types::ChatId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub chat_id: ChatId,
    pub name: String,
}

impl JobKey {
    pub fn new(chat_id: ChatId, name: impl Into<String>) -> Self {
        Self {
            chat_id,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.chat_id, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FireMode {
    /// Fire once at an absolute time (immediately if it already passed)
    Once { at: DateTime<Utc> },
    /// Fire now, then every `every` until cancelled
    Repeating { every: Duration },
}

/// A job firing delivered to the receiver
#[derive(Debug, Clone)]
pub struct Firing<C> {
    pub key: JobKey,
    pub job_id: String,
    pub mode: FireMode,
    pub context: C,
}

struct ScheduledJob {
    id: String,
    cancel: CancellationToken,
}

/// Job table plus the sending half of the firing channel
pub struct Scheduler<C> {
    jobs: Arc<Mutex<HashMap<JobKey, ScheduledJob>>>,
    firings: mpsc::UnboundedSender<Firing<C>>,
}

impl<C> Clone for Scheduler<C> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            firings: self.firings.clone(),
        }
    }
}

impl<C: Clone + Send + 'static> Scheduler<C> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Firing<C>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                jobs: Arc::new(Mutex::new(HashMap::new())),
                firings: tx,
            },
            rx,
        )
    }

    /// Register a job unless one with the same key already exists.
    /// Returns true if a new job was started. A repeating job needs a
    /// non-zero period.
    pub async fn schedule(&self, key: JobKey, mode: FireMode, context: C) -> bool {
        if mode == (FireMode::Repeating { every: Duration::ZERO }) {
            tracing::warn!("Refusing to schedule job {} with a zero period", key);
            return false;
        }

        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&key) {
            tracing::debug!("Job {} already scheduled, skipping", key);
            return false;
        }

        let job_id = ulid::Ulid::new().to_string();
        let cancel = CancellationToken::new();
        jobs.insert(
            key.clone(),
            ScheduledJob {
                id: job_id.clone(),
                cancel: cancel.clone(),
            },
        );
        drop(jobs);

        let firing = Firing {
            key: key.clone(),
            job_id: job_id.clone(),
            mode,
            context,
        };
        let timer = tokio::spawn(run_timer(firing, cancel, self.firings.clone()));

        // A timer that dies must not leave its key blocking later schedules
        let table = self.jobs.clone();
        let watched = key.clone();
        tokio::spawn(async move {
            if let Err(e) = timer.await {
                if e.is_panic() {
                    tracing::error!("Timer for job {} panicked", watched);
                    let mut jobs = table.lock().await;
                    if jobs.get(&watched).is_some_and(|job| job.id == job_id) {
                        jobs.remove(&watched);
                    }
                }
            }
        });

        tracing::info!("Scheduled job {} ({:?})", key, mode);
        true
    }

    /// Remove the job with this key; a missing job is not an error.
    /// Returns true if a job was removed.
    pub async fn cancel(&self, key: &JobKey) -> bool {
        match self.jobs.lock().await.remove(key) {
            Some(job) => {
                job.cancel.cancel();
                tracing::info!("Cancelled job {}", key);
                true
            }
            None => false,
        }
    }

    /// Drop a one-shot job after it fired, unless it was replaced meanwhile
    pub async fn complete(&self, firing: &Firing<C>) {
        let mut jobs = self.jobs.lock().await;
        if jobs.get(&firing.key).map(|job| job.id.as_str()) == Some(firing.job_id.as_str()) {
            jobs.remove(&firing.key);
        }
    }

    /// Whether the job that produced this firing is still registered
    pub async fn is_live(&self, firing: &Firing<C>) -> bool {
        self.jobs
            .lock()
            .await
            .get(&firing.key)
            .is_some_and(|job| job.id == firing.job_id)
    }

    pub async fn is_scheduled(&self, key: &JobKey) -> bool {
        self.jobs.lock().await.contains_key(key)
    }

    #[cfg(test)]
    pub(crate) async fn job_id(&self, key: &JobKey) -> Option<String> {
        self.jobs.lock().await.get(key).map(|job| job.id.clone())
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Cancel every job (shutdown)
    pub async fn cancel_all(&self) {
        let mut jobs = self.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.cancel.cancel();
        }
    }
}

async fn run_timer<C: Clone + Send + 'static>(
    firing: Firing<C>,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Firing<C>>,
) {
    match firing.mode {
        FireMode::Once { at } => {
            let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(firing);
                }
            }
        }
        FireMode::Repeating { every } => {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if tx.send(firing.clone()).is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}
