//! Per-chat event queues
//!
//! Each chat with pending events gets one worker task that feeds the engine
//! in arrival order. Workers retire after a quiet period and are respawned
//! on the next event for that chat.

use crate::engine::DialogEngine;
use crate::protocol::ChatEvent;
use crate::types::ChatId;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

struct Worker {
    events: mpsc::UnboundedSender<ChatEvent>,
    handle: JoinHandle<()>,
}

pub struct Dispatcher {
    engine: Arc<DialogEngine>,
    workers: Mutex<HashMap<ChatId, Worker>>,
    idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(engine: Arc<DialogEngine>) -> Arc<Self> {
        Self::with_idle_timeout(engine, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(engine: Arc<DialogEngine>, idle_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            engine,
            workers: Mutex::new(HashMap::new()),
            idle_timeout,
        })
    }

    /// Queue an event behind everything already queued for its chat
    pub async fn dispatch(self: &Arc<Self>, event: ChatEvent) {
        let chat_id = event.chat_id;
        let mut workers = self.workers.lock().await;

        let event = match workers.get(&chat_id) {
            Some(worker) => match worker.events.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive until the worker below starts
        let _ = tx.send(event);
        let handle = tokio::spawn(run_worker(
            Arc::downgrade(self),
            self.engine.clone(),
            chat_id,
            rx,
            self.idle_timeout,
        ));
        workers.insert(chat_id, Worker { events: tx, handle });
        tracing::debug!("Started worker for chat {} ({} active)", chat_id, workers.len());
    }

    pub async fn active_workers(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Stop accepting events and wait for queued ones to be processed
    pub async fn shutdown(&self) {
        let workers: Vec<Worker> = self.workers.lock().await.drain().map(|(_, w)| w).collect();
        let handles = workers.into_iter().map(|worker| {
            drop(worker.events);
            worker.handle
        });
        let finished = futures::future::join_all(handles).await;
        tracing::info!("Dispatcher stopped ({} workers drained)", finished.len());
    }
}

async fn run_worker(
    dispatcher: Weak<Dispatcher>,
    engine: Arc<DialogEngine>,
    chat_id: ChatId,
    mut events: mpsc::UnboundedReceiver<ChatEvent>,
    idle_timeout: Duration,
) {
    loop {
        match tokio::time::timeout(idle_timeout, events.recv()).await {
            Ok(Some(event)) => engine.handle(event).await,
            Ok(None) => break,
            Err(_) => {
                let Some(dispatcher) = dispatcher.upgrade() else {
                    break;
                };
                // dispatch() sends under this lock, so nothing can arrive
                // between the emptiness check and the removal
                let mut workers = dispatcher.workers.lock().await;
                if events.is_empty() {
                    workers.remove(&chat_id);
                    tracing::debug!("Worker for chat {} retired", chat_id);
                    break;
                }
            }
        }
    }
}
