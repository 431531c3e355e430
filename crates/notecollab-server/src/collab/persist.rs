//! Background persistence of live edits.
//!
//! The hub hands every accepted edit to this worker over an unbounded
//! channel and moves on. The worker keeps only the latest payload per note
//! and writes it through [`NoteStore::update_content`] when the note has
//! been quiet for the quiescence interval, when its oldest unwritten edit
//! reaches the maximum delay, on an explicit flush, and on shutdown.
//!
//! Failed writes are logged and counted. They are not retried and never
//! affect broadcasting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notecollab_core::NoteId;
use notecollab_store::NoteStore;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Persistence worker errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistError {
    /// `start` was already called.
    #[error("worker already running")]
    AlreadyRunning,
}

/// Counters for completed write attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub writes: u64,
    pub failures: u64,
}

enum PersistCommand {
    Edit { note_id: NoteId, payload: Arc<Value> },
    Flush(NoteId),
}

/// Cloneable sender side of the worker.
#[derive(Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
    stats: Arc<Mutex<PersistStats>>,
}

impl PersistHandle {
    /// Buffer the latest payload of a note. Never blocks.
    pub fn submit(&self, note_id: NoteId, payload: Arc<Value>) {
        if self.tx.send(PersistCommand::Edit { note_id, payload }).is_err() {
            warn!(note_id = %note_id, "Persistence worker stopped, edit not persisted");
        }
    }

    /// Write the note's pending payload, if any, without waiting for quiescence.
    pub fn flush(&self, note_id: NoteId) {
        if self.tx.send(PersistCommand::Flush(note_id)).is_err() {
            warn!(note_id = %note_id, "Persistence worker stopped, flush dropped");
        }
    }

    pub fn stats(&self) -> PersistStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }
}

impl std::fmt::Debug for PersistHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistHandle")
            .field("stats", &self.stats())
            .finish()
    }
}

struct Pending {
    payload: Arc<Value>,
    first_edit: Instant,
    last_edit: Instant,
}

impl Pending {
    fn due_at(&self, quiescence: Duration, max_delay: Duration) -> Instant {
        (self.last_edit + quiescence).min(self.first_edit + max_delay)
    }
}

/// Content stored for a payload: strings verbatim, anything else as JSON text.
pub fn content_of(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Background task writing buffered edits to the note store.
pub struct PersistenceWorker {
    notes: Arc<dyn NoteStore>,
    rx: Option<mpsc::UnboundedReceiver<PersistCommand>>,
    handle: PersistHandle,
    quiescence: Duration,
    max_delay: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl PersistenceWorker {
    pub fn new(notes: Arc<dyn NoteStore>, quiescence: Duration, max_delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            notes,
            rx: Some(rx),
            handle: PersistHandle {
                tx,
                stats: Arc::new(Mutex::new(PersistStats::default())),
            },
            quiescence,
            max_delay,
            shutdown_tx,
        }
    }

    /// Sender handle for the hub and the gateway.
    pub fn handle(&self) -> PersistHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> PersistStats {
        self.handle.stats()
    }

    /// Spawn the worker loop.
    ///
    /// The task ends after a shutdown signal, or once every handle is
    /// dropped, writing whatever is still pending first.
    pub fn start(&mut self) -> Result<tokio::task::JoinHandle<()>, PersistError> {
        let mut rx = self.rx.take().ok_or(PersistError::AlreadyRunning)?;
        let notes = self.notes.clone();
        let stats = self.handle.stats.clone();
        let quiescence = self.quiescence;
        let max_delay = self.max_delay;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        Ok(tokio::spawn(async move {
            let mut pending: HashMap<NoteId, Pending> = HashMap::new();
            let mut shutdown_open = true;

            loop {
                let next_due = pending
                    .values()
                    .map(|p| p.due_at(quiescence, max_delay))
                    .min();

                tokio::select! {
                    command = rx.recv() => match command {
                        Some(PersistCommand::Edit { note_id, payload }) => {
                            let now = Instant::now();
                            pending
                                .entry(note_id)
                                .and_modify(|p| {
                                    p.payload = payload.clone();
                                    p.last_edit = now;
                                })
                                .or_insert(Pending {
                                    payload,
                                    first_edit: now,
                                    last_edit: now,
                                });
                        }
                        Some(PersistCommand::Flush(note_id)) => {
                            if let Some(p) = pending.remove(&note_id) {
                                write(notes.as_ref(), &stats, note_id, &p.payload, "flush").await;
                            }
                        }
                        None => break,
                    },
                    _ = sleep_until(next_due), if next_due.is_some() => {
                        let now = Instant::now();
                        let due: Vec<NoteId> = pending
                            .iter()
                            .filter(|(_, p)| p.due_at(quiescence, max_delay) <= now)
                            .map(|(id, _)| *id)
                            .collect();
                        for note_id in due {
                            if let Some(p) = pending.remove(&note_id) {
                                write(notes.as_ref(), &stats, note_id, &p.payload, "timer").await;
                            }
                        }
                    }
                    changed = shutdown_rx.changed(), if shutdown_open => {
                        if changed.is_err() {
                            // Worker dropped without a shutdown: run until the handles go away.
                            shutdown_open = false;
                        } else if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            while let Ok(command) = rx.try_recv() {
                if let PersistCommand::Edit { note_id, payload } = command {
                    let now = Instant::now();
                    pending.insert(
                        note_id,
                        Pending {
                            payload,
                            first_edit: now,
                            last_edit: now,
                        },
                    );
                }
            }

            let remaining = pending.len();
            for (note_id, p) in pending.drain() {
                write(notes.as_ref(), &stats, note_id, &p.payload, "shutdown").await;
            }
            info!(remaining, "Persistence worker shutting down");
        }))
    }

    /// Signal the worker to write everything pending and stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn write(
    notes: &dyn NoteStore,
    stats: &Mutex<PersistStats>,
    note_id: NoteId,
    payload: &Value,
    trigger: &'static str,
) {
    let start = std::time::Instant::now();
    match notes.update_content(note_id, &content_of(payload)).await {
        Ok(()) => {
            debug!(note_id = %note_id, trigger, elapsed = ?start.elapsed(), "Note content persisted");
            if let Ok(mut s) = stats.lock() {
                s.writes += 1;
            }
        }
        Err(e) => {
            warn!(note_id = %note_id, trigger, error = %e, "Failed to persist note content");
            if let Ok(mut s) = stats.lock() {
                s.failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecollab_core::{Note, UserId};
    use notecollab_store::MemoryStore;
    use serde_json::json;

    const NOTE: NoteId = NoteId(7);

    async fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_note(Note::new(NOTE, UserId(1), "Plans", "")).await;
        store
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[test]
    fn test_content_of() {
        assert_eq!(content_of(&json!("hello")), "hello");
        assert_eq!(content_of(&json!({"ops": [1, 2]})), r#"{"ops":[1,2]}"#);
    }

    #[tokio::test]
    async fn test_quiescence_writes_latest_once() {
        let store = store().await;
        let mut worker =
            PersistenceWorker::new(store.clone(), Duration::from_millis(50), Duration::from_secs(10));
        let handle = worker.handle();
        worker.start().unwrap();

        for i in 0..5 {
            handle.submit(NOTE, Arc::new(json!(format!("draft {}", i))));
        }

        wait_for(|| store.content_writes() == 1).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.content_writes(), 1);
        assert_eq!(store.get_note(NOTE).await.unwrap().content, "draft 4");
        assert_eq!(handle.stats(), PersistStats { writes: 1, failures: 0 });
    }

    #[tokio::test]
    async fn test_flush_writes_immediately() {
        let store = store().await;
        let mut worker =
            PersistenceWorker::new(store.clone(), Duration::from_secs(60), Duration::from_secs(60));
        let handle = worker.handle();
        worker.start().unwrap();

        handle.submit(NOTE, Arc::new(json!("now")));
        handle.flush(NOTE);

        wait_for(|| store.content_writes() == 1).await;
        assert_eq!(store.get_note(NOTE).await.unwrap().content, "now");
    }

    #[tokio::test]
    async fn test_max_delay_bounds_constant_typing() {
        let store = store().await;
        let mut worker = PersistenceWorker::new(
            store.clone(),
            Duration::from_millis(100),
            Duration::from_millis(200),
        );
        let handle = worker.handle();
        worker.start().unwrap();

        // Edits every 20ms never leave a 100ms gap.
        for i in 0..25 {
            handle.submit(NOTE, Arc::new(json!(i)));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(store.content_writes() >= 1);
    }

    #[tokio::test]
    async fn test_shutdown_writes_pending() {
        let store = store().await;
        let mut worker =
            PersistenceWorker::new(store.clone(), Duration::from_secs(60), Duration::from_secs(60));
        let handle = worker.handle();
        let task = worker.start().unwrap();

        handle.submit(NOTE, Arc::new(json!("last words")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        worker.shutdown();
        task.await.unwrap();

        assert_eq!(store.get_note(NOTE).await.unwrap().content, "last words");
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let mut worker =
            PersistenceWorker::new(store.clone(), Duration::from_millis(20), Duration::from_secs(1));
        let handle = worker.handle();
        worker.start().unwrap();

        handle.submit(NoteId(404), Arc::new(json!("orphan")));
        wait_for(|| handle.stats().failures == 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.stats(), PersistStats { writes: 0, failures: 1 });
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut worker = PersistenceWorker::new(
            Arc::new(MemoryStore::new()),
            Duration::from_millis(20),
            Duration::from_secs(1),
        );
        worker.start().unwrap();
        assert!(matches!(worker.start(), Err(PersistError::AlreadyRunning)));
    }
}
