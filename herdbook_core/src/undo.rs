//! Deferred-deletion ("undo") manager.
//!
//! Turns an immediate delete intent into a cancellable, time-boxed commit:
//! the item disappears from the visible set now, the hard delete runs later
//! unless the user undoes it first. For every operation exactly one of
//! {restore, commit} runs, exactly once; both paths gate on removing the
//! operation from the pending map, so a double fire is structurally
//! impossible even when a timer and an explicit call race in the same tick.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::notify::{Notice, NotificationSink};

/// How long a deletion stays undoable.
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(10);

pub type UndoFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Restore or hard-delete callback. Invoked fire-and-forget: a failure
/// inside it is the callback's own business to report.
pub type UndoAction = Box<dyn FnOnce() -> UndoFuture + Send>;

/// Handle for one pending deletion, unique per `mark_for_deletion` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OperationId(u64);

struct PendingDeletion {
    entity_id: String,
    snapshot: serde_json::Value,
    scheduled_at: DateTime<Utc>,
    timer: Option<JoinHandle<()>>,
    restore: UndoAction,
    commit: UndoAction,
}

struct Inner {
    pending: Mutex<HashMap<u64, PendingDeletion>>,
    next_id: AtomicU64,
    sink: Arc<dyn NotificationSink>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, HashMap<u64, PendingDeletion>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the operation, making the caller its sole owner. `None` means
    /// some other path (timer, undo, confirm) already settled it.
    fn take(&self, id: u64) -> Option<PendingDeletion> {
        self.pending().remove(&id)
    }

    async fn commit(&self, id: u64, by_timer: bool) -> bool {
        let Some(op) = self.take(id) else {
            return false;
        };
        if !by_timer {
            if let Some(timer) = op.timer {
                timer.abort();
            }
        }
        tracing::debug!(
            entity_id = op.entity_id,
            by_timer,
            scheduled_at = %op.scheduled_at,
            "committing deletion"
        );
        (op.commit)().await;
        self.sink
            .publish(Notice::info(format!("Deleted {}.", op.entity_id)));
        true
    }
}

/// Timer-driven deferred-deletion manager. One live timer per operation;
/// independent operations may be pending concurrently.
pub struct UndoManager {
    inner: Arc<Inner>,
    window: Duration,
}

impl UndoManager {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_window(sink, DEFAULT_UNDO_WINDOW)
    }

    pub fn with_window(sink: Arc<dyn NotificationSink>, window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                sink,
            }),
            window,
        }
    }

    /// Registers a pending deletion and starts its commit timer. The caller
    /// removes the item from the visible set; `snapshot` is the data at
    /// deletion time, kept so a host can re-insert it on restore without a
    /// refetch.
    ///
    /// When the window elapses without an undo, `commit` runs once and the
    /// operation is gone. Must run inside a tokio runtime.
    pub fn mark_for_deletion(
        &self,
        entity_id: impl Into<String>,
        snapshot: serde_json::Value,
        restore: UndoAction,
        commit: UndoAction,
    ) -> OperationId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let entity_id = entity_id.into();
        tracing::debug!(entity_id, operation = id, window = ?self.window, "deletion deferred");

        self.inner.pending().insert(
            id,
            PendingDeletion {
                entity_id,
                snapshot,
                scheduled_at: Utc::now(),
                timer: None,
                restore,
                commit,
            },
        );

        let inner = Arc::clone(&self.inner);
        let window = self.window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            inner.commit(id, true).await;
        });

        // The operation can only have left the map this early via undo_all;
        // in that case the timer must not keep running.
        match self.inner.pending().get_mut(&id) {
            Some(op) => op.timer = Some(timer),
            None => timer.abort(),
        }

        OperationId(id)
    }

    /// Cancels the timer and runs the restore callback exactly once.
    /// Idempotent: a missing operation (already committed or already undone)
    /// is a no-op returning `false`.
    pub async fn undo(&self, op: OperationId) -> bool {
        let Some(op) = self.inner.take(op.0) else {
            return false;
        };
        if let Some(timer) = op.timer {
            timer.abort();
        }
        tracing::debug!(entity_id = op.entity_id, "deletion undone");
        (op.restore)().await;
        self.inner
            .sink
            .publish(Notice::success(format!("Restored {}.", op.entity_id)));
        true
    }

    /// Commits immediately instead of waiting for the window to elapse.
    /// Same idempotency guarantee as [`Self::undo`].
    pub async fn confirm(&self, op: OperationId) -> bool {
        self.inner.commit(op.0, false).await
    }

    /// Whether `entity_id` has an outstanding deletion. Used by hosts to
    /// keep the item hidden while the window is open.
    pub fn is_pending(&self, entity_id: &str) -> bool {
        self.inner
            .pending()
            .values()
            .any(|op| op.entity_id == entity_id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending().len()
    }

    /// Returns the snapshot captured for an outstanding operation.
    pub fn snapshot_of(&self, op: OperationId) -> Option<serde_json::Value> {
        self.inner.pending().get(&op.0).map(|p| p.snapshot.clone())
    }

    /// Cancels every live timer and restores every pending item. Safety net
    /// for navigation: leaving a screen mid-window never silently commits.
    pub async fn undo_all(&self) -> usize {
        let drained: Vec<PendingDeletion> = {
            let mut pending = self.inner.pending();
            pending.drain().map(|(_, op)| op).collect()
        };
        let count = drained.len();
        for op in drained {
            if let Some(timer) = op.timer {
                timer.abort();
            }
            tracing::debug!(entity_id = op.entity_id, "deletion undone (undo_all)");
            (op.restore)().await;
            self.inner
                .sink
                .publish(Notice::success(format!("Restored {}.", op.entity_id)));
        }
        count
    }
}
