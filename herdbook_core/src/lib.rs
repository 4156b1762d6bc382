//! Lifecycle layer for the Herdbook admin console.
//!
//! Everything the entity screens share: failure classification and
//! notification, the generic paginated resource controller with
//! optimistic-locking mutations, and the deferred-deletion (undo) manager.

pub mod classify;
pub mod controller;
pub mod notify;
pub mod undo;

pub use herdbook_api;
pub use herdbook_api::{ApiClient, ApiError, ClientConfig, ListQuery, SortOrder};

pub use classify::{classify, report, ErrorKind};
pub use controller::{FetchPhase, ResourceController, ResourceSpec, Versioned};
pub use notify::{BufferedSink, Notice, NotificationSink, Severity};
pub use undo::{OperationId, UndoAction, UndoManager, DEFAULT_UNDO_WINDOW};
