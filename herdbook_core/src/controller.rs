//! Generic paginated-resource controller.
//!
//! One instance per entity screen. Owns the list state, de-duplicates
//! in-flight fetches, and funnels every mutation through the same
//! classify-report-rethrow error shape so screens never duplicate
//! notification logic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use herdbook_api::{ApiClient, ApiError, ListQuery, SortOrder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::classify::report;
use crate::notify::NotificationSink;

/// Update payloads must carry the version the client last observed; the
/// server rejects a stale one with a 409.
pub trait Versioned {
    fn version(&self) -> u64;
}

/// Static description of one REST resource.
#[derive(Clone, Debug)]
pub struct ResourceSpec {
    /// Collection path, e.g. `/animals`.
    pub path: &'static str,
    /// Label used in log entries and classifier context strings.
    pub context: &'static str,
    /// Per-status notice text overrides passed to the classifier.
    pub overrides: HashMap<u16, String>,
}

impl ResourceSpec {
    pub fn new(path: &'static str, context: &'static str) -> Self {
        Self {
            path,
            context,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, status: u16, message: impl Into<String>) -> Self {
        self.overrides.insert(status, message.into());
        self
    }
}

/// Fetch lifecycle of a controller. A fetch requested while one is already
/// running is dropped, not queued; the next parameter change supersedes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchPhase {
    #[default]
    Idle,
    Fetching,
}

struct ListState<T> {
    items: Vec<T>,
    total: u64,
    phase: FetchPhase,
    params: ListQuery,
    error: Option<String>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            phase: FetchPhase::Idle,
            params: ListQuery::default(),
            error: None,
        }
    }
}

/// Paginated list controller for one entity type.
pub struct ResourceController<T> {
    client: Arc<ApiClient>,
    sink: Arc<dyn NotificationSink>,
    spec: ResourceSpec,
    state: Mutex<ListState<T>>,
}

impl<T> ResourceController<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(
        client: Arc<ApiClient>,
        sink: Arc<dyn NotificationSink>,
        spec: ResourceSpec,
    ) -> Self {
        Self {
            client,
            sink,
            spec,
            state: Mutex::new(ListState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ListState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn items(&self) -> Vec<T> {
        self.state().items.clone()
    }

    pub fn total(&self) -> u64 {
        self.state().total
    }

    pub fn is_loading(&self) -> bool {
        self.state().phase == FetchPhase::Fetching
    }

    pub fn params(&self) -> ListQuery {
        self.state().params.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Loads the current page. Returns `Ok(false)` when another fetch is
    /// already in flight and this call was dropped.
    ///
    /// On success `items`/`total` are replaced atomically; on failure the
    /// previous list is preserved, the error is recorded, and the failure is
    /// both reported and returned.
    pub async fn fetch(&self) -> Result<bool, ApiError> {
        let params = {
            let mut state = self.state();
            if state.phase == FetchPhase::Fetching {
                tracing::debug!(resource = self.spec.context, "fetch already in flight, dropped");
                return Ok(false);
            }
            state.phase = FetchPhase::Fetching;
            state.params.clone()
        };

        let result = self.client.get_paged::<T>(self.spec.path, &params).await;

        let mut state = self.state();
        state.phase = FetchPhase::Idle;
        match result {
            Ok(page) => {
                state.items = page.data;
                state.total = page.meta.total;
                state.error = None;
                Ok(true)
            }
            Err(err) => {
                state.error = Some(err.to_string());
                drop(state);
                report(
                    &err,
                    &format!("{}.fetch", self.spec.context),
                    &self.spec.overrides,
                    self.sink.as_ref(),
                );
                Err(err)
            }
        }
    }

    /// Replaces the query parameters and re-runs the fetch.
    pub async fn set_params(&self, params: ListQuery) -> Result<bool, ApiError> {
        self.state().params = params;
        self.fetch().await
    }

    pub async fn set_page(&self, page: u64) -> Result<bool, ApiError> {
        self.state().params.page = page.max(1);
        self.fetch().await
    }

    /// Changes the search term and resets to the first page.
    pub async fn set_search(&self, term: impl Into<String>) -> Result<bool, ApiError> {
        {
            let mut state = self.state();
            let params = std::mem::take(&mut state.params);
            state.params = params.with_search(term).with_page(1);
        }
        self.fetch().await
    }

    pub async fn set_sort(
        &self,
        field: impl Into<String>,
        order: SortOrder,
    ) -> Result<bool, ApiError> {
        {
            let mut state = self.state();
            let params = std::mem::take(&mut state.params);
            state.params = params.with_sort(field, order);
        }
        self.fetch().await
    }

    /// POSTs a new record, then refetches. No optimistic insert: the list
    /// always reflects server truth at the cost of one extra round-trip.
    pub async fn create<D: Serialize + Sync>(&self, dto: &D) -> Result<T, ApiError> {
        match self.client.post::<T, D>(self.spec.path, dto).await {
            Ok(created) => {
                let _ = self.fetch().await;
                Ok(created)
            }
            Err(err) => Err(self.reported(err, "create")),
        }
    }

    /// PATCHes a record. A stale `version` makes the server answer 409,
    /// which is reported as a version conflict; the local list is left
    /// untouched until the caller refetches.
    pub async fn update<D: Serialize + Versioned + Sync>(
        &self,
        id: &str,
        dto: &D,
    ) -> Result<T, ApiError> {
        tracing::debug!(
            resource = self.spec.context,
            id,
            version = dto.version(),
            "update"
        );
        let path = format!("{}/{id}", self.spec.path);
        match self.client.patch::<T, D>(&path, dto).await {
            Ok(updated) => {
                let _ = self.fetch().await;
                Ok(updated)
            }
            Err(err) => Err(self.reported(err, "update")),
        }
    }

    /// Soft-deletes a record server-side, then refetches. The undo manager
    /// defers this call; screens do not invoke it directly on user action.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{id}", self.spec.path);
        match self.client.delete::<serde_json::Value>(&path).await {
            Ok(_) => {
                let _ = self.fetch().await;
                Ok(())
            }
            Err(err) => Err(self.reported(err, "delete")),
        }
    }

    /// Clears a record's soft-delete marker, then refetches.
    pub async fn restore(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{id}/restore", self.spec.path);
        match self.client.post_empty::<serde_json::Value>(&path).await {
            Ok(_) => {
                let _ = self.fetch().await;
                Ok(())
            }
            Err(err) => Err(self.reported(err, "restore")),
        }
    }

    /// Shared mutation failure shape: classify and notify once, then hand
    /// the failure back so the caller can branch (e.g. keep a dialog open).
    fn reported(&self, err: ApiError, op: &str) -> ApiError {
        report(
            &err,
            &format!("{}.{op}", self.spec.context),
            &self.spec.overrides,
            self.sink.as_ref(),
        );
        err
    }
}
