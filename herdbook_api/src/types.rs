//! Wire types shared by every endpoint: the response envelope and pagination metadata.

use serde::{Deserialize, Serialize};

/// The server's uniform success wrapper. The client unwraps this before
/// handing the payload back to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageInfo>,
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl PageInfo {
    /// Number of pages implied by `total` and `limit`.
    pub fn page_count(&self) -> u64 {
        if self.limit == 0 {
            0
        } else {
            self.total.div_ceil(self.limit)
        }
    }
}

/// One page of a paginated list.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageInfo,
}
