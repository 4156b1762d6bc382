//! Transport layer for the Herdbook admin console.
//!
//! A typed HTTP client that attaches the bearer credential, enforces
//! timeouts, and unwraps the server's `{success, data, meta}` envelope,
//! raising a single typed failure ([`ApiError`]) for every non-success
//! outcome.

mod auth;
mod client;
mod config;
mod errors;
mod query;
pub mod types;

pub use self::auth::{MemoryTokenStore, TokenStore};
pub use self::client::{ApiClient, RequestOptions};
pub use self::config::{ClientConfig, DEFAULT_TIMEOUT};
pub use self::errors::ApiError;
pub use self::query::{ListQuery, SortOrder};
