//! Bearer-credential storage behind a small provider trait.
//!
//! The original console read its token straight out of browser storage.
//! Abstracting the store lets the client run against an in-memory
//! implementation in tests and leaves the persistence choice to the host.

use std::sync::Mutex;

/// Key-value storage for the bearer credential.
///
/// The transport layer only ever reads; `set`/`remove` exist for the
/// login/logout flow of a higher layer.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: String);
    fn remove(&self);
}

/// In-memory token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn set(&self, token: String) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token);
        }
    }

    fn remove(&self) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn set_get_remove() {
        let store = MemoryTokenStore::new();
        store.set("abc123".to_string());
        assert_eq!(store.get(), Some("abc123".to_string()));
        store.remove();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn with_token_seeds_value() {
        let store = MemoryTokenStore::with_token("seed");
        assert_eq!(store.get(), Some("seed".to_string()));
    }
}
