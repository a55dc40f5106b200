//! Storage abstraction for persistence.

mod autosave;
mod memory;
mod token;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod local;

pub use autosave::{
    AutoSaveManager, DEFAULT_AUTOSAVE_INTERVAL_SECS, DEFAULT_CANVAS_ID, LAST_CANVAS_KEY,
    PlatformAutoSaveManager, PlatformStorage, create_autosave_manager, create_default_storage,
};
pub use memory::MemoryStorage;
pub use token::{AUTH_TOKEN_KEY, MemoryTokenStore, TokenStore};

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;
#[cfg(not(target_arch = "wasm32"))]
pub use token::FileTokenStore;

#[cfg(target_arch = "wasm32")]
pub use local::LocalStorage;
#[cfg(target_arch = "wasm32")]
pub use token::LocalTokenStore;

use crate::state::CanvasState;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Prefix of every key a canvas is stored under.
pub const STORAGE_KEY_PREFIX: &str = "infinite_canvas_state_";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Canvas not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Key a canvas is stored under.
pub fn storage_key(canvas_id: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{canvas_id}")
}

/// Canvas id of a storage key, or `None` for keys this crate did not write.
pub fn canvas_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(STORAGE_KEY_PREFIX)
}

/// Trait for canvas storage backends.
///
/// Canvases are addressed by id; each backend stores them under
/// [`storage_key`].
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait Storage: Send + Sync {
    /// Save a canvas.
    fn save(&self, id: &str, state: &CanvasState) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a canvas.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<CanvasState>>;

    /// Delete a canvas.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all canvas IDs.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a canvas exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
}

/// Trait for canvas storage backends (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait Storage {
    /// Save a canvas.
    fn save(&self, id: &str, state: &CanvasState) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a canvas.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<CanvasState>>;

    /// Delete a canvas.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all canvas IDs.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a canvas exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys() {
        assert_eq!(storage_key("abc"), "infinite_canvas_state_abc");
        assert_eq!(canvas_id_from_key("infinite_canvas_state_abc"), Some("abc"));
        assert_eq!(canvas_id_from_key("other_key"), None);
    }
}
