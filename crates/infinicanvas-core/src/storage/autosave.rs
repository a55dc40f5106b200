//! Auto-save functionality for canvas persistence.
//!
//! Tracks the store's revision counter and writes a snapshot once the canvas
//! has changed and the save interval has elapsed.

use crate::state::CanvasState;
use crate::storage::{Storage, StorageError, StorageResult};
use crate::store::CanvasStore;
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Canvas id used until another one is chosen.
pub const DEFAULT_CANVAS_ID: &str = "default";

/// Id of the copy written on every save for restore on startup.
pub const LAST_CANVAS_KEY: &str = "__last_canvas__";

/// Manages automatic canvas persistence.
pub struct AutoSaveManager<S: Storage> {
    storage: Arc<S>,
    interval: Duration,
    last_save: Option<Instant>,
    /// Store revision at the last save or load.
    saved_revision: Option<u64>,
    dirty: bool,
    canvas_id: String,
}

impl<S: Storage> AutoSaveManager<S> {
    /// Create a new auto-save manager with the given storage backend.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: None,
            saved_revision: None,
            dirty: false,
            canvas_id: DEFAULT_CANVAS_ID.to_string(),
        }
    }

    /// Set the auto-save interval.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Get the auto-save interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Mark the canvas as having unsaved changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Check if the canvas has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Compare a store revision with the last saved one.
    pub fn observe(&mut self, revision: u64) {
        if self.saved_revision != Some(revision) {
            self.dirty = true;
        }
    }

    pub fn set_canvas_id(&mut self, id: impl Into<String>) {
        self.canvas_id = id.into();
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    /// Check if enough time has passed for an auto-save.
    pub fn should_save(&self) -> bool {
        if !self.dirty {
            return false;
        }

        match self.last_save {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Save the store if it changed and the interval elapsed.
    /// Returns true if a save was performed.
    pub async fn maybe_save(&mut self, store: &CanvasStore) -> StorageResult<bool> {
        self.observe(store.revision());
        if !self.should_save() {
            return Ok(false);
        }

        self.save(store).await?;
        Ok(true)
    }

    /// Save the store immediately.
    pub async fn save(&mut self, store: &CanvasStore) -> StorageResult<()> {
        self.save_state(&store.snapshot()).await?;
        self.saved_revision = Some(store.revision());
        Ok(())
    }

    /// Save a document under the current canvas id.
    pub async fn save_state(&mut self, state: &CanvasState) -> StorageResult<()> {
        self.storage.save(&self.canvas_id, state).await?;
        self.storage.save(LAST_CANVAS_KEY, state).await?;

        log::info!("Auto-saved canvas {} ({} elements)", self.canvas_id, state.len());
        self.last_save = Some(Instant::now());
        self.dirty = false;
        Ok(())
    }

    /// Load a canvas into the store and make it the current canvas.
    pub async fn load(&mut self, id: &str, store: &mut CanvasStore) -> StorageResult<()> {
        let state = self.storage.load(id).await?;
        self.restore_into(state, store)?;
        self.canvas_id = id.to_string();
        Ok(())
    }

    /// Try to restore the last saved canvas. Returns false if there is none.
    pub async fn load_last(&mut self, store: &mut CanvasStore) -> bool {
        let state = match self.storage.load(LAST_CANVAS_KEY).await {
            Ok(state) => state,
            Err(StorageError::NotFound(_)) => return false,
            Err(e) => {
                log::warn!("Could not load last canvas: {}", e);
                return false;
            }
        };
        match self.restore_into(state, store) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not restore last canvas: {}", e);
                false
            }
        }
    }

    fn restore_into(&mut self, state: CanvasState, store: &mut CanvasStore) -> StorageResult<()> {
        store
            .restore(state)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.saved_revision = Some(store.revision());
        self.last_save = Some(Instant::now());
        self.dirty = false;
        Ok(())
    }

    /// Delete a canvas by ID.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.delete(id).await
    }

    /// List all saved canvas IDs.
    pub async fn list_canvases(&self) -> StorageResult<Vec<String>> {
        let mut ids = self.storage.list().await?;
        ids.retain(|id| id != LAST_CANVAS_KEY);
        Ok(ids)
    }

    /// Check if a canvas exists.
    pub async fn exists(&self, id: &str) -> StorageResult<bool> {
        self.storage.exists(id).await
    }

    /// Get a reference to the storage backend.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

/// Create a platform-appropriate storage backend.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_storage() -> StorageResult<Arc<crate::storage::FileStorage>> {
    Ok(Arc::new(crate::storage::FileStorage::default_location()?))
}

#[cfg(target_arch = "wasm32")]
pub fn create_default_storage() -> StorageResult<Arc<crate::storage::LocalStorage>> {
    Ok(Arc::new(crate::storage::LocalStorage::new()))
}

/// Convenience type alias for platform-specific storage.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStorage = crate::storage::FileStorage;

#[cfg(target_arch = "wasm32")]
pub type PlatformStorage = crate::storage::LocalStorage;

/// Type alias for the auto-save manager with platform-specific storage.
pub type PlatformAutoSaveManager = AutoSaveManager<PlatformStorage>;

/// Convenience function to create an auto-save manager with default storage.
pub fn create_autosave_manager() -> StorageResult<PlatformAutoSaveManager> {
    let storage = create_default_storage()?;
    Ok(AutoSaveManager::new(storage))
}
