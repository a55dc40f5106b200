//! Browser `localStorage` backend for WASM.

use super::{BoxFuture, Storage, StorageError, StorageResult, canvas_id_from_key, storage_key};
use crate::state::CanvasState;

/// The window's `localStorage`.
pub(crate) fn browser_storage() -> StorageResult<web_sys::Storage> {
    web_sys::window()
        .ok_or_else(|| StorageError::Other("No window available".to_string()))?
        .local_storage()
        .map_err(|e| StorageError::Other(format!("localStorage unavailable: {:?}", e)))?
        .ok_or_else(|| StorageError::Other("localStorage is disabled".to_string()))
}

/// Canvas storage in the browser's `localStorage`, one JSON value per canvas.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for LocalStorage {
    fn save(&self, id: &str, state: &CanvasState) -> BoxFuture<'_, StorageResult<()>> {
        let key = storage_key(id);
        let json = state.to_json();
        Box::pin(async move {
            let json = json.map_err(|e| StorageError::Serialization(e.to_string()))?;
            browser_storage()?
                .set_item(&key, &json)
                .map_err(|e| StorageError::Io(format!("localStorage.setItem failed: {:?}", e)))
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<CanvasState>> {
        let id = id.to_string();
        Box::pin(async move {
            let json = browser_storage()?
                .get_item(&storage_key(&id))
                .map_err(|e| StorageError::Io(format!("localStorage.getItem failed: {:?}", e)))?
                .ok_or_else(|| StorageError::NotFound(id.clone()))?;
            CanvasState::from_json(&json).map_err(|e| StorageError::Serialization(e.to_string()))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = storage_key(id);
        Box::pin(async move {
            browser_storage()?
                .remove_item(&key)
                .map_err(|e| StorageError::Io(format!("localStorage.removeItem failed: {:?}", e)))
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let storage = browser_storage()?;
            let len = storage
                .length()
                .map_err(|e| StorageError::Io(format!("localStorage.length failed: {:?}", e)))?;
            let mut ids = Vec::new();
            for i in 0..len {
                if let Ok(Some(key)) = storage.key(i) {
                    if let Some(id) = canvas_id_from_key(&key) {
                        ids.push(id.to_string());
                    }
                }
            }
            Ok(ids)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let key = storage_key(id);
        Box::pin(async move {
            let item = browser_storage()?
                .get_item(&key)
                .map_err(|e| StorageError::Io(format!("localStorage.getItem failed: {:?}", e)))?;
            Ok(item.is_some())
        })
    }
}
