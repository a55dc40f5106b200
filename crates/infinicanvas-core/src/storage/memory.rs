//! In-memory storage implementation.

use super::{BoxFuture, Storage, StorageError, StorageResult, canvas_id_from_key, storage_key};
use crate::state::CanvasState;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    canvases: RwLock<HashMap<String, CanvasState>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl Storage for MemoryStorage {
    fn save(&self, id: &str, state: &CanvasState) -> BoxFuture<'_, StorageResult<()>> {
        let key = storage_key(id);
        let state = state.clone();
        Box::pin(async move {
            let mut canvases = self.canvases.write().map_err(lock_error)?;
            canvases.insert(key, state);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<CanvasState>> {
        let id = id.to_string();
        Box::pin(async move {
            let canvases = self.canvases.read().map_err(lock_error)?;
            canvases
                .get(&storage_key(&id))
                .cloned()
                .ok_or(StorageError::NotFound(id))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = storage_key(id);
        Box::pin(async move {
            let mut canvases = self.canvases.write().map_err(lock_error)?;
            canvases.remove(&key);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let canvases = self.canvases.read().map_err(lock_error)?;
            Ok(canvases
                .keys()
                .filter_map(|key| canvas_id_from_key(key))
                .map(str::to_string)
                .collect())
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let key = storage_key(id);
        Box::pin(async move {
            let canvases = self.canvases.read().map_err(lock_error)?;
            Ok(canvases.contains_key(&key))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ImageElement;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        // Simple blocking executor for tests
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn dummy_raw_waker() -> RawWaker {
            fn no_op(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                dummy_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut f = std::pin::pin!(f);

        loop {
            match f.as_mut().poll(&mut cx) {
                Poll::Ready(result) => return result,
                Poll::Pending => {}
            }
        }
    }

    fn sample_state() -> CanvasState {
        let mut state = CanvasState::new();
        state
            .elements
            .push(ImageElement::new("img", "file:///a.png", 1.0, 2.0).into());
        state
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        let state = sample_state();

        block_on(storage.save("test", &state)).unwrap();
        let loaded = block_on(storage.load("test")).unwrap();

        assert_eq!(state, loaded);
    }

    #[test]
    fn test_not_found() {
        let storage = MemoryStorage::new();
        let result = block_on(storage.load("nonexistent"));

        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_exists_and_delete() {
        let storage = MemoryStorage::new();
        let state = CanvasState::new();

        assert!(!block_on(storage.exists("test")).unwrap());
        block_on(storage.save("test", &state)).unwrap();
        assert!(block_on(storage.exists("test")).unwrap());
        block_on(storage.delete("test")).unwrap();
        assert!(!block_on(storage.exists("test")).unwrap());
    }

    #[test]
    fn test_list_strips_prefix() {
        let storage = MemoryStorage::new();
        let state = CanvasState::new();

        block_on(storage.save("canvas1", &state)).unwrap();
        block_on(storage.save("canvas2", &state)).unwrap();

        let list = block_on(storage.list()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&"canvas1".to_string()));
        assert!(list.contains(&"canvas2".to_string()));
    }
}
