//! Persistence for the backend auth session.

use super::{StorageError, StorageResult};
use std::sync::RwLock;

/// Key the auth session is stored under.
pub const AUTH_TOKEN_KEY: &str = "infinite_canvas_auth_token";

/// Somewhere to keep the serialised auth session between runs.
#[cfg(not(target_arch = "wasm32"))]
pub trait TokenStore: Send + Sync {
    fn save_token(&self, token: &str) -> StorageResult<()>;

    /// The stored token, `None` when signed out.
    fn token(&self) -> StorageResult<Option<String>>;

    fn delete_token(&self) -> StorageResult<()>;
}

/// Somewhere to keep the serialised auth session (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait TokenStore {
    fn save_token(&self, token: &str) -> StorageResult<()>;

    /// The stored token, `None` when signed out.
    fn token(&self) -> StorageResult<Option<String>>;

    fn delete_token(&self) -> StorageResult<()>;
}

/// Token store that forgets everything when dropped.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl TokenStore for MemoryTokenStore {
    fn save_token(&self, token: &str) -> StorageResult<()> {
        *self.token.write().map_err(lock_error)? = Some(token.to_string());
        Ok(())
    }

    fn token(&self) -> StorageResult<Option<String>> {
        Ok(self.token.read().map_err(lock_error)?.clone())
    }

    fn delete_token(&self) -> StorageResult<()> {
        *self.token.write().map_err(lock_error)? = None;
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use file_token::FileTokenStore;

#[cfg(not(target_arch = "wasm32"))]
mod file_token {
    use super::{AUTH_TOKEN_KEY, TokenStore};
    use crate::storage::file::app_data_dir;
    use crate::storage::{StorageError, StorageResult};
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    /// Token kept in a file readable only by the current user.
    #[derive(Debug, Clone)]
    pub struct FileTokenStore {
        path: PathBuf,
    }

    impl FileTokenStore {
        /// Store the token in `dir`, creating it if needed.
        pub fn new(dir: impl AsRef<Path>) -> StorageResult<Self> {
            let dir = dir.as_ref();
            fs::create_dir_all(dir).map_err(|e| {
                StorageError::Io(format!("Failed to create {}: {}", dir.display(), e))
            })?;
            Ok(Self {
                path: dir.join(AUTH_TOKEN_KEY),
            })
        }

        /// Store the token in the platform data directory.
        pub fn default_location() -> StorageResult<Self> {
            Self::new(app_data_dir()?)
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn open_for_write(&self) -> std::io::Result<fs::File> {
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            options.open(&self.path)
        }
    }

    impl TokenStore for FileTokenStore {
        fn save_token(&self, token: &str) -> StorageResult<()> {
            let mut file = self.open_for_write().map_err(|e| {
                StorageError::Io(format!("Failed to open {}: {}", self.path.display(), e))
            })?;
            file.write_all(token.as_bytes()).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {}", self.path.display(), e))
            })
        }

        fn token(&self) -> StorageResult<Option<String>> {
            match fs::read_to_string(&self.path) {
                Ok(token) if token.is_empty() => Ok(None),
                Ok(token) => Ok(Some(token)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StorageError::Io(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                ))),
            }
        }

        fn delete_token(&self) -> StorageResult<()> {
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::Io(format!(
                    "Failed to delete {}: {}",
                    self.path.display(),
                    e
                ))),
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use local_token::LocalTokenStore;

#[cfg(target_arch = "wasm32")]
mod local_token {
    use super::{AUTH_TOKEN_KEY, TokenStore};
    use crate::storage::local::browser_storage;
    use crate::storage::{StorageError, StorageResult};

    /// Token kept in the browser's `localStorage`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct LocalTokenStore;

    impl LocalTokenStore {
        pub fn new() -> Self {
            Self
        }
    }

    impl TokenStore for LocalTokenStore {
        fn save_token(&self, token: &str) -> StorageResult<()> {
            browser_storage()?
                .set_item(AUTH_TOKEN_KEY, token)
                .map_err(|e| StorageError::Other(format!("localStorage.setItem failed: {:?}", e)))
        }

        fn token(&self) -> StorageResult<Option<String>> {
            browser_storage()?
                .get_item(AUTH_TOKEN_KEY)
                .map_err(|e| StorageError::Other(format!("localStorage.getItem failed: {:?}", e)))
        }

        fn delete_token(&self) -> StorageResult<()> {
            browser_storage()?
                .remove_item(AUTH_TOKEN_KEY)
                .map_err(|e| {
                    StorageError::Other(format!("localStorage.removeItem failed: {:?}", e))
                })
        }
    }
}
