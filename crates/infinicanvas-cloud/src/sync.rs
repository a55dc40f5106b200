//! UI-facing wrapper around [`BackendClient`].
//!
//! Every operation clears the previous error, and on failure stores a
//! message the UI can show instead of returning the error.

use crate::client::{BackendClient, Canvas, CanvasVersion, User};
use crate::error::CloudResult;
use infinicanvas_core::CanvasState;

/// Cloud persistence as the canvas screens use it.
pub struct CanvasSync {
    client: BackendClient,
    is_loading: bool,
    error: Option<String>,
}

impl CanvasSync {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            is_loading: false,
            error: None,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Signed-in user, if any.
    pub fn user(&self) -> Option<User> {
        self.client.current_user()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Message of the last failed operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Fail early with `message` when nobody is signed in.
    fn require_user(&mut self, message: &str) -> bool {
        if self.client.current_user().is_some() {
            return true;
        }
        self.error = Some(message.to_string());
        false
    }

    fn begin(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    fn finish<T>(&mut self, result: CloudResult<T>, fallback: &str) -> Option<T> {
        self.is_loading = false;
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("{}: {}", fallback, e);
                self.error = Some(e.user_message(fallback));
                None
            }
        }
    }

    pub async fn save_canvas(
        &mut self,
        title: &str,
        state: &CanvasState,
        thumbnail_url: Option<&str>,
    ) -> Option<Canvas> {
        if !self.require_user("You must be logged in to save a canvas") {
            return None;
        }
        self.begin();
        let result = self.client.save_canvas(title, state, thumbnail_url).await;
        self.finish(result, "Failed to save canvas")
    }

    pub async fn update_canvas(
        &mut self,
        canvas_id: &str,
        state: &CanvasState,
        thumbnail_url: Option<&str>,
    ) -> bool {
        if !self.require_user("You must be logged in to update a canvas") {
            return false;
        }
        self.begin();
        let result = self.client.update_canvas(canvas_id, state, thumbnail_url).await;
        self.finish(result, "Failed to update canvas").is_some()
    }

    pub async fn save_canvas_version(&mut self, canvas_id: &str, state: &CanvasState) -> bool {
        if !self.require_user("You must be logged in to save a canvas version") {
            return false;
        }
        self.begin();
        let result = self.client.save_canvas_version(canvas_id, state).await;
        self.finish(result, "Failed to save canvas version").is_some()
    }

    pub async fn list_canvas_versions(&mut self, canvas_id: &str) -> Vec<CanvasVersion> {
        if !self.require_user("You must be logged in to fetch canvas versions") {
            return Vec::new();
        }
        self.begin();
        let result = self.client.list_canvas_versions(canvas_id).await;
        self.finish(result, "Failed to fetch canvas versions")
            .unwrap_or_default()
    }

    pub async fn get_user_canvases(&mut self) -> Vec<Canvas> {
        if !self.require_user("You must be logged in to fetch canvases") {
            return Vec::new();
        }
        self.begin();
        let result = self.client.get_user_canvases().await;
        self.finish(result, "Failed to fetch canvases")
            .unwrap_or_default()
    }

    /// Fetch a canvas. Works signed out too, though the backend only returns
    /// rows the caller may see.
    pub async fn get_canvas(&mut self, canvas_id: &str) -> Option<Canvas> {
        self.begin();
        let result = self.client.get_canvas(canvas_id).await;
        self.finish(result, "Failed to fetch canvas")
    }

    pub async fn delete_canvas(&mut self, canvas_id: &str) -> bool {
        if !self.require_user("You must be logged in to delete a canvas") {
            return false;
        }
        self.begin();
        let result = self.client.delete_canvas(canvas_id).await;
        self.finish(result, "Failed to delete canvas").is_some()
    }

    /// Upload an image and return its public URL.
    pub async fn upload_image(
        &mut self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Option<String> {
        if !self.require_user("You must be logged in to upload images") {
            return None;
        }
        self.begin();
        let result = self.client.upload_image(bytes, file_name, content_type).await;
        self.finish(result, "Failed to upload image")
    }
}
