//! Adding images to the canvas from the photo library, the camera or uploads.

mod manager;
pub mod processing;

pub use manager::ImageManager;

use crate::state::StateError;
use crate::storage::BoxFuture;
use thiserror::Error;

/// Largest upload accepted, in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// MIME types accepted for uploads.
pub const SUPPORTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Host platform, which decides whether permission prompts are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Web,
    Native,
}

impl Platform {
    /// Platform this crate was compiled for.
    pub fn current() -> Self {
        if cfg!(target_arch = "wasm32") {
            Platform::Web
        } else {
            Platform::Native
        }
    }
}

/// Answer to a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Which permission a prompt was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    MediaLibrary,
    Camera,
}

/// Options passed to the picker.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerOptions {
    pub allows_editing: bool,
    /// Compression quality from 0.0 to 1.0.
    pub quality: f64,
    pub allows_multiple_selection: bool,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            allows_editing: false,
            quality: 1.0,
            allows_multiple_selection: false,
        }
    }
}

/// One picked or captured image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PickerAsset {
    pub uri: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

impl PickerAsset {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }
}

/// Outcome of a picker session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PickerResult {
    pub canceled: bool,
    pub assets: Vec<PickerAsset>,
}

impl PickerResult {
    pub fn canceled() -> Self {
        Self {
            canceled: true,
            assets: Vec::new(),
        }
    }

    pub fn with_asset(asset: PickerAsset) -> Self {
        Self {
            canceled: false,
            assets: vec![asset],
        }
    }

    /// First asset of a completed session.
    pub fn first_asset(&self) -> Option<&PickerAsset> {
        if self.canceled {
            None
        } else {
            self.assets.first()
        }
    }
}

/// A file chosen through a browser file input.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Host-provided access to the photo library and camera.
pub trait ImagePicker {
    fn request_media_library_permissions(&self) -> BoxFuture<'_, PermissionStatus>;

    fn request_camera_permissions(&self) -> BoxFuture<'_, PermissionStatus>;

    fn launch_image_library(
        &self,
        options: &PickerOptions,
    ) -> BoxFuture<'_, Result<PickerResult, ImageError>>;

    fn launch_camera(&self, options: &PickerOptions)
    -> BoxFuture<'_, Result<PickerResult, ImageError>>;
}

/// Errors raised while bringing an image onto the canvas.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Permission denied: {0:?}")]
    PermissionDenied(PermissionKind),
    #[error("File is {size} bytes, over the upload limit")]
    FileTooLarge { size: u64 },
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Picker failed: {0}")]
    PickFailed(String),
    #[error("Camera failed: {0}")]
    CaptureFailed(String),
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Canvas error: {0}")]
    Canvas(#[from] StateError),
}

impl ImageError {
    /// Text shown to the user in an alert.
    pub fn user_message(&self) -> &'static str {
        match self {
            ImageError::PermissionDenied(PermissionKind::MediaLibrary) => {
                "Sorry, we need media library permissions to make this work!"
            }
            ImageError::PermissionDenied(PermissionKind::Camera) => {
                "Sorry, we need camera permissions to make this work!"
            }
            ImageError::FileTooLarge { .. } => {
                "File size exceeds 10MB limit. Please choose a smaller file."
            }
            ImageError::UnsupportedFormat(_) => "Only JPEG, PNG, and WebP formats are supported.",
            ImageError::PickFailed(_) => "Failed to pick image. Please try again.",
            ImageError::CaptureFailed(_) => "Failed to take photo. Please try again.",
            ImageError::UploadFailed(_) | ImageError::Decode(_) | ImageError::Canvas(_) => {
                "Failed to upload file. Please try again."
            }
        }
    }
}

/// Check an upload against the size limit and the accepted formats.
pub fn validate_upload(file: &UploadedFile) -> Result<(), ImageError> {
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(ImageError::FileTooLarge { size: file.size() });
    }
    if !SUPPORTED_MIME_TYPES.contains(&file.mime_type.as_str()) {
        return Err(ImageError::UnsupportedFormat(file.mime_type.clone()));
    }
    Ok(())
}

/// Encode bytes as a `data:` URI.
pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    use base64::{Engine, engine::general_purpose::STANDARD};
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_size_limit() {
        let exact = UploadedFile::new("a.png", "image/png", vec![0; MAX_UPLOAD_BYTES as usize]);
        assert!(validate_upload(&exact).is_ok());

        let over = UploadedFile::new("a.png", "image/png", vec![0; MAX_UPLOAD_BYTES as usize + 1]);
        let err = validate_upload(&over).unwrap_err();
        assert!(matches!(err, ImageError::FileTooLarge { .. }));
        assert_eq!(
            err.user_message(),
            "File size exceeds 10MB limit. Please choose a smaller file."
        );
    }

    #[test]
    fn test_validate_format() {
        for mime in SUPPORTED_MIME_TYPES {
            assert!(validate_upload(&UploadedFile::new("f", mime, vec![1])).is_ok());
        }
        let err = validate_upload(&UploadedFile::new("f.gif", "image/gif", vec![1])).unwrap_err();
        assert_eq!(err.user_message(), "Only JPEG, PNG, and WebP formats are supported.");
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(to_data_uri("image/png", b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_picker_result_first_asset() {
        assert!(PickerResult::canceled().first_asset().is_none());
        assert!(PickerResult::default().first_asset().is_none());
        let result = PickerResult::with_asset(PickerAsset::new("file:///x.jpg"));
        assert_eq!(result.first_asset().unwrap().uri, "file:///x.jpg");
    }

    #[test]
    fn test_permission_messages() {
        assert_eq!(
            ImageError::PermissionDenied(PermissionKind::MediaLibrary).user_message(),
            "Sorry, we need media library permissions to make this work!"
        );
        assert_eq!(
            ImageError::PermissionDenied(PermissionKind::Camera).user_message(),
            "Sorry, we need camera permissions to make this work!"
        );
    }
}
