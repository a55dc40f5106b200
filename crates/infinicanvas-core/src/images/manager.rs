//! Image manager: picks, captures or uploads images and places them on the canvas.

use super::processing::{image_dimensions, resize_with_aspect_ratio};
use super::{
    ImageError, ImagePicker, PermissionKind, PermissionStatus, PickerOptions, Platform,
    UploadedFile, to_data_uri, validate_upload,
};
use crate::elements::{DEFAULT_IMAGE_SIZE, ElementId, ImageElement};
use crate::geometry::{generate_unique_id, now_millis};
use crate::store::CanvasStore;
use kurbo::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PickSource {
    Library,
    Camera,
}

/// Places images on the canvas and turns failures into user-facing alerts.
///
/// Operations never return errors; a failure leaves its message in
/// [`ImageManager::take_alert`] and yields `None`.
#[derive(Debug, Clone)]
pub struct ImageManager {
    platform: Platform,
    options: PickerOptions,
    is_loading: bool,
    alert: Option<String>,
}

impl Default for ImageManager {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl ImageManager {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            options: PickerOptions::default(),
            is_loading: false,
            alert: None,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Whether a pick or upload is in flight.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Take the pending alert message, if any.
    pub fn take_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    /// Pick an image from the photo library and place it at `(x, y)`.
    pub async fn pick_image_from_library(
        &mut self,
        picker: &dyn ImagePicker,
        store: &mut CanvasStore,
        x: f64,
        y: f64,
    ) -> Option<ElementId> {
        self.pick(picker, store, x, y, PickSource::Library).await
    }

    /// Take a photo with the camera and place it at `(x, y)`.
    pub async fn take_photo(
        &mut self,
        picker: &dyn ImagePicker,
        store: &mut CanvasStore,
        x: f64,
        y: f64,
    ) -> Option<ElementId> {
        self.pick(picker, store, x, y, PickSource::Camera).await
    }

    async fn pick(
        &mut self,
        picker: &dyn ImagePicker,
        store: &mut CanvasStore,
        x: f64,
        y: f64,
        source: PickSource,
    ) -> Option<ElementId> {
        if let Err(e) = self.ensure_permission(picker, source).await {
            self.report("Permission request failed", e);
            return None;
        }

        self.is_loading = true;
        let result = self.launch(picker, store, x, y, source).await;
        self.is_loading = false;

        match result {
            Ok(id) => id,
            Err(e) => {
                let context = match source {
                    PickSource::Library => "Error picking image",
                    PickSource::Camera => "Error taking photo",
                };
                self.report(context, e);
                None
            }
        }
    }

    async fn ensure_permission(
        &self,
        picker: &dyn ImagePicker,
        source: PickSource,
    ) -> Result<(), ImageError> {
        if self.platform == Platform::Web {
            return Ok(());
        }
        let (status, kind) = match source {
            PickSource::Library => (
                picker.request_media_library_permissions().await,
                PermissionKind::MediaLibrary,
            ),
            PickSource::Camera => (
                picker.request_camera_permissions().await,
                PermissionKind::Camera,
            ),
        };
        if status == PermissionStatus::Granted {
            Ok(())
        } else {
            Err(ImageError::PermissionDenied(kind))
        }
    }

    async fn launch(
        &self,
        picker: &dyn ImagePicker,
        store: &mut CanvasStore,
        x: f64,
        y: f64,
        source: PickSource,
    ) -> Result<Option<ElementId>, ImageError> {
        let result = match source {
            PickSource::Library => picker
                .launch_image_library(&self.options)
                .await
                .map_err(|e| ImageError::PickFailed(e.to_string()))?,
            PickSource::Camera => picker
                .launch_camera(&self.options)
                .await
                .map_err(|e| ImageError::CaptureFailed(e.to_string()))?,
        };

        let Some(asset) = result.first_asset() else {
            log::debug!("Picker closed without a selection");
            return Ok(None);
        };
        let size = match (asset.width, asset.height) {
            (Some(w), Some(h)) => fitted_size(w, h),
            _ => Size::new(DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE),
        };
        place_image(store, asset.uri.clone(), x, y, size).map(Some)
    }

    /// Validate an uploaded file and place it at `(x, y)` as a `data:` URI.
    pub fn handle_file_upload(
        &mut self,
        store: &mut CanvasStore,
        file: UploadedFile,
        x: f64,
        y: f64,
    ) -> Option<ElementId> {
        if let Err(e) = validate_upload(&file) {
            self.report("Rejected upload", e);
            return None;
        }

        self.is_loading = true;
        let size = match image_dimensions(&file.bytes) {
            Ok((w, h)) => fitted_size(w, h),
            Err(e) => {
                log::warn!("Could not read dimensions of {}: {}", file.name, e);
                Size::new(DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE)
            }
        };
        let uri = to_data_uri(&file.mime_type, &file.bytes);
        let result = place_image(store, uri, x, y, size);
        self.is_loading = false;

        match result {
            Ok(id) => {
                log::info!("Uploaded {} ({} bytes) as {}", file.name, file.size(), id);
                Some(id)
            }
            Err(e) => {
                self.report("Error uploading file", e);
                None
            }
        }
    }

    /// Place an image with the default size at `(x, y)`.
    pub fn add_image_to_canvas(
        store: &mut CanvasStore,
        uri: impl Into<String>,
        x: f64,
        y: f64,
    ) -> Result<ElementId, ImageError> {
        place_image(
            store,
            uri.into(),
            x,
            y,
            Size::new(DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE),
        )
    }

    fn report(&mut self, context: &str, error: ImageError) {
        log::error!("{}: {}", context, error);
        self.alert = Some(error.user_message().to_string());
    }
}

fn fitted_size(width: u32, height: u32) -> Size {
    resize_with_aspect_ratio(
        Size::new(f64::from(width), f64::from(height)),
        Size::new(DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE),
    )
}

fn place_image(
    store: &mut CanvasStore,
    uri: String,
    x: f64,
    y: f64,
    size: Size,
) -> Result<ElementId, ImageError> {
    let id = generate_unique_id();
    let image = ImageElement::new(id.clone(), uri, x, y)
        .with_size(size.width, size.height)
        .with_z_index(now_millis());
    store.add_image(image)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::{PickerAsset, PickerResult};
    use crate::storage::BoxFuture;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::cell::Cell;
    use std::io::Cursor;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
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
            if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
                return result;
            }
        }
    }

    struct FakePicker {
        permission: PermissionStatus,
        result: Result<PickerResult, String>,
        permission_requests: Cell<u32>,
    }

    impl FakePicker {
        fn returning(result: PickerResult) -> Self {
            Self {
                permission: PermissionStatus::Granted,
                result: Ok(result),
                permission_requests: Cell::new(0),
            }
        }

        fn outcome(&self) -> Result<PickerResult, ImageError> {
            self.result.clone().map_err(ImageError::UploadFailed)
        }
    }

    impl ImagePicker for FakePicker {
        fn request_media_library_permissions(&self) -> BoxFuture<'_, PermissionStatus> {
            self.permission_requests.set(self.permission_requests.get() + 1);
            Box::pin(async move { self.permission })
        }

        fn request_camera_permissions(&self) -> BoxFuture<'_, PermissionStatus> {
            self.permission_requests.set(self.permission_requests.get() + 1);
            Box::pin(async move { self.permission })
        }

        fn launch_image_library(
            &self,
            _options: &PickerOptions,
        ) -> BoxFuture<'_, Result<PickerResult, ImageError>> {
            Box::pin(async move { self.outcome() })
        }

        fn launch_camera(
            &self,
            _options: &PickerOptions,
        ) -> BoxFuture<'_, Result<PickerResult, ImageError>> {
            Box::pin(async move { self.outcome() })
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn test_add_image_defaults() {
        let mut store = CanvasStore::new();
        let before = now_millis();
        let id = ImageManager::add_image_to_canvas(&mut store, "file:///a.png", 5.0, 6.0).unwrap();
        let img = store.image(&id).unwrap();
        assert!((img.width - 200.0).abs() < f64::EPSILON);
        assert!((img.height - 200.0).abs() < f64::EPSILON);
        assert!(img.rotation.abs() < f64::EPSILON);
        assert!((img.opacity - 1.0).abs() < f64::EPSILON);
        assert!(img.z_index >= before);
        assert!((img.x - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pick_from_library() {
        let picker =
            FakePicker::returning(PickerResult::with_asset(PickerAsset::new("file:///p.jpg")));
        let mut manager = ImageManager::new(Platform::Native);
        let mut store = CanvasStore::new();

        let id =
            block_on(manager.pick_image_from_library(&picker, &mut store, 10.0, 20.0)).unwrap();
        assert_eq!(store.image(&id).unwrap().uri, "file:///p.jpg");
        assert_eq!(picker.permission_requests.get(), 1);
        assert!(!manager.is_loading());
        assert!(manager.take_alert().is_none());
    }

    #[test]
    fn test_pick_uses_asset_dimensions() {
        let asset = PickerAsset {
            uri: "file:///wide.jpg".into(),
            width: Some(800),
            height: Some(400),
            ..PickerAsset::default()
        };
        let picker = FakePicker::returning(PickerResult::with_asset(asset));
        let mut manager = ImageManager::new(Platform::Native);
        let mut store = CanvasStore::new();
        let id = block_on(manager.take_photo(&picker, &mut store, 0.0, 0.0)).unwrap();
        let img = store.image(&id).unwrap();
        assert!((img.width - 200.0).abs() < f64::EPSILON);
        assert!((img.height - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_web_skips_permissions() {
        let picker = FakePicker::returning(PickerResult::with_asset(PickerAsset::new("blob:x")));
        let mut manager = ImageManager::new(Platform::Web);
        let mut store = CanvasStore::new();
        block_on(manager.take_photo(&picker, &mut store, 0.0, 0.0)).unwrap();
        assert_eq!(picker.permission_requests.get(), 0);
    }

    #[test]
    fn test_permission_denied_alerts() {
        let mut picker = FakePicker::returning(PickerResult::canceled());
        picker.permission = PermissionStatus::Denied;
        let mut manager = ImageManager::new(Platform::Native);
        let mut store = CanvasStore::new();

        assert!(block_on(manager.take_photo(&picker, &mut store, 0.0, 0.0)).is_none());
        assert_eq!(
            manager.take_alert().as_deref(),
            Some("Sorry, we need camera permissions to make this work!")
        );
        assert!(!manager.is_loading());
    }

    #[test]
    fn test_canceled_pick_adds_nothing() {
        let picker = FakePicker::returning(PickerResult::canceled());
        let mut manager = ImageManager::new(Platform::Native);
        let mut store = CanvasStore::new();
        assert!(block_on(manager.pick_image_from_library(&picker, &mut store, 0.0, 0.0)).is_none());
        assert!(store.images().is_empty());
        assert!(manager.take_alert().is_none());
    }

    #[test]
    fn test_picker_failure_alerts() {
        let mut picker = FakePicker::returning(PickerResult::canceled());
        picker.result = Err("boom".into());
        let mut manager = ImageManager::new(Platform::Native);
        let mut store = CanvasStore::new();

        assert!(block_on(manager.pick_image_from_library(&picker, &mut store, 0.0, 0.0)).is_none());
        assert_eq!(
            manager.take_alert().as_deref(),
            Some("Failed to pick image. Please try again.")
        );
        assert!(!manager.is_loading());
    }

    #[test]
    fn test_upload_fits_aspect_ratio() {
        let mut manager = ImageManager::new(Platform::Web);
        let mut store = CanvasStore::new();
        let file = UploadedFile::new("tall.png", "image/png", png_bytes(50, 100));

        let id = manager.handle_file_upload(&mut store, file, 1.0, 2.0).unwrap();
        let img = store.image(&id).unwrap();
        assert!(img.uri.starts_with("data:image/png;base64,"));
        assert!((img.width - 100.0).abs() < f64::EPSILON);
        assert!((img.height - 200.0).abs() < f64::EPSILON);
        assert!(!manager.is_loading());
    }

    #[test]
    fn test_upload_undecodable_keeps_default_size() {
        let mut manager = ImageManager::new(Platform::Web);
        let mut store = CanvasStore::new();
        let file = UploadedFile::new("x.webp", "image/webp", vec![1, 2, 3]);
        let id = manager.handle_file_upload(&mut store, file, 0.0, 0.0).unwrap();
        let img = store.image(&id).unwrap();
        assert!((img.width - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_upload_rejections() {
        let mut manager = ImageManager::new(Platform::Web);
        let mut store = CanvasStore::new();

        let gif = UploadedFile::new("a.gif", "image/gif", vec![0; 16]);
        assert!(manager.handle_file_upload(&mut store, gif, 0.0, 0.0).is_none());
        assert_eq!(
            manager.take_alert().as_deref(),
            Some("Only JPEG, PNG, and WebP formats are supported.")
        );

        let big = UploadedFile::new("a.png", "image/png", vec![0; 10 * 1024 * 1024 + 1]);
        assert!(manager.handle_file_upload(&mut store, big, 0.0, 0.0).is_none());
        assert_eq!(
            manager.take_alert().as_deref(),
            Some("File size exceeds 10MB limit. Please choose a smaller file.")
        );
        assert!(store.images().is_empty());
    }
}
