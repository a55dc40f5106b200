//! Layer list shown beside the canvas.

use crate::elements::{ElementId, ImageElement};
use crate::store::CanvasStore;
use url::Url;

/// One row of the layer list.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    pub id: ElementId,
    pub label: String,
    pub z_index: i64,
    pub selected: bool,
}

/// Layers ordered top-most first.
pub fn layer_entries(store: &CanvasStore) -> Vec<LayerEntry> {
    let selected = store.selected_image_id();
    let mut entries: Vec<LayerEntry> = store
        .images()
        .iter()
        .map(|image| LayerEntry {
            id: image.id.clone(),
            label: image_label(image),
            z_index: image.z_index,
            selected: selected == Some(image.id.as_str()),
        })
        .collect();
    entries.sort_by(|a, b| b.z_index.cmp(&a.z_index));
    entries
}

/// Short display name for an image.
///
/// Remote URLs are named after their last path segment. Local files, inline
/// `data:` payloads and `blob:` handles are named after the image id.
pub fn image_label(image: &ImageElement) -> String {
    match Url::parse(&image.uri) {
        Ok(url) if matches!(url.scheme(), "file" | "data" | "blob") => fallback_label(image),
        Ok(url) => {
            let file_name = url.path().rsplit('/').next().unwrap_or_default();
            if file_name.is_empty() {
                fallback_label(image)
            } else {
                file_name.to_string()
            }
        }
        Err(_) => fallback_label(image),
    }
}

fn fallback_label(image: &ImageElement) -> String {
    let prefix: String = image.id.chars().take(4).collect();
    format!("Image {prefix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str, uri: &str, z: i64) -> ImageElement {
        ImageElement::new(id, uri, 0.0, 0.0).with_z_index(z)
    }

    #[test]
    fn test_labels() {
        assert_eq!(image_label(&image("abcdef", "file:///tmp/cat.png", 0)), "Image abcd");
        assert_eq!(
            image_label(&image("abcdef", "https://example.com/pics/dog.jpg?size=2", 0)),
            "dog.jpg"
        );
        assert_eq!(image_label(&image("abcdef", "https://example.com/", 0)), "Image abcd");
        assert_eq!(image_label(&image("ab", "not a url", 0)), "Image ab");
        assert_eq!(
            image_label(&image("abcdef", "data:image/png;base64,AAAA", 0)),
            "Image abcd"
        );
        assert_eq!(
            image_label(&image("abcdef", "blob:https://example.com/7f3c-11aa", 0)),
            "Image abcd"
        );
    }

    #[test]
    fn test_uploaded_image_label_stays_short() {
        let payload = "A".repeat(64 * 1024);
        let uri = format!("data:image/jpeg;base64,{payload}");
        let label = image_label(&image("0123456789", &uri, 0));
        assert_eq!(label, "Image 0123");
    }

    #[test]
    fn test_entries_sorted_descending() {
        let mut store = CanvasStore::new();
        store.add_image(image("a", "file:///a", 5)).unwrap();
        store.add_image(image("b", "file:///b", 50)).unwrap();
        store.add_image(image("c", "file:///c", -3)).unwrap();
        store.set_selected_image_id(Some("a".into()));

        let entries = layer_entries(&store);
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert!(entries[1].selected);
        assert!(!entries[0].selected);
    }

    #[test]
    fn test_empty_store() {
        assert!(layer_entries(&CanvasStore::new()).is_empty());
    }
}
