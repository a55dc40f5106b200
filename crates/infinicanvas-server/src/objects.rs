//! Public object storage for uploaded images.

use crate::{ApiError, AppState, IMAGE_BUCKET, StoredObject};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

fn check_bucket(bucket: &str) -> Result<(), ApiError> {
    if bucket == IMAGE_BUCKET {
        Ok(())
    } else {
        Err(ApiError::new(StatusCode::NOT_FOUND, "Bucket not found"))
    }
}

/// Callers may only write below a folder named after their user id.
fn owns_path(path: &str, user_id: &str) -> bool {
    path.split_once('/')
        .is_some_and(|(folder, name)| folder == user_id && !name.is_empty())
}

/// POST /storage/v1/object/{bucket}/{*path}
pub(crate) async fn upload(
    State(state): State<Arc<AppState>>,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    check_bucket(&bucket)?;
    let user_id = state.authenticate(&headers)?;
    if !owns_path(&path, &user_id) {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "new row violates row-level security policy",
        ));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let key = format!("{}/{}", bucket, path);
    let size = body.len();
    match state.objects.entry(key.clone()) {
        Entry::Occupied(_) => {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "The resource already exists",
            ));
        }
        Entry::Vacant(entry) => {
            entry.insert(StoredObject {
                content_type,
                data: body,
            });
        }
    }
    info!("Stored object {} ({} bytes)", key, size);

    Ok(Json(json!({ "Key": key })).into_response())
}

/// GET /storage/v1/object/public/{bucket}/{*path}
pub(crate) async fn download(
    State(state): State<Arc<AppState>>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    check_bucket(&bucket)?;
    let object = state
        .objects
        .get(&format!("{}/{}", bucket, path))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Object not found"))?;

    Ok((
        [(header::CONTENT_TYPE, object.content_type.clone())],
        object.data.clone(),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owns_path() {
        assert!(owns_path("u1/photo.png", "u1"));
        assert!(owns_path("u1/nested/photo.png", "u1"));
        assert!(!owns_path("u2/photo.png", "u1"));
        assert!(!owns_path("u1/", "u1"));
        assert!(!owns_path("photo.png", "u1"));
    }

    #[test]
    fn test_check_bucket() {
        assert!(check_bucket(IMAGE_BUCKET).is_ok());
        assert_eq!(
            check_bucket("avatars").unwrap_err().status,
            StatusCode::NOT_FOUND
        );
    }
}
