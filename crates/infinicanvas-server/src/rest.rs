//! Row access for the `canvases` and `canvas_versions` tables.
//!
//! Supports the subset of the REST query language the client uses:
//! `col=eq.value` filters, `order=col.asc|desc`, `limit`, `select=*`,
//! `Prefer: return=representation` and single-object responses via
//! `Accept: application/vnd.pgrst.object+json`.

use crate::{ApiError, AppState, timestamp};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::DateTime;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const SINGLE_OBJECT_MIME: &str = "application/vnd.pgrst.object+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Canvases,
    CanvasVersions,
}

impl Table {
    fn parse(name: &str) -> Result<Self, ApiError> {
        match name {
            "canvases" => Ok(Self::Canvases),
            "canvas_versions" => Ok(Self::CanvasVersions),
            other => Err(ApiError::new(
                StatusCode::NOT_FOUND,
                format!("relation \"public.{}\" does not exist", other),
            )),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Canvases => "canvases",
            Self::CanvasVersions => "canvas_versions",
        }
    }

    fn rows(self, state: &AppState) -> &DashMap<String, Value> {
        match self {
            Self::Canvases => &state.canvases,
            Self::CanvasVersions => &state.canvas_versions,
        }
    }

    /// Row-level security: canvases belong to `user_id`, versions to the
    /// owner of their canvas.
    fn owned_by(self, state: &AppState, row: &Value, user_id: &str) -> bool {
        match self {
            Self::Canvases => row.get("user_id").and_then(Value::as_str) == Some(user_id),
            Self::CanvasVersions => row
                .get("canvas_id")
                .and_then(Value::as_str)
                .and_then(|id| state.canvases.get(id))
                .is_some_and(|canvas| {
                    canvas.get("user_id").and_then(Value::as_str) == Some(user_id)
                }),
        }
    }

    fn policy_violation(self) -> ApiError {
        ApiError::new(
            StatusCode::FORBIDDEN,
            format!(
                "new row violates row-level security policy for table \"{}\"",
                self.name()
            ),
        )
    }
}

/// Parsed query string.
#[derive(Debug, Default, PartialEq)]
struct RowQuery {
    filters: Vec<(String, String)>,
    /// Column and whether it sorts descending
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl RowQuery {
    fn parse(params: Vec<(String, String)>) -> Result<Self, ApiError> {
        let mut query = Self::default();
        for (key, value) in params {
            match key.as_str() {
                "select" => {}
                "order" => {
                    let (column, descending) = match value.rsplit_once('.') {
                        Some((column, "desc")) => (column, true),
                        Some((column, "asc")) => (column, false),
                        _ => (value.as_str(), false),
                    };
                    query.order = Some((column.to_string(), descending));
                }
                "limit" => {
                    let limit = value.parse().map_err(|_| {
                        ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid limit: {}", value))
                    })?;
                    query.limit = Some(limit);
                }
                _ => {
                    let expected = value.strip_prefix("eq.").ok_or_else(|| {
                        ApiError::new(
                            StatusCode::BAD_REQUEST,
                            format!("Unsupported filter on {}: {}", key, value),
                        )
                    })?;
                    query.filters.push((key, expected.to_string()));
                }
            }
        }
        Ok(query)
    }

    fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(column).map(value_text).as_deref() == Some(expected))
    }

    /// Ids of the rows `user_id` may see that pass the filters.
    fn matching_ids(&self, state: &AppState, table: Table, user_id: &str) -> Vec<String> {
        table
            .rows(state)
            .iter()
            .filter(|row| table.owned_by(state, row.value(), user_id) && self.matches(row.value()))
            .map(|row| row.key().clone())
            .collect()
    }

    fn sort_and_limit(&self, rows: &mut Vec<Value>) {
        if let Some((column, descending)) = &self.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                if *descending { ordering.reverse() } else { ordering }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
    }
}

/// Text form of a value as compared by `eq.` filters.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Order timestamps chronologically, numbers numerically, and anything else
/// as text. Missing values sort last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(a), Some(b)) => value_text(a).cmp(&value_text(b)),
    }
}

fn wants_representation(headers: &HeaderMap) -> bool {
    headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|p| p.trim() == "return=representation"))
}

fn wants_single(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(SINGLE_OBJECT_MIME))
}

/// Rows as a JSON array, or as one object when the caller asked for it.
fn rows_response(status: StatusCode, headers: &HeaderMap, mut rows: Vec<Value>) -> Response {
    if !wants_single(headers) {
        return (status, Json(Value::Array(rows))).into_response();
    }
    if rows.len() != 1 {
        return ApiError::new(
            StatusCode::NOT_ACCEPTABLE,
            "JSON object requested, multiple (or no) rows returned",
        )
        .into_response();
    }
    (status, Json(rows.remove(0))).into_response()
}

/// Response for a write: the touched rows when asked for, otherwise no body.
fn write_response(
    status: StatusCode,
    headers: &HeaderMap,
    rows: Vec<Value>,
) -> Result<Response, ApiError> {
    if wants_representation(headers) {
        Ok(rows_response(status, headers, rows))
    } else if status == StatusCode::CREATED {
        Ok(status.into_response())
    } else {
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}

fn as_object(value: Value) -> Result<Map<String, Value>, ApiError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Expected a JSON object",
        )),
    }
}

/// GET /rest/v1/{table}
pub(crate) async fn select(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let table = Table::parse(&table)?;
    let query = RowQuery::parse(params)?;

    // anonymous callers see no rows
    let mut rows = match state.optional_user(&headers)? {
        Some(user_id) => query
            .matching_ids(&state, table, &user_id)
            .into_iter()
            .filter_map(|id| table.rows(&state).get(&id).map(|row| row.value().clone()))
            .collect(),
        None => Vec::new(),
    };
    query.sort_and_limit(&mut rows);
    debug!("Selected {} rows from {}", rows.len(), table.name());

    Ok(rows_response(StatusCode::OK, &headers, rows))
}

/// POST /rest/v1/{table}
pub(crate) async fn insert(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let table = Table::parse(&table)?;
    let user_id = state.authenticate(&headers)?;

    let objects = match body {
        Value::Array(items) => items,
        single => vec![single],
    };

    let mut rows = Vec::with_capacity(objects.len());
    for object in objects {
        let mut row = as_object(object)?;
        let now = timestamp();
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        row.entry("created_at")
            .or_insert_with(|| Value::String(now.clone()));
        if table == Table::Canvases {
            row.entry("updated_at").or_insert_with(|| Value::String(now));
            row.entry("user_id")
                .or_insert_with(|| Value::String(user_id.clone()));
        }

        let row = Value::Object(row);
        if !table.owned_by(&state, &row, &user_id) {
            return Err(table.policy_violation());
        }
        rows.push(row);
    }

    let store = table.rows(&state);
    for row in &rows {
        let id = row.get("id").map(value_text).unwrap_or_default();
        if store.contains_key(&id) {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                format!("duplicate key value violates unique constraint \"{}_pkey\"", table.name()),
            ));
        }
    }
    for row in &rows {
        let id = row.get("id").map(value_text).unwrap_or_default();
        store.insert(id, row.clone());
    }
    info!("Inserted {} rows into {}", rows.len(), table.name());

    write_response(StatusCode::CREATED, &headers, rows)
}

/// PATCH /rest/v1/{table}
pub(crate) async fn update(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let table = Table::parse(&table)?;
    let user_id = state.authenticate(&headers)?;
    let query = RowQuery::parse(params)?;
    let mut changes = as_object(body)?;
    changes.remove("id");

    if table == Table::Canvases {
        if changes
            .get("user_id")
            .is_some_and(|owner| owner.as_str() != Some(user_id.as_str()))
        {
            return Err(table.policy_violation());
        }
        changes
            .entry("updated_at")
            .or_insert_with(|| Value::String(timestamp()));
    }

    let ids = query.matching_ids(&state, table, &user_id);
    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        let Some(mut row) = table.rows(&state).get_mut(&id) else {
            continue;
        };
        if let Value::Object(fields) = row.value_mut() {
            for (key, value) in &changes {
                fields.insert(key.clone(), value.clone());
            }
        }
        rows.push(row.value().clone());
    }
    info!("Updated {} rows in {}", rows.len(), table.name());

    write_response(StatusCode::OK, &headers, rows)
}

/// DELETE /rest/v1/{table}
///
/// Deleting a canvas also deletes its versions.
pub(crate) async fn remove(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let table = Table::parse(&table)?;
    let user_id = state.authenticate(&headers)?;
    let query = RowQuery::parse(params)?;

    let ids = query.matching_ids(&state, table, &user_id);
    let rows: Vec<Value> = ids
        .iter()
        .filter_map(|id| table.rows(&state).remove(id).map(|(_, row)| row))
        .collect();

    if table == Table::Canvases {
        state.canvas_versions.retain(|_, version| {
            let canvas_id = version.get("canvas_id").and_then(Value::as_str);
            !canvas_id.is_some_and(|canvas_id| ids.iter().any(|id| id == canvas_id))
        });
    }
    info!("Deleted {} rows from {}", rows.len(), table.name());

    write_response(StatusCode::OK, &headers, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_query() {
        let query = RowQuery::parse(params(&[
            ("select", "*"),
            ("user_id", "eq.u1"),
            ("order", "updated_at.desc"),
            ("limit", "5"),
        ]))
        .unwrap();
        assert_eq!(query.filters, vec![("user_id".to_string(), "u1".to_string())]);
        assert_eq!(query.order, Some(("updated_at".to_string(), true)));
        assert_eq!(query.limit, Some(5));

        let plain = RowQuery::parse(params(&[("order", "title")])).unwrap();
        assert_eq!(plain.order, Some(("title".to_string(), false)));
    }

    #[test]
    fn test_parse_query_rejects_other_operators() {
        let err = RowQuery::parse(params(&[("title", "like.*x*")])).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(RowQuery::parse(params(&[("limit", "many")])).is_err());
    }

    #[test]
    fn test_filter_matching() {
        let query = RowQuery::parse(params(&[("id", "eq.c1"), ("version", "eq.3")])).unwrap();
        assert!(query.matches(&json!({ "id": "c1", "version": 3 })));
        assert!(!query.matches(&json!({ "id": "c1", "version": 4 })));
        assert!(!query.matches(&json!({ "id": "c1" })));
    }

    #[test]
    fn test_order_by_timestamp() {
        let query = RowQuery::parse(params(&[("order", "updated_at.desc")])).unwrap();
        let mut rows = vec![
            json!({ "id": "old", "updated_at": "2024-01-01T10:00:00Z" }),
            json!({ "id": "new", "updated_at": "2024-01-01T10:00:00.500Z" }),
            json!({ "id": "none" }),
            json!({ "id": "mid", "updated_at": "2024-01-01T10:00:00.1+00:00" }),
        ];
        query.sort_and_limit(&mut rows);
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        // descending reverses the nulls-last order too
        assert_eq!(ids, vec!["none", "new", "mid", "old"]);
    }

    #[test]
    fn test_ownership() {
        let state = AppState::new("anon");
        state
            .canvases
            .insert("c1".to_string(), json!({ "id": "c1", "user_id": "u1" }));

        assert!(Table::Canvases.owned_by(&state, &json!({ "user_id": "u1" }), "u1"));
        assert!(!Table::Canvases.owned_by(&state, &json!({ "user_id": "u2" }), "u1"));
        assert!(Table::CanvasVersions.owned_by(&state, &json!({ "canvas_id": "c1" }), "u1"));
        assert!(!Table::CanvasVersions.owned_by(&state, &json!({ "canvas_id": "c1" }), "u2"));
        assert!(!Table::CanvasVersions.owned_by(&state, &json!({ "canvas_id": "zz" }), "u1"));
    }

    #[test]
    fn test_prefer_headers() {
        let mut headers = HeaderMap::new();
        assert!(!wants_representation(&headers));
        headers.insert("prefer", "count=none, return=representation".parse().unwrap());
        assert!(wants_representation(&headers));

        assert!(!wants_single(&headers));
        headers.insert(header::ACCEPT, SINGLE_OBJECT_MIME.parse().unwrap());
        assert!(wants_single(&headers));
    }

    #[test]
    fn test_unknown_table() {
        let err = Table::parse("users").unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
