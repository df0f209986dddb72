//! Remote document store capability.
//!
//! The remote tier is modelled as a hierarchical document store: documents
//! live at slash-separated paths and hold a JSON object of fields; the parent
//! of a document path is its collection. Transport, auth and indexing are the
//! implementation's business.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Field map of a document.
pub type Fields = Map<String, Value>;

/// Key of the placeholder object resolved to the store's clock on write.
pub const SERVER_TIMESTAMP_KEY: &str = "__adaptiqServerTimestamp";

/// The server-timestamp placeholder, `{"__adaptiqServerTimestamp": true}`.
pub fn server_timestamp_sentinel() -> Value {
    let mut marker = Map::new();
    marker.insert(SERVER_TIMESTAMP_KEY.to_string(), Value::Bool(true));
    Value::Object(marker)
}

pub fn is_server_timestamp(value: &Value) -> bool {
    matches!(value, Value::Object(map)
        if map.len() == 1 && map.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true)))
}

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Full path, `{collection}/{id}`
    pub path: String,
    pub fields: Fields,
}

impl Document {
    /// Last path segment.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filter, ordering and limit over one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub where_equals: Option<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_equals = Some((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluates the query over every document of a collection.
    ///
    /// Documents missing the ordering field sort last regardless of direction.
    pub fn apply(&self, mut documents: Vec<Document>) -> Vec<Document> {
        if let Some((field, expected)) = &self.where_equals {
            documents.retain(|doc| doc.fields.get(field) == Some(expected));
        }

        if let Some((field, direction)) = &self.order_by {
            documents.sort_by(|a, b| match (a.fields.get(field), b.fields.get(field)) {
                (Some(x), Some(y)) => match direction {
                    Direction::Ascending => compare_values(x, y),
                    Direction::Descending => compare_values(y, x),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }

        if let Some(limit) = self.limit {
            documents.truncate(limit);
        }

        documents
    }
}

/// Orders two field values: timestamps chronologically, numbers numerically,
/// everything else by its string form.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Replaces top-level server-timestamp placeholders with `now`.
///
/// Nested values are stored as given.
pub fn resolve_server_timestamps(fields: &mut Fields, now: DateTime<Utc>) {
    for value in fields.values_mut() {
        if is_server_timestamp(value) {
            *value = Value::String(crate::session::format_timestamp(now));
        }
    }
}

/// Splits `collection/id` into its collection and id.
pub fn split_document_path(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('/')
}

/// The remote document store consumed by the history subsystem.
///
/// All operations are async and may fail; callers treat any error as "remote
/// unreachable" and fall back to the local cache.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document. `Ok(None)` when it does not exist.
    async fn get(&self, path: &str) -> Result<Option<Document>>;

    /// Writes a document; with `merge` the fields are overlaid on any existing
    /// ones, otherwise the document is replaced.
    async fn set(&self, path: &str, fields: Fields, merge: bool) -> Result<()>;

    /// Overlays fields on an existing document. Fails when it does not exist.
    async fn update(&self, path: &str, fields: Fields) -> Result<()>;

    /// Runs a query over the documents directly inside `collection`.
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    /// Creates a document with a generated id and returns its path.
    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Deletes a document. Deleting a missing document is not an error.
    async fn delete_document(&self, path: &str) -> Result<()>;

    /// A value that the store replaces with its own clock when written.
    fn server_timestamp(&self) -> Value {
        server_timestamp_sentinel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        Document {
            path: format!("col/{}", id),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_query_filter_order_limit() {
        let docs = vec![
            doc("a", json!({"kind": "x", "at": "2024-01-01T00:00:00Z"})),
            doc("b", json!({"kind": "x", "at": "2024-01-03T00:00:00Z"})),
            doc("c", json!({"kind": "y", "at": "2024-01-04T00:00:00Z"})),
            doc("d", json!({"kind": "x", "at": "2024-01-02T00:00:00Z"})),
        ];

        let result = Query::new()
            .where_eq("kind", "x")
            .order_by("at", Direction::Descending)
            .limit(2)
            .apply(docs);

        let ids: Vec<&str> = result.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["b", "d"]);
    }

    #[test]
    fn test_timestamps_compare_chronologically() {
        // lexicographic order would put ".5Z" before "Z"
        let earlier = json!("2024-01-01T00:00:00Z");
        let later = json!("2024-01-01T00:00:00.500Z");
        assert_eq!(compare_values(&earlier, &later), Ordering::Less);
    }

    #[test]
    fn test_missing_order_field_sorts_last() {
        let docs = vec![doc("a", json!({})), doc("b", json!({"n": 1}))];
        let result = Query::new().order_by("n", Direction::Ascending).apply(docs);
        assert_eq!(result[0].id(), "b");
    }

    #[test]
    fn test_resolve_server_timestamps_top_level_only() {
        let mut fields = json!({
            "createdAt": server_timestamp_sentinel(),
            "meta": {"touched": server_timestamp_sentinel()},
            "messages": [{"content": "__adaptiqServerTimestamp"}],
            "title": "keep"
        })
        .as_object()
        .cloned()
        .unwrap();
        let now = Utc::now();
        resolve_server_timestamps(&mut fields, now);

        assert_eq!(fields["createdAt"], json!(crate::session::format_timestamp(now)));
        assert_eq!(fields["meta"]["touched"], server_timestamp_sentinel());
        assert_eq!(fields["messages"][0]["content"], json!("__adaptiqServerTimestamp"));
        assert_eq!(fields["title"], json!("keep"));
    }

    #[test]
    fn test_plain_strings_are_not_placeholders() {
        assert!(is_server_timestamp(&server_timestamp_sentinel()));
        assert!(!is_server_timestamp(&json!(SERVER_TIMESTAMP_KEY)));
        assert!(!is_server_timestamp(&json!({"__adaptiqServerTimestamp": true, "other": 1})));
    }

    #[test]
    fn test_split_document_path() {
        assert_eq!(
            split_document_path("users/u/courses/c/chatSessions/abc"),
            Some(("users/u/courses/c/chatSessions", "abc"))
        );
        assert_eq!(split_document_path("root"), None);
    }
}
