//! In-process `DocumentStore`.
//!
//! Used for tests and as the remote tier when no remote is configured. It can
//! be switched offline to exercise the local fallback paths.

use adaptiq_core::document::{
    Document, DocumentStore, Fields, Query, resolve_server_timestamps, split_document_path,
};
use adaptiq_core::error::{AdaptiqError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<String, Fields>>,
    offline: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with a remote error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored documents, across all collections.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AdaptiqError::remote("document store is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Document>> {
        self.ensure_online()?;
        let documents = self.documents.read().await;
        Ok(documents.get(path).map(|fields| Document {
            path: path.to_string(),
            fields: fields.clone(),
        }))
    }

    async fn set(&self, path: &str, mut fields: Fields, merge: bool) -> Result<()> {
        self.ensure_online()?;
        resolve_server_timestamps(&mut fields, Utc::now());

        let mut documents = self.documents.write().await;
        if merge {
            if let Some(existing) = documents.get_mut(path) {
                existing.extend(fields);
                return Ok(());
            }
        }
        documents.insert(path.to_string(), fields);
        Ok(())
    }

    async fn update(&self, path: &str, mut fields: Fields) -> Result<()> {
        self.ensure_online()?;
        resolve_server_timestamps(&mut fields, Utc::now());

        let mut documents = self.documents.write().await;
        let existing = documents
            .get_mut(path)
            .ok_or_else(|| AdaptiqError::not_found("document", path))?;
        existing.extend(fields);
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.ensure_online()?;
        let documents = self.documents.read().await;
        let matching = documents
            .iter()
            .filter(|(path, _)| split_document_path(path).map(|(parent, _)| parent) == Some(collection))
            .map(|(path, fields)| Document {
                path: path.clone(),
                fields: fields.clone(),
            })
            .collect();
        Ok(query.apply(matching))
    }

    async fn add_document(&self, collection: &str, mut fields: Fields) -> Result<String> {
        self.ensure_online()?;
        resolve_server_timestamps(&mut fields, Utc::now());

        let path = format!("{}/{}", collection, Uuid::new_v4().simple());
        self.documents.write().await.insert(path.clone(), fields);
        Ok(path)
    }

    async fn delete_document(&self, path: &str) -> Result<()> {
        self.ensure_online()?;
        self.documents.write().await.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptiq_core::document::Direction;
    use serde_json::{Value, json};

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_set_merge_and_replace() {
        let store = InMemoryDocumentStore::new();
        store.set("users/u/courses/c", fields(json!({"a": 1, "b": 2})), false).await.unwrap();
        store.set("users/u/courses/c", fields(json!({"b": 3})), true).await.unwrap();

        let doc = store.get("users/u/courses/c").await.unwrap().unwrap();
        assert_eq!(doc.fields["a"], 1);
        assert_eq!(doc.fields["b"], 3);

        store.set("users/u/courses/c", fields(json!({"c": 4})), false).await.unwrap();
        let doc = store.get("users/u/courses/c").await.unwrap().unwrap();
        assert!(doc.fields.get("a").is_none());
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let store = InMemoryDocumentStore::new();
        let err = store.update("col/missing", Fields::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_query_only_sees_direct_children() {
        let store = InMemoryDocumentStore::new();
        let sessions = "users/u/courses/c/chatSessions";
        store.add_document(sessions, fields(json!({"n": 1}))).await.unwrap();
        store.add_document(sessions, fields(json!({"n": 2}))).await.unwrap();
        store.set("users/u/courses/c", fields(json!({"n": 3})), false).await.unwrap();
        store
            .add_document("users/u/courses/c/quizSessions", fields(json!({"n": 4})))
            .await
            .unwrap();

        let docs = store
            .query(sessions, &Query::new().order_by("n", Direction::Descending))
            .await
            .unwrap();
        let ns: Vec<&Value> = docs.iter().map(|d| &d.fields["n"]).collect();
        assert_eq!(ns, vec![&json!(2), &json!(1)]);
    }

    #[tokio::test]
    async fn test_server_timestamps_are_resolved() {
        let store = InMemoryDocumentStore::new();
        let mut data = Fields::new();
        data.insert("createdAt".to_string(), store.server_timestamp());
        let path = store.add_document("col", data).await.unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        let created = doc.fields["createdAt"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok());
    }

    #[tokio::test]
    async fn test_offline_fails_everything() {
        let store = InMemoryDocumentStore::new();
        store.set_offline(true);
        assert!(store.get("a/b").await.unwrap_err().is_remote());
        assert!(store.query("a", &Query::new()).await.is_err());

        store.set_offline(false);
        assert!(store.get("a/b").await.unwrap().is_none());
    }
}
