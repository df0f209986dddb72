//! Directory-backed `DocumentStore`.
//!
//! Stands in for the remote tier on a single machine. Each document is one
//! JSON file; a collection is a directory.
//!
//! Directory structure:
//! ```text
//! base_dir/
//! └── users/{uid}/courses/
//!     ├── {contextId}.json              # context record
//!     └── {contextId}/
//!         ├── chatSessions/{id}.json
//!         └── quizSessions/{id}.json
//! ```

use adaptiq_core::document::{
    Document, DocumentStore, Fields, Query, resolve_server_timestamps,
};
use adaptiq_core::error::{AdaptiqError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub struct AsyncDirDocumentStore {
    base_dir: PathBuf,
}

impl AsyncDirDocumentStore {
    /// Creates a store rooted at `base_dir`, creating the directory.
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolves a slash-separated store path below `base_dir`.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut resolved = self.base_dir.clone();
        for segment in path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(AdaptiqError::remote(format!("invalid document path '{}'", path)));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }

    fn document_file(&self, path: &str) -> Result<PathBuf> {
        let mut file = self.resolve(path)?.into_os_string();
        file.push(".json");
        Ok(PathBuf::from(file))
    }

    async fn read_fields(file: &Path) -> Result<Option<Fields>> {
        let content = match fs::read_to_string(file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn write_fields(file: &Path, fields: &Fields) -> Result<()> {
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = file.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(fields)?).await?;
        fs::rename(&tmp, file).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for AsyncDirDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Document>> {
        let file = self.document_file(path)?;
        Ok(Self::read_fields(&file).await?.map(|fields| Document {
            path: path.to_string(),
            fields,
        }))
    }

    async fn set(&self, path: &str, mut fields: Fields, merge: bool) -> Result<()> {
        let file = self.document_file(path)?;
        resolve_server_timestamps(&mut fields, Utc::now());

        let merged = match (merge, Self::read_fields(&file).await?) {
            (true, Some(mut existing)) => {
                existing.extend(fields);
                existing
            }
            _ => fields,
        };
        Self::write_fields(&file, &merged).await
    }

    async fn update(&self, path: &str, mut fields: Fields) -> Result<()> {
        let file = self.document_file(path)?;
        let mut existing = Self::read_fields(&file)
            .await?
            .ok_or_else(|| AdaptiqError::not_found("document", path))?;

        resolve_server_timestamps(&mut fields, Utc::now());
        existing.extend(fields);
        Self::write_fields(&file, &existing).await
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let dir = self.resolve(collection)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = file.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match Self::read_fields(&file).await {
                Ok(Some(fields)) => documents.push(Document {
                    path: format!("{}/{}", collection, id),
                    fields,
                }),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping unreadable document {}: {}", file.display(), e),
            }
        }

        Ok(query.apply(documents))
    }

    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String> {
        let path = format!("{}/{}", collection, Uuid::new_v4().simple());
        self.set(&path, fields, false).await?;
        Ok(path)
    }

    async fn delete_document(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.document_file(path)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptiq_core::document::Direction;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_documents_and_collections_coexist() {
        let temp_dir = TempDir::new().unwrap();
        let store = AsyncDirDocumentStore::new(temp_dir.path()).await.unwrap();

        store
            .set("users/u/courses/algebra", fields(json!({"lastActivityMode": "chat"})), true)
            .await
            .unwrap();
        let path = store
            .add_document("users/u/courses/algebra/chatSessions", fields(json!({"sessionId": "s1"})))
            .await
            .unwrap();

        assert!(temp_dir.path().join("users/u/courses/algebra.json").exists());
        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.fields["sessionId"], "s1");

        let listed = store
            .query("users/u/courses/algebra/chatSessions", &Query::new())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, path);
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let temp_dir = TempDir::new().unwrap();
        let store = AsyncDirDocumentStore::new(temp_dir.path()).await.unwrap();
        for (id, at) in [("a", "2024-01-01T00:00:00Z"), ("b", "2024-01-02T00:00:00Z")] {
            store
                .set(&format!("col/{}", id), fields(json!({"sessionId": id, "at": at})), false)
                .await
                .unwrap();
        }

        let newest = store
            .query("col", &Query::new().order_by("at", Direction::Descending).limit(1))
            .await
            .unwrap();
        assert_eq!(newest[0].id(), "b");

        let only_a = store
            .query("col", &Query::new().where_eq("sessionId", "a"))
            .await
            .unwrap();
        assert_eq!(only_a.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_collection_and_delete_are_quiet() {
        let temp_dir = TempDir::new().unwrap();
        let store = AsyncDirDocumentStore::new(temp_dir.path()).await.unwrap();

        assert!(store.query("nothing/here", &Query::new()).await.unwrap().is_empty());
        store.delete_document("nothing/here/doc").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_merges_into_existing() {
        let temp_dir = TempDir::new().unwrap();
        let store = AsyncDirDocumentStore::new(temp_dir.path()).await.unwrap();

        assert!(store.update("col/x", Fields::new()).await.unwrap_err().is_not_found());

        store.set("col/x", fields(json!({"a": 1})), false).await.unwrap();
        store.update("col/x", fields(json!({"b": 2}))).await.unwrap();
        let doc = store.get("col/x").await.unwrap().unwrap();
        assert_eq!(doc.fields["a"], 1);
        assert_eq!(doc.fields["b"], 2);
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = AsyncDirDocumentStore::new(temp_dir.path()).await.unwrap();

        assert!(store.get("../outside").await.is_err());
        assert!(store.get("a//b").await.is_err());
    }
}
