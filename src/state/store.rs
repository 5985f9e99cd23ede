//! Where shared documents live. Documents are stored as opaque JSON blobs
//! under an opaque id derived from their content.

use crate::{prelude::HashMap, state::document::MapStateDocument, MapError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Accepts ids made of ASCII letters, digits and `-`
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(MapError::Parse(format!("invalid document id \"{}\"", raw)));
        }
        Ok(Self(raw.to_string()))
    }

    fn for_blob(blob: &str) -> Self {
        Self(format!("{:016x}", fxhash::hash64(blob)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, document: &MapStateDocument) -> Result<DocumentId>;

    async fn load(&self, id: &DocumentId) -> Result<MapStateDocument>;
}

fn not_found(id: &DocumentId) -> MapError {
    MapError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no document {}", id),
    ))
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    blobs: Mutex<HashMap<DocumentId, String>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(&self, document: &MapStateDocument) -> Result<DocumentId> {
        let blob = serde_json::to_string(document)?;
        let id = DocumentId::for_blob(&blob);
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.clone(), blob);
        Ok(id)
    }

    async fn load(&self, id: &DocumentId) -> Result<MapStateDocument> {
        let blob = self
            .blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))?;
        MapStateDocument::from_json(&blob)
    }
}

/// One `<id>.json` file per document
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn save(&self, document: &MapStateDocument) -> Result<DocumentId> {
        let blob = serde_json::to_string(document)?;
        let id = DocumentId::for_blob(&blob);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path(&id), blob).await?;
        log::info!("saved document {} to {}", id, self.dir.display());
        Ok(id)
    }

    async fn load(&self, id: &DocumentId) -> Result<MapStateDocument> {
        let blob = tokio::fs::read_to_string(self.path(id)).await?;
        MapStateDocument::from_json(&blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::view::MapView;

    fn document(subject: &str) -> MapStateDocument {
        MapStateDocument {
            subject: subject.to_string(),
            view: MapView::new(-60.0, -36.5, 7.0),
            base_layer_id: "osm".into(),
            layers: Vec::new(),
        }
    }

    #[test]
    fn test_document_id_rejects_paths() {
        assert!(DocumentId::parse("abc-123").is_ok());
        assert!(DocumentId::parse("../etc/passwd").is_err());
        assert!(DocumentId::parse("").is_err());
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryDocumentStore::new();
        let id = store.save(&document("a")).await.unwrap();
        assert_eq!(store.save(&document("a")).await.unwrap(), id);
        let other = store.save(&document("b")).await.unwrap();
        assert_ne!(other, id);
        assert_eq!(store.len(), 2);
        assert_eq!(store.load(&id).await.unwrap(), document("a"));
        assert!(matches!(
            store.load(&DocumentId::parse("missing").unwrap()).await,
            Err(MapError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().join("shared"));
        let id = store.save(&document("files")).await.unwrap();
        assert!(store.dir().join(format!("{}.json", id)).exists());
        assert_eq!(store.load(&id).await.unwrap().subject, "files");
    }
}
