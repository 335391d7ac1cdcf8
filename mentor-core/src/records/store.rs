//! Persistence collaborators for validated records

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::{DomainRecord, RecordKind};
use crate::error::{MentorError, Result};

/// Lists the keys of records already persisted
#[async_trait]
pub trait RecordIndex: Send + Sync {
    async fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>>;
}

/// Accepts validated records under a storage key
#[async_trait]
pub trait RecordStore: RecordIndex {
    async fn persist(&self, key: &str, record: &DomainRecord) -> Result<()>;
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.contains(['/', '\\'])
        || key.starts_with('.')
        || key.chars().any(char::is_control)
    {
        return Err(MentorError::Storage(format!("invalid record key '{}'", key)));
    }
    Ok(())
}

/// Volatile store, handy for tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<(RecordKind, String), DomainRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with records, keyed as given
    pub async fn seed(&self, entries: impl IntoIterator<Item = (String, DomainRecord)>) {
        let mut records = self.records.write().await;
        for (key, record) in entries {
            records.insert((record.kind(), key), record);
        }
    }

    pub async fn get(&self, kind: RecordKind, key: &str) -> Option<DomainRecord> {
        self.records
            .read()
            .await
            .get(&(kind, key.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordIndex for InMemoryRecordStore {
    async fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, key)| key.clone())
            .collect())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn persist(&self, key: &str, record: &DomainRecord) -> Result<()> {
        check_key(key)?;
        self.records
            .write()
            .await
            .insert((record.kind(), key.to_string()), record.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per record: `<root>/<collection>/<key>.json`
#[derive(Debug, Clone)]
pub struct DirectoryRecordStore {
    root: PathBuf,
}

impl DirectoryRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, kind: RecordKind) -> PathBuf {
        self.root.join(kind.collection())
    }

    /// Load a previously persisted record
    pub async fn load(&self, kind: RecordKind, key: &str) -> Result<DomainRecord> {
        check_key(key)?;
        let path = self.collection_dir(kind).join(format!("{}.json", key));
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            MentorError::Storage(format!("failed to read {}: {}", path.display(), e))
        })?;
        let record = match kind {
            RecordKind::Challenge => DomainRecord::Challenge(serde_json::from_str(&text)?),
            RecordKind::Feedback => DomainRecord::Feedback(serde_json::from_str(&text)?),
            RecordKind::LetterResponse => {
                DomainRecord::LetterResponse(serde_json::from_str(&text)?)
            }
        };
        Ok(record)
    }
}

#[async_trait]
impl RecordIndex for DirectoryRecordStore {
    async fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>> {
        let dir = self.collection_dir(kind);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl RecordStore for DirectoryRecordStore {
    async fn persist(&self, key: &str, record: &DomainRecord) -> Result<()> {
        check_key(key)?;
        let dir = self.collection_dir(record.kind());
        tokio::fs::create_dir_all(&dir).await?;

        // Store the bare record so files match the documented record shapes
        let json = match record {
            DomainRecord::Challenge(c) => serde_json::to_string_pretty(c)?,
            DomainRecord::Feedback(f) => serde_json::to_string_pretty(f)?,
            DomainRecord::LetterResponse(l) => serde_json::to_string_pretty(l)?,
        };

        let path = dir.join(format!("{}.json", key));
        tokio::fs::write(&path, json).await.map_err(|e| {
            MentorError::Storage(format!("failed to write {}: {}", path.display(), e))
        })?;
        tracing::debug!(kind = %record.kind(), key, path = %path.display(), "Persisted record");
        Ok(())
    }
}
