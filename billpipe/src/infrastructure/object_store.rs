// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Filesystem Object Store
//!
//! Implements `billpipe_domain::repositories::ObjectStore` over a local
//! directory tree: an object key (e.g. `Stage1_Pending/acme/bill.pdf`) maps
//! directly to a file path under the configured root, mirroring how the
//! original Lambda functions addressed S3 keys one-to-one with prefixes.
//! Swapping this for an S3-compatible client at deploy time only requires a
//! new implementation of the same port; no application code changes.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{ObjectMetadata, ObjectStore};

/// A local-filesystem-backed `ObjectStore` rooted at `root`.
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves an object key to a filesystem path, rejecting any key that
    /// would traverse outside `root` (keys come from CLI arguments that
    /// already passed `SecureArgParser`, but this is cheap belt-and-braces).
    fn resolve(&self, key: &str) -> Result<PathBuf, PipelineError> {
        let relative = Path::new(key);
        if relative.components().any(|c| matches!(c, Component::ParentDir | Component::RootDir)) {
            return Err(PipelineError::validation(format!("object key escapes store root: {key}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, PipelineError> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => {
                let last_modified: DateTime<Utc> = meta.modified().map(DateTime::from).unwrap_or_else(|_| Utc::now());
                Ok(Some(ObjectMetadata { size_bytes: meta.len(), last_modified }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PipelineError::from(e)),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, PipelineError> {
        let path = self.resolve(key)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::NotFound(key.to_string())
            } else {
                PipelineError::from(e)
            }
        })
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), PipelineError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&path).await?;
        file.write_all(&body).await?;
        Ok(())
    }

    async fn copy(&self, source_key: &str, dest_key: &str) -> Result<(), PipelineError> {
        let source = self.resolve(source_key)?;
        let dest = self.resolve(dest_key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&source, &dest).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::NotFound(source_key.to_string())
            } else {
                PipelineError::from(e)
            }
        })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PipelineError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::from(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, PipelineError> {
        let mut results = Vec::new();
        let base = self.resolve(prefix)?;
        let scan_root = if base.is_dir() { base } else { base.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone()) };

        let mut stack = vec![scan_root];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(PipelineError::from(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let relative = path.strip_prefix(&self.root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
                if relative.starts_with(prefix) {
                    results.push(relative);
                }
            }
        }
        results.sort();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        store.put("Stage1_Pending/acme/bill.pdf", b"pdf-bytes".to_vec()).await.unwrap();
        let body = store.get("Stage1_Pending/acme/bill.pdf").await.unwrap();
        assert_eq!(body, b"pdf-bytes");
    }

    #[tokio::test]
    async fn head_on_missing_key_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        assert!(store.head("Stage1_Pending/missing.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        store.delete("Stage1_Pending/never-existed.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn copy_preserves_source_and_creates_dest() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        store.put("Stage1_Pending/a.pdf", b"data".to_vec()).await.unwrap();
        store.copy("Stage1_Pending/a.pdf", "Stage1_Standard/a.pdf").await.unwrap();
        assert_eq!(store.get("Stage1_Standard/a.pdf").await.unwrap(), b"data");
        assert_eq!(store.get("Stage1_Pending/a.pdf").await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn list_filters_by_prefix_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        store.put("Stage1_LargeFile_Results/job1/chunk_000.json", b"{}".to_vec()).await.unwrap();
        store.put("Stage1_LargeFile_Results/job1/chunk_001.json", b"{}".to_vec()).await.unwrap();
        store.put("Stage1_Pending/other.pdf", b"x".to_vec()).await.unwrap();
        let found = store.list("Stage1_LargeFile_Results/job1/").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        assert!(store.get("../../etc/passwd").await.is_err());
    }
}
