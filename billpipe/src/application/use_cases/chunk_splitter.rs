// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Splitter Use Case
//!
//! Spec §4.3. Splits a large PDF that the router diverted into
//! `Stage1_LargeFile/` into `pages_per_chunk`-page chunks, carries forward
//! any `.rework.json`/`.notes.json` hints, and registers the parse job.
//!
//! The job record is written *before* any chunk PDF is uploaded (spec §9's
//! race-fix design note): a chunk processor invoked by the chunk's own
//! object-creation event must always find a job record waiting for it.

use std::sync::Arc;

use billpipe_domain::entities::{ChunkRecord, ParseJob};
use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::{JobRepository, ObjectStore};
use billpipe_domain::value_objects::{JobId, ObjectKey, StagePrefix};

use super::support::object_key_under;

pub struct ChunkSplitterUseCase {
    object_store: Arc<dyn ObjectStore>,
    job_repository: Arc<dyn JobRepository>,
    pages_per_chunk: u32,
}

impl ChunkSplitterUseCase {
    pub fn new(object_store: Arc<dyn ObjectStore>, job_repository: Arc<dyn JobRepository>, pages_per_chunk: u32) -> Self {
        Self {
            object_store,
            job_repository,
            pages_per_chunk,
        }
    }

    pub async fn execute(&self, full_key: &str) -> Result<JobId, PipelineError> {
        let source = object_key_under(full_key, StagePrefix::Stage1LargeFile)?;
        let bytes = self.object_store.get(full_key).await?;

        let hints = self.read_hints(&source).await?;
        let chunks = split_pdf_into_chunks(&bytes, self.pages_per_chunk)?;

        let mut job = ParseJob::new(full_key.to_string(), chunks.len() as u32, self.pages_per_chunk);
        if let Some(hints) = &hints {
            if let Some(expected) = hints.expected_line_count {
                job.set_expected_lines(expected);
            }
            if let Some(bill_from) = &hints.bill_from {
                job.set_bill_from(bill_from.clone());
            }
        }

        let mut uploads = Vec::with_capacity(chunks.len());
        for (chunk_num, (start_page, end_page, chunk_bytes)) in chunks.iter().enumerate() {
            let chunk_key = ObjectKey::new(
                StagePrefix::Stage1LargeFileChunks,
                format!("{}/chunk_{:03}.pdf", job.job_id(), chunk_num),
            );
            job.register_chunk(ChunkRecord {
                chunk_num: chunk_num as u32,
                chunk_key: chunk_key.full_key(),
                source_page_start: *start_page,
                source_page_end: *end_page,
                result_key: None,
                completed: false,
            });
            uploads.push((chunk_key, chunk_bytes.clone()));
        }

        // Ordering invariant: the job record must exist before the first
        // chunk PDF lands, or an eagerly-invoked chunk processor would find
        // no job to report into.
        self.job_repository.save(&job).await?;

        for (chunk_key, chunk_bytes) in uploads {
            self.object_store.put(&chunk_key.full_key(), chunk_bytes).await?;
        }

        self.archive_input(&source).await?;

        Ok(job.job_id().clone())
    }

    async fn read_hints(&self, source: &ObjectKey) -> Result<Option<SplitHints>, PipelineError> {
        for ext in [".rework.json", ".notes.json"] {
            let sidecar = source.sidecar(ext);
            if self.object_store.head(&sidecar.full_key()).await?.is_some() {
                let bytes = self.object_store.get(&sidecar.full_key()).await?;
                let value: serde_json::Value = serde_json::from_slice(&bytes)?;
                return Ok(Some(SplitHints {
                    expected_line_count: value.get("expected_line_count").and_then(|v| v.as_u64()).map(|n| n as u32),
                    bill_from: value.get("Bill From").and_then(|v| v.as_str()).map(str::to_string),
                }));
            }
        }
        Ok(None)
    }

    async fn archive_input(&self, source: &ObjectKey) -> Result<(), PipelineError> {
        let dest = source.rekeyed(StagePrefix::Stage2ParsedInputs);
        self.object_store.copy(&source.full_key(), &dest.full_key()).await?;
        self.object_store.delete(&source.full_key()).await?;
        Ok(())
    }
}

struct SplitHints {
    expected_line_count: Option<u32>,
    bill_from: Option<String>,
}

/// Splits a PDF into ordered, contiguous `pages_per_chunk`-page chunks,
/// returning each chunk's 1-based source page range and its own standalone
/// PDF bytes.
fn split_pdf_into_chunks(bytes: &[u8], pages_per_chunk: u32) -> Result<Vec<(u32, u32, Vec<u8>)>, PipelineError> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| PipelineError::schema_drift(format!("unreadable PDF for chunking: {e}")))?;
    let total_pages = document.get_pages().len() as u32;
    if total_pages == 0 {
        return Err(PipelineError::schema_drift("PDF has no pages to chunk"));
    }

    let mut chunks = Vec::new();
    let mut start = 1u32;
    while start <= total_pages {
        let end = (start + pages_per_chunk - 1).min(total_pages);
        let keep: std::collections::HashSet<u32> = (start..=end).collect();
        let remove: Vec<u32> = (1..=total_pages).filter(|p| !keep.contains(p)).collect();

        let mut chunk_doc = document.clone();
        chunk_doc.delete_pages(&remove);
        chunk_doc.prune_objects();

        let mut buffer = Vec::new();
        chunk_doc
            .save_to(&mut buffer)
            .map_err(|e| PipelineError::internal(format!("failed to serialize PDF chunk: {e}")))?;

        chunks.push((start, end, buffer));
        start = end + 1;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::object_store::FilesystemObjectStore;

    struct NullJobRepository;

    #[async_trait::async_trait]
    impl JobRepository for NullJobRepository {
        async fn save(&self, _job: &ParseJob) -> Result<(), PipelineError> {
            Ok(())
        }
        async fn find(&self, _job_id: &JobId) -> Result<Option<ParseJob>, PipelineError> {
            Ok(None)
        }
        async fn complete_chunk(&self, _job_id: &JobId, _chunk_num: u32, _result_key: &str) -> Result<ParseJob, PipelineError> {
            Err(PipelineError::NotFound("not implemented in fake".into()))
        }
    }

    fn minimal_pdf_with_pages(n: usize) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(lopdf::dictionary! {
            "Font" => lopdf::dictionary! { "F1" => font_id },
        });
        let mut page_ids = Vec::new();
        for _ in 0..n {
            let content_id = doc.add_object(lopdf::Stream::new(lopdf::dictionary! {}, b"".to_vec()));
            let page_id = doc.add_object(lopdf::dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            page_ids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            lopdf::Object::Dictionary(lopdf::dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids,
                "Count" => n as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn splits_into_contiguous_page_ranges() {
        let bytes = minimal_pdf_with_pages(5);
        let chunks = split_pdf_into_chunks(&bytes, 2).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].0, chunks[0].1), (1, 2));
        assert_eq!((chunks[1].0, chunks[1].1), (3, 4));
        assert_eq!((chunks[2].0, chunks[2].1), (5, 5));
    }

    #[tokio::test]
    async fn execute_writes_job_before_chunk_uploads_and_archives_input() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(dir.path()));
        store
            .put("Stage1_LargeFile/acme/bill.pdf", minimal_pdf_with_pages(4))
            .await
            .unwrap();

        let use_case = ChunkSplitterUseCase::new(store.clone(), Arc::new(NullJobRepository), 2);
        let job_id = use_case.execute("Stage1_LargeFile/acme/bill.pdf").await.unwrap();

        let uploaded = store
            .list(&format!("{}{job_id}/", StagePrefix::Stage1LargeFileChunks.as_str()))
            .await
            .unwrap();
        assert_eq!(uploaded.len(), 2);
        assert!(store.head("Stage1_LargeFile/acme/bill.pdf").await.unwrap().is_none());
        assert!(store.head("Stage2_ParsedInputs/acme/bill.pdf").await.unwrap().is_some());
    }
}
