// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Small helpers shared across use cases: turning a CLI-supplied full
//! object-store key string into a typed [`ObjectKey`], and sidecar
//! propagation, both needed by more than one stage processor.

use billpipe_domain::error::PipelineError;
use billpipe_domain::repositories::ObjectStore;
use billpipe_domain::value_objects::{ObjectKey, StagePrefix};

/// Splits a full object-store key into an [`ObjectKey`] under the given
/// prefix, erroring if the key doesn't actually live under that prefix.
pub fn object_key_under(full_key: &str, prefix: StagePrefix) -> Result<ObjectKey, PipelineError> {
    let suffix = full_key
        .strip_prefix(prefix.as_str())
        .ok_or_else(|| PipelineError::validation(format!("key {full_key} is not under prefix {}", prefix.as_str())))?;
    Ok(ObjectKey::new(prefix, suffix))
}

/// Copies every sidecar that exists for `source` to the same suffix under
/// `source`'s prefix target, without erroring when a given sidecar is
/// absent — only `.notes.json` and `.rework.json` are ever present, and
/// usually neither is.
pub async fn propagate_sidecars(
    store: &dyn ObjectStore,
    source: &ObjectKey,
    dest_prefix: StagePrefix,
) -> Result<(), PipelineError> {
    for ext in [".notes.json", ".rework.json"] {
        let sidecar = source.sidecar(ext);
        if store.head(&sidecar.full_key()).await?.is_some() {
            let dest = sidecar.rekeyed(dest_prefix);
            store.copy(&sidecar.full_key(), &dest.full_key()).await?;
        }
    }
    Ok(())
}

/// Counts the pages of a PDF, or `None` if the bytes can't be parsed.
/// Shared by the router (page-count routing) and the standard parser
/// (source page range on the single `LineRecord` batch it writes).
pub fn count_pdf_pages(bytes: &[u8]) -> Option<u32> {
    lopdf::Document::load_mem(bytes).ok().map(|doc| doc.get_pages().len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_pdf_pages_is_none_for_garbage_bytes() {
        assert_eq!(count_pdf_pages(b"not a pdf"), None);
    }

    #[test]
    fn object_key_under_splits_known_prefix() {
        let key = object_key_under("Stage1_Pending/acme/bill.pdf", StagePrefix::Stage1Pending).unwrap();
        assert_eq!(key.suffix(), "acme/bill.pdf");
    }

    #[test]
    fn object_key_under_rejects_mismatched_prefix() {
        assert!(object_key_under("Stage1_Standard/acme/bill.pdf", StagePrefix::Stage1Pending).is_err());
    }
}
