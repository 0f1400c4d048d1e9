// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `LineId` identifies one extracted line within one PDF: `pdf_id#line_index`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::pdf_id::PdfId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId {
    pdf_id: PdfId,
    line_index: u32,
}

impl LineId {
    pub fn new(pdf_id: PdfId, line_index: u32) -> Self {
        Self { pdf_id, line_index }
    }

    pub fn pdf_id(&self) -> &PdfId {
        &self.pdf_id
    }

    pub fn line_index(&self) -> u32 {
        self.line_index
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pdf_id, self.line_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_pdf_id_hash_index() {
        let pdf_id = PdfId::from_object_key("Stage1_Standard/a.pdf");
        let line_id = LineId::new(pdf_id.clone(), 3);
        assert_eq!(line_id.to_string(), format!("{}#3", pdf_id));
    }
}
