// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Conversation history export

pub mod docx;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{ExportConfig, TableConfig};
use crate::tables::{dedupe_narrative, split_segments, Segment};
use crate::transcript::{Role, TranscriptEntry};
use crate::Result;
use docx::Block;

/// Output file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Docx,
    Jsonl,
}

impl ExportFormat {
    /// Pick a format from the file extension; anything unknown is written as .docx
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("jsonl") | Some("json") => ExportFormat::Jsonl,
            _ => ExportFormat::Docx,
        }
    }
}

/// Add `.docx` when the path has no extension
pub fn resolve_export_path(path: &Path) -> PathBuf {
    if path.extension().is_none() {
        path.with_extension("docx")
    } else {
        path.to_path_buf()
    }
}

/// Everything written to an exported history
pub struct ExportDocument<'a> {
    pub sheet1: Option<String>,
    pub sheet2: Option<String>,
    pub model: Option<String>,
    pub entries: Vec<&'a TranscriptEntry>,
}

/// Write the document to `path` in the format implied by its extension
pub fn export_history(
    path: &Path,
    document: &ExportDocument<'_>,
    export: &ExportConfig,
    tables: &TableConfig,
) -> Result<PathBuf> {
    let path = resolve_export_path(path);

    match ExportFormat::from_path(&path) {
        ExportFormat::Docx => export_docx(&path, document, export, tables)?,
        ExportFormat::Jsonl => export_jsonl(&path, &document.entries)?,
    }

    info!("History exported to {:?}", path);
    Ok(path)
}

/// Write the history as a Word document
pub fn export_docx(
    path: &Path,
    document: &ExportDocument<'_>,
    export: &ExportConfig,
    tables: &TableConfig,
) -> Result<()> {
    docx::write_docx(path, &history_blocks(document, export, tables))
}

/// Lay out the history: header lines, then one block per log entry
///
/// Model replies are split into prose and tables when `include_tables` is set.
pub fn history_blocks(document: &ExportDocument<'_>, export: &ExportConfig, tables: &TableConfig) -> Vec<Block> {
    let mut blocks = vec![Block::Heading(export.title.clone())];

    if let Some(name) = &document.sheet1 {
        blocks.push(Block::Paragraph(format!("Spec Sheet 1: {}", name)));
    }
    if let Some(name) = &document.sheet2 {
        blocks.push(Block::Paragraph(format!("Spec Sheet 2: {}", name)));
    }
    blocks.push(Block::Paragraph(format!(
        "AI Model (last used): {}",
        document.model.as_deref().unwrap_or("N/A")
    )));
    blocks.push(Block::Paragraph("-".repeat(20)));

    for entry in &document.entries {
        if !export.include_tables || !matches!(entry.role, Role::Ai(_)) {
            blocks.push(Block::Paragraph(entry.line()));
            continue;
        }

        let mut segments = split_segments(&entry.text);
        if export.dedupe_narrative {
            segments = dedupe_narrative(segments, tables.redundancy_threshold, tables.min_redundant_tokens);
        }

        let prefix = format!("{}:", entry.role);
        match segments.first_mut() {
            Some(Segment::Prose(first)) => *first = format!("{} {}", prefix, first),
            _ => blocks.push(Block::Paragraph(prefix)),
        }

        blocks.extend(segments.into_iter().map(|segment| match segment {
            Segment::Prose(text) => Block::Paragraph(text),
            Segment::Table(table) => Block::Table(table),
        }));
    }

    blocks
}

/// Write one JSON object per entry
pub fn export_jsonl(path: &Path, entries: &[&TranscriptEntry]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for entry in entries {
        let json = serde_json::to_string(entry)?;
        writeln!(writer, "{}", json)?;
    }

    writer.flush()?;
    Ok(())
}
