// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Spec sheet extraction: PDF text, embedded images, and upload preparation

pub mod image;
pub mod pdf;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::Result;

/// Which of the two compared sheets a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetSlot {
    First,
    Second,
}

impl SheetSlot {
    pub fn number(self) -> u8 {
        match self {
            SheetSlot::First => 1,
            SheetSlot::Second => 2,
        }
    }
}

impl fmt::Display for SheetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A loaded spec sheet and whatever has been extracted from it so far
#[derive(Debug, Clone)]
pub struct SpecSheet {
    pub slot: SheetSlot,
    pub path: PathBuf,
    pub text: Option<String>,
    pub image_paths: Vec<PathBuf>,
}

impl SpecSheet {
    pub fn new(slot: SheetSlot, path: PathBuf) -> Self {
        Self {
            slot,
            path,
            text: None,
            image_paths: Vec::new(),
        }
    }

    /// File name shown to the user
    pub fn label(&self) -> String {
        file_label(&self.path)
    }
}

/// Images pulled out of one PDF
#[derive(Debug, Default)]
pub struct ImageExtraction {
    /// Files written, in page order
    pub paths: Vec<PathBuf>,
    /// One human-readable note per image that was skipped
    pub skipped: Vec<String>,
    /// Images dropped because an identical one was already written
    pub duplicates: usize,
}

/// Base name of a path, or "Unknown"
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Folder for one sheet's images: `{stem}_imgs_{n}` where `n` counts existing entries
pub fn sheet_image_dir(temp_dir: &Path, sheet_path: &Path) -> Result<PathBuf> {
    let stem = sheet_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "sheet".to_string());

    let existing = if temp_dir.exists() {
        std::fs::read_dir(temp_dir)?.count()
    } else {
        0
    };

    Ok(temp_dir.join(format!("{}_imgs_{}", stem, existing)))
}

/// Delete and recreate the temporary image directory
pub fn reset_temp_dir(temp_dir: &Path) -> Result<()> {
    if temp_dir.exists() {
        std::fs::remove_dir_all(temp_dir)?;
    }
    std::fs::create_dir_all(temp_dir)?;
    Ok(())
}
