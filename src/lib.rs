// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Comparator: AI-assisted electronic component datasheet comparison
//!
//! Loads two PDF spec sheets, extracts their text and images, asks a hosted
//! Gemini model for a side-by-side analysis, then supports follow-up chat,
//! comparison-table display and history export.

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod gemini;
pub mod prompt;
pub mod session;
pub mod tables;
pub mod transcript;

pub use config::AppConfig;
pub use error::{ComparatorError, Result};
