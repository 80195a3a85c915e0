// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Conversation transcript shown to the user and exported on request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a transcript line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    /// Model reply, tagged with the model that produced it
    Ai(String),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "System"),
            Role::User => write!(f, "User"),
            Role::Ai(model) => write!(f, "AI ({})", model),
        }
    }
}

/// A single line of the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub text: String,
    /// Shown on screen but left out of the exported log
    pub internal: bool,
}

impl TranscriptEntry {
    /// The line as displayed, e.g. `System: Extracting text from a.pdf...`
    pub fn line(&self) -> String {
        format!("{}: {}", self.role, self.text)
    }
}

/// Ordered transcript with a cursor for incremental display
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    shown: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn push(&mut self, role: Role, text: impl Into<String>, internal: bool) {
        let entry = TranscriptEntry {
            timestamp: Utc::now(),
            role,
            text: text.into(),
            internal,
        };
        tracing::debug!("{}", entry.line());
        self.entries.push(entry);
    }

    pub fn system(&mut self, text: impl Into<String>) {
        self.push(Role::System, text, false);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Entries that belong in an export
    pub fn log_entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter().filter(|e| !e.internal)
    }

    /// Every displayed line, internal ones included
    pub fn display_lines(&self) -> Vec<String> {
        self.entries.iter().map(TranscriptEntry::line).collect()
    }

    /// Lines of the exportable log
    pub fn log_lines(&self) -> Vec<String> {
        self.log_entries().map(TranscriptEntry::line).collect()
    }

    pub fn is_log_empty(&self) -> bool {
        self.log_entries().next().is_none()
    }

    /// Lines added since the previous call
    pub fn take_unseen(&mut self) -> Vec<String> {
        let lines = self.entries[self.shown..].iter().map(TranscriptEntry::line).collect();
        self.shown = self.entries.len();
        lines
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.shown = 0;
    }

    /// Latest reply from the model, if any
    pub fn last_ai_text(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| matches!(e.role, Role::Ai(_)))
            .map(|e| e.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let mut transcript = Transcript::new();
        transcript.system("Generative AI configured successfully.");
        transcript.push(Role::User, "Which has lower dropout?", false);
        transcript.push(Role::Ai("models/gemini-2.0-flash".into()), "The LM1117.", false);

        assert_eq!(
            transcript.display_lines(),
            vec![
                "System: Generative AI configured successfully.",
                "User: Which has lower dropout?",
                "AI (models/gemini-2.0-flash): The LM1117.",
            ]
        );
    }

    #[test]
    fn test_internal_entries_not_logged() {
        let mut transcript = Transcript::new();
        transcript.push(Role::System, "Analysis inputs: ...", true);
        assert!(transcript.is_log_empty());
        assert_eq!(transcript.display_lines().len(), 1);

        transcript.system("Sending request to AI...");
        assert_eq!(transcript.log_lines(), vec!["System: Sending request to AI..."]);
    }

    #[test]
    fn test_take_unseen_and_clear() {
        let mut transcript = Transcript::new();
        transcript.system("one");
        assert_eq!(transcript.take_unseen(), vec!["System: one"]);
        assert!(transcript.take_unseen().is_empty());

        transcript.system("two");
        transcript.clear();
        assert!(transcript.take_unseen().is_empty());
        transcript.system("three");
        assert_eq!(transcript.take_unseen(), vec!["System: three"]);
    }

    #[test]
    fn test_last_ai_text() {
        let mut transcript = Transcript::new();
        assert!(transcript.last_ai_text().is_none());
        transcript.push(Role::Ai("m".into()), "first", false);
        transcript.system("between");
        transcript.push(Role::Ai("m".into()), "second", false);
        assert_eq!(transcript.last_ai_text(), Some("second"));
    }

    #[test]
    fn test_entry_serializes_role() {
        let mut transcript = Transcript::new();
        transcript.push(Role::Ai("models/gemma-3-4b-it".into()), "hi", false);
        let json = serde_json::to_value(&transcript.entries()[0]).unwrap();
        assert_eq!(json["role"]["kind"], "ai");
        assert_eq!(json["role"]["model"], "models/gemma-3-4b-it");
    }
}
