// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Comparison session: sheet loading, model selection, analysis and chat
//!
//! Every handler reports its outcome as transcript lines instead of returning
//! errors; a failed step leaves the session usable for the next command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::export::{export_history, ExportDocument};
use crate::extract::image::prepare_image;
use crate::extract::{file_label, pdf, reset_temp_dir, sheet_image_dir, SheetSlot, SpecSheet};
use crate::gemini::{Content, ContentGenerator, GenerateOutcome, Part};
use crate::prompt::{build_comparison_prompt, SheetInput};
use crate::tables::{comparison_table, extract_part_numbers, MarkdownTable};
use crate::transcript::{Role, Transcript};
use crate::ComparatorError;

/// Source of the API key, consulted on every (re)configuration
pub type KeySource = Box<dyn Fn() -> Option<String> + Send + Sync>;

/// State of one comparison
pub struct Session {
    config: AppConfig,
    generator: Arc<dyn ContentGenerator>,
    key_source: KeySource,
    api_key: Option<String>,
    /// Model picked by the user, whether or not it is active
    selected_model: String,
    /// Model ready to receive requests
    model: Option<String>,
    /// Follow-up conversation; `None` until the first chat message
    chat: Option<Vec<Content>>,
    sheet1: Option<SpecSheet>,
    sheet2: Option<SpecSheet>,
    transcript: Transcript,
}

impl Session {
    /// Create a session reading the API key from the configured environment variable
    pub fn new(config: AppConfig, generator: Arc<dyn ContentGenerator>) -> Self {
        let lookup = config.clone();
        let key_source: KeySource = Box::new(move || lookup.api_key());
        Self::with_key_source(config, generator, key_source)
    }

    /// Create a session with an explicit key source
    pub fn with_key_source(config: AppConfig, generator: Arc<dyn ContentGenerator>, key_source: KeySource) -> Self {
        let selected_model = config.ai_engine.default_model.clone();
        let mut session = Self {
            config,
            generator,
            key_source,
            api_key: None,
            selected_model,
            model: None,
            chat: None,
            sheet1: None,
            sheet2: None,
            transcript: Transcript::new(),
        };

        let temp_dir = session.temp_dir();
        if let Err(e) = std::fs::create_dir_all(&temp_dir) {
            session.transcript.system(format!(
                "Critical Error: Cannot create temporary directory {}: {}",
                temp_dir.display(),
                e
            ));
        }

        session.configure_ai();
        if session.api_key.is_some() {
            session.initialize_model(None);
        }
        session
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn is_api_key_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Whether chat messages can be sent right now
    pub fn can_chat(&self) -> bool {
        self.api_key.is_some() && self.model.is_some()
    }

    pub fn sheet(&self, slot: SheetSlot) -> Option<&SpecSheet> {
        match slot {
            SheetSlot::First => self.sheet1.as_ref(),
            SheetSlot::Second => self.sheet2.as_ref(),
        }
    }

    fn sheet_mut(&mut self, slot: SheetSlot) -> &mut Option<SpecSheet> {
        match slot {
            SheetSlot::First => &mut self.sheet1,
            SheetSlot::Second => &mut self.sheet2,
        }
    }

    /// Status label for a slot, e.g. `File 1: LM317.pdf`
    pub fn sheet_label(&self, slot: SheetSlot) -> String {
        let name = self.sheet(slot).map(SpecSheet::label).unwrap_or_else(|| "None".to_string());
        format!("File {}: {}", slot, name)
    }

    fn temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.extraction.temp_dir)
    }

    /// Read the API key and record whether AI features are available
    pub fn configure_ai(&mut self) {
        match (self.key_source)() {
            Some(key) => {
                self.api_key = Some(key);
                self.transcript.system("Generative AI configured successfully.");
            }
            None => {
                self.api_key = None;
                self.transcript.system(format!(
                    "Error - {} environment variable not set. AI features disabled.",
                    self.config.ai_engine.api_key_env
                ));
            }
        }
    }

    /// Make `name` (or the current selection) the active model
    pub fn initialize_model(&mut self, name: Option<&str>) -> bool {
        let name = match name {
            Some(name) => name.to_string(),
            None => {
                debug!("Initializing model from selection '{}'", self.selected_model);
                self.selected_model.clone()
            }
        };

        if name.is_empty() || !self.config.ai_engine.models.contains(&name) {
            self.transcript.system(format!(
                "Invalid or empty model name ('{}') for initialization. Available options: {}. Initialization aborted.",
                name,
                self.config.ai_engine.models.len()
            ));
            self.model = None;
            self.chat = None;
            return false;
        }

        if self.model.as_deref() == Some(name.as_str()) && self.api_key.is_some() {
            return true;
        }

        if self.api_key.is_none() {
            self.transcript.system("Cannot initialize model - API key not configured.");
            self.model = None;
            self.chat = None;
            return false;
        }

        self.transcript.system(format!("Attempting to initialize AI model: {}...", name));
        self.model = Some(name.clone());
        self.chat = None;
        self.transcript.system(format!("Successfully initialized AI model: {}", name));
        true
    }

    /// Select a model and, if it becomes active, analyze the loaded sheets
    pub async fn select_model(&mut self, name: &str) {
        if self.config.ai_engine.models.iter().any(|m| m == name) {
            self.selected_model = name.to_string();
        }
        if self.initialize_model(Some(name)) {
            self.check_and_process().await;
        }
    }

    /// Load a spec sheet into a slot, analyzing both once both are present
    pub async fn load_sheet(&mut self, slot: SheetSlot, path: PathBuf) {
        info!("Loading spec sheet {}: {:?}", slot, path);
        *self.sheet_mut(slot) = Some(SpecSheet::new(slot, path));
        self.check_and_process().await;
    }

    /// Start the analysis when both sheets are loaded and AI is usable
    pub async fn check_and_process(&mut self) {
        if self.sheet1.is_none() || self.sheet2.is_none() {
            return;
        }

        self.transcript.clear();
        self.transcript.system("Both spec sheets loaded. Verifying AI model status...");
        self.configure_ai();

        if self.api_key.is_none() {
            self.transcript.system("API Key not configured. Cannot process specs.");
            return;
        }

        if self.model.is_none() {
            self.transcript.system("No AI model active. Attempting to initialize from selection...");
            if !self.initialize_model(None) {
                self.transcript.system(
                    "AI model initialization failed. Please select a model or ensure API key is correct to process specs.",
                );
                return;
            }
        }

        self.process_spec_sheets().await;
    }

    /// Extract both sheets and send the comparison request
    pub async fn process_spec_sheets(&mut self) {
        if self.model.is_none() {
            self.transcript.system("Critical - process_spec_sheets called without initialized model.");
            if !self.initialize_model(None) {
                return;
            }
        }

        if self.sheet1.is_none() || self.sheet2.is_none() || self.api_key.is_none() {
            self.transcript
                .system("Pre-requisites not met for processing (files, API key, or model).");
            return;
        }

        self.transcript.system("Starting analysis of spec sheets...");
        if !self.extract_sheet(SheetSlot::First) || !self.extract_sheet(SheetSlot::Second) {
            return;
        }

        let (Some(first), Some(second)) = (self.sheet1.clone(), self.sheet2.clone()) else {
            return;
        };

        self.transcript.push(
            Role::System,
            format!(
                "Analysis inputs:\n- Spec 1: {} ({} images)\n- Spec 2: {} ({} images)",
                first.label(),
                first.image_paths.len(),
                second.label(),
                second.image_paths.len()
            ),
            true,
        );

        let first_images = self.load_images(&first.image_paths);
        let second_images = self.load_images(&second.image_paths);

        let parts = build_comparison_prompt(
            &self.config.prompts.preamble,
            SheetInput { text: first.text.as_deref().unwrap_or_default(), images: first_images },
            SheetInput { text: second.text.as_deref().unwrap_or_default(), images: second_images },
            &self.config.prompts.analysis_request,
        );

        self.send_to_ai(parts, true).await;
    }

    /// Extract text and images of one sheet; false halts the analysis
    fn extract_sheet(&mut self, slot: SheetSlot) -> bool {
        let Some(path) = self.sheet(slot).map(|s| s.path.clone()) else {
            return false;
        };
        let label = file_label(&path);

        let text = if !path.exists() {
            self.transcript.system(format!("PDF not found: {}", label));
            String::new()
        } else {
            self.transcript.system(format!("Extracting text from {}...", label));
            match pdf::extract_text(&path) {
                Ok(text) => {
                    self.transcript.system(format!("Text extraction successful: {}.", label));
                    text
                }
                Err(e) => {
                    self.transcript.system(format!("Error extracting text from {}: {}", label, e));
                    String::new()
                }
            }
        };

        if text.trim().is_empty() {
            self.transcript
                .system(format!("Halting. Text extraction failed for {}.", label));
            return false;
        }

        let image_paths = if self.config.extraction.extract_images {
            self.extract_sheet_images(&path, &label)
        } else {
            Vec::new()
        };

        if let Some(sheet) = self.sheet_mut(slot) {
            sheet.text = Some(text);
            sheet.image_paths = image_paths;
        }
        true
    }

    fn extract_sheet_images(&mut self, path: &Path, label: &str) -> Vec<PathBuf> {
        let output_dir = match sheet_image_dir(&self.temp_dir(), path) {
            Ok(dir) => dir,
            Err(e) => {
                self.transcript.system(format!("Error extracting images from {}: {}", label, e));
                return Vec::new();
            }
        };

        self.transcript.system(format!("Extracting images from {}...", label));
        match pdf::extract_images(path, &output_dir, &self.config.extraction) {
            Ok(extraction) => {
                for note in &extraction.skipped {
                    self.transcript.system(note.clone());
                }
                if extraction.paths.is_empty() {
                    self.transcript.system(format!("No images found in {}.", label));
                } else {
                    self.transcript
                        .system(format!("Extracted {} images from {}.", extraction.paths.len(), label));
                }
                extraction.paths
            }
            Err(e) => {
                self.transcript.system(format!("Error extracting images from {}: {}", label, e));
                Vec::new()
            }
        }
    }

    fn load_images(&mut self, paths: &[PathBuf]) -> Vec<Part> {
        let max_dimension = self.config.extraction.max_image_dimension;
        paths
            .iter()
            .filter_map(|path| match prepare_image(path, max_dimension) {
                Ok(part) => Some(part),
                Err(e) => {
                    self.transcript
                        .system(format!("Error loading image {}. Skip. Err: {}", path.display(), e));
                    None
                }
            })
            .collect()
    }

    /// Send a single-turn request; the initial analysis also resets the chat
    pub async fn send_to_ai(&mut self, parts: Vec<Part>, is_initial_analysis: bool) {
        let (Some(model), Some(api_key)) = (self.model.clone(), self.api_key.clone()) else {
            self.transcript.system("AI model not available.");
            return;
        };

        self.transcript
            .system(format!("Sending request to AI ({})... May take time.", model));

        let contents = vec![Content::user(parts)];
        match self.generator.generate(&api_key, &model, &contents).await {
            Ok(GenerateOutcome::Blocked(reason)) => {
                self.transcript
                    .system(format!("AI Error - Prompt blocked. Reason: {}", reason));
            }
            Ok(GenerateOutcome::Empty) => {
                self.transcript
                    .system(format!("AI ({}): Received no content or empty response.", model));
            }
            Ok(GenerateOutcome::Text(text)) => {
                let part_numbers = extract_part_numbers(&text);
                self.transcript.push(Role::Ai(model), text, false);
                if !part_numbers.is_empty() {
                    self.transcript
                        .push(Role::System, format!("Detected MFG P/N: {}", part_numbers.join(", ")), true);
                }
            }
            Err(e) => {
                self.handle_ai_error("Error during AI content generation", e);
                return;
            }
        }

        if is_initial_analysis {
            self.chat = None;
        }
    }

    /// Send a follow-up chat message
    pub async fn send_user_query(&mut self, text: &str) {
        if (self.model.is_none() || self.api_key.is_none()) && !self.initialize_model(None) {
            self.transcript
                .system("AI Model not initialized. Select model & ensure API key is set.");
            return;
        }
        let (Some(model), Some(api_key)) = (self.model.clone(), self.api_key.clone()) else {
            return;
        };

        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.transcript.push(Role::User, text, false);

        if self.chat.is_none() {
            self.transcript
                .system(format!("Starting new chat session with {}...", model));
        }
        let mut history = self.chat.take().unwrap_or_default();
        history.push(Content::user(vec![Part::text(text)]));

        self.transcript.system(format!("Sending to AI ({})...", model));
        let result = self
            .generator
            .generate(&api_key, &model, &history)
            .await
            .and_then(GenerateOutcome::into_text);

        match result {
            Ok(reply) => {
                history.push(Content::model(reply.clone()));
                self.chat = Some(history);
                self.transcript.push(Role::Ai(model), reply, false);
            }
            Err(e) => {
                // Keep earlier turns; the failed message is not part of the conversation
                history.pop();
                self.chat = Some(history);
                self.handle_ai_error("Error during AI interaction", e);
            }
        }
    }

    fn handle_ai_error(&mut self, context: &str, error: ComparatorError) {
        warn!("{}: {}", context, error);
        self.transcript.system(format!("{}: {}", context, error));

        if error.revokes_key() {
            self.api_key = None;
        }
        if error.resets_model() {
            self.model = None;
            self.chat = None;
        }
    }

    /// Comparison table of the most recent model reply
    pub fn show_table(&mut self) -> Option<MarkdownTable> {
        let table = self.transcript.last_ai_text().and_then(comparison_table);
        if table.is_none() {
            self.transcript
                .system("No comparison table found in the last AI response.");
        }
        table
    }

    /// Export the conversation log; `None` means the user gave no destination
    pub fn download_history(&mut self, path: Option<&Path>) -> Option<PathBuf> {
        if self.transcript.is_log_empty() {
            self.transcript.system("History empty.");
            return None;
        }
        let Some(path) = path else {
            self.transcript.system("Download cancelled.");
            return None;
        };

        let result = {
            let document = ExportDocument {
                sheet1: self.sheet1.as_ref().map(SpecSheet::label),
                sheet2: self.sheet2.as_ref().map(SpecSheet::label),
                model: self.model.clone(),
                entries: self.transcript.log_entries().collect(),
            };
            export_history(path, &document, &self.config.export, &self.config.tables)
        };

        match result {
            Ok(written) => {
                self.transcript
                    .system(format!("History downloaded to {}", written.display()));
                Some(written)
            }
            Err(e) => {
                warn!("Error saving history: {}", e);
                self.transcript.system(format!("Error downloading: {}", e));
                None
            }
        }
    }

    /// Reset sheets, model, chat and transcript, and recreate the temp directory
    pub fn clear_all(&mut self) {
        self.sheet1 = None;
        self.sheet2 = None;
        self.selected_model = self.config.ai_engine.default_model.clone();
        self.model = None;
        self.chat = None;
        self.transcript.clear();

        self.configure_ai();
        if self.api_key.is_some() {
            let selected = self.selected_model.clone();
            self.initialize_model(Some(&selected));
        }

        if let Err(e) = reset_temp_dir(&self.temp_dir()) {
            self.transcript.system(format!("Error cleaning temp dir: {}", e));
        }
        info!("Clear All: App state reset.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::pdf::tests::{rgb_image, sample_pdf};
    use crate::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<GenerateOutcome>>>,
        calls: Mutex<Vec<(String, Vec<Content>)>>,
    }

    impl ScriptedGenerator {
        fn with(replies: Vec<Result<GenerateOutcome>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), calls: Mutex::default() })
        }

        fn calls(&self) -> Vec<(String, Vec<Content>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentGenerator for ScriptedGenerator {
        async fn generate(&self, api_key: &str, model: &str, contents: &[Content]) -> Result<GenerateOutcome> {
            assert_eq!(api_key, "test-key");
            self.calls.lock().unwrap().push((model.to_string(), contents.to_vec()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(GenerateOutcome::Empty))
        }
    }

    fn test_config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.extraction.temp_dir = dir.path().join("temp_images").to_string_lossy().to_string();
        config
    }

    fn session_with(dir: &TempDir, generator: Arc<ScriptedGenerator>, key: Option<&str>) -> Session {
        let key = key.map(String::from);
        Session::with_key_source(test_config(dir), generator, Box::new(move || key.clone()))
    }

    fn lines(session: &Session) -> Vec<String> {
        session.transcript().display_lines()
    }

    fn has_line(session: &Session, needle: &str) -> bool {
        lines(session).iter().any(|l| l.contains(needle))
    }

    #[test]
    fn test_startup_without_key() {
        let dir = tempdir().unwrap();
        let generator = ScriptedGenerator::with(vec![]);
        let mut session = session_with(&dir, generator.clone(), None);

        assert!(has_line(&session, "GOOGLE_API_KEY environment variable not set"));
        assert!(!session.can_chat());
        assert!(dir.path().join("temp_images").exists());

        tokio_test::block_on(session.send_user_query("hello"));
        assert!(has_line(&session, "AI Model not initialized"));
        assert!(generator.calls().is_empty());
    }

    #[test]
    fn test_startup_with_key_initializes_default_model() {
        let dir = tempdir().unwrap();
        let session = session_with(&dir, ScriptedGenerator::with(vec![]), Some("test-key"));

        assert!(session.can_chat());
        assert_eq!(session.model(), Some("models/gemini-1.0-pro-vision-latest"));
        assert!(has_line(&session, "Successfully initialized AI model"));
    }

    #[test]
    fn test_invalid_model_selection() {
        let dir = tempdir().unwrap();
        let mut session = session_with(&dir, ScriptedGenerator::with(vec![]), Some("test-key"));

        tokio_test::block_on(session.select_model("models/not-a-model"));
        assert!(has_line(&session, "Invalid or empty model name ('models/not-a-model')"));
        assert!(session.model().is_none());
        assert_eq!(session.selected_model(), "models/gemini-1.0-pro-vision-latest");

        tokio_test::block_on(session.select_model("models/gemini-2.0-flash"));
        assert_eq!(session.model(), Some("models/gemini-2.0-flash"));
    }

    #[test]
    fn test_full_analysis() {
        let dir = tempdir().unwrap();
        let sheet1 = dir.path().join("LM317.pdf");
        let sheet2 = dir.path().join("LM1117.pdf");
        sample_pdf(&sheet1, "LM317 regulator", vec![rgb_image(4, 4, 90)]);
        sample_pdf(&sheet2, "LM1117 regulator", vec![]);

        let reply = "Both are LDOs.\n\n| Parameter | LM317 | LM1117 |\n|---|---|---|\n| MFG P/N | LM317T | LM1117-ADJ |\n";
        let generator = ScriptedGenerator::with(vec![Ok(GenerateOutcome::Text(reply.to_string()))]);
        let mut session = session_with(&dir, generator.clone(), Some("test-key"));

        tokio_test::block_on(session.load_sheet(SheetSlot::First, sheet1));
        assert!(generator.calls().is_empty());
        tokio_test::block_on(session.load_sheet(SheetSlot::Second, sheet2));

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        let (model, contents) = &calls[0];
        assert_eq!(model, "models/gemini-1.0-pro-vision-latest");
        assert_eq!(contents.len(), 1);
        let parts = &contents[0].parts;
        assert_eq!(parts.iter().filter(|p| p.is_image()).count(), 1);
        assert!(parts.iter().any(|p| matches!(p, Part::Text(t) if t.contains("LM317 regulator"))));
        assert!(parts.iter().any(|p| matches!(p, Part::Text(t) if t.contains("LM1117 regulator"))));

        assert!(has_line(&session, "Extracted 1 images from LM317.pdf."));
        assert!(has_line(&session, "No images found in LM1117.pdf."));
        assert!(has_line(&session, "AI (models/gemini-1.0-pro-vision-latest): Both are LDOs."));
        assert!(has_line(&session, "Detected MFG P/N: LM317T, LM1117-ADJ"));
        assert_eq!(session.sheet_label(SheetSlot::First), "File 1: LM317.pdf");

        // Internal lines are displayed but not logged
        let log = session.transcript().log_lines();
        assert!(!log.iter().any(|l| l.contains("Analysis inputs")));

        let table = session.show_table().unwrap();
        assert_eq!(table.rows[0][1], "LM317T");
    }

    #[test]
    fn test_missing_pdf_halts() {
        let dir = tempdir().unwrap();
        let generator = ScriptedGenerator::with(vec![]);
        let mut session = session_with(&dir, generator.clone(), Some("test-key"));

        tokio_test::block_on(session.load_sheet(SheetSlot::First, dir.path().join("gone.pdf")));
        tokio_test::block_on(session.load_sheet(SheetSlot::Second, dir.path().join("gone2.pdf")));

        assert!(has_line(&session, "PDF not found: gone.pdf"));
        assert!(has_line(&session, "Halting. Text extraction failed for gone.pdf."));
        assert!(generator.calls().is_empty());
    }

    #[test]
    fn test_blocked_prompt_is_reported() {
        let dir = tempdir().unwrap();
        let generator = ScriptedGenerator::with(vec![Ok(GenerateOutcome::Blocked("SAFETY".into()))]);
        let mut session = session_with(&dir, generator, Some("test-key"));

        tokio_test::block_on(session.send_to_ai(vec![Part::text("compare")], true));
        assert!(has_line(&session, "AI Error - Prompt blocked. Reason: SAFETY"));
        assert!(session.can_chat());
    }

    #[test]
    fn test_chat_accumulates_history() {
        let dir = tempdir().unwrap();
        let generator = ScriptedGenerator::with(vec![
            Ok(GenerateOutcome::Text("The LM1117.".into())),
            Ok(GenerateOutcome::Text("SOT-223.".into())),
        ]);
        let mut session = session_with(&dir, generator.clone(), Some("test-key"));

        tokio_test::block_on(session.send_user_query("Which has lower dropout?"));
        tokio_test::block_on(session.send_user_query("  What package?  "));
        tokio_test::block_on(session.send_user_query("   "));

        let calls = generator.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1.len(), 1);
        assert_eq!(calls[1].1.len(), 3);
        assert_eq!(calls[1].1[1], Content::model("The LM1117."));
        assert_eq!(calls[1].1[2], Content::user(vec![Part::text("What package?")]));

        assert_eq!(lines(&session).iter().filter(|l| l.starts_with("System: Starting new chat")).count(), 1);
        assert!(has_line(&session, "User: What package?"));
        assert!(has_line(&session, "AI (models/gemini-1.0-pro-vision-latest): SOT-223."));
    }

    #[test]
    fn test_invalid_argument_resets_model() {
        let dir = tempdir().unwrap();
        let generator = ScriptedGenerator::with(vec![Err(ComparatorError::InvalidArgument("bad image".into()))]);
        let mut session = session_with(&dir, generator, Some("test-key"));

        tokio_test::block_on(session.send_user_query("hi"));
        assert!(has_line(&session, "Error during AI interaction: Invalid argument: bad image"));
        assert!(session.model().is_none());
        assert!(!session.can_chat());
    }

    #[test]
    fn test_permission_denied_revokes_key() {
        let dir = tempdir().unwrap();
        let generator = ScriptedGenerator::with(vec![Err(ComparatorError::PermissionDenied("key revoked".into()))]);
        let mut session = session_with(&dir, generator, Some("test-key"));

        tokio_test::block_on(session.send_to_ai(vec![Part::text("x")], true));
        assert!(has_line(&session, "Error during AI content generation"));
        assert!(!session.is_api_key_configured());
        assert!(session.model().is_some());
    }

    #[test]
    fn test_empty_chat_reply_resets_model() {
        let dir = tempdir().unwrap();
        let generator = ScriptedGenerator::with(vec![Ok(GenerateOutcome::Empty)]);
        let mut session = session_with(&dir, generator, Some("test-key"));

        tokio_test::block_on(session.send_user_query("hi"));
        assert!(has_line(&session, "Received no content or empty response"));
        assert!(session.model().is_none());
    }

    #[test]
    fn test_download_history() {
        let dir = tempdir().unwrap();
        let generator = ScriptedGenerator::with(vec![Ok(GenerateOutcome::Text("Answer".into()))]);
        let mut session = session_with(&dir, generator, None);
        session.transcript_mut().clear();

        assert!(session.download_history(Some(&dir.path().join("h.docx"))).is_none());
        assert!(has_line(&session, "History empty."));

        assert!(session.download_history(None).is_none());
        assert!(has_line(&session, "Download cancelled."));

        let written = session.download_history(Some(&dir.path().join("h"))).unwrap();
        assert_eq!(written, dir.path().join("h.docx"));
        assert!(written.exists());
        assert!(has_line(&session, "History downloaded to"));
    }

    #[test]
    fn test_clear_all_resets_state() {
        let dir = tempdir().unwrap();
        let generator = ScriptedGenerator::with(vec![]);
        let mut session = session_with(&dir, generator, Some("test-key"));

        let temp = dir.path().join("temp_images");
        std::fs::create_dir_all(temp.join("old_imgs_0")).unwrap();
        tokio_test::block_on(session.select_model("models/gemini-2.0-flash"));
        tokio_test::block_on(session.load_sheet(SheetSlot::First, dir.path().join("a.pdf")));

        session.clear_all();

        assert!(session.sheet(SheetSlot::First).is_none());
        assert_eq!(session.selected_model(), "models/gemini-1.0-pro-vision-latest");
        assert_eq!(session.model(), Some("models/gemini-1.0-pro-vision-latest"));
        assert_eq!(std::fs::read_dir(&temp).unwrap().count(), 0);
        assert!(!has_line(&session, "gemini-2.0-flash"));
        assert!(has_line(&session, "Generative AI configured successfully."));
    }
}
