// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Comparator

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::gemini::MODEL_OPTIONS;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// AI engine configuration
    pub ai_engine: EngineConfig,

    /// Prompt templates
    pub prompts: PromptConfig,

    /// PDF extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Markdown table heuristics
    #[serde(default)]
    pub tables: TableConfig,

    /// History export settings
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    pub url: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    pub preamble: String,
    #[serde(default = "default_analysis_request")]
    pub analysis_request: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
    #[serde(default = "default_true")]
    pub extract_images: bool,
    /// Upper bound on images attached per sheet (0 = unlimited)
    #[serde(default = "default_max_images")]
    pub max_images_per_sheet: usize,
    /// Longest side of an image sent to the model, in pixels
    #[serde(default = "default_max_dimension")]
    pub max_image_dimension: u32,
    #[serde(default = "default_true")]
    pub dedupe_images: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TableConfig {
    /// Fraction of a prose line's tokens that must appear in one table row
    #[serde(default = "default_redundancy_threshold")]
    pub redundancy_threshold: f64,
    #[serde(default = "default_min_redundant_tokens")]
    pub min_redundant_tokens: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_title")]
    pub title: String,
    #[serde(default = "default_true")]
    pub include_tables: bool,
    #[serde(default = "default_true")]
    pub dedupe_narrative: bool,
}

// Default value functions
fn default_api_key_env() -> String { "GOOGLE_API_KEY".to_string() }
fn default_timeout() -> u64 { 600 }
fn default_true() -> bool { true }
fn default_temp_dir() -> String { "temp_images".to_string() }
fn default_max_images() -> usize { 24 }
fn default_max_dimension() -> u32 { 1024 }
fn default_redundancy_threshold() -> f64 { 0.8 }
fn default_min_redundant_tokens() -> usize { 3 }
fn default_export_title() -> String { "Component Comparator AI Chat History".to_string() }

fn default_model() -> String {
    MODEL_OPTIONS[0].to_string()
}

fn default_models() -> Vec<String> {
    MODEL_OPTIONS.iter().map(|m| m.to_string()).collect()
}

fn default_preamble() -> String {
    "You are an expert electronics component analyst. You will receive the text and \
     embedded images of two component specification sheets.".to_string()
}

fn default_analysis_request() -> String {
    "\n--- Analysis Request ---\
     \n1. Identify component type for each.\
     \n2. Extract the manufacturer part number for each as 'MFG P/N: <value>'.\
     \n3. List crucial parameters for comparison.\
     \n4. Compare pin-to-pin compatibility (compatible, potentially, or not, and why).\
     \n5. List key spec differences (electrical, physical) structured.\
     \n6. Summarize the parameters in a markdown table with columns Parameter | Spec Sheet 1 | Spec Sheet 2.\
     \nPresent analysis clearly and concisely.".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai_engine: EngineConfig {
                url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                api_key_env: default_api_key_env(),
                default_model: default_model(),
                models: default_models(),
                timeout_secs: default_timeout(),
            },
            prompts: PromptConfig {
                preamble: default_preamble(),
                analysis_request: default_analysis_request(),
            },
            extraction: ExtractionConfig::default(),
            tables: TableConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            extract_images: true,
            max_images_per_sheet: default_max_images(),
            max_image_dimension: default_max_dimension(),
            dedupe_images: true,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            redundancy_threshold: default_redundancy_threshold(),
            min_redundant_tokens: default_min_redundant_tokens(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: default_export_title(),
            include_tables: true,
            dedupe_narrative: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::ComparatorError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.ai_engine.models.is_empty() {
            return Err(crate::ComparatorError::Config("ai_engine.models is empty".to_string()));
        }
        if !self.ai_engine.models.contains(&self.ai_engine.default_model) {
            return Err(crate::ComparatorError::Config(format!(
                "default_model '{}' is not in ai_engine.models",
                self.ai_engine.default_model
            )));
        }
        if !(0.0..=1.0).contains(&self.tables.redundancy_threshold) {
            return Err(crate::ComparatorError::Config(
                "tables.redundancy_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Fail unless `name` is one of the selectable models
    pub fn check_model(&self, name: &str) -> crate::Result<()> {
        if self.ai_engine.models.iter().any(|m| m == name) {
            Ok(())
        } else {
            Err(crate::ComparatorError::InvalidModel(name.to_string()))
        }
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.ai_engine.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}
