//! Workspace configuration for docaudit

use crate::categorize::LlmConfig;
use crate::error::AuditError;
use crate::reconcile::{CategorizeFailure, MatchPolicy, TieBreak, DEFAULT_FUZZY_THRESHOLD};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the config file and database
pub const WORKSPACE_DIR: &str = ".docaudit";

/// Configuration for an audit workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Database location; defaults to `.docaudit/docaudit.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Example matching settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Categorization model settings
    #[serde(default)]
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Change percentage below which an edited example counts as updated
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    #[serde(default)]
    pub tie_break: TieBreak,

    #[serde(default)]
    pub on_categorize_error: CategorizeFailure,

    /// Per-project threshold overrides
    #[serde(default)]
    pub project_thresholds: BTreeMap<String, f64>,
}

/// Categorization model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Ask a model about examples the rules can't categorize
    #[serde(default)]
    pub enabled: bool,

    /// API endpoint URL (e.g., http://localhost:11434 for Ollama)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name to use
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (if required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum tokens for response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Temperature for generation
    #[serde(default)]
    pub temperature: f32,

    /// Deadline for one categorization call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_fuzzy_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}

fn default_endpoint() -> String {
    LlmConfig::default().endpoint
}

fn default_model() -> String {
    LlmConfig::default().model
}

fn default_max_tokens() -> usize {
    LlmConfig::default().max_tokens
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            tie_break: TieBreak::default(),
            on_categorize_error: CategorizeFailure::default(),
            project_thresholds: BTreeMap::new(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmSettings {
    /// Client connection settings
    pub fn client_config(&self) -> LlmConfig {
        LlmConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            reconcile: ReconcileConfig::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl AuditConfig {
    /// Path of the config file inside a workspace
    pub fn config_path(root: &Path) -> PathBuf {
        root.join(WORKSPACE_DIR).join("config.toml")
    }

    /// Load configuration from the workspace or return defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = Self::config_path(root);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: AuditConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the workspace
    pub fn save(&self, root: &Path) -> Result<()> {
        let workspace = root.join(WORKSPACE_DIR);
        std::fs::create_dir_all(&workspace)?;

        let config_path = Self::config_path(root);
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Reject thresholds outside `(0, 100]`
    pub fn validate(&self) -> Result<(), AuditError> {
        MatchPolicy::new(self.reconcile.fuzzy_threshold)?;
        for threshold in self.reconcile.project_thresholds.values() {
            MatchPolicy::new(*threshold)?;
        }
        Ok(())
    }

    /// Threshold for a project, honoring per-project overrides
    pub fn threshold_for(&self, project: &str) -> f64 {
        self.reconcile
            .project_thresholds
            .get(project)
            .copied()
            .unwrap_or(self.reconcile.fuzzy_threshold)
    }

    /// Matching policy for a project
    pub fn match_policy(&self, project: &str) -> Result<MatchPolicy, AuditError> {
        Ok(MatchPolicy::new(self.threshold_for(project))?.with_tie_break(self.reconcile.tie_break))
    }

    /// Resolved database location
    pub fn database_path(&self, root: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => root.join(WORKSPACE_DIR).join("docaudit.db"),
        }
    }
}
