//! Configuration schema (flowlineage.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use crate::diagnostic::{DiagnosticCode, Severity};

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl Default for SeverityThreshold {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Get severity for a diagnostic code, or the code's own default
    pub fn severity_for(&self, code: DiagnosticCode) -> Severity {
        self.get_severity(code, code.default_severity())
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Macro resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroConfig {
    /// Directories probed after the referencing workflow's own locations
    #[serde(default)]
    pub search_dirs: Vec<PathBuf>,

    /// Prompt the operator for macros that cannot be found
    #[serde(default = "default_true")]
    pub interactive: bool,

    /// Also probe subdirectories of the search directories
    #[serde(default = "default_true")]
    pub recursive_search: bool,

    /// Fall back to the referencing workflow's parent directory
    #[serde(default = "default_true")]
    pub include_parent_dir: bool,

    /// Answers accepted in one prompt session before skipping the macro
    #[serde(default = "default_prompt_attempts")]
    pub max_prompt_attempts: usize,
}

fn default_true() -> bool {
    true
}

fn default_prompt_attempts() -> usize {
    3
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            search_dirs: Vec::new(),
            interactive: true,
            recursive_search: true,
            include_parent_dir: true,
            max_prompt_attempts: default_prompt_attempts(),
        }
    }
}

/// Extra tool patterns for layer classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Tool types (glob patterns) treated as source-like
    #[serde(default)]
    pub source_tools: Vec<String>,

    /// Tool types (glob patterns) treated as sink-like
    #[serde(default)]
    pub sink_tools: Vec<String>,
}

impl LayerConfig {
    /// Check if a tool type matches any pattern in the list
    fn matches_pattern(tool_type: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, tool_type)
            } else {
                pattern == tool_type
            }
        })
    }

    /// Check if a tool type is configured as source-like
    pub fn is_source_tool(&self, tool_type: &str) -> bool {
        Self::matches_pattern(tool_type, &self.source_tools)
    }

    /// Check if a tool type is configured as sink-like
    pub fn is_sink_tool(&self, tool_type: &str) -> bool {
        Self::matches_pattern(tool_type, &self.sink_tools)
    }
}

/// Main configuration structure (flowlineage.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Macro resolution
    #[serde(default)]
    pub macros: MacroConfig,

    /// Layer classification
    #[serde(default)]
    pub layers: LayerConfig,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            macros: MacroConfig::default(),
            layers: LayerConfig::default(),
            severity: SeverityThreshold::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Macro search directories, relative entries resolved against the project root
    pub fn macro_search_dirs(&self) -> Vec<PathBuf> {
        self.macros
            .search_dirs
            .iter()
            .map(|dir| {
                if dir.is_relative() {
                    self.project_root.join(dir)
                } else {
                    dir.clone()
                }
            })
            .collect()
    }
}

/// Simple glob matching (any number of `*` wildcards)
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) {
        return false;
    }

    let mut rest = &text[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
