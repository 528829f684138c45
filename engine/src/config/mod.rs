//! Configuration management
//!
//! This module handles loading, validation, and management of the panel
//! configuration. Configuration is stored in TOML format at
//! ~/.panel/config.toml unless a path is given explicitly.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, transcript preamble, transcript directory
//! - **llm**: Engine backend, generation timeout, Ollama settings
//! - **memory**: Shared memory sizing
//! - **turns**: Arbitration history and decision sampling
//! - **speech**: Global voice switch and fallback line
//! - **agents**: One `[[agents]]` table per interviewer
//!
//! # Examples
//!
//! ```no_run
//! use panel_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Backend: {}", config.llm.backend);
//! println!("Interviewers: {}", config.agents.len());
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use sdk::AgentProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::TurnConfig;
use crate::llm::ollama::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::memory::MemoryConfig;
use crate::speech::SpeechConfig;

/// Engine backends accepted in `[llm] backend`
pub const VALID_BACKENDS: &[&str] = &["ollama", "scripted"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM engine configuration
    #[serde(default)]
    pub llm: LLMConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub turns: TurnConfig,

    #[serde(default)]
    pub speech: SpeechConfig,

    /// Interviewer profiles, in speaking-priority order
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Session-wide text kept at the head of the transcript
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,

    /// Directory where finished interview transcripts are written (supports ~ expansion)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_dir: Option<PathBuf>,
}

/// LLM engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LLMConfig {
    /// Engine backend (ollama, scripted)
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Per-generation timeout in seconds; 0 disables it
    #[serde(default)]
    pub generation_timeout_secs: u64,

    /// Ollama engine settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// Ollama engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model tag to use
    #[serde(default = "default_ollama_model")]
    pub model: String,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Context window requested from the server
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend() -> String {
    "ollama".to_string()
}

fn default_ollama_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_ollama_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_top_p() -> f32 {
    0.9
}

fn default_num_ctx() -> u32 {
    4096
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            preamble: None,
            transcript_dir: None,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            generation_timeout_secs: 0,
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
            top_p: default_top_p(),
            num_ctx: default_num_ctx(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.panel/config.toml)
    ///
    /// If the configuration file doesn't exist, a default configuration
    /// with two interviewers is written there.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;
        Self::load_or_create_at(&config_path)
    }

    /// Load configuration from `path`, creating a default one if missing
    pub fn load_or_create_at(path: &Path) -> Result<Self, EngineError> {
        let path = expand_path(path)?;

        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Self::create_default(&path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();
        config.validate_and_process()?;

        let toml_string = config.to_toml()?;
        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Wrote default configuration to {:?}", path);
        Ok(config)
    }

    /// Serialize to pretty TOML
    pub fn to_toml(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Get the default configuration file path (~/.panel/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".panel").join("config.toml"))
    }

    /// Create a default configuration with a two-person panel
    pub fn default_config() -> Self {
        let sarah = AgentProfile::new("Sarah", "Engineering Manager")
            .with_expertise("team leadership, project delivery, collaboration")
            .with_personality("Warm and encouraging, but probes for concrete examples.");

        let mut mark = AgentProfile::new("Mark", "Senior Backend Engineer")
            .with_expertise("distributed systems, databases, performance")
            .with_personality("Direct and technical. Asks how things work under the hood.");
        mark.voice_name = "en_US-ryan-medium".to_string();
        mark.params.temperature = 0.6;

        Self {
            core: CoreConfig::default(),
            llm: LLMConfig::default(),
            memory: MemoryConfig::default(),
            turns: TurnConfig::default(),
            speech: SpeechConfig::default(),
            agents: vec![sarah, mark],
        }
    }

    /// Validate and process configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log level or backend is unknown
    /// - There are no interviewers, or two share a name
    /// - A numeric setting is out of range
    /// - The transcript directory cannot be created
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !VALID_BACKENDS.contains(&self.llm.backend.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid backend '{}'. Must be one of: {}",
                self.llm.backend,
                VALID_BACKENDS.join(", ")
            )));
        }

        if self.llm.ollama.top_p <= 0.0 || self.llm.ollama.top_p > 1.0 {
            return Err(EngineError::Config(
                "top_p must be greater than 0.0 and at most 1.0".to_string(),
            ));
        }

        if self.memory.short_term_capacity == 0 {
            return Err(EngineError::Config(
                "short_term_capacity must be at least 1".to_string(),
            ));
        }
        if self.memory.context_turns > self.memory.short_term_capacity {
            tracing::warn!(
                "context_turns ({}) exceeds short_term_capacity ({}); prompts will hold at most {} turns",
                self.memory.context_turns,
                self.memory.short_term_capacity,
                self.memory.short_term_capacity
            );
        }

        if self.turns.stagger_min_ms > self.turns.stagger_max_ms {
            return Err(EngineError::Config(format!(
                "stagger_min_ms ({}) must not exceed stagger_max_ms ({})",
                self.turns.stagger_min_ms, self.turns.stagger_max_ms
            )));
        }
        if !(0.0..=2.0).contains(&self.turns.decision_temperature) {
            return Err(EngineError::Config(
                "decision_temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.agents.is_empty() {
            return Err(EngineError::Config(
                "At least one [[agents]] entry is required".to_string(),
            ));
        }
        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(EngineError::Config("Agent name must not be empty".to_string()));
            }
            if !names.insert(agent.name.as_str()) {
                return Err(EngineError::Config(format!(
                    "Duplicate agent name '{}'",
                    agent.name
                )));
            }
        }

        if let Some(dir) = &self.core.transcript_dir {
            let dir = expand_path(dir)?;
            self.core.transcript_dir = Some(canonicalize_or_create(&dir)?);
        }

        Ok(())
    }

    /// Names of the configured interviewers
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }
}

/// Expand ~ in path to user's home directory
///
/// # Examples
///
/// ```ignore
/// let path = PathBuf::from("~/transcripts");
/// let expanded = expand_path(&path)?;
/// // expanded is now /home/user/transcripts (on Unix)
/// ```
pub fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Canonicalize path, creating it if it doesn't exist
fn canonicalize_or_create(path: &Path) -> Result<PathBuf, EngineError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            EngineError::Config(format!("Failed to create directory {:?}: {}", path, e))
        })?;
    }

    let canonical = path
        .canonicalize()
        .map_err(|e| EngineError::PathCanonicalization(path.to_path_buf(), e.to_string()))?;

    if !canonical.is_dir() {
        return Err(EngineError::Config(format!(
            "Transcript path is not a directory: {:?}",
            canonical
        )));
    }
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.llm.backend, "ollama");
        assert_eq!(config.llm.generation_timeout_secs, 0);
        assert_eq!(config.llm.ollama.model, DEFAULT_MODEL);
        assert_eq!(config.agent_names(), vec!["Sarah", "Mark"]);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = config.to_toml().unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let mut config: Config = toml::from_str(
            r#"
[[agents]]
name = "Solo"
role = "Recruiter"
"#,
        )
        .unwrap();
        config.validate_and_process().unwrap();

        assert_eq!(config.memory.short_term_capacity, 10);
        assert_eq!(config.memory.char_budget, 8000);
        assert_eq!(config.turns.decision_temperature, 0.1);
        assert!(config.speech.global_voice_enabled);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default_config();
        config.llm.backend = "llamafile".to_string();
        assert!(matches!(
            config.validate_and_process(),
            Err(EngineError::Config(_))
        ));

        let mut config = Config::default_config();
        config.agents.push(AgentProfile::new("Sarah", "Duplicate"));
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default_config();
        config.turns.stagger_min_ms = 5000;
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default_config();
        config.agents.clear();
        assert!(config.validate_and_process().is_err());
    }
}
