//! Configuration types for the Mentor pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MentorError, Result};
use crate::llm::RetryPolicy;

/// Main configuration for Mentor
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MentorConfig {
    /// LLM provider configuration (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LLMProviderConfig>,

    /// Sampling settings for generation calls
    pub generation: GenerationConfig,

    /// Retry policy for LLM invocations
    pub retry: RetryPolicy,

    /// Teacher's notes document configuration
    pub memory: MemoryConfig,

    /// Defaults applied while parsing model output
    pub parser: ParserConfig,

    /// Where validated records are persisted
    pub records: RecordsConfig,

    /// Persona preset name applied to every prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMProvider,

    /// Model name
    #[serde(default)]
    pub model: String,

    /// API key (if needed, prefer env vars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (for custom endpoints, e.g., Ollama)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    Ollama,
}

/// Sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Temperature for challenge, feedback and letter generation
    pub temperature: f32,

    /// Temperature used when condensing notes
    pub summary_temperature: f32,

    /// Maximum tokens per reply
    pub max_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            summary_temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

/// Teacher's notes configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Path of the Markdown notes document
    pub path: PathBuf,

    /// Character budget of the Current Snapshot section
    pub snapshot_budget: usize,

    /// Character budget of the Recent Activity section
    pub recent_activity_budget: usize,

    /// Character budget of the Long-Term History section
    pub history_budget: usize,

    /// Compaction behaviour
    pub compaction: CompactionConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("ai_teacher_notes.md"),
            snapshot_budget: 1_500,
            recent_activity_budget: 4_000,
            history_budget: 8_000,
            compaction: CompactionConfig::default(),
        }
    }
}

/// Compaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Ask the LLM to condense overflowing sections before truncating
    pub ai_summaries: bool,

    /// Consecutive summarization failures before AI summaries are skipped
    pub failure_threshold: usize,

    /// How long AI summaries stay disabled after the breaker opens
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            ai_summaries: true,
            failure_threshold: 3,
            cooldown: Duration::from_secs(60 * 60),
        }
    }
}

/// Defaults applied by the response parser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Difficulty used when the model omits one
    pub default_difficulty: u8,

    /// Improvement path used when the model omits one
    pub default_improvement_path: String,

    /// Prefix of challenge identifiers
    pub challenge_id_prefix: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_difficulty: 5,
            default_improvement_path:
                "Keep practicing the concepts from this challenge and revisit the suggestions above."
                    .to_string(),
            challenge_id_prefix: "CC".to_string(),
        }
    }
}

/// Record persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsConfig {
    /// Directory holding one JSON file per record
    pub data_dir: PathBuf,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().join("records"),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("mentor"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

impl MentorConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `mentor.toml` in the working directory
    /// 3. File named by `MENTOR_CONFIG_PATH`
    /// 4. `MENTOR_` environment variables (`__` separates nested keys)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(MentorConfig::default()))
            .merge(Toml::file("mentor.toml"));

        if let Ok(path) = std::env::var("MENTOR_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: MentorConfig = figment
            .merge(Env::prefixed("MENTOR_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| {
                MentorError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: MentorConfig = Figment::from(Serialized::defaults(MentorConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                MentorError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a budget is zero or a default lies outside its range.
    pub fn validate(&self) -> Result<()> {
        let memory = &self.memory;
        if memory.snapshot_budget == 0
            || memory.recent_activity_budget == 0
            || memory.history_budget == 0
        {
            return Err(MentorError::Configuration(
                "memory section budgets must be greater than zero".to_string(),
            ));
        }

        if !(1..=10).contains(&self.parser.default_difficulty) {
            return Err(MentorError::Configuration(format!(
                "default_difficulty must be within 1..=10, got {}",
                self.parser.default_difficulty
            )));
        }

        if self.parser.challenge_id_prefix.trim().is_empty() {
            return Err(MentorError::Configuration(
                "challenge_id_prefix must not be empty".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(MentorError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(MentorError::Configuration(format!(
                "retry.jitter must be within 0.0..=1.0, got {}",
                self.retry.jitter
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = MentorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.parser.challenge_id_prefix, "CC");
        assert!(config.memory.path.ends_with("ai_teacher_notes.md"));
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
persona = "socratic-guide"

[llm]
provider = "ollama"
model = "qwen3:14b"

[memory]
history_budget = 12000

[memory.compaction]
failure_threshold = 5
cooldown = "10m"

[retry]
max_attempts = 4
base_delay = "250ms"
"#
        )
        .unwrap();

        let config = MentorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.persona.as_deref(), Some("socratic-guide"));
        let llm = config.llm.unwrap();
        assert_eq!(llm.provider, LLMProvider::Ollama);
        assert_eq!(llm.model, "qwen3:14b");
        assert_eq!(config.memory.history_budget, 12_000);
        assert_eq!(config.memory.snapshot_budget, 1_500);
        assert_eq!(config.memory.compaction.failure_threshold, 5);
        assert_eq!(config.memory.compaction.cooldown, Duration::from_secs(600));
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = MentorConfig::default();
        config.memory.recent_activity_budget = 0;
        assert!(matches!(
            config.validate(),
            Err(MentorError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_difficulty() {
        let mut config = MentorConfig::default();
        config.parser.default_difficulty = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_jitter() {
        let mut config = MentorConfig::default();
        config.retry.jitter = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry.jitter"));

        config.retry.jitter = f64::NAN;
        assert!(config.validate().is_err());

        config.retry.jitter = 1.0;
        assert!(config.validate().is_ok());
    }
}
