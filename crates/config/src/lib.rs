//! Configuration loading, validation, and management for chatloom.
//!
//! Loads configuration from `chatloom.toml` with environment variable
//! overrides for secrets. Validates all settings at startup so the turn
//! pipeline never sees an inconsistent budget or threshold policy.

use chatloom_core::completion::SamplingParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The root configuration structure.
///
/// Maps directly to `chatloom.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persona configuration
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Turn budget configuration
    #[serde(default)]
    pub turn: TurnConfig,

    /// Memory store and retrieval policy
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Completion provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            persona: PersonaConfig::default(),
            turn: TurnConfig::default(),
            memory: MemoryConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("persona", &self.persona)
            .field("turn", &self.turn)
            .field("memory", &self.memory)
            .field("provider", &self.provider)
            .finish()
    }
}

/// The bot's persona: who it is and how it speaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// The bot's display name
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Base system description, prepended to the per-session description
    #[serde(default = "default_persona_description")]
    pub description: String,

    /// Knowledge cutoff advertised in the meta prompt
    #[serde(default = "default_knowledge_cutoff")]
    pub knowledge_cutoff: String,
}

fn default_bot_name() -> String {
    "Loom".into()
}
fn default_persona_description() -> String {
    concat!(
        "You are Loom, a friendly and knowledgeable assistant. ",
        "Answer the user's question using the conversation, the provided ",
        "memories, and any document snippets. Be concise and accurate.",
    )
    .into()
}
fn default_knowledge_cutoff() -> String {
    "Saturday, January 1, 2022".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            description: default_persona_description(),
            knowledge_cutoff: default_knowledge_cutoff(),
        }
    }
}

/// Token budget knobs for one conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// The model's context window, in tokens
    #[serde(default = "default_context_window")]
    pub context_window_limit: usize,

    /// Tokens reserved for the generated response
    #[serde(default = "default_response_reserve")]
    pub response_token_reserve: usize,

    /// Tokens reserved for tool/function call framing
    #[serde(default = "default_tool_call_reserve")]
    pub tool_call_token_reserve: usize,

    /// Fixed overhead for prompt scaffolding (headers, separators)
    #[serde(default = "default_fixed_overhead")]
    pub fixed_overhead_tokens: usize,

    /// Fraction of the remaining budget given to memory retrieval;
    /// the rest is left for chat history.
    #[serde(default = "default_memories_weight")]
    pub memories_response_context_weight: f32,

    /// Tokens an extraction instruction template costs on top of the
    /// shared context.
    #[serde(default = "default_template_overhead")]
    pub template_overhead_tokens: usize,

    /// Fixed token budget for the post-turn memory extraction pass.
    #[serde(default = "default_extraction_reserve")]
    pub extraction_token_reserve: usize,

    /// Sampling parameters for the streamed response.
    #[serde(default)]
    pub response_sampling: SamplingParams,

    /// Sampling parameters for bounded sub-completions (audience, intent,
    /// memory extraction).
    #[serde(default = "default_extraction_sampling")]
    pub extraction_sampling: SamplingParams,
}

fn default_context_window() -> usize {
    4096
}
fn default_response_reserve() -> usize {
    1024
}
fn default_tool_call_reserve() -> usize {
    256
}
fn default_fixed_overhead() -> usize {
    64
}
fn default_memories_weight() -> f32 {
    0.6
}
fn default_template_overhead() -> usize {
    128
}
fn default_extraction_reserve() -> usize {
    512
}
fn default_extraction_sampling() -> SamplingParams {
    SamplingParams {
        temperature: 0.0,
        ..Default::default()
    }
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            context_window_limit: default_context_window(),
            response_token_reserve: default_response_reserve(),
            tool_call_token_reserve: default_tool_call_reserve(),
            fixed_overhead_tokens: default_fixed_overhead(),
            memories_response_context_weight: default_memories_weight(),
            template_overhead_tokens: default_template_overhead(),
            extraction_token_reserve: default_extraction_reserve(),
            response_sampling: SamplingParams::default(),
            extraction_sampling: default_extraction_sampling(),
        }
    }
}

impl TurnConfig {
    /// The prompt budget a fresh turn starts with.
    pub fn initial_budget(&self) -> usize {
        self.context_window_limit
            .saturating_sub(self.response_token_reserve)
            .saturating_sub(self.tool_call_token_reserve)
            .saturating_sub(self.fixed_overhead_tokens)
    }
}

/// Memory store selection and retrieval thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Which store implementation to use: "in_memory", "file", "noop"
    #[serde(default = "default_memory_store")]
    pub store: String,

    /// Path for the file-backed store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Lower bound of the balance-tuned relevance band
    #[serde(default = "default_relevance_lower")]
    pub relevance_lower: f32,

    /// Upper bound of the balance-tuned relevance band
    #[serde(default = "default_relevance_upper")]
    pub relevance_upper: f32,

    /// Fixed minimum relevance for document snippets
    #[serde(default = "default_document_min_relevance")]
    pub document_min_relevance: f32,

    /// Maximum records requested from each container per search
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Container names, in prompt-rendering order
    #[serde(default)]
    pub containers: ContainerNames,
}

fn default_memory_store() -> String {
    "in_memory".into()
}
fn default_relevance_lower() -> f32 {
    0.6
}
fn default_relevance_upper() -> f32 {
    0.9
}
fn default_document_min_relevance() -> f32 {
    0.8
}
fn default_search_limit() -> usize {
    100
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            store: default_memory_store(),
            file_path: None,
            relevance_lower: default_relevance_lower(),
            relevance_upper: default_relevance_upper(),
            document_min_relevance: default_document_min_relevance(),
            search_limit: default_search_limit(),
            containers: ContainerNames::default(),
        }
    }
}

/// Names of the memory containers. Declared order is rendering order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerNames {
    #[serde(default = "default_document_container")]
    pub document: String,

    #[serde(default = "default_long_term_container")]
    pub long_term: String,

    #[serde(default = "default_working_container")]
    pub working: String,
}

fn default_document_container() -> String {
    "document-memory".into()
}
fn default_long_term_container() -> String {
    "long-term-memory".into()
}
fn default_working_container() -> String {
    "working-memory".into()
}

impl Default for ContainerNames {
    fn default() -> Self {
        Self {
            document: default_document_container(),
            long_term: default_long_term_container(),
            working: default_working_container(),
        }
    }
}

impl ContainerNames {
    /// Containers in declared rendering order.
    pub fn ordered(&self) -> [&str; 3] {
        [&self.document, &self.long_term, &self.working]
    }

    /// The containers memory extraction writes to.
    pub fn extraction_targets(&self) -> [&str; 2] {
        [&self.long_term, &self.working]
    }
}

/// Completion provider endpoint configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key; falls back to `CHATLOOM_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model for all completions in the turn
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let mut config: AppConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("CHATLOOM_API_KEY").ok();
        }

        config.validate()?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Validate cross-field invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.turn;
        if t.context_window_limit == 0 {
            return Err(ConfigError::Invalid {
                message: "turn.context_window_limit must be nonzero".into(),
            });
        }
        if t.initial_budget() == 0 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "reserves ({} + {} + {}) leave no prompt budget in a {}-token window",
                    t.response_token_reserve,
                    t.tool_call_token_reserve,
                    t.fixed_overhead_tokens,
                    t.context_window_limit
                ),
            });
        }
        if !(t.memories_response_context_weight > 0.0
            && t.memories_response_context_weight <= 1.0)
        {
            return Err(ConfigError::Invalid {
                message: format!(
                    "turn.memories_response_context_weight {} must be in (0, 1]",
                    t.memories_response_context_weight
                ),
            });
        }

        let m = &self.memory;
        for (name, value) in [
            ("memory.relevance_lower", m.relevance_lower),
            ("memory.relevance_upper", m.relevance_upper),
            ("memory.document_min_relevance", m.document_min_relevance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    message: format!("{name} {value} must be in [0, 1]"),
                });
            }
        }
        if m.relevance_lower > m.relevance_upper {
            return Err(ConfigError::Invalid {
                message: format!(
                    "memory.relevance_lower {} exceeds memory.relevance_upper {}",
                    m.relevance_lower, m.relevance_upper
                ),
            });
        }
        if !matches!(m.store.as_str(), "in_memory" | "file" | "noop") {
            return Err(ConfigError::Invalid {
                message: format!("unknown memory.store '{}'", m.store),
            });
        }
        if m.store == "file" && m.file_path.is_none() {
            return Err(ConfigError::Invalid {
                message: "memory.store = \"file\" requires memory.file_path".into(),
            });
        }

        Ok(())
    }

    /// A commented default configuration file.
    pub fn default_toml() -> String {
        concat!(
            "# chatloom configuration\n",
            "\n",
            "[persona]\n",
            "name = \"Loom\"\n",
            "\n",
            "[turn]\n",
            "context_window_limit = 4096\n",
            "response_token_reserve = 1024\n",
            "memories_response_context_weight = 0.6\n",
            "\n",
            "[memory]\n",
            "store = \"in_memory\"\n",
            "relevance_lower = 0.6\n",
            "relevance_upper = 0.9\n",
            "\n",
            "[provider]\n",
            "api_url = \"https://api.openai.com/v1\"\n",
            "model = \"gpt-4o\"\n",
            "# api_key from CHATLOOM_API_KEY\n",
        )
        .into()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.turn.context_window_limit, 4096);
        assert_eq!(config.memory.containers.ordered().len(), 3);
    }

    #[test]
    fn initial_budget_subtracts_reserves() {
        let turn = TurnConfig::default();
        assert_eq!(turn.initial_budget(), 4096 - 1024 - 256 - 64);
    }

    #[test]
    fn rejects_inverted_relevance_band() {
        let mut config = AppConfig::default();
        config.memory.relevance_lower = 0.95;
        config.memory.relevance_upper = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = AppConfig::default();
        config.memory.document_min_relevance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_budget_window() {
        let mut config = AppConfig::default();
        config.turn.context_window_limit = 1024;
        config.turn.response_token_reserve = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_store() {
        let mut config = AppConfig::default();
        config.memory.store = "cloud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_store_requires_path() {
        let mut config = AppConfig::default();
        config.memory.store = "file".into();
        assert!(config.validate().is_err());
        config.memory.file_path = Some("/tmp/memories.jsonl".into());
        config.validate().unwrap();
    }

    #[test]
    fn default_toml_parses() {
        let config: AppConfig = toml::from_str(&AppConfig::default_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.persona.name, "Loom");
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chatloom.toml");
        std::fs::write(
            &path,
            "[turn]\ncontext_window_limit = 8192\n\n[memory]\nrelevance_lower = 0.5\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.turn.context_window_limit, 8192);
        assert!((config.memory.relevance_lower - 0.5).abs() < f32::EPSILON);
        // untouched fields keep defaults
        assert_eq!(config.provider.model, "gpt-4o");
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
