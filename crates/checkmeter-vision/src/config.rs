//! Vision backend configuration

use checkmeter_core::Tier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outbound vision-model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Model used for the standard tier
    #[serde(default = "default_standard_model")]
    pub standard_model: String,

    /// Model used for the detailed tier
    #[serde(default = "default_detailed_model")]
    pub detailed_model: String,

    /// Completion token limit for the standard tier
    #[serde(default = "default_standard_max_tokens")]
    pub standard_max_tokens: u32,

    /// Completion token limit for the detailed tier
    #[serde(default = "default_detailed_max_tokens")]
    pub detailed_max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional file replacing the built-in instruction text
    #[serde(default)]
    pub prompt_file: Option<PathBuf>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            standard_model: default_standard_model(),
            detailed_model: default_detailed_model(),
            standard_max_tokens: default_standard_max_tokens(),
            detailed_max_tokens: default_detailed_max_tokens(),
            timeout_secs: default_timeout_secs(),
            prompt_file: None,
        }
    }
}

impl VisionConfig {
    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Standard => &self.standard_model,
            Tier::Detailed => &self.detailed_model,
        }
    }

    pub fn max_tokens_for(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Standard => self.standard_max_tokens,
            Tier::Detailed => self.detailed_max_tokens,
        }
    }
}

fn default_backend_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_standard_model() -> String {
    "o4-mini".to_string()
}

fn default_detailed_model() -> String {
    "o3".to_string()
}

fn default_standard_max_tokens() -> u32 {
    800
}

fn default_detailed_max_tokens() -> u32 {
    2000
}

fn default_timeout_secs() -> u64 {
    60
}
