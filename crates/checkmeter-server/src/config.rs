//! Service configuration

use checkmeter_policy::PolicyConfig;
use checkmeter_quota::QuotaConfig;
use checkmeter_vision::{EnhanceConfig, VisionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::cli::Cli;

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub enhancement: EnhanceConfig,

    #[serde(default)]
    pub quota: QuotaConfig,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            info!("Loading configuration from {}", config_path);
            Self::from_yaml(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(backend) = &cli.backend {
            config.vision.backend_url = backend.clone();
        }

        if let Some(listen) = &cli.listen {
            config.server.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.server.port = port;
        }

        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Accept cross-origin requests from anywhere
    #[serde(default)]
    pub cors_allow_any: bool,

    /// Allowed origins when `cors_allow_any` is off
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            cors_allow_any: false,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Inbound image limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_types: default_allowed_types(),
        }
    }
}

impl UploadConfig {
    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime_type))
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_max_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/webp", "image/gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.upload.max_bytes, 5 * 1024 * 1024);
        assert!(config.upload.allows("image/webp"));
        assert!(config.upload.allows("IMAGE/JPEG"));
        assert!(!config.upload.allows("image/tiff"));
        assert_eq!(config.vision.standard_model, "o4-mini");
        assert_eq!(config.quota.limits.standard_per_day, 3);
        assert!(config.enhancement.enabled);
    }

    #[test]
    fn test_load_file_with_cli_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  port: 9000
  cors_allow_any: true
vision:
  backend_url: "https://vision.internal.example.com/v1"
  detailed_model: "o3-pro"
policy:
  thresholds:
    warning_below: 80
enhancement:
  enabled: false
quota:
  standard_per_day: 5
"#
        )
        .unwrap();

        let cli = Cli {
            port: Some(9100),
            backend: Some("https://api.openai.com/v1".to_string()),
            ..Cli::default()
        };
        let config = ServerConfig::load(file.path().to_str().unwrap(), &cli).unwrap();

        assert_eq!(config.server.port, 9100);
        assert!(config.server.cors_allow_any);
        assert_eq!(config.vision.backend_url, "https://api.openai.com/v1");
        assert_eq!(config.vision.detailed_model, "o3-pro");
        assert_eq!(config.policy.thresholds.warning_below, 80);
        assert_eq!(config.policy.thresholds.downgrade_below, 50);
        assert!(!config.enhancement.enabled);
        assert_eq!(config.quota.limits.standard_per_day, 5);
        assert_eq!(config.quota.limits.detailed_per_day, 1);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cli = Cli {
            listen: Some("127.0.0.1".to_string()),
            ..Cli::default()
        };
        let config = ServerConfig::load("/nonexistent/checkmeter.yaml", &cli).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_example_file_parses() {
        let config = ServerConfig::from_yaml(include_str!("../../../config.example.yaml")).unwrap();
        let defaults = ServerConfig::default();

        assert_eq!(config.server.cors_origins, defaults.server.cors_origins);
        assert_eq!(config.upload.max_bytes, defaults.upload.max_bytes);
        assert_eq!(config.policy.thresholds, defaults.policy.thresholds);
        assert_eq!(config.quota.limits, defaults.quota.limits);
        assert_eq!(config.policy.quality_phrases.len(), 4);
        assert!(config.policy.quality_phrases[3].feedback.is_none());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(ServerConfig::from_yaml("server: [unclosed").is_err());
    }
}
