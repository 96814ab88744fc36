//! Shared application state and start-up wiring

use checkmeter_policy::DecisionPolicy;
use checkmeter_quota::{InMemoryUsageStore, UsageStore};
use checkmeter_vision::{ImageEnhancer, InstructionSet, MockVisionBackend, OpenAiBackend, VisionBackend};
use chrono::Local;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::pipeline::ClassificationPipeline;
use crate::security::{validate_backend_url, UrlPolicy};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<ClassificationPipeline>,
    pub usage: Arc<dyn UsageStore>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state around an already-constructed backend
    pub fn new(
        config: ServerConfig,
        backend: Arc<dyn VisionBackend>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> anyhow::Result<Self> {
        let policy = DecisionPolicy::new(&config.policy)?;
        let enhancer = ImageEnhancer::new(config.enhancement.clone());
        let usage: Arc<dyn UsageStore> = Arc::new(InMemoryUsageStore::new(config.quota.limits));

        Ok(Self {
            pipeline: Arc::new(ClassificationPipeline::new(backend, policy, enhancer)),
            usage,
            metrics_handle,
            config: Arc::new(config),
        })
    }
}

/// Choose the vision backend: the real API when a key is available, the
/// mock otherwise
pub fn build_backend(
    config: &ServerConfig,
    api_key: Option<&str>,
    force_mock: bool,
) -> anyhow::Result<Arc<dyn VisionBackend>> {
    let api_key = api_key.map(str::trim).filter(|key| !key.is_empty());

    let api_key = match api_key {
        Some(key) if !force_mock => key,
        _ => {
            warn!("No vision API key configured or mock mode requested, using the mock backend");
            return Ok(Arc::new(MockVisionBackend::new(config.policy.labels.clone())));
        }
    };

    validate_backend_url(&config.vision.backend_url, UrlPolicy::from_env())
        .map_err(|e| anyhow::anyhow!("Invalid vision backend URL: {}", e))?;

    let instructions = match &config.vision.prompt_file {
        Some(path) => {
            info!("Loading instructions from {}", path.display());
            InstructionSet::from_file(path, &config.policy.labels)?
        }
        None => InstructionSet::new(&config.policy.labels),
    };

    Ok(Arc::new(OpenAiBackend::new(config.vision.clone(), api_key, instructions)?))
}

/// Periodically drop usage records whose counters have all gone stale
pub fn spawn_usage_pruner(usage: Arc<dyn UsageStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = usage.prune(Local::now()).await;
            if removed > 0 {
                debug!(removed, "Pruned stale usage records");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkmeter_core::Tier;

    #[test]
    fn test_mock_without_key() {
        let config = ServerConfig::default();
        assert_eq!(build_backend(&config, None, false).unwrap().name(), "mock");
        assert_eq!(build_backend(&config, Some("  "), false).unwrap().name(), "mock");
        assert_eq!(build_backend(&config, Some("sk-live"), true).unwrap().name(), "mock");
    }

    #[test]
    fn test_real_backend_with_key() {
        let config = ServerConfig::default();
        let backend = build_backend(&config, Some("sk-live"), false).unwrap();
        assert_eq!(backend.name(), "openai");
        assert_eq!(backend.model_for(Tier::Detailed), "o3");
    }

    #[test]
    fn test_unsafe_backend_url_rejected() {
        let mut config = ServerConfig::default();
        config.vision.backend_url = "https://169.254.169.254/v1".to_string();
        assert!(build_backend(&config, Some("sk-live"), false).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pruner_removes_stale_records() {
        let store = Arc::new(InMemoryUsageStore::default());
        let yesterday = Local::now() - chrono::Duration::days(1);
        store.try_consume("old", Tier::Standard, yesterday).await;
        assert_eq!(store.len(), 1);

        let handle = spawn_usage_pruner(store.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(store.is_empty());
        handle.abort();
    }
}
