//! Classification pipeline
//!
//! Sequential stages per request: first pass on the original image, an
//! optional second pass on an enhanced copy, selection between the two, and
//! the decision policy. The second call is only issued after the first has
//! fully resolved.

use checkmeter_core::{
    ClassificationRequest, Error, ImagePayload, NormalizedResult, Provenance, RawModelResponse,
    Result, Tier,
};
use checkmeter_policy::{DecisionPolicy, Retake, Selection};
use checkmeter_vision::{ImageEnhancer, VisionBackend};
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::telemetry::{RETAKES_TOTAL, UPSTREAM_FAILURES_TOTAL, UPSTREAM_LATENCY_MS, VERDICTS_TOTAL};

/// What the client is shown
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// A verdict, after the decision policy
    Classified(NormalizedResult),
    /// No trustworthy verdict; ask for a new photo
    Retake(Retake),
}

pub struct ClassificationPipeline {
    backend: Arc<dyn VisionBackend>,
    policy: DecisionPolicy,
    enhancer: ImageEnhancer,
}

impl ClassificationPipeline {
    pub fn new(backend: Arc<dyn VisionBackend>, policy: DecisionPolicy, enhancer: ImageEnhancer) -> Self {
        Self {
            backend,
            policy,
            enhancer,
        }
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Classify one validated request.
    ///
    /// Upstream failures on either pass are terminal for the request.
    pub async fn analyze(&self, request: ClassificationRequest) -> Result<AnalysisOutcome> {
        let tier = request.tier;
        let first_raw = self.run_pass(&request.image, tier).await?;
        let first = self
            .policy
            .normalize(&first_raw, self.provenance(tier, request.already_enhanced));

        let dual_pass = self.enhancer.config().enabled && tier == Tier::Standard && !request.already_enhanced;
        if !dual_pass || !self.policy.needs_second_pass(&first) {
            return Ok(self.classified(first));
        }

        debug!(
            classification = first.classification.as_str(),
            confidence = first.confidence.percent(),
            "First pass unconvincing, enhancing image"
        );

        let enhanced = match self.enhance(&request.image).await {
            Ok(image) => {
                let raw = self.run_pass(&image, tier).await?;
                Some(self.policy.normalize(&raw, self.provenance(tier, true)))
            }
            Err(err) => {
                warn!(error = %err, "Image enhancement failed, skipping second pass");
                None
            }
        };

        match self.policy.select(first, enhanced) {
            Selection::Selected(result) => Ok(self.classified(result)),
            Selection::Retake(retake) => {
                counter!(RETAKES_TOTAL, "reason" => retake.reason.as_str()).increment(1);
                info!(reason = retake.reason.as_str(), "Asking for a new photo");
                Ok(AnalysisOutcome::Retake(retake))
            }
        }
    }

    fn classified(&self, candidate: NormalizedResult) -> AnalysisOutcome {
        let result = self.policy.apply(candidate);
        counter!(
            VERDICTS_TOTAL,
            "tier" => result.provenance.tier.as_str(),
            "classification" => result.classification.as_str()
        )
        .increment(1);
        info!(
            tier = %result.provenance.tier,
            classification = result.classification.as_str(),
            confidence = result.confidence.percent(),
            was_enhanced = result.provenance.was_enhanced,
            "Classification complete"
        );
        AnalysisOutcome::Classified(result)
    }

    fn provenance(&self, tier: Tier, was_enhanced: bool) -> Provenance {
        Provenance {
            tier,
            model_used: Some(self.backend.model_for(tier).to_string()),
            was_enhanced,
        }
    }

    async fn run_pass(&self, image: &ImagePayload, tier: Tier) -> Result<RawModelResponse> {
        let start = Instant::now();
        let result = self.backend.analyze(image, tier).await;
        histogram!(UPSTREAM_LATENCY_MS).record(start.elapsed().as_secs_f64() * 1000.0);

        if result.is_err() {
            counter!(UPSTREAM_FAILURES_TOTAL).increment(1);
        }
        result
    }

    async fn enhance(&self, image: &ImagePayload) -> Result<ImagePayload> {
        let enhancer = self.enhancer.clone();
        let image = image.clone();
        tokio::task::spawn_blocking(move || enhancer.enhance(&image))
            .await
            .map_err(|e| Error::internal(format!("enhancement task failed: {}", e)))?
    }
}
