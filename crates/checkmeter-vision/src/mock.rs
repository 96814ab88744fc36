//! Mock vision backend
//!
//! Used when no API key is configured so the service can be exercised end to
//! end without network access. Replies are fixed per tier.

use async_trait::async_trait;
use checkmeter_core::{ImagePayload, LabelVocabulary, RawModelResponse, Result, Tier};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::backend::VisionBackend;

const MOCK_DETAILED_REPORT: &str = "# Mock Detailed Report

## Meter Identification
A separate black teleswitch box with a red button is mounted next to the main meter, the usual sign of a Radio Teleswitch Service installation.

## Observations
- Configuration: Economy 7
- Tariff support: day and night rates
- Control: radio signal

## Recommended Actions
1. Contact your energy supplier to arrange a replacement meter.
2. Ask about smart meter tariffs with similar off-peak periods.

*This report was generated by the mock backend.*";

/// Backend returning deterministic replies without calling any service
pub struct MockVisionBackend {
    labels: LabelVocabulary,
    calls: AtomicU64,
}

impl MockVisionBackend {
    pub fn new(labels: LabelVocabulary) -> Self {
        Self {
            labels,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of analyses served
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn reply(&self, tier: Tier) -> RawModelResponse {
        let value = match tier {
            Tier::Standard => json!({
                "result": self.labels.negative,
                "certainty": 80,
                "explanation": "This is a mock response. No vision API key is configured.",
                "reasoning": "No actual analysis was performed.",
                "meterType": "Mock Meter",
                "additionalInfo": "Set OPENAI_API_KEY to enable real analysis."
            }),
            Tier::Detailed => json!({
                "result": self.labels.positive,
                "certainty": 95,
                "explanation": "This is a mock detailed analysis. The meter shows RTS characteristics including a black housing with a red button.",
                "reasoning": "A separate black box with a red button is a strong indicator of an RTS meter.",
                "meterType": "RTS Economy 7",
                "additionalInfo": "This mock RTS meter appears to control Economy 7 heating and hot water timing.",
                "detailedReport": MOCK_DETAILED_REPORT
            }),
        };

        serde_json::from_value(value).unwrap_or_default()
    }
}

impl Default for MockVisionBackend {
    fn default() -> Self {
        Self::new(LabelVocabulary::default())
    }
}

#[async_trait]
impl VisionBackend for MockVisionBackend {
    async fn analyze(&self, image: &ImagePayload, tier: Tier) -> Result<RawModelResponse> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!(tier = %tier, bytes = image.len(), "Mock vision analysis");
        Ok(self.reply(tier))
    }

    fn model_for(&self, _tier: Tier) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "mock"
    }
}
