//! Dual-pass selection
//!
//! When the first pass over the original photo is missing or unconvincing the
//! pipeline re-runs the model on an enhanced copy. This module decides when
//! that second pass is needed, picks the better of the two, and suppresses
//! the outcome entirely when neither is trustworthy.

use checkmeter_core::{Classification, Confidence, NormalizedResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decision::DecisionPolicy;

/// Why a result was withheld in favour of asking for a new photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetakeReason {
    /// Neither pass produced a recognisable verdict
    NoResult,
    /// The best pass was below the suppression floor
    LowConfidence,
    /// Both passes together complained about the photo too much
    QualityComplaints,
}

impl RetakeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoResult => "no_result",
            Self::LowConfidence => "low_confidence",
            Self::QualityComplaints => "quality_complaints",
        }
    }
}

/// Request for a new photo instead of a verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retake {
    pub reason: RetakeReason,

    /// User-facing remediation
    pub feedback: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_confidence: Option<Confidence>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_confidence: Option<Confidence>,
}

/// Outcome of choosing between the two passes
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The winning pass, with both pass confidences recorded
    Selected(NormalizedResult),
    Retake(Retake),
}

impl DecisionPolicy {
    /// Whether a first-pass result warrants a second pass on an enhanced image
    pub fn needs_second_pass(&self, first: &NormalizedResult) -> bool {
        first.classification == Classification::Unknown
            || first.confidence.percent() < self.thresholds.second_pass_below
    }

    /// Pick the better of the two passes, or decide that neither should be shown.
    ///
    /// `enhanced` is `None` when the enhanced pass could not be run. Only
    /// passes with a recognisable verdict compete; among those the higher
    /// confidence wins and ties go to the enhanced pass. Quality complaints
    /// are counted over the text of both passes, so a lone first pass is
    /// never suppressed for them and is left to the decision policy.
    pub fn select(&self, original: NormalizedResult, enhanced: Option<NormalizedResult>) -> Selection {
        let original_confidence = Some(original.confidence);
        let enhanced_confidence = enhanced.as_ref().map(|result| result.confidence);

        let combined = enhanced
            .as_ref()
            .map(|enhanced| format!("{} {}", original.narrative(), enhanced.narrative()));

        let retake = |reason: RetakeReason, feedback: String| {
            debug!(reason = reason.as_str(), "Dual-pass result suppressed");
            Selection::Retake(Retake {
                reason,
                feedback,
                original_confidence,
                enhanced_confidence,
            })
        };

        let best = match (has_verdict(&original), enhanced.filter(has_verdict)) {
            (false, None) => {
                return retake(RetakeReason::NoResult, self.messages.retake.clone());
            }
            (true, None) => original,
            (false, Some(enhanced)) => enhanced,
            (true, Some(enhanced)) => {
                if enhanced.confidence >= original.confidence {
                    enhanced
                } else {
                    original
                }
            }
        };

        if let Some(narrative) = combined.as_deref() {
            if self.vocabulary.distinct_matches(narrative) >= self.thresholds.strong_quality_matches {
                let feedback = self
                    .vocabulary
                    .first_match(narrative)
                    .and_then(|found| found.feedback)
                    .unwrap_or_else(|| self.messages.retake.clone());
                return retake(RetakeReason::QualityComplaints, feedback);
            }
        }

        if best.confidence.percent() < self.thresholds.suppress_below {
            return retake(RetakeReason::LowConfidence, self.messages.retake.clone());
        }

        let mut best = best;
        best.original_confidence = original_confidence;
        best.enhanced_confidence = enhanced_confidence;
        Selection::Selected(best)
    }
}

fn has_verdict(result: &NormalizedResult) -> bool {
    result.classification != Classification::Unknown
}
