//! Classification decision policy
//!
//! Turns a validated model reply into a user-safe verdict. The model is tuned
//! to over-report positives and under-report confidence on ambiguous
//! negatives; this policy leans towards asking for a better photo over
//! showing a confident wrong negative, and never gates a plausible positive
//! behind image quality.

use checkmeter_core::{
    Classification, Confidence, LabelVocabulary, NormalizedResult, Provenance, RawModelResponse,
    Result, Tier,
};
use tracing::debug;

use crate::config::{PolicyConfig, PolicyMessages, PolicyThresholds};
use crate::quality::QualityVocabulary;

/// Deterministic post-processing applied to every model verdict
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    pub(crate) thresholds: PolicyThresholds,
    pub(crate) labels: LabelVocabulary,
    pub(crate) messages: PolicyMessages,
    pub(crate) vocabulary: QualityVocabulary,
}

impl DecisionPolicy {
    /// Build a policy from configuration
    pub fn new(config: &PolicyConfig) -> Result<Self> {
        Ok(Self {
            thresholds: config.thresholds,
            labels: config.labels.clone(),
            messages: config.messages.clone(),
            vocabulary: QualityVocabulary::new(config.quality_phrases.clone())?,
        })
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }

    pub fn labels(&self) -> &LabelVocabulary {
        &self.labels
    }

    pub fn messages(&self) -> &PolicyMessages {
        &self.messages
    }

    pub fn vocabulary(&self) -> &QualityVocabulary {
        &self.vocabulary
    }

    /// Validate a raw reply without applying the policy
    pub fn normalize(&self, raw: &RawModelResponse, provenance: Provenance) -> NormalizedResult {
        NormalizedResult::from_raw(raw, &self.labels, provenance)
    }

    /// Validate a raw reply and apply the policy
    pub fn evaluate(&self, raw: &RawModelResponse, provenance: Provenance) -> NormalizedResult {
        self.apply(self.normalize(raw, provenance))
    }

    /// Apply the policy to a candidate result.
    ///
    /// The outcome depends only on classification, confidence, narrative text
    /// and the tier recorded in the result's provenance, so applying it twice
    /// gives the same result as applying it once.
    pub fn apply(&self, mut result: NormalizedResult) -> NormalizedResult {
        match (result.provenance.tier, result.classification) {
            (Tier::Detailed, _) => {
                // Detailed verdicts are authoritative
                result.quality.clear();
            }
            (Tier::Standard, Classification::PositiveMatch) => self.apply_positive(&mut result),
            (Tier::Standard, Classification::NegativeMatch) => self.apply_negative(&mut result),
            (Tier::Standard, Classification::Unknown) => self.apply_unknown(&mut result),
        }

        debug!(
            tier = %result.provenance.tier,
            classification = result.classification.as_str(),
            confidence = result.confidence.percent(),
            needs_better_image = result.quality.needs_better_image,
            "Decision policy applied"
        );

        result
    }

    fn apply_positive(&self, result: &mut NormalizedResult) {
        result.quality.clear();

        let confidence = result.confidence.percent();
        if confidence < self.thresholds.downgrade_below {
            self.downgrade(result, &self.messages.positive_hedge);
        } else if confidence < self.thresholds.positive_floor {
            result.confidence = Confidence::from_percent(self.thresholds.positive_floor.max(confidence));
        }
    }

    fn apply_negative(&self, result: &mut NormalizedResult) {
        result.quality.clear();

        if result.confidence.percent() < self.thresholds.downgrade_below {
            self.downgrade(result, &self.messages.negative_hedge);
        }

        self.remediate(result);
    }

    /// A raw Unknown is treated like a negative without the hedge
    fn apply_unknown(&self, result: &mut NormalizedResult) {
        result.quality.clear();

        // a positive downgraded by an earlier pass stays ungated
        let hedge = self.messages.positive_hedge.as_str();
        let downgraded_positive = !hedge.is_empty()
            && result
                .explanation
                .as_deref()
                .is_some_and(|explanation| explanation.starts_with(hedge));
        if !downgraded_positive {
            self.remediate(result);
        }
    }

    /// Phrase scan followed by confidence-banded remediation
    fn remediate(&self, result: &mut NormalizedResult) {
        let confidence = result.confidence.percent();

        if let Some(found) = self.vocabulary.first_match(&result.narrative()) {
            result.quality.image_quality_issue = true;
            result.quality.image_quality_feedback = found.feedback;
        }

        if confidence < self.thresholds.better_image_below {
            result.quality.needs_better_image = true;
            result.quality.image_quality_issue = true;
            result.quality.image_quality_feedback = Some(self.messages.better_image.clone());
        } else if confidence < self.thresholds.warning_below {
            result.quality.image_quality_issue = true;
            if result.quality.image_quality_feedback.is_none() {
                result.quality.image_quality_feedback = Some(self.messages.clearer_photo.clone());
            }
        } else if result.quality.image_quality_issue && result.quality.image_quality_feedback.is_none() {
            result.quality.image_quality_feedback = Some(self.messages.generic_quality.clone());
        }
    }

    fn downgrade(&self, result: &mut NormalizedResult, hedge: &str) {
        result.relabel(Classification::Unknown, &self.labels);
        result.explanation = Some(match result.explanation.take() {
            Some(explanation) => format!("{} {}", hedge, explanation),
            None => hedge.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkmeter_core::QualityFlags;

    fn policy() -> DecisionPolicy {
        DecisionPolicy::new(&PolicyConfig::default()).unwrap()
    }

    fn candidate(
        classification: Classification,
        confidence: u8,
        explanation: &str,
        tier: Tier,
    ) -> NormalizedResult {
        let labels = LabelVocabulary::default();
        NormalizedResult {
            classification,
            label: labels.display(classification).to_string(),
            confidence: Confidence::from_percent(confidence),
            explanation: Some(explanation.to_string()),
            reasoning: None,
            meter_type: None,
            additional_info: None,
            detailed_report: None,
            quality: QualityFlags::default(),
            provenance: Provenance {
                tier,
                model_used: None,
                was_enhanced: false,
            },
            original_confidence: None,
            enhanced_confidence: None,
        }
    }

    #[test]
    fn test_low_negative_becomes_unknown() {
        let result = policy().apply(candidate(
            Classification::NegativeMatch,
            40,
            "No radio teleswitch visible.",
            Tier::Standard,
        ));

        assert_eq!(result.classification, Classification::Unknown);
        assert_eq!(result.label, "Unknown");
        assert!(result.quality.needs_better_image);
        assert!(result
            .explanation
            .as_deref()
            .unwrap()
            .starts_with("The image doesn't appear to show an RTS meter"));
        assert!(result.explanation.as_deref().unwrap().ends_with("No radio teleswitch visible."));
    }

    #[test]
    fn test_low_positive_becomes_unknown() {
        let mut input = candidate(Classification::PositiveMatch, 30, "", Tier::Standard);
        input.explanation = None;
        let result = policy().apply(input);

        assert_eq!(result.classification, Classification::Unknown);
        assert_eq!(
            result.explanation.as_deref(),
            Some(PolicyMessages::default().positive_hedge.as_str())
        );
        assert!(!result.quality.needs_better_image);
    }

    #[test]
    fn test_moderate_positive_is_boosted() {
        let result = policy().apply(candidate(
            Classification::PositiveMatch,
            55,
            "Looks like an RTS meter but the photo is blurry.",
            Tier::Standard,
        ));

        assert_eq!(result.classification, Classification::PositiveMatch);
        assert_eq!(result.label, "RTS meter");
        assert_eq!(result.confidence.percent(), 70);
        assert_eq!(result.quality, QualityFlags::default());
    }

    #[test]
    fn test_confident_positive_untouched() {
        let result = policy().apply(candidate(Classification::PositiveMatch, 82, "Clear", Tier::Standard));
        assert_eq!(result.confidence.percent(), 82);
    }

    #[test]
    fn test_positive_clears_existing_flags() {
        let mut input = candidate(Classification::PositiveMatch, 90, "Clear", Tier::Standard);
        input.quality.needs_better_image = true;
        input.quality.image_quality_feedback = Some("stale".to_string());
        let result = policy().apply(input);
        assert_eq!(result.quality, QualityFlags::default());
    }

    #[test]
    fn test_negative_below_better_image_threshold() {
        let result = policy().apply(candidate(
            Classification::NegativeMatch,
            60,
            "The image is too dark.",
            Tier::Standard,
        ));

        assert_eq!(result.classification, Classification::NegativeMatch);
        assert!(result.quality.needs_better_image);
        assert!(result.quality.image_quality_issue);
        // generic message wins over the phrase-specific one
        assert_eq!(
            result.quality.image_quality_feedback.as_deref(),
            Some(PolicyMessages::default().better_image.as_str())
        );
    }

    #[test]
    fn test_negative_warning_band_keeps_phrase_message() {
        let result = policy().apply(candidate(
            Classification::NegativeMatch,
            75,
            "Standard digital meter, slight glare on the display.",
            Tier::Standard,
        ));

        assert!(!result.quality.needs_better_image);
        assert!(result.quality.image_quality_issue);
        assert!(result
            .quality
            .image_quality_feedback
            .as_deref()
            .unwrap()
            .contains("glare"));
    }

    #[test]
    fn test_negative_warning_band_without_phrase() {
        let result = policy().apply(candidate(
            Classification::NegativeMatch,
            84,
            "Standard digital meter.",
            Tier::Standard,
        ));

        assert!(!result.quality.needs_better_image);
        assert!(result.quality.image_quality_issue);
        assert_eq!(
            result.quality.image_quality_feedback.as_deref(),
            Some(PolicyMessages::default().clearer_photo.as_str())
        );
    }

    #[test]
    fn test_confident_negative() {
        let clean = policy().apply(candidate(
            Classification::NegativeMatch,
            85,
            "Standard digital meter.",
            Tier::Standard,
        ));
        assert_eq!(clean.quality, QualityFlags::default());

        let complained = policy().apply(candidate(
            Classification::NegativeMatch,
            95,
            "Standard meter, although slightly out of focus.",
            Tier::Standard,
        ));
        assert!(!complained.quality.needs_better_image);
        assert!(complained.quality.image_quality_issue);
        assert!(complained
            .quality
            .image_quality_feedback
            .as_deref()
            .unwrap()
            .contains("out of focus"));
    }

    #[test]
    fn test_phrase_scan_includes_reasoning() {
        let mut input = candidate(Classification::NegativeMatch, 90, "Standard meter.", Tier::Standard);
        input.reasoning = Some("Some digits were difficult to read.".to_string());
        let result = policy().apply(input);
        assert!(result.quality.image_quality_issue);
    }

    #[test]
    fn test_detailed_tier_is_authoritative() {
        let policy = policy();
        for classification in [Classification::PositiveMatch, Classification::NegativeMatch] {
            for confidence in [10, 40, 55, 69, 75, 100] {
                let mut input = candidate(classification, confidence, "blurry and too dark", Tier::Detailed);
                input.quality.needs_better_image = true;
                let result = policy.apply(input);

                assert_eq!(result.classification, classification);
                assert_eq!(result.confidence.percent(), confidence.max(10));
                assert_eq!(result.quality, QualityFlags::default());
            }
        }
    }

    #[test]
    fn test_raw_unknown_gets_remediation() {
        let result = policy().apply(candidate(
            Classification::Unknown,
            40,
            "The photo is blurry",
            Tier::Standard,
        ));

        assert_eq!(result.classification, Classification::Unknown);
        assert_eq!(result.explanation.as_deref(), Some("The photo is blurry"));
        assert!(result.quality.needs_better_image);
        assert!(result.quality.image_quality_issue);
        assert_eq!(
            result.quality.image_quality_feedback.as_deref(),
            Some(PolicyMessages::default().better_image.as_str())
        );

        let warned = policy().apply(candidate(Classification::Unknown, 80, "Hard to say", Tier::Standard));
        assert!(!warned.quality.needs_better_image);
        assert_eq!(
            warned.quality.image_quality_feedback.as_deref(),
            Some(PolicyMessages::default().clearer_photo.as_str())
        );

        let confident = policy().apply(candidate(Classification::Unknown, 90, "Hard to say", Tier::Standard));
        assert_eq!(confident.quality, QualityFlags::default());
    }

    #[test]
    fn test_downgraded_positive_stays_ungated() {
        let policy = policy();
        let once = policy.apply(candidate(
            Classification::PositiveMatch,
            30,
            "Possibly a teleswitch, but blurry.",
            Tier::Standard,
        ));
        assert_eq!(once.classification, Classification::Unknown);
        assert_eq!(once.quality, QualityFlags::default());

        let twice = policy.apply(once.clone());
        assert_eq!(twice, once);
    }

    #[test]
    fn test_policy_is_idempotent() {
        let policy = policy();
        let cases = [
            (Classification::PositiveMatch, 30),
            (Classification::PositiveMatch, 55),
            (Classification::PositiveMatch, 95),
            (Classification::NegativeMatch, 40),
            (Classification::NegativeMatch, 60),
            (Classification::NegativeMatch, 75),
            (Classification::NegativeMatch, 90),
            (Classification::Unknown, 10),
            (Classification::Unknown, 40),
            (Classification::Unknown, 75),
            (Classification::Unknown, 95),
        ];

        for tier in [Tier::Standard, Tier::Detailed] {
            for (classification, confidence) in cases {
                let once = policy.apply(candidate(classification, confidence, "a bit blurry", tier));
                let twice = policy.apply(once.clone());
                assert_eq!(once, twice, "{:?} {} {:?}", classification, confidence, tier);
            }
        }
    }

    #[test]
    fn test_evaluate_raw_fraction_positive() {
        let raw = RawModelResponse::from_content(
            r#"{"result": "PositiveMatch", "certainty": 0.58, "explanation": "Teleswitch unit visible"}"#,
        )
        .unwrap();
        let result = policy().evaluate(
            &raw,
            Provenance {
                tier: Tier::Standard,
                model_used: Some("o4-mini".to_string()),
                was_enhanced: false,
            },
        );

        assert_eq!(result.classification, Classification::PositiveMatch);
        assert_eq!(result.confidence.percent(), 70);
        assert_eq!(result.provenance.model_used.as_deref(), Some("o4-mini"));
    }

    #[test]
    fn test_evaluate_raw_tiny_fraction_is_downgraded() {
        let raw = RawModelResponse::from_content(r#"{"result": "PositiveMatch", "certainty": 0.08}"#)
            .unwrap();
        let result = policy().evaluate(&raw, Provenance::default());

        assert_eq!(result.classification, Classification::Unknown);
        assert_eq!(result.confidence.percent(), 10);
        assert_eq!(result.quality, QualityFlags::default());
    }

    #[test]
    fn test_custom_thresholds() {
        let mut config = PolicyConfig::default();
        config.thresholds.downgrade_below = 30;
        config.thresholds.positive_floor = 60;
        let policy = DecisionPolicy::new(&config).unwrap();

        let result = policy.apply(candidate(Classification::PositiveMatch, 40, "", Tier::Standard));
        assert_eq!(result.classification, Classification::PositiveMatch);
        assert_eq!(result.confidence.percent(), 60);
    }
}
