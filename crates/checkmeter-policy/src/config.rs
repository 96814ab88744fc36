//! Policy configuration
//!
//! Every threshold and message the decision policy uses lives here so it can
//! be tuned from the service configuration file without touching code.

use checkmeter_core::LabelVocabulary;
use serde::{Deserialize, Serialize};

/// Complete decision-policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Confidence thresholds (percent)
    #[serde(default)]
    pub thresholds: PolicyThresholds,

    /// Model-facing label text
    #[serde(default)]
    pub labels: LabelVocabulary,

    /// User-facing remediation and hedging messages
    #[serde(default)]
    pub messages: PolicyMessages,

    /// Phrases in model text that blame the photo, with the advice to show
    #[serde(default = "default_quality_phrases")]
    pub quality_phrases: Vec<QualityPhraseSpec>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            thresholds: PolicyThresholds::default(),
            labels: LabelVocabulary::default(),
            messages: PolicyMessages::default(),
            quality_phrases: default_quality_phrases(),
        }
    }
}

impl PolicyConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// Confidence thresholds, all on the 10-100 percent scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyThresholds {
    /// Standard-tier verdicts below this become Unknown
    #[serde(default = "default_downgrade_below")]
    pub downgrade_below: u8,

    /// Standard-tier positive matches are raised to at least this
    #[serde(default = "default_positive_floor")]
    pub positive_floor: u8,

    /// Negative matches below this need a better image (blocking)
    #[serde(default = "default_better_image_below")]
    pub better_image_below: u8,

    /// Negative matches below this get a non-blocking clearer-photo warning
    #[serde(default = "default_warning_below")]
    pub warning_below: u8,

    /// A first pass below this triggers the enhanced second pass
    #[serde(default = "default_second_pass_below")]
    pub second_pass_below: u8,

    /// A best pass below this is suppressed in favour of a retake request
    #[serde(default = "default_suppress_below")]
    pub suppress_below: u8,

    /// Distinct quality phrases across both passes that force a retake
    #[serde(default = "default_strong_quality_matches")]
    pub strong_quality_matches: usize,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            downgrade_below: default_downgrade_below(),
            positive_floor: default_positive_floor(),
            better_image_below: default_better_image_below(),
            warning_below: default_warning_below(),
            second_pass_below: default_second_pass_below(),
            suppress_below: default_suppress_below(),
            strong_quality_matches: default_strong_quality_matches(),
        }
    }
}

/// Messages attached to results by the policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyMessages {
    /// Prepended to the explanation when a positive match is downgraded
    #[serde(default = "default_positive_hedge")]
    pub positive_hedge: String,

    /// Prepended to the explanation when a negative match is downgraded
    #[serde(default = "default_negative_hedge")]
    pub negative_hedge: String,

    /// Blocking "need a clearer image" feedback
    #[serde(default = "default_better_image")]
    pub better_image: String,

    /// Non-blocking "a clearer photo would help" feedback
    #[serde(default = "default_clearer_photo")]
    pub clearer_photo: String,

    /// Shown when a quality phrase matched but carried no advice of its own
    #[serde(default = "default_generic_quality")]
    pub generic_quality: String,

    /// Shown when the dual-pass outcome is suppressed
    #[serde(default = "default_retake")]
    pub retake: String,
}

impl Default for PolicyMessages {
    fn default() -> Self {
        Self {
            positive_hedge: default_positive_hedge(),
            negative_hedge: default_negative_hedge(),
            better_image: default_better_image(),
            clearer_photo: default_clearer_photo(),
            generic_quality: default_generic_quality(),
            retake: default_retake(),
        }
    }
}

/// One entry of the quality-complaint vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPhraseSpec {
    /// Phrase searched for (ASCII case-insensitive)
    pub phrase: String,

    /// Remediation advice shown when the phrase matches
    #[serde(default)]
    pub feedback: Option<String>,
}

impl QualityPhraseSpec {
    pub fn new(phrase: impl Into<String>, feedback: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            feedback: Some(feedback.into()),
        }
    }
}

fn default_downgrade_below() -> u8 {
    50
}

fn default_positive_floor() -> u8 {
    70
}

fn default_better_image_below() -> u8 {
    70
}

fn default_warning_below() -> u8 {
    85
}

fn default_second_pass_below() -> u8 {
    89
}

fn default_suppress_below() -> u8 {
    30
}

fn default_strong_quality_matches() -> usize {
    2
}

fn default_positive_hedge() -> String {
    "There might be evidence of an RTS meter, but the confidence is too low to make a definitive determination.".to_string()
}

fn default_negative_hedge() -> String {
    "The image doesn't appear to show an RTS meter, but the confidence is too low to make a definitive determination.".to_string()
}

fn default_better_image() -> String {
    "We need a clearer image of your meter. Please ensure the entire meter and its surroundings are clearly visible, properly lit, and in focus.".to_string()
}

fn default_clearer_photo() -> String {
    "A clearer photo would provide more accurate results.".to_string()
}

fn default_generic_quality() -> String {
    "Please take a clearer photo of the meter.".to_string()
}

fn default_retake() -> String {
    "We couldn't get a reliable reading from this photo, even after enhancing it. Please take a new photo showing the whole meter in good light.".to_string()
}

/// Built-in quality-complaint vocabulary, in priority order
pub fn default_quality_phrases() -> Vec<QualityPhraseSpec> {
    [
        ("blurry", "The image appears to be blurry. Please take a clearer photo."),
        ("unclear", "The image is unclear. Please take a better photo with good lighting."),
        ("poor quality", "The image quality is poor. Please take a clearer photo."),
        ("poor lighting", "The lighting in the image is poor. Please take a photo with better lighting."),
        ("too dark", "The image is too dark. Please take a photo with better lighting."),
        ("not visible", "Parts of the meter are not visible. Please capture the entire meter clearly."),
        ("partially visible", "The meter is only partially visible. Please capture the entire meter in the frame."),
        ("low resolution", "The image resolution is too low. Please take a higher quality photo."),
        ("glare", "There is glare on the meter. Please take a photo without reflections or glare."),
        ("hard to see", "The meter details are hard to see. Please take a clearer photo with good lighting."),
        ("difficult to read", "The meter is difficult to read. Please take a clearer photo."),
        ("can't read the writing", "The writing on the meter can't be read. Please move closer and take a sharper photo."),
        ("cannot determine", "We cannot determine the meter type from this image. Please take a clearer photo showing the entire meter."),
        ("out of focus", "The image is out of focus. Please take a clearer photo."),
    ]
    .into_iter()
    .map(|(phrase, feedback)| QualityPhraseSpec::new(phrase, feedback))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PolicyConfig::default();
        assert_eq!(config.thresholds.downgrade_below, 50);
        assert_eq!(config.thresholds.positive_floor, 70);
        assert_eq!(config.thresholds.warning_below, 85);
        assert_eq!(config.thresholds.second_pass_below, 89);
        assert_eq!(config.thresholds.suppress_below, 30);
        assert!(!config.quality_phrases.is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
thresholds:
  downgrade_below: 40
labels:
  positive: "Smart meter"
quality_phrases:
  - phrase: "smudged"
    feedback: "Wipe the meter glass and try again."
  - phrase: "tilted"
"#;
        let config = PolicyConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.thresholds.downgrade_below, 40);
        assert_eq!(config.thresholds.positive_floor, 70);
        assert_eq!(config.labels.positive, "Smart meter");
        assert_eq!(config.labels.negative, "Not an RTS meter");
        assert_eq!(config.quality_phrases.len(), 2);
        assert_eq!(config.quality_phrases[1].feedback, None);
        assert_eq!(config.messages.clearer_photo, default_clearer_photo());
    }
}
