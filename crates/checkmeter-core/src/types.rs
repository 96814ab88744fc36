//! Core types for CheckMeter

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::confidence::{normalize_confidence, Confidence};
use crate::error::{Error, Result};

/// Analysis tier requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Default, rate-limited pass on the cheaper model
    #[default]
    #[serde(alias = "regular")]
    Standard,
    /// Higher-cost pass whose verdict is treated as authoritative
    Detailed,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Detailed => "detailed",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "regular" => Ok(Self::Standard),
            "detailed" => Ok(Self::Detailed),
            other => Err(format!(
                "invalid tier '{}', expected \"standard\" or \"detailed\"",
                other
            )),
        }
    }
}

/// Final verdict of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    PositiveMatch,
    NegativeMatch,
    Unknown,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PositiveMatch => "positive_match",
            Self::NegativeMatch => "negative_match",
            Self::Unknown => "unknown",
        }
    }
}

/// Mapping between model-facing label text and [`Classification`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelVocabulary {
    /// Text the model uses for a positive match
    #[serde(default = "default_positive_label")]
    pub positive: String,

    /// Text the model uses for a negative match
    #[serde(default = "default_negative_label")]
    pub negative: String,

    /// Text shown for an undecided verdict
    #[serde(default = "default_unknown_label")]
    pub unknown: String,
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self {
            positive: default_positive_label(),
            negative: default_negative_label(),
            unknown: default_unknown_label(),
        }
    }
}

impl LabelVocabulary {
    /// Map free-text label onto a classification.
    ///
    /// Matching is exact after trimming, ignoring ASCII case. The canonical
    /// names (`PositiveMatch`, `negative_match`, ...) are accepted as well.
    pub fn parse(&self, label: &str) -> Classification {
        let label = label.trim();
        let canonical = label.replace('_', "").to_ascii_lowercase();

        if label.eq_ignore_ascii_case(&self.positive) || canonical == "positivematch" {
            Classification::PositiveMatch
        } else if label.eq_ignore_ascii_case(&self.negative) || canonical == "negativematch" {
            Classification::NegativeMatch
        } else {
            Classification::Unknown
        }
    }

    /// User-facing text for a classification
    pub fn display(&self, classification: Classification) -> &str {
        match classification {
            Classification::PositiveMatch => &self.positive,
            Classification::NegativeMatch => &self.negative,
            Classification::Unknown => &self.unknown,
        }
    }
}

fn default_positive_label() -> String {
    "RTS meter".to_string()
}

fn default_negative_label() -> String {
    "Not an RTS meter".to_string()
}

fn default_unknown_label() -> String {
    "Unknown".to_string()
}

/// Opaque uploaded image
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// Encoded image bytes
    pub bytes: Bytes,

    /// MIME type, e.g. `image/jpeg`
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A single classification request
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    /// The uploaded image
    pub image: ImagePayload,

    /// Requested analysis tier
    pub tier: Tier,

    /// Whether the client already upscaled/contrast-adjusted the image
    pub already_enhanced: bool,
}

/// Untrusted reply from the vision model.
///
/// Every field is kept as an untyped JSON value; nothing is assumed to be
/// present or of the right type. Use the accessors to read validated data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawModelResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certainty: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Value>,

    #[serde(default, rename = "meterType", skip_serializing_if = "Option::is_none")]
    pub meter_type: Option<Value>,

    #[serde(default, rename = "additionalInfo", skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,

    #[serde(default, rename = "detailedReport", skip_serializing_if = "Option::is_none")]
    pub detailed_report: Option<Value>,
}

impl RawModelResponse {
    /// Parse the text content of a model completion.
    ///
    /// The content must be a JSON object; anything else is an
    /// [`Error::InvalidResponse`].
    pub fn from_content(content: &str) -> Result<Self> {
        let trimmed = content.trim();
        if !trimmed.starts_with('{') {
            return Err(Error::invalid_response("model reply is not a JSON object"));
        }

        let value: Value = serde_json::from_str(trimmed)
            .map_err(|e| Error::invalid_response(format!("unparseable model reply: {}", e)))?;

        if !value.is_object() {
            return Err(Error::invalid_response("model reply is not a JSON object"));
        }

        serde_json::from_value(value)
            .map_err(|e| Error::invalid_response(format!("unexpected model reply shape: {}", e)))
    }

    /// The proposed label, from the first of `result`, `classification`, `label`
    pub fn label_text(&self) -> Option<String> {
        [&self.result, &self.classification, &self.label]
            .into_iter()
            .find_map(text_of)
    }

    /// The raw confidence value, from the first of `certainty`, `confidence`,
    /// `confidence_score` that is present
    pub fn confidence_value(&self) -> Option<&Value> {
        [&self.certainty, &self.confidence, &self.confidence_score]
            .into_iter()
            .find_map(|v| v.as_ref().filter(|v| !v.is_null()))
    }

    pub fn explanation(&self) -> Option<String> {
        text_of(&self.explanation)
    }

    pub fn reasoning(&self) -> Option<String> {
        text_of(&self.reasoning)
    }

    pub fn meter_type(&self) -> Option<String> {
        text_of(&self.meter_type)
    }

    pub fn additional_info(&self) -> Option<String> {
        text_of(&self.additional_info)
    }

    pub fn detailed_report(&self) -> Option<String> {
        text_of(&self.detailed_report)
    }
}

/// Non-empty string content of an untyped field
fn text_of(value: &Option<Value>) -> Option<String> {
    value
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Image-quality remediation attached to a result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityFlags {
    /// Blocking: the verdict should not be trusted without a new photo
    pub needs_better_image: bool,

    /// Non-blocking (unless `needs_better_image`) quality concern
    pub image_quality_issue: bool,

    /// Human-readable remediation message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_quality_feedback: Option<String>,
}

impl QualityFlags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Where a result came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Tier that produced the result
    pub tier: Tier,

    /// Model identifier used for the winning pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,

    /// Whether the analysed image had been enhanced
    pub was_enhanced: bool,
}

/// Validated classification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    pub classification: Classification,

    /// User-facing label text for `classification`
    pub label: String,

    pub confidence: Confidence,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meter_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_report: Option<String>,

    #[serde(flatten)]
    pub quality: QualityFlags,

    #[serde(flatten)]
    pub provenance: Provenance,

    /// Confidence of the pass on the original image, if it ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_confidence: Option<Confidence>,

    /// Confidence of the pass on the enhanced image, if it ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_confidence: Option<Confidence>,
}

impl NormalizedResult {
    /// Validate and default every field of a raw model reply
    pub fn from_raw(raw: &RawModelResponse, labels: &LabelVocabulary, provenance: Provenance) -> Self {
        let classification = raw
            .label_text()
            .map(|label| labels.parse(&label))
            .unwrap_or(Classification::Unknown);

        Self {
            classification,
            label: labels.display(classification).to_string(),
            confidence: normalize_confidence(raw.confidence_value()),
            explanation: raw.explanation(),
            reasoning: raw.reasoning(),
            meter_type: raw.meter_type(),
            additional_info: raw.additional_info(),
            detailed_report: raw.detailed_report(),
            quality: QualityFlags::default(),
            provenance,
            original_confidence: None,
            enhanced_confidence: None,
        }
    }

    /// Change the classification, keeping the display label in sync
    pub fn relabel(&mut self, classification: Classification, labels: &LabelVocabulary) {
        self.classification = classification;
        self.label = labels.display(classification).to_string();
    }

    /// Explanation and reasoning joined, for vocabulary scans
    pub fn narrative(&self) -> String {
        let explanation = self.explanation.as_deref().unwrap_or("");
        let reasoning = self.reasoning.as_deref().unwrap_or("");
        format!("{} {}", explanation, reasoning)
    }
}
