//! CheckMeter Core
//!
//! Core types and utilities shared across CheckMeter components.
//!
//! This crate provides:
//! - Request and result types for meter classification
//! - The permissive model-reply structure and its validation into a
//!   [`NormalizedResult`]
//! - Confidence normalization onto a canonical percentage
//! - Error types and result handling

pub mod confidence;
pub mod error;
pub mod types;

pub use confidence::{normalize_confidence, normalize_score, Confidence};
pub use error::{Error, Result};
pub use types::{
    Classification, ClassificationRequest, ImagePayload, LabelVocabulary, NormalizedResult,
    Provenance, QualityFlags, RawModelResponse, Tier,
};
