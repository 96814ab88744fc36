//! CheckMeter Policy
//!
//! Post-processing that turns an untrusted model verdict into a user-safe one.
//!
//! - [`DecisionPolicy`]: confidence-banded downgrade, boost and remediation
//! - [`QualityVocabulary`]: data-driven detection of photo-quality complaints
//! - Dual-pass selection between the original and the enhanced image
//!
//! Every threshold and message comes from [`PolicyConfig`].

pub mod config;
pub mod decision;
pub mod dual_pass;
pub mod quality;

pub use config::{PolicyConfig, PolicyMessages, PolicyThresholds, QualityPhraseSpec};
pub use decision::DecisionPolicy;
pub use dual_pass::{Retake, RetakeReason, Selection};
pub use quality::{QualityMatch, QualityVocabulary};
