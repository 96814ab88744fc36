//! Vision backend trait

use async_trait::async_trait;
use checkmeter_core::{ImagePayload, RawModelResponse, Result, Tier};

/// A vision-capable model that classifies meter photos.
///
/// Implementations return the model's reply as an untrusted
/// [`RawModelResponse`]; validation happens downstream.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Analyze one image at the given tier
    async fn analyze(&self, image: &ImagePayload, tier: Tier) -> Result<RawModelResponse>;

    /// Model identifier used for a tier
    fn model_for(&self, tier: Tier) -> &str;

    /// Backend name for logging
    fn name(&self) -> &str;
}
