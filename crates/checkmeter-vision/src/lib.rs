//! CheckMeter Vision
//!
//! Outbound side of the classifier:
//!
//! - [`VisionBackend`]: the seam every model integration implements
//! - [`OpenAiBackend`]: OpenAI-compatible chat completions with image input
//! - [`MockVisionBackend`]: deterministic replies for keyless development
//! - [`ImageEnhancer`]: the upscale and contrast transform used by the
//!   second analysis pass

pub mod backend;
pub mod config;
pub mod enhance;
pub mod mock;
pub mod openai;
pub mod prompts;

pub use backend::VisionBackend;
pub use config::VisionConfig;
pub use enhance::{sniff_mime_type, EnhanceConfig, ImageEnhancer};
pub use mock::MockVisionBackend;
pub use openai::OpenAiBackend;
pub use prompts::InstructionSet;
