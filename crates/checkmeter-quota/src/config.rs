//! Quota configuration

use checkmeter_core::Tier;
use serde::{Deserialize, Serialize};

/// Daily limits per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    #[serde(default = "default_standard_per_day")]
    pub standard_per_day: u32,

    #[serde(default = "default_detailed_per_day")]
    pub detailed_per_day: u32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            standard_per_day: default_standard_per_day(),
            detailed_per_day: default_detailed_per_day(),
        }
    }
}

impl QuotaLimits {
    pub fn for_tier(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Standard => self.standard_per_day,
            Tier::Detailed => self.detailed_per_day,
        }
    }
}

/// Quota section of the service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(flatten)]
    pub limits: QuotaLimits,

    /// Whether the classify endpoint consumes quota itself
    #[serde(default = "default_enforce_on_classify")]
    pub enforce_on_classify: bool,

    /// How often records with only stale counters are dropped
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            limits: QuotaLimits::default(),
            enforce_on_classify: default_enforce_on_classify(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

fn default_standard_per_day() -> u32 {
    3
}

fn default_detailed_per_day() -> u32 {
    1
}

fn default_enforce_on_classify() -> bool {
    true
}

fn default_prune_interval_secs() -> u64 {
    3600
}
