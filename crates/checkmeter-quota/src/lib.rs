//! CheckMeter Quota
//!
//! Per-identity, per-day usage counters gating how many classifications a
//! client may run. Two independent counters (standard and detailed) reset on
//! the first request after local midnight.
//!
//! Identity is best-effort and not a security boundary.

pub mod config;
pub mod store;
pub mod usage;

pub use config::{QuotaConfig, QuotaLimits};
pub use store::{InMemoryUsageStore, UsageStore};
pub use usage::{CounterStatus, DailyCounter, QuotaDecision, UsageRecord, UsageSnapshot};
