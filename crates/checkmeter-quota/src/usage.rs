//! Usage records and snapshots

use checkmeter_core::Tier;
use chrono::{DateTime, Days, Local};
use serde::{Deserialize, Serialize};

use crate::config::QuotaLimits;

/// A count that starts over on the first observation after local midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCounter {
    pub count: u32,
    pub last_reset: DateTime<Local>,
}

impl DailyCounter {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            count: 0,
            last_reset: now,
        }
    }

    /// Whether local midnight has passed since the last reset
    pub fn is_stale(&self, now: DateTime<Local>) -> bool {
        self.last_reset.date_naive() < now.date_naive()
    }

    /// Count as of `now`, without resetting
    pub fn current(&self, now: DateTime<Local>) -> u32 {
        if self.is_stale(now) {
            0
        } else {
            self.count
        }
    }

    /// Reset the counter if it is stale
    pub fn roll(&mut self, now: DateTime<Local>) {
        if self.is_stale(now) {
            self.count = 0;
            self.last_reset = now;
        }
    }
}

/// Per-identity usage, one independent counter per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    pub standard: DailyCounter,
    pub detailed: DailyCounter,
}

impl UsageRecord {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            standard: DailyCounter::new(now),
            detailed: DailyCounter::new(now),
        }
    }

    pub fn counter_mut(&mut self, tier: Tier) -> &mut DailyCounter {
        match tier {
            Tier::Standard => &mut self.standard,
            Tier::Detailed => &mut self.detailed,
        }
    }

    /// Whether every counter would read zero at `now`
    pub fn is_stale(&self, now: DateTime<Local>) -> bool {
        self.standard.current(now) == 0 && self.detailed.current(now) == 0
    }

    pub fn snapshot(&self, limits: &QuotaLimits, now: DateTime<Local>) -> UsageSnapshot {
        UsageSnapshot {
            standard: CounterStatus::new(self.standard.current(now), limits.standard_per_day),
            detailed: CounterStatus::new(self.detailed.current(now), limits.detailed_per_day),
            resets_at: next_local_midnight(now),
        }
    }
}

/// Used, limit and remaining for one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterStatus {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
}

impl CounterStatus {
    pub fn new(used: u32, limit: u32) -> Self {
        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    }
}

/// Read-only view of an identity's usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    #[serde(rename = "regularChecks")]
    pub standard: CounterStatus,

    #[serde(rename = "detailedAnalysis")]
    pub detailed: CounterStatus,

    /// When the counters next start over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Local>>,
}

impl UsageSnapshot {
    /// Snapshot of an identity with no usage
    pub fn empty(limits: &QuotaLimits, now: DateTime<Local>) -> Self {
        UsageRecord::new(now).snapshot(limits, now)
    }
}

/// Outcome of an atomic check-and-increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    /// The counter was incremented; the snapshot reflects the new count
    Accepted(UsageSnapshot),
    /// The limit was already reached; nothing changed
    Rejected(UsageSnapshot),
}

impl QuotaDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn snapshot(&self) -> &UsageSnapshot {
        match self {
            Self::Accepted(snapshot) | Self::Rejected(snapshot) => snapshot,
        }
    }
}

fn next_local_midnight(now: DateTime<Local>) -> Option<DateTime<Local>> {
    now.date_naive()
        .checked_add_days(Days::new(1))?
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(Local)
        .earliest()
}
