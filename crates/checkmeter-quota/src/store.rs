//! Usage stores

use async_trait::async_trait;
use checkmeter_core::Tier;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use crate::config::QuotaLimits;
use crate::usage::{QuotaDecision, UsageRecord, UsageSnapshot};

/// Per-identity daily usage storage.
///
/// `try_consume` must check and increment as one atomic step so concurrent
/// requests for the same identity cannot both pass a check that only one
/// should.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Current usage for an identity. Never mutates state.
    async fn snapshot(&self, identity: &str, now: DateTime<Local>) -> UsageSnapshot;

    /// Consume one unit of the tier's daily allowance if any is left
    async fn try_consume(&self, identity: &str, tier: Tier, now: DateTime<Local>) -> QuotaDecision;

    /// Drop records whose counters have all gone stale. Returns how many were dropped.
    async fn prune(&self, now: DateTime<Local>) -> usize;

    /// Configured limits
    fn limits(&self) -> &QuotaLimits;
}

/// Process-local store; all state is lost on restart
pub struct InMemoryUsageStore {
    limits: QuotaLimits,
    records: Mutex<HashMap<String, UsageRecord>>,
}

impl InMemoryUsageStore {
    pub fn new(limits: QuotaLimits) -> Self {
        Self {
            limits,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Number of identities currently tracked
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for InMemoryUsageStore {
    fn default() -> Self {
        Self::new(QuotaLimits::default())
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn snapshot(&self, identity: &str, now: DateTime<Local>) -> UsageSnapshot {
        let records = self.records.lock();
        match records.get(identity) {
            Some(record) => record.snapshot(&self.limits, now),
            None => UsageSnapshot::empty(&self.limits, now),
        }
    }

    async fn try_consume(&self, identity: &str, tier: Tier, now: DateTime<Local>) -> QuotaDecision {
        let limit = self.limits.for_tier(tier);
        let mut records = self.records.lock();
        let record = records
            .entry(identity.to_string())
            .or_insert_with(|| UsageRecord::new(now));

        record.standard.roll(now);
        record.detailed.roll(now);

        let counter = record.counter_mut(tier);
        if counter.count >= limit {
            debug!(tier = %tier, used = counter.count, limit, "Daily quota exhausted");
            return QuotaDecision::Rejected(record.snapshot(&self.limits, now));
        }

        counter.count += 1;
        QuotaDecision::Accepted(record.snapshot(&self.limits, now))
    }

    async fn prune(&self, now: DateTime<Local>) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| !record.is_stale(now));
        before - records.len()
    }

    fn limits(&self) -> &QuotaLimits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, day, hour, 0, 0).single().unwrap()
    }

    #[tokio::test]
    async fn test_fourth_standard_check_is_rejected() {
        let store = InMemoryUsageStore::default();

        for expected_used in 1..=3 {
            let decision = store.try_consume("203.0.113.7", Tier::Standard, at(10, 9)).await;
            assert!(decision.is_accepted());
            assert_eq!(decision.snapshot().standard.used, expected_used);
        }

        let decision = store.try_consume("203.0.113.7", Tier::Standard, at(10, 18)).await;
        assert!(!decision.is_accepted());
        assert_eq!(decision.snapshot().standard.used, 3);
        assert_eq!(decision.snapshot().standard.remaining, 0);
    }

    #[tokio::test]
    async fn test_counters_reset_after_midnight() {
        let store = InMemoryUsageStore::default();
        for _ in 0..3 {
            store.try_consume("a", Tier::Standard, at(10, 9)).await;
        }

        let snapshot = store.snapshot("a", at(11, 0)).await;
        assert_eq!(snapshot.standard.used, 0);

        let decision = store.try_consume("a", Tier::Standard, at(11, 8)).await;
        assert!(decision.is_accepted());
        assert_eq!(decision.snapshot().standard.used, 1);
    }

    #[tokio::test]
    async fn test_tiers_are_independent() {
        let store = InMemoryUsageStore::default();

        assert!(store.try_consume("a", Tier::Detailed, at(10, 9)).await.is_accepted());
        assert!(!store.try_consume("a", Tier::Detailed, at(10, 9)).await.is_accepted());

        let decision = store.try_consume("a", Tier::Standard, at(10, 9)).await;
        assert!(decision.is_accepted());
        assert_eq!(decision.snapshot().detailed.used, 1);
        assert_eq!(decision.snapshot().detailed.remaining, 0);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let store = InMemoryUsageStore::new(QuotaLimits {
            standard_per_day: 1,
            detailed_per_day: 1,
        });

        assert!(store.try_consume("a", Tier::Standard, at(10, 9)).await.is_accepted());
        assert!(store.try_consume("b", Tier::Standard, at(10, 9)).await.is_accepted());
        assert!(!store.try_consume("a", Tier::Standard, at(10, 9)).await.is_accepted());
    }

    #[tokio::test]
    async fn test_snapshot_does_not_mutate() {
        let store = InMemoryUsageStore::default();

        let snapshot = store.snapshot("new", at(10, 9)).await;
        assert_eq!(snapshot.standard.used, 0);
        assert_eq!(snapshot.standard.remaining, 3);
        assert!(store.is_empty());

        store.try_consume("new", Tier::Standard, at(10, 9)).await;
        store.snapshot("new", at(10, 10)).await;
        assert_eq!(store.snapshot("new", at(10, 11)).await.standard.used, 1);
    }

    #[tokio::test]
    async fn test_zero_limit_always_rejects() {
        let store = InMemoryUsageStore::new(QuotaLimits {
            standard_per_day: 0,
            detailed_per_day: 0,
        });
        let decision = store.try_consume("a", Tier::Detailed, at(10, 9)).await;
        assert!(!decision.is_accepted());
        assert_eq!(decision.snapshot().detailed.remaining, 0);
    }

    #[tokio::test]
    async fn test_prune_drops_stale_records() {
        let store = InMemoryUsageStore::default();
        store.try_consume("yesterday", Tier::Standard, at(10, 9)).await;
        store.try_consume("today", Tier::Standard, at(11, 9)).await;
        assert_eq!(store.len(), 2);

        assert_eq!(store.prune(at(11, 10)).await, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot("today", at(11, 10)).await.standard.used, 1);
    }
}
