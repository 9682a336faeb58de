//! Rolling abnormal-observation counters.
//!
//! Every abnormal observation bumps `alarm_num` in day, week, and month
//! hashes for its customer, for the aggregate "ALL" customer, and for its
//! site. The operator's processed flow bumps `processed_num` in the same
//! hashes, so a window's open abnormal count is `alarm_num - processed_num`.
//! Hashes expire at their window boundary; an expired hash simply reads as
//! zero.

pub mod memory;
pub mod redis_counters;
pub mod window;

pub use memory::MemoryCounterStore;
pub use redis_counters::RedisCounterStore;
pub use window::{window_boundary, window_expire_at, WindowKind};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};

use sensor_core::{Result, SensorMeta};
use telemetry::metrics;

/// Aggregate scope id mirroring every customer bump.
pub const ALL_CUSTOMERS: &str = "ALL";

const FIELD_ALARM_NUM: &str = "alarm_num";
const FIELD_PROCESSED_NUM: &str = "processed_num";

/// Counter aggregation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterScope {
    Customer,
    Site,
}

impl CounterScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Site => "site",
        }
    }
}

fn window_key(scope: CounterScope, scope_id: &str, window: WindowKind) -> String {
    format!("abnormal_count:{}:{}:{}", scope.as_str(), scope_id, window.as_str())
}

fn unprocessed_key(site_id: &str) -> String {
    format!("site_unprocessed_num:{site_id}")
}

/// Backing store for counter hashes and plain tallies.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments `field` in the hash at `key` and, only when the hash has
    /// no expiry yet, sets it to expire at `expire_at` (unix seconds). The
    /// increment and the expiry check are one atomic step.
    async fn bump_windowed(&self, key: &str, field: &str, delta: i64, expire_at: i64)
        -> Result<i64>;

    /// Increments a plain integer tally with no expiry.
    async fn incr(&self, key: &str, delta: i64) -> Result<i64>;

    /// Reads a hash field, zero when the hash or field is absent.
    async fn get_field(&self, key: &str, field: &str) -> Result<i64>;

    /// Reads a plain tally, zero when absent.
    async fn get(&self, key: &str) -> Result<i64>;
}

/// Counts read back from one window hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowCounts {
    pub alarm_num: i64,
    pub processed_num: i64,
}

/// Facade over a [`CounterStore`] implementing the bump fan-out.
pub struct AbnormalCounters {
    store: Arc<dyn CounterStore>,
}

impl AbnormalCounters {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    fn scopes<'a>(meta_customer: &'a str, meta_site: &'a str) -> [(CounterScope, &'a str); 3] {
        [
            (CounterScope::Customer, meta_customer),
            (CounterScope::Customer, ALL_CUSTOMERS),
            (CounterScope::Site, meta_site),
        ]
    }

    async fn bump_all<Tz: TimeZone>(
        &self,
        customer_id: &str,
        site_id: &str,
        field: &str,
        delta: i64,
        now: &DateTime<Tz>,
    ) -> Result<()> {
        for (scope, scope_id) in Self::scopes(customer_id, site_id) {
            for window in WindowKind::ALL {
                let key = window_key(scope, scope_id, window);
                let expire_at = window_expire_at(now, window);
                self.store
                    .bump_windowed(&key, field, delta, expire_at)
                    .await
                    .map_err(|e| {
                        metrics().counter_errors.inc();
                        e
                    })?;
            }
        }
        Ok(())
    }

    /// Records one abnormal observation: `alarm_num` in every window for the
    /// customer, the "ALL" aggregate, and the site.
    pub async fn record_abnormal<Tz: TimeZone>(
        &self,
        meta: &SensorMeta,
        now: &DateTime<Tz>,
    ) -> Result<()> {
        self.bump_all(&meta.customer_id, &meta.site_id, FIELD_ALARM_NUM, 1, now)
            .await?;
        metrics().abnormal_bumps.inc();
        Ok(())
    }

    /// Bumps the site's unprocessed tally for a freshly inserted alarm
    /// record. Every record counts, whatever its level; only the operator's
    /// processed flow brings the tally back down.
    pub async fn note_alarm_recorded(&self, site_id: &str) -> Result<()> {
        self.store
            .incr(&unprocessed_key(site_id), 1)
            .await
            .map_err(|e| {
                metrics().counter_errors.inc();
                e
            })?;
        Ok(())
    }

    /// Operator callback: `delta` alarms were marked processed. Bumps
    /// `processed_num` across the same scopes and offsets the site's
    /// unprocessed tally.
    pub async fn record_processed<Tz: TimeZone>(
        &self,
        customer_id: &str,
        site_id: &str,
        delta: i64,
        now: &DateTime<Tz>,
    ) -> Result<()> {
        self.bump_all(customer_id, site_id, FIELD_PROCESSED_NUM, delta, now)
            .await?;
        self.store
            .incr(&unprocessed_key(site_id), -delta)
            .await
            .map_err(|e| {
                metrics().counter_errors.inc();
                e
            })?;
        Ok(())
    }

    /// Reads one window hash for a scope.
    pub async fn counts(
        &self,
        scope: CounterScope,
        scope_id: &str,
        window: WindowKind,
    ) -> Result<WindowCounts> {
        let key = window_key(scope, scope_id, window);
        Ok(WindowCounts {
            alarm_num: self.store.get_field(&key, FIELD_ALARM_NUM).await?,
            processed_num: self.store.get_field(&key, FIELD_PROCESSED_NUM).await?,
        })
    }

    /// Reads a site's unprocessed alarm tally.
    pub async fn site_unprocessed(&self, site_id: &str) -> Result<i64> {
        self.store.get(&unprocessed_key(site_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta() -> SensorMeta {
        SensorMeta {
            customer_id: "c1".into(),
            site_id: "s1".into(),
            equipment_id: "e1".into(),
            point_id: "p1".into(),
        }
    }

    fn counters() -> AbnormalCounters {
        AbnormalCounters::new(Arc::new(MemoryCounterStore::new()))
    }

    #[tokio::test]
    async fn test_abnormal_bumps_every_scope_and_window() {
        let counters = counters();
        let now = Utc::now();
        for _ in 0..2 {
            counters.record_abnormal(&meta(), &now).await.unwrap();
            counters.note_alarm_recorded("s1").await.unwrap();
        }

        for window in WindowKind::ALL {
            for (scope, id) in [
                (CounterScope::Customer, "c1"),
                (CounterScope::Customer, ALL_CUSTOMERS),
                (CounterScope::Site, "s1"),
            ] {
                let counts = counters.counts(scope, id, window).await.unwrap();
                assert_eq!(counts.alarm_num, 2);
                assert_eq!(counts.processed_num, 0);
            }
        }
        assert_eq!(counters.site_unprocessed("s1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_processed_offsets_but_never_erases_alarm_num() {
        let counters = counters();
        let now = Utc::now();
        for _ in 0..3 {
            counters.record_abnormal(&meta(), &now).await.unwrap();
            counters.note_alarm_recorded("s1").await.unwrap();
        }
        counters.record_processed("c1", "s1", 2, &now).await.unwrap();

        let counts = counters
            .counts(CounterScope::Customer, "c1", WindowKind::Day)
            .await
            .unwrap();
        assert_eq!(counts.alarm_num, 3);
        assert_eq!(counts.processed_num, 2);
        assert_eq!(counters.site_unprocessed("s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_customers_do_not_share_counters_but_all_aggregates() {
        let counters = counters();
        let now = Utc::now();
        let mut other = meta();
        other.customer_id = "c2".into();
        other.site_id = "s2".into();

        counters.record_abnormal(&meta(), &now).await.unwrap();
        counters.record_abnormal(&other, &now).await.unwrap();

        let c1 = counters
            .counts(CounterScope::Customer, "c1", WindowKind::Week)
            .await
            .unwrap();
        let all = counters
            .counts(CounterScope::Customer, ALL_CUSTOMERS, WindowKind::Week)
            .await
            .unwrap();
        assert_eq!(c1.alarm_num, 1);
        assert_eq!(all.alarm_num, 2);
    }
}
