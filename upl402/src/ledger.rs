//! Spending tracker: hourly budget, payment history, lifetime metrics.
//!
//! One tracker exists per wallet session. Records are append-only and
//! queryable newest-first; metrics are folded in on every append rather than
//! recomputed from history, so reads stay O(1) no matter how long the
//! session runs. Hour buckets older than the retention window are evicted
//! after every write, bounding memory.
//!
//! The tracker is deliberately not synchronized. Its owner must either keep
//! it on a single task or wrap it in a mutex and serialize whole payment
//! cycles, otherwise the budget's read-then-write can under-count spend.

use crate::amount::Amount;
use crate::timestamp::{UnixMillis, UnixTimestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How many hour buckets of spending data are retained.
pub const HOURLY_RETENTION_BUCKETS: u64 = 24;

/// Whether a payment left or entered the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Funds left the wallet.
    Sent,
    /// Funds entered the wallet.
    Received,
}

/// An append-only ledger entry, never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    /// On-chain transaction signature, when one exists for this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// When the entry was recorded, in milliseconds.
    pub timestamp: UnixMillis,
    /// Decimal amount in the asset's native precision.
    pub amount: Amount,
    /// Asset the amount is denominated in.
    pub asset: String,
    /// Whether the wallet paid or was paid.
    pub direction: Direction,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
}

/// Lifetime aggregates over all records of a session.
///
/// Maintained incrementally: `net_profit == total_earned - total_spent`
/// holds after every append by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetrics {
    /// Sum of all sent amounts.
    pub total_spent: Decimal,
    /// Sum of all received amounts.
    pub total_earned: Decimal,
    /// `total_earned - total_spent`; negative when the session runs at a loss.
    pub net_profit: Decimal,
    /// Number of recorded payments, both directions.
    pub transaction_count: u64,
    /// Running `total_spent / transaction_count`.
    pub average_cost: Decimal,
}

/// Per-wallet spending state: hourly budget, history, and metrics.
#[derive(Debug)]
pub struct SpendingTracker {
    wallet: String,
    hourly_limit: Option<Decimal>,
    metrics: PaymentMetrics,
    history: Vec<PaymentRecord>,
    hourly: HashMap<u64, Decimal>,
}

impl SpendingTracker {
    /// Creates a tracker for the given wallet address.
    ///
    /// `hourly_limit` of `None` disables budget enforcement; queries then
    /// report an unlimited remaining budget.
    #[must_use]
    pub fn new(wallet: impl Into<String>, hourly_limit: Option<Decimal>) -> Self {
        Self {
            wallet: wallet.into(),
            hourly_limit,
            metrics: PaymentMetrics::default(),
            history: Vec::new(),
            hourly: HashMap::new(),
        }
    }

    /// Records a completed transfer or received payment.
    ///
    /// Updates the current hour bucket (sent only), folds the amount into
    /// the lifetime metrics, appends a [`PaymentRecord`], and evicts buckets
    /// older than [`HOURLY_RETENTION_BUCKETS`].
    pub fn track(
        &mut self,
        amount: Amount,
        asset: &str,
        direction: Direction,
        counterparty: &str,
        signature: Option<String>,
    ) {
        self.track_at(
            UnixTimestamp::now(),
            UnixMillis::now(),
            amount,
            asset,
            direction,
            counterparty,
            signature,
        );
    }

    /// Records an inbound payment from `from`, for sessions that earn as
    /// well as spend.
    pub fn record_earnings(&mut self, amount: Amount, asset: &str, from: &str) {
        self.track(amount, asset, Direction::Received, from, None);
    }

    /// Amount spent in the current wall-clock hour.
    #[must_use]
    pub fn spent_this_hour(&self) -> Decimal {
        self.spent_in_bucket(UnixTimestamp::now().hour_bucket())
    }

    /// Budget left in the current hour, clamped at zero.
    ///
    /// Returns `None` when no hourly limit is configured.
    #[must_use]
    pub fn remaining_hourly_budget(&self) -> Option<Decimal> {
        self.hourly_limit
            .map(|limit| std::cmp::max(Decimal::ZERO, limit - self.spent_this_hour()))
    }

    /// Current lifetime metrics.
    #[must_use]
    pub const fn metrics(&self) -> PaymentMetrics {
        self.metrics
    }

    /// Records newest-first, optionally truncated to `limit`.
    #[must_use]
    pub fn history(&self, limit: Option<usize>) -> Vec<PaymentRecord> {
        let mut records: Vec<PaymentRecord> = self.history.iter().rev().cloned().collect();
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        records
    }

    /// The wallet address this tracker belongs to.
    #[must_use]
    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    fn spent_in_bucket(&self, bucket: u64) -> Decimal {
        self.hourly.get(&bucket).copied().unwrap_or_default()
    }

    #[allow(clippy::too_many_arguments)]
    fn track_at(
        &mut self,
        now: UnixTimestamp,
        recorded_at: UnixMillis,
        amount: Amount,
        asset: &str,
        direction: Direction,
        counterparty: &str,
        signature: Option<String>,
    ) {
        let bucket = now.hour_bucket();
        let value = amount.as_decimal();

        match direction {
            Direction::Sent => {
                self.metrics.total_spent += value;
                *self.hourly.entry(bucket).or_default() += value;
            }
            Direction::Received => self.metrics.total_earned += value,
        }
        self.metrics.net_profit = self.metrics.total_earned - self.metrics.total_spent;
        self.metrics.transaction_count += 1;
        self.metrics.average_cost =
            self.metrics.total_spent / Decimal::from(self.metrics.transaction_count);

        let (from, to) = match direction {
            Direction::Sent => (self.wallet.clone(), counterparty.to_string()),
            Direction::Received => (counterparty.to_string(), self.wallet.clone()),
        };
        self.history.push(PaymentRecord {
            signature,
            timestamp: recorded_at,
            amount,
            asset: asset.to_string(),
            direction,
            from,
            to,
        });

        #[cfg(feature = "telemetry")]
        tracing::trace!(%amount, asset, ?direction, "Recorded payment");

        self.evict_stale(bucket);
    }

    fn evict_stale(&mut self, current_bucket: u64) {
        let cutoff = current_bucket.saturating_sub(HOURLY_RETENTION_BUCKETS);
        self.hourly.retain(|&bucket, _| bucket >= cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "GqTPL6qRf5aUuqscLh8Rg2HTxPUXfhhAXDptNLLmWSd7";

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn track_in_hour(tracker: &mut SpendingTracker, hour: u64, value: &str, direction: Direction) {
        tracker.track_at(
            UnixTimestamp::from_secs(hour * 3600),
            UnixMillis::from_millis(hour * 3_600_000),
            amount(value),
            "SOL",
            direction,
            "CounterpartyAddr",
            None,
        );
    }

    #[test]
    fn test_net_profit_invariant_holds_after_every_call() {
        let mut tracker = SpendingTracker::new(WALLET, None);
        let calls = [
            ("0.5", Direction::Sent),
            ("1.25", Direction::Received),
            ("0.01", Direction::Sent),
            ("0.01", Direction::Sent),
            ("2", Direction::Received),
        ];
        for (value, direction) in calls {
            track_in_hour(&mut tracker, 100, value, direction);
            let m = tracker.metrics();
            assert_eq!(m.net_profit, m.total_earned - m.total_spent);
        }
        let m = tracker.metrics();
        assert_eq!(m.transaction_count, 5);
        assert_eq!(m.total_spent, "0.52".parse().unwrap());
        assert_eq!(m.total_earned, "3.25".parse().unwrap());
    }

    #[test]
    fn test_average_cost_tracks_spent_only() {
        let mut tracker = SpendingTracker::new(WALLET, None);
        track_in_hour(&mut tracker, 100, "0.3", Direction::Sent);
        track_in_hour(&mut tracker, 100, "0.1", Direction::Sent);
        assert_eq!(tracker.metrics().average_cost, "0.2".parse().unwrap());
    }

    #[test]
    fn test_hour_buckets_evicted_after_retention() {
        let mut tracker = SpendingTracker::new(WALLET, None);
        track_in_hour(&mut tracker, 100, "0.1", Direction::Sent);
        track_in_hour(&mut tracker, 110, "0.1", Direction::Sent);
        // 25 hours after the first write: bucket 100 must be gone.
        track_in_hour(&mut tracker, 125, "0.1", Direction::Sent);
        assert_eq!(tracker.spent_in_bucket(100), Decimal::ZERO);
        assert_eq!(tracker.spent_in_bucket(110), "0.1".parse().unwrap());
        assert_eq!(tracker.spent_in_bucket(125), "0.1".parse().unwrap());
    }

    #[test]
    fn test_spent_accumulates_within_bucket() {
        let mut tracker = SpendingTracker::new(WALLET, None);
        track_in_hour(&mut tracker, 42, "0.1", Direction::Sent);
        track_in_hour(&mut tracker, 42, "0.25", Direction::Sent);
        // Received amounts never count against the budget.
        track_in_hour(&mut tracker, 42, "5", Direction::Received);
        assert_eq!(tracker.spent_in_bucket(42), "0.35".parse().unwrap());
    }

    #[test]
    fn test_remaining_budget_clamps_at_zero() {
        let mut tracker = SpendingTracker::new(WALLET, Some("0.1".parse().unwrap()));
        let current = UnixTimestamp::now().hour_bucket();
        track_in_hour(&mut tracker, current, "0.3", Direction::Sent);
        assert_eq!(tracker.remaining_hourly_budget(), Some(Decimal::ZERO));
    }

    #[test]
    fn test_remaining_budget_unlimited_without_limit() {
        let tracker = SpendingTracker::new(WALLET, None);
        assert_eq!(tracker.remaining_hourly_budget(), None);
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut tracker = SpendingTracker::new(WALLET, None);
        track_in_hour(&mut tracker, 1, "0.1", Direction::Sent);
        track_in_hour(&mut tracker, 2, "0.2", Direction::Sent);
        track_in_hour(&mut tracker, 3, "0.3", Direction::Sent);
        let records = tracker.history(Some(2));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].amount, amount("0.3"));
        assert_eq!(records[1].amount, amount("0.2"));
    }

    #[test]
    fn test_record_addresses_follow_direction() {
        let mut tracker = SpendingTracker::new(WALLET, None);
        tracker.track(amount("0.1"), "SOL", Direction::Sent, "Payee111", None);
        tracker.record_earnings(amount("0.2"), "SOL", "Payer222");
        let records = tracker.history(None);
        assert_eq!(records[1].from, WALLET);
        assert_eq!(records[1].to, "Payee111");
        assert_eq!(records[0].from, "Payer222");
        assert_eq!(records[0].to, WALLET);
    }
}
