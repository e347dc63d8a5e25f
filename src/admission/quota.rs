//! Per-sender daily token ledger.
//!
//! Each sender owns one record guarded by its own async mutex, so the
//! read-check-commit sequence for a given sender is a sender-scoped critical
//! section while distinct senders proceed fully in parallel. Records roll
//! over implicitly when the UTC day key changes; stale-day contents are
//! simply overwritten on the first request of the new day.

use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Usage record for one (sender, day) pair
#[derive(Debug)]
pub struct DayUsage {
    day: NaiveDate,
    tokens_used: u64,
}

impl DayUsage {
    fn new(day: NaiveDate) -> Self {
        Self {
            day,
            tokens_used: 0,
        }
    }

    /// Reset the record if the day key has rolled over
    pub fn roll_to(&mut self, day: NaiveDate) {
        if self.day != day {
            self.day = day;
            self.tokens_used = 0;
        }
    }

    /// Tokens committed for `day`; a record holding a stale day reads as 0
    pub fn used_on(&self, day: NaiveDate) -> u64 {
        if self.day == day {
            self.tokens_used
        } else {
            0
        }
    }

    /// Commit tokens to the record. Callers must hold the sender lock and
    /// have rolled the record to the current day first.
    pub fn commit(&mut self, tokens: u64) {
        self.tokens_used += tokens;
    }
}

/// Per-sender ledger of daily token usage
pub struct QuotaLedger {
    senders: DashMap<String, Arc<Mutex<DayUsage>>>,
}

impl QuotaLedger {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Get or create the lock cell for a sender.
    ///
    /// The map guard is dropped before returning so callers can hold the
    /// sender mutex across await points without pinning a shard.
    pub fn cell(&self, sender: &str, day: NaiveDate) -> Arc<Mutex<DayUsage>> {
        self.senders
            .entry(sender.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(DayUsage::new(day))))
            .clone()
    }

    /// Tokens the sender has committed on `day`. Pure read.
    pub async fn used_on(&self, sender: &str, day: NaiveDate) -> u64 {
        // The map guard must be gone before the lock is awaited, or the
        // shard stays read-locked while the sender's mutex is contended
        // and any entry() on that shard blocks its worker thread.
        let cell = self.senders.get(sender).map(|c| c.clone());
        match cell {
            Some(cell) => cell.lock().await.used_on(day),
            None => 0,
        }
    }

    /// Number of senders with a record (live or stale)
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Drop records whose day key is older than `day`. Stale records are
    /// never read again, so this only bounds memory.
    pub async fn gc(&self, day: NaiveDate) {
        // Snapshot the cells first; iterating holds shard guards, which
        // must not span the lock awaits below.
        let cells: Vec<(String, Arc<Mutex<DayUsage>>)> = self
            .senders
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut stale = Vec::new();
        for (sender, cell) in cells {
            if cell.lock().await.day < day {
                stale.push(sender);
            }
        }
        for sender in stale {
            self.senders.remove(&sender);
        }
    }
}

impl Default for QuotaLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_unknown_sender_reads_zero() {
        let ledger = QuotaLedger::new();
        assert_eq!(ledger.used_on("nobody", day("2026-08-25")).await, 0);
    }

    #[tokio::test]
    async fn test_commit_and_read() {
        let ledger = QuotaLedger::new();
        let today = day("2026-08-25");

        let cell = ledger.cell("alice", today);
        {
            let mut usage = cell.lock().await;
            usage.roll_to(today);
            usage.commit(500);
        }

        assert_eq!(ledger.used_on("alice", today).await, 500);
        assert_eq!(ledger.used_on("bob", today).await, 0);
    }

    #[tokio::test]
    async fn test_day_rollover_resets() {
        let ledger = QuotaLedger::new();
        let monday = day("2026-08-24");
        let tuesday = day("2026-08-25");

        let cell = ledger.cell("alice", monday);
        {
            let mut usage = cell.lock().await;
            usage.roll_to(monday);
            usage.commit(900);
        }
        assert_eq!(ledger.used_on("alice", monday).await, 900);

        // A stale-day record reads as zero for the new day
        assert_eq!(ledger.used_on("alice", tuesday).await, 0);

        // And commits on the new day start from zero
        {
            let mut usage = cell.lock().await;
            usage.roll_to(tuesday);
            usage.commit(100);
        }
        assert_eq!(ledger.used_on("alice", tuesday).await, 100);
    }

    #[tokio::test]
    async fn test_gc_drops_stale_records() {
        let ledger = QuotaLedger::new();
        let monday = day("2026-08-24");
        let tuesday = day("2026-08-25");

        ledger.cell("old", monday);
        let fresh = ledger.cell("fresh", tuesday);
        {
            let mut usage = fresh.lock().await;
            usage.roll_to(tuesday);
            usage.commit(10);
        }

        ledger.gc(tuesday).await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.used_on("fresh", tuesday).await, 10);
    }
}
