use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::NaiveDate;

use super::domain::UserId;

/// Process-wide record of how many times an identity has been rostered on a given
/// calendar date. The selection lottery reads it to bias future draws toward
/// less-frequently selected identities, and increments it once per roster member
/// when a recruitment closes.
///
/// Injectable so tests can pre-seed counts and assert exact lottery behavior.
pub trait ParticipationLedger: Send + Sync {
    /// Times the identity has been rostered on the date. Zero when never recorded.
    fn daily_count(&self, date: NaiveDate, identity: &UserId) -> u32;

    /// Record one more roster selection for the identity on the date. Must be
    /// atomic per key.
    fn record(&self, date: NaiveDate, identity: &UserId);
}

/// Default ledger: an in-process map that lives for the whole process. Entries are
/// created lazily and never evicted.
#[derive(Debug, Default)]
pub struct InMemoryParticipationLedger {
    counts: Mutex<HashMap<(NaiveDate, UserId), u32>>,
}

impl InMemoryParticipationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every count recorded for a date, keyed by identity.
    pub fn counts_for(&self, date: NaiveDate) -> BTreeMap<UserId, u32> {
        let guard = self.counts.lock().expect("ledger mutex poisoned");
        guard
            .iter()
            .filter(|((entry_date, _), _)| *entry_date == date)
            .map(|((_, identity), count)| (identity.clone(), *count))
            .collect()
    }
}

impl ParticipationLedger for InMemoryParticipationLedger {
    fn daily_count(&self, date: NaiveDate, identity: &UserId) -> u32 {
        let guard = self.counts.lock().expect("ledger mutex poisoned");
        guard.get(&(date, identity.clone())).copied().unwrap_or(0)
    }

    fn record(&self, date: NaiveDate, identity: &UserId) {
        let mut guard = self.counts.lock().expect("ledger mutex poisoned");
        *guard.entry((date, identity.clone())).or_insert(0) += 1;
    }
}
