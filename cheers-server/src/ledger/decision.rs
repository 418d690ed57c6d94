//! Ledger decision table
//!
//! | Entry | Decision |
//! |-------|----------|
//! | none | [`LedgerDecision::Proceed`] (insert pending) |
//! | completed | [`LedgerDecision::Cached`] |
//! | pending, lease live, other owner | [`LedgerDecision::InProgress`] |
//! | pending, lease live, same owner | [`LedgerDecision::Proceed`] |
//! | pending, lease expired | [`LedgerDecision::Proceed`] (reclaim) |
//! | failed | [`LedgerDecision::Proceed`] (retry) |

use shared::models::{CachedAck, LedgerEntry, OperationStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerDecision {
    Proceed,
    Cached(CachedAck),
    InProgress { retry_after_ms: i64 },
}

/// Apply the decision table to the current entry for an opId
pub fn decide(entry: Option<&LedgerEntry>, now: i64, owner: &str) -> LedgerDecision {
    let Some(entry) = entry else {
        return LedgerDecision::Proceed;
    };

    match entry.status {
        OperationStatus::Completed => LedgerDecision::Cached(CachedAck::new(entry.op_id.clone())),
        OperationStatus::Failed => LedgerDecision::Proceed,
        OperationStatus::Pending => match entry.lease_remaining_ms(now) {
            Some(_) if entry.lock_owner.as_deref() == Some(owner) => LedgerDecision::Proceed,
            Some(retry_after_ms) => LedgerDecision::InProgress { retry_after_ms },
            None => LedgerDecision::Proceed,
        },
    }
}
