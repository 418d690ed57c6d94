//! 操作账本 (Operation Ledger)
//!
//! 每个带 `opId` 的变更请求对应一条账本条目：
//!
//! ```text
//! pending ──complete──▶ completed   (终态，永不重放)
//!    │
//!    └────fail────────▶ failed      (终态，可用同一 opId 重试)
//! ```
//!
//! - [`decide`] - 决策表 (cached / in progress / proceed)
//! - [`redact`] - 请求快照脱敏
//! - [`LedgerSweeper`] - 保留期清理任务
//!
//! 存储层见 [`crate::db::repository::ledger`]。

pub mod decision;
pub mod redact;
pub mod retention;

pub use decision::{LedgerDecision, decide};
pub use redact::redact;
pub use retention::LedgerSweeper;

/// Lease on a ledger entry held by the current request
///
/// Inserted into request extensions by the idempotency gate and carried into
/// the unit of work, where terminal writes are fenced by `epoch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTicket {
    pub entry_id: i64,
    pub op_id: String,
    /// Lease owner (request correlation id)
    pub owner: String,
    pub epoch: i64,
}
