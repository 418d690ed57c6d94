//! 库存消耗策略
//!
//! - [`InventoryService`] - 发放 / 撤回 / 管理员移除（账本状态机）
//! - [`BoardService`] - 贴纸板更新与放置消耗
//! - [`placement`] - 非所有者单次放置与所有者追加的消耗规则

pub mod board_update;
pub mod grant;
pub mod placement;

pub use board_update::{BoardService, BoardUpdated};
pub use grant::{GrantApplied, GrantCommand, GrantKind, GrantOutcome, InventoryService};
pub use placement::{
    ConsumeOutcome, ConsumedCredit, consume_for_non_owner_placement, consume_if_appending,
};
