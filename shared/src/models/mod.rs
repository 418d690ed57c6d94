//! Data models
//!
//! Shared between cheers-server and the web client (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.

pub mod board;
pub mod inventory;
pub mod ledger;
pub mod sticker;

// Re-exports
pub use board::*;
pub use inventory::*;
pub use ledger::*;
pub use sticker::*;
