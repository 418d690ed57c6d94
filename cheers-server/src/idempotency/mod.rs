//! 幂等门 (IdempotencyGate)
//!
//! 对受保护的变更路由应用账本决策表，见 [`gate`]。

pub mod gate;

pub use gate::{IdempotencyGuard, REQUEST_ID_HEADER, idempotency_gate};
