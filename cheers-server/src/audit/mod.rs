//! 审计日志模块：防篡改的事件追踪
//!
//! # 架构
//!
//! ```text
//! 业务提交后
//!   ├─ AuditService::emit() → try_send → AuditWorker → SQLite (audit_log)
//!   └─ AuditService::log_sync() → SQLite (启动/关闭场景)
//!
//! SHA256 哈希链: genesis → entry₁ → entry₂ → ... → entryₙ
//! ```
//!
//! `emit` 是尽力而为：通道满时丢弃并告警，永不阻塞或回滚业务操作。

pub mod service;
pub mod storage;
pub mod types;
pub mod worker;

pub use service::AuditService;
pub use storage::{AuditRecord, AuditStorage, AuditStorageError};
pub use types::{
    AuditAction, AuditChainBreak, AuditChainVerification, AuditEntry, AuditListResponse,
    AuditQuery,
};
pub use worker::AuditWorker;
