//! Cheers Server - 注射打卡社交应用的贴纸账本服务
//!
//! # 架构概述
//!
//! ```text
//! IdempotencyGate → OperationLedger (decide) → UnitOfWork
//!     → InventoryConsumptionPolicy → OperationLedger (finalize) → AuditSink
//! ```
//!
//! # 模块结构
//!
//! ```text
//! cheers-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── auth/          # JWT 校验、管理员、限流
//! ├── db/            # SQLite、仓储、工作单元
//! ├── ledger/        # 决策表、脱敏、保留期清理
//! ├── idempotency/   # 幂等门中间件
//! ├── inventory/     # 发放/撤回、放置消耗
//! ├── audit/         # 哈希链审计日志
//! ├── middleware/    # 访问日志
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod audit;
pub mod auth;
pub mod core;
pub mod db;
pub mod idempotency;
pub mod inventory;
pub mod ledger;
pub mod middleware;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState, build_app};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro - 支持 tracing 格式说明符
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// 设置运行环境：创建工作目录、初始化日志
pub fn setup_environment(config: &Config) -> std::io::Result<()> {
    std::fs::create_dir_all(&config.work_dir)?;
    init_logger_with_file(
        Some(&config.log_level),
        config.log_json,
        config.log_dir.as_deref(),
    );
    Ok(())
}
