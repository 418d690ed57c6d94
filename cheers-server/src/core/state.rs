use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::audit::{AuditRecord, AuditService, AuditWorker};
use crate::auth::{JwtService, RateLimiter};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result, ServerError};
use crate::db::{Capabilities, DbService, UnitOfWork};
use crate::inventory::{BoardService, InventoryService};
use crate::ledger::LedgerSweeper;

const RATE_LIMIT_SWEEP: Duration = Duration::from_secs(300);

/// 服务器状态 - 持有所有服务的共享引用
///
/// Clone 是浅拷贝（内部均为 Arc / 连接池句柄）。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | pool | SQLite 连接池 |
/// | uow | 工作单元（缓存的事务能力） |
/// | jwt_service | 令牌校验 |
/// | audit | 审计服务（fire-and-forget） |
/// | rate_limiter | 每用户限流状态 |
/// | inventory / boards | 库存与贴纸板业务服务 |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub pool: SqlitePool,
    pub uow: UnitOfWork,
    pub jwt_service: Arc<JwtService>,
    pub audit: Arc<AuditService>,
    pub rate_limiter: RateLimiter,
    pub inventory: InventoryService,
    pub boards: BoardService,
    /// 审计通道接收端，启动后台任务时取走
    audit_rx: Arc<Mutex<Option<mpsc::Receiver<AuditRecord>>>>,
}

impl ServerState {
    /// 打开数据库、探测事务能力并组装所有服务
    pub async fn initialize(config: &Config) -> Result<Self> {
        if config.is_production() && config.jwt.uses_fallback_secret() {
            return Err(ServerError::Config(
                "JWT_SECRET must be set in production".to_string(),
            ));
        }

        if let Some(parent) = std::path::Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = DbService::new(&config.database_path, config.db_max_connections).await?;
        Self::with_database(config.clone(), db).await
    }

    /// 基于已打开的数据库组装状态（测试使用内存库）
    pub async fn with_database(config: Config, db: DbService) -> Result<Self> {
        let pool = db.pool;
        let capabilities = Capabilities::probe(&pool, config.transaction_mode).await?;
        let uow = UnitOfWork::new(pool.clone(), capabilities);

        let (audit, audit_rx) = AuditService::new(pool.clone(), config.audit_buffer_size);
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);
        let inventory = InventoryService::new(uow.clone(), audit.clone(), config.lease_ttl_ms);
        let boards = BoardService::new(uow.clone(), audit.clone());

        tracing::info!(
            transactions = capabilities.transactions,
            lease_ttl_ms = config.lease_ttl_ms,
            environment = %config.environment,
            "Server state initialized"
        );

        Ok(Self {
            config,
            pool,
            uow,
            jwt_service,
            audit,
            rate_limiter,
            inventory,
            boards,
            audit_rx: Arc::new(Mutex::new(Some(audit_rx))),
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        self.uow.capabilities()
    }

    /// 启动后台任务：审计写入、账本保留期清理、限流窗口清理
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let audit_rx = self.audit_rx.lock().ok().and_then(|mut rx| rx.take());
        match audit_rx {
            Some(rx) => {
                let worker = AuditWorker::new(self.audit.storage().clone());
                let token = tasks.shutdown_token();
                tasks.spawn("audit_worker", TaskKind::Worker, worker.run(rx, token));
            }
            None => tracing::warn!("Audit worker already started"),
        }

        let sweeper = LedgerSweeper::new(
            self.pool.clone(),
            self.config.ledger_retention_ms(),
            Duration::from_secs(self.config.ledger_sweep_interval_secs.max(1)),
            tasks.shutdown_token(),
        );
        tasks.spawn("ledger_sweeper", TaskKind::Periodic, sweeper.run());

        let limiter = self.rate_limiter.clone();
        let token = tasks.shutdown_token();
        tasks.spawn("rate_limit_cleanup", TaskKind::Periodic, async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(RATE_LIMIT_SWEEP) => {}
                    _ = token.cancelled() => return,
                }
                let removed = limiter.cleanup();
                if removed > 0 {
                    tracing::debug!(removed, "Rate limiter windows cleaned up");
                }
            }
        });

        tasks.log_summary();
        tasks
    }
}
