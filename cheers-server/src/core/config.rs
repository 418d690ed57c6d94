use crate::auth::JwtConfig;
use std::path::PathBuf;
use std::str::FromStr;

/// 事务模式
///
/// - `auto`: 启动时探测数据存储是否支持事务，不支持则降级为顺序执行
/// - `required`: 探测失败时拒绝启动
/// - `disabled`: 强制顺序执行（不使用事务）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    Auto,
    Required,
    Disabled,
}

impl FromStr for TransactionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "required" => Ok(Self::Required),
            "disabled" | "off" => Ok(Self::Disabled),
            other => Err(format!("unknown transaction mode: {other}")),
        }
    }
}

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 |
/// | DATABASE_PATH | $WORK_DIR/cheers.db | SQLite 数据库文件 |
/// | DB_MAX_CONNECTIONS | 5 | 连接池大小 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | TRANSACTION_MODE | auto | auto / required / disabled |
/// | LEASE_TTL_MS | 30000 | 账本租约时长(毫秒) |
/// | LEDGER_RETENTION_HOURS | 168 | 账本条目保留时长 |
/// | LEDGER_SWEEP_INTERVAL_SECS | 3600 | 保留清理周期 |
/// | AUDIT_BUFFER_SIZE | 1024 | 审计通道容量 |
/// | RATE_LIMIT_PER_MINUTE | 60 | 每用户每分钟变更请求上限 |
/// | MAX_BODY_BYTES | 1048576 | 受保护请求体上限 |
/// | LOG_LEVEL / LOG_JSON / LOG_DIR | info / false / - | 日志 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/cheers HTTP_PORT=8080 TRANSACTION_MODE=required cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志
    pub work_dir: String,
    /// SQLite 数据库路径
    pub database_path: String,
    pub db_max_connections: u32,
    pub http_port: u16,
    /// JWT 校验配置（签发在外部认证服务）
    pub jwt: JwtConfig,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub transaction_mode: TransactionMode,
    /// 账本租约时长 (毫秒)
    pub lease_ttl_ms: i64,
    pub ledger_retention_hours: i64,
    pub ledger_sweep_interval_secs: u64,
    pub audit_buffer_size: usize,
    pub rate_limit_per_minute: u32,
    pub max_body_bytes: usize,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into());
        let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| {
            PathBuf::from(&work_dir)
                .join("cheers.db")
                .to_string_lossy()
                .into_owned()
        });

        Self {
            database_path,
            work_dir,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 5),
            http_port: env_or("HTTP_PORT", 3000),
            jwt: JwtConfig::from_env(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            transaction_mode: env_or("TRANSACTION_MODE", TransactionMode::Auto),
            lease_ttl_ms: env_or("LEASE_TTL_MS", 30_000),
            ledger_retention_hours: env_or("LEDGER_RETENTION_HOURS", 168),
            ledger_sweep_interval_secs: env_or("LEDGER_SWEEP_INTERVAL_SECS", 3600),
            audit_buffer_size: env_or("AUDIT_BUFFER_SIZE", 1024),
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", 60),
            max_body_bytes: env_or("MAX_BODY_BYTES", 1024 * 1024),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }

    /// 测试用配置：内存数据库之外的所有默认值
    pub fn for_tests() -> Self {
        Self {
            work_dir: ".".into(),
            database_path: ":memory:".into(),
            db_max_connections: 1,
            http_port: 0,
            jwt: JwtConfig::for_tests(),
            environment: "test".into(),
            transaction_mode: TransactionMode::Auto,
            lease_ttl_ms: 30_000,
            ledger_retention_hours: 168,
            ledger_sweep_interval_secs: 3600,
            audit_buffer_size: 64,
            rate_limit_per_minute: 1000,
            max_body_bytes: 1024 * 1024,
            log_level: "debug".into(),
            log_json: false,
            log_dir: None,
        }
    }

    /// 保留期 (毫秒)
    pub fn ledger_retention_ms(&self) -> i64 {
        self.ledger_retention_hours * 60 * 60 * 1000
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_mode_parse() {
        assert_eq!("auto".parse(), Ok(TransactionMode::Auto));
        assert_eq!("REQUIRED".parse(), Ok(TransactionMode::Required));
        assert_eq!("off".parse(), Ok(TransactionMode::Disabled));
        assert!("sometimes".parse::<TransactionMode>().is_err());
    }

    #[test]
    fn test_retention_ms() {
        let mut config = Config::for_tests();
        config.ledger_retention_hours = 2;
        assert_eq!(config.ledger_retention_ms(), 7_200_000);
    }
}
