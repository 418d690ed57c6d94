use anyhow::Context;
use cheers_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 加载 .env 与配置
    dotenv::dotenv().ok();
    let config = Config::from_env();

    // 2. 工作目录与日志
    setup_environment(&config).context("Failed to prepare work directory")?;
    tracing::info!(environment = %config.environment, "Cheers server starting...");

    // 3. 初始化服务器状态（数据库、事务探测、服务）
    let state = ServerState::initialize(&config)
        .await
        .context("Failed to initialize server state")?;

    // 4. 启动 HTTP 服务器（包含后台任务）
    if let Err(e) = Server::with_state(config, state).run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
