//! RelayCore 主入口

use std::sync::Arc;

use anyhow::Result;
use relaycore::{
    api,
    app_state::AppState,
    config::Config,
    domain::chain_directory::ChainDirectory,
    infrastructure::logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ✅ 1. 加载环境变量
    dotenvy::dotenv().ok();

    // ✅ 2. 加载配置（CONFIG_PATH 指向的 TOML 文件优先）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate()?;

    // ✅ 3. 初始化日志（guard 需持有到进程退出）
    let _log_guard = match logging::init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            logging::init_default_logging()
        }
    };

    tracing::info!("🚀 Starting RelayCore");

    // ✅ 4. 加载链目录（缺失时以空目录启动，所有转账请求将返回 chain not found）
    let chains = match ChainDirectory::load(&config.server.chains_path) {
        Ok(directory) => {
            tracing::info!(
                chains = directory.len(),
                chain_ids = ?directory.chain_ids(),
                "✅ Chain directory loaded"
            );
            directory
        }
        Err(e) => {
            tracing::warn!(path = %config.server.chains_path, error = %e, "⚠️ Chain directory unavailable, starting with no chains");
            ChainDirectory::default()
        }
    };

    // ✅ 5. 初始化应用状态
    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone(), Arc::new(chains)));

    // ✅ 6. 构建API路由并启动服务器
    let app = api::routes(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;

    tracing::info!("🎉 Server listening on http://{}", config.server.bind_addr);
    tracing::info!("📖 Swagger UI: http://{}/docs", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
