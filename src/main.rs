// ==========================================
// 进度计划引擎 - HTTP 服务入口
// ==========================================
// 技术栈: axum + Rust + SQLite
// ==========================================

use std::sync::Arc;

use anyhow::{anyhow, Context};
use schedule_engine::app::{build_router, get_bind_address, get_default_db_path, AppState};
use schedule_engine::config::ScheduleConfigReader;
use schedule_engine::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", schedule_engine::APP_NAME);
    tracing::info!("系统版本: {}", schedule_engine::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let max_upload_bytes = app_state
        .config_manager
        .get_max_upload_bytes()
        .await
        .map_err(|e| anyhow!("读取上传上限失败: {}", e))?;

    let router = build_router(Arc::new(app_state), max_upload_bytes);

    let bind = get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("无法监听 {}", bind))?;
    tracing::info!(bind = %bind, max_upload_bytes, "HTTP 服务已启动");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP 服务异常退出")?;

    tracing::info!("HTTP 服务已退出");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("无法监听退出信号: {}", e);
    }
}
