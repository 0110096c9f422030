// ==========================================
// 进度计划引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::ScheduleApi;
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::importer::{FieldMapperImpl, ScheduleImporterImpl, XerParser};
use crate::repository::{ProjectLockRegistry, ScheduleRepository};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "SCHEDULE_ENGINE_DB_PATH";
/// 监听地址环境变量
pub const BIND_ENV: &str = "SCHEDULE_ENGINE_BIND";
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// 应用状态
///
/// 包含所有API实例和共享资源，作为 HTTP 路由的共享状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 计划API
    pub schedule_api: Arc<ScheduleApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        Self::from_connection(db_path, conn)
    }

    /// 基于已打开的连接组装（建表后共享同一连接）
    pub fn from_connection(db_path: String, conn: Connection) -> Result<Self, String> {
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let locks = Arc::new(ProjectLockRegistry::new());
        let schedule_repo = Arc::new(ScheduleRepository::new(conn.clone(), locks));

        // ==========================================
        // 初始化配置与导入器
        // ==========================================
        let config_manager = Arc::new(ConfigManager::from_connection(conn));
        let importer = ScheduleImporterImpl::new(
            schedule_repo.clone(),
            config_manager.clone(),
            Box::new(XerParser),
            Box::new(FieldMapperImpl),
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let schedule_api = Arc::new(ScheduleApi::new(Arc::new(importer), schedule_repo));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            schedule_api,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: SCHEDULE_ENGINE_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./schedule_engine.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("schedule-engine");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("schedule_engine.db");
        } else {
            tracing::warn!("无法创建数据目录 {}，使用当前目录", dir.display());
        }
    }

    path.to_string_lossy().into_owned()
}

/// 获取 HTTP 监听地址
pub fn get_bind_address() -> String {
    std::env::var(BIND_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_BIND.to_string())
}
