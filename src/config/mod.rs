// ==========================================
// 进度计划引擎 - 配置层
// ==========================================
// 职责: 引擎参数读取与覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod schedule_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use schedule_config_trait::{ConfigResult, ScheduleConfigReader, ScheduleEngineConfig};
