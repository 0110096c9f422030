// ==========================================
// 进度计划引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::schedule_config_trait::{ConfigResult, ScheduleConfigReader, ScheduleEngineConfig};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 配置键
pub mod config_keys {
    pub const CRITICAL_FLOAT_THRESHOLD: &str = "critical_float_threshold";
    pub const DEFAULT_DAY_HOURS: &str = "default_day_hours";
    pub const HONOR_PROJECT_TARGET_FINISH: &str = "honor_project_target_finish";
    pub const MAX_UPLOAD_BYTES: &str = "max_upload_bytes";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value, updated_at)
               VALUES ('global', ?1, ?2, datetime('now'))
               ON CONFLICT(scope_id, key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at"#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let config_map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<BTreeMap<String, String>, _>>()?;

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取并解析配置；缺失或无法解析时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + std::fmt::Display + Copy,
    {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(key = %key, value = %raw, default = %default, "配置值无法解析，使用默认值");
                    Ok(default)
                }
            },
        }
    }
}

#[async_trait]
impl ScheduleConfigReader for ConfigManager {
    async fn get_critical_float_threshold(&self) -> ConfigResult<i64> {
        let default = ScheduleEngineConfig::default().critical_float_threshold;
        self.get_parsed_or_default(config_keys::CRITICAL_FLOAT_THRESHOLD, default)
    }

    async fn get_default_day_hours(&self) -> ConfigResult<f64> {
        let default = ScheduleEngineConfig::default().default_day_hours;
        let hours = self.get_parsed_or_default(config_keys::DEFAULT_DAY_HOURS, default)?;
        if hours > 0.0 && hours <= 24.0 {
            Ok(hours)
        } else {
            warn!(hours, "default_day_hours 超出 (0, 24]，使用默认值");
            Ok(default)
        }
    }

    async fn get_honor_project_target_finish(&self) -> ConfigResult<bool> {
        let default = ScheduleEngineConfig::default().honor_project_target_finish;
        Ok(match self.get_global_config_value(config_keys::HONOR_PROJECT_TARGET_FINISH)? {
            None => default,
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "y" | "yes" => true,
                "0" | "false" | "n" | "no" => false,
                _ => {
                    warn!(value = %raw, "honor_project_target_finish 无法解析，使用默认值");
                    default
                }
            },
        })
    }

    async fn get_max_upload_bytes(&self) -> ConfigResult<u64> {
        let default = ScheduleEngineConfig::default().max_upload_bytes;
        self.get_parsed_or_default(config_keys::MAX_UPLOAD_BYTES, default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_defaults_when_absent() {
        let config = manager().load_engine_config().await.unwrap();
        assert_eq!(config, ScheduleEngineConfig::default());
    }

    #[tokio::test]
    async fn test_overrides_and_invalid_values() {
        let m = manager();
        m.set_global_config_value(config_keys::CRITICAL_FLOAT_THRESHOLD, "2").unwrap();
        m.set_global_config_value(config_keys::DEFAULT_DAY_HOURS, "abc").unwrap();
        m.set_global_config_value(config_keys::HONOR_PROJECT_TARGET_FINISH, "N").unwrap();
        m.set_global_config_value(config_keys::MAX_UPLOAD_BYTES, "1024").unwrap();

        let config = m.load_engine_config().await.unwrap();
        assert_eq!(config.critical_float_threshold, 2);
        assert_eq!(config.default_day_hours, 8.0);
        assert!(!config.honor_project_target_finish);
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_snapshot_and_overwrite() {
        let m = manager();
        m.set_global_config_value("default_day_hours", "10").unwrap();
        m.set_global_config_value("default_day_hours", "7.5").unwrap();
        let snapshot = m.get_config_snapshot().unwrap();
        assert_eq!(snapshot, r#"{"default_day_hours":"7.5"}"#);
    }
}
