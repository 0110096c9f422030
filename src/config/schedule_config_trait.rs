// ==========================================
// 进度计划引擎 - 计划配置读取 Trait
// ==========================================
// 职责: 定义导入/计算所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ScheduleEngineConfig - 单次导入使用的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEngineConfig {
    pub critical_float_threshold: i64,
    pub default_day_hours: f64,
    pub honor_project_target_finish: bool,
    pub max_upload_bytes: u64,
}

impl Default for ScheduleEngineConfig {
    fn default() -> Self {
        Self {
            critical_float_threshold: 0,
            default_day_hours: 8.0,
            honor_project_target_finish: true,
            max_upload_bytes: 64 * 1024 * 1024,
        }
    }
}

// ==========================================
// ScheduleConfigReader Trait
// ==========================================
// 用途: 计划导入所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ScheduleConfigReader: Send + Sync {
    /// 关键判定阈值（工作日）
    ///
    /// # 默认值
    /// - 0
    async fn get_critical_float_threshold(&self) -> ConfigResult<i64>;

    /// 日历未给出时每工作日小时数
    ///
    /// # 默认值
    /// - 8.0
    async fn get_default_day_hours(&self) -> ConfigResult<f64>;

    /// 逆推是否锚定于项目目标完成日
    ///
    /// # 默认值
    /// - true
    async fn get_honor_project_target_finish(&self) -> ConfigResult<bool>;

    /// 上传文件大小上限（字节）
    ///
    /// # 默认值
    /// - 64 MiB
    async fn get_max_upload_bytes(&self) -> ConfigResult<u64>;

    /// 一次性读取全部配置
    async fn load_engine_config(&self) -> ConfigResult<ScheduleEngineConfig> {
        Ok(ScheduleEngineConfig {
            critical_float_threshold: self.get_critical_float_threshold().await?,
            default_day_hours: self.get_default_day_hours().await?,
            honor_project_target_finish: self.get_honor_project_target_finish().await?,
            max_upload_bytes: self.get_max_upload_bytes().await?,
        })
    }
}
