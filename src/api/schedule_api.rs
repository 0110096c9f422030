// ==========================================
// 进度计划引擎 - 计划 API
// ==========================================
// 职责: 封装计划导入/删除与看板读模型查询
// 架构: API 层 → Importer（写） / ScheduleRepository（读）
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::schedule::{Activity, ScheduleImport, ScheduleSummary, WbsProgress};
use crate::engine::ProgressAggregator;
use crate::importer::ScheduleImporter;
use crate::repository::ScheduleRepository;

// ==========================================
// 响应 DTO
// ==========================================

/// 导入成功响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportScheduleResponse {
    pub message: String,
    pub import_id: String,
    pub activities_count: usize,
    pub relationships_count: usize,
    pub wbs_count: usize,
    pub xer_project_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub elapsed_ms: u64,
}

/// 删除响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteScheduleResponse {
    pub message: String,
    pub project_id: String,
}

/// 关键路径上的单个作业
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalActivity {
    pub activity_id: String,
    pub code: String,
    pub name: String,
    pub early_start: Option<NaiveDate>,
    pub early_finish: Option<NaiveDate>,
    pub total_float: Option<i64>,
}

/// 关键路径响应（按路径顺序）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalPathResponse {
    pub import_id: String,
    pub project_finish: Option<NaiveDate>,
    pub activities: Vec<CriticalActivity>,
}

// ==========================================
// ScheduleApi - 计划 API
// ==========================================
pub struct ScheduleApi {
    importer: Arc<dyn ScheduleImporter>,
    schedule_repo: Arc<ScheduleRepository>,
    // 固定“今天”（逾期统计用），None 时取本地日期
    today: Option<NaiveDate>,
}

impl ScheduleApi {
    /// 创建新的ScheduleApi实例
    ///
    /// # 参数
    /// - importer: 计划导入器
    /// - schedule_repo: 计划仓储（读模型）
    pub fn new(importer: Arc<dyn ScheduleImporter>, schedule_repo: Arc<ScheduleRepository>) -> Self {
        Self {
            importer,
            schedule_repo,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    fn require_project_id(project_id: &str) -> ApiResult<()> {
        if project_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("项目ID不能为空".to_string()));
        }
        Ok(())
    }

    fn current_import(&self, project_id: &str) -> ApiResult<ScheduleImport> {
        Self::require_project_id(project_id)?;
        self.schedule_repo
            .find_current_import(project_id)?
            .ok_or_else(|| ApiError::NotFound(format!("项目{}尚无计划", project_id)))
    }

    // ==========================================
    // 写入接口
    // ==========================================

    /// 导入 XER 文件并替换项目当前计划
    ///
    /// # 返回
    /// - Ok(ImportScheduleResponse): 计数 + 警告
    /// - Err(ApiError): 失败时已有计划保持不变
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn import_schedule(
        &self,
        project_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> ApiResult<ImportScheduleResponse> {
        Self::require_project_id(project_id)?;
        if file_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件名不能为空".to_string()));
        }

        let outcome = self
            .importer
            .import_schedule(project_id, file_name, content)
            .await?;

        Ok(ImportScheduleResponse {
            message: format!(
                "导入成功: {} 个作业, {} 条逻辑关系, {} 个 WBS 节点",
                outcome.activities_count, outcome.relationships_count, outcome.wbs_count
            ),
            import_id: outcome.import_id,
            activities_count: outcome.activities_count,
            relationships_count: outcome.relationships_count,
            wbs_count: outcome.wbs_count,
            xer_project_name: outcome.source_project_name,
            warnings: outcome.warnings.iter().map(ToString::to_string).collect(),
            elapsed_ms: outcome.elapsed_ms as u64,
        })
    }

    /// 删除项目当前计划（无计划时返回 NotFound）
    pub async fn delete_schedule(&self, project_id: &str) -> ApiResult<DeleteScheduleResponse> {
        Self::require_project_id(project_id)?;
        if !self.importer.delete_schedule(project_id).await? {
            return Err(ApiError::NotFound(format!("项目{}尚无计划", project_id)));
        }
        info!(project_id = %project_id, "计划已删除");
        Ok(DeleteScheduleResponse {
            message: "计划已删除".to_string(),
            project_id: project_id.to_string(),
        })
    }

    // ==========================================
    // 读取接口（同步，调用方负责放入阻塞线程池）
    // ==========================================

    /// 看板汇总：最新导入 + 实时统计（逾期按当天计算）
    pub fn get_schedule_summary(&self, project_id: &str) -> ApiResult<ScheduleSummary> {
        let latest_import = self.current_import(project_id)?;
        let activities = self.schedule_repo.list_activities(&latest_import.import_id)?;
        let stats = ProgressAggregator::summarize(&activities, self.today());

        Ok(ScheduleSummary {
            latest_import,
            stats,
        })
    }

    /// 有序关键路径
    pub fn get_critical_path(&self, project_id: &str) -> ApiResult<CriticalPathResponse> {
        let import = self.current_import(project_id)?;
        let activities = self.schedule_repo.list_activities(&import.import_id)?;
        let by_id: HashMap<&str, &Activity> = activities
            .iter()
            .map(|a| (a.activity_id.as_str(), a))
            .collect();

        let path = import
            .critical_path
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .map(|a| CriticalActivity {
                activity_id: a.activity_id.clone(),
                code: a.code.clone(),
                name: a.name.clone(),
                early_start: a.early_start,
                early_finish: a.early_finish,
                total_float: a.total_float,
            })
            .collect();

        Ok(CriticalPathResponse {
            import_id: import.import_id,
            project_finish: import.project_finish,
            activities: path,
        })
    }

    /// WBS 逐级进度
    pub fn list_wbs_progress(&self, project_id: &str) -> ApiResult<Vec<WbsProgress>> {
        let import = self.current_import(project_id)?;
        Ok(self.schedule_repo.list_wbs_progress(&import.import_id)?)
    }
}
