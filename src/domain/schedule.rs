// ==========================================
// 进度计划引擎 - 计划领域模型
// ==========================================
// 用途: 网络构建后的作业/关系/WBS/日历，及导入批次与汇总
// 对齐: schedule_import / schedule_activity / schedule_relationship /
//       schedule_wbs_node / schedule_calendar 表
// ==========================================

use crate::domain::types::{ActivityStatus, RelationshipType, WarningKind};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 默认日历 ID（未解析日历的作业回退到此）
pub const DEFAULT_CALENDAR_ID: &str = "__default__";

/// 周一至周五
pub const MON_TO_FRI: u8 = 0b0001_1111;

// ==========================================
// Calendar - 工作日历
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub calendar_id: String,
    pub name: String,
    pub hours_per_day: f64,
    /// 工作日位图: bit0 = 周一 ... bit6 = 周日
    pub working_days: u8,
    pub holidays: BTreeSet<NaiveDate>,
    pub is_default: bool,
}

impl Calendar {
    /// 系统默认日历：周一至周五，无节假日
    pub fn default_five_day(hours_per_day: f64) -> Self {
        Self {
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            name: "默认五天工作制".to_string(),
            hours_per_day,
            working_days: MON_TO_FRI,
            holidays: BTreeSet::new(),
            is_default: true,
        }
    }
}

// ==========================================
// Activity - 作业（含 CPM 计算字段）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    // ===== 源字段 =====
    pub activity_id: String, // XER task_id
    pub code: String,        // task_code
    pub wbs_id: Option<String>,
    pub name: String,
    pub calendar_id: String, // 已解析（可能为默认日历）
    pub planned_start: Option<NaiveDate>,
    pub planned_finish: Option<NaiveDate>,
    pub actual_start: Option<NaiveDate>,
    pub actual_finish: Option<NaiveDate>,
    pub duration_working_days: i64,
    pub percent_complete: f64, // 0-100
    pub status: ActivityStatus,
    pub is_milestone: bool,

    // ===== CPM 计算字段 =====
    pub early_start: Option<NaiveDate>,
    pub early_finish: Option<NaiveDate>,
    pub late_start: Option<NaiveDate>,
    pub late_finish: Option<NaiveDate>,
    pub total_float: Option<i64>, // 工作日，可为负
    pub is_critical: bool,
}

// ==========================================
// Relationship - 逻辑关系（端点已解析）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub predecessor_id: String,
    pub successor_id: String,
    pub rel_type: RelationshipType,
    pub lag_working_days: i64,
}

// ==========================================
// WbsNode - WBS 节点
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WbsNode {
    pub wbs_id: String,
    pub parent_id: Option<String>, // None = 根
    pub short_name: String,
    pub name: String,
    pub sequence_number: i64,
}

// ==========================================
// WbsProgress - WBS 进度汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WbsProgress {
    pub wbs_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub percent_complete: f64,
    pub total_weight: i64, // 下属作业工期合计（工作日）
    pub activity_count: usize,
    pub no_activities: bool,
}

// ==========================================
// ProgressSummary - 项目级统计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub overdue: usize,
    pub critical: usize,
    pub percent_complete: f64,
}

// ==========================================
// ImportWarning - 非致命问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl ImportWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

// ==========================================
// ScheduleImport - 导入批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleImport {
    pub import_id: String,
    pub project_id: String,
    pub source_file_name: String,
    pub source_project_name: String,
    pub imported_at: DateTime<Utc>,
    pub activities_count: usize,
    pub relationships_count: usize,
    pub wbs_count: usize,
    pub warnings: Vec<String>,
    pub project_start: Option<NaiveDate>,
    pub project_finish: Option<NaiveDate>,
    pub critical_path: Vec<String>, // 有序作业 ID
}

// ==========================================
// ScheduleImportData - 原子落库单元
// ==========================================
#[derive(Debug, Clone)]
pub struct ScheduleImportData {
    pub import: ScheduleImport,
    pub activities: Vec<Activity>,
    pub relationships: Vec<Relationship>,
    pub wbs_nodes: Vec<WbsNode>,
    pub calendars: Vec<Calendar>,
    pub wbs_progress: Vec<WbsProgress>,
}

// ==========================================
// ImportOutcome - 导入结果（返回调用方）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub import_id: String,
    pub activities_count: usize,
    pub relationships_count: usize,
    pub wbs_count: usize,
    pub source_project_name: String,
    pub warnings: Vec<ImportWarning>,
    pub elapsed_ms: u128,
}

// ==========================================
// ScheduleSummary - 看板读模型
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub latest_import: ScheduleImport,
    pub stats: ProgressSummary,
}
