// ==========================================
// 进度计划引擎 - XER 原始记录（映射层输出）
// ==========================================
// 用途: 字段映射器输出，网络构建器输入
// 说明: 此阶段尚未解析跨表引用，工期/搭接仍为小时
// ==========================================

use crate::domain::types::{ActivityStatus, RelationshipType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// ProjectHeader - 项目头（PROJECT 表）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectHeader {
    pub source_project_id: String,          // proj_id
    pub short_name: String,                 // proj_short_name
    pub plan_start_date: Option<NaiveDate>, // 计划开始
    pub plan_end_date: Option<NaiveDate>,   // 计划完成（目标完成日）
    pub scd_end_date: Option<NaiveDate>,    // 上次计算的完成日
    pub data_date: Option<NaiveDate>,       // last_recalc_date
}

impl ProjectHeader {
    /// 目标完成日：优先 plan_end_date，其次 scd_end_date
    pub fn target_finish(&self) -> Option<NaiveDate> {
        self.plan_end_date.or(self.scd_end_date)
    }
}

// ==========================================
// ActivityRecord - 作业记录（TASK 表）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub task_id: String,
    pub project_id: Option<String>,
    pub wbs_id: Option<String>,
    pub calendar_id: Option<String>,
    pub code: String,
    pub name: String,
    pub status: ActivityStatus,
    pub planned_start: Option<NaiveDate>,
    pub planned_finish: Option<NaiveDate>,
    pub actual_start: Option<NaiveDate>,
    pub actual_finish: Option<NaiveDate>,
    pub duration_hours: f64,
    pub percent_complete: f64,
    pub is_milestone: bool,

    // 元信息
    pub line_number: u64,
}

// ==========================================
// RelationshipRecord - 逻辑关系记录（TASKPRED 表）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub relationship_id: Option<String>,
    pub predecessor_id: String, // pred_task_id
    pub successor_id: String,   // task_id
    pub rel_type: RelationshipType,
    pub lag_hours: f64, // 负数 = 提前量（lead）
    pub line_number: u64,
}

// ==========================================
// WbsRecord - WBS 记录（PROJWBS 表）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WbsRecord {
    pub wbs_id: String,
    pub project_id: Option<String>,
    pub parent_id: Option<String>,
    pub short_name: String,
    pub name: String,
    pub sequence_number: i64,
    pub is_project_node: bool, // proj_node_flag = 'Y'
    pub line_number: u64,
}

// ==========================================
// CalendarRecord - 日历记录（CALENDAR 表）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarRecord {
    pub calendar_id: String,
    pub name: String,
    pub is_default: bool,
    pub hours_per_day: Option<f64>,
    /// 工作日位图: bit0 = 周一 ... bit6 = 周日
    pub working_days: u8,
    pub holidays: BTreeSet<NaiveDate>,
    pub line_number: u64,
}

// ==========================================
// MappedSchedule - 映射阶段汇总输出
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct MappedSchedule {
    pub project: Option<ProjectHeader>,
    pub activities: Vec<ActivityRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub wbs: Vec<WbsRecord>,
    pub calendars: Vec<CalendarRecord>,
}
