// ==========================================
// 进度计划引擎 - 领域类型定义
// ==========================================
// 依据: XER 导出字段取值 (status_code / pred_type)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 作业状态 (Activity Status)
// ==========================================
// XER 取值: TK_NotStart / TK_Active / TK_Complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    NotStarted, // 未开始
    InProgress, // 进行中
    Completed,  // 已完成
}

impl ActivityStatus {
    /// 从 XER status_code 解析（未知取值返回 None）
    pub fn from_xer(code: &str) -> Option<Self> {
        match code.trim() {
            "TK_NotStart" => Some(ActivityStatus::NotStarted),
            "TK_Active" => Some(ActivityStatus::InProgress),
            "TK_Complete" => Some(ActivityStatus::Completed),
            _ => None,
        }
    }

    /// 数据库存储格式
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ActivityStatus::NotStarted => "NOT_STARTED",
            ActivityStatus::InProgress => "IN_PROGRESS",
            ActivityStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_db_str(raw: &str) -> Self {
        match raw.trim() {
            "IN_PROGRESS" => ActivityStatus::InProgress,
            "COMPLETED" => ActivityStatus::Completed,
            _ => ActivityStatus::NotStarted,
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 逻辑关系类型 (Relationship Type)
// ==========================================
// XER 取值: PR_FS / PR_SS / PR_FF / PR_SF
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl RelationshipType {
    pub fn from_xer(code: &str) -> Option<Self> {
        match code.trim() {
            "PR_FS" => Some(RelationshipType::FinishToStart),
            "PR_SS" => Some(RelationshipType::StartToStart),
            "PR_FF" => Some(RelationshipType::FinishToFinish),
            "PR_SF" => Some(RelationshipType::StartToFinish),
            _ => None,
        }
    }

    /// 简码（FS/SS/FF/SF），同时用作数据库存储格式
    pub fn code(&self) -> &'static str {
        match self {
            RelationshipType::FinishToStart => "FS",
            RelationshipType::StartToStart => "SS",
            RelationshipType::FinishToFinish => "FF",
            RelationshipType::StartToFinish => "SF",
        }
    }

    pub fn from_code(raw: &str) -> Option<Self> {
        match raw.trim() {
            "FS" => Some(RelationshipType::FinishToStart),
            "SS" => Some(RelationshipType::StartToStart),
            "FF" => Some(RelationshipType::FinishToFinish),
            "SF" => Some(RelationshipType::StartToFinish),
            _ => None,
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ==========================================
// 导入警告类型 (Warning Kind)
// ==========================================
// 非致命问题：导入继续，结果中附带 warnings[]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    UnresolvedReference, // 关系/WBS 父节点/作业 WBS 引用不存在
    CalendarResolution,  // 日历缺失，回退默认日历
    UnknownTable,        // 未识别的表
    MissingRequiredField, // 非核心表缺少必填列 / 行缺少必填值
    InvalidValue,        // 可选字段无法解析，使用默认值
    DuplicateRecord,     // 重复的作业/WBS/关系
    ForeignProject,      // 属于其他项目的记录
    WbsCycle,            // WBS 父子关系成环，已断开
    ProjectDateFallback, // 项目开始日期缺失，使用回退值
    NegativeFloat,       // 总浮时为负
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningKind::UnresolvedReference => "UNRESOLVED_REFERENCE",
            WarningKind::CalendarResolution => "CALENDAR_RESOLUTION",
            WarningKind::UnknownTable => "UNKNOWN_TABLE",
            WarningKind::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            WarningKind::InvalidValue => "INVALID_VALUE",
            WarningKind::DuplicateRecord => "DUPLICATE_RECORD",
            WarningKind::ForeignProject => "FOREIGN_PROJECT",
            WarningKind::WbsCycle => "WBS_CYCLE",
            WarningKind::ProjectDateFallback => "PROJECT_DATE_FALLBACK",
            WarningKind::NegativeFloat => "NEGATIVE_FLOAT",
        };
        write!(f, "{}", s)
    }
}
