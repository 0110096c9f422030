// ==========================================
// 进度计划引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod record;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use record::{
    ActivityRecord, CalendarRecord, MappedSchedule, ProjectHeader, RelationshipRecord, WbsRecord,
};
pub use schedule::{
    Activity, Calendar, ImportOutcome, ImportWarning, ProgressSummary, Relationship,
    ScheduleImport, ScheduleImportData, ScheduleSummary, WbsNode, WbsProgress,
    DEFAULT_CALENDAR_ID, MON_TO_FRI,
};
pub use types::{ActivityStatus, RelationshipType, WarningKind};
