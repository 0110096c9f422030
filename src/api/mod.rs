// ==========================================
// 进度计划引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 HTTP 路由调用
// ==========================================

pub mod error;
pub mod schedule_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult, ErrorBody};
pub use schedule_api::{
    CriticalActivity, CriticalPathResponse, DeleteScheduleResponse, ImportScheduleResponse,
    ScheduleApi,
};
