// ==========================================
// 进度计划引擎 - 引擎层
// ==========================================
// 职责: 网络构建、CPM 计算、进度汇总
// 红线: 引擎不拼 SQL、不做 I/O，纯同步计算
// ==========================================

pub mod calendar;
pub mod cpm;
pub mod network;
pub mod progress;

// 重导出核心引擎
pub use calendar::CalendarCore;
pub use cpm::{CpmCalculator, CpmResult};
pub use network::{BuiltSchedule, NetworkBuilder, NetworkEdge, ScheduleNetwork, WbsForest};
pub use progress::ProgressAggregator;
