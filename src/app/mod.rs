// ==========================================
// 进度计划引擎 - 应用层
// ==========================================
// 职责: 组装共享状态，提供 HTTP 接口
// ==========================================

pub mod http;
pub mod state;

// 重导出
pub use http::build_router;
pub use state::{get_bind_address, get_default_db_path, AppState};
