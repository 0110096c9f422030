// ==========================================
// 进度计划引擎 - 核心库
// ==========================================
// 流水线: XER 字节 → 分表 → 强类型记录 → 作业网络 → CPM → 进度汇总 → 落库
// 技术栈: Rust + SQLite + axum
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 建网 / CPM / 汇总
pub mod engine;

// 导入层 - XER 文件
pub mod importer;

// 配置层 - 引擎参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - HTTP 服务
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ActivityStatus, RelationshipType, WarningKind};

// 领域实体
pub use domain::{
    Activity, Calendar, ImportOutcome, ImportWarning, ProgressSummary, Relationship,
    ScheduleImport, ScheduleSummary, WbsNode, WbsProgress,
};

// 引擎
pub use engine::{CalendarCore, CpmCalculator, NetworkBuilder, ProgressAggregator};

// 导入
pub use importer::{ImportError, ScheduleImporter, ScheduleImporterImpl};

// API
pub use api::{ApiError, ScheduleApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "进度计划引擎";
