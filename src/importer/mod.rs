// ==========================================
// 进度计划引擎 - 导入层
// ==========================================
// 职责: XER 文件校验、分表、字段映射，编排整条导入流水线
// 支持: Primavera P6 XER（制表符分隔）
// ==========================================

// 模块声明
pub mod calendar_data;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod schedule_importer_impl;
pub mod schedule_importer_trait;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper as FieldMapperImpl;
pub use file_parser::{XerParser, XerReader, XerRow, XerTable};
pub use schedule_importer_impl::ScheduleImporterImpl;

// 重导出 Trait 接口
pub use schedule_importer_trait::{FieldMapper, FileParser, ScheduleImporter};
