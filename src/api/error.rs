// ==========================================
// 进度计划引擎 - API层错误类型
// ==========================================
// 职责: 将导入/仓储错误转换为调用方可展示的错误
// 输出: HTTP 状态码 + { error, details?, code }
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("文件无法导入: {message}")]
    InvalidFile {
        message: String,
        details: Option<Value>,
    },

    #[error("上传文件过大: {0}")]
    PayloadTooLarge(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 计划结构错误（文件可读但无法计算）
    // ==========================================
    #[error("计划无法计算: {message}")]
    ScheduleRejected {
        message: String,
        details: Option<Value>,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// 错误响应体
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub code: &'static str,
}

impl ApiError {
    /// HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidInput(_) | ApiError::InvalidFile { .. } => 400,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::ScheduleRejected { .. } => 422,
            _ => 500,
        }
    }

    /// 机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::InvalidFile { .. } => "INVALID_FILE",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::ScheduleRejected { .. } => "SCHEDULE_REJECTED",
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_) => "PERSISTENCE_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            ApiError::InvalidFile { details, .. } | ApiError::ScheduleRejected { details, .. } => {
                details.clone()
            }
            _ => None,
        };
        ErrorBody {
            error: self.to_string(),
            details,
            code: self.code(),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        let message = err.to_string();
        match err {
            ImportError::UnsupportedFormat(_)
            | ImportError::InvalidSignature(_)
            | ImportError::FileReadError(_) => ApiError::InvalidFile {
                message,
                details: None,
            },
            ImportError::MalformedRow {
                table,
                line_number,
                expected_fields,
                actual_fields,
            } => ApiError::InvalidFile {
                message,
                details: Some(json!({
                    "table": table,
                    "lineNumber": line_number,
                    "expectedFields": expected_fields,
                    "actualFields": actual_fields,
                })),
            },
            ImportError::FileTooLarge { .. } => ApiError::PayloadTooLarge(message),
            ImportError::MissingRequiredField { table, column } => ApiError::ScheduleRejected {
                message,
                details: Some(json!({ "table": table, "column": column })),
            },
            ImportError::CyclicDependency { activity_ids } => ApiError::ScheduleRejected {
                message,
                details: Some(json!({ "activityIds": activity_ids })),
            },
            ImportError::EmptySchedule(_) => ApiError::ScheduleRejected {
                message,
                details: None,
            },
            ImportError::Persistence(msg) => ApiError::DatabaseTransactionError(msg),
            ImportError::ConfigReadError { .. } | ImportError::InternalError(_) => {
                ApiError::InternalError(message)
            }
            ImportError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockPoisoned(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::ConstraintViolation(msg) => ApiError::DatabaseError(msg),
            RepositoryError::CorruptColumn { column, message } => {
                ApiError::DatabaseError(format!("列{}数据损坏: {}", column, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
