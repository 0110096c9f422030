// ==========================================
// 进度计划引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 此处仅包含致命错误；非致命问题走 ImportWarning
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件格式不支持: {0}（仅支持 .xer）")]
    UnsupportedFormat(String),

    #[error("文件签名无效: {0}")]
    InvalidSignature(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("文件过大: {size} 字节（上限 {limit} 字节）")]
    FileTooLarge { size: u64, limit: u64 },

    // ===== 解析错误 =====
    #[error("行字段数不匹配 (表 {table}, 行 {line_number}): 期望 {expected_fields} 列，实际 {actual_fields} 列")]
    MalformedRow {
        table: String,
        line_number: u64,
        expected_fields: usize,
        actual_fields: usize,
    },

    #[error("缺少必填列 (表 {table}): {column}")]
    MissingRequiredField { table: String, column: String },

    // ===== 网络结构错误 =====
    #[error("逻辑关系存在循环: {}", activity_ids.join(" -> "))]
    CyclicDependency { activity_ids: Vec<String> },

    #[error("计划为空: {0}")]
    EmptySchedule(String),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 落库错误 =====
    #[error("计划落库失败: {0}")]
    Persistence(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为文件/格式层面的错误（调用方输入问题）
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ImportError::UnsupportedFormat(_)
                | ImportError::InvalidSignature(_)
                | ImportError::FileReadError(_)
                | ImportError::FileTooLarge { .. }
                | ImportError::MalformedRow { .. }
        )
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        match err.into_kind() {
            csv::ErrorKind::Io(io_err) => ImportError::FileReadError(io_err.to_string()),
            other => ImportError::FileReadError(format!("{:?}", other)),
        }
    }
}

impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        ImportError::Persistence(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
