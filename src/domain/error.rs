// ==========================================
// 学业进度看板 - 领域层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 领域层错误类型
///
/// 领域对象的所有变更在失败时保持原状态不变
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("数据验证失败 (field={field}): {message}")]
    Validation { field: String, message: String },

    #[error("模块 '{title}' 最多允许 {max} 次考试")]
    Capacity { title: String, max: usize },

    #[error("记录未找到: {entity} {key}")]
    NotFound { entity: String, key: String },
}

impl DomainError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity: &str, key: impl ToString) -> Self {
        DomainError::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }
}

/// Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;
