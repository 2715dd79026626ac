// ==========================================
// 学业进度看板 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、派生状态计算
// 红线: 不含数据访问逻辑
// ==========================================

pub mod attempt;
pub mod error;
pub mod module;
pub mod program;
pub mod semester;
pub mod time_entry;
pub mod types;

// 重导出核心类型
pub use attempt::Attempt;
pub use error::{DomainError, DomainResult};
pub use module::{derive_status, Module, MAX_ATTEMPTS};
pub use program::Program;
pub use semester::Semester;
pub use time_entry::{CompletedSession, PlannedSession, TimeEntry};
pub use types::{GradeBand, ModuleStatus, TimeEntryKind};
