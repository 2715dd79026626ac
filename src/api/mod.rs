// ==========================================
// 学业进度看板 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行入口调用
// ==========================================

pub mod dashboard_api;
pub mod error;
pub mod study_api;
pub mod validator;

// 重导出核心类型
pub use dashboard_api::{format_minutes, DashboardApi, DashboardSummary};
pub use error::{ApiError, ApiResult};
pub use study_api::{StudyApi, StudyData};
