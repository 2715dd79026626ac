// ==========================================
// 学业进度看板 - 应用层
// ==========================================
// 职责: 装配共享状态,连接入口与 API
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
