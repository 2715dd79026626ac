// ==========================================
// 学业进度看板 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 领域对象 ↔ SQLite 行的映射,保持 id 与关联关系
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod module_repo;
pub mod program_repo;
pub mod row_codec;
pub mod time_entry_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use module_repo::ModuleRepository;
pub use program_repo::ProgramRepository;
pub use time_entry_repo::TimeEntryRepository;
