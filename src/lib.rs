// ==========================================
// 学业进度看板 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 单用户学业进度跟踪 (学分、成绩、学习时长)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{GradeBand, ModuleStatus, TimeEntryKind};

// 领域实体
pub use domain::{
    Attempt, CompletedSession, DomainError, Module, PlannedSession, Program, Semester, TimeEntry,
};

// API
pub use api::{ApiError, DashboardApi, DashboardSummary, StudyApi, StudyData};

// ==========================================
// 系统常量
// ==========================================

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const APP_NAME: &str = "学业进度看板";
