// ==========================================
// 学业进度看板 - 配置层
// ==========================================
// 职责: 系统配置管理 (新项目默认值、看板阈值)
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
