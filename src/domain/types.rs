// ==========================================
// 学业进度看板 - 领域类型定义
// ==========================================
// 模块状态 / 时间记录类型标签 / 成绩区间
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 模块状态 (Module Status)
// ==========================================
// 红线: 状态只由考试记录推导,外部不可直接设置
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleStatus {
    Open,   // 未完成 (还可以继续考试)
    Passed, // 已通过
    Failed, // 三次未通过
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ModuleStatus {
    /// 从数据库字符串解析，未知值返回 None
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(ModuleStatus::Open),
            "PASSED" => Some(ModuleStatus::Passed),
            "FAILED" => Some(ModuleStatus::Failed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ModuleStatus::Open => "OPEN",
            ModuleStatus::Passed => "PASSED",
            ModuleStatus::Failed => "FAILED",
        }
    }
}

// ==========================================
// 时间记录类型 (Time Entry Kind)
// ==========================================
// 用于 time_entry.entry_type 列的类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeEntryKind {
    Planned,   // 计划中的学习时段
    Completed, // 已完成的学习时段
}

impl fmt::Display for TimeEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl TimeEntryKind {
    /// 从数据库字符串解析，未知值返回 None
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PLANNED" => Some(TimeEntryKind::Planned),
            "COMPLETED" => Some(TimeEntryKind::Completed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TimeEntryKind::Planned => "PLANNED",
            TimeEntryKind::Completed => "COMPLETED",
        }
    }
}

// ==========================================
// 成绩区间 (Grade Band)
// ==========================================
// 顺序: Good < Warning < Critical
// 德国评分制: 数值越小越好
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradeBand {
    NoData,   // 尚无成绩 (平均分哨兵值 0.0)
    Good,     // 优于或等于目标平均分
    Warning,  // 比目标差,但在容差范围内
    Critical, // 超出容差
}

impl fmt::Display for GradeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeBand::NoData => write!(f, "NO_DATA"),
            GradeBand::Good => write!(f, "GOOD"),
            GradeBand::Warning => write!(f, "WARNING"),
            GradeBand::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl GradeBand {
    /// 根据平均分与目标平均分划分区间
    ///
    /// # 参数
    /// - `average`: 平均分 (0.0 表示无数据)
    /// - `target`: 目标平均分
    /// - `warning_margin`: 容差 (默认 1.0)
    pub fn classify(average: f64, target: f64, warning_margin: f64) -> Self {
        if average == 0.0 {
            GradeBand::NoData
        } else if average <= target {
            GradeBand::Good
        } else if average <= target + warning_margin {
            GradeBand::Warning
        } else {
            GradeBand::Critical
        }
    }
}
