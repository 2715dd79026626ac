// ==========================================
// 学业进度看板 - 学期领域模型
// ==========================================
// 归属: 由 Program 持有,每次保存 Program 时整体替换
// 对齐: schema semester 表
// ==========================================

use crate::domain::module::Module;
use crate::domain::time_entry::TimeEntry;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

// ==========================================
// Semester - 学期
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    pub id: Option<i64>,       // 数据库ID (每次保存 Program 都会重新分配)
    pub number: u32,           // 学期序号 (1, 2, 3, ...)
    pub start_date: NaiveDate, // 开始日期 (含)
    pub end_date: NaiveDate,   // 结束日期 (含)
}

impl Semester {
    pub fn new(number: u32, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: None,
            number,
            start_date,
            end_date,
        }
    }

    /// 指定日期是否落在本学期内 (两端都包含)
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn is_current_on(&self, today: NaiveDate) -> bool {
        self.contains(today)
    }

    /// 今天是否在本学期内
    pub fn is_current(&self) -> bool {
        self.is_current_on(Local::now().date_naive())
    }

    /// 计算本学期的平均成绩
    ///
    /// 只统计计划学期等于本学期序号且已通过的模块,取各模块最近一次成绩。
    /// 没有数据时返回 0.0 (哨兵值,不是真实平均分)。
    pub fn average_grade(&self, modules: &[Module]) -> f64 {
        mean_rounded(
            modules
                .iter()
                .filter(|m| m.planned_period() == self.number)
                .filter_map(Module::final_grade),
        )
    }

    /// 本学期时间范围内已完成时段的总时长 (分钟)
    pub fn study_minutes(&self, entries: &[TimeEntry]) -> i64 {
        entries
            .iter()
            .filter_map(TimeEntry::as_completed)
            .filter(|session| self.contains(session.date))
            .map(|session| session.duration_minutes())
            .sum()
    }
}

/// 算术平均值,保留两位小数;空集合返回 0.0
pub(crate) fn mean_rounded(grades: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = grades.fold((0.0, 0usize), |(sum, count), g| (sum + g, count + 1));
    if count == 0 {
        return 0.0;
    }
    round2(sum / count as f64)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
