// ==========================================
// 学业进度看板 - 学位项目领域模型 (聚合根)
// ==========================================
// 组合: Program 持有 Semester 与 Module,删除时级联删除
// 红线: 生成后的学期序号连续 1..=standard_duration
// 对齐: schema program 表
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::module::Module;
use crate::domain::semester::{mean_rounded, Semester};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// 默认标准学期数
pub const DEFAULT_STANDARD_DURATION: u32 = 6;
/// 默认目标平均分
pub const DEFAULT_TARGET_AVERAGE: f64 = 2.0;
/// 每个学期的月数
pub const SEMESTER_MONTHS: u32 = 6;
/// 标准学期数上限
pub const MAX_STANDARD_DURATION: u32 = 20;

// ==========================================
// Program - 学位项目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProgramRecord")]
pub struct Program {
    pub id: Option<i64>,          // 数据库ID
    name: String,                 // 项目名称 (例: Informatik B.Sc.)
    standard_duration: u32,       // 标准学期数
    target_average: f64,          // 目标平均分
    pub semesters: Vec<Semester>, // 学期列表 (按序号排列)
    pub modules: Vec<Module>,     // 模块列表
}

impl Program {
    /// 创建新项目 (无学期、无模块)
    pub fn new(name: &str, standard_duration: u32, target_average: f64) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name", "项目名称不能为空"));
        }
        if standard_duration == 0 || standard_duration > MAX_STANDARD_DURATION {
            return Err(DomainError::validation(
                "standard_duration",
                format!("标准学期数必须在 1 到 {} 之间, 实际为 {}", MAX_STANDARD_DURATION, standard_duration),
            ));
        }
        validate_target_average(target_average)?;
        Ok(Self {
            id: None,
            name: name.to_string(),
            standard_duration,
            target_average,
            semesters: Vec::new(),
            modules: Vec::new(),
        })
    }

    /// 使用默认学期数与目标平均分创建
    pub fn with_defaults(name: &str) -> DomainResult<Self> {
        Self::new(name, DEFAULT_STANDARD_DURATION, DEFAULT_TARGET_AVERAGE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn standard_duration(&self) -> u32 {
        self.standard_duration
    }

    pub fn target_average(&self) -> f64 {
        self.target_average
    }

    pub fn set_target_average(&mut self, target_average: f64) -> DomainResult<()> {
        validate_target_average(target_average)?;
        self.target_average = target_average;
        Ok(())
    }

    // ==========================================
    // 学期
    // ==========================================

    /// 从开始日期生成全部学期 (替换原有列表)
    ///
    /// 每个学期固定 6 个自然月,月份超过 12 时进位到下一年;
    /// 学期结束日期 = 下一学期开始日期 - 1 天。
    /// 目标月份没有该日 (例如 8 月 31 日 + 6 个月) 时取该月最后一天。
    pub fn generate_semesters(&mut self, start_date: NaiveDate) -> DomainResult<()> {
        let mut semesters = Vec::with_capacity(self.standard_duration as usize);
        let mut cursor = start_date;

        for number in 1..=self.standard_duration {
            let next_start = add_months(cursor, SEMESTER_MONTHS)?;
            let end_date = next_start - Duration::days(1);
            semesters.push(Semester::new(number, cursor, end_date));
            cursor = next_start;
        }

        self.semesters = semesters;
        Ok(())
    }

    pub fn semester(&self, number: u32) -> Option<&Semester> {
        self.semesters.iter().find(|s| s.number == number)
    }

    /// 指定日期所在的学期序号
    ///
    /// - 落在某个学期内 → 该学期序号
    /// - 早于第一个学期 → 1
    /// - 其他情况 (晚于最后一个学期,或没有学期) → 标准学期数
    pub fn current_semester_number_on(&self, today: NaiveDate) -> u32 {
        if let Some(current) = self.semesters.iter().find(|s| s.is_current_on(today)) {
            return current.number;
        }
        match self.semesters.first() {
            Some(first) if today < first.start_date => 1,
            _ => self.standard_duration,
        }
    }

    pub fn current_semester_number(&self) -> u32 {
        self.current_semester_number_on(Local::now().date_naive())
    }

    // ==========================================
    // 模块
    // ==========================================

    pub fn add_module(&mut self, module: Module) -> &mut Module {
        self.modules.push(module);
        let last = self.modules.len() - 1;
        &mut self.modules[last]
    }

    pub fn module(&self, module_id: i64) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == Some(module_id))
    }

    pub fn module_mut(&mut self, module_id: i64) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.id == Some(module_id))
    }

    /// 从内存中移除模块
    pub fn remove_module(&mut self, module_id: i64) -> Option<Module> {
        let index = self.modules.iter().position(|m| m.id == Some(module_id))?;
        Some(self.modules.remove(index))
    }

    // ==========================================
    // 统计
    // ==========================================

    /// 已获得学分 (已通过模块的学分之和)
    pub fn total_progress(&self) -> u32 {
        self.modules
            .iter()
            .filter(|m| m.is_passed())
            .map(Module::credits)
            .sum()
    }

    /// 计划学分 (全部模块的学分之和)
    pub fn planned_credits(&self) -> u32 {
        self.modules.iter().map(Module::credits).sum()
    }

    /// 已通过模块的平均成绩,保留两位小数;无数据时返回 0.0 (哨兵值)
    pub fn average_grade(&self) -> f64 {
        mean_rounded(self.modules.iter().filter_map(Module::final_grade))
    }

    /// 是否所有模块都已通过 (没有模块时为 false)
    pub fn is_complete(&self) -> bool {
        !self.modules.is_empty() && self.modules.iter().all(Module::is_passed)
    }

    /// 按计划学期分组
    pub fn modules_in_period(&self, period: u32) -> impl Iterator<Item = &Module> {
        self.modules.iter().filter(move |m| m.planned_period() == period)
    }
}

/// 反序列化的原始字段,经 Program::new 校验
#[derive(Deserialize)]
struct ProgramRecord {
    id: Option<i64>,
    name: String,
    standard_duration: u32,
    target_average: f64,
    #[serde(default)]
    semesters: Vec<Semester>,
    #[serde(default)]
    modules: Vec<Module>,
}

impl TryFrom<ProgramRecord> for Program {
    type Error = DomainError;

    fn try_from(record: ProgramRecord) -> DomainResult<Self> {
        let mut program = Program::new(&record.name, record.standard_duration, record.target_average)?;
        program.id = record.id;
        program.semesters = record.semesters;
        program.modules = record.modules;
        Ok(program)
    }
}

/// 月份加法,显式处理跨年
fn add_months(date: NaiveDate, months: u32) -> DomainResult<NaiveDate> {
    let mut month = date.month() + months;
    let mut year = date.year();
    while month > 12 {
        month -= 12;
        year += 1;
    }

    let mut day = date.day();
    loop {
        if let Some(next) = NaiveDate::from_ymd_opt(year, month, day) {
            return Ok(next);
        }
        if day <= 28 {
            return Err(DomainError::validation(
                "start_date",
                format!("无法计算 {} 之后 {} 个月的日期", date, months),
            ));
        }
        day -= 1;
    }
}

fn validate_target_average(target_average: f64) -> DomainResult<()> {
    crate::domain::attempt::validate_score(target_average).map_err(|_| {
        DomainError::validation("target_average", format!("目标平均分必须在 1.0 到 5.0 之间, 实际为 {}", target_average))
    })
}
