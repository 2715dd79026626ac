// ==========================================
// 学业进度看板 - 学习模块领域模型
// ==========================================
// 红线: 每个模块最多 3 次考试
// 红线: 状态只由考试记录推导 (derive_status),任何考试变更后立即重算
// 对齐: schema module 表
// ==========================================

use crate::domain::attempt::Attempt;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::time_entry::TimeEntry;
use crate::domain::types::ModuleStatus;
use serde::{Deserialize, Serialize};

/// 每个模块允许的最大考试次数
pub const MAX_ATTEMPTS: usize = 3;

// ==========================================
// Module - 学习模块
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModuleRecord")]
pub struct Module {
    pub id: Option<i64>,    // 数据库ID
    title: String,          // 模块名称
    credits: u32,           // ECTS 学分
    planned_period: u32,    // 计划学期序号
    status: ModuleStatus,   // 派生状态
    attempts: Vec<Attempt>, // 考试记录 (插入顺序 = 考试顺序)
}

/// 根据考试记录推导模块状态
///
/// 规则:
/// 1. 无考试 → OPEN
/// 2. 最近一次通过 (≤ 4.0) → PASSED
/// 3. 考试次数 ≥ 3 → FAILED
/// 4. 否则 → OPEN (还可以继续考)
pub fn derive_status(attempts: &[Attempt]) -> ModuleStatus {
    match attempts.last() {
        None => ModuleStatus::Open,
        Some(last) if last.is_passing() => ModuleStatus::Passed,
        Some(_) if attempts.len() >= MAX_ATTEMPTS => ModuleStatus::Failed,
        Some(_) => ModuleStatus::Open,
    }
}

impl Module {
    /// 创建新模块 (无考试记录,状态 OPEN)
    pub fn new(title: &str, credits: u32, planned_period: u32) -> DomainResult<Self> {
        let title = validate_title(title)?;
        validate_positive("credits", credits)?;
        validate_positive("planned_period", planned_period)?;
        Ok(Self {
            id: None,
            title,
            credits,
            planned_period,
            status: ModuleStatus::Open,
            attempts: Vec::new(),
        })
    }

    /// 从持久化数据恢复
    ///
    /// 状态不从存储读取,而是由考试记录重新推导
    pub fn restore(
        id: i64,
        title: &str,
        credits: u32,
        planned_period: u32,
        attempts: Vec<Attempt>,
    ) -> DomainResult<Self> {
        Self::assemble(Some(id), title, credits, planned_period, attempts)
    }

    fn assemble(
        id: Option<i64>,
        title: &str,
        credits: u32,
        planned_period: u32,
        attempts: Vec<Attempt>,
    ) -> DomainResult<Self> {
        let mut module = Self::new(title, credits, planned_period)?;
        if attempts.len() > MAX_ATTEMPTS {
            return Err(DomainError::Capacity {
                title: module.title,
                max: MAX_ATTEMPTS,
            });
        }
        module.id = id;
        module.attempts = attempts;
        module.refresh_status();
        Ok(module)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn credits(&self) -> u32 {
        self.credits
    }

    pub fn planned_period(&self) -> u32 {
        self.planned_period
    }

    pub fn status(&self) -> ModuleStatus {
        self.status
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// 重命名
    pub fn rename(&mut self, title: &str) -> DomainResult<()> {
        self.title = validate_title(title)?;
        Ok(())
    }

    pub fn set_credits(&mut self, credits: u32) -> DomainResult<()> {
        validate_positive("credits", credits)?;
        self.credits = credits;
        Ok(())
    }

    pub fn set_planned_period(&mut self, planned_period: u32) -> DomainResult<()> {
        validate_positive("planned_period", planned_period)?;
        self.planned_period = planned_period;
        Ok(())
    }

    /// 登记一次新考试
    ///
    /// # 返回
    /// - Err(DomainError::Capacity): 已有 3 次考试
    /// - Err(DomainError::Validation): 成绩超出范围
    ///
    /// 失败时考试记录与状态均保持不变
    pub fn add_attempt(&mut self, score: f64) -> DomainResult<&Attempt> {
        if self.attempts.len() >= MAX_ATTEMPTS {
            return Err(DomainError::Capacity {
                title: self.title.clone(),
                max: MAX_ATTEMPTS,
            });
        }
        let attempt = Attempt::new(score, self.attempts.len() as u32 + 1)?;
        self.attempts.push(attempt);
        self.refresh_status();
        Ok(&self.attempts[self.attempts.len() - 1])
    }

    /// 更正某次考试的成绩
    pub fn correct_score(&mut self, attempt_number: u32, score: f64) -> DomainResult<&Attempt> {
        let index = self.attempt_index(attempt_number)?;
        self.attempts[index].set_score(score)?;
        self.refresh_status();
        Ok(&self.attempts[index])
    }

    /// 删除某次考试
    ///
    /// 剩余考试重新编号为 1..=n,下一次 add_attempt 不会产生重复序号
    pub fn remove_attempt(&mut self, attempt_number: u32) -> DomainResult<Attempt> {
        let index = self.attempt_index(attempt_number)?;
        let removed = self.attempts.remove(index);
        for (i, attempt) in self.attempts.iter_mut().enumerate() {
            attempt.renumber(i as u32 + 1);
        }
        self.refresh_status();
        Ok(removed)
    }

    /// 重新计算状态
    pub fn refresh_status(&mut self) {
        self.status = derive_status(&self.attempts);
    }

    pub fn is_passed(&self) -> bool {
        self.status == ModuleStatus::Passed
    }

    /// 最近一次考试成绩
    pub fn latest_score(&self) -> Option<f64> {
        self.attempts.last().map(Attempt::score)
    }

    /// 已通过模块的最终成绩
    pub fn final_grade(&self) -> Option<f64> {
        if self.is_passed() {
            self.latest_score()
        } else {
            None
        }
    }

    /// 统计该模块的学习时长 (分钟)
    ///
    /// 只统计已完成的学习时段;未保存的模块 (id 为空) 没有关联记录
    pub fn compute_effort(&self, entries: &[TimeEntry]) -> i64 {
        let Some(id) = self.id else {
            return 0;
        };
        entries
            .iter()
            .filter_map(TimeEntry::as_completed)
            .filter(|session| session.module_id == Some(id))
            .map(|session| session.duration_minutes())
            .sum()
    }

    pub fn attempt(&self, attempt_number: u32) -> Option<&Attempt> {
        self.attempts.iter().find(|a| a.attempt_number() == attempt_number)
    }

    /// 持久化后回写考试记录 id
    pub(crate) fn assign_attempt_ids(&mut self, ids: &[(usize, i64)]) {
        for &(index, id) in ids {
            if let Some(attempt) = self.attempts.get_mut(index) {
                attempt.id = Some(id);
            }
        }
    }

    fn attempt_index(&self, attempt_number: u32) -> DomainResult<usize> {
        self.attempts
            .iter()
            .position(|a| a.attempt_number() == attempt_number)
            .ok_or_else(|| {
                DomainError::not_found(
                    "Attempt",
                    format!("#{} of module '{}'", attempt_number, self.title),
                )
            })
    }
}

/// 反序列化的原始字段;status 即使出现也被忽略,由考试记录重新推导
#[derive(Deserialize)]
struct ModuleRecord {
    id: Option<i64>,
    title: String,
    credits: u32,
    planned_period: u32,
    #[serde(default)]
    attempts: Vec<Attempt>,
}

impl TryFrom<ModuleRecord> for Module {
    type Error = DomainError;

    fn try_from(record: ModuleRecord) -> DomainResult<Self> {
        Module::assemble(
            record.id,
            &record.title,
            record.credits,
            record.planned_period,
            record.attempts,
        )
    }
}

fn validate_title(title: &str) -> DomainResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title", "名称不能为空"));
    }
    Ok(trimmed.to_string())
}

fn validate_positive(field: &str, value: u32) -> DomainResult<()> {
    if value == 0 {
        return Err(DomainError::validation(field, "必须为正整数"));
    }
    Ok(())
}
