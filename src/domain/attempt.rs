// ==========================================
// 学业进度看板 - 考试记录领域模型
// ==========================================
// 红线: 成绩必须在 [1.0, 5.0] 范围内
// 对齐: schema attempt 表
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};

/// 最好成绩
pub const MIN_SCORE: f64 = 1.0;
/// 最差成绩
pub const MAX_SCORE: f64 = 5.0;
/// 及格线 (含)
pub const PASSING_SCORE: f64 = 4.0;

// ==========================================
// Attempt - 考试记录
// ==========================================
// 归属: 由唯一的 Module 独占持有
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AttemptRecord")]
pub struct Attempt {
    pub id: Option<i64>,     // 数据库ID (首次保存时分配)
    score: f64,              // 成绩 (只能通过 set_score 修改)
    attempt_number: u32,     // 第几次考试 (从 1 开始)
}

impl Attempt {
    /// 创建新的考试记录
    ///
    /// # 返回
    /// - Ok(Attempt): 成绩合法
    /// - Err(DomainError::Validation): 成绩超出 [1.0, 5.0] 或考试序号为 0
    pub fn new(score: f64, attempt_number: u32) -> DomainResult<Self> {
        validate_score(score)?;
        if attempt_number == 0 {
            return Err(DomainError::validation("attempt_number", "考试序号必须从 1 开始"));
        }
        Ok(Self {
            id: None,
            score,
            attempt_number,
        })
    }

    /// 从持久化数据恢复
    pub fn restore(id: i64, score: f64, attempt_number: u32) -> DomainResult<Self> {
        let mut attempt = Self::new(score, attempt_number)?;
        attempt.id = Some(id);
        Ok(attempt)
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    /// 更正成绩
    ///
    /// 校验失败时保持原成绩不变
    pub fn set_score(&mut self, score: f64) -> DomainResult<()> {
        validate_score(score)?;
        self.score = score;
        Ok(())
    }

    /// 是否通过 (4.0 也算通过)
    pub fn is_passing(&self) -> bool {
        self.score <= PASSING_SCORE
    }

    pub(crate) fn renumber(&mut self, attempt_number: u32) {
        self.attempt_number = attempt_number;
    }
}

/// 反序列化的原始字段,经 Attempt::new 校验后才成为 Attempt
#[derive(Deserialize)]
struct AttemptRecord {
    id: Option<i64>,
    score: f64,
    attempt_number: u32,
}

impl TryFrom<AttemptRecord> for Attempt {
    type Error = DomainError;

    fn try_from(record: AttemptRecord) -> DomainResult<Self> {
        let mut attempt = Attempt::new(record.score, record.attempt_number)?;
        attempt.id = record.id;
        Ok(attempt)
    }
}

/// 校验成绩范围
pub fn validate_score(score: f64) -> DomainResult<()> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(DomainError::validation(
            "score",
            format!("成绩必须在 {:.1} 到 {:.1} 之间, 实际为 {}", MIN_SCORE, MAX_SCORE, score),
        ));
    }
    Ok(())
}
