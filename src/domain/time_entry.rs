// ==========================================
// 学业进度看板 - 学习时间记录领域模型
// ==========================================
// 两种记录: 计划学习时段 / 已完成学习时段
// 红线: module_id 只是引用,不是归属;删除模块只清空引用
// 对齐: schema time_entry 表 (entry_type 区分类型)
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::types::TimeEntryKind;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// PlannedSession - 计划学习时段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PlannedRecord")]
pub struct PlannedSession {
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub start_time: NaiveDateTime,
    planned_minutes: u32,        // 计划时长 (分钟)
    pub description: String,     // 学习内容
    pub module_id: Option<i64>,  // 关联模块 (可选)
}

impl PlannedSession {
    pub fn new(
        date: NaiveDate,
        start_time: NaiveDateTime,
        planned_minutes: u32,
        description: &str,
        module_id: Option<i64>,
    ) -> DomainResult<Self> {
        validate_planned_minutes(planned_minutes)?;
        Ok(Self {
            id: None,
            date,
            start_time,
            planned_minutes,
            description: description.trim().to_string(),
            module_id,
        })
    }

    pub fn planned_minutes(&self) -> u32 {
        self.planned_minutes
    }

    pub fn set_planned_minutes(&mut self, planned_minutes: u32) -> DomainResult<()> {
        validate_planned_minutes(planned_minutes)?;
        self.planned_minutes = planned_minutes;
        Ok(())
    }

    /// 计划时长 (分钟)
    pub fn duration_minutes(&self) -> i64 {
        i64::from(self.planned_minutes)
    }

    /// 按实际学习时长生成已完成时段
    ///
    /// 结束时间 = 开始时间 + 实际时长;日期、开始时间与模块引用保持不变。
    /// 新时段尚未保存 (id 为空),原计划时段由调用方删除。
    pub fn confirm(&self, actual_minutes: u32) -> DomainResult<CompletedSession> {
        let end_time = self.start_time + Duration::minutes(i64::from(actual_minutes));
        CompletedSession::new(self.date, self.start_time, end_time, self.module_id)
    }
}

// ==========================================
// CompletedSession - 已完成学习时段
// ==========================================
// 实际时长在构造时推导,修改起止时间时重新推导
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CompletedRecord")]
pub struct CompletedSession {
    pub id: Option<i64>,
    pub date: NaiveDate,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    actual_minutes: i64,
    pub module_id: Option<i64>,
}

impl CompletedSession {
    /// 创建已完成时段
    ///
    /// # 返回
    /// - Err(DomainError::Validation): 结束时间不晚于开始时间
    pub fn new(
        date: NaiveDate,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        module_id: Option<i64>,
    ) -> DomainResult<Self> {
        let actual_minutes = derive_minutes(start_time, end_time)?;
        Ok(Self {
            id: None,
            date,
            start_time,
            end_time,
            actual_minutes,
            module_id,
        })
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    pub fn end_time(&self) -> NaiveDateTime {
        self.end_time
    }

    /// 修改起止时间并重新推导实际时长
    pub fn set_times(&mut self, start_time: NaiveDateTime, end_time: NaiveDateTime) -> DomainResult<()> {
        self.actual_minutes = derive_minutes(start_time, end_time)?;
        self.start_time = start_time;
        self.end_time = end_time;
        Ok(())
    }

    /// 实际时长 (分钟)
    pub fn duration_minutes(&self) -> i64 {
        self.actual_minutes
    }
}

// 反序列化的原始字段,经构造函数校验;actual_minutes 总是重新推导
#[derive(Deserialize)]
struct PlannedRecord {
    id: Option<i64>,
    date: NaiveDate,
    start_time: NaiveDateTime,
    planned_minutes: u32,
    #[serde(default)]
    description: String,
    module_id: Option<i64>,
}

impl TryFrom<PlannedRecord> for PlannedSession {
    type Error = DomainError;

    fn try_from(record: PlannedRecord) -> DomainResult<Self> {
        let mut session = PlannedSession::new(
            record.date,
            record.start_time,
            record.planned_minutes,
            &record.description,
            record.module_id,
        )?;
        session.id = record.id;
        Ok(session)
    }
}

#[derive(Deserialize)]
struct CompletedRecord {
    id: Option<i64>,
    date: NaiveDate,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    module_id: Option<i64>,
}

impl TryFrom<CompletedRecord> for CompletedSession {
    type Error = DomainError;

    fn try_from(record: CompletedRecord) -> DomainResult<Self> {
        let mut session =
            CompletedSession::new(record.date, record.start_time, record.end_time, record.module_id)?;
        session.id = record.id;
        Ok(session)
    }
}

// ==========================================
// TimeEntry - 学习时间记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeEntry {
    Planned(PlannedSession),
    Completed(CompletedSession),
}

impl TimeEntry {
    pub fn kind(&self) -> TimeEntryKind {
        match self {
            TimeEntry::Planned(_) => TimeEntryKind::Planned,
            TimeEntry::Completed(_) => TimeEntryKind::Completed,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            TimeEntry::Planned(p) => p.id,
            TimeEntry::Completed(c) => c.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        match self {
            TimeEntry::Planned(p) => p.id = Some(id),
            TimeEntry::Completed(c) => c.id = Some(id),
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            TimeEntry::Planned(p) => p.date,
            TimeEntry::Completed(c) => c.date,
        }
    }

    pub fn start_time(&self) -> NaiveDateTime {
        match self {
            TimeEntry::Planned(p) => p.start_time,
            TimeEntry::Completed(c) => c.start_time,
        }
    }

    pub fn module_id(&self) -> Option<i64> {
        match self {
            TimeEntry::Planned(p) => p.module_id,
            TimeEntry::Completed(c) => c.module_id,
        }
    }

    pub fn set_module_id(&mut self, module_id: Option<i64>) {
        match self {
            TimeEntry::Planned(p) => p.module_id = module_id,
            TimeEntry::Completed(c) => c.module_id = module_id,
        }
    }

    /// 时长 (分钟)
    pub fn duration_minutes(&self) -> i64 {
        match self {
            TimeEntry::Planned(p) => p.duration_minutes(),
            TimeEntry::Completed(c) => c.duration_minutes(),
        }
    }

    pub fn as_planned(&self) -> Option<&PlannedSession> {
        match self {
            TimeEntry::Planned(p) => Some(p),
            TimeEntry::Completed(_) => None,
        }
    }

    pub fn as_completed(&self) -> Option<&CompletedSession> {
        match self {
            TimeEntry::Planned(_) => None,
            TimeEntry::Completed(c) => Some(c),
        }
    }
}

impl From<PlannedSession> for TimeEntry {
    fn from(session: PlannedSession) -> Self {
        TimeEntry::Planned(session)
    }
}

impl From<CompletedSession> for TimeEntry {
    fn from(session: CompletedSession) -> Self {
        TimeEntry::Completed(session)
    }
}

/// 清空引用了已删除模块的时间记录 (与数据库 ON DELETE SET NULL 保持一致)
///
/// # 返回
/// 被清空引用的记录数
pub fn detach_module(entries: &mut [TimeEntry], module_id: i64) -> usize {
    let mut detached = 0;
    for entry in entries.iter_mut().filter(|e| e.module_id() == Some(module_id)) {
        entry.set_module_id(None);
        detached += 1;
    }
    detached
}

/// 已完成时段的总时长 (分钟)
pub fn total_completed_minutes(entries: &[TimeEntry]) -> i64 {
    entries
        .iter()
        .filter_map(TimeEntry::as_completed)
        .map(CompletedSession::duration_minutes)
        .sum()
}

fn derive_minutes(start_time: NaiveDateTime, end_time: NaiveDateTime) -> DomainResult<i64> {
    if end_time <= start_time {
        return Err(DomainError::validation(
            "end_time",
            format!("结束时间 {} 必须晚于开始时间 {}", end_time, start_time),
        ));
    }
    // 不足一分钟的部分舍去
    Ok((end_time - start_time).num_seconds() / 60)
}

fn validate_planned_minutes(planned_minutes: u32) -> DomainResult<()> {
    if planned_minutes == 0 {
        return Err(DomainError::validation("planned_minutes", "计划时长必须大于 0 分钟"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
    }

    #[test]
    fn test_completed_session_duration() {
        let session = CompletedSession::new(day(), at(14, 0), at(15, 30), None).unwrap();
        assert_eq!(session.duration_minutes(), 90);
    }

    #[test]
    fn test_completed_session_floors_partial_minutes() {
        let end = at(14, 10) + Duration::seconds(59);
        let session = CompletedSession::new(day(), at(14, 0), end, None).unwrap();
        assert_eq!(session.duration_minutes(), 10);
    }

    #[test]
    fn test_completed_session_rejects_end_not_after_start() {
        assert!(CompletedSession::new(day(), at(14, 0), at(14, 0), None).is_err());
        assert!(CompletedSession::new(day(), at(14, 0), at(13, 0), None).is_err());
    }

    #[test]
    fn test_set_times_rederives_duration() {
        let mut session = CompletedSession::new(day(), at(9, 0), at(10, 0), None).unwrap();
        session.set_times(at(9, 0), at(11, 15)).unwrap();
        assert_eq!(session.duration_minutes(), 135);

        assert!(session.set_times(at(12, 0), at(11, 0)).is_err());
        assert_eq!(session.end_time(), at(11, 15));
        assert_eq!(session.duration_minutes(), 135);
    }

    #[test]
    fn test_planned_session_duration_and_confirm() {
        let planned = PlannedSession::new(day(), at(18, 0), 60, "Klausurvorbereitung", Some(3)).unwrap();
        assert_eq!(planned.duration_minutes(), 60);

        let completed = planned.confirm(45).unwrap();
        assert_eq!(completed.date, planned.date);
        assert_eq!(completed.start_time(), planned.start_time);
        assert_eq!(completed.end_time(), at(18, 45));
        assert_eq!(completed.duration_minutes(), 45);
        assert_eq!(completed.module_id, Some(3));
        assert_eq!(completed.id, None);

        assert!(planned.confirm(0).is_err());
    }

    #[test]
    fn test_deserialize_runs_constructor_checks() {
        let entry: TimeEntry = serde_json::from_str(
            r#"{"type":"COMPLETED","id":5,"date":"2025-03-04","start_time":"2025-03-04T09:00:00",
                "end_time":"2025-03-04T10:30:00","actual_minutes":999,"module_id":null}"#,
        )
        .unwrap();
        assert_eq!(entry.id(), Some(5));
        assert_eq!(entry.duration_minutes(), 90);

        let backwards = serde_json::from_str::<TimeEntry>(
            r#"{"type":"COMPLETED","id":5,"date":"2025-03-04","start_time":"2025-03-04T10:30:00",
                "end_time":"2025-03-04T09:00:00","module_id":null}"#,
        );
        assert!(backwards.is_err());

        let zero_minutes = serde_json::from_str::<TimeEntry>(
            r#"{"type":"PLANNED","id":null,"date":"2025-03-04","start_time":"2025-03-04T09:00:00",
                "planned_minutes":0,"description":"x","module_id":null}"#,
        );
        assert!(zero_minutes.is_err());
    }

    #[test]
    fn test_detach_module_clears_only_matching_references() {
        let mut entries: Vec<TimeEntry> = vec![
            PlannedSession::new(day(), at(8, 0), 30, "a", Some(1)).unwrap().into(),
            CompletedSession::new(day(), at(9, 0), at(10, 0), Some(1)).unwrap().into(),
            CompletedSession::new(day(), at(11, 0), at(12, 0), Some(2)).unwrap().into(),
        ];
        assert_eq!(detach_module(&mut entries, 1), 2);
        assert_eq!(entries[0].module_id(), None);
        assert_eq!(entries[1].module_id(), None);
        assert_eq!(entries[2].module_id(), Some(2));
        assert_eq!(total_completed_minutes(&entries), 120);
    }
}
