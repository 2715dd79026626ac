// ==========================================
// 学业进度看板 - 学习时间记录数据仓储
// ==========================================
// 职责: time_entry 表的 CRUD
// 红线: Repository 不含业务逻辑
// 说明: entry_type 区分两种记录;两种记录写入互不相交的可选列
//       PLANNED   → planned_minutes / description
//       COMPLETED → end_time / actual_minutes
// ==========================================

use crate::domain::{CompletedSession, PlannedSession, TimeEntry, TimeEntryKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{
    domain_failure, format_date, format_datetime, get_date, get_datetime, get_required,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::debug;

const SELECT_COLUMNS: &str = r#"SELECT id, entry_type, entry_date, start_time, end_time,
                                       planned_minutes, actual_minutes, description, module_id
                                FROM time_entry"#;

// ==========================================
// TimeEntryRepository - 学习时间记录仓储
// ==========================================
pub struct TimeEntryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TimeEntryRepository {
    /// 创建新的TimeEntryRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存时间记录
    ///
    /// # 说明
    /// - id 为空 → INSERT 并回写 id;否则按 id UPDATE
    /// - 更新时类型标签一并写入,另一变体的列清空
    ///
    /// # 返回
    /// - `Ok(entry_id)`
    /// - `Err(NotFound)`: 按 id 更新时记录已不存在
    pub fn save(&self, entry: &mut TimeEntry) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let kind = entry.kind().to_db_str();

        let (end_time, planned_minutes, actual_minutes, description) = match &*entry {
            TimeEntry::Planned(p) => (None, Some(p.planned_minutes()), None, Some(p.description.clone())),
            TimeEntry::Completed(c) => (
                Some(format_datetime(c.end_time())),
                None,
                Some(c.duration_minutes()),
                None,
            ),
        };

        let entry_id = match entry.id() {
            None => {
                conn.execute(
                    r#"INSERT INTO time_entry (
                           entry_type, entry_date, start_time, end_time,
                           planned_minutes, actual_minutes, description, module_id
                       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![
                        kind,
                        format_date(entry.date()),
                        format_datetime(entry.start_time()),
                        end_time,
                        planned_minutes,
                        actual_minutes,
                        description,
                        entry.module_id(),
                    ],
                )?;
                let id = conn.last_insert_rowid();
                entry.set_id(id);
                id
            }
            Some(id) => {
                let updated = conn.execute(
                    r#"UPDATE time_entry
                       SET entry_type = ?1, entry_date = ?2, start_time = ?3, end_time = ?4,
                           planned_minutes = ?5, actual_minutes = ?6, description = ?7, module_id = ?8
                       WHERE id = ?9"#,
                    params![
                        kind,
                        format_date(entry.date()),
                        format_datetime(entry.start_time()),
                        end_time,
                        planned_minutes,
                        actual_minutes,
                        description,
                        entry.module_id(),
                        id,
                    ],
                )?;
                if updated == 0 {
                    return Err(RepositoryError::not_found("TimeEntry", id));
                }
                id
            }
        };

        debug!(entry_id, kind, "time entry saved");
        Ok(entry_id)
    }

    /// 查询全部时间记录
    ///
    /// # 返回
    /// - `Ok(Vec<TimeEntry>)`: 按日期、开始时间升序
    pub fn list_all(&self) -> RepositoryResult<Vec<TimeEntry>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY entry_date ASC, start_time ASC, id ASC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let entries = stmt
            .query_map([], map_row)?
            .collect::<Result<Vec<TimeEntry>, _>>()?;

        Ok(entries)
    }

    /// 按id查询
    pub fn find_by_id(&self, entry_id: i64) -> RepositoryResult<Option<TimeEntry>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);

        match conn.query_row(&sql, params![entry_id], map_row) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 删除时间记录
    pub fn delete(&self, entry_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM time_entry WHERE id = ?1", params![entry_id])?;
        if deleted == 0 {
            return Err(RepositoryError::not_found("TimeEntry", entry_id));
        }
        debug!(entry_id, "time entry deleted");
        Ok(())
    }
}

/// 映射数据库行到TimeEntry (按类型标签还原变体)
fn map_row(row: &rusqlite::Row) -> rusqlite::Result<TimeEntry> {
    let id: i64 = row.get(0)?;
    let tag: String = row.get(1)?;
    let date = get_date(row, 2)?;
    let start_time = get_datetime(row, 3)?;
    let module_id: Option<i64> = row.get(8)?;

    let kind = TimeEntryKind::from_db_str(&tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("未知的记录类型: {}", tag).into(),
        )
    })?;

    let mut entry = match kind {
        TimeEntryKind::Planned => {
            let planned_minutes: u32 = get_required(row, 5, "planned_minutes")?;
            let description: Option<String> = row.get(7)?;
            PlannedSession::new(
                date,
                start_time,
                planned_minutes,
                description.as_deref().unwrap_or_default(),
                module_id,
            )
            .map(TimeEntry::Planned)
            .map_err(|e| domain_failure(5, e))?
        }
        TimeEntryKind::Completed => {
            let end_time = match row.get::<_, Option<String>>(4)? {
                Some(_) => get_datetime(row, 4)?,
                None => {
                    return Err(rusqlite::Error::FromSqlConversionFailure(
                        4,
                        Type::Null,
                        "字段 end_time 不能为空".into(),
                    ))
                }
            };
            CompletedSession::new(date, start_time, end_time, module_id)
                .map(TimeEntry::Completed)
                .map_err(|e| domain_failure(4, e))?
        }
    };

    entry.set_id(id);
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup() -> TimeEntryRepository {
        let conn = crate::db::open_in_memory().unwrap();
        TimeEntryRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_roundtrip_both_variants_ordered_by_date() {
        let repo = setup();
        let mut later: TimeEntry = PlannedSession::new(day(20), day(20).and_hms_opt(9, 0, 0).unwrap(), 90, "Altklausuren", None)
            .unwrap()
            .into();
        let mut earlier: TimeEntry = CompletedSession::new(
            day(3),
            day(3).and_hms_opt(14, 0, 0).unwrap(),
            day(3).and_hms_opt(15, 30, 0).unwrap(),
            None,
        )
        .unwrap()
        .into();

        repo.save(&mut later).unwrap();
        repo.save(&mut earlier).unwrap();

        let loaded = repo.list_all().unwrap();
        assert_eq!(loaded, vec![earlier, later]);
        assert_eq!(loaded[0].duration_minutes(), 90);
        assert_eq!(loaded[0].kind(), TimeEntryKind::Completed);
    }

    #[test]
    fn test_update_keeps_identity() {
        let repo = setup();
        let mut entry: TimeEntry = PlannedSession::new(day(1), day(1).and_hms_opt(8, 0, 0).unwrap(), 30, "Lesen", None)
            .unwrap()
            .into();
        let id = repo.save(&mut entry).unwrap();

        if let TimeEntry::Planned(p) = &mut entry {
            p.set_planned_minutes(45).unwrap();
            p.description = "Lesen + Notizen".to_string();
        }
        assert_eq!(repo.save(&mut entry).unwrap(), id);

        let loaded = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(loaded.duration_minutes(), 45);
        assert_eq!(loaded.as_planned().unwrap().description, "Lesen + Notizen");
    }

    #[test]
    fn test_subsecond_times_roundtrip_with_same_duration() {
        let repo = setup();
        let start = day(9).and_hms_nano_opt(10, 0, 0, 900_000_000).unwrap();
        let end = day(9).and_hms_nano_opt(10, 45, 0, 100_000_000).unwrap();
        let mut entry: TimeEntry = CompletedSession::new(day(9), start, end, None).unwrap().into();
        assert_eq!(entry.duration_minutes(), 44);

        let id = repo.save(&mut entry).unwrap();
        let loaded = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(loaded, entry);
        assert_eq!(loaded.duration_minutes(), 44);
    }

    #[test]
    fn test_delete_unknown_is_not_found() {
        let repo = setup();
        assert!(matches!(repo.delete(3), Err(RepositoryError::NotFound { .. })));
    }
}
