// ==========================================
// 学业进度看板 - 行映射辅助函数
// ==========================================
// 日期/时间统一以可排序的 ISO-8601 文本存储
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::Row;

/// 日期格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// 日期时间格式 (秒的小数部分非零时才写出,解析时可省略)
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_datetime(datetime: NaiveDateTime) -> String {
    datetime.format(DATETIME_FORMAT).to_string()
}

/// 读取日期列
pub fn get_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 读取日期时间列
pub fn get_datetime(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 读取必填但在 schema 中可空的列 (按类型标签区分的变体字段)
pub fn get_required<T: rusqlite::types::FromSql>(row: &Row, idx: usize, field: &str) -> rusqlite::Result<T> {
    row.get::<_, Option<T>>(idx)?.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Null,
            format!("字段 {} 不能为空", field).into(),
        )
    })
}

/// 将领域校验错误包装为行转换错误
pub fn domain_failure(idx: usize, err: crate::domain::DomainError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Null, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_keeps_subsecond_precision() {
        let whole = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(9, 30, 0).unwrap();
        assert_eq!(format_datetime(whole), "2025-06-01T09:30:00");

        let precise = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_nano_opt(9, 30, 0, 250_000_000)
            .unwrap();
        let text = format_datetime(precise);
        assert_eq!(text, "2025-06-01T09:30:00.250");
        assert_eq!(NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT).unwrap(), precise);
        assert_eq!(
            NaiveDateTime::parse_from_str("2025-06-01T09:30:00", DATETIME_FORMAT).unwrap(),
            whole
        );
    }
}
