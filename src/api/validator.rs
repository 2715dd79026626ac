// ==========================================
// 学业进度看板 - 输入校验器
// ==========================================
// 职责: 展示层输入 (日期、时间、成绩) 的解析与校验
// 格式: 日期 dd.mm.yyyy, 时间 HH:MM, 成绩允许小数逗号 (如 "2,3")
// ==========================================

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::attempt::validate_score;

pub const INPUT_DATE_FORMAT: &str = "%d.%m.%Y";
pub const INPUT_TIME_FORMAT: &str = "%H:%M";

/// 解析日期输入
///
/// # 参数
/// - input: 形如 "01.10.2024"
pub fn parse_date(input: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), INPUT_DATE_FORMAT).map_err(|_| {
        ApiError::ValidationError(format!("日期格式无效 (应为 TT.MM.JJJJ): {}", input))
    })
}

/// 解析时间输入 (时:分)
pub fn parse_time(input: &str) -> ApiResult<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), INPUT_TIME_FORMAT)
        .map_err(|_| ApiError::ValidationError(format!("时间格式无效 (应为 HH:MM): {}", input)))
}

/// 解析成绩输入
///
/// 接受小数点或小数逗号;范围校验与领域层一致 (1.0 ~ 5.0)
pub fn parse_score(input: &str) -> ApiResult<f64> {
    let normalized = input.trim().replace(',', ".");
    let score: f64 = normalized
        .parse()
        .map_err(|_| ApiError::ValidationError(format!("成绩不是数字: {}", input)))?;
    validate_score(score)?;
    Ok(score)
}

/// 校验学习时段 (结束时间必须晚于开始时间)
///
/// # 返回
/// - Ok((start, end)): 以 date 组合后的开始/结束时刻
pub fn validate_session_times(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> ApiResult<(NaiveDateTime, NaiveDateTime)> {
    if end <= start {
        return Err(ApiError::ValidationError(format!(
            "结束时间 {} 必须晚于开始时间 {}",
            end.format(INPUT_TIME_FORMAT),
            start.format(INPUT_TIME_FORMAT)
        )));
    }
    Ok((date.and_time(start), date.and_time(end)))
}
