// ==========================================
// 学业进度看板 - 看板 API
// ==========================================
// 职责: 聚合单个学位项目的进度、成绩、学期计划与学习时长
// 说明: 纯只读聚合,不访问数据库;阈值来自 ConfigManager
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::time_entry::total_completed_minutes;
use crate::domain::{GradeBand, Module, ModuleStatus, Program, TimeEntry};

// ==========================================
// DashboardSummary - 看板汇总
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub program_id: Option<i64>,
    pub program_name: String,
    pub current_semester: u32,
    pub standard_duration: u32,

    // 学分进度
    pub earned_credits: u32,
    pub planned_credits: u32,
    pub progress_percent: u32,
    pub is_complete: bool,

    // 成绩
    pub average_grade: Option<f64>, // None = 尚无已通过模块
    pub target_average: f64,
    pub grade_band: GradeBand,

    pub semester_plan: Vec<SemesterPlanEntry>,

    // 学习时长
    pub total_study_minutes: i64,
    pub module_effort: Vec<ModuleEffort>,
}

/// 学期计划中的一行 (按学期序号 1..=标准学期数)
#[derive(Debug, Clone, Serialize)]
pub struct SemesterPlanEntry {
    pub number: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub modules: Vec<ModuleLine>,
    pub average_grade: Option<f64>,
    pub study_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleLine {
    pub module_id: Option<i64>,
    pub title: String,
    pub credits: u32,
    pub status: ModuleStatus,
    pub attempt_count: usize,
    pub grade: Option<f64>, // 仅已通过模块有成绩
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleEffort {
    pub module_id: Option<i64>,
    pub title: String,
    pub minutes: i64,
    pub formatted: String,
}

// ==========================================
// DashboardApi - 看板 API
// ==========================================
pub struct DashboardApi {
    config_manager: Arc<ConfigManager>,
}

impl DashboardApi {
    /// 创建新的DashboardApi实例
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 构建项目看板
    ///
    /// # 参数
    /// - program: 学位项目 (含学期与模块)
    /// - entries: 全部学习时间记录
    /// - today: 判定当前学期的基准日期
    pub fn build_summary(
        &self,
        program: &Program,
        entries: &[TimeEntry],
        today: NaiveDate,
    ) -> ApiResult<DashboardSummary> {
        let warning_margin = self
            .config_manager
            .get_grade_warning_margin()
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

        let current_semester = program.current_semester_number_on(today);
        let earned_credits = program.total_progress();
        let planned_credits = program.planned_credits();
        let average = program.average_grade();

        let semester_plan = (1..=program.standard_duration())
            .map(|number| build_plan_entry(program, entries, number, current_semester))
            .collect();

        let module_effort = program
            .modules
            .iter()
            .filter_map(|module| {
                let minutes = module.compute_effort(entries);
                (minutes > 0).then(|| ModuleEffort {
                    module_id: module.id,
                    title: module.title().to_string(),
                    minutes,
                    formatted: format_minutes(minutes),
                })
            })
            .collect();

        tracing::debug!(
            program = program.name(),
            current_semester,
            earned_credits,
            "dashboard summary built"
        );

        Ok(DashboardSummary {
            program_id: program.id,
            program_name: program.name().to_string(),
            current_semester,
            standard_duration: program.standard_duration(),
            earned_credits,
            planned_credits,
            progress_percent: progress_percent(earned_credits, planned_credits),
            is_complete: program.is_complete(),
            average_grade: non_sentinel(average),
            target_average: program.target_average(),
            grade_band: GradeBand::classify(average, program.target_average(), warning_margin),
            semester_plan,
            total_study_minutes: total_completed_minutes(entries),
            module_effort,
        })
    }
}

fn build_plan_entry(
    program: &Program,
    entries: &[TimeEntry],
    number: u32,
    current_semester: u32,
) -> SemesterPlanEntry {
    let semester = program.semester(number);
    let modules: Vec<ModuleLine> = program.modules_in_period(number).map(module_line).collect();

    SemesterPlanEntry {
        number,
        start_date: semester.map(|s| s.start_date),
        end_date: semester.map(|s| s.end_date),
        is_current: number == current_semester,
        modules,
        average_grade: semester.and_then(|s| non_sentinel(s.average_grade(&program.modules))),
        study_minutes: semester.map_or(0, |s| s.study_minutes(entries)),
    }
}

fn module_line(module: &Module) -> ModuleLine {
    ModuleLine {
        module_id: module.id,
        title: module.title().to_string(),
        credits: module.credits(),
        status: module.status(),
        attempt_count: module.attempts().len(),
        grade: module.final_grade(),
    }
}

fn non_sentinel(average: f64) -> Option<f64> {
    (average != 0.0).then_some(average)
}

/// 已获学分占计划学分的百分比 (四舍五入);无计划学分时为 0
fn progress_percent(earned: u32, planned: u32) -> u32 {
    if planned == 0 {
        return 0;
    }
    (f64::from(earned) / f64::from(planned) * 100.0).round() as u32
}

/// 分钟数格式化为 "1h 30min"
pub fn format_minutes(minutes: i64) -> String {
    format!("{}h {}min", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CompletedSession, PlannedSession};
    use std::sync::Mutex;

    fn api() -> DashboardApi {
        let conn = crate::db::open_in_memory().unwrap();
        let config = ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap();
        DashboardApi::new(Arc::new(config))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn completed(day: NaiveDate, minutes: i64, module_id: Option<i64>) -> TimeEntry {
        let start = day.and_hms_opt(10, 0, 0).unwrap();
        CompletedSession::new(day, start, start + chrono::Duration::minutes(minutes), module_id)
            .unwrap()
            .into()
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(90), "1h 30min");
        assert_eq!(format_minutes(45), "0h 45min");
        assert_eq!(format_minutes(0), "0h 0min");
    }

    #[test]
    fn test_empty_program_has_no_grade_data() {
        let program = Program::with_defaults("Informatik").unwrap();
        let summary = api().build_summary(&program, &[], date(2025, 1, 1)).unwrap();

        assert_eq!(summary.progress_percent, 0);
        assert_eq!(summary.average_grade, None);
        assert_eq!(summary.grade_band, GradeBand::NoData);
        assert_eq!(summary.semester_plan.len(), 6);
        assert!(!summary.is_complete);
        assert!(summary.module_effort.is_empty());
    }

    #[test]
    fn test_summary_aggregates_progress_plan_and_effort() {
        let mut program = Program::new("Wirtschaftsinformatik", 6, 2.0).unwrap();
        program.generate_semesters(date(2024, 10, 1)).unwrap();

        let mut math = Module::new("Mathematik", 10, 1).unwrap();
        math.id = Some(1);
        math.add_attempt(5.0).unwrap();
        math.add_attempt(2.7).unwrap();
        program.add_module(math);

        let mut stats = Module::new("Statistik", 5, 2).unwrap();
        stats.id = Some(2);
        program.add_module(stats);

        let entries = vec![
            completed(date(2024, 11, 4), 90, Some(1)),
            completed(date(2025, 5, 2), 30, None),
            PlannedSession::new(date(2025, 5, 3), date(2025, 5, 3).and_hms_opt(9, 0, 0).unwrap(), 60, "", Some(2))
                .unwrap()
                .into(),
        ];

        let summary = api().build_summary(&program, &entries, date(2025, 5, 1)).unwrap();

        assert_eq!(summary.current_semester, 2);
        assert_eq!(summary.earned_credits, 10);
        assert_eq!(summary.planned_credits, 15);
        assert_eq!(summary.progress_percent, 67);
        assert_eq!(summary.average_grade, Some(2.7));
        assert_eq!(summary.grade_band, GradeBand::Warning);
        assert_eq!(summary.total_study_minutes, 120);

        let first = &summary.semester_plan[0];
        assert_eq!(first.start_date, Some(date(2024, 10, 1)));
        assert_eq!(first.modules[0].grade, Some(2.7));
        assert_eq!(first.average_grade, Some(2.7));
        assert_eq!(first.study_minutes, 90);
        assert!(summary.semester_plan[1].is_current);
        assert_eq!(summary.semester_plan[1].study_minutes, 30);
        assert_eq!(summary.semester_plan[1].average_grade, None);

        assert_eq!(summary.module_effort.len(), 1);
        assert_eq!(summary.module_effort[0].formatted, "1h 30min");
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let program = Program::with_defaults("Informatik").unwrap();
        let summary = api().build_summary(&program, &[], date(2025, 1, 1)).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["grade_band"], "NO_DATA");
        assert!(json["average_grade"].is_null());
    }
}
