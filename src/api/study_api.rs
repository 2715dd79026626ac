// ==========================================
// 学业进度看板 - 学业数据 API
// ==========================================
// 职责: 加载/保存/删除的门面,以及跨仓储的业务流程
//       (创建项目、计划时段转为已完成、成绩更正、删除考试)
// 说明: 每个仓储操作独立提交,整体保存不包在一个事务中
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::time_entry::detach_module;
use crate::domain::{Attempt, Program, TimeEntry};
use crate::repository::{ModuleRepository, ProgramRepository, TimeEntryRepository};

/// 全部已持久化的学业数据
#[derive(Debug, Clone, Default, Serialize)]
pub struct StudyData {
    pub programs: Vec<Program>,
    pub time_entries: Vec<TimeEntry>,
}

// ==========================================
// StudyApi - 学业数据 API
// ==========================================
pub struct StudyApi {
    program_repo: Arc<ProgramRepository>,
    module_repo: Arc<ModuleRepository>,
    time_entry_repo: Arc<TimeEntryRepository>,
    config_manager: Arc<ConfigManager>,
}

impl StudyApi {
    /// 创建新的StudyApi实例
    pub fn new(
        program_repo: Arc<ProgramRepository>,
        module_repo: Arc<ModuleRepository>,
        time_entry_repo: Arc<TimeEntryRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            program_repo,
            module_repo,
            time_entry_repo,
            config_manager,
        }
    }

    // ==========================================
    // 加载 / 保存
    // ==========================================

    /// 加载全部项目 (含学期、模块、考试) 与全部时间记录
    pub fn load_all(&self) -> ApiResult<StudyData> {
        let mut programs = self.program_repo.list_all()?;
        for program in programs.iter_mut() {
            if let Some(program_id) = program.id {
                program.modules = self.module_repo.find_by_program(program_id)?;
            }
        }
        let time_entries = self.time_entry_repo.list_all()?;

        info!(
            programs = programs.len(),
            time_entries = time_entries.len(),
            "study data loaded"
        );
        Ok(StudyData {
            programs,
            time_entries,
        })
    }

    /// 保存项目 (含学期) 及其全部模块
    ///
    /// 项目与学期一个事务;之后每个模块各自一个事务
    pub fn save_program(&self, program: &mut Program) -> ApiResult<i64> {
        let program_id = self.program_repo.save(program)?;
        for module in program.modules.iter_mut() {
            self.module_repo.save(module, program_id)?;
        }
        info!(program_id, modules = program.modules.len(), "program saved");
        Ok(program_id)
    }

    pub fn save_time_entry(&self, entry: &mut TimeEntry) -> ApiResult<i64> {
        Ok(self.time_entry_repo.save(entry)?)
    }

    // ==========================================
    // 删除
    // ==========================================

    /// 删除项目 (学期、模块、考试级联删除)
    ///
    /// 存储删除成功后,同步移除内存中的项目,并清空引用其模块的时间记录
    pub fn delete_program(&self, data: &mut StudyData, program_id: i64) -> ApiResult<()> {
        self.program_repo.delete(program_id)?;

        let mut detached = 0;
        if let Some(index) = data.programs.iter().position(|p| p.id == Some(program_id)) {
            let program = data.programs.remove(index);
            for module_id in program.modules.iter().filter_map(|m| m.id) {
                detached += detach_module(&mut data.time_entries, module_id);
            }
        }
        info!(program_id, detached, "program deleted");
        Ok(())
    }

    /// 删除模块 (考试级联删除;时间记录的模块引用置空)
    ///
    /// 存储与内存保持一致: 模块从所属项目移除,引用它的时间记录 module_id 置空
    pub fn delete_module(&self, data: &mut StudyData, module_id: i64) -> ApiResult<()> {
        self.module_repo.delete(module_id)?;

        for program in data.programs.iter_mut() {
            if program.remove_module(module_id).is_some() {
                break;
            }
        }
        let detached = detach_module(&mut data.time_entries, module_id);
        info!(module_id, detached, "module deleted");
        Ok(())
    }

    /// 按 id 删除考试
    ///
    /// 内存中能找到时走 remove_attempt (重新编号并同步状态);否则只删除存储中的记录
    pub fn delete_attempt(&self, data: &mut StudyData, attempt_id: i64) -> ApiResult<()> {
        let location = data.programs.iter().enumerate().find_map(|(index, program)| {
            program.modules.iter().find_map(|module| {
                let attempt = module.attempts().iter().find(|a| a.id == Some(attempt_id))?;
                Some((index, module.id?, attempt.attempt_number()))
            })
        });

        match location {
            Some((index, module_id, attempt_number)) => {
                self.remove_attempt(&mut data.programs[index], module_id, attempt_number)?;
            }
            None => self.module_repo.delete_attempt(attempt_id)?,
        }
        info!(attempt_id, "attempt deleted");
        Ok(())
    }

    pub fn delete_time_entry(&self, data: &mut StudyData, entry_id: i64) -> ApiResult<()> {
        self.time_entry_repo.delete(entry_id)?;
        data.time_entries.retain(|entry| entry.id() != Some(entry_id));
        info!(entry_id, "time entry deleted");
        Ok(())
    }

    // ==========================================
    // 业务流程
    // ==========================================

    /// 创建并保存新项目
    ///
    /// # 参数
    /// - name: 项目名称
    /// - standard_duration / target_average: 为空时取配置默认值
    /// - start_date: 有值时按该日期生成学期
    pub fn create_program(
        &self,
        name: &str,
        standard_duration: Option<u32>,
        target_average: Option<f64>,
        start_date: Option<NaiveDate>,
    ) -> ApiResult<Program> {
        let standard_duration = match standard_duration {
            Some(value) => value,
            None => self
                .config_manager
                .get_default_standard_duration()
                .map_err(|e| ApiError::DatabaseError(e.to_string()))?,
        };
        let target_average = match target_average {
            Some(value) => value,
            None => self
                .config_manager
                .get_default_target_average()
                .map_err(|e| ApiError::DatabaseError(e.to_string()))?,
        };

        let mut program = Program::new(name, standard_duration, target_average)?;
        if let Some(start) = start_date {
            program.generate_semesters(start)?;
        }
        self.save_program(&mut program)?;
        Ok(program)
    }

    /// 将计划时段确认为已完成时段
    ///
    /// # 说明
    /// - 结束时间 = 开始时间 + 实际分钟数
    /// - 先保存新时段,再删除计划时段 (两步,非原子)
    /// - 删除失败时返回错误,新旧两条记录都保留
    ///
    /// # 返回
    /// - Ok(completed_id): 新时段的 id
    pub fn confirm_planned_session(
        &self,
        entries: &mut Vec<TimeEntry>,
        planned_id: i64,
        actual_minutes: u32,
    ) -> ApiResult<i64> {
        let planned = entries
            .iter()
            .filter_map(TimeEntry::as_planned)
            .find(|p| p.id == Some(planned_id))
            .ok_or_else(|| ApiError::NotFound(format!("计划时段(id={})不存在", planned_id)))?;

        let mut completed: TimeEntry = planned.confirm(actual_minutes)?.into();
        let completed_id = self.time_entry_repo.save(&mut completed)?;
        entries.push(completed);

        if let Err(e) = self.time_entry_repo.delete(planned_id) {
            warn!(planned_id, completed_id, error = %e, "planned session kept after promotion");
            return Err(e.into());
        }
        entries.retain(|entry| entry.id() != Some(planned_id));

        info!(planned_id, completed_id, actual_minutes, "planned session confirmed");
        Ok(completed_id)
    }

    /// 更正某次考试的成绩并立即落库
    ///
    /// 已保存的考试按行更新并同步模块状态;未保存的考试随模块一起保存
    pub fn correct_attempt_score(
        &self,
        program: &mut Program,
        module_id: i64,
        attempt_number: u32,
        score: f64,
    ) -> ApiResult<Attempt> {
        let program_id = persisted_program_id(program)?;
        let module = program
            .module_mut(module_id)
            .ok_or_else(|| ApiError::NotFound(format!("Module(id={})不存在", module_id)))?;

        let attempt = module.correct_score(attempt_number, score)?.clone();
        if attempt.id.is_some() {
            self.module_repo.update_attempt(&attempt)?;
            self.module_repo.update_status(module_id, module.status())?;
        } else {
            self.module_repo.save(module, program_id)?;
        }

        info!(
            module_id,
            attempt_number,
            score,
            status = %module.status(),
            "attempt score corrected"
        );
        Ok(attempt)
    }

    /// 删除某次考试;剩余考试重新编号并随模块保存
    pub fn remove_attempt(
        &self,
        program: &mut Program,
        module_id: i64,
        attempt_number: u32,
    ) -> ApiResult<Attempt> {
        let program_id = persisted_program_id(program)?;
        let module = program
            .module_mut(module_id)
            .ok_or_else(|| ApiError::NotFound(format!("Module(id={})不存在", module_id)))?;

        let attempt_id = module
            .attempt(attempt_number)
            .ok_or_else(|| {
                ApiError::NotFound(format!("Attempt(number={})不存在", attempt_number))
            })?
            .id;
        if let Some(id) = attempt_id {
            self.module_repo.delete_attempt(id)?;
        }

        let removed = module.remove_attempt(attempt_number)?;
        self.module_repo.save(module, program_id)?;

        info!(module_id, attempt_number, status = %module.status(), "attempt removed");
        Ok(removed)
    }
}

fn persisted_program_id(program: &Program) -> ApiResult<i64> {
    program
        .id
        .ok_or_else(|| ApiError::ValidationError(format!("项目 '{}' 尚未保存", program.name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Module, ModuleStatus, PlannedSession};
    use std::sync::Mutex;

    fn setup() -> StudyApi {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory().unwrap()));
        StudyApi::new(
            Arc::new(ProgramRepository::new(conn.clone())),
            Arc::new(ModuleRepository::new(conn.clone())),
            Arc::new(TimeEntryRepository::new(conn.clone())),
            Arc::new(ConfigManager::from_connection(conn).unwrap()),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_create_program_uses_config_defaults() {
        let api = setup();
        api.config_manager
            .set_config_value(crate::config::config_keys::DEFAULT_STANDARD_DURATION, "4")
            .unwrap();

        let program = api
            .create_program("Data Science", None, None, Some(date(2024, 10, 1)))
            .unwrap();
        assert!(program.id.is_some());
        assert_eq!(program.standard_duration(), 4);
        assert_eq!(program.target_average(), 2.0);
        assert_eq!(program.semesters.len(), 4);

        let loaded = api.load_all().unwrap();
        assert_eq!(loaded.programs, vec![program]);
    }

    #[test]
    fn test_confirm_planned_session_replaces_entry() {
        let api = setup();
        let start = date(2025, 3, 1).and_hms_opt(9, 0, 0).unwrap();
        let mut planned: TimeEntry = PlannedSession::new(date(2025, 3, 1), start, 120, "Übungsblatt", None)
            .unwrap()
            .into();
        let planned_id = api.save_time_entry(&mut planned).unwrap();
        let mut entries = vec![planned];

        let completed_id = api.confirm_planned_session(&mut entries, planned_id, 75).unwrap();

        assert_eq!(entries.len(), 1);
        let completed = entries[0].as_completed().unwrap();
        assert_eq!(completed.id, Some(completed_id));
        assert_eq!(completed.duration_minutes(), 75);
        assert_eq!(completed.start_time(), start);

        let stored = api.load_all().unwrap().time_entries;
        assert_eq!(stored, entries);
    }

    #[test]
    fn test_confirm_unknown_planned_session_is_not_found() {
        let api = setup();
        let mut entries = Vec::new();
        assert!(matches!(
            api.confirm_planned_session(&mut entries, 9, 30),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_correct_and_remove_attempt_persist() {
        let api = setup();
        let mut program = api.create_program("Informatik", None, None, None).unwrap();
        let mut module = Module::new("Algorithmen", 5, 1).unwrap();
        module.add_attempt(5.0).unwrap();
        module.add_attempt(4.3).unwrap();
        program.add_module(module);
        api.save_program(&mut program).unwrap();
        let module_id = program.modules[0].id.unwrap();

        api.correct_attempt_score(&mut program, module_id, 2, 3.0).unwrap();
        let reloaded = api.load_all().unwrap();
        assert_eq!(reloaded.programs[0].modules[0].status(), ModuleStatus::Passed);
        assert_eq!(reloaded.programs[0].modules[0].latest_score(), Some(3.0));

        api.remove_attempt(&mut program, module_id, 1).unwrap();
        let reloaded = api.load_all().unwrap();
        let module = &reloaded.programs[0].modules[0];
        assert_eq!(module.attempts().len(), 1);
        assert_eq!(module.attempts()[0].attempt_number(), 1);
        assert_eq!(module.attempts()[0].score(), 3.0);
    }

    #[test]
    fn test_invalid_correction_leaves_state_unchanged() {
        let api = setup();
        let mut program = api.create_program("Informatik", None, None, None).unwrap();
        let mut module = Module::new("Datenbanken", 5, 2).unwrap();
        module.add_attempt(2.0).unwrap();
        program.add_module(module);
        api.save_program(&mut program).unwrap();
        let module_id = program.modules[0].id.unwrap();

        assert!(matches!(
            api.correct_attempt_score(&mut program, module_id, 1, 6.0),
            Err(ApiError::ValidationError(_))
        ));
        assert_eq!(program.modules[0].latest_score(), Some(2.0));
        let mut data = api.load_all().unwrap();
        assert!(matches!(api.delete_module(&mut data, 999), Err(ApiError::NotFound(_))));
        assert_eq!(data.programs[0].modules.len(), 1);
    }

    #[test]
    fn test_failed_planned_delete_keeps_both_entries() {
        let api = setup();
        let start = date(2025, 3, 2).and_hms_opt(16, 0, 0).unwrap();
        let mut planned: TimeEntry = PlannedSession::new(date(2025, 3, 2), start, 60, "Lesen", None)
            .unwrap()
            .into();
        let planned_id = api.save_time_entry(&mut planned).unwrap();
        let mut entries = vec![planned];

        // 存储中的计划时段已被删除,内存中仍保留
        api.time_entry_repo.delete(planned_id).unwrap();

        let result = api.confirm_planned_session(&mut entries, planned_id, 50);
        assert!(matches!(result, Err(ApiError::NotFound(_))));

        assert_eq!(entries.len(), 2);
        assert!(entries[0].as_planned().is_some());
        assert_eq!(entries[1].duration_minutes(), 50);

        let stored = api.load_all().unwrap().time_entries;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], entries[1]);
    }

    #[test]
    fn test_delete_module_keeps_memory_consistent_for_resave() {
        let api = setup();
        let mut program = api.create_program("Informatik", None, None, None).unwrap();
        program.add_module(Module::new("Mathematik", 10, 1).unwrap());
        program.add_module(Module::new("Physik", 5, 1).unwrap());
        api.save_program(&mut program).unwrap();
        let math_id = program.modules[0].id.unwrap();

        let day = date(2025, 1, 10);
        let mut session: TimeEntry = crate::domain::CompletedSession::new(
            day,
            day.and_hms_opt(9, 0, 0).unwrap(),
            day.and_hms_opt(10, 0, 0).unwrap(),
            Some(math_id),
        )
        .unwrap()
        .into();
        api.save_time_entry(&mut session).unwrap();

        let mut data = api.load_all().unwrap();
        api.delete_module(&mut data, math_id).unwrap();

        assert_eq!(data.programs[0].modules.len(), 1);
        assert!(data.programs[0].module(math_id).is_none());
        assert_eq!(data.time_entries[0].module_id(), None);

        // 删除后再次保存不会触发外键错误或 NotFound
        api.save_time_entry(&mut data.time_entries[0]).unwrap();
        api.save_program(&mut data.programs[0]).unwrap();

        let reloaded = api.load_all().unwrap();
        assert_eq!(reloaded.programs, data.programs);
        assert_eq!(reloaded.time_entries, data.time_entries);
    }

    #[test]
    fn test_delete_attempt_by_id_renumbers_in_memory() {
        let api = setup();
        let mut program = api.create_program("Informatik", None, None, None).unwrap();
        let mut module = Module::new("Algorithmen", 5, 1).unwrap();
        module.add_attempt(5.0).unwrap();
        module.add_attempt(2.0).unwrap();
        program.add_module(module);
        api.save_program(&mut program).unwrap();
        let first_id = program.modules[0].attempts()[0].id.unwrap();

        let mut data = api.load_all().unwrap();
        api.delete_attempt(&mut data, first_id).unwrap();

        let module = &data.programs[0].modules[0];
        assert_eq!(module.attempts().len(), 1);
        assert_eq!(module.attempts()[0].attempt_number(), 1);
        api.save_program(&mut data.programs[0]).unwrap();
        assert_eq!(api.load_all().unwrap().programs, data.programs);

        assert!(matches!(api.delete_attempt(&mut data, first_id), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_delete_program_and_time_entry_update_memory() {
        let api = setup();
        let mut program = api.create_program("Informatik", None, None, None).unwrap();
        program.add_module(Module::new("Mathematik", 10, 1).unwrap());
        api.save_program(&mut program).unwrap();
        let module_id = program.modules[0].id.unwrap();

        let day = date(2025, 1, 11);
        let mut planned: TimeEntry =
            PlannedSession::new(day, day.and_hms_opt(8, 0, 0).unwrap(), 30, "", Some(module_id))
                .unwrap()
                .into();
        let planned_id = api.save_time_entry(&mut planned).unwrap();

        let mut data = api.load_all().unwrap();
        api.delete_program(&mut data, program.id.unwrap()).unwrap();
        assert!(data.programs.is_empty());
        assert_eq!(data.time_entries[0].module_id(), None);
        api.save_time_entry(&mut data.time_entries[0]).unwrap();

        api.delete_time_entry(&mut data, planned_id).unwrap();
        assert!(data.time_entries.is_empty());
        assert!(matches!(
            api.delete_time_entry(&mut data, planned_id),
            Err(ApiError::NotFound(_))
        ));
    }
}
