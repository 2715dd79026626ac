// ==========================================
// 学业进度看板 - 学习模块数据仓储
// ==========================================
// 职责: module / attempt 表的 CRUD
// 红线: Repository 不含业务逻辑
// 红线: 模块按 id 增量更新;考试记录新的插入,已有 id 的按 id 更新
// ==========================================

use crate::domain::{Attempt, Module, ModuleStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::domain_failure;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// module 表的原始行 (考试记录另行加载)
struct ModuleRow {
    id: i64,
    title: String,
    credits: u32,
    status: String,
    planned_period: u32,
}

// ==========================================
// ModuleRepository - 学习模块仓储
// ==========================================
pub struct ModuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ModuleRepository {
    /// 创建新的ModuleRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存模块及其考试记录
    ///
    /// # 说明
    /// - 模块 id 为空 → INSERT;否则按 id UPDATE
    /// - 考试记录 id 为空 → INSERT 并回写 id
    /// - 已有 id 的考试记录按 id 更新成绩与序号 (成绩更正随聚合保存落库)
    /// - 单个模块在一个事务中提交
    ///
    /// # 返回
    /// - `Ok(module_id)`
    /// - `Err(NotFound)`: 模块或考试记录的 id 已不存在
    pub fn save(&self, module: &mut Module, program_id: i64) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let module_id = match module.id {
            None => {
                tx.execute(
                    r#"INSERT INTO module (title, credits, status, planned_period, program_id)
                       VALUES (?1, ?2, ?3, ?4, ?5)"#,
                    params![
                        module.title(),
                        module.credits(),
                        module.status().to_db_str(),
                        module.planned_period(),
                        program_id,
                    ],
                )?;
                tx.last_insert_rowid()
            }
            Some(id) => {
                let updated = tx.execute(
                    r#"UPDATE module
                       SET title = ?1, credits = ?2, status = ?3, planned_period = ?4
                       WHERE id = ?5"#,
                    params![
                        module.title(),
                        module.credits(),
                        module.status().to_db_str(),
                        module.planned_period(),
                        id,
                    ],
                )?;
                if updated == 0 {
                    return Err(RepositoryError::not_found("Module", id));
                }
                id
            }
        };

        let mut new_ids = Vec::new();
        {
            let mut insert = tx.prepare(
                "INSERT INTO attempt (score, attempt_number, module_id) VALUES (?1, ?2, ?3)",
            )?;
            let mut update = tx.prepare(
                "UPDATE attempt SET score = ?1, attempt_number = ?2 WHERE id = ?3 AND module_id = ?4",
            )?;

            for (index, attempt) in module.attempts().iter().enumerate() {
                match attempt.id {
                    None => {
                        insert.execute(params![attempt.score(), attempt.attempt_number(), module_id])?;
                        new_ids.push((index, tx.last_insert_rowid()));
                    }
                    Some(attempt_id) => {
                        let updated = update.execute(params![
                            attempt.score(),
                            attempt.attempt_number(),
                            attempt_id,
                            module_id,
                        ])?;
                        if updated == 0 {
                            return Err(RepositoryError::not_found("Attempt", attempt_id));
                        }
                    }
                }
            }
        }

        tx.commit()?;

        module.id = Some(module_id);
        module.assign_attempt_ids(&new_ids);

        debug!(
            module_id,
            program_id,
            inserted_attempts = new_ids.len(),
            "module saved"
        );
        Ok(module_id)
    }

    /// 查询项目的全部模块 (含考试记录)
    ///
    /// # 返回
    /// - `Ok(Vec<Module>)`: 按id升序 (即创建顺序);考试记录按序号升序
    pub fn find_by_program(&self, program_id: i64) -> RepositoryResult<Vec<Module>> {
        let rows = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                r#"SELECT id, title, credits, status, planned_period
                   FROM module
                   WHERE program_id = ?1
                   ORDER BY id ASC"#,
            )?;
            let rows = stmt
                .query_map(params![program_id], |row| {
                    Ok(ModuleRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        credits: row.get(2)?,
                        status: row.get(3)?,
                        planned_period: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<ModuleRow>, _>>()?;
            rows
        };

        let mut modules = Vec::with_capacity(rows.len());
        for row in rows {
            let attempts = self.find_attempts(row.id)?;
            let module = Module::restore(row.id, &row.title, row.credits, row.planned_period, attempts)
                .map_err(|e| RepositoryError::FieldValueError {
                    field: format!("module#{}", row.id),
                    message: e.to_string(),
                })?;

            // 状态以考试记录推导为准;存储值不一致时只告警
            if ModuleStatus::from_db_str(&row.status) != Some(module.status()) {
                warn!(
                    module_id = row.id,
                    stored = %row.status,
                    derived = %module.status(),
                    "stored module status differs from derived status"
                );
            }
            modules.push(module);
        }

        Ok(modules)
    }

    /// 查询模块的考试记录,按序号升序
    pub fn find_attempts(&self, module_id: i64) -> RepositoryResult<Vec<Attempt>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, score, attempt_number
               FROM attempt
               WHERE module_id = ?1
               ORDER BY attempt_number ASC, id ASC"#,
        )?;

        let attempts = stmt
            .query_map(params![module_id], |row| {
                Attempt::restore(row.get(0)?, row.get(1)?, row.get(2)?)
                    .map_err(|e| domain_failure(1, e))
            })?
            .collect::<Result<Vec<Attempt>, _>>()?;

        Ok(attempts)
    }

    /// 单独更新一条考试记录 (成绩更正)
    ///
    /// # 返回
    /// - `Err(NotFound)`: 考试记录未保存或已不存在
    pub fn update_attempt(&self, attempt: &Attempt) -> RepositoryResult<()> {
        let attempt_id = attempt.id.ok_or_else(|| RepositoryError::NotFound {
            entity: "Attempt".to_string(),
            id: "<unsaved>".to_string(),
        })?;

        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE attempt SET score = ?1, attempt_number = ?2 WHERE id = ?3",
            params![attempt.score(), attempt.attempt_number(), attempt_id],
        )?;
        if updated == 0 {
            return Err(RepositoryError::not_found("Attempt", attempt_id));
        }
        debug!(attempt_id, score = attempt.score(), "attempt updated");
        Ok(())
    }

    /// 更新模块的状态列
    pub fn update_status(&self, module_id: i64, status: ModuleStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE module SET status = ?1 WHERE id = ?2",
            params![status.to_db_str(), module_id],
        )?;
        if updated == 0 {
            return Err(RepositoryError::not_found("Module", module_id));
        }
        Ok(())
    }

    /// 删除模块 (级联删除考试记录;引用它的时间记录 module_id 置空)
    pub fn delete(&self, module_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM module WHERE id = ?1", params![module_id])?;
        if deleted == 0 {
            return Err(RepositoryError::not_found("Module", module_id));
        }
        debug!(module_id, "module deleted");
        Ok(())
    }

    /// 删除单条考试记录
    pub fn delete_attempt(&self, attempt_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM attempt WHERE id = ?1", params![attempt_id])?;
        if deleted == 0 {
            return Err(RepositoryError::not_found("Attempt", attempt_id));
        }
        debug!(attempt_id, "attempt deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Program;
    use crate::repository::ProgramRepository;

    fn setup() -> (ProgramRepository, ModuleRepository, i64) {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory().unwrap()));
        let program_repo = ProgramRepository::new(conn.clone());
        let module_repo = ModuleRepository::new(conn);
        let mut program = Program::with_defaults("Informatik").unwrap();
        let program_id = program_repo.save(&mut program).unwrap();
        (program_repo, module_repo, program_id)
    }

    #[test]
    fn test_save_inserts_new_attempts_only_once() {
        let (_programs, repo, program_id) = setup();
        let mut module = Module::new("Mathematik I", 10, 1).unwrap();
        module.add_attempt(5.0).unwrap();
        repo.save(&mut module, program_id).unwrap();

        module.add_attempt(2.3).unwrap();
        repo.save(&mut module, program_id).unwrap();
        repo.save(&mut module, program_id).unwrap();

        let attempts = repo.find_attempts(module.id.unwrap()).unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts, module.attempts());
    }

    #[test]
    fn test_corrected_score_lands_with_aggregate_save() {
        let (_programs, repo, program_id) = setup();
        let mut module = Module::new("Statistik", 5, 2).unwrap();
        module.add_attempt(3.0).unwrap();
        repo.save(&mut module, program_id).unwrap();

        module.correct_score(1, 4.7).unwrap();
        repo.save(&mut module, program_id).unwrap();

        let loaded = repo.find_by_program(program_id).unwrap();
        assert_eq!(loaded[0].latest_score(), Some(4.7));
        assert_eq!(loaded[0].status(), ModuleStatus::Open);
    }

    #[test]
    fn test_update_attempt_requires_persisted_row() {
        let (_programs, repo, _program_id) = setup();
        let unsaved = Attempt::new(2.0, 1).unwrap();
        assert!(matches!(
            repo.update_attempt(&unsaved),
            Err(RepositoryError::NotFound { .. })
        ));
        let stale = Attempt::restore(42, 2.0, 1).unwrap();
        assert!(matches!(
            repo.update_attempt(&stale),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_module_cascades_to_attempts() {
        let (_programs, repo, program_id) = setup();
        let mut module = Module::new("Physik", 5, 1).unwrap();
        module.add_attempt(5.0).unwrap();
        module.add_attempt(1.7).unwrap();
        let module_id = repo.save(&mut module, program_id).unwrap();

        repo.delete(module_id).unwrap();
        assert!(repo.find_attempts(module_id).unwrap().is_empty());
        assert!(matches!(repo.delete(module_id), Err(RepositoryError::NotFound { .. })));
        assert!(matches!(repo.delete_attempt(1), Err(RepositoryError::NotFound { .. })));
    }
}
