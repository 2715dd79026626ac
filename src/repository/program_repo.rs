// ==========================================
// 学业进度看板 - 学位项目数据仓储
// ==========================================
// 职责: program / semester 表的 CRUD
// 红线: Repository 不含业务逻辑
// 红线: 学期每次保存时整体替换 (先删后插),不做差异比对
// ==========================================

use crate::domain::{Program, Semester};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{domain_failure, format_date, get_date};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::debug;

// ==========================================
// ProgramRepository - 学位项目仓储
// ==========================================
pub struct ProgramRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProgramRepository {
    /// 创建新的ProgramRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存项目及其学期
    ///
    /// # 说明
    /// - id 为空 → INSERT 并回写 id;否则按 id UPDATE
    /// - 删除该项目的全部学期,再插入内存中的学期列表 (学期 id 全部重新分配)
    /// - 项目与学期在同一事务中提交;模块由 ModuleRepository 单独保存
    ///
    /// # 返回
    /// - `Ok(program_id)`
    /// - `Err(NotFound)`: 按 id 更新时记录已不存在
    pub fn save(&self, program: &mut Program) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let program_id = match program.id {
            None => {
                tx.execute(
                    "INSERT INTO program (name, standard_duration, target_average) VALUES (?1, ?2, ?3)",
                    params![program.name(), program.standard_duration(), program.target_average()],
                )?;
                tx.last_insert_rowid()
            }
            Some(id) => {
                let updated = tx.execute(
                    "UPDATE program SET name = ?1, standard_duration = ?2, target_average = ?3 WHERE id = ?4",
                    params![program.name(), program.standard_duration(), program.target_average(), id],
                )?;
                if updated == 0 {
                    return Err(RepositoryError::not_found("Program", id));
                }
                id
            }
        };

        tx.execute("DELETE FROM semester WHERE program_id = ?1", params![program_id])?;
        let mut semester_ids = Vec::with_capacity(program.semesters.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO semester (number, start_date, end_date, program_id) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for semester in &program.semesters {
                stmt.execute(params![
                    semester.number,
                    format_date(semester.start_date),
                    format_date(semester.end_date),
                    program_id,
                ])?;
                semester_ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit()?;

        // 提交成功后再回写 id,失败时内存对象保持原样
        program.id = Some(program_id);
        for (semester, id) in program.semesters.iter_mut().zip(semester_ids) {
            semester.id = Some(id);
        }

        debug!(
            program_id,
            semesters = program.semesters.len(),
            "program saved"
        );
        Ok(program_id)
    }

    /// 查询所有项目 (含学期,不含模块)
    ///
    /// # 返回
    /// - `Ok(Vec<Program>)`: 按id升序
    pub fn list_all(&self) -> RepositoryResult<Vec<Program>> {
        let programs = {
            let conn = self.get_conn()?;
            let mut stmt = conn.prepare(
                r#"SELECT id, name, standard_duration, target_average
                   FROM program
                   ORDER BY id ASC"#,
            )?;
            let rows = stmt
                .query_map([], |row| self.map_row(row))?
                .collect::<Result<Vec<Program>, _>>()?;
            rows
        };

        let mut loaded = Vec::with_capacity(programs.len());
        for mut program in programs {
            if let Some(id) = program.id {
                program.semesters = self.find_semesters(id)?;
            }
            loaded.push(program);
        }
        Ok(loaded)
    }

    /// 按id查询项目 (含学期)
    pub fn find_by_id(&self, program_id: i64) -> RepositoryResult<Option<Program>> {
        let found = {
            let conn = self.get_conn()?;
            match conn.query_row(
                r#"SELECT id, name, standard_duration, target_average
                   FROM program
                   WHERE id = ?1"#,
                params![program_id],
                |row| self.map_row(row),
            ) {
                Ok(program) => Some(program),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            }
        };

        match found {
            Some(mut program) => {
                program.semesters = self.find_semesters(program_id)?;
                Ok(Some(program))
            }
            None => Ok(None),
        }
    }

    /// 查询项目的学期,按序号升序
    pub fn find_semesters(&self, program_id: i64) -> RepositoryResult<Vec<Semester>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, number, start_date, end_date
               FROM semester
               WHERE program_id = ?1
               ORDER BY number ASC"#,
        )?;

        let semesters = stmt
            .query_map(params![program_id], |row| {
                Ok(Semester {
                    id: Some(row.get(0)?),
                    number: row.get(1)?,
                    start_date: get_date(row, 2)?,
                    end_date: get_date(row, 3)?,
                })
            })?
            .collect::<Result<Vec<Semester>, _>>()?;

        Ok(semesters)
    }

    /// 删除项目 (级联删除学期、模块与考试记录)
    ///
    /// # 返回
    /// - `Err(NotFound)`: id 不存在
    pub fn delete(&self, program_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM program WHERE id = ?1", params![program_id])?;
        if deleted == 0 {
            return Err(RepositoryError::not_found("Program", program_id));
        }
        debug!(program_id, "program deleted");
        Ok(())
    }

    /// 映射数据库行到Program对象
    fn map_row(&self, row: &rusqlite::Row) -> rusqlite::Result<Program> {
        let id: i64 = row.get(0)?;
        let name: String = row.get(1)?;
        let mut program = Program::new(&name, row.get(2)?, row.get(3)?)
            .map_err(|e| domain_failure(1, e))?;
        program.id = Some(id);
        Ok(program)
    }
}
