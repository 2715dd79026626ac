// ==========================================
// 学业进度看板 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value)
// 说明: 配置缺失或格式错误时使用默认值,不阻断业务
// ==========================================

use crate::domain::program::{
    DEFAULT_STANDARD_DURATION, DEFAULT_TARGET_AVERAGE, MAX_STANDARD_DURATION,
};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 成绩区间默认容差
pub const DEFAULT_GRADE_WARNING_MARGIN: f64 = 1.0;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入配置值 (UPSERT)
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::debug!(key, value, "config updated");
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&config_map)?)
    }

    // ===== 新项目默认值 =====

    /// 获取新项目的默认标准学期数（默认 6）
    pub fn get_default_standard_duration(&self) -> Result<u32, Box<dyn Error>> {
        self.get_parsed(
            config_keys::DEFAULT_STANDARD_DURATION,
            DEFAULT_STANDARD_DURATION,
            |v: &u32| (1..=MAX_STANDARD_DURATION).contains(v),
        )
    }

    /// 获取新项目的默认目标平均分（默认 2.0）
    pub fn get_default_target_average(&self) -> Result<f64, Box<dyn Error>> {
        self.get_parsed(
            config_keys::DEFAULT_TARGET_AVERAGE,
            DEFAULT_TARGET_AVERAGE,
            |v: &f64| (1.0..=5.0).contains(v),
        )
    }

    // ===== 看板配置 =====

    /// 获取成绩区间容差（默认 1.0）
    ///
    /// 平均分比目标差但不超过该容差时为 WARNING
    pub fn get_grade_warning_margin(&self) -> Result<f64, Box<dyn Error>> {
        self.get_parsed(
            config_keys::GRADE_WARNING_MARGIN,
            DEFAULT_GRADE_WARNING_MARGIN,
            |v: &f64| *v >= 0.0,
        )
    }

    fn get_parsed<T>(
        &self,
        key: &str,
        default: T,
        is_valid: impl Fn(&T) -> bool,
    ) -> Result<T, Box<dyn Error>>
    where
        T: std::str::FromStr,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(value) if is_valid(&value) => Ok(value),
            _ => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置值无效，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 新项目默认值
    pub const DEFAULT_STANDARD_DURATION: &str = "program.default_standard_duration";
    pub const DEFAULT_TARGET_AVERAGE: &str = "program.default_target_average";

    // 看板
    pub const GRADE_WARNING_MARGIN: &str = "dashboard.grade_warning_margin";
}
