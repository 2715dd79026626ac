// ==========================================
// 学业进度看板 - 应用状态
// ==========================================
// 职责: 打开共享数据库连接,装配仓储、配置与 API 实例
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::{DashboardApi, StudyApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{ModuleRepository, ProgramRepository, TimeEntryRepository};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "STUDY_DASHBOARD_DB_PATH";

const DB_FILE_NAME: &str = "study_dashboard.db";

/// 应用状态
///
/// 整个进程共享一个 SQLite 连接,进程退出时释放
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 学业数据API
    pub study_api: Arc<StudyApi>,

    /// 看板API
    pub dashboard_api: Arc<DashboardApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径 (不存在时自动创建并建表)
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库结构初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let program_repo = Arc::new(ProgramRepository::new(conn.clone()));
        let module_repo = Arc::new(ModuleRepository::new(conn.clone()));
        let time_entry_repo = Arc::new(TimeEntryRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let study_api = Arc::new(StudyApi::new(
            program_repo,
            module_repo,
            time_entry_repo,
            config_manager.clone(),
        ));
        let dashboard_api = Arc::new(DashboardApi::new(config_manager.clone()));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            study_api,
            dashboard_api,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DB_FILE_NAME);

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("study-dashboard");
        // 目录创建失败时退回当前目录
        match std::fs::create_dir_all(&dir) {
            Ok(()) => path = dir.join(DB_FILE_NAME),
            Err(e) => tracing::warn!("无法创建数据目录 {}: {}", dir.display(), e),
        }
    }

    path.to_string_lossy().to_string()
}
