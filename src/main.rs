// ==========================================
// 学业进度看板 - 命令行入口
// ==========================================
// 职责: 打开数据库,加载全部数据,输出每个项目的看板 (JSON)
// ==========================================

use anyhow::{anyhow, Context};
use chrono::Local;
use study_dashboard::app::{get_default_db_path, AppState};

fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    study_dashboard::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", study_dashboard::APP_NAME, study_dashboard::VERSION);
    tracing::info!("==================================================");

    // 命令行参数优先,其次环境变量/默认路径
    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let data = state.study_api.load_all().context("加载学业数据失败")?;

    if data.programs.is_empty() {
        tracing::info!("尚无学位项目");
        return Ok(());
    }

    let today = Local::now().date_naive();
    for program in &data.programs {
        let summary = state
            .dashboard_api
            .build_summary(program, &data.time_entries, today)
            .with_context(|| format!("生成看板失败: {}", program.name()))?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
