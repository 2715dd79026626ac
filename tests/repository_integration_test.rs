// ==========================================
// Repository 层集成测试
// ==========================================
// 测试目标: 文件数据库上的保存 → 重新加载 → 级联删除
// ==========================================


use study_dashboard::domain::{CompletedSession, ModuleStatus, PlannedSession, TimeEntry};
use study_dashboard::logging;
use study_dashboard::api::ApiError;
use study_dashboard::app::AppState;

#[test]
fn test_program_roundtrip_through_file_database() {
    logging::init_test();

    let (temp_file, state) = test_helpers::create_test_state().expect("Failed to create state");
    let db_path = state.db_path.clone();

    let mut program = test_helpers::sample_program();
    state.study_api.save_program(&mut program).expect("save program");
    assert!(program.id.is_some());
    assert!(program.modules.iter().all(|m| m.id.is_some()));
    assert!(program.modules[0].attempts().iter().all(|a| a.id.is_some()));
    drop(state);

    // 重新打开同一个文件,模拟重启
    let reopened = AppState::new(db_path).expect("reopen");
    let data = reopened.study_api.load_all().expect("load");
    assert_eq!(data.programs.len(), 1);

    let loaded = &data.programs[0];
    assert_eq!(loaded, &program);
    assert_eq!(loaded.semesters.len(), 2);
    assert_eq!(loaded.semesters[1].start_date, test_helpers::date(2025, 4, 1));
    assert_eq!(loaded.modules.len(), 3);
    assert_eq!(loaded.modules[0].attempts().len(), 2);
    assert_eq!(loaded.modules[0].status(), ModuleStatus::Passed);
    assert_eq!(loaded.modules[2].status(), ModuleStatus::Open);
    assert_eq!(loaded.total_progress(), 15);
    assert_eq!(loaded.average_grade(), 2.0);

    drop(temp_file);
}

#[test]
fn test_resave_replaces_semesters_without_duplicates() {
    let (_temp_file, state) = test_helpers::create_test_state().expect("Failed to create state");

    let mut program = test_helpers::sample_program();
    state.study_api.save_program(&mut program).expect("first save");
    program
        .generate_semesters(test_helpers::date(2025, 4, 1))
        .expect("regenerate");
    state.study_api.save_program(&mut program).expect("second save");
    state.study_api.save_program(&mut program).expect("third save");

    let data = state.study_api.load_all().expect("load");
    let loaded = &data.programs[0];
    assert_eq!(loaded.semesters.len(), 6);
    assert_eq!(loaded.semesters[0].start_date, test_helpers::date(2025, 4, 1));
    assert_eq!(loaded.modules.len(), 3);
    assert_eq!(loaded.modules[0].attempts().len(), 2);
}

#[test]
fn test_delete_program_cascades_and_module_delete_detaches_entries() {
    let (_temp_file, state) = test_helpers::create_test_state().expect("Failed to create state");
    let api = &state.study_api;

    let mut program = test_helpers::sample_program();
    api.save_program(&mut program).expect("save");
    let math_id = program.modules[0].id.expect("module id");

    let day = test_helpers::date(2024, 11, 5);
    let mut session: TimeEntry = CompletedSession::new(
        day,
        test_helpers::at(day, 14, 0),
        test_helpers::at(day, 15, 45),
        Some(math_id),
    )
    .expect("session")
    .into();
    let mut planned: TimeEntry =
        PlannedSession::new(day, test_helpers::at(day, 18, 0), 60, "Wiederholung", Some(math_id))
            .expect("planned")
            .into();
    api.save_time_entry(&mut session).expect("save session");
    api.save_time_entry(&mut planned).expect("save planned");

    // 删除模块: 时间记录保留,模块引用置空
    let mut data = api.load_all().expect("load");
    api.delete_module(&mut data, math_id).expect("delete module");
    assert_eq!(data.programs[0].modules.len(), 2);
    assert!(data.time_entries.iter().all(|e| e.module_id().is_none()));

    // 内存中的对象可直接再次保存
    api.save_program(&mut data.programs[0]).expect("resave program");
    for entry in data.time_entries.iter_mut() {
        api.save_time_entry(entry).expect("resave entry");
    }

    let reloaded = api.load_all().expect("reload");
    assert_eq!(reloaded.programs, data.programs);
    assert_eq!(reloaded.time_entries, data.time_entries);
    assert_eq!(reloaded.time_entries.len(), 2);
    assert_eq!(reloaded.time_entries[0].duration_minutes(), 105);

    // 删除项目: 学期、模块、考试级联删除
    let program_id = program.id.expect("program id");
    api.delete_program(&mut data, program_id).expect("delete program");
    assert!(data.programs.is_empty());
    let conn = test_helpers::open_test_connection(&state.db_path).expect("open");
    for table in ["program", "semester", "module", "attempt"] {
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0, "table {} should be empty", table);
    }

    assert!(matches!(
        api.delete_program(&mut data, program_id),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(api.delete_attempt(&mut data, 12345), Err(ApiError::NotFound(_))));
}
