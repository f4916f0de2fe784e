//! Tests for Engine
//!
//! These tests verify:
//! - Catalog bootstrap and the seeded admin account
//! - Command execution within sessions
//! - Index fix-ups for other sessions after structural deletes
//! - Autosave, explicit saves and reload after restart
//! - Reply rendering

use std::time::{Duration, Instant};

use fuqldb::error::{FuqlError, Result};
use fuqldb::model::{Entry, Value, CATALOG_NAME};
use fuqldb::protocol::{parse_command, Status};
use fuqldb::session::SessionId;
use fuqldb::{Config, Demand, Engine, Reply};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config_for(temp_dir: &TempDir) -> Config {
    Config::builder()
        .storage_path(temp_dir.path())
        .bootstrap_admin("admin", "admin")
        .build()
}

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config_for(&temp_dir)).unwrap();
    (temp_dir, engine)
}

fn new_session(engine: &mut Engine) -> SessionId {
    match engine.handle(Demand::CreateSession).unwrap() {
        Reply::Session(id) => id,
        other => panic!("unexpected reply {:?}", other),
    }
}

fn run(engine: &mut Engine, session: SessionId, line: &str) -> Result<Reply> {
    let command = parse_command(line)?;
    engine.handle(Demand::Execute { session, command })
}

/// Admin session with database `main` and table `t` selected
fn admin_session(engine: &mut Engine) -> SessionId {
    let id = new_session(engine);
    run(engine, id, "login admin admin").unwrap();
    if engine.registry().get("main").is_none() {
        run(engine, id, "tell database to create main").unwrap();
        run(engine, id, "use database main").unwrap();
        run(engine, id, "tell table to create t").unwrap();
    }
    run(engine, id, "use database main").unwrap();
    run(engine, id, "use table t").unwrap();
    id
}

// =============================================================================
// Bootstrap Tests
// =============================================================================

#[test]
fn test_engine_open_creates_catalog() {
    let (_temp, engine) = setup_temp_engine();

    let catalog = engine.registry().catalog().unwrap();
    assert_eq!(catalog.name, CATALOG_NAME);
    assert_eq!(catalog.table("users").unwrap().len(), 1);
}

#[test]
fn test_engine_open_without_admin() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().storage_path(temp_dir.path()).build();
    let engine = Engine::open(config).unwrap();

    assert!(engine.registry().catalog().unwrap().table("users").unwrap().is_empty());
}

#[test]
fn test_engine_open_creates_storage_directory() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("fuql");
    let config = Config::builder().storage_path(&data_dir).build();

    let _engine = Engine::open(config).unwrap();
    assert!(data_dir.is_dir());
}

// =============================================================================
// Session Tests
// =============================================================================

#[test]
fn test_unknown_session_rejected() {
    let (_temp, mut engine) = setup_temp_engine();

    let result = engine.handle(Demand::LookupSession(SessionId::generate()));
    assert!(matches!(result, Err(FuqlError::InvalidSession(_))));
    let result = run(&mut engine, SessionId::generate(), "use database users");
    assert!(matches!(result, Err(FuqlError::InvalidSession(_))));
}

#[test]
fn test_sessions_are_independent() {
    let (_temp, mut engine) = setup_temp_engine();
    let admin = admin_session(&mut engine);
    let anonymous = new_session(&mut engine);

    assert_eq!(engine.session(&admin).unwrap().user(), "admin");
    assert_eq!(engine.session(&anonymous).unwrap().user(), "");
    assert_eq!(engine.session(&anonymous).unwrap().active_database(), None);
    assert_eq!(engine.session_count(), 2);
}

// =============================================================================
// Command Execution Tests
// =============================================================================

#[test]
fn test_entry_lifecycle() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);

    run(&mut engine, id, "tell entry to create name,alice").unwrap();
    assert_eq!(
        run(&mut engine, id, "tell entry to present name").unwrap(),
        Reply::Value(Value::from("alice"))
    );

    run(&mut engine, id, "tell entry to become name,bob").unwrap();
    assert_eq!(
        run(&mut engine, id, "tell entry to present name").unwrap(),
        Reply::Value(Value::from("bob"))
    );

    run(&mut engine, id, "tell entry to fuck off name").unwrap();
    assert!(matches!(
        run(&mut engine, id, "tell entry to present name"),
        Err(FuqlError::NotFound(_))
    ));
}

#[test]
fn test_set_entry_appends_when_absent() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);

    run(&mut engine, id, "tell entry to become fresh,1").unwrap();
    assert_eq!(
        run(&mut engine, id, "tell entry to present fresh").unwrap(),
        Reply::Value(Value::Int(1))
    );
}

#[test]
fn test_duplicate_keys_first_match() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);

    run(&mut engine, id, "tell entry to create k,first").unwrap();
    run(&mut engine, id, "tell entry to create k,second").unwrap();
    assert_eq!(
        run(&mut engine, id, "tell entry to present k").unwrap(),
        Reply::Value(Value::from("first"))
    );

    run(&mut engine, id, "tell entry to fuck off k").unwrap();
    assert_eq!(
        run(&mut engine, id, "tell entry to present k").unwrap(),
        Reply::Value(Value::from("second"))
    );
}

#[test]
fn test_batch_delete_by_key_pattern() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);
    for line in [
        "tell entry to create a1,x",
        "tell entry to create a2,y",
        "tell entry to create b1,z",
    ] {
        run(&mut engine, id, line).unwrap();
    }

    assert_eq!(
        run(&mut engine, id, "tell entry to fuck off where key ^a").unwrap(),
        Reply::Count(2)
    );
    let table = engine.registry().get("main").unwrap().table("t").unwrap();
    assert_eq!(table.entries(), &[Entry::new("b1", "z")]);
}

#[test]
fn test_batch_find_and_update() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);
    for line in [
        "tell entry to create user_1,old",
        "tell entry to create other,old",
        "tell entry to create user_2,new",
    ] {
        run(&mut engine, id, line).unwrap();
    }

    assert_eq!(
        run(&mut engine, id, "tell entry to become where key ^user_ done").unwrap(),
        Reply::Count(2)
    );
    assert_eq!(
        run(&mut engine, id, "tell entry to present where value ^done$").unwrap(),
        Reply::Entries(vec![Entry::new("user_1", "done"), Entry::new("user_2", "done")])
    );
}

#[test]
fn test_entry_commands_need_table() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = new_session(&mut engine);
    run(&mut engine, id, "login admin admin").unwrap();

    assert!(matches!(
        run(&mut engine, id, "tell entry to present k"),
        Err(FuqlError::NotFound(_))
    ));
}

#[test]
fn test_listing() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);
    run(&mut engine, id, "tell table to create u").unwrap();

    assert_eq!(
        run(&mut engine, id, "tell database to present").unwrap(),
        Reply::Names(vec!["users".to_string(), "main".to_string()])
    );
    assert_eq!(
        run(&mut engine, id, "tell table to present").unwrap(),
        Reply::Names(vec!["t".to_string(), "u".to_string()])
    );
}

#[test]
fn test_duplicate_structures_rejected() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);

    assert!(matches!(
        run(&mut engine, id, "tell database to create main"),
        Err(FuqlError::AlreadyExists(_))
    ));
    assert!(matches!(
        run(&mut engine, id, "tell table to create t"),
        Err(FuqlError::AlreadyExists(_))
    ));
}

// =============================================================================
// Permission Tests
// =============================================================================

#[test]
fn test_anonymous_write_leaves_state_unchanged() {
    let (_temp, mut engine) = setup_temp_engine();
    admin_session(&mut engine);
    let before = engine.registry().clone();

    let id = new_session(&mut engine);
    run(&mut engine, id, "use database main").unwrap();
    run(&mut engine, id, "use table t").unwrap();

    let result = run(&mut engine, id, "tell entry to create k,v");
    assert!(matches!(result, Err(FuqlError::PermissionDenied(_))));
    assert_eq!(engine.registry(), &before);
}

#[test]
fn test_denied_mutations_leave_state_unchanged() {
    let (_temp, mut engine) = setup_temp_engine();
    let admin = admin_session(&mut engine);
    for line in [
        "tell entry to create k,v",
        "tell table to create u",
        "tell database to create other",
        "tell user to create reader pw read",
        "tell user to create writer pw read write",
        "tell user to create adminonly pw admin",
    ] {
        run(&mut engine, admin, line).unwrap();
    }
    let before = engine.registry().clone();

    let write_lines = [
        "tell entry to create k2,v2",
        "tell entry to become k,w",
        "tell entry to become where key ^k x",
    ];
    let admin_lines = [
        "tell entry to fuck off k",
        "tell entry to fuck off where key ^k",
        "tell table to create fresh",
        "tell table to fuck off u",
        "tell database to create fresh",
        "tell database to fuck off other",
        "tell user to create mallory pw admin",
        "tell user to fuck off reader",
    ];
    let cases: Vec<(&str, &[&str])> = vec![
        ("", &write_lines[..]),
        ("reader", &write_lines[..]),
        ("adminonly", &write_lines[..]),
        ("", &admin_lines[..]),
        ("reader", &admin_lines[..]),
        ("writer", &admin_lines[..]),
    ];

    for (user, lines) in cases {
        let id = new_session(&mut engine);
        if !user.is_empty() {
            run(&mut engine, id, &format!("login {} pw", user)).unwrap();
        }
        run(&mut engine, id, "use database main").unwrap();
        run(&mut engine, id, "use table t").unwrap();

        for line in lines {
            let result = run(&mut engine, id, line);
            assert!(
                matches!(result, Err(FuqlError::PermissionDenied(_))),
                "{:?} ran '{}': {:?}",
                user,
                line,
                result
            );
            assert_eq!(engine.registry(), &before, "{:?} ran '{}'", user, line);
        }
    }
}

#[test]
fn test_unstorable_database_names_rejected() {
    let (temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);
    let before = engine.registry().clone();

    for line in [
        "tell database to create \"a/b\"",
        "tell database to create \"\"",
        "tell database to create ..",
    ] {
        assert!(
            matches!(run(&mut engine, id, line), Err(FuqlError::MalformedPayload(_))),
            "{}",
            line
        );
    }
    assert_eq!(engine.registry(), &before);

    // Nothing unsaveable was acknowledged, so a full save still succeeds
    engine.save_all().unwrap();
    drop(engine);
    let reopened = Engine::open(config_for(&temp)).unwrap();
    let mut names = reopened.registry().names();
    let mut expected = before.names();
    names.sort();
    expected.sort();
    assert_eq!(names, expected);
}

#[test]
fn test_created_user_gets_its_levels() {
    let (_temp, mut engine) = setup_temp_engine();
    let admin = admin_session(&mut engine);
    run(&mut engine, admin, "tell entry to create k,v").unwrap();
    run(&mut engine, admin, "tell user to create reader pw read").unwrap();

    let reader = new_session(&mut engine);
    run(&mut engine, reader, "login reader pw").unwrap();
    run(&mut engine, reader, "use database main").unwrap();
    run(&mut engine, reader, "use table t").unwrap();

    assert_eq!(
        run(&mut engine, reader, "tell entry to present k").unwrap(),
        Reply::Value(Value::from("v"))
    );
    assert!(matches!(
        run(&mut engine, reader, "tell entry to become k,w"),
        Err(FuqlError::PermissionDenied(_))
    ));
    assert!(matches!(
        run(&mut engine, reader, "tell user to fuck off admin"),
        Err(FuqlError::PermissionDenied(_))
    ));
}

#[test]
fn test_login_failures() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = new_session(&mut engine);

    assert!(matches!(
        run(&mut engine, id, "login admin nope"),
        Err(FuqlError::IncorrectPassword)
    ));
    assert!(matches!(
        run(&mut engine, id, "login ghost pw"),
        Err(FuqlError::NotFound(_))
    ));
    assert_eq!(engine.session(&id).unwrap().user(), "");
}

// =============================================================================
// Structural Delete Tests
// =============================================================================

#[test]
fn test_delete_database_fixes_other_sessions() {
    let (_temp, mut engine) = setup_temp_engine();
    let first = admin_session(&mut engine);
    run(&mut engine, first, "tell database to create other").unwrap();

    let second = admin_session(&mut engine);
    run(&mut engine, second, "use database other").unwrap();
    run(&mut engine, second, "tell table to create o").unwrap();
    run(&mut engine, second, "use table o").unwrap();
    run(&mut engine, second, "tell entry to create k,v").unwrap();
    assert_eq!(engine.session(&second).unwrap().active_database(), Some(2));

    run(&mut engine, first, "tell database to fuck off main").unwrap();

    // `first` pointed at the deleted database
    assert_eq!(engine.session(&first).unwrap().active_database(), None);
    assert_eq!(engine.session(&first).unwrap().active_table(), None);
    // `second` still reaches the same data
    assert_eq!(engine.session(&second).unwrap().active_database(), Some(1));
    assert_eq!(
        run(&mut engine, second, "tell entry to present k").unwrap(),
        Reply::Value(Value::from("v"))
    );
}

#[test]
fn test_delete_table_fixes_other_sessions() {
    let (_temp, mut engine) = setup_temp_engine();
    let first = admin_session(&mut engine);
    run(&mut engine, first, "tell table to create u").unwrap();

    let second = admin_session(&mut engine);
    run(&mut engine, second, "use table u").unwrap();
    run(&mut engine, second, "tell entry to create in_u,1").unwrap();

    run(&mut engine, first, "tell table to fuck off t").unwrap();

    assert_eq!(engine.session(&first).unwrap().active_table(), None);
    assert_eq!(engine.session(&second).unwrap().active_table(), Some(0));
    assert_eq!(
        run(&mut engine, second, "tell entry to present in_u").unwrap(),
        Reply::Value(Value::Int(1))
    );
}

#[test]
fn test_catalog_is_protected() {
    let (_temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);

    assert!(matches!(
        run(&mut engine, id, "tell database to fuck off users"),
        Err(FuqlError::PermissionDenied(_))
    ));
    assert!(engine.registry().catalog().is_some());
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_save_all_and_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut engine = Engine::open(config_for(&temp_dir)).unwrap();
        let id = admin_session(&mut engine);
        run(&mut engine, id, "tell entry to create colon:key,multi:part").unwrap();
        run(&mut engine, id, "tell user to create bob pw read").unwrap();
        engine.save_all().unwrap();
    }

    assert!(temp_dir.path().join("main.db").exists());
    assert!(temp_dir.path().join("users.db").exists());

    let mut engine = Engine::open(config_for(&temp_dir)).unwrap();
    let id = new_session(&mut engine);
    run(&mut engine, id, "login bob pw").unwrap();
    run(&mut engine, id, "use database main").unwrap();
    run(&mut engine, id, "use table t").unwrap();
    assert_eq!(
        run(&mut engine, id, "tell entry to present colon:key").unwrap(),
        Reply::Value(Value::from("multi:part"))
    );
}

#[test]
fn test_deleted_database_file_removed_on_save() {
    let (temp, mut engine) = setup_temp_engine();
    let id = admin_session(&mut engine);
    engine.save_all().unwrap();
    assert!(temp.path().join("main.db").exists());

    run(&mut engine, id, "tell database to fuck off main").unwrap();
    engine.save_all().unwrap();
    assert!(!temp.path().join("main.db").exists());
    assert!(temp.path().join("users.db").exists());
}

#[test]
fn test_autosave_only_aged_databases() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .storage_path(temp_dir.path())
        .bootstrap_admin("admin", "admin")
        .autosave_interval(Duration::from_secs(60))
        .build();
    let mut engine = Engine::open(config).unwrap();
    admin_session(&mut engine);

    assert_eq!(engine.autosave(Instant::now()), 0);
    assert!(!temp_dir.path().join("main.db").exists());

    let later = Instant::now() + Duration::from_secs(61);
    assert_eq!(engine.autosave(later), 2);
    assert!(temp_dir.path().join("main.db").exists());

    // Just saved, so nothing is due yet
    assert_eq!(engine.autosave(later + Duration::from_secs(1)), 0);
}

#[test]
fn test_on_tick_evicts_idle_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .storage_path(temp_dir.path())
        .session_idle_timeout(Some(Duration::from_secs(5)))
        .build();
    let mut engine = Engine::open(config).unwrap();
    new_session(&mut engine);

    engine.on_tick(Instant::now() + Duration::from_secs(10));
    assert_eq!(engine.session_count(), 0);
}

// =============================================================================
// Reply Rendering Tests
// =============================================================================

#[test]
fn test_reply_into_response() {
    assert_eq!(Reply::Done.into_response().to_string(), "OK");
    assert_eq!(Reply::Count(3).into_response().to_string(), "OK 3");
    assert_eq!(
        Reply::Entries(vec![Entry::new("a", Value::Int(1)), Entry::new("b", "x")])
            .into_response()
            .to_string(),
        "OK a=1, b=x"
    );
    assert_eq!(Reply::Names(vec![]).into_response().to_string(), "OK");

    let response = Reply::Value(Value::from("v")).into_response();
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.payload.as_deref(), Some("v"));
}
