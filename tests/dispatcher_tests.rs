//! Dispatcher Tests
//!
//! Tests verify:
//! - Demands from many threads are all executed
//! - Replies reach the thread that asked
//! - Shutdown saves everything
//! - The periodic tick drives autosave

use std::thread;
use std::time::Duration;

use fuqldb::error::FuqlError;
use fuqldb::model::Value;
use fuqldb::protocol::parse_command;
use fuqldb::session::SessionId;
use fuqldb::{Config, Dispatcher, DispatcherHandle, Engine, Reply};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn spawn_dispatcher(temp_dir: &TempDir, autosave_tick: Duration, interval: Duration) -> Dispatcher {
    let config = Config::builder()
        .storage_path(temp_dir.path())
        .bootstrap_admin("admin", "admin")
        .autosave_tick(autosave_tick)
        .autosave_interval(interval)
        .build();
    Dispatcher::spawn(Engine::open(config).unwrap()).unwrap()
}

fn submit(handle: &DispatcherHandle, session: SessionId, line: &str) -> Reply {
    handle.submit(session, parse_command(line).unwrap()).unwrap()
}

fn prepared_session(handle: &DispatcherHandle) -> SessionId {
    let id = handle.create_session().unwrap();
    submit(handle, id, "login admin admin");
    id
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_create_and_lookup_session() {
    let temp = TempDir::new().unwrap();
    let dispatcher = spawn_dispatcher(&temp, Duration::from_secs(60), Duration::from_secs(60));
    let handle = dispatcher.handle();

    let id = handle.create_session().unwrap();
    handle.lookup_session(id).unwrap();
    assert!(matches!(
        handle.lookup_session(SessionId::generate()),
        Err(FuqlError::InvalidSession(_))
    ));

    dispatcher.shutdown().unwrap();
}

#[test]
fn test_concurrent_writers_all_applied() {
    let temp = TempDir::new().unwrap();
    let dispatcher = spawn_dispatcher(&temp, Duration::from_secs(60), Duration::from_secs(60));
    let handle = dispatcher.handle();

    let setup = prepared_session(&handle);
    submit(&handle, setup, "tell database to create main");
    submit(&handle, setup, "use database main");
    submit(&handle, setup, "tell table to create t");

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let handle = handle.clone();
            thread::spawn(move || {
                let id = prepared_session(&handle);
                submit(&handle, id, "use database main");
                submit(&handle, id, "use table t");
                for i in 0..25 {
                    submit(&handle, id, &format!("tell entry to create w{}_{},{}", worker, i, i));
                }
                // Each thread reads back its own writes
                let reply = submit(&handle, id, &format!("tell entry to present w{}_24", worker));
                assert_eq!(reply, Reply::Value(Value::Int(24)));
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let engine = dispatcher.shutdown().unwrap();
    let table = engine.registry().get("main").unwrap().table("t").unwrap();
    assert_eq!(table.len(), 8 * 25);
}

#[test]
fn test_shutdown_saves_all_databases() {
    let temp = TempDir::new().unwrap();
    let dispatcher = spawn_dispatcher(&temp, Duration::from_secs(60), Duration::from_secs(3600));
    let handle = dispatcher.handle();

    let id = prepared_session(&handle);
    submit(&handle, id, "tell database to create main");

    dispatcher.shutdown().unwrap();
    assert!(temp.path().join("main.db").exists());
    assert!(temp.path().join("users.db").exists());
}

#[test]
fn test_handle_fails_after_shutdown() {
    let temp = TempDir::new().unwrap();
    let dispatcher = spawn_dispatcher(&temp, Duration::from_secs(60), Duration::from_secs(60));
    let handle = dispatcher.handle();

    dispatcher.shutdown().unwrap();
    assert!(matches!(handle.create_session(), Err(FuqlError::Shutdown)));
}

#[test]
fn test_tick_autosaves() {
    let temp = TempDir::new().unwrap();
    let dispatcher = spawn_dispatcher(&temp, Duration::from_millis(20), Duration::ZERO);
    let handle = dispatcher.handle();

    let id = prepared_session(&handle);
    submit(&handle, id, "tell database to create main");

    let path = temp.path().join("main.db");
    let mut waited = Duration::ZERO;
    while !path.exists() && waited < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(20));
        waited += Duration::from_millis(20);
    }
    assert!(path.exists());

    dispatcher.shutdown().unwrap();
}
