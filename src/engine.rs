//! Engine Module
//!
//! The state owner that executes demands.
//!
//! ## Responsibilities
//! - Own the database registry and the session registry
//! - Load snapshots on startup and seed the system catalog
//! - Execute demands against the permission-gated context operations
//! - Keep every session's indices valid after structural deletes
//! - Persist aged databases (autosave) and everything on shutdown
//!
//! The engine itself is plain `&mut self` code with no locking. It is only
//! safe to share because the [`Dispatcher`](crate::dispatcher::Dispatcher)
//! moves it onto a single thread and feeds it one demand at a time.

use std::time::Instant;

use crate::config::Config;
use crate::error::{FuqlError, Result};
use crate::model::{Database, Entry, Registry, Value, CATALOG_NAME, USERS_TABLE};
use crate::permission::{Permission, PermissionSet, User};
use crate::protocol::{Command, Response};
use crate::session::{Context, SessionId, SessionRegistry};
use crate::storage::SnapshotStore;

/// A request for the engine
#[derive(Debug, Clone)]
pub enum Demand {
    /// Mint a new session (internal)
    CreateSession,

    /// Check that a session exists and mark it as used (internal)
    LookupSession(SessionId),

    /// Run a client command within a session
    Execute {
        session: SessionId,
        command: Command,
    },
}

/// Successful outcome of a demand
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    Session(SessionId),
    Value(Value),
    Entries(Vec<Entry>),
    Names(Vec<String>),
    Count(usize),
}

impl Reply {
    pub fn into_response(self) -> Response {
        let payload = match self {
            Reply::Done => None,
            Reply::Session(id) => Some(id.to_string()),
            Reply::Value(value) => Some(value.to_string()),
            Reply::Entries(entries) => join(entries.iter().map(Entry::to_string)),
            Reply::Names(names) => join(names.into_iter()),
            Reply::Count(n) => Some(n.to_string()),
        };
        Response::ok(payload)
    }
}

fn join(items: impl Iterator<Item = String>) -> Option<String> {
    let joined = items.collect::<Vec<_>>().join(", ");
    (!joined.is_empty()).then_some(joined)
}

/// The request-processing engine
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Snapshot files on disk
    store: SnapshotStore,

    /// Every database, including the catalog
    registry: Registry,

    /// Every live session
    sessions: SessionRegistry,

    /// Databases deleted since the last save pass, whose files must go
    dropped: Vec<String>,
}

impl Engine {
    /// Open the engine with the given config
    ///
    /// On startup:
    /// 1. Open/create the storage directory
    /// 2. Load every snapshot in it
    /// 3. Create the system catalog if it is missing
    pub fn open(config: Config) -> Result<Self> {
        let store = SnapshotStore::open(&config.storage_path)?;
        let registry = Registry::from_databases(store.load_all()?);
        let sessions = SessionRegistry::new(config.session_idle_timeout, config.max_sessions);

        let mut engine = Self {
            config,
            store,
            registry,
            sessions,
            dropped: Vec::new(),
        };
        engine.bootstrap_catalog()?;

        tracing::info!(
            "Engine ready: {} databases from {}",
            engine.registry.len(),
            engine.store.dir().display()
        );
        Ok(engine)
    }

    /// Make sure `users/users` exists and seed the configured admin
    fn bootstrap_catalog(&mut self) -> Result<()> {
        if self.registry.catalog().is_none() {
            tracing::info!("Creating system database '{}'", CATALOG_NAME);
            self.registry.add(Database::new(CATALOG_NAME))?;
        }

        let admin = self.config.bootstrap_admin.clone();
        let catalog = self
            .registry
            .catalog_mut()
            .ok_or_else(|| FuqlError::NotFound("system database".to_string()))?;
        if catalog.table(USERS_TABLE).is_none() {
            catalog.add_table(USERS_TABLE)?;
        }

        if let Some((name, password)) = admin {
            let users = catalog
                .table_mut(USERS_TABLE)
                .ok_or_else(|| FuqlError::NotFound("users table".to_string()))?;
            let key = Value::from_text(&name);
            if users.get(&key).is_none() {
                let permissions: PermissionSet = Permission::ALL.into_iter().collect();
                let user = User::new(name.as_str(), password, 0, permissions);
                users.insert(key, user.to_value()?);
                tracing::info!("Seeded admin user '{}'", name);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Demand Execution
    // =========================================================================

    /// Execute one demand
    pub fn handle(&mut self, demand: Demand) -> Result<Reply> {
        let now = Instant::now();
        match demand {
            Demand::CreateSession => Ok(Reply::Session(self.sessions.create(now))),
            Demand::LookupSession(id) => {
                self.sessions.get_mut(&id, now)?;
                Ok(Reply::Done)
            }
            Demand::Execute { session, command } => {
                tracing::trace!("Session {} executing {:?}", session, command.command_type());
                self.execute(session, command, now)
            }
        }
    }

    fn execute(&mut self, id: SessionId, command: Command, now: Instant) -> Result<Reply> {
        let context = self.sessions.get_mut(&id, now)?;
        let registry = &mut self.registry;

        match command {
            Command::UseDatabase { name } => {
                context.use_database(registry, &name)?;
                Ok(Reply::Done)
            }
            Command::UseTable { name } => {
                context.use_table(registry, &name)?;
                Ok(Reply::Done)
            }
            Command::Login { user, password } => {
                let outcome = context.login(registry, &user, &password);
                match &outcome {
                    Ok(()) => tracing::info!("Session {} logged in as '{}'", id, user),
                    Err(e) => tracing::info!("Session {} failed login as '{}': {}", id, user, e),
                }
                outcome.map(|_| Reply::Done)
            }
            Command::FindEntry { key } => {
                let entry = context.get_entry(registry, &key)?;
                Ok(Reply::Value(entry.value.clone()))
            }
            Command::FindEntries { matcher } => {
                Ok(Reply::Entries(context.find_entries(registry, &matcher)?))
            }
            Command::AddEntry { key, value } => {
                context.add_entry(registry, key, value)?;
                Ok(Reply::Done)
            }
            Command::SetEntry { key, value } => {
                context.set_entry(registry, key, value)?;
                Ok(Reply::Done)
            }
            Command::SetEntries { matcher, value } => {
                Ok(Reply::Count(context.set_entries(registry, &matcher, &value)?))
            }
            Command::DeleteEntry { key } => {
                context.delete_entry(registry, &key)?;
                Ok(Reply::Done)
            }
            Command::DeleteEntries { matcher } => {
                Ok(Reply::Count(context.delete_entries(registry, &matcher)?))
            }
            Command::CreateTable { name } => {
                context.add_table(registry, &name)?;
                Ok(Reply::Done)
            }
            Command::DeleteTable { name } => {
                let (database, table) = context.delete_table(registry, &name)?;
                for other in self.sessions.contexts_mut() {
                    other.on_table_removed(database, table);
                }
                Ok(Reply::Done)
            }
            Command::ListTables => Ok(Reply::Names(context.table_names(registry)?)),
            Command::CreateDatabase { name } => {
                context.add_database(registry, &name)?;
                tracing::info!("Database '{}' created", name);
                Ok(Reply::Done)
            }
            Command::DeleteDatabase { name } => {
                let (index, database) = context.delete_database(registry, &name)?;
                for other in self.sessions.contexts_mut() {
                    other.on_database_removed(index);
                }
                tracing::info!("Database '{}' deleted", database.name);
                self.dropped.push(database.name);
                Ok(Reply::Done)
            }
            Command::ListDatabases => Ok(Reply::Names(context.database_names(registry)?)),
            Command::CreateUser {
                name,
                password,
                permissions,
            } => {
                context.create_user(registry, &name, &password, permissions)?;
                Ok(Reply::Done)
            }
            Command::DeleteUser { name } => {
                context.delete_user(registry, &name)?;
                Ok(Reply::Done)
            }
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Periodic housekeeping: autosave aged databases, evict idle sessions
    pub fn on_tick(&mut self, now: Instant) {
        self.autosave(now);
        self.sessions.evict_idle(now);
    }

    /// Save every database whose last save is older than the interval
    ///
    /// Failures are logged and left for the next tick. Returns how many
    /// databases were written.
    pub fn autosave(&mut self, now: Instant) -> usize {
        self.remove_dropped();

        let interval = self.config.autosave_interval;
        let mut saved = 0;
        for database in self.registry.iter_mut() {
            if now.saturating_duration_since(database.last_saved) <= interval {
                continue;
            }
            match self.store.save(database) {
                Ok(()) => {
                    database.last_saved = now;
                    saved += 1;
                    tracing::debug!("Autosaved database '{}'", database.name);
                }
                Err(e) => tracing::warn!("Error saving database '{}': {}", database.name, e),
            }
        }
        saved
    }

    /// Save every database unconditionally
    ///
    /// Attempts all databases even if some fail; the first failure is
    /// returned.
    pub fn save_all(&mut self) -> Result<()> {
        self.remove_dropped();

        let now = Instant::now();
        let mut first_error = None;
        for database in self.registry.iter_mut() {
            match self.store.save(database) {
                Ok(()) => database.last_saved = now,
                Err(e) => {
                    tracing::warn!("Error saving database '{}': {}", database.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            None => {
                tracing::info!("Saved {} databases", self.registry.len());
                Ok(())
            }
            Some(e) => Err(e),
        }
    }

    fn remove_dropped(&mut self) {
        let mut kept = Vec::new();
        for name in self.dropped.drain(..) {
            if let Err(e) = self.store.remove(&name) {
                tracing::warn!("Error removing snapshot of '{}': {}", name, e);
                kept.push(name);
            }
        }
        self.dropped = kept;
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn session(&self, id: &SessionId) -> Option<&Context> {
        self.sessions.get(id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
