//! Session context and the data access operations it gates
//!
//! Every gated operation performs exactly one permission check before it
//! touches the registry. A failed check returns `PermissionDenied` and
//! leaves the registry untouched.

use std::time::Instant;

use crate::error::{FuqlError, Result};
use crate::model::{Database, Entry, Matcher, Registry, Table, Value, CATALOG_NAME, USERS_TABLE};
use crate::permission::{self, Permission, PermissionSet, User};

use super::SessionId;

/// Mutable per-session state
#[derive(Debug, Clone)]
pub struct Context {
    id: SessionId,
    database: Option<usize>,
    table: Option<usize>,
    user: String,
    last_seen: Instant,
}

impl Context {
    /// A fresh session: nothing selected, nobody logged in
    pub fn new(id: SessionId, now: Instant) -> Self {
        Self {
            id,
            database: None,
            table: None,
            user: String::new(),
            last_seen: now,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Index of the active database, if any
    pub fn active_database(&self) -> Option<usize> {
        self.database
    }

    /// Index of the active table within the active database, if any
    pub fn active_table(&self) -> Option<usize> {
        self.table
    }

    /// Logged-in user, empty when nobody is
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }

    fn require(&self, registry: &Registry, level: Permission) -> Result<()> {
        permission::require(registry, &self.user, level)
    }

    // =========================================================================
    // Navigation (no permission check)
    // =========================================================================

    /// Select a database by name and clear the table selection
    pub fn use_database(&mut self, registry: &Registry, name: &str) -> Result<()> {
        let index = registry
            .position(name)
            .ok_or_else(|| FuqlError::NotFound(format!("database '{}'", name)))?;
        self.database = Some(index);
        self.table = None;
        Ok(())
    }

    /// Select a table of the active database by name
    pub fn use_table(&mut self, registry: &Registry, name: &str) -> Result<()> {
        let database = self.current_database(registry)?;
        let index = database
            .table_position(name)
            .ok_or_else(|| FuqlError::NotFound(format!("table '{}'", name)))?;
        self.table = Some(index);
        Ok(())
    }

    fn current_database<'r>(&self, registry: &'r Registry) -> Result<&'r Database> {
        self.database
            .and_then(|index| registry.at(index))
            .ok_or_else(|| FuqlError::NotFound("active database".to_string()))
    }

    fn current_database_mut<'r>(&self, registry: &'r mut Registry) -> Result<&'r mut Database> {
        match self.database {
            Some(index) => registry.at_mut(index),
            None => None,
        }
        .ok_or_else(|| FuqlError::NotFound("active database".to_string()))
    }

    fn current_table<'r>(&self, registry: &'r Registry) -> Result<&'r Table> {
        let database = self.current_database(registry)?;
        self.table
            .and_then(|index| database.table_at(index))
            .ok_or_else(|| FuqlError::NotFound("active table".to_string()))
    }

    fn current_table_mut<'r>(&self, registry: &'r mut Registry) -> Result<&'r mut Table> {
        let database = self.current_database_mut(registry)?;
        match self.table {
            Some(index) => database.table_at_mut(index),
            None => None,
        }
        .ok_or_else(|| FuqlError::NotFound("active table".to_string()))
    }

    // =========================================================================
    // Reads (Read)
    // =========================================================================

    pub fn get_database<'r>(&self, registry: &'r Registry, name: &str) -> Result<&'r Database> {
        self.require(registry, Permission::Read)?;
        registry
            .get(name)
            .ok_or_else(|| FuqlError::NotFound(format!("database '{}'", name)))
    }

    pub fn get_table<'r>(
        &self,
        registry: &'r Registry,
        database: &str,
        name: &str,
    ) -> Result<&'r Table> {
        self.require(registry, Permission::Read)?;
        registry
            .get(database)
            .ok_or_else(|| FuqlError::NotFound(format!("database '{}'", database)))?
            .table(name)
            .ok_or_else(|| FuqlError::NotFound(format!("table '{}'", name)))
    }

    /// First entry of the active table with this key
    pub fn get_entry<'r>(&self, registry: &'r Registry, key: &Value) -> Result<&'r Entry> {
        self.require(registry, Permission::Read)?;
        self.current_table(registry)?
            .get(key)
            .ok_or_else(|| FuqlError::NotFound(format!("entry '{}'", key)))
    }

    pub fn database_names(&self, registry: &Registry) -> Result<Vec<String>> {
        self.require(registry, Permission::Read)?;
        Ok(registry.names())
    }

    /// Table names of the active database
    pub fn table_names(&self, registry: &Registry) -> Result<Vec<String>> {
        self.require(registry, Permission::Read)?;
        let database = self.current_database(registry)?;
        Ok(database.tables().iter().map(|t| t.name.clone()).collect())
    }

    pub fn find_entries(&self, registry: &Registry, matcher: &Matcher) -> Result<Vec<Entry>> {
        self.require(registry, Permission::Read)?;
        Ok(self.current_table(registry)?.find_matching(matcher))
    }

    // =========================================================================
    // Entry Writes (Write)
    // =========================================================================

    pub fn add_entry(&self, registry: &mut Registry, key: Value, value: Value) -> Result<()> {
        self.require(registry, Permission::Write)?;
        self.current_table_mut(registry)?.insert(key, value);
        Ok(())
    }

    /// Overwrite the first entry with this key
    pub fn change_entry(&self, registry: &mut Registry, key: &Value, value: Value) -> Result<()> {
        self.require(registry, Permission::Write)?;
        if self.current_table_mut(registry)?.update(key, value) {
            Ok(())
        } else {
            Err(FuqlError::NotFound(format!("entry '{}'", key)))
        }
    }

    /// Change the first entry with this key, or append one
    pub fn set_entry(&self, registry: &mut Registry, key: Value, value: Value) -> Result<()> {
        self.require(registry, Permission::Write)?;
        self.current_table_mut(registry)?.upsert(key, value);
        Ok(())
    }

    /// Overwrite every matching entry's value, returning how many changed
    pub fn set_entries(
        &self,
        registry: &mut Registry,
        matcher: &Matcher,
        value: &Value,
    ) -> Result<usize> {
        self.require(registry, Permission::Write)?;
        Ok(self.current_table_mut(registry)?.update_matching(matcher, value))
    }

    // =========================================================================
    // Deletes and Structure (Admin)
    // =========================================================================

    /// Remove the first entry with this key
    pub fn delete_entry(&self, registry: &mut Registry, key: &Value) -> Result<Entry> {
        self.require(registry, Permission::Admin)?;
        self.current_table_mut(registry)?
            .remove(key)
            .ok_or_else(|| FuqlError::NotFound(format!("entry '{}'", key)))
    }

    /// Remove every matching entry, returning how many were removed
    pub fn delete_entries(&self, registry: &mut Registry, matcher: &Matcher) -> Result<usize> {
        self.require(registry, Permission::Admin)?;
        Ok(self.current_table_mut(registry)?.remove_matching(matcher))
    }

    /// Add a table to the active database
    pub fn add_table(&self, registry: &mut Registry, name: &str) -> Result<()> {
        self.require(registry, Permission::Admin)?;
        self.current_database_mut(registry)?.add_table(name)
    }

    /// Remove a table from the active database
    ///
    /// Returns `(database index, removed table index)` so the caller can fix
    /// up every session pointing into that database.
    pub fn delete_table(&self, registry: &mut Registry, name: &str) -> Result<(usize, usize)> {
        self.require(registry, Permission::Admin)?;
        let database_index = self
            .database
            .ok_or_else(|| FuqlError::NotFound("active database".to_string()))?;
        let table_index = self.current_database_mut(registry)?.remove_table(name)?;
        Ok((database_index, table_index))
    }

    pub fn add_database(&self, registry: &mut Registry, name: &str) -> Result<()> {
        self.require(registry, Permission::Admin)?;
        registry.add(Database::new(name))
    }

    /// Remove a database, returning its former index and content
    ///
    /// The system catalog cannot be removed.
    pub fn delete_database(&self, registry: &mut Registry, name: &str) -> Result<(usize, Database)> {
        self.require(registry, Permission::Admin)?;
        if name == CATALOG_NAME {
            return Err(FuqlError::PermissionDenied(
                "the system database cannot be deleted".to_string(),
            ));
        }
        registry.remove(name)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Add a user to the catalog
    pub fn create_user(
        &self,
        registry: &mut Registry,
        name: &str,
        password: &str,
        permissions: PermissionSet,
    ) -> Result<User> {
        self.require(registry, Permission::Admin)?;
        let users = users_table_mut(registry)?;
        let key = Value::from_text(name);
        if users.get(&key).is_some() {
            return Err(FuqlError::AlreadyExists(format!("user '{}'", name)));
        }

        let number = users
            .values()
            .filter_map(|value| User::from_value(value).ok())
            .map(|user| user.number + 1)
            .max()
            .unwrap_or(1);
        let user = User::new(name, password, number, permissions);
        users.insert(key, user.to_value()?);
        Ok(user)
    }

    /// Remove a user from the catalog
    pub fn delete_user(&self, registry: &mut Registry, name: &str) -> Result<()> {
        self.require(registry, Permission::Admin)?;
        users_table_mut(registry)?
            .remove(&Value::from_text(name))
            .map(|_| ())
            .ok_or_else(|| FuqlError::NotFound(format!("user '{}'", name)))
    }

    /// Authenticate as `name`
    ///
    /// On failure the current user is left as it was.
    pub fn login(&mut self, registry: &Registry, name: &str, password: &str) -> Result<()> {
        let user = permission::lookup_user(registry, name)?;
        if user.password.as_bytes() != password.as_bytes() {
            return Err(FuqlError::IncorrectPassword);
        }
        self.user = name.to_string();
        Ok(())
    }

    // =========================================================================
    // Index Maintenance
    // =========================================================================

    /// Adjust indices after the database at `removed` was deleted
    pub(crate) fn on_database_removed(&mut self, removed: usize) {
        match self.database {
            Some(index) if index == removed => {
                self.database = None;
                self.table = None;
            }
            Some(index) if index > removed => self.database = Some(index - 1),
            _ => {}
        }
    }

    /// Adjust indices after table `removed` of database `database` was deleted
    pub(crate) fn on_table_removed(&mut self, database: usize, removed: usize) {
        if self.database != Some(database) {
            return;
        }
        match self.table {
            Some(index) if index == removed => self.table = None,
            Some(index) if index > removed => self.table = Some(index - 1),
            _ => {}
        }
    }
}

fn users_table_mut(registry: &mut Registry) -> Result<&mut Table> {
    registry
        .catalog_mut()
        .ok_or_else(|| FuqlError::NotFound("system database".to_string()))?
        .table_mut(USERS_TABLE)
        .ok_or_else(|| FuqlError::NotFound("users table".to_string()))
}
