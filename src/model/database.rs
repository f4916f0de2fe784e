//! Databases and the process-wide registry

use std::time::Instant;

use crate::error::{FuqlError, Result};

use super::Table;

/// Name of the reserved system catalog database
pub const CATALOG_NAME: &str = "users";

/// Name of the credentials table inside the catalog
pub const USERS_TABLE: &str = "users";

/// Can `name` be used as a snapshot file name?
///
/// Empty names, `.`/`..` and names containing a path separator or NUL are
/// refused.
pub fn is_storable_name(name: &str) -> bool {
    !(name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']))
}

/// A named sequence of tables
#[derive(Debug, Clone)]
pub struct Database {
    pub name: String,
    tables: Vec<Table>,
    /// When this database was last written to disk (or created/loaded)
    pub last_saved: Instant,
}

impl PartialEq for Database {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.tables == other.tables
    }
}

impl Database {
    /// Create a new empty database
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            last_saved: Instant::now(),
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|table| table.name == name)
    }

    pub fn table_at(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    pub fn table_at_mut(&mut self, index: usize) -> Option<&mut Table> {
        self.tables.get_mut(index)
    }

    pub fn table_position(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|table| table.name == name)
    }

    /// Add an empty table; names are unique within a database
    pub fn add_table(&mut self, name: &str) -> Result<()> {
        if self.table_position(name).is_some() {
            return Err(FuqlError::AlreadyExists(format!("table '{}'", name)));
        }
        self.tables.push(Table::new(name));
        Ok(())
    }

    /// Append a fully built table, bypassing the uniqueness check
    ///
    /// Used while decoding snapshots, which preserve whatever is on disk.
    pub fn push_table(&mut self, table: Table) {
        self.tables.push(table);
    }

    /// Remove a table, returning the index it occupied
    pub fn remove_table(&mut self, name: &str) -> Result<usize> {
        let position = self
            .table_position(name)
            .ok_or_else(|| FuqlError::NotFound(format!("table '{}'", name)))?;
        self.tables.remove(position);
        Ok(position)
    }
}

/// Every database known to the process
///
/// Owned by the engine, and therefore only ever touched on the dispatcher
/// thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    databases: Vec<Database>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_databases(databases: Vec<Database>) -> Self {
        Self { databases }
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Database> {
        self.databases.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Database> {
        self.databases.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&Database> {
        self.databases.iter().find(|db| db.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Database> {
        self.databases.iter_mut().find(|db| db.name == name)
    }

    pub fn at(&self, index: usize) -> Option<&Database> {
        self.databases.get(index)
    }

    pub fn at_mut(&mut self, index: usize) -> Option<&mut Database> {
        self.databases.get_mut(index)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.databases.iter().position(|db| db.name == name)
    }

    /// The system catalog, if present
    pub fn catalog(&self) -> Option<&Database> {
        self.get(CATALOG_NAME)
    }

    pub fn catalog_mut(&mut self) -> Option<&mut Database> {
        self.get_mut(CATALOG_NAME)
    }

    /// Register a database; names are unique and must be storable
    pub fn add(&mut self, database: Database) -> Result<()> {
        if !is_storable_name(&database.name) {
            return Err(FuqlError::MalformedPayload(format!(
                "database name '{}' cannot be stored",
                database.name
            )));
        }
        if self.position(&database.name).is_some() {
            return Err(FuqlError::AlreadyExists(format!("database '{}'", database.name)));
        }
        self.databases.push(database);
        Ok(())
    }

    /// Remove a database, returning the index it occupied and its content
    pub fn remove(&mut self, name: &str) -> Result<(usize, Database)> {
        let position = self
            .position(name)
            .ok_or_else(|| FuqlError::NotFound(format!("database '{}'", name)))?;
        Ok((position, self.databases.remove(position)))
    }

    pub fn names(&self) -> Vec<String> {
        self.databases.iter().map(|db| db.name.clone()).collect()
    }
}
