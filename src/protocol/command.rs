//! Command definitions
//!
//! Each variant carries its own typed payload, decided at parse time.

use crate::model::{Matcher, Value};
use crate::permission::PermissionSet;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    UseDatabase,
    UseTable,
    Login,
    FindEntry,
    FindEntries,
    AddEntry,
    SetEntry,
    SetEntries,
    DeleteEntry,
    DeleteEntries,
    CreateTable,
    DeleteTable,
    ListTables,
    CreateDatabase,
    DeleteDatabase,
    ListDatabases,
    CreateUser,
    DeleteUser,
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Select the active database
    UseDatabase { name: String },

    /// Select the active table within the active database
    UseTable { name: String },

    /// Authenticate the session
    Login { user: String, password: String },

    /// Look up the first entry with a key
    FindEntry { key: Value },

    /// All entries whose key or value matches a pattern
    FindEntries { matcher: Matcher },

    /// Append an entry
    AddEntry { key: Value, value: Value },

    /// Update the first entry with a key, or append it
    SetEntry { key: Value, value: Value },

    /// Overwrite the value of every matching entry
    SetEntries { matcher: Matcher, value: Value },

    /// Remove the first entry with a key
    DeleteEntry { key: Value },

    /// Remove every matching entry
    DeleteEntries { matcher: Matcher },

    CreateTable { name: String },
    DeleteTable { name: String },
    ListTables,

    CreateDatabase { name: String },
    DeleteDatabase { name: String },
    ListDatabases,

    CreateUser {
        name: String,
        password: String,
        permissions: PermissionSet,
    },
    DeleteUser { name: String },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::UseDatabase { .. } => CommandType::UseDatabase,
            Command::UseTable { .. } => CommandType::UseTable,
            Command::Login { .. } => CommandType::Login,
            Command::FindEntry { .. } => CommandType::FindEntry,
            Command::FindEntries { .. } => CommandType::FindEntries,
            Command::AddEntry { .. } => CommandType::AddEntry,
            Command::SetEntry { .. } => CommandType::SetEntry,
            Command::SetEntries { .. } => CommandType::SetEntries,
            Command::DeleteEntry { .. } => CommandType::DeleteEntry,
            Command::DeleteEntries { .. } => CommandType::DeleteEntries,
            Command::CreateTable { .. } => CommandType::CreateTable,
            Command::DeleteTable { .. } => CommandType::DeleteTable,
            Command::ListTables => CommandType::ListTables,
            Command::CreateDatabase { .. } => CommandType::CreateDatabase,
            Command::DeleteDatabase { .. } => CommandType::DeleteDatabase,
            Command::ListDatabases => CommandType::ListDatabases,
            Command::CreateUser { .. } => CommandType::CreateUser,
            Command::DeleteUser { .. } => CommandType::DeleteUser,
        }
    }

    /// Does executing this command change the database registry?
    pub fn is_mutation(&self) -> bool {
        matches!(
            self.command_type(),
            CommandType::AddEntry
                | CommandType::SetEntry
                | CommandType::SetEntries
                | CommandType::DeleteEntry
                | CommandType::DeleteEntries
                | CommandType::CreateTable
                | CommandType::DeleteTable
                | CommandType::CreateDatabase
                | CommandType::DeleteDatabase
                | CommandType::CreateUser
                | CommandType::DeleteUser
        )
    }
}
