//! Permission Model
//!
//! Users live in the catalog database (`users`), table `users`, keyed by
//! username. Each value is a JSON-encoded [`User`] record.
//!
//! A value that is not a record is read as a bare password. Such a user
//! can log in but holds no permissions.
//!
//! ## Levels Are Independent
//! Read, Write and Admin are checked by exact membership. Holding Admin does
//! not grant Read or Write.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FuqlError, Result};
use crate::model::{Registry, Value, USERS_TABLE};

/// A single access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl Permission {
    pub const ALL: [Permission; 3] = [Permission::Read, Permission::Write, Permission::Admin];

    /// Case-insensitive keyword form (`read`, `write`, `admin`)
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "read" => Some(Permission::Read),
            "write" => Some(Permission::Write),
            "admin" => Some(Permission::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Admin => "admin",
        };
        f.write_str(name)
    }
}

pub type PermissionSet = BTreeSet<Permission>;

/// A catalog user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub password: String,
    /// Decoy field, never compared against
    pub fake_password: String,
    pub number: u64,
    pub permissions: PermissionSet,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        password: impl Into<String>,
        number: u64,
        permissions: PermissionSet,
    ) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            fake_password: uuid::Uuid::new_v4().simple().to_string(),
            number,
            permissions,
        }
    }

    /// A user stored as a bare `(name, password)` pair
    pub fn plain(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            fake_password: String::new(),
            number: 0,
            permissions: PermissionSet::new(),
        }
    }

    pub fn has(&self, level: Permission) -> bool {
        self.permissions.contains(&level)
    }

    /// Encode as the value stored in the users table
    pub fn to_value(&self) -> Result<Value> {
        let json = serde_json::to_string(self)
            .map_err(|e| FuqlError::Persistence(format!("cannot encode user record: {}", e)))?;
        Ok(Value::Str(json))
    }

    /// Decode a users-table value
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_str(&value.as_text()).map_err(|e| {
            FuqlError::MalformedPayload(format!("stored user record is invalid: {}", e))
        })
    }
}

/// Resolve a user record from the catalog
pub fn lookup_user(registry: &Registry, username: &str) -> Result<User> {
    let catalog = registry
        .catalog()
        .ok_or_else(|| FuqlError::NotFound("system database".to_string()))?;
    let users = catalog
        .table(USERS_TABLE)
        .ok_or_else(|| FuqlError::NotFound("users table".to_string()))?;
    let entry = users
        .get(&Value::from_text(username))
        .ok_or_else(|| FuqlError::NotFound(format!("user '{}'", username)))?;
    Ok(User::from_value(&entry.value)
        .unwrap_or_else(|_| User::plain(username, entry.value.as_text())))
}

/// Does `username` hold exactly `level`?
///
/// Any failed lookup (no user logged in, no catalog, unknown user) denies.
pub fn has_permission(registry: &Registry, username: &str, level: Permission) -> bool {
    if username.is_empty() {
        return false;
    }
    lookup_user(registry, username)
        .map(|user| user.has(level))
        .unwrap_or(false)
}

/// Like [`has_permission`], but as an explicit `PermissionDenied` error
pub fn require(registry: &Registry, username: &str, level: Permission) -> Result<()> {
    if has_permission(registry, username, level) {
        return Ok(());
    }
    let who = if username.is_empty() {
        "anonymous session"
    } else {
        username
    };
    Err(FuqlError::PermissionDenied(format!("{} lacks {} permission", who, level)))
}
