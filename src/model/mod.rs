//! Data Model Module
//!
//! Passive data structures holding the stored content.
//!
//! ## Ownership
//! ```text
//! Registry ──owns──▶ Database ──owns──▶ Table ──owns──▶ Entry(key, value)
//! ```
//! Cross-references (a session's active database/table) are indices into
//! these vectors, never borrowed handles.
//!
//! ## Lookup Semantics
//! Entry keys are not unique. Every keyed lookup, update or delete acts on
//! the first matching entry in insertion order.

mod value;
mod matcher;
mod table;
mod database;

pub use value::{Entry, Value};
pub use matcher::{MatchField, Matcher};
pub use table::Table;
pub use database::{is_storable_name, Database, Registry, CATALOG_NAME, USERS_TABLE};
