//! Storage Module
//!
//! Durable snapshots of in-memory databases.
//!
//! ## Responsibilities
//! - Encode/decode one database to the line-oriented snapshot format
//! - Discover and load every snapshot in the storage directory at startup
//! - Write snapshots atomically (temp file + rename)
//! - Remove snapshots of deleted databases
//!
//! ## File Format
//! One file per database, `{storage_path}/{name}.db`:
//! ```text
//! ┌────────────────────────────┐
//! │ <table name>:              │  table header
//! │ <key>:<value>              │  one line per entry, insertion order
//! │ <key>:<value>              │
//! │                            │  blank line closes the table
//! ├────────────────────────────┤
//! │ <table name>:              │
//! │ ...                        │
//! └────────────────────────────┘
//! ```
//! Escapes inside names, keys and values: `\\` `\:` `\n` `\r`.

mod snapshot;
mod manager;

pub use snapshot::{decode, encode, escape, unescape, Decoded, SnapshotError};
pub use manager::{SnapshotStore, SNAPSHOT_EXTENSION};
