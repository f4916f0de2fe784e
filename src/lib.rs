//! # FUQLdb
//!
//! An in-memory, multi-tenant data store with:
//! - A bespoke phrase-style command language
//! - Sessions, logins and read/write/admin permissions
//! - A single dispatcher thread that serializes all state access
//! - Periodic per-database text snapshots
//! - A line-oriented TCP protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │               (one thread per connection)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ frame → parse → Demand
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Dispatcher                                │
//! │           (bounded queue, single consumer)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Engine                                  │
//! │       Registry (databases)  ·  SessionRegistry (contexts)    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ autosave / shutdown
//!                       ▼
//!               ┌───────────────┐
//!               │ SnapshotStore │
//!               │  (<name>.db)  │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod dispatcher;
pub mod engine;
pub mod model;
pub mod network;
pub mod permission;
pub mod protocol;
pub mod session;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use engine::{Demand, Engine, Reply};
pub use error::{FuqlError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FUQLdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
