//! Session Module
//!
//! Per-client state keyed by an opaque session identifier.
//!
//! ## Responsibilities
//! - Mint identifiers for new sessions (36-char hyphenated UUIDs)
//! - Track the active database, active table and logged-in user
//! - Expose the permission-gated data access operations
//! - Evict idle sessions and bound the total session count
//!
//! A [`Context`] never holds references into the data model; it stores
//! indices, and every operation receives the [`Registry`](crate::model::Registry)
//! explicitly. Both are owned by the engine on the dispatcher thread.

mod id;
mod context;
mod registry;

pub use id::{SessionId, NEW_SESSION_TOKEN};
pub use context::Context;
pub use registry::SessionRegistry;
