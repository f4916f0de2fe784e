//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread (nonblocking accept, polls the shutdown flag)
//! - One thread per connection
//! - Commands routed through the dispatcher

mod connection;
mod server;

pub use connection::Connection;
pub use server::Server;
