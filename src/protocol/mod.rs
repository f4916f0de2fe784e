//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (Line-Oriented Text)
//!
//! ### Request Format
//! ```text
//! ┌──────────────────────────┬──────────────────────────┬────┐
//! │ Session identifier (36)  │ Command text             │ \n │
//! └──────────────────────────┴──────────────────────────┴────┘
//! ```
//!
//! ### Commands
//! Structured phrases such as `use database main` or
//! `tell entry to create name,alice`; see [`parser`] for the full grammar.
//!
//! ### Response Format
//! ```text
//! ┌──────────┬───┬─────────────────────────────┬────┐
//! │ STATUS   │ ␠ │ payload (optional)          │ \n │
//! └──────────┴───┴─────────────────────────────┴────┘
//! ```
//!
//! ### Status Codes
//! `OK`, `NOT_FOUND`, `PERMISSION_DENIED`, `MALFORMED`, `PARSE_ERROR`,
//! `INVALID_SESSION`, `INCORRECT_PASSWORD`, `ALREADY_EXISTS`, `TIMEOUT`,
//! `ERROR`

mod command;
mod frame;
pub mod parser;
mod response;

pub use command::{Command, CommandType};
pub use frame::{
    decode_frame, encode_frame, read_frame_bytes, write_frame, Frame, SessionToken, MAX_FRAME_SIZE,
};
pub use parser::{parse_command, tokenize};
pub use response::{
    decode_response, encode_response, read_response, write_response, Response, Status,
};
