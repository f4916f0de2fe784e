//! Session identifiers

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::{FuqlError, Result};

/// Identifier a client sends to ask for a brand new session
pub const NEW_SESSION_TOKEN: &str = "000000000000000000000000000000000000";

/// Opaque session identifier, rendered as a 36-character hyphenated UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Length of the identifier on the wire
    pub const LEN: usize = 36;

    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for SessionId {
    type Err = FuqlError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != Self::LEN {
            return Err(FuqlError::InvalidSession(format!(
                "identifier must be {} characters, got {}",
                Self::LEN,
                s.len()
            )));
        }
        Uuid::parse_str(s)
            .map(SessionId)
            .map_err(|_| FuqlError::InvalidSession(format!("malformed identifier '{}'", s)))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
