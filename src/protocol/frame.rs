//! Wire framing
//!
//! ## Request Frame
//! ```text
//! ┌──────────────────────────┬──────────────────────────┬────┐
//! │ Session identifier (36)  │ Command text             │ \n │
//! └──────────────────────────┴──────────────────────────┴────┘
//! ```
//! An identifier made of 36 `0` characters asks for a new session; any
//! command text after it is ignored.

use std::io::{BufRead, Read, Write};

use crate::error::{FuqlError, Result};
use crate::session::{SessionId, NEW_SESSION_TOKEN};

/// Largest accepted frame, newline included
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// The session field of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionToken {
    /// All-zero identifier: mint a new session
    New,
    Existing(SessionId),
}

/// A decoded request frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub session: SessionToken,
    pub command: String,
}

/// Decode one frame (without or with its trailing newline)
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    let mut end = bytes.len();
    while end > 0 && matches!(bytes[end - 1], b'\n' | b'\r' | 0) {
        end -= 1;
    }
    let bytes = &bytes[..end];

    if bytes.len() < SessionId::LEN {
        return Err(FuqlError::Protocol(format!(
            "frame too short: expected a {}-byte session identifier, got {} bytes",
            SessionId::LEN,
            bytes.len()
        )));
    }

    let (header, rest) = bytes.split_at(SessionId::LEN);
    let header = std::str::from_utf8(header)
        .map_err(|_| FuqlError::Protocol("session identifier is not ASCII".to_string()))?;

    let session = if header == NEW_SESSION_TOKEN {
        SessionToken::New
    } else {
        SessionToken::Existing(header.parse()?)
    };

    Ok(Frame {
        session,
        command: String::from_utf8_lossy(rest).into_owned(),
    })
}

/// Encode a request frame, newline included
pub fn encode_frame(session: Option<&SessionId>, command: &str) -> Vec<u8> {
    let header = match session {
        Some(id) => id.to_string(),
        None => NEW_SESSION_TOKEN.to_string(),
    };
    let mut frame = Vec::with_capacity(header.len() + command.len() + 2);
    frame.extend_from_slice(header.as_bytes());
    frame.push(b' ');
    frame.extend_from_slice(command.as_bytes());
    frame.push(b'\n');
    frame
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read the raw bytes of the next frame
///
/// Returns `Ok(None)` on a clean end of stream.
pub fn read_frame_bytes<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut buf = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_FRAME_SIZE as u64)
        .read_until(b'\n', &mut buf)?;

    if read == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') && read == MAX_FRAME_SIZE {
        return Err(FuqlError::Protocol(format!(
            "frame exceeds {} bytes",
            MAX_FRAME_SIZE
        )));
    }
    Ok(Some(buf))
}

/// Write a request frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, session: Option<&SessionId>, command: &str) -> Result<()> {
    writer.write_all(&encode_frame(session, command))?;
    writer.flush()?;
    Ok(())
}
