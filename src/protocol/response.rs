//! Response definitions
//!
//! Replies are single text lines: `<STATUS>` or `<STATUS> <payload>`.

use std::fmt;
use std::io::{BufRead, Write};

use crate::error::{FuqlError, Result};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    PermissionDenied,
    Malformed,
    ParseError,
    InvalidSession,
    IncorrectPassword,
    AlreadyExists,
    Timeout,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "NOT_FOUND",
            Status::PermissionDenied => "PERMISSION_DENIED",
            Status::Malformed => "MALFORMED",
            Status::ParseError => "PARSE_ERROR",
            Status::InvalidSession => "INVALID_SESSION",
            Status::IncorrectPassword => "INCORRECT_PASSWORD",
            Status::AlreadyExists => "ALREADY_EXISTS",
            Status::Timeout => "TIMEOUT",
            Status::Error => "ERROR",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let status = match token {
            "OK" => Status::Ok,
            "NOT_FOUND" => Status::NotFound,
            "PERMISSION_DENIED" => Status::PermissionDenied,
            "MALFORMED" => Status::Malformed,
            "PARSE_ERROR" => Status::ParseError,
            "INVALID_SESSION" => Status::InvalidSession,
            "INCORRECT_PASSWORD" => Status::IncorrectPassword,
            "ALREADY_EXISTS" => Status::AlreadyExists,
            "TIMEOUT" => Status::Timeout,
            "ERROR" => Status::Error,
            _ => return None,
        };
        Some(status)
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (value, list, session id, or error message)
    pub payload: Option<String>,
}

impl Response {
    /// Create an OK response with optional payload
    pub fn ok(payload: Option<String>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    pub fn with_status(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            payload: Some(message.into()),
        }
    }

    /// Map an error onto its distinct status
    pub fn from_error(error: &FuqlError) -> Self {
        let status = match error {
            FuqlError::NotFound(_) => Status::NotFound,
            FuqlError::PermissionDenied(_) => Status::PermissionDenied,
            FuqlError::MalformedPayload(_) => Status::Malformed,
            FuqlError::Parse(_) => Status::ParseError,
            FuqlError::InvalidSession(_) => Status::InvalidSession,
            FuqlError::IncorrectPassword => Status::IncorrectPassword,
            FuqlError::AlreadyExists(_) => Status::AlreadyExists,
            FuqlError::Timeout(_) => Status::Timeout,
            FuqlError::Protocol(_) => Status::Malformed,
            _ => Status::Error,
        };
        Self::with_status(status, error.to_string())
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(payload) => write!(f, "{} {}", self.status.as_str(), payload),
            None => f.write_str(self.status.as_str()),
        }
    }
}

// =============================================================================
// Encoding/Decoding
// =============================================================================

/// Encode a response as one line
///
/// Line breaks inside the payload are written as `\n` / `\r`.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut line = response.status.as_str().to_string();
    if let Some(payload) = &response.payload {
        line.push(' ');
        line.push_str(&payload.replace('\r', "\\r").replace('\n', "\\n"));
    }
    line.push('\n');
    line.into_bytes()
}

/// Decode one response line
pub fn decode_response(line: &str) -> Result<Response> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (token, payload) = match line.split_once(' ') {
        Some((token, payload)) => (token, Some(payload.to_string())),
        None => (line, None),
    };
    let status = Status::from_token(token)
        .ok_or_else(|| FuqlError::Protocol(format!("unknown response status '{}'", token)))?;
    Ok(Response { status, payload })
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

/// Read one response line from a stream
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(FuqlError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "server closed the connection",
        )));
    }
    decode_response(&line)
}
