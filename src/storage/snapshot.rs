//! Snapshot codec
//!
//! Pure text encoding of a [`Database`]. Decoding never throws away what it
//! managed to read: a malformed or truncated snapshot yields the partial
//! database together with the position where scanning stopped.

use std::fmt;

use crate::error::{FuqlError, Result};
use crate::model::{Database, Table, Value};

/// Where and why decoding stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotError {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

impl std::error::Error for SnapshotError {}

/// Result of decoding one snapshot
#[derive(Debug)]
pub struct Decoded {
    /// Everything read before decoding stopped
    pub database: Database,

    /// Set when the input was malformed or truncated
    pub error: Option<SnapshotError>,
}

impl Decoded {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Strict view: any decoding problem becomes an error
    pub fn into_result(self) -> Result<Database> {
        match self.error {
            None => Ok(self.database),
            Some(e) => Err(FuqlError::Persistence(format!(
                "snapshot '{}' {}",
                self.database.name, e
            ))),
        }
    }
}

// =============================================================================
// Escaping
// =============================================================================

/// Escape a name, key or value for one snapshot line
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`]; unknown escapes are kept verbatim
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(':'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Split at the first colon not preceded by an escaping backslash
fn split_unescaped(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b':' => return Some((&line[..i], &line[i + 1..])),
            _ => i += 1,
        }
    }
    None
}

// =============================================================================
// Encode / Decode
// =============================================================================

/// Encode a database as snapshot text
pub fn encode(database: &Database) -> String {
    let mut out = String::new();
    for table in database.tables() {
        out.push_str(&escape(&table.name));
        out.push_str(":\n");
        for entry in table.entries() {
            out.push_str(&escape(&entry.key.as_text()));
            out.push(':');
            out.push_str(&escape(&entry.value.as_text()));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Decode snapshot text into a database called `name`
pub fn decode(name: &str, text: &str) -> Decoded {
    let mut database = Database::new(name);
    let mut current: Option<Table> = None;
    let mut line_count = 0;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        line_count = line_no;

        if let Some(table) = current.as_mut() {
            if line.is_empty() {
                if let Some(done) = current.take() {
                    database.push_table(done);
                }
                continue;
            }
            match split_unescaped(line) {
                Some((key, value)) => table.insert(
                    Value::from_text(&unescape(key)),
                    Value::from_text(&unescape(value)),
                ),
                None => {
                    return stop(database, current, line_no, "entry line has no ':' separator");
                }
            }
            continue;
        }

        if line.is_empty() {
            continue;
        }
        match split_unescaped(line) {
            Some((table_name, "")) => current = Some(Table::new(unescape(table_name))),
            Some(_) => return stop(database, None, line_no, "table header has trailing text"),
            None => return stop(database, None, line_no, "expected table header '<name>:'"),
        }
    }

    match current {
        Some(table) => {
            let reason = format!("unexpected end of input inside table '{}'", table.name);
            stop(database, Some(table), line_count + 1, &reason)
        }
        None => Decoded {
            database,
            error: None,
        },
    }
}

fn stop(mut database: Database, partial: Option<Table>, line: usize, reason: &str) -> Decoded {
    if let Some(table) = partial {
        database.push_table(table);
    }
    Decoded {
        database,
        error: Some(SnapshotError {
            line,
            reason: reason.to_string(),
        }),
    }
}
