//! Command parser
//!
//! Turns one line of command text into a [`Command`].
//!
//! ## Tokenization
//! Tokens are separated by whitespace, except inside double quotes. A quote
//! preceded by a backslash is a literal quote. Delimiting quotes are
//! removed, so `"hello world"` is the single token `hello world`.
//!
//! ## Grammar
//! ```text
//! use database <name>
//! use table <name>
//! login <user> <password>
//! tell entry to present <key>
//! tell entry to present where key|value <pattern>
//! tell entry to create <key>,<value>
//! tell entry to become <key>,<value>
//! tell entry to become where key|value <pattern> <value>
//! tell entry to fuck off <key>
//! tell entry to fuck off where key|value <pattern>
//! tell table to create <name>
//! tell table to fuck off <name>
//! tell table to present
//! tell database to create <name>
//! tell database to fuck off <name>
//! tell database to present
//! tell user to create <name> <password> [read] [write] [admin]
//! tell user to fuck off <name>
//! ```
//! Keywords are case-insensitive; arguments keep their case.

use crate::error::{FuqlError, Result};
use crate::model::{MatchField, Matcher, Value};
use crate::permission::{Permission, PermissionSet};

use super::Command;

// =============================================================================
// Tokenizer
// =============================================================================

/// Split a command line into tokens
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let line = line.trim_end_matches(['\r', '\n', '\0']);

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut inside_string = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
                in_token = true;
            }
            '"' => {
                inside_string = !inside_string;
                in_token = true;
            }
            c if c.is_whitespace() && !inside_string => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if inside_string {
        return Err(FuqlError::Parse("unterminated string".to_string()));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

// =============================================================================
// Token Cursor
// =============================================================================

/// Bounds-checked walk over the tokens of one command
struct Tokens<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(tokens: &'a [String]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token.as_str())
    }

    /// Next token as a lowercase keyword
    fn keyword(&mut self, expected: &str) -> Result<String> {
        self.next_token()
            .map(|token| token.to_ascii_lowercase())
            .ok_or_else(|| FuqlError::Parse(format!("expected {}, got end of command", expected)))
    }

    fn expect(&mut self, keyword: &str) -> Result<()> {
        let found = self.keyword(&format!("'{}'", keyword))?;
        if found == keyword {
            Ok(())
        } else {
            Err(FuqlError::Parse(format!("expected '{}', got '{}'", keyword, found)))
        }
    }

    /// Consume the next token if it is `keyword`
    fn accept(&mut self, keyword: &str) -> bool {
        match self.tokens.get(self.pos) {
            Some(token) if token.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn argument(&mut self, expected: &str) -> Result<String> {
        self.next_token()
            .map(str::to_string)
            .ok_or_else(|| FuqlError::Parse(format!("expected {}, got end of command", expected)))
    }

    fn finish(&self) -> Result<()> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(token) => Err(FuqlError::Parse(format!("unexpected trailing token '{}'", token))),
        }
    }
}

// =============================================================================
// Grammar
// =============================================================================

/// Parse one command line
pub fn parse_command(line: &str) -> Result<Command> {
    let tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Err(FuqlError::Parse("command is empty".to_string()));
    }

    let mut t = Tokens::new(&tokens);
    let command = match t.keyword("a command")?.as_str() {
        "use" => parse_use(&mut t)?,
        "login" => Command::Login {
            user: t.argument("user name")?,
            password: t.argument("password")?,
        },
        "tell" => {
            let subject = t.keyword("'entry', 'table', 'database' or 'user'")?;
            t.expect("to")?;
            match subject.as_str() {
                "entry" => parse_entry(&mut t)?,
                "table" => parse_table(&mut t)?,
                "database" => parse_database(&mut t)?,
                "user" => parse_user(&mut t)?,
                other => return Err(FuqlError::Parse(format!("cannot tell '{}' anything", other))),
            }
        }
        other => return Err(FuqlError::Parse(format!("unknown command '{}'", other))),
    };

    t.finish()?;
    Ok(command)
}

fn parse_use(t: &mut Tokens<'_>) -> Result<Command> {
    match t.keyword("'database' or 'table'")?.as_str() {
        "database" => Ok(Command::UseDatabase {
            name: t.argument("database name")?,
        }),
        "table" => Ok(Command::UseTable {
            name: t.argument("table name")?,
        }),
        other => Err(FuqlError::Parse(format!("unknown use target '{}'", other))),
    }
}

fn parse_entry(t: &mut Tokens<'_>) -> Result<Command> {
    match t.keyword("'present', 'create', 'become' or 'fuck'")?.as_str() {
        "present" => {
            if t.accept("where") {
                Ok(Command::FindEntries { matcher: parse_matcher(t)? })
            } else {
                Ok(Command::FindEntry { key: Value::from(t.argument("key")?) })
            }
        }
        "create" => {
            let (key, value) = parse_key_value(&t.argument("<key>,<value>")?)?;
            Ok(Command::AddEntry { key, value })
        }
        "become" => {
            if t.accept("where") {
                let matcher = parse_matcher(t)?;
                let value = Value::from(t.argument("new value")?);
                Ok(Command::SetEntries { matcher, value })
            } else {
                let (key, value) = parse_key_value(&t.argument("<key>,<value>")?)?;
                Ok(Command::SetEntry { key, value })
            }
        }
        "fuck" => {
            t.expect("off")?;
            if t.accept("where") {
                Ok(Command::DeleteEntries { matcher: parse_matcher(t)? })
            } else {
                Ok(Command::DeleteEntry { key: Value::from(t.argument("key")?) })
            }
        }
        other => Err(FuqlError::Parse(format!("unknown entry action '{}'", other))),
    }
}

fn parse_table(t: &mut Tokens<'_>) -> Result<Command> {
    match t.keyword("'create', 'present' or 'fuck'")?.as_str() {
        "create" => Ok(Command::CreateTable {
            name: t.argument("table name")?,
        }),
        "present" => Ok(Command::ListTables),
        "fuck" => {
            t.expect("off")?;
            Ok(Command::DeleteTable {
                name: t.argument("table name")?,
            })
        }
        other => Err(FuqlError::Parse(format!("unknown table action '{}'", other))),
    }
}

fn parse_database(t: &mut Tokens<'_>) -> Result<Command> {
    match t.keyword("'create', 'present' or 'fuck'")?.as_str() {
        "create" => Ok(Command::CreateDatabase {
            name: t.argument("database name")?,
        }),
        "present" => Ok(Command::ListDatabases),
        "fuck" => {
            t.expect("off")?;
            Ok(Command::DeleteDatabase {
                name: t.argument("database name")?,
            })
        }
        other => Err(FuqlError::Parse(format!("unknown database action '{}'", other))),
    }
}

fn parse_user(t: &mut Tokens<'_>) -> Result<Command> {
    match t.keyword("'create' or 'fuck'")?.as_str() {
        "create" => {
            let name = t.argument("user name")?;
            let password = t.argument("password")?;
            let mut permissions = PermissionSet::new();
            while let Some(word) = t.next_token() {
                let level = Permission::from_keyword(word).ok_or_else(|| {
                    FuqlError::MalformedPayload(format!("unknown permission '{}'", word))
                })?;
                permissions.insert(level);
            }
            Ok(Command::CreateUser {
                name,
                password,
                permissions,
            })
        }
        "fuck" => {
            t.expect("off")?;
            Ok(Command::DeleteUser {
                name: t.argument("user name")?,
            })
        }
        other => Err(FuqlError::Parse(format!("unknown user action '{}'", other))),
    }
}

/// `key <pattern>` or `value <pattern>`
fn parse_matcher(t: &mut Tokens<'_>) -> Result<Matcher> {
    let field = match t.keyword("'key' or 'value'")?.as_str() {
        "key" => MatchField::Key,
        "value" => MatchField::Value,
        other => {
            return Err(FuqlError::Parse(format!(
                "expected 'key' or 'value', got '{}'",
                other
            )))
        }
    };
    let pattern = t.argument("pattern")?;
    Matcher::compile(field, &pattern)
        .map_err(|e| FuqlError::MalformedPayload(format!("invalid pattern '{}': {}", pattern, e)))
}

/// `<key>,<value>`, split at the first comma
fn parse_key_value(payload: &str) -> Result<(Value, Value)> {
    let (key, value) = payload.split_once(',').ok_or_else(|| {
        FuqlError::MalformedPayload(format!("expected '<key>,<value>', got '{}'", payload))
    })?;
    Ok((Value::from_text(key), Value::from_text(value)))
}
