//! SQL migration script parser.
//!
//! A script is split into an apply (`Up`) section and a revert (`Down`)
//! section by comment directives:
//!
//! ```sql
//! -- +migration Up
//! CREATE TABLE users (id INTEGER PRIMARY KEY);
//!
//! -- +migration StatementBegin
//! CREATE TRIGGER users_touch AFTER INSERT ON users
//! BEGIN
//!   SELECT 1;
//! END;
//! -- +migration StatementEnd
//!
//! -- +migration Down
//! DROP TABLE users;
//! ```
//!
//! Directives must start at column zero with `--`. Simple statements end at a
//! line whose last word (ignoring a trailing `--` comment) ends with `;`.
//! Statements between `StatementBegin` and `StatementEnd` are taken verbatim,
//! inner semicolons included. `-- +migration NO TRANSACTION` anywhere in the
//! script runs its statements outside a transaction.
//!
//! The parser walks the whole script for either direction, so a malformed
//! `Down` section fails an `Up` parse too.

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use uno_rs_core::{UnoError, UnoResult};

use crate::pool::BufferPool;

/// The direction a migration is run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply the migration.
    Up,
    /// Revert the migration.
    Down,
}

impl Direction {
    /// Returns `true` for [`Direction::Up`].
    pub const fn is_up(self) -> bool {
        matches!(self, Self::Up)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// The statements of one direction of a SQL migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
    /// The direction these statements belong to.
    pub direction: Direction,
    /// Statements in file order, each with its original line breaks.
    pub statements: Vec<String>,
    /// `false` when the script carries a `NO TRANSACTION` directive.
    pub use_transaction: bool,
}

impl ParsedScript {
    /// Returns `true` if the requested direction has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// A recognized comment directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Up,
    Down,
    StatementBegin,
    StatementEnd,
    NoTransaction,
}

/// Parser states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Up,
    StatementBeginUp,
    StatementEndUp,
    Down,
    StatementBeginDown,
    StatementEndDown,
}

impl State {
    /// The side of the script this state belongs to, if any.
    const fn section(self) -> Option<Direction> {
        match self {
            Self::Start => None,
            Self::Up | Self::StatementBeginUp | Self::StatementEndUp => Some(Direction::Up),
            Self::Down | Self::StatementBeginDown | Self::StatementEndDown => {
                Some(Direction::Down)
            }
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Up => "up",
            Self::StatementBeginUp => "statement-begin-up",
            Self::StatementEndUp => "statement-end-up",
            Self::Down => "down",
            Self::StatementBeginDown => "statement-begin-down",
            Self::StatementEndDown => "statement-end-down",
        };
        f.write_str(name)
    }
}

/// Parses SQL migration scripts.
///
/// The parser is configured with the directive prefixes it accepts (for
/// example `+migration` and `+goose`) and shares a [`BufferPool`] for its
/// statement buffers.
#[derive(Debug, Clone)]
pub struct ScriptParser {
    prefixes: Vec<String>,
    pool: Arc<BufferPool>,
}

impl ScriptParser {
    /// Creates a parser accepting the given directive prefixes.
    pub fn new(prefixes: Vec<String>, pool: Arc<BufferPool>) -> Self {
        Self { prefixes, pool }
    }

    /// The prefix used in error messages.
    fn primary_prefix(&self) -> &str {
        self.prefixes.first().map_or("+migration", String::as_str)
    }

    /// Recognizes a directive on a line already known to start with `--`.
    ///
    /// Returns `None` for ordinary comments.
    fn directive(&self, line: &str) -> Option<Directive> {
        let command = line.strip_prefix("--")?.trim();
        self.prefixes.iter().find_map(|prefix| {
            let rest = command.strip_prefix(prefix.as_str())?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let words: Vec<&str> = rest.split_whitespace().collect();
            match words.as_slice() {
                ["Up"] => Some(Directive::Up),
                ["Down"] => Some(Directive::Down),
                ["StatementBegin"] => Some(Directive::StatementBegin),
                ["StatementEnd"] => Some(Directive::StatementEnd),
                ["NO", "TRANSACTION"] => Some(Directive::NoTransaction),
                _ => None,
            }
        })
    }

    /// Parses `script` and returns the statements for `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`UnoError::ParseError`] when the directives are out of order,
    /// a `StatementBegin` block is left open, content appears before the `Up`
    /// directive, or a statement is missing its terminating semicolon.
    pub fn parse(&self, script: &str, direction: Direction) -> UnoResult<ParsedScript> {
        let p = self.primary_prefix();
        let mut buf = self.pool.acquire();
        let mut statements = Vec::new();
        let mut use_transaction = true;
        let mut state = State::Start;

        let transition = |state: &mut State, next: State| {
            tracing::debug!(from = %state, to = %next, "parser state");
            *state = next;
        };

        for (idx, line) in script.lines().enumerate() {
            let line_no = idx + 1;

            if line.starts_with("--") {
                match self.directive(line) {
                    Some(Directive::Up) => {
                        if state != State::Start {
                            return Err(UnoError::ParseError(format!(
                                "line {line_no}: duplicate '-- {p} Up' annotation (state {state})"
                            )));
                        }
                        transition(&mut state, State::Up);
                    }
                    Some(Directive::Down) => match state {
                        State::Up | State::StatementEndUp => {
                            if !buf.trim().is_empty() {
                                return Err(unfinished(state, direction, buf.trim()));
                            }
                            transition(&mut state, State::Down);
                        }
                        _ => {
                            return Err(UnoError::ParseError(format!(
                                "line {line_no}: '-- {p} Down' must follow '-- {p} Up' (state {state})"
                            )));
                        }
                    },
                    Some(Directive::StatementBegin) => match state {
                        State::Up | State::StatementEndUp => {
                            transition(&mut state, State::StatementBeginUp);
                        }
                        State::Down | State::StatementEndDown => {
                            transition(&mut state, State::StatementBeginDown);
                        }
                        _ => {
                            return Err(UnoError::ParseError(format!(
                                "line {line_no}: '-- {p} StatementBegin' must be defined after '-- {p} Up' or '-- {p} Down' (state {state})"
                            )));
                        }
                    },
                    Some(Directive::StatementEnd) => {
                        let closed = match state {
                            State::StatementBeginUp => State::StatementEndUp,
                            State::StatementBeginDown => State::StatementEndDown,
                            _ => {
                                return Err(UnoError::ParseError(format!(
                                    "line {line_no}: '-- {p} StatementEnd' must be defined after '-- {p} StatementBegin' (state {state})"
                                )));
                            }
                        };
                        if closed.section() == Some(direction) {
                            statements.push(buf.clone());
                            tracing::debug!(%direction, "parser stored block statement");
                        }
                        buf.clear();
                        transition(&mut state, closed);
                    }
                    Some(Directive::NoTransaction) => use_transaction = false,
                    None => tracing::trace!(line_no, "parser ignored comment"),
                }
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            let Some(section) = state.section() else {
                return Err(UnoError::ParseError(format!(
                    "line {line_no}: unexpected content before '-- {p} Up': {line:?}"
                )));
            };

            if section != direction {
                continue;
            }

            buf.push_str(line);
            buf.push('\n');

            match state {
                State::Up | State::Down => {
                    if ends_with_semicolon(line) {
                        statements.push(buf.clone());
                        buf.clear();
                        tracing::debug!(%direction, "parser stored simple statement");
                    }
                }
                // Content after a closed block starts a new simple statement.
                State::StatementEndUp | State::StatementEndDown => {
                    let open = if section.is_up() { State::Up } else { State::Down };
                    transition(&mut state, open);
                    if ends_with_semicolon(line) {
                        statements.push(buf.clone());
                        buf.clear();
                    }
                }
                State::StatementBeginUp | State::StatementBeginDown | State::Start => {}
            }
        }

        match state {
            State::Start => {
                return Err(UnoError::ParseError(format!(
                    "migration must start with a '-- {p} Up' annotation"
                )));
            }
            State::StatementBeginUp | State::StatementBeginDown => {
                return Err(UnoError::ParseError(format!(
                    "missing '-- {p} StatementEnd' annotation (state {state})"
                )));
            }
            _ => {}
        }

        let remaining = buf.trim();
        if !remaining.is_empty() {
            return Err(unfinished(state, direction, remaining));
        }

        Ok(ParsedScript {
            direction,
            statements,
            use_transaction,
        })
    }
}

fn unfinished(state: State, direction: Direction, remaining: &str) -> UnoError {
    UnoError::ParseError(format!(
        "state {state}, direction {direction}: unfinished SQL query {remaining:?}: missing semicolon?"
    ))
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new(
            vec!["+migration".to_string(), "+goose".to_string()],
            Arc::new(BufferPool::default()),
        )
    }
}

/// Returns `true` if the last word of `line` before any `--` comment ends
/// with a semicolon.
///
/// # Examples
///
/// ```
/// use uno_rs_db_migrations::parser::ends_with_semicolon;
///
/// assert!(ends_with_semicolon("SELECT 1; -- trailing"));
/// assert!(!ends_with_semicolon("SELECT 1 -- not done;"));
/// ```
pub fn ends_with_semicolon(line: &str) -> bool {
    line.split_whitespace()
        .take_while(|word| !word.starts_with("--"))
        .last()
        .is_some_and(|word| word.ends_with(';'))
}

/// Strips comment lines and blank lines from a statement for display.
pub fn clear_statement(statement: &str) -> String {
    static COMMENTS: OnceLock<Regex> = OnceLock::new();
    static EMPTY_LINES: OnceLock<Regex> = OnceLock::new();

    let comments = COMMENTS.get_or_init(|| Regex::new(r"(?m)^[ \t]*--.*$[\r\n]*").unwrap());
    let empty_lines = EMPTY_LINES.get_or_init(|| Regex::new(r"(?m)^[ \t]*$[\r\n]*").unwrap());

    let without_comments = comments.replace_all(statement, "");
    empty_lines
        .replace_all(&without_comments, "")
        .trim_end()
        .to_string()
}
