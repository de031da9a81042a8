//! Stream cursor grammar and reserved values.
//!
//! A cursor is an opaque position token in a stream's ordered message log.
//! Three forms are meaningful to this client:
//!
//! - `"0"` - beginning of retained history
//! - `"$"` - tail: only messages arriving after connection time
//! - `"<milliseconds>-<sequence>"` - a literal message id, resuming after
//!   that exact position
//!
//! Anything else is server-defined and outside this client's contract, so
//! parsing rejects it rather than passing it through silently.
//!
//! Cursors are monotonically ordered within a stream. For at-least-once
//! delivery across reconnects, persist the cursor of the last message you
//! actually applied, never a cursor you have not processed up to yet.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A position in a stream's message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Beginning of retained history (`"0"`; `"0-0"` on the WebSocket surface)
    Start,
    /// Tail of the stream - only new messages (`"$"`)
    Tail,
    /// Resume after an exact message id (`"<millis>-<seq>"`)
    At(String),
}

impl Cursor {
    /// Render the cursor for poll/SSE query strings.
    pub fn as_query_value(&self) -> String {
        match self {
            Cursor::Start => "0".to_string(),
            Cursor::Tail => "$".to_string(),
            Cursor::At(id) => id.clone(),
        }
    }

    /// Render the cursor for WebSocket subscribe frames, where the
    /// start-of-history form is spelled `"0-0"`.
    pub fn as_subscribe_value(&self) -> String {
        match self {
            Cursor::Start => "0-0".to_string(),
            Cursor::Tail => "$".to_string(),
            Cursor::At(id) => id.clone(),
        }
    }

    /// Whether `s` matches the `<millis>-<seq>` message-id grammar.
    pub fn is_message_id(s: &str) -> bool {
        match s.split_once('-') {
            Some((millis, seq)) => {
                !millis.is_empty()
                    && !seq.is_empty()
                    && millis.bytes().all(|b| b.is_ascii_digit())
                    && seq.bytes().all(|b| b.is_ascii_digit())
            }
            None => false,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::Start
    }
}

impl FromStr for Cursor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "0" | "0-0" => Ok(Cursor::Start),
            "$" => Ok(Cursor::Tail),
            other if Cursor::is_message_id(other) => Ok(Cursor::At(other.to_string())),
            other => Err(Error::protocol(format!(
                "invalid cursor {:?}: expected \"0\", \"$\", or \"<millis>-<seq>\"",
                other
            ))),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_query_value())
    }
}
