// Copyright 2023, Antoine Catton
//
// Permission to use, copy, modify, and/or distribute this software for any purpose with or without
// fee is hereby granted, provided that the above copyright notice and this permission notice
// appear in all copies.
//
// THE SOFTWARE IS PROVIDED “AS IS” AND THE AUTHOR DISCLAIMS ALL WARRANTIES WITH REGARD TO THIS
// SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE
// AUTHOR BE LIABLE FOR ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION OF CONTRACT,
// NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF OR IN CONNECTION WITH THE USE OR PERFORMANCE
// OF THIS SOFTWARE.

//! Error taxonomy for the server.
//!
//! `ProtocolError` and `IncompleteRead` close the connection; `CommandError` is
//! encoded back to the client as a RESP error and the connection continues.

use thiserror::Error;

/// A grammar violation at the byte level. Fatal to the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("expected array prefix '*', got {0:?}")]
    ExpectedArrayPrefix(Vec<u8>),

    #[error("invalid array length: {0:?}")]
    InvalidArrayLength(Vec<u8>),

    #[error("expected bulk string prefix '$', got {0:?}")]
    ExpectedBulkPrefix(Vec<u8>),

    #[error("invalid bulk string length: {0:?}")]
    InvalidBulkLength(Vec<u8>),

    #[error("expected CRLF terminator after bulk string payload, got {0:?}")]
    MissingTerminator(Vec<u8>),

    #[error("bulk string payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("stream ended mid-command")]
    IncompleteRead,
}

/// A user-visible, per-request failure. The message is the exact RESP error
/// text sent back to the client (Redis convention: `ERR <reason>`).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        CommandError {
            message: message.into(),
        }
    }

    pub fn wrong_arity(cmd: &str) -> Self {
        Self::new(format!(
            "ERR wrong number of arguments for '{}' command",
            cmd.to_lowercase()
        ))
    }

    pub fn not_an_integer() -> Self {
        Self::new("ERR value is not an integer or out of range")
    }

    pub fn invalid_expire_time() -> Self {
        Self::new("ERR invalid expire time in 'expire' command")
    }

    pub fn unknown_command(name: &str) -> Self {
        Self::new(format!("ERR unknown command '{}'", name))
    }
}

/// Raised by `ExpiryEngine::start()` when the sweeper is already running.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpiryLifecycleError {
    #[error("active expiry is already running")]
    AlreadyRunning,
}
