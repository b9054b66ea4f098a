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

//! Streaming RESP v2 decoder (restricted to Array-of-BulkString commands)
//! and encoder for SimpleString/Error/Integer/BulkString replies.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::ProtocolError;

/// A reply value the executor hands to the codec. The encoder is an
/// exhaustive match over this enum, so there is no runtime
/// "unsupported type" branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Option<String>),
}

/// Outcome of trying to decode one command from the stream.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A full command was decoded.
    Command(Vec<String>),
    /// The stream ended cleanly between commands (no bytes yet consumed for
    /// a new one). A normal disconnect, not a protocol error.
    Eof,
}

/// Decodes one pipelined RESP command (an Array of BulkStrings) from an
/// async buffered reader. Suspends to await more bytes as needed; does not
/// require the whole command to already be buffered.
pub async fn decode_command<R>(reader: &mut R) -> Result<DecodeOutcome, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let header = match read_line(reader).await? {
        Some(line) => line,
        None => return Ok(DecodeOutcome::Eof),
    };

    if header.is_empty() || header[0] != b'*' {
        return Err(ProtocolError::ExpectedArrayPrefix(header));
    }
    let count = parse_non_negative(&header[1..])
        .ok_or_else(|| ProtocolError::InvalidArrayLength(header.clone()))?;

    let mut command = Vec::with_capacity(count);
    for _ in 0..count {
        let length_line = read_line(reader)
            .await?
            .ok_or(ProtocolError::IncompleteRead)?;

        if length_line.is_empty() || length_line[0] != b'$' {
            return Err(ProtocolError::ExpectedBulkPrefix(length_line));
        }
        let len = parse_non_negative(&length_line[1..])
            .ok_or_else(|| ProtocolError::InvalidBulkLength(length_line.clone()))?;

        let mut payload = vec![0u8; len];
        reader
            .read_exact(&mut payload)
            .await
            .map_err(|_| ProtocolError::IncompleteRead)?;

        let mut terminator = [0u8; 2];
        reader
            .read_exact(&mut terminator)
            .await
            .map_err(|_| ProtocolError::IncompleteRead)?;
        if terminator != *b"\r\n" {
            return Err(ProtocolError::MissingTerminator(terminator.to_vec()));
        }

        let text = String::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
        command.push(text);
    }

    Ok(DecodeOutcome::Command(command))
}

/// Reads one line up to and including CRLF, returning it with the CRLF
/// stripped. Returns `None` if EOF occurs before any byte is read (a clean
/// disconnect); returns `ProtocolError::IncompleteRead` if EOF occurs after
/// some bytes were already consumed for this line.
async fn read_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = reader
        .read_until(b'\n', &mut buf)
        .await
        .map_err(|_| ProtocolError::IncompleteRead)?;

    if n == 0 {
        return Ok(None);
    }
    if !buf.ends_with(b"\n") {
        return Err(ProtocolError::IncompleteRead);
    }
    buf.pop(); // '\n'
    if buf.pop() != Some(b'\r') {
        return Err(ProtocolError::IncompleteRead);
    }
    Ok(Some(buf))
}

/// Parses a non-negative decimal integer. Rejects `-1` and any other
/// negative or malformed value: the protocol (restricted to commands) never
/// carries null arrays or null bulk strings inbound.
fn parse_non_negative(bytes: &[u8]) -> Option<usize> {
    std::str::from_utf8(bytes).ok()?.parse::<usize>().ok()
}

/// Encodes a SimpleString reply: `+<text>\r\n`.
pub fn encode_simple_string(value: &str) -> Vec<u8> {
    format!("+{value}\r\n").into_bytes()
}

/// Encodes an Error reply: `-<text>\r\n`.
pub fn encode_error(message: &str) -> Vec<u8> {
    format!("-{message}\r\n").into_bytes()
}

/// Encodes an Integer reply: `:<n>\r\n`.
pub fn encode_integer(value: i64) -> Vec<u8> {
    format!(":{value}\r\n").into_bytes()
}

/// Encodes a Bulk String reply, or `$-1\r\n` for null.
pub fn encode_bulk_string(value: Option<&str>) -> Vec<u8> {
    match value {
        None => b"$-1\r\n".to_vec(),
        Some(text) => {
            let bytes = text.as_bytes();
            let mut out = format!("${}\r\n", bytes.len()).into_bytes();
            out.extend_from_slice(bytes);
            out.extend_from_slice(b"\r\n");
            out
        }
    }
}

/// Dispatches to the right encoder by `Reply` variant.
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    match reply {
        Reply::SimpleString(s) => encode_simple_string(s),
        Reply::Error(s) => encode_error(s),
        Reply::Integer(i) => encode_integer(*i),
        Reply::BulkString(s) => encode_bulk_string(s.as_deref()),
    }
}
