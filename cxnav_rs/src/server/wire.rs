//! Line framing for the editor protocol.
//!
//! Requests are newline-framed ASCII headers, sometimes followed by a raw
//! byte payload whose length a header announced. Responses end with a line
//! containing only `$`, then a flush; that sentinel is what the editor polls
//! for.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::project::RegistryError;

/// Everything that can go wrong between the wire and a handler.
///
/// Anything that is not I/O is answered with one descriptive line plus the
/// sentinel; the server keeps serving.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("malformed header: expected `{expected}:`, got `{line}`")]
    BadField { expected: &'static str, line: String },
    #[error("bad number in `{line}`")]
    BadNumber { line: String },
    #[error("unknown request verb: {0}")]
    UnknownVerb(String),
    #[error("unknown PROJECT subcommand: {0}")]
    UnknownSubcommand(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Read one line without its trailing newline; `None` at end of input.
pub(super) fn read_line(input: &mut impl BufRead) -> Result<Option<String>, ProtocolError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

/// Read one line; end of input mid-request is a protocol error.
pub(super) fn require_line(input: &mut impl BufRead) -> Result<String, ProtocolError> {
    read_line(input)?.ok_or(ProtocolError::UnexpectedEof)
}

/// Read a `key:value` header line and hand back the value, trimmed.
pub(super) fn read_field(
    input: &mut impl BufRead,
    key: &'static str,
) -> Result<String, ProtocolError> {
    let line = require_line(input)?;
    match line.strip_prefix(key).and_then(|rest| rest.strip_prefix(':')) {
        Some(value) => Ok(value.trim().to_string()),
        None => Err(ProtocolError::BadField {
            expected: key,
            line,
        }),
    }
}

/// Read a `key:<number>` header line.
pub(super) fn read_number_field(
    input: &mut impl BufRead,
    key: &'static str,
) -> Result<usize, ProtocolError> {
    let value = read_field(input, key)?;
    value
        .parse()
        .map_err(|_| ProtocolError::BadNumber { line: value })
}

/// Collect `count` whitespace-delimited tokens, reading as many lines as it
/// takes.
pub(super) fn read_args(
    input: &mut impl BufRead,
    count: usize,
) -> Result<Vec<String>, ProtocolError> {
    let mut args = Vec::with_capacity(count);
    while args.len() < count {
        let line = require_line(input)?;
        args.extend(line.split_whitespace().map(str::to_string));
    }
    args.truncate(count);
    Ok(args)
}

/// Terminate a response: the `$` sentinel on its own line, then flush.
pub(super) fn end_response(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "$")?;
    out.flush()
}
