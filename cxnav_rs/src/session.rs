//! Single-file completion session.
//!
//! The session is what the editor talks to for one buffer: a source filename,
//! the latest unsaved contents, the clang argument vector, and one long-lived
//! translation unit that is reparsed instead of rebuilt on every keystroke.
//! Completion, syntax checking, and single-file locate all run against it.

use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::locate::nearest;
use crate::parser::{Chunk, Completion, CursorKind, Location, ParseOptions, Parser, Unsaved};

/// Initial capacity of the unsaved-source buffer.
pub const INITIAL_SRC_BUFFER_SIZE: usize = 4096;

/// Growable buffer for the editor's unsaved source.
///
/// Growth policy: when an incoming source is at least as large as the current
/// capacity, capacity jumps to twice the incoming length, so a steadily
/// growing buffer reallocates rarely.
pub struct SourceBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl SourceBuffer {
    pub fn new() -> Self {
        SourceBuffer {
            data: Vec::with_capacity(INITIAL_SRC_BUFFER_SIZE),
            capacity: INITIAL_SRC_BUFFER_SIZE,
        }
    }

    /// Replace the contents with exactly `len` bytes read from `input`.
    pub fn fill_from(&mut self, input: &mut dyn BufRead, len: usize) -> io::Result<()> {
        if len >= self.capacity {
            self.capacity = len * 2;
            self.data
                .reserve(self.capacity.saturating_sub(self.data.len()));
        }
        self.data.resize(len, 0);
        input.read_exact(&mut self.data)
    }

    /// Drop the contents and shrink back to the initial capacity.
    pub fn reset(&mut self) {
        self.data = Vec::with_capacity(INITIAL_SRC_BUFFER_SIZE);
        self.capacity = INITIAL_SRC_BUFFER_SIZE;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SourceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// One editor buffer's parsing state.
pub struct Session<P: Parser> {
    filename: String,
    buffer: SourceBuffer,
    args: Vec<String>,
    // Declared before `index`: the translation unit must be disposed before
    // the index that created it, and fields drop in declaration order.
    tu: Option<P::Tu>,
    index: P::Index,
}

impl<P: Parser> Session<P> {
    /// Start a session for `filename`: parse once, then reparse immediately
    /// so the precompiled preamble is primed for the first completion.
    pub fn new(parser: &P, filename: String, args: Vec<String>) -> Self {
        let mut session = Session {
            filename,
            buffer: SourceBuffer::new(),
            args,
            index: parser.create_index(),
            tu: None,
        };
        if session.parse(parser) {
            session.reparse(parser);
        }
        session
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn buffer_mut(&mut self) -> &mut SourceBuffer {
        &mut self.buffer
    }

    /// Build the translation unit from scratch.
    pub fn parse(&mut self, parser: &P) -> bool {
        let Session {
            filename,
            buffer,
            args,
            index,
            tu,
        } = self;
        let unsaved = [Unsaved {
            path: filename,
            contents: buffer.as_bytes(),
        }];
        *tu = parser.parse(index, filename, args, &unsaved, ParseOptions::editing());
        if tu.is_none() {
            debug!(file = %filename, "session parse failed");
        }
        tu.is_some()
    }

    /// Reparse in place with the current buffer contents.
    pub fn reparse(&mut self, parser: &P) -> bool {
        let Session {
            filename,
            buffer,
            tu,
            ..
        } = self;
        let Some(tu) = tu.as_mut() else {
            return false;
        };
        let unsaved = [Unsaved {
            path: filename,
            contents: buffer.as_bytes(),
        }];
        parser.reparse(tu, &unsaved, ParseOptions::editing())
    }

    /// Replace the argument vector and rebuild the translation unit so the
    /// new arguments take effect; the follow-up reparse primes the preamble.
    pub fn set_args(&mut self, parser: &P, args: Vec<String>) {
        self.args = args;
        self.tu = None;
        if self.parse(parser) {
            self.reparse(parser);
        }
    }

    /// Point the session at a different file, with fresh arguments and an
    /// empty buffer, and rebuild.
    pub fn retarget(&mut self, parser: &P, filename: String, args: Vec<String>) {
        debug!(from = %self.filename, to = %filename, "session retarget");
        self.filename = filename;
        self.buffer.reset();
        self.set_args(parser, args);
    }

    /// Code completion at (line, column) against the current buffer.
    pub fn complete(&mut self, parser: &P, line: u32, column: u32) -> Vec<Completion> {
        let Session {
            filename,
            buffer,
            tu,
            ..
        } = self;
        let Some(tu) = tu.as_mut() else {
            return Vec::new();
        };
        let unsaved = [Unsaved {
            path: filename,
            contents: buffer.as_bytes(),
        }];
        parser.complete_at(tu, filename, line, column, &unsaved)
    }

    /// Formatted diagnostics for the current translation unit.
    pub fn diagnostics(&self, parser: &P) -> Vec<String> {
        match self.tu.as_ref() {
            Some(tu) => parser.diagnostics(tu),
            None => Vec::new(),
        }
    }

    /// Single-file locate: where is the thing at (line, column) declared?
    ///
    /// The zero location is the "not found" answer.
    pub fn locate_at(&self, parser: &P, line: u32, column: u32) -> Location<P::File> {
        let Some(tu) = self.tu.as_ref() else {
            return Location::none();
        };
        let Some(file) = parser.file(tu, &self.filename) else {
            return Location::none();
        };
        let Some(mut cursor) = parser.cursor_at(tu, file, line, column) else {
            return Location::none();
        };

        if parser.in_invalid_range(cursor) {
            return nearest::find(parser, tu, file, line).location;
        }
        while parser.is_reference(cursor) {
            match parser.referenced(cursor) {
                Some(next) if next != cursor => cursor = next,
                _ => break,
            }
        }
        if parser.in_reference_range(cursor) {
            if let Some(next) = parser.referenced(cursor) {
                cursor = next;
            }
        }

        match parser.kind(cursor) {
            // A bare statement carries no symbol; answer with the nearest
            // top-level cursor instead.
            CursorKind::CompoundStmt => nearest::find(parser, tu, file, line).location,
            CursorKind::TypedefDecl => match parser.type_declaration(cursor) {
                Some(decl) => parser.location_of(decl),
                None => Location::none(),
            },
            CursorKind::MacroExpansion
            | CursorKind::CallExpr
            | CursorKind::DeclRefExpr
            | CursorKind::MemberRefExpr => {
                let target = parser
                    .referenced(cursor)
                    .or_else(|| parser.type_declaration(cursor));
                match target {
                    Some(target) => parser.location_of(target),
                    None => Location::none(),
                }
            }
            CursorKind::ClassTemplate => {
                parser.location_of(parser.definition(cursor).unwrap_or(cursor))
            }
            CursorKind::InclusionDirective => Location {
                file: parser.included_file(cursor),
                line: 1,
                column: 1,
            },
            _ => parser.location_of(cursor),
        }
    }
}

/// Render one candidate as its wire line, e.g.
/// `COMPLETION: printf : [#int#]printf(<#const char *#>)`.
///
/// Unavailable candidates and candidates with no typed text render nothing.
/// A candidate whose whole pattern is just its name collapses to
/// `COMPLETION: name`.
pub fn render_completion(completion: &Completion) -> Option<String> {
    if !completion.available {
        return None;
    }
    let typed = completion.typed_text()?;
    let mut signature = String::new();
    for chunk in &completion.chunks {
        match chunk {
            Chunk::TypedText(t) | Chunk::Text(t) => signature.push_str(t),
            Chunk::ResultType(t) => {
                signature.push_str("[#");
                signature.push_str(t);
                signature.push_str("#]");
            }
            Chunk::Placeholder(t) => {
                signature.push_str("<#");
                signature.push_str(t);
                signature.push_str("#>");
            }
            Chunk::Optional(t) => {
                signature.push_str("{#");
                signature.push_str(t);
                signature.push_str("#}");
            }
            Chunk::Informative(_) => {}
        }
    }
    if signature == typed {
        Some(format!("COMPLETION: {typed}"))
    } else {
        Some(format!("COMPLETION: {typed} : {signature}"))
    }
}

/// Write every renderable candidate whose typed text starts with `prefix`.
pub fn write_completions<W: Write>(
    results: &[Completion],
    prefix: &str,
    out: &mut W,
) -> io::Result<()> {
    for completion in results {
        if !completion
            .typed_text()
            .is_some_and(|t| t.starts_with(prefix))
        {
            continue;
        }
        if let Some(line) = render_completion(completion) {
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(chunks: Vec<Chunk>) -> Completion {
        Completion {
            chunks,
            available: true,
        }
    }

    #[test]
    fn buffer_starts_at_initial_capacity() {
        let buf = SourceBuffer::new();
        assert_eq!(buf.capacity(), INITIAL_SRC_BUFFER_SIZE);
        assert!(buf.is_empty());
    }

    #[test]
    fn buffer_doubles_past_requested_length() {
        let mut buf = SourceBuffer::new();
        let payload = vec![b'x'; 5000];
        buf.fill_from(&mut payload.as_slice(), 5000).unwrap();
        assert_eq!(buf.len(), 5000);
        assert_eq!(buf.capacity(), 10000);
    }

    #[test]
    fn buffer_small_fill_keeps_capacity() {
        let mut buf = SourceBuffer::new();
        buf.fill_from(&mut &b"int x;"[..], 6).unwrap();
        assert_eq!(buf.as_bytes(), b"int x;");
        assert_eq!(buf.capacity(), INITIAL_SRC_BUFFER_SIZE);
    }

    #[test]
    fn buffer_reset_returns_to_initial_capacity() {
        let mut buf = SourceBuffer::new();
        let payload = vec![b'y'; 9000];
        buf.fill_from(&mut payload.as_slice(), 9000).unwrap();
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), INITIAL_SRC_BUFFER_SIZE);
    }

    #[test]
    fn render_full_signature() {
        let c = candidate(vec![
            Chunk::ResultType("int".into()),
            Chunk::TypedText("printf".into()),
            Chunk::Text("(".into()),
            Chunk::Placeholder("const char *".into()),
            Chunk::Text(")".into()),
        ]);
        assert_eq!(
            render_completion(&c).as_deref(),
            Some("COMPLETION: printf : [#int#]printf(<#const char *#>)")
        );
    }

    #[test]
    fn render_bare_name_collapses() {
        let c = candidate(vec![Chunk::TypedText("value".into())]);
        assert_eq!(render_completion(&c).as_deref(), Some("COMPLETION: value"));
    }

    #[test]
    fn render_skips_unavailable() {
        let mut c = candidate(vec![Chunk::TypedText("gone".into())]);
        c.available = false;
        assert_eq!(render_completion(&c), None);
    }

    #[test]
    fn render_optional_chunk() {
        let c = candidate(vec![
            Chunk::TypedText("substr".into()),
            Chunk::Text("(".into()),
            Chunk::Placeholder("size_t pos".into()),
            Chunk::Optional(", size_t len".into()),
            Chunk::Text(")".into()),
        ]);
        assert_eq!(
            render_completion(&c).as_deref(),
            Some("COMPLETION: substr : substr(<#size_t pos#>{#, size_t len#})")
        );
    }

    #[test]
    fn write_completions_filters_by_prefix() {
        let results = vec![
            candidate(vec![Chunk::TypedText("print".into())]),
            candidate(vec![Chunk::TypedText("printf".into())]),
            candidate(vec![Chunk::TypedText("scan".into())]),
        ];
        let mut out = Vec::new();
        write_completions(&results, "pri", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "COMPLETION: print\nCOMPLETION: printf\n");
    }
}
