//! Capability boundary over the external C/C++ parser.
//!
//! Everything the engine knows about parsing goes through the [`Parser`]
//! trait: index creation, (re)parsing with unsaved-buffer overlays, cursor
//! lookup and relations, location decoding, child visitation, diagnostics,
//! and code completion. The production implementation sits on libclang (see
//! [`clang`]); tests drive the same trait with an in-memory parser.
//!
//! Cursors and files are plain values borrowed from a translation unit. They
//! are only meaningful while that translation unit is alive; the engine never
//! holds one across a reparse.

pub mod clang;

/// Syntactic kind of a cursor, as far as the engine cares.
///
/// Kinds the dispatch table does not handle collapse into [`Other`] with the
/// backend's raw tag, so the unhandled-kind diagnostic can still name them.
///
/// [`Other`]: CursorKind::Other
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CursorKind {
    InclusionDirective,
    ParmDecl,
    VarDecl,
    TypedefDecl,
    Namespace,
    NamespaceRef,
    CallExpr,
    DeclRefExpr,
    MemberRefExpr,
    MacroExpansion,
    MacroDefinition,
    ClassTemplate,
    Constructor,
    FunctionDecl,
    FieldDecl,
    ClassDecl,
    CxxMethod,
    EnumDecl,
    CompoundStmt,
    Other(i32),
}

/// A decoded source location. `file` is `None` for the null location.
///
/// Lines and columns are 1-based. The all-zero value doubles as the engine's
/// "not found" result.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Location<F> {
    pub file: Option<F>,
    pub line: u32,
    pub column: u32,
}

impl<F> Location<F> {
    /// The "not found" location: no file, line 0, column 0.
    pub fn none() -> Self {
        Location {
            file: None,
            line: 0,
            column: 0,
        }
    }
}

/// Linkage of a declaration. Ordered so `linkage > Internal` reads the same
/// way it does in the C API.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Linkage {
    Invalid,
    NoLinkage,
    Internal,
    UniqueExternal,
    External,
}

/// What a child visitor wants done next.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Visit {
    /// Stop the whole traversal.
    Break,
    /// Skip this cursor's children, move to its next sibling.
    Continue,
    /// Descend into this cursor's children.
    Recurse,
}

/// An in-memory replacement for the on-disk contents of a path, handed to the
/// parser during (re)parse.
#[derive(Clone, Copy, Debug)]
pub struct Unsaved<'a> {
    pub path: &'a str,
    pub contents: &'a [u8],
}

/// Parse flags the engine cares about.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ParseOptions {
    /// Keep the preprocessing record so macro cursors resolve.
    pub detailed_preprocessing: bool,
    /// Build a precompiled preamble to speed up reparses.
    pub precompiled_preamble: bool,
}

impl ParseOptions {
    /// The defaults for long-lived, editor-driven translation units.
    pub fn editing() -> Self {
        ParseOptions {
            detailed_preprocessing: true,
            precompiled_preamble: true,
        }
    }
}

/// One chunk of a completion candidate's display text.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Chunk {
    /// The text the user actually types; the candidate's identity.
    TypedText(String),
    /// Result type of the candidate.
    ResultType(String),
    /// A parameter or other fill-in slot.
    Placeholder(String),
    /// An optional trailing part (defaulted parameters and the like).
    Optional(String),
    /// Non-inserted context, e.g. the enclosing class.
    Informative(String),
    /// Literal text: punctuation, keywords.
    Text(String),
}

/// One code-completion candidate.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Completion {
    pub chunks: Vec<Chunk>,
    pub available: bool,
}

impl Completion {
    /// The candidate's typed text, if it has one.
    pub fn typed_text(&self) -> Option<&str> {
        self.chunks.iter().find_map(|c| match c {
            Chunk::TypedText(t) => Some(t.as_str()),
            _ => None,
        })
    }
}

/// The parser facade.
///
/// One implementor instance stands for the loaded parser library; indexes and
/// translation units are created through it and owned by the caller. All
/// cursor operations take `&self` so a cursor stays a cheap copyable value.
pub trait Parser {
    /// Per-project parser instance; owns parser-side caches.
    type Index;
    /// A parsed translation unit. Dropping it releases the parse.
    type Tu;
    /// A node handle into a live translation unit.
    type Cursor: Copy + PartialEq;
    /// A file handle within a live translation unit.
    type File: Copy + PartialEq;

    fn create_index(&self) -> Self::Index;

    /// Parse `path` with `args`, substituting `overlays` for on-disk
    /// contents. `None` means the parse failed outright.
    fn parse(
        &self,
        index: &Self::Index,
        path: &str,
        args: &[String],
        overlays: &[Unsaved<'_>],
        opts: ParseOptions,
    ) -> Option<Self::Tu>;

    /// Reparse in place with a fresh overlay set. `false` means the
    /// translation unit is no longer usable and must be discarded.
    fn reparse(&self, tu: &mut Self::Tu, overlays: &[Unsaved<'_>], opts: ParseOptions) -> bool;

    /// The translation-unit root cursor.
    fn root(&self, tu: &Self::Tu) -> Self::Cursor;

    /// File handle for `path` within `tu`, if the TU involves that file.
    fn file(&self, tu: &Self::Tu, path: &str) -> Option<Self::File>;

    /// The cursor at (file, line, column), or `None` for the null cursor.
    fn cursor_at(&self, tu: &Self::Tu, file: Self::File, line: u32, column: u32)
    -> Option<Self::Cursor>;

    fn kind(&self, cursor: Self::Cursor) -> CursorKind;

    /// Human-readable spelling of the cursor's kind.
    fn kind_name(&self, cursor: Self::Cursor) -> String;

    fn spelling(&self, cursor: Self::Cursor) -> String;

    /// Unified Symbol Resolution string; empty for anonymous entities.
    fn usr(&self, cursor: Self::Cursor) -> String;

    fn location_of(&self, cursor: Self::Cursor) -> Location<Self::File>;

    fn file_name(&self, file: Self::File) -> String;

    fn is_definition(&self, cursor: Self::Cursor) -> bool;

    /// True when the cursor's kind is a reference per the parser's own
    /// classification.
    fn is_reference(&self, cursor: Self::Cursor) -> bool;

    /// True when the kind falls in the parser's reserved reference range.
    fn in_reference_range(&self, cursor: Self::Cursor) -> bool;

    /// True when the kind falls in the parser's error/placeholder range.
    fn in_invalid_range(&self, cursor: Self::Cursor) -> bool;

    /// The entity this cursor refers to, or `None` for the null cursor.
    fn referenced(&self, cursor: Self::Cursor) -> Option<Self::Cursor>;

    /// The definition of the entity behind this cursor, if visible.
    fn definition(&self, cursor: Self::Cursor) -> Option<Self::Cursor>;

    /// Declaration cursor of this cursor's type, if any.
    fn type_declaration(&self, cursor: Self::Cursor) -> Option<Self::Cursor>;

    /// For an inclusion directive, the file being included.
    fn included_file(&self, cursor: Self::Cursor) -> Option<Self::File>;

    fn linkage(&self, cursor: Self::Cursor) -> Linkage;

    fn is_virtual_method(&self, cursor: Self::Cursor) -> bool;

    /// The set of methods this method overrides. Empty for non-overriding
    /// methods.
    fn overridden(&self, cursor: Self::Cursor) -> Vec<Self::Cursor>;

    /// Pre-order child visitation driven by the visitor's [`Visit`] verdicts.
    fn visit_children(
        &self,
        cursor: Self::Cursor,
        visitor: &mut dyn FnMut(Self::Cursor, Self::Cursor) -> Visit,
    );

    /// Formatted diagnostics for the translation unit, one string each.
    fn diagnostics(&self, tu: &Self::Tu) -> Vec<String>;

    /// Code completion at (line, column) of `path`, sorted by the parser's
    /// own ordering.
    fn complete_at(
        &self,
        tu: &mut Self::Tu,
        path: &str,
        line: u32,
        column: u32,
        overlays: &[Unsaved<'_>],
    ) -> Vec<Completion>;
}
