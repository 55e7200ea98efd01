//! # cxnav
//!
//! **Symbol-location engine and completion server over libclang.** An editor
//! attaches once over a pair of pipes and keeps long-lived parser state hot,
//! so completion, diagnostics, and go-to-definition answer without reparsing
//! the world on each keystroke.
//!
//! ## Architecture
//!
//! - A **single-file session** serves completion, syntax checking, and
//!   single-file locate for the buffer the process was started for.
//! - A **project registry** holds up to 64 multi-file projects, each with its
//!   own parser index, lazily built translation units, shared clang
//!   arguments, and an unsaved-buffer overlay store.
//! - The **locate engine** classifies the cursor under the caret and picks a
//!   resolution strategy per syntactic kind, chasing symbols across every
//!   translation unit of the project by USR, and virtual methods by override
//!   sets.
//!
//! Everything reaches the parser through the [`parser::Parser`] trait; the
//! production backend loads libclang at runtime, and the test suite drives
//! the same engine with an in-memory parser.
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use cxnav::parser::clang::ClangParser;
//! use cxnav::server::Server;
//!
//! let parser = ClangParser::new().unwrap();
//! let mut server = Server::new(parser, "/tmp/a.cpp".into(), vec!["-I/tmp".into()]);
//! let (stdin, stdout) = (std::io::stdin(), std::io::stdout());
//! server.run(&mut stdin.lock(), &mut stdout.lock()).unwrap();
//! ```

// ============================================================================
// Core Modules
// ============================================================================

/// Capability boundary over the external parser: the [`parser::Parser`]
/// trait, cursor kinds, locations, completion chunks, and the libclang
/// backend in [`parser::clang`].
pub mod parser;

/// Project registry and unsaved-buffer overlay store.
pub mod project;

/// The symbol-location engine: cursor normalization, per-kind resolution
/// strategies, the cross-TU USR scanner, and the override scanner.
pub mod locate;

/// Single-file completion session: source buffer, completion rendering,
/// diagnostics, single-file locate.
pub mod session;

/// Request dispatcher: the blocking verb loop and wire framing.
pub mod server;

// ============================================================================
// Re-exports for convenience
// ============================================================================

/// The parser facade trait.
pub use parser::Parser;

/// Project collection with dense ids.
pub use project::Registry;

/// Hard cap on concurrently registered projects.
pub use project::MAX_PROJECTS;

/// One editor buffer's parsing state.
pub use session::Session;

/// The whole server: session + registry + verb loop.
pub use server::Server;

/// Wire-level error taxonomy.
pub use server::ProtocolError;
