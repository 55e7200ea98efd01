//! The symbol-location engine.
//!
//! Answers "where is the thing at (line, column) of the active source
//! defined, declared, or overridden?" across all translation units of a
//! project. The flow is: translation-unit lifecycle, cursor normalization,
//! then kind dispatch into a resolution strategy. Results go out as
//! `PRJ_LOCATE:` blocks on the response stream; a query that resolves nothing
//! simply emits no block.

mod overrides;
mod strategies;
mod usr_scan;

pub(crate) mod nearest;

use std::io::{self, Write};

use tracing::debug;

use crate::parser::{CursorKind, Location, Parser};
use crate::project::Project;

/// Shared read-only context for the resolution strategies.
struct Ctx<'a, P: Parser> {
    pub parser: &'a P,
    pub project: &'a Project<P>,
    /// The active translation unit, already built or reparsed.
    pub tu: &'a P::Tu,
}

/// Run a LOCATE query against the project's active translation unit.
pub fn locate<P: Parser, W: Write>(
    parser: &P,
    project: &mut Project<P>,
    line: u32,
    column: u32,
    out: &mut W,
) -> io::Result<()> {
    let slot = project.active();

    // Lifecycle: build the slot on first use, otherwise reparse in place so
    // the query sees the current overlays. A failed reparse poisons the
    // handle; drop it and let the next query rebuild.
    if project.tu(slot).is_none() {
        debug!(slot, "active translation unit missing, building");
        if !project.build_tu(parser, slot) {
            writeln!(out, "translation unit creation failed")?;
            return Ok(());
        }
    } else if !project.reparse_tu(parser, slot) {
        writeln!(out, "translation unit reparse failed")?;
        project.drop_tu(slot);
        return Ok(());
    }

    let project = &*project;
    let Some(tu) = project.tu(slot) else {
        return Ok(());
    };
    let Some(file) = parser.file(tu, project.source_path(slot)) else {
        debug!(slot, "source file unknown to its translation unit");
        return Ok(());
    };
    let Some(mut cursor) = parser.cursor_at(tu, file, line, column) else {
        debug!(line, column, "no cursor at requested location");
        return Ok(());
    };

    if parser.in_invalid_range(cursor) {
        debug!("invalid cursor kind, falling back to nearest cursor");
        let near = nearest::find(parser, tu, file, line);
        if let Some(best) = near.cursor {
            emit_block(parser, best, out)?;
        }
        return Ok(());
    }

    // Unwrap reference cursors down to the entity they name. The guard
    // against a self-referential cursor keeps a degenerate parse from
    // spinning us forever.
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

    let ctx = Ctx {
        parser,
        project,
        tu,
    };
    dispatch(&ctx, cursor, out)
}

fn dispatch<P: Parser, W: Write>(
    ctx: &Ctx<'_, P>,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    match ctx.parser.kind(cursor) {
        CursorKind::InclusionDirective => strategies::include(ctx, cursor, out),
        CursorKind::ParmDecl | CursorKind::VarDecl | CursorKind::TypedefDecl => {
            strategies::type_decl(ctx, cursor, out)
        }
        CursorKind::Namespace | CursorKind::NamespaceRef => strategies::namespaces(ctx, out),
        CursorKind::MacroDefinition | CursorKind::EnumDecl => {
            strategies::emit_with_children(ctx, cursor, out)
        }
        CursorKind::MacroExpansion
        | CursorKind::CallExpr
        | CursorKind::DeclRefExpr
        | CursorKind::FunctionDecl => strategies::decl_ref(ctx, cursor, out),
        CursorKind::MemberRefExpr => strategies::member_ref(ctx, cursor, out),
        CursorKind::ClassTemplate | CursorKind::Constructor => {
            strategies::class_template(ctx, cursor, out)
        }
        CursorKind::FieldDecl | CursorKind::ClassDecl => {
            // Field and class declarations run their own pass and then
            // continue into the constructor strategy on the same cursor.
            strategies::class_decl(ctx, cursor, out)?;
            strategies::class_template(ctx, cursor, out)
        }
        CursorKind::CxxMethod => strategies::cxx_method(ctx, cursor, out),
        _ => writeln!(
            out,
            "Unhandled Cursor Dispatch case: {}",
            ctx.parser.kind_name(cursor)
        ),
    }
}

/// Print one `PRJ_LOCATE:` block for `cursor` at its own location.
fn emit_block<P: Parser, W: Write>(
    parser: &P,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    let loc = parser.location_of(cursor);
    emit_block_at(parser, cursor, loc, out)
}

/// Print one `PRJ_LOCATE:` block for `cursor` at an explicit location.
/// A null location emits nothing.
fn emit_block_at<P: Parser, W: Write>(
    parser: &P,
    cursor: P::Cursor,
    loc: Location<P::File>,
    out: &mut W,
) -> io::Result<()> {
    let Some(file) = loc.file else {
        debug!("dropping result with null location");
        return Ok(());
    };
    writeln!(out, "PRJ_LOCATE:")?;
    writeln!(
        out,
        "desc:{} ! {}",
        parser.kind_name(cursor),
        parser.spelling(cursor)
    )?;
    writeln!(out, "file:{}", parser.file_name(file))?;
    writeln!(out, "line:{}", loc.line)?;
    writeln!(out, "column:{}", loc.column)?;
    writeln!(out, "definition:{}", parser.is_definition(cursor))?;
    Ok(())
}
