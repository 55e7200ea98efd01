//! One resolution strategy per syntactic category.
//!
//! Every strategy prints zero or more `PRJ_LOCATE:` blocks. Strategies that
//! chase a symbol across the project hand off to the USR scanner; the
//! C++-method strategy additionally runs the override scan.

use std::io::{self, Write};

use crate::parser::{CursorKind, Linkage, Location, Parser, Visit};

use super::{Ctx, emit_block, emit_block_at, overrides, usr_scan::UsrScan};

/// Decl-ref normalization: the referenced entity, falling back to the
/// declaration of the cursor's type.
fn resolve_target<P: Parser>(parser: &P, cursor: P::Cursor) -> Option<P::Cursor> {
    parser
        .referenced(cursor)
        .or_else(|| parser.type_declaration(cursor))
}

/// InclusionDirective: the target is line 1, column 1 of the included file.
pub(super) fn include<P: Parser, W: Write>(
    ctx: &Ctx<'_, P>,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    let Some(file) = ctx.parser.included_file(cursor) else {
        return Ok(());
    };
    let loc = Location {
        file: Some(file),
        line: 1,
        column: 1,
    };
    match ctx.parser.cursor_at(ctx.tu, file, 1, 1) {
        Some(target) => emit_block_at(ctx.parser, target, loc, out),
        None => Ok(()),
    }
}

/// ParmDecl / VarDecl / TypedefDecl: the declaration of the cursor's type.
pub(super) fn type_decl<P: Parser, W: Write>(
    ctx: &Ctx<'_, P>,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    let Some(target) = ctx.parser.type_declaration(cursor) else {
        return Ok(());
    };
    emit_block(ctx.parser, target, out)
}

/// Namespace / NamespaceRef: every namespace declaration in every live
/// translation unit, namespace references chased to their referent first.
pub(super) fn namespaces<P: Parser, W: Write>(ctx: &Ctx<'_, P>, out: &mut W) -> io::Result<()> {
    for slot in ctx.project.slots() {
        let Some(tu) = slot.tu.as_ref() else { continue };
        let mut err = None;
        ctx.parser.visit_children(ctx.parser.root(tu), &mut |c, _| {
            let c = if ctx.parser.kind(c) == CursorKind::NamespaceRef {
                ctx.parser.referenced(c).unwrap_or(c)
            } else {
                c
            };
            if ctx.parser.kind(c) != CursorKind::Namespace {
                return Visit::Recurse;
            }
            if let Err(e) = emit_block(ctx.parser, c, out) {
                err = Some(e);
                return Visit::Break;
            }
            Visit::Continue
        });
        if let Some(e) = err {
            return Err(e);
        }
    }
    Ok(())
}

/// CallExpr / DeclRefExpr / MacroExpansion / FunctionDecl: emit the resolved
/// declaration, then chase externally linked symbols through every
/// translation unit.
pub(super) fn decl_ref<P: Parser, W: Write>(
    ctx: &Ctx<'_, P>,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    let Some(target) = resolve_target(ctx.parser, cursor) else {
        return Ok(());
    };
    emit_block(ctx.parser, target, out)?;
    if ctx.parser.linkage(target) > Linkage::Internal {
        UsrScan::new(ctx.parser.usr(target)).run(ctx.parser, ctx.project, out)?;
    }
    Ok(())
}

/// MemberRefExpr: decl-ref resolution; a member that turns out to be a C++
/// method continues into the method strategy.
pub(super) fn member_ref<P: Parser, W: Write>(
    ctx: &Ctx<'_, P>,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    let Some(target) = resolve_target(ctx.parser, cursor) else {
        return Ok(());
    };
    emit_block(ctx.parser, target, out)?;
    if ctx.parser.kind(target) == CursorKind::CxxMethod {
        cxx_method(ctx, target, out)?;
    }
    Ok(())
}

/// ClassTemplate / Constructor: prefer the definition, then scan its USR
/// across the project with no linkage gate.
pub(super) fn class_template<P: Parser, W: Write>(
    ctx: &Ctx<'_, P>,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    let target = ctx.parser.definition(cursor).unwrap_or(cursor);
    emit_block(ctx.parser, target, out)?;
    UsrScan::new(ctx.parser.usr(target)).run(ctx.parser, ctx.project, out)
}

/// FieldDecl / ClassDecl: decl-ref resolution plus an ungated USR scan.
/// The dispatcher follows this with the constructor strategy.
pub(super) fn class_decl<P: Parser, W: Write>(
    ctx: &Ctx<'_, P>,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    let Some(target) = resolve_target(ctx.parser, cursor) else {
        return Ok(());
    };
    emit_block(ctx.parser, target, out)?;
    UsrScan::new(ctx.parser.usr(target)).run(ctx.parser, ctx.project, out)
}

/// CXXMethod: virtual methods get an override scan across every translation
/// unit first, then the class-template strategy resolves the method itself.
pub(super) fn cxx_method<P: Parser, W: Write>(
    ctx: &Ctx<'_, P>,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    if ctx.parser.is_virtual_method(cursor) {
        overrides::scan(ctx.parser, ctx.project, cursor, out)?;
    }
    class_template(ctx, cursor, out)
}

/// MacroDefinition / EnumDecl: the cursor itself, then each direct child.
pub(super) fn emit_with_children<P: Parser, W: Write>(
    ctx: &Ctx<'_, P>,
    cursor: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    emit_block(ctx.parser, cursor, out)?;
    let mut err = None;
    ctx.parser.visit_children(cursor, &mut |c, _| {
        if let Err(e) = emit_block(ctx.parser, c, out) {
            err = Some(e);
            return Visit::Break;
        }
        Visit::Continue
    });
    match err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
