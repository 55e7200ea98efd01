//! Virtual-method override scanner.

use std::io::{self, Write};

use tracing::debug;

use crate::parser::{CursorKind, Parser, Visit};
use crate::project::Project;

use super::emit_block;

/// Visit every method in every live translation unit; whenever one of its
/// overridden methods spells the same as the query method, report both the
/// overridden method and the overrider.
///
/// Matching is on spelling, not USR: methods of unrelated hierarchies that
/// share a name are reported too.
pub(super) fn scan<P: Parser, W: Write>(
    parser: &P,
    project: &Project<P>,
    query: P::Cursor,
    out: &mut W,
) -> io::Result<()> {
    let query_spelling = parser.spelling(query);
    debug!(method = %query_spelling, "override scan");
    for slot in project.slots() {
        let Some(tu) = slot.tu.as_ref() else { continue };
        let mut err = None;
        parser.visit_children(parser.root(tu), &mut |c, _| {
            if parser.kind(c) != CursorKind::CxxMethod {
                return Visit::Recurse;
            }
            for overridden in parser.overridden(c) {
                if parser.spelling(overridden) == query_spelling {
                    let emitted = emit_block(parser, overridden, out)
                        .and_then(|()| emit_block(parser, c, out));
                    if let Err(e) = emitted {
                        err = Some(e);
                        return Visit::Break;
                    }
                }
            }
            Visit::Continue
        });
        if let Some(e) = err {
            return Err(e);
        }
    }
    Ok(())
}
