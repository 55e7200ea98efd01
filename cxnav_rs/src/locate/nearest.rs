//! Nearest-cursor fallback for locations with no valid cursor.

use crate::parser::{Location, Parser, Visit};

/// Outcome of a nearest-cursor walk.
pub(crate) struct Nearest<P: Parser> {
    /// The winning cursor, absent when no top-level child preceded the
    /// requested line in the requested file.
    pub cursor: Option<P::Cursor>,
    /// The winning location, or the synthetic (no file, 1, 1).
    pub location: Location<P::File>,
}

/// Walk the root's direct children once, in source order. The last child on
/// the requested file whose line is at or before the requested line wins;
/// the first child past that line ends the walk, since children arrive in
/// source order.
pub(crate) fn find<P: Parser>(
    parser: &P,
    tu: &P::Tu,
    file: P::File,
    line: u32,
) -> Nearest<P> {
    let mut best: Option<(P::Cursor, Location<P::File>)> = None;
    parser.visit_children(parser.root(tu), &mut |c, _| {
        let loc = parser.location_of(c);
        if loc.file != Some(file) {
            return Visit::Continue;
        }
        if loc.line <= line {
            best = Some((c, loc));
            Visit::Continue
        } else {
            Visit::Break
        }
    });
    match best {
        Some((cursor, location)) => Nearest {
            cursor: Some(cursor),
            location,
        },
        None => Nearest {
            cursor: None,
            location: Location {
                file: None,
                line: 1,
                column: 1,
            },
        },
    }
}
