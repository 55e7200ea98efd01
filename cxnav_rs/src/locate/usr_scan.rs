//! Cross-TU USR scanner.

use std::io::{self, Write};

use tracing::debug;

use crate::parser::{Parser, Visit};
use crate::project::Project;

use super::emit_block;

/// Global cap on emitted matches per query, across all translation units.
pub(super) const MAX_RESULTS: usize = 255;

/// Scanner state owned by one query: the target USR and the emission count.
pub(super) struct UsrScan {
    target: String,
    count: usize,
}

impl UsrScan {
    pub(super) fn new(target: String) -> Self {
        UsrScan { target, count: 0 }
    }

    /// Visit every live translation unit in slot order. Each cursor whose USR
    /// byte-equals the target is emitted and not descended into; the walk
    /// stops outright once [`MAX_RESULTS`] matches have gone out.
    pub(super) fn run<P: Parser, W: Write>(
        &mut self,
        parser: &P,
        project: &Project<P>,
        out: &mut W,
    ) -> io::Result<()> {
        debug!(usr = %self.target, "cross-TU USR scan");
        for slot in project.slots() {
            let Some(tu) = slot.tu.as_ref() else { continue };
            let mut err = None;
            parser.visit_children(parser.root(tu), &mut |c, _| {
                let mut verdict = if parser.usr(c) == self.target {
                    if let Err(e) = emit_block(parser, c, out) {
                        err = Some(e);
                        return Visit::Break;
                    }
                    self.count += 1;
                    Visit::Continue
                } else {
                    Visit::Recurse
                };
                if self.count >= MAX_RESULTS {
                    verdict = Visit::Break;
                }
                verdict
            });
            if let Some(e) = err {
                return Err(e);
            }
            if self.count >= MAX_RESULTS {
                debug!("USR scan hit the result cap");
                break;
            }
        }
        Ok(())
    }
}
