//! Project registry and unsaved-buffer overlay store.
//!
//! A [`Project`] owns one parser index, an append-only list of source slots
//! (path + lazily built translation unit), the argument vector shared by all
//! of its translation units, and the overlay map. The [`Registry`] hands out
//! dense project ids and caps the population at [`MAX_PROJECTS`].

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::parser::{ParseOptions, Parser, Unsaved};

/// Hard cap on concurrently registered projects.
pub const MAX_PROJECTS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("all {MAX_PROJECTS} project slots are in use")]
    Exhausted,
    #[error("no project with id {0}")]
    UnknownId(usize),
}

/// One source file position: the path and its lazily built translation unit.
pub struct SourceSlot<T> {
    pub path: String,
    pub tu: Option<T>,
}

/// A multi-file project: one index, N translation units, shared arguments,
/// and the overlay store consulted on every (re)parse.
pub struct Project<P: Parser> {
    id: usize,
    args: Vec<String>,
    // Declared before `index`: translation units must be disposed before the
    // index that created them, and fields drop in declaration order.
    slots: Vec<SourceSlot<P::Tu>>,
    index: P::Index,
    active: usize,
    overlays: HashMap<String, Vec<u8>>,
}

impl<P: Parser> Project<P> {
    fn new(parser: &P, id: usize) -> Self {
        Project {
            id,
            args: Vec::new(),
            slots: Vec::new(),
            index: parser.create_index(),
            active: 0,
            overlays: HashMap::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Replace the argument vector wholesale. Existing translation units are
    /// untouched; the next parse sees the new arguments.
    pub fn set_args(&mut self, args: Vec<String>) {
        debug!(project = self.id, ?args, "replacing project arguments");
        self.args = args;
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Upsert an overlay: the in-memory contents used instead of the on-disk
    /// file for `path` from now on. Last write wins.
    pub fn set_overlay(&mut self, path: String, contents: Vec<u8>) {
        debug!(project = self.id, %path, len = contents.len(), "overlay upsert");
        self.overlays.insert(path, contents);
    }

    pub fn overlay(&self, path: &str) -> Option<&[u8]> {
        self.overlays.get(path).map(Vec::as_slice)
    }

    /// Position of `path` in the source list, by exact string equality.
    pub fn find_source(&self, path: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.path == path)
    }

    /// Append `path` and immediately build its translation unit. The source
    /// entry stays even when the build fails; the slot is retried on demand.
    pub fn add_source(&mut self, parser: &P, path: &str) -> bool {
        self.slots.push(SourceSlot {
            path: path.to_string(),
            tu: None,
        });
        let slot = self.slots.len() - 1;
        debug!(project = self.id, path, slot, "adding source");
        self.build_tu(parser, slot)
    }

    pub fn slots(&self) -> &[SourceSlot<P::Tu>] {
        &self.slots
    }

    pub fn source_count(&self) -> usize {
        self.slots.len()
    }

    /// Select the translation unit subsequent queries run against.
    pub fn set_active(&mut self, slot: usize) {
        debug_assert!(slot < self.slots.len());
        self.active = slot;
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn tu(&self, slot: usize) -> Option<&P::Tu> {
        self.slots.get(slot).and_then(|s| s.tu.as_ref())
    }

    pub fn source_path(&self, slot: usize) -> &str {
        &self.slots[slot].path
    }

    /// (Re)build the translation unit for `slot` from scratch, with the
    /// current arguments and every overlay the project holds.
    pub fn build_tu(&mut self, parser: &P, slot: usize) -> bool {
        let Project {
            args,
            slots,
            index,
            overlays,
            ..
        } = self;
        let unsaved = overlay_views(overlays);
        let tu = parser.parse(
            index,
            &slots[slot].path,
            args,
            &unsaved,
            ParseOptions::editing(),
        );
        let built = tu.is_some();
        slots[slot].tu = tu;
        built
    }

    /// Reparse the translation unit in `slot` in place. On failure the caller
    /// must discard the slot via [`drop_tu`].
    ///
    /// [`drop_tu`]: Project::drop_tu
    pub fn reparse_tu(&mut self, parser: &P, slot: usize) -> bool {
        let Project {
            slots, overlays, ..
        } = self;
        let Some(tu) = slots[slot].tu.as_mut() else {
            return false;
        };
        let unsaved = overlay_views(overlays);
        parser.reparse(tu, &unsaved, ParseOptions::editing())
    }

    /// Dispose the translation unit in `slot`; the next query rebuilds it.
    pub fn drop_tu(&mut self, slot: usize) {
        self.slots[slot].tu = None;
    }
}

fn overlay_views(overlays: &HashMap<String, Vec<u8>>) -> Vec<Unsaved<'_>> {
    overlays
        .iter()
        .map(|(path, contents)| Unsaved {
            path,
            contents,
        })
        .collect()
}

/// Fixed-capacity, dense-id collection of projects.
pub struct Registry<P: Parser> {
    projects: Vec<Project<P>>,
}

impl<P: Parser> Registry<P> {
    pub fn new() -> Self {
        Registry {
            projects: Vec::new(),
        }
    }

    /// Allocate the next project slot.
    pub fn create(&mut self, parser: &P) -> Result<usize, RegistryError> {
        if self.projects.len() >= MAX_PROJECTS {
            return Err(RegistryError::Exhausted);
        }
        let id = self.projects.len();
        self.projects.push(Project::new(parser, id));
        Ok(id)
    }

    /// First project whose source list contains `path`, scanning in id order.
    pub fn find_id(&self, path: &str) -> Option<usize> {
        self.projects
            .iter()
            .find(|p| p.find_source(path).is_some())
            .map(|p| p.id)
    }

    pub fn get_mut(&mut self, id: usize) -> Result<&mut Project<P>, RegistryError> {
        self.projects
            .get_mut(id)
            .ok_or(RegistryError::UnknownId(id))
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl<P: Parser> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}
