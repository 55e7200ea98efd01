//! In-memory parser backend for the integration tests.
//!
//! Drives the same [`Parser`] trait as the libclang backend, but over a
//! hand-built cursor tree: tests register files, nodes, per-unit cursor
//! placements, completions, and diagnostics, then run the real engine and
//! dispatcher against it. Parse and reparse calls are logged so tests can
//! assert on the argument vectors and overlay sets the engine actually used.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use cxnav::parser::{
    Completion, CursorKind, Linkage, Location, ParseOptions, Parser, Unsaved, Visit,
};

pub type NodeId = usize;
pub type FileId = usize;

/// One cursor-tree node with every relation the facade can be asked for.
#[derive(Clone)]
pub struct Node {
    pub kind: CursorKind,
    pub spelling: String,
    pub usr: String,
    pub file: Option<FileId>,
    pub line: u32,
    pub column: u32,
    pub children: Vec<NodeId>,
    pub referenced: Option<NodeId>,
    pub definition: Option<NodeId>,
    pub type_decl: Option<NodeId>,
    pub included_file: Option<FileId>,
    pub overrides: Vec<NodeId>,
    pub linkage: Linkage,
    pub is_definition: bool,
    pub is_reference: bool,
    pub in_reference_range: bool,
    pub in_invalid_range: bool,
    pub is_virtual: bool,
}

/// Per-path unit description: the root node plus scripted lookups.
#[derive(Default)]
pub struct UnitSpec {
    pub root: NodeId,
    pub cursors: HashMap<(FileId, u32, u32), NodeId>,
    pub completions: Vec<Completion>,
    pub diagnostics: Vec<String>,
}

/// A recorded parse or reparse, with what the engine handed the parser.
#[derive(Clone, Debug)]
pub struct ParseCall {
    pub path: String,
    pub args: Vec<String>,
    pub overlays: HashMap<String, Vec<u8>>,
    pub reparse: bool,
}

pub struct FakeTu {
    pub path: String,
    pub root: NodeId,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FakeCursor(pub NodeId);

pub struct FakeParser {
    nodes: Vec<Node>,
    files: Vec<String>,
    units: HashMap<String, UnitSpec>,
    /// Paths whose parse always fails.
    pub fail_parse: Rc<RefCell<HashSet<String>>>,
    /// Paths whose next reparse fails (consumed).
    pub fail_reparse_once: Rc<RefCell<HashSet<String>>>,
    /// Every parse/reparse the engine issued, in order.
    pub log: Rc<RefCell<Vec<ParseCall>>>,
}

impl FakeParser {
    pub fn new() -> Self {
        FakeParser {
            nodes: Vec::new(),
            files: Vec::new(),
            units: HashMap::new(),
            fail_parse: Rc::new(RefCell::new(HashSet::new())),
            fail_reparse_once: Rc::new(RefCell::new(HashSet::new())),
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn add_file(&mut self, path: &str) -> FileId {
        self.files.push(path.to_string());
        self.files.len() - 1
    }

    /// A located node with quiet defaults; adjust relations via [`with`].
    ///
    /// [`with`]: FakeParser::with
    pub fn node(
        &mut self,
        kind: CursorKind,
        spelling: &str,
        file: FileId,
        line: u32,
        column: u32,
    ) -> NodeId {
        self.push(Node {
            kind,
            spelling: spelling.to_string(),
            usr: String::new(),
            file: Some(file),
            line,
            column,
            children: Vec::new(),
            referenced: None,
            definition: None,
            type_decl: None,
            included_file: None,
            overrides: Vec::new(),
            linkage: Linkage::NoLinkage,
            is_definition: false,
            is_reference: false,
            in_reference_range: false,
            in_invalid_range: false,
            is_virtual: false,
        })
    }

    /// A locationless root node, standing in for the translation-unit cursor.
    pub fn root_node(&mut self) -> NodeId {
        let id = self.node(CursorKind::Other(350), "", 0, 0, 0);
        self.nodes[id].file = None;
        id
    }

    pub fn with(&mut self, id: NodeId, f: impl FnOnce(&mut Node)) -> NodeId {
        f(&mut self.nodes[id]);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
    }

    pub fn unit(&mut self, path: &str, root: NodeId) {
        self.units.insert(
            path.to_string(),
            UnitSpec {
                root,
                ..UnitSpec::default()
            },
        );
    }

    /// Script the cursor the parser reports at (file, line, column) of `path`.
    pub fn place_cursor(&mut self, path: &str, file: FileId, line: u32, column: u32, node: NodeId) {
        if let Some(unit) = self.units.get_mut(path) {
            unit.cursors.insert((file, line, column), node);
        }
    }

    pub fn set_completions(&mut self, path: &str, completions: Vec<Completion>) {
        if let Some(unit) = self.units.get_mut(path) {
            unit.completions = completions;
        }
    }

    pub fn set_diagnostics(&mut self, path: &str, diagnostics: Vec<String>) {
        if let Some(unit) = self.units.get_mut(path) {
            unit.diagnostics = diagnostics;
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn record(&self, path: &str, args: &[String], overlays: &[Unsaved<'_>], reparse: bool) {
        self.log.borrow_mut().push(ParseCall {
            path: path.to_string(),
            args: args.to_vec(),
            overlays: overlays
                .iter()
                .map(|u| (u.path.to_string(), u.contents.to_vec()))
                .collect(),
            reparse,
        });
    }

    fn visit_inner(
        &self,
        cursor: FakeCursor,
        visitor: &mut dyn FnMut(FakeCursor, FakeCursor) -> Visit,
    ) -> bool {
        let children = self.nodes[cursor.0].children.clone();
        for child in children {
            match visitor(FakeCursor(child), cursor) {
                Visit::Break => return false,
                Visit::Continue => {}
                Visit::Recurse => {
                    if !self.visit_inner(FakeCursor(child), visitor) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl Parser for FakeParser {
    type Index = ();
    type Tu = FakeTu;
    type Cursor = FakeCursor;
    type File = FileId;

    fn create_index(&self) -> () {}

    fn parse(
        &self,
        _index: &(),
        path: &str,
        args: &[String],
        overlays: &[Unsaved<'_>],
        _opts: ParseOptions,
    ) -> Option<FakeTu> {
        self.record(path, args, overlays, false);
        if self.fail_parse.borrow().contains(path) {
            return None;
        }
        self.units.get(path).map(|unit| FakeTu {
            path: path.to_string(),
            root: unit.root,
        })
    }

    fn reparse(&self, tu: &mut FakeTu, overlays: &[Unsaved<'_>], _opts: ParseOptions) -> bool {
        self.record(&tu.path, &[], overlays, true);
        !self.fail_reparse_once.borrow_mut().remove(&tu.path)
    }

    fn root(&self, tu: &FakeTu) -> FakeCursor {
        FakeCursor(tu.root)
    }

    fn file(&self, _tu: &FakeTu, path: &str) -> Option<FileId> {
        self.files.iter().position(|p| p == path)
    }

    fn cursor_at(
        &self,
        tu: &FakeTu,
        file: FileId,
        line: u32,
        column: u32,
    ) -> Option<FakeCursor> {
        self.units
            .get(&tu.path)
            .and_then(|unit| unit.cursors.get(&(file, line, column)))
            .copied()
            .map(FakeCursor)
    }

    fn kind(&self, cursor: FakeCursor) -> CursorKind {
        self.nodes[cursor.0].kind
    }

    fn kind_name(&self, cursor: FakeCursor) -> String {
        format!("{:?}", self.nodes[cursor.0].kind)
    }

    fn spelling(&self, cursor: FakeCursor) -> String {
        self.nodes[cursor.0].spelling.clone()
    }

    fn usr(&self, cursor: FakeCursor) -> String {
        self.nodes[cursor.0].usr.clone()
    }

    fn location_of(&self, cursor: FakeCursor) -> Location<FileId> {
        let node = &self.nodes[cursor.0];
        match node.file {
            Some(file) => Location {
                file: Some(file),
                line: node.line,
                column: node.column,
            },
            None => Location::none(),
        }
    }

    fn file_name(&self, file: FileId) -> String {
        self.files[file].clone()
    }

    fn is_definition(&self, cursor: FakeCursor) -> bool {
        self.nodes[cursor.0].is_definition
    }

    fn is_reference(&self, cursor: FakeCursor) -> bool {
        self.nodes[cursor.0].is_reference
    }

    fn in_reference_range(&self, cursor: FakeCursor) -> bool {
        self.nodes[cursor.0].in_reference_range
    }

    fn in_invalid_range(&self, cursor: FakeCursor) -> bool {
        self.nodes[cursor.0].in_invalid_range
    }

    fn referenced(&self, cursor: FakeCursor) -> Option<FakeCursor> {
        self.nodes[cursor.0].referenced.map(FakeCursor)
    }

    fn definition(&self, cursor: FakeCursor) -> Option<FakeCursor> {
        self.nodes[cursor.0].definition.map(FakeCursor)
    }

    fn type_declaration(&self, cursor: FakeCursor) -> Option<FakeCursor> {
        self.nodes[cursor.0].type_decl.map(FakeCursor)
    }

    fn included_file(&self, cursor: FakeCursor) -> Option<FileId> {
        self.nodes[cursor.0].included_file
    }

    fn linkage(&self, cursor: FakeCursor) -> Linkage {
        self.nodes[cursor.0].linkage
    }

    fn is_virtual_method(&self, cursor: FakeCursor) -> bool {
        self.nodes[cursor.0].is_virtual
    }

    fn overridden(&self, cursor: FakeCursor) -> Vec<FakeCursor> {
        self.nodes[cursor.0]
            .overrides
            .iter()
            .copied()
            .map(FakeCursor)
            .collect()
    }

    fn visit_children(
        &self,
        cursor: FakeCursor,
        visitor: &mut dyn FnMut(FakeCursor, FakeCursor) -> Visit,
    ) {
        self.visit_inner(cursor, visitor);
    }

    fn diagnostics(&self, tu: &FakeTu) -> Vec<String> {
        self.units
            .get(&tu.path)
            .map(|unit| unit.diagnostics.clone())
            .unwrap_or_default()
    }

    fn complete_at(
        &self,
        tu: &mut FakeTu,
        _path: &str,
        _line: u32,
        _column: u32,
        overlays: &[Unsaved<'_>],
    ) -> Vec<Completion> {
        self.record(&tu.path, &[], overlays, false);
        self.units
            .get(&tu.path)
            .map(|unit| unit.completions.clone())
            .unwrap_or_default()
    }
}

/// Count the `PRJ_LOCATE:` blocks in a response.
pub fn block_count(output: &str) -> usize {
    output.lines().filter(|l| *l == "PRJ_LOCATE:").count()
}

/// One parsed `PRJ_LOCATE:` block.
#[derive(Debug, PartialEq, Eq)]
pub struct Block {
    pub desc: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub definition: bool,
}

/// Parse every `PRJ_LOCATE:` block out of a response.
pub fn parse_blocks(output: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut lines = output.lines();
    while let Some(line) = lines.next() {
        if line != "PRJ_LOCATE:" {
            continue;
        }
        let field = |line: Option<&str>, key: &str| -> String {
            line.and_then(|l| l.strip_prefix(key))
                .unwrap_or_else(|| panic!("malformed block: missing {key}"))
                .to_string()
        };
        blocks.push(Block {
            desc: field(lines.next(), "desc:"),
            file: field(lines.next(), "file:"),
            line: field(lines.next(), "line:").parse().unwrap(),
            column: field(lines.next(), "column:").parse().unwrap(),
            definition: field(lines.next(), "definition:") == "true",
        });
    }
    blocks
}
