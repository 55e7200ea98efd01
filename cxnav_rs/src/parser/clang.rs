//! Production [`Parser`] implementation over libclang, via `clang-sys`.
//!
//! The library is loaded at runtime (`clang_sys::load`) so nothing here needs
//! libclang at build time. Ownership rules of the C ABI are mapped onto Rust
//! ownership: [`ClangIndex`] and [`ClangTu`] dispose their handles on `Drop`,
//! and every `CXString` is converted and disposed inside [`into_string`] so no
//! exit path can leak one.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint};
use std::ptr;

use anyhow::{Result, anyhow};
use clang_sys::*;

use super::{Chunk, Completion, CursorKind, Linkage, Location, ParseOptions, Parser, Unsaved, Visit};

/// Handle to the loaded libclang library.
///
/// Construct exactly one and share it; indexes and translation units are
/// created through it.
pub struct ClangParser(());

impl ClangParser {
    /// Load libclang and hand back the facade.
    pub fn new() -> Result<Self> {
        clang_sys::load().map_err(|e| anyhow!("failed to load libclang: {e}"))?;
        Ok(ClangParser(()))
    }
}

/// Owned `CXIndex`.
pub struct ClangIndex(CXIndex);

impl Drop for ClangIndex {
    fn drop(&mut self) {
        unsafe { clang_disposeIndex(self.0) }
    }
}

/// Owned `CXTranslationUnit`.
pub struct ClangTu(CXTranslationUnit);

impl Drop for ClangTu {
    fn drop(&mut self) {
        unsafe { clang_disposeTranslationUnit(self.0) }
    }
}

/// Borrowed cursor value. Valid only while its translation unit lives.
#[derive(Clone, Copy)]
pub struct ClangCursor(CXCursor);

impl PartialEq for ClangCursor {
    fn eq(&self, other: &Self) -> bool {
        unsafe { clang_equalCursors(self.0, other.0) != 0 }
    }
}

/// Borrowed file handle. Equality is handle identity, as in the C API.
#[derive(Clone, Copy, PartialEq)]
pub struct ClangFile(CXFile);

/// Convert a `CXString`, disposing it on every path.
fn into_string(s: CXString) -> String {
    unsafe {
        let c = clang_getCString(s);
        let out = if c.is_null() {
            String::new()
        } else {
            CStr::from_ptr(c).to_string_lossy().into_owned()
        };
        clang_disposeString(s);
        out
    }
}

fn cstring(s: &str) -> Option<CString> {
    CString::new(s).ok()
}

/// Build the parallel (storage, CXUnsavedFile) vectors for an overlay set.
/// The storage vector must outlive every use of the unsaved-file vector;
/// a CString's buffer is heap-allocated, so moving it into `names` does not
/// invalidate the pointer already handed to libclang.
fn unsaved_files(overlays: &[Unsaved<'_>]) -> (Vec<CString>, Vec<CXUnsavedFile>) {
    let mut names = Vec::with_capacity(overlays.len());
    let mut files = Vec::with_capacity(overlays.len());
    for u in overlays {
        let Some(name) = cstring(u.path) else { continue };
        files.push(CXUnsavedFile {
            Filename: name.as_ptr(),
            Contents: u.contents.as_ptr() as *const c_char,
            Length: u.contents.len() as _,
        });
        names.push(name);
    }
    (names, files)
}

fn parse_flags(opts: ParseOptions) -> CXTranslationUnit_Flags {
    let mut flags = CXTranslationUnit_None;
    if opts.detailed_preprocessing {
        flags |= CXTranslationUnit_DetailedPreprocessingRecord;
    }
    if opts.precompiled_preamble {
        flags |= CXTranslationUnit_PrecompiledPreamble;
    }
    flags
}

fn kind_from_raw(raw: CXCursorKind) -> CursorKind {
    match raw {
        CXCursor_InclusionDirective => CursorKind::InclusionDirective,
        CXCursor_ParmDecl => CursorKind::ParmDecl,
        CXCursor_VarDecl => CursorKind::VarDecl,
        CXCursor_TypedefDecl => CursorKind::TypedefDecl,
        CXCursor_Namespace => CursorKind::Namespace,
        CXCursor_NamespaceRef => CursorKind::NamespaceRef,
        CXCursor_CallExpr => CursorKind::CallExpr,
        CXCursor_DeclRefExpr => CursorKind::DeclRefExpr,
        CXCursor_MemberRefExpr => CursorKind::MemberRefExpr,
        CXCursor_MacroExpansion => CursorKind::MacroExpansion,
        CXCursor_MacroDefinition => CursorKind::MacroDefinition,
        CXCursor_ClassTemplate => CursorKind::ClassTemplate,
        CXCursor_Constructor => CursorKind::Constructor,
        CXCursor_FunctionDecl => CursorKind::FunctionDecl,
        CXCursor_FieldDecl => CursorKind::FieldDecl,
        CXCursor_ClassDecl => CursorKind::ClassDecl,
        CXCursor_CXXMethod => CursorKind::CxxMethod,
        CXCursor_EnumDecl => CursorKind::EnumDecl,
        CXCursor_CompoundStmt => CursorKind::CompoundStmt,
        other => CursorKind::Other(other),
    }
}

fn decode_location(loc: CXSourceLocation) -> Location<ClangFile> {
    unsafe {
        if clang_equalLocations(loc, clang_getNullLocation()) != 0 {
            return Location::none();
        }
        let mut file: CXFile = ptr::null_mut();
        let mut line: c_uint = 0;
        let mut column: c_uint = 0;
        clang_getSpellingLocation(loc, &mut file, &mut line, &mut column, ptr::null_mut());
        Location {
            file: (!file.is_null()).then_some(ClangFile(file)),
            line,
            column,
        }
    }
}

fn non_null(cursor: CXCursor) -> Option<ClangCursor> {
    unsafe { (clang_Cursor_isNull(cursor) == 0).then_some(ClangCursor(cursor)) }
}

/// Flatten a nested completion string (optional chunks) to plain text.
unsafe fn flatten_completion_string(cs: CXCompletionString) -> String {
    let mut out = String::new();
    unsafe {
        for i in 0..clang_getNumCompletionChunks(cs) {
            match clang_getCompletionChunkKind(cs, i) {
                CXCompletionChunk_Optional => {
                    let nested = clang_getCompletionChunkCompletionString(cs, i);
                    out.push_str(&flatten_completion_string(nested));
                }
                _ => out.push_str(&into_string(clang_getCompletionChunkText(cs, i))),
            }
        }
    }
    out
}

unsafe fn collect_chunks(cs: CXCompletionString, out: &mut Vec<Chunk>) {
    unsafe {
        for i in 0..clang_getNumCompletionChunks(cs) {
            let kind = clang_getCompletionChunkKind(cs, i);
            if kind == CXCompletionChunk_Optional {
                let nested = clang_getCompletionChunkCompletionString(cs, i);
                out.push(Chunk::Optional(flatten_completion_string(nested)));
                continue;
            }
            let text = into_string(clang_getCompletionChunkText(cs, i));
            out.push(match kind {
                CXCompletionChunk_TypedText => Chunk::TypedText(text),
                CXCompletionChunk_ResultType => Chunk::ResultType(text),
                CXCompletionChunk_Placeholder | CXCompletionChunk_CurrentParameter => {
                    Chunk::Placeholder(text)
                }
                CXCompletionChunk_Informative => Chunk::Informative(text),
                _ => Chunk::Text(text),
            });
        }
    }
}

extern "C" fn visit_trampoline(
    cursor: CXCursor,
    parent: CXCursor,
    data: CXClientData,
) -> CXChildVisitResult {
    let visitor =
        unsafe { &mut *(data as *mut &mut dyn FnMut(ClangCursor, ClangCursor) -> Visit) };
    match visitor(ClangCursor(cursor), ClangCursor(parent)) {
        Visit::Break => CXChildVisit_Break,
        Visit::Continue => CXChildVisit_Continue,
        Visit::Recurse => CXChildVisit_Recurse,
    }
}

impl Parser for ClangParser {
    type Index = ClangIndex;
    type Tu = ClangTu;
    type Cursor = ClangCursor;
    type File = ClangFile;

    fn create_index(&self) -> ClangIndex {
        // excludeDeclarationsFromPCH = 0, displayDiagnostics = 0: diagnostics
        // go over the wire on request, never to our stderr.
        ClangIndex(unsafe { clang_createIndex(0, 0) })
    }

    fn parse(
        &self,
        index: &ClangIndex,
        path: &str,
        args: &[String],
        overlays: &[Unsaved<'_>],
        opts: ParseOptions,
    ) -> Option<ClangTu> {
        let path_c = cstring(path)?;
        let arg_storage: Vec<CString> = args.iter().filter_map(|a| cstring(a)).collect();
        let arg_ptrs: Vec<*const c_char> = arg_storage.iter().map(|a| a.as_ptr()).collect();
        let (_names, mut unsaved) = unsaved_files(overlays);
        let tu = unsafe {
            clang_parseTranslationUnit(
                index.0,
                path_c.as_ptr(),
                arg_ptrs.as_ptr(),
                arg_ptrs.len() as c_int,
                unsaved.as_mut_ptr(),
                unsaved.len() as c_uint,
                parse_flags(opts),
            )
        };
        (!tu.is_null()).then_some(ClangTu(tu))
    }

    fn reparse(&self, tu: &mut ClangTu, overlays: &[Unsaved<'_>], opts: ParseOptions) -> bool {
        let (_names, mut unsaved) = unsaved_files(overlays);
        unsafe {
            clang_reparseTranslationUnit(
                tu.0,
                unsaved.len() as c_uint,
                unsaved.as_mut_ptr(),
                parse_flags(opts),
            ) == 0
        }
    }

    fn root(&self, tu: &ClangTu) -> ClangCursor {
        ClangCursor(unsafe { clang_getTranslationUnitCursor(tu.0) })
    }

    fn file(&self, tu: &ClangTu, path: &str) -> Option<ClangFile> {
        let path_c = cstring(path)?;
        let file = unsafe { clang_getFile(tu.0, path_c.as_ptr()) };
        (!file.is_null()).then_some(ClangFile(file))
    }

    fn cursor_at(
        &self,
        tu: &ClangTu,
        file: ClangFile,
        line: u32,
        column: u32,
    ) -> Option<ClangCursor> {
        unsafe {
            let loc = clang_getLocation(tu.0, file.0, line as c_uint, column as c_uint);
            non_null(clang_getCursor(tu.0, loc))
        }
    }

    fn kind(&self, cursor: ClangCursor) -> CursorKind {
        kind_from_raw(unsafe { clang_getCursorKind(cursor.0) })
    }

    fn kind_name(&self, cursor: ClangCursor) -> String {
        into_string(unsafe { clang_getCursorKindSpelling(clang_getCursorKind(cursor.0)) })
    }

    fn spelling(&self, cursor: ClangCursor) -> String {
        into_string(unsafe { clang_getCursorSpelling(cursor.0) })
    }

    fn usr(&self, cursor: ClangCursor) -> String {
        into_string(unsafe { clang_getCursorUSR(cursor.0) })
    }

    fn location_of(&self, cursor: ClangCursor) -> Location<ClangFile> {
        decode_location(unsafe { clang_getCursorLocation(cursor.0) })
    }

    fn file_name(&self, file: ClangFile) -> String {
        into_string(unsafe { clang_getFileName(file.0) })
    }

    fn is_definition(&self, cursor: ClangCursor) -> bool {
        unsafe { clang_isCursorDefinition(cursor.0) != 0 }
    }

    fn is_reference(&self, cursor: ClangCursor) -> bool {
        unsafe { clang_isReference(clang_getCursorKind(cursor.0)) != 0 }
    }

    fn in_reference_range(&self, cursor: ClangCursor) -> bool {
        let kind = unsafe { clang_getCursorKind(cursor.0) };
        (CXCursor_ObjCSuperClassRef..=CXCursor_VariableRef).contains(&kind)
    }

    fn in_invalid_range(&self, cursor: ClangCursor) -> bool {
        let kind = unsafe { clang_getCursorKind(cursor.0) };
        (CXCursor_InvalidFile..=CXCursor_InvalidCode).contains(&kind)
    }

    fn referenced(&self, cursor: ClangCursor) -> Option<ClangCursor> {
        non_null(unsafe { clang_getCursorReferenced(cursor.0) })
    }

    fn definition(&self, cursor: ClangCursor) -> Option<ClangCursor> {
        non_null(unsafe { clang_getCursorDefinition(cursor.0) })
    }

    fn type_declaration(&self, cursor: ClangCursor) -> Option<ClangCursor> {
        non_null(unsafe { clang_getTypeDeclaration(clang_getCursorType(cursor.0)) })
    }

    fn included_file(&self, cursor: ClangCursor) -> Option<ClangFile> {
        let file = unsafe { clang_getIncludedFile(cursor.0) };
        (!file.is_null()).then_some(ClangFile(file))
    }

    fn linkage(&self, cursor: ClangCursor) -> Linkage {
        match unsafe { clang_getCursorLinkage(cursor.0) } {
            CXLinkage_NoLinkage => Linkage::NoLinkage,
            CXLinkage_Internal => Linkage::Internal,
            CXLinkage_UniqueExternal => Linkage::UniqueExternal,
            CXLinkage_External => Linkage::External,
            _ => Linkage::Invalid,
        }
    }

    fn is_virtual_method(&self, cursor: ClangCursor) -> bool {
        unsafe { clang_CXXMethod_isVirtual(cursor.0) != 0 }
    }

    fn overridden(&self, cursor: ClangCursor) -> Vec<ClangCursor> {
        let mut ptr_out: *mut CXCursor = ptr::null_mut();
        let mut count: c_uint = 0;
        unsafe {
            clang_getOverriddenCursors(cursor.0, &mut ptr_out, &mut count);
        }
        if ptr_out.is_null() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(count as usize);
        unsafe {
            for i in 0..count as usize {
                out.push(ClangCursor(*ptr_out.add(i)));
            }
            clang_disposeOverriddenCursors(ptr_out);
        }
        out
    }

    fn visit_children(
        &self,
        cursor: ClangCursor,
        visitor: &mut dyn FnMut(ClangCursor, ClangCursor) -> Visit,
    ) {
        let mut data: &mut dyn FnMut(ClangCursor, ClangCursor) -> Visit = visitor;
        unsafe {
            clang_visitChildren(
                cursor.0,
                visit_trampoline,
                &mut data as *mut _ as CXClientData,
            );
        }
    }

    fn diagnostics(&self, tu: &ClangTu) -> Vec<String> {
        unsafe {
            let count = clang_getNumDiagnostics(tu.0);
            let mut out = Vec::with_capacity(count as usize);
            for i in 0..count {
                let diag = clang_getDiagnostic(tu.0, i);
                out.push(into_string(clang_formatDiagnostic(
                    diag,
                    clang_defaultDiagnosticDisplayOptions(),
                )));
                clang_disposeDiagnostic(diag);
            }
            out
        }
    }

    fn complete_at(
        &self,
        tu: &mut ClangTu,
        path: &str,
        line: u32,
        column: u32,
        overlays: &[Unsaved<'_>],
    ) -> Vec<Completion> {
        let Some(path_c) = cstring(path) else {
            return Vec::new();
        };
        let (_names, mut unsaved) = unsaved_files(overlays);
        unsafe {
            let complete_opts = clang_defaultCodeCompleteOptions() | CXCodeComplete_IncludeMacros;
            let res = clang_codeCompleteAt(
                tu.0,
                path_c.as_ptr(),
                line as c_uint,
                column as c_uint,
                unsaved.as_mut_ptr(),
                unsaved.len() as c_uint,
                complete_opts,
            );
            if res.is_null() {
                return Vec::new();
            }
            clang_sortCodeCompletionResults((*res).Results, (*res).NumResults);
            let n = (*res).NumResults as usize;
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                let result = *(*res).Results.add(i);
                let mut chunks = Vec::new();
                collect_chunks(result.CompletionString, &mut chunks);
                out.push(Completion {
                    chunks,
                    available: clang_getCompletionAvailability(result.CompletionString)
                        == CXAvailability_Available,
                });
            }
            clang_disposeCodeCompleteResults(res);
            out
        }
    }
}
