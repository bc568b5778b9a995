//! In-memory project index.
//!
//! The index owns the workspace file texts, one parsed snapshot per file,
//! and a flat symbol table covering every type, method, constructor, and
//! field declaration. Refactorings query it for declarations, hierarchy
//! relationships, and lexical reference candidates; semantic confirmation of
//! a candidate is the resolver's job, never the index's.

mod symbols;

pub use symbols::{normalize_type_text, Symbol, SymbolId, SymbolKind};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use arbor_core::{is_ident_char_byte, CancelToken, FileId, Span};
use arbor_syntax::ast::Visibility;
use arbor_syntax::Parse;

/// Where a file sits relative to the project being refactored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileOrigin {
    /// Regular project source root.
    Primary,
    /// Test source root.
    Test,
    /// An external dependency's sources.
    Dependency,
    /// Platform / runtime library sources.
    Platform,
}

impl FileOrigin {
    #[must_use]
    pub fn is_dependency(self) -> bool {
        matches!(self, FileOrigin::Dependency | FileOrigin::Platform)
    }
}

/// One workspace file handed to [`Index::from_sources`].
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub file: FileId,
    pub text: String,
    pub origin: FileOrigin,
}

/// How a lexical occurrence of an identifier is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateKind {
    /// Identifier immediately followed by `(`.
    Call,
    /// Identifier inside an `import` declaration.
    Import,
    /// Identifier inside comment trivia.
    Comment,
    /// Any other identifier occurrence.
    Plain,
}

/// A lexical occurrence of a name. Candidates are over-approximate by
/// design; callers re-resolve before rewriting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceCandidate {
    pub file: FileId,
    pub range: Span,
    pub kind: CandidateKind,
}

#[derive(Debug)]
struct FileEntry {
    text: String,
    origin: FileOrigin,
    parse: Parse,
}

/// Project-wide symbol and reference index.
#[derive(Debug)]
pub struct Index {
    files: BTreeMap<FileId, FileEntry>,
    symbols: Vec<Symbol>,
    /// Supertype simple names (extends + implements) per type simple name.
    supertypes: HashMap<String, Vec<String>>,
    /// First `extends` entry per class.
    extends: HashMap<String, String>,
    /// Declared types by simple name: (qualified name, visibility, file).
    declared_types: HashMap<String, Vec<(String, Visibility, FileId)>>,
}

impl Index {
    /// Index a set of primary-source files.
    #[must_use]
    pub fn new(files: BTreeMap<FileId, String>) -> Self {
        Self::from_sources(files.into_iter().map(|(file, text)| SourceFile {
            file,
            text,
            origin: FileOrigin::Primary,
        }))
    }

    pub fn from_sources(sources: impl IntoIterator<Item = SourceFile>) -> Self {
        let mut index = Index {
            files: BTreeMap::new(),
            symbols: Vec::new(),
            supertypes: HashMap::new(),
            extends: HashMap::new(),
            declared_types: HashMap::new(),
        };

        for source in sources {
            let parse = arbor_syntax::parse(&source.text);
            index.files.insert(
                source.file.clone(),
                FileEntry {
                    text: source.text,
                    origin: source.origin,
                    parse,
                },
            );
        }

        let files: Vec<FileId> = index.files.keys().cloned().collect();
        for file in files {
            index.collect_file_symbols(&file);
        }
        index
    }

    fn collect_file_symbols(&mut self, file: &FileId) {
        let entry = match self.files.get(file) {
            Some(entry) => entry,
            None => return,
        };
        let unit = entry.parse.compilation_unit().clone();
        let package = unit.package.as_ref().map(|p| p.name.clone());

        for ty in &unit.types {
            self.collect_type(file, package.as_deref(), None, ty);
        }
    }

    fn collect_type(
        &mut self,
        file: &FileId,
        package: Option<&str>,
        container: Option<&str>,
        decl: &arbor_syntax::ast::TypeDecl,
    ) {
        use arbor_syntax::ast::{MemberDecl, TypeDecl};

        let kind = match decl {
            TypeDecl::Class(_) => SymbolKind::Class,
            TypeDecl::Interface(_) => SymbolKind::Interface,
            TypeDecl::Enum(_) => SymbolKind::Enum,
        };
        let name = decl.name().to_string();
        let modifiers = decl.modifiers();

        self.push_symbol(Symbol {
            id: SymbolId(0),
            kind,
            name: name.clone(),
            container: container.map(str::to_string),
            file: file.clone(),
            name_range: decl.name_range(),
            decl_range: decl.range(),
            visibility: modifiers.visibility,
            is_static: modifiers.is_static,
            param_types: None,
            is_vararg: false,
            type_text: None,
        });

        let supers: Vec<String> = decl
            .supertypes()
            .iter()
            .map(|t| t.simple_name().to_string())
            .collect();
        if !supers.is_empty() {
            self.supertypes.insert(name.clone(), supers);
        }
        if let Some(ext) = decl.extends() {
            self.extends
                .insert(name.clone(), ext.simple_name().to_string());
        }

        let qualified = match package {
            Some(pkg) => format!("{pkg}.{name}"),
            None => name.clone(),
        };
        self.declared_types.entry(name.clone()).or_default().push((
            qualified,
            modifiers.visibility,
            file.clone(),
        ));

        for member in decl.members() {
            match member {
                MemberDecl::Field(field) => {
                    self.push_symbol(Symbol {
                        id: SymbolId(0),
                        kind: SymbolKind::Field,
                        name: field.name.clone(),
                        container: Some(name.clone()),
                        file: file.clone(),
                        name_range: field.name_range,
                        decl_range: field.range,
                        visibility: field.modifiers.visibility,
                        is_static: field.modifiers.is_static,
                        param_types: None,
                        is_vararg: false,
                        type_text: Some(field.ty.text.clone()),
                    });
                }
                MemberDecl::Method(method) => {
                    self.push_symbol(Symbol {
                        id: SymbolId(0),
                        kind: SymbolKind::Method,
                        name: method.name.clone(),
                        container: Some(name.clone()),
                        file: file.clone(),
                        name_range: method.name_range,
                        decl_range: method.range,
                        visibility: method.modifiers.visibility,
                        is_static: method.modifiers.is_static,
                        param_types: Some(
                            method.params.iter().map(|p| p.ty.text.clone()).collect(),
                        ),
                        is_vararg: method.params.last().is_some_and(|p| p.is_vararg),
                        type_text: Some(method.return_ty.text.clone()),
                    });
                }
                MemberDecl::Constructor(ctor) => {
                    self.push_symbol(Symbol {
                        id: SymbolId(0),
                        kind: SymbolKind::Constructor,
                        name: ctor.name.clone(),
                        container: Some(name.clone()),
                        file: file.clone(),
                        name_range: ctor.name_range,
                        decl_range: ctor.range,
                        visibility: ctor.modifiers.visibility,
                        is_static: false,
                        param_types: Some(
                            ctor.params.iter().map(|p| p.ty.text.clone()).collect(),
                        ),
                        is_vararg: ctor.params.last().is_some_and(|p| p.is_vararg),
                        type_text: None,
                    });
                }
                MemberDecl::Type(nested) => {
                    self.collect_type(file, package, Some(&name), nested);
                }
                MemberDecl::Initializer(_) => {}
            }
        }
    }

    fn push_symbol(&mut self, mut symbol: Symbol) {
        symbol.id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
    }

    // ---- file access --------------------------------------------------

    #[must_use]
    pub fn file_text(&self, file: &FileId) -> Option<&str> {
        self.files.get(file).map(|entry| entry.text.as_str())
    }

    #[must_use]
    pub fn file_parse(&self, file: &FileId) -> Option<&Parse> {
        self.files.get(file).map(|entry| &entry.parse)
    }

    #[must_use]
    pub fn file_origin(&self, file: &FileId) -> Option<FileOrigin> {
        self.files.get(file).map(|entry| entry.origin)
    }

    pub fn all_files(&self) -> impl Iterator<Item = &FileId> {
        self.files.keys()
    }

    // ---- symbol access ------------------------------------------------

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0 as usize)
    }

    /// First type symbol with the given simple name.
    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|sym| sym.kind.is_type() && sym.name == name)
    }

    #[must_use]
    pub fn find_field(&self, class: &str, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|sym| {
            sym.kind == SymbolKind::Field
                && sym.name == name
                && sym.container.as_deref() == Some(class)
        })
    }

    /// All methods named `name` declared directly on `class`.
    #[must_use]
    pub fn method_overloads(&self, class: &str, name: &str) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|sym| {
                sym.kind == SymbolKind::Method
                    && sym.name == name
                    && sym.container.as_deref() == Some(class)
            })
            .collect()
    }

    /// All executable members (methods + constructors) of `class`.
    #[must_use]
    pub fn executables_of(&self, class: &str) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|sym| {
                matches!(sym.kind, SymbolKind::Method | SymbolKind::Constructor)
                    && sym.container.as_deref() == Some(class)
            })
            .collect()
    }

    #[must_use]
    pub fn members_of(&self, class: &str) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|sym| sym.container.as_deref() == Some(class))
            .collect()
    }

    // ---- hierarchy ----------------------------------------------------

    /// The `extends` superclass of `class`, when declared in this project.
    #[must_use]
    pub fn class_extends(&self, class: &str) -> Option<&str> {
        self.extends.get(class).map(String::as_str)
    }

    /// All declared supertype names (extends + implements).
    #[must_use]
    pub fn supertypes_of(&self, ty: &str) -> &[String] {
        self.supertypes
            .get(ty)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Types that directly extend or implement `ty`.
    #[must_use]
    pub fn direct_subtypes(&self, ty: &str) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .supertypes
            .iter()
            .filter(|(sub, supers)| sub.as_str() != ty && supers.iter().any(|s| s == ty))
            .map(|(sub, _)| sub.as_str())
            .collect();
        out.sort_unstable();
        out
    }

    /// Transitive subtype closure of `ty`, excluding `ty` itself.
    ///
    /// Runs an iterative fixed-point expansion, polling `cancel` every
    /// round. On cancellation the result is discarded entirely: a partial
    /// closure would silently drop rewrite sites.
    pub fn all_subtypes(
        &self,
        ty: &str,
        cancel: &CancelToken,
    ) -> Result<BTreeSet<String>, arbor_core::Cancelled> {
        let mut closed: BTreeSet<String> = BTreeSet::new();
        let mut frontier: Vec<String> = vec![ty.to_string()];
        while let Some(current) = frontier.pop() {
            cancel.check()?;
            for sub in self.direct_subtypes(&current) {
                if sub != ty && closed.insert(sub.to_string()) {
                    frontier.push(sub.to_string());
                }
            }
        }
        Ok(closed)
    }

    /// `true` when `sub` equals `sup` or transitively extends/implements it.
    #[must_use]
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        let mut seen = BTreeSet::new();
        let mut frontier = vec![sub.to_string()];
        while let Some(current) = frontier.pop() {
            for parent in self.supertypes_of(&current) {
                if parent == sup {
                    return true;
                }
                if seen.insert(parent.clone()) {
                    frontier.push(parent.clone());
                }
            }
        }
        false
    }

    /// Walks the `extends` chain from `class` (inclusive), outward.
    #[must_use]
    pub fn superclass_chain(&self, class: &str) -> Vec<String> {
        let mut out = vec![class.to_string()];
        let mut current = class.to_string();
        while let Some(next) = self.class_extends(&current) {
            if out.iter().any(|c| c == next) {
                tracing::warn!(class, "cyclic extends chain in index");
                break;
            }
            out.push(next.to_string());
            current = next.to_string();
        }
        out
    }

    // ---- declared types (import resolution) ---------------------------

    /// Declared types matching a simple name: `(qualified, visibility)`.
    #[must_use]
    pub fn declared_types(&self, simple_name: &str) -> Vec<(&str, Visibility)> {
        self.declared_types
            .get(simple_name)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(qualified, vis, _)| (qualified.as_str(), *vis))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Package of the unit declaring `simple_name`, when unambiguous.
    #[must_use]
    pub fn package_of_type(&self, simple_name: &str) -> Option<&str> {
        let sym = self.find_type(simple_name)?;
        let entry = self.files.get(&sym.file)?;
        entry
            .parse
            .compilation_unit()
            .package
            .as_ref()
            .map(|p| p.name.as_str())
    }

    // ---- lexical reference candidates ---------------------------------

    /// Every word-boundary occurrence of `name` across the workspace,
    /// classified lexically. String literals are skipped; comment
    /// occurrences are reported with [`CandidateKind::Comment`].
    #[must_use]
    pub fn find_name_candidates(&self, name: &str) -> Vec<ReferenceCandidate> {
        let mut out = Vec::new();
        for (file, entry) in &self.files {
            self.candidates_in_entry(file, entry, name, &mut out);
        }
        out
    }

    /// Occurrences of `name` within a single file.
    #[must_use]
    pub fn find_name_candidates_in_file(
        &self,
        file: &FileId,
        name: &str,
    ) -> Vec<ReferenceCandidate> {
        let mut out = Vec::new();
        if let Some(entry) = self.files.get(file) {
            self.candidates_in_entry(file, entry, name, &mut out);
        }
        out
    }

    fn candidates_in_entry(
        &self,
        file: &FileId,
        entry: &FileEntry,
        name: &str,
        out: &mut Vec<ReferenceCandidate>,
    ) {
        if name.is_empty() {
            return;
        }
        let text = entry.text.as_str();
        let bytes = text.as_bytes();
        let needle = name.as_bytes();

        let import_spans: Vec<Span> = entry
            .parse
            .compilation_unit()
            .imports
            .iter()
            .map(|imp| imp.range)
            .collect();

        let mut i = 0usize;
        while i + needle.len() <= bytes.len() {
            let Some(pos) = text[i..].find(name) else {
                break;
            };
            let start = i + pos;
            let end = start + needle.len();
            i = start + 1;

            let before_ok = start == 0 || !is_ident_char_byte(bytes[start - 1]);
            let after_ok = end == bytes.len() || !is_ident_char_byte(bytes[end]);
            if !before_ok || !after_ok {
                continue;
            }

            let kind = if entry.parse.is_in_comment(start) {
                CandidateKind::Comment
            } else if in_string_literal(text, start) {
                continue;
            } else if import_spans.iter().any(|span| span.contains(start)) {
                CandidateKind::Import
            } else if followed_by_paren(text, end) {
                CandidateKind::Call
            } else {
                CandidateKind::Plain
            };

            out.push(ReferenceCandidate {
                file: file.clone(),
                range: Span::new(start, end),
                kind,
            });
        }
    }

    /// Files containing at least one non-comment occurrence of `name`
    /// (or any occurrence at all with `include_comments`).
    #[must_use]
    pub fn files_with_identifier(&self, name: &str, include_comments: bool) -> BTreeSet<FileId> {
        self.find_name_candidates(name)
            .into_iter()
            .filter(|c| include_comments || c.kind != CandidateKind::Comment)
            .map(|c| c.file)
            .collect()
    }
}

fn followed_by_paren(text: &str, mut offset: usize) -> bool {
    let bytes = text.as_bytes();
    while offset < bytes.len() && bytes[offset].is_ascii_whitespace() {
        offset += 1;
    }
    bytes.get(offset) == Some(&b'(')
}

/// Rough check for string-literal containment: counts unescaped quotes on
/// the occurrence's line.
fn in_string_literal(text: &str, offset: usize) -> bool {
    let line_start = arbor_core::line_start(text, offset);
    let bytes = text.as_bytes();
    let mut in_string = false;
    let mut i = line_start;
    while i < offset {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            _ => {}
        }
        i += 1;
    }
    in_string
}

#[cfg(test)]
mod tests;
