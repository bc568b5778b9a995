//! Rewrite application for one compilation unit.
//!
//! Visitors register `(old span → replacement text)` pairs against a
//! [`UnitRewriter`]; the rewriter enforces at-most-one replacement per
//! original node, carries comment trivia across deletions, and recomputes
//! the unit's imports before the edits are handed to the session for the
//! atomic workspace commit.

use std::collections::{BTreeMap, BTreeSet};

use arbor_core::{line_start, FileId, Span};
use arbor_index::Index;
use arbor_syntax::ast::Visibility;
use arbor_syntax::Parse;

use crate::edit::{FileOp, TextEdit};
use crate::problem::Problems;

/// Per-file rewrite accumulator.
#[derive(Debug)]
pub struct UnitRewriter {
    file: FileId,
    replacements: BTreeMap<Span, String>,
    /// Simple type names the rewritten unit newly references.
    required_types: BTreeSet<String>,
    file_ops: Vec<FileOp>,
    problems: Problems,
}

impl UnitRewriter {
    #[must_use]
    pub fn new(file: FileId) -> Self {
        UnitRewriter {
            file,
            replacements: BTreeMap::new(),
            required_types: BTreeSet::new(),
            file_ops: Vec::new(),
            problems: Problems::new(),
        }
    }

    #[must_use]
    pub fn file(&self) -> &FileId {
        &self.file
    }

    /// Register a replacement for the node at `span`.
    ///
    /// Registering the same node twice with different text is a
    /// double-visit defect and surfaces as a fatal problem rather than a
    /// silently clobbered edit.
    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        let text = text.into();
        if let Some(existing) = self.replacements.get(&span) {
            if *existing != text {
                self.problems.push_fatal(format!(
                    "two conflicting rewrites registered for the same node at {}..{} in {}",
                    span.start, span.end, self.file
                ));
            }
            return;
        }
        self.replacements.insert(span, text);
    }

    pub fn insert(&mut self, offset: usize, text: impl Into<String>) {
        let text = text.into();
        self.replacements
            .entry(Span::point(offset))
            .and_modify(|existing| existing.push_str(&text))
            .or_insert(text);
    }

    /// Delete a declaration together with its attached leading comment
    /// lines and trailing newline.
    pub fn delete_decl(&mut self, source: &str, parse: &Parse, span: Span) {
        let extended = extend_to_attached_comments(source, parse, span);
        self.replace(extended, "");
    }

    /// Note that the rewritten unit references `simple_name`; the finish
    /// pass decides whether an import must be added.
    pub fn require_type(&mut self, simple_name: impl Into<String>) {
        self.required_types.insert(simple_name.into());
    }

    pub fn push_file_op(&mut self, op: FileOp) {
        self.file_ops.push(op);
    }

    pub fn problems_mut(&mut self) -> &mut Problems {
        &mut self.problems
    }

    #[must_use]
    pub fn has_edits(&self) -> bool {
        !self.replacements.is_empty() || !self.file_ops.is_empty()
    }

    /// Finish the unit: resolve required imports and emit the edit list.
    pub fn finish(mut self, index: &Index) -> UnitRewrite {
        let import_edit = compute_import_edits(
            index,
            &self.file,
            &self.required_types,
            &mut self.problems,
        );

        let mut edits: Vec<TextEdit> = self
            .replacements
            .into_iter()
            .map(|(span, text)| TextEdit::replace(self.file.clone(), span, text))
            .collect();
        edits.extend(import_edit);

        UnitRewrite {
            file: self.file,
            edits,
            file_ops: self.file_ops,
            problems: self.problems,
        }
    }
}

/// Output of one per-file unit of work.
#[derive(Clone, Debug)]
pub struct UnitRewrite {
    pub file: FileId,
    pub edits: Vec<TextEdit>,
    pub file_ops: Vec<FileOp>,
    pub problems: Problems,
}

/// Extends a declaration span to cover the comment lines attached directly
/// above it (no blank line in between) and the trailing newline, so a
/// deleted or moved node takes its comments along.
#[must_use]
pub fn extend_to_attached_comments(source: &str, parse: &Parse, span: Span) -> Span {
    let mut start = line_start(source, span.start);

    loop {
        if start == 0 {
            break;
        }
        let prev_line_start = line_start(source, start - 1);
        let prev_line = source[prev_line_start..start].trim_end();
        let trimmed = prev_line.trim_start();
        let is_comment_line = parse
            .comments()
            .iter()
            .any(|c| c.range.start >= prev_line_start && c.range.start < start)
            && (trimmed.starts_with("//")
                || trimmed.starts_with("/*")
                || trimmed.starts_with('*')
                || trimmed.ends_with("*/"));
        if !is_comment_line {
            break;
        }
        start = prev_line_start;
    }

    let mut end = span.end;
    if source[end..].starts_with('\n') {
        end += 1;
    } else if source[end..].starts_with("\r\n") {
        end += 2;
    }
    Span::new(start, end)
}

/// Compute the `import` statements the rewritten unit needs.
///
/// An import is added only when exactly one non-private declared type
/// matches the simple name; ambiguous or private-only matches are left for
/// the user to disambiguate, surfaced as a warning.
fn compute_import_edits(
    index: &Index,
    file: &FileId,
    required: &BTreeSet<String>,
    problems: &mut Problems,
) -> Vec<TextEdit> {
    if required.is_empty() {
        return Vec::new();
    }
    let Some(parse) = index.file_parse(file) else {
        return Vec::new();
    };
    let unit = parse.compilation_unit();
    let own_package = unit.package.as_ref().map(|p| p.name.as_str());

    let mut to_add: Vec<String> = Vec::new();
    for simple in required {
        if is_implicitly_visible(index, unit, own_package, simple, file) {
            continue;
        }

        let candidates: Vec<&str> = index
            .declared_types(simple)
            .into_iter()
            .filter(|(_, vis)| *vis != Visibility::Private)
            .map(|(qualified, _)| qualified)
            .collect();
        match candidates.as_slice() {
            [only] => to_add.push((*only).to_string()),
            [] => {
                tracing::debug!(%file, simple, "no declared type found for required import");
            }
            _ => {
                problems.push_warning(format!(
                    "ambiguous type `{simple}`: add the import manually"
                ));
            }
        }
    }

    if to_add.is_empty() {
        return Vec::new();
    }
    to_add.sort();
    to_add.dedup();

    let insert_at = unit
        .imports
        .last()
        .map(|imp| imp.range.end)
        .or_else(|| unit.package.as_ref().map(|p| p.range.end))
        .unwrap_or(0);
    let mut text = String::new();
    for qualified in &to_add {
        text.push_str(&format!("\nimport {qualified};"));
    }
    if insert_at == 0 {
        // No package or imports to anchor after: prepend.
        text = to_add
            .iter()
            .map(|qualified| format!("import {qualified};\n"))
            .collect();
        return vec![TextEdit::insert(file.clone(), 0, text)];
    }
    vec![TextEdit::insert(file.clone(), insert_at, text)]
}

/// A simple name needs no import when it is already imported, declared in
/// this unit, or declared in the unit's own package.
fn is_implicitly_visible(
    index: &Index,
    unit: &arbor_syntax::ast::CompilationUnit,
    own_package: Option<&str>,
    simple: &str,
    file: &FileId,
) -> bool {
    if unit
        .imports
        .iter()
        .any(|imp| !imp.is_star && imp.simple_name() == simple)
    {
        return true;
    }
    if unit.types.iter().any(|ty| contains_type(ty, simple)) {
        return true;
    }
    if let Some(sym) = index.find_type(simple) {
        if &sym.file == file {
            return true;
        }
        if index.package_of_type(simple) == own_package {
            return true;
        }
    }
    false
}

fn contains_type(decl: &arbor_syntax::ast::TypeDecl, name: &str) -> bool {
    if decl.name() == name {
        return true;
    }
    decl.members().iter().any(|member| match member {
        arbor_syntax::ast::MemberDecl::Type(nested) => contains_type(nested, name),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn build(files: Vec<(&str, &str)>) -> Index {
        let map: BTreeMap<FileId, String> = files
            .into_iter()
            .map(|(file, text)| (FileId::new(file), text.to_string()))
            .collect();
        Index::new(map)
    }

    #[test]
    fn double_registration_with_different_text_is_fatal() {
        let mut rewriter = UnitRewriter::new(FileId::new("A.java"));
        let span = Span::new(4, 9);
        rewriter.replace(span, "first");
        rewriter.replace(span, "first");
        assert!(!rewriter.problems_mut().is_fatal());
        rewriter.replace(span, "second");
        assert!(rewriter.problems_mut().is_fatal());
    }

    #[test]
    fn deletion_takes_attached_comments_along() {
        let src = "class A {\n    // helper used once\n    int helper() { return 1; }\n    int keep;\n}\n";
        let index = build(vec![("A.java", src)]);
        let parse = index.file_parse(&FileId::new("A.java")).unwrap();
        let decl_start = src.find("int helper").unwrap();
        let decl_end = src.find("return 1; }").unwrap() + "return 1; }".len();

        let extended = extend_to_attached_comments(src, parse, Span::new(decl_start, decl_end));
        let removed = &src[extended.start..extended.end];
        assert!(removed.contains("// helper used once"));
        assert!(removed.ends_with('\n'));
        assert!(!removed.contains("keep"));
    }

    #[test]
    fn import_added_only_for_unique_non_private_match() {
        let index = build(vec![
            ("p/Main.java", "package p;\n\nclass Main { }"),
            ("q/Helper.java", "package q; public class Helper {}"),
            ("r/Dup.java", "package r; public class Dup {}"),
            ("s/Dup.java", "package s; public class Dup {}"),
        ]);

        let mut rewriter = UnitRewriter::new(FileId::new("p/Main.java"));
        rewriter.require_type("Helper");
        rewriter.require_type("Dup");
        let rewrite = rewriter.finish(&index);

        let import_edits: Vec<&TextEdit> = rewrite
            .edits
            .iter()
            .filter(|e| e.replacement.contains("import"))
            .collect();
        assert_eq!(import_edits.len(), 1);
        assert_eq!(import_edits[0].replacement, "\nimport q.Helper;");
        assert!(rewrite
            .problems
            .messages()
            .iter()
            .any(|m| m.contains("ambiguous type `Dup`")));
    }

    #[test]
    fn same_package_types_need_no_import() {
        let index = build(vec![
            ("p/Main.java", "package p; class Main {}"),
            ("p/Sibling.java", "package p; class Sibling {}"),
        ]);
        let mut rewriter = UnitRewriter::new(FileId::new("p/Main.java"));
        rewriter.require_type("Sibling");
        let rewrite = rewriter.finish(&index);
        assert!(rewrite.edits.is_empty());
        assert!(rewrite.problems.is_empty());
    }
}
