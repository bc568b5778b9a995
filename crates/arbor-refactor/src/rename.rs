//! Rename refactoring.
//!
//! The simplest visitor: match every occurrence by resolved identity and
//! replace the identifier text. All the correctness weight sits in the
//! matching — occurrences are confirmed through the resolver, never by
//! comparing name text, so shadowed and same-named elements in other scopes
//! are left alone.

use arbor_core::{is_valid_java_identifier, FileId, Span};
use arbor_index::{CandidateKind, Index};
use arbor_resolve::{simple_type_name, Element, MethodKey, Resolver, TypeInference};
use arbor_syntax::ast::{Block, Expr, Stmt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::commit::UnitRewriter;
use crate::handle::{ElementHandle, ElementKind};
use crate::problem::Problems;
use crate::usages::{RelatedHandles, SearchFlags};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Rename {
    pub target: ElementHandle,
    pub new_name: String,
    /// Renaming an element to its current name is normally a fatal
    /// no-change error; with this set it is a pure no-op.
    #[serde(default)]
    pub allow_no_change: bool,
    #[serde(default)]
    pub search_in_comments: bool,
}

impl Rename {
    #[must_use]
    pub fn is_no_op(&self) -> bool {
        self.target.name == self.new_name
    }

    pub(crate) fn search_flags(&self) -> SearchFlags {
        SearchFlags {
            find_usages: true,
            find_overriding: matches!(self.target.kind, ElementKind::Method),
            transitive_subclasses: true,
            search_in_comments: self.search_in_comments,
            ..SearchFlags::default()
        }
    }

    pub(crate) fn precheck(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        match self.target.kind {
            ElementKind::Type
            | ElementKind::Field
            | ElementKind::Method
            | ElementKind::Constructor => {
                if self.target.resolve(index).is_none() {
                    problems.push_fatal(format!(
                        "cannot resolve `{}`: the element no longer exists",
                        self.target.name
                    ));
                }
            }
            ElementKind::Local | ElementKind::Label | ElementKind::Parameter => {
                if self.target.file.is_none() {
                    problems.push_fatal(
                        "a file-scoped element requires its declaring file".to_string(),
                    );
                }
            }
            ElementKind::Package | ElementKind::DocTag => {}
        }
        problems
    }

    pub(crate) fn fast_check(&self) -> Problems {
        let mut problems = Problems::new();
        if !is_valid_java_identifier(&self.new_name) {
            problems.push_fatal(format!(
                "`{}` is not a valid Java identifier",
                self.new_name
            ));
            return problems;
        }
        if self.is_no_op() && !self.allow_no_change {
            problems.push_fatal(format!(
                "the new name is identical to the current name `{}`",
                self.target.name
            ));
        }
        problems
    }

    pub(crate) fn full_check(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        if self.is_no_op() {
            return problems;
        }
        match self.target.kind {
            ElementKind::Field => {
                if let Some(class) = self.target.enclosing_type.as_deref() {
                    if index.find_field(class, &self.new_name).is_some() {
                        problems.push_fatal(format!(
                            "`{class}` already declares a field `{}`",
                            self.new_name
                        ));
                    }
                }
            }
            ElementKind::Method => {
                if let (Some(class), Some(sig)) = (
                    self.target.enclosing_type.as_deref(),
                    self.target.signature.as_deref(),
                ) {
                    let collision = index
                        .method_overloads(class, &self.new_name)
                        .into_iter()
                        .any(|sym| sym.params_match(sig));
                    if collision {
                        problems.push_fatal(format!(
                            "`{class}` already declares `{}` with the same signature",
                            self.new_name
                        ));
                    }
                }
            }
            ElementKind::Type => {
                if index.find_type(&self.new_name).is_some() {
                    problems.push_fatal(format!(
                        "a type named `{}` already exists",
                        self.new_name
                    ));
                }
            }
            ElementKind::Label => {
                problems.merge(self.check_label_clash(index));
            }
            _ => {}
        }
        problems
    }

    /// Label renames are a non-element rename target: clashes are detected
    /// against enclosing and nested labels of the same statement.
    fn check_label_clash(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        let (Some(file), Some(offset)) = (self.target.file.as_ref(), self.target.decl_offset)
        else {
            return problems;
        };
        let Some(parse) = index.file_parse(file) else {
            return problems;
        };

        let mut labels: Vec<(String, Span, Span)> = Vec::new();
        collect_labels_in_unit(parse.compilation_unit(), &mut labels);

        let Some(target) = labels
            .iter()
            .find(|(_, label_range, _)| label_range.contains(offset) || label_range.start == offset)
            .cloned()
        else {
            return problems;
        };

        for (name, label_range, body_range) in &labels {
            if *label_range == target.1 {
                continue;
            }
            if name != &self.new_name {
                continue;
            }
            let nested = target.2.contains_span(*body_range) || body_range.contains_span(target.2);
            if nested {
                problems.push_fatal(format!(
                    "label `{}` already exists in the enclosing statement",
                    self.new_name
                ));
            }
        }
        problems
    }

    pub(crate) fn rewrite_file(
        &self,
        index: &Index,
        file: &FileId,
        related: &RelatedHandles,
        rewriter: &mut UnitRewriter,
    ) {
        if self.is_no_op() {
            return;
        }
        let Some(resolver) = Resolver::new(index, file) else {
            tracing::debug!(%file, "skipping unparseable file");
            return;
        };

        match self.target.kind {
            ElementKind::Label => self.rewrite_labels(index, file, rewriter),
            _ => self.rewrite_identifiers(index, file, &resolver, related, rewriter),
        }
    }

    fn rewrite_identifiers(
        &self,
        index: &Index,
        file: &FileId,
        resolver: &Resolver<'_>,
        related: &RelatedHandles,
        rewriter: &mut UnitRewriter,
    ) {
        let family: &[MethodKey] = &related.method_family;
        let decl_ranges = self.declaration_name_ranges(index, file, family);

        for candidate in index.find_name_candidates_in_file(file, &self.target.name) {
            match candidate.kind {
                CandidateKind::Comment => {
                    if self.search_in_comments {
                        rewriter.replace(candidate.range, self.new_name.clone());
                    }
                    continue;
                }
                CandidateKind::Import => {
                    // Imports reference top-level types only.
                    if self.target.kind == ElementKind::Type {
                        rewriter.replace(candidate.range, self.new_name.clone());
                    }
                    continue;
                }
                CandidateKind::Call | CandidateKind::Plain => {}
            }

            if decl_ranges.contains(&candidate.range) {
                rewriter.replace(candidate.range, self.new_name.clone());
                continue;
            }

            if self.occurrence_matches(resolver, candidate.range, family) {
                rewriter.replace(candidate.range, self.new_name.clone());
            }
        }
    }

    /// Name ranges of the declarations this rename must retitle in `file`.
    fn declaration_name_ranges(
        &self,
        index: &Index,
        file: &FileId,
        family: &[MethodKey],
    ) -> Vec<Span> {
        let mut out = Vec::new();
        match self.target.kind {
            ElementKind::Method => {
                for key in family {
                    for sym in index.method_overloads(&key.class, &key.name) {
                        if &sym.file == file && sym.params_match(&key.params) {
                            out.push(sym.name_range);
                        }
                    }
                }
            }
            ElementKind::Field | ElementKind::Type => {
                if let Some(sym) = self.target.resolve(index) {
                    if &sym.file == file {
                        out.push(sym.name_range);
                    }
                }
            }
            ElementKind::Local | ElementKind::Parameter => {
                // The declaration name itself is not an expression
                // occurrence; rename it by its recorded offset.
                if self.target.file.as_ref() == Some(file) {
                    if let Some(offset) = self.target.decl_offset {
                        out.push(Span::new(offset, offset + self.target.name.len()));
                    }
                }
            }
            _ => {}
        }
        out
    }

    fn occurrence_matches(
        &self,
        resolver: &Resolver<'_>,
        range: Span,
        family: &[MethodKey],
    ) -> bool {
        match self.target.kind {
            ElementKind::Method => {
                // Call-shaped occurrences resolve through the receiver.
                let Some(key) =
                    resolver.resolve_method_occurrence(range.start, &self.target.name)
                else {
                    return false;
                };
                family.iter().any(|f| *f == key) || self.target.matches(&Element::Method(key))
            }
            ElementKind::Type => {
                match resolver.resolve_identifier(range.start, &self.target.name) {
                    Some(element) => self.target.matches(&element),
                    // Type positions (extends clauses, parameter types) are
                    // not expression identifiers; fall back to the index.
                    None => false,
                }
            }
            ElementKind::Field => {
                let text = resolver
                    .index()
                    .file_text(resolver.file())
                    .unwrap_or_default();
                match crate::util::receiver_before_dot(text, range.start) {
                    crate::util::Receiver::None => {
                        match resolver.resolve_identifier(range.start, &self.target.name) {
                            Some(element) => self.target.matches(&element),
                            None => false,
                        }
                    }
                    _ => {
                        let Some(class) =
                            crate::util::receiver_class_at(resolver, text, range.start)
                        else {
                            return false;
                        };
                        match resolver.resolve_field_in_hierarchy(&class, &self.target.name) {
                            Some(element) => self.target.matches(&element),
                            None => false,
                        }
                    }
                }
            }
            _ => match resolver.resolve_identifier(range.start, &self.target.name) {
                Some(element) => self.target.matches(&element),
                None => false,
            },
        }
    }

    fn rewrite_labels(&self, index: &Index, file: &FileId, rewriter: &mut UnitRewriter) {
        let Some(parse) = index.file_parse(file) else {
            return;
        };
        let Some(offset) = self.target.decl_offset else {
            return;
        };
        let mut labels: Vec<(String, Span, Span)> = Vec::new();
        collect_labels_in_unit(parse.compilation_unit(), &mut labels);
        let Some((_, label_range, body_range)) = labels
            .iter()
            .find(|(name, label_range, _)| {
                name == &self.target.name
                    && (label_range.contains(offset) || label_range.start == offset)
            })
            .cloned()
        else {
            return;
        };

        rewriter.replace(label_range, self.new_name.clone());

        let unit = parse.compilation_unit();
        let mut jump_ranges = Vec::new();
        collect_label_jumps(unit, &self.target.name, body_range, &mut jump_ranges);
        for range in jump_ranges {
            rewriter.replace(range, self.new_name.clone());
        }
    }
}

fn collect_labels_in_unit(
    unit: &arbor_syntax::ast::CompilationUnit,
    out: &mut Vec<(String, Span, Span)>,
) {
    fn walk_type(decl: &arbor_syntax::ast::TypeDecl, out: &mut Vec<(String, Span, Span)>) {
        for member in decl.members() {
            match member {
                arbor_syntax::ast::MemberDecl::Method(m) => {
                    if let Some(body) = &m.body {
                        walk_block(body, out);
                    }
                }
                arbor_syntax::ast::MemberDecl::Constructor(c) => walk_block(&c.body, out),
                arbor_syntax::ast::MemberDecl::Initializer(i) => walk_block(&i.body, out),
                arbor_syntax::ast::MemberDecl::Type(nested) => walk_type(nested, out),
                arbor_syntax::ast::MemberDecl::Field(_) => {}
            }
        }
    }

    fn walk_block(block: &Block, out: &mut Vec<(String, Span, Span)>) {
        for stmt in &block.statements {
            walk_stmt(stmt, out);
        }
    }

    fn walk_stmt(stmt: &Stmt, out: &mut Vec<(String, Span, Span)>) {
        match stmt {
            Stmt::Labeled(labeled) => {
                out.push((labeled.label.clone(), labeled.label_range, labeled.range));
                walk_stmt(&labeled.body, out);
            }
            Stmt::Block(block) => walk_block(block, out),
            Stmt::If(s) => {
                walk_stmt(&s.then_branch, out);
                if let Some(else_branch) = &s.else_branch {
                    walk_stmt(else_branch, out);
                }
            }
            Stmt::While(s) => walk_stmt(&s.body, out),
            Stmt::DoWhile(s) => walk_stmt(&s.body, out),
            Stmt::For(s) => walk_stmt(&s.body, out),
            Stmt::ForEach(s) => walk_stmt(&s.body, out),
            _ => {}
        }
    }

    for ty in &unit.types {
        walk_type(ty, out);
    }
}

fn collect_label_jumps(
    unit: &arbor_syntax::ast::CompilationUnit,
    label: &str,
    within: Span,
    out: &mut Vec<Span>,
) {
    fn walk_type(
        decl: &arbor_syntax::ast::TypeDecl,
        label: &str,
        within: Span,
        out: &mut Vec<Span>,
    ) {
        for member in decl.members() {
            match member {
                arbor_syntax::ast::MemberDecl::Method(m) => {
                    if let Some(body) = &m.body {
                        walk_block(body, label, within, out);
                    }
                }
                arbor_syntax::ast::MemberDecl::Constructor(c) => {
                    walk_block(&c.body, label, within, out)
                }
                arbor_syntax::ast::MemberDecl::Initializer(i) => {
                    walk_block(&i.body, label, within, out)
                }
                arbor_syntax::ast::MemberDecl::Type(nested) => {
                    walk_type(nested, label, within, out)
                }
                arbor_syntax::ast::MemberDecl::Field(_) => {}
            }
        }
    }

    fn walk_block(block: &Block, label: &str, within: Span, out: &mut Vec<Span>) {
        for stmt in &block.statements {
            walk_stmt(stmt, label, within, out);
        }
    }

    fn walk_stmt(stmt: &Stmt, label: &str, within: Span, out: &mut Vec<Span>) {
        match stmt {
            Stmt::Break(s) => {
                if let (Some(name), Some(range)) = (&s.label, s.label_range) {
                    if name == label && within.contains_span(range) {
                        out.push(range);
                    }
                }
            }
            Stmt::Continue(s) => {
                if let (Some(name), Some(range)) = (&s.label, s.label_range) {
                    if name == label && within.contains_span(range) {
                        out.push(range);
                    }
                }
            }
            Stmt::Labeled(s) => walk_stmt(&s.body, label, within, out),
            Stmt::Block(block) => walk_block(block, label, within, out),
            Stmt::If(s) => {
                walk_stmt(&s.then_branch, label, within, out);
                if let Some(else_branch) = &s.else_branch {
                    walk_stmt(else_branch, label, within, out);
                }
            }
            Stmt::While(s) => walk_stmt(&s.body, label, within, out),
            Stmt::DoWhile(s) => walk_stmt(&s.body, label, within, out),
            Stmt::For(s) => walk_stmt(&s.body, label, within, out),
            Stmt::ForEach(s) => walk_stmt(&s.body, label, within, out),
            _ => {}
        }
    }

    for ty in &unit.types {
        walk_type(ty, label, within, out);
    }
}

// Resolver extension for call-shaped occurrences.
trait ResolveMethodOccurrence {
    fn resolve_method_occurrence(&self, offset: usize, name: &str) -> Option<MethodKey>;
}

impl ResolveMethodOccurrence for Resolver<'_> {
    /// Resolve a method-name occurrence at `offset`, covering plain calls,
    /// qualified calls, and method references.
    fn resolve_method_occurrence(&self, offset: usize, name: &str) -> Option<MethodKey> {
        // Walk expressions of the enclosing executable looking for a call
        // or method reference whose name span covers `offset`.
        let (_, exec) = self.enclosing_executable(offset)?;
        let body = exec.body()?;
        let mut found: Option<MethodKey> = None;
        find_call_at(self, body, offset, name, &mut found);
        found
    }
}

fn find_call_at(
    resolver: &Resolver<'_>,
    block: &Block,
    offset: usize,
    name: &str,
    out: &mut Option<MethodKey>,
) {
    fn walk_expr(
        resolver: &Resolver<'_>,
        expr: &Expr,
        offset: usize,
        name: &str,
        out: &mut Option<MethodKey>,
    ) {
        if !expr.range().contains(offset) {
            return;
        }
        match expr {
            Expr::Call(call) => {
                if let Some((call_name, name_range, _)) = call.name_and_receiver() {
                    if name_range.contains(offset) && call_name == name {
                        *out = resolver.resolve_call(call, offset);
                        return;
                    }
                }
                walk_expr(resolver, call.callee.as_ref(), offset, name, out);
                for arg in &call.args {
                    walk_expr(resolver, arg, offset, name, out);
                }
            }
            Expr::MethodRef(mref) => {
                if mref.name_range.contains(offset) && mref.name == name {
                    let inference = TypeInference::new(resolver);
                    if let Some(receiver_ty) = inference.infer(mref.receiver.as_ref(), offset) {
                        let class = simple_type_name(&receiver_ty);
                        // Arity is implicit in a method reference; match the
                        // first same-named method in the hierarchy.
                        for current in resolver.index().superclass_chain(&class) {
                            if let Some(sym) = resolver
                                .index()
                                .method_overloads(&current, name)
                                .into_iter()
                                .next()
                            {
                                *out = Some(MethodKey::new(
                                    &current,
                                    name,
                                    sym.param_types.as_deref().unwrap_or_default(),
                                ));
                                return;
                            }
                        }
                    }
                    return;
                }
                walk_expr(resolver, mref.receiver.as_ref(), offset, name, out);
            }
            Expr::FieldAccess(access) => {
                walk_expr(resolver, access.receiver.as_ref(), offset, name, out)
            }
            Expr::ArrayAccess(access) => {
                walk_expr(resolver, access.array.as_ref(), offset, name, out);
                walk_expr(resolver, access.index.as_ref(), offset, name, out);
            }
            Expr::New(new_expr) => {
                for arg in &new_expr.args {
                    walk_expr(resolver, arg, offset, name, out);
                }
            }
            Expr::NewArray(new_array) => {
                for dim in &new_array.dims {
                    walk_expr(resolver, dim, offset, name, out);
                }
            }
            Expr::Cast(cast) => walk_expr(resolver, cast.expr.as_ref(), offset, name, out),
            Expr::Instanceof(inst) => walk_expr(resolver, inst.expr.as_ref(), offset, name, out),
            Expr::Unary(unary) => walk_expr(resolver, unary.expr.as_ref(), offset, name, out),
            Expr::Postfix(postfix) => {
                walk_expr(resolver, postfix.expr.as_ref(), offset, name, out)
            }
            Expr::Binary(bin) => {
                walk_expr(resolver, bin.lhs.as_ref(), offset, name, out);
                walk_expr(resolver, bin.rhs.as_ref(), offset, name, out);
            }
            Expr::Assign(assign) => {
                walk_expr(resolver, assign.lhs.as_ref(), offset, name, out);
                walk_expr(resolver, assign.rhs.as_ref(), offset, name, out);
            }
            Expr::Conditional(cond) => {
                walk_expr(resolver, cond.condition.as_ref(), offset, name, out);
                walk_expr(resolver, cond.then_expr.as_ref(), offset, name, out);
                walk_expr(resolver, cond.else_expr.as_ref(), offset, name, out);
            }
            Expr::Paren(paren) => walk_expr(resolver, paren.inner.as_ref(), offset, name, out),
            Expr::Name(_)
            | Expr::Literal(_)
            | Expr::This(_)
            | Expr::Super(_)
            | Expr::Missing(_) => {}
        }
    }

    fn walk_stmt(
        resolver: &Resolver<'_>,
        stmt: &Stmt,
        offset: usize,
        name: &str,
        out: &mut Option<MethodKey>,
    ) {
        if !stmt.range().contains(offset) {
            return;
        }
        match stmt {
            Stmt::LocalVar(local) => {
                if let Some(init) = &local.initializer {
                    walk_expr(resolver, init, offset, name, out);
                }
            }
            Stmt::Expr(s) => walk_expr(resolver, &s.expr, offset, name, out),
            Stmt::Return(s) => {
                if let Some(expr) = &s.expr {
                    walk_expr(resolver, expr, offset, name, out);
                }
            }
            Stmt::Throw(s) => walk_expr(resolver, &s.expr, offset, name, out),
            Stmt::Block(block) => {
                for stmt in &block.statements {
                    walk_stmt(resolver, stmt, offset, name, out);
                }
            }
            Stmt::If(s) => {
                walk_expr(resolver, &s.condition, offset, name, out);
                walk_stmt(resolver, &s.then_branch, offset, name, out);
                if let Some(else_branch) = &s.else_branch {
                    walk_stmt(resolver, else_branch, offset, name, out);
                }
            }
            Stmt::While(s) => {
                walk_expr(resolver, &s.condition, offset, name, out);
                walk_stmt(resolver, &s.body, offset, name, out);
            }
            Stmt::DoWhile(s) => {
                walk_stmt(resolver, &s.body, offset, name, out);
                walk_expr(resolver, &s.condition, offset, name, out);
            }
            Stmt::For(s) => {
                for init in &s.init {
                    walk_stmt(resolver, init, offset, name, out);
                }
                if let Some(cond) = &s.condition {
                    walk_expr(resolver, cond, offset, name, out);
                }
                for update in &s.update {
                    walk_expr(resolver, update, offset, name, out);
                }
                walk_stmt(resolver, &s.body, offset, name, out);
            }
            Stmt::ForEach(s) => {
                walk_expr(resolver, &s.iterable, offset, name, out);
                walk_stmt(resolver, &s.body, offset, name, out);
            }
            Stmt::Labeled(s) => walk_stmt(resolver, &s.body, offset, name, out),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Opaque(_) | Stmt::Empty(_) => {}
        }
    }

    for stmt in &block.statements {
        walk_stmt(resolver, stmt, offset, name, out);
    }
}
