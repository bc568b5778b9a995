//! Inline Method.
//!
//! Splices the target method's body into each call site: leading
//! statements are hoisted ahead of the enclosing statement (or folded into
//! the loop/if structure when the call sits in a control-flow header), the
//! final `return` expression replaces the call, and every formal-parameter
//! reference is substituted by the matching actual argument. Names the
//! body introduces are renamed when they would clash at the call site.

use std::collections::{HashMap, HashSet};

use arbor_core::{indentation_at, FileId, Span};
use arbor_index::Index;
use arbor_resolve::{find_method_decl, Element, MethodKey, Resolver};
use arbor_syntax::ast::{Block, CallExpr, Expr, LiteralExpr, Stmt, UnaryOp};
use arbor_syntax::visit::{self, Visitor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::commit::UnitRewriter;
use crate::handle::{ElementHandle, ElementKind};
use crate::problem::Problems;
use crate::usages::SearchFlags;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InlineMethod {
    pub target: ElementHandle,
    /// Inline every call site and delete the declaration.
    #[serde(default)]
    pub inline_all: bool,
}

/// How the target method's body returns.
#[derive(Clone, Debug, PartialEq, Eq)]
enum BodyShape {
    /// No `return` at top level; every statement is hoisted.
    Fallthrough,
    /// A single trailing `return expr;`.
    TrailingReturn,
    /// Multiple or non-trailing returns: only substitutable when the call
    /// site is itself the entire expression of an enclosing `return`.
    MultipleReturns,
}

/// Pre-analyzed facts about the target body, computed once per
/// refactoring against the declaring file's snapshot.
struct BodyInfo {
    file: FileId,
    text: String,
    shape: BodyShape,
    /// Top-level body statements, minus the trailing return when present.
    leading: Vec<Stmt>,
    /// All top-level statements, for whole-body substitution.
    all_stmts: Vec<Stmt>,
    trailing_return_expr: Option<Expr>,
    param_names: Vec<String>,
    param_types: Vec<String>,
    /// Spans of parameter references inside the body, by parameter index.
    param_refs: Vec<(Span, usize)>,
    /// Locals declared in the body: name → declaration name span.
    local_decls: Vec<(String, Span)>,
    /// References to body locals (declaration spans excluded).
    local_refs: Vec<(String, Span)>,
    /// Unqualified references to members of the declaring class that need
    /// qualification when inlined into another class.
    member_refs: Vec<Span>,
    /// Parameters re-assigned inside the body.
    reassigned_params: HashSet<usize>,
    is_static: bool,
    returns_void: bool,
}

impl InlineMethod {
    pub(crate) fn search_flags(&self) -> SearchFlags {
        SearchFlags {
            find_usages: true,
            ..SearchFlags::default()
        }
    }

    fn target_key(&self) -> Option<MethodKey> {
        self.target.method_key()
    }

    pub(crate) fn precheck(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        if self.target.kind != ElementKind::Method {
            problems.push_fatal("inline targets a method");
            return problems;
        }
        let Some(sym) = self.target.resolve(index) else {
            problems.push_fatal(format!(
                "cannot resolve method `{}`: the element no longer exists",
                self.target.name
            ));
            return problems;
        };
        if index
            .file_origin(&sym.file)
            .map_or(false, |origin| origin.is_dependency())
        {
            problems.push_fatal("cannot inline a library method");
            return problems;
        }

        let Some(info) = self.body_info(index) else {
            problems.push_fatal(format!(
                "`{}` has no inlinable body (abstract or native)",
                self.target.name
            ));
            return problems;
        };
        if self.is_recursive(&info) {
            problems.push_fatal("recursive methods cannot be inlined");
        }
        problems
    }

    pub(crate) fn fast_check(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        let Some(key) = self.target_key() else {
            return Problems::fatal("inline target has no signature");
        };
        let Some(sym) = self.target.resolve(index) else {
            return problems;
        };
        let Some(parse) = index.file_parse(&sym.file) else {
            return problems;
        };
        let Some(method) = find_method_decl(parse.compilation_unit(), &key) else {
            return problems;
        };
        if method.modifiers.is_abstract || method.modifiers.is_native {
            problems.push_fatal("abstract and native methods cannot be inlined");
        }
        if method.body.is_none() {
            problems.push_fatal("the method has no body");
        }
        problems
    }

    fn is_recursive(&self, info: &BodyInfo) -> bool {
        // Unqualified self-calls were collected as member references; a
        // direct textual check on the body statements is enough for the
        // qualified `this.name(...)` form.
        let name = &self.target.name;
        info.all_stmts.iter().any(|stmt| {
            let slice = stmt.range().slice(&info.text);
            find_identifier_followed_by_paren(slice, name)
        })
    }

    /// Analyze the target body once, against the declaring snapshot.
    fn body_info(&self, index: &Index) -> Option<BodyInfo> {
        let key = self.target_key()?;
        let sym = self.target.resolve(index)?;
        let text = index.file_text(&sym.file)?.to_string();
        let resolver = Resolver::new(index, &sym.file)?;
        let method = find_method_decl(resolver.unit(), &key)?;
        let body = method.body.as_ref()?;

        let shape = classify_body(body);
        let mut leading: Vec<Stmt> = Vec::new();
        let mut trailing_return_expr = None;
        match shape {
            BodyShape::Fallthrough => leading = body.statements.clone(),
            BodyShape::TrailingReturn => {
                let (last, rest) = body.statements.split_last()?;
                leading = rest.to_vec();
                if let Stmt::Return(ret) = last {
                    trailing_return_expr = ret.expr.clone();
                }
            }
            BodyShape::MultipleReturns => {}
        }

        let mut collector = BodyCollector {
            resolver: &resolver,
            key: &key,
            declaring_chain: index.superclass_chain(&key.class),
            param_refs: Vec::new(),
            local_decls: Vec::new(),
            local_refs: Vec::new(),
            member_refs: Vec::new(),
            reassigned_params: HashSet::new(),
        };
        visit::walk_block(body, &mut collector);
        // Statement-level locals (for/foreach vars included).
        collect_declared_locals(body, &mut collector.local_decls);

        Some(BodyInfo {
            file: sym.file.clone(),
            text,
            shape,
            leading,
            all_stmts: body.statements.clone(),
            trailing_return_expr,
            param_names: method.params.iter().map(|p| p.name.clone()).collect(),
            param_types: method.params.iter().map(|p| p.ty.text.clone()).collect(),
            param_refs: collector.param_refs,
            local_decls: collector.local_decls,
            local_refs: collector.local_refs,
            member_refs: collector.member_refs,
            reassigned_params: collector.reassigned_params,
            is_static: method.modifiers.is_static,
            returns_void: method.return_ty.text.trim() == "void",
        })
    }

    pub(crate) fn rewrite_file(
        &self,
        index: &Index,
        file: &FileId,
        rewriter: &mut UnitRewriter,
    ) {
        let Some(key) = self.target_key() else {
            return;
        };
        let Some(info) = self.body_info(index) else {
            return;
        };
        let Some(resolver) = Resolver::new(index, file) else {
            tracing::debug!(%file, "skipping unparseable file");
            return;
        };
        let Some(text) = index.file_text(file) else {
            return;
        };

        let mut finder = CallFinder {
            resolver: &resolver,
            key: &key,
            calls: Vec::new(),
        };
        visit::walk_unit(resolver.unit(), &mut finder);

        for call in &finder.calls {
            self.inline_at_site(index, &resolver, text, &info, call, rewriter);
        }

        if self.inline_all && &info.file == file {
            if let Some(sym) = self.target.resolve(index) {
                if let Some(parse) = index.file_parse(file) {
                    rewriter.delete_decl(text, parse, sym.decl_range);
                }
            }
        }
    }

    fn inline_at_site(
        &self,
        index: &Index,
        resolver: &Resolver<'_>,
        text: &str,
        info: &BodyInfo,
        call: &CallExpr,
        rewriter: &mut UnitRewriter,
    ) {
        if call.args.len() != info.param_names.len() {
            // A different-arity overload; the resolver already filtered,
            // keep this as a guard against vararg mismatches.
            return;
        }
        let Some((anchor, in_block)) = find_anchor_stmt(resolver, call.range) else {
            rewriter
                .problems_mut()
                .push_fatal("call site is not inside a rewritable statement");
            return;
        };
        let indent = indentation_at(text, anchor.range().start);
        let site = CallSite {
            call,
            anchor: &anchor,
            indent: indent.clone(),
            in_block,
        };

        // Receiver prefix for cross-class member qualification.
        let declaring = self.target.enclosing_type.as_deref().unwrap_or_default();
        let cross_class = resolver
            .enclosing_type(call.range.start)
            .map_or(true, |ty| {
                !index
                    .superclass_chain(ty.name())
                    .iter()
                    .any(|c| c.as_str() == declaring)
            });
        let qualifier = if !cross_class {
            None
        } else if info.is_static {
            self.target.enclosing_type.clone().map(|class| {
                rewriter.require_type(class.clone());
                class
            })
        } else {
            match call.name_and_receiver() {
                Some((_, _, Some(receiver))) => {
                    Some(receiver.range().slice(text).to_string())
                }
                _ => None,
            }
        };

        let mut used_names = resolver.visible_names_at(call.range.start);
        let mut substitution = Substitution::new(info, qualifier);

        // Literal arguments whose parameter is re-assigned in the body get
        // a fresh local so mutate-the-copy semantics survive.
        let mut pre_decls: Vec<String> = Vec::new();
        for (idx, param_name) in info.param_names.iter().enumerate() {
            let arg = &call.args[idx];
            let arg_text = arg.range().slice(text).trim().to_string();
            if is_literal(arg) && info.reassigned_params.contains(&idx) {
                let fresh = make_unique(param_name, &mut used_names);
                pre_decls.push(format!(
                    "{indent}{ty} {fresh} = {arg_text};",
                    ty = info.param_types[idx]
                ));
                substitution.params.insert(idx, fresh);
            } else {
                substitution.params.insert(idx, arg_text);
            }
        }

        // Body locals that clash with names visible at the call site are
        // renamed before substitution.
        for (local_name, _) in &info.local_decls {
            if used_names.contains(local_name) {
                let fresh = make_unique(&format!("{local_name}2"), &mut used_names);
                substitution.locals.insert(local_name.clone(), fresh);
            } else {
                used_names.insert(local_name.clone());
            }
        }

        match info.shape {
            BodyShape::MultipleReturns => {
                self.inline_multi_return(text, info, &site, &substitution, &pre_decls, rewriter)
            }
            BodyShape::Fallthrough | BodyShape::TrailingReturn => {
                self.inline_single_return(text, info, &site, &substitution, &pre_decls, rewriter)
            }
        }
    }

    fn inline_multi_return(
        &self,
        text: &str,
        info: &BodyInfo,
        site: &CallSite<'_>,
        substitution: &Substitution<'_>,
        pre_decls: &[String],
        rewriter: &mut UnitRewriter,
    ) {
        // Only a call that is the entire expression of an enclosing
        // `return` can absorb a multi-return body.
        let is_bare_return = matches!(
            site.anchor,
            Stmt::Return(ret) if ret
                .expr
                .as_ref()
                .map_or(false, |e| e.unwrap_parens().range() == site.call.range)
        );
        if !is_bare_return {
            rewriter.problems_mut().push_fatal(format!(
                "`{}` has multiple returns; only a call that is itself a bare `return` expression can be inlined",
                self.target.name
            ));
            return;
        }

        let mut lines: Vec<String> = pre_decls.to_vec();
        for stmt in &info.all_stmts {
            lines.push(substitution.stmt_text(info, stmt, &site.indent));
        }
        let anchor_span = stmt_span_with_indent(text, site.anchor.range());
        rewriter.replace(anchor_span, lines.join("\n"));
    }

    fn inline_single_return(
        &self,
        text: &str,
        info: &BodyInfo,
        site: &CallSite<'_>,
        substitution: &Substitution<'_>,
        pre_decls: &[String],
        rewriter: &mut UnitRewriter,
    ) {
        let mut hoisted: Vec<String> = pre_decls.to_vec();
        for stmt in &info.leading {
            hoisted.push(substitution.stmt_text(info, stmt, &site.indent));
        }
        let result_text = info
            .trailing_return_expr
            .as_ref()
            .map(|expr| substitution.expr_text(info, expr));

        match classify_site(site) {
            SitePosition::BareStatement => {
                let mut lines = hoisted;
                if let Some(result) = result_text {
                    let result_expr = info.trailing_return_expr.as_ref();
                    if result_expr.map_or(false, has_side_effects) {
                        lines.push(format!("{}{result};", site.indent));
                    } else if !info.returns_void {
                        rewriter.problems_mut().push_warning(format!(
                            "the return value of `{}` is dropped at this call site",
                            self.target.name
                        ));
                    }
                }
                let anchor_span = stmt_span_with_indent(text, site.anchor.range());
                if lines.is_empty() {
                    rewriter.replace(anchor_span, String::new());
                } else {
                    rewriter.replace(anchor_span, lines.join("\n"));
                }
            }
            SitePosition::ForUpdate(for_stmt) => {
                let Some(result) = result_text else {
                    rewriter
                        .problems_mut()
                        .push_fatal("cannot inline a void body into a for-loop update clause");
                    return;
                };
                // The update clause is an expression list: hoisted
                // statements join it only when they are pure expressions.
                let mut exprs: Vec<String> = Vec::new();
                for stmt in &info.leading {
                    match stmt {
                        Stmt::Expr(expr_stmt) => {
                            exprs.push(substitution.expr_text(info, &expr_stmt.expr))
                        }
                        _ => {
                            rewriter.problems_mut().push_fatal(
                                "cannot fold declarations into a for-loop update clause",
                            );
                            return;
                        }
                    }
                }
                for update in &for_stmt.update {
                    if update.range().contains(site.call.range.start) {
                        let mut rewritten = update.range().slice(text).to_string();
                        let rel_start = site.call.range.start - update.range().start;
                        let rel_end = site.call.range.end - update.range().start;
                        rewritten.replace_range(rel_start..rel_end, &result);
                        exprs.push(rewritten);
                    } else {
                        exprs.push(update.range().slice(text).to_string());
                    }
                }
                rewriter.replace(for_stmt.update_range, exprs.join(", "));
            }
            SitePosition::LoopHeader(loop_kind) => {
                if hoisted.is_empty() {
                    self.replace_call_with_result(text, info, site, substitution, rewriter);
                } else {
                    self.restructure_loop(text, site, loop_kind, &hoisted, rewriter, info, substitution);
                }
            }
            SitePosition::OnceEvaluatedHeader => {
                if hoisted.is_empty() {
                    self.replace_call_with_result(text, info, site, substitution, rewriter);
                } else {
                    // The header is evaluated once on entry: a new block
                    // absorbs the hoisted statements ahead of the node.
                    let anchor_span = stmt_span_with_indent(text, site.anchor.range());
                    let inner_indent = format!("{}    ", site.indent);
                    let mut lines = vec![format!("{}{{", site.indent)];
                    for line in &hoisted {
                        lines.push(format!("    {line}"));
                    }
                    let stmt_text = self.anchor_with_result(text, info, site, substitution);
                    lines.push(reindent(&stmt_text, &site.indent, &inner_indent));
                    lines.push(format!("{}}}", site.indent));
                    rewriter.replace(anchor_span, lines.join("\n"));
                }
            }
            SitePosition::WithinStatement => {
                if hoisted.is_empty() {
                    self.replace_call_with_result(text, info, site, substitution, rewriter);
                } else if site.in_block {
                    let insert_at = arbor_core::line_start(text, site.anchor.range().start);
                    let mut block = hoisted.join("\n");
                    block.push('\n');
                    rewriter.insert(insert_at, block);
                    self.replace_call_with_result(text, info, site, substitution, rewriter);
                } else {
                    // Braceless branch position: a new block absorbs the
                    // hoisted statements and the rewritten statement.
                    let anchor_span = stmt_span_with_indent(text, site.anchor.range());
                    let inner_indent = format!("{}    ", site.indent);
                    let mut lines = vec![format!("{}{{", site.indent)];
                    for line in &hoisted {
                        lines.push(format!("    {line}"));
                    }
                    let stmt_text = self.anchor_with_result(text, info, site, substitution);
                    lines.push(reindent(&stmt_text, &site.indent, &inner_indent));
                    lines.push(format!("{}}}", site.indent));
                    rewriter.replace(anchor_span, lines.join("\n"));
                }
            }
        }
    }

    /// Rebuild the anchor statement's text with the call replaced by the
    /// substituted result expression.
    fn anchor_with_result(
        &self,
        text: &str,
        info: &BodyInfo,
        site: &CallSite<'_>,
        substitution: &Substitution<'_>,
    ) -> String {
        let anchor_span = site.anchor.range();
        let mut out = anchor_span.slice(text).to_string();
        if let Some(result) = self.result_text(text, info, site, substitution) {
            let rel_start = site.call.range.start - anchor_span.start;
            let rel_end = site.call.range.end - anchor_span.start;
            out.replace_range(rel_start..rel_end, &result);
        }
        out
    }

    fn replace_call_with_result(
        &self,
        text: &str,
        info: &BodyInfo,
        site: &CallSite<'_>,
        substitution: &Substitution<'_>,
        rewriter: &mut UnitRewriter,
    ) {
        match self.result_text(text, info, site, substitution) {
            Some(result) => rewriter.replace(site.call.range, result),
            None => rewriter
                .problems_mut()
                .push_fatal("a void body cannot replace a value-producing call"),
        }
    }

    fn result_text(
        &self,
        _text: &str,
        info: &BodyInfo,
        site: &CallSite<'_>,
        substitution: &Substitution<'_>,
    ) -> Option<String> {
        let expr = info.trailing_return_expr.as_ref()?;
        let raw = substitution.expr_text(info, expr);
        let needs_parens = match parent_of_call(site.anchor, site.call.range) {
            Some(parent) => parens_needed(parent, expr),
            None => false,
        };
        Some(if needs_parens { format!("({raw})") } else { raw })
    }

    fn restructure_loop(
        &self,
        text: &str,
        site: &CallSite<'_>,
        loop_kind: LoopKind,
        hoisted: &[String],
        rewriter: &mut UnitRewriter,
        info: &BodyInfo,
        substitution: &Substitution<'_>,
    ) {
        let indent = &site.indent;
        let inner = format!("{indent}    ");
        let anchor_span = stmt_span_with_indent(text, site.anchor.range());

        let cond_text = |cond: &Expr| -> String {
            let span = cond.range();
            let mut out = span.slice(text).to_string();
            if let Some(result) = self.result_text(text, info, site, substitution) {
                let rel_start = site.call.range.start - span.start;
                let rel_end = site.call.range.end - span.start;
                out.replace_range(rel_start..rel_end, &result);
            }
            out
        };

        let body_lines = |body: &Stmt| -> Vec<String> {
            match body {
                Stmt::Block(block) => block
                    .statements
                    .iter()
                    .map(|stmt| {
                        let old_indent = indentation_at(text, stmt.range().start);
                        let slice = stmt.range().slice(text);
                        reindent(slice, &old_indent, &inner)
                    })
                    .collect(),
                other => {
                    let old_indent = indentation_at(text, other.range().start);
                    vec![reindent(other.range().slice(text), &old_indent, &inner)]
                }
            }
        };

        let mut lines: Vec<String> = Vec::new();
        match loop_kind {
            LoopKind::While(while_stmt) => {
                lines.push(format!("{indent}while (true) {{"));
                for hoist in hoisted {
                    lines.push(format!("    {hoist}"));
                }
                lines.push(format!(
                    "{inner}if (!({})) {{",
                    cond_text(&while_stmt.condition)
                ));
                lines.push(format!("{inner}    break;"));
                lines.push(format!("{inner}}}"));
                lines.extend(body_lines(&while_stmt.body));
                lines.push(format!("{indent}}}"));
            }
            LoopKind::DoWhile(do_stmt) => {
                lines.push(format!("{indent}while (true) {{"));
                lines.extend(body_lines(&do_stmt.body));
                for hoist in hoisted {
                    lines.push(format!("    {hoist}"));
                }
                lines.push(format!(
                    "{inner}if (!({})) {{",
                    cond_text(&do_stmt.condition)
                ));
                lines.push(format!("{inner}    break;"));
                lines.push(format!("{inner}}}"));
                lines.push(format!("{indent}}}"));
            }
            LoopKind::ForCondition(for_stmt) => {
                let init_text = for_stmt
                    .init
                    .iter()
                    .map(|stmt| stmt.range().slice(text).trim_end_matches(';').trim().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let update_text = for_stmt
                    .update
                    .iter()
                    .map(|expr| expr.range().slice(text).to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                lines.push(format!("{indent}for ({init_text}; ; {update_text}) {{"));
                for hoist in hoisted {
                    lines.push(format!("    {hoist}"));
                }
                let cond = for_stmt
                    .condition
                    .as_ref()
                    .map(|c| cond_text(c))
                    .unwrap_or_else(|| "true".to_string());
                lines.push(format!("{inner}if (!({cond})) {{"));
                lines.push(format!("{inner}    break;"));
                lines.push(format!("{inner}}}"));
                lines.extend(body_lines(&for_stmt.body));
                lines.push(format!("{indent}}}"));
            }
        }
        rewriter.replace(anchor_span, lines.join("\n"));
    }
}

struct CallSite<'a> {
    call: &'a CallExpr,
    anchor: &'a Stmt,
    indent: String,
    /// Whether the anchor sits directly inside a block; braceless branch
    /// positions need a wrapping block before statements can be hoisted.
    in_block: bool,
}

enum LoopKind<'a> {
    While(&'a arbor_syntax::ast::WhileStmt),
    DoWhile(&'a arbor_syntax::ast::DoWhileStmt),
    ForCondition(&'a arbor_syntax::ast::ForStmt),
}

enum SitePosition<'a> {
    /// The call is the whole expression of an expression statement.
    BareStatement,
    /// The call sits in a `for` update clause.
    ForUpdate(&'a arbor_syntax::ast::ForStmt),
    /// The call sits in a repeatedly-evaluated loop condition.
    LoopHeader(LoopKind<'a>),
    /// The call sits in a once-evaluated header (`if` condition, for-each
    /// iterable).
    OnceEvaluatedHeader,
    /// Anywhere else inside the anchor statement.
    WithinStatement,
}

fn classify_site<'a>(site: &CallSite<'a>) -> SitePosition<'a> {
    let call_span = site.call.range;
    match site.anchor {
        Stmt::Expr(expr_stmt) if expr_stmt.expr.unwrap_parens().range() == call_span => {
            SitePosition::BareStatement
        }
        Stmt::For(for_stmt) => {
            if for_stmt
                .update
                .iter()
                .any(|u| u.range().contains(call_span.start))
            {
                return SitePosition::ForUpdate(for_stmt);
            }
            if for_stmt
                .condition
                .as_ref()
                .map_or(false, |c| c.range().contains(call_span.start))
            {
                return SitePosition::LoopHeader(LoopKind::ForCondition(for_stmt));
            }
            SitePosition::WithinStatement
        }
        Stmt::While(while_stmt)
            if while_stmt.condition.range().contains(call_span.start) =>
        {
            SitePosition::LoopHeader(LoopKind::While(while_stmt))
        }
        Stmt::DoWhile(do_stmt) if do_stmt.condition.range().contains(call_span.start) => {
            SitePosition::LoopHeader(LoopKind::DoWhile(do_stmt))
        }
        Stmt::If(if_stmt) if if_stmt.condition.range().contains(call_span.start) => {
            SitePosition::OnceEvaluatedHeader
        }
        Stmt::ForEach(foreach) if foreach.iterable.range().contains(call_span.start) => {
            SitePosition::OnceEvaluatedHeader
        }
        _ => SitePosition::WithinStatement,
    }
}

/// Substitution tables applied to body text slices.
struct Substitution<'a> {
    info: &'a BodyInfo,
    /// Parameter index → replacement text.
    params: HashMap<usize, String>,
    /// Body local old name → fresh name.
    locals: HashMap<String, String>,
    /// Receiver/class prefix for cross-class member references.
    qualifier: Option<String>,
}

impl<'a> Substitution<'a> {
    fn new(info: &'a BodyInfo, qualifier: Option<String>) -> Self {
        Substitution {
            info,
            params: HashMap::new(),
            locals: HashMap::new(),
            qualifier,
        }
    }

    /// Apply all substitutions to the slice of `span` from the declaring
    /// file's text.
    fn apply(&self, span: Span) -> String {
        let info = self.info;
        let mut edits: Vec<(Span, String)> = Vec::new();

        for (ref_span, idx) in &info.param_refs {
            if span.contains_span(*ref_span) {
                if let Some(replacement) = self.params.get(idx) {
                    edits.push((*ref_span, replacement.clone()));
                }
            }
        }
        for (name, decl_span) in &info.local_decls {
            if span.contains_span(*decl_span) {
                if let Some(fresh) = self.locals.get(name) {
                    edits.push((*decl_span, fresh.clone()));
                }
            }
        }
        for (name, ref_span) in &info.local_refs {
            if span.contains_span(*ref_span) {
                if let Some(fresh) = self.locals.get(name) {
                    edits.push((*ref_span, fresh.clone()));
                }
            }
        }
        if let Some(qualifier) = &self.qualifier {
            for member_span in &info.member_refs {
                if span.contains_span(*member_span) {
                    edits.push((Span::point(member_span.start), format!("{qualifier}.")));
                }
            }
        }

        edits.sort_by_key(|(edit_span, _)| (edit_span.start, edit_span.end));
        let mut out = span.slice(&info.text).to_string();
        for (edit_span, replacement) in edits.iter().rev() {
            let rel_start = edit_span.start - span.start;
            let rel_end = edit_span.end - span.start;
            out.replace_range(rel_start..rel_end, replacement);
        }
        out
    }

    fn stmt_text(&self, info: &BodyInfo, stmt: &Stmt, indent: &str) -> String {
        let old_indent = indentation_at(&info.text, stmt.range().start);
        let substituted = self.apply(stmt.range());
        reindent(&substituted, &old_indent, indent)
    }

    fn expr_text(&self, _info: &BodyInfo, expr: &Expr) -> String {
        self.apply(expr.range()).trim().to_string()
    }
}

struct CallFinder<'a, 'r> {
    resolver: &'r Resolver<'a>,
    key: &'r MethodKey,
    calls: Vec<CallExpr>,
}

impl Visitor for CallFinder<'_, '_> {
    fn visit_expr(&mut self, expr: &Expr) -> bool {
        if let Expr::Call(call) = expr {
            if let Some(resolved) = self.resolver.resolve_call(call, call.range.start) {
                if resolved == *self.key {
                    self.calls.push(call.clone());
                    // Nested calls to the same method inside the argument
                    // list would double-rewrite; the outer site wins.
                    return false;
                }
            }
        }
        true
    }
}

struct BodyCollector<'a, 'r> {
    resolver: &'r Resolver<'a>,
    key: &'r MethodKey,
    declaring_chain: Vec<String>,
    param_refs: Vec<(Span, usize)>,
    local_decls: Vec<(String, Span)>,
    local_refs: Vec<(String, Span)>,
    member_refs: Vec<Span>,
    reassigned_params: HashSet<usize>,
}

impl Visitor for BodyCollector<'_, '_> {
    fn visit_expr(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::Name(name) => {
                match self.resolver.resolve_identifier(name.range.start, &name.name) {
                    Some(Element::Param { ref owner, index, .. }) if owner == self.key => {
                        self.param_refs.push((name.range, index));
                    }
                    Some(Element::Local { ref owner, .. }) if owner == self.key => {
                        self.local_refs.push((name.name.clone(), name.range));
                    }
                    Some(Element::Field { ref class, .. })
                        if self.declaring_chain.iter().any(|c| c == class) =>
                    {
                        self.member_refs.push(name.range);
                    }
                    _ => {}
                }
            }
            Expr::Call(call) => {
                // Unqualified calls to own members need qualification too.
                if let Expr::Name(callee) = call.callee.as_ref() {
                    if let Some(resolved) = self.resolver.resolve_call(call, call.range.start) {
                        if self.declaring_chain.iter().any(|c| *c == resolved.class) {
                            self.member_refs.push(callee.range);
                        }
                    }
                    // Don't re-visit the callee as a plain name.
                    for arg in &call.args {
                        visit::walk_expr(arg, self);
                    }
                    return false;
                }
            }
            Expr::Assign(assign) => {
                if let Expr::Name(name) = assign.lhs.unwrap_parens() {
                    if let Some(Element::Param { ref owner, index, .. }) = self
                        .resolver
                        .resolve_identifier(name.range.start, &name.name)
                    {
                        if owner == self.key {
                            self.reassigned_params.insert(index);
                        }
                    }
                }
            }
            Expr::Unary(unary) if matches!(unary.op, UnaryOp::PreInc | UnaryOp::PreDec) => {
                self.note_param_mutation(unary.expr.unwrap_parens());
            }
            Expr::Postfix(postfix) => {
                self.note_param_mutation(postfix.expr.unwrap_parens());
            }
            _ => {}
        }
        true
    }
}

impl BodyCollector<'_, '_> {
    fn note_param_mutation(&mut self, expr: &Expr) {
        if let Expr::Name(name) = expr {
            if let Some(Element::Param { ref owner, index, .. }) = self
                .resolver
                .resolve_identifier(name.range.start, &name.name)
            {
                if owner == self.key {
                    self.reassigned_params.insert(index);
                }
            }
        }
    }
}

/// `return` statements at any nesting depth, and opaque statements the
/// scan cannot see into.
fn classify_body(body: &Block) -> BodyShape {
    fn count_returns(stmt: &Stmt, count: &mut usize, opaque: &mut bool) {
        match stmt {
            Stmt::Return(_) => *count += 1,
            Stmt::Opaque(_) => *opaque = true,
            Stmt::Block(block) => {
                for stmt in &block.statements {
                    count_returns(stmt, count, opaque);
                }
            }
            Stmt::If(s) => {
                count_returns(&s.then_branch, count, opaque);
                if let Some(else_branch) = &s.else_branch {
                    count_returns(else_branch, count, opaque);
                }
            }
            Stmt::While(s) => count_returns(&s.body, count, opaque),
            Stmt::DoWhile(s) => count_returns(&s.body, count, opaque),
            Stmt::For(s) => count_returns(&s.body, count, opaque),
            Stmt::ForEach(s) => count_returns(&s.body, count, opaque),
            Stmt::Labeled(s) => count_returns(&s.body, count, opaque),
            _ => {}
        }
    }

    let mut count = 0usize;
    let mut opaque = false;
    for stmt in &body.statements {
        count_returns(stmt, &mut count, &mut opaque);
    }

    if opaque {
        return BodyShape::MultipleReturns;
    }
    match count {
        0 => BodyShape::Fallthrough,
        1 => {
            if matches!(body.statements.last(), Some(Stmt::Return(_))) {
                BodyShape::TrailingReturn
            } else {
                BodyShape::MultipleReturns
            }
        }
        _ => BodyShape::MultipleReturns,
    }
}

fn collect_declared_locals(block: &Block, out: &mut Vec<(String, Span)>) {
    fn walk(stmt: &Stmt, out: &mut Vec<(String, Span)>) {
        match stmt {
            Stmt::LocalVar(local) => out.push((local.name.clone(), local.name_range)),
            Stmt::Block(block) => collect_declared_locals(block, out),
            Stmt::If(s) => {
                walk(&s.then_branch, out);
                if let Some(else_branch) = &s.else_branch {
                    walk(else_branch, out);
                }
            }
            Stmt::While(s) => walk(&s.body, out),
            Stmt::DoWhile(s) => walk(&s.body, out),
            Stmt::For(s) => {
                for init in &s.init {
                    walk(init, out);
                }
                walk(&s.body, out);
            }
            Stmt::ForEach(s) => {
                out.push((s.var_name.clone(), s.var_name_range));
                walk(&s.body, out);
            }
            Stmt::Labeled(s) => walk(&s.body, out),
            _ => {}
        }
    }
    for stmt in &block.statements {
        walk(stmt, out);
    }
}

/// The statement that directly owns the call site, plus whether it sits
/// directly inside a block. Control-flow statements whose header contains
/// the call remain the anchor so header positions can be classified.
fn find_anchor_stmt(resolver: &Resolver<'_>, call_span: Span) -> Option<(Stmt, bool)> {
    let (_, exec) = resolver.enclosing_executable(call_span.start)?;
    let body = exec.body()?;

    fn narrow(stmt: &Stmt, call_span: Span, in_block: bool) -> Option<(Stmt, bool)> {
        if !stmt.range().contains(call_span.start) {
            return None;
        }
        match stmt {
            Stmt::Block(block) => {
                for inner in &block.statements {
                    if let Some(found) = narrow(inner, call_span, true) {
                        return Some(found);
                    }
                }
                Some((stmt.clone(), in_block))
            }
            Stmt::If(if_stmt) => {
                if if_stmt.condition.range().contains(call_span.start) {
                    return Some((stmt.clone(), in_block));
                }
                narrow(&if_stmt.then_branch, call_span, false)
                    .or_else(|| {
                        if_stmt
                            .else_branch
                            .as_ref()
                            .and_then(|e| narrow(e, call_span, false))
                    })
                    .or_else(|| Some((stmt.clone(), in_block)))
            }
            Stmt::While(while_stmt) => {
                if while_stmt.condition.range().contains(call_span.start) {
                    return Some((stmt.clone(), in_block));
                }
                narrow(&while_stmt.body, call_span, false)
            }
            Stmt::DoWhile(do_stmt) => {
                if do_stmt.condition.range().contains(call_span.start) {
                    return Some((stmt.clone(), in_block));
                }
                narrow(&do_stmt.body, call_span, false)
            }
            Stmt::For(for_stmt) => {
                let in_header = for_stmt
                    .init
                    .iter()
                    .any(|s| s.range().contains(call_span.start))
                    || for_stmt
                        .condition
                        .as_ref()
                        .map_or(false, |c| c.range().contains(call_span.start))
                    || for_stmt
                        .update
                        .iter()
                        .any(|u| u.range().contains(call_span.start));
                if in_header {
                    return Some((stmt.clone(), in_block));
                }
                narrow(&for_stmt.body, call_span, false)
            }
            Stmt::ForEach(foreach) => {
                if foreach.iterable.range().contains(call_span.start) {
                    return Some((stmt.clone(), in_block));
                }
                narrow(&foreach.body, call_span, false)
            }
            Stmt::Labeled(labeled) => narrow(&labeled.body, call_span, false),
            other => Some((other.clone(), in_block)),
        }
    }

    for stmt in &body.statements {
        if let Some(found) = narrow(stmt, call_span, true) {
            return Some(found);
        }
    }
    None
}

/// Direct parent expression of the call inside the anchor statement.
fn parent_of_call(anchor: &Stmt, call_span: Span) -> Option<Expr> {
    struct ParentFinder {
        call_span: Span,
        parent: Option<Expr>,
    }

    impl Visitor for ParentFinder {
        fn visit_expr(&mut self, expr: &Expr) -> bool {
            let children: Vec<Span> = direct_children(expr);
            if children.iter().any(|span| *span == self.call_span) {
                self.parent = Some(expr.clone());
                return false;
            }
            true
        }
    }

    let mut finder = ParentFinder {
        call_span,
        parent: None,
    };
    visit::walk_stmt(anchor, &mut finder);
    finder.parent
}

fn direct_children(expr: &Expr) -> Vec<Span> {
    match expr {
        Expr::FieldAccess(access) => vec![access.receiver.range()],
        Expr::ArrayAccess(access) => vec![access.array.range(), access.index.range()],
        Expr::Call(call) => {
            let mut out = vec![call.callee.range()];
            out.extend(call.args.iter().map(Expr::range));
            out
        }
        Expr::New(new_expr) => new_expr.args.iter().map(Expr::range).collect(),
        Expr::NewArray(new_array) => new_array.dims.iter().map(Expr::range).collect(),
        Expr::Cast(cast) => vec![cast.expr.range()],
        Expr::Instanceof(inst) => vec![inst.expr.range()],
        Expr::Unary(unary) => vec![unary.expr.range()],
        Expr::Postfix(postfix) => vec![postfix.expr.range()],
        Expr::Binary(bin) => vec![bin.lhs.range(), bin.rhs.range()],
        Expr::Assign(assign) => vec![assign.lhs.range(), assign.rhs.range()],
        Expr::Conditional(cond) => vec![
            cond.condition.range(),
            cond.then_expr.range(),
            cond.else_expr.range(),
        ],
        Expr::Paren(paren) => vec![paren.inner.range()],
        Expr::MethodRef(mref) => vec![mref.receiver.range()],
        _ => Vec::new(),
    }
}

/// Whether substituting `result` for the call under `parent` needs
/// parentheses, by operator precedence.
fn parens_needed(parent: Expr, result: &Expr) -> bool {
    let result_prec = expr_precedence(result);
    match parent {
        Expr::Binary(bin) => result_prec <= bin.op.precedence(),
        Expr::Unary(_)
        | Expr::Postfix(_)
        | Expr::Cast(_)
        | Expr::Instanceof(_)
        | Expr::FieldAccess(_)
        | Expr::ArrayAccess(_)
        | Expr::MethodRef(_) => result_prec < PRIMARY_PRECEDENCE,
        Expr::Conditional(_) | Expr::Assign(_) => result_prec <= 2,
        _ => false,
    }
}

const PRIMARY_PRECEDENCE: u8 = 100;

fn expr_precedence(expr: &Expr) -> u8 {
    match expr.unwrap_parens() {
        Expr::Assign(_) => 1,
        Expr::Conditional(_) => 2,
        Expr::Binary(bin) => bin.op.precedence(),
        Expr::Instanceof(_) => 9,
        Expr::Unary(_) | Expr::Cast(_) => 14,
        Expr::Postfix(_) => 15,
        _ => PRIMARY_PRECEDENCE,
    }
}

fn is_literal(expr: &Expr) -> bool {
    matches!(expr.unwrap_parens(), Expr::Literal(LiteralExpr { .. }))
}

fn has_side_effects(expr: &Expr) -> bool {
    match expr.unwrap_parens() {
        Expr::Call(_) | Expr::New(_) | Expr::Assign(_) => true,
        Expr::Unary(unary) => {
            matches!(unary.op, UnaryOp::PreInc | UnaryOp::PreDec)
                || has_side_effects(&unary.expr)
        }
        Expr::Postfix(_) => true,
        Expr::Binary(bin) => has_side_effects(&bin.lhs) || has_side_effects(&bin.rhs),
        Expr::Conditional(cond) => {
            has_side_effects(&cond.condition)
                || has_side_effects(&cond.then_expr)
                || has_side_effects(&cond.else_expr)
        }
        Expr::FieldAccess(access) => has_side_effects(&access.receiver),
        Expr::ArrayAccess(access) => {
            has_side_effects(&access.array) || has_side_effects(&access.index)
        }
        Expr::Cast(cast) => has_side_effects(&cast.expr),
        _ => false,
    }
}

fn make_unique(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut i = 2usize;
    loop {
        let candidate = format!("{base}{i}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        i += 1;
    }
}

/// The anchor statement's span extended to the start of its line, so the
/// replacement re-supplies indentation consistently.
fn stmt_span_with_indent(text: &str, span: Span) -> Span {
    Span::new(arbor_core::line_start(text, span.start), span.end)
}

fn reindent(text: &str, old_indent: &str, new_indent: &str) -> String {
    let mut lines = text.lines();
    let mut out = String::new();
    if let Some(first) = lines.next() {
        out.push_str(new_indent);
        out.push_str(first.trim_start());
    }
    for line in lines {
        out.push('\n');
        let stripped = line.strip_prefix(old_indent).unwrap_or(line.trim_start());
        out.push_str(new_indent);
        out.push_str(stripped);
    }
    out
}

/// Word-boundary `name(` search, used by the recursion guard.
fn find_identifier_followed_by_paren(text: &str, name: &str) -> bool {
    let bytes = text.as_bytes();
    let mut from = 0usize;
    while let Some(pos) = text[from..].find(name) {
        let start = from + pos;
        let end = start + name.len();
        from = start + 1;
        let before_ok = start == 0 || !arbor_core::is_ident_char_byte(bytes[start - 1]);
        if !before_ok {
            continue;
        }
        let mut after = end;
        while after < bytes.len() && bytes[after].is_ascii_whitespace() {
            after += 1;
        }
        if bytes.get(after) == Some(&b'(') {
            return true;
        }
    }
    false
}
