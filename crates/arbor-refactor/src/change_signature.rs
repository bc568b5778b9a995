//! Change Method Signature.
//!
//! Rewrites every declaration in the affected override family (name,
//! modifiers, parameter list, return type) and re-threads arguments at
//! every call site from the parameter descriptor list. New parameters are
//! spliced from their default-value expression — unless the call site sits
//! inside another member of the refactored family, in which case the new
//! parameter is threaded through instead of defaulted.

use std::collections::HashMap;

use arbor_core::{indentation_at, CancelToken, Cancelled, FileId, Span};
use arbor_index::{normalize_type_text, CandidateKind, Index, SymbolKind};
use arbor_resolve::{
    find_constructor_decl, find_method_decl, simple_type_name, Element, MethodKey, Resolver,
    TypeInference,
};
use arbor_syntax::ast::{Expr, Modifiers, Stmt};
use arbor_syntax::visit::{self, Visitor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::commit::UnitRewriter;
use crate::handle::{ElementHandle, ElementKind};
use crate::problem::Problems;
use crate::signature::{self, AccessLevel, ParameterInfo};
use crate::usages::{self, SearchFlags, UsageSet};
use crate::util::modifiers_text;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum HierarchyPropagation {
    None,
    Overrides,
    Overridden,
    Both,
}

impl Default for HierarchyPropagation {
    fn default() -> Self {
        HierarchyPropagation::Both
    }
}

impl HierarchyPropagation {
    fn include_overrides(self) -> bool {
        matches!(
            self,
            HierarchyPropagation::Overrides | HierarchyPropagation::Both
        )
    }

    fn include_overridden(self) -> bool {
        matches!(
            self,
            HierarchyPropagation::Overridden | HierarchyPropagation::Both
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChangeSignature {
    pub target: ElementHandle,
    pub new_name: Option<String>,
    pub parameters: Vec<ParameterInfo>,
    pub new_return_type: Option<String>,
    pub new_visibility: Option<AccessLevel>,
    /// Keep the old signature as a delegating wrapper.
    #[serde(default)]
    pub delegate: bool,
    #[serde(default)]
    pub propagate: HierarchyPropagation,
}

impl ChangeSignature {
    fn target_key(&self) -> Option<MethodKey> {
        self.target.method_key()
    }

    pub(crate) fn precheck(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        if !matches!(
            self.target.kind,
            ElementKind::Method | ElementKind::Constructor
        ) {
            problems.push_fatal("change signature targets a method or constructor");
            return problems;
        }
        if self.target.resolve(index).is_none() {
            problems.push_fatal(format!(
                "cannot resolve `{}`: the element no longer exists",
                self.target.name
            ));
        }
        problems
    }

    pub(crate) fn fast_check(&self, index: &Index) -> Problems {
        let Some(key) = self.target_key() else {
            return Problems::fatal("change signature target has no signature");
        };
        signature::fast_check(index, &key, self.new_name.as_deref(), &self.parameters)
    }

    pub(crate) fn full_check(&self, index: &Index) -> Problems {
        let Some(key) = self.target_key() else {
            return Problems::fatal("change signature target has no signature");
        };
        let mut problems = signature::full_check(
            index,
            &key,
            self.new_name.as_deref(),
            &self.parameters,
            self.new_visibility,
        );

        // Removed parameters that are still referenced in any affected body
        // would leave dangling identifiers behind.
        let cancel = CancelToken::new();
        if let Ok(family) = self.affected_family(index, &cancel) {
            for member in &family {
                problems.merge(self.check_removed_param_usage(index, member));
            }
        }
        problems
    }

    fn check_removed_param_usage(&self, index: &Index, key: &MethodKey) -> Problems {
        let mut problems = Problems::new();
        let Some(sym) = signature::lookup_executable(index, key) else {
            return problems;
        };
        let Some(resolver) = Resolver::new(index, &sym.file) else {
            return problems;
        };
        let original_names = declared_param_names(&resolver, key);
        // The parameter's own declaration inside the header is not a use.
        let header = index
            .file_text(&sym.file)
            .and_then(|text| paren_span_after(text, sym.name_range.end));

        for (idx, name) in original_names.iter().enumerate() {
            let retained = self
                .parameters
                .iter()
                .any(|p| p.original_index == Some(idx));
            if retained {
                continue;
            }
            let still_used = index
                .find_name_candidates_in_file(&sym.file, name)
                .into_iter()
                .filter(|c| matches!(c.kind, CandidateKind::Plain | CandidateKind::Call))
                .filter(|c| sym.decl_range.contains(c.range.start))
                .filter(|c| !header.map_or(false, |span| span.contains_span(c.range)))
                .any(|c| {
                    matches!(
                        resolver.resolve_identifier(c.range.start, name),
                        Some(Element::Param { ref owner, index, .. })
                            if owner == key && index == idx
                    )
                });
            if still_used {
                problems.push_fatal(format!(
                    "removed parameter `{name}` is still used in `{}.{}`",
                    key.class, key.name
                ));
            }
        }
        problems
    }

    /// The override family this change rewrites, per the propagation mode.
    pub(crate) fn affected_family(
        &self,
        index: &Index,
        cancel: &CancelToken,
    ) -> Result<Vec<MethodKey>, Cancelled> {
        let Some(target) = self.target_key() else {
            return Ok(Vec::new());
        };
        let mut family = vec![target.clone()];

        if self.target.kind == ElementKind::Method {
            if self.propagate.include_overridden() {
                let chain = index.superclass_chain(&target.class);
                for class in chain.iter().skip(1) {
                    cancel.check()?;
                    for sym in index.method_overloads(class, &target.name) {
                        if sym.params_match(&target.params) {
                            family.push(MethodKey::new(
                                class,
                                &target.name,
                                sym.param_types.as_deref().unwrap_or_default(),
                            ));
                        }
                    }
                }
            }
            if self.propagate.include_overrides() {
                for sub in index.all_subtypes(&target.class, cancel)? {
                    cancel.check()?;
                    for sym in index.method_overloads(&sub, &target.name) {
                        if sym.params_match(&target.params) {
                            family.push(MethodKey::new(
                                &sub,
                                &target.name,
                                sym.param_types.as_deref().unwrap_or_default(),
                            ));
                        }
                    }
                }
            }
        }

        family.dedup();
        Ok(family)
    }

    pub(crate) fn usage_set(
        &self,
        index: &Index,
        cancel: &CancelToken,
    ) -> Result<UsageSet, Cancelled> {
        let flags = SearchFlags {
            find_usages: true,
            find_overriding: self.propagate.include_overrides(),
            transitive_subclasses: true,
            ..SearchFlags::default()
        };
        let mut set = usages::find_usages(index, &self.target, flags, cancel)?;
        // Declarations of the whole family (including superclass methods)
        // must be visited even when nothing references them.
        let family = self.affected_family(index, cancel)?;
        for key in &family {
            if let Some(sym) = signature::lookup_executable(index, key) {
                set.files.insert(sym.file.clone());
            }
        }
        set.related.method_family = family;
        Ok(set)
    }

    pub(crate) fn rewrite_file(
        &self,
        index: &Index,
        file: &FileId,
        family: &[MethodKey],
        rewriter: &mut UnitRewriter,
    ) {
        let Some(resolver) = Resolver::new(index, file) else {
            tracing::debug!(%file, "skipping unparseable file");
            return;
        };
        let Some(text) = index.file_text(file) else {
            return;
        };

        let mut sites = CallSiteCollector {
            resolver: &resolver,
            family,
            calls: Vec::new(),
            news: Vec::new(),
            method_refs: Vec::new(),
            local_var_inits: Vec::new(),
        };
        visit::walk_unit(resolver.unit(), &mut sites);
        let calls = sites.calls;
        let news = sites.news;
        let method_refs = sites.method_refs;
        let local_var_inits = sites.local_var_inits;

        // The spans the call-site pass will replace; body parameter
        // renames inside them are folded into the rebuilt call text
        // instead of being registered as separate (overlapping) edits.
        let call_spans: Vec<Span> = calls
            .iter()
            .map(|(call_span, name_span, _)| {
                Span::new(
                    name_span.map_or(call_span.start, |span| span.start),
                    call_span.end,
                )
            })
            .collect();

        for key in family {
            let declared_here = index.executables_of(&key.class).into_iter().any(|sym| {
                &sym.file == file && sym.name == key.name && sym.params_match(&key.params)
            });
            if declared_here {
                self.rewrite_declaration(index, &resolver, text, key, &call_spans, rewriter);
            }
        }

        for (call_span, name_span, call) in &calls {
            // Nested family calls are rewritten textually inside the
            // outermost edit; skip any call contained in another match.
            let nested_in_other = calls
                .iter()
                .any(|(other, _, _)| other != call_span && other.contains_span(*call_span));
            if nested_in_other {
                continue;
            }
            let replacement = self.rewrite_call_text(&resolver, text, call, family);
            let start = name_span.map_or(call_span.start, |span| span.start);
            rewriter.replace(Span::new(start, call_span.end), replacement);
        }

        // Constructor call sites are syntactically `new Type(args)`.
        for (ty_end, new_expr) in &news {
            let Some(paren) = paren_span_after(text, *ty_end) else {
                continue;
            };
            let args = self.rewrite_arg_list(
                &resolver,
                text,
                &new_expr.args,
                new_expr.range.start,
                family,
            );
            rewriter.replace(paren, format!("({})", args.join(", ")));
        }

        if let Some(new_name) = self.new_name.as_deref() {
            for name_span in method_refs {
                rewriter.replace(name_span, new_name.to_string());
            }
        }

        // Return-type compatibility at assigning call sites.
        if let Some(new_return) = self.new_return_type.as_deref() {
            for (declared_ty, call_span) in &local_var_inits {
                if !signature::is_assignable(index, new_return, declared_ty) {
                    rewriter.problems_mut().push_warning(format!(
                        "call at {}..{} in {} assigns the new return type `{new_return}` to `{declared_ty}`",
                        call_span.start, call_span.end, file
                    ));
                }
            }
        }
    }

    fn rewrite_declaration(
        &self,
        index: &Index,
        resolver: &Resolver<'_>,
        text: &str,
        key: &MethodKey,
        call_spans: &[Span],
        rewriter: &mut UnitRewriter,
    ) {
        let unit = resolver.unit();
        let (name_range, params, modifiers, decl_range, return_ty): (
            Span,
            Vec<(String, String, Span)>,
            Modifiers,
            Span,
            Option<arbor_syntax::ast::TypeRef>,
        ) = if key.is_constructor() {
            let Some(ctor) = find_constructor_decl(unit, key) else {
                return;
            };
            (
                ctor.name_range,
                ctor.params
                    .iter()
                    .map(|p| (p.ty.text.clone(), p.name.clone(), p.name_range))
                    .collect(),
                ctor.modifiers.clone(),
                ctor.range,
                None,
            )
        } else {
            let Some(method) = find_method_decl(unit, key) else {
                return;
            };
            (
                method.name_range,
                method
                    .params
                    .iter()
                    .map(|p| (p.ty.text.clone(), p.name.clone(), p.name_range))
                    .collect(),
                method.modifiers.clone(),
                method.range,
                Some(method.return_ty.clone()),
            )
        };

        // Method name.
        if let Some(new_name) = self.new_name.as_deref() {
            if !key.is_constructor() && new_name != key.name {
                rewriter.replace(name_range, new_name.to_string());
            }
        }

        // Return type, only when it textually differs.
        if let (Some(new_return), Some(return_ty)) = (self.new_return_type.as_deref(), &return_ty)
        {
            if normalize_type_text(new_return) != normalize_type_text(&return_ty.text) {
                rewriter.replace(return_ty.range, new_return.to_string());
                rewriter.require_type(simple_type_name(new_return));
            }
        }

        // Visibility.
        if let Some(new_vis) = self.new_visibility {
            if new_vis.to_visibility() != modifiers.visibility {
                let rebuilt = modifiers_text(&modifiers, new_vis.to_visibility());
                if modifiers.range.is_empty() {
                    if !rebuilt.is_empty() {
                        rewriter.insert(modifiers.range.start, format!("{rebuilt} "));
                    }
                } else {
                    rewriter.replace(modifiers.range, rebuilt);
                }
            }
        }

        // Parameter list, rebuilt from the descriptors. Original declared
        // type text is reused when it matches the descriptor's type, so an
        // unchanged parameter causes no import churn.
        let paren = paren_span_after(text, name_range.end);
        if let Some(paren) = paren {
            let mut rendered = Vec::new();
            for descriptor in &self.parameters {
                let ty_text = match descriptor.original_index {
                    Some(idx) => match params.get(idx) {
                        Some((original_ty, _, _))
                            if normalize_type_text(original_ty)
                                == normalize_type_text(&descriptor.ty) =>
                        {
                            original_ty.clone()
                        }
                        _ => {
                            rewriter.require_type(simple_type_name(&descriptor.ty));
                            descriptor.ty.clone()
                        }
                    },
                    None => {
                        rewriter.require_type(simple_type_name(&descriptor.ty));
                        descriptor.ty.clone()
                    }
                };
                rendered.push(format!("{} {}", ty_text.trim(), descriptor.name));
            }
            rewriter.replace(paren, format!("({})", rendered.join(", ")));
        }

        // Rename retained parameters inside the body.
        for descriptor in &self.parameters {
            let Some(idx) = descriptor.original_index else {
                continue;
            };
            let Some((_, old_name, _)) = params.get(idx) else {
                continue;
            };
            if *old_name == descriptor.name {
                continue;
            }
            for candidate in index.find_name_candidates_in_file(resolver.file(), old_name) {
                if !decl_range.contains(candidate.range.start) {
                    continue;
                }
                if !matches!(candidate.kind, CandidateKind::Plain | CandidateKind::Call) {
                    continue;
                }
                // Occurrences inside a rewritten call site are handled by
                // the call-text builder; the declaration list is replaced
                // wholesale.
                if call_spans.iter().any(|span| span.contains_span(candidate.range)) {
                    continue;
                }
                if paren.map_or(false, |p| p.overlaps(candidate.range)) {
                    continue;
                }
                let matches = matches!(
                    resolver.resolve_identifier(candidate.range.start, old_name),
                    Some(Element::Param { ref owner, index, .. })
                        if owner == key && index == idx
                );
                if matches {
                    rewriter.replace(candidate.range, descriptor.name.clone());
                }
            }
        }

        // Delegation: keep the old signature as a thin wrapper on the
        // target declaration.
        if self.delegate && Some(key) == self.target_key().as_ref() {
            let indent = indentation_at(text, decl_range.start);
            let delegate = self.delegate_text(&params, &modifiers, return_ty.as_ref(), key);
            rewriter.insert(decl_range.end, format!("\n\n{indent}{delegate}"));
        }
    }

    fn delegate_text(
        &self,
        old_params: &[(String, String, Span)],
        modifiers: &Modifiers,
        return_ty: Option<&arbor_syntax::ast::TypeRef>,
        key: &MethodKey,
    ) -> String {
        let mods = modifiers_text(modifiers, modifiers.visibility);
        let mods = if mods.is_empty() {
            String::new()
        } else {
            format!("{mods} ")
        };
        let ret = return_ty.map(|t| t.text.as_str()).unwrap_or("void");
        let params = old_params
            .iter()
            .map(|(ty, name, _)| format!("{ty} {name}"))
            .collect::<Vec<_>>()
            .join(", ");

        let new_name = self.new_name.as_deref().unwrap_or(&key.name);
        let args = self
            .parameters
            .iter()
            .map(|descriptor| match descriptor.original_index {
                Some(idx) => old_params
                    .get(idx)
                    .map(|(_, name, _)| name.clone())
                    .unwrap_or_default(),
                None => descriptor.default_value.clone().unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join(", ");

        let forward = format!("{new_name}({args});");
        let body = if ret == "void" {
            forward
        } else {
            format!("return {forward}")
        };
        format!("{mods}{ret} {}({params}) {{ {body} }}", key.name)
    }

    /// Build the rewritten text of a matched call, recursively rewriting
    /// nested family calls inside carried-over arguments.
    fn rewrite_call_text(
        &self,
        resolver: &Resolver<'_>,
        text: &str,
        call: &arbor_syntax::ast::CallExpr,
        family: &[MethodKey],
    ) -> String {
        // Pass-through: the call site lives inside another member of the
        // refactored family, whose own declaration is gaining the new
        // parameters — thread them instead of defaulting.
        let enclosing_key = resolver
            .enclosing_executable(call.range.start)
            .map(|(class, exec)| exec.key(&class))
            .filter(|key| family.contains(key));
        let enclosing_in_family = enclosing_key.is_some();

        // Parameter renames of the enclosing family declaration apply to
        // carried argument text here, not as separate overlapping edits.
        let rename_map: HashMap<String, String> = enclosing_key
            .map(|key| {
                let old_names = self.indexed_param_names(resolver, &key);
                self.parameters
                    .iter()
                    .filter_map(|descriptor| {
                        let idx = descriptor.original_index?;
                        let old = old_names.get(idx)?;
                        (*old != descriptor.name)
                            .then(|| (old.clone(), descriptor.name.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let old_param_names = resolver
            .resolve_call(call, call.range.start)
            .map(|key| {
                let resolver_file_unit = resolver.unit();
                if key.is_constructor() {
                    find_constructor_decl(resolver_file_unit, &key)
                        .map(|c| c.params.iter().map(|p| p.name.clone()).collect::<Vec<_>>())
                        .unwrap_or_else(|| self.indexed_param_names(resolver, &key))
                } else {
                    find_method_decl(resolver_file_unit, &key)
                        .map(|m| m.params.iter().map(|p| p.name.clone()).collect::<Vec<_>>())
                        .unwrap_or_else(|| self.indexed_param_names(resolver, &key))
                }
            })
            .unwrap_or_default();

        let new_args = self.build_args(
            resolver,
            text,
            &call.args,
            &old_param_names,
            enclosing_in_family,
            &rename_map,
            family,
        );

        let callee_text = match call.callee.as_ref() {
            Expr::This(_) => "this".to_string(),
            Expr::Super(_) => "super".to_string(),
            _ => self
                .new_name
                .clone()
                .unwrap_or_else(|| self.target.name.clone()),
        };
        format!("{callee_text}({})", new_args.join(", "))
    }

    /// The re-threaded argument list for one call-shaped site.
    fn build_args(
        &self,
        resolver: &Resolver<'_>,
        text: &str,
        args: &[Expr],
        old_param_names: &[String],
        enclosing_in_family: bool,
        rename_map: &HashMap<String, String>,
        family: &[MethodKey],
    ) -> Vec<String> {
        let carried = |arg: &Expr| -> String {
            let rewritten = self.expr_text_with_rewrites(resolver, text, arg, family);
            substitute_idents(&rewritten, rename_map)
        };

        let mut new_args: Vec<String> = Vec::new();
        let last = self.parameters.len().saturating_sub(1);
        for (pos, descriptor) in self.parameters.iter().enumerate() {
            match descriptor.original_index {
                Some(idx) => {
                    if pos == last && descriptor.is_vararg() {
                        // The trailing vararg slot carries every remaining
                        // original argument verbatim.
                        for arg in args.iter().skip(idx) {
                            new_args.push(carried(arg));
                        }
                    } else if let Some(arg) = args.get(idx) {
                        new_args.push(carried(arg));
                    }
                }
                None => {
                    if enclosing_in_family {
                        new_args.push(descriptor.name.clone());
                    } else {
                        let default = descriptor.default_value.clone().unwrap_or_default();
                        let mut mapping: HashMap<String, String> = HashMap::new();
                        for (idx, name) in old_param_names.iter().enumerate() {
                            if let Some(arg) = args.get(idx) {
                                mapping.insert(name.clone(), carried(arg));
                            }
                        }
                        new_args.push(substitute_idents(&default, &mapping));
                    }
                }
            }
        }
        new_args
    }

    fn rewrite_arg_list(
        &self,
        resolver: &Resolver<'_>,
        text: &str,
        args: &[Expr],
        site_offset: usize,
        family: &[MethodKey],
    ) -> Vec<String> {
        let enclosing_key = resolver
            .enclosing_executable(site_offset)
            .map(|(class, exec)| exec.key(&class))
            .filter(|key| family.contains(key));
        let enclosing_in_family = enclosing_key.is_some();
        let rename_map: HashMap<String, String> = enclosing_key
            .map(|key| {
                let old_names = self.indexed_param_names(resolver, &key);
                self.parameters
                    .iter()
                    .filter_map(|descriptor| {
                        let idx = descriptor.original_index?;
                        let old = old_names.get(idx)?;
                        (*old != descriptor.name)
                            .then(|| (old.clone(), descriptor.name.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let old_param_names = self
            .target_key()
            .map(|key| self.indexed_param_names(resolver, &key))
            .unwrap_or_default();
        self.build_args(
            resolver,
            text,
            args,
            &old_param_names,
            enclosing_in_family,
            &rename_map,
            family,
        )
    }

    fn indexed_param_names(&self, resolver: &Resolver<'_>, key: &MethodKey) -> Vec<String> {
        // Declaration in another file: recover names from its own parse.
        let index = resolver.index();
        let Some(sym) = signature::lookup_executable(index, key) else {
            return Vec::new();
        };
        let Some(parse) = index.file_parse(&sym.file) else {
            return Vec::new();
        };
        if key.is_constructor() {
            find_constructor_decl(parse.compilation_unit(), key)
                .map(|c| c.params.iter().map(|p| p.name.clone()).collect())
                .unwrap_or_default()
        } else {
            find_method_decl(parse.compilation_unit(), key)
                .map(|m| m.params.iter().map(|p| p.name.clone()).collect())
                .unwrap_or_default()
        }
    }

    fn expr_text_with_rewrites(
        &self,
        resolver: &Resolver<'_>,
        text: &str,
        expr: &Expr,
        family: &[MethodKey],
    ) -> String {
        let span = expr.range();
        let mut nested = NestedCallFinder {
            resolver,
            family,
            out: Vec::new(),
        };
        visit::walk_expr(expr, &mut nested);

        let mut replacements: Vec<(Span, String)> = Vec::new();
        for call_span in nested.out {
            if call_span == span {
                continue;
            }
            if let Some(call) = find_call_expr(expr, call_span) {
                let rewritten = self.rewrite_call_text(resolver, text, call, family);
                let start = call
                    .name_and_receiver()
                    .map_or(call_span.start, |(_, name_span, _)| name_span.start);
                replacements.push((Span::new(start, call_span.end), rewritten));
            }
        }

        if replacements.is_empty() {
            return span.slice(text).trim().to_string();
        }
        // Keep outermost matches only, applied right to left.
        replacements.sort_by_key(|(span, _)| span.start);
        let mut kept: Vec<(Span, String)> = Vec::new();
        for (span, rewritten) in replacements {
            if kept.iter().any(|(prev, _)| prev.contains_span(span)) {
                continue;
            }
            kept.push((span, rewritten));
        }
        let mut out = span.slice(text).to_string();
        for (nested_span, rewritten) in kept.iter().rev() {
            let rel_start = nested_span.start - span.start;
            let rel_end = nested_span.end - span.start;
            out.replace_range(rel_start..rel_end, rewritten);
        }
        out.trim().to_string()
    }
}

struct CallSiteCollector<'a, 'r> {
    resolver: &'r Resolver<'a>,
    family: &'r [MethodKey],
    /// (call span, callee name span, the call node).
    calls: Vec<(Span, Option<Span>, arbor_syntax::ast::CallExpr)>,
    /// (type-ref end offset, the `new` node) for constructor targets.
    news: Vec<(usize, arbor_syntax::ast::NewExpr)>,
    method_refs: Vec<Span>,
    /// (declared type, call span) for `Type v = call(...);` sites.
    local_var_inits: Vec<(String, Span)>,
}

impl Visitor for CallSiteCollector<'_, '_> {
    fn visit_stmt(&mut self, stmt: &Stmt) -> bool {
        if let Stmt::LocalVar(local) = stmt {
            if let Some(Expr::Call(call)) = local.initializer.as_ref().map(Expr::unwrap_parens) {
                if self.call_in_family(call) {
                    self.local_var_inits
                        .push((local.ty.text.clone(), call.range));
                }
            }
        }
        true
    }

    fn visit_expr(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::Call(call) => {
                if self.call_in_family(call) {
                    let name_span = call.name_and_receiver().map(|(_, span, _)| span);
                    self.calls.push((call.range, name_span, call.clone()));
                }
            }
            Expr::New(new_expr) => {
                let class = new_expr.ty.simple_name();
                let matches = self
                    .resolver
                    .resolve_constructor(class, new_expr.args.len())
                    .map_or(false, |key| self.family.contains(&key));
                if matches {
                    self.news.push((new_expr.ty.range.end, new_expr.clone()));
                }
            }
            Expr::MethodRef(mref) => {
                if mref.name == self.resolver_target_name() {
                    let inference = TypeInference::new(self.resolver);
                    if let Some(receiver_ty) =
                        inference.infer(mref.receiver.as_ref(), mref.range.start)
                    {
                        let class = simple_type_name(&receiver_ty);
                        if self.family.iter().any(|key| key.class == class) {
                            self.method_refs.push(mref.name_range);
                        }
                    }
                }
            }
            _ => {}
        }
        true
    }
}

impl CallSiteCollector<'_, '_> {
    fn resolver_target_name(&self) -> &str {
        self.family.first().map_or("", |key| key.name.as_str())
    }

    fn call_in_family(&self, call: &arbor_syntax::ast::CallExpr) -> bool {
        match self.resolver.resolve_call(call, call.range.start) {
            Some(key) => self.family.contains(&key),
            None => false,
        }
    }
}

struct NestedCallFinder<'a, 'r> {
    resolver: &'r Resolver<'a>,
    family: &'r [MethodKey],
    out: Vec<Span>,
}

impl Visitor for NestedCallFinder<'_, '_> {
    fn visit_expr(&mut self, expr: &Expr) -> bool {
        if let Expr::Call(call) = expr {
            if let Some(key) = self.resolver.resolve_call(call, call.range.start) {
                if self.family.contains(&key) {
                    self.out.push(call.range);
                }
            }
        }
        true
    }
}

fn find_call_expr(root: &Expr, span: Span) -> Option<&arbor_syntax::ast::CallExpr> {
    struct Finder<'e> {
        span: Span,
        found: Option<&'e arbor_syntax::ast::CallExpr>,
    }
    // A borrowing visitor cannot return references through the dyn-based
    // walker; do a direct recursive search instead.
    fn search<'e>(expr: &'e Expr, finder: &mut Finder<'e>) {
        if finder.found.is_some() {
            return;
        }
        if let Expr::Call(call) = expr {
            if call.range == finder.span {
                finder.found = Some(call);
                return;
            }
        }
        match expr {
            Expr::FieldAccess(access) => search(&access.receiver, finder),
            Expr::ArrayAccess(access) => {
                search(&access.array, finder);
                search(&access.index, finder);
            }
            Expr::Call(call) => {
                search(&call.callee, finder);
                for arg in &call.args {
                    search(arg, finder);
                }
            }
            Expr::New(new_expr) => {
                for arg in &new_expr.args {
                    search(arg, finder);
                }
            }
            Expr::NewArray(new_array) => {
                for dim in &new_array.dims {
                    search(dim, finder);
                }
            }
            Expr::Cast(cast) => search(&cast.expr, finder),
            Expr::Instanceof(inst) => search(&inst.expr, finder),
            Expr::Unary(unary) => search(&unary.expr, finder),
            Expr::Postfix(postfix) => search(&postfix.expr, finder),
            Expr::Binary(bin) => {
                search(&bin.lhs, finder);
                search(&bin.rhs, finder);
            }
            Expr::Assign(assign) => {
                search(&assign.lhs, finder);
                search(&assign.rhs, finder);
            }
            Expr::Conditional(cond) => {
                search(&cond.condition, finder);
                search(&cond.then_expr, finder);
                search(&cond.else_expr, finder);
            }
            Expr::Paren(paren) => search(&paren.inner, finder),
            Expr::MethodRef(mref) => search(&mref.receiver, finder),
            Expr::Name(_)
            | Expr::Literal(_)
            | Expr::This(_)
            | Expr::Super(_)
            | Expr::Missing(_) => {}
        }
    }

    let mut finder = Finder { span, found: None };
    search(root, &mut finder);
    finder.found
}

fn declared_param_names(resolver: &Resolver<'_>, key: &MethodKey) -> Vec<String> {
    let unit = resolver.unit();
    if key.is_constructor() {
        find_constructor_decl(unit, key)
            .map(|c| c.params.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    } else {
        find_method_decl(unit, key)
            .map(|m| m.params.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }
}

/// Span of the `(`...`)` parameter/argument list starting at or after
/// `offset`, string-literal aware.
fn paren_span_after(text: &str, mut offset: usize) -> Option<Span> {
    let bytes = text.as_bytes();
    while offset < bytes.len() && bytes[offset].is_ascii_whitespace() {
        offset += 1;
    }
    if bytes.get(offset) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = offset;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(Span::new(offset, i + 1));
                }
            }
            b'"' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == b'"' {
                        break;
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Replace whole-identifier occurrences per `mapping`.
fn substitute_idents(text: &str, mapping: &HashMap<String, String>) -> String {
    if mapping.is_empty() || text.is_empty() {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if arbor_core::is_ident_char_byte(bytes[i]) {
            let start = i;
            i += 1;
            while i < bytes.len() && arbor_core::is_ident_char_byte(bytes[i]) {
                i += 1;
            }
            out.push_str(&text[last..start]);
            let ident = &text[start..i];
            match mapping.get(ident) {
                Some(replacement) => out.push_str(replacement),
                None => out.push_str(ident),
            }
            last = i;
            continue;
        }
        i += 1;
    }
    out.push_str(&text[last..]);
    out
}
