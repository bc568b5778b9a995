//! Encapsulate Field.
//!
//! Replaces direct field access with generated accessor calls. Whether a
//! visiting class must use accessors is derived per class from the field's
//! target accessibility and maintained on an explicit context stack pushed
//! and popped around each class scope, so nested classes with different
//! relationships to the field get independent decisions.

use arbor_core::{indentation_at, FileId, Span};
use arbor_index::Index;
use arbor_resolve::{find_field_decl, simple_type_name, Resolver, TypeInference};
use arbor_syntax::ast::{
    BinaryOp, Expr, MemberDecl, PostfixOp, Stmt, TypeDecl, UnaryOp, Visibility,
};
use arbor_syntax::visit::{self, Visitor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::commit::UnitRewriter;
use crate::handle::{ElementHandle, ElementKind};
use crate::problem::Problems;
use crate::signature::AccessLevel;
use crate::usages::SearchFlags;
use crate::util::modifiers_text;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncapsulateField {
    pub target: ElementHandle,
    pub getter_name: Option<String>,
    pub setter_name: Option<String>,
    /// Target accessibility of the field itself after encapsulation.
    pub field_visibility: AccessLevel,
    pub accessor_visibility: AccessLevel,
    /// Rewrite accesses even where the field stays directly reachable.
    #[serde(default)]
    pub always_use_accessors: bool,
    #[serde(default)]
    pub generate_javadoc: bool,
    /// Wire the setter through bean `PropertyChangeSupport`.
    #[serde(default)]
    pub property_change_support: bool,
}

impl EncapsulateField {
    pub(crate) fn search_flags(&self) -> SearchFlags {
        SearchFlags {
            find_usages: true,
            ..SearchFlags::default()
        }
    }

    pub(crate) fn precheck(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        if self.target.kind != ElementKind::Field {
            problems.push_fatal("encapsulate field targets a field");
            return problems;
        }
        match self.target.resolve(index) {
            None => {
                problems.push_fatal(format!(
                    "cannot resolve field `{}`: the element no longer exists",
                    self.target.name
                ));
            }
            Some(sym) => {
                if index
                    .file_origin(&sym.file)
                    .map_or(false, |origin| origin.is_dependency())
                {
                    problems.push_fatal("cannot encapsulate a field of a library class");
                }
            }
        }
        problems
    }

    pub(crate) fn fast_check(&self) -> Problems {
        let mut problems = Problems::new();
        let getter_ok = self
            .getter_name
            .as_deref()
            .map_or(true, arbor_core::is_valid_java_identifier);
        let setter_ok = self
            .setter_name
            .as_deref()
            .map_or(true, arbor_core::is_valid_java_identifier);
        if !getter_ok
            || !setter_ok
            || (self.getter_name.is_none() && self.setter_name.is_none())
        {
            problems.push_fatal("getter and setter names must be valid Java identifiers");
        }
        problems
    }

    pub(crate) fn full_check(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        let Some(field) = self.target.resolve(index) else {
            return problems;
        };
        let field_ty = field.type_text.clone().unwrap_or_default();
        let class = self.target.enclosing_type.as_deref().unwrap_or_default();

        if let Some(getter) = self.existing_getter(index) {
            if getter.type_text.as_deref() != Some(field_ty.as_str()) {
                problems.push_warning(format!(
                    "existing method `{}` returns `{}`, not the field type `{field_ty}`",
                    getter.name,
                    getter.type_text.as_deref().unwrap_or("?")
                ));
            }
        }
        if let Some(setter) = self.existing_setter(index) {
            if setter.type_text.as_deref() != Some("void") {
                problems.push_warning(format!(
                    "existing method `{}` in `{class}` does not return void",
                    setter.name
                ));
            }
        }
        problems
    }

    fn existing_getter<'a>(&self, index: &'a Index) -> Option<&'a arbor_index::Symbol> {
        let class = self.target.enclosing_type.as_deref()?;
        let name = self.getter_name.as_deref()?;
        index
            .method_overloads(class, name)
            .into_iter()
            .find(|sym| sym.params_match(&[]))
    }

    fn existing_setter<'a>(&self, index: &'a Index) -> Option<&'a arbor_index::Symbol> {
        let class = self.target.enclosing_type.as_deref()?;
        let name = self.setter_name.as_deref()?;
        let field_ty = self.target.resolve(index)?.type_text.clone()?;
        index
            .method_overloads(class, name)
            .into_iter()
            .find(|sym| sym.params_match(&[field_ty.clone()]))
    }

    pub(crate) fn rewrite_file(
        &self,
        index: &Index,
        file: &FileId,
        rewriter: &mut UnitRewriter,
    ) {
        let Some(resolver) = Resolver::new(index, file) else {
            tracing::debug!(%file, "skipping unparseable file");
            return;
        };
        let Some(text) = index.file_text(file) else {
            return;
        };
        let Some(field_sym) = self.target.resolve(index) else {
            return;
        };
        let declaring_class = self.target.enclosing_type.clone().unwrap_or_default();

        if &field_sym.file == file {
            self.rewrite_declaration(index, &resolver, text, rewriter);
        }

        let mut visitor = AccessRewriter {
            refactoring: self,
            index,
            resolver: &resolver,
            text,
            rewriter,
            declaring_class: &declaring_class,
            class_stack: Vec::new(),
            skip_depth: 0,
            consumed: Vec::new(),
        };
        visit::walk_unit(resolver.unit(), &mut visitor);
    }

    fn rewrite_declaration(
        &self,
        index: &Index,
        resolver: &Resolver<'_>,
        text: &str,
        rewriter: &mut UnitRewriter,
    ) {
        let class = self.target.enclosing_type.as_deref().unwrap_or_default();
        let Some(field) = find_field_decl(resolver.unit(), class, &self.target.name) else {
            return;
        };

        let target_vis = self.field_visibility.to_visibility();
        if field.modifiers.visibility != target_vis {
            let rebuilt = modifiers_text(&field.modifiers, target_vis);
            if field.modifiers.range.is_empty() {
                if !rebuilt.is_empty() {
                    rewriter.insert(field.modifiers.range.start, format!("{rebuilt} "));
                }
            } else {
                rewriter.replace(field.modifiers.range, rebuilt);
            }
        }

        let indent = indentation_at(text, field.range.start);
        let mut generated = String::new();
        if self.getter_name.is_some() && self.existing_getter(index).is_none() {
            generated.push_str(&self.getter_text(field, &indent));
        }
        if self.setter_name.is_some() && self.existing_setter(index).is_none() {
            generated.push_str(&self.setter_text(field, &indent));
        }
        if !generated.is_empty() {
            rewriter.insert(field.range.end, generated);
        }
    }

    fn getter_text(&self, field: &arbor_syntax::ast::FieldDecl, indent: &str) -> String {
        let name = self.getter_name.as_deref().unwrap_or_default();
        let ty = &field.ty.text;
        let field_name = &field.name;
        let vis = access_prefix(self.accessor_visibility);
        let stat = if field.modifiers.is_static { "static " } else { "" };

        let mut out = String::from("\n\n");
        if self.generate_javadoc {
            out.push_str(&format!(
                "{indent}/**\n{indent} * @return the {field_name}\n{indent} */\n"
            ));
        }
        out.push_str(&format!(
            "{indent}{vis}{stat}{ty} {name}() {{\n{indent}    return {field_name};\n{indent}}}"
        ));
        out
    }

    fn setter_text(&self, field: &arbor_syntax::ast::FieldDecl, indent: &str) -> String {
        let name = self.setter_name.as_deref().unwrap_or_default();
        let ty = &field.ty.text;
        let field_name = &field.name;
        let vis = access_prefix(self.accessor_visibility);
        let stat = if field.modifiers.is_static { "static " } else { "" };
        let this = if field.modifiers.is_static {
            field
                .name
                .clone()
        } else {
            format!("this.{field_name}")
        };

        let mut out = String::from("\n\n");
        if self.generate_javadoc {
            out.push_str(&format!(
                "{indent}/**\n{indent} * @param {field_name} the {field_name} to set\n{indent} */\n"
            ));
        }
        out.push_str(&format!("{indent}{vis}{stat}void {name}({ty} {field_name}) {{\n"));
        if self.property_change_support && !field.modifiers.is_static {
            let cap = capitalize(field_name);
            out.push_str(&format!(
                "{indent}    {ty} old{cap} = this.{field_name};\n"
            ));
            out.push_str(&format!("{indent}    {this} = {field_name};\n"));
            out.push_str(&format!(
                "{indent}    propertyChangeSupport.firePropertyChange(\"{field_name}\", old{cap}, {field_name});\n"
            ));
        } else if field.modifiers.is_static {
            out.push_str(&format!(
                "{indent}    {}.{field_name} = {field_name};\n",
                self.target.enclosing_type.as_deref().unwrap_or_default()
            ));
        } else {
            out.push_str(&format!("{indent}    {this} = {field_name};\n"));
        }
        out.push_str(&format!("{indent}}}"));
        out
    }

    /// Whether references from `class` must go through accessors, given
    /// the field's target accessibility.
    fn class_needs_accessors(&self, index: &Index, class: &str, declaring: &str) -> bool {
        if self.always_use_accessors {
            return true;
        }
        match self.field_visibility.to_visibility() {
            Visibility::Public => false,
            Visibility::Private => {
                top_level_of(index, class) != top_level_of(index, declaring)
            }
            Visibility::Protected => {
                !index.is_subtype_of(class, declaring)
                    && package_of(index, class) != package_of(index, declaring)
            }
            Visibility::PackagePrivate => {
                package_of(index, class) != package_of(index, declaring)
            }
        }
    }
}

fn access_prefix(level: AccessLevel) -> String {
    let keyword = level.keyword();
    if keyword.is_empty() {
        String::new()
    } else {
        format!("{keyword} ")
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn top_level_of(index: &Index, class: &str) -> String {
    let mut current = class.to_string();
    loop {
        match index
            .find_type(&current)
            .and_then(|sym| sym.container.clone())
        {
            Some(container) => current = container,
            None => return current,
        }
    }
}

fn package_of<'a>(index: &'a Index, class: &str) -> Option<&'a str> {
    let top = top_level_of(index, class);
    index.package_of_type(&top)
}

struct AccessRewriter<'a, 'r> {
    refactoring: &'r EncapsulateField,
    index: &'a Index,
    resolver: &'r Resolver<'a>,
    text: &'a str,
    rewriter: &'r mut UnitRewriter,
    declaring_class: &'r str,
    /// (class name, use accessors) context stack; pushed on entering a
    /// class scope, popped on leaving it.
    class_stack: Vec<(String, bool)>,
    /// Non-zero inside subtrees whose raw field access must stay
    /// (declaring constructors, the accessors themselves, the field's own
    /// declaration).
    skip_depth: usize,
    /// Spans already rewritten as whole write statements.
    consumed: Vec<Span>,
}

impl AccessRewriter<'_, '_> {
    fn use_accessors(&self) -> bool {
        self.skip_depth == 0 && self.class_stack.last().map_or(false, |(_, f)| *f)
    }

    fn getter(&self) -> Option<&str> {
        self.refactoring.getter_name.as_deref()
    }

    fn setter(&self) -> Option<&str> {
        self.refactoring.setter_name.as_deref()
    }

    /// Resolve whether `expr` denotes the target field; returns the
    /// receiver prefix text (empty for unqualified access).
    fn field_ref(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Name(name) => {
                let element = self
                    .resolver
                    .resolve_identifier(name.range.start, &name.name)?;
                self.refactoring
                    .target
                    .matches(&element)
                    .then(String::new)
            }
            Expr::FieldAccess(access) => {
                if access.name != self.refactoring.target.name {
                    return None;
                }
                let inference = TypeInference::new(self.resolver);
                let receiver_ty = inference.infer(access.receiver.as_ref(), access.range.start)?;
                let class = simple_type_name(&receiver_ty);
                let element = self
                    .resolver
                    .resolve_field_in_hierarchy(&class, &access.name)?;
                if !self.refactoring.target.matches(&element) {
                    return None;
                }
                let receiver_text = access.receiver.range().slice(self.text);
                Some(format!("{receiver_text}."))
            }
            Expr::Paren(paren) => self.field_ref(&paren.inner),
            _ => None,
        }
    }

    /// Rewrite reads of the field inside `expr`, returning the new text.
    fn reads_rewritten(&self, expr: &Expr) -> Option<String> {
        let Some(getter) = self.getter() else {
            return Some(expr.range().slice(self.text).trim().to_string());
        };
        let span = expr.range();
        let mut reads: Vec<(Span, String)> = Vec::new();
        self.collect_reads(expr, &mut reads);

        let mut out = span.slice(self.text).to_string();
        for (read_span, prefix) in reads.iter().rev() {
            let rel_start = read_span.start - span.start;
            let rel_end = read_span.end - span.start;
            out.replace_range(rel_start..rel_end, &format!("{prefix}{getter}()"));
        }
        Some(out.trim().to_string())
    }

    /// Pure read occurrences of the field within `expr`, outermost nodes
    /// only, as `(span, receiver prefix)`.
    fn collect_reads(&self, expr: &Expr, out: &mut Vec<(Span, String)>) {
        if let Some(prefix) = self.field_ref(expr) {
            // Replace the full reference (receiver included) so the
            // prefix is rendered exactly once.
            out.push((expr.range(), prefix));
            return;
        }
        match expr {
            Expr::FieldAccess(access) => self.collect_reads(&access.receiver, out),
            Expr::ArrayAccess(access) => {
                self.collect_reads(&access.array, out);
                self.collect_reads(&access.index, out);
            }
            Expr::Call(call) => {
                self.collect_reads(&call.callee, out);
                for arg in &call.args {
                    self.collect_reads(arg, out);
                }
            }
            Expr::New(new_expr) => {
                for arg in &new_expr.args {
                    self.collect_reads(arg, out);
                }
            }
            Expr::NewArray(new_array) => {
                for dim in &new_array.dims {
                    self.collect_reads(dim, out);
                }
            }
            Expr::Cast(cast) => self.collect_reads(&cast.expr, out),
            Expr::Instanceof(inst) => self.collect_reads(&inst.expr, out),
            Expr::Unary(unary) => self.collect_reads(&unary.expr, out),
            Expr::Postfix(postfix) => self.collect_reads(&postfix.expr, out),
            Expr::Binary(bin) => {
                self.collect_reads(&bin.lhs, out);
                self.collect_reads(&bin.rhs, out);
            }
            Expr::Assign(assign) => {
                self.collect_reads(&assign.lhs, out);
                self.collect_reads(&assign.rhs, out);
            }
            Expr::Conditional(cond) => {
                self.collect_reads(&cond.condition, out);
                self.collect_reads(&cond.then_expr, out);
                self.collect_reads(&cond.else_expr, out);
            }
            Expr::Paren(paren) => self.collect_reads(&paren.inner, out),
            Expr::MethodRef(mref) => self.collect_reads(&mref.receiver, out),
            Expr::Name(_)
            | Expr::Literal(_)
            | Expr::This(_)
            | Expr::Super(_)
            | Expr::Missing(_) => {}
        }
    }

    /// `true` when `expr` contains a write (assignment or inc/dec) whose
    /// target is the field.
    fn contains_field_write(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Assign(assign) => {
                self.field_ref(&assign.lhs).is_some()
                    || self.contains_field_write(&assign.lhs)
                    || self.contains_field_write(&assign.rhs)
            }
            Expr::Unary(unary) => {
                matches!(unary.op, UnaryOp::PreInc | UnaryOp::PreDec)
                    && self.field_ref(&unary.expr).is_some()
                    || self.contains_field_write(&unary.expr)
            }
            Expr::Postfix(postfix) => {
                self.field_ref(&postfix.expr).is_some()
                    || self.contains_field_write(&postfix.expr)
            }
            Expr::Binary(bin) => {
                self.contains_field_write(&bin.lhs) || self.contains_field_write(&bin.rhs)
            }
            Expr::Conditional(cond) => {
                self.contains_field_write(&cond.condition)
                    || self.contains_field_write(&cond.then_expr)
                    || self.contains_field_write(&cond.else_expr)
            }
            Expr::Call(call) => call.args.iter().any(|a| self.contains_field_write(a)),
            Expr::New(new_expr) => new_expr.args.iter().any(|a| self.contains_field_write(a)),
            Expr::Cast(cast) => self.contains_field_write(&cast.expr),
            Expr::Paren(paren) => self.contains_field_write(&paren.inner),
            _ => false,
        }
    }

    /// Rewrite a whole-statement write expression. Returns `true` when the
    /// statement was handled (successfully or by raising a problem).
    fn try_rewrite_write_stmt(&mut self, expr: &Expr, span: Span) -> bool {
        let Some(setter) = self.setter() else {
            return false;
        };

        match expr {
            Expr::Assign(assign) => {
                let Some(prefix) = self.field_ref(&assign.lhs) else {
                    return false;
                };
                if self.contains_field_write(&assign.rhs) {
                    self.rewriter.problems_mut().push_warning(format!(
                        "cannot encapsulate write at {}..{}: the assigned value also writes the field",
                        span.start, span.end
                    ));
                    self.consumed.push(span);
                    return true;
                }
                let rhs = match self.reads_rewritten(&assign.rhs) {
                    Some(rhs) => rhs,
                    None => return false,
                };
                let rhs = self.with_cast_if_needed(&assign.rhs, rhs);
                let replacement = match assign.op {
                    None => format!("{prefix}{setter}({rhs})"),
                    Some(op) => {
                        let getter_call = self.getter_call_text(&prefix);
                        let rhs = parenthesize_for(op, &assign.rhs, rhs);
                        format!("{prefix}{setter}({getter_call} {} {rhs})", op.as_str())
                    }
                };
                self.rewriter.replace(span, replacement);
                self.consumed.push(span);
                true
            }
            Expr::Postfix(postfix) => {
                let Some(prefix) = self.field_ref(&postfix.expr) else {
                    return false;
                };
                let op = match postfix.op {
                    PostfixOp::Inc => "+",
                    PostfixOp::Dec => "-",
                };
                let getter_call = self.getter_call_text(&prefix);
                self.rewriter
                    .replace(span, format!("{prefix}{setter}({getter_call} {op} 1)"));
                self.consumed.push(span);
                true
            }
            Expr::Unary(unary) if matches!(unary.op, UnaryOp::PreInc | UnaryOp::PreDec) => {
                let Some(prefix) = self.field_ref(&unary.expr) else {
                    return false;
                };
                let op = if unary.op == UnaryOp::PreInc { "+" } else { "-" };
                let getter_call = self.getter_call_text(&prefix);
                self.rewriter
                    .replace(span, format!("{prefix}{setter}({getter_call} {op} 1)"));
                self.consumed.push(span);
                true
            }
            _ => false,
        }
    }

    fn getter_call_text(&self, prefix: &str) -> String {
        match self.getter() {
            Some(getter) => format!("{prefix}{getter}()"),
            // Setter-only encapsulation still reads the raw field.
            None => format!("{prefix}{}", self.refactoring.target.name),
        }
    }

    /// Insert a cast when the assigned value's type is not assignable to
    /// the field's declared type.
    fn with_cast_if_needed(&self, rhs: &Expr, rhs_text: String) -> String {
        let Some(field_ty) = self
            .refactoring
            .target
            .resolve(self.index)
            .and_then(|sym| sym.type_text.clone())
        else {
            return rhs_text;
        };
        let inference = TypeInference::new(self.resolver);
        let Some(rhs_ty) = inference.infer(rhs, rhs.range().start) else {
            return rhs_text;
        };
        if crate::signature::is_assignable(self.index, &rhs_ty, &field_ty) {
            return rhs_text;
        }
        format!("({field_ty}) {rhs_text}")
    }

    fn in_consumed(&self, span: Span) -> bool {
        self.consumed.iter().any(|c| c.contains_span(span))
    }
}

impl Visitor for AccessRewriter<'_, '_> {
    fn enter_type(&mut self, decl: &TypeDecl) -> bool {
        let class = decl.name().to_string();
        let needs = self.refactoring.class_needs_accessors(
            self.index,
            &class,
            self.declaring_class,
        );
        self.class_stack.push((class, needs));
        true
    }

    fn leave_type(&mut self, _decl: &TypeDecl) {
        self.class_stack.pop();
    }

    fn enter_member(&mut self, member: &MemberDecl) -> bool {
        let in_declaring = self
            .class_stack
            .last()
            .map_or(false, |(class, _)| class == self.declaring_class);
        let skip = match member {
            // Raw access must survive inside the declaring constructors
            // and inside the accessors themselves.
            MemberDecl::Constructor(_) => in_declaring,
            MemberDecl::Method(method) => {
                in_declaring
                    && (Some(method.name.as_str()) == self.getter()
                        || Some(method.name.as_str()) == self.setter())
            }
            MemberDecl::Field(field) => {
                in_declaring && field.name == self.refactoring.target.name
            }
            _ => false,
        };
        if skip {
            self.skip_depth += 1;
        }
        true
    }

    fn leave_member(&mut self, member: &MemberDecl) {
        let in_declaring = self
            .class_stack
            .last()
            .map_or(false, |(class, _)| class == self.declaring_class);
        let was_skipped = match member {
            MemberDecl::Constructor(_) => in_declaring,
            MemberDecl::Method(method) => {
                in_declaring
                    && (Some(method.name.as_str()) == self.getter()
                        || Some(method.name.as_str()) == self.setter())
            }
            MemberDecl::Field(field) => {
                in_declaring && field.name == self.refactoring.target.name
            }
            _ => false,
        };
        if was_skipped {
            self.skip_depth -= 1;
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> bool {
        if !self.use_accessors() {
            return true;
        }
        if let Stmt::Expr(expr_stmt) = stmt {
            // Write forms are only replaceable when they are the complete
            // top-level expression of their statement.
            let expr = expr_stmt.expr.unwrap_parens();
            self.try_rewrite_write_stmt(expr, expr_stmt.expr.range());
        }
        true
    }

    fn visit_expr(&mut self, expr: &Expr) -> bool {
        if !self.use_accessors() {
            return true;
        }
        let span = expr.range();
        if self.in_consumed(span) {
            return false;
        }

        match expr {
            Expr::Assign(assign) => {
                if self.field_ref(&assign.lhs).is_some() {
                    // A write that was not handled at statement level sits
                    // inside a larger expression; a void setter cannot
                    // replace it.
                    self.rewriter.problems_mut().push_warning(format!(
                        "field write at {}..{} is part of a larger expression and was not encapsulated",
                        span.start, span.end
                    ));
                    return false;
                }
                // An array-element store reads the array reference: only
                // the read side is rewritten.
                if let Expr::ArrayAccess(access) = assign.lhs.unwrap_parens() {
                    if let Some(prefix) = self.field_ref(&access.array) {
                        if let Some(getter) = self.getter() {
                            self.rewriter.replace(
                                access.array.range(),
                                format!("{prefix}{getter}()"),
                            );
                            self.consumed.push(access.array.range());
                        }
                    }
                }
                true
            }
            Expr::Postfix(postfix) => {
                if self.field_ref(&postfix.expr).is_some() {
                    self.rewriter.problems_mut().push_warning(format!(
                        "field update at {}..{} is part of a larger expression and was not encapsulated",
                        span.start, span.end
                    ));
                    return false;
                }
                true
            }
            Expr::Unary(unary) if matches!(unary.op, UnaryOp::PreInc | UnaryOp::PreDec) => {
                if self.field_ref(&unary.expr).is_some() {
                    self.rewriter.problems_mut().push_warning(format!(
                        "field update at {}..{} is part of a larger expression and was not encapsulated",
                        span.start, span.end
                    ));
                    return false;
                }
                true
            }
            Expr::Name(_) | Expr::FieldAccess(_) => {
                if let Some(prefix) = self.field_ref(expr) {
                    if let Some(getter) = self.getter() {
                        self.rewriter
                            .replace(span, format!("{prefix}{getter}()"));
                        self.consumed.push(span);
                    }
                    return false;
                }
                true
            }
            _ => true,
        }
    }
}

/// Parenthesize the rewritten right-hand side when its top-level operator
/// binds looser than the compound operator it feeds.
fn parenthesize_for(op: BinaryOp, rhs: &Expr, rhs_text: String) -> String {
    let needs_parens = match rhs.unwrap_parens() {
        Expr::Binary(bin) => bin.op.precedence() <= op.precedence(),
        Expr::Conditional(_) | Expr::Assign(_) => true,
        _ => false,
    };
    if needs_parens {
        format!("({rhs_text})")
    } else {
        rhs_text
    }
}
