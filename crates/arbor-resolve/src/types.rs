//! Best-effort declared-type inference.
//!
//! This is deliberately *not* a type checker: it only propagates declared
//! type texts far enough for the rewrite visitors to pick receivers and
//! decide setter casts. Anything it cannot see returns `None`, and callers
//! degrade to a warning instead of guessing.

use arbor_syntax::ast::{BinaryOp, Expr, LiteralKind, Stmt};

use crate::{Element, Resolver};

/// Head simple name of a declared type text
/// (`java.util.List<String>[]` → `List`).
#[must_use]
pub fn simple_type_name(text: &str) -> String {
    let head = text
        .split(|c| c == '<' || c == '[')
        .next()
        .unwrap_or(text)
        .trim_end_matches("...");
    head.rsplit('.').next().unwrap_or(head).trim().to_string()
}

pub struct TypeInference<'r, 'a> {
    resolver: &'r Resolver<'a>,
}

impl<'r, 'a> TypeInference<'r, 'a> {
    #[must_use]
    pub fn new(resolver: &'r Resolver<'a>) -> Self {
        TypeInference { resolver }
    }

    /// Infer the declared type text of `expr` as it appears at `offset`.
    #[must_use]
    pub fn infer(&self, expr: &Expr, offset: usize) -> Option<String> {
        match expr {
            Expr::Literal(lit) => match lit.kind {
                LiteralKind::Int => Some("int".to_string()),
                LiteralKind::Long => Some("long".to_string()),
                LiteralKind::Float => Some("float".to_string()),
                LiteralKind::Double => Some("double".to_string()),
                LiteralKind::Bool => Some("boolean".to_string()),
                LiteralKind::Char => Some("char".to_string()),
                LiteralKind::Str => Some("String".to_string()),
                LiteralKind::Null => None,
            },
            Expr::This(_) => self
                .resolver
                .enclosing_type(offset)
                .map(|ty| ty.name().to_string()),
            Expr::Super(_) => {
                let ty = self.resolver.enclosing_type(offset)?;
                self.resolver
                    .index()
                    .class_extends(ty.name())
                    .map(str::to_string)
            }
            Expr::Name(name) => self.infer_name(&name.name, offset),
            Expr::FieldAccess(access) => {
                let receiver_ty = self.infer(access.receiver.as_ref(), offset)?;
                let class = simple_type_name(&receiver_ty);
                for current in self.resolver.index().superclass_chain(&class) {
                    if let Some(sym) = self.resolver.index().find_field(&current, &access.name) {
                        return sym.type_text.clone();
                    }
                }
                None
            }
            Expr::Call(call) => {
                let key = self.resolver.resolve_call(call, offset)?;
                if key.is_constructor() {
                    return Some(key.class);
                }
                let index = self.resolver.index();
                index
                    .method_overloads(&key.class, &key.name)
                    .into_iter()
                    .find(|sym| {
                        sym.param_types
                            .as_ref()
                            .is_some_and(|params| {
                                let normalized: Vec<String> = params
                                    .iter()
                                    .map(|t| arbor_index::normalize_type_text(t))
                                    .collect();
                                normalized == key.params
                            })
                    })
                    .and_then(|sym| sym.type_text.clone())
            }
            Expr::New(new_expr) => Some(new_expr.ty.text.clone()),
            Expr::NewArray(new_array) => Some(format!("{}[]", new_array.ty.text)),
            Expr::Cast(cast) => Some(cast.ty.text.clone()),
            Expr::Instanceof(_) => Some("boolean".to_string()),
            Expr::Paren(paren) => self.infer(&paren.inner, offset),
            Expr::Assign(assign) => self.infer(assign.lhs.as_ref(), offset),
            Expr::Unary(unary) => self.infer(unary.expr.as_ref(), offset),
            Expr::Postfix(postfix) => self.infer(postfix.expr.as_ref(), offset),
            Expr::Conditional(cond) => self
                .infer(cond.then_expr.as_ref(), offset)
                .or_else(|| self.infer(cond.else_expr.as_ref(), offset)),
            Expr::Binary(bin) => self.infer_binary(bin, offset),
            Expr::ArrayAccess(access) => {
                let array_ty = self.infer(access.array.as_ref(), offset)?;
                array_ty
                    .strip_suffix("[]")
                    .map(|element| element.trim().to_string())
            }
            Expr::MethodRef(_) | Expr::Missing(_) => None,
        }
    }

    fn infer_name(&self, name: &str, offset: usize) -> Option<String> {
        match self.resolver.resolve_identifier(offset, name)? {
            Element::Local { .. } => self.local_declared_type(name, offset),
            Element::Param { owner, index, .. } => {
                // The owner's param list carries the declared text.
                let unit = self.resolver.unit();
                if let Some(method) = crate::find_method_decl(unit, &owner) {
                    return method.params.get(index).map(|p| p.ty.text.clone());
                }
                if let Some(ctor) = crate::find_constructor_decl(unit, &owner) {
                    return ctor.params.get(index).map(|p| p.ty.text.clone());
                }
                None
            }
            Element::Field { class, name } => self
                .resolver
                .index()
                .find_field(&class, &name)
                .and_then(|sym| sym.type_text.clone()),
            Element::Type { name } => Some(name),
            Element::Method(_) | Element::Label { .. } => None,
        }
    }

    fn local_declared_type(&self, name: &str, offset: usize) -> Option<String> {
        let (_, exec) = self.resolver.enclosing_executable(offset)?;
        let body = exec.body()?;
        let mut found = None;
        find_local_type(body, name, offset, &mut found);
        found
    }

    fn infer_binary(
        &self,
        bin: &arbor_syntax::ast::BinaryExpr,
        offset: usize,
    ) -> Option<String> {
        match bin.op {
            BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::And
            | BinaryOp::Or => return Some("boolean".to_string()),
            _ => {}
        }
        let lhs = self.infer(bin.lhs.as_ref(), offset);
        let rhs = self.infer(bin.rhs.as_ref(), offset);
        if bin.op == BinaryOp::Add
            && (lhs.as_deref() == Some("String") || rhs.as_deref() == Some("String"))
        {
            return Some("String".to_string());
        }
        match (lhs, rhs) {
            (Some(a), Some(b)) => Some(wider_numeric(&a, &b)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }
}

fn wider_numeric(a: &str, b: &str) -> String {
    const ORDER: &[&str] = &["byte", "short", "char", "int", "long", "float", "double"];
    let rank = |t: &str| ORDER.iter().position(|candidate| *candidate == t);
    match (rank(a), rank(b)) {
        (Some(ra), Some(rb)) => ORDER[ra.max(rb)].to_string(),
        _ => a.to_string(),
    }
}

fn find_local_type(
    block: &arbor_syntax::ast::Block,
    name: &str,
    offset: usize,
    out: &mut Option<String>,
) {
    for stmt in &block.statements {
        find_local_type_in_stmt(stmt, name, offset, out);
    }
}

fn find_local_type_in_stmt(stmt: &Stmt, name: &str, offset: usize, out: &mut Option<String>) {
    match stmt {
        Stmt::LocalVar(local) => {
            if local.name == name && local.name_range.end <= offset {
                *out = Some(local.ty.text.clone());
            }
        }
        Stmt::Block(block) => find_local_type(block, name, offset, out),
        Stmt::If(stmt) => {
            find_local_type_in_stmt(&stmt.then_branch, name, offset, out);
            if let Some(else_branch) = &stmt.else_branch {
                find_local_type_in_stmt(else_branch, name, offset, out);
            }
        }
        Stmt::While(stmt) => find_local_type_in_stmt(&stmt.body, name, offset, out),
        Stmt::DoWhile(stmt) => find_local_type_in_stmt(&stmt.body, name, offset, out),
        Stmt::For(stmt) => {
            for init in &stmt.init {
                find_local_type_in_stmt(init, name, offset, out);
            }
            find_local_type_in_stmt(&stmt.body, name, offset, out);
        }
        Stmt::ForEach(stmt) => {
            if stmt.var_name == name && stmt.var_name_range.end <= offset {
                *out = Some(stmt.var_ty.text.clone());
            }
            find_local_type_in_stmt(&stmt.body, name, offset, out);
        }
        Stmt::Labeled(stmt) => find_local_type_in_stmt(&stmt.body, name, offset, out),
        _ => {}
    }
}
