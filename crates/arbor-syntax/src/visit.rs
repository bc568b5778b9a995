//! Generic AST traversal.
//!
//! Refactoring visitors implement only the hooks they care about; the
//! walker supplies structural recursion for every other node kind. Hooks
//! returning `false` prune the subtree. `enter_type`/`leave_type` bracket
//! class scopes so visitors can maintain per-class context stacks.

use crate::ast::*;

#[allow(unused_variables)]
pub trait Visitor {
    /// Entering a type declaration; return `false` to skip its members.
    fn enter_type(&mut self, decl: &TypeDecl) -> bool {
        true
    }
    fn leave_type(&mut self, decl: &TypeDecl) {}

    /// Entering a member; return `false` to skip its body.
    fn enter_member(&mut self, member: &MemberDecl) -> bool {
        true
    }
    fn leave_member(&mut self, member: &MemberDecl) {}

    /// Visiting a statement; return `false` to skip nested statements and
    /// expressions.
    fn visit_stmt(&mut self, stmt: &Stmt) -> bool {
        true
    }

    /// Visiting an expression; return `false` to skip sub-expressions.
    fn visit_expr(&mut self, expr: &Expr) -> bool {
        true
    }
}

pub fn walk_unit(unit: &CompilationUnit, visitor: &mut dyn Visitor) {
    for ty in &unit.types {
        walk_type(ty, visitor);
    }
}

pub fn walk_type(decl: &TypeDecl, visitor: &mut dyn Visitor) {
    if !visitor.enter_type(decl) {
        return;
    }
    for member in decl.members() {
        walk_member(member, visitor);
    }
    visitor.leave_type(decl);
}

pub fn walk_member(member: &MemberDecl, visitor: &mut dyn Visitor) {
    if !visitor.enter_member(member) {
        return;
    }
    match member {
        MemberDecl::Field(field) => {
            if let Some(init) = &field.initializer {
                walk_expr(init, visitor);
            }
        }
        MemberDecl::Method(method) => {
            if let Some(body) = &method.body {
                walk_block(body, visitor);
            }
        }
        MemberDecl::Constructor(ctor) => walk_block(&ctor.body, visitor),
        MemberDecl::Initializer(init) => walk_block(&init.body, visitor),
        MemberDecl::Type(nested) => walk_type(nested, visitor),
    }
    visitor.leave_member(member);
}

pub fn walk_block(block: &Block, visitor: &mut dyn Visitor) {
    for stmt in &block.statements {
        walk_stmt(stmt, visitor);
    }
}

pub fn walk_stmt(stmt: &Stmt, visitor: &mut dyn Visitor) {
    if !visitor.visit_stmt(stmt) {
        return;
    }
    match stmt {
        Stmt::LocalVar(local) => {
            if let Some(init) = &local.initializer {
                walk_expr(init, visitor);
            }
        }
        Stmt::Expr(stmt) => walk_expr(&stmt.expr, visitor),
        Stmt::Return(stmt) => {
            if let Some(expr) = &stmt.expr {
                walk_expr(expr, visitor);
            }
        }
        Stmt::Block(block) => walk_block(block, visitor),
        Stmt::If(stmt) => {
            walk_expr(&stmt.condition, visitor);
            walk_stmt(&stmt.then_branch, visitor);
            if let Some(else_branch) = &stmt.else_branch {
                walk_stmt(else_branch, visitor);
            }
        }
        Stmt::While(stmt) => {
            walk_expr(&stmt.condition, visitor);
            walk_stmt(&stmt.body, visitor);
        }
        Stmt::DoWhile(stmt) => {
            walk_stmt(&stmt.body, visitor);
            walk_expr(&stmt.condition, visitor);
        }
        Stmt::For(stmt) => {
            for init in &stmt.init {
                walk_stmt(init, visitor);
            }
            if let Some(condition) = &stmt.condition {
                walk_expr(condition, visitor);
            }
            for update in &stmt.update {
                walk_expr(update, visitor);
            }
            walk_stmt(&stmt.body, visitor);
        }
        Stmt::ForEach(stmt) => {
            walk_expr(&stmt.iterable, visitor);
            walk_stmt(&stmt.body, visitor);
        }
        Stmt::Labeled(stmt) => walk_stmt(&stmt.body, visitor),
        Stmt::Throw(stmt) => walk_expr(&stmt.expr, visitor),
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Opaque(_) | Stmt::Empty(_) => {}
    }
}

pub fn walk_expr(expr: &Expr, visitor: &mut dyn Visitor) {
    if !visitor.visit_expr(expr) {
        return;
    }
    match expr {
        Expr::FieldAccess(access) => walk_expr(&access.receiver, visitor),
        Expr::ArrayAccess(access) => {
            walk_expr(&access.array, visitor);
            walk_expr(&access.index, visitor);
        }
        Expr::Call(call) => {
            walk_expr(&call.callee, visitor);
            for arg in &call.args {
                walk_expr(arg, visitor);
            }
        }
        Expr::New(new_expr) => {
            for arg in &new_expr.args {
                walk_expr(arg, visitor);
            }
        }
        Expr::NewArray(new_array) => {
            for dim in &new_array.dims {
                walk_expr(dim, visitor);
            }
        }
        Expr::Cast(cast) => walk_expr(&cast.expr, visitor),
        Expr::Instanceof(inst) => walk_expr(&inst.expr, visitor),
        Expr::Unary(unary) => walk_expr(&unary.expr, visitor),
        Expr::Postfix(postfix) => walk_expr(&postfix.expr, visitor),
        Expr::Binary(bin) => {
            walk_expr(&bin.lhs, visitor);
            walk_expr(&bin.rhs, visitor);
        }
        Expr::Assign(assign) => {
            walk_expr(&assign.lhs, visitor);
            walk_expr(&assign.rhs, visitor);
        }
        Expr::Conditional(cond) => {
            walk_expr(&cond.condition, visitor);
            walk_expr(&cond.then_expr, visitor);
            walk_expr(&cond.else_expr, visitor);
        }
        Expr::Paren(paren) => walk_expr(&paren.inner, visitor),
        Expr::MethodRef(mref) => walk_expr(&mref.receiver, visitor),
        Expr::Name(_)
        | Expr::Literal(_)
        | Expr::This(_)
        | Expr::Super(_)
        | Expr::Missing(_) => {}
    }
}
