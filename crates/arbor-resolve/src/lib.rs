//! Per-file name resolution.
//!
//! The resolver binds an identifier occurrence to the program element it
//! denotes, honoring Java's scoping rules as far as the index models them:
//! locals shadow parameters, parameters shadow fields, fields are inherited
//! through the superclass chain. Element identity is content-addressed (a
//! field is its declaring class + name, a method its class + name +
//! normalized parameter types) so two resolutions from differently parsed
//! snapshots compare equal exactly when they denote the same element.

mod types;

pub use types::{simple_type_name, TypeInference};

use arbor_core::{FileId, Span};
use arbor_index::{normalize_type_text, Index, SymbolKind};
use arbor_syntax::ast::{
    Block, CallExpr, CompilationUnit, ConstructorDecl, Expr, FieldDecl, MemberDecl, MethodDecl,
    Stmt, TypeDecl,
};

/// Identity of an executable member: declaring class, name, normalized
/// parameter type texts. Constructors use the class name as `name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub class: String,
    pub name: String,
    pub params: Vec<String>,
}

impl MethodKey {
    #[must_use]
    pub fn new(class: &str, name: &str, param_types: &[String]) -> Self {
        MethodKey {
            class: class.to_string(),
            name: name.to_string(),
            params: param_types.iter().map(|t| normalize_type_text(t)).collect(),
        }
    }

    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.class == self.name
    }
}

/// A resolved program element.
///
/// Equality is the engine's "same element" contract: structural, never
/// pointer- or name-text-based.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    Type {
        name: String,
    },
    Field {
        class: String,
        name: String,
    },
    Method(MethodKey),
    Param {
        owner: MethodKey,
        index: usize,
        name: String,
    },
    Local {
        owner: MethodKey,
        name: String,
        decl: Span,
    },
    Label {
        name: String,
        decl: Span,
    },
}

/// Binds identifiers within one parsed compilation unit.
pub struct Resolver<'a> {
    index: &'a Index,
    file: FileId,
    unit: &'a CompilationUnit,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a Index, file: &FileId) -> Option<Self> {
        let parse = index.file_parse(file)?;
        Some(Resolver {
            index,
            file: file.clone(),
            unit: parse.compilation_unit(),
        })
    }

    #[must_use]
    pub fn file(&self) -> &FileId {
        &self.file
    }

    #[must_use]
    pub fn unit(&self) -> &CompilationUnit {
        self.unit
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        self.index
    }

    /// Innermost type declaration containing `offset`.
    #[must_use]
    pub fn enclosing_type(&self, offset: usize) -> Option<&'a TypeDecl> {
        fn narrow<'t>(decl: &'t TypeDecl, offset: usize) -> Option<&'t TypeDecl> {
            if !decl.range().contains(offset) {
                return None;
            }
            for member in decl.members() {
                if let MemberDecl::Type(nested) = member {
                    if let Some(inner) = narrow(nested, offset) {
                        return Some(inner);
                    }
                }
            }
            Some(decl)
        }
        self.unit.types.iter().find_map(|ty| narrow(ty, offset))
    }

    /// Innermost executable member (method or constructor) containing
    /// `offset`, plus its owning class name.
    #[must_use]
    pub fn enclosing_executable(&self, offset: usize) -> Option<(String, ExecutableRef<'a>)> {
        let ty = self.enclosing_type(offset)?;
        for member in ty.members() {
            match member {
                MemberDecl::Method(method) if method.range.contains(offset) => {
                    return Some((ty.name().to_string(), ExecutableRef::Method(method)));
                }
                MemberDecl::Constructor(ctor) if ctor.range.contains(offset) => {
                    return Some((ty.name().to_string(), ExecutableRef::Constructor(ctor)));
                }
                _ => {}
            }
        }
        None
    }

    /// Resolve an unqualified identifier occurrence at `offset`.
    ///
    /// A declaration-name position resolves to the element being declared,
    /// never to a same-named outer element.
    #[must_use]
    pub fn resolve_identifier(&self, offset: usize, name: &str) -> Option<Element> {
        if let Some((class, exec)) = self.enclosing_executable(offset) {
            let owner = exec.key(&class);

            for (idx, param) in exec.params().iter().enumerate() {
                if param.name_range.contains(offset) && param.name == name {
                    return Some(Element::Param {
                        owner: owner.clone(),
                        index: idx,
                        name: name.to_string(),
                    });
                }
            }
            if let Some(body) = exec.body() {
                if let Some(decl) = find_local_decl_at(body, offset, name) {
                    return Some(Element::Local {
                        owner: owner.clone(),
                        name: name.to_string(),
                        decl,
                    });
                }
            }

            // Locals declared before the occurrence, innermost block first.
            if let Some(body) = exec.body() {
                let mut locals = Vec::new();
                collect_locals_in_scope(body, offset, &mut locals);
                if let Some(local) = locals
                    .iter()
                    .rev()
                    .find(|(local_name, _)| local_name == name)
                {
                    return Some(Element::Local {
                        owner: owner.clone(),
                        name: name.to_string(),
                        decl: local.1,
                    });
                }
            }

            for (idx, param) in exec.params().iter().enumerate() {
                if param.name == name {
                    return Some(Element::Param {
                        owner: owner.clone(),
                        index: idx,
                        name: name.to_string(),
                    });
                }
            }

            if let Some(field) = self.resolve_field_in_hierarchy(&class, name) {
                return Some(field);
            }
        } else if let Some(ty) = self.enclosing_type(offset) {
            // Field initializers and member positions: fields are in scope.
            if let Some(field) = self.resolve_field_in_hierarchy(ty.name(), name) {
                return Some(field);
            }
        }

        if self.index.find_type(name).is_some() {
            return Some(Element::Type {
                name: name.to_string(),
            });
        }

        tracing::debug!(file = %self.file, name, offset, "identifier did not resolve");
        None
    }

    /// Resolve a field by name through the superclass chain of `class`.
    #[must_use]
    pub fn resolve_field_in_hierarchy(&self, class: &str, name: &str) -> Option<Element> {
        for current in self.index.superclass_chain(class) {
            if let Some(sym) = self.index.find_field(&current, name) {
                // Private superclass fields are not inherited.
                if current != class
                    && sym.visibility == arbor_syntax::ast::Visibility::Private
                {
                    continue;
                }
                return Some(Element::Field {
                    class: current,
                    name: name.to_string(),
                });
            }
        }
        None
    }

    /// Resolve the callee of a call expression to an executable.
    #[must_use]
    pub fn resolve_call(&self, call: &CallExpr, offset: usize) -> Option<MethodKey> {
        match call.callee.as_ref() {
            Expr::Name(name) => {
                let ty = self.enclosing_type(offset)?;
                self.resolve_method_in_hierarchy(ty.name(), &name.name, call.args.len())
            }
            Expr::FieldAccess(access) => {
                let inference = TypeInference::new(self);
                let receiver_ty = inference.infer(access.receiver.as_ref(), offset)?;
                let class = simple_type_name(&receiver_ty);
                self.resolve_method_in_hierarchy(&class, &access.name, call.args.len())
            }
            // `this(...)` / `super(...)` constructor invocations.
            Expr::This(_) => {
                let ty = self.enclosing_type(offset)?;
                self.resolve_constructor(ty.name(), call.args.len())
            }
            Expr::Super(_) => {
                let ty = self.enclosing_type(offset)?;
                let sup = self.index.class_extends(ty.name())?;
                self.resolve_constructor(sup, call.args.len())
            }
            _ => None,
        }
    }

    /// Find a method named `name` accepting `arity` arguments on `class` or
    /// a superclass. When overloads tie on arity the lexically first
    /// declaration wins; the checker reports genuinely ambiguous sites.
    #[must_use]
    pub fn resolve_method_in_hierarchy(
        &self,
        class: &str,
        name: &str,
        arity: usize,
    ) -> Option<MethodKey> {
        for current in self.index.superclass_chain(class) {
            for sym in self.index.method_overloads(&current, name) {
                let params = sym.param_types.as_deref().unwrap_or_default();
                let matches = params.len() == arity
                    || (sym.is_vararg && arity + 1 >= params.len());
                if matches {
                    return Some(MethodKey::new(&current, name, params));
                }
            }
        }
        None
    }

    #[must_use]
    pub fn resolve_constructor(&self, class: &str, arity: usize) -> Option<MethodKey> {
        for sym in self.index.executables_of(class) {
            if sym.kind != SymbolKind::Constructor {
                continue;
            }
            let params = sym.param_types.as_deref().unwrap_or_default();
            if params.len() == arity || (sym.is_vararg && arity + 1 >= params.len()) {
                return Some(MethodKey::new(class, class, params));
            }
        }
        None
    }

    /// Every simple name visible at `offset`: locals, parameters, fields of
    /// the enclosing hierarchy. Used for collision checks before
    /// introducing new names.
    #[must_use]
    pub fn visible_names_at(&self, offset: usize) -> std::collections::HashSet<String> {
        let mut out = std::collections::HashSet::new();
        if let Some((class, exec)) = self.enclosing_executable(offset) {
            if let Some(body) = exec.body() {
                let mut locals = Vec::new();
                collect_all_locals(body, &mut locals);
                out.extend(locals);
            }
            for param in exec.params() {
                out.insert(param.name.clone());
            }
            for current in self.index.superclass_chain(&class) {
                for sym in self.index.members_of(&current) {
                    if sym.kind == SymbolKind::Field {
                        out.insert(sym.name.clone());
                    }
                }
            }
        }
        out
    }
}

/// Either kind of executable member.
#[derive(Clone, Copy, Debug)]
pub enum ExecutableRef<'a> {
    Method(&'a MethodDecl),
    Constructor(&'a ConstructorDecl),
}

impl<'a> ExecutableRef<'a> {
    #[must_use]
    pub fn key(&self, class: &str) -> MethodKey {
        match self {
            ExecutableRef::Method(m) => {
                let types: Vec<String> = m.params.iter().map(|p| p.ty.text.clone()).collect();
                MethodKey::new(class, &m.name, &types)
            }
            ExecutableRef::Constructor(c) => {
                let types: Vec<String> = c.params.iter().map(|p| p.ty.text.clone()).collect();
                MethodKey::new(class, class, &types)
            }
        }
    }

    #[must_use]
    pub fn params(&self) -> &'a [arbor_syntax::ast::ParamDecl] {
        match self {
            ExecutableRef::Method(m) => &m.params,
            ExecutableRef::Constructor(c) => &c.params,
        }
    }

    #[must_use]
    pub fn body(&self) -> Option<&'a Block> {
        match self {
            ExecutableRef::Method(m) => m.body.as_ref(),
            ExecutableRef::Constructor(c) => Some(&c.body),
        }
    }

    #[must_use]
    pub fn range(&self) -> Span {
        match self {
            ExecutableRef::Method(m) => m.range,
            ExecutableRef::Constructor(c) => c.range,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            ExecutableRef::Method(m) => &m.name,
            ExecutableRef::Constructor(c) => &c.name,
        }
    }
}

/// Declaration name span of a local (or loop variable) whose name range
/// covers `offset`.
fn find_local_decl_at(block: &Block, offset: usize, name: &str) -> Option<Span> {
    fn walk(stmt: &Stmt, offset: usize, name: &str) -> Option<Span> {
        match stmt {
            Stmt::LocalVar(local) => {
                (local.name == name && local.name_range.contains(offset))
                    .then_some(local.name_range)
            }
            Stmt::Block(block) => find_local_decl_at(block, offset, name),
            Stmt::If(s) => walk(&s.then_branch, offset, name).or_else(|| {
                s.else_branch
                    .as_ref()
                    .and_then(|e| walk(e, offset, name))
            }),
            Stmt::While(s) => walk(&s.body, offset, name),
            Stmt::DoWhile(s) => walk(&s.body, offset, name),
            Stmt::For(s) => s
                .init
                .iter()
                .find_map(|init| walk(init, offset, name))
                .or_else(|| walk(&s.body, offset, name)),
            Stmt::ForEach(s) => {
                if s.var_name == name && s.var_name_range.contains(offset) {
                    return Some(s.var_name_range);
                }
                walk(&s.body, offset, name)
            }
            Stmt::Labeled(s) => walk(&s.body, offset, name),
            _ => None,
        }
    }
    block
        .statements
        .iter()
        .find_map(|stmt| walk(stmt, offset, name))
}

/// Locals in scope at `offset`: declared before it, in a block chain that
/// contains it. Pushed outermost-first.
fn collect_locals_in_scope(block: &Block, offset: usize, out: &mut Vec<(String, Span)>) {
    if !block.range.contains(offset) {
        return;
    }
    for stmt in &block.statements {
        collect_stmt_locals(stmt, offset, out);
    }
}

fn collect_stmt_locals(stmt: &Stmt, offset: usize, out: &mut Vec<(String, Span)>) {
    match stmt {
        Stmt::LocalVar(local) => {
            if local.name_range.end <= offset {
                out.push((local.name.clone(), local.name_range));
            }
        }
        Stmt::Block(block) => collect_locals_in_scope(block, offset, out),
        Stmt::If(stmt) => {
            collect_stmt_locals(&stmt.then_branch, offset, out);
            if let Some(else_branch) = &stmt.else_branch {
                collect_stmt_locals(else_branch, offset, out);
            }
        }
        Stmt::While(stmt) => collect_stmt_locals(&stmt.body, offset, out),
        Stmt::DoWhile(stmt) => collect_stmt_locals(&stmt.body, offset, out),
        Stmt::For(stmt) => {
            if stmt.range.contains(offset) {
                for init in &stmt.init {
                    if let Stmt::LocalVar(local) = init {
                        if local.name_range.end <= offset {
                            out.push((local.name.clone(), local.name_range));
                        }
                    }
                }
                collect_stmt_locals(&stmt.body, offset, out);
            }
        }
        Stmt::ForEach(stmt) => {
            if stmt.range.contains(offset) {
                if stmt.var_name_range.end <= offset {
                    out.push((stmt.var_name.clone(), stmt.var_name_range));
                }
                collect_stmt_locals(&stmt.body, offset, out);
            }
        }
        Stmt::Labeled(stmt) => collect_stmt_locals(&stmt.body, offset, out),
        Stmt::Expr(_)
        | Stmt::Return(_)
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Throw(_)
        | Stmt::Opaque(_)
        | Stmt::Empty(_) => {}
    }
}

/// Every local name declared anywhere in `block`, regardless of position.
fn collect_all_locals(block: &Block, out: &mut Vec<String>) {
    for stmt in &block.statements {
        collect_all_stmt_locals(stmt, out);
    }
}

fn collect_all_stmt_locals(stmt: &Stmt, out: &mut Vec<String>) {
    match stmt {
        Stmt::LocalVar(local) => out.push(local.name.clone()),
        Stmt::Block(block) => collect_all_locals(block, out),
        Stmt::If(stmt) => {
            collect_all_stmt_locals(&stmt.then_branch, out);
            if let Some(else_branch) = &stmt.else_branch {
                collect_all_stmt_locals(else_branch, out);
            }
        }
        Stmt::While(stmt) => collect_all_stmt_locals(&stmt.body, out),
        Stmt::DoWhile(stmt) => collect_all_stmt_locals(&stmt.body, out),
        Stmt::For(stmt) => {
            for init in &stmt.init {
                collect_all_stmt_locals(init, out);
            }
            collect_all_stmt_locals(&stmt.body, out);
        }
        Stmt::ForEach(stmt) => {
            out.push(stmt.var_name.clone());
            collect_all_stmt_locals(&stmt.body, out);
        }
        Stmt::Labeled(stmt) => collect_all_stmt_locals(&stmt.body, out),
        Stmt::Expr(_)
        | Stmt::Return(_)
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Throw(_)
        | Stmt::Opaque(_)
        | Stmt::Empty(_) => {}
    }
}

// ---- AST lookup helpers used by the rewrite visitors ------------------

/// Find a type declaration (possibly nested) by simple name.
#[must_use]
pub fn find_type_decl<'a>(unit: &'a CompilationUnit, name: &str) -> Option<&'a TypeDecl> {
    fn search<'t>(decl: &'t TypeDecl, name: &str) -> Option<&'t TypeDecl> {
        if decl.name() == name {
            return Some(decl);
        }
        decl.members().iter().find_map(|member| match member {
            MemberDecl::Type(nested) => search(nested, name),
            _ => None,
        })
    }
    unit.types.iter().find_map(|ty| search(ty, name))
}

/// Find a method declaration matching a [`MethodKey`].
#[must_use]
pub fn find_method_decl<'a>(unit: &'a CompilationUnit, key: &MethodKey) -> Option<&'a MethodDecl> {
    let ty = find_type_decl(unit, &key.class)?;
    ty.members().iter().find_map(|member| match member {
        MemberDecl::Method(method) if method.name == key.name => {
            let params: Vec<String> = method.params.iter().map(|p| p.ty.text.clone()).collect();
            let normalized: Vec<String> =
                params.iter().map(|t| normalize_type_text(t)).collect();
            (normalized == key.params).then_some(method)
        }
        _ => None,
    })
}

/// Find a constructor declaration matching a [`MethodKey`].
#[must_use]
pub fn find_constructor_decl<'a>(
    unit: &'a CompilationUnit,
    key: &MethodKey,
) -> Option<&'a ConstructorDecl> {
    let ty = find_type_decl(unit, &key.class)?;
    ty.members().iter().find_map(|member| match member {
        MemberDecl::Constructor(ctor) => {
            let normalized: Vec<String> = ctor
                .params
                .iter()
                .map(|p| normalize_type_text(&p.ty.text))
                .collect();
            (normalized == key.params).then_some(ctor)
        }
        _ => None,
    })
}

/// Find a field declaration by declaring class and name.
#[must_use]
pub fn find_field_decl<'a>(
    unit: &'a CompilationUnit,
    class: &str,
    name: &str,
) -> Option<&'a FieldDecl> {
    let ty = find_type_decl(unit, class)?;
    ty.members().iter().find_map(|member| match member {
        MemberDecl::Field(field) if field.name == name => Some(field),
        _ => None,
    })
}

#[cfg(test)]
mod tests;
