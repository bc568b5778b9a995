//! Typed Java AST.
//!
//! This is a deliberately lightweight tree: every node carries its byte span
//! in the original source so rewrite visitors can splice replacement text
//! without a lossless green tree. Constructs the refactoring engine never
//! rewrites (`switch`, `try`, `synchronized` bodies) are kept as opaque
//! spans so traversal stays total.

use arbor_core::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    pub package: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDecl {
    pub name: String,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub is_static: bool,
    pub is_star: bool,
    pub path: String,
    pub range: Span,
}

impl ImportDecl {
    /// Last segment of the imported path (the simple name for non-star
    /// imports).
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Visibility {
    Private,
    PackagePrivate,
    Protected,
    Public,
}

impl Visibility {
    /// `true` when `self` grants strictly less access than `other`.
    #[must_use]
    pub fn is_stricter_than(self, other: Visibility) -> bool {
        self < other
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::PackagePrivate => "",
            Visibility::Protected => "protected",
            Visibility::Public => "public",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    pub is_native: bool,
    pub is_synchronized: bool,
    pub is_transient: bool,
    pub is_volatile: bool,
    /// Span of the modifier keywords; empty when the declaration has none.
    pub range: Span,
}

impl Modifiers {
    #[must_use]
    pub fn none(at: usize) -> Self {
        Modifiers {
            visibility: Visibility::PackagePrivate,
            is_static: false,
            is_final: false,
            is_abstract: false,
            is_native: false,
            is_synchronized: false,
            is_transient: false,
            is_volatile: false,
            range: Span::point(at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDecl {
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Enum(EnumDecl),
}

impl TypeDecl {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TypeDecl::Class(decl) => &decl.name,
            TypeDecl::Interface(decl) => &decl.name,
            TypeDecl::Enum(decl) => &decl.name,
        }
    }

    #[must_use]
    pub fn name_range(&self) -> Span {
        match self {
            TypeDecl::Class(decl) => decl.name_range,
            TypeDecl::Interface(decl) => decl.name_range,
            TypeDecl::Enum(decl) => decl.name_range,
        }
    }

    #[must_use]
    pub fn range(&self) -> Span {
        match self {
            TypeDecl::Class(decl) => decl.range,
            TypeDecl::Interface(decl) => decl.range,
            TypeDecl::Enum(decl) => decl.range,
        }
    }

    #[must_use]
    pub fn body_range(&self) -> Span {
        match self {
            TypeDecl::Class(decl) => decl.body_range,
            TypeDecl::Interface(decl) => decl.body_range,
            TypeDecl::Enum(decl) => decl.body_range,
        }
    }

    #[must_use]
    pub fn members(&self) -> &[MemberDecl] {
        match self {
            TypeDecl::Class(decl) => &decl.members,
            TypeDecl::Interface(decl) => &decl.members,
            TypeDecl::Enum(decl) => &decl.members,
        }
    }

    #[must_use]
    pub fn modifiers(&self) -> &Modifiers {
        match self {
            TypeDecl::Class(decl) => &decl.modifiers,
            TypeDecl::Interface(decl) => &decl.modifiers,
            TypeDecl::Enum(decl) => &decl.modifiers,
        }
    }

    /// The `extends` clause, when the declaration has one. Interface
    /// `extends` lists are returned through [`TypeDecl::supertypes`].
    #[must_use]
    pub fn extends(&self) -> Option<&TypeRef> {
        match self {
            TypeDecl::Class(decl) => decl.extends.as_ref(),
            TypeDecl::Interface(_) | TypeDecl::Enum(_) => None,
        }
    }

    /// All declared supertypes: `extends` plus `implements`.
    #[must_use]
    pub fn supertypes(&self) -> Vec<&TypeRef> {
        match self {
            TypeDecl::Class(decl) => decl
                .extends
                .iter()
                .chain(decl.implements.iter())
                .collect(),
            TypeDecl::Interface(decl) => decl.extends_list.iter().collect(),
            TypeDecl::Enum(decl) => decl.implements.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub modifiers: Modifiers,
    pub name: String,
    pub name_range: Span,
    pub extends: Option<TypeRef>,
    pub implements: Vec<TypeRef>,
    pub members: Vec<MemberDecl>,
    pub body_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDecl {
    pub modifiers: Modifiers,
    pub name: String,
    pub name_range: Span,
    pub extends_list: Vec<TypeRef>,
    pub members: Vec<MemberDecl>,
    pub body_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub modifiers: Modifiers,
    pub name: String,
    pub name_range: Span,
    pub implements: Vec<TypeRef>,
    pub members: Vec<MemberDecl>,
    pub body_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberDecl {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    Initializer(InitializerDecl),
    Type(TypeDecl),
}

/// A textual type reference (`int`, `List<String>`, `byte[]`, `Foo...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub text: String,
    pub range: Span,
}

impl TypeRef {
    /// Simple name of the head type (`java.util.List<String>` → `List`).
    #[must_use]
    pub fn simple_name(&self) -> &str {
        let head = self
            .text
            .split(|c| c == '<' || c == '[')
            .next()
            .unwrap_or(&self.text)
            .trim_end_matches("...");
        head.rsplit('.').next().unwrap_or(head).trim()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub modifiers: Modifiers,
    pub ty: TypeRef,
    pub name: String,
    pub name_range: Span,
    pub initializer: Option<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub is_final: bool,
    pub ty: TypeRef,
    pub is_vararg: bool,
    pub name: String,
    pub name_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub modifiers: Modifiers,
    pub return_ty: TypeRef,
    pub name: String,
    pub name_range: Span,
    pub params: Vec<ParamDecl>,
    pub throws: Vec<TypeRef>,
    pub body: Option<Block>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorDecl {
    pub modifiers: Modifiers,
    pub name: String,
    pub name_range: Span,
    pub params: Vec<ParamDecl>,
    pub throws: Vec<TypeRef>,
    pub body: Block,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerDecl {
    pub is_static: bool,
    pub body: Block,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    LocalVar(LocalVarStmt),
    Expr(ExprStmt),
    Return(ReturnStmt),
    Block(Block),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    ForEach(ForEachStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
    Labeled(LabeledStmt),
    Throw(ThrowStmt),
    /// A statement the parser recognizes but does not model structurally
    /// (`switch`, `try`, `synchronized`). The span covers the whole
    /// statement including its body.
    Opaque(Span),
    Empty(Span),
}

impl Stmt {
    #[must_use]
    pub fn range(&self) -> Span {
        match self {
            Stmt::LocalVar(stmt) => stmt.range,
            Stmt::Expr(stmt) => stmt.range,
            Stmt::Return(stmt) => stmt.range,
            Stmt::Block(block) => block.range,
            Stmt::If(stmt) => stmt.range,
            Stmt::While(stmt) => stmt.range,
            Stmt::DoWhile(stmt) => stmt.range,
            Stmt::For(stmt) => stmt.range,
            Stmt::ForEach(stmt) => stmt.range,
            Stmt::Break(stmt) => stmt.range,
            Stmt::Continue(stmt) => stmt.range,
            Stmt::Labeled(stmt) => stmt.range,
            Stmt::Throw(stmt) => stmt.range,
            Stmt::Opaque(range) | Stmt::Empty(range) => *range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVarStmt {
    pub is_final: bool,
    pub ty: TypeRef,
    pub name: String,
    pub name_range: Span,
    pub initializer: Option<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnStmt {
    pub expr: Option<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub condition: Expr,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForStmt {
    pub init: Vec<Stmt>,
    pub condition: Option<Expr>,
    pub update: Vec<Expr>,
    /// Span from the start of the update list to the closing `)`; empty when
    /// there are no update expressions.
    pub update_range: Span,
    pub body: Box<Stmt>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForEachStmt {
    pub var_ty: TypeRef,
    pub var_name: String,
    pub var_name_range: Span,
    pub iterable: Expr,
    pub body: Box<Stmt>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakStmt {
    pub label: Option<String>,
    pub label_range: Option<Span>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinueStmt {
    pub label: Option<String>,
    pub label_range: Option<Span>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledStmt {
    pub label: String,
    pub label_range: Span,
    pub body: Box<Stmt>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowStmt {
    pub expr: Expr,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Name(NameExpr),
    Literal(LiteralExpr),
    This(Span),
    Super(Span),
    FieldAccess(FieldAccessExpr),
    ArrayAccess(ArrayAccessExpr),
    Call(CallExpr),
    New(NewExpr),
    NewArray(NewArrayExpr),
    Cast(CastExpr),
    Instanceof(InstanceofExpr),
    Unary(UnaryExpr),
    Postfix(PostfixExpr),
    Binary(BinaryExpr),
    Assign(AssignExpr),
    Conditional(ConditionalExpr),
    Paren(ParenExpr),
    MethodRef(MethodRefExpr),
    Missing(Span),
}

impl Expr {
    #[must_use]
    pub fn range(&self) -> Span {
        match self {
            Expr::Name(expr) => expr.range,
            Expr::Literal(expr) => expr.range,
            Expr::This(range) | Expr::Super(range) | Expr::Missing(range) => *range,
            Expr::FieldAccess(expr) => expr.range,
            Expr::ArrayAccess(expr) => expr.range,
            Expr::Call(expr) => expr.range,
            Expr::New(expr) => expr.range,
            Expr::NewArray(expr) => expr.range,
            Expr::Cast(expr) => expr.range,
            Expr::Instanceof(expr) => expr.range,
            Expr::Unary(expr) => expr.range,
            Expr::Postfix(expr) => expr.range,
            Expr::Binary(expr) => expr.range,
            Expr::Assign(expr) => expr.range,
            Expr::Conditional(expr) => expr.range,
            Expr::Paren(expr) => expr.range,
            Expr::MethodRef(expr) => expr.range,
        }
    }

    /// Strips redundant grouping parentheses.
    #[must_use]
    pub fn unwrap_parens(&self) -> &Expr {
        let mut expr = self;
        while let Expr::Paren(paren) = expr {
            expr = &paren.inner;
        }
        expr
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameExpr {
    pub name: String,
    pub range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Long,
    Float,
    Double,
    Bool,
    Char,
    Str,
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralExpr {
    pub kind: LiteralKind,
    pub text: String,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccessExpr {
    pub receiver: Box<Expr>,
    pub name: String,
    pub name_range: Span,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayAccessExpr {
    pub array: Box<Expr>,
    pub index: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub range: Span,
}

impl CallExpr {
    /// `(simple name, receiver)` when the callee is a plain or qualified
    /// method name; `None` for constructor-ish callees (`this(...)`,
    /// `super(...)`).
    #[must_use]
    pub fn name_and_receiver(&self) -> Option<(&str, Span, Option<&Expr>)> {
        match self.callee.as_ref() {
            Expr::Name(name) => Some((&name.name, name.range, None)),
            Expr::FieldAccess(field) => {
                Some((&field.name, field.name_range, Some(field.receiver.as_ref())))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpr {
    pub ty: TypeRef,
    pub args: Vec<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArrayExpr {
    pub ty: TypeRef,
    pub dims: Vec<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastExpr {
    pub ty: TypeRef,
    pub expr: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceofExpr {
    pub expr: Box<Expr>,
    pub ty: TypeRef,
    pub range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    PreInc,
    PreDec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub expr: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostfixExpr {
    pub op: PostfixOp,
    pub expr: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    UShr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinaryOp {
    /// Java binary operator precedence; higher binds tighter.
    #[must_use]
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 12,
            BinaryOp::Add | BinaryOp::Sub => 11,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 10,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 9,
            BinaryOp::Eq | BinaryOp::Ne => 8,
            BinaryOp::BitAnd => 7,
            BinaryOp::BitXor => 6,
            BinaryOp::BitOr => 5,
            BinaryOp::And => 4,
            BinaryOp::Or => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub range: Span,
}

/// Assignment; `op` is `Some` for compound forms (`+=`, `<<=`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignExpr {
    pub lhs: Box<Expr>,
    pub op: Option<BinaryOp>,
    pub rhs: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalExpr {
    pub condition: Box<Expr>,
    pub then_expr: Box<Expr>,
    pub else_expr: Box<Expr>,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParenExpr {
    pub inner: Box<Expr>,
    pub range: Span,
}

/// `Receiver::name` method reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRefExpr {
    pub receiver: Box<Expr>,
    pub name: String,
    pub name_range: Span,
    pub range: Span,
}
