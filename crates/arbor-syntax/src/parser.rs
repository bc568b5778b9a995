//! Recursive-descent Java parser.
//!
//! Error handling is lenient: unparseable tokens are skipped and missing
//! constructs surface as `Expr::Missing` / `Stmt::Opaque` rather than
//! failing the whole unit. Refactorings must keep working on files that are
//! mid-edit.

use arbor_core::Span;

use crate::ast;
use crate::lexer::{Token, TokenKind};

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek()
            .is_some_and(|token| token.kind == TokenKind::Ident && token.text == keyword)
    }

    fn bump(&mut self) -> Option<Token> {
        if self.is_eof() {
            return None;
        }
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        Some(tok)
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Token {
        match self.bump() {
            Some(tok) if tok.kind == kind => tok,
            Some(tok) => tok,
            None => Token {
                kind,
                text: String::new(),
                range: self.end_span(),
            },
        }
    }

    fn expect_ident(&mut self) -> Token {
        match self.bump() {
            Some(tok) if tok.kind == TokenKind::Ident => tok,
            Some(tok) => tok,
            None => Token {
                kind: TokenKind::Ident,
                text: String::new(),
                range: self.end_span(),
            },
        }
    }

    fn end_span(&self) -> Span {
        let end = self.tokens.last().map(|t| t.range.end).unwrap_or(0);
        Span::point(end)
    }

    fn current_start(&self) -> usize {
        self.peek()
            .map(|t| t.range.start)
            .unwrap_or_else(|| self.end_span().start)
    }

    // ---- compilation unit ---------------------------------------------

    pub(crate) fn parse_compilation_unit(&mut self, len: usize) -> ast::CompilationUnit {
        let package = if self.at_keyword("package") {
            Some(self.parse_package_decl())
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.at_keyword("import") {
            imports.push(self.parse_import_decl());
        }

        let mut types = Vec::new();
        while !self.is_eof() {
            if let Some(decl) = self.parse_type_decl() {
                types.push(decl);
            } else {
                self.bump();
            }
        }

        ast::CompilationUnit {
            package,
            imports,
            types,
            range: Span::new(0, len),
        }
    }

    fn parse_package_decl(&mut self) -> ast::PackageDecl {
        let kw = self.expect_ident();
        let (name, _) = self.parse_qualified_name();
        let semi = self.expect_kind(TokenKind::Semi);
        ast::PackageDecl {
            name,
            range: Span::new(kw.range.start, semi.range.end),
        }
    }

    fn parse_import_decl(&mut self) -> ast::ImportDecl {
        let kw = self.expect_ident();
        let mut is_static = false;
        if self.at_keyword("static") {
            is_static = true;
            self.bump();
        }

        let mut parts = Vec::new();
        let first = self.expect_ident();
        parts.push(first.text);

        let mut is_star = false;
        while self.at_kind(TokenKind::Dot) {
            self.bump();
            if self.at_kind(TokenKind::Star) {
                self.bump();
                is_star = true;
                break;
            }
            let part = self.expect_ident();
            parts.push(part.text);
        }

        let semi = self.expect_kind(TokenKind::Semi);
        ast::ImportDecl {
            is_static,
            is_star,
            path: parts.join("."),
            range: Span::new(kw.range.start, semi.range.end),
        }
    }

    fn parse_qualified_name(&mut self) -> (String, Span) {
        let first = self.expect_ident();
        let start = first.range.start;
        let mut end = first.range.end;
        let mut parts = vec![first.text];

        while self.at_kind(TokenKind::Dot)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::Ident)
        {
            self.bump();
            let part = self.expect_ident();
            end = part.range.end;
            parts.push(part.text);
        }

        (parts.join("."), Span::new(start, end))
    }

    // ---- declarations -------------------------------------------------

    fn parse_modifiers(&mut self) -> ast::Modifiers {
        let start = self.current_start();
        let mut mods = ast::Modifiers::none(start);
        let mut end = start;

        loop {
            if self.at_kind(TokenKind::At)
                && !self
                    .peek_n(1)
                    .is_some_and(|t| t.kind == TokenKind::Ident && t.text == "interface")
            {
                self.bump();
                if self.peek().is_some_and(|t| t.kind == TokenKind::Ident) {
                    self.parse_qualified_name();
                }
                if self.at_kind(TokenKind::LParen) {
                    end = self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                } else {
                    end = self.tokens[self.pos.saturating_sub(1)].range.end;
                }
                continue;
            }

            let Some(tok) = self.peek() else { break };
            if tok.kind != TokenKind::Ident {
                break;
            }
            let matched = match tok.text.as_str() {
                "public" => {
                    mods.visibility = ast::Visibility::Public;
                    true
                }
                "protected" => {
                    mods.visibility = ast::Visibility::Protected;
                    true
                }
                "private" => {
                    mods.visibility = ast::Visibility::Private;
                    true
                }
                "static" => {
                    // `static {` starts an initializer, not a modifier list.
                    if self.peek_n(1).is_some_and(|t| t.kind == TokenKind::LBrace) {
                        break;
                    }
                    mods.is_static = true;
                    true
                }
                "final" => {
                    mods.is_final = true;
                    true
                }
                "abstract" => {
                    mods.is_abstract = true;
                    true
                }
                "native" => {
                    mods.is_native = true;
                    true
                }
                "synchronized" => {
                    // `synchronized (` starts a statement.
                    if self.peek_n(1).is_some_and(|t| t.kind == TokenKind::LParen) {
                        break;
                    }
                    mods.is_synchronized = true;
                    true
                }
                "transient" => {
                    mods.is_transient = true;
                    true
                }
                "volatile" => {
                    mods.is_volatile = true;
                    true
                }
                "default" | "strictfp" => true,
                _ => false,
            };
            if !matched {
                break;
            }
            let tok = self.bump().unwrap_or_else(|| Token {
                kind: TokenKind::Ident,
                text: String::new(),
                range: self.end_span(),
            });
            end = tok.range.end;
        }

        mods.range = if end > start {
            Span::new(start, end)
        } else {
            Span::point(start)
        };
        mods
    }

    fn parse_type_decl(&mut self) -> Option<ast::TypeDecl> {
        let start_pos = self.pos;
        let start = self.peek()?.range.start;
        let modifiers = self.parse_modifiers();

        let kind = match self.peek() {
            Some(tok)
                if tok.kind == TokenKind::Ident
                    && matches!(tok.text.as_str(), "class" | "interface" | "enum") =>
            {
                tok.text.clone()
            }
            _ => {
                self.pos = start_pos;
                return None;
            }
        };

        self.bump();
        let name = self.expect_ident();

        // Type parameters on the declaration.
        if self.at_kind(TokenKind::Lt) {
            self.skip_balanced(TokenKind::Lt, TokenKind::Gt);
        }

        let mut extends = None;
        let mut extends_list = Vec::new();
        let mut implements = Vec::new();

        if self.at_keyword("extends") {
            self.bump();
            if kind == "interface" {
                extends_list = self.parse_type_ref_list();
            } else {
                extends = self.parse_type_ref();
            }
        }
        if self.at_keyword("implements") {
            self.bump();
            implements = self.parse_type_ref_list();
        }

        let is_enum = kind == "enum";
        let (members, body_range, end) = self.parse_type_body(name.text.as_str(), is_enum);
        let range = Span::new(start, end);

        match kind.as_str() {
            "class" => Some(ast::TypeDecl::Class(ast::ClassDecl {
                modifiers,
                name: name.text,
                name_range: name.range,
                extends,
                implements,
                members,
                body_range,
                range,
            })),
            "interface" => Some(ast::TypeDecl::Interface(ast::InterfaceDecl {
                modifiers,
                name: name.text,
                name_range: name.range,
                extends_list,
                members,
                body_range,
                range,
            })),
            "enum" => Some(ast::TypeDecl::Enum(ast::EnumDecl {
                modifiers,
                name: name.text,
                name_range: name.range,
                implements,
                members,
                body_range,
                range,
            })),
            _ => None,
        }
    }

    fn parse_type_ref_list(&mut self) -> Vec<ast::TypeRef> {
        let mut out = Vec::new();
        loop {
            match self.parse_type_ref() {
                Some(ty) => out.push(ty),
                None => break,
            }
            if self.at_kind(TokenKind::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn parse_type_body(
        &mut self,
        type_name: &str,
        is_enum: bool,
    ) -> (Vec<ast::MemberDecl>, Span, usize) {
        while !self.at_kind(TokenKind::LBrace) && !self.is_eof() {
            self.bump();
        }
        let lbrace = self.expect_kind(TokenKind::LBrace);
        let body_start = lbrace.range.start;

        if is_enum {
            self.skip_enum_constants();
        }

        let mut members = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            if let Some(member) = self.parse_member_decl(type_name) {
                members.push(member);
            } else {
                self.bump();
            }
        }

        let rbrace = self.expect_kind(TokenKind::RBrace);
        let body_range = Span::new(body_start, rbrace.range.end);
        (members, body_range, rbrace.range.end)
    }

    fn skip_enum_constants(&mut self) {
        if self.at_kind(TokenKind::Semi) {
            self.bump();
            return;
        }

        loop {
            if self.at_kind(TokenKind::Semi) {
                self.bump();
                break;
            }
            if self.at_kind(TokenKind::RBrace) || self.is_eof() {
                break;
            }

            self.parse_modifiers();
            if !self.at_kind(TokenKind::Ident) {
                break;
            }
            self.bump();

            if self.at_kind(TokenKind::LParen) {
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
            }
            if self.at_kind(TokenKind::LBrace) {
                self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
            }

            if self.at_kind(TokenKind::Comma) {
                self.bump();
                continue;
            }
            if self.at_kind(TokenKind::Semi) {
                self.bump();
                break;
            }
            if self.at_kind(TokenKind::RBrace) {
                break;
            }
            self.bump();
        }
    }

    fn parse_member_decl(&mut self, enclosing_type: &str) -> Option<ast::MemberDecl> {
        let start = self.peek()?.range.start;
        let modifiers = self.parse_modifiers();

        // Static/instance initializer blocks.
        if self.at_keyword("static") && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::LBrace)
        {
            self.bump();
            let body = self.parse_block();
            let range = Span::new(start, body.range.end);
            return Some(ast::MemberDecl::Initializer(ast::InitializerDecl {
                is_static: true,
                body,
                range,
            }));
        }
        if self.at_kind(TokenKind::LBrace) {
            let body = self.parse_block();
            let range = Span::new(start, body.range.end);
            return Some(ast::MemberDecl::Initializer(ast::InitializerDecl {
                is_static: false,
                body,
                range,
            }));
        }

        // Nested type; its modifiers were already consumed above.
        if self.peek().is_some_and(|ty| {
            ty.kind == TokenKind::Ident
                && matches!(ty.text.as_str(), "class" | "interface" | "enum")
        }) {
            let nested = self.parse_nested_type_decl(start, modifiers);
            return nested.map(ast::MemberDecl::Type);
        }

        // Generic method type parameters.
        if self.at_kind(TokenKind::Lt) {
            self.skip_balanced(TokenKind::Lt, TokenKind::Gt);
        }

        // Constructor: `TypeName (`.
        if self.peek().is_some_and(|t| t.kind == TokenKind::Ident)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::LParen)
        {
            let name = self.expect_ident();
            if name.text == enclosing_type {
                let params = self.parse_param_list();
                let throws = self.parse_throws_clause();
                let body = self.parse_block();
                let range = Span::new(start, body.range.end);
                return Some(ast::MemberDecl::Constructor(ast::ConstructorDecl {
                    modifiers,
                    name: name.text,
                    name_range: name.range,
                    params,
                    throws,
                    body,
                    range,
                }));
            }
            self.pos -= 1;
        }

        let return_ty = self.parse_type_ref()?;
        let name = self.expect_ident();

        if self.at_kind(TokenKind::LParen) {
            let params = self.parse_param_list();
            let throws = self.parse_throws_clause();

            if self.at_kind(TokenKind::Semi) {
                let semi = self.bump()?;
                let range = Span::new(start, semi.range.end);
                return Some(ast::MemberDecl::Method(ast::MethodDecl {
                    modifiers,
                    return_ty,
                    name: name.text,
                    name_range: name.range,
                    params,
                    throws,
                    body: None,
                    range,
                }));
            }

            let body = if self.at_kind(TokenKind::LBrace) {
                Some(self.parse_block())
            } else {
                None
            };
            let end = body
                .as_ref()
                .map(|b| b.range.end)
                .unwrap_or(name.range.end);
            let range = Span::new(start, end);
            return Some(ast::MemberDecl::Method(ast::MethodDecl {
                modifiers,
                return_ty,
                name: name.text,
                name_range: name.range,
                params,
                throws,
                body,
                range,
            }));
        }

        // Field. Array suffix after the name folds into the type text.
        let mut ty = return_ty;
        while self.at_kind(TokenKind::LBracket) {
            let lb = self.bump()?;
            let rb = self.expect_kind(TokenKind::RBracket);
            ty.text.push_str(&lb.text);
            ty.text.push_str(&rb.text);
        }

        let mut initializer = None;
        if self.at_kind(TokenKind::Eq) {
            self.bump();
            if self.at_kind(TokenKind::LBrace) {
                let init_start = self.current_start();
                let end = self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                initializer = Some(ast::Expr::Missing(Span::new(init_start, end)));
            } else {
                initializer = self.parse_expr();
            }
        }

        // Extra declarators (`int a, b;`) are skipped; the first declarator
        // is the one the engine models.
        while !self.is_eof() && !self.at_kind(TokenKind::Semi) {
            self.bump();
        }
        let semi = self.expect_kind(TokenKind::Semi);
        let range = Span::new(start, semi.range.end);
        Some(ast::MemberDecl::Field(ast::FieldDecl {
            modifiers,
            ty,
            name: name.text,
            name_range: name.range,
            initializer,
            range,
        }))
    }

    fn parse_nested_type_decl(
        &mut self,
        start: usize,
        modifiers: ast::Modifiers,
    ) -> Option<ast::TypeDecl> {
        let kind = self.bump()?.text;
        let name = self.expect_ident();
        if self.at_kind(TokenKind::Lt) {
            self.skip_balanced(TokenKind::Lt, TokenKind::Gt);
        }

        let mut extends = None;
        let mut extends_list = Vec::new();
        let mut implements = Vec::new();
        if self.at_keyword("extends") {
            self.bump();
            if kind == "interface" {
                extends_list = self.parse_type_ref_list();
            } else {
                extends = self.parse_type_ref();
            }
        }
        if self.at_keyword("implements") {
            self.bump();
            implements = self.parse_type_ref_list();
        }

        let (members, body_range, end) = self.parse_type_body(name.text.as_str(), kind == "enum");
        let range = Span::new(start, end);
        match kind.as_str() {
            "class" => Some(ast::TypeDecl::Class(ast::ClassDecl {
                modifiers,
                name: name.text,
                name_range: name.range,
                extends,
                implements,
                members,
                body_range,
                range,
            })),
            "interface" => Some(ast::TypeDecl::Interface(ast::InterfaceDecl {
                modifiers,
                name: name.text,
                name_range: name.range,
                extends_list,
                members,
                body_range,
                range,
            })),
            "enum" => Some(ast::TypeDecl::Enum(ast::EnumDecl {
                modifiers,
                name: name.text,
                name_range: name.range,
                implements,
                members,
                body_range,
                range,
            })),
            _ => None,
        }
    }

    fn parse_throws_clause(&mut self) -> Vec<ast::TypeRef> {
        if !self.at_keyword("throws") {
            return Vec::new();
        }
        self.bump();
        self.parse_type_ref_list()
    }

    fn parse_type_ref(&mut self) -> Option<ast::TypeRef> {
        let first = self.peek()?;
        if first.kind != TokenKind::Ident {
            return None;
        }
        let first = self.expect_ident();
        let start = first.range.start;
        let mut end = first.range.end;
        let mut text = first.text;

        while self.at_kind(TokenKind::Dot)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::Ident)
        {
            let dot = self.bump()?;
            let part = self.expect_ident();
            text.push_str(&dot.text);
            text.push_str(&part.text);
            end = part.range.end;
        }

        if self.at_kind(TokenKind::Lt) {
            let (generic_text, generic_end) = self.collect_balanced(TokenKind::Lt, TokenKind::Gt);
            text.push_str(&generic_text);
            end = generic_end;
        }

        while self.at_kind(TokenKind::LBracket)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::RBracket)
        {
            let lb = self.bump()?;
            text.push_str(&lb.text);
            let rb = self.expect_kind(TokenKind::RBracket);
            text.push_str(&rb.text);
            end = rb.range.end;
        }

        Some(ast::TypeRef {
            text,
            range: Span::new(start, end),
        })
    }

    fn parse_param_list(&mut self) -> Vec<ast::ParamDecl> {
        let _lparen = self.expect_kind(TokenKind::LParen);
        let mut params = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
            let mut is_final = false;
            loop {
                if self.at_keyword("final") {
                    is_final = true;
                    self.bump();
                    continue;
                }
                if self.at_kind(TokenKind::At) {
                    self.bump();
                    if self.peek().is_some_and(|t| t.kind == TokenKind::Ident) {
                        self.parse_qualified_name();
                    }
                    if self.at_kind(TokenKind::LParen) {
                        self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                    }
                    continue;
                }
                break;
            }

            if let Some(mut ty) = self.parse_type_ref() {
                let mut is_vararg = false;
                if self.at_kind(TokenKind::Ellipsis) {
                    let dots = self.bump().unwrap_or_else(|| Token {
                        kind: TokenKind::Ellipsis,
                        text: "...".to_string(),
                        range: self.end_span(),
                    });
                    ty.text.push_str(&dots.text);
                    ty.range = Span::new(ty.range.start, dots.range.end);
                    is_vararg = true;
                }

                let name = self.expect_ident();
                let range = Span::new(ty.range.start, name.range.end);
                params.push(ast::ParamDecl {
                    is_final,
                    ty,
                    is_vararg,
                    name: name.text,
                    name_range: name.range,
                    range,
                });
            } else {
                self.bump();
            }

            if self.at_kind(TokenKind::Comma) {
                self.bump();
            }
        }
        self.expect_kind(TokenKind::RParen);
        params
    }

    // ---- statements ---------------------------------------------------

    pub(crate) fn parse_block(&mut self) -> ast::Block {
        let lbrace = self.expect_kind(TokenKind::LBrace);
        let start = lbrace.range.start;
        let mut statements = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            if let Some(stmt) = self.parse_stmt() {
                statements.push(stmt);
            } else {
                self.bump();
            }
        }
        let rbrace = self.expect_kind(TokenKind::RBrace);
        ast::Block {
            statements,
            range: Span::new(start, rbrace.range.end),
        }
    }

    fn parse_stmt(&mut self) -> Option<ast::Stmt> {
        if self.at_kind(TokenKind::Semi) {
            let semi = self.bump()?;
            return Some(ast::Stmt::Empty(semi.range));
        }
        if self.at_kind(TokenKind::LBrace) {
            return Some(ast::Stmt::Block(self.parse_block()));
        }

        if self.at_keyword("return") {
            let kw = self.bump()?;
            if self.at_kind(TokenKind::Semi) {
                let semi = self.bump()?;
                return Some(ast::Stmt::Return(ast::ReturnStmt {
                    expr: None,
                    range: Span::new(kw.range.start, semi.range.end),
                }));
            }
            let expr = self.parse_expr().unwrap_or(ast::Expr::Missing(kw.range));
            let semi = self.expect_kind(TokenKind::Semi);
            return Some(ast::Stmt::Return(ast::ReturnStmt {
                expr: Some(expr),
                range: Span::new(kw.range.start, semi.range.end),
            }));
        }

        if self.at_keyword("if") {
            return self.parse_if_stmt();
        }
        if self.at_keyword("while") {
            return self.parse_while_stmt();
        }
        if self.at_keyword("do") {
            return self.parse_do_while_stmt();
        }
        if self.at_keyword("for") {
            return self.parse_for_stmt();
        }
        if self.at_keyword("throw") {
            let kw = self.bump()?;
            let expr = self.parse_expr().unwrap_or(ast::Expr::Missing(kw.range));
            let semi = self.expect_kind(TokenKind::Semi);
            return Some(ast::Stmt::Throw(ast::ThrowStmt {
                expr,
                range: Span::new(kw.range.start, semi.range.end),
            }));
        }
        if self.at_keyword("break") || self.at_keyword("continue") {
            let is_break = self.at_keyword("break");
            let kw = self.bump()?;
            let (label, label_range) = if self.at_kind(TokenKind::Ident) {
                let tok = self.bump()?;
                (Some(tok.text), Some(tok.range))
            } else {
                (None, None)
            };
            let semi = self.expect_kind(TokenKind::Semi);
            let range = Span::new(kw.range.start, semi.range.end);
            return Some(if is_break {
                ast::Stmt::Break(ast::BreakStmt {
                    label,
                    label_range,
                    range,
                })
            } else {
                ast::Stmt::Continue(ast::ContinueStmt {
                    label,
                    label_range,
                    range,
                })
            });
        }
        if self.at_keyword("switch") || self.at_keyword("try") || self.at_keyword("synchronized") {
            return Some(self.parse_opaque_stmt());
        }

        // Labeled statement: `name : stmt`.
        if self.at_kind(TokenKind::Ident)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::Colon)
        {
            let label = self.bump()?;
            self.bump();
            let body = self
                .parse_stmt()
                .unwrap_or(ast::Stmt::Empty(label.range));
            let range = Span::new(label.range.start, body.range().end);
            return Some(ast::Stmt::Labeled(ast::LabeledStmt {
                label: label.text,
                label_range: label.range,
                body: Box::new(body),
                range,
            }));
        }

        if let Some(local) = self.try_parse_local_var_stmt() {
            return Some(local);
        }

        let expr = match self.parse_expr() {
            Some(expr) => expr,
            None => ast::Expr::Missing(self.peek()?.range),
        };
        let start = expr.range().start;
        let semi = self.expect_kind(TokenKind::Semi);
        Some(ast::Stmt::Expr(ast::ExprStmt {
            expr,
            range: Span::new(start, semi.range.end),
        }))
    }

    fn parse_if_stmt(&mut self) -> Option<ast::Stmt> {
        let kw = self.bump()?;
        self.expect_kind(TokenKind::LParen);
        let condition = self.parse_expr().unwrap_or(ast::Expr::Missing(kw.range));
        self.expect_kind(TokenKind::RParen);
        let then_branch = self.parse_stmt()?;
        let mut end = then_branch.range().end;
        let else_branch = if self.at_keyword("else") {
            self.bump();
            let stmt = self.parse_stmt()?;
            end = stmt.range().end;
            Some(Box::new(stmt))
        } else {
            None
        };
        Some(ast::Stmt::If(ast::IfStmt {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
            range: Span::new(kw.range.start, end),
        }))
    }

    fn parse_while_stmt(&mut self) -> Option<ast::Stmt> {
        let kw = self.bump()?;
        self.expect_kind(TokenKind::LParen);
        let condition = self.parse_expr().unwrap_or(ast::Expr::Missing(kw.range));
        self.expect_kind(TokenKind::RParen);
        let body = self.parse_stmt()?;
        let range = Span::new(kw.range.start, body.range().end);
        Some(ast::Stmt::While(ast::WhileStmt {
            condition,
            body: Box::new(body),
            range,
        }))
    }

    fn parse_do_while_stmt(&mut self) -> Option<ast::Stmt> {
        let kw = self.bump()?;
        let body = self.parse_stmt()?;
        // `while (cond);`
        if self.at_keyword("while") {
            self.bump();
        }
        self.expect_kind(TokenKind::LParen);
        let condition = self.parse_expr().unwrap_or(ast::Expr::Missing(kw.range));
        self.expect_kind(TokenKind::RParen);
        let semi = self.expect_kind(TokenKind::Semi);
        Some(ast::Stmt::DoWhile(ast::DoWhileStmt {
            body: Box::new(body),
            condition,
            range: Span::new(kw.range.start, semi.range.end),
        }))
    }

    fn parse_for_stmt(&mut self) -> Option<ast::Stmt> {
        let kw = self.bump()?;
        self.expect_kind(TokenKind::LParen);

        // For-each: `for (Type name : iterable)`.
        let save = self.pos;
        if self.at_keyword("final") {
            self.bump();
        }
        if let Some(var_ty) = self.parse_type_ref() {
            if self.at_kind(TokenKind::Ident)
                && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::Colon)
            {
                let name = self.expect_ident();
                self.bump();
                let iterable = self.parse_expr().unwrap_or(ast::Expr::Missing(kw.range));
                self.expect_kind(TokenKind::RParen);
                let body = self.parse_stmt()?;
                let range = Span::new(kw.range.start, body.range().end);
                return Some(ast::Stmt::ForEach(ast::ForEachStmt {
                    var_ty,
                    var_name: name.text,
                    var_name_range: name.range,
                    iterable,
                    body: Box::new(body),
                    range,
                }));
            }
        }
        self.pos = save;

        // Classic `for (init; cond; update)`.
        let mut init = Vec::new();
        if self.at_kind(TokenKind::Semi) {
            self.bump();
        } else if let Some(local) = self.try_parse_local_var_stmt() {
            init.push(local);
        } else {
            loop {
                if let Some(expr) = self.parse_expr() {
                    let range = expr.range();
                    init.push(ast::Stmt::Expr(ast::ExprStmt { expr, range }));
                }
                if self.at_kind(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
            self.expect_kind(TokenKind::Semi);
        }

        let condition = if self.at_kind(TokenKind::Semi) {
            None
        } else {
            self.parse_expr()
        };
        self.expect_kind(TokenKind::Semi);

        let update_start = self.current_start();
        let mut update = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
            if let Some(expr) = self.parse_expr() {
                update.push(expr);
            } else {
                self.bump();
            }
            if self.at_kind(TokenKind::Comma) {
                self.bump();
            }
        }
        let rparen = self.expect_kind(TokenKind::RParen);
        let update_range = if update.is_empty() {
            Span::point(update_start)
        } else {
            Span::new(update_start, rparen.range.start)
        };

        let body = self.parse_stmt()?;
        let range = Span::new(kw.range.start, body.range().end);
        Some(ast::Stmt::For(ast::ForStmt {
            init,
            condition,
            update,
            update_range,
            body: Box::new(body),
            range,
        }))
    }

    /// `switch` / `try` / `synchronized` statements are consumed whole.
    fn parse_opaque_stmt(&mut self) -> ast::Stmt {
        let kw = self.bump().expect("caller checked keyword");
        let is_try = kw.text == "try";
        let mut end = kw.range.end;

        if self.at_kind(TokenKind::LParen) {
            end = self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
        }
        if self.at_kind(TokenKind::LBrace) {
            end = self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
        }
        if is_try {
            while self.at_keyword("catch") {
                self.bump();
                if self.at_kind(TokenKind::LParen) {
                    self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                }
                if self.at_kind(TokenKind::LBrace) {
                    end = self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                }
            }
            if self.at_keyword("finally") {
                self.bump();
                if self.at_kind(TokenKind::LBrace) {
                    end = self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                }
            }
        }

        ast::Stmt::Opaque(Span::new(kw.range.start, end))
    }

    fn try_parse_local_var_stmt(&mut self) -> Option<ast::Stmt> {
        let start_pos = self.pos;
        let start = self.peek()?.range.start;

        let mut is_final = false;
        if self.at_keyword("final") {
            is_final = true;
            self.bump();
        }

        let mut ty = match self.parse_type_ref() {
            Some(ty) => ty,
            None => {
                self.pos = start_pos;
                return None;
            }
        };

        if !self.peek().is_some_and(|t| t.kind == TokenKind::Ident) {
            self.pos = start_pos;
            return None;
        }
        let name = self.expect_ident();

        // Array suffix after the name.
        while self.at_kind(TokenKind::LBracket)
            && self.peek_n(1).is_some_and(|t| t.kind == TokenKind::RBracket)
        {
            let lb = self.bump()?;
            let rb = self.expect_kind(TokenKind::RBracket);
            ty.text.push_str(&lb.text);
            ty.text.push_str(&rb.text);
        }

        if !self.at_kind(TokenKind::Eq) && !self.at_kind(TokenKind::Semi) {
            self.pos = start_pos;
            return None;
        }

        let mut initializer = None;
        if self.at_kind(TokenKind::Eq) {
            self.bump();
            if self.at_kind(TokenKind::LBrace) {
                let init_start = self.current_start();
                let end = self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                initializer = Some(ast::Expr::Missing(Span::new(init_start, end)));
            } else {
                initializer = self.parse_expr();
            }
        }
        let semi = self.expect_kind(TokenKind::Semi);
        let range = Span::new(start, semi.range.end);
        Some(ast::Stmt::LocalVar(ast::LocalVarStmt {
            is_final,
            ty,
            name: name.text,
            name_range: name.range,
            initializer,
            range,
        }))
    }

    // ---- expressions --------------------------------------------------

    fn parse_expr(&mut self) -> Option<ast::Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<ast::Expr> {
        let lhs = self.parse_conditional()?;

        let op = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Eq) => None,
            Some(TokenKind::PlusEq) => Some(ast::BinaryOp::Add),
            Some(TokenKind::MinusEq) => Some(ast::BinaryOp::Sub),
            Some(TokenKind::StarEq) => Some(ast::BinaryOp::Mul),
            Some(TokenKind::SlashEq) => Some(ast::BinaryOp::Div),
            Some(TokenKind::PercentEq) => Some(ast::BinaryOp::Rem),
            Some(TokenKind::AmpEq) => Some(ast::BinaryOp::BitAnd),
            Some(TokenKind::PipeEq) => Some(ast::BinaryOp::BitOr),
            Some(TokenKind::CaretEq) => Some(ast::BinaryOp::BitXor),
            Some(TokenKind::ShlEq) => Some(ast::BinaryOp::Shl),
            Some(TokenKind::ShrEq) => Some(ast::BinaryOp::Shr),
            Some(TokenKind::UShrEq) => Some(ast::BinaryOp::UShr),
            _ => return Some(lhs),
        };

        self.bump();
        let rhs = self
            .parse_assignment()
            .unwrap_or(ast::Expr::Missing(lhs.range()));
        let range = Span::new(lhs.range().start, rhs.range().end);
        Some(ast::Expr::Assign(ast::AssignExpr {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
            range,
        }))
    }

    fn parse_conditional(&mut self) -> Option<ast::Expr> {
        let condition = self.parse_binary(0)?;
        if !self.at_kind(TokenKind::Question) {
            return Some(condition);
        }
        self.bump();
        let then_expr = self
            .parse_expr()
            .unwrap_or(ast::Expr::Missing(condition.range()));
        self.expect_kind(TokenKind::Colon);
        let else_expr = self
            .parse_expr()
            .unwrap_or(ast::Expr::Missing(condition.range()));
        let range = Span::new(condition.range().start, else_expr.range().end);
        Some(ast::Expr::Conditional(ast::ConditionalExpr {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            range,
        }))
    }

    fn binary_op_at(&self) -> Option<ast::BinaryOp> {
        match self.peek().map(|t| t.kind)? {
            TokenKind::Star => Some(ast::BinaryOp::Mul),
            TokenKind::Slash => Some(ast::BinaryOp::Div),
            TokenKind::Percent => Some(ast::BinaryOp::Rem),
            TokenKind::Plus => Some(ast::BinaryOp::Add),
            TokenKind::Minus => Some(ast::BinaryOp::Sub),
            TokenKind::Shl => Some(ast::BinaryOp::Shl),
            TokenKind::Shr => Some(ast::BinaryOp::Shr),
            TokenKind::UShr => Some(ast::BinaryOp::UShr),
            TokenKind::Lt => Some(ast::BinaryOp::Lt),
            TokenKind::Gt => Some(ast::BinaryOp::Gt),
            TokenKind::Le => Some(ast::BinaryOp::Le),
            TokenKind::Ge => Some(ast::BinaryOp::Ge),
            TokenKind::EqEq => Some(ast::BinaryOp::Eq),
            TokenKind::Ne => Some(ast::BinaryOp::Ne),
            TokenKind::Amp => Some(ast::BinaryOp::BitAnd),
            TokenKind::Caret => Some(ast::BinaryOp::BitXor),
            TokenKind::Pipe => Some(ast::BinaryOp::BitOr),
            TokenKind::AmpAmp => Some(ast::BinaryOp::And),
            TokenKind::PipePipe => Some(ast::BinaryOp::Or),
            _ => None,
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<ast::Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            if self.at_keyword("instanceof") {
                // Same precedence tier as relational operators.
                if 9 < min_prec {
                    break;
                }
                self.bump();
                let Some(ty) = self.parse_type_ref() else {
                    break;
                };
                let range = Span::new(lhs.range().start, ty.range.end);
                lhs = ast::Expr::Instanceof(ast::InstanceofExpr {
                    expr: Box::new(lhs),
                    ty,
                    range,
                });
                continue;
            }

            let Some(op) = self.binary_op_at() else { break };
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self
                .parse_binary(prec + 1)
                .unwrap_or(ast::Expr::Missing(lhs.range()));
            let range = Span::new(lhs.range().start, rhs.range().end);
            lhs = ast::Expr::Binary(ast::BinaryExpr {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                range,
            });
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<ast::Expr> {
        let op = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Plus) => Some(ast::UnaryOp::Plus),
            Some(TokenKind::Minus) => Some(ast::UnaryOp::Minus),
            Some(TokenKind::Not) => Some(ast::UnaryOp::Not),
            Some(TokenKind::Tilde) => Some(ast::UnaryOp::BitNot),
            Some(TokenKind::PlusPlus) => Some(ast::UnaryOp::PreInc),
            Some(TokenKind::MinusMinus) => Some(ast::UnaryOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            let tok = self.bump()?;
            let expr = self
                .parse_unary()
                .unwrap_or(ast::Expr::Missing(tok.range));
            let range = Span::new(tok.range.start, expr.range().end);
            return Some(ast::Expr::Unary(ast::UnaryExpr {
                op,
                expr: Box::new(expr),
                range,
            }));
        }

        if self.at_kind(TokenKind::LParen) {
            if let Some(cast) = self.try_parse_cast() {
                return Some(cast);
            }
        }

        self.parse_postfix()
    }

    fn try_parse_cast(&mut self) -> Option<ast::Expr> {
        let start_pos = self.pos;
        let lparen = self.bump()?;
        let Some(ty) = self.parse_type_ref() else {
            self.pos = start_pos;
            return None;
        };
        if !self.at_kind(TokenKind::RParen) {
            self.pos = start_pos;
            return None;
        }

        let is_primitive = matches!(
            ty.text.as_str(),
            "byte" | "short" | "int" | "long" | "float" | "double" | "char" | "boolean"
        );
        let operand_follows = match self.peek_n(1) {
            Some(t) => matches!(
                t.kind,
                TokenKind::Ident
                    | TokenKind::IntLiteral
                    | TokenKind::FloatLiteral
                    | TokenKind::CharLiteral
                    | TokenKind::StringLiteral
                    | TokenKind::LParen
                    | TokenKind::Not
                    | TokenKind::Tilde
            ),
            None => false,
        };
        if !is_primitive && !operand_follows {
            self.pos = start_pos;
            return None;
        }

        self.bump();
        let expr = self
            .parse_unary()
            .unwrap_or(ast::Expr::Missing(lparen.range));
        let range = Span::new(lparen.range.start, expr.range().end);
        Some(ast::Expr::Cast(ast::CastExpr {
            ty,
            expr: Box::new(expr),
            range,
        }))
    }

    fn parse_postfix(&mut self) -> Option<ast::Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.at_kind(TokenKind::Dot) {
                self.bump();
                let name = self.expect_ident();
                let range = Span::new(expr.range().start, name.range.end);
                expr = ast::Expr::FieldAccess(ast::FieldAccessExpr {
                    receiver: Box::new(expr),
                    name: name.text,
                    name_range: name.range,
                    range,
                });
                continue;
            }
            if self.at_kind(TokenKind::ColonColon) {
                self.bump();
                let name = self.expect_ident();
                let range = Span::new(expr.range().start, name.range.end);
                expr = ast::Expr::MethodRef(ast::MethodRefExpr {
                    receiver: Box::new(expr),
                    name: name.text,
                    name_range: name.range,
                    range,
                });
                continue;
            }
            if self.at_kind(TokenKind::LParen) {
                let (args, rparen_end) = self.parse_arg_list();
                let range = Span::new(expr.range().start, rparen_end);
                expr = ast::Expr::Call(ast::CallExpr {
                    callee: Box::new(expr),
                    args,
                    range,
                });
                continue;
            }
            if self.at_kind(TokenKind::LBracket) {
                self.bump();
                let index = self
                    .parse_expr()
                    .unwrap_or(ast::Expr::Missing(expr.range()));
                let rb = self.expect_kind(TokenKind::RBracket);
                let range = Span::new(expr.range().start, rb.range.end);
                expr = ast::Expr::ArrayAccess(ast::ArrayAccessExpr {
                    array: Box::new(expr),
                    index: Box::new(index),
                    range,
                });
                continue;
            }
            if self.at_kind(TokenKind::PlusPlus) || self.at_kind(TokenKind::MinusMinus) {
                let op = if self.at_kind(TokenKind::PlusPlus) {
                    ast::PostfixOp::Inc
                } else {
                    ast::PostfixOp::Dec
                };
                let tok = self.bump()?;
                let range = Span::new(expr.range().start, tok.range.end);
                expr = ast::Expr::Postfix(ast::PostfixExpr {
                    op,
                    expr: Box::new(expr),
                    range,
                });
                continue;
            }
            break;
        }
        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<ast::Expr> {
        if self.at_keyword("new") {
            return self.parse_new_expr();
        }

        let tok = self.bump()?;
        let expr = match tok.kind {
            TokenKind::Ident => match tok.text.as_str() {
                "this" => ast::Expr::This(tok.range),
                "super" => ast::Expr::Super(tok.range),
                "true" | "false" => ast::Expr::Literal(ast::LiteralExpr {
                    kind: ast::LiteralKind::Bool,
                    text: tok.text,
                    range: tok.range,
                }),
                "null" => ast::Expr::Literal(ast::LiteralExpr {
                    kind: ast::LiteralKind::Null,
                    text: tok.text,
                    range: tok.range,
                }),
                _ => ast::Expr::Name(ast::NameExpr {
                    name: tok.text,
                    range: tok.range,
                }),
            },
            TokenKind::IntLiteral => {
                let kind = if tok.text.ends_with('l') || tok.text.ends_with('L') {
                    ast::LiteralKind::Long
                } else {
                    ast::LiteralKind::Int
                };
                ast::Expr::Literal(ast::LiteralExpr {
                    kind,
                    text: tok.text,
                    range: tok.range,
                })
            }
            TokenKind::FloatLiteral => {
                let kind = if tok.text.ends_with('f') || tok.text.ends_with('F') {
                    ast::LiteralKind::Float
                } else {
                    ast::LiteralKind::Double
                };
                ast::Expr::Literal(ast::LiteralExpr {
                    kind,
                    text: tok.text,
                    range: tok.range,
                })
            }
            TokenKind::CharLiteral => ast::Expr::Literal(ast::LiteralExpr {
                kind: ast::LiteralKind::Char,
                text: tok.text,
                range: tok.range,
            }),
            TokenKind::StringLiteral => ast::Expr::Literal(ast::LiteralExpr {
                kind: ast::LiteralKind::Str,
                text: tok.text,
                range: tok.range,
            }),
            TokenKind::LParen => {
                let inner = self.parse_expr().unwrap_or(ast::Expr::Missing(tok.range));
                let rparen = self.expect_kind(TokenKind::RParen);
                ast::Expr::Paren(ast::ParenExpr {
                    inner: Box::new(inner),
                    range: Span::new(tok.range.start, rparen.range.end),
                })
            }
            _ => ast::Expr::Missing(tok.range),
        };
        Some(expr)
    }

    fn parse_new_expr(&mut self) -> Option<ast::Expr> {
        let kw = self.bump()?;
        let Some(ty) = self.parse_type_ref() else {
            return Some(ast::Expr::Missing(kw.range));
        };

        if self.at_kind(TokenKind::LBracket) {
            let mut dims = Vec::new();
            let mut end = ty.range.end;
            while self.at_kind(TokenKind::LBracket) {
                self.bump();
                if !self.at_kind(TokenKind::RBracket) {
                    if let Some(dim) = self.parse_expr() {
                        dims.push(dim);
                    }
                }
                let rb = self.expect_kind(TokenKind::RBracket);
                end = rb.range.end;
            }
            return Some(ast::Expr::NewArray(ast::NewArrayExpr {
                ty,
                dims,
                range: Span::new(kw.range.start, end),
            }));
        }

        let (args, rparen_end) = self.parse_arg_list();
        // Anonymous class bodies are consumed but not modeled.
        let end = if self.at_kind(TokenKind::LBrace) {
            self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace)
        } else {
            rparen_end
        };
        Some(ast::Expr::New(ast::NewExpr {
            ty,
            args,
            range: Span::new(kw.range.start, end),
        }))
    }

    fn parse_arg_list(&mut self) -> (Vec<ast::Expr>, usize) {
        let lparen = self.expect_kind(TokenKind::LParen);
        let mut args = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
            if let Some(expr) = self.parse_expr() {
                args.push(expr);
            } else {
                self.bump();
            }
            if self.at_kind(TokenKind::Comma) {
                self.bump();
            }
        }
        let rparen = self.expect_kind(TokenKind::RParen);
        let end = if rparen.kind == TokenKind::RParen {
            rparen.range.end
        } else {
            lparen.range.end
        };
        (args, end)
    }

    // ---- token-level recovery -----------------------------------------

    /// Skips a balanced token run, returning the end offset of the close.
    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) -> usize {
        if !self.at_kind(open) {
            return self.current_start();
        }
        let mut end = self.peek().map(|t| t.range.end).unwrap_or(0);
        self.bump();
        let mut depth = 1usize;
        while !self.is_eof() && depth > 0 {
            match self.peek().map(|t| t.kind) {
                Some(k) if k == open => depth += 1,
                Some(k) if k == close => depth -= 1,
                _ => {}
            }
            if let Some(tok) = self.bump() {
                end = tok.range.end;
            }
        }
        end
    }

    fn collect_balanced(&mut self, open: TokenKind, close: TokenKind) -> (String, usize) {
        if !self.at_kind(open) {
            return (String::new(), self.current_start());
        }
        let mut text = String::new();
        let mut end = self.peek().map(|t| t.range.end).unwrap_or(0);
        let mut depth = 0usize;
        while !self.is_eof() {
            let Some(tok) = self.bump() else { break };
            if tok.kind == open {
                depth += 1;
            } else if tok.kind == close {
                depth = depth.saturating_sub(1);
            }
            text.push_str(&tok.text);
            end = tok.range.end;
            if depth == 0 {
                break;
            }
        }
        (text, end)
    }
}
