use crate::ast::{
    BinaryOp, Expr, LiteralKind, MemberDecl, Stmt, TypeDecl, UnaryOp, Visibility,
};
use crate::parse;
use pretty_assertions::assert_eq;

fn first_class(parse: &crate::Parse) -> &crate::ast::ClassDecl {
    match &parse.compilation_unit().types[0] {
        TypeDecl::Class(decl) => decl,
        other => panic!("expected class, got {other:?}"),
    }
}

fn method<'a>(class: &'a crate::ast::ClassDecl, name: &str) -> &'a crate::ast::MethodDecl {
    class
        .members
        .iter()
        .find_map(|m| match m {
            MemberDecl::Method(m) if m.name == name => Some(m),
            _ => None,
        })
        .unwrap_or_else(|| panic!("method {name} not found"))
}

#[test]
fn parses_unit_structure() {
    let src = r#"package com.example;

import java.util.List;
import static java.lang.Math.*;

public class Account {
    private int balance;

    public int getBalance() { return balance; }
}
"#;
    let parsed = parse(src);
    let unit = parsed.compilation_unit();
    assert_eq!(unit.package.as_ref().unwrap().name, "com.example");
    assert_eq!(unit.imports.len(), 2);
    assert!(unit.imports[1].is_static && unit.imports[1].is_star);

    let class = first_class(&parsed);
    assert_eq!(class.name, "Account");
    assert_eq!(class.modifiers.visibility, Visibility::Public);
    assert_eq!(class.members.len(), 2);

    let MemberDecl::Field(field) = &class.members[0] else {
        panic!("expected field");
    };
    assert_eq!(field.name, "balance");
    assert_eq!(field.ty.text, "int");
    assert_eq!(field.modifiers.visibility, Visibility::Private);
    assert_eq!(&src[field.name_range.start..field.name_range.end], "balance");
}

#[test]
fn parses_extends_implements_and_nested_types() {
    let src = r#"class Child extends Parent implements Runnable, Closeable {
    static class Inner {}
}
"#;
    let parsed = parse(src);
    let class = first_class(&parsed);
    assert_eq!(class.extends.as_ref().unwrap().text, "Parent");
    assert_eq!(class.implements.len(), 2);
    assert!(matches!(
        class.members[0],
        MemberDecl::Type(TypeDecl::Class(_))
    ));
}

#[test]
fn parses_varargs_and_throws() {
    let src = r#"class A {
    void log(String fmt, Object... args) throws IOException {}
}
"#;
    let parsed = parse(src);
    let m = method(first_class(&parsed), "log");
    assert_eq!(m.params.len(), 2);
    assert!(!m.params[0].is_vararg);
    assert!(m.params[1].is_vararg);
    assert_eq!(m.params[1].ty.text, "Object...");
    assert_eq!(m.throws.len(), 1);
    assert_eq!(m.throws[0].text, "IOException");
}

#[test]
fn parses_control_flow_statements() {
    let src = r#"class A {
    void run(int n) {
        for (int i = 0; i < n; i++) { step(i); }
        for (String s : names) { use(s); }
        while (n > 0) n--;
        do { n++; } while (n < 10);
        outer: for (;;) { break outer; }
        if (n == 3) return; else n = 4;
    }
}
"#;
    let parsed = parse(src);
    let body = method(first_class(&parsed), "run").body.as_ref().unwrap();
    assert!(matches!(body.statements[0], Stmt::For(_)));
    assert!(matches!(body.statements[1], Stmt::ForEach(_)));
    assert!(matches!(body.statements[2], Stmt::While(_)));
    assert!(matches!(body.statements[3], Stmt::DoWhile(_)));
    let Stmt::Labeled(labeled) = &body.statements[4] else {
        panic!("expected labeled statement");
    };
    assert_eq!(labeled.label, "outer");
    let Stmt::For(for_stmt) = labeled.body.as_ref() else {
        panic!("expected for under label");
    };
    let Stmt::Block(block) = for_stmt.body.as_ref() else {
        panic!("expected block body");
    };
    let Stmt::Break(brk) = &block.statements[0] else {
        panic!("expected break");
    };
    assert_eq!(brk.label.as_deref(), Some("outer"));
    assert!(matches!(body.statements[5], Stmt::If(_)));
}

#[test]
fn for_update_range_covers_update_list() {
    let src = "class A { void f() { for (int i = 0; i < 3; i++, j--) {} } }";
    let parsed = parse(src);
    let body = method(first_class(&parsed), "f").body.as_ref().unwrap();
    let Stmt::For(for_stmt) = &body.statements[0] else {
        panic!("expected for");
    };
    assert_eq!(for_stmt.update.len(), 2);
    assert_eq!(
        &src[for_stmt.update_range.start..for_stmt.update_range.end],
        "i++, j--"
    );
}

#[test]
fn parses_expression_forms() {
    let src = r#"class A {
    void f() {
        x = a * b + c;
        count += 2;
        count++;
        --count;
        y = flag ? (int) v : arr[i];
        z = this.field.m(1, "s").n;
        r = Helper::convert;
        w = new Point(1, 2);
        g = new int[10];
        b = o instanceof Point;
    }
}
"#;
    let parsed = parse(src);
    let body = method(first_class(&parsed), "f").body.as_ref().unwrap();

    let stmt_expr = |i: usize| -> &Expr {
        let Stmt::Expr(stmt) = &body.statements[i] else {
            panic!("expected expr stmt at {i}");
        };
        &stmt.expr
    };

    let Expr::Assign(assign) = stmt_expr(0) else {
        panic!("expected assignment");
    };
    assert!(assign.op.is_none());
    let Expr::Binary(add) = assign.rhs.as_ref() else {
        panic!("expected binary rhs");
    };
    assert_eq!(add.op, BinaryOp::Add);
    let Expr::Binary(mul) = add.lhs.as_ref() else {
        panic!("expected mul on the left");
    };
    assert_eq!(mul.op, BinaryOp::Mul);

    let Expr::Assign(compound) = stmt_expr(1) else {
        panic!("expected compound assignment");
    };
    assert_eq!(compound.op, Some(BinaryOp::Add));

    assert!(matches!(stmt_expr(2), Expr::Postfix(_)));
    let Expr::Unary(pre) = stmt_expr(3) else {
        panic!("expected prefix decrement");
    };
    assert_eq!(pre.op, UnaryOp::PreDec);

    let Expr::Assign(cond_assign) = stmt_expr(4) else {
        panic!("expected assignment");
    };
    let Expr::Conditional(cond) = cond_assign.rhs.as_ref() else {
        panic!("expected conditional");
    };
    assert!(matches!(cond.then_expr.as_ref(), Expr::Cast(_)));
    assert!(matches!(cond.else_expr.as_ref(), Expr::ArrayAccess(_)));

    let Expr::Assign(chain) = stmt_expr(5) else {
        panic!("expected assignment");
    };
    let Expr::FieldAccess(outer) = chain.rhs.as_ref() else {
        panic!("expected trailing field access");
    };
    assert_eq!(outer.name, "n");
    assert!(matches!(outer.receiver.as_ref(), Expr::Call(_)));

    let Expr::Assign(mref) = stmt_expr(6) else {
        panic!("expected assignment");
    };
    assert!(matches!(mref.rhs.as_ref(), Expr::MethodRef(_)));

    let Expr::Assign(new_assign) = stmt_expr(7) else {
        panic!("expected assignment");
    };
    let Expr::New(new_expr) = new_assign.rhs.as_ref() else {
        panic!("expected new");
    };
    assert_eq!(new_expr.ty.text, "Point");
    assert_eq!(new_expr.args.len(), 2);

    let Expr::Assign(arr_assign) = stmt_expr(8) else {
        panic!("expected assignment");
    };
    assert!(matches!(arr_assign.rhs.as_ref(), Expr::NewArray(_)));

    let Expr::Assign(inst_assign) = stmt_expr(9) else {
        panic!("expected assignment");
    };
    assert!(matches!(inst_assign.rhs.as_ref(), Expr::Instanceof(_)));
}

#[test]
fn literal_kinds() {
    let src = r#"class A { void f() { a = 1; b = 2L; c = 1.5f; d = 2.5; e = 'x'; s = "hi"; n = null; t = true; } }"#;
    let parsed = parse(src);
    let body = method(first_class(&parsed), "f").body.as_ref().unwrap();
    let kinds: Vec<LiteralKind> = body
        .statements
        .iter()
        .map(|stmt| {
            let Stmt::Expr(stmt) = stmt else {
                panic!("expected expr stmt")
            };
            let Expr::Assign(assign) = &stmt.expr else {
                panic!("expected assignment")
            };
            let Expr::Literal(lit) = assign.rhs.as_ref() else {
                panic!("expected literal")
            };
            lit.kind
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            LiteralKind::Int,
            LiteralKind::Long,
            LiteralKind::Float,
            LiteralKind::Double,
            LiteralKind::Char,
            LiteralKind::Str,
            LiteralKind::Null,
            LiteralKind::Bool,
        ]
    );
}

#[test]
fn switch_and_try_become_opaque_statements() {
    let src = r#"class A {
    void f(int n) {
        switch (n) { case 1: g(); break; default: h(); }
        try { g(); } catch (Exception e) { h(); } finally { g(); }
        int after = 1;
    }
}
"#;
    let parsed = parse(src);
    let body = method(first_class(&parsed), "f").body.as_ref().unwrap();
    assert!(matches!(body.statements[0], Stmt::Opaque(_)));
    assert!(matches!(body.statements[1], Stmt::Opaque(_)));
    assert!(matches!(body.statements[2], Stmt::LocalVar(_)));
    let Stmt::Opaque(try_span) = body.statements[1] else {
        unreachable!()
    };
    assert!(src[try_span.start..try_span.end].ends_with("{ g(); }"));
}

#[test]
fn comments_are_collected_as_trivia() {
    let src = "// header\nclass A { /* doc */ int x; }\n";
    let parsed = parse(src);
    assert_eq!(parsed.comments().len(), 2);
    assert!(parsed.is_in_comment(src.find("header").unwrap()));
    assert!(!parsed.is_in_comment(src.find("class").unwrap()));
}

#[test]
fn constructor_and_initializer_members() {
    let src = r#"class A {
    static { setup(); }
    A(int x) { this.x = x; }
    A() { this(0); }
}
"#;
    let parsed = parse(src);
    let class = first_class(&parsed);
    assert!(matches!(class.members[0], MemberDecl::Initializer(_)));
    let MemberDecl::Constructor(ctor) = &class.members[1] else {
        panic!("expected constructor");
    };
    assert_eq!(ctor.params.len(), 1);
    let MemberDecl::Constructor(delegating) = &class.members[2] else {
        panic!("expected constructor");
    };
    let Stmt::Expr(stmt) = &delegating.body.statements[0] else {
        panic!("expected expr stmt");
    };
    let Expr::Call(call) = &stmt.expr else {
        panic!("expected call");
    };
    assert!(matches!(call.callee.as_ref(), Expr::This(_)));
}
