use std::collections::BTreeMap;

use arbor_core::FileId;
use arbor_index::Index;
use pretty_assertions::assert_eq;

use crate::{Element, Resolver, TypeInference};

fn build(files: Vec<(&str, &str)>) -> Index {
    let map: BTreeMap<FileId, String> = files
        .into_iter()
        .map(|(file, text)| (FileId::new(file), text.to_string()))
        .collect();
    Index::new(map)
}

/// Offset of the `nth` occurrence of `needle` (0-based).
fn offset_of(text: &str, needle: &str, nth: usize) -> usize {
    let mut from = 0usize;
    for _ in 0..=nth {
        let pos = text[from..].find(needle).expect("needle occurrence");
        from += pos + 1;
    }
    from - 1
}

#[test]
fn local_shadows_field() {
    let src = r#"class A {
    int x;
    void f() {
        int x = 1;
        use(x);
    }
    void g() {
        use(x);
    }
}
"#;
    let index = build(vec![("A.java", src)]);
    let file = FileId::new("A.java");
    let resolver = Resolver::new(&index, &file).unwrap();

    let in_f = offset_of(src, "use(x)", 0) + 4;
    match resolver.resolve_identifier(in_f, "x").unwrap() {
        Element::Local { name, .. } => assert_eq!(name, "x"),
        other => panic!("expected local, got {other:?}"),
    }

    let in_g = offset_of(src, "use(x)", 1) + 4;
    match resolver.resolve_identifier(in_g, "x").unwrap() {
        Element::Field { class, name } => {
            assert_eq!(class, "A");
            assert_eq!(name, "x");
        }
        other => panic!("expected field, got {other:?}"),
    }
}

#[test]
fn param_shadows_field_and_inherited_fields_resolve() {
    let src_a = "class A { protected int total; }";
    let src_b = r#"class B extends A {
    void add(int total) { use(total); }
    void read() { use(total); }
}
"#;
    let index = build(vec![("A.java", src_a), ("B.java", src_b)]);
    let file = FileId::new("B.java");
    let resolver = Resolver::new(&index, &file).unwrap();

    let in_add = offset_of(src_b, "use(total)", 0) + 4;
    assert!(matches!(
        resolver.resolve_identifier(in_add, "total").unwrap(),
        Element::Param { index: 0, .. }
    ));

    let in_read = offset_of(src_b, "use(total)", 1) + 4;
    match resolver.resolve_identifier(in_read, "total").unwrap() {
        Element::Field { class, .. } => assert_eq!(class, "A"),
        other => panic!("expected inherited field, got {other:?}"),
    }
}

#[test]
fn private_superclass_field_is_not_inherited() {
    let src_a = "class A { private int secret; }";
    let src_b = "class B extends A { void f() { use(secret); } }";
    let index = build(vec![("A.java", src_a), ("B.java", src_b)]);
    let file = FileId::new("B.java");
    let resolver = Resolver::new(&index, &file).unwrap();
    let offset = src_b.find("secret)").unwrap();
    assert_eq!(resolver.resolve_identifier(offset, "secret"), None);
}

#[test]
fn resolves_calls_through_receivers() {
    let src = r#"class A {
    int base() { return 1; }
    void f() {
        base();
        Helper h = new Helper();
        h.twice(2);
        Helper.unit();
    }
}
"#;
    let helper = r#"class Helper {
    int twice(int v) { return v * 2; }
    static int unit() { return 1; }
}
"#;
    let index = build(vec![("A.java", src), ("Helper.java", helper)]);
    let file = FileId::new("A.java");
    let resolver = Resolver::new(&index, &file).unwrap();
    let parse = index.file_parse(&file).unwrap();
    let unit = parse.compilation_unit();

    let body = match &unit.types[0] {
        arbor_syntax::ast::TypeDecl::Class(c) => c
            .members
            .iter()
            .find_map(|m| match m {
                arbor_syntax::ast::MemberDecl::Method(m) if m.name == "f" => {
                    m.body.as_ref()
                }
                _ => None,
            })
            .unwrap(),
        _ => panic!("expected class"),
    };

    let call_at = |i: usize| -> &arbor_syntax::ast::CallExpr {
        let arbor_syntax::ast::Stmt::Expr(stmt) = &body.statements[i] else {
            panic!("expected expr stmt");
        };
        match &stmt.expr {
            arbor_syntax::ast::Expr::Call(call) => call,
            other => panic!("expected call, got {other:?}"),
        }
    };

    let own = resolver.resolve_call(call_at(0), call_at(0).range.start).unwrap();
    assert_eq!(own.class, "A");
    assert_eq!(own.name, "base");

    let through_var = resolver.resolve_call(call_at(2), call_at(2).range.start).unwrap();
    assert_eq!(through_var.class, "Helper");
    assert_eq!(through_var.name, "twice");

    let through_type = resolver.resolve_call(call_at(3), call_at(3).range.start).unwrap();
    assert_eq!(through_type.class, "Helper");
    assert_eq!(through_type.name, "unit");
}

#[test]
fn infers_expression_types() {
    let src = r#"class A {
    int count;
    String name;
    void f(double d) {
        int local = 3;
        use(local + 1);
        use(name);
        use(count * d);
    }
}
"#;
    let index = build(vec![("A.java", src)]);
    let file = FileId::new("A.java");
    let resolver = Resolver::new(&index, &file).unwrap();
    let inference = TypeInference::new(&resolver);

    let offset = src.find("use(local").unwrap();
    let name_expr = arbor_syntax::ast::Expr::Name(arbor_syntax::ast::NameExpr {
        name: "local".to_string(),
        range: arbor_core::Span::point(offset + 4),
    });
    assert_eq!(inference.infer(&name_expr, offset + 4), Some("int".to_string()));

    let offset = src.find("use(name)").unwrap() + 4;
    let name_expr = arbor_syntax::ast::Expr::Name(arbor_syntax::ast::NameExpr {
        name: "name".to_string(),
        range: arbor_core::Span::point(offset),
    });
    assert_eq!(
        inference.infer(&name_expr, offset),
        Some("String".to_string())
    );
}
