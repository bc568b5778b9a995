use std::collections::BTreeMap;

use arbor_core::FileId;
use arbor_index::Index;
use arbor_refactor::{
    apply_workspace_edit, ChangeSignature, ElementHandle, ElementsBag, HierarchyPropagation,
    NullProgress, ParameterInfo, Refactoring, RefactoringSession,
};
use pretty_assertions::assert_eq;

fn build(files: Vec<(&str, &str)>) -> (Index, BTreeMap<FileId, String>) {
    let map: BTreeMap<FileId, String> = files
        .into_iter()
        .map(|(file, text)| (FileId::new(file), text.to_string()))
        .collect();
    (Index::new(map.clone()), map)
}

fn change(target: ElementHandle, parameters: Vec<ParameterInfo>) -> ChangeSignature {
    ChangeSignature {
        target,
        new_name: None,
        parameters,
        new_return_type: None,
        new_visibility: None,
        delegate: false,
        propagate: HierarchyPropagation::Both,
    }
}

fn run(
    index: &Index,
    files: &BTreeMap<FileId, String>,
    refactoring: ChangeSignature,
) -> BTreeMap<FileId, String> {
    let session = RefactoringSession::new(index, Refactoring::ChangeSignature(refactoring));
    assert!(session.precheck().is_none(), "precheck failed");
    assert!(session.fast_check_parameters().is_none(), "fast check failed");
    let mut bag = ElementsBag::default();
    let problems = session.prepare(&mut bag, &NullProgress);
    assert!(
        problems.as_ref().map_or(true, |p| !p.is_fatal()),
        "prepare reported fatal: {problems:?}"
    );
    apply_workspace_edit(files, &bag.edit).expect("apply workspace edit")
}

#[test]
fn new_parameter_defaults_at_call_sites_and_threads_through_overrides() {
    let (index, files) = build(vec![
        (
            "A.java",
            r#"class A {
    void foo(int a) {
        use(a);
    }

    void caller() {
        foo(5);
    }
}
"#,
        ),
        (
            "B.java",
            r#"class B extends A {
    void foo(int a) {
        foo(a);
    }
}
"#,
        ),
    ]);

    let updated = run(
        &index,
        &files,
        change(
            ElementHandle::method("A", "foo", &["int"]),
            vec![
                ParameterInfo::new_param("b", "int", "0"),
                ParameterInfo::existing(0, "a", "int"),
            ],
        ),
    );

    // Ordinary call sites splice the default value in.
    assert_eq!(
        updated.get(&FileId::new("A.java")).unwrap(),
        r#"class A {
    void foo(int b, int a) {
        use(a);
    }

    void caller() {
        foo(0, 5);
    }
}
"#
    );
    // A pass-through call inside the override family threads the new
    // parameter instead of defaulting it.
    assert_eq!(
        updated.get(&FileId::new("B.java")).unwrap(),
        r#"class B extends A {
    void foo(int b, int a) {
        foo(b, a);
    }
}
"#
    );
}

#[test]
fn parameter_rename_rewrites_declaration_and_body() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    int twice(int n) {
        return n + n;
    }

    int call() {
        return twice(3);
    }
}
"#,
    )]);

    let updated = run(
        &index,
        &files,
        change(
            ElementHandle::method("A", "twice", &["int"]),
            vec![ParameterInfo::existing(0, "value", "int")],
        ),
    );

    assert_eq!(
        updated.get(&FileId::new("A.java")).unwrap(),
        r#"class A {
    int twice(int value) {
        return value + value;
    }

    int call() {
        return twice(3);
    }
}
"#
    );
}

#[test]
fn trailing_vararg_slot_carries_remaining_arguments() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    void log(String fmt, Object... args) {
    }

    void use(Object a, Object b) {
        log("x", a, b);
    }
}
"#,
    )]);

    let updated = run(
        &index,
        &files,
        change(
            ElementHandle::method("A", "log", &["String", "Object..."]),
            vec![
                ParameterInfo::new_param("level", "int", "0"),
                ParameterInfo::existing(0, "fmt", "String"),
                ParameterInfo::existing(1, "args", "Object..."),
            ],
        ),
    );

    let text = updated.get(&FileId::new("A.java")).unwrap();
    assert!(text.contains("void log(int level, String fmt, Object... args)"));
    assert!(text.contains("log(0, \"x\", a, b);"));
}

#[test]
fn rename_with_delegate_keeps_old_signature_as_wrapper() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    int sum(int a, int b) {
        return a + b;
    }
}
"#,
    )]);

    let mut refactoring = change(
        ElementHandle::method("A", "sum", &["int", "int"]),
        vec![
            ParameterInfo::existing(1, "b", "int"),
            ParameterInfo::existing(0, "a", "int"),
        ],
    );
    refactoring.new_name = Some("plus".to_string());
    refactoring.delegate = true;

    let updated = run(&index, &files, refactoring);
    assert_eq!(
        updated.get(&FileId::new("A.java")).unwrap(),
        r#"class A {
    int plus(int b, int a) {
        return a + b;
    }

    int sum(int a, int b) { return plus(b, a); }
}
"#
    );
}

#[test]
fn return_type_change_warns_at_incompatible_assignments() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    int get() {
        return 1;
    }

    void use() {
        int v = get();
    }
}
"#,
    )]);

    let mut refactoring = change(ElementHandle::method("A", "get", &[]), vec![]);
    refactoring.new_return_type = Some("String".to_string());

    let session =
        RefactoringSession::new(&index, Refactoring::ChangeSignature(refactoring));
    let mut bag = ElementsBag::default();
    let problems = session.prepare(&mut bag, &NullProgress).expect("warning");
    assert!(!problems.is_fatal());
    assert!(problems
        .messages()
        .iter()
        .any(|m| m.contains("new return type")));

    let updated = apply_workspace_edit(&files, &bag.edit).unwrap();
    assert!(updated
        .get(&FileId::new("A.java"))
        .unwrap()
        .contains("String get()"));
}

#[test]
fn vararg_outside_last_position_is_fatal() {
    let (index, _files) = build(vec![(
        "A.java",
        "class A {\n    void f(int a, int b) {\n    }\n}\n",
    )]);
    let refactoring = change(
        ElementHandle::method("A", "f", &["int", "int"]),
        vec![
            ParameterInfo {
                name: "a".to_string(),
                ty: "int...".to_string(),
                default_value: None,
                original_index: Some(0),
            },
            ParameterInfo::existing(1, "b", "int"),
        ],
    );
    let session = RefactoringSession::new(&index, Refactoring::ChangeSignature(refactoring));
    let problems = session.fast_check_parameters().expect("expected fatal");
    assert!(problems.is_fatal());
}

#[test]
fn removed_parameter_still_used_is_fatal() {
    let (index, _files) = build(vec![(
        "A.java",
        r#"class A {
    int f(int keep, int drop) {
        return drop;
    }
}
"#,
    )]);
    let refactoring = change(
        ElementHandle::method("A", "f", &["int", "int"]),
        vec![ParameterInfo::existing(0, "keep", "int")],
    );
    let session = RefactoringSession::new(&index, Refactoring::ChangeSignature(refactoring));
    let problems = session.check_parameters().expect("expected fatal");
    assert!(problems.is_fatal());
    assert!(problems.messages()[0].contains("still used"));
}

#[test]
fn constructor_signature_change_updates_new_expressions() {
    let (index, files) = build(vec![
        (
            "Point.java",
            r#"class Point {
    Point(int x, int y) {
    }
}
"#,
        ),
        (
            "Use.java",
            r#"class Use {
    void demo() {
        Point p = new Point(1, 2);
    }
}
"#,
        ),
    ]);

    let updated = run(
        &index,
        &files,
        change(
            ElementHandle::constructor("Point", &["int", "int"]),
            vec![
                ParameterInfo::existing(1, "y", "int"),
                ParameterInfo::existing(0, "x", "int"),
            ],
        ),
    );

    assert!(updated
        .get(&FileId::new("Point.java"))
        .unwrap()
        .contains("Point(int y, int x)"));
    assert!(updated
        .get(&FileId::new("Use.java"))
        .unwrap()
        .contains("new Point(2, 1);"));
}
