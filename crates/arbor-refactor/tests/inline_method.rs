use std::collections::BTreeMap;

use arbor_core::FileId;
use arbor_index::Index;
use arbor_refactor::{
    apply_workspace_edit, ElementHandle, ElementsBag, InlineMethod, NullProgress, Problems,
    Refactoring, RefactoringSession,
};
use pretty_assertions::assert_eq;

fn build(files: Vec<(&str, &str)>) -> (Index, BTreeMap<FileId, String>) {
    let map: BTreeMap<FileId, String> = files
        .into_iter()
        .map(|(file, text)| (FileId::new(file), text.to_string()))
        .collect();
    (Index::new(map.clone()), map)
}

fn run(
    index: &Index,
    files: &BTreeMap<FileId, String>,
    refactoring: InlineMethod,
) -> (Option<Problems>, BTreeMap<FileId, String>) {
    let session = RefactoringSession::new(index, Refactoring::InlineMethod(refactoring));
    assert!(session.precheck().is_none(), "precheck failed");
    let mut bag = ElementsBag::default();
    let problems = session.prepare(&mut bag, &NullProgress);
    let updated = apply_workspace_edit(files, &bag.edit).expect("apply workspace edit");
    (problems, updated)
}

#[test]
fn expression_body_replaces_the_call() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    private int square(int n) {
        return n * n;
    }

    int demo() {
        int r = square(5);
        return r;
    }
}
"#,
    )]);

    let (problems, updated) = run(
        &index,
        &files,
        InlineMethod {
            target: ElementHandle::method("A", "square", &["int"]),
            inline_all: false,
        },
    );
    assert!(problems.is_none(), "unexpected problems: {problems:?}");

    assert_eq!(
        updated.get(&FileId::new("A.java")).unwrap(),
        r#"class A {
    private int square(int n) {
        return n * n;
    }

    int demo() {
        int r = 5 * 5;
        return r;
    }
}
"#
    );
}

#[test]
fn hoisted_locals_are_renamed_to_avoid_collisions() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    private int inc(int x) {
        int tmp = x + 1;
        return tmp;
    }

    int demo() {
        int tmp = 10;
        int r = inc(tmp);
        return r + tmp;
    }
}
"#,
    )]);

    let (problems, updated) = run(
        &index,
        &files,
        InlineMethod {
            target: ElementHandle::method("A", "inc", &["int"]),
            inline_all: false,
        },
    );
    assert!(problems.is_none(), "unexpected problems: {problems:?}");

    assert_eq!(
        updated.get(&FileId::new("A.java")).unwrap(),
        r#"class A {
    private int inc(int x) {
        int tmp = x + 1;
        return tmp;
    }

    int demo() {
        int tmp = 10;
        int tmp2 = tmp + 1;
        int r = tmp2;
        return r + tmp;
    }
}
"#
    );
}

#[test]
fn call_in_for_update_clause_folds_into_the_update_list() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    private int step(int i) {
        return i + 2;
    }

    void demo() {
        for (int i = 0; i < 10; i = step(i)) {
            work(i);
        }
    }

    void work(int i) {
    }
}
"#,
    )]);

    let (problems, updated) = run(
        &index,
        &files,
        InlineMethod {
            target: ElementHandle::method("A", "step", &["int"]),
            inline_all: false,
        },
    );
    assert!(problems.is_none(), "unexpected problems: {problems:?}");

    let text = updated.get(&FileId::new("A.java")).unwrap();
    assert!(
        text.contains("for (int i = 0; i < 10; i = i + 2) {"),
        "update clause not folded: {text}"
    );
}

#[test]
fn multi_return_body_inlines_only_into_a_bare_return() {
    let pick = r#"    private int pick(int v) {
        if (v > 0) {
            return 1;
        }
        return 2;
    }
"#;

    // A call that is the entire expression of an enclosing `return`
    // absorbs the whole body.
    let (index, files) = build(vec![(
        "A.java",
        &format!(
            "class A {{\n{pick}\n    int choose(int v) {{\n        return pick(v);\n    }}\n}}\n"
        ),
    )]);
    let (problems, updated) = run(
        &index,
        &files,
        InlineMethod {
            target: ElementHandle::method("A", "pick", &["int"]),
            inline_all: false,
        },
    );
    assert!(problems.is_none(), "unexpected problems: {problems:?}");
    let text = updated.get(&FileId::new("A.java")).unwrap();
    assert!(text.contains(
        "    int choose(int v) {\n        if (v > 0) {\n            return 1;\n        }\n        return 2;\n    }"
    ));

    // Any other call site is fatal, and fatal means zero edits.
    let (index, files) = build(vec![(
        "B.java",
        &format!(
            "class B {{\n{pick}\n    int bad(int v) {{\n        int r = pick(v) + 1;\n        return r;\n    }}\n}}\n"
        ),
    )]);
    let session = RefactoringSession::new(
        &index,
        Refactoring::InlineMethod(InlineMethod {
            target: ElementHandle::method("B", "pick", &["int"]),
            inline_all: false,
        }),
    );
    let mut bag = ElementsBag::default();
    let problems = session.prepare(&mut bag, &NullProgress).expect("fatal");
    assert!(problems.is_fatal());
    assert!(bag.edit.is_empty(), "fatal refactorings must commit nothing");
    let untouched = apply_workspace_edit(&files, &bag.edit).unwrap();
    assert_eq!(untouched, files);
}

#[test]
fn dropped_return_value_raises_a_warning() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    private int answer() {
        return 42;
    }

    void demo() {
        answer();
    }
}
"#,
    )]);

    let (problems, updated) = run(
        &index,
        &files,
        InlineMethod {
            target: ElementHandle::method("A", "answer", &[]),
            inline_all: false,
        },
    );
    let problems = problems.expect("expected a warning");
    assert!(!problems.is_fatal());
    assert!(problems
        .messages()
        .iter()
        .any(|m| m.contains("return value")));

    let text = updated.get(&FileId::new("A.java")).unwrap();
    assert!(!text.contains("answer();\n    }\n}"), "call not removed: {text}");
}

#[test]
fn inline_all_deletes_the_declaration() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    private int addOne(int x) {
        return x + 1;
    }

    int demo() {
        return addOne(41);
    }
}
"#,
    )]);

    let (problems, updated) = run(
        &index,
        &files,
        InlineMethod {
            target: ElementHandle::method("A", "addOne", &["int"]),
            inline_all: true,
        },
    );
    assert!(problems.is_none(), "unexpected problems: {problems:?}");

    assert_eq!(
        updated.get(&FileId::new("A.java")).unwrap(),
        r#"class A {

    int demo() {
        return 41 + 1;
    }
}
"#
    );
}

#[test]
fn recursive_method_is_rejected() {
    let (index, _files) = build(vec![(
        "A.java",
        r#"class A {
    private int fact(int n) {
        return n * fact(n - 1);
    }
}
"#,
    )]);

    let session = RefactoringSession::new(
        &index,
        Refactoring::InlineMethod(InlineMethod {
            target: ElementHandle::method("A", "fact", &["int"]),
            inline_all: false,
        }),
    );
    let problems = session.precheck().expect("expected fatal");
    assert!(problems.is_fatal());
    assert!(problems.messages()[0].contains("recursive"));
}

#[test]
fn precedence_forces_parentheses_in_larger_expressions() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    private int sum(int a, int b) {
        return a + b;
    }

    int demo() {
        int r = 2 * sum(1, 3);
        return r;
    }
}
"#,
    )]);

    let (problems, updated) = run(
        &index,
        &files,
        InlineMethod {
            target: ElementHandle::method("A", "sum", &["int", "int"]),
            inline_all: false,
        },
    );
    assert!(problems.is_none(), "unexpected problems: {problems:?}");

    let text = updated.get(&FileId::new("A.java")).unwrap();
    assert!(
        text.contains("int r = 2 * (1 + 3);"),
        "missing precedence parentheses: {text}"
    );
}
