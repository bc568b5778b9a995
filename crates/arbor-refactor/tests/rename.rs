use std::collections::BTreeMap;

use arbor_core::FileId;
use arbor_index::Index;
use arbor_refactor::{
    apply_workspace_edit, ElementHandle, ElementsBag, NullProgress, Refactoring,
    RefactoringSession, Rename,
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
    rename: Rename,
) -> BTreeMap<FileId, String> {
    let session = RefactoringSession::new(index, Refactoring::Rename(rename));
    assert!(session.precheck().is_none(), "precheck failed");
    assert!(session.fast_check_parameters().is_none(), "fast check failed");
    assert!(session.check_parameters().is_none(), "full check failed");
    let mut bag = ElementsBag::default();
    let problems = session.prepare(&mut bag, &NullProgress);
    assert!(problems.is_none(), "prepare reported: {problems:?}");
    apply_workspace_edit(files, &bag.edit).expect("apply workspace edit")
}

#[test]
fn field_rename_leaves_shadowing_local_untouched() {
    let (index, files) = build(vec![(
        "A.java",
        r#"class A {
    int x;

    void f() {
        int x = 1;
        use(x);
    }

    int g() {
        return x;
    }
}
"#,
    )]);

    let updated = run(
        &index,
        &files,
        Rename {
            target: ElementHandle::field("A", "x"),
            new_name: "y".to_string(),
            allow_no_change: false,
            search_in_comments: false,
        },
    );

    assert_eq!(
        updated.get(&FileId::new("A.java")).unwrap(),
        r#"class A {
    int y;

    void f() {
        int x = 1;
        use(x);
    }

    int g() {
        return y;
    }
}
"#
    );
}

#[test]
fn method_rename_covers_overrides_and_call_sites() {
    let (index, files) = build(vec![
        (
            "Base.java",
            "class Base {\n    void run(int x) {\n    }\n}\n",
        ),
        (
            "Sub.java",
            "class Sub extends Base {\n    void run(int x) {\n    }\n}\n",
        ),
        (
            "Caller.java",
            r#"class Caller {
    void go(Base b, Sub s) {
        b.run(1);
        s.run(2);
    }
}
"#,
        ),
    ]);

    let updated = run(
        &index,
        &files,
        Rename {
            target: ElementHandle::method("Base", "run", &["int"]),
            new_name: "exec".to_string(),
            allow_no_change: false,
            search_in_comments: false,
        },
    );

    assert_eq!(
        updated.get(&FileId::new("Base.java")).unwrap(),
        "class Base {\n    void exec(int x) {\n    }\n}\n"
    );
    assert_eq!(
        updated.get(&FileId::new("Sub.java")).unwrap(),
        "class Sub extends Base {\n    void exec(int x) {\n    }\n}\n"
    );
    assert_eq!(
        updated.get(&FileId::new("Caller.java")).unwrap(),
        r#"class Caller {
    void go(Base b, Sub s) {
        b.exec(1);
        s.exec(2);
    }
}
"#
    );
}

#[test]
fn rename_in_comments_only_when_requested() {
    let src = r#"class A {
    // increment counter before use
    int counter;

    void f() {
        counter = counter + 1;
    }
}
"#;
    let (index, files) = build(vec![("A.java", src)]);
    let rename = |in_comments: bool| Rename {
        target: ElementHandle::field("A", "counter"),
        new_name: "total".to_string(),
        allow_no_change: false,
        search_in_comments: in_comments,
    };

    let updated = run(&index, &files, rename(false));
    let text = updated.get(&FileId::new("A.java")).unwrap();
    assert!(text.contains("// increment counter before use"));
    assert!(text.contains("total = total + 1;"));

    let updated = run(&index, &files, rename(true));
    let text = updated.get(&FileId::new("A.java")).unwrap();
    assert!(text.contains("// increment total before use"));
}

#[test]
fn no_op_rename_is_fatal_unless_explicitly_allowed() {
    let (index, files) = build(vec![("A.java", "class A {\n    int x;\n}\n")]);

    let fatal = RefactoringSession::new(
        &index,
        Refactoring::Rename(Rename {
            target: ElementHandle::field("A", "x"),
            new_name: "x".to_string(),
            allow_no_change: false,
            search_in_comments: false,
        }),
    );
    let problems = fatal.fast_check_parameters().expect("expected a problem");
    assert!(problems.is_fatal());

    let allowed = RefactoringSession::new(
        &index,
        Refactoring::Rename(Rename {
            target: ElementHandle::field("A", "x"),
            new_name: "x".to_string(),
            allow_no_change: true,
            search_in_comments: false,
        }),
    );
    assert!(allowed.fast_check_parameters().is_none());
    let mut bag = ElementsBag::default();
    assert!(allowed.prepare(&mut bag, &NullProgress).is_none());
    assert!(bag.edit.is_empty(), "no-op rename must produce no edits");
    let unchanged = apply_workspace_edit(&files, &bag.edit).unwrap();
    assert_eq!(unchanged, files);
}

#[test]
fn rename_to_existing_member_name_is_fatal() {
    let (index, _files) = build(vec![(
        "A.java",
        "class A {\n    int x;\n    int y;\n}\n",
    )]);
    let session = RefactoringSession::new(
        &index,
        Refactoring::Rename(Rename {
            target: ElementHandle::field("A", "x"),
            new_name: "y".to_string(),
            allow_no_change: false,
            search_in_comments: false,
        }),
    );
    let problems = session.check_parameters().expect("expected a conflict");
    assert!(problems.is_fatal());
    assert!(problems.messages()[0].contains("already declares a field"));
}

#[test]
fn label_rename_updates_jumps_and_rejects_clashes() {
    let src = r#"class A {
    void f() {
        outer: for (;;) {
            inner: for (;;) {
                break inner;
            }
            break outer;
        }
    }
}
"#;
    let (index, files) = build(vec![("A.java", src)]);
    let decl_offset = src.find("outer:").unwrap();

    // Renaming onto a nested label name is rejected.
    let clashing = RefactoringSession::new(
        &index,
        Refactoring::Rename(Rename {
            target: ElementHandle::label("outer", FileId::new("A.java"), decl_offset),
            new_name: "inner".to_string(),
            allow_no_change: false,
            search_in_comments: false,
        }),
    );
    let problems = clashing.check_parameters().expect("expected a clash");
    assert!(problems.is_fatal());

    let updated = run(
        &index,
        &files,
        Rename {
            target: ElementHandle::label("outer", FileId::new("A.java"), decl_offset),
            new_name: "top".to_string(),
            allow_no_change: false,
            search_in_comments: false,
        },
    );
    assert_eq!(
        updated.get(&FileId::new("A.java")).unwrap(),
        r#"class A {
    void f() {
        top: for (;;) {
            inner: for (;;) {
                break inner;
            }
            break top;
        }
    }
}
"#
    );
}

#[test]
fn local_rename_is_confined_to_its_scope() {
    let src = r#"class A {
    int v;

    void f() {
        int v = 1;
        use(v);
    }

    void g() {
        use(v);
    }
}
"#;
    let (index, files) = build(vec![("A.java", src)]);
    let decl_offset = src.find("int v = 1").unwrap() + "int ".len();

    let updated = run(
        &index,
        &files,
        Rename {
            target: ElementHandle::local(
                "A",
                "f",
                &[],
                "v",
                FileId::new("A.java"),
                decl_offset,
            ),
            new_name: "count".to_string(),
            allow_no_change: false,
            search_in_comments: false,
        },
    );

    assert_eq!(
        updated.get(&FileId::new("A.java")).unwrap(),
        r#"class A {
    int v;

    void f() {
        int count = 1;
        use(count);
    }

    void g() {
        use(v);
    }
}
"#
    );
}
