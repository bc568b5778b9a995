use std::collections::BTreeMap;

use arbor_core::FileId;
use arbor_index::Index;
use arbor_refactor::{
    apply_workspace_edit, ElementHandle, ElementsBag, NullProgress, PushDownMembers,
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

#[test]
fn moves_member_into_every_direct_subclass() {
    let (index, files) = build(vec![
        (
            "Base.java",
            r#"class Base {
    // default implementation
    protected int shared() {
        return 1;
    }
}
"#,
        ),
        ("One.java", "class One extends Base {\n}\n"),
        ("Two.java", "class Two extends Base {\n}\n"),
    ]);

    let session = RefactoringSession::new(
        &index,
        Refactoring::PushDown(PushDownMembers {
            source_class: ElementHandle::type_("Base"),
            members: vec![ElementHandle::method("Base", "shared", &[])],
            keep_abstract_stubs: false,
        }),
    );
    assert!(session.precheck().is_none());
    assert!(session.fast_check_parameters().is_none());
    let mut bag = ElementsBag::default();
    let problems = session.prepare(&mut bag, &NullProgress);
    assert!(problems.is_none(), "unexpected problems: {problems:?}");
    let updated = apply_workspace_edit(&files, &bag.edit).unwrap();

    // The member (with its attached comment) left the superclass...
    assert_eq!(
        updated.get(&FileId::new("Base.java")).unwrap(),
        "class Base {\n}\n"
    );
    // ...and landed in each subclass.
    let expected_sub = |name: &str| {
        format!(
            "class {name} extends Base {{\n\n    // default implementation\n    protected int shared() {{\n        return 1;\n    }}\n}}\n"
        )
    };
    assert_eq!(
        updated.get(&FileId::new("One.java")).unwrap(),
        &expected_sub("One")
    );
    assert_eq!(
        updated.get(&FileId::new("Two.java")).unwrap(),
        &expected_sub("Two")
    );
}

#[test]
fn abstract_stub_option_keeps_the_contract_in_the_superclass() {
    let (index, files) = build(vec![
        (
            "Base.java",
            "class Base {\n    protected int shared() {\n        return 1;\n    }\n}\n",
        ),
        ("One.java", "class One extends Base {\n}\n"),
    ]);

    let session = RefactoringSession::new(
        &index,
        Refactoring::PushDown(PushDownMembers {
            source_class: ElementHandle::type_("Base"),
            members: vec![ElementHandle::method("Base", "shared", &[])],
            keep_abstract_stubs: true,
        }),
    );
    let mut bag = ElementsBag::default();
    assert!(session.prepare(&mut bag, &NullProgress).is_none());
    let updated = apply_workspace_edit(&files, &bag.edit).unwrap();

    assert_eq!(
        updated.get(&FileId::new("Base.java")).unwrap(),
        "class Base {\n    protected abstract int shared();\n}\n"
    );
    assert!(updated
        .get(&FileId::new("One.java"))
        .unwrap()
        .contains("protected int shared()"));
}

#[test]
fn collision_in_a_subclass_is_fatal() {
    let (index, _files) = build(vec![
        (
            "Base.java",
            "class Base {\n    int shared() {\n        return 1;\n    }\n}\n",
        ),
        (
            "One.java",
            "class One extends Base {\n    int shared() {\n        return 2;\n    }\n}\n",
        ),
    ]);

    let session = RefactoringSession::new(
        &index,
        Refactoring::PushDown(PushDownMembers {
            source_class: ElementHandle::type_("Base"),
            members: vec![ElementHandle::method("Base", "shared", &[])],
            keep_abstract_stubs: false,
        }),
    );
    let problems = session.check_parameters().expect("expected a conflict");
    assert!(problems.is_fatal());
    assert!(problems.messages()[0].contains("already declares"));
}

#[test]
fn private_sibling_dependency_warns_for_manual_fix() {
    let (index, _files) = build(vec![
        (
            "Base.java",
            r#"class Base {
    private int seed;

    int next() {
        return seed + 1;
    }
}
"#,
        ),
        ("One.java", "class One extends Base {\n}\n"),
    ]);

    let session = RefactoringSession::new(
        &index,
        Refactoring::PushDown(PushDownMembers {
            source_class: ElementHandle::type_("Base"),
            members: vec![ElementHandle::method("Base", "next", &[])],
            keep_abstract_stubs: false,
        }),
    );
    let problems = session.check_parameters().expect("expected a warning");
    assert!(!problems.is_fatal());
    assert!(problems.messages()[0].contains("manual fix"));
}

#[test]
fn push_down_with_no_subclasses_is_fatal() {
    let (index, _files) = build(vec![(
        "Base.java",
        "class Base {\n    int shared() {\n        return 1;\n    }\n}\n",
    )]);
    let session = RefactoringSession::new(
        &index,
        Refactoring::PushDown(PushDownMembers {
            source_class: ElementHandle::type_("Base"),
            members: vec![ElementHandle::method("Base", "shared", &[])],
            keep_abstract_stubs: false,
        }),
    );
    let problems = session.precheck().expect("expected fatal");
    assert!(problems.is_fatal());
    assert!(problems.messages()[0].contains("no subclasses"));
}
