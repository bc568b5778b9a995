use std::collections::BTreeMap;

use arbor_core::FileId;
use arbor_index::Index;
use arbor_refactor::{
    apply_workspace_edit, ElementHandle, ElementsBag, IntroduceLocalExtension, NullProgress,
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

fn point_fixture() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "p/Point.java",
            r#"package p;

public class Point {
    public Point(int x, int y) {
    }

    public int getX() {
        return 0;
    }
}
"#,
        ),
        (
            "p/Use.java",
            r#"package p;

class Use {
    void demo() {
        Point p = new Point(1, 2);
        use(p.getX());
    }
}
"#,
        ),
    ]
}

#[test]
fn wrapper_extension_delegates_and_retargets_references() {
    let (index, files) = build(point_fixture());

    let session = RefactoringSession::new(
        &index,
        Refactoring::IntroduceLocalExtension(IntroduceLocalExtension {
            source_type: ElementHandle::type_("Point"),
            new_name: "ExtPoint".to_string(),
            new_file: FileId::new("p/ExtPoint.java"),
            wrap: true,
            replace_usages: true,
            generate_equality: false,
        }),
    );
    assert!(session.precheck().is_none());
    assert!(session.fast_check_parameters().is_none());
    let mut bag = ElementsBag::default();
    let problems = session.prepare(&mut bag, &NullProgress);
    assert!(problems.is_none(), "unexpected problems: {problems:?}");
    let updated = apply_workspace_edit(&files, &bag.edit).unwrap();

    assert_eq!(
        updated.get(&FileId::new("p/ExtPoint.java")).unwrap(),
        r#"package p;

public class ExtPoint {
    private final Point delegate;

    public ExtPoint(int x, int y) {
        this.delegate = new Point(x, y);
    }

    public int getX() {
        return delegate.getX();
    }
}
"#
    );

    // References in other units move to the extension; the original
    // declaration stays untouched.
    assert_eq!(
        updated.get(&FileId::new("p/Use.java")).unwrap(),
        r#"package p;

class Use {
    void demo() {
        ExtPoint p = new ExtPoint(1, 2);
        use(p.getX());
    }
}
"#
    );
    assert_eq!(
        updated.get(&FileId::new("p/Point.java")).unwrap(),
        files.get(&FileId::new("p/Point.java")).unwrap()
    );
}

#[test]
fn subclass_extension_mirrors_constructors() {
    let (index, files) = build(point_fixture());

    let session = RefactoringSession::new(
        &index,
        Refactoring::IntroduceLocalExtension(IntroduceLocalExtension {
            source_type: ElementHandle::type_("Point"),
            new_name: "ExtPoint".to_string(),
            new_file: FileId::new("p/ExtPoint.java"),
            wrap: false,
            replace_usages: false,
            generate_equality: false,
        }),
    );
    let mut bag = ElementsBag::default();
    assert!(session.prepare(&mut bag, &NullProgress).is_none());
    let updated = apply_workspace_edit(&files, &bag.edit).unwrap();

    assert_eq!(
        updated.get(&FileId::new("p/ExtPoint.java")).unwrap(),
        r#"package p;

public class ExtPoint extends Point {

    public ExtPoint(int x, int y) {
        super(x, y);
    }
}
"#
    );
    // Without replace_usages, no existing unit changes.
    assert_eq!(
        updated.get(&FileId::new("p/Use.java")).unwrap(),
        files.get(&FileId::new("p/Use.java")).unwrap()
    );
}

#[test]
fn equality_delegation_is_generated_on_request() {
    let (index, files) = build(point_fixture());

    let session = RefactoringSession::new(
        &index,
        Refactoring::IntroduceLocalExtension(IntroduceLocalExtension {
            source_type: ElementHandle::type_("Point"),
            new_name: "ExtPoint".to_string(),
            new_file: FileId::new("p/ExtPoint.java"),
            wrap: true,
            replace_usages: false,
            generate_equality: true,
        }),
    );
    let mut bag = ElementsBag::default();
    assert!(session.prepare(&mut bag, &NullProgress).is_none());
    let updated = apply_workspace_edit(&files, &bag.edit).unwrap();

    let text = updated.get(&FileId::new("p/ExtPoint.java")).unwrap();
    assert!(text.contains("public boolean equals(Object other)"));
    assert!(text.contains("return delegate.hashCode();"));
}

#[test]
fn colliding_name_or_existing_file_is_fatal() {
    let (index, _files) = build(point_fixture());

    let session = RefactoringSession::new(
        &index,
        Refactoring::IntroduceLocalExtension(IntroduceLocalExtension {
            source_type: ElementHandle::type_("Point"),
            new_name: "Use".to_string(),
            new_file: FileId::new("p/Ext.java"),
            wrap: true,
            replace_usages: false,
            generate_equality: false,
        }),
    );
    let problems = session.fast_check_parameters().expect("expected fatal");
    assert!(problems.is_fatal());

    let session = RefactoringSession::new(
        &index,
        Refactoring::IntroduceLocalExtension(IntroduceLocalExtension {
            source_type: ElementHandle::type_("Point"),
            new_name: "ExtPoint".to_string(),
            new_file: FileId::new("p/Use.java"),
            wrap: true,
            replace_usages: false,
            generate_equality: false,
        }),
    );
    let problems = session.fast_check_parameters().expect("expected fatal");
    assert!(problems.is_fatal());
}
