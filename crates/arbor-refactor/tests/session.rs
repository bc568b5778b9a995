use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use arbor_core::FileId;
use arbor_index::Index;
use arbor_refactor::{
    ElementHandle, ElementsBag, ProgressListener, Refactoring, RefactoringSession, Rename,
};
use pretty_assertions::assert_eq;

fn build(files: Vec<(&str, &str)>) -> (Index, BTreeMap<FileId, String>) {
    let map: BTreeMap<FileId, String> = files
        .into_iter()
        .map(|(file, text)| (FileId::new(file), text.to_string()))
        .collect();
    (Index::new(map.clone()), map)
}

#[derive(Default)]
struct CountingProgress {
    started_with: AtomicUsize,
    steps: AtomicUsize,
    stops: AtomicUsize,
}

impl ProgressListener for CountingProgress {
    fn start(&self, total: usize) {
        self.started_with.store(total, Ordering::SeqCst);
    }

    fn step(&self) {
        self.steps.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

fn rename_field(class: &str, field: &str, to: &str) -> Refactoring {
    Refactoring::Rename(Rename {
        target: ElementHandle::field(class, field),
        new_name: to.to_string(),
        allow_no_change: false,
        search_in_comments: false,
    })
}

#[test]
fn progress_reports_once_per_file_in_the_frozen_set() {
    let (index, _files) = build(vec![
        ("A.java", "class A {\n    int shared;\n}\n"),
        (
            "B.java",
            "class B {\n    void f(A a) {\n        a.shared = 1;\n    }\n}\n",
        ),
        (
            "C.java",
            "class C {\n    void g(A a) {\n        use(a.shared);\n    }\n}\n",
        ),
    ]);

    let session = RefactoringSession::new(&index, rename_field("A", "shared", "common"));
    let progress = CountingProgress::default();
    let mut bag = ElementsBag::default();
    let problems = session.prepare(&mut bag, &progress);
    assert!(problems.is_none(), "unexpected problems: {problems:?}");

    let total = progress.started_with.load(Ordering::SeqCst);
    assert_eq!(total, 3);
    assert_eq!(progress.steps.load(Ordering::SeqCst), total);
    assert_eq!(progress.stops.load(Ordering::SeqCst), 1);
    assert!(!bag.edit.is_empty());
}

#[test]
fn cancellation_commits_nothing() {
    let (index, files) = build(vec![
        ("A.java", "class A {\n    int shared;\n}\n"),
        (
            "B.java",
            "class B {\n    void f(A a) {\n        a.shared = 1;\n    }\n}\n",
        ),
    ]);

    let session = RefactoringSession::new(&index, rename_field("A", "shared", "common"));
    session.cancel_token().cancel();

    let mut bag = ElementsBag::default();
    let problems = session
        .prepare(&mut bag, &arbor_refactor::NullProgress)
        .expect("cancellation surfaces as fatal");
    assert!(problems.is_fatal());
    assert!(bag.edit.is_empty(), "cancelled refactorings commit nothing");

    let untouched = arbor_refactor::apply_workspace_edit(&files, &bag.edit).unwrap();
    assert_eq!(untouched, files);
}

#[test]
fn refactorings_round_trip_through_serde() {
    let refactoring = rename_field("A", "shared", "common");
    let json = serde_json::to_string(&refactoring).unwrap();
    let back: Refactoring = serde_json::from_str(&json).unwrap();
    match back {
        Refactoring::Rename(rename) => {
            assert_eq!(rename.new_name, "common");
            assert_eq!(rename.target, ElementHandle::field("A", "shared"));
        }
        other => panic!("expected rename, got {other:?}"),
    }
}
