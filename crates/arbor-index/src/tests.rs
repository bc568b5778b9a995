use std::collections::BTreeMap;

use arbor_core::{CancelToken, FileId};
use pretty_assertions::assert_eq;

use crate::{CandidateKind, FileOrigin, Index, SourceFile, SymbolKind};

fn build(files: Vec<(&str, &str)>) -> Index {
    let map: BTreeMap<FileId, String> = files
        .into_iter()
        .map(|(file, text)| (FileId::new(file), text.to_string()))
        .collect();
    Index::new(map)
}

#[test]
fn indexes_symbols_with_containers() {
    let index = build(vec![(
        "A.java",
        r#"package p;
class A {
    private int count;
    A(int count) { this.count = count; }
    int getCount() { return count; }
    static class Inner { void run() {} }
}
"#,
    )]);

    let class = index.find_type("A").expect("type A");
    assert_eq!(class.kind, SymbolKind::Class);
    assert!(class.container.is_none());

    let field = index.find_field("A", "count").expect("field");
    assert_eq!(field.type_text.as_deref(), Some("int"));

    let methods = index.method_overloads("A", "getCount");
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].param_types.as_deref(), Some(&[][..]));

    let inner_method = index.method_overloads("Inner", "run");
    assert_eq!(inner_method.len(), 1);

    let ctors: Vec<_> = index
        .executables_of("A")
        .into_iter()
        .filter(|s| s.kind == SymbolKind::Constructor)
        .collect();
    assert_eq!(ctors.len(), 1);
}

#[test]
fn hierarchy_queries() {
    let index = build(vec![
        ("A.java", "class A {}"),
        ("B.java", "class B extends A implements Runnable {}"),
        ("C.java", "class C extends B {}"),
        ("R.java", "interface Runnable {}"),
    ]);

    assert_eq!(index.class_extends("B"), Some("A"));
    assert_eq!(index.direct_subtypes("A"), vec!["B"]);
    assert_eq!(index.direct_subtypes("Runnable"), vec!["B"]);

    let cancel = CancelToken::new();
    let all = index.all_subtypes("A", &cancel).unwrap();
    assert_eq!(
        all.into_iter().collect::<Vec<_>>(),
        vec!["B".to_string(), "C".to_string()]
    );

    assert!(index.is_subtype_of("C", "A"));
    assert!(index.is_subtype_of("B", "Runnable"));
    assert!(!index.is_subtype_of("A", "C"));

    assert_eq!(
        index.superclass_chain("C"),
        vec!["C".to_string(), "B".to_string(), "A".to_string()]
    );
}

#[test]
fn cancelled_subtype_closure_returns_no_partial_set() {
    let index = build(vec![
        ("A.java", "class A {}"),
        ("B.java", "class B extends A {}"),
    ]);
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(index.all_subtypes("A", &cancel).is_err());
}

#[test]
fn candidate_classification() {
    let index = build(vec![(
        "A.java",
        r#"import p.helper;
// helper in a comment
class A {
    void f() {
        helper();
        String s = "helper";
        int helper = 1;
    }
}
"#,
    )]);

    let candidates = index.find_name_candidates("helper");
    let kinds: Vec<CandidateKind> = candidates.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            CandidateKind::Import,
            CandidateKind::Comment,
            CandidateKind::Call,
            CandidateKind::Plain,
        ]
    );
}

#[test]
fn word_boundaries_exclude_substrings() {
    let index = build(vec![("A.java", "class A { int counter; int count; }")]);
    let candidates = index.find_name_candidates("count");
    assert_eq!(candidates.len(), 1);
    let text = index.file_text(&FileId::new("A.java")).unwrap();
    assert_eq!(candidates[0].range.slice(text), "count");
}

#[test]
fn declared_types_and_origins() {
    let index = Index::from_sources(vec![
        SourceFile {
            file: FileId::new("src/p/List.java"),
            text: "package p; public class List {}".to_string(),
            origin: FileOrigin::Primary,
        },
        SourceFile {
            file: FileId::new("dep/q/List.java"),
            text: "package q; class List {}".to_string(),
            origin: FileOrigin::Dependency,
        },
    ]);

    let types = index.declared_types("List");
    assert_eq!(types.len(), 2);
    assert!(types.iter().any(|(q, _)| *q == "p.List"));
    assert_eq!(
        index.file_origin(&FileId::new("dep/q/List.java")),
        Some(FileOrigin::Dependency)
    );
    assert_eq!(index.package_of_type("List"), Some("p"));
}
