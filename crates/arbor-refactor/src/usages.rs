//! Usage Finder: maps a symbolic element handle to the exact set of files a
//! refactoring must visit, plus the related handles the rewrite visitors
//! need (method family, overriding methods, affected types).
//!
//! Every index loop polls the shared cancellation token. A cancelled search
//! returns `Err(Cancelled)` and the caller discards everything: a truncated
//! file set would silently miss rewrite sites, which is worse than
//! declining the refactoring outright.

use std::collections::BTreeSet;

use arbor_core::{CancelToken, Cancelled, FileId};
use arbor_index::{Index, SymbolKind};
use arbor_resolve::MethodKey;
use arbor_syntax::ast::Visibility;

use crate::handle::{ElementHandle, ElementKind};

/// Reference-search flags, per refactoring kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchFlags {
    pub find_usages: bool,
    pub find_subclasses: bool,
    /// Full transitive closure instead of direct implementors only.
    pub transitive_subclasses: bool,
    pub find_overriding: bool,
    pub search_in_comments: bool,
    /// Include same-name sibling overloads in the method family.
    pub search_overloaded: bool,
    /// Include files from dependency / platform source roots.
    pub include_dependencies: bool,
}

impl Default for SearchFlags {
    fn default() -> Self {
        SearchFlags {
            find_usages: true,
            find_subclasses: false,
            transitive_subclasses: false,
            find_overriding: false,
            search_in_comments: false,
            search_overloaded: false,
            include_dependencies: false,
        }
    }
}

/// Side output of the finder, consumed by the rewrite visitors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelatedHandles {
    /// The refactored executable plus overloads and overrides — every
    /// executable whose call sites must be rewritten.
    pub method_family: Vec<MethodKey>,
    /// Subset of the family that overrides the target in subtypes.
    pub overriding: Vec<MethodKey>,
    /// Types affected by a hierarchy-sensitive refactoring.
    pub affected_types: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsageSet {
    pub files: BTreeSet<FileId>,
    pub related: RelatedHandles,
}

/// Compute the frozen set of files a refactoring of `handle` must visit.
pub fn find_usages(
    index: &Index,
    handle: &ElementHandle,
    flags: SearchFlags,
    cancel: &CancelToken,
) -> Result<UsageSet, Cancelled> {
    let mut set = UsageSet::default();

    match handle.kind {
        ElementKind::Field => find_field_usages(index, handle, flags, cancel, &mut set)?,
        ElementKind::Type => find_type_usages(index, handle, flags, cancel, &mut set)?,
        ElementKind::Method => find_method_usages(index, handle, flags, cancel, &mut set)?,
        ElementKind::Constructor => {
            find_constructor_usages(index, handle, flags, cancel, &mut set)?
        }
        ElementKind::Parameter | ElementKind::Local | ElementKind::Label => {
            // Provably single-file: skip the cross-file search entirely.
            if let Some(file) = handle.file.clone() {
                set.files.insert(file);
            }
        }
        ElementKind::Package | ElementKind::DocTag => {
            set.files
                .extend(index.files_with_identifier(&handle.name, flags.search_in_comments));
        }
    }

    if !flags.include_dependencies {
        set.files.retain(|file| {
            index
                .file_origin(file)
                .map_or(true, |origin| !origin.is_dependency())
        });
    }

    cancel.check()?;
    Ok(set)
}

fn find_field_usages(
    index: &Index,
    handle: &ElementHandle,
    flags: SearchFlags,
    cancel: &CancelToken,
    set: &mut UsageSet,
) -> Result<(), Cancelled> {
    let Some(sym) = handle.resolve(index) else {
        tracing::debug!(?handle, "field handle no longer resolves");
        return Ok(());
    };

    // A private field cannot be referenced outside its declaring file.
    if sym.visibility == Visibility::Private {
        set.files.insert(sym.file.clone());
        return Ok(());
    }

    if flags.find_usages {
        for file in index.files_with_identifier(&handle.name, flags.search_in_comments) {
            cancel.check()?;
            set.files.insert(file);
        }
    }
    if flags.search_in_comments {
        // The declaring file is always visited so doc references stay
        // consistent.
        set.files.insert(sym.file.clone());
    }
    Ok(())
}

fn find_type_usages(
    index: &Index,
    handle: &ElementHandle,
    flags: SearchFlags,
    cancel: &CancelToken,
    set: &mut UsageSet,
) -> Result<(), Cancelled> {
    if flags.find_subclasses {
        let subtypes: Vec<String> = if flags.transitive_subclasses {
            index.all_subtypes(&handle.name, cancel)?.into_iter().collect()
        } else {
            index
                .direct_subtypes(&handle.name)
                .into_iter()
                .map(str::to_string)
                .collect()
        };
        for sub in subtypes {
            cancel.check()?;
            if let Some(sym) = index.find_type(&sub) {
                set.files.insert(sym.file.clone());
            }
            set.related.affected_types.push(sub);
        }
    }

    if flags.find_usages {
        for file in index.files_with_identifier(&handle.name, flags.search_in_comments) {
            cancel.check()?;
            set.files.insert(file);
        }
    }

    if let Some(sym) = index.find_type(&handle.name) {
        set.files.insert(sym.file.clone());
    }
    Ok(())
}

fn find_method_usages(
    index: &Index,
    handle: &ElementHandle,
    flags: SearchFlags,
    cancel: &CancelToken,
    set: &mut UsageSet,
) -> Result<(), Cancelled> {
    let Some(class) = handle.enclosing_type.as_deref() else {
        return Ok(());
    };
    let Some(target) = handle.resolve(index) else {
        tracing::debug!(?handle, "method handle no longer resolves");
        return Ok(());
    };

    // A private method cannot be referenced outside its declaring file.
    if target.visibility == Visibility::Private && !flags.search_overloaded {
        set.files.insert(target.file.clone());
        set.related.method_family = vec![MethodKey::new(
            class,
            &handle.name,
            target.param_types.as_deref().unwrap_or_default(),
        )];
        return Ok(());
    }

    // Build the method family: the target plus, when requested, every
    // same-kind sibling sharing the simple name.
    let mut family: Vec<MethodKey> = Vec::new();
    if flags.search_overloaded {
        for sym in index.method_overloads(class, &handle.name) {
            cancel.check()?;
            family.push(MethodKey::new(
                class,
                &sym.name,
                sym.param_types.as_deref().unwrap_or_default(),
            ));
        }
    } else {
        family.push(MethodKey::new(
            class,
            &handle.name,
            target.param_types.as_deref().unwrap_or_default(),
        ));
    }

    // Every implementor contributes the overriding executables of any
    // family member, so polymorphic dispatch sites are all covered.
    if flags.find_overriding {
        for sub in index.all_subtypes(class, cancel)? {
            cancel.check()?;
            for sym in index.executables_of(&sub) {
                if sym.kind != SymbolKind::Method {
                    continue;
                }
                let overrides_family = family.iter().any(|key| {
                    key.name == sym.name
                        && sym.params_match(&key.params)
                });
                if overrides_family {
                    let key = MethodKey::new(
                        &sub,
                        &sym.name,
                        sym.param_types.as_deref().unwrap_or_default(),
                    );
                    set.files.insert(sym.file.clone());
                    set.related.overriding.push(key.clone());
                    family.push(key);
                }
            }
            set.related.affected_types.push(sub);
        }
    }

    if flags.find_usages {
        for file in index.files_with_identifier(&handle.name, flags.search_in_comments) {
            cancel.check()?;
            set.files.insert(file);
        }
    }

    // The enclosing type's own reference set is always included.
    set.files.insert(target.file.clone());
    set.related.method_family = family;
    Ok(())
}

fn find_constructor_usages(
    index: &Index,
    handle: &ElementHandle,
    flags: SearchFlags,
    cancel: &CancelToken,
    set: &mut UsageSet,
) -> Result<(), Cancelled> {
    let Some(class) = handle.enclosing_type.as_deref() else {
        return Ok(());
    };

    // Constructor calls are syntactically type references.
    if flags.find_usages {
        for file in index.files_with_identifier(class, flags.search_in_comments) {
            cancel.check()?;
            set.files.insert(file);
        }
    }
    for sub in index.direct_subtypes(class) {
        cancel.check()?;
        if let Some(sym) = index.find_type(sub) {
            set.files.insert(sym.file.clone());
        }
        set.related.affected_types.push(sub.to_string());
    }
    if let Some(sym) = handle.resolve(index) {
        set.files.insert(sym.file.clone());
        set.related.method_family = vec![MethodKey::new(
            class,
            class,
            sym.param_types.as_deref().unwrap_or_default(),
        )];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn build(files: Vec<(&str, &str)>) -> Index {
        let map: BTreeMap<FileId, String> = files
            .into_iter()
            .map(|(file, text)| (FileId::new(file), text.to_string()))
            .collect();
        Index::new(map)
    }

    #[test]
    fn private_field_restricts_to_declaring_file() {
        let index = build(vec![
            ("A.java", "class A { private int count; }"),
            ("B.java", "class B { int count; void f() { count++; } }"),
        ]);
        let handle = ElementHandle::field("A", "count");
        let cancel = CancelToken::new();
        let set = find_usages(&index, &handle, SearchFlags::default(), &cancel).unwrap();
        assert_eq!(
            set.files.iter().cloned().collect::<Vec<_>>(),
            vec![FileId::new("A.java")]
        );
    }

    #[test]
    fn method_family_includes_overrides() {
        let index = build(vec![
            (
                "Base.java",
                "class Base { void run(int x) {} void run(long x) {} }",
            ),
            ("Sub.java", "class Sub extends Base { void run(int x) {} }"),
            ("Caller.java", "class Caller { void f(Base b) { b.run(1); } }"),
        ]);
        let handle = ElementHandle::method("Base", "run", &["int"]);
        let flags = SearchFlags {
            find_overriding: true,
            search_overloaded: true,
            ..SearchFlags::default()
        };
        let cancel = CancelToken::new();
        let set = find_usages(&index, &handle, flags, &cancel).unwrap();

        assert!(set.files.contains(&FileId::new("Base.java")));
        assert!(set.files.contains(&FileId::new("Sub.java")));
        assert!(set.files.contains(&FileId::new("Caller.java")));

        // Family: both overloads in Base plus the override in Sub.
        assert_eq!(set.related.method_family.len(), 3);
        assert_eq!(set.related.overriding.len(), 1);
        assert_eq!(set.related.overriding[0].class, "Sub");
    }

    #[test]
    fn cancellation_discards_the_whole_result() {
        let index = build(vec![
            ("A.java", "class A {}"),
            ("B.java", "class B extends A {}"),
        ]);
        let handle = ElementHandle::type_("A");
        let flags = SearchFlags {
            find_subclasses: true,
            transitive_subclasses: true,
            ..SearchFlags::default()
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(
            find_usages(&index, &handle, flags, &cancel),
            Err(Cancelled)
        );
    }

    #[test]
    fn dependency_files_filtered_without_flag() {
        use arbor_index::{FileOrigin, SourceFile};
        let index = Index::from_sources(vec![
            SourceFile {
                file: FileId::new("src/A.java"),
                text: "public class A { public int n; }".to_string(),
                origin: FileOrigin::Primary,
            },
            SourceFile {
                file: FileId::new("dep/Use.java"),
                text: "class Use { void f(A a) { a.n = 1; } }".to_string(),
                origin: FileOrigin::Dependency,
            },
        ]);
        let handle = ElementHandle::field("A", "n");
        let cancel = CancelToken::new();

        let set = find_usages(&index, &handle, SearchFlags::default(), &cancel).unwrap();
        assert!(!set.files.contains(&FileId::new("dep/Use.java")));

        let with_deps = SearchFlags {
            include_dependencies: true,
            ..SearchFlags::default()
        };
        let set = find_usages(&index, &handle, with_deps, &cancel).unwrap();
        assert!(set.files.contains(&FileId::new("dep/Use.java")));
    }
}
