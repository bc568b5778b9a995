//! Parameter descriptors and the signature-change precondition checks.
//!
//! `fast_check` is the cheap syntactic/structural phase run against the
//! target's cached resolution; `full_check` walks the enclosing type's
//! sibling executables and all known subtypes.

use arbor_core::is_valid_java_identifier;
use arbor_index::{normalize_type_text, Index, SymbolKind};
use arbor_resolve::{find_constructor_decl, find_method_decl, MethodKey, Resolver};
use arbor_syntax::ast::Visibility;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::problem::Problems;

/// Serializable access level mirroring [`Visibility`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AccessLevel {
    Public,
    Protected,
    PackagePrivate,
    Private,
}

impl AccessLevel {
    #[must_use]
    pub fn to_visibility(self) -> Visibility {
        match self {
            AccessLevel::Public => Visibility::Public,
            AccessLevel::Protected => Visibility::Protected,
            AccessLevel::PackagePrivate => Visibility::PackagePrivate,
            AccessLevel::Private => Visibility::Private,
        }
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        self.to_visibility().keyword()
    }
}

/// One target-state parameter after a signature change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterInfo {
    pub name: String,
    /// Declared type text; a trailing `...` marks a vararg.
    pub ty: String,
    /// Call-site expression for a parameter with no original counterpart.
    pub default_value: Option<String>,
    /// Index into the old parameter list; `None` means newly introduced.
    pub original_index: Option<usize>,
}

impl ParameterInfo {
    pub fn existing(original_index: usize, name: impl Into<String>, ty: impl Into<String>) -> Self {
        ParameterInfo {
            name: name.into(),
            ty: ty.into(),
            default_value: None,
            original_index: Some(original_index),
        }
    }

    pub fn new_param(
        name: impl Into<String>,
        ty: impl Into<String>,
        default_value: impl Into<String>,
    ) -> Self {
        ParameterInfo {
            name: name.into(),
            ty: ty.into(),
            default_value: Some(default_value.into()),
            original_index: None,
        }
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.original_index.is_none()
    }

    #[must_use]
    pub fn is_vararg(&self) -> bool {
        self.ty.trim_end().ends_with("...")
    }

    /// Component type of a vararg descriptor (`int...` → `int`).
    #[must_use]
    pub fn component_type(&self) -> &str {
        self.ty.trim_end().trim_end_matches("...").trim_end()
    }
}

/// The fixed primitive widening chain. `a` widens to `b` iff `b` appears
/// strictly later in the chain.
pub const WIDENING_CHAIN: &[&str] = &["byte", "short", "int", "long", "float", "double"];

#[must_use]
pub fn is_widening(from: &str, to: &str) -> bool {
    let rank = |ty: &str| WIDENING_CHAIN.iter().position(|c| *c == ty);
    match (rank(from.trim()), rank(to.trim())) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

/// Whether a value of declared type `from` can be passed where `to` is
/// expected: identical, primitive widening, or a project-known subtype.
#[must_use]
pub fn is_assignable(index: &Index, from: &str, to: &str) -> bool {
    let from_n = normalize_type_text(from);
    let to_n = normalize_type_text(to);
    if from_n == to_n {
        return true;
    }
    if is_widening(&from_n, &to_n) {
        return true;
    }
    let from_simple = arbor_resolve::simple_type_name(from);
    let to_simple = arbor_resolve::simple_type_name(to);
    index.is_subtype_of(&from_simple, &to_simple)
}

/// Fast phase: purely structural checks against the cached resolution of
/// the target executable.
#[must_use]
pub fn fast_check(
    index: &Index,
    target: &MethodKey,
    new_name: Option<&str>,
    params: &[ParameterInfo],
) -> Problems {
    let mut problems = Problems::new();

    if let Some(name) = new_name {
        if !is_valid_java_identifier(name) {
            problems.push_fatal(format!("`{name}` is not a valid Java identifier"));
        }
    }

    for (pos, param) in params.iter().enumerate() {
        if param.name.is_empty() || !is_valid_java_identifier(&param.name) {
            problems.push_fatal(format!(
                "parameter name `{}` is not a valid Java identifier",
                param.name
            ));
        }
        if param.ty.trim().is_empty() {
            problems.push_fatal(format!("parameter `{}` has no type", param.name));
        }
        if param.is_new()
            && param
                .default_value
                .as_deref()
                .map_or(true, |v| v.trim().is_empty())
        {
            problems.push_fatal(format!(
                "new parameter `{}` requires a default value for existing call sites",
                param.name
            ));
        }
        if param.is_vararg() && pos + 1 != params.len() {
            problems.push_fatal(format!(
                "vararg parameter `{}` must be the last parameter",
                param.name
            ));
        }
        for other in &params[pos + 1..] {
            if other.name == param.name {
                problems.push_fatal(format!("duplicate parameter name `{}`", param.name));
            }
        }
    }

    problems.merge(check_name_collisions(index, target, params));
    problems
}

/// Names introduced by the new parameter list must not collide with a
/// *different* element visible inside the method body — unless the clashing
/// original parameter is itself being removed.
fn check_name_collisions(index: &Index, target: &MethodKey, params: &[ParameterInfo]) -> Problems {
    let mut problems = Problems::new();

    let Some(sym) = lookup_executable(index, target) else {
        return problems;
    };
    let Some(resolver) = Resolver::new(index, &sym.file) else {
        return problems;
    };
    let unit = resolver.unit();
    let original_params: Vec<String> = if target.is_constructor() {
        find_constructor_decl(unit, target)
            .map(|c| c.params.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    } else {
        find_method_decl(unit, target)
            .map(|m| m.params.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    };

    let body_offset = sym.decl_range.end.saturating_sub(1);
    let visible = resolver.visible_names_at(body_offset);

    for param in params {
        let keeps_same_original = param
            .original_index
            .map_or(false, |idx| original_params.get(idx) == Some(&param.name));
        if keeps_same_original {
            continue;
        }
        if !visible.contains(&param.name) {
            continue;
        }
        // The clash is allowed when the colliding original parameter is
        // being removed from the signature.
        let collides_with_removed_param = original_params
            .iter()
            .enumerate()
            .any(|(idx, original)| {
                *original == param.name
                    && !params.iter().any(|p| p.original_index == Some(idx))
            });
        if collides_with_removed_param {
            continue;
        }
        problems.push_fatal(format!(
            "parameter name `{}` already denotes a different element visible in the method body",
            param.name
        ));
    }

    problems
}

/// Full semantic phase: duplicate signatures, type assignability, and
/// access-escalation checks across the enclosing type and its subtypes.
#[must_use]
pub fn full_check(
    index: &Index,
    target: &MethodKey,
    new_name: Option<&str>,
    params: &[ParameterInfo],
    new_visibility: Option<AccessLevel>,
) -> Problems {
    let mut problems = Problems::new();

    let final_name = new_name.unwrap_or(&target.name);
    let new_types: Vec<String> = params.iter().map(|p| normalize_type_text(&p.ty)).collect();

    problems.merge(check_duplicate_signatures(
        index, target, final_name, params, &new_types,
    ));
    problems.merge(check_type_assignability(index, target, params));
    problems.merge(check_access_escalation(
        index,
        target,
        final_name,
        &new_types,
        new_visibility,
    ));
    problems
}

fn check_duplicate_signatures(
    index: &Index,
    target: &MethodKey,
    final_name: &str,
    params: &[ParameterInfo],
    new_types: &[String],
) -> Problems {
    let mut problems = Problems::new();
    let original_types = original_param_types(index, target);

    for sym in index.executables_of(&target.class) {
        if sym.name != final_name {
            continue;
        }
        let sibling_types: Vec<String> = sym
            .param_types
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|t| normalize_type_text(t))
            .collect();

        // Skip the target itself.
        if sym.name == target.name && sibling_types == target.params {
            continue;
        }
        if sibling_types.len() != new_types.len() {
            continue;
        }
        if sibling_types != *new_types {
            continue;
        }

        // The final signature collides with an existing sibling. When every
        // type change producing the collision is a primitive widening of
        // the original type, report it as a widening conversion.
        let changed: Vec<(usize, &str, &str)> = params
            .iter()
            .enumerate()
            .filter_map(|(pos, param)| {
                let idx = param.original_index?;
                let original = original_types.get(idx)?;
                let new = normalize_type_text(&param.ty);
                (normalize_type_text(original) != new).then_some(pos)
                    .map(|pos| (pos, original.as_str(), param.ty.as_str()))
            })
            .collect();
        let all_widening = !changed.is_empty()
            && changed.iter().all(|(_, from, to)| is_widening(from, to));

        if all_widening {
            problems.push_warning(format!(
                "changed parameter types widen onto the existing overload `{final_name}({})`",
                sibling_types.join(", ")
            ));
        } else {
            problems.push_warning(format!(
                "a method `{final_name}({})` already exists in `{}`",
                sibling_types.join(", "),
                target.class
            ));
        }
    }
    problems
}

fn check_type_assignability(
    index: &Index,
    target: &MethodKey,
    params: &[ParameterInfo],
) -> Problems {
    let mut problems = Problems::new();
    let original_types = original_param_types(index, target);
    let last = params.len().saturating_sub(1);

    for (pos, param) in params.iter().enumerate() {
        let Some(idx) = param.original_index else {
            continue;
        };
        let Some(original) = original_types.get(idx) else {
            problems.push_fatal(format!(
                "parameter `{}` refers to original index {idx}, but the method has only {} parameters",
                param.name,
                original_types.len()
            ));
            continue;
        };

        // Trailing vararg: the component type carries the check.
        if pos == last && param.is_vararg() {
            let component = param.component_type();
            let original_component = original.trim_end().trim_end_matches("...");
            if !is_assignable(index, original_component, component) {
                problems.push_warning(format!(
                    "vararg component type `{component}` is not assignable from `{original_component}`",
                ));
            }
            continue;
        }

        if !is_assignable(index, original, &param.ty) {
            problems.push_warning(format!(
                "existing arguments of type `{original}` are not assignable to the new type `{}` of parameter `{}`",
                param.ty, param.name
            ));
        }
    }
    problems
}

fn check_access_escalation(
    index: &Index,
    target: &MethodKey,
    final_name: &str,
    new_types: &[String],
    new_visibility: Option<AccessLevel>,
) -> Problems {
    let mut problems = Problems::new();
    let cancel = arbor_core::CancelToken::new();
    let Ok(subtypes) = index.all_subtypes(&target.class, &cancel) else {
        return problems;
    };
    let Some(target_sym) = lookup_executable(index, target) else {
        return problems;
    };

    for sub in subtypes {
        for sym in index.executables_of(&sub) {
            if sym.kind != SymbolKind::Method {
                continue;
            }

            // Overrides of the *current* signature.
            if sym.name == target.name && sym.params_match(&target.params) {
                if let Some(new_vis) = new_visibility {
                    if new_vis.to_visibility().is_stricter_than(sym.visibility) {
                        problems.push_fatal(format!(
                            "narrowing access would break the override in `{sub}`"
                        ));
                    }
                }
                if sym.type_text != target_sym.type_text {
                    problems.push_fatal(format!(
                        "the override in `{sub}` declares a different return type"
                    ));
                }
                continue;
            }

            // A sibling subtype method that matches the *final* signature
            // will newly become an override.
            let sibling_types: Vec<String> = sym
                .param_types
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|t| normalize_type_text(t))
                .collect();
            if sym.name == final_name && sibling_types == *new_types {
                problems.push_warning(format!(
                    "`{sub}.{final_name}` will become an override of the changed method"
                ));
            }
        }
    }
    problems
}

fn original_param_types(index: &Index, target: &MethodKey) -> Vec<String> {
    lookup_executable(index, target)
        .and_then(|sym| sym.param_types.clone())
        .unwrap_or_default()
}

pub(crate) fn lookup_executable<'a>(
    index: &'a Index,
    key: &MethodKey,
) -> Option<&'a arbor_index::Symbol> {
    index
        .executables_of(&key.class)
        .into_iter()
        .find(|sym| sym.name == key.name && sym.params_match(&key.params))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use arbor_core::FileId;
    use pretty_assertions::assert_eq;

    fn build(files: Vec<(&str, &str)>) -> Index {
        let map: BTreeMap<FileId, String> = files
            .into_iter()
            .map(|(file, text)| (FileId::new(file), text.to_string()))
            .collect();
        Index::new(map)
    }

    fn key(class: &str, name: &str, params: &[&str]) -> MethodKey {
        let owned: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        MethodKey::new(class, name, &owned)
    }

    #[test]
    fn widening_chain_is_strict_and_unidirectional() {
        for (i, from) in WIDENING_CHAIN.iter().enumerate() {
            for (j, to) in WIDENING_CHAIN.iter().enumerate() {
                assert_eq!(is_widening(from, to), i < j, "{from} -> {to}");
            }
        }
        assert!(!is_widening("boolean", "int"));
        assert!(!is_widening("int", "String"));
    }

    #[test]
    fn vararg_only_in_last_position_is_fatal() {
        let index = build(vec![("A.java", "class A { void f(int a, int b) {} }")]);
        let target = key("A", "f", &["int", "int"]);
        let params = vec![
            ParameterInfo {
                name: "a".into(),
                ty: "int...".into(),
                default_value: None,
                original_index: Some(0),
            },
            ParameterInfo::existing(1, "b", "int"),
        ];
        let problems = fast_check(&index, &target, None, &params);
        assert!(problems.is_fatal());
        assert!(problems.messages()[0].contains("must be the last parameter"));

        let params = vec![
            ParameterInfo::existing(1, "b", "int"),
            ParameterInfo {
                name: "a".into(),
                ty: "int...".into(),
                default_value: None,
                original_index: Some(0),
            },
        ];
        assert!(!fast_check(&index, &target, None, &params).is_fatal());
    }

    #[test]
    fn new_parameter_requires_default() {
        let index = build(vec![("A.java", "class A { void f() {} }")]);
        let target = key("A", "f", &[]);
        let params = vec![ParameterInfo {
            name: "x".into(),
            ty: "int".into(),
            default_value: None,
            original_index: None,
        }];
        assert!(fast_check(&index, &target, None, &params).is_fatal());

        let params = vec![ParameterInfo::new_param("x", "int", "0")];
        assert!(fast_check(&index, &target, None, &params).is_empty());
    }

    #[test]
    fn colliding_name_allowed_when_original_param_is_removed() {
        let index = build(vec![(
            "A.java",
            "class A { void f(int keep, int drop) { use(keep); } }",
        )]);
        let target = key("A", "f", &["int", "int"]);

        // Rename `keep` to `drop` while removing the original `drop`.
        let params = vec![ParameterInfo::existing(0, "drop", "int")];
        assert!(fast_check(&index, &target, None, &params).is_empty());

        // Renaming `keep` to `drop` while keeping both collides.
        let params = vec![
            ParameterInfo::existing(0, "drop", "int"),
            ParameterInfo::existing(1, "drop2", "int"),
        ];
        let problems = fast_check(&index, &target, None, &params);
        assert!(problems.is_fatal());
    }

    #[test]
    fn widening_onto_existing_overload_warns_without_fatal() {
        let index = build(vec![(
            "A.java",
            "class A { void m(int v) {} void m(long v) {} }",
        )]);
        let target = key("A", "m", &["int"]);

        // int -> long collides with m(long), but the change is widening.
        let params = vec![ParameterInfo::existing(0, "v", "long")];
        let problems = full_check(&index, &target, None, &params, None);
        assert!(!problems.is_fatal());
        assert!(problems
            .messages()
            .iter()
            .any(|m| m.contains("widen")));

        // The narrowing direction produces a distinct, non-convertible
        // signature: the duplicate check stays silent.
        let index = build(vec![(
            "A.java",
            "class A { void m(long v) {} void m(String v) {} }",
        )]);
        let target = key("A", "m", &["long"]);
        let params = vec![ParameterInfo::existing(0, "v", "int")];
        let problems = full_check(&index, &target, None, &params, None);
        assert!(!problems.messages().iter().any(|m| m.contains("widen")));
        assert!(!problems
            .messages()
            .iter()
            .any(|m| m.contains("already exists")));
    }

    #[test]
    fn identical_duplicate_signature_warns() {
        let index = build(vec![(
            "A.java",
            "class A { void m(int v) {} void m(String v) {} }",
        )]);
        let target = key("A", "m", &["int"]);
        let params = vec![ParameterInfo::existing(0, "v", "String")];
        let problems = full_check(&index, &target, None, &params, None);
        assert!(problems
            .messages()
            .iter()
            .any(|m| m.contains("already exists")));
    }

    #[test]
    fn narrowing_access_below_override_is_fatal() {
        let index = build(vec![
            ("A.java", "class A { public void run(int x) {} }"),
            ("B.java", "class B extends A { public void run(int x) {} }"),
        ]);
        let target = key("A", "run", &["int"]);
        let params = vec![ParameterInfo::existing(0, "x", "int")];
        let problems = full_check(
            &index,
            &target,
            None,
            &params,
            Some(AccessLevel::Private),
        );
        assert!(problems.is_fatal());
        assert!(problems.messages()[0].contains("narrowing access"));
    }

    #[test]
    fn newly_created_override_warns() {
        let index = build(vec![
            ("A.java", "class A { void run(int x) {} }"),
            ("B.java", "class B extends A { void run(long x) {} }"),
        ]);
        let target = key("A", "run", &["int"]);
        // Changing int -> long makes B.run(long) an override.
        let params = vec![ParameterInfo::existing(0, "x", "long")];
        let problems = full_check(&index, &target, None, &params, None);
        assert!(problems
            .messages()
            .iter()
            .any(|m| m.contains("will become an override")));
    }
}
