//! Symbolic element handles.
//!
//! A handle is an immutable, serializable description of a program element
//! that can be re-resolved against a freshly parsed snapshot of any file.
//! Identity is content-addressed: handles never compare by reference or by
//! bare name text, so textually identical names in different scopes are
//! never conflated.

use arbor_core::FileId;
use arbor_index::{normalize_type_text, Index, Symbol, SymbolKind};
use arbor_resolve::{Element, MethodKey};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ElementKind {
    Type,
    Method,
    Constructor,
    Field,
    Parameter,
    Local,
    Package,
    DocTag,
    Label,
}

/// A re-resolvable reference to a program element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ElementHandle {
    pub kind: ElementKind,
    /// Enclosing type simple name, for members.
    pub enclosing_type: Option<String>,
    pub name: String,
    /// Ordered, whitespace-normalized parameter type texts for executables.
    /// For parameters and locals this is the *owner* executable's signature.
    pub signature: Option<Vec<String>>,
    /// Declaring file, for file-scoped elements (locals, labels).
    pub file: Option<FileId>,
    /// Declaration name offset, for file-scoped elements.
    pub decl_offset: Option<usize>,
}

impl ElementHandle {
    pub fn type_(name: impl Into<String>) -> Self {
        ElementHandle {
            kind: ElementKind::Type,
            enclosing_type: None,
            name: name.into(),
            signature: None,
            file: None,
            decl_offset: None,
        }
    }

    pub fn field(class: impl Into<String>, name: impl Into<String>) -> Self {
        ElementHandle {
            kind: ElementKind::Field,
            enclosing_type: Some(class.into()),
            name: name.into(),
            signature: None,
            file: None,
            decl_offset: None,
        }
    }

    pub fn method(class: impl Into<String>, name: impl Into<String>, params: &[&str]) -> Self {
        ElementHandle {
            kind: ElementKind::Method,
            enclosing_type: Some(class.into()),
            name: name.into(),
            signature: Some(params.iter().map(|p| normalize_type_text(p)).collect()),
            file: None,
            decl_offset: None,
        }
    }

    pub fn constructor(class: impl Into<String>, params: &[&str]) -> Self {
        let class = class.into();
        ElementHandle {
            kind: ElementKind::Constructor,
            enclosing_type: Some(class.clone()),
            name: class,
            signature: Some(params.iter().map(|p| normalize_type_text(p)).collect()),
            file: None,
            decl_offset: None,
        }
    }

    pub fn local(
        class: impl Into<String>,
        owner_name: impl Into<String>,
        owner_params: &[&str],
        name: impl Into<String>,
        file: FileId,
        decl_offset: usize,
    ) -> Self {
        ElementHandle {
            kind: ElementKind::Local,
            enclosing_type: Some(class.into()),
            name: name.into(),
            signature: Some(
                std::iter::once(owner_name.into())
                    .chain(owner_params.iter().map(|p| normalize_type_text(p)))
                    .collect(),
            ),
            file: Some(file),
            decl_offset: Some(decl_offset),
        }
    }

    pub fn parameter(
        class: impl Into<String>,
        owner_name: impl Into<String>,
        owner_params: &[&str],
        name: impl Into<String>,
        file: FileId,
        decl_offset: usize,
    ) -> Self {
        ElementHandle {
            kind: ElementKind::Parameter,
            enclosing_type: Some(class.into()),
            name: name.into(),
            signature: Some(
                std::iter::once(owner_name.into())
                    .chain(owner_params.iter().map(|p| normalize_type_text(p)))
                    .collect(),
            ),
            file: Some(file),
            decl_offset: Some(decl_offset),
        }
    }

    pub fn label(name: impl Into<String>, file: FileId, decl_offset: usize) -> Self {
        ElementHandle {
            kind: ElementKind::Label,
            enclosing_type: None,
            name: name.into(),
            signature: None,
            file: Some(file),
            decl_offset: Some(decl_offset),
        }
    }

    /// The [`MethodKey`] this handle denotes, for executables.
    #[must_use]
    pub fn method_key(&self) -> Option<MethodKey> {
        if !matches!(self.kind, ElementKind::Method | ElementKind::Constructor) {
            return None;
        }
        let class = self.enclosing_type.as_deref()?;
        let params = self.signature.clone().unwrap_or_default();
        Some(MethodKey {
            class: class.to_string(),
            name: self.name.clone(),
            params,
        })
    }

    /// Re-resolve this handle to its declaration symbol in `index`.
    ///
    /// Returns `None` when the element no longer exists; callers treat that
    /// as a skippable resolution failure, not a hard error.
    #[must_use]
    pub fn resolve<'a>(&self, index: &'a Index) -> Option<&'a Symbol> {
        match self.kind {
            ElementKind::Type => index.find_type(&self.name),
            ElementKind::Field => {
                index.find_field(self.enclosing_type.as_deref()?, &self.name)
            }
            ElementKind::Method => {
                let class = self.enclosing_type.as_deref()?;
                let wanted = self.signature.as_deref().unwrap_or_default();
                index
                    .method_overloads(class, &self.name)
                    .into_iter()
                    .find(|sym| sym.params_match(wanted))
            }
            ElementKind::Constructor => {
                let class = self.enclosing_type.as_deref()?;
                let wanted = self.signature.as_deref().unwrap_or_default();
                index
                    .executables_of(class)
                    .into_iter()
                    .find(|sym| sym.kind == SymbolKind::Constructor && sym.params_match(wanted))
            }
            ElementKind::Parameter
            | ElementKind::Local
            | ElementKind::Label
            | ElementKind::Package
            | ElementKind::DocTag => None,
        }
    }

    /// For file-scoped handles the signature field encodes the owner as
    /// `[owner_name, owner_param_types...]`.
    fn owner_signature_matches(&self, owner: &MethodKey) -> bool {
        let Some(sig) = self.signature.as_deref() else {
            return true;
        };
        let Some((owner_name, owner_params)) = sig.split_first() else {
            return true;
        };
        *owner_name == owner.name && owner_params == owner.params.as_slice()
    }

    /// Whether a resolved [`Element`] is the element this handle denotes.
    #[must_use]
    pub fn matches(&self, element: &Element) -> bool {
        match (self.kind, element) {
            (ElementKind::Type, Element::Type { name }) => *name == self.name,
            (ElementKind::Field, Element::Field { class, name }) => {
                Some(class.as_str()) == self.enclosing_type.as_deref() && *name == self.name
            }
            (ElementKind::Method, Element::Method(key))
            | (ElementKind::Constructor, Element::Method(key)) => {
                Some(key.class.as_str()) == self.enclosing_type.as_deref()
                    && key.name == self.name
                    && self
                        .signature
                        .as_ref()
                        .map_or(true, |sig| *sig == key.params)
            }
            (ElementKind::Parameter, Element::Param { owner, name, .. }) => {
                Some(owner.class.as_str()) == self.enclosing_type.as_deref()
                    && *name == self.name
                    && self.owner_signature_matches(owner)
            }
            (ElementKind::Local, Element::Local { owner, name, decl }) => {
                Some(owner.class.as_str()) == self.enclosing_type.as_deref()
                    && *name == self.name
                    && self.owner_signature_matches(owner)
                    && self
                        .decl_offset
                        .map_or(true, |offset| decl.contains(offset) || decl.start == offset)
            }
            (ElementKind::Label, Element::Label { name, decl }) => {
                *name == self.name
                    && self
                        .decl_offset
                        .map_or(true, |offset| decl.contains(offset) || decl.start == offset)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_identity_not_name_text() {
        let field_a = ElementHandle::field("A", "x");
        let field_b = ElementHandle::field("B", "x");
        assert_ne!(field_a, field_b);

        let local = Element::Local {
            owner: MethodKey {
                class: "A".to_string(),
                name: "f".to_string(),
                params: vec![],
            },
            name: "x".to_string(),
            decl: arbor_core::Span::new(10, 11),
        };
        // A field handle never matches a same-named local.
        assert!(!field_a.matches(&local));
    }

    #[test]
    fn method_handles_compare_signatures() {
        let one = ElementHandle::method("A", "f", &["int"]);
        let two = ElementHandle::method("A", "f", &["long"]);
        assert_ne!(one, two);

        let key = MethodKey {
            class: "A".to_string(),
            name: "f".to_string(),
            params: vec!["int".to_string()],
        };
        assert!(one.matches(&Element::Method(key.clone())));
        assert!(!two.matches(&Element::Method(key)));
    }

    #[test]
    fn handles_round_trip_through_serde() {
        let handle = ElementHandle::method("Account", "withdraw", &["int", "String"]);
        let json = serde_json::to_string(&handle).unwrap();
        let back: ElementHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(handle, back);
    }
}
