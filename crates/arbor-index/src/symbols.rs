use arbor_core::{FileId, Span};
use arbor_syntax::ast::Visibility;
use serde::{Deserialize, Serialize};

/// Index-assigned symbol identifier, stable for the index's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Class,
    Interface,
    Enum,
    Method,
    Constructor,
    Field,
}

impl SymbolKind {
    #[must_use]
    pub fn is_type(self) -> bool {
        matches!(
            self,
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Enum
        )
    }
}

/// One declaration known to the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub id: SymbolId,
    pub kind: SymbolKind,
    pub name: String,
    /// Enclosing type simple name; `None` for top-level types.
    pub container: Option<String>,
    pub file: FileId,
    pub name_range: Span,
    pub decl_range: Span,
    pub visibility: Visibility,
    pub is_static: bool,
    /// Declared parameter type texts for executables.
    pub param_types: Option<Vec<String>>,
    /// Whether the final parameter is a vararg.
    pub is_vararg: bool,
    /// Field type for fields, return type for methods.
    pub type_text: Option<String>,
}

impl Symbol {
    /// Whitespace-insensitive parameter-type comparison.
    #[must_use]
    pub fn params_match(&self, other: &[String]) -> bool {
        let Some(params) = self.param_types.as_ref() else {
            return other.is_empty();
        };
        params.len() == other.len()
            && params
                .iter()
                .zip(other)
                .all(|(a, b)| normalize_type_text(a) == normalize_type_text(b))
    }
}

/// Strips all ASCII whitespace so `Map<String, Integer>` and
/// `Map<String,Integer>` compare equal.
#[must_use]
pub fn normalize_type_text(ty: &str) -> String {
    ty.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}
