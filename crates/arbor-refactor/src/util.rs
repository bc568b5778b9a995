//! Small lexical helpers shared by the rewrite visitors.

use arbor_core::is_ident_char_byte;
use arbor_resolve::{simple_type_name, Resolver, TypeInference};
use arbor_syntax::ast::{Expr, Modifiers, NameExpr, Visibility};

/// Rebuild a modifier keyword run with a different visibility.
pub(crate) fn modifiers_text(modifiers: &Modifiers, visibility: Visibility) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let keyword = visibility.keyword();
    if !keyword.is_empty() {
        parts.push(keyword);
    }
    if modifiers.is_abstract {
        parts.push("abstract");
    }
    if modifiers.is_static {
        parts.push("static");
    }
    if modifiers.is_final {
        parts.push("final");
    }
    if modifiers.is_synchronized {
        parts.push("synchronized");
    }
    if modifiers.is_native {
        parts.push("native");
    }
    if modifiers.is_transient {
        parts.push("transient");
    }
    if modifiers.is_volatile {
        parts.push("volatile");
    }
    parts.join(" ")
}

/// The receiver expression immediately left of a `.`-qualified occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Receiver {
    /// No `.` before the occurrence.
    None,
    This,
    Super,
    /// A plain identifier receiver (variable or type name).
    Name(String),
    /// Anything more complex (`foo().bar`, `a[i].bar`).
    Other,
}

/// Lexically classify the receiver of an occurrence starting at `offset`.
pub(crate) fn receiver_before_dot(text: &str, offset: usize) -> Receiver {
    let bytes = text.as_bytes();
    let mut i = offset;
    while i > 0 && bytes[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    if i == 0 || bytes[i - 1] != b'.' {
        return Receiver::None;
    }
    let mut end = i - 1;
    while end > 0 && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    if end == 0 {
        return Receiver::Other;
    }
    if !is_ident_char_byte(bytes[end - 1]) {
        return Receiver::Other;
    }
    let mut start = end;
    while start > 0 && is_ident_char_byte(bytes[start - 1]) {
        start -= 1;
    }
    match &text[start..end] {
        "this" => Receiver::This,
        "super" => Receiver::Super,
        token => Receiver::Name(token.to_string()),
    }
}

/// Resolve the class a `.`-qualified occurrence dispatches on, or the
/// enclosing class for unqualified occurrences.
pub(crate) fn receiver_class_at(
    resolver: &Resolver<'_>,
    text: &str,
    offset: usize,
) -> Option<String> {
    match receiver_before_dot(text, offset) {
        Receiver::None | Receiver::This => resolver
            .enclosing_type(offset)
            .map(|ty| ty.name().to_string()),
        Receiver::Super => {
            let ty = resolver.enclosing_type(offset)?;
            resolver.index().class_extends(ty.name()).map(str::to_string)
        }
        Receiver::Name(name) => {
            let inference = TypeInference::new(resolver);
            let name_expr = Expr::Name(NameExpr {
                name: name.clone(),
                range: arbor_core::Span::point(offset),
            });
            let ty = inference
                .infer(&name_expr, offset)
                .unwrap_or_else(|| name.clone());
            Some(simple_type_name(&ty))
        }
        Receiver::Other => None,
    }
}
