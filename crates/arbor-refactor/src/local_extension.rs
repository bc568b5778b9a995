//! Introduce Local Extension.
//!
//! Generates a wrapper (delegation) or subclass extension of an existing
//! type as a new compilation unit, optionally retargeting type references
//! in the project to the extension. The new unit is a file-create side
//! effect carried through the edit layer.

use arbor_core::{CancelToken, Cancelled, FileId};
use arbor_index::{CandidateKind, Index, SymbolKind};
use arbor_resolve::{find_type_decl, Element, Resolver};
use arbor_syntax::ast::{MemberDecl, Visibility};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::commit::UnitRewriter;
use crate::edit::FileOp;
use crate::handle::{ElementHandle, ElementKind};
use crate::problem::Problems;
use crate::usages::{self, SearchFlags, UsageSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IntroduceLocalExtension {
    pub source_type: ElementHandle,
    pub new_name: String,
    /// Path for the generated compilation unit.
    pub new_file: FileId,
    /// Wrapper (delegation) instead of a subclass extension.
    #[serde(default)]
    pub wrap: bool,
    /// Retarget type references in the project to the extension.
    #[serde(default)]
    pub replace_usages: bool,
    /// Generate `equals`/`hashCode` delegation (wrapper mode).
    #[serde(default)]
    pub generate_equality: bool,
}

impl IntroduceLocalExtension {
    pub(crate) fn precheck(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        if self.source_type.kind != ElementKind::Type {
            problems.push_fatal("introduce local extension starts from a type");
            return problems;
        }
        if self.source_type.resolve(index).is_none() {
            problems.push_fatal(format!(
                "cannot resolve type `{}`",
                self.source_type.name
            ));
        }
        problems
    }

    pub(crate) fn fast_check(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        if !arbor_core::is_valid_java_identifier(&self.new_name) {
            problems.push_fatal(format!(
                "`{}` is not a valid Java identifier",
                self.new_name
            ));
        }
        if index.find_type(&self.new_name).is_some() {
            problems.push_fatal(format!(
                "a type named `{}` already exists",
                self.new_name
            ));
        }
        if index.file_text(&self.new_file).is_some() {
            problems.push_fatal(format!("file `{}` already exists", self.new_file));
        }
        problems
    }

    pub(crate) fn full_check(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        if !self.wrap {
            if let Some(sym) = self.source_type.resolve(index) {
                if sym.kind == SymbolKind::Class {
                    // A subclass extension needs a non-final source class.
                    let is_final = index
                        .file_text(&sym.file)
                        .map_or(false, |text| {
                            let prefix = &text[..sym.name_range.start.min(text.len())];
                            let line = &prefix[arbor_core::line_start(prefix, prefix.len())..];
                            line.contains("final")
                        });
                    if is_final {
                        problems.push_fatal(format!(
                            "`{}` is final and cannot be extended; use a wrapper",
                            self.source_type.name
                        ));
                    }
                }
            }
        }
        problems
    }

    pub(crate) fn usage_set(
        &self,
        index: &Index,
        cancel: &CancelToken,
    ) -> Result<UsageSet, Cancelled> {
        if !self.replace_usages {
            let mut set = UsageSet::default();
            if let Some(sym) = self.source_type.resolve(index) {
                set.files.insert(sym.file.clone());
            }
            return Ok(set);
        }
        usages::find_usages(
            index,
            &self.source_type,
            SearchFlags {
                find_usages: true,
                ..SearchFlags::default()
            },
            cancel,
        )
    }

    pub(crate) fn rewrite_file(
        &self,
        index: &Index,
        file: &FileId,
        rewriter: &mut UnitRewriter,
    ) {
        let Some(source_sym) = self.source_type.resolve(index) else {
            return;
        };

        // The generated unit rides with the source file's unit of work so
        // it is produced exactly once.
        if &source_sym.file == file {
            rewriter.push_file_op(FileOp::Create {
                file: self.new_file.clone(),
                text: self.generate_unit(index),
            });
        }

        // References are only retargeted outside the declaring unit: the
        // original type, its constructors, and its self-references stay.
        if !self.replace_usages || &source_sym.file == file {
            return;
        }
        let Some(resolver) = Resolver::new(index, file) else {
            return;
        };
        for candidate in index.find_name_candidates_in_file(file, &self.source_type.name) {
            if !matches!(candidate.kind, CandidateKind::Plain | CandidateKind::Call) {
                continue;
            }
            let resolves_to_type = matches!(
                resolver.resolve_identifier(candidate.range.start, &self.source_type.name),
                Some(Element::Type { ref name }) if *name == self.source_type.name
            );
            if resolves_to_type {
                rewriter.replace(candidate.range, self.new_name.clone());
            }
        }
    }

    /// Generate the extension compilation unit's text.
    fn generate_unit(&self, index: &Index) -> String {
        let source = &self.source_type.name;
        let package = index.package_of_type(source);

        let mut out = String::new();
        if let Some(package) = package {
            out.push_str(&format!("package {package};\n\n"));
        }

        if self.wrap {
            self.generate_wrapper(index, &mut out);
        } else {
            self.generate_subclass(index, &mut out);
        }
        out
    }

    fn generate_wrapper(&self, index: &Index, out: &mut String) {
        let source = &self.source_type.name;
        let ext = &self.new_name;

        out.push_str(&format!("public class {ext} {{\n"));
        out.push_str(&format!("    private final {source} delegate;\n"));

        // Mirror the source constructors; fall back to a plain wrapping
        // constructor when none are declared.
        let ctors = source_constructors(index, source);
        if ctors.is_empty() {
            out.push_str(&format!(
                "\n    public {ext}({source} delegate) {{\n        this.delegate = delegate;\n    }}\n"
            ));
        } else {
            for params in &ctors {
                let decl = render_params(params);
                let args = params
                    .iter()
                    .map(|(_, name)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!(
                    "\n    public {ext}({decl}) {{\n        this.delegate = new {source}({args});\n    }}\n"
                ));
            }
        }

        for method in delegatable_methods(index, source) {
            let decl = render_params(&method.params);
            let args = method
                .params
                .iter()
                .map(|(_, name)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let call = format!("delegate.{}({args})", method.name);
            let body = if method.return_ty == "void" {
                format!("{call};")
            } else {
                format!("return {call};")
            };
            out.push_str(&format!(
                "\n    public {} {}({decl}) {{\n        {body}\n    }}\n",
                method.return_ty, method.name
            ));
        }

        if self.generate_equality {
            out.push_str(&format!(
                "\n    @Override\n    public boolean equals(Object other) {{\n        if (other instanceof {ext}) {{\n            return delegate.equals((({ext}) other).delegate);\n        }}\n        return delegate.equals(other);\n    }}\n"
            ));
            out.push_str(
                "\n    @Override\n    public int hashCode() {\n        return delegate.hashCode();\n    }\n",
            );
        }

        out.push_str("}\n");
    }

    fn generate_subclass(&self, index: &Index, out: &mut String) {
        let source = &self.source_type.name;
        let ext = &self.new_name;

        out.push_str(&format!("public class {ext} extends {source} {{\n"));
        let ctors = source_constructors(index, source);
        if ctors.is_empty() {
            out.push_str(&format!("\n    public {ext}() {{\n        super();\n    }}\n"));
        } else {
            for params in &ctors {
                let decl = render_params(params);
                let args = params
                    .iter()
                    .map(|(_, name)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str(&format!(
                    "\n    public {ext}({decl}) {{\n        super({args});\n    }}\n"
                ));
            }
        }
        out.push_str("}\n");
    }
}

struct DelegatableMethod {
    name: String,
    return_ty: String,
    params: Vec<(String, String)>,
}

/// Declared constructor parameter lists of `source`, as `(type, name)`.
fn source_constructors(index: &Index, source: &str) -> Vec<Vec<(String, String)>> {
    let Some(sym) = index.find_type(source) else {
        return Vec::new();
    };
    let Some(parse) = index.file_parse(&sym.file) else {
        return Vec::new();
    };
    let Some(decl) = find_type_decl(parse.compilation_unit(), source) else {
        return Vec::new();
    };
    decl.members()
        .iter()
        .filter_map(|member| match member {
            MemberDecl::Constructor(ctor)
                if ctor.modifiers.visibility != Visibility::Private =>
            {
                Some(
                    ctor.params
                        .iter()
                        .map(|p| (p.ty.text.clone(), p.name.clone()))
                        .collect(),
                )
            }
            _ => None,
        })
        .collect()
}

fn delegatable_methods(index: &Index, source: &str) -> Vec<DelegatableMethod> {
    let Some(sym) = index.find_type(source) else {
        return Vec::new();
    };
    let Some(parse) = index.file_parse(&sym.file) else {
        return Vec::new();
    };
    let Some(decl) = find_type_decl(parse.compilation_unit(), source) else {
        return Vec::new();
    };
    decl.members()
        .iter()
        .filter_map(|member| match member {
            MemberDecl::Method(method)
                if method.modifiers.visibility == Visibility::Public
                    && !method.modifiers.is_static =>
            {
                Some(DelegatableMethod {
                    name: method.name.clone(),
                    return_ty: method.return_ty.text.clone(),
                    params: method
                        .params
                        .iter()
                        .map(|p| (p.ty.text.clone(), p.name.clone()))
                        .collect(),
                })
            }
            _ => None,
        })
        .collect()
}

fn render_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(ty, name)| format!("{ty} {name}"))
        .collect::<Vec<_>>()
        .join(", ")
}
