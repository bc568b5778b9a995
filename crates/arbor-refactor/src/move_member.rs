//! Push Down members.
//!
//! Moves selected members from a superclass into every direct subclass.
//! The moved text is lifted verbatim (attached comments included) and
//! re-indented into each subclass body; the source declaration is deleted
//! or, for methods, optionally replaced by an abstract stub.

use arbor_core::{indentation_at, CancelToken, Cancelled, FileId};
use arbor_index::{Index, SymbolKind};
use arbor_resolve::find_type_decl;
use arbor_syntax::ast::Visibility;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::commit::{extend_to_attached_comments, UnitRewriter};
use crate::handle::{ElementHandle, ElementKind};
use crate::problem::Problems;
use crate::usages::UsageSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PushDownMembers {
    pub source_class: ElementHandle,
    pub members: Vec<ElementHandle>,
    /// Replace moved methods with abstract stubs instead of removing them.
    #[serde(default)]
    pub keep_abstract_stubs: bool,
}

impl PushDownMembers {
    pub(crate) fn precheck(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        if self.source_class.kind != ElementKind::Type {
            problems.push_fatal("push down starts from a type");
            return problems;
        }
        if self.source_class.resolve(index).is_none() {
            problems.push_fatal(format!(
                "cannot resolve type `{}`",
                self.source_class.name
            ));
            return problems;
        }
        if index.direct_subtypes(&self.source_class.name).is_empty() {
            problems.push_fatal(format!(
                "`{}` has no subclasses to push members into",
                self.source_class.name
            ));
        }
        for member in &self.members {
            if member.enclosing_type.as_deref() != Some(self.source_class.name.as_str()) {
                problems.push_fatal(format!(
                    "`{}` is not a member of `{}`",
                    member.name, self.source_class.name
                ));
            } else if member.resolve(index).is_none() {
                problems.push_fatal(format!("cannot resolve member `{}`", member.name));
            }
        }
        problems
    }

    pub(crate) fn fast_check(&self) -> Problems {
        let mut problems = Problems::new();
        if self.members.is_empty() {
            problems.push_fatal("no members selected to push down");
        }
        problems
    }

    pub(crate) fn full_check(&self, index: &Index) -> Problems {
        let mut problems = Problems::new();
        let source = &self.source_class.name;

        for sub in index.direct_subtypes(source) {
            for member in &self.members {
                let collision = match member.kind {
                    ElementKind::Field => index.find_field(sub, &member.name).is_some(),
                    ElementKind::Method => {
                        let sig = member.signature.as_deref().unwrap_or_default();
                        index
                            .method_overloads(sub, &member.name)
                            .into_iter()
                            .any(|sym| sym.params_match(sig))
                    }
                    _ => false,
                };
                if collision {
                    problems.push_fatal(format!(
                        "`{sub}` already declares `{}`",
                        member.name
                    ));
                }
            }
        }

        // Moved members that use private siblings left behind will need a
        // manual fix once relocated.
        for member in &self.members {
            let Some(sym) = member.resolve(index) else {
                continue;
            };
            let Some(text) = index.file_text(&sym.file) else {
                continue;
            };
            let body = sym.decl_range.slice(text);
            for sibling in index.members_of(source) {
                if sibling.visibility != Visibility::Private {
                    continue;
                }
                if self.members.iter().any(|m| m.name == sibling.name) {
                    continue;
                }
                if sibling.name_range == sym.name_range {
                    continue;
                }
                if contains_identifier(body, &sibling.name) {
                    problems.push_warning(format!(
                        "`{}` uses private member `{}` which stays in `{source}`; the moved copy needs a manual fix",
                        member.name, sibling.name
                    ));
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
        let mut set = UsageSet::default();
        if let Some(sym) = self.source_class.resolve(index) {
            set.files.insert(sym.file.clone());
        }
        for sub in index.direct_subtypes(&self.source_class.name) {
            cancel.check()?;
            if let Some(sym) = index.find_type(sub) {
                set.files.insert(sym.file.clone());
            }
            set.related.affected_types.push(sub.to_string());
        }
        Ok(set)
    }

    pub(crate) fn rewrite_file(
        &self,
        index: &Index,
        file: &FileId,
        rewriter: &mut UnitRewriter,
    ) {
        let Some(text) = index.file_text(file) else {
            return;
        };
        let Some(parse) = index.file_parse(file) else {
            return;
        };
        let source = &self.source_class.name;

        // Remove (or stub out) the member in the source class.
        let source_declared_here = self
            .source_class
            .resolve(index)
            .map_or(false, |sym| &sym.file == file);
        if source_declared_here {
            for member in &self.members {
                let Some(sym) = member.resolve(index) else {
                    tracing::debug!(member = %member.name, "member vanished before rewrite");
                    continue;
                };
                if self.keep_abstract_stubs && sym.kind == SymbolKind::Method {
                    let stub = abstract_stub(index, sym);
                    rewriter.replace(sym.decl_range, stub);
                } else {
                    rewriter.delete_decl(text, parse, sym.decl_range);
                }
            }
        }

        // Insert the moved text into each subclass declared in this file.
        for sub in index.direct_subtypes(source) {
            let Some(sub_sym) = index.find_type(sub) else {
                continue;
            };
            if &sub_sym.file != file {
                continue;
            }
            let Some(sub_decl) = find_type_decl(parse.compilation_unit(), sub) else {
                continue;
            };
            let body_close = sub_decl.body_range().end.saturating_sub(1);
            let class_indent = indentation_at(text, sub_decl.range().start);
            let member_indent = format!("{class_indent}    ");

            for member in &self.members {
                let Some(sym) = member.resolve(index) else {
                    continue;
                };
                let Some(source_text) = index.file_text(&sym.file) else {
                    continue;
                };
                let Some(source_parse) = index.file_parse(&sym.file) else {
                    continue;
                };
                let lifted =
                    extend_to_attached_comments(source_text, source_parse, sym.decl_range);
                let original_indent = indentation_at(source_text, sym.decl_range.start);
                let body = lifted.slice(source_text).trim_end();
                let reindented = reindent_lines(body, &original_indent, &member_indent);
                rewriter.insert(body_close, format!("\n{reindented}\n"));

                // Types the moved member mentions may need imports in the
                // subclass's unit.
                if let Some(ty) = sym.type_text.as_deref() {
                    rewriter.require_type(arbor_resolve::simple_type_name(ty));
                }
                for param_ty in sym.param_types.as_deref().unwrap_or_default() {
                    rewriter.require_type(arbor_resolve::simple_type_name(param_ty));
                }
            }
        }
    }
}

fn abstract_stub(index: &Index, sym: &arbor_index::Symbol) -> String {
    let vis = match sym.visibility {
        Visibility::Public => "public ",
        Visibility::Protected => "protected ",
        // A private or package-private method cannot be abstract; the
        // stub escalates to protected.
        _ => "protected ",
    };
    let ret = sym.type_text.as_deref().unwrap_or("void");
    let params = index
        .file_parse(&sym.file)
        .and_then(|parse| {
            let key = arbor_resolve::MethodKey::new(
                sym.container.as_deref()?,
                &sym.name,
                sym.param_types.as_deref().unwrap_or_default(),
            );
            arbor_resolve::find_method_decl(parse.compilation_unit(), &key).map(|m| {
                m.params
                    .iter()
                    .map(|p| format!("{} {}", p.ty.text, p.name))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
        })
        .unwrap_or_default();
    format!("{vis}abstract {ret} {}({params});", sym.name)
}

fn reindent_lines(text: &str, old_indent: &str, new_indent: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                let stripped = line.strip_prefix(old_indent).unwrap_or(line.trim_start());
                format!("{new_indent}{stripped}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn contains_identifier(text: &str, name: &str) -> bool {
    let bytes = text.as_bytes();
    let mut from = 0usize;
    while let Some(pos) = text[from..].find(name) {
        let start = from + pos;
        let end = start + name.len();
        from = start + 1;
        let before_ok = start == 0 || !arbor_core::is_ident_char_byte(bytes[start - 1]);
        let after_ok = end == bytes.len() || !arbor_core::is_ident_char_byte(bytes[end]);
        if before_ok && after_ok {
            return true;
        }
    }
    false
}
