//! Arbor's refactoring engine.
//!
//! The transformation core for a Java-aware IDE: symbolic element handles,
//! project-wide usage discovery, two-phase precondition checking, the
//! per-refactoring tree rewrite visitors, and the atomic per-unit commit
//! layer. The catalog:
//! - Rename (`rename`)
//! - Change Method Signature (`change_signature`)
//! - Encapsulate Field (`encapsulate`)
//! - Inline Method (`inline_method`)
//! - Push Down members (`move_member`)
//! - Introduce Local Extension (`local_extension`)

mod change_signature;
mod commit;
mod edit;
mod encapsulate;
mod handle;
mod inline_method;
mod local_extension;
mod move_member;
mod problem;
mod rename;
mod session;
mod signature;
mod usages;
mod util;

pub use change_signature::{ChangeSignature, HierarchyPropagation};
pub use commit::{extend_to_attached_comments, UnitRewrite, UnitRewriter};
pub use edit::{
    apply_text_edits, apply_workspace_edit, EditError, FileOp, TextEdit, WorkspaceEdit,
};
pub use encapsulate::EncapsulateField;
pub use handle::{ElementHandle, ElementKind};
pub use inline_method::InlineMethod;
pub use local_extension::IntroduceLocalExtension;
pub use move_member::PushDownMembers;
pub use problem::{Problem, Problems, Severity};
pub use rename::Rename;
pub use session::{
    ElementsBag, NullProgress, ProgressListener, Refactoring, RefactoringSession,
};
pub use signature::{
    is_assignable, is_widening, AccessLevel, ParameterInfo, WIDENING_CHAIN,
};
pub use usages::{find_usages, RelatedHandles, SearchFlags, UsageSet};

pub use arbor_core::{CancelToken, Cancelled, FileId, Span};
