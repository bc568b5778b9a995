//! Refactoring session orchestration.
//!
//! Drives the fixed pipeline: precondition checks → usage discovery →
//! per-file rewrite units → atomic commit. The usage set is frozen before
//! any unit starts; per-file units share only the read-only index, handle
//! and descriptor, so they fan out onto the rayon pool and merge through a
//! lock-protected accumulator. A fatal problem discovered mid-walk still
//! lets the current unit finish (for diagnostic completeness) but blocks
//! every edit at commit time.

use std::sync::Mutex;

use arbor_core::{CancelToken, Cancelled, FileId};
use arbor_index::Index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::change_signature::ChangeSignature;
use crate::commit::{UnitRewrite, UnitRewriter};
use crate::edit::WorkspaceEdit;
use crate::encapsulate::EncapsulateField;
use crate::inline_method::InlineMethod;
use crate::local_extension::IntroduceLocalExtension;
use crate::move_member::PushDownMembers;
use crate::problem::Problems;
use crate::rename::Rename;
use crate::usages::{self, UsageSet};

/// Progress callbacks pushed to the UI collaborator: `start` after usage
/// discovery, `step` once per processed file, `stop` at completion.
pub trait ProgressListener: Sync {
    fn start(&self, total: usize);
    fn step(&self);
    fn stop(&self);
}

/// No-op listener for headless callers and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressListener for NullProgress {
    fn start(&self, _total: usize) {}
    fn step(&self) {}
    fn stop(&self) {}
}

/// Externally-owned collection of pending edits filled by
/// [`RefactoringSession::prepare`].
#[derive(Clone, Debug, Default)]
pub struct ElementsBag {
    pub edit: WorkspaceEdit,
}

/// The fixed refactoring catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Refactoring {
    Rename(Rename),
    ChangeSignature(ChangeSignature),
    EncapsulateField(EncapsulateField),
    InlineMethod(InlineMethod),
    PushDown(PushDownMembers),
    IntroduceLocalExtension(IntroduceLocalExtension),
}

pub struct RefactoringSession<'a> {
    index: &'a Index,
    refactoring: Refactoring,
    cancel: CancelToken,
}

impl<'a> RefactoringSession<'a> {
    #[must_use]
    pub fn new(index: &'a Index, refactoring: Refactoring) -> Self {
        RefactoringSession {
            index,
            refactoring,
            cancel: CancelToken::new(),
        }
    }

    /// The shared cooperative cancellation flag for this session.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Structural sanity of the target element itself.
    #[must_use]
    pub fn precheck(&self) -> Option<Problems> {
        let problems = match &self.refactoring {
            Refactoring::Rename(r) => r.precheck(self.index),
            Refactoring::ChangeSignature(r) => r.precheck(self.index),
            Refactoring::EncapsulateField(r) => r.precheck(self.index),
            Refactoring::InlineMethod(r) => r.precheck(self.index),
            Refactoring::PushDown(r) => r.precheck(self.index),
            Refactoring::IntroduceLocalExtension(r) => r.precheck(self.index),
        };
        problems.into_option()
    }

    /// Cheap syntactic/structural phase against the cached resolution.
    #[must_use]
    pub fn fast_check_parameters(&self) -> Option<Problems> {
        let problems = match &self.refactoring {
            Refactoring::Rename(r) => r.fast_check(),
            Refactoring::ChangeSignature(r) => r.fast_check(self.index),
            Refactoring::EncapsulateField(r) => r.fast_check(),
            Refactoring::InlineMethod(r) => r.fast_check(self.index),
            Refactoring::PushDown(r) => r.fast_check(),
            Refactoring::IntroduceLocalExtension(r) => r.fast_check(self.index),
        };
        problems.into_option()
    }

    /// Full semantic phase: member lists and subtypes.
    #[must_use]
    pub fn check_parameters(&self) -> Option<Problems> {
        let problems = match &self.refactoring {
            Refactoring::Rename(r) => r.full_check(self.index),
            Refactoring::ChangeSignature(r) => r.full_check(self.index),
            Refactoring::EncapsulateField(r) => r.full_check(self.index),
            Refactoring::InlineMethod(_) => Problems::new(),
            Refactoring::PushDown(r) => r.full_check(self.index),
            Refactoring::IntroduceLocalExtension(r) => r.full_check(self.index),
        };
        problems.into_option()
    }

    /// Main entry point: usage discovery, the per-file rewrite fan-out,
    /// and the atomic commit into `bag`.
    ///
    /// Cancellation at any point leaves `bag` untouched — zero partial
    /// edits, never a truncated set.
    pub fn prepare(
        &self,
        bag: &mut ElementsBag,
        progress: &dyn ProgressListener,
    ) -> Option<Problems> {
        match self.prepare_inner(bag, progress) {
            Ok(problems) => problems.into_option(),
            Err(Cancelled) => Some(Problems::fatal("refactoring cancelled")),
        }
    }

    fn prepare_inner(
        &self,
        bag: &mut ElementsBag,
        progress: &dyn ProgressListener,
    ) -> Result<Problems, Cancelled> {
        let usage_set = self.usage_set()?;
        let files: Vec<FileId> = usage_set.files.iter().cloned().collect();

        progress.start(files.len());

        // Per-file units share no mutable state; results merge through the
        // lock-protected accumulator.
        let accumulator: Mutex<Vec<UnitRewrite>> = Mutex::new(Vec::new());
        files.par_iter().for_each(|file| {
            if self.cancel.is_cancelled() {
                return;
            }
            let rewrite = self.rewrite_unit(file, &usage_set);
            if let Ok(mut acc) = accumulator.lock() {
                acc.push(rewrite);
            }
            progress.step();
        });
        progress.stop();

        self.cancel.check()?;

        let mut rewrites = accumulator
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Deterministic diagnostic order regardless of pool scheduling.
        rewrites.sort_by(|a, b| a.file.cmp(&b.file));

        let mut problems = Problems::new();
        let mut edit = WorkspaceEdit::default();
        for rewrite in rewrites {
            problems.merge(rewrite.problems);
            edit.edits.extend(rewrite.edits);
            edit.file_ops.extend(rewrite.file_ops);
        }

        if problems.is_fatal() {
            // No partial application: the bag stays empty.
            return Ok(problems);
        }

        if let Err(err) = edit.normalize() {
            problems.push_fatal(format!("refactoring produced conflicting edits: {err}"));
            return Ok(problems);
        }
        bag.edit = edit;
        Ok(problems)
    }

    fn usage_set(&self) -> Result<UsageSet, Cancelled> {
        match &self.refactoring {
            Refactoring::Rename(r) => {
                usages::find_usages(self.index, &r.target, r.search_flags(), &self.cancel)
            }
            Refactoring::ChangeSignature(r) => r.usage_set(self.index, &self.cancel),
            Refactoring::EncapsulateField(r) => {
                let mut set = usages::find_usages(
                    self.index,
                    &r.target,
                    r.search_flags(),
                    &self.cancel,
                )?;
                if let Some(sym) = r.target.resolve(self.index) {
                    set.files.insert(sym.file.clone());
                }
                Ok(set)
            }
            Refactoring::InlineMethod(r) => {
                let mut set = usages::find_usages(
                    self.index,
                    &r.target,
                    r.search_flags(),
                    &self.cancel,
                )?;
                if let Some(sym) = r.target.resolve(self.index) {
                    set.files.insert(sym.file.clone());
                }
                Ok(set)
            }
            Refactoring::PushDown(r) => r.usage_set(self.index, &self.cancel),
            Refactoring::IntroduceLocalExtension(r) => r.usage_set(self.index, &self.cancel),
        }
    }

    fn rewrite_unit(&self, file: &FileId, usage_set: &UsageSet) -> UnitRewrite {
        let mut rewriter = UnitRewriter::new(file.clone());
        match &self.refactoring {
            Refactoring::Rename(r) => {
                r.rewrite_file(self.index, file, &usage_set.related, &mut rewriter)
            }
            Refactoring::ChangeSignature(r) => r.rewrite_file(
                self.index,
                file,
                &usage_set.related.method_family,
                &mut rewriter,
            ),
            Refactoring::EncapsulateField(r) => r.rewrite_file(self.index, file, &mut rewriter),
            Refactoring::InlineMethod(r) => r.rewrite_file(self.index, file, &mut rewriter),
            Refactoring::PushDown(r) => r.rewrite_file(self.index, file, &mut rewriter),
            Refactoring::IntroduceLocalExtension(r) => {
                r.rewrite_file(self.index, file, &mut rewriter)
            }
        }
        rewriter.finish(self.index)
    }
}
