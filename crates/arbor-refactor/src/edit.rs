use std::collections::BTreeMap;

use arbor_core::{FileId, Span};
use thiserror::Error;

/// A single text edit against one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextEdit {
    pub file: FileId,
    pub range: Span,
    pub replacement: String,
}

impl TextEdit {
    pub fn insert(file: FileId, offset: usize, text: impl Into<String>) -> Self {
        Self {
            file,
            range: Span::point(offset),
            replacement: text.into(),
        }
    }

    pub fn replace(file: FileId, range: Span, text: impl Into<String>) -> Self {
        Self {
            file,
            range,
            replacement: text.into(),
        }
    }

    pub fn delete(file: FileId, range: Span) -> Self {
        Self {
            file,
            range,
            replacement: String::new(),
        }
    }
}

/// Whole-file side effects (introduce-local-extension creates a unit;
/// move-style refactorings may delete one).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOp {
    Create { file: FileId, text: String },
    Delete { file: FileId },
}

/// A set of edits across potentially multiple files, plus file-level
/// side effects.
///
/// Edits are expected to be normalized (sorted, deduplicated,
/// non-overlapping) before being applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkspaceEdit {
    pub edits: Vec<TextEdit>,
    pub file_ops: Vec<FileOp>,
}

impl WorkspaceEdit {
    #[must_use]
    pub fn new(edits: Vec<TextEdit>) -> Self {
        Self {
            edits,
            file_ops: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.file_ops.is_empty()
    }

    /// Returns edits grouped by file in deterministic order.
    #[must_use]
    pub fn edits_by_file(&self) -> BTreeMap<&FileId, Vec<&TextEdit>> {
        let mut map: BTreeMap<&FileId, Vec<&TextEdit>> = BTreeMap::new();
        for edit in &self.edits {
            map.entry(&edit.file).or_default().push(edit);
        }
        for edits in map.values_mut() {
            edits.sort_by(|a, b| {
                a.range
                    .start
                    .cmp(&b.range.start)
                    .then_with(|| a.range.end.cmp(&b.range.end))
            });
        }
        map
    }

    /// Normalize edits (sort, deduplicate, and validate non-overlap).
    pub fn normalize(&mut self) -> Result<(), EditError> {
        self.edits.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| a.range.start.cmp(&b.range.start))
                .then_with(|| a.range.end.cmp(&b.range.end))
                .then_with(|| a.replacement.cmp(&b.replacement))
        });

        // Exact duplicates are redundant.
        self.edits
            .dedup_by(|a, b| a.file == b.file && a.range == b.range && a.replacement == b.replacement);

        // Merge multiple inserts at the same position so the edit set stays
        // deterministic; differing replacements of the same range are a
        // double-rewrite defect.
        let mut merged: Vec<TextEdit> = Vec::with_capacity(self.edits.len());
        for edit in self.edits.drain(..) {
            if let Some(last) = merged.last_mut() {
                if last.file == edit.file && last.range == edit.range && last.range.is_empty() {
                    last.replacement.push_str(&edit.replacement);
                    continue;
                }
                if last.file == edit.file && last.range == edit.range {
                    return Err(EditError::ConflictingEdits {
                        file: edit.file,
                        range: edit.range,
                    });
                }
            }
            merged.push(edit);
        }
        self.edits = merged;

        // Validate non-overlap per file.
        let mut current_file: Option<&FileId> = None;
        let mut prev: Option<Span> = None;
        for edit in &self.edits {
            if current_file.map(|f| f != &edit.file).unwrap_or(true) {
                current_file = Some(&edit.file);
                prev = None;
            }
            if let Some(prev_range) = prev {
                if edit.range.start < prev_range.end {
                    return Err(EditError::OverlappingEdits {
                        file: edit.file.clone(),
                        first: prev_range,
                        second: edit.range,
                    });
                }
            }
            prev = Some(edit.range);
        }

        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("overlapping edits in {file:?}: {first:?} overlaps {second:?}")]
    OverlappingEdits {
        file: FileId,
        first: Span,
        second: Span,
    },
    #[error("conflicting replacements registered for {range:?} in {file:?}")]
    ConflictingEdits { file: FileId, range: Span },
    #[error("text edit range {range:?} is outside the file bounds (len={len}) in {file:?}")]
    OutOfBounds {
        file: FileId,
        range: Span,
        len: usize,
    },
    #[error("unknown file {0:?}")]
    UnknownFile(FileId),
    #[error("file {0:?} already exists")]
    FileAlreadyExists(FileId),
}

/// Apply a set of edits to `original` and return the modified text.
///
/// The input edits must be non-overlapping and valid for `original`.
pub fn apply_text_edits(original: &str, edits: &[TextEdit]) -> Result<String, EditError> {
    if edits.is_empty() {
        return Ok(original.to_string());
    }

    let mut sorted = edits.to_vec();
    sorted.sort_by(|a, b| {
        b.range
            .start
            .cmp(&a.range.start)
            .then_with(|| b.range.end.cmp(&a.range.end))
    });

    let mut out = original.to_string();
    for edit in sorted {
        let len = out.len();
        if edit.range.end > len || edit.range.start > edit.range.end {
            return Err(EditError::OutOfBounds {
                file: edit.file,
                range: edit.range,
                len,
            });
        }
        out.replace_range(edit.range.start..edit.range.end, &edit.replacement);
    }
    Ok(out)
}

/// Apply a whole [`WorkspaceEdit`] to an in-memory file map.
pub fn apply_workspace_edit(
    files: &BTreeMap<FileId, String>,
    edit: &WorkspaceEdit,
) -> Result<BTreeMap<FileId, String>, EditError> {
    let mut out = files.clone();

    for (file, edits) in edit.edits_by_file() {
        let text = out
            .get(file)
            .ok_or_else(|| EditError::UnknownFile(file.clone()))?;
        let owned: Vec<TextEdit> = edits.into_iter().cloned().collect();
        let new_text = apply_text_edits(text, &owned)?;
        out.insert(file.clone(), new_text);
    }

    for op in &edit.file_ops {
        match op {
            FileOp::Create { file, text } => {
                if out.contains_key(file) {
                    return Err(EditError::FileAlreadyExists(file.clone()));
                }
                out.insert(file.clone(), text.clone());
            }
            FileOp::Delete { file } => {
                if out.remove(file).is_none() {
                    return Err(EditError::UnknownFile(file.clone()));
                }
            }
        }
    }

    Ok(out)
}
