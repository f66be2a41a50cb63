use similar::{ChangeTag, DiffOp, TextDiff};
use std::path::Path;

use super::delta::{Delta, DeltaKind};
use crate::error::Result;
use crate::fs::FileHandle;

/// Result of a two-text comparison.
///
/// Deltas are computed at line granularity (side by side rendering, patch
/// application) and at char granularity (inline rendering); `patches` holds
/// portable unified-diff hunk strings derived from the line level diff.
///
/// Identical inputs produce an empty result.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub line_deltas: Vec<Delta>,
    pub char_deltas: Vec<Delta>,
    pub patches: Vec<String>,
}

/// Compare two texts and build a [`DiffResult`].
///
/// `context_size` is the number of unchanged lines kept around each change;
/// `0` disables context emission entirely and yields raw change chunks only.
pub fn compute_diff(from: &str, target: &str, context_size: usize) -> DiffResult {
    if from == target {
        return DiffResult::default();
    }

    let line_diff = TextDiff::from_lines(from, target);
    let line_deltas = create_deltas_from_ops(&flatten_ops(&line_diff), context_size);

    let char_diff = TextDiff::from_chars(from, target);
    let char_deltas = create_deltas_from_ops(&flatten_ops(&char_diff), context_size);

    let mut unified = line_diff.unified_diff();
    unified.context_radius(context_size);
    let patches = unified.iter_hunks().map(|h| h.to_string()).collect();

    DiffResult {
        line_deltas,
        char_deltas,
        patches,
    }
}

/// Read both files and diff their contents.
pub fn compute_diff_from_paths(
    from: impl AsRef<Path>,
    target: impl AsRef<Path>,
    context_size: usize,
) -> Result<DiffResult> {
    let from_text = FileHandle::new(from.as_ref())?.read_string()?;
    let target_text = FileHandle::new(target.as_ref())?.read_string()?;
    Ok(compute_diff(&from_text, &target_text, context_size))
}

/// Flatten the op sequence of a [`TextDiff`] into runs of equal, deleted and
/// inserted text. A `Replace` becomes a delete run followed by an insert run
/// at the same position.
fn flatten_ops(diff: &TextDiff<'_, '_, '_, str>) -> Vec<(ChangeTag, String)> {
    let old = diff.old_slices();
    let new = diff.new_slices();

    let mut ops = Vec::new();
    for op in diff.ops() {
        match *op {
            DiffOp::Equal { old_index, len, .. } => {
                ops.push((ChangeTag::Equal, old[old_index..old_index + len].concat()));
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                ops.push((ChangeTag::Delete, old[old_index..old_index + old_len].concat()));
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                ops.push((ChangeTag::Insert, new[new_index..new_index + new_len].concat()));
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                ops.push((ChangeTag::Delete, old[old_index..old_index + old_len].concat()));
                ops.push((ChangeTag::Insert, new[new_index..new_index + new_len].concat()));
            }
        }
    }
    ops
}

/// Walk the op runs and emit [`Delta`]s with windowed context.
///
/// For the equal run before a change only its trailing `context_size` lines
/// are emitted (with line/byte counters moved back accordingly), for the
/// equal run after a change only its leading `context_size` lines. When two
/// changes are closer together than `2 * context_size` lines the equal run
/// between them is emitted once, whole, and the prev-context of the second
/// change is suppressed.
fn create_deltas_from_ops(ops: &[(ChangeTag, String)], context_size: usize) -> Vec<Delta> {
    let mut deltas: Vec<Delta> = Vec::new();
    let mut line_from: usize = 1; // first line is line nr. 1
    let mut line_target: usize = 1;
    let mut pos_from: u64 = 1; // first byte is at pos 1
    let mut pos_target: u64 = 1;
    let mut idx = 0usize;
    let ops_len = ops.len();

    fn take_if<'a>(
        ops: &'a [(ChangeTag, String)],
        idx: &mut usize,
        tag: ChangeTag,
    ) -> Option<&'a str> {
        if *idx < ops.len() && ops[*idx].0 == tag {
            let text = ops[*idx].1.as_str();
            *idx += 1;
            Some(text)
        } else {
            None
        }
    }

    // trailing `context_size` lines of an equal run, counters moved back
    // over the emitted text
    let prev_context = |line_from: usize,
                        line_target: usize,
                        pos_from: u64,
                        pos_target: u64,
                        run: &str|
     -> Delta {
        let line_count = count_newlines(run);
        let text = if line_count > context_size {
            split_lines(run)[line_count - context_size..].concat()
        } else {
            run.to_string()
        };
        let count = count_newlines(&text);
        let len = text.len() as u64;
        Delta {
            kind: DeltaKind::Equal,
            line_from: line_from - count,
            line_target: line_target - count,
            byte_pos_from: pos_from - len,
            byte_pos_target: pos_target - len,
            text,
        }
    };

    // leading `context_size` lines of an equal run; emits the whole run when
    // it is too short to separate two changes (merged: the following
    // prev-context must be suppressed)
    let after_context = |idx: usize,
                        line_from: usize,
                        line_target: usize,
                        pos_from: u64,
                        pos_target: u64,
                        run: &str|
     -> (Delta, bool) {
        let line_count = count_newlines(run);
        let (text, merged) = if idx < ops_len && line_count < context_size * 2 {
            // merge - but never for the last run
            (run.to_string(), true)
        } else if line_count < context_size {
            (run.to_string(), false)
        } else {
            (split_lines(run)[..context_size].concat(), false)
        };
        let delta = Delta {
            kind: DeltaKind::Equal,
            line_from,
            line_target,
            byte_pos_from: pos_from,
            byte_pos_target: pos_target,
            text,
        };
        (delta, merged)
    };

    // leading equal run, if there is one
    if let Some(run) = take_if(ops, &mut idx, ChangeTag::Equal) {
        line_from += count_newlines(run);
        line_target += count_newlines(run);
        pos_from += run.len() as u64;
        pos_target += run.len() as u64;

        if context_size > 0 {
            deltas.push(prev_context(line_from, line_target, pos_from, pos_target, run));
        }
    }

    while idx < ops.len() {
        let del = take_if(ops, &mut idx, ChangeTag::Delete);
        if let Some(text) = del {
            deltas.push(Delta {
                kind: DeltaKind::Delete,
                line_from,
                line_target,
                byte_pos_from: pos_from,
                byte_pos_target: pos_target,
                text: text.to_string(),
            });
        }

        let ins = take_if(ops, &mut idx, ChangeTag::Insert);
        if let Some(text) = ins {
            deltas.push(Delta {
                kind: DeltaKind::Insert,
                line_from,
                line_target,
                byte_pos_from: pos_from,
                byte_pos_target: pos_target,
                text: text.to_string(),
            });
        }

        // counters advance only after both chunks are emitted, so the insert
        // chunk of a replacement shares the delete chunk's position
        if let Some(text) = del {
            line_from += count_newlines(text);
            pos_from += text.len() as u64;
        }
        if let Some(text) = ins {
            line_target += count_newlines(text);
            pos_target += text.len() as u64;
        }

        if let Some(run) = take_if(ops, &mut idx, ChangeTag::Equal) {
            let mut merged = false;
            let mut after_text: Option<String> = None;
            if context_size > 0 {
                let (delta, m) = after_context(idx, line_from, line_target, pos_from, pos_target, run);
                merged = m;
                after_text = Some(delta.text.clone());
                deltas.push(delta);
            }

            line_from += count_newlines(run);
            line_target += count_newlines(run);
            pos_from += run.len() as u64;
            pos_target += run.len() as u64;

            // no prev-context when no context was requested, at the end of
            // the op stream, after a merged run, or when the after-context
            // already emitted the whole run
            if context_size > 0 && idx < ops.len() && !merged && after_text.as_deref() != Some(run) {
                deltas.push(prev_context(line_from, line_target, pos_from, pos_target, run));
            }
        }
    }

    deltas
}

pub(crate) fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

/// Split keeping the line terminator attached; a trailing fragment without a
/// newline becomes its own element.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            lines.push(&text[start..i + 1]);
            start = i + 1;
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}
