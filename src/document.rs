//! The document surface (§4.6): high-level editing primitives that
//! translate user intent into [`TextOperation`]s against a given snapshot
//! of the replica. These are pure functions over `&str` so they can be
//! exercised directly in tests and reused identically for batch-mode's
//! scratch replica; [`crate::Client`] is the one that feeds their output
//! into the OT state machine.

use regex::Regex;

use crate::error::SyncError;
use crate::ot::TextOperation;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// `insert(pos, s)` → `retain(pos), insert(s), retain(len - pos)`.
pub fn insert_op(content: &str, pos: usize, s: &str) -> Result<TextOperation, SyncError> {
    let len = char_len(content);
    if pos > len {
        return Err(SyncError::OutOfBounds { pos, end: pos, len });
    }
    let mut op = TextOperation::new();
    op.retain(pos as u64);
    op.insert(s);
    op.retain((len - pos) as u64);
    Ok(op)
}

/// `delete(pos, n)` → `retain(pos), delete(n), retain(len - pos - n)`.
pub fn delete_op(content: &str, pos: usize, n: usize) -> Result<TextOperation, SyncError> {
    let len = char_len(content);
    if pos + n > len {
        return Err(SyncError::OutOfBounds {
            pos,
            end: pos + n,
            len,
        });
    }
    let mut op = TextOperation::new();
    op.retain(pos as u64);
    op.delete(n as u64);
    op.retain((len - pos - n) as u64);
    Ok(op)
}

/// `replace(pos, n, s)` → composition of `delete(pos, n)` then
/// `insert(pos, s)` against the post-delete string.
pub fn replace_op(content: &str, pos: usize, n: usize, s: &str) -> Result<TextOperation, SyncError> {
    let len = char_len(content);
    if pos + n > len {
        return Err(SyncError::OutOfBounds {
            pos,
            end: pos + n,
            len,
        });
    }
    let mut op = TextOperation::new();
    op.retain(pos as u64);
    op.delete(n as u64);
    op.insert(s);
    op.retain((len - pos - n) as u64);
    Ok(op)
}

/// A minimal `TextOperation` computed via common-prefix/common-suffix
/// elision around a middle replace. Guarantees `apply(op, content) ==
/// new_text`; does not guarantee minimum-edit-distance (see scenario F).
pub fn update_content_op(content: &str, new_text: &str) -> TextOperation {
    let old: Vec<char> = content.chars().collect();
    let new: Vec<char> = new_text.chars().collect();

    let common_prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let max_suffix = (old.len() - common_prefix).min(new.len() - common_prefix);
    let common_suffix = (0..max_suffix)
        .take_while(|i| old[old.len() - 1 - i] == new[new.len() - 1 - i])
        .count();

    let old_middle_end = old.len() - common_suffix;
    let new_middle_end = new.len() - common_suffix;

    let mut op = TextOperation::new();
    if common_prefix > 0 {
        op.retain(common_prefix as u64);
    }
    let deleted = old_middle_end - common_prefix;
    if deleted > 0 {
        op.delete(deleted as u64);
    }
    let inserted: String = new[common_prefix..new_middle_end].iter().collect();
    if !inserted.is_empty() {
        op.insert(&inserted);
    }
    if common_suffix > 0 {
        op.retain(common_suffix as u64);
    }
    op
}

/// 0-based line count: occurrences of `\n` plus one.
pub fn line_count(content: &str) -> usize {
    content.chars().filter(|&c| c == '\n').count() + 1
}

/// Char offset of the start of line `line` (0-based). One-past-last is a
/// valid line start (the position right after the final `\n`, or `len` if
/// the document has no trailing newline).
fn line_start(content: &str, line: usize) -> Result<usize, SyncError> {
    let len = char_len(content);
    let mut current = 0usize;
    let mut offset = 0usize;
    if line == 0 {
        return Ok(0);
    }
    for c in content.chars() {
        offset += 1;
        if c == '\n' {
            current += 1;
            if current == line {
                return Ok(offset);
            }
        }
    }
    if current + 1 == line && !content.ends_with('\n') {
        // one-past-last when there is no trailing newline: the caller
        // addresses an implicit empty final line.
        return Ok(len);
    }
    Err(SyncError::OutOfBounds {
        pos: line,
        end: line,
        len: line_count(content),
    })
}

/// Char offset of line `line`'s terminating `\n`, or `len` if it is the
/// last line and the document has no trailing newline.
fn line_end(content: &str, line: usize) -> Result<usize, SyncError> {
    let len = char_len(content);
    let start = line_start(content, line)?;
    let mut offset = start;
    for c in content.chars().skip(start) {
        if c == '\n' {
            return Ok(offset);
        }
        offset += 1;
    }
    let _ = len;
    Ok(offset)
}

/// `setLine(i, s)` replaces from line `i`'s start to its terminating `\n`
/// (exclusive) with `s`.
pub fn set_line_op(content: &str, line: usize, s: &str) -> Result<TextOperation, SyncError> {
    let start = line_start(content, line)?;
    let end = line_end(content, line)?;
    replace_op(content, start, end - start, s)
}

/// `insertLine(i, s)` inserts `s + "\n"` at line `i`'s start. Appending at
/// one-past-last inserts a leading newline instead when the document lacks
/// a trailing newline, per §4.6.
pub fn insert_line_op(content: &str, line: usize, s: &str) -> Result<TextOperation, SyncError> {
    let count = line_count(content);
    let start = line_start(content, line)?;
    if line >= count && !content.is_empty() && !content.ends_with('\n') {
        return insert_op(content, start, &format!("\n{s}"));
    }
    insert_op(content, start, &format!("{s}\n"))
}

/// Builds a single operation against `content` from a left-to-right,
/// non-overlapping set of (char_start, char_end) match ranges, replacing
/// each with `replacement`.
fn edits_op(content: &str, ranges: &[(usize, usize)], replacement: &str) -> TextOperation {
    let len = char_len(content);
    let mut op = TextOperation::new();
    let mut cursor = 0usize;
    for &(start, end) in ranges {
        op.retain((start - cursor) as u64);
        op.delete((end - start) as u64);
        op.insert(replacement);
        cursor = end;
    }
    op.retain((len - cursor) as u64);
    op
}

/// `replaceRegex` computes the first match on `content` and emits a
/// `TextOperation` for that single replacement.
pub fn replace_regex_op(
    content: &str,
    pattern: &Regex,
    replacement: &str,
) -> Result<TextOperation, SyncError> {
    let ranges: Vec<(usize, usize)> = pattern
        .find(content)
        .map(|m| (char_len(&content[..m.start()]), char_len(&content[..m.end()])))
        .into_iter()
        .collect();
    Ok(edits_op(content, &ranges, replacement))
}

/// `replaceAllRegex` computes the full match set on `content` and emits
/// one `TextOperation` containing the edits in left-to-right order.
pub fn replace_all_regex_op(
    content: &str,
    pattern: &Regex,
    replacement: &str,
) -> Result<TextOperation, SyncError> {
    let ranges: Vec<(usize, usize)> = pattern
        .find_iter(content)
        .map(|m| (char_len(&content[..m.start()]), char_len(&content[..m.end()])))
        .collect();
    Ok(edits_op(content, &ranges, replacement))
}
