//! Offset and line queries shared by the buffer engine and its snapshots.
//!
//! Everything here operates on a `(buffers, root)` pair so the live engine
//! and both snapshot kinds answer queries through the same code.

use crate::buffer::{BufferMeta, IncompleteCRLF, LineRange};
use crate::storage::{BufferCollection, Piece};
use crate::tree::RedBlackTree;
use crate::units::{ByteLength, ByteOffset, LineIndex};
use crate::walker::TreeWalker;

/// Where a byte offset landed: the owning piece (a value copy), the offset
/// remainder within it, the piece's document start offset, and the 1-based
/// document line containing the offset.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NodePosition {
    pub piece: Option<Piece>,
    pub remainder: ByteLength,
    pub start_offset: ByteOffset,
    pub line: LineIndex,
}

/// Top-down descent by cumulative byte offset.
///
/// An offset at or past the end of the document resolves to the last piece
/// with `remainder == piece.length` (the end-of-document anchor).
pub(crate) fn node_at(
    buffers: &BufferCollection,
    root: &RedBlackTree,
    mut off: ByteOffset,
) -> NodePosition {
    let mut node = root.clone();
    let mut node_start_offset = 0usize;
    let mut newline_count = 0usize;
    while !node.is_empty() {
        let left_len = node.data().left_subtree_length;
        let left_lf = node.data().left_subtree_lf_count;
        let piece = node.data().piece;
        if left_len.0 > off.0 {
            node = node.left();
        } else if (left_len + piece.length).0 > off.0 {
            node_start_offset += left_len.0;
            newline_count += left_lf.0;
            let remainder = ByteLength(off.0 - left_len.0);
            // The cursor's line is relative to the piece's buffer; retract by
            // the piece's first line to get the line delta inside the piece.
            let pos = buffers.buffer_position(&piece, remainder);
            newline_count += pos.line - piece.first.line;
            return NodePosition {
                piece: Some(piece),
                remainder,
                start_offset: ByteOffset(node_start_offset),
                line: LineIndex(newline_count + 1),
            };
        } else {
            if node.right().is_empty() {
                // No more nodes to traverse: anchor at the end of this piece.
                node_start_offset += left_len.0;
                newline_count += left_lf.0 + piece.newline_count.0;
                return NodePosition {
                    piece: Some(piece),
                    remainder: piece.length,
                    start_offset: ByteOffset(node_start_offset),
                    line: LineIndex(newline_count + 1),
                };
            }
            let offset_amount = left_len.0 + piece.length.0;
            off = ByteOffset(off.0 - offset_amount);
            node_start_offset += offset_amount;
            newline_count += left_lf.0 + piece.newline_count.0;
            node = node.right();
        }
    }
    NodePosition::default()
}

/// Byte at `offset` on the given root, or 0 when out of range.
pub(crate) fn char_at(buffers: &BufferCollection, root: &RedBlackTree, offset: ByteOffset) -> u8 {
    let result = node_at(buffers, root, offset);
    let Some(piece) = result.piece else {
        return 0;
    };
    if result.remainder == piece.length {
        // End-of-document anchor: nothing at or past this offset.
        return 0;
    }
    let buffer = buffers.buffer_at(piece.index);
    let buf_offset = buffers.buffer_offset(piece.index, piece.first);
    buffer.bytes[buf_offset.0 + result.remainder.0]
}

/// 1-based line containing `offset`; the first line for an empty tree.
pub(crate) fn line_at(
    buffers: &BufferCollection,
    root: &RedBlackTree,
    offset: ByteOffset,
) -> LineIndex {
    if root.is_empty() {
        return LineIndex::FIRST;
    }
    node_at(buffers, root, offset).line
}

/// How the last line within a piece is measured when resolving a line start:
/// up to and including its trailing `'\n'`, or excluding it.
pub(crate) type Accumulator = fn(&BufferCollection, &Piece, usize) -> ByteLength;

/// Bytes from the piece's start through its internal line `index`, including
/// that line's `'\n'`; clipped to the piece end when the line runs past it.
pub(crate) fn accumulate_value(
    buffers: &BufferCollection,
    piece: &Piece,
    index: usize,
) -> ByteLength {
    let starts = &buffers.buffer_at(piece.index).line_starts;
    let expected_start = piece.first.line + index + 1;
    let first = starts[piece.first.line] + piece.first.column;
    if expected_start > piece.last.line {
        let last = starts[piece.last.line] + piece.last.column;
        ByteLength(last - first)
    } else {
        ByteLength(starts[expected_start] - first)
    }
}

/// Like [`accumulate_value`] but excludes the line's trailing `'\n'`.
pub(crate) fn accumulate_value_no_lf(
    buffers: &BufferCollection,
    piece: &Piece,
    index: usize,
) -> ByteLength {
    let buffer = buffers.buffer_at(piece.index);
    let starts = &buffer.line_starts;
    let expected_start = piece.first.line + index + 1;
    let first = starts[piece.first.line] + piece.first.column;
    let last = if expected_start > piece.last.line {
        starts[piece.last.line] + piece.last.column
    } else {
        starts[expected_start]
    };
    if last == first {
        return ByteLength(0);
    }
    if buffer.bytes[last - 1] == b'\n' {
        ByteLength(last - 1 - first)
    } else {
        ByteLength(last - first)
    }
}

/// Accumulates the document offset of the start of `line`, descending by the
/// left-subtree newline counts. The `accumulate` policy decides how the last
/// line inside the containing piece is measured.
pub(crate) fn line_start(
    offset: &mut ByteOffset,
    buffers: &BufferCollection,
    node: &RedBlackTree,
    line: LineIndex,
    accumulate: Accumulator,
) {
    if node.is_empty() {
        return;
    }
    debug_assert!(line != LineIndex::BEFORE_FIRST);
    let mut line_index = line.0 - 1;
    let data = node.data();
    if data.left_subtree_lf_count.0 >= line_index {
        line_start(offset, buffers, &node.left(), line, accumulate);
    } else if data.left_subtree_lf_count.0 + data.piece.newline_count.0 >= line_index {
        // The desired line starts within this piece.
        line_index -= data.left_subtree_lf_count.0;
        let mut len = data.left_subtree_length;
        if line_index != 0 {
            len += accumulate(buffers, &data.piece, line_index - 1);
        }
        *offset += len;
    } else {
        line_index -= data.left_subtree_lf_count.0 + data.piece.newline_count.0;
        *offset += data.left_subtree_length + data.piece.length;
        line_start(offset, buffers, &node.right(), LineIndex(line_index + 1), accumulate);
    }
}

/// Like [`line_start`] with the no-LF policy, but additionally excludes a
/// `'\r'` immediately before the line's `'\n'`. Needs the document `root` to
/// inspect bytes across piece boundaries.
fn line_end_crlf(
    offset: &mut ByteOffset,
    buffers: &BufferCollection,
    root: &RedBlackTree,
    node: &RedBlackTree,
    line: LineIndex,
) {
    if node.is_empty() {
        return;
    }
    debug_assert!(line != LineIndex::BEFORE_FIRST);
    let mut line_index = line.0 - 1;
    let data = node.data();
    if data.left_subtree_lf_count.0 >= line_index {
        line_end_crlf(offset, buffers, root, &node.left(), line);
    } else if data.left_subtree_lf_count.0 + data.piece.newline_count.0 >= line_index {
        line_index -= data.left_subtree_lf_count.0;
        let mut len = data.left_subtree_length;
        if line_index != 0 {
            len += accumulate_value_no_lf(buffers, &data.piece, line_index - 1);
        }
        // The end may abut a "\r\n" whose bytes sit in different pieces, so
        // inspect the document at the absolute end rather than only within
        // this piece.
        let mut end = ByteOffset(offset.0 + len.0);
        if end.0 != 0
            && char_at(buffers, root, ByteOffset(end.0 - 1)) == b'\r'
            && char_at(buffers, root, end) == b'\n'
        {
            end = ByteOffset(end.0 - 1);
        }
        *offset = end;
    } else {
        line_index -= data.left_subtree_lf_count.0 + data.piece.newline_count.0;
        *offset += data.left_subtree_length + data.piece.length;
        line_end_crlf(offset, buffers, root, &node.right(), LineIndex(line_index + 1));
    }
}

/// Byte range of `line`; `last` excludes the trailing `'\n'`. Out-of-range
/// lines yield the empty range at end-of-document.
pub(crate) fn get_line_range(
    buffers: &BufferCollection,
    root: &RedBlackTree,
    line: LineIndex,
) -> LineRange {
    if line == LineIndex::BEFORE_FIRST {
        return LineRange::default();
    }
    let mut first = ByteOffset(0);
    line_start(&mut first, buffers, root, line, accumulate_value);
    let mut last = ByteOffset(0);
    line_start(&mut last, buffers, root, line.next(), accumulate_value_no_lf);
    LineRange { first, last }
}

/// Byte range of `line`; `last` also excludes a `'\r'` before the `'\n'`.
pub(crate) fn get_line_range_crlf(
    buffers: &BufferCollection,
    root: &RedBlackTree,
    line: LineIndex,
) -> LineRange {
    if line == LineIndex::BEFORE_FIRST {
        return LineRange::default();
    }
    let mut first = ByteOffset(0);
    line_start(&mut first, buffers, root, line, accumulate_value);
    let mut last = ByteOffset(0);
    line_end_crlf(&mut last, buffers, root, root, line.next());
    LineRange { first, last }
}

/// Byte range of `line` where `last` is the first byte of the next line.
pub(crate) fn get_line_range_with_newline(
    buffers: &BufferCollection,
    root: &RedBlackTree,
    line: LineIndex,
) -> LineRange {
    if line == LineIndex::BEFORE_FIRST {
        return LineRange::default();
    }
    let mut first = ByteOffset(0);
    line_start(&mut first, buffers, root, line, accumulate_value);
    let mut last = ByteOffset(0);
    line_start(&mut last, buffers, root, line.next(), accumulate_value);
    LineRange { first, last }
}

/// Appends the bytes of `line` (excluding its terminator) to `out`.
pub(crate) fn get_line_content(
    buffers: &BufferCollection,
    root: &RedBlackTree,
    meta: BufferMeta,
    line: LineIndex,
    out: &mut Vec<u8>,
) {
    out.clear();
    if line == LineIndex::BEFORE_FIRST || root.is_empty() {
        return;
    }
    let mut line_offset = ByteOffset(0);
    line_start(&mut line_offset, buffers, root, line, accumulate_value);
    let walker = TreeWalker::over(buffers, root.clone(), meta, line_offset);
    for byte in walker {
        if byte == b'\n' {
            break;
        }
        out.push(byte);
    }
}

/// CRLF-aware variant of [`get_line_content`]: drops a trailing `'\r'` before
/// the `'\n'` and reports whether the line was terminated by a full `"\r\n"`.
pub(crate) fn get_line_content_crlf(
    buffers: &BufferCollection,
    root: &RedBlackTree,
    meta: BufferMeta,
    line: LineIndex,
    out: &mut Vec<u8>,
) -> IncompleteCRLF {
    out.clear();
    if line == LineIndex::BEFORE_FIRST || root.is_empty() {
        return IncompleteCRLF::Yes;
    }
    let mut line_offset = ByteOffset(0);
    line_start(&mut line_offset, buffers, root, line, accumulate_value);
    let walker = TreeWalker::over(buffers, root.clone(), meta, line_offset);
    let mut prev = 0u8;
    for byte in walker {
        if byte == b'\n' {
            if prev == b'\r' {
                out.pop();
                return IncompleteCRLF::No;
            }
            return IncompleteCRLF::Yes;
        }
        out.push(byte);
        prev = byte;
    }
    IncompleteCRLF::Yes
}
