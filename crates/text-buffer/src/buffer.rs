//! The buffer engine: piece surgery, line queries, and history.
//!
//! [`TextBuffer`] owns the buffer set and the current tree root. Edits cut
//! and recombine pieces, producing a new root per mutation; because roots are
//! persistent, the undo and redo stacks are just stacks of old roots, and
//! snapshots are a root plus a buffer handle.

use std::sync::Arc;

use memchr::memchr_iter;

use crate::queries::{self, NodePosition};
use crate::snapshot::{OwningSnapshot, ReferenceSnapshot};
use crate::storage::{BufferCollection, BufferCursor, CharBuffer, Piece, line_feed_count};
use crate::tree::{self, NodeData, RedBlackTree};
use crate::units::{BufferIndex, ByteLength, ByteOffset, LfCount, LineIndex};

/// Whether a mutation records the pre-edit root on the undo stack.
///
/// Suppressed edits leave both history stacks untouched; pair them with
/// [`TextBuffer::commit_head`] to group a batch of edits into one undo point,
/// or with [`TextBuffer::head`]/[`TextBuffer::snap_to`] for branching
/// histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressHistory {
    /// Record an undo entry (the default behavior).
    #[default]
    No,
    /// Apply the edit without touching the history stacks.
    Yes,
}

/// Outcome of [`TextBuffer::try_undo`] / [`TextBuffer::try_redo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoRedoResult {
    /// False when the corresponding stack was empty (state unchanged).
    pub success: bool,
    /// The offset recorded with the restored entry.
    pub op_offset: ByteOffset,
}

/// Byte range of one line. What `last` covers depends on the query that
/// produced the range; `first` is always the line's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineRange {
    /// Offset of the line's first byte.
    pub first: ByteOffset,
    /// Exclusive end of the range.
    pub last: ByteOffset,
}

/// Whether a line ended in a bare `'\n'` (or no terminator at all) rather
/// than a full `"\r\n"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteCRLF {
    /// The line was terminated by `"\r\n"`.
    No,
    /// The line had a bare `'\n'` or no terminator.
    Yes,
}

/// Cached whole-document summary, kept equal to the tree totals after every
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct BufferMeta {
    pub lf_count: LfCount,
    pub total_content_length: ByteLength,
}

#[derive(Debug)]
struct HistoryEntry {
    root: RedBlackTree,
    op_offset: ByteOffset,
}

/// Accumulates original buffers and produces a [`TextBuffer`].
#[derive(Debug, Default)]
pub struct BufferBuilder {
    buffers: Vec<Arc<CharBuffer>>,
}

impl BufferBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one original buffer holding `text`.
    pub fn accept(&mut self, text: &str) {
        self.buffers.push(Arc::new(CharBuffer::new(text)));
    }

    /// Consumes the builder. The document starts as the accepted buffers
    /// concatenated in acceptance order, one piece per non-empty buffer.
    pub fn create(self) -> TextBuffer {
        TextBuffer::from_buffers(self.buffers)
    }
}

/// A text document backed by a persistent piece tree.
///
/// Offsets and counts are bytes; callers working in code points or grapheme
/// clusters map to byte offsets externally. All mutating operations must be
/// serialised by the caller; read-only snapshots may be queried concurrently.
#[derive(Debug)]
pub struct TextBuffer {
    buffers: BufferCollection,
    root: RedBlackTree,
    /// End of the most recent append into the modification buffer; the next
    /// contiguous insert extends that piece instead of adding a node.
    last_insert: BufferCursor,
    /// Document-absolute end of the most recent insertion, for undo
    /// coalescing. `None` until the first insert.
    end_last_insert: Option<ByteOffset>,
    meta: BufferMeta,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    /// An empty document.
    pub fn new() -> Self {
        Self::from_buffers(Vec::new())
    }

    pub(crate) fn from_buffers(orig_buffers: Vec<Arc<CharBuffer>>) -> Self {
        let mut buffer = Self {
            buffers: BufferCollection::new(orig_buffers),
            root: RedBlackTree::default(),
            last_insert: BufferCursor::default(),
            end_last_insert: None,
            meta: BufferMeta::default(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        buffer.build_tree();
        buffer
    }

    fn build_tree(&mut self) {
        let mut offset = ByteOffset(0);
        for i in 0..self.buffers.orig_buffers.len() {
            let buf = &self.buffers.orig_buffers[i];
            if buf.bytes.is_empty() {
                continue;
            }
            let last_line = buf.line_starts.len() - 1;
            let piece = Piece {
                index: BufferIndex::Original(i),
                first: BufferCursor::default(),
                last: BufferCursor::new(last_line, buf.bytes.len() - buf.line_starts[last_line]),
                length: ByteLength(buf.bytes.len()),
                newline_count: LfCount(last_line),
            };
            self.root = self.root.insert(NodeData::new(piece), offset);
            offset += piece.length;
        }
        self.compute_buffer_meta();
    }

    pub(crate) fn buffers(&self) -> &BufferCollection {
        &self.buffers
    }

    pub(crate) fn root(&self) -> &RedBlackTree {
        &self.root
    }

    pub(crate) fn meta(&self) -> BufferMeta {
        self.meta
    }

    // --- Manipulation -----------------------------------------------------

    /// Inserts `text` before the byte at `offset`; offsets past the end
    /// append. Empty text is a no-op.
    ///
    /// Consecutive inserts where each starts exactly at the end of the
    /// previous one coalesce into a single undo entry.
    pub fn insert(&mut self, offset: ByteOffset, text: &str, suppress_history: SuppressHistory) {
        if text.is_empty() {
            return;
        }
        if suppress_history == SuppressHistory::No
            && (self.end_last_insert != Some(offset) || self.root.is_empty())
        {
            self.append_undo(offset);
        }
        self.internal_insert(offset, text);
    }

    /// Removes the byte range `[offset, offset + count)`, clamped to the
    /// document. A zero count or an empty document is a no-op. Removal never
    /// coalesces undo entries.
    pub fn remove(&mut self, offset: ByteOffset, count: ByteLength, suppress_history: SuppressHistory) {
        if count.0 == 0 || self.root.is_empty() || offset.0 >= self.meta.total_content_length.0 {
            return;
        }
        let count = ByteLength(count.0.min(self.meta.total_content_length.0 - offset.0));
        if suppress_history == SuppressHistory::No {
            self.append_undo(offset);
        }
        self.internal_remove(offset, count);
    }

    fn internal_insert(&mut self, offset: ByteOffset, text: &str) {
        self.end_last_insert = Some(offset + ByteLength(text.len()));
        self.insert_pieces(offset, text);
        self.compute_buffer_meta();
        debug_assert!(tree::satisfies_rb_invariants(&self.root));
    }

    fn internal_remove(&mut self, offset: ByteOffset, count: ByteLength) {
        self.remove_pieces(offset, count);
        self.compute_buffer_meta();
        debug_assert!(tree::satisfies_rb_invariants(&self.root));
    }

    fn insert_pieces(&mut self, offset: ByteOffset, text: &str) {
        if self.root.is_empty() {
            let piece = self.build_piece(text);
            self.root = self.root.insert(NodeData::new(piece), ByteOffset(0));
            return;
        }

        let mut result = queries::node_at(&self.buffers, &self.root, offset);
        if result.piece.is_none() {
            // An offset past the end resolves to the last piece.
            let mut off = ByteOffset(0);
            if self.meta.total_content_length.0 != 0 {
                off = ByteOffset(self.meta.total_content_length.0 - 1);
            }
            result = queries::node_at(&self.buffers, &self.root, off);
        }
        let piece = result.piece.expect("a non-empty tree locates a piece");
        let node_start_offset = result.start_offset;

        // Inserting at the very start of the piece: the new piece lands
        // immediately before it.
        if node_start_offset == offset {
            let new_piece = self.build_piece(text);
            self.root = self.root.insert(NodeData::new(new_piece), offset);
            return;
        }

        let inside_node = offset.0 < node_start_offset.0 + piece.length.0;
        if !inside_node {
            // At (or past) the end of the piece. Typing that continues the
            // most recent append widens the existing mod-buffer piece in
            // place instead of adding a node per keystroke.
            if piece.index == BufferIndex::Mod && piece.last == self.last_insert {
                let new_piece = self.build_piece(text);
                self.combine_pieces(result, new_piece);
                return;
            }
            let new_piece = self.build_piece(text);
            self.root = self.root.insert(NodeData::new(new_piece), offset);
            return;
        }

        // Splitting the piece: left part, the inserted piece, right part.
        let insert_pos = self.buffers.buffer_position(&piece, result.remainder);
        let new_piece_right = Piece {
            first: insert_pos,
            length: self.buffers.buffer_offset(piece.index, piece.last)
                - self.buffers.buffer_offset(piece.index, insert_pos),
            newline_count: line_feed_count(insert_pos, piece.last),
            ..piece
        };
        let new_piece_left = self.buffers.trim_piece_right(&piece, insert_pos);
        let new_piece = self.build_piece(text);

        self.root = self.root.remove(node_start_offset);
        self.root = self.root.insert(NodeData::new(new_piece_left), node_start_offset);
        let mid_offset = node_start_offset + new_piece_left.length;
        self.root = self.root.insert(NodeData::new(new_piece), mid_offset);
        self.root = self
            .root
            .insert(NodeData::new(new_piece_right), mid_offset + new_piece.length);
    }

    fn remove_pieces(&mut self, offset: ByteOffset, count: ByteLength) {
        let first = queries::node_at(&self.buffers, &self.root, offset);
        let last = queries::node_at(&self.buffers, &self.root, offset + count);
        let Some(first_piece) = first.piece else {
            return;
        };

        let start_split_pos = self.buffers.buffer_position(&first_piece, first.remainder);

        // The whole range lives inside a single piece (start offsets identify
        // nodes uniquely).
        if last.piece.is_some() && first.start_offset == last.start_offset {
            let end_split_pos = self.buffers.buffer_position(&first_piece, last.remainder);
            if first.start_offset == offset {
                if count == first_piece.length {
                    self.root = self.root.remove(first.start_offset);
                    return;
                }
                let new_piece = self.buffers.trim_piece_left(&first_piece, end_split_pos);
                self.root = self
                    .root
                    .remove(first.start_offset)
                    .insert(NodeData::new(new_piece), first.start_offset);
                return;
            }
            if first.start_offset + first_piece.length == offset + count {
                let new_piece = self.buffers.trim_piece_right(&first_piece, start_split_pos);
                self.root = self
                    .root
                    .remove(first.start_offset)
                    .insert(NodeData::new(new_piece), first.start_offset);
                return;
            }
            // The range is in the middle: trim in both directions. The right
            // part goes in first so the left part lands to its left.
            let (left, right) = self
                .buffers
                .shrink_piece(&first_piece, start_split_pos, end_split_pos);
            self.root = self
                .root
                .remove(first.start_offset)
                .insert(NodeData::new(right), first.start_offset)
                .insert(NodeData::new(left), first.start_offset);
            return;
        }

        // The range spans nodes: delete the covered nodes whole, then
        // re-insert the trimmed remainders of the boundary pieces.
        let new_first = self.buffers.trim_piece_right(&first_piece, start_split_pos);
        match last.piece {
            None => self.remove_node_range(first, count),
            Some(last_piece) => {
                let end_split_pos = self.buffers.buffer_position(&last_piece, last.remainder);
                let new_last = self.buffers.trim_piece_left(&last_piece, end_split_pos);
                self.remove_node_range(first, count);
                // A range ending exactly on a piece boundary never touched
                // the last node; re-inserting would duplicate it.
                if last.remainder.0 != 0 && new_last.length.0 != 0 {
                    self.root = self.root.insert(NodeData::new(new_last), first.start_offset);
                }
            }
        }
        if new_first.length.0 != 0 {
            self.root = self.root.insert(NodeData::new(new_first), first.start_offset);
        }
    }

    /// Removes whole nodes starting at `first` until `length` bytes are
    /// covered, re-locating after each removal. The target is first widened
    /// so that the partially covered first piece counts from its start; the
    /// caller re-inserts the trimmed remainders.
    fn remove_node_range(&mut self, mut first: NodePosition, length: ByteLength) {
        let Some(first_piece) = first.piece else {
            return;
        };
        let total_length = first_piece.length;
        let length = ByteLength(length.0 - (total_length.0 - first.remainder.0) + total_length.0);
        let delete_at_offset = first.start_offset;
        let mut deleted_len = ByteLength(0);
        while deleted_len < length {
            let Some(piece) = first.piece else {
                break;
            };
            deleted_len += piece.length;
            self.root = self.root.remove(delete_at_offset);
            first = queries::node_at(&self.buffers, &self.root, delete_at_offset);
        }
    }

    /// Appends `text` to the modification buffer and builds the piece
    /// covering it, continuing from the previous append's end cursor.
    fn build_piece(&mut self, text: &str) -> Piece {
        let mod_buffer = &mut self.buffers.mod_buffer;
        let start_offset = mod_buffer.bytes.len();
        let start = self.last_insert;
        // Extend the line-start table in mod-buffer coordinates; the leading
        // 0 every table carries is already there.
        mod_buffer
            .line_starts
            .extend(memchr_iter(b'\n', text.as_bytes()).map(|i| start_offset + i + 1));
        mod_buffer.bytes.extend_from_slice(text.as_bytes());

        let end_offset = mod_buffer.bytes.len();
        let end_index = mod_buffer.line_starts.len() - 1;
        let end_pos = BufferCursor::new(end_index, end_offset - mod_buffer.line_starts[end_index]);
        let piece = Piece {
            index: BufferIndex::Mod,
            first: start,
            last: end_pos,
            length: ByteLength(end_offset - start_offset),
            newline_count: line_feed_count(start, end_pos),
        };
        self.last_insert = end_pos;
        piece
    }

    /// Replaces the piece at `existing` with one widened to cover
    /// `new_piece` as well. Valid only when `existing` ends exactly where
    /// `new_piece` begins in the modification buffer.
    fn combine_pieces(&mut self, existing: NodePosition, new_piece: Piece) {
        let Some(old_piece) = existing.piece else {
            return;
        };
        debug_assert!(old_piece.index == BufferIndex::Mod);
        debug_assert!(old_piece.last == new_piece.first);
        let widened = Piece {
            last: new_piece.last,
            length: old_piece.length + new_piece.length,
            newline_count: old_piece.newline_count + new_piece.newline_count,
            ..old_piece
        };
        self.root = self
            .root
            .remove(existing.start_offset)
            .insert(NodeData::new(widened), existing.start_offset);
    }

    fn compute_buffer_meta(&mut self) {
        self.meta.lf_count = tree::tree_lf_count(&self.root);
        self.meta.total_content_length = tree::tree_length(&self.root);
    }

    // --- History ----------------------------------------------------------

    fn append_undo(&mut self, op_offset: ByteOffset) {
        // A fresh undo entry invalidates whatever could be redone.
        self.redo_stack.clear();
        self.undo_stack.push(HistoryEntry {
            root: self.root.clone(),
            op_offset,
        });
    }

    /// Restores the most recent undo entry. `op_offset` is recorded with the
    /// redo entry so a later redo can hand it back.
    pub fn try_undo(&mut self, op_offset: ByteOffset) -> UndoRedoResult {
        let Some(entry) = self.undo_stack.pop() else {
            return UndoRedoResult {
                success: false,
                op_offset: ByteOffset(0),
            };
        };
        self.redo_stack.push(HistoryEntry {
            root: self.root.clone(),
            op_offset,
        });
        self.root = entry.root;
        self.compute_buffer_meta();
        UndoRedoResult {
            success: true,
            op_offset: entry.op_offset,
        }
    }

    /// Restores the most recent redo entry.
    pub fn try_redo(&mut self, op_offset: ByteOffset) -> UndoRedoResult {
        let Some(entry) = self.redo_stack.pop() else {
            return UndoRedoResult {
                success: false,
                op_offset: ByteOffset(0),
            };
        };
        self.undo_stack.push(HistoryEntry {
            root: self.root.clone(),
            op_offset,
        });
        self.root = entry.root;
        self.compute_buffer_meta();
        UndoRedoResult {
            success: true,
            op_offset: entry.op_offset,
        }
    }

    /// Pushes the current root as a manual undo point, so that subsequent
    /// suppressed edits become undoable as one block.
    pub fn commit_head(&mut self, offset: ByteOffset) {
        self.append_undo(offset);
    }

    /// The current root as an opaque handle.
    pub fn head(&self) -> RedBlackTree {
        self.root.clone()
    }

    /// Replaces the current root with `new_root`, which must derive from this
    /// buffer's own buffer set. Enables branching histories beyond linear
    /// undo; the history stacks are left untouched.
    pub fn snap_to(&mut self, new_root: &RedBlackTree) {
        self.root = new_root.clone();
        self.compute_buffer_meta();
    }

    // --- Queries ----------------------------------------------------------

    /// Total document length in bytes.
    pub fn length(&self) -> ByteLength {
        self.meta.total_content_length
    }

    /// True when the document holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.meta.total_content_length.0 == 0
    }

    /// Number of `'\n'` bytes in the document.
    pub fn line_feed_count(&self) -> LfCount {
        self.meta.lf_count
    }

    /// Number of lines: the newline count plus one.
    pub fn line_count(&self) -> usize {
        self.meta.lf_count.0 + 1
    }

    /// Byte at `offset`, or 0 when `offset` is out of range.
    pub fn at(&self, offset: ByteOffset) -> u8 {
        queries::char_at(&self.buffers, &self.root, offset)
    }

    /// 1-based line containing `offset`; the first line for an empty
    /// document.
    pub fn line_at(&self, offset: ByteOffset) -> LineIndex {
        queries::line_at(&self.buffers, &self.root, offset)
    }

    /// Byte range of `line`; `last` excludes the trailing `'\n'`.
    /// Out-of-range lines yield the empty range at end-of-document.
    pub fn get_line_range(&self, line: LineIndex) -> LineRange {
        queries::get_line_range(&self.buffers, &self.root, line)
    }

    /// Like [`Self::get_line_range`], but `last` also excludes a `'\r'`
    /// immediately before the `'\n'`.
    pub fn get_line_range_crlf(&self, line: LineIndex) -> LineRange {
        queries::get_line_range_crlf(&self.buffers, &self.root, line)
    }

    /// Byte range of `line` where `last` is the next line's first byte.
    pub fn get_line_range_with_newline(&self, line: LineIndex) -> LineRange {
        queries::get_line_range_with_newline(&self.buffers, &self.root, line)
    }

    /// Replaces `out` with the bytes of `line`, excluding its terminator.
    /// Out-of-range lines produce empty content.
    pub fn get_line_content(&self, out: &mut Vec<u8>, line: LineIndex) {
        queries::get_line_content(&self.buffers, &self.root, self.meta, line, out);
    }

    /// Like [`Self::get_line_content`], but also drops a `'\r'` before the
    /// terminating `'\n'` and reports whether the full `"\r\n"` was present.
    pub fn get_line_content_crlf(&self, out: &mut Vec<u8>, line: LineIndex) -> IncompleteCRLF {
        queries::get_line_content_crlf(&self.buffers, &self.root, self.meta, line, out)
    }

    /// The whole document, assembled through the forward walker.
    pub fn text(&self) -> String {
        let mut out = Vec::with_capacity(self.meta.total_content_length.0);
        out.extend(crate::walker::TreeWalker::new(self, ByteOffset(0)));
        String::from_utf8_lossy(&out).into_owned()
    }

    // --- Snapshots --------------------------------------------------------

    /// A read-only snapshot that owns its buffer handle: it stays valid even
    /// after this buffer is dropped and may be shared across threads.
    pub fn owning_snap(&self) -> OwningSnapshot {
        OwningSnapshot::new(self)
    }

    /// A read-only snapshot borrowing this buffer's storage; cheaper than
    /// [`Self::owning_snap`], valid while the buffer outlives it.
    pub fn ref_snap(&self) -> ReferenceSnapshot<'_> {
        ReferenceSnapshot::new(self)
    }
}
