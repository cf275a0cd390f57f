//! Streaming byte cursors over a tree root.
//!
//! A walker seeks to a byte offset in `O(log n)` and then streams bytes at
//! amortised `O(1)` each: it keeps an explicit stack of `(node, direction)`
//! frames describing the in-order traversal state plus a borrowed slice of
//! the current piece's bytes, so steady-state iteration never touches the
//! tree.

use smallvec::SmallVec;

use crate::buffer::{BufferMeta, TextBuffer};
use crate::snapshot::{OwningSnapshot, ReferenceSnapshot};
use crate::storage::BufferCollection;
use crate::tree::RedBlackTree;
use crate::units::{ByteLength, ByteOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Left,
    Center,
    Right,
}

#[derive(Debug)]
struct StackEntry {
    node: RedBlackTree,
    dir: Direction,
}

type WalkStack = SmallVec<[StackEntry; 16]>;

/// Forward byte cursor: yields bytes at ascending offsets from the seek
/// position to the end of the document.
#[derive(Debug)]
pub struct TreeWalker<'a> {
    buffers: &'a BufferCollection,
    root: RedBlackTree,
    meta: BufferMeta,
    stack: WalkStack,
    total_offset: ByteOffset,
    cur: &'a [u8],
}

impl<'a> TreeWalker<'a> {
    /// A walker over `tree`, positioned at `offset`.
    pub fn new(tree: &'a TextBuffer, offset: ByteOffset) -> Self {
        Self::over(tree.buffers(), tree.root().clone(), tree.meta(), offset)
    }

    /// A walker over an owning snapshot, positioned at `offset`.
    pub fn from_owning_snap(snap: &'a OwningSnapshot, offset: ByteOffset) -> Self {
        Self::over(snap.buffers(), snap.root().clone(), snap.meta(), offset)
    }

    /// A walker over a reference snapshot, positioned at `offset`.
    pub fn from_ref_snap(snap: &ReferenceSnapshot<'a>, offset: ByteOffset) -> Self {
        Self::over(snap.buffers(), snap.root().clone(), snap.meta(), offset)
    }

    pub(crate) fn over(
        buffers: &'a BufferCollection,
        root: RedBlackTree,
        meta: BufferMeta,
        offset: ByteOffset,
    ) -> Self {
        let mut walker = Self {
            buffers,
            root: root.clone(),
            meta,
            stack: WalkStack::new(),
            total_offset: offset,
            cur: &[],
        };
        walker.stack.push(StackEntry {
            node: root,
            dir: Direction::Left,
        });
        walker.fast_forward_to(offset);
        walker
    }

    /// Repositions the walker at `offset` in `O(log n)`.
    pub fn seek(&mut self, offset: ByteOffset) {
        self.stack.clear();
        self.stack.push(StackEntry {
            node: self.root.clone(),
            dir: Direction::Left,
        });
        self.cur = &[];
        self.total_offset = offset;
        self.fast_forward_to(offset);
    }

    /// The byte the next call to `next` would yield, without advancing; 0
    /// once exhausted.
    pub fn current(&mut self) -> u8 {
        if self.cur.is_empty() {
            self.populate_ptrs();
            if self.exhausted() {
                return 0;
            }
        }
        self.cur.first().copied().unwrap_or(0)
    }

    /// True once every byte up to the end of the document has been yielded.
    pub fn exhausted(&self) -> bool {
        if self.stack.is_empty() {
            return true;
        }
        if !self.cur.is_empty() {
            return false;
        }
        if self.stack.len() > 1 {
            return false;
        }
        // A single frame is done when it has no content left to visit.
        let entry = &self.stack[0];
        if entry.node.is_empty() {
            return true;
        }
        entry.dir == Direction::Right && entry.node.right().is_empty()
    }

    /// Bytes left between the cursor position and the end of the document.
    pub fn remaining(&self) -> ByteLength {
        ByteLength(
            self.meta
                .total_content_length
                .0
                .saturating_sub(self.total_offset.0),
        )
    }

    /// The cursor's current byte offset.
    pub fn offset(&self) -> ByteOffset {
        self.total_offset
    }

    /// Refills `cur` with the next piece's bytes by resuming the in-order
    /// traversal.
    fn populate_ptrs(&mut self) {
        let buffers: &'a BufferCollection = self.buffers;
        loop {
            if self.exhausted() {
                return;
            }
            let top = self.stack.len() - 1;
            if self.stack[top].node.is_empty() {
                self.stack.pop();
                continue;
            }
            match self.stack[top].dir {
                Direction::Left => {
                    let left = self.stack[top].node.left();
                    self.stack[top].dir = Direction::Center;
                    if !left.is_empty() {
                        self.stack.push(StackEntry {
                            node: left,
                            dir: Direction::Left,
                        });
                    }
                }
                Direction::Center => {
                    let piece = self.stack[top].node.data().piece;
                    let first = buffers.buffer_offset(piece.index, piece.first).0;
                    let last = buffers.buffer_offset(piece.index, piece.last).0;
                    self.stack[top].dir = Direction::Right;
                    self.cur = &buffers.buffer_at(piece.index).bytes[first..last];
                    return;
                }
                Direction::Right => {
                    let right = self.stack[top].node.right();
                    self.stack.pop();
                    self.stack.push(StackEntry {
                        node: right,
                        dir: Direction::Left,
                    });
                }
            }
        }
    }

    /// Walks down like `node_at`, recording the traversal state so that
    /// streaming resumes mid-tree, and points `cur` into the target piece
    /// advanced by the in-piece remainder.
    fn fast_forward_to(&mut self, mut offset: ByteOffset) {
        let buffers: &'a BufferCollection = self.buffers;
        let mut node = self.root.clone();
        while !node.is_empty() {
            let left_len = node.data().left_subtree_length.0;
            let piece_len = node.data().piece.length.0;
            if left_len > offset.0 {
                // Revisit this node after its left subtree.
                if let Some(top) = self.stack.last_mut() {
                    top.dir = Direction::Center;
                }
                node = node.left();
                self.stack.push(StackEntry {
                    node: node.clone(),
                    dir: Direction::Left,
                });
            } else if left_len + piece_len > offset.0 {
                if let Some(top) = self.stack.last_mut() {
                    top.dir = Direction::Right;
                }
                let rel = offset.0 - left_len;
                let piece = node.data().piece;
                let first = buffers.buffer_offset(piece.index, piece.first).0;
                let last = buffers.buffer_offset(piece.index, piece.last).0;
                self.cur = &buffers.buffer_at(piece.index).bytes[first + rel..last];
                return;
            } else {
                // This frame is fully before the target; it is never
                // revisited.
                self.stack.pop();
                offset = ByteOffset(offset.0 - (left_len + piece_len));
                node = node.right();
                self.stack.push(StackEntry {
                    node: node.clone(),
                    dir: Direction::Left,
                });
            }
        }
    }
}

impl Iterator for TreeWalker<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        loop {
            if let Some((&byte, rest)) = self.cur.split_first() {
                self.cur = rest;
                self.total_offset = ByteOffset(self.total_offset.0 + 1);
                return Some(byte);
            }
            self.populate_ptrs();
            if self.exhausted() {
                return None;
            }
        }
    }
}

/// Reverse byte cursor: yields bytes at descending offsets from the seek
/// position down to the start of the document.
#[derive(Debug)]
pub struct ReverseTreeWalker<'a> {
    buffers: &'a BufferCollection,
    root: RedBlackTree,
    stack: WalkStack,
    total_offset: ByteOffset,
    cur: &'a [u8],
}

impl<'a> ReverseTreeWalker<'a> {
    /// A reverse walker over `tree`, positioned at `offset`.
    pub fn new(tree: &'a TextBuffer, offset: ByteOffset) -> Self {
        Self::over(tree.buffers(), tree.root().clone(), offset)
    }

    /// A reverse walker over an owning snapshot, positioned at `offset`.
    pub fn from_owning_snap(snap: &'a OwningSnapshot, offset: ByteOffset) -> Self {
        Self::over(snap.buffers(), snap.root().clone(), offset)
    }

    /// A reverse walker over a reference snapshot, positioned at `offset`.
    pub fn from_ref_snap(snap: &ReferenceSnapshot<'a>, offset: ByteOffset) -> Self {
        Self::over(snap.buffers(), snap.root().clone(), offset)
    }

    pub(crate) fn over(buffers: &'a BufferCollection, root: RedBlackTree, offset: ByteOffset) -> Self {
        let mut walker = Self {
            buffers,
            root: root.clone(),
            stack: WalkStack::new(),
            total_offset: offset,
            cur: &[],
        };
        walker.stack.push(StackEntry {
            node: root,
            dir: Direction::Right,
        });
        walker.fast_forward_to(offset);
        walker
    }

    /// Repositions the walker at `offset` in `O(log n)`.
    pub fn seek(&mut self, offset: ByteOffset) {
        self.stack.clear();
        self.stack.push(StackEntry {
            node: self.root.clone(),
            dir: Direction::Right,
        });
        self.cur = &[];
        self.total_offset = offset;
        self.fast_forward_to(offset);
    }

    /// The byte the next call to `next` would yield, without advancing; 0
    /// once exhausted.
    pub fn current(&mut self) -> u8 {
        if self.cur.is_empty() {
            self.populate_ptrs();
            if self.exhausted() {
                return 0;
            }
        }
        self.cur.last().copied().unwrap_or(0)
    }

    /// True once every byte down to the start of the document has been
    /// yielded.
    pub fn exhausted(&self) -> bool {
        if self.stack.is_empty() {
            return true;
        }
        if !self.cur.is_empty() {
            return false;
        }
        if self.stack.len() > 1 {
            return false;
        }
        let entry = &self.stack[0];
        if entry.node.is_empty() {
            return true;
        }
        entry.dir == Direction::Left && entry.node.left().is_empty()
    }

    /// Bytes left between the cursor position and the start of the document,
    /// inclusive of the byte at the cursor.
    pub fn remaining(&self) -> ByteLength {
        if self.exhausted() {
            ByteLength(0)
        } else {
            ByteLength(self.total_offset.0 + 1)
        }
    }

    /// The cursor's current byte offset.
    pub fn offset(&self) -> ByteOffset {
        self.total_offset
    }

    fn populate_ptrs(&mut self) {
        let buffers: &'a BufferCollection = self.buffers;
        loop {
            if self.exhausted() {
                return;
            }
            let top = self.stack.len() - 1;
            if self.stack[top].node.is_empty() {
                self.stack.pop();
                continue;
            }
            match self.stack[top].dir {
                Direction::Right => {
                    let right = self.stack[top].node.right();
                    self.stack[top].dir = Direction::Center;
                    if !right.is_empty() {
                        self.stack.push(StackEntry {
                            node: right,
                            dir: Direction::Right,
                        });
                    }
                }
                Direction::Center => {
                    let piece = self.stack[top].node.data().piece;
                    let first = buffers.buffer_offset(piece.index, piece.first).0;
                    let last = buffers.buffer_offset(piece.index, piece.last).0;
                    self.stack[top].dir = Direction::Left;
                    self.cur = &buffers.buffer_at(piece.index).bytes[first..last];
                    return;
                }
                Direction::Left => {
                    let left = self.stack[top].node.left();
                    self.stack.pop();
                    self.stack.push(StackEntry {
                        node: left,
                        dir: Direction::Right,
                    });
                }
            }
        }
    }

    fn fast_forward_to(&mut self, mut offset: ByteOffset) {
        let buffers: &'a BufferCollection = self.buffers;
        let mut node = self.root.clone();
        while !node.is_empty() {
            let left_len = node.data().left_subtree_length.0;
            let piece_len = node.data().piece.length.0;
            if left_len > offset.0 {
                // This node and its right subtree lie past the target; they
                // are never visited walking backwards.
                self.stack.pop();
                node = node.left();
                self.stack.push(StackEntry {
                    node: node.clone(),
                    dir: Direction::Right,
                });
            } else if left_len + piece_len > offset.0 {
                if let Some(top) = self.stack.last_mut() {
                    top.dir = Direction::Left;
                }
                let rel = offset.0 - left_len;
                let piece = node.data().piece;
                let first = buffers.buffer_offset(piece.index, piece.first).0;
                // Include the byte at the target offset; it is yielded first.
                self.cur = &buffers.buffer_at(piece.index).bytes[first..first + rel + 1];
                return;
            } else {
                // Revisit this node after its right subtree.
                if let Some(top) = self.stack.last_mut() {
                    top.dir = Direction::Center;
                }
                offset = ByteOffset(offset.0 - (left_len + piece_len));
                node = node.right();
                self.stack.push(StackEntry {
                    node: node.clone(),
                    dir: Direction::Right,
                });
            }
        }
    }
}

impl Iterator for ReverseTreeWalker<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        loop {
            if let Some((&byte, rest)) = self.cur.split_last() {
                self.cur = rest;
                // Saturates after the byte at offset 0; the walker reports
                // exhausted from then on.
                self.total_offset = ByteOffset(self.total_offset.0.saturating_sub(1));
                return Some(byte);
            }
            self.populate_ptrs();
            if self.exhausted() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferBuilder, SuppressHistory};

    fn scattered_buffer() -> TextBuffer {
        // Build a document spread over many pieces: seeded buffers plus
        // interior edits.
        let mut builder = BufferBuilder::new();
        builder.accept("The quick\n");
        builder.accept("brown fox\n");
        let mut buffer = builder.create();
        buffer.insert(ByteOffset(4), "very ", SuppressHistory::No);
        buffer.insert(ByteOffset(0), ">> ", SuppressHistory::No);
        buffer.remove(ByteOffset(10), ByteLength(3), SuppressHistory::No);
        buffer
    }

    #[test]
    fn test_forward_walk_equals_at() {
        let buffer = scattered_buffer();
        let len = buffer.length().0;
        let collected: Vec<u8> = TreeWalker::new(&buffer, ByteOffset(0)).collect();
        assert_eq!(collected.len(), len);
        for (i, byte) in collected.iter().enumerate() {
            assert_eq!(*byte, buffer.at(ByteOffset(i)), "offset {i}");
        }
    }

    #[test]
    fn test_reverse_walk_is_mirror_of_forward() {
        let buffer = scattered_buffer();
        let forward: Vec<u8> = TreeWalker::new(&buffer, ByteOffset(0)).collect();
        let len = buffer.length().0;
        let backward: Vec<u8> = ReverseTreeWalker::new(&buffer, ByteOffset(len - 1)).collect();
        let mut mirrored = backward;
        mirrored.reverse();
        assert_eq!(mirrored, forward);
    }

    #[test]
    fn test_seek_mid_document() {
        let buffer = scattered_buffer();
        let text = buffer.text();
        let mut walker = TreeWalker::new(&buffer, ByteOffset(0));
        for start in [0usize, 1, text.len() / 2, text.len() - 1, text.len()] {
            walker.seek(ByteOffset(start));
            assert_eq!(walker.offset(), ByteOffset(start));
            assert_eq!(walker.remaining(), ByteLength(text.len() - start));
            let rest: String = (&mut walker).map(char::from).collect();
            assert_eq!(rest, &text[start..], "seek {start}");
            assert!(walker.exhausted());
            assert_eq!(walker.remaining(), ByteLength(0));
        }
    }

    #[test]
    fn test_current_does_not_advance() {
        let buffer = scattered_buffer();
        let mut walker = TreeWalker::new(&buffer, ByteOffset(0));
        let first = walker.current();
        assert_eq!(walker.current(), first);
        assert_eq!(walker.next(), Some(first));
    }

    #[test]
    fn test_empty_document_walkers() {
        let buffer = TextBuffer::new();
        let mut walker = TreeWalker::new(&buffer, ByteOffset(0));
        assert!(walker.exhausted());
        assert_eq!(walker.next(), None);
        assert_eq!(walker.remaining(), ByteLength(0));

        let mut reverse = ReverseTreeWalker::new(&buffer, ByteOffset(0));
        assert!(reverse.exhausted());
        assert_eq!(reverse.next(), None);
        assert_eq!(reverse.remaining(), ByteLength(0));
    }

    #[test]
    fn test_reverse_remaining_counts_down() {
        let buffer = scattered_buffer();
        let len = buffer.length().0;
        let mut walker = ReverseTreeWalker::new(&buffer, ByteOffset(len - 1));
        assert_eq!(walker.remaining(), ByteLength(len));
        let mut yielded = 0usize;
        while walker.next().is_some() {
            yielded += 1;
        }
        assert_eq!(yielded, len);
        assert_eq!(walker.remaining(), ByteLength(0));
    }

    #[test]
    fn test_reverse_seek_partial() {
        let buffer = scattered_buffer();
        let text = buffer.text();
        let mid = text.len() / 2;
        let mut walker = ReverseTreeWalker::new(&buffer, ByteOffset(text.len() - 1));
        walker.seek(ByteOffset(mid));
        let collected: Vec<u8> = walker.collect();
        let mut expected: Vec<u8> = text.as_bytes()[..=mid].to_vec();
        expected.reverse();
        assert_eq!(collected, expected);
    }
}
