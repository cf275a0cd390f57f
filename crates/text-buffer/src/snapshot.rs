//! Read-only snapshots of a buffer at a frozen root.
//!
//! A snapshot is a root handle plus the buffer set it reads from. Because
//! roots are persistent and buffer bytes are never mutated in place, a
//! snapshot keeps answering queries with the content it froze no matter what
//! the live buffer does afterwards.

use crate::buffer::{BufferMeta, IncompleteCRLF, LineRange, TextBuffer};
use crate::queries;
use crate::storage::BufferCollection;
use crate::tree::RedBlackTree;
use crate::units::{ByteLength, ByteOffset, LfCount, LineIndex};
use crate::walker::TreeWalker;

/// A snapshot that owns its buffer handle.
///
/// The original-buffer references are shared and the modification buffer is
/// copied, so the snapshot stays valid after the originating [`TextBuffer`]
/// is dropped and can be moved across threads.
#[derive(Debug, Clone)]
pub struct OwningSnapshot {
    root: RedBlackTree,
    meta: BufferMeta,
    buffers: BufferCollection,
}

/// A snapshot borrowing the originating buffer's storage.
///
/// Cheaper than [`OwningSnapshot`]; valid only while the buffer outlives it.
#[derive(Debug, Clone)]
pub struct ReferenceSnapshot<'a> {
    root: RedBlackTree,
    meta: BufferMeta,
    buffers: &'a BufferCollection,
}

macro_rules! snapshot_queries {
    () => {
        /// Total snapshot length in bytes.
        pub fn length(&self) -> ByteLength {
            self.meta.total_content_length
        }

        /// True when the snapshot holds no bytes.
        pub fn is_empty(&self) -> bool {
            self.meta.total_content_length.0 == 0
        }

        /// Number of `'\n'` bytes in the snapshot.
        pub fn line_feed_count(&self) -> LfCount {
            self.meta.lf_count
        }

        /// Number of lines: the newline count plus one.
        pub fn line_count(&self) -> usize {
            self.meta.lf_count.0 + 1
        }

        /// Byte at `offset`, or 0 when out of range.
        pub fn at(&self, offset: ByteOffset) -> u8 {
            queries::char_at(self.buffers(), &self.root, offset)
        }

        /// 1-based line containing `offset`; the first line when empty.
        pub fn line_at(&self, offset: ByteOffset) -> LineIndex {
            queries::line_at(self.buffers(), &self.root, offset)
        }

        /// Byte range of `line`; `last` excludes the trailing `'\n'`.
        pub fn get_line_range(&self, line: LineIndex) -> LineRange {
            queries::get_line_range(self.buffers(), &self.root, line)
        }

        /// Byte range of `line`; `last` also excludes a `'\r'` before the
        /// `'\n'`.
        pub fn get_line_range_crlf(&self, line: LineIndex) -> LineRange {
            queries::get_line_range_crlf(self.buffers(), &self.root, line)
        }

        /// Byte range of `line` where `last` is the next line's first byte.
        pub fn get_line_range_with_newline(&self, line: LineIndex) -> LineRange {
            queries::get_line_range_with_newline(self.buffers(), &self.root, line)
        }

        /// Replaces `out` with the bytes of `line`, excluding its terminator.
        pub fn get_line_content(&self, out: &mut Vec<u8>, line: LineIndex) {
            queries::get_line_content(self.buffers(), &self.root, self.meta, line, out);
        }

        /// CRLF-aware line content; reports whether the terminator carried a
        /// `'\r'`.
        pub fn get_line_content_crlf(&self, out: &mut Vec<u8>, line: LineIndex) -> IncompleteCRLF {
            queries::get_line_content_crlf(self.buffers(), &self.root, self.meta, line, out)
        }

        /// The whole snapshot, assembled through the forward walker.
        pub fn text(&self) -> String {
            let mut out = Vec::with_capacity(self.meta.total_content_length.0);
            out.extend(TreeWalker::over(
                self.buffers(),
                self.root.clone(),
                self.meta,
                ByteOffset(0),
            ));
            String::from_utf8_lossy(&out).into_owned()
        }
    };
}

impl OwningSnapshot {
    pub(crate) fn new(tree: &TextBuffer) -> Self {
        Self {
            root: tree.root().clone(),
            meta: tree.meta(),
            // The original buffers are shared references; only the (usually
            // small) modification buffer is actually copied.
            buffers: tree.buffers().clone(),
        }
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

    snapshot_queries!();
}

impl<'a> ReferenceSnapshot<'a> {
    pub(crate) fn new(tree: &'a TextBuffer) -> Self {
        Self {
            root: tree.root().clone(),
            meta: tree.meta(),
            buffers: tree.buffers(),
        }
    }

    pub(crate) fn buffers(&self) -> &'a BufferCollection {
        self.buffers
    }

    pub(crate) fn root(&self) -> &RedBlackTree {
        &self.root
    }

    pub(crate) fn meta(&self) -> BufferMeta {
        self.meta
    }

    snapshot_queries!();
}
