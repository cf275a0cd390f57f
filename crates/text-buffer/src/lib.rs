#![warn(missing_docs)]
//! Persistent piece-tree text buffer.
//!
//! # Overview
//!
//! `text-buffer` is the storage core of an editor: it holds a document,
//! supports fast insertion and deletion at arbitrary byte offsets, answers
//! line-oriented queries, and provides cheap undo/redo and constant-time
//! immutable snapshots.
//!
//! Text lives in append-only buffers (the initial content plus one growable
//! modification buffer) and the document is a balanced tree of *pieces* —
//! half-open slices into those buffers — keyed by cumulative byte offset and
//! augmented with per-subtree byte and newline counts. The tree is
//! *persistent*: every edit produces a new root sharing all untouched
//! subtrees, so history entries and snapshots are just retained roots.
//!
//! # Core Features
//!
//! - **`O(log n)` edits**: insert/remove cut and recombine pieces along one
//!   root-to-leaf path.
//! - **Line queries**: offset ↔ line mapping and line extraction driven by
//!   the newline augmentation, with CRLF-aware variants.
//! - **Undo/redo for free**: the history stacks hold old roots; undo is a
//!   pointer swap plus a summary recompute.
//! - **Snapshots**: freeze the current root and read from it while the live
//!   buffer keeps editing, on the same thread or another one.
//! - **Streaming traversal**: forward and reverse cursors seek in
//!   `O(log n)` and stream bytes at amortised `O(1)`.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  TextBuffer (engine, history, snapshots)    │  ← public API
//! ├─────────────────────────────────────────────┤
//! │  TreeWalker / ReverseTreeWalker             │  ← streaming reads
//! ├─────────────────────────────────────────────┤
//! │  Offset & line queries                      │  ← node_at, line_start
//! ├─────────────────────────────────────────────┤
//! │  Persistent red-black tree of pieces        │  ← structural sharing
//! ├─────────────────────────────────────────────┤
//! │  Append-only character buffers              │  ← raw bytes + line starts
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use text_buffer::{BufferBuilder, ByteLength, ByteOffset, LineIndex, SuppressHistory};
//!
//! let mut builder = BufferBuilder::new();
//! builder.accept("Hello,");
//! builder.accept(" World!");
//! let mut buffer = builder.create();
//!
//! buffer.insert(ByteOffset(13), "\nSecond line.", SuppressHistory::No);
//! assert_eq!(buffer.text(), "Hello, World!\nSecond line.");
//! assert_eq!(buffer.line_count(), 2);
//!
//! let mut line = Vec::new();
//! buffer.get_line_content(&mut line, LineIndex(2));
//! assert_eq!(line, b"Second line.");
//!
//! buffer.remove(ByteOffset(0), ByteLength(7), SuppressHistory::No);
//! assert_eq!(buffer.text(), "World!\nSecond line.");
//!
//! assert!(buffer.try_undo(ByteOffset(0)).success);
//! assert_eq!(buffer.text(), "Hello, World!\nSecond line.");
//! ```
//!
//! # Addressing
//!
//! The buffer is byte-addressed and encoding-agnostic: offsets count bytes
//! and `'\n'` delimits lines. Callers that work in code points or grapheme
//! clusters map to byte offsets externally.
//!
//! # Module Description
//!
//! - [`buffer`] — the engine: edits, history, line queries
//! - [`snapshot`] — read-only snapshots (owning and borrowing)
//! - [`walker`] — forward/reverse streaming cursors
//! - [`units`] — typed offset/length/line wrappers

pub mod buffer;
mod queries;
pub mod snapshot;
mod storage;
mod tree;
pub mod units;
pub mod walker;

pub use buffer::{
    BufferBuilder, IncompleteCRLF, LineRange, SuppressHistory, TextBuffer, UndoRedoResult,
};
pub use snapshot::{OwningSnapshot, ReferenceSnapshot};
pub use tree::RedBlackTree;
pub use units::{BufferIndex, ByteLength, ByteOffset, LfCount, LineIndex};
pub use walker::{ReverseTreeWalker, TreeWalker};
