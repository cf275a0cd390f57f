//! Typed integer wrappers for document arithmetic.
//!
//! The offset/line algorithms juggle several kinds of non-negative integers:
//! document byte offsets, byte counts, newline counts, 1-based line numbers,
//! and buffer-local line/column indices. Mixing them up compiles fine with
//! bare `usize` and corrupts documents at runtime, so the document-level
//! quantities get their own wrapper types with only the arithmetic the
//! algorithms actually need.

use std::ops::{Add, AddAssign, Sub};

/// A byte position within the logical document (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteOffset(pub usize);

/// A byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteLength(pub usize);

/// A count of `'\n'` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LfCount(pub usize);

/// A 1-based line number within the document. Line 1 starts at offset 0.
///
/// [`LineIndex::BEFORE_FIRST`] (zero) means "before the first line" and is
/// rejected by most queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LineIndex(pub usize);

impl LineIndex {
    /// The sentinel "before the first line".
    pub const BEFORE_FIRST: LineIndex = LineIndex(0);
    /// The first line of a document.
    pub const FIRST: LineIndex = LineIndex(1);

    /// The line after this one.
    #[must_use]
    pub fn next(self) -> LineIndex {
        LineIndex(self.0 + 1)
    }
}

/// Identifies one buffer in the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferIndex {
    /// The growable modification buffer that receives all inserted text.
    Mod,
    /// An immutable original buffer, by position in acceptance order.
    Original(usize),
}

impl Add<ByteLength> for ByteOffset {
    type Output = ByteOffset;

    fn add(self, rhs: ByteLength) -> ByteOffset {
        ByteOffset(self.0 + rhs.0)
    }
}

impl AddAssign<ByteLength> for ByteOffset {
    fn add_assign(&mut self, rhs: ByteLength) {
        self.0 += rhs.0;
    }
}

/// The distance between two offsets, `last - first`.
impl Sub<ByteOffset> for ByteOffset {
    type Output = ByteLength;

    fn sub(self, rhs: ByteOffset) -> ByteLength {
        ByteLength(self.0 - rhs.0)
    }
}

impl Add for ByteLength {
    type Output = ByteLength;

    fn add(self, rhs: ByteLength) -> ByteLength {
        ByteLength(self.0 + rhs.0)
    }
}

impl AddAssign for ByteLength {
    fn add_assign(&mut self, rhs: ByteLength) {
        self.0 += rhs.0;
    }
}

impl Sub for ByteLength {
    type Output = ByteLength;

    fn sub(self, rhs: ByteLength) -> ByteLength {
        ByteLength(self.0 - rhs.0)
    }
}

impl Add for LfCount {
    type Output = LfCount;

    fn add(self, rhs: LfCount) -> LfCount {
        LfCount(self.0 + rhs.0)
    }
}
