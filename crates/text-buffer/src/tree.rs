//! The persistent red-black tree of pieces.
//!
//! Nodes are immutable and shared through `Arc`: every mutation rebuilds the
//! `O(log n)` path from the root down to the affected position and shares
//! everything else. Any root that is still referenced — the live one, a
//! history entry, a snapshot — keeps its entire subtree alive, so old roots
//! stay readable forever.
//!
//! Insertion rebalances with the four classic doubled-red patterns of the
//! functional red-black scheme. Deletion fuses the two subtrees around the
//! removed node and repairs black heights locally on the way back up.
//!
//! Each node carries the total byte length and newline count of its left
//! subtree; both are recomputed from the actual left child every time a node
//! is constructed, so the augmentation can never drift from the structure.

use std::sync::Arc;

use crate::storage::Piece;
use crate::units::{ByteLength, ByteOffset, LfCount};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// Payload of one node: the piece plus the left-subtree summaries.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeData {
    pub piece: Piece,
    pub left_subtree_length: ByteLength,
    pub left_subtree_lf_count: LfCount,
}

impl NodeData {
    /// Wraps a piece; the subtree summaries are filled in whenever a node is
    /// built around this data.
    pub fn new(piece: Piece) -> Self {
        Self {
            piece,
            left_subtree_length: ByteLength(0),
            left_subtree_lf_count: LfCount(0),
        }
    }
}

#[derive(Debug)]
struct Node {
    color: Color,
    left: RedBlackTree,
    data: NodeData,
    right: RedBlackTree,
}

/// An immutable, structurally shared tree of pieces keyed by cumulative byte
/// offset.
///
/// Cloning a handle is `O(1)` and mutations return new roots, which is what
/// makes history entries and snapshots cheap. Opaque to callers: obtained
/// from [`TextBuffer::head`](crate::TextBuffer::head) and accepted back by
/// [`TextBuffer::snap_to`](crate::TextBuffer::snap_to). Two handles compare
/// equal when they refer to the same root node.
#[derive(Debug, Clone, Default)]
pub struct RedBlackTree {
    root: Option<Arc<Node>>,
}

impl PartialEq for RedBlackTree {
    fn eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for RedBlackTree {}

impl RedBlackTree {
    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub(crate) fn data(&self) -> &NodeData {
        &self.root.as_ref().expect("tree is non-empty").data
    }

    pub(crate) fn left(&self) -> RedBlackTree {
        self.root.as_ref().expect("tree is non-empty").left.clone()
    }

    pub(crate) fn right(&self) -> RedBlackTree {
        self.root.as_ref().expect("tree is non-empty").right.clone()
    }

    fn root_color(&self) -> Color {
        self.root.as_ref().expect("tree is non-empty").color
    }

    /// Non-empty with a red root.
    fn is_red(&self) -> bool {
        matches!(self.root.as_deref(), Some(node) if node.color == Color::Red)
    }

    /// Non-empty with a black root. (An empty tree counts as black for the
    /// invariant, but every caller below needs the non-empty case.)
    fn is_black(&self) -> bool {
        matches!(self.root.as_deref(), Some(node) if node.color == Color::Black)
    }

    /// The only node constructor: recomputes the left-subtree summaries from
    /// the actual left child.
    fn branch(color: Color, left: RedBlackTree, data: NodeData, right: RedBlackTree) -> RedBlackTree {
        let data = attribute(data, &left);
        RedBlackTree {
            root: Some(Arc::new(Node {
                color,
                left,
                data,
                right,
            })),
        }
    }

    fn paint(&self, color: Color) -> RedBlackTree {
        Self::branch(color, self.left(), *self.data(), self.right())
    }

    /// Inserts `x` so that it starts at document offset `at`, returning the
    /// new root. Offsets equal to an existing node's start land immediately
    /// before that node.
    pub(crate) fn insert(&self, x: NodeData, at: ByteOffset) -> RedBlackTree {
        let t = self.ins(x, at, ByteOffset(0));
        Self::branch(Color::Black, t.left(), *t.data(), t.right())
    }

    fn ins(&self, x: NodeData, at: ByteOffset, total: ByteOffset) -> RedBlackTree {
        if self.is_empty() {
            return Self::branch(Color::Red, RedBlackTree::default(), x, RedBlackTree::default());
        }
        let y = *self.data();
        let node_end = total + y.left_subtree_length + y.piece.length;
        if at < node_end {
            Self::balance(self.root_color(), self.left().ins(x, at, total), y, self.right())
        } else {
            Self::balance(self.root_color(), self.left(), y, self.right().ins(x, at, node_end))
        }
    }

    /// The four doubled-red rebalance patterns; anything else is rebuilt
    /// unchanged.
    fn balance(c: Color, lft: RedBlackTree, x: NodeData, rgt: RedBlackTree) -> RedBlackTree {
        if c == Color::Black && lft.doubled_left() {
            Self::branch(
                Color::Red,
                lft.left().paint(Color::Black),
                *lft.data(),
                Self::branch(Color::Black, lft.right(), x, rgt),
            )
        } else if c == Color::Black && lft.doubled_right() {
            Self::branch(
                Color::Red,
                Self::branch(Color::Black, lft.left(), *lft.data(), lft.right().left()),
                *lft.right().data(),
                Self::branch(Color::Black, lft.right().right(), x, rgt),
            )
        } else if c == Color::Black && rgt.doubled_left() {
            Self::branch(
                Color::Red,
                Self::branch(Color::Black, lft, x, rgt.left().left()),
                *rgt.left().data(),
                Self::branch(Color::Black, rgt.left().right(), *rgt.data(), rgt.right()),
            )
        } else if c == Color::Black && rgt.doubled_right() {
            Self::branch(
                Color::Red,
                Self::branch(Color::Black, lft, x, rgt.left()),
                *rgt.data(),
                rgt.right().paint(Color::Black),
            )
        } else {
            Self::branch(c, lft, x, rgt)
        }
    }

    fn doubled_left(&self) -> bool {
        self.is_red() && self.left().is_red()
    }

    fn doubled_right(&self) -> bool {
        self.is_red() && self.right().is_red()
    }

    /// Removes the node starting at document offset `at`, returning the new
    /// root. `at` must be a node's exact start offset.
    pub(crate) fn remove(&self, at: ByteOffset) -> RedBlackTree {
        let t = Self::rem(self, at, ByteOffset(0));
        if t.is_empty() {
            return RedBlackTree::default();
        }
        Self::branch(Color::Black, t.left(), *t.data(), t.right())
    }

    fn rem(root: &RedBlackTree, at: ByteOffset, total: ByteOffset) -> RedBlackTree {
        if root.is_empty() {
            return RedBlackTree::default();
        }
        let node_start = total + root.data().left_subtree_length;
        if at < node_start {
            Self::remove_left(root, at, total)
        } else if at == node_start {
            Self::fuse(&root.left(), &root.right())
        } else {
            Self::remove_right(root, at, total)
        }
    }

    fn remove_left(root: &RedBlackTree, at: ByteOffset, total: ByteOffset) -> RedBlackTree {
        let new_left = Self::rem(&root.left(), at, total);
        let new_node = Self::branch(Color::Red, new_left, *root.data(), root.right());
        // The left subtree lost a unit of black height.
        if root.left().is_black() {
            Self::balance_left(&new_node)
        } else {
            new_node
        }
    }

    fn remove_right(root: &RedBlackTree, at: ByteOffset, total: ByteOffset) -> RedBlackTree {
        let y = *root.data();
        let new_right = Self::rem(&root.right(), at, total + y.left_subtree_length + y.piece.length);
        let new_node = Self::branch(Color::Red, root.left(), y, new_right);
        if root.right().is_black() {
            Self::balance_right(&new_node)
        } else {
            new_node
        }
    }

    /// Merges the two subtrees left adjacent after their parent was removed.
    /// Case analysis on the pair of root colours; a red root surfacing from
    /// the recursive fuse is pushed outward.
    fn fuse(left: &RedBlackTree, right: &RedBlackTree) -> RedBlackTree {
        if left.is_empty() {
            return right.clone();
        }
        if right.is_empty() {
            return left.clone();
        }
        match (left.root_color(), right.root_color()) {
            (Color::Black, Color::Red) => Self::branch(
                Color::Red,
                Self::fuse(left, &right.left()),
                *right.data(),
                right.right(),
            ),
            (Color::Red, Color::Black) => Self::branch(
                Color::Red,
                left.left(),
                *left.data(),
                Self::fuse(&left.right(), right),
            ),
            (Color::Red, Color::Red) => {
                let fused = Self::fuse(&left.right(), &right.left());
                if fused.is_red() {
                    let new_left =
                        Self::branch(Color::Red, left.left(), *left.data(), fused.left());
                    let new_right =
                        Self::branch(Color::Red, fused.right(), *right.data(), right.right());
                    return Self::branch(Color::Red, new_left, *fused.data(), new_right);
                }
                let new_right = Self::branch(Color::Red, fused, *right.data(), right.right());
                Self::branch(Color::Red, left.left(), *left.data(), new_right)
            }
            (Color::Black, Color::Black) => {
                let fused = Self::fuse(&left.right(), &right.left());
                if fused.is_red() {
                    let new_left =
                        Self::branch(Color::Black, left.left(), *left.data(), fused.left());
                    let new_right =
                        Self::branch(Color::Black, fused.right(), *right.data(), right.right());
                    return Self::branch(Color::Red, new_left, *fused.data(), new_right);
                }
                let new_right = Self::branch(Color::Black, fused, *right.data(), right.right());
                let new_node = Self::branch(Color::Red, left.left(), *left.data(), new_right);
                Self::balance_left(&new_node)
            }
        }
    }

    /// Local repair when `node` has two red children or a doubled red below.
    fn balance_node(node: &RedBlackTree) -> RedBlackTree {
        if node.left().is_red() && node.right().is_red() {
            let l = node.left().paint(Color::Black);
            let r = node.right().paint(Color::Black);
            return Self::branch(Color::Red, l, *node.data(), r);
        }
        debug_assert!(node.root_color() == Color::Black);
        Self::balance(node.root_color(), node.left(), *node.data(), node.right())
    }

    /// Repairs a node whose left subtree is one black unit short.
    fn balance_left(left: &RedBlackTree) -> RedBlackTree {
        if left.left().is_red() {
            return Self::branch(
                Color::Red,
                left.left().paint(Color::Black),
                *left.data(),
                left.right(),
            );
        }
        if left.right().is_black() {
            let new_left = Self::branch(
                Color::Black,
                left.left(),
                *left.data(),
                left.right().paint(Color::Red),
            );
            return Self::balance_node(&new_left);
        }
        if left.right().is_red() && left.right().left().is_black() {
            let unbalanced_new_right = Self::branch(
                Color::Black,
                left.right().left().right(),
                *left.right().data(),
                left.right().right().paint(Color::Red),
            );
            let new_right = Self::balance_node(&unbalanced_new_right);
            let new_left = Self::branch(
                Color::Black,
                left.left(),
                *left.data(),
                left.right().left().left(),
            );
            return Self::branch(Color::Red, new_left, *left.right().left().data(), new_right);
        }
        unreachable!("balance_left: red-black invariant already violated");
    }

    /// Mirror image of [`Self::balance_left`].
    fn balance_right(right: &RedBlackTree) -> RedBlackTree {
        if right.right().is_red() {
            return Self::branch(
                Color::Red,
                right.left(),
                *right.data(),
                right.right().paint(Color::Black),
            );
        }
        if right.left().is_black() {
            let new_right = Self::branch(
                Color::Black,
                right.left().paint(Color::Red),
                *right.data(),
                right.right(),
            );
            return Self::balance_node(&new_right);
        }
        if right.left().is_red() && right.left().right().is_black() {
            let unbalanced_new_left = Self::branch(
                Color::Black,
                // A red node always has a left child here.
                right.left().left().paint(Color::Red),
                *right.left().data(),
                right.left().right().left(),
            );
            let new_left = Self::balance_node(&unbalanced_new_left);
            let new_right = Self::branch(
                Color::Black,
                right.left().right().right(),
                *right.data(),
                right.right(),
            );
            return Self::branch(Color::Red, new_left, *right.left().right().data(), new_right);
        }
        unreachable!("balance_right: red-black invariant already violated");
    }
}

/// Total byte length of a tree: walk the right spine, summing the left
/// summaries as we go.
pub(crate) fn tree_length(root: &RedBlackTree) -> ByteLength {
    match &root.root {
        None => ByteLength(0),
        Some(node) => {
            node.data.left_subtree_length + node.data.piece.length + tree_length(&node.right)
        }
    }
}

/// Total newline count of a tree.
pub(crate) fn tree_lf_count(root: &RedBlackTree) -> LfCount {
    match &root.root {
        None => LfCount(0),
        Some(node) => {
            node.data.left_subtree_lf_count + node.data.piece.newline_count + tree_lf_count(&node.right)
        }
    }
}

fn attribute(mut data: NodeData, left: &RedBlackTree) -> NodeData {
    data.left_subtree_length = tree_length(left);
    data.left_subtree_lf_count = tree_lf_count(left);
    data
}

/// `Some(black_height)` when the red-black properties hold below `tree`,
/// `None` on the first violation.
fn black_height(tree: &RedBlackTree) -> Option<usize> {
    let Some(node) = tree.root.as_deref() else {
        return Some(1);
    };
    if node.color == Color::Red && (node.left.is_red() || node.right.is_red()) {
        return None;
    }
    let l = black_height(&node.left)?;
    let r = black_height(&node.right)?;
    if l != r {
        return None;
    }
    Some(if node.color == Color::Red { l } else { l + 1 })
}

/// Checks the structural red-black properties. Run after every mutation in
/// debug builds.
pub(crate) fn satisfies_rb_invariants(root: &RedBlackTree) -> bool {
    black_height(root).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BufferCursor;
    use crate::units::BufferIndex;

    /// The tree only consults a piece's length and newline count, so tests
    /// can fabricate pieces without a backing buffer.
    fn piece(length: usize, newlines: usize) -> NodeData {
        NodeData::new(Piece {
            index: BufferIndex::Original(0),
            first: BufferCursor::default(),
            last: BufferCursor::new(newlines, 0),
            length: ByteLength(length),
            newline_count: LfCount(newlines),
        })
    }

    /// Verifies the augmentation of every node against the actual subtree
    /// sums and returns the tree totals.
    fn check_augmentation(tree: &RedBlackTree) -> (ByteLength, LfCount) {
        let Some(node) = tree.root.as_deref() else {
            return (ByteLength(0), LfCount(0));
        };
        let (left_len, left_lf) = check_augmentation(&node.left);
        let (right_len, right_lf) = check_augmentation(&node.right);
        assert_eq!(node.data.left_subtree_length, left_len);
        assert_eq!(node.data.left_subtree_lf_count, left_lf);
        (
            left_len + node.data.piece.length + right_len,
            LfCount(left_lf.0 + node.data.piece.newline_count.0 + right_lf.0),
        )
    }

    fn collect_lengths(tree: &RedBlackTree, out: &mut Vec<usize>) {
        if tree.is_empty() {
            return;
        }
        collect_lengths(&tree.left(), out);
        out.push(tree.data().piece.length.0);
        collect_lengths(&tree.right(), out);
    }

    #[test]
    fn test_insert_keeps_invariants() {
        let mut tree = RedBlackTree::default();
        let mut total = 0usize;
        // Alternate head/tail/middle insertions to exercise all four
        // rebalance patterns.
        for i in 1..=64 {
            let at = match i % 3 {
                0 => 0,
                1 => total,
                _ => total / 2,
            };
            tree = tree.insert(piece(i, i % 2), ByteOffset(at));
            total += i;
            assert!(satisfies_rb_invariants(&tree), "after insert {i}");
            let (len, _) = check_augmentation(&tree);
            assert_eq!(len.0, total);
        }
        assert_eq!(tree_length(&tree).0, total);
    }

    #[test]
    fn test_insert_at_node_start_lands_before_it() {
        let mut tree = RedBlackTree::default();
        tree = tree.insert(piece(10, 0), ByteOffset(0));
        tree = tree.insert(piece(20, 0), ByteOffset(0));
        let mut lengths = Vec::new();
        collect_lengths(&tree, &mut lengths);
        assert_eq!(lengths, vec![20, 10]);
    }

    #[test]
    fn test_remove_keeps_invariants() {
        let mut tree = RedBlackTree::default();
        for i in 0..40 {
            tree = tree.insert(piece(3, 0), ByteOffset(i * 3));
        }
        // Remove from the front, the back, and the middle.
        let mut remaining = 40usize;
        while remaining > 0 {
            let slot = match remaining % 3 {
                0 => 0,
                1 => remaining - 1,
                _ => remaining / 2,
            };
            tree = tree.remove(ByteOffset(slot * 3));
            remaining -= 1;
            assert!(satisfies_rb_invariants(&tree), "with {remaining} left");
            check_augmentation(&tree);
            assert_eq!(tree_length(&tree).0, remaining * 3);
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn test_mutations_do_not_disturb_old_roots() {
        let mut tree = RedBlackTree::default();
        for i in 0..16 {
            tree = tree.insert(piece(2, 0), ByteOffset(i * 2));
        }
        let captured = tree.clone();
        let mut before = Vec::new();
        collect_lengths(&captured, &mut before);

        tree = tree.remove(ByteOffset(0)).remove(ByteOffset(0));
        tree = tree.insert(piece(7, 0), ByteOffset(4));

        let mut after_captured = Vec::new();
        collect_lengths(&captured, &mut after_captured);
        assert_eq!(before, after_captured);
        assert_eq!(tree_length(&captured).0, 32);
        assert_eq!(tree_length(&tree).0, 35);
    }

    #[test]
    fn test_lf_summaries_accumulate() {
        let mut tree = RedBlackTree::default();
        let mut offset = 0usize;
        for i in 0..10 {
            tree = tree.insert(piece(5, i % 3), ByteOffset(offset));
            offset += 5;
        }
        check_augmentation(&tree);
        let expected: usize = (0..10).map(|i| i % 3).sum();
        assert_eq!(tree_lf_count(&tree).0, expected);
    }
}
