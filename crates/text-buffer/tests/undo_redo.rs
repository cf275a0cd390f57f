//! Undo/redo semantics: insert coalescing, redo invalidation, offsets
//! carried through the history stacks.

use text_buffer::{BufferBuilder, ByteLength, ByteOffset, SuppressHistory};

fn buffer_from(text: &str) -> text_buffer::TextBuffer {
    let mut builder = BufferBuilder::new();
    builder.accept(text);
    builder.create()
}

#[test]
fn test_contiguous_inserts_coalesce_into_one_entry() {
    let mut buffer = buffer_from("Hello, World!");

    buffer.insert(ByteOffset(0), "a", SuppressHistory::No);
    buffer.insert(ByteOffset(1), "b", SuppressHistory::No);
    buffer.insert(ByteOffset(2), "c", SuppressHistory::No);
    assert_eq!(buffer.text(), "abcHello, World!");

    buffer.remove(ByteOffset(0), ByteLength(3), SuppressHistory::No);
    assert_eq!(buffer.text(), "Hello, World!");

    // One undo reverts the removal...
    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "abcHello, World!");

    let r = buffer.try_redo(ByteOffset(0));
    assert!(r.success);
    assert_eq!(buffer.text(), "Hello, World!");

    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "abcHello, World!");

    // ...and one more undoes the whole coalesced typing run.
    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "Hello, World!");

    // Nothing left to undo.
    assert!(!buffer.try_undo(ByteOffset(0)).success);

    assert!(buffer.try_redo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "abcHello, World!");

    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "Hello, World!");
}

#[test]
fn test_fresh_edit_clears_redo() {
    let mut buffer = buffer_from("Hello, World!");
    buffer.insert(ByteOffset(0), "abc", SuppressHistory::No);
    buffer.remove(ByteOffset(0), ByteLength(3), SuppressHistory::No);

    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "abcHello, World!");
    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "Hello, World!");

    // A new edit destroys the redo stack.
    buffer.insert(ByteOffset(0), "NEW", SuppressHistory::No);
    assert_eq!(buffer.text(), "NEWHello, World!");
    assert!(!buffer.try_redo(ByteOffset(0)).success);

    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "Hello, World!");
}

#[test]
fn test_noncontiguous_inserts_do_not_coalesce() {
    let mut buffer = buffer_from("0123456789");
    buffer.insert(ByteOffset(0), "a", SuppressHistory::No);
    buffer.insert(ByteOffset(5), "b", SuppressHistory::No);

    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "a0123456789");
    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "0123456789");
}

#[test]
fn test_removal_never_coalesces() {
    let mut buffer = buffer_from("abcdef");
    buffer.remove(ByteOffset(0), ByteLength(1), SuppressHistory::No);
    buffer.remove(ByteOffset(0), ByteLength(1), SuppressHistory::No);
    assert_eq!(buffer.text(), "cdef");

    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "bcdef");
    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "abcdef");
}

#[test]
fn test_undo_round_trip_preserves_meta() {
    let mut buffer = buffer_from("one\ntwo\nthree");
    let len_before = buffer.length();
    let lf_before = buffer.line_feed_count();

    buffer.insert(ByteOffset(3), "\ninserted", SuppressHistory::No);
    let len_after = buffer.length();
    let lf_after = buffer.line_feed_count();

    let undo = buffer.try_undo(ByteOffset(42));
    assert!(undo.success);
    assert_eq!(undo.op_offset, ByteOffset(3));
    assert_eq!(buffer.length(), len_before);
    assert_eq!(buffer.line_feed_count(), lf_before);

    let redo = buffer.try_redo(ByteOffset(7));
    assert!(redo.success);
    assert_eq!(redo.op_offset, ByteOffset(42));
    assert_eq!(buffer.length(), len_after);
    assert_eq!(buffer.line_feed_count(), lf_after);

    // The offset handed to try_redo comes back on the next undo.
    let undo = buffer.try_undo(ByteOffset(0));
    assert!(undo.success);
    assert_eq!(undo.op_offset, ByteOffset(7));
}
