//! Suppressed history, manual commits, and root-handle branching.

use text_buffer::{BufferBuilder, ByteLength, ByteOffset, SuppressHistory};

fn buffer_from(text: &str) -> text_buffer::TextBuffer {
    let mut builder = BufferBuilder::new();
    builder.accept(text);
    builder.create()
}

#[test]
fn test_suppressed_edits_with_manual_commits() {
    let mut buffer = buffer_from("Hello, World!");

    buffer.insert(ByteOffset(0), "a", SuppressHistory::Yes);
    assert_eq!(buffer.text(), "aHello, World!");
    assert!(!buffer.try_undo(ByteOffset(0)).success);

    buffer.remove(ByteOffset(0), ByteLength(1), SuppressHistory::Yes);
    assert_eq!(buffer.text(), "Hello, World!");
    assert!(!buffer.try_undo(ByteOffset(0)).success);

    // Commit, then a batch of suppressed typing becomes one undo block.
    buffer.commit_head(ByteOffset(0));
    buffer.insert(ByteOffset(0), "a", SuppressHistory::Yes);
    buffer.insert(ByteOffset(1), "b", SuppressHistory::Yes);
    buffer.insert(ByteOffset(2), "c", SuppressHistory::Yes);
    assert_eq!(buffer.text(), "abcHello, World!");

    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "Hello, World!");

    // Same for a batch of suppressed removals.
    buffer.commit_head(ByteOffset(0));
    buffer.remove(ByteOffset(0), ByteLength(7), SuppressHistory::Yes);
    assert_eq!(buffer.text(), "World!");
    buffer.remove(ByteOffset(5), ByteLength(1), SuppressHistory::Yes);
    assert_eq!(buffer.text(), "World");

    assert!(buffer.try_undo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "Hello, World!");

    assert!(buffer.try_redo(ByteOffset(0)).success);
    assert_eq!(buffer.text(), "World");
}

#[test]
fn test_branching_with_head_and_snap_to() {
    let mut buffer = buffer_from("Hello, World!");

    let initial_commit = buffer.head();

    buffer.insert(ByteOffset(0), "a", SuppressHistory::Yes);
    assert_eq!(buffer.text(), "aHello, World!");
    assert!(!buffer.try_undo(ByteOffset(0)).success);

    let commit = buffer.head();
    buffer.snap_to(&initial_commit);
    assert_eq!(buffer.text(), "Hello, World!");

    buffer.snap_to(&commit);
    assert_eq!(buffer.text(), "aHello, World!");

    buffer.remove(ByteOffset(0), ByteLength(8), SuppressHistory::Yes);
    assert_eq!(buffer.text(), "World!");

    buffer.snap_to(&commit);
    assert_eq!(buffer.text(), "aHello, World!");

    buffer.snap_to(&initial_commit);
    assert_eq!(buffer.text(), "Hello, World!");

    // A divergent branch from the initial commit.
    buffer.insert(ByteOffset(13), " My name is piece-tree.", SuppressHistory::Yes);
    assert_eq!(buffer.text(), "Hello, World! My name is piece-tree.");
    let branch = buffer.head();

    buffer.snap_to(&commit);
    assert_eq!(buffer.text(), "aHello, World!");

    buffer.snap_to(&branch);
    assert_eq!(buffer.text(), "Hello, World! My name is piece-tree.");
}

#[test]
fn test_snap_to_recomputes_meta() {
    let mut buffer = buffer_from("a\nb\nc");
    let h0 = buffer.head();
    buffer.insert(ByteOffset(5), "\nd\ne", SuppressHistory::Yes);
    assert_eq!(buffer.line_count(), 5);
    assert_eq!(buffer.length(), ByteLength(9));

    buffer.snap_to(&h0);
    assert_eq!(buffer.line_count(), 3);
    assert_eq!(buffer.length(), ByteLength(5));
    assert_eq!(buffer.line_feed_count().0, 2);
}

#[test]
fn test_snapshots_pin_history_roots() {
    let mut buffer = buffer_from("versioned");
    buffer.insert(ByteOffset(9), " one", SuppressHistory::No);
    let snap_one = buffer.owning_snap();

    buffer.insert(ByteOffset(13), " two", SuppressHistory::No);
    let snap_two = buffer.owning_snap();

    buffer.remove(ByteOffset(0), ByteLength(9), SuppressHistory::No);
    assert_eq!(buffer.text(), " one two");

    // Old snapshots keep exposing the content they froze.
    assert_eq!(snap_one.text(), "versioned one");
    assert_eq!(snap_two.text(), "versioned one two");

    // Undo all the way back; snapshots are unaffected.
    while buffer.try_undo(ByteOffset(0)).success {}
    assert_eq!(buffer.text(), "versioned");
    assert_eq!(snap_two.text(), "versioned one two");
}
