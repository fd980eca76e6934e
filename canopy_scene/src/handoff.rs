// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Passing snapshots from the update thread to the draw thread.
//!
//! A triple buffer: the writer always owns one slot, the reader another, and the third
//! sits in the middle. Publishing swaps the writer's slot into the middle and marks it
//! fresh; the reader swaps a fresh middle slot for its own. The slot index the writer
//! fills doubles as the [`TreeIndex`] its snapshots are generated into, so the reader
//! never sees a snapshot being rewritten.
//!
//! Each slot sits behind a [`Mutex`] so it can be written through a shared [`Arc`].
//! Only the side owning a slot ever locks it, and ownership only moves through the
//! atomic swap of the middle index, so the locks are never contended and neither side
//! waits for the other.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::draw_node::{DRAW_NODE_SLOTS, DrawNode, TreeIndex};

const INDEX_MASK: u8 = 0b011;
const FRESH: u8 = 0b100;

#[derive(Debug)]
struct Inner {
    slots: [Mutex<Option<Arc<DrawNode>>>; DRAW_NODE_SLOTS],
    /// Index of the middle slot, plus [`FRESH`] when it holds an unread snapshot.
    middle: AtomicU8,
}

/// Constructor for a connected [`SnapshotWriter`] and [`SnapshotReader`].
#[derive(Debug)]
pub struct TripleBuffer;

impl TripleBuffer {
    /// A new, empty buffer.
    #[expect(
        clippy::new_ret_no_self,
        reason = "the buffer only exists as its two ends"
    )]
    pub fn new() -> (SnapshotWriter, SnapshotReader) {
        let inner = Arc::new(Inner {
            slots: core::array::from_fn(|_| Mutex::new(None)),
            middle: AtomicU8::new(1),
        });
        (
            SnapshotWriter {
                inner: Arc::clone(&inner),
                index: 0,
            },
            SnapshotReader { inner, index: 2 },
        )
    }
}

/// The update thread's end of a [`TripleBuffer`].
#[derive(Debug)]
pub struct SnapshotWriter {
    inner: Arc<Inner>,
    index: u8,
}

impl SnapshotWriter {
    /// The slot to generate the next snapshot into.
    pub fn index(&self) -> TreeIndex {
        TreeIndex::ALL[usize::from(self.index)]
    }

    /// Hand a snapshot to the reader, replacing any it has not picked up yet.
    pub fn publish(&mut self, snapshot: Option<Arc<DrawNode>>) {
        *self.inner.slots[usize::from(self.index)].lock() = snapshot;
        let previous = self.inner.middle.swap(self.index | FRESH, Ordering::AcqRel);
        self.index = previous & INDEX_MASK;
    }
}

/// The draw thread's end of a [`TripleBuffer`].
#[derive(Debug)]
pub struct SnapshotReader {
    inner: Arc<Inner>,
    index: u8,
}

impl SnapshotReader {
    /// The most recently published snapshot.
    ///
    /// Returns the same snapshot again if nothing new was published.
    pub fn latest(&mut self) -> Option<Arc<DrawNode>> {
        if self.inner.middle.load(Ordering::Acquire) & FRESH != 0 {
            let previous = self.inner.middle.swap(self.index, Ordering::AcqRel);
            self.index = previous & INDEX_MASK;
        }
        self.inner.slots[usize::from(self.index)].lock().clone()
    }

    /// Whether a snapshot was published since the last [`SnapshotReader::latest`].
    pub fn has_fresh(&self) -> bool {
        self.inner.middle.load(Ordering::Acquire) & FRESH != 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use kurbo::Size;

    use crate::renderer::RecordingRenderer;
    use crate::{NodeDesc, Tree, draw_tree};

    use super::*;

    #[test]
    fn reader_sees_the_latest_publish() {
        let (mut writer, mut reader) = TripleBuffer::new();
        assert!(reader.latest().is_none(), "nothing published yet");

        let mut tree = Tree::default();
        let root = tree.root();
        let leaf = tree
            .create(NodeDesc::leaf().with_size(Size::new(5.0, 5.0)))
            .unwrap();
        tree.add_child(root, leaf).unwrap();

        tree.update();
        let first = tree.generate_draw_nodes(writer.index());
        writer.publish(first.clone());
        tree.update();
        tree.set_width(leaf, 6.0).unwrap();
        let second = tree.generate_draw_nodes(writer.index());
        writer.publish(second.clone());

        assert!(reader.has_fresh(), "a snapshot is waiting");
        let seen = reader.latest().unwrap();
        assert!(
            Arc::ptr_eq(&seen, second.as_ref().unwrap()),
            "older publishes are skipped"
        );
        assert!(!reader.has_fresh(), "the fresh mark is consumed");
        let again = reader.latest().unwrap();
        assert!(Arc::ptr_eq(&seen, &again), "no new publish, same snapshot");
    }

    #[test]
    fn writer_and_reader_never_share_a_slot() {
        let (mut writer, mut reader) = TripleBuffer::new();
        for _ in 0..10 {
            assert_ne!(writer.index, reader.index, "before publish");
            writer.publish(None);
            assert_ne!(writer.index, reader.index, "after publish");
            reader.latest();
            assert_ne!(writer.index, reader.index, "after read");
        }
    }

    #[test]
    fn slot_locks_are_uncontended_across_threads() {
        let (mut writer, mut reader) = TripleBuffer::new();
        let drawer = thread::spawn(move || {
            for _ in 0..1000 {
                reader.latest();
                let own = &reader.inner.slots[usize::from(reader.index)];
                assert!(own.try_lock().is_some(), "the reader's slot is never locked by the writer");
            }
        });
        for _ in 0..1000 {
            let own = &writer.inner.slots[usize::from(writer.index)];
            assert!(own.try_lock().is_some(), "the writer's slot is never locked by the reader");
            writer.publish(None);
        }
        drawer.join().unwrap();
    }

    #[test]
    fn snapshots_cross_threads() {
        let (mut writer, mut reader) = TripleBuffer::new();
        let updater = thread::spawn(move || {
            let mut tree = Tree::default();
            let root = tree.root();
            let leaf = tree
                .create(NodeDesc::leaf().with_size(Size::new(10.0, 10.0)))
                .unwrap();
            tree.add_child(root, leaf).unwrap();
            for i in 0..50 {
                tree.update();
                tree.set_width(leaf, 10.0 + f64::from(i)).unwrap();
                let snapshot = tree.generate_draw_nodes(writer.index());
                writer.publish(snapshot);
            }
        });
        updater.join().unwrap();

        let snapshot = reader.latest().expect("published");
        let mut renderer = RecordingRenderer::new();
        draw_tree(&snapshot, &mut renderer);
        assert_eq!(
            snapshot.children()[0].draw_size,
            Size::new(59.0, 10.0),
            "the final frame reached the reader"
        );
        assert_eq!(renderer.draws().count(), 1, "one leaf");
    }
}
