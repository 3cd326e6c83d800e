// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::{
    collections::VecDeque,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError},
};
use super::{record::PacketRecord, metrics::MetricsSnapshot};

pub const DEFAULT_RECORD_CAPACITY: usize = 5000;
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 100;

/// Bounded queue, pushing into a full buffer evicts the oldest item
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            capacity,
            items: VecDeque::with_capacity(capacity.min(DEFAULT_RECORD_CAPACITY)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns how many items were evicted.
    pub fn push(&mut self, item: T) -> usize {
        if self.capacity == 0 {
            return 1;
        }
        let mut evicted = 0;
        while self.items.len() >= self.capacity {
            self.items.pop_front();
            evicted += 1;
        }
        self.items.push_back(item);
        evicted
    }

    pub fn extend<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        items.into_iter().map(|item| self.push(item)).sum()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// The last `n` items, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }
}

struct Records {
    buffer: RingBuffer<PacketRecord>,
    // records appended after the last committed batch
    unbatched: usize,
}

/// Rolling buffers shared by the capture loop (the only writer) and readers.
pub struct RetainedStore {
    records: RwLock<Records>,
    snapshots: RwLock<RingBuffer<MetricsSnapshot>>,
}

impl Default for RetainedStore {
    fn default() -> Self {
        RetainedStore::new(DEFAULT_RECORD_CAPACITY, DEFAULT_SNAPSHOT_CAPACITY)
    }
}

impl RetainedStore {
    pub fn new(record_capacity: usize, snapshot_capacity: usize) -> Self {
        RetainedStore {
            records: RwLock::new(Records {
                buffer: RingBuffer::new(record_capacity),
                unbatched: 0,
            }),
            snapshots: RwLock::new(RingBuffer::new(snapshot_capacity)),
        }
    }

    fn read_records(&self) -> RwLockReadGuard<'_, Records> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, Records> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_snapshots(&self) -> RwLockReadGuard<'_, RingBuffer<MetricsSnapshot>> {
        self.snapshots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_snapshots(&self) -> RwLockWriteGuard<'_, RingBuffer<MetricsSnapshot>> {
        self.snapshots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records that belong to no snapshot, the tail of a finished capture.
    pub fn append_records<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = PacketRecord>,
    {
        let mut guard = self.write_records();
        let before = guard.buffer.len();
        let evicted = guard.buffer.extend(records);
        let appended = guard.buffer.len() + evicted - before;
        guard.unbatched = (guard.unbatched + appended).min(guard.buffer.len());
        evicted
    }

    pub fn append_snapshot(&self, snapshot: MetricsSnapshot) -> usize {
        self.write_snapshots().push(snapshot)
    }

    /// The snapshot is pushed while the record guard is still held, so
    /// `latest_batch` never pairs a snapshot with the records of another batch.
    pub fn commit_batch(&self, batch: Vec<PacketRecord>, snapshot: MetricsSnapshot) {
        let mut records = self.write_records();
        let evicted = records.buffer.extend(batch);
        records.unbatched = 0;
        self.append_snapshot(snapshot);
        drop(records);

        if evicted > 0 {
            tracing::debug!(evicted, "record buffer full, dropped oldest");
        }
    }

    /// Copy of the record buffer, oldest first.
    pub fn records(&self) -> Vec<PacketRecord> {
        self.read_records().buffer.iter().cloned().collect()
    }

    pub fn tail_records(&self, n: usize) -> Vec<PacketRecord> {
        self.read_records().buffer.tail(n).cloned().collect()
    }

    /// The last `n` records of the most recently committed batch.
    pub fn batch_records(&self, n: usize) -> Vec<PacketRecord> {
        let guard = self.read_records();
        let end = guard.buffer.len() - guard.unbatched;
        guard
            .buffer
            .iter()
            .take(end)
            .skip(end.saturating_sub(n))
            .cloned()
            .collect()
    }

    /// The latest snapshot together with the records it was computed from.
    pub fn latest_batch(&self) -> Option<(MetricsSnapshot, Vec<PacketRecord>)> {
        // same lock order as `commit_batch`, records before snapshots
        let records = self.read_records();
        let snapshot = self.read_snapshots().back().cloned()?;
        let end = records.buffer.len() - records.unbatched;
        let batch = records
            .buffer
            .iter()
            .take(end)
            .skip(end.saturating_sub(snapshot.packet_count))
            .cloned()
            .collect();
        Some((snapshot, batch))
    }

    pub fn record_count(&self) -> usize {
        self.read_records().buffer.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.read_snapshots().len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.read_records().buffer.iter().map(|r| r.frame_len).sum()
    }

    pub fn latest_snapshot(&self) -> Option<MetricsSnapshot> {
        self.read_snapshots().back().cloned()
    }

    /// At most `n` snapshots, oldest first.
    pub fn recent_snapshots(&self, n: usize) -> Vec<MetricsSnapshot> {
        self.read_snapshots().tail(n).cloned().collect()
    }
}
