//! Dense per-draw metadata.

use std::collections::HashMap;

use crate::culling::{BoundingVolume, PeekMask};

/// Snapshot of one live draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    /// Byte offset of the draw's first index.
    pub draw_start: u32,
    /// Number of indices.
    pub draw_count: u32,
    /// Bounding volume in allocator space, already in the configured kind.
    pub bounds: BoundingVolume,
    /// Minimum corner of the occlusion chunk.
    pub occlusion_min: [f32; 3],
    /// Maximum corner of the occlusion chunk.
    pub occlusion_max: [f32; 3],
    /// Face-pair visibility of the occlusion chunk.
    pub peek: PeekMask,
}

/// Struct-of-arrays storage indexed by draw ordinal.
///
/// Ordinals are not stable: removing one moves the last record into it.
/// `by_start` maps each draw start back to its current ordinal.
#[derive(Debug, Clone, Default)]
pub(crate) struct DrawRecords {
    starts: Vec<u32>,
    counts: Vec<u32>,
    bounds: Vec<BoundingVolume>,
    occlusion_min: Vec<[f32; 3]>,
    occlusion_max: Vec<[f32; 3]>,
    peeks: Vec<PeekMask>,
    by_start: HashMap<u32, u32>,
}

impl DrawRecords {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            starts: Vec::with_capacity(capacity),
            counts: Vec::with_capacity(capacity),
            bounds: Vec::with_capacity(capacity),
            occlusion_min: Vec::with_capacity(capacity),
            occlusion_max: Vec::with_capacity(capacity),
            peeks: Vec::with_capacity(capacity),
            by_start: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.starts.len()
    }

    /// Appends a record at the next ordinal and returns that ordinal.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn push(&mut self, record: DrawRecord) -> u32 {
        let ordinal = self.starts.len() as u32;
        self.starts.push(record.draw_start);
        self.counts.push(record.draw_count);
        self.bounds.push(record.bounds);
        self.occlusion_min.push(record.occlusion_min);
        self.occlusion_max.push(record.occlusion_max);
        self.peeks.push(record.peek);
        self.by_start.insert(record.draw_start, ordinal);
        ordinal
    }

    pub(crate) fn get(&self, ordinal: usize) -> Option<DrawRecord> {
        (ordinal < self.len()).then(|| DrawRecord {
            draw_start: self.starts[ordinal],
            draw_count: self.counts[ordinal],
            bounds: self.bounds[ordinal],
            occlusion_min: self.occlusion_min[ordinal],
            occlusion_max: self.occlusion_max[ordinal],
            peek: self.peeks[ordinal],
        })
    }

    pub(crate) fn ordinal_of(&self, draw_start: u32) -> Option<u32> {
        self.by_start.get(&draw_start).copied()
    }

    /// Removes `ordinal`, moving the last record into its place.
    pub(crate) fn swap_remove(&mut self, ordinal: u32) {
        let index = ordinal as usize;
        let removed = self.starts.swap_remove(index);
        self.counts.swap_remove(index);
        self.bounds.swap_remove(index);
        self.occlusion_min.swap_remove(index);
        self.occlusion_max.swap_remove(index);
        self.peeks.swap_remove(index);

        self.by_start.remove(&removed);
        if let Some(&moved) = self.starts.get(index) {
            self.by_start.insert(moved, ordinal);
        }
    }

    pub(crate) fn starts(&self) -> &[u32] {
        &self.starts
    }

    pub(crate) fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub(crate) fn bounds(&self) -> &[BoundingVolume] {
        &self.bounds
    }

    pub(crate) fn peeks(&self) -> &[PeekMask] {
        &self.peeks
    }
}
