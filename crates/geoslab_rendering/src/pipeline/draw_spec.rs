//! Draw spec buffers.
//!
//! Parallel `u32` arrays, reused frame to frame so the cull pass does not
//! allocate once capacity has been reached.

/// Visible draws of a geometry allocator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawSpec {
    starts: Vec<u32>,
    counts: Vec<u32>,
}

impl DrawSpec {
    /// Creates an empty spec with room for `capacity` draws.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            starts: Vec::with_capacity(capacity),
            counts: Vec::with_capacity(capacity),
        }
    }

    /// Byte offsets of the first index of each draw.
    #[must_use]
    pub fn starts(&self) -> &[u32] {
        &self.starts
    }

    /// Index counts of each draw.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Number of draws.
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// True when nothing is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// `(start, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.starts.iter().copied().zip(self.counts.iter().copied())
    }

    /// Starts as bytes for upload.
    #[must_use]
    pub fn starts_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.starts)
    }

    /// Counts as bytes for upload.
    #[must_use]
    pub fn counts_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.counts)
    }

    pub(crate) fn clear(&mut self) {
        self.starts.clear();
        self.counts.clear();
    }

    pub(crate) fn push(&mut self, start: u32, count: u32) {
        self.starts.push(start);
        self.counts.push(count);
    }
}

/// Per-slot draws of an instanced allocator.
///
/// One entry per draw-call slot, used or not; hidden and unused slots carry
/// zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstancedDrawSpec {
    starts: Vec<u32>,
    counts: Vec<u32>,
    instance_counts: Vec<u32>,
}

impl InstancedDrawSpec {
    /// Creates an empty spec with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            starts: Vec::with_capacity(capacity),
            counts: Vec::with_capacity(capacity),
            instance_counts: Vec::with_capacity(capacity),
        }
    }

    /// Byte offsets of the first index of each slot's geometry.
    #[must_use]
    pub fn starts(&self) -> &[u32] {
        &self.starts
    }

    /// Index counts per slot.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Visible instances per slot.
    #[must_use]
    pub fn instance_counts(&self) -> &[u32] {
        &self.instance_counts
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// True when the allocator has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Sum of visible instances over all slots.
    #[must_use]
    pub fn total_instances(&self) -> u64 {
        self.instance_counts.iter().map(|&n| u64::from(n)).sum()
    }

    /// Starts as bytes for upload.
    #[must_use]
    pub fn starts_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.starts)
    }

    /// Counts as bytes for upload.
    #[must_use]
    pub fn counts_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.counts)
    }

    /// Instance counts as bytes for upload.
    #[must_use]
    pub fn instance_counts_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instance_counts)
    }

    pub(crate) fn clear(&mut self) {
        self.starts.clear();
        self.counts.clear();
        self.instance_counts.clear();
    }

    pub(crate) fn push(&mut self, start: u32, count: u32, instances: u32) {
        self.starts.push(start);
        self.counts.push(count);
        self.instance_counts.push(instances);
    }

    pub(crate) fn push_hidden(&mut self) {
        self.push(0, 0, 0);
    }
}
