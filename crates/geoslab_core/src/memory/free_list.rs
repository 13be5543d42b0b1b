//! # Range Free-List
//!
//! First-fit allocator for contiguous ranges of a fixed linear index space.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{AllocError, AllocResult};

/// Source of per-list identities, so a slot from one list is rejected by another.
static NEXT_LIST_ID: AtomicU32 = AtomicU32::new(1);

/// A live allocation: the half-open range `[start, start + count)`.
///
/// Returned by [`FreeList::alloc`] and consumed by [`FreeList::free`].
/// The slot remembers which list and which allocation it came from, so a
/// stale copy (double free) or a slot from another list is refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    start: u32,
    count: u32,
    list_id: u32,
    generation: u32,
}

impl Slot {
    /// First index of the range.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// Number of indices in the range.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// One past the last index of the range.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.start + self.count
    }
}

/// Snapshot of one entry of a [`FreeList`], used or free.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotSpan {
    /// First index of the range.
    pub start: u32,
    /// Number of indices in the range.
    pub count: u32,
    /// Whether the range is currently allocated.
    pub used: bool,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    start: u32,
    count: u32,
    used: bool,
    generation: u32,
}

/// Ordered partition of `[0, size)` into used and free slots.
///
/// Invariants, held after every call:
/// - entries are sorted by `start`, with no gaps and no overlaps
/// - the counts sum to `size`
/// - no two neighbouring entries are both free
///
/// # Thread Safety
///
/// This list is NOT thread-safe. It is meant to be owned by a single
/// allocator driven from the frame loop.
///
/// # Example
///
/// ```rust
/// use geoslab_core::FreeList;
///
/// let mut list = FreeList::new(100)?;
/// let a = list.alloc(30)?;
/// let b = list.alloc(70)?;
/// assert_eq!(list.free_space(), 0);
/// list.free(a)?;
/// list.free(b)?;
/// assert_eq!(list.len(), 1);
/// # Ok::<(), geoslab_core::AllocError>(())
/// ```
#[derive(Debug)]
pub struct FreeList {
    entries: Vec<Entry>,
    size: u32,
    used: u32,
    list_id: u32,
    next_generation: u32,
}

impl FreeList {
    /// Creates a list covering `[0, size)` as a single free slot.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidArgument`] if `size` is zero.
    pub fn new(size: u32) -> AllocResult<Self> {
        if size == 0 {
            return Err(AllocError::InvalidArgument("free list size must be non-zero"));
        }

        Ok(Self {
            entries: vec![Entry {
                start: 0,
                count: size,
                used: false,
                generation: 0,
            }],
            size,
            used: 0,
            list_id: NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed),
            next_generation: 0,
        })
    }

    /// Total size of the index space.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Number of indices currently allocated.
    #[inline]
    #[must_use]
    pub const fn used_space(&self) -> u32 {
        self.used
    }

    /// Number of indices currently free.
    #[inline]
    #[must_use]
    pub const fn free_space(&self) -> u32 {
        self.size - self.used
    }

    /// Number of entries (used and free) in the list.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a list covers a non-empty space.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size of the largest free slot, 0 when full.
    #[must_use]
    pub fn largest_free(&self) -> u32 {
        self.entries
            .iter()
            .filter(|entry| !entry.used)
            .map(|entry| entry.count)
            .max()
            .unwrap_or(0)
    }

    /// Iterates over all entries in ascending `start` order.
    pub fn slots(&self) -> impl Iterator<Item = SlotSpan> + '_ {
        self.entries.iter().map(|entry| SlotSpan {
            start: entry.start,
            count: entry.count,
            used: entry.used,
        })
    }

    /// Returns true if `slot` is a live allocation of this list.
    #[must_use]
    pub fn is_live(&self, slot: Slot) -> bool {
        self.find(slot).is_some()
    }

    /// Allocates `size` contiguous indices from the first free slot that fits.
    ///
    /// An exact fit takes the whole slot; a larger slot is split into a used
    /// prefix and a free suffix.
    ///
    /// # Errors
    ///
    /// - [`AllocError::InvalidArgument`] if `size` is zero
    /// - [`AllocError::OutOfMemory`] if no free slot is large enough; the list
    ///   is left untouched
    pub fn alloc(&mut self, size: u32) -> AllocResult<Slot> {
        if size == 0 {
            return Err(AllocError::InvalidArgument("allocation size must be non-zero"));
        }

        let Some(index) = self
            .entries
            .iter()
            .position(|entry| !entry.used && entry.count >= size)
        else {
            let largest_free = self.largest_free();
            tracing::warn!(requested = size, largest_free, "free list exhausted");
            return Err(AllocError::OutOfMemory {
                requested: size,
                largest_free,
            });
        };

        // Generation 0 is reserved for free entries.
        self.next_generation = self.next_generation.wrapping_add(1).max(1);
        let generation = self.next_generation;

        let entry = &mut self.entries[index];
        let start = entry.start;
        let remainder = entry.count - size;
        entry.count = size;
        entry.used = true;
        entry.generation = generation;

        if remainder > 0 {
            self.entries.insert(
                index + 1,
                Entry {
                    start: start + size,
                    count: remainder,
                    used: false,
                    generation: 0,
                },
            );
        }

        self.used += size;

        Ok(Slot {
            start,
            count: size,
            list_id: self.list_id,
            generation,
        })
    }

    /// Releases `slot` and merges it with free neighbours on either side.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidOperation`] if `slot` is not a live
    /// allocation of this list.
    pub fn free(&mut self, slot: Slot) -> AllocResult<()> {
        let mut index = self
            .find(slot)
            .ok_or(AllocError::InvalidOperation { start: slot.start })?;

        let entry = &mut self.entries[index];
        entry.used = false;
        entry.generation = 0;
        self.used -= slot.count;

        if index + 1 < self.entries.len() && !self.entries[index + 1].used {
            let next = self.entries.remove(index + 1);
            self.entries[index].count += next.count;
        }

        if index > 0 && !self.entries[index - 1].used {
            let current = self.entries.remove(index);
            index -= 1;
            self.entries[index].count += current.count;
        }

        Ok(())
    }

    fn find(&self, slot: Slot) -> Option<usize> {
        if slot.list_id != self.list_id {
            return None;
        }

        let index = self
            .entries
            .binary_search_by_key(&slot.start, |entry| entry.start)
            .ok()?;
        let entry = &self.entries[index];

        (entry.used && entry.count == slot.count && entry.generation == slot.generation)
            .then_some(index)
    }
}
