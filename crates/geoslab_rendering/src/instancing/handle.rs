//! Draw-call handles.

use geoslab_core::Slot;

use super::allocator::InstancedAllocator;
use crate::attributes::Element;
use crate::culling::BoundingVolume;
use crate::error::RenderResult;

/// Ownership of one draw-call slot.
///
/// Not `Clone`: [`InstancedAllocator::free_draw_call`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct DrawCallHandle {
    pub(super) geometry: u32,
    pub(super) slot: Slot,
    pub(super) owner: u32,
}

impl DrawCallHandle {
    /// Index of the base geometry this draw call renders.
    #[must_use]
    pub const fn geometry_index(&self) -> u32 {
        self.geometry
    }

    /// Slot index, which is also the instance block index.
    #[must_use]
    pub const fn slot_index(&self) -> u32 {
        self.slot.start()
    }
}

/// Mutable view of one live draw call.
///
/// Obtained from [`InstancedAllocator::draw_call`]; every call is forwarded
/// to the allocator for this handle's slot.
#[derive(Debug)]
pub struct DrawCallMut<'a> {
    allocator: &'a mut InstancedAllocator,
    slot: usize,
}

impl<'a> DrawCallMut<'a> {
    pub(super) fn new(allocator: &'a mut InstancedAllocator, slot: usize) -> Self {
        Self { allocator, slot }
    }

    /// Number of active instances.
    #[must_use]
    pub fn instance_count(&self) -> u32 {
        self.allocator.instance_count_of(self.slot)
    }

    /// Sets the number of active instances.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidArgument`](crate::RenderError::InvalidArgument)
    /// above `max_instances_per_draw_call`.
    pub fn set_instance_count(&mut self, count: u32) -> RenderResult<()> {
        self.allocator.set_instance_count_of(self.slot, count)
    }

    /// Activates one more instance and returns its index.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` when the instance block is full.
    pub fn increment(&mut self) -> RenderResult<u32> {
        self.allocator.increment_of(self.slot)
    }

    /// Deactivates the last instance and returns the new count.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidOperation`](crate::RenderError::InvalidOperation)
    /// when there is no active instance.
    pub fn decrement(&mut self) -> RenderResult<u32> {
        self.allocator.decrement_of(self.slot)
    }

    /// Component offset of this draw call's block in instance attribute `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownAttribute`](crate::RenderError::UnknownAttribute).
    pub fn texture_offset(&self, name: &str) -> RenderResult<usize> {
        self.allocator.texture_offset_of(self.slot, name)
    }

    /// Writes the values of attribute `name` for `instance`.
    ///
    /// # Errors
    ///
    /// Fails for an unknown attribute, a type mismatch, an instance outside the
    /// block or more values than one item holds.
    pub fn write_instance<T: Element>(
        &mut self,
        instance: u32,
        name: &str,
        values: &[T],
    ) -> RenderResult<()> {
        self.allocator
            .write_instance_of(self.slot, instance, name, values)
    }

    /// Sets the bounding volume of `instance`, converted to the instance kind.
    ///
    /// # Errors
    ///
    /// Fails for an instance outside the block.
    pub fn set_instance_bounds(&mut self, instance: u32, volume: BoundingVolume) -> RenderResult<()> {
        self.allocator
            .set_instance_bounds_of(self.slot, instance, volume)
    }

    /// Bounding volume of `instance`; rows move when the frame compacts them.
    ///
    /// # Errors
    ///
    /// Fails for an instance outside the block.
    pub fn instance_bounds(&self, instance: u32) -> RenderResult<BoundingVolume> {
        self.allocator.instance_bounds_of(self.slot, instance)
    }

    /// Sets the draw-level bounding volume, converted to the draw kind.
    pub fn set_bounds(&mut self, volume: BoundingVolume) {
        self.allocator.set_bounds_of(self.slot, volume);
    }
}
