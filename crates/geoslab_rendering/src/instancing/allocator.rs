//! The instanced draw-call allocator.

use geoslab_core::{AllocError, FreeList};

use super::handle::{DrawCallHandle, DrawCallMut};
use super::merge::{self, BaseGeometry, GeometryRange};
use crate::attributes::{AttributeSet, AttributeStore, Element};
use crate::camera::Camera;
use crate::config::{self, BoundingKind, InstancedAllocatorConfig};
use crate::culling::{BoundingVolume, FrustumCuller};
use crate::error::{RenderError, RenderResult};
use crate::math::{self, Mat4};
use crate::pipeline::{CullStats, InstancedDrawSpec};

/// Draws a fixed set of base geometries many times with per-instance data.
///
/// Slot `s` owns rows `s × max_instances_per_draw_call ..` of every instance
/// attribute texture and of the instance bounds.
#[derive(Debug)]
pub struct InstancedAllocator {
    id: u32,
    config: InstancedAllocatorConfig,
    vertices: AttributeSet,
    indices: AttributeStore,
    geometries: Vec<GeometryRange>,
    instances: AttributeSet,
    slots: FreeList,
    slot_geometry: Vec<Option<u32>>,
    slot_bounds: Vec<BoundingVolume>,
    instance_counts: Vec<u32>,
    instance_bounds: Vec<BoundingVolume>,
    world: Mat4,
    culler: FrustumCuller,
    spec: InstancedDrawSpec,
    stats: CullStats,
}

impl InstancedAllocator {
    /// Merges `geometries` and reserves every instance texture up front.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidArgument`] without geometries or with a zero
    ///   capacity
    /// - [`RenderError::GeometryMismatch`] if a geometry does not match the
    ///   vertex attributes
    /// - [`RenderError::UnsupportedConfiguration`] if an instance attribute
    ///   does not fit in a texel or the row count overflows
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(config: InstancedAllocatorConfig, geometries: &[BaseGeometry]) -> RenderResult<Self> {
        if geometries.is_empty() {
            return Err(RenderError::InvalidArgument(
                "an instanced allocator needs at least one base geometry".to_owned(),
            ));
        }
        if config.max_instances_per_draw_call == 0 || config.max_draw_calls_per_geometry == 0 {
            return Err(RenderError::InvalidArgument(
                "instance and draw-call capacities must be non-zero".to_owned(),
            ));
        }

        let num_slots = u32::try_from(geometries.len() as u64 * u64::from(config.max_draw_calls_per_geometry))
            .map_err(|_| RenderError::UnsupportedConfiguration("too many draw-call slots".to_owned()))?;
        let rows = u32::try_from(u64::from(num_slots) * u64::from(config.max_instances_per_draw_call))
            .map_err(|_| RenderError::UnsupportedConfiguration("too many instance rows".to_owned()))?;

        let merged = merge::merge(&config::with_position(&config.vertex_attributes), geometries)?;
        let instances = AttributeSet::texel_arrays(&config.instance_attributes, rows)?;

        tracing::debug!(
            geometries = geometries.len(),
            slots = num_slots,
            rows,
            instance_attributes = instances.len(),
            "instanced allocator created"
        );

        let slots = num_slots as usize;
        Ok(Self {
            id: crate::next_owner_id(),
            vertices: merged.vertices,
            indices: merged.indices,
            geometries: merged.ranges,
            instances,
            slots: FreeList::new(num_slots)?,
            slot_geometry: vec![None; slots],
            slot_bounds: vec![BoundingVolume::None; slots],
            instance_counts: vec![0; slots],
            instance_bounds: vec![BoundingVolume::None; rows as usize],
            world: math::IDENTITY,
            culler: FrustumCuller::new(),
            spec: InstancedDrawSpec::with_capacity(slots),
            stats: CullStats::default(),
            config,
        })
    }

    /// Takes a free slot and binds it to base geometry `geometry_index`.
    ///
    /// The slot starts with zero instances.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidArgument`] for an unknown geometry
    /// - [`RenderError::Alloc`] with `OutOfMemory` when every slot is taken
    #[allow(clippy::cast_possible_truncation)]
    pub fn alloc_draw_call(
        &mut self,
        geometry_index: u32,
        bounding: BoundingVolume,
    ) -> RenderResult<DrawCallHandle> {
        if geometry_index as usize >= self.geometries.len() {
            return Err(RenderError::InvalidArgument(format!(
                "geometry {geometry_index} is not registered ({} geometries)",
                self.geometries.len()
            )));
        }

        let slot = match self.slots.alloc(1) {
            Ok(slot) => slot,
            Err(err) => {
                tracing::warn!(slots = self.slots.size(), "draw-call slots exhausted");
                return Err(err.into());
            }
        };
        let s = slot.start() as usize;
        self.slot_geometry[s] = Some(geometry_index);
        self.slot_bounds[s] = bounding.to_kind(self.config.bounding);
        self.instance_counts[s] = 0;

        tracing::debug!(slot = s, geometry_index, "draw call allocated");
        Ok(DrawCallHandle {
            geometry: geometry_index,
            slot,
            owner: self.id,
        })
    }

    /// Releases a draw call and clears its slot and instance block.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidOperation`] for a handle of another
    /// allocator or one that is no longer live.
    pub fn free_draw_call(&mut self, handle: DrawCallHandle) -> RenderResult<()> {
        let s = self.live_slot(&handle)?;
        self.slots.free(handle.slot)?;

        self.slot_geometry[s] = None;
        self.slot_bounds[s] = BoundingVolume::None;
        self.instance_counts[s] = 0;

        let max = self.max_instances();
        let rows = s * max..(s + 1) * max;
        self.instance_bounds[rows.clone()].fill(BoundingVolume::None);
        for store in self.instances.iter_mut() {
            store.zero_items(rows.start, max);
        }

        tracing::debug!(slot = s, "draw call freed");
        Ok(())
    }

    /// Mutable view of a live draw call.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidOperation`] for a handle of another
    /// allocator or one that is no longer live.
    pub fn draw_call(&mut self, handle: &DrawCallHandle) -> RenderResult<DrawCallMut<'_>> {
        let s = self.live_slot(handle)?;
        Ok(DrawCallMut::new(self, s))
    }

    fn live_slot(&self, handle: &DrawCallHandle) -> RenderResult<usize> {
        if handle.owner != self.id {
            return Err(RenderError::InvalidOperation(
                "draw-call handle belongs to another allocator".to_owned(),
            ));
        }
        if !self.slots.is_live(handle.slot) {
            return Err(RenderError::InvalidOperation(format!(
                "draw call in slot {} is not live",
                handle.slot.start()
            )));
        }
        Ok(handle.slot.start() as usize)
    }

    fn max_instances(&self) -> usize {
        self.config.max_instances_per_draw_call as usize
    }

    pub(super) fn instance_count_of(&self, slot: usize) -> u32 {
        self.instance_counts[slot]
    }

    pub(super) fn set_instance_count_of(&mut self, slot: usize, count: u32) -> RenderResult<()> {
        if count > self.config.max_instances_per_draw_call {
            return Err(RenderError::InvalidArgument(format!(
                "instance count {count} exceeds {}",
                self.config.max_instances_per_draw_call
            )));
        }
        self.instance_counts[slot] = count;
        Ok(())
    }

    pub(super) fn increment_of(&mut self, slot: usize) -> RenderResult<u32> {
        let count = self.instance_counts[slot];
        if count >= self.config.max_instances_per_draw_call {
            tracing::warn!(slot, count, "instance block full");
            return Err(AllocError::OutOfMemory {
                requested: count + 1,
                largest_free: self.config.max_instances_per_draw_call,
            }
            .into());
        }
        self.instance_counts[slot] = count + 1;
        Ok(count)
    }

    pub(super) fn decrement_of(&mut self, slot: usize) -> RenderResult<u32> {
        let count = self.instance_counts[slot];
        if count == 0 {
            return Err(RenderError::InvalidOperation(format!(
                "draw call in slot {slot} has no instance to remove"
            )));
        }
        self.instance_counts[slot] = count - 1;
        Ok(count - 1)
    }

    pub(super) fn texture_offset_of(&self, slot: usize, name: &str) -> RenderResult<usize> {
        let store = self.instances.get(name)?;
        Ok(slot * self.max_instances() * store.item_size())
    }

    fn check_instance(&self, instance: u32) -> RenderResult<()> {
        if instance < self.config.max_instances_per_draw_call {
            Ok(())
        } else {
            Err(RenderError::InvalidArgument(format!(
                "instance {instance} outside a block of {}",
                self.config.max_instances_per_draw_call
            )))
        }
    }

    pub(super) fn write_instance_of<T: Element>(
        &mut self,
        slot: usize,
        instance: u32,
        name: &str,
        values: &[T],
    ) -> RenderResult<()> {
        self.check_instance(instance)?;
        let row = slot * self.max_instances() + instance as usize;
        let store = self.instances.get_mut(name)?;
        if values.len() > store.item_size() {
            return Err(RenderError::InvalidArgument(format!(
                "{} components exceed the {} of attribute `{name}`",
                values.len(),
                store.item_size()
            )));
        }
        store.write(row * store.item_size(), values)
    }

    pub(super) fn set_instance_bounds_of(
        &mut self,
        slot: usize,
        instance: u32,
        volume: BoundingVolume,
    ) -> RenderResult<()> {
        self.check_instance(instance)?;
        let row = slot * self.max_instances() + instance as usize;
        self.instance_bounds[row] = volume.to_kind(self.config.instance_bounding);
        Ok(())
    }

    pub(super) fn instance_bounds_of(
        &self,
        slot: usize,
        instance: u32,
    ) -> RenderResult<BoundingVolume> {
        self.check_instance(instance)?;
        Ok(self.instance_bounds[slot * self.max_instances() + instance as usize])
    }

    pub(super) fn set_bounds_of(&mut self, slot: usize, volume: BoundingVolume) {
        self.slot_bounds[slot] = volume.to_kind(self.config.bounding);
    }

    /// Sets the allocator's world transform.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SingularTransform`] if `world` has no inverse.
    pub fn set_transform(&mut self, world: Mat4) -> RenderResult<()> {
        math::affine_inverse(&world).ok_or(RenderError::SingularTransform)?;
        self.world = world;
        Ok(())
    }

    /// Builds one draw entry per slot for `camera`.
    ///
    /// Free slots and slots whose bounds leave the frustum get zeros. In the
    /// others, culled instances are swapped behind the visible ones and the
    /// entry's instance count is the visible run. Stored instance counts are
    /// left alone, so culled instances come back once visible again.
    #[allow(clippy::cast_possible_truncation)]
    pub fn draw_spec<C: Camera + ?Sized>(&mut self, camera: &C) -> &InstancedDrawSpec {
        self.culler
            .update(&math::mul(&camera.view_projection(), &self.world));
        let draw_test = self.config.bounding != BoundingKind::None;
        let instance_test = self.config.instance_bounding != BoundingKind::None;

        let mut stats = CullStats::default();
        self.spec.clear();
        for slot in 0..self.slot_geometry.len() {
            let Some(geometry) = self.slot_geometry[slot] else {
                self.spec.push_hidden();
                continue;
            };
            stats.draws_tested += 1;

            if draw_test && !self.culler.test_volume(&self.slot_bounds[slot]) {
                stats.frustum_culled += 1;
                self.spec.push_hidden();
                continue;
            }

            let count = self.instance_counts[slot];
            let visible = if instance_test {
                self.compact_instances(slot, count as usize) as u32
            } else {
                count
            };
            stats.draws_visible += 1;
            stats.instances_tested += count;
            stats.instances_visible += visible;

            let range = self.geometries[geometry as usize];
            self.spec.push(range.draw_start(), range.index_count, visible);
        }

        self.stats = stats;
        tracing::trace!(
            tested = stats.draws_tested,
            visible = stats.draws_visible,
            frustum_culled = stats.frustum_culled,
            instances_tested = stats.instances_tested,
            instances_visible = stats.instances_visible,
            "instanced draw spec built"
        );
        &self.spec
    }

    /// Partitions the first `count` rows of `slot` into visible then culled.
    ///
    /// A failing row trades places with the last active row, which is then
    /// tested in turn. Returns the number of visible rows.
    fn compact_instances(&mut self, slot: usize, count: usize) -> usize {
        let base = slot * self.max_instances();
        let mut visible = count;
        let mut i = 0;
        while i < visible {
            if self.culler.test_volume(&self.instance_bounds[base + i]) {
                i += 1;
                continue;
            }
            visible -= 1;
            if i != visible {
                self.instance_bounds.swap(base + i, base + visible);
                self.instances.swap_items(base + i, base + visible);
            }
        }
        visible
    }

    /// Sub-range of base geometry `index` in the merged buffer.
    #[must_use]
    pub fn geometry_range(&self, index: u32) -> Option<GeometryRange> {
        self.geometries.get(index as usize).copied()
    }

    /// Number of registered base geometries.
    #[must_use]
    pub fn num_geometries(&self) -> usize {
        self.geometries.len()
    }

    /// Number of allocated draw calls.
    #[must_use]
    pub fn num_draw_calls(&self) -> usize {
        self.slot_geometry.iter().filter(|g| g.is_some()).count()
    }

    /// Statistics of the last [`draw_spec`](Self::draw_spec).
    #[must_use]
    pub fn stats(&self) -> CullStats {
        self.stats
    }

    /// Configuration the allocator was built with.
    #[must_use]
    pub fn config(&self) -> &InstancedAllocatorConfig {
        &self.config
    }

    /// Merged vertex attribute stores.
    #[must_use]
    pub fn vertex_attributes(&self) -> &AttributeSet {
        &self.vertices
    }

    /// Merged index store.
    #[must_use]
    pub fn indices(&self) -> &AttributeStore {
        &self.indices
    }

    /// Instance attribute textures.
    #[must_use]
    pub fn instance_attributes(&self) -> &AttributeSet {
        &self.instances
    }

    /// Instance attribute textures, mutably (for clearing update flags).
    pub fn instance_attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.instances
    }
}
