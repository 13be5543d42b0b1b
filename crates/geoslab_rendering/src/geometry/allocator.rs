//! The geometry slab allocator.

use geoslab_core::{AllocError, FreeList, Slot};

use super::records::{DrawRecord, DrawRecords};
use crate::attributes::{AttributeSet, AttributeStore, Element};
use crate::camera::Camera;
use crate::config::{AttributeSpec, BoundingKind, ElementType, GeometryAllocatorConfig};
use crate::culling::{BoundingVolume, FrustumCuller, OcclusionGraph, PeekMask};
use crate::error::{RenderError, RenderResult};
use crate::math::{self, Mat4};
use crate::pipeline::{CullStats, DrawSpec};

/// Name of the index store.
const INDEX_ATTRIBUTE: &str = "index";

/// Bytes per index.
const INDEX_STRIDE: u32 = 4;

/// Chunk extent and face visibility of an occlusion-enabled draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcclusionBounds {
    /// Minimum corner, in allocator space.
    pub min: [f32; 3],
    /// Maximum corner, in allocator space.
    pub max: [f32; 3],
    /// Which face pairs see each other through the chunk.
    pub peek: PeekMask,
}

/// Parameters of one geometry allocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryRequest {
    /// Vertices to reserve.
    pub num_positions: u32,
    /// Indices to reserve.
    pub num_indices: u32,
    /// Bounding volume in the geometry's own space.
    pub bounding: BoundingVolume,
    /// Transform from geometry space to allocator space.
    pub transform: Option<Mat4>,
    /// Chunk data, required when occlusion is enabled.
    pub occlusion: Option<OcclusionBounds>,
}

impl GeometryRequest {
    /// Request with no bounds, transform or chunk data.
    #[must_use]
    pub const fn new(num_positions: u32, num_indices: u32) -> Self {
        Self {
            num_positions,
            num_indices,
            bounding: BoundingVolume::None,
            transform: None,
            occlusion: None,
        }
    }

    /// Sets the bounding volume.
    #[must_use]
    pub const fn with_bounding(mut self, bounding: BoundingVolume) -> Self {
        self.bounding = bounding;
        self
    }

    /// Sets the geometry-to-allocator transform applied to the bounds.
    #[must_use]
    pub const fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Sets the occlusion chunk.
    #[must_use]
    pub const fn with_occlusion(mut self, min: [f32; 3], max: [f32; 3], peek: PeekMask) -> Self {
        self.occlusion = Some(OcclusionBounds { min, max, peek });
        self
    }
}

/// Ownership of one geometry allocation.
///
/// Not `Clone`: [`GeometryAllocator::free`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct GeometryHandle {
    vertices: Slot,
    indices: Slot,
    owner: u32,
}

impl GeometryHandle {
    /// First vertex of the allocation.
    #[must_use]
    pub const fn vertex_start(&self) -> u32 {
        self.vertices.start()
    }

    /// Number of vertices reserved.
    #[must_use]
    pub const fn vertex_count(&self) -> u32 {
        self.vertices.count()
    }

    /// First index of the allocation.
    #[must_use]
    pub const fn index_start(&self) -> u32 {
        self.indices.start()
    }

    /// Number of indices reserved.
    #[must_use]
    pub const fn index_count(&self) -> u32 {
        self.indices.count()
    }

    /// Byte offset of the first index, as emitted in draw specs.
    #[must_use]
    pub const fn draw_start(&self) -> u32 {
        self.indices.start() * INDEX_STRIDE
    }
}

/// Packs many meshes into one shared vertex/index buffer.
#[derive(Debug)]
pub struct GeometryAllocator {
    id: u32,
    config: GeometryAllocatorConfig,
    vertices: AttributeSet,
    indices: AttributeStore,
    vertex_space: FreeList,
    index_space: FreeList,
    records: DrawRecords,
    occlusion: Option<OcclusionGraph>,
    world: Mat4,
    world_inverse: Mat4,
    culler: FrustumCuller,
    culled: Vec<bool>,
    spec: DrawSpec,
    stats: CullStats,
}

impl GeometryAllocator {
    /// Creates an allocator with zeroed stores.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Alloc`] if `buffer_size` is zero
    /// - [`RenderError::UnsupportedConfiguration`] on duplicate attribute names
    /// - [`RenderError::InvalidArgument`] on a zero item size, or if
    ///   `max_draws` exceeds `buffer_size` (every draw holds an index)
    pub fn new(config: GeometryAllocatorConfig) -> RenderResult<Self> {
        let vertex_space = FreeList::new(config.buffer_size)?;
        let index_space = FreeList::new(config.buffer_size)?;
        if config.max_draws > config.buffer_size {
            return Err(RenderError::InvalidArgument(format!(
                "max_draws {} exceeds buffer_size {}",
                config.max_draws, config.buffer_size
            )));
        }
        let vertices = AttributeSet::linear(&config.resolved_vertex_attributes(), config.buffer_size)?;
        let indices = AttributeStore::linear(
            AttributeSpec::new(INDEX_ATTRIBUTE, ElementType::Uint32, 1),
            config.buffer_size,
        )?;

        let capacity = config.max_draws as usize;
        let occlusion = config
            .occlusion
            .map(|occlusion| OcclusionGraph::new(occlusion, capacity));

        tracing::debug!(
            buffer_size = config.buffer_size,
            max_draws = config.max_draws,
            bounding = %config.bounding,
            occlusion = occlusion.is_some(),
            "geometry allocator created"
        );

        Ok(Self {
            id: crate::next_owner_id(),
            vertices,
            indices,
            vertex_space,
            index_space,
            records: DrawRecords::with_capacity(capacity),
            occlusion,
            world: math::IDENTITY,
            world_inverse: math::IDENTITY,
            culler: FrustumCuller::new(),
            culled: Vec::with_capacity(capacity),
            spec: DrawSpec::with_capacity(capacity),
            stats: CullStats::default(),
            config,
        })
    }

    /// Reserves vertex and index ranges and appends a draw record.
    ///
    /// All or nothing: on failure no range stays reserved.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Alloc`] with `OutOfMemory` when either range does not
    ///   fit or `max_draws` draws are live
    /// - [`RenderError::Alloc`] with `InvalidArgument` for zero sizes
    /// - [`RenderError::InvalidArgument`] if occlusion is enabled and the
    ///   request has no chunk
    pub fn alloc(&mut self, request: GeometryRequest) -> RenderResult<GeometryHandle> {
        if self.records.len() >= self.config.max_draws as usize {
            tracing::warn!(max_draws = self.config.max_draws, "draw records exhausted");
            return Err(AllocError::OutOfMemory {
                requested: 1,
                largest_free: 0,
            }
            .into());
        }

        let chunk = match (&self.occlusion, request.occlusion) {
            (Some(_), None) => {
                return Err(RenderError::InvalidArgument(
                    "occlusion is enabled but the request has no chunk bounds".to_owned(),
                ))
            }
            (_, chunk) => chunk.unwrap_or(OcclusionBounds {
                min: [0.0; 3],
                max: [0.0; 3],
                peek: PeekMask::CLOSED,
            }),
        };

        let vertices = self.vertex_space.alloc(request.num_positions)?;
        let indices = match self.index_space.alloc(request.num_indices) {
            Ok(indices) => indices,
            Err(err) => {
                self.vertex_space.free(vertices)?;
                return Err(err.into());
            }
        };

        let bounds = match &request.transform {
            Some(transform) => request.bounding.transformed(transform),
            None => request.bounding,
        }
        .to_kind(self.config.bounding);

        let handle = GeometryHandle {
            vertices,
            indices,
            owner: self.id,
        };
        let ordinal = self.records.push(DrawRecord {
            draw_start: handle.draw_start(),
            draw_count: request.num_indices,
            bounds,
            occlusion_min: chunk.min,
            occlusion_max: chunk.max,
            peek: chunk.peek,
        });
        if let Some(graph) = &mut self.occlusion {
            graph.push(chunk.min, chunk.max);
        }

        tracing::debug!(
            ordinal,
            vertex_start = vertices.start(),
            index_start = indices.start(),
            num_positions = request.num_positions,
            num_indices = request.num_indices,
            "geometry allocated"
        );
        Ok(handle)
    }

    /// Releases a geometry allocation.
    ///
    /// The last draw record moves into the freed ordinal.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidOperation`] if the handle belongs to
    /// another allocator or is no longer live here.
    pub fn free(&mut self, handle: GeometryHandle) -> RenderResult<()> {
        self.check_owner(&handle)?;
        let ordinal = self
            .records
            .ordinal_of(handle.draw_start())
            .filter(|_| {
                self.vertex_space.is_live(handle.vertices) && self.index_space.is_live(handle.indices)
            })
            .ok_or_else(|| {
                RenderError::InvalidOperation(format!(
                    "geometry at draw start {} is not live",
                    handle.draw_start()
                ))
            })?;

        self.records.swap_remove(ordinal);
        if let Some(graph) = &mut self.occlusion {
            graph.swap_remove(ordinal);
        }
        self.vertex_space.free(handle.vertices)?;
        self.index_space.free(handle.indices)?;

        tracing::debug!(
            ordinal,
            draw_start = handle.draw_start(),
            num_draws = self.records.len(),
            "geometry freed"
        );
        Ok(())
    }

    fn check_owner(&self, handle: &GeometryHandle) -> RenderResult<()> {
        if handle.owner == self.id {
            Ok(())
        } else {
            Err(RenderError::InvalidOperation(
                "geometry handle belongs to another allocator".to_owned(),
            ))
        }
    }

    /// Component offset of the handle's vertices inside attribute `name`.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidOperation`] for a foreign handle
    /// - [`RenderError::UnknownAttribute`] if `name` is not a vertex attribute
    pub fn attribute_offset(&self, handle: &GeometryHandle, name: &str) -> RenderResult<usize> {
        self.check_owner(handle)?;
        let store = self.vertices.get(name)?;
        Ok(handle.vertex_start() as usize * store.item_size())
    }

    /// Writes vertex data for `handle` into attribute `name`.
    ///
    /// `values` holds whole items starting at the handle's first vertex.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidOperation`] for a foreign handle
    /// - [`RenderError::UnknownAttribute`] if `name` is not a vertex attribute
    /// - [`RenderError::InvalidArgument`] on a type mismatch or if `values`
    ///   does not fit in the handle's range
    pub fn write_attribute<T: Element>(
        &mut self,
        handle: &GeometryHandle,
        name: &str,
        values: &[T],
    ) -> RenderResult<()> {
        self.check_owner(handle)?;
        let store = self.vertices.get_mut(name)?;
        let capacity = handle.vertex_count() as usize * store.item_size();
        if values.len() > capacity {
            return Err(RenderError::InvalidArgument(format!(
                "{} components exceed the {capacity} reserved for `{name}`",
                values.len()
            )));
        }
        store.write(handle.vertex_start() as usize * store.item_size(), values)
    }

    /// Writes indices for `handle`, relative to its first vertex.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidOperation`] for a foreign handle
    /// - [`RenderError::InvalidArgument`] if there are more indices than
    ///   reserved or one points past the handle's vertices
    pub fn write_indices(&mut self, handle: &GeometryHandle, indices: &[u32]) -> RenderResult<()> {
        self.check_owner(handle)?;
        if indices.len() > handle.index_count() as usize {
            return Err(RenderError::InvalidArgument(format!(
                "{} indices exceed the {} reserved",
                indices.len(),
                handle.index_count()
            )));
        }
        if let Some(bad) = indices.iter().find(|&&i| i >= handle.vertex_count()) {
            return Err(RenderError::InvalidArgument(format!(
                "index {bad} out of range for {} vertices",
                handle.vertex_count()
            )));
        }

        let base = handle.vertex_start();
        let rebased: Vec<u32> = indices.iter().map(|&i| i + base).collect();
        self.indices.write(handle.index_start() as usize, &rebased)
    }

    /// Sets the allocator's world transform.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SingularTransform`] if `world` has no inverse;
    /// the previous transform is kept.
    pub fn set_transform(&mut self, world: Mat4) -> RenderResult<()> {
        let inverse = math::affine_inverse(&world).ok_or(RenderError::SingularTransform)?;
        self.world = world;
        self.world_inverse = inverse;
        Ok(())
    }

    /// World transform.
    #[must_use]
    pub fn transform(&self) -> &Mat4 {
        &self.world
    }

    /// Builds the visible draw list for `camera`.
    ///
    /// With occlusion, every draw the search reaches is dropped. With
    /// `frustum_culling`, draws whose bounds leave the frustum are dropped
    /// too. Otherwise every live draw is emitted in ordinal order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn draw_spec<C: Camera + ?Sized>(&mut self, camera: &C) -> &DrawSpec {
        let num_draws = self.records.len();
        let mut stats = CullStats {
            draws_tested: num_draws as u32,
            ..CullStats::default()
        };

        let frustum = self.config.frustum_culling && self.config.bounding != BoundingKind::None;
        if frustum {
            self.culler
                .update(&math::mul(&camera.view_projection(), &self.world));
        }

        self.culled.clear();
        self.culled.resize(num_draws, false);
        if let Some(graph) = &mut self.occlusion {
            let camera_local = math::transform_point(&self.world_inverse, camera.position());
            stats.occlusion_culled =
                graph.cull(camera_local, self.world[3][1], self.records.peeks(), &mut self.culled) as u32;
        }

        self.spec.clear();
        let draws = self
            .records
            .starts()
            .iter()
            .zip(self.records.counts())
            .zip(self.records.bounds())
            .zip(&self.culled);
        for (((&start, &count), bounds), &culled) in draws {
            if culled {
                continue;
            }
            if frustum && !self.culler.test_volume(bounds) {
                stats.frustum_culled += 1;
                continue;
            }
            self.spec.push(start, count);
        }

        stats.draws_visible = self.spec.len() as u32;
        self.stats = stats;
        tracing::trace!(
            tested = stats.draws_tested,
            visible = stats.draws_visible,
            frustum_culled = stats.frustum_culled,
            occlusion_culled = stats.occlusion_culled,
            "geometry draw spec built"
        );
        &self.spec
    }

    /// Number of live draws.
    #[must_use]
    pub fn num_draws(&self) -> usize {
        self.records.len()
    }

    /// Record at `ordinal`, if live.
    #[must_use]
    pub fn draw_record(&self, ordinal: usize) -> Option<DrawRecord> {
        self.records.get(ordinal)
    }

    /// Statistics of the last [`draw_spec`](Self::draw_spec).
    #[must_use]
    pub fn stats(&self) -> CullStats {
        self.stats
    }

    /// Configuration the allocator was built with.
    #[must_use]
    pub fn config(&self) -> &GeometryAllocatorConfig {
        &self.config
    }

    /// Vertex attribute stores.
    #[must_use]
    pub fn vertex_attributes(&self) -> &AttributeSet {
        &self.vertices
    }

    /// Vertex attribute stores, mutably (for clearing update flags).
    pub fn vertex_attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.vertices
    }

    /// Index store.
    #[must_use]
    pub fn indices(&self) -> &AttributeStore {
        &self.indices
    }

    /// Index store, mutably (for clearing the update flag).
    pub fn indices_mut(&mut self) -> &mut AttributeStore {
        &mut self.indices
    }

    /// Vertex range free list.
    #[must_use]
    pub fn vertex_space(&self) -> &FreeList {
        &self.vertex_space
    }

    /// Index range free list.
    #[must_use]
    pub fn index_space(&self) -> &FreeList {
        &self.index_space
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraState;
    use crate::config::OcclusionConfig;

    fn camera_at_origin() -> CameraState {
        CameraState::new(math::IDENTITY, math::IDENTITY, [0.0; 3])
    }

    #[test]
    fn test_alloc_records_draw_start_in_bytes() {
        let mut alloc = GeometryAllocator::new(GeometryAllocatorConfig::new(64, 4)).unwrap();
        let a = alloc.alloc(GeometryRequest::new(4, 6)).unwrap();
        let b = alloc.alloc(GeometryRequest::new(3, 3)).unwrap();

        assert_eq!(b.vertex_start(), 4);
        assert_eq!(b.draw_start(), 24);
        assert_eq!(alloc.draw_record(1).unwrap().draw_count, 3);

        let spec = alloc.draw_spec(&camera_at_origin());
        assert_eq!(spec.starts(), &[0, 24]);
        assert_eq!(spec.counts(), &[6, 3]);

        alloc.free(a).unwrap();
        alloc.free(b).unwrap();
        assert_eq!(alloc.num_draws(), 0);
        assert_eq!(alloc.vertex_space().free_space(), 64);
    }

    #[test]
    fn test_index_failure_rolls_back_vertices() {
        let mut alloc = GeometryAllocator::new(GeometryAllocatorConfig::new(16, 4)).unwrap();
        let err = alloc.alloc(GeometryRequest::new(4, 32)).unwrap_err();

        assert!(matches!(err, RenderError::Alloc(AllocError::OutOfMemory { requested: 32, .. })));
        assert_eq!(alloc.vertex_space().used_space(), 0);
        assert_eq!(alloc.num_draws(), 0);
    }

    #[test]
    fn test_max_draws() {
        let mut alloc = GeometryAllocator::new(GeometryAllocatorConfig::new(16, 1)).unwrap();
        let _kept = alloc.alloc(GeometryRequest::new(1, 1)).unwrap();
        assert!(matches!(
            alloc.alloc(GeometryRequest::new(1, 1)),
            Err(RenderError::Alloc(AllocError::OutOfMemory { .. }))
        ));
    }

    #[test]
    fn test_write_indices_rebases() {
        let mut alloc = GeometryAllocator::new(GeometryAllocatorConfig::new(16, 4)).unwrap();
        let _first = alloc.alloc(GeometryRequest::new(5, 3)).unwrap();
        let second = alloc.alloc(GeometryRequest::new(3, 3)).unwrap();

        alloc.write_indices(&second, &[0, 1, 2]).unwrap();
        assert_eq!(&alloc.indices().values::<u32>()[3..6], &[5, 6, 7]);
        assert!(alloc.indices().needs_update());
        assert!(matches!(
            alloc.write_indices(&second, &[3]),
            Err(RenderError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_write_attribute_and_offset() {
        let config = GeometryAllocatorConfig::new(16, 4)
            .with_vertex_attribute(AttributeSpec::new("uv", ElementType::Float32, 2));
        let mut alloc = GeometryAllocator::new(config).unwrap();
        let _first = alloc.alloc(GeometryRequest::new(2, 3)).unwrap();
        let second = alloc.alloc(GeometryRequest::new(2, 3)).unwrap();

        assert_eq!(alloc.attribute_offset(&second, "position").unwrap(), 6);
        assert_eq!(alloc.attribute_offset(&second, "uv").unwrap(), 4);
        assert!(matches!(
            alloc.attribute_offset(&second, "normal"),
            Err(RenderError::UnknownAttribute(_))
        ));

        alloc
            .write_attribute(&second, "uv", &[0.5f32, 0.5, 1.0, 1.0])
            .unwrap();
        assert_eq!(alloc.vertex_attributes().get("uv").unwrap().item::<f32>(3), &[1.0, 1.0]);
        assert!(alloc
            .write_attribute(&second, "uv", &[0.0f32; 6])
            .is_err());
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut a = GeometryAllocator::new(GeometryAllocatorConfig::new(16, 4)).unwrap();
        let mut b = GeometryAllocator::new(GeometryAllocatorConfig::new(16, 4)).unwrap();
        let handle = b.alloc(GeometryRequest::new(1, 1)).unwrap();

        assert!(matches!(a.free(handle), Err(RenderError::InvalidOperation(_))));
        assert_eq!(b.num_draws(), 1);
    }

    #[test]
    fn test_singular_transform_is_rejected() {
        let mut alloc = GeometryAllocator::new(GeometryAllocatorConfig::new(16, 4)).unwrap();
        assert!(matches!(
            alloc.set_transform(math::scale(0.0)),
            Err(RenderError::SingularTransform)
        ));
        assert_eq!(alloc.transform(), &math::IDENTITY);
    }

    #[test]
    fn test_occlusion_requires_chunk() {
        let config = GeometryAllocatorConfig::new(16, 4).with_occlusion(OcclusionConfig::default());
        let mut alloc = GeometryAllocator::new(config).unwrap();
        assert!(matches!(
            alloc.alloc(GeometryRequest::new(1, 1)),
            Err(RenderError::InvalidArgument(_))
        ));
        assert_eq!(alloc.vertex_space().used_space(), 0);
    }

    #[test]
    fn test_bounds_follow_transform_and_kind() {
        let config = GeometryAllocatorConfig::new(16, 4).with_bounding(BoundingKind::Box);
        let mut alloc = GeometryAllocator::new(config).unwrap();
        let request = GeometryRequest::new(1, 1)
            .with_bounding(BoundingVolume::sphere([0.0; 3], 1.0))
            .with_transform(math::translation([5.0, 0.0, 0.0]));
        let _handle = alloc.alloc(request).unwrap();

        assert_eq!(
            alloc.draw_record(0).unwrap().bounds,
            BoundingVolume::aabb([4.0, -1.0, -1.0], [6.0, 1.0, 1.0])
        );
    }
}
