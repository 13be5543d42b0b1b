//! Integration tests for instanced draw calls and per-instance culling.

use geoslab_rendering::{
    AttributeSpec, BaseGeometry, BoundingKind, BoundingVolume, CameraState, ElementType,
    DrawCallHandle, InstancedAllocator, InstancedAllocatorConfig,
};

fn camera() -> CameraState {
    // Looks down -Z; visible box is x, y in [-10, 10], z in [-100, -0.1].
    CameraState::orthographic([0.0; 3], 10.0, 10.0, 0.1, 100.0)
}

fn geometries() -> Vec<BaseGeometry> {
    vec![
        BaseGeometry::new(3, vec![0, 1, 2]).with_attribute("position", &[0.0f32; 9]),
        BaseGeometry::new(4, vec![0, 1, 2, 0, 2, 3]).with_attribute("position", &[0.0f32; 12]),
    ]
}

const INSIDE: BoundingVolume = BoundingVolume::sphere([0.0, 0.0, -5.0], 1.0);
const OUTSIDE: BoundingVolume = BoundingVolume::sphere([100.0, 0.0, -5.0], 1.0);

#[test]
fn scenario_failing_instance_is_swapped_with_last() {
    let config = InstancedAllocatorConfig::new(8, 1)
        .with_instance_bounding(BoundingKind::Sphere)
        .with_instance_attribute(AttributeSpec::new("offset", ElementType::Float32, 3));
    let mut alloc = InstancedAllocator::new(config, &geometries()).unwrap();
    let handle = alloc.alloc_draw_call(0, BoundingVolume::None).unwrap();

    {
        let mut call = alloc.draw_call(&handle).unwrap();
        for i in 0..5u32 {
            let index = call.increment().unwrap();
            assert_eq!(index, i);
            let v = i as f32;
            call.write_instance(i, "offset", &[v, v, v]).unwrap();
            call.set_instance_bounds(i, if i == 2 { OUTSIDE } else { INSIDE })
                .unwrap();
        }
    }

    let spec = alloc.draw_spec(&camera());
    assert_eq!(spec.instance_counts(), &[4, 0]);
    assert_eq!(spec.starts(), &[0, 0]);
    assert_eq!(spec.counts(), &[3, 0]);

    let offsets = alloc.instance_attributes().get("offset").unwrap();
    assert_eq!(offsets.item::<f32>(0), &[0.0; 3]);
    assert_eq!(offsets.item::<f32>(1), &[1.0; 3]);
    assert_eq!(offsets.item::<f32>(2), &[4.0; 3]);
    assert_eq!(offsets.item::<f32>(3), &[3.0; 3]);
    assert_eq!(offsets.item::<f32>(4), &[2.0; 3]);
    assert!(offsets.needs_update());

    let stats = alloc.stats();
    assert_eq!((stats.instances_tested, stats.instances_visible), (5, 4));
    assert_eq!(stats.instances_culled(), 1);

    // The stored count is untouched, so the culled row comes back once visible.
    let mut call = alloc.draw_call(&handle).unwrap();
    assert_eq!(call.instance_count(), 5);
    call.set_instance_bounds(4, INSIDE).unwrap();
    assert_eq!(alloc.draw_spec(&camera()).instance_counts(), &[5, 0]);
}

/// Bounds of the instance tagged `id`: in view unless `hidden`, and distinct per id.
fn tagged_bounds(id: u32, hidden: bool) -> BoundingVolume {
    let x = id as f32 * 0.25;
    BoundingVolume::sphere([if hidden { 100.0 + x } else { x }, 0.0, -5.0], 1.0)
}

/// Allocator with one draw call of `count` instances, tagged `10 + i` in
/// both the `id` and `tag` attributes; instances in `hidden` are out of view.
fn tagged_instances(count: u32, hidden: &[u32]) -> (InstancedAllocator, DrawCallHandle) {
    let config = InstancedAllocatorConfig::new(8, 1)
        .with_instance_bounding(BoundingKind::Sphere)
        .with_instance_attribute(AttributeSpec::new("id", ElementType::Uint32, 1))
        .with_instance_attribute(AttributeSpec::new("tag", ElementType::Float32, 1));
    let mut alloc = InstancedAllocator::new(config, &geometries()).unwrap();
    let handle = alloc.alloc_draw_call(0, BoundingVolume::None).unwrap();

    let mut call = alloc.draw_call(&handle).unwrap();
    for i in 0..count {
        let id = 10 + i;
        call.increment().unwrap();
        call.write_instance(i, "id", &[id]).unwrap();
        call.write_instance(i, "tag", &[id as f32]).unwrap();
        call.set_instance_bounds(i, tagged_bounds(id, hidden.contains(&i)))
            .unwrap();
    }
    (alloc, handle)
}

/// Ids of rows `0..count`, after checking every store still agrees per row.
fn row_ids(
    alloc: &mut InstancedAllocator,
    handle: &DrawCallHandle,
    count: u32,
    hidden: &[u32],
) -> Vec<u32> {
    let ids: Vec<u32> = {
        let id_store = alloc.instance_attributes().get("id").unwrap();
        let tag_store = alloc.instance_attributes().get("tag").unwrap();
        (0..count as usize)
            .map(|row| {
                let id = id_store.item::<u32>(row)[0];
                assert_eq!(tag_store.item::<f32>(row)[0], id as f32);
                id
            })
            .collect()
    };

    let call = alloc.draw_call(handle).unwrap();
    for (row, &id) in ids.iter().enumerate() {
        let expected = tagged_bounds(id, hidden.contains(&(id - 10)));
        assert_eq!(call.instance_bounds(row as u32).unwrap(), expected);
    }
    ids
}

fn sorted(mut ids: Vec<u32>) -> Vec<u32> {
    ids.sort_unstable();
    ids
}

#[test]
fn adjacent_and_tail_failures_are_all_compacted() {
    // Row 1 is swapped with 5, then 4, both hidden, before 3 stays.
    let hidden = [1, 4, 5];
    let (mut alloc, handle) = tagged_instances(6, &hidden);

    let spec = alloc.draw_spec(&camera());
    assert_eq!(spec.instance_counts(), &[3, 0]);
    let ids = row_ids(&mut alloc, &handle, 6, &hidden);
    assert_eq!(sorted(ids[..3].to_vec()), vec![10, 12, 13]);
    assert_eq!(sorted(ids[3..].to_vec()), vec![11, 14, 15]);
    assert_eq!(alloc.stats().instances_culled(), 3);

    // Bounds travelled with their rows, so the next frame agrees.
    assert_eq!(alloc.draw_spec(&camera()).instance_counts(), &[3, 0]);
    let ids = row_ids(&mut alloc, &handle, 6, &hidden);
    assert_eq!(sorted(ids), (10..16).collect::<Vec<_>>());

    let mut call = alloc.draw_call(&handle).unwrap();
    assert_eq!(call.instance_count(), 6);
    for row in 0..6 {
        call.set_instance_bounds(row, INSIDE).unwrap();
    }
    assert_eq!(alloc.draw_spec(&camera()).instance_counts(), &[6, 0]);
}

#[test]
fn last_active_row_failing_only_shrinks_the_count() {
    let hidden = [3];
    let (mut alloc, handle) = tagged_instances(4, &hidden);

    assert_eq!(alloc.draw_spec(&camera()).instance_counts(), &[3, 0]);
    assert_eq!(row_ids(&mut alloc, &handle, 4, &hidden), vec![10, 11, 12, 13]);
}

#[test]
fn every_row_failing_leaves_no_instance() {
    let hidden = [0, 1, 2, 3, 4];
    let (mut alloc, handle) = tagged_instances(5, &hidden);

    assert_eq!(alloc.draw_spec(&camera()).instance_counts(), &[0, 0]);
    let ids = row_ids(&mut alloc, &handle, 5, &hidden);
    assert_eq!(sorted(ids), vec![10, 11, 12, 13, 14]);
    let stats = alloc.stats();
    assert_eq!((stats.instances_tested, stats.instances_visible), (5, 0));
}

#[test]
fn draw_level_culling_zeroes_the_slot() {
    let config = InstancedAllocatorConfig::new(4, 2).with_bounding(BoundingKind::Box);
    let mut alloc = InstancedAllocator::new(config, &geometries()).unwrap();

    let near = alloc.alloc_draw_call(1, INSIDE).unwrap();
    let far = alloc.alloc_draw_call(0, OUTSIDE).unwrap();
    alloc.draw_call(&near).unwrap().set_instance_count(3).unwrap();
    alloc.draw_call(&far).unwrap().set_instance_count(2).unwrap();

    let spec = alloc.draw_spec(&camera());
    assert_eq!(spec.len(), 4);
    assert_eq!(spec.starts(), &[12, 0, 0, 0]);
    assert_eq!(spec.counts(), &[6, 0, 0, 0]);
    assert_eq!(spec.instance_counts(), &[3, 0, 0, 0]);
    assert_eq!(spec.total_instances(), 3);
    assert_eq!(alloc.stats().frustum_culled, 1);

    // Moving the bounds back into view brings the slot back.
    alloc.draw_call(&far).unwrap().set_bounds(INSIDE);
    assert_eq!(alloc.draw_spec(&camera()).instance_counts(), &[3, 2, 0, 0]);
}

#[test]
fn geometry_ranges_and_texture_sizes() {
    let config = InstancedAllocatorConfig::new(100, 3)
        .with_instance_attribute(AttributeSpec::new("rotation", ElementType::Float32, 4));
    let alloc = InstancedAllocator::new(config, &geometries()).unwrap();

    let quad = alloc.geometry_range(1).unwrap();
    assert_eq!((quad.vertex_start, quad.index_start, quad.index_count), (3, 3, 6));
    assert_eq!(alloc.indices().values::<u32>(), &[0, 1, 2, 3, 4, 5, 3, 5, 6]);

    // 2 geometries x 3 draw calls x 100 instances = 600 rows -> 32 x 32.
    let rotation = alloc.instance_attributes().get("rotation").unwrap();
    assert_eq!(rotation.side(), Some(32));
    assert_eq!(rotation.len_items(), 1024);
}
