//! Building allocators from TOML configuration.

use geoslab_rendering::{
    BaseGeometry, BoundingKind, ElementType, GeometryAllocator, GeometryAllocatorConfig,
    InstancedAllocator, InstancedAllocatorConfig, RenderError,
};

#[test]
fn geometry_allocator_from_toml() {
    let config = GeometryAllocatorConfig::from_toml_str(
        r#"
        buffer_size = 2048
        max_draws = 32
        bounding = "box"
        frustum_culling = true

        [[vertex_attributes]]
        name = "normal"
        item_size = 3

        [[vertex_attributes]]
        name = "material"
        element_type = "uint32"
        item_size = 1
        "#,
    )
    .unwrap();

    let slab = GeometryAllocator::new(config).unwrap();
    let names: Vec<_> = slab.vertex_attributes().iter().map(|s| s.name().to_owned()).collect();
    assert_eq!(names, ["position", "normal", "material"]);
    assert_eq!(slab.config().bounding, BoundingKind::Box);
    assert_eq!(
        slab.vertex_attributes().get("material").unwrap().spec().element_type,
        ElementType::Uint32
    );
    assert_eq!(slab.vertex_attributes().get("position").unwrap().len_items(), 2048);
}

#[test]
fn instanced_allocator_from_toml() {
    let config = InstancedAllocatorConfig::from_toml_str(
        r#"
        max_instances_per_draw_call = 64
        max_draw_calls_per_geometry = 4
        instance_bounding = "sphere"

        [[vertex_attributes]]
        name = "position"
        item_size = 3

        [[instance_attributes]]
        name = "color"
        element_type = "uint32"
        item_size = 1
        "#,
    )
    .unwrap();

    let geometry = BaseGeometry::new(1, vec![0]).with_attribute("position", &[0.0f32; 3]);
    let alloc = InstancedAllocator::new(config, &[geometry]).unwrap();
    assert_eq!(alloc.instance_attributes().get("color").unwrap().side(), Some(16));
}

#[test]
fn oversized_texel_attribute_is_unsupported() {
    let config = InstancedAllocatorConfig::from_toml_str(
        r#"
        max_instances_per_draw_call = 4
        max_draw_calls_per_geometry = 1

        [[instance_attributes]]
        name = "matrix"
        item_size = 16
        "#,
    )
    .unwrap();

    let geometry = BaseGeometry::new(1, vec![0]).with_attribute("position", &[0.0f32; 3]);
    assert!(matches!(
        InstancedAllocator::new(config, &[geometry]),
        Err(RenderError::UnsupportedConfiguration(_))
    ));
}

#[test]
fn unknown_element_type_is_unsupported() {
    let result = GeometryAllocatorConfig::from_toml_str(
        r#"
        buffer_size = 16
        max_draws = 1

        [[vertex_attributes]]
        name = "uv"
        element_type = "float16"
        item_size = 2
        "#,
    );
    assert!(matches!(result, Err(RenderError::UnsupportedConfiguration(_))));
}

#[test]
fn unknown_bounding_kind_is_unsupported() {
    let result = GeometryAllocatorConfig::from_toml_str(
        r#"
        buffer_size = 16
        max_draws = 1
        bounding = "cone"
        "#,
    );
    assert!(matches!(result, Err(RenderError::UnsupportedConfiguration(_))));
}

#[test]
fn oversized_max_draws_from_toml_is_rejected() {
    let config = GeometryAllocatorConfig::from_toml_str(
        r#"
        buffer_size = 16
        max_draws = 4294967295
        "#,
    )
    .unwrap();
    assert!(matches!(
        GeometryAllocator::new(config),
        Err(RenderError::InvalidArgument(_))
    ));
}
