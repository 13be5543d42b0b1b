//! # Allocator Configuration
//!
//! Capacities, bounding kinds and attribute layouts for both allocators.
//! Everything here is decided once at construction and loaded from TOML:
//!
//! ```toml
//! buffer_size = 65536
//! max_draws = 1024
//! bounding = "box"
//!
//! [occlusion]
//! seed_drop_cells = 4
//!
//! [[vertex_attributes]]
//! name = "normal"
//! element_type = "float32"
//! item_size = 3
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{RenderError, RenderResult};

/// Shape used for visibility tests at draw or instance granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BoundingKind {
    /// No test: always visible.
    #[default]
    None,
    /// Center + radius.
    Sphere,
    /// Axis-aligned min/max.
    Box,
}

impl FromStr for BoundingKind {
    type Err = RenderError;

    fn from_str(s: &str) -> RenderResult<Self> {
        match s {
            "none" => Ok(Self::None),
            "sphere" => Ok(Self::Sphere),
            "box" => Ok(Self::Box),
            other => Err(RenderError::UnsupportedConfiguration(format!(
                "bounding kind `{other}`"
            ))),
        }
    }
}

impl fmt::Display for BoundingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Sphere => "sphere",
            Self::Box => "box",
        })
    }
}

/// Scalar type of one attribute component. All are 4 bytes wide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// `f32`
    #[default]
    Float32,
    /// `u32`
    Uint32,
    /// `i32`
    Int32,
}

impl FromStr for ElementType {
    type Err = RenderError;

    fn from_str(s: &str) -> RenderResult<Self> {
        match s {
            "float32" => Ok(Self::Float32),
            "uint32" => Ok(Self::Uint32),
            "int32" => Ok(Self::Int32),
            other => Err(RenderError::UnsupportedConfiguration(format!(
                "element type `{other}`"
            ))),
        }
    }
}

/// Layout of one named attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Attribute name, unique within one allocator.
    pub name: String,
    /// Component type.
    pub element_type: ElementType,
    /// Components per item (3 for a position, 4 for a quaternion).
    pub item_size: u32,
}

impl AttributeSpec {
    /// Creates an attribute spec.
    #[must_use]
    pub fn new(name: impl Into<String>, element_type: ElementType, item_size: u32) -> Self {
        Self {
            name: name.into(),
            element_type,
            item_size,
        }
    }

    /// The mandatory `position` attribute: three `f32` per vertex.
    #[must_use]
    pub fn position() -> Self {
        Self::new(POSITION_ATTRIBUTE, ElementType::Float32, 3)
    }
}

/// Name of the vertex attribute that is always present.
pub const POSITION_ATTRIBUTE: &str = "position";

/// Parameters of the chunk-adjacency occlusion search.
///
/// Cell offsets are in whole cells; the band is relative to the negated
/// world-space Y of the allocator's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    /// How many cells below the camera's chunk the search is seeded.
    pub seed_drop_cells: i32,
    /// Lowest cell (inclusive) the search may enter.
    pub band_min_cells: i32,
    /// Highest cell (exclusive) the search may enter.
    pub band_max_cells: i32,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            seed_drop_cells: 4,
            band_min_cells: -16,
            band_max_cells: -4,
        }
    }
}

/// Configuration of a [`GeometryAllocator`](crate::GeometryAllocator).
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryAllocatorConfig {
    /// Vertex capacity, and index capacity, of the shared buffer.
    pub buffer_size: u32,
    /// Maximum number of live draws, at most `buffer_size`.
    pub max_draws: u32,
    /// Shape of the per-draw bounding volume.
    pub bounding: BoundingKind,
    /// Enables chunk-adjacency occlusion when present.
    pub occlusion: Option<OcclusionConfig>,
    /// Also drop draws whose bounding volume is outside the frustum.
    pub frustum_culling: bool,
    /// Extra vertex attributes. `position` is added when missing.
    pub vertex_attributes: Vec<AttributeSpec>,
}

impl GeometryAllocatorConfig {
    /// Minimal configuration: positions only, no culling.
    #[must_use]
    pub fn new(buffer_size: u32, max_draws: u32) -> Self {
        Self {
            buffer_size,
            max_draws,
            bounding: BoundingKind::None,
            occlusion: None,
            frustum_culling: false,
            vertex_attributes: Vec::new(),
        }
    }

    /// Sets the bounding kind.
    #[must_use]
    pub fn with_bounding(mut self, bounding: BoundingKind) -> Self {
        self.bounding = bounding;
        self
    }

    /// Enables occlusion culling.
    #[must_use]
    pub fn with_occlusion(mut self, occlusion: OcclusionConfig) -> Self {
        self.occlusion = Some(occlusion);
        self
    }

    /// Enables frustum culling of whole draws.
    #[must_use]
    pub fn with_frustum_culling(mut self, enabled: bool) -> Self {
        self.frustum_culling = enabled;
        self
    }

    /// Adds a vertex attribute.
    #[must_use]
    pub fn with_vertex_attribute(mut self, spec: AttributeSpec) -> Self {
        self.vertex_attributes.push(spec);
        self
    }

    /// Parses a configuration from TOML source.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Config`] on malformed TOML
    /// - [`RenderError::UnsupportedConfiguration`] on an unknown bounding
    ///   kind or element type
    pub fn from_toml_str(source: &str) -> RenderResult<Self> {
        let raw: GeometryToml = toml::from_str(source)?;
        Ok(Self {
            buffer_size: raw.buffer_size,
            max_draws: raw.max_draws,
            bounding: parse_kind(raw.bounding.as_deref())?,
            occlusion: raw.occlusion,
            frustum_culling: raw.frustum_culling,
            vertex_attributes: parse_attributes(raw.vertex_attributes)?,
        })
    }

    /// Vertex attributes with `position` guaranteed first.
    pub(crate) fn resolved_vertex_attributes(&self) -> Vec<AttributeSpec> {
        with_position(&self.vertex_attributes)
    }
}

/// Returns `specs` with `position` first, adding the default one when absent.
pub(crate) fn with_position(specs: &[AttributeSpec]) -> Vec<AttributeSpec> {
    let mut resolved = Vec::with_capacity(specs.len() + 1);
    match specs.iter().find(|spec| spec.name == POSITION_ATTRIBUTE) {
        Some(position) => resolved.push(position.clone()),
        None => resolved.push(AttributeSpec::position()),
    }
    resolved.extend(
        specs
            .iter()
            .filter(|spec| spec.name != POSITION_ATTRIBUTE)
            .cloned(),
    );
    resolved
}

/// Configuration of an [`InstancedAllocator`](crate::InstancedAllocator).
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedAllocatorConfig {
    /// Rows reserved per draw call in every instance attribute store.
    pub max_instances_per_draw_call: u32,
    /// Draw-call slots reserved per registered base geometry.
    pub max_draw_calls_per_geometry: u32,
    /// Shape of the per-draw-call bounding volume.
    pub bounding: BoundingKind,
    /// Shape of the per-instance bounding volume.
    pub instance_bounding: BoundingKind,
    /// Vertex attributes of the merged base geometries.
    pub vertex_attributes: Vec<AttributeSpec>,
    /// Per-instance attributes, each stored as a square texel array.
    pub instance_attributes: Vec<AttributeSpec>,
}

impl InstancedAllocatorConfig {
    /// Minimal configuration: positions only, no instance attributes, no culling.
    #[must_use]
    pub fn new(max_instances_per_draw_call: u32, max_draw_calls_per_geometry: u32) -> Self {
        Self {
            max_instances_per_draw_call,
            max_draw_calls_per_geometry,
            bounding: BoundingKind::None,
            instance_bounding: BoundingKind::None,
            vertex_attributes: vec![AttributeSpec::position()],
            instance_attributes: Vec::new(),
        }
    }

    /// Sets the draw-call bounding kind.
    #[must_use]
    pub fn with_bounding(mut self, bounding: BoundingKind) -> Self {
        self.bounding = bounding;
        self
    }

    /// Sets the instance bounding kind.
    #[must_use]
    pub fn with_instance_bounding(mut self, bounding: BoundingKind) -> Self {
        self.instance_bounding = bounding;
        self
    }

    /// Adds an instance attribute.
    #[must_use]
    pub fn with_instance_attribute(mut self, spec: AttributeSpec) -> Self {
        self.instance_attributes.push(spec);
        self
    }

    /// Parses a configuration from TOML source.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Config`] on malformed TOML
    /// - [`RenderError::UnsupportedConfiguration`] on an unknown bounding
    ///   kind or element type
    pub fn from_toml_str(source: &str) -> RenderResult<Self> {
        let raw: InstancedToml = toml::from_str(source)?;
        Ok(Self {
            max_instances_per_draw_call: raw.max_instances_per_draw_call,
            max_draw_calls_per_geometry: raw.max_draw_calls_per_geometry,
            bounding: parse_kind(raw.bounding.as_deref())?,
            instance_bounding: parse_kind(raw.instance_bounding.as_deref())?,
            vertex_attributes: parse_attributes(raw.vertex_attributes)?,
            instance_attributes: parse_attributes(raw.instance_attributes)?,
        })
    }
}

// TOML shapes. Kind and type names stay strings until `from_toml_str`
// resolves them, so an unknown name is reported as unsupported rather
// than as a syntax error.

#[derive(Debug, Deserialize)]
struct AttributeToml {
    name: String,
    element_type: Option<String>,
    item_size: u32,
}

#[derive(Debug, Deserialize)]
struct GeometryToml {
    buffer_size: u32,
    max_draws: u32,
    bounding: Option<String>,
    occlusion: Option<OcclusionConfig>,
    #[serde(default)]
    frustum_culling: bool,
    #[serde(default)]
    vertex_attributes: Vec<AttributeToml>,
}

#[derive(Debug, Deserialize)]
struct InstancedToml {
    max_instances_per_draw_call: u32,
    max_draw_calls_per_geometry: u32,
    bounding: Option<String>,
    instance_bounding: Option<String>,
    #[serde(default)]
    vertex_attributes: Vec<AttributeToml>,
    #[serde(default)]
    instance_attributes: Vec<AttributeToml>,
}

fn parse_kind(name: Option<&str>) -> RenderResult<BoundingKind> {
    name.map_or(Ok(BoundingKind::default()), str::parse)
}

fn parse_attributes(specs: Vec<AttributeToml>) -> RenderResult<Vec<AttributeSpec>> {
    specs
        .into_iter()
        .map(|spec| {
            let element_type = match spec.element_type.as_deref() {
                Some(name) => name.parse()?,
                None => ElementType::default(),
            };
            Ok(AttributeSpec::new(spec.name, element_type, spec.item_size))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_kind_names() {
        assert_eq!("sphere".parse::<BoundingKind>().unwrap(), BoundingKind::Sphere);
        assert_eq!("box".parse::<BoundingKind>().unwrap(), BoundingKind::Box);
        assert!(matches!(
            "cone".parse::<BoundingKind>(),
            Err(RenderError::UnsupportedConfiguration(_))
        ));
        assert!(matches!(
            "float16".parse::<ElementType>(),
            Err(RenderError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_geometry_config_from_toml() {
        let config = GeometryAllocatorConfig::from_toml_str(
            r#"
            buffer_size = 4096
            max_draws = 64
            bounding = "sphere"

            [occlusion]
            seed_drop_cells = 2

            [[vertex_attributes]]
            name = "normal"
            item_size = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.bounding, BoundingKind::Sphere);
        let occlusion = config.occlusion.unwrap();
        assert_eq!(occlusion.seed_drop_cells, 2);
        assert_eq!(occlusion.band_min_cells, -16);
        assert!(!config.frustum_culling);

        let names: Vec<_> = config
            .resolved_vertex_attributes()
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        assert_eq!(names, vec!["position", "normal"]);
    }

    #[test]
    fn test_unknown_kind_in_toml_is_unsupported() {
        let result = InstancedAllocatorConfig::from_toml_str(
            r#"
            max_instances_per_draw_call = 8
            max_draw_calls_per_geometry = 2
            instance_bounding = "capsule"
            "#,
        );
        assert!(matches!(result, Err(RenderError::UnsupportedConfiguration(_))));

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
    fn test_malformed_toml_is_a_config_error() {
        let result = GeometryAllocatorConfig::from_toml_str("max_draws = 1");
        assert!(matches!(result, Err(RenderError::Config(_))));

        let result = GeometryAllocatorConfig::from_toml_str("buffer_size = \"big\"\nmax_draws = 1");
        assert!(matches!(result, Err(RenderError::Config(_))));
    }
}
