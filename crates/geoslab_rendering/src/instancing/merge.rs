//! Merging base geometries into one vertex/index buffer.

use crate::attributes::{AttributeSet, AttributeStore, Element};
use crate::config::{AttributeSpec, ElementType};
use crate::error::{RenderError, RenderResult};

/// Vertex attributes and indices of one mesh to be instanced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseGeometry {
    vertex_count: u32,
    indices: Vec<u32>,
    attributes: Vec<(String, ElementType, Vec<u32>)>,
}

impl BaseGeometry {
    /// Geometry of `vertex_count` vertices; `indices` are local to it.
    #[must_use]
    pub fn new(vertex_count: u32, indices: Vec<u32>) -> Self {
        Self {
            vertex_count,
            indices,
            attributes: Vec::new(),
        }
    }

    /// Adds the data of vertex attribute `name`.
    #[must_use]
    pub fn with_attribute<T: Element>(mut self, name: impl Into<String>, values: &[T]) -> Self {
        self.attributes.push((
            name.into(),
            T::ELEMENT_TYPE,
            bytemuck::cast_slice(values).to_vec(),
        ));
        self
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Local indices.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    fn attribute(&self, name: &str) -> Option<(ElementType, &[u32])> {
        self.attributes
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, ty, words)| (*ty, words.as_slice()))
    }
}

/// Where one base geometry landed in the merged buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryRange {
    /// First vertex.
    pub vertex_start: u32,
    /// Number of vertices.
    pub vertex_count: u32,
    /// First index.
    pub index_start: u32,
    /// Number of indices.
    pub index_count: u32,
}

impl GeometryRange {
    /// Byte offset of the first index.
    #[must_use]
    pub const fn draw_start(&self) -> u32 {
        self.index_start * 4
    }
}

/// Merged vertex stores, index store and per-geometry ranges.
pub(crate) struct Merged {
    pub vertices: AttributeSet,
    pub indices: AttributeStore,
    pub ranges: Vec<GeometryRange>,
}

fn mismatch(geometry: usize, detail: impl std::fmt::Display) -> RenderError {
    RenderError::GeometryMismatch(format!("base geometry {geometry}: {detail}"))
}

fn checked_total(counts: impl Iterator<Item = u32>) -> RenderResult<u32> {
    counts
        .map(u64::from)
        .sum::<u64>()
        .try_into()
        .map_err(|_| RenderError::UnsupportedConfiguration("merged geometry exceeds u32 range".to_owned()))
}

/// Concatenates `geometries`, rebasing each one's indices onto its vertex start.
///
/// Every geometry must carry data for every declared attribute, with exactly
/// `vertex_count × item_size` components of the declared type, and indices
/// inside its own vertices.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn merge(specs: &[AttributeSpec], geometries: &[BaseGeometry]) -> RenderResult<Merged> {
    for (g, geometry) in geometries.iter().enumerate() {
        for spec in specs {
            let Some((element_type, words)) = geometry.attribute(&spec.name) else {
                return Err(mismatch(g, format_args!("missing attribute `{}`", spec.name)));
            };
            if element_type != spec.element_type {
                return Err(mismatch(
                    g,
                    format_args!("attribute `{}` is {element_type:?}, expected {:?}", spec.name, spec.element_type),
                ));
            }
            let expected = geometry.vertex_count as usize * spec.item_size as usize;
            if words.len() != expected {
                return Err(mismatch(
                    g,
                    format_args!("attribute `{}` has {} components, expected {expected}", spec.name, words.len()),
                ));
            }
        }
        if let Some((name, _, _)) = geometry
            .attributes
            .iter()
            .find(|(name, _, _)| !specs.iter().any(|spec| &spec.name == name))
        {
            return Err(mismatch(g, format_args!("undeclared attribute `{name}`")));
        }
        if let Some(bad) = geometry.indices.iter().find(|&&i| i >= geometry.vertex_count) {
            return Err(mismatch(
                g,
                format_args!("index {bad} out of range for {} vertices", geometry.vertex_count),
            ));
        }
    }

    let total_vertices = checked_total(geometries.iter().map(|g| g.vertex_count))?;
    let total_indices = checked_total(geometries.iter().map(|g| g.indices.len() as u32))?;

    let mut vertices = AttributeSet::linear(specs, total_vertices)?;
    let mut indices = AttributeStore::linear(
        AttributeSpec::new("index", ElementType::Uint32, 1),
        total_indices,
    )?;
    let mut ranges = Vec::with_capacity(geometries.len());

    let (mut vertex_start, mut index_start) = (0u32, 0u32);
    for geometry in geometries {
        for store in vertices.iter_mut() {
            if let Some((_, words)) = geometry.attribute(store.name()) {
                let offset = vertex_start as usize * store.item_size();
                store.write_words(offset, words);
            }
        }
        let rebased: Vec<u32> = geometry.indices.iter().map(|&i| i + vertex_start).collect();
        indices.write(index_start as usize, &rebased)?;

        let range = GeometryRange {
            vertex_start,
            vertex_count: geometry.vertex_count,
            index_start,
            index_count: geometry.indices.len() as u32,
        };
        vertex_start += range.vertex_count;
        index_start += range.index_count;
        ranges.push(range);
    }

    Ok(Merged {
        vertices,
        indices,
        ranges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> BaseGeometry {
        BaseGeometry::new(3, vec![0, 1, 2]).with_attribute("position", &[0.0f32; 9])
    }

    fn quad() -> BaseGeometry {
        BaseGeometry::new(4, vec![0, 1, 2, 0, 2, 3]).with_attribute("position", &[1.0f32; 12])
    }

    #[test]
    fn test_indices_are_rebased() {
        let merged = merge(&[AttributeSpec::position()], &[triangle(), quad()]).unwrap();

        assert_eq!(merged.ranges[1], GeometryRange {
            vertex_start: 3,
            vertex_count: 4,
            index_start: 3,
            index_count: 6,
        });
        assert_eq!(merged.ranges[1].draw_start(), 12);
        assert_eq!(merged.indices.values::<u32>(), &[0, 1, 2, 3, 4, 5, 3, 5, 6]);
        assert_eq!(merged.vertices.get("position").unwrap().item::<f32>(3), &[1.0; 3]);
    }

    #[test]
    fn test_missing_or_short_attribute_is_rejected() {
        let specs = [AttributeSpec::position()];
        let bare = BaseGeometry::new(3, vec![0, 1, 2]);
        assert!(matches!(merge(&specs, &[bare]), Err(RenderError::GeometryMismatch(_))));

        let short = BaseGeometry::new(3, vec![0, 1, 2]).with_attribute("position", &[0.0f32; 6]);
        assert!(matches!(merge(&specs, &[short]), Err(RenderError::GeometryMismatch(_))));

        let wrong_type = BaseGeometry::new(3, vec![0, 1, 2]).with_attribute("position", &[0u32; 9]);
        assert!(matches!(merge(&specs, &[wrong_type]), Err(RenderError::GeometryMismatch(_))));
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let bad = BaseGeometry::new(3, vec![0, 1, 3]).with_attribute("position", &[0.0f32; 9]);
        assert!(matches!(
            merge(&[AttributeSpec::position()], &[bad]),
            Err(RenderError::GeometryMismatch(_))
        ));
    }
}
