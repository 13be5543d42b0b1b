//! # Attribute Stores
//!
//! CPU mirrors of GPU attribute memory. Every component is 4 bytes wide and
//! kept as a `u32` word; typed access goes through `bytemuck`.
//!
//! Two layouts exist:
//! - **Linear**: one item per vertex or index, `items × item_size` words
//! - **Texel array**: a square, power-of-two 2-D texture with one item per
//!   texel, used for per-instance rows
//!
//! A store raises its `needs_update` flag on every mutation so the renderer
//! knows to re-upload it.

use bytemuck::Pod;

use crate::config::{AttributeSpec, ElementType};
use crate::error::{RenderError, RenderResult};

/// Smallest texel array side.
pub const MIN_TEXTURE_SIDE: u32 = 16;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for u32 {}
    impl Sealed for i32 {}
}

/// Scalar types an attribute store can hold.
pub trait Element: Pod + sealed::Sealed {
    /// Matching element type tag.
    const ELEMENT_TYPE: ElementType;
}

impl Element for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::Float32;
}

impl Element for u32 {
    const ELEMENT_TYPE: ElementType = ElementType::Uint32;
}

impl Element for i32 {
    const ELEMENT_TYPE: ElementType = ElementType::Int32;
}

/// Side of the smallest square power-of-two texture holding `rows` texels.
#[must_use]
pub fn texture_side(rows: u32) -> u32 {
    let mut side = MIN_TEXTURE_SIDE;
    while u64::from(side) * u64::from(side) < u64::from(rows) {
        side *= 2;
    }
    side
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Linear,
    Texels { side: u32 },
}

/// One named attribute buffer.
#[derive(Debug, Clone)]
pub struct AttributeStore {
    spec: AttributeSpec,
    layout: Layout,
    words: Vec<u32>,
    needs_update: bool,
}

impl AttributeStore {
    /// Creates a zeroed linear store holding `items` items.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidArgument`] if the item size is zero.
    pub fn linear(spec: AttributeSpec, items: u32) -> RenderResult<Self> {
        if spec.item_size == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "attribute `{}` has item size 0",
                spec.name
            )));
        }

        let words = items as usize * spec.item_size as usize;
        Ok(Self {
            spec,
            layout: Layout::Linear,
            words: vec![0; words],
            needs_update: false,
        })
    }

    /// Creates a zeroed square texel array with room for at least `rows` items.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedConfiguration`] unless the item size
    /// fits in one texel (1 to 4 components).
    pub fn texel_array(spec: AttributeSpec, rows: u32) -> RenderResult<Self> {
        if !(1..=4).contains(&spec.item_size) {
            return Err(RenderError::UnsupportedConfiguration(format!(
                "instance attribute `{}` has item size {}, texels hold 1 to 4 components",
                spec.name, spec.item_size
            )));
        }

        let side = texture_side(rows);
        let words = side as usize * side as usize * spec.item_size as usize;
        Ok(Self {
            spec,
            layout: Layout::Texels { side },
            words: vec![0; words],
            needs_update: false,
        })
    }

    /// Attribute name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Attribute layout.
    #[inline]
    #[must_use]
    pub fn spec(&self) -> &AttributeSpec {
        &self.spec
    }

    /// Components per item.
    #[inline]
    #[must_use]
    pub fn item_size(&self) -> usize {
        self.spec.item_size as usize
    }

    /// Number of items the store can hold.
    #[inline]
    #[must_use]
    pub fn len_items(&self) -> usize {
        self.words.len() / self.item_size()
    }

    /// Texture side for texel arrays, `None` for linear stores.
    #[must_use]
    pub fn side(&self) -> Option<u32> {
        match self.layout {
            Layout::Linear => None,
            Layout::Texels { side } => Some(side),
        }
    }

    /// Typed view over the whole store.
    #[must_use]
    pub fn values<T: Element>(&self) -> &[T] {
        bytemuck::cast_slice(&self.words)
    }

    /// Components of one item.
    #[must_use]
    pub fn item<T: Element>(&self, item: usize) -> &[T] {
        let size = self.item_size();
        &self.values::<T>()[item * size..(item + 1) * size]
    }

    /// Raw bytes for upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// Writes `values` starting at component offset `offset`.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidArgument`] if `T` does not match the element type
    /// - [`RenderError::InvalidArgument`] if the write runs past the end
    pub fn write<T: Element>(&mut self, offset: usize, values: &[T]) -> RenderResult<()> {
        if T::ELEMENT_TYPE != self.spec.element_type {
            return Err(RenderError::InvalidArgument(format!(
                "attribute `{}` holds {:?}, got {:?}",
                self.spec.name,
                self.spec.element_type,
                T::ELEMENT_TYPE
            )));
        }

        let end = offset + values.len();
        if end > self.words.len() {
            return Err(RenderError::InvalidArgument(format!(
                "write of {} components at {offset} overruns attribute `{}` ({} components)",
                values.len(),
                self.spec.name,
                self.words.len()
            )));
        }

        self.words[offset..end].copy_from_slice(bytemuck::cast_slice(values));
        self.needs_update = true;
        Ok(())
    }

    /// Copies raw words whose element type was checked by the caller.
    pub(crate) fn write_words(&mut self, offset: usize, words: &[u32]) {
        self.words[offset..offset + words.len()].copy_from_slice(words);
        self.needs_update = true;
    }

    /// Swaps two items in place.
    pub fn swap_items(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let size = self.item_size();
        for k in 0..size {
            self.words.swap(a * size + k, b * size + k);
        }
        self.needs_update = true;
    }

    /// Zeroes `count` items starting at `start`.
    pub fn zero_items(&mut self, start: usize, count: usize) {
        let size = self.item_size();
        self.words[start * size..(start + count) * size].fill(0);
        self.needs_update = true;
    }

    /// Whether the store changed since the flag was last taken.
    #[inline]
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Returns and clears the update flag.
    pub fn take_needs_update(&mut self) -> bool {
        std::mem::replace(&mut self.needs_update, false)
    }
}

/// The named stores of one allocator.
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    stores: Vec<AttributeStore>,
}

impl AttributeSet {
    /// Builds linear stores of `items` items for each spec.
    ///
    /// # Errors
    ///
    /// Fails on duplicate names or invalid item sizes.
    pub fn linear(specs: &[AttributeSpec], items: u32) -> RenderResult<Self> {
        Self::build(specs, |spec| AttributeStore::linear(spec, items))
    }

    /// Builds texel arrays with room for `rows` items for each spec.
    ///
    /// # Errors
    ///
    /// Fails on duplicate names or item sizes a texel cannot hold.
    pub fn texel_arrays(specs: &[AttributeSpec], rows: u32) -> RenderResult<Self> {
        Self::build(specs, |spec| AttributeStore::texel_array(spec, rows))
    }

    fn build(
        specs: &[AttributeSpec],
        make: impl Fn(AttributeSpec) -> RenderResult<AttributeStore>,
    ) -> RenderResult<Self> {
        let mut stores: Vec<AttributeStore> = Vec::with_capacity(specs.len());
        for spec in specs {
            if stores.iter().any(|store| store.name() == spec.name) {
                return Err(RenderError::UnsupportedConfiguration(format!(
                    "attribute `{}` declared twice",
                    spec.name
                )));
            }
            stores.push(make(spec.clone())?);
        }
        Ok(Self { stores })
    }

    /// Looks up a store by name.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownAttribute`] if no store has this name.
    pub fn get(&self, name: &str) -> RenderResult<&AttributeStore> {
        self.stores
            .iter()
            .find(|store| store.name() == name)
            .ok_or_else(|| RenderError::UnknownAttribute(name.to_owned()))
    }

    /// Looks up a store by name, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownAttribute`] if no store has this name.
    pub fn get_mut(&mut self, name: &str) -> RenderResult<&mut AttributeStore> {
        self.stores
            .iter_mut()
            .find(|store| store.name() == name)
            .ok_or_else(|| RenderError::UnknownAttribute(name.to_owned()))
    }

    /// Iterates over all stores.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeStore> {
        self.stores.iter()
    }

    /// Iterates mutably over all stores.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AttributeStore> {
        self.stores.iter_mut()
    }

    /// Number of stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// True when no attribute is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Swaps item `a` and item `b` in every store.
    pub fn swap_items(&mut self, a: usize, b: usize) {
        for store in &mut self.stores {
            store.swap_items(a, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_side_rounds_up() {
        assert_eq!(texture_side(1), 16);
        assert_eq!(texture_side(256), 16);
        assert_eq!(texture_side(257), 32);
        assert_eq!(texture_side(3 * 4 * 100), 64);
    }

    #[test]
    fn test_write_and_swap() {
        let spec = AttributeSpec::new("offset", ElementType::Float32, 3);
        let mut store = AttributeStore::texel_array(spec, 10).unwrap();
        assert_eq!(store.side(), Some(16));
        assert_eq!(store.len_items(), 256);

        store.write(0, &[1.0f32, 2.0, 3.0]).unwrap();
        store.write(6, &[7.0f32, 8.0, 9.0]).unwrap();
        assert!(store.take_needs_update());
        assert!(!store.needs_update());

        store.swap_items(0, 2);
        assert_eq!(store.item::<f32>(0), &[7.0, 8.0, 9.0]);
        assert_eq!(store.item::<f32>(2), &[1.0, 2.0, 3.0]);
        assert!(store.needs_update());
    }

    #[test]
    fn test_write_rejects_wrong_type_and_overrun() {
        let spec = AttributeSpec::new("id", ElementType::Uint32, 1);
        let mut store = AttributeStore::linear(spec, 4).unwrap();

        assert!(matches!(store.write(0, &[1.0f32]), Err(RenderError::InvalidArgument(_))));
        assert!(matches!(store.write(3, &[1u32, 2]), Err(RenderError::InvalidArgument(_))));
        store.write(3, &[9u32]).unwrap();
        assert_eq!(store.values::<u32>(), &[0, 0, 0, 9]);
    }

    #[test]
    fn test_texel_item_size_limit() {
        let spec = AttributeSpec::new("matrix", ElementType::Float32, 16);
        assert!(matches!(
            AttributeStore::texel_array(spec, 8),
            Err(RenderError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_set_lookup_and_duplicates() {
        let specs = vec![
            AttributeSpec::new("a", ElementType::Float32, 1),
            AttributeSpec::new("b", ElementType::Int32, 2),
        ];
        let set = AttributeSet::linear(&specs, 8).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("b").unwrap().len_items(), 8);
        assert!(matches!(set.get("c"), Err(RenderError::UnknownAttribute(_))));

        let dup = vec![specs[0].clone(), specs[0].clone()];
        assert!(AttributeSet::linear(&dup, 8).is_err());
    }
}
