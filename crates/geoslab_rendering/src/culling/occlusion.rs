//! Chunk-adjacency occlusion culling.
//!
//! Draws of an occlusion-enabled allocator are cubic chunk cells. Each cell
//! carries a [`PeekMask`] saying between which pairs of its faces visibility
//! can pass. Starting from a seed below the camera's chunk, a breadth-first
//! search walks face neighbours through open face pairs; every chunk it
//! reaches goes into the culled set.
//!
//! Neighbour lookup is a hash of quantized cell coordinates, so each BFS
//! step is O(1) instead of a scan over all live chunks.

use std::collections::{HashMap, HashSet, VecDeque};

use bytemuck::{Pod, Zeroable};

use crate::config::OcclusionConfig;

/// One of the six axis-aligned faces of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    /// +Z
    Front,
    /// -Z
    Back,
    /// -X
    Left,
    /// +X
    Right,
    /// +Y
    Top,
    /// -Y
    Bottom,
}

impl Face {
    /// All faces, in index order.
    pub const ALL: [Face; 6] = [
        Face::Front,
        Face::Back,
        Face::Left,
        Face::Right,
        Face::Top,
        Face::Bottom,
    ];

    /// Index in `0..6`.
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Face::Front => 0,
            Face::Back => 1,
            Face::Left => 2,
            Face::Right => 3,
            Face::Top => 4,
            Face::Bottom => 5,
        }
    }

    /// The face on the other side of the cell.
    #[must_use]
    pub const fn opposite(self) -> Face {
        match self {
            Face::Front => Face::Back,
            Face::Back => Face::Front,
            Face::Left => Face::Right,
            Face::Right => Face::Left,
            Face::Top => Face::Bottom,
            Face::Bottom => Face::Top,
        }
    }

    /// Cell step when leaving through this face.
    #[must_use]
    pub const fn offset(self) -> [i32; 3] {
        match self {
            Face::Front => [0, 0, 1],
            Face::Back => [0, 0, -1],
            Face::Left => [-1, 0, 0],
            Face::Right => [1, 0, 0],
            Face::Top => [0, 1, 0],
            Face::Bottom => [0, -1, 0],
        }
    }
}

/// Which pairs of faces of a cell see each other.
///
/// One bit per unordered pair of distinct faces, 15 bits in total.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct PeekMask(pub u16);

impl PeekMask {
    /// No face sees any other.
    pub const CLOSED: Self = Self(0);
    /// Every face sees every other.
    pub const OPEN: Self = Self(0x7fff);

    /// Bit index of the pair `(a, b)`, `None` when `a == b`.
    #[must_use]
    pub const fn pair_bit(a: Face, b: Face) -> Option<u32> {
        let (i, j) = if a.index() < b.index() {
            (a.index(), b.index())
        } else {
            (b.index(), a.index())
        };
        if i == j {
            return None;
        }
        Some(i * (11 - i) / 2 + (j - i - 1))
    }

    /// Mask with the given pairs open.
    #[must_use]
    pub fn from_pairs(pairs: &[(Face, Face)]) -> Self {
        pairs
            .iter()
            .fold(Self::CLOSED, |mask, &(a, b)| mask.with(a, b))
    }

    /// Opens the pair `(a, b)`.
    #[must_use]
    pub fn with(self, a: Face, b: Face) -> Self {
        match Self::pair_bit(a, b) {
            Some(bit) => Self(self.0 | (1 << bit)),
            None => self,
        }
    }

    /// Whether visibility entering through `entry` can leave through `exit`.
    #[must_use]
    pub fn allows(self, entry: Face, exit: Face) -> bool {
        Self::pair_bit(entry, exit).is_some_and(|bit| self.0 & (1 << bit) != 0)
    }
}

/// Integer cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey(pub [i32; 3]);

impl CellKey {
    /// Key of a chunk whose minimum corner is `min`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_min(min: [f32; 3], cell_size: f32) -> Self {
        Self(min.map(|v| (v / cell_size).round() as i32))
    }

    /// Key of the cell containing `point`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn containing(point: [f32; 3], cell_size: f32) -> Self {
        Self(point.map(|v| (v / cell_size).floor() as i32))
    }

    /// Neighbouring key through `face`, clamped at the `i32` range.
    #[must_use]
    pub fn step(self, face: Face) -> Self {
        let d = face.offset();
        Self([
            self.0[0].saturating_add(d[0]),
            self.0[1].saturating_add(d[1]),
            self.0[2].saturating_add(d[2]),
        ])
    }
}

/// Spatial hash of live chunks, kept in lock-step with the draw ordinals.
///
/// `keys[ordinal]` is the cell of draw `ordinal`; `cells` maps back to every
/// ordinal registered in that cell, oldest first.
#[derive(Debug, Clone)]
pub struct OcclusionGraph {
    config: OcclusionConfig,
    cell_size: Option<f32>,
    keys: Vec<CellKey>,
    cells: HashMap<CellKey, Vec<u32>>,
    visited: HashSet<CellKey>,
    queue: VecDeque<(CellKey, Option<Face>)>,
}

impl OcclusionGraph {
    /// Creates an empty graph with room for `capacity` chunks.
    #[must_use]
    pub fn new(config: OcclusionConfig, capacity: usize) -> Self {
        Self {
            config,
            cell_size: None,
            keys: Vec::with_capacity(capacity),
            cells: HashMap::with_capacity(capacity),
            visited: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when no chunk is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Cell edge length, known once the first chunk is registered.
    #[must_use]
    pub fn cell_size(&self) -> Option<f32> {
        self.cell_size
    }

    /// Draw ordinals of the chunks at `key`, oldest first.
    #[must_use]
    pub fn ordinals_at(&self, key: CellKey) -> &[u32] {
        self.cells.get(&key).map_or(&[][..], Vec::as_slice)
    }

    /// Registers the chunk of the next draw ordinal.
    ///
    /// The cell size is taken from the first chunk's X extent.
    #[allow(clippy::cast_possible_truncation)]
    pub fn push(&mut self, min: [f32; 3], max: [f32; 3]) {
        let size = (min[0] - max[0]).abs();
        let cell_size = match self.cell_size {
            Some(cell_size) => {
                if (cell_size - size).abs() > f32::EPSILON * cell_size.max(1.0) {
                    tracing::warn!(cell_size, size, "chunk size differs from the graph's cell size");
                }
                cell_size
            }
            None => {
                let size = if size > 0.0 { size } else { 1.0 };
                self.cell_size = Some(size);
                size
            }
        };

        let key = CellKey::from_min(min, cell_size);
        let ordinal = self.keys.len() as u32;
        let ordinals = self.cells.entry(key).or_default();
        if !ordinals.is_empty() {
            let shared = ordinals.len();
            tracing::debug!(?key, ordinal, shared, "chunk cell already occupied");
        }
        ordinals.push(ordinal);
        self.keys.push(key);
    }

    /// Removes `ordinal`, moving the last chunk into its place.
    #[allow(clippy::cast_possible_truncation)]
    pub fn swap_remove(&mut self, ordinal: u32) {
        let index = ordinal as usize;
        if index >= self.keys.len() {
            return;
        }

        let last = (self.keys.len() - 1) as u32;
        let key = self.keys.swap_remove(index);
        if let Some(ordinals) = self.cells.get_mut(&key) {
            ordinals.retain(|&o| o != ordinal);
            if ordinals.is_empty() {
                self.cells.remove(&key);
            }
        }

        if ordinal != last {
            let moved = self.keys[index];
            if let Some(o) = self
                .cells
                .get_mut(&moved)
                .and_then(|ordinals| ordinals.iter_mut().find(|o| **o == last))
            {
                *o = ordinal;
            }
        }

        if self.keys.is_empty() {
            self.cell_size = None;
        }
    }

    /// Runs the occlusion search and flags every reached chunk in `culled`.
    ///
    /// `camera` is in the allocator's local space, `origin_y` is the world Y
    /// of the allocator's origin. `peeks[ordinal]` is the mask of each chunk
    /// and `culled` must hold one entry per chunk. Returns the number of
    /// chunks newly flagged. Nothing is flagged if the camera is not inside
    /// a registered chunk.
    ///
    /// Every chunk of a reached cell is flagged, and a face pair is open if
    /// any chunk of the cell lets it through.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn cull(
        &mut self,
        camera: [f32; 3],
        origin_y: f32,
        peeks: &[PeekMask],
        culled: &mut [bool],
    ) -> usize {
        let Some(cell_size) = self.cell_size else {
            return 0;
        };

        let camera_key = CellKey::containing(camera, cell_size);
        if !self.cells.contains_key(&camera_key) {
            return 0;
        }

        let band_min = -origin_y + self.config.band_min_cells as f32 * cell_size;
        let band_max = -origin_y + self.config.band_max_cells as f32 * cell_size;
        let seed = CellKey([
            camera_key.0[0],
            camera_key.0[1].saturating_sub(self.config.seed_drop_cells),
            camera_key.0[2],
        ]);

        self.visited.clear();
        self.queue.clear();
        self.visited.insert(seed);
        self.queue.push_back((seed, None));

        let mut flagged = 0;
        while let Some((key, entry)) = self.queue.pop_front() {
            let ordinals = self.cells.get(&key).map_or(&[][..], Vec::as_slice);
            for &ordinal in ordinals {
                let slot = &mut culled[ordinal as usize];
                if !*slot {
                    *slot = true;
                    flagged += 1;
                }
            }

            for exit in Face::ALL {
                if let Some(entry) = entry {
                    let open = ordinals
                        .iter()
                        .any(|&o| peeks[o as usize].allows(entry, exit));
                    if !open {
                        continue;
                    }
                }

                let next = key.step(exit);
                let next_y = next.0[1] as f32 * cell_size;
                if next_y < band_min || next_y >= band_max {
                    continue;
                }
                if !self.cells.contains_key(&next) {
                    continue;
                }
                if self.visited.insert(next) {
                    self.queue.push_back((next, Some(exit.opposite())));
                }
            }
        }

        flagged
    }
}
