//! Culling statistics.

/// Statistics from the last draw-spec pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Live draws (or allocated draw-call slots) considered.
    pub draws_tested: u32,
    /// Draws emitted.
    pub draws_visible: u32,
    /// Draws dropped by the frustum test.
    pub frustum_culled: u32,
    /// Draws dropped by the occlusion search.
    pub occlusion_culled: u32,
    /// Active instances tested.
    pub instances_tested: u32,
    /// Instances left visible after compaction.
    pub instances_visible: u32,
}

impl CullStats {
    /// Fraction of draws removed, 0.0 when nothing was tested.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cull_rate(&self) -> f32 {
        if self.draws_tested > 0 {
            (self.draws_tested - self.draws_visible) as f32 / self.draws_tested as f32
        } else {
            0.0
        }
    }

    /// Instances removed by per-instance culling.
    #[must_use]
    pub fn instances_culled(&self) -> u32 {
        self.instances_tested - self.instances_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_rate() {
        let stats = CullStats {
            draws_tested: 4,
            draws_visible: 1,
            ..CullStats::default()
        };
        assert!((stats.cull_rate() - 0.75).abs() < f32::EPSILON);
        assert_eq!(CullStats::default().cull_rate(), 0.0);
    }
}
