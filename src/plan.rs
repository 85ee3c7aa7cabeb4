//! Mip pyramid planning.
//!
//! Pure functions, no I/O. Given a base size, a [`LevelPolicy`] and a
//! minimum dimension, decide which levels to render and at what size.
//!
//! ```text
//! base 1024x512, auto, min 4
//!
//! level 0  1024x512
//! level 1   512x256
//! ...
//! level 7     8x4
//! level 8     4x2   ← height < 4, stop
//! ```

use crate::types::{LevelPolicy, MipLevel};

/// Number of levels needed to shrink the larger dimension down to 1px.
///
/// `floor(log2(max(width, height))) + 1`. A 2048px base yields 12 levels,
/// a 1920px base 11.
pub fn auto_level_count(width: u32, height: u32) -> u32 {
    width.max(height).max(1).ilog2() + 1
}

/// Requested level count before any minimum-dimension truncation.
pub fn level_count(policy: LevelPolicy, width: u32, height: u32) -> u32 {
    match policy {
        LevelPolicy::Auto => auto_level_count(width, height),
        LevelPolicy::Fixed(n) => n,
    }
}

/// Size of `base` at `index`: `floor(base / 2^index)`.
pub fn level_dimension(base: u32, index: u32) -> u32 {
    base.checked_shr(index).unwrap_or(0)
}

/// Plan the pyramid, largest level first.
///
/// Yields `level_count` levels, cut short the first time a level's width
/// or height would drop below `min_dimension`.
pub fn plan_levels(
    base_width: u32,
    base_height: u32,
    policy: LevelPolicy,
    min_dimension: u32,
) -> Vec<MipLevel> {
    let count = level_count(policy, base_width, base_height);

    (0..count)
        .map(|index| {
            (
                index,
                level_dimension(base_width, index),
                level_dimension(base_height, index),
            )
        })
        .take_while(|&(_, w, h)| w >= min_dimension && h >= min_dimension)
        .map(|(index, w, h)| MipLevel::new(index, w, h))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(levels: &[MipLevel]) -> Vec<(u32, u32)> {
        levels.iter().map(|l| (l.width, l.height)).collect()
    }

    // =========================================================================
    // auto_level_count
    // =========================================================================

    #[test]
    fn auto_count_power_of_two() {
        assert_eq!(auto_level_count(2048, 2048), 12);
        assert_eq!(auto_level_count(1, 1), 1);
    }

    #[test]
    fn auto_count_non_power_of_two() {
        // floor(log2(1920)) + 1 = 10 + 1
        assert_eq!(auto_level_count(1920, 1080), 11);
    }

    #[test]
    fn auto_count_uses_larger_dimension() {
        assert_eq!(auto_level_count(256, 4096), 13);
    }

    #[test]
    fn fixed_count_is_taken_verbatim() {
        assert_eq!(level_count(LevelPolicy::Fixed(3), 4096, 4096), 3);
        assert_eq!(level_count(LevelPolicy::Fixed(1), 4096, 4096), 1);
    }

    // =========================================================================
    // level_dimension
    // =========================================================================

    #[test]
    fn level_dimension_halves_and_floors() {
        assert_eq!(level_dimension(4096, 3), 512);
        assert_eq!(level_dimension(1080, 1), 540);
        assert_eq!(level_dimension(1080, 4), 67);
        assert_eq!(level_dimension(5, 3), 0);
    }

    #[test]
    fn level_dimension_large_shift_is_zero() {
        assert_eq!(level_dimension(u32::MAX, 32), 0);
        assert_eq!(level_dimension(1024, 40), 0);
    }

    // =========================================================================
    // plan_levels
    // =========================================================================

    #[test]
    fn level_zero_is_base_size() {
        let levels = plan_levels(1920, 1080, LevelPolicy::Auto, 1);
        assert_eq!((levels[0].index, levels[0].width, levels[0].height), (0, 1920, 1080));
    }

    #[test]
    fn fixed_three_levels() {
        let levels = plan_levels(1024, 1024, LevelPolicy::Fixed(3), 1);
        assert_eq!(sizes(&levels), vec![(1024, 1024), (512, 512), (256, 256)]);
        let indices: Vec<u32> = levels.iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn base_only() {
        let levels = plan_levels(4096, 4096, LevelPolicy::Fixed(1), 1);
        assert_eq!(sizes(&levels), vec![(4096, 4096)]);
    }

    #[test]
    fn auto_square_reaches_one_pixel() {
        let levels = plan_levels(2048, 2048, LevelPolicy::Auto, 1);
        assert_eq!(levels.len(), 12);
        assert_eq!(sizes(&levels).last(), Some(&(1, 1)));
    }

    #[test]
    fn auto_rectangle_stops_when_short_side_hits_zero() {
        // 1920x1080: derived count 11, but height reaches 0 at level 11,
        // and level 10 is 1x1.
        let levels = plan_levels(1920, 1080, LevelPolicy::Auto, 1);
        assert_eq!(levels.len(), 11);
        assert_eq!(sizes(&levels).last(), Some(&(1, 1)));

        let levels = plan_levels(2048, 256, LevelPolicy::Auto, 1);
        // height drops to 0 at level 9 before the derived 12 are exhausted
        assert_eq!(levels.len(), 9);
        assert_eq!(sizes(&levels).last(), Some(&(8, 1)));
    }

    #[test]
    fn min_dimension_truncates_early() {
        let levels = plan_levels(1024, 1024, LevelPolicy::Auto, 4);
        assert_eq!(levels.len(), 9);
        assert_eq!(sizes(&levels).last(), Some(&(4, 4)));
    }

    #[test]
    fn min_dimension_beats_fixed_count() {
        let levels = plan_levels(64, 64, LevelPolicy::Fixed(12), 16);
        assert_eq!(sizes(&levels), vec![(64, 64), (32, 32), (16, 16)]);
    }

    #[test]
    fn sequence_is_strictly_decreasing() {
        let levels = plan_levels(3000, 1700, LevelPolicy::Auto, 1);
        for pair in levels.windows(2) {
            assert_eq!(pair[1].width, pair[0].width / 2);
            assert_eq!(pair[1].height, pair[0].height / 2);
            assert!(pair[1].width < pair[0].width);
        }
    }

    #[test]
    fn base_smaller_than_minimum_plans_nothing() {
        assert!(plan_levels(2, 2, LevelPolicy::Auto, 4).is_empty());
    }
}
