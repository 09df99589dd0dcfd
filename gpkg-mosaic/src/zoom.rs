//! Zoom level selection for a requested ground resolution.

use geopackage::TileMatrix;

use crate::config::OverviewPolicy;

/// Pick the zoom level to read for a requested horizontal ground resolution.
///
/// `matrices` must be sorted by ascending zoom level, i.e. from the coarsest to the finest.
/// Without a requested resolution, or without any matrix, `native_zoom` is returned.
/// The result is not clamped to the zoom levels that hold tiles, this is up to the caller.
#[must_use]
pub fn select_zoom_level(
    matrices: &[TileMatrix],
    requested_res: Option<f64>,
    policy: OverviewPolicy,
    native_zoom: u8,
) -> u8 {
    let (Some(requested), Some(first)) = (requested_res, matrices.first()) else {
        return native_zoom;
    };
    if !requested.is_finite() {
        return native_zoom;
    }

    let mut zoom = first.zoom_level;
    match policy {
        OverviewPolicy::Nearest => {
            let mut best_diff = f64::INFINITY;
            for m in matrices {
                let diff = (requested - m.pixel_x_size).abs();
                if diff < best_diff {
                    best_diff = diff;
                    zoom = m.zoom_level;
                }
            }
        }
        OverviewPolicy::FavorSpeed => {
            for m in matrices {
                if m.pixel_x_size < requested {
                    break;
                }
                zoom = m.zoom_level;
            }
        }
        OverviewPolicy::FavorQuality => {
            for m in matrices {
                zoom = m.zoom_level;
                if m.pixel_x_size <= requested {
                    break;
                }
            }
        }
    }
    zoom
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    /// World pyramid in degrees, 2^z x 2^(z-1) tiles of 256 pixels.
    fn matrices(zooms: &[u8]) -> Vec<TileMatrix> {
        zooms
            .iter()
            .map(|&zoom_level| {
                let columns = 1_u32 << zoom_level;
                let px = 360.0 / (f64::from(columns) * 256.0);
                TileMatrix {
                    zoom_level,
                    matrix_width: columns,
                    matrix_height: (columns / 2).max(1),
                    tile_width: 256,
                    tile_height: 256,
                    pixel_x_size: px,
                    pixel_y_size: px,
                }
            })
            .collect()
    }

    fn px(zoom: u8) -> f64 {
        360.0 / (f64::from(1_u32 << zoom) * 256.0)
    }

    #[rstest]
    // exact matches
    #[case(OverviewPolicy::Nearest, px(1), 1)]
    #[case(OverviewPolicy::FavorSpeed, px(1), 1)]
    #[case(OverviewPolicy::FavorQuality, px(1), 1)]
    // between zoom 1 and 2, closer to zoom 2
    #[case(OverviewPolicy::Nearest, px(1) * 0.6, 2)]
    #[case(OverviewPolicy::FavorSpeed, px(1) * 0.6, 1)]
    #[case(OverviewPolicy::FavorQuality, px(1) * 0.6, 2)]
    // between zoom 1 and 2, closer to zoom 1
    #[case(OverviewPolicy::Nearest, px(1) * 0.9, 1)]
    #[case(OverviewPolicy::FavorSpeed, px(1) * 0.9, 1)]
    #[case(OverviewPolicy::FavorQuality, px(1) * 0.9, 2)]
    // coarser than every level
    #[case(OverviewPolicy::Nearest, px(0) * 4.0, 0)]
    #[case(OverviewPolicy::FavorSpeed, px(0) * 4.0, 0)]
    #[case(OverviewPolicy::FavorQuality, px(0) * 4.0, 0)]
    // finer than every level
    #[case(OverviewPolicy::Nearest, px(3) / 4.0, 3)]
    #[case(OverviewPolicy::FavorSpeed, px(3) / 4.0, 3)]
    #[case(OverviewPolicy::FavorQuality, px(3) / 4.0, 3)]
    fn select(#[case] policy: OverviewPolicy, #[case] requested: f64, #[case] expected: u8) {
        let levels = matrices(&[0, 1, 2, 3]);
        assert_eq!(select_zoom_level(&levels, Some(requested), policy, 3), expected);
    }

    #[test]
    fn nearest_exact_match_ignores_spacing() {
        // zoom 1 is the only exact match even though zoom 5 and 6 are packed tightly
        let mut levels = matrices(&[0, 1, 5, 6]);
        levels[2].pixel_x_size = px(1) * 0.99;
        levels[3].pixel_x_size = px(1) * 0.98;
        assert_eq!(
            select_zoom_level(&levels, Some(px(1)), OverviewPolicy::Nearest, 6),
            1
        );
    }

    #[test]
    fn world_z10_scenario() {
        // 4096x2048 tiles at zoom 10 give 3.43e-4 degrees per pixel, zoom 11 gives 1.72e-4
        let mut levels = matrices(&[12, 13]);
        levels[0].zoom_level = 10;
        levels[1].zoom_level = 11;
        assert!((levels[0].pixel_x_size - 3.43e-4).abs() < 1e-6);
        assert!((levels[1].pixel_x_size - 1.72e-4).abs() < 1e-6);
        assert_eq!(
            select_zoom_level(&levels, Some(3.2e-4), OverviewPolicy::Nearest, 11),
            10
        );
    }

    #[test]
    fn sparse_pyramid() {
        let levels = matrices(&[2, 5, 9]);
        assert_eq!(
            select_zoom_level(&levels, Some(px(6)), OverviewPolicy::FavorSpeed, 9),
            5
        );
        assert_eq!(
            select_zoom_level(&levels, Some(px(6)), OverviewPolicy::FavorQuality, 9),
            9
        );
        // zoom 9 is 0.875 px(6) away, zoom 5 a full px(6)
        assert_eq!(
            select_zoom_level(&levels, Some(px(6)), OverviewPolicy::Nearest, 9),
            9
        );
    }

    #[test]
    fn without_resolution() {
        let levels = matrices(&[0, 1, 2]);
        assert_eq!(select_zoom_level(&levels, None, OverviewPolicy::Nearest, 2), 2);
        assert_eq!(
            select_zoom_level(&levels, Some(f64::NAN), OverviewPolicy::FavorSpeed, 2),
            2
        );
        assert_eq!(select_zoom_level(&[], Some(1.0), OverviewPolicy::Nearest, 7), 7);
    }
}
