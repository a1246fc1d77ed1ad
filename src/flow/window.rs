//! Neighborhood search over a 3D point field.
//!
//! Both flow passes must agree exactly on which source pixel feeds a
//! target pixel, so the search lives in one place: same window clipping,
//! same Euclidean metric, same first-in-scan-order tie-break.

use nalgebra::Vector3;

use crate::tensor::PointField;

/// Best match found inside a search window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMatch {
    /// Matched column in the source frame.
    pub col: usize,
    /// Matched row in the source frame.
    pub row: usize,
    /// Euclidean distance between the query point and the matched point.
    pub distance: f32,
}

/// Find the source pixel whose 3D point lies closest to `query`.
///
/// Scans the square window `[col-k, col+k] x [row-k, row+k]` clipped to
/// the image bounds, columns outer and rows inner, both ascending.
/// Undefined neighbors are skipped. The running minimum uses a strict
/// `<`, so the first neighbor in scan order achieving the minimum wins;
/// this order is part of the matching contract. Returns `None` when the
/// window holds no valid neighbor.
pub fn nearest_in_window(
    points: &PointField,
    batch: usize,
    row: usize,
    col: usize,
    query: &Vector3<f32>,
    kernel_size: usize,
) -> Option<WindowMatch> {
    let x_min = col.saturating_sub(kernel_size);
    let x_max = (col + kernel_size).min(points.width() - 1);
    let y_min = row.saturating_sub(kernel_size);
    let y_max = (row + kernel_size).min(points.height() - 1);

    let mut best: Option<WindowMatch> = None;
    for x in x_min..=x_max {
        for y in y_min..=y_max {
            let Some(candidate) = points.point(batch, y, x) else {
                continue;
            };
            let distance = (query - candidate).norm();
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(WindowMatch {
                    col: x,
                    row: y,
                    distance,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_3x3(points: &[(usize, usize, [f32; 3])]) -> PointField {
        let mut field = PointField::undefined(1, 3, 3);
        for &(h, w, p) in points {
            field.set_point(0, h, w, Vector3::new(p[0], p[1], p[2]));
        }
        field
    }

    #[test]
    fn test_empty_window_returns_none() {
        let field = PointField::undefined(1, 3, 3);
        let query = Vector3::new(0.0, 0.0, 0.0);
        assert_eq!(nearest_in_window(&field, 0, 1, 1, &query, 1), None);
    }

    #[test]
    fn test_picks_nearest_neighbor() {
        let field = field_3x3(&[
            (0, 0, [5.0, 0.0, 0.0]),
            (1, 1, [1.0, 0.0, 0.0]),
            (2, 2, [3.0, 0.0, 0.0]),
        ]);
        let query = Vector3::new(0.0, 0.0, 0.0);

        let m = nearest_in_window(&field, 0, 1, 1, &query, 1).unwrap();
        assert_eq!((m.col, m.row), (1, 1));
        assert_eq!(m.distance, 1.0);
    }

    #[test]
    fn test_tie_break_prefers_scan_order() {
        // Two neighbors at exactly distance 1; the scan runs columns
        // outer, rows inner, so (col 0, row 2) precedes (col 2, row 0).
        let field = field_3x3(&[(2, 0, [1.0, 0.0, 0.0]), (0, 2, [-1.0, 0.0, 0.0])]);
        let query = Vector3::new(0.0, 0.0, 0.0);

        let m = nearest_in_window(&field, 0, 1, 1, &query, 1).unwrap();
        assert_eq!((m.col, m.row), (0, 2));
    }

    #[test]
    fn test_tie_break_same_column_prefers_lower_row() {
        let field = field_3x3(&[(0, 1, [1.0, 0.0, 0.0]), (2, 1, [-1.0, 0.0, 0.0])]);
        let query = Vector3::new(0.0, 0.0, 0.0);

        let m = nearest_in_window(&field, 0, 1, 1, &query, 1).unwrap();
        assert_eq!((m.col, m.row), (1, 0));
    }

    #[test]
    fn test_kernel_zero_searches_same_pixel_only() {
        let field = field_3x3(&[
            (1, 1, [10.0, 0.0, 0.0]),
            (1, 2, [0.1, 0.0, 0.0]), // closer, but outside the window
        ]);
        let query = Vector3::new(0.0, 0.0, 0.0);

        let m = nearest_in_window(&field, 0, 1, 1, &query, 0).unwrap();
        assert_eq!((m.col, m.row), (1, 1));
        assert_eq!(m.distance, 10.0);

        // Same query at an undefined pixel finds nothing.
        assert_eq!(nearest_in_window(&field, 0, 0, 0, &query, 0), None);
    }

    #[test]
    fn test_window_clipped_at_corners() {
        let field = field_3x3(&[(0, 0, [0.0, 0.0, 0.0]), (2, 2, [0.5, 0.0, 0.0])]);
        let query = Vector3::new(0.0, 0.0, 0.0);

        // At (0, 0) with kernel 1 the window covers rows/cols 0..=1 only;
        // the closer point at (2, 2) must not be visible.
        let m = nearest_in_window(&field, 0, 0, 0, &query, 1).unwrap();
        assert_eq!((m.col, m.row), (0, 0));

        // At the opposite corner the window covers rows/cols 1..=2.
        let m = nearest_in_window(&field, 0, 2, 2, &query, 1).unwrap();
        assert_eq!((m.col, m.row), (2, 2));
    }

    #[test]
    fn test_oversized_kernel_covers_whole_image() {
        let field = field_3x3(&[(0, 2, [1.0, 2.0, 3.0])]);
        let query = Vector3::new(1.0, 2.0, 3.0);

        let m = nearest_in_window(&field, 0, 2, 0, &query, 100).unwrap();
        assert_eq!((m.col, m.row), (2, 0));
        assert_eq!(m.distance, 0.0);
    }
}
