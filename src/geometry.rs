//! Area and bounding box of a multi-polygon

use crate::contour::Polygon;
use crate::error::{ConvertError, Result};

/// Numeric summary of one instance's polygons
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// `[x_min, y_min, width, height]`
    pub bbox: [f64; 4],
    pub area: f64,
}

/// Reduce the polygons of one instance to their bounding box and total area
///
/// Rings are assumed not to overlap, so the area is the plain sum of each
/// ring's absolute area.
pub fn reduce(polygons: &[Polygon]) -> Result<Geometry> {
    if polygons.is_empty() {
        return Err(ConvertError::EmptyGeometry);
    }

    let area = polygons.iter().map(|p| ring_area(p.points())).sum();

    let (x_min, y_min, x_max, y_max) = polygons.iter().flat_map(|p| p.points()).fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(x_min, y_min, x_max, y_max), &(x, y)| {
            (x_min.min(x), y_min.min(y), x_max.max(x), y_max.max(y))
        },
    );

    Ok(Geometry {
        bbox: [x_min, y_min, x_max - x_min, y_max - y_min],
        area,
    })
}

/// Shoelace formula; a repeated closing vertex contributes nothing
pub fn ring_area(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let n = points.len();
    let twice_area: f64 = (0..n)
        .map(|i| {
            let (x_i, y_i) = points[i];
            let (x_j, y_j) = points[(i + 1) % n];
            x_i * y_j - x_j * y_i
        })
        .sum();

    twice_area.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::trace;
    use crate::mask::BinaryMask;

    fn rect_mask(width: usize, height: usize, rects: &[(usize, usize, usize, usize)]) -> BinaryMask {
        let mut values = vec![0u8; width * height];
        for &(x0, y0, w, h) in rects {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    values[y * width + x] = 255;
                }
            }
        }
        BinaryMask::from_values(width, height, &values).unwrap()
    }

    #[test]
    fn test_full_rectangle() {
        let polygons = trace(&rect_mask(5, 3, &[(0, 0, 5, 3)])).unwrap();
        assert_eq!(polygons.len(), 1);
        let geometry = reduce(&polygons).unwrap();
        assert_eq!(geometry.bbox, [0.0, 0.0, 5.0, 3.0]);
        assert_eq!(geometry.area, 15.0);
    }

    #[test]
    fn test_two_disjoint_rectangles() {
        let polygons = trace(&rect_mask(10, 8, &[(1, 1, 2, 2), (5, 4, 4, 3)])).unwrap();
        assert_eq!(polygons.len(), 2);
        let geometry = reduce(&polygons).unwrap();
        assert_eq!(geometry.bbox, [1.0, 1.0, 8.0, 6.0]);
        assert_eq!(geometry.area, 4.0 + 12.0);
    }

    #[test]
    fn test_pinched_ring_area_counts_pixels() {
        let mask = BinaryMask::from_values(2, 2, &[1, 0, 0, 1]).unwrap();
        let geometry = reduce(&trace(&mask).unwrap()).unwrap();
        assert_eq!(geometry.area, 2.0);
        assert_eq!(geometry.bbox, [0.0, 0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(reduce(&[]), Err(ConvertError::EmptyGeometry)));
    }

    #[test]
    fn test_ring_area_orientation_independent() {
        let clockwise = [(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)];
        let mut counter = clockwise.to_vec();
        counter.reverse();
        assert_eq!(ring_area(&clockwise), 12.0);
        assert_eq!(ring_area(&counter), 12.0);
    }

    #[test]
    fn test_open_polygon_from_points() {
        let triangle = Polygon::from_points(vec![(0.0, 0.0), (4.0, 0.0), (0.0, 2.0)]).unwrap();
        let geometry = reduce(&[triangle]).unwrap();
        assert_eq!(geometry.area, 4.0);
        assert_eq!(geometry.bbox, [0.0, 0.0, 4.0, 2.0]);
    }
}
