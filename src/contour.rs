//! Raster-to-vector contour tracing
//!
//! Foreground pixels are grouped into 8-connected regions, and the outer
//! boundary of each region is walked along pixel edges. Pixel (row r, col c)
//! covers the cell [c, c+1) x [r, r+1), so every vertex lands on an integer
//! grid corner. Holes inside a region are not reported.

use crate::error::{ConvertError, Result};
use crate::mask::BinaryMask;

/// Closed ring of vertices; the first vertex is repeated at the end
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<(f64, f64)>,
}

impl Polygon {
    /// Build a ring from caller-supplied vertices, closing it if needed
    pub fn from_points(mut points: Vec<(f64, f64)>) -> Result<Self> {
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(ConvertError::MalformedRecord(
                "polygon has non-finite coordinates".to_string(),
            ));
        }

        let mut distinct = points.clone();
        distinct.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        distinct.dedup();
        if distinct.len() < 3 {
            return Err(ConvertError::MalformedRecord(format!(
                "polygon needs at least 3 distinct points, got {}",
                distinct.len()
            )));
        }

        if points.first() != points.last() {
            points.push(points[0]);
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Coordinates as `[x1, y1, x2, y2, ...]`
    pub fn flatten(&self) -> Vec<f64> {
        self.points.iter().flat_map(|&(x, y)| [x, y]).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    East,
    South,
    West,
    North,
}

impl Heading {
    fn step(self) -> (isize, isize) {
        match self {
            Heading::East => (1, 0),
            Heading::South => (0, 1),
            Heading::West => (-1, 0),
            Heading::North => (0, -1),
        }
    }

    fn right(self) -> Self {
        match self {
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
            Heading::North => Heading::East,
        }
    }

    fn left(self) -> Self {
        match self {
            Heading::East => Heading::North,
            Heading::South => Heading::East,
            Heading::West => Heading::South,
            Heading::North => Heading::West,
        }
    }

    /// Pixels (x, y) ahead of vertex (vx, vy), as (ahead-left, ahead-right)
    fn ahead(self, vx: isize, vy: isize) -> ((isize, isize), (isize, isize)) {
        match self {
            Heading::East => ((vx, vy - 1), (vx, vy)),
            Heading::South => ((vx, vy), (vx - 1, vy)),
            Heading::West => ((vx - 1, vy), (vx - 1, vy - 1)),
            Heading::North => ((vx - 1, vy - 1), (vx, vy - 1)),
        }
    }
}

// 8-neighbourhood, row-major
const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

struct RegionLabels {
    width: usize,
    height: usize,
    labels: Vec<u32>,
}

impl RegionLabels {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            labels: vec![0; width * height],
        }
    }

    fn get(&self, x: isize, y: isize) -> u32 {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return 0;
        }
        self.labels[y as usize * self.width + x as usize]
    }

    fn fill(&mut self, mask: &BinaryMask, x: usize, y: usize, label: u32) {
        let mut stack = vec![(x as isize, y as isize)];
        self.labels[y * self.width + x] = label;
        while let Some((cx, cy)) = stack.pop() {
            for (dx, dy) in NEIGHBORS {
                let (nx, ny) = (cx + dx, cy + dy);
                if mask.get(nx, ny) && self.get(nx, ny) == 0 {
                    self.labels[ny as usize * self.width + nx as usize] = label;
                    stack.push((nx, ny));
                }
            }
        }
    }
}

/// Trace every 8-connected foreground region of `mask` into one ring
///
/// Regions come out in raster order of their first pixel and each ring starts
/// at that pixel's top-left corner, walking clockwise (y grows downward).
pub fn trace(mask: &BinaryMask) -> Result<Vec<Polygon>> {
    let (width, height) = (mask.width(), mask.height());
    if width == 0 || height == 0 {
        return Err(ConvertError::InvalidMask(format!(
            "degenerate dimensions {}x{}",
            width, height
        )));
    }

    let mut regions = RegionLabels::new(width, height);
    let mut polygons = Vec::new();
    let mut next_label = 0u32;

    for y in 0..height {
        for x in 0..width {
            if mask.data()[y * width + x] && regions.labels[y * width + x] == 0 {
                next_label += 1;
                regions.fill(mask, x, y, next_label);
                polygons.push(follow_boundary(&regions, x, y, next_label));
            }
        }
    }

    Ok(polygons)
}

/// Walk the outer boundary of region `label`, keeping it on the right-hand side
///
/// At a corner shared only diagonally by two pixels of the region the walk
/// turns towards the diagonal pixel, so the ring stays in one piece and
/// passes through that corner twice.
fn follow_boundary(regions: &RegionLabels, x: usize, y: usize, label: u32) -> Polygon {
    let inside = |(px, py): (isize, isize)| regions.get(px, py) == label;

    let start = (x as isize, y as isize);
    let mut heading = Heading::East;
    let mut vertex = start;
    let mut points = vec![(start.0 as f64, start.1 as f64)];

    loop {
        let (dx, dy) = heading.step();
        vertex = (vertex.0 + dx, vertex.1 + dy);
        if vertex == start {
            break;
        }

        let (ahead_left, ahead_right) = heading.ahead(vertex.0, vertex.1);
        let next = if inside(ahead_left) {
            heading.left()
        } else if inside(ahead_right) {
            heading
        } else {
            heading.right()
        };

        if next != heading {
            points.push((vertex.0 as f64, vertex.1 as f64));
            heading = next;
        }
    }

    points.push(points[0]);
    Polygon { points }
}
