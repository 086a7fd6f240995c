use anyhow::{bail, Result};
use geo::{Coord, Intersects, Polygon, Rect};
use log::info;
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};

use crate::{kernel, Grid};

type IndexedCentroid = GeomWithData<[f64; 2], usize>;

/// A fixed lattice over the boundary's bounding box. Row 0 touches the minimum latitude. Which
/// cells fall inside the boundary is decided once, by the cell's centroid.
pub struct SamplingGrid {
    pub bounds: Rect,
    pub cell_width: f64,
    pub cell_height: f64,
    /// Which cell centroids lie inside the boundary
    pub in_boundary: Grid<bool>,
    centroids: Vec<Coord>,
    /// Only the in-boundary centroids
    index: RTree<IndexedCentroid>,
}

impl SamplingGrid {
    /// Deterministic for the same inputs, so counts computed against one build stay valid for
    /// another.
    pub fn new(boundary: &Polygon, cols: usize, rows: usize) -> Result<Self> {
        if cols == 0 || rows == 0 {
            bail!("A sampling grid needs at least one cell, not {cols}x{rows}");
        }
        let Some(bounds) = kernel::bounding_box(boundary) else {
            bail!("The boundary polygon is empty");
        };
        let cell_width = bounds.width() / cols as f64;
        let cell_height = bounds.height() / rows as f64;

        let mut in_boundary = Grid::new(cols, rows, false);
        let mut centroids = Vec::with_capacity(cols * rows);
        let mut indexed = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                let pt = Coord {
                    x: bounds.min().x + (col as f64 + 0.5) * cell_width,
                    y: bounds.min().y + (row as f64 + 0.5) * cell_height,
                };
                let idx = in_boundary.idx(col, row);
                // The centroids are always finite
                if kernel::point_in_polygon(boundary, pt).unwrap_or(false) {
                    in_boundary.data[idx] = true;
                    indexed.push(GeomWithData::new([pt.x, pt.y], idx));
                }
                centroids.push(pt);
            }
        }
        info!(
            "Sampling grid of {cols}x{rows} has {} cells inside the boundary",
            indexed.len()
        );

        Ok(Self {
            bounds,
            cell_width,
            cell_height,
            in_boundary,
            centroids,
            index: RTree::bulk_load(indexed),
        })
    }

    pub fn cols(&self) -> usize {
        self.in_boundary.width
    }

    pub fn rows(&self) -> usize {
        self.in_boundary.height
    }

    pub fn len(&self) -> usize {
        self.in_boundary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_boundary.is_empty()
    }

    pub fn num_in_boundary(&self) -> usize {
        self.index.size()
    }

    pub fn centroid(&self, idx: usize) -> Coord {
        self.centroids[idx]
    }

    pub fn is_in_boundary(&self, idx: usize) -> bool {
        self.in_boundary.data[idx]
    }

    /// The in-boundary cells whose centroid lies within `rect`, in no particular order
    pub fn cells_within(&self, rect: &Rect) -> impl Iterator<Item = usize> + '_ {
        let envelope =
            AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        self.index
            .locate_in_envelope(&envelope)
            .map(|pt| pt.data)
    }

    /// The rectangle covered by one cell
    pub fn cell_rect(&self, idx: usize) -> Rect {
        let (col, row) = self.in_boundary.xy(idx);
        let min = Coord {
            x: self.bounds.min().x + col as f64 * self.cell_width,
            y: self.bounds.min().y + row as f64 * self.cell_height,
        };
        Rect::new(
            min,
            Coord {
                x: min.x + self.cell_width,
                y: min.y + self.cell_height,
            },
        )
    }

    /// Which cell covers a point, if it's within the bounding box at all
    pub fn cell_at(&self, pt: Coord) -> Option<usize> {
        if !self.bounds.intersects(&pt) {
            return None;
        }
        let col = ((pt.x - self.bounds.min().x) / self.cell_width) as usize;
        let row = ((pt.y - self.bounds.min().y) / self.cell_height) as usize;
        // The max edge belongs to the last cell
        Some(
            self.in_boundary
                .idx(col.min(self.cols() - 1), row.min(self.rows() - 1)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_triangle_mask() {
        // Lower-right triangle of the unit square
        let triangle = polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.)];
        let grid = SamplingGrid::new(&triangle, 2, 2).unwrap();
        assert_eq!(2, grid.cols());
        assert_eq!(2, grid.rows());

        // Row 0 is the southern edge
        assert_eq!(Coord { x: 0.25, y: 0.25 }, grid.centroid(0));
        assert_eq!(Coord { x: 0.75, y: 0.75 }, grid.centroid(3));

        // (0.25, 0.75) is above the diagonal; the other centroids sit on or below it
        assert_eq!(vec![true, true, false, true], grid.in_boundary.data);
        assert_eq!(3, grid.num_in_boundary());
    }

    #[test]
    fn test_deterministic() {
        let square = polygon![(x: 0., y: 0.), (x: 4., y: 0.), (x: 4., y: 3.), (x: 0., y: 3.)];
        let a = SamplingGrid::new(&square, 7, 5).unwrap();
        let b = SamplingGrid::new(&square, 7, 5).unwrap();
        assert_eq!(a.in_boundary, b.in_boundary);
        assert_eq!(35, a.num_in_boundary());
    }

    #[test]
    fn test_lookup() {
        let square = polygon![(x: 0., y: 0.), (x: 4., y: 0.), (x: 4., y: 4.), (x: 0., y: 4.)];
        let grid = SamplingGrid::new(&square, 4, 4).unwrap();
        assert_eq!(Some(grid.in_boundary.idx(1, 2)), grid.cell_at(Coord { x: 1.5, y: 2.2 }));
        assert_eq!(Some(15), grid.cell_at(Coord { x: 4.0, y: 4.0 }));
        assert_eq!(None, grid.cell_at(Coord { x: 5.0, y: 1.0 }));

        let rect = grid.cell_rect(5);
        assert_eq!(Coord { x: 1.0, y: 1.0 }, rect.min());

        let mut cells: Vec<usize> = grid
            .cells_within(&Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 2.0, y: 1.0 }))
            .collect();
        cells.sort();
        assert_eq!(vec![0, 1], cells);
    }

    #[test]
    fn test_no_cells() {
        let square = polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 1.)];
        assert!(SamplingGrid::new(&square, 0, 3).is_err());
    }
}
