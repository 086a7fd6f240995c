use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

use geo::Coord;

use crate::{Grid, SamplingGrid, VoteCounts};

/// The east share of a cell's votes, as a reduced fraction. Two cells are in the same band only
/// if these match exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ratio {
    east: u32,
    total: u32,
}

impl Ratio {
    /// None if there are no votes
    pub fn new(east: u32, west: u32) -> Option<Ratio> {
        let total = east + west;
        if total == 0 {
            return None;
        }
        let divisor = gcd(east, total);
        Some(Ratio {
            east: east / divisor,
            total: total / divisor,
        })
    }

    pub const ALL_EAST: Ratio = Ratio { east: 1, total: 1 };
    pub const ALL_WEST: Ratio = Ratio { east: 0, total: 1 };

    pub fn east(self) -> u32 {
        self.east
    }

    pub fn total(self) -> u32 {
        self.total
    }

    /// In [0, 1]
    pub fn east_share(self) -> f64 {
        self.east as f64 / self.total as f64
    }

    pub fn unanimous(self) -> Option<Side> {
        if self == Ratio::ALL_EAST {
            Some(Side::East)
        } else if self == Ratio::ALL_WEST {
            Some(Side::West)
        } else {
            None
        }
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.east as u64 * other.total as u64).cmp(&(other.east as u64 * self.total as u64))
    }
}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    East,
    West,
}

/// One legend segment. Sized by how many cells share the ratio, not by geographic area.
#[derive(Clone, Debug, PartialEq)]
pub struct LegendBand {
    pub ratio: Ratio,
    pub cells: usize,
    /// Share of all counted cells
    pub fraction: f64,
}

/// A 4-connected group of cells with exactly the same ratio
#[derive(Clone, Debug, PartialEq)]
pub struct Band {
    pub ratio: Ratio,
    pub cells: Vec<usize>,
}

/// A unanimous band, with a point to hang its label on
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledRegion {
    pub side: Side,
    pub cells: Vec<usize>,
    /// The mean of the member cells' centroids
    pub anchor: Coord,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Labels {
    /// Sorted by ascending east share
    pub legend: Vec<LegendBand>,
    pub regions: Vec<LabeledRegion>,
}

/// The ratio per cell, or None for cells outside the boundary or without votes
pub fn cell_ratios(grid: &SamplingGrid, counts: &VoteCounts) -> Grid<Option<Ratio>> {
    let mut ratios = Grid::new(grid.cols(), grid.rows(), None);
    for idx in 0..grid.len() {
        if grid.is_in_boundary(idx) {
            ratios.data[idx] = Ratio::new(counts.east.data[idx], counts.west.data[idx]);
        }
    }
    ratios
}

pub fn label(grid: &SamplingGrid, counts: &VoteCounts) -> Labels {
    let ratios = cell_ratios(grid, counts);
    let legend = legend(&ratios);
    let regions = bands(&ratios)
        .into_iter()
        .filter_map(|band| {
            let side = band.ratio.unanimous()?;
            let mut sum = Coord { x: 0.0, y: 0.0 };
            for idx in &band.cells {
                sum = sum + grid.centroid(*idx);
            }
            let anchor = sum / band.cells.len() as f64;
            Some(LabeledRegion {
                side,
                cells: band.cells,
                anchor,
            })
        })
        .collect();
    Labels { legend, regions }
}

pub fn legend(ratios: &Grid<Option<Ratio>>) -> Vec<LegendBand> {
    let mut cells_per_ratio: BTreeMap<Ratio, usize> = BTreeMap::new();
    for ratio in ratios.data.iter().flatten() {
        *cells_per_ratio.entry(*ratio).or_insert(0) += 1;
    }
    let total: usize = cells_per_ratio.values().sum();
    cells_per_ratio
        .into_iter()
        .map(|(ratio, cells)| LegendBand {
            ratio,
            cells,
            fraction: cells as f64 / total as f64,
        })
        .collect()
}

/// Flood fill every connected group of identical ratios. Each counted cell is visited once.
pub fn bands(ratios: &Grid<Option<Ratio>>) -> Vec<Band> {
    let mut visited = Grid::new(ratios.width, ratios.height, false);
    let mut bands = Vec::new();
    for start in 0..ratios.len() {
        let Some(ratio) = ratios.data[start] else {
            continue;
        };
        if visited.data[start] {
            continue;
        }

        let mut cells = Vec::new();
        let mut queue = VecDeque::new();
        visited.data[start] = true;
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            cells.push(current);
            for next in ratios.neighbor_indices(current) {
                if !visited.data[next] && ratios.data[next] == Some(ratio) {
                    visited.data[next] = true;
                    queue.push_back(next);
                }
            }
        }
        bands.push(Band { ratio, cells });
    }
    bands
}
