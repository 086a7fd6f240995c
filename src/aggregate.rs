use geo::{LineString, Polygon};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{kernel, Grid, SamplingGrid, SplitResult};

/// One stored split, as decoded rings. Nothing guarantees the rings are valid.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub east: LineString,
    pub west: LineString,
}

impl From<SplitResult> for Submission {
    fn from(split: SplitResult) -> Self {
        let (east, west) = split.into_rings();
        Self { east, west }
    }
}

/// Per-cell votes. Cells outside the boundary always stay at 0.
#[derive(Clone, Debug, PartialEq)]
pub struct VoteCounts {
    pub east: Grid<u32>,
    pub west: Grid<u32>,
}

impl VoteCounts {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            east: Grid::new(cols, rows, 0),
            west: Grid::new(cols, rows, 0),
        }
    }

    pub fn total(&self, idx: usize) -> u32 {
        self.east.data[idx] + self.west.data[idx]
    }

    /// Element-wise sum. Order doesn't matter, so partial results from any partitioning of the
    /// work can be merged.
    pub fn merge(&mut self, other: &VoteCounts) {
        for (a, b) in self.east.data.iter_mut().zip(&other.east.data) {
            *a += b;
        }
        for (a, b) in self.west.data.iter_mut().zip(&other.west.data) {
            *a += b;
        }
    }
}

/// Data quality diagnostics from one aggregation pass
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AggregateStats {
    pub submissions: usize,
    /// Submissions with a malformed ring, contributing nothing
    pub skipped_submissions: usize,
    /// (cell, submission) pairs where the cell fell in neither side, or the test failed
    pub skipped_cells: usize,
}

impl AggregateStats {
    fn merge(&mut self, other: AggregateStats) {
        self.submissions += other.submissions;
        self.skipped_submissions += other.skipped_submissions;
        self.skipped_cells += other.skipped_cells;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub counts: VoteCounts,
    pub stats: AggregateStats,
}

impl Aggregate {
    fn empty(grid: &SamplingGrid) -> Self {
        Self {
            counts: VoteCounts::new(grid.cols(), grid.rows()),
            stats: AggregateStats::default(),
        }
    }

    fn merge(mut self, other: Aggregate) -> Self {
        self.counts.merge(&other.counts);
        self.stats.merge(other.stats);
        self
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Outcome {
    Untested,
    Counted,
    Failed,
}

/// Count, for every in-boundary cell, how many submissions put it on each side. Work is split
/// by submission across the current rayon pool. Always recomputes from scratch.
pub fn aggregate(grid: &SamplingGrid, submissions: &[Submission]) -> Aggregate {
    let result = submissions
        .par_iter()
        .fold(
            || Aggregate::empty(grid),
            |mut acc, submission| {
                tally_submission(grid, submission, &mut acc);
                acc
            },
        )
        .reduce(|| Aggregate::empty(grid), Aggregate::merge);

    let stats = result.stats;
    info!(
        "Aggregated {} submissions over {} cells",
        stats.submissions,
        grid.num_in_boundary()
    );
    if stats.skipped_submissions > 0 {
        warn!(
            "Skipped {} malformed submissions",
            stats.skipped_submissions
        );
    }
    if stats.skipped_cells > 0 {
        warn!(
            "{} cell tests didn't land on either side of a submission",
            stats.skipped_cells
        );
    }
    result
}

fn tally_submission(grid: &SamplingGrid, submission: &Submission, acc: &mut Aggregate) {
    acc.stats.submissions += 1;
    let (east, west) = match (
        kernel::polygon_from_ring(submission.east.clone()),
        kernel::polygon_from_ring(submission.west.clone()),
    ) {
        (Ok(east), Ok(west)) => (east, west),
        (Err(err), _) | (_, Err(err)) => {
            debug!("Skipping a submission: {err}");
            acc.stats.skipped_submissions += 1;
            return;
        }
    };

    let mut outcomes = vec![Outcome::Untested; grid.len()];
    let mut counted = 0;
    // East is tested first, so a cell on the dividing line counts as east
    counted += tally_side(grid, &east, &mut outcomes, &mut acc.counts.east);
    counted += tally_side(grid, &west, &mut outcomes, &mut acc.counts.west);
    acc.stats.skipped_cells += grid.num_in_boundary() - counted;
}

/// Returns the number of newly counted cells
fn tally_side(
    grid: &SamplingGrid,
    polygon: &Polygon,
    outcomes: &mut [Outcome],
    counts: &mut Grid<u32>,
) -> usize {
    let Some(bbox) = kernel::bounding_box(polygon) else {
        return 0;
    };
    let mut counted = 0;
    for idx in grid.cells_within(&bbox) {
        if outcomes[idx] != Outcome::Untested {
            continue;
        }
        match kernel::point_in_polygon(polygon, grid.centroid(idx)) {
            Ok(true) => {
                counts.data[idx] += 1;
                outcomes[idx] = Outcome::Counted;
                counted += 1;
            }
            Ok(false) => {}
            Err(_) => {
                outcomes[idx] = Outcome::Failed;
            }
        }
    }
    counted
}
