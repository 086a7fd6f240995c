use geo::{Coord, LineString, Polygon};
use log::{debug, warn};

use crate::{kernel, Config, SplitError};

/// The two sides of a boundary split by one stroke. Each polygon is a single outer ring.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitResult {
    pub east: Polygon,
    pub west: Polygon,
}

impl SplitResult {
    pub fn into_rings(self) -> (LineString, LineString) {
        (self.east.into_inner().0, self.west.into_inner().0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Side {
    Left,
    Right,
}

/// Split `boundary` into east and west using a freehand stroke, with the default tunables.
pub fn split(boundary: &Polygon, stroke: &[Coord]) -> Result<SplitResult, SplitError> {
    split_with_config(boundary, stroke, &Config::default())
}

/// The stroke is treated as a wall. Its endpoints get extended well past the boundary, then
/// each side is closed into a huge mask polygon and clipped against the boundary.
pub fn split_with_config(
    boundary: &Polygon,
    stroke: &[Coord],
    config: &Config,
) -> Result<SplitResult, SplitError> {
    if stroke.len() < 2 {
        return Err(SplitError::no_valid_split(format!(
            "a stroke needs at least 2 points, not {}",
            stroke.len()
        )));
    }
    if stroke.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(SplitError::no_valid_split("stroke has non-finite points"));
    }
    if kernel::is_line_self_intersecting(stroke) {
        return Err(SplitError::no_valid_split("stroke crosses itself"));
    }
    let Some(bbox) = kernel::bounding_box(boundary) else {
        return Err(SplitError::no_valid_split("boundary is empty"));
    };
    let boundary_area = kernel::area(boundary);
    if boundary_area == 0.0 {
        return Err(SplitError::no_valid_split("boundary has no area"));
    }

    let first = stroke[0];
    let last = stroke[stroke.len() - 1];
    let Some(direction) = unit_vector(last - first) else {
        return Err(SplitError::no_valid_split("stroke starts and ends at the same point"));
    };
    let reach = config.extend_factor * kernel::diagonal(&bbox);

    let east_side = east_side(first, last, direction);
    let extended = extend_stroke(stroke, direction, reach);

    // Before clipping anything, make sure the stroke actually cuts through
    let pieces = kernel::slice_polygon(boundary, std::iter::once(&extended)).len();
    if pieces < 2 {
        return Err(SplitError::no_valid_split(
            "stroke doesn't cross the boundary",
        ));
    }
    if pieces > 2 {
        debug!("Stroke crosses the boundary more than once, cutting it into {pieces} pieces");
    }

    let (east_perp, west_perp) = match east_side {
        Side::Right => (right_perpendicular(direction), left_perpendicular(direction)),
        Side::Left => (left_perpendicular(direction), right_perpendicular(direction)),
    };
    let east = clip_side(boundary, &extended, east_perp, reach, "east")?;
    let west = clip_side(boundary, &extended, west_perp, reach, "west")?;

    let covered = kernel::area(&east) + kernel::area(&west);
    if (covered - boundary_area).abs() > config.area_tolerance * boundary_area {
        return Err(SplitError::no_valid_split(format!(
            "the two sides cover {:.1}% of the boundary",
            100.0 * covered / boundary_area
        )));
    }

    Ok(SplitResult { east, west })
}

/// Probe just to the right of the stroke's midpoint. If that's further east, the right side is
/// east. A perfectly horizontal stroke gives a tie; then whichever side is further north counts
/// as east.
fn east_side(first: Coord, last: Coord, direction: Coord) -> Side {
    let mid = (first + last) / 2.0;
    let probe = mid + right_perpendicular(direction);
    if probe.x > mid.x || (probe.x == mid.x && probe.y > mid.y) {
        Side::Right
    } else {
        Side::Left
    }
}

fn unit_vector(v: Coord) -> Option<Coord> {
    let len = v.x.hypot(v.y);
    if len == 0.0 || !len.is_finite() {
        return None;
    }
    Some(v / len)
}

// Rotate 90 degrees clockwise
fn right_perpendicular(v: Coord) -> Coord {
    Coord { x: v.y, y: -v.x }
}

fn left_perpendicular(v: Coord) -> Coord {
    Coord { x: -v.y, y: v.x }
}

fn extend_stroke(stroke: &[Coord], direction: Coord, reach: f64) -> LineString {
    let mut pts = Vec::with_capacity(stroke.len() + 2);
    pts.push(stroke[0] - direction * reach);
    pts.extend_from_slice(stroke);
    pts.push(stroke[stroke.len() - 1] + direction * reach);
    LineString::new(pts)
}

/// Close the extended stroke off with two far corners on one side, then clip to the boundary.
fn clip_side(
    boundary: &Polygon,
    extended: &LineString,
    perpendicular: Coord,
    reach: f64,
    name: &str,
) -> Result<Polygon, SplitError> {
    let mut pts = extended.0.clone();
    let start = pts[0];
    let end = pts[pts.len() - 1];
    pts.push(end + perpendicular * reach);
    pts.push(start + perpendicular * reach);
    let mask = Polygon::new(LineString::new(pts), Vec::new());

    let mut parts = kernel::intersection(boundary, &mask);
    parts.retain(|p| kernel::area(p) > 0.0);
    if parts.is_empty() {
        return Err(SplitError::no_valid_split(format!(
            "nothing of the boundary is on the {name} side"
        )));
    }
    if parts.len() > 1 {
        let total: f64 = parts.iter().map(kernel::area).sum();
        warn!(
            "The {name} side has {} disjoint parts totalling {total}; keeping only the largest",
            parts.len()
        );
    }
    // Keep the biggest part. Areas are never NaN here.
    parts.sort_by(|a, b| kernel::area(b).total_cmp(&kernel::area(a)));
    let (exterior, _) = parts.swap_remove(0).into_inner();
    Ok(Polygon::new(exterior, Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon, Centroid};

    fn unit_square() -> Polygon {
        polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 1.)]
    }

    fn assert_partition(boundary: &Polygon, result: &SplitResult) {
        let total = kernel::area(&result.east) + kernel::area(&result.west);
        let expected = kernel::area(boundary);
        assert!(
            (total - expected).abs() <= 0.001 * expected,
            "{total} vs {expected}"
        );
        let overlap: f64 = kernel::intersection(&result.east, &result.west)
            .iter()
            .map(kernel::area)
            .sum();
        assert!(overlap < 1e-6 * expected, "sides overlap by {overlap}");
    }

    #[test]
    fn test_vertical_split() {
        let square = unit_square();
        let result = split(&square, &[coord! { x: 0.5, y: -1. }, coord! { x: 0.5, y: 2. }]).unwrap();
        assert_partition(&square, &result);
        assert!((kernel::area(&result.east) - 0.5).abs() < 1e-6);
        assert!((kernel::area(&result.west) - 0.5).abs() < 1e-6);
        assert!(result.east.centroid().unwrap().x() > 0.5);
        assert!(result.west.centroid().unwrap().x() < 0.5);
    }

    #[test]
    fn test_direction_doesnt_matter() {
        let square = unit_square();
        let down = split(&square, &[coord! { x: 0.5, y: 2. }, coord! { x: 0.5, y: -1. }]).unwrap();
        assert!(down.east.centroid().unwrap().x() > 0.5);
        assert!(down.west.centroid().unwrap().x() < 0.5);
    }

    #[test]
    fn test_horizontal_north_is_east() {
        let square = unit_square();
        for stroke in [
            [coord! { x: -0.5, y: 0.5 }, coord! { x: 1.5, y: 0.5 }],
            [coord! { x: 1.5, y: 0.5 }, coord! { x: -0.5, y: 0.5 }],
        ] {
            let result = split(&square, &stroke).unwrap();
            assert!(result.east.centroid().unwrap().y() > 0.5);
            assert!(result.west.centroid().unwrap().y() < 0.5);
        }
    }

    #[test]
    fn test_freehand_stroke() {
        let square = unit_square();
        let stroke = [
            coord! { x: 0.5, y: -1. },
            coord! { x: 0.4, y: 0.2 },
            coord! { x: 0.3, y: 0.5 },
            coord! { x: 0.45, y: 0.9 },
            coord! { x: 0.5, y: 2. },
        ];
        let result = split(&square, &stroke).unwrap();
        assert_partition(&square, &result);
        assert!(kernel::area(&result.west) < 0.5);
    }

    #[test]
    fn test_short_stroke() {
        let square = unit_square();
        assert!(matches!(
            split(&square, &[]),
            Err(SplitError::NoValidSplit { .. })
        ));
        assert!(matches!(
            split(&square, &[coord! { x: 0.5, y: 0.5 }]),
            Err(SplitError::NoValidSplit { .. })
        ));
        assert!(matches!(
            split(&square, &[coord! { x: 0.5, y: 0.5 }, coord! { x: 0.5, y: 0.5 }]),
            Err(SplitError::NoValidSplit { .. })
        ));
    }

    #[test]
    fn test_stroke_misses_boundary() {
        let square = unit_square();
        // Extending a vertical line at x=5 still never touches the square
        assert!(matches!(
            split(&square, &[coord! { x: 5., y: 0. }, coord! { x: 5., y: 1. }]),
            Err(SplitError::NoValidSplit { .. })
        ));
    }

    fn assert_crosses_itself(boundary: &Polygon, stroke: &[Coord]) {
        match split(boundary, stroke) {
            Err(SplitError::NoValidSplit { reason }) => {
                assert_eq!("stroke crosses itself", reason)
            }
            other => panic!("expected a self-crossing stroke to be rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_looping_stroke_rejected() {
        let square = unit_square();
        // A tiny loop barely changes either side's area, but still isn't a valid wall
        assert_crosses_itself(
            &square,
            &[
                coord! { x: 0.5, y: -1. },
                coord! { x: 0.5, y: 0.51 },
                coord! { x: 0.51, y: 0.51 },
                coord! { x: 0.51, y: 0.5 },
                coord! { x: 0.49, y: 0.5 },
                coord! { x: 0.49, y: 0.52 },
                coord! { x: 0.5, y: 0.52 },
                coord! { x: 0.5, y: 2. },
            ],
        );
        assert_crosses_itself(
            &square,
            &[
                coord! { x: 0.5, y: -1. },
                coord! { x: 0.5, y: 0.7 },
                coord! { x: 0.8, y: 0.7 },
                coord! { x: 0.8, y: 0.3 },
                coord! { x: 0.2, y: 0.3 },
                coord! { x: 0.2, y: 0.8 },
                coord! { x: 0.5, y: 0.8 },
                coord! { x: 0.5, y: 2. },
            ],
        );
    }

    #[test]
    fn test_multiple_crossings_rejected() {
        // A U shape; a horizontal line through both arms leaves two northern pieces
        let u = polygon![
            (x: 0., y: 0.),
            (x: 3., y: 0.),
            (x: 3., y: 3.),
            (x: 2., y: 3.),
            (x: 2., y: 1.),
            (x: 1., y: 1.),
            (x: 1., y: 3.),
            (x: 0., y: 3.),
        ];
        assert!(matches!(
            split(&u, &[coord! { x: -1., y: 2. }, coord! { x: 4., y: 2. }]),
            Err(SplitError::NoValidSplit { .. })
        ));

        // But a vertical line through the base is fine
        let result = split(&u, &[coord! { x: 1.5, y: -1. }, coord! { x: 1.5, y: 4. }]).unwrap();
        assert_partition(&u, &result);
        assert!((kernel::area(&result.east) - 3.5).abs() < 1e-6);
    }
}
