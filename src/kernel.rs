// Planar polygon helpers. Longitude is x and latitude is y; at city scale treating them as a
// flat coordinate system is fine.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Coord, Intersects, LineString, MultiPolygon, Point,
    Polygon, Rect,
};
use i_overlay::core::fill_rule::FillRule;
use i_overlay::float::slice::FloatSlice;

use crate::GeometryError;

/// Every part of `a ∩ b`. Empty if they don't overlap.
pub fn intersection(a: &Polygon, b: &Polygon) -> Vec<Polygon> {
    a.intersection(b).0
}

pub fn difference(a: &Polygon, b: &Polygon) -> Vec<Polygon> {
    a.difference(b).0
}

/// Union everything into one multipolygon.
pub fn union_all(mut list: Vec<Polygon>) -> MultiPolygon {
    let Some(first) = list.pop() else {
        return MultiPolygon(Vec::new());
    };
    let mut result = MultiPolygon(vec![first]);
    for p in list {
        result = result.union(&MultiPolygon(vec![p]));
    }
    result
}

/// Cut a polygon into pieces using open polylines. Lines that don't fully cross the polygon
/// don't contribute a cut.
pub fn slice_polygon<'a>(
    polygon: &Polygon,
    lines: impl Iterator<Item = &'a LineString>,
) -> Vec<Polygon> {
    let mut shape = to_i_overlay_contour(polygon.exterior());

    // geo Polygon's are explicitly closed LineStrings, but i_overlay Polygon's are not.
    shape.pop();

    let splitters: Vec<_> = lines.map(to_i_overlay_contour).collect();
    let shapes = shape.slice_by(&splitters, FillRule::NonZero);

    shapes
        .into_iter()
        .filter_map(|rings| {
            let mut linestrings: Vec<LineString> =
                rings.into_iter().map(to_geo_linestring).collect();
            if linestrings.is_empty() {
                return None;
            }
            let exterior = linestrings.remove(0);
            Some(Polygon::new(exterior, linestrings))
        })
        .collect()
}

/// Point-in-polygon, counting points on the edge as inside.
pub fn point_in_polygon(polygon: &Polygon, pt: Coord) -> Result<bool, GeometryError> {
    if !pt.x.is_finite() || !pt.y.is_finite() {
        return Err(GeometryError::PointTestFailure);
    }
    Ok(polygon.intersects(&pt))
}

pub fn bounding_box(polygon: &Polygon) -> Option<Rect> {
    polygon.bounding_rect()
}

pub fn centroid(polygon: &Polygon) -> Option<Point> {
    polygon.centroid()
}

pub fn area(polygon: &Polygon) -> f64 {
    polygon.unsigned_area()
}

/// Length of the bounding box's diagonal
pub fn diagonal(rect: &Rect) -> f64 {
    rect.width().hypot(rect.height())
}

/// Turn a stored ring into a polygon, rejecting anything that would give nonsense
/// point-in-polygon answers. Open rings get closed.
pub fn polygon_from_ring(mut ring: LineString) -> Result<Polygon, GeometryError> {
    ring.0.dedup();
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(GeometryError::InvalidPolygon(
            "ring has non-finite coordinates".to_string(),
        ));
    }
    let polygon = Polygon::new(ring, Vec::new());
    // Polygon::new closes the ring, so a triangle has 4 coordinates
    if polygon.exterior().0.len() < 4 {
        return Err(GeometryError::InvalidPolygon(format!(
            "ring has only {} coordinates",
            polygon.exterior().0.len()
        )));
    }
    if area(&polygon) == 0.0 {
        return Err(GeometryError::InvalidPolygon("ring has zero area".to_string()));
    }
    if is_self_intersecting(polygon.exterior()) {
        return Err(GeometryError::InvalidPolygon(
            "ring intersects itself".to_string(),
        ));
    }
    Ok(polygon)
}

/// Checks every pair of non-adjacent segments of a closed ring. Quadratic, but stored rings are
/// small.
pub fn is_self_intersecting(ring: &LineString) -> bool {
    crosses_itself(ring, true)
}

/// Like `is_self_intersecting`, but for an open polyline, whose first and last segments aren't
/// neighbours. Repeated consecutive points are ignored.
pub fn is_line_self_intersecting(line: &[Coord]) -> bool {
    let mut pts = line.to_vec();
    pts.dedup();
    crosses_itself(&LineString::new(pts), false)
}

fn crosses_itself(line: &LineString, closed: bool) -> bool {
    let lines: Vec<_> = line.lines().collect();
    let n = lines.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (closed && i == 0 && j == n - 1);
            match line_intersection(lines[i], lines[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { is_proper, .. }) => {
                    // Adjacent segments always touch at their shared endpoint
                    if !adjacent || is_proper {
                        return true;
                    }
                }
                Some(LineIntersection::Collinear { .. }) => {
                    return true;
                }
            }
        }
    }
    false
}

fn to_geo_linestring(pts: Vec<[f64; 2]>) -> LineString {
    let mut ls = LineString(
        pts.into_iter()
            .map(|pt| Coord { x: pt[0], y: pt[1] })
            .collect(),
    );
    ls.close();
    ls
}

fn to_i_overlay_contour(line_string: &LineString) -> Vec<[f64; 2]> {
    line_string.coords().map(|c| [c.x, c.y]).collect()
}
