use anyhow::{bail, Result};
use geo::{Area, Coord, LineString, MultiPolygon, Polygon};
use log::{info, warn};

use crate::kernel;

/// Property keys checked, in order, for a district's name
const NAME_KEYS: [&str; 2] = ["AREA_NAME", "name"];

/// A named sub-area of the boundary
#[derive(Clone, Debug, PartialEq)]
pub struct District {
    pub name: String,
    pub polygon: MultiPolygon,
}

/// The fixed region everyone splits. Loaded once and never modified.
#[derive(Clone, Debug, PartialEq)]
pub struct Boundary {
    pub polygon: Polygon,
    pub districts: Vec<District>,
}

impl Boundary {
    pub fn new(polygon: Polygon) -> Self {
        Self {
            polygon,
            districts: Vec::new(),
        }
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = fs_err::read_to_string(path)?;
        Self::from_geojson(&raw)
    }

    /// Accepts a bare geometry, one feature, or a collection. Every polygon is unioned into the
    /// boundary, and features with a name also become districts.
    pub fn from_geojson(raw: &str) -> Result<Self> {
        let geojson = raw.parse::<geojson::GeoJson>()?;
        let mut named: Vec<(Option<String>, Vec<Polygon>)> = Vec::new();
        match geojson {
            geojson::GeoJson::Geometry(geometry) => {
                named.push((None, polygons_from_geojson(&geometry.value)?));
            }
            geojson::GeoJson::Feature(feature) => {
                named.push(feature_polygons(&feature)?);
            }
            geojson::GeoJson::FeatureCollection(collection) => {
                for feature in &collection.features {
                    named.push(feature_polygons(feature)?);
                }
            }
        }

        let mut all_polygons = Vec::new();
        let mut districts = Vec::new();
        for (name, polygons) in named {
            if polygons.is_empty() {
                continue;
            }
            if let Some(name) = name {
                districts.push(District {
                    name,
                    polygon: MultiPolygon(polygons.clone()),
                });
            }
            all_polygons.extend(polygons);
        }
        if all_polygons.is_empty() {
            bail!("No polygons in the boundary GeoJSON");
        }

        let num_input = all_polygons.len();
        let mut parts = kernel::union_all(all_polygons).0;
        if parts.is_empty() {
            bail!("The boundary polygons have no area");
        }
        if parts.len() > 1 {
            warn!(
                "The boundary has {} disjoint parts; only using the largest",
                parts.len()
            );
            parts.sort_by(|a, b| b.unsigned_area().total_cmp(&a.unsigned_area()));
        }
        let polygon = parts.swap_remove(0);
        info!(
            "Loaded a boundary from {num_input} polygons and {} districts",
            districts.len()
        );
        Ok(Self { polygon, districts })
    }
}

fn feature_polygons(feature: &geojson::Feature) -> Result<(Option<String>, Vec<Polygon>)> {
    let name = NAME_KEYS.iter().find_map(|key| {
        feature
            .property(*key)
            .and_then(|value| value.as_str())
            .map(|name| name.to_string())
    });
    let polygons = match &feature.geometry {
        Some(geometry) => polygons_from_geojson(&geometry.value)?,
        None => Vec::new(),
    };
    Ok((name, polygons))
}

/// Non-polygonal geometry is ignored
fn polygons_from_geojson(value: &geojson::Value) -> Result<Vec<Polygon>> {
    match value {
        geojson::Value::Polygon(rings) => Ok(vec![polygon_from_rings(rings)?]),
        geojson::Value::MultiPolygon(polygons) => polygons
            .iter()
            .map(|rings| polygon_from_rings(rings))
            .collect(),
        geojson::Value::GeometryCollection(geometries) => {
            let mut result = Vec::new();
            for geometry in geometries {
                result.extend(polygons_from_geojson(&geometry.value)?);
            }
            Ok(result)
        }
        _ => Ok(Vec::new()),
    }
}

/// Outer ring first, then holes. Positions are (longitude, latitude).
fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Result<Polygon> {
    let mut linestrings = Vec::new();
    for ring in rings {
        let mut pts = Vec::new();
        for position in ring {
            if position.len() < 2 {
                bail!("A position has {} coordinates", position.len());
            }
            pts.push(Coord {
                x: position[0],
                y: position[1],
            });
        }
        linestrings.push(LineString::new(pts));
    }
    if linestrings.is_empty() {
        bail!("A polygon has no rings");
    }
    let exterior = linestrings.remove(0);
    Ok(Polygon::new(exterior, linestrings))
}
