use std::io::Write;

use anyhow::{bail, Result};
use geo::{Point, Polygon};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use serde_json::json;

use crate::{tally_districts, Boundary, Labels, Ratio, SamplingGrid, Side, Style, VoteCounts};

/// Something that draws the aggregated map. Implementations hold whatever drawing target they
/// render into.
pub trait Layer {
    fn update(&mut self, grid: &SamplingGrid, counts: &VoteCounts, labels: &Labels) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
    /// Release the drawing target. Later calls fail.
    fn dispose(&mut self) -> Result<()>;
}

/// Writes each update as one GeoJSON FeatureCollection per line
pub struct GeoJsonLayer<W: Write> {
    target: Option<W>,
    boundary: Option<Boundary>,
}

impl<W: Write> GeoJsonLayer<W> {
    pub fn new(target: W) -> Self {
        Self {
            target: Some(target),
            boundary: None,
        }
    }

    /// Also emit per-district tallies
    pub fn with_districts(mut self, boundary: Boundary) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// Dispose and get the target back
    pub fn into_inner(mut self) -> Option<W> {
        if let Some(target) = &mut self.target {
            let _ = target.flush();
        }
        self.target.take()
    }

    fn write(&mut self, collection: FeatureCollection) -> Result<()> {
        let Some(target) = &mut self.target else {
            bail!("This layer was already disposed");
        };
        serde_json::to_writer(&mut *target, &collection)?;
        writeln!(target)?;
        Ok(())
    }
}

impl<W: Write> Layer for GeoJsonLayer<W> {
    fn update(&mut self, grid: &SamplingGrid, counts: &VoteCounts, labels: &Labels) -> Result<()> {
        let mut features = Vec::new();
        for idx in 0..grid.len() {
            if !grid.is_in_boundary(idx) {
                continue;
            }
            let (east, west) = (counts.east.data[idx], counts.west.data[idx]);
            let style = Style::for_ratio(Ratio::new(east, west));
            let mut props = JsonObject::new();
            props.insert("kind".to_string(), json!("cell"));
            props.insert("east".to_string(), json!(east));
            props.insert("west".to_string(), json!(west));
            insert_style(&mut props, style);
            features.push(feature(
                geojson::Value::from(&Polygon::from(grid.cell_rect(idx))),
                props,
            ));
        }

        for region in &labels.regions {
            let mut props = JsonObject::new();
            props.insert("kind".to_string(), json!("label"));
            props.insert(
                "side".to_string(),
                json!(match region.side {
                    Side::East => "east",
                    Side::West => "west",
                }),
            );
            props.insert("cells".to_string(), json!(region.cells.len()));
            features.push(feature(
                geojson::Value::from(&Point::from(region.anchor)),
                props,
            ));
        }

        if let Some(boundary) = &self.boundary {
            for tally in tally_districts(grid, counts, &boundary.districts) {
                let mut props = JsonObject::new();
                props.insert("kind".to_string(), json!("district"));
                props.insert("name".to_string(), json!(tally.name));
                props.insert("east".to_string(), json!(tally.east));
                props.insert("west".to_string(), json!(tally.west));
                props.insert("label".to_string(), json!(tally.label()));
                insert_style(&mut props, Style::for_share(tally.east_share()));
                if let Some(district) = boundary.districts.iter().find(|d| d.name == tally.name) {
                    features.push(feature(geojson::Value::from(&district.polygon), props));
                }
            }
        }

        let legend: Vec<JsonValue> = labels
            .legend
            .iter()
            .map(|band| {
                let style = Style::for_ratio(Some(band.ratio));
                json!({
                    "east": band.ratio.east(),
                    "total": band.ratio.total(),
                    "cells": band.cells,
                    "fraction": band.fraction,
                    "fill": style.fill,
                    "fill-opacity": style.opacity,
                })
            })
            .collect();
        let mut foreign_members = JsonObject::new();
        foreign_members.insert("legend".to_string(), JsonValue::Array(legend));

        self.write(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        })
    }

    fn clear(&mut self) -> Result<()> {
        self.write(FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        })
    }

    fn dispose(&mut self) -> Result<()> {
        if let Some(mut target) = self.target.take() {
            target.flush()?;
        }
        Ok(())
    }
}

fn feature(value: geojson::Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn insert_style(props: &mut JsonObject, style: Style) {
    props.insert("fill".to_string(), json!(style.fill));
    props.insert("fill-opacity".to_string(), json!(style.opacity));
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    use crate::{label, Grid};

    fn parse_collection(line: &str) -> FeatureCollection {
        match line.parse::<geojson::GeoJson>().unwrap() {
            geojson::GeoJson::FeatureCollection(collection) => collection,
            other => panic!("expected a FeatureCollection, got {other:?}"),
        }
    }

    #[test]
    fn test_update_clear_dispose() {
        let square = polygon![(x: 0., y: 0.), (x: 2., y: 0.), (x: 2., y: 1.), (x: 0., y: 1.)];
        let grid = SamplingGrid::new(&square, 2, 1).unwrap();
        let counts = VoteCounts {
            east: Grid::from_data(2, 1, vec![0, 2]).unwrap(),
            west: Grid::from_data(2, 1, vec![1, 1]).unwrap(),
        };
        let labels = label(&grid, &counts);

        let mut layer = GeoJsonLayer::new(Vec::<u8>::new());
        layer.update(&grid, &counts, &labels).unwrap();
        layer.clear().unwrap();
        let output = String::from_utf8(layer.into_inner().unwrap()).unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(2, lines.len());
        let collection = parse_collection(lines[0]);
        // Two cells and one label for the unanimous west cell
        assert_eq!(3, collection.features.len());
        let members = collection.foreign_members.unwrap();
        let legend = &members["legend"];
        assert_eq!(2, legend.as_array().unwrap().len());

        let cleared = parse_collection(lines[1]);
        assert!(cleared.features.is_empty());
    }

    #[test]
    fn test_disposed_layer_refuses_updates() {
        let mut layer = GeoJsonLayer::new(Vec::<u8>::new());
        layer.dispose().unwrap();
        assert!(layer.clear().is_err());
    }
}
