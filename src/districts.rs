use geo::Intersects;

use crate::{District, SamplingGrid, VoteCounts};

/// Votes summed over every cell whose centroid falls in one district
#[derive(Clone, Debug, PartialEq)]
pub struct DistrictTally {
    pub name: String,
    pub east: u64,
    pub west: u64,
}

impl DistrictTally {
    /// None without any votes
    pub fn east_share(&self) -> Option<f64> {
        let total = self.east + self.west;
        if total == 0 {
            return None;
        }
        Some(self.east as f64 / total as f64)
    }

    /// The name, plus the rounded east percentage on a second line once there are votes
    pub fn label(&self) -> String {
        match self.east_share() {
            Some(share) => format!("{}\n{}% East", self.name, (share * 100.0).round() as u32),
            None => self.name.clone(),
        }
    }
}

pub fn tally_districts(
    grid: &SamplingGrid,
    counts: &VoteCounts,
    districts: &[District],
) -> Vec<DistrictTally> {
    districts
        .iter()
        .map(|district| {
            let mut tally = DistrictTally {
                name: district.name.clone(),
                east: 0,
                west: 0,
            };
            for idx in 0..grid.len() {
                if !grid.is_in_boundary(idx) || counts.total(idx) == 0 {
                    continue;
                }
                if district.polygon.intersects(&grid.centroid(idx)) {
                    tally.east += counts.east.data[idx] as u64;
                    tally.west += counts.west.data[idx] as u64;
                }
            }
            tally
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    use crate::Grid;

    #[test]
    fn test_tally() {
        let square = polygon![(x: 0., y: 0.), (x: 2., y: 0.), (x: 2., y: 1.), (x: 0., y: 1.)];
        let grid = SamplingGrid::new(&square, 4, 1).unwrap();
        let counts = VoteCounts {
            east: Grid::from_data(4, 1, vec![0, 1, 3, 3]).unwrap(),
            west: Grid::from_data(4, 1, vec![2, 1, 0, 0]).unwrap(),
        };
        let districts = vec![
            District {
                name: "West End".to_string(),
                polygon: MultiPolygon(vec![polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 1.)]]),
            },
            District {
                name: "Beaches".to_string(),
                polygon: MultiPolygon(vec![polygon![(x: 1., y: 0.), (x: 2., y: 0.), (x: 2., y: 1.), (x: 1., y: 1.)]]),
            },
            District {
                name: "Nowhere".to_string(),
                polygon: MultiPolygon(vec![polygon![(x: 5., y: 5.), (x: 6., y: 5.), (x: 6., y: 6.)]]),
            },
        ];
        let tallies = tally_districts(&grid, &counts, &districts);

        assert_eq!((1, 3), (tallies[0].east, tallies[0].west));
        assert_eq!("West End\n25% East", tallies[0].label());
        assert_eq!((6, 0), (tallies[1].east, tallies[1].west));
        assert_eq!("Beaches\n100% East", tallies[1].label());
        assert_eq!(None, tallies[2].east_share());
        assert_eq!("Nowhere", tallies[2].label());
    }
}
