use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use geo::{Coord, LineString};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{SplitResult, Submission};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

/// The persisted form of a submission. Document stores that forbid nested arrays get each point
/// as a `{lng, lat}` record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDocument {
    pub east_polygon: Vec<LngLat>,
    pub west_polygon: Vec<LngLat>,
    /// Milliseconds since the Unix epoch, assigned by the store
    #[serde(default)]
    pub timestamp: u64,
}

impl SubmissionDocument {
    pub fn encode(split: &SplitResult, timestamp: u64) -> Self {
        Self {
            east_polygon: encode_ring(split.east.exterior()),
            west_polygon: encode_ring(split.west.exterior()),
            timestamp,
        }
    }

    /// The rings aren't validated here; aggregation skips broken ones.
    pub fn decode(&self) -> Submission {
        Submission {
            east: decode_ring(&self.east_polygon),
            west: decode_ring(&self.west_polygon),
        }
    }
}

fn encode_ring(ring: &LineString) -> Vec<LngLat> {
    ring.coords()
        .map(|c| LngLat { lng: c.x, lat: c.y })
        .collect()
}

fn decode_ring(pts: &[LngLat]) -> LineString {
    LineString::new(pts.iter().map(|pt| Coord { x: pt.lng, y: pt.lat }).collect())
}

/// One document per observer. Writing again for the same observer replaces the old document.
pub trait SubmissionStore {
    fn put(&mut self, observer: &str, split: &SplitResult) -> Result<()>;
    fn all(&self) -> Result<Vec<Submission>>;
}

#[derive(Default)]
pub struct MemoryStore {
    documents: BTreeMap<String, SubmissionDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects an object mapping each observer ID to their document
    pub fn from_json(raw: &str) -> Result<Self> {
        let documents: BTreeMap<String, SubmissionDocument> = serde_json::from_str(raw)?;
        info!("Loaded {} submission documents", documents.len());
        Ok(Self { documents })
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = fs_err::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.documents)?)
    }

    pub fn get(&self, observer: &str) -> Option<&SubmissionDocument> {
        self.documents.get(observer)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl SubmissionStore for MemoryStore {
    fn put(&mut self, observer: &str, split: &SplitResult) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.documents.insert(
            observer.to_string(),
            SubmissionDocument::encode(split, timestamp),
        );
        Ok(())
    }

    fn all(&self) -> Result<Vec<Submission>> {
        Ok(self.documents.values().map(|doc| doc.decode()).collect())
    }
}
