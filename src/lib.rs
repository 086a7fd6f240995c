mod aggregate;
mod bands;
mod boundary;
mod config;
mod districts;
mod error;
mod grid;
pub mod kernel;
mod layer;
mod sampling;
mod session;
mod split_line;
mod store;
mod style;
mod worker;

pub use self::aggregate::{aggregate, Aggregate, AggregateStats, Submission, VoteCounts};
pub use self::bands::{
    bands, cell_ratios, label, legend, Band, LabeledRegion, Labels, LegendBand, Ratio, Side,
};
pub use self::boundary::{Boundary, District};
pub use self::config::{Config, DEFAULT_COLS, DEFAULT_ROWS};
pub use self::districts::{tally_districts, DistrictTally};
pub use self::error::{GeometryError, SessionError, SplitError};
pub use self::grid::Grid;
pub use self::layer::{GeoJsonLayer, Layer};
pub use self::sampling::SamplingGrid;
pub use self::session::{Phase, Session};
pub use self::split_line::{split, split_with_config, SplitResult};
pub use self::store::{LngLat, MemoryStore, SubmissionDocument, SubmissionStore};
pub use self::style::Style;
pub use self::worker::{AggregationRequest, AggregationResponse, AggregationWorker, Rejected};
