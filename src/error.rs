use thiserror::Error;

/// The stroke doesn't cleanly bisect the boundary. Callers should ask for a redraw.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SplitError {
    #[error("stroke doesn't split the boundary: {reason}")]
    NoValidSplit { reason: String },
}

impl SplitError {
    pub(crate) fn no_valid_split<S: Into<String>>(reason: S) -> Self {
        SplitError::NoValidSplit {
            reason: reason.into(),
        }
    }
}

/// Failures contained to one submission or one cell during aggregation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("invalid polygon: {0}")]
    InvalidPolygon(String),
    #[error("point-in-polygon test is undefined for this point")]
    PointTestFailure,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("can't {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
    #[error("an aggregation pass is already in flight")]
    AggregationInFlight,
    #[error("the aggregation worker has shut down")]
    WorkerGone,
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error("submission store failed: {0}")]
    Store(String),
    #[error("render layer failed: {0}")]
    Layer(String),
}
