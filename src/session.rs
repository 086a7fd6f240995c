use geo::Coord;
use log::{info, warn};

use crate::{
    label, split_with_config, AggregateStats, AggregationRequest, AggregationResponse,
    AggregationWorker, Boundary, Config, Labels, Layer, SamplingGrid, SessionError, SplitResult,
    SubmissionStore, VoteCounts,
};

/// Where one observer is in the draw / preview / submit cycle
#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    Idle,
    Drawing { stroke: Vec<Coord> },
    PreviewReady { preview: SplitResult },
    Aggregating,
}

impl Phase {
    fn describe(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Drawing { .. } => "drawing",
            Phase::PreviewReady { .. } => "previewing a split",
            Phase::Aggregating => "aggregating",
        }
    }
}

/// Owns everything for one session: the boundary, the grid, the worker, and the latest results.
/// At most one stroke, one preview, and one aggregation pass exist at a time.
pub struct Session<S: SubmissionStore, L: Layer> {
    boundary: Boundary,
    config: Config,
    phase: Phase,
    store: S,
    layer: L,
    worker: AggregationWorker,
    /// None while the grid is handed off to the worker
    grid: Option<SamplingGrid>,
    /// Bumped for every request and every cancellation. Responses carrying an older value are
    /// stale.
    generation: u64,
    counts: Option<VoteCounts>,
    labels: Labels,
    stats: AggregateStats,
}

impl<S: SubmissionStore, L: Layer> Session<S, L> {
    pub fn new(boundary: Boundary, config: Config, store: S, layer: L) -> anyhow::Result<Self> {
        let grid = SamplingGrid::new(&boundary.polygon, config.cols, config.rows)?;
        let worker = AggregationWorker::spawn(config.worker_threads)?;
        Ok(Self {
            boundary,
            config,
            phase: Phase::Idle,
            store,
            layer,
            worker,
            grid: Some(grid),
            generation: 0,
            counts: None,
            labels: Labels::default(),
            stats: AggregateStats::default(),
        })
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// None while an aggregation pass holds it
    pub fn grid(&self) -> Option<&SamplingGrid> {
        self.grid.as_ref()
    }

    pub fn counts(&self) -> Option<&VoteCounts> {
        self.counts.as_ref()
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    /// Starting over while a preview is pending throws the preview away.
    pub fn begin_stroke(&mut self, pt: Coord) -> Result<(), SessionError> {
        match self.phase {
            Phase::Aggregating => Err(self.invalid("start a stroke")),
            _ => {
                self.phase = Phase::Drawing { stroke: vec![pt] };
                Ok(())
            }
        }
    }

    pub fn add_point(&mut self, pt: Coord) -> Result<(), SessionError> {
        match &mut self.phase {
            Phase::Drawing { stroke } => {
                stroke.push(pt);
                Ok(())
            }
            _ => Err(self.invalid("extend a stroke")),
        }
    }

    /// Split the boundary with the finished stroke. If that fails, the session goes back to idle
    /// and the caller should ask for a redraw.
    pub fn finish_stroke(&mut self) -> Result<(), SessionError> {
        let stroke = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Drawing { stroke } => stroke,
            other => {
                self.phase = other;
                return Err(self.invalid("finish a stroke"));
            }
        };
        let preview = split_with_config(&self.boundary.polygon, &stroke, &self.config)?;
        self.phase = Phase::PreviewReady { preview };
        Ok(())
    }

    /// The split waiting to be submitted, if any
    pub fn preview(&self) -> Option<&SplitResult> {
        match &self.phase {
            Phase::PreviewReady { preview } => Some(preview),
            _ => None,
        }
    }

    /// Throw away the preview
    pub fn redraw(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::PreviewReady { .. } => {
                self.phase = Phase::Idle;
                Ok(())
            }
            _ => Err(self.invalid("redraw")),
        }
    }

    /// Store the preview for this observer, replacing anything they sent before, then recompute
    /// the aggregate.
    pub fn submit(&mut self, observer: &str) -> Result<(), SessionError> {
        let Phase::PreviewReady { preview } = &self.phase else {
            return Err(self.invalid("submit"));
        };
        if self.worker.is_busy() {
            return Err(SessionError::AggregationInFlight);
        }
        self.store
            .put(observer, preview)
            .map_err(|err| SessionError::Store(err.to_string()))?;
        info!("Stored a submission for {observer}");
        self.request_aggregation()
    }

    /// Recompute the aggregate from whatever is in the store
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Idle {
            return Err(self.invalid("refresh"));
        }
        self.request_aggregation()
    }

    /// Stop waiting for the current pass. Its result is thrown away when it arrives.
    pub fn cancel_aggregation(&mut self) {
        if self.worker.is_busy() {
            self.generation += 1;
            info!("Cancelled aggregation; now at generation {}", self.generation);
        }
        if self.phase == Phase::Aggregating {
            self.phase = Phase::Idle;
        }
    }

    /// Check for a finished pass without blocking. True if new results were applied.
    pub fn poll(&mut self) -> Result<bool, SessionError> {
        match self.worker.try_recv()? {
            Some(response) => self.apply(response),
            None => Ok(false),
        }
    }

    /// Block until the pass in flight finishes. True if its results were applied.
    pub fn wait(&mut self) -> Result<bool, SessionError> {
        let response = self.worker.recv()?;
        self.apply(response)
    }

    fn request_aggregation(&mut self) -> Result<(), SessionError> {
        let Some(grid) = self.grid.take() else {
            return Err(SessionError::AggregationInFlight);
        };
        let submissions = match self.store.all() {
            Ok(submissions) => submissions,
            Err(err) => {
                self.grid = Some(grid);
                return Err(SessionError::Store(err.to_string()));
            }
        };
        self.generation += 1;
        let request = AggregationRequest {
            generation: self.generation,
            grid,
            submissions,
        };
        if let Err(rejected) = self.worker.send(request) {
            self.grid = Some(rejected.request.grid);
            return Err(rejected.error);
        }
        self.phase = Phase::Aggregating;
        Ok(())
    }

    fn apply(&mut self, response: AggregationResponse) -> Result<bool, SessionError> {
        let AggregationResponse {
            generation,
            grid,
            result,
        } = response;
        let grid = self.grid.insert(grid);
        if generation != self.generation {
            warn!(
                "Discarding stale aggregation from generation {generation}, now at {}",
                self.generation
            );
            return Ok(false);
        }
        if self.phase == Phase::Aggregating {
            self.phase = Phase::Idle;
        }

        self.labels = label(grid, &result.counts);
        self.stats = result.stats;
        self.layer
            .update(grid, &result.counts, &self.labels)
            .map_err(|err| SessionError::Layer(err.to_string()))?;
        self.counts = Some(result.counts);
        Ok(true)
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            phase: self.phase.describe(),
        }
    }
}

impl<S: SubmissionStore, L: Layer> Drop for Session<S, L> {
    fn drop(&mut self) {
        if let Err(err) = self.layer.dispose() {
            warn!("Couldn't dispose the render layer: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    use crate::{kernel, GeoJsonLayer, MemoryStore, SplitError};

    type TestSession = Session<MemoryStore, GeoJsonLayer<Vec<u8>>>;

    fn session() -> TestSession {
        let square = polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 1.)];
        let config = Config {
            cols: 4,
            rows: 4,
            worker_threads: Some(2),
            ..Default::default()
        };
        Session::new(
            Boundary::new(square),
            config,
            MemoryStore::new(),
            GeoJsonLayer::new(Vec::new()),
        )
        .unwrap()
    }

    fn draw_vertical(session: &mut TestSession, x: f64) {
        session.begin_stroke(coord! { x: x, y: -1. }).unwrap();
        session.add_point(coord! { x: x, y: 0.5 }).unwrap();
        session.add_point(coord! { x: x, y: 2. }).unwrap();
        session.finish_stroke().unwrap();
    }

    #[test]
    fn test_draw_submit_aggregate() {
        let mut session = session();
        assert!(session.preview().is_none());
        draw_vertical(&mut session, 0.5);
        assert!(matches!(session.phase(), Phase::PreviewReady { .. }));
        let preview = session.preview().unwrap();
        assert!((kernel::area(&preview.east) - 0.5).abs() < 1e-6);

        session.submit("observer-1").unwrap();
        assert_eq!(&Phase::Aggregating, session.phase());
        assert!(session.grid().is_none());

        assert!(session.wait().unwrap());
        assert_eq!(&Phase::Idle, session.phase());
        assert!(session.grid().is_some());
        let counts = session.counts().unwrap();
        assert_eq!(vec![0, 0, 1, 1], counts.east.data[0..4].to_vec());
        assert_eq!(vec![1, 1, 0, 0], counts.west.data[0..4].to_vec());

        // One east region and one west region
        assert_eq!(2, session.labels().regions.len());
        assert_eq!(1, session.stats().submissions);
    }

    #[test]
    fn test_resubmitting_replaces() {
        let mut session = session();
        draw_vertical(&mut session, 0.3);
        session.submit("observer-1").unwrap();
        session.wait().unwrap();

        draw_vertical(&mut session, 0.9);
        session.submit("observer-1").unwrap();
        session.wait().unwrap();

        let counts = session.counts().unwrap();
        for idx in 0..16 {
            assert_eq!(1, counts.total(idx));
        }
        // Every centroid is west of x=0.9, and the x=0.3 split is gone
        assert!(counts.east.data.iter().all(|c| *c == 0));
    }

    #[test]
    fn test_failed_split_goes_idle() {
        let mut session = session();
        session.begin_stroke(coord! { x: 5., y: 0. }).unwrap();
        session.add_point(coord! { x: 5., y: 1. }).unwrap();
        assert!(matches!(
            session.finish_stroke(),
            Err(SessionError::Split(SplitError::NoValidSplit { .. }))
        ));
        assert_eq!(&Phase::Idle, session.phase());

        session.begin_stroke(coord! { x: 0.5, y: 0.5 }).unwrap();
        assert!(matches!(
            session.finish_stroke(),
            Err(SessionError::Split(_))
        ));
    }

    #[test]
    fn test_new_stroke_discards_preview() {
        let mut session = session();
        draw_vertical(&mut session, 0.5);
        session.begin_stroke(coord! { x: 0.2, y: -1. }).unwrap();
        assert!(matches!(session.phase(), Phase::Drawing { .. }));
        assert!(matches!(
            session.submit("observer-1"),
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut session = session();
        assert!(session.add_point(coord! { x: 0., y: 0. }).is_err());
        assert!(session.finish_stroke().is_err());
        assert!(session.redraw().is_err());
        assert!(session.submit("observer-1").is_err());

        draw_vertical(&mut session, 0.5);
        session.redraw().unwrap();
        assert_eq!(&Phase::Idle, session.phase());
    }

    #[test]
    fn test_no_drawing_while_aggregating() {
        let mut session = session();
        draw_vertical(&mut session, 0.5);
        session.submit("observer-1").unwrap();
        assert!(session.begin_stroke(coord! { x: 0., y: 0. }).is_err());
        assert!(session.refresh().is_err());
        session.wait().unwrap();
        session.begin_stroke(coord! { x: 0., y: 0. }).unwrap();
    }

    #[test]
    fn test_cancelled_result_is_discarded() {
        let mut session = session();
        draw_vertical(&mut session, 0.5);
        session.submit("observer-1").unwrap();
        session.cancel_aggregation();
        assert_eq!(&Phase::Idle, session.phase());

        // Still can't start another pass until the old one comes back
        assert_eq!(Err(SessionError::AggregationInFlight), session.refresh());
        assert!(!session.wait().unwrap());
        assert!(session.counts().is_none());
        assert!(session.grid().is_some());

        session.refresh().unwrap();
        assert!(session.wait().unwrap());
        assert!(session.counts().is_some());
    }
}
