// Runs aggregation off the calling thread. The grid is moved into the request and comes back in
// the response, so nothing is shared while a pass is running. Only one request can be in flight.

use std::thread::JoinHandle;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, info};

use crate::{aggregate, Aggregate, SamplingGrid, SessionError, Submission};

pub struct AggregationRequest {
    /// Echoed back in the response, so the caller can discard results it no longer wants
    pub generation: u64,
    pub grid: SamplingGrid,
    pub submissions: Vec<Submission>,
}

pub struct AggregationResponse {
    pub generation: u64,
    /// The same grid that was sent, handed back for the next request
    pub grid: SamplingGrid,
    pub result: Aggregate,
}

/// A request the worker refused, returned so the caller gets its grid back
pub struct Rejected {
    pub error: SessionError,
    pub request: AggregationRequest,
}

pub struct AggregationWorker {
    requests: Option<Sender<AggregationRequest>>,
    responses: Receiver<AggregationResponse>,
    thread: Option<JoinHandle<()>>,
    in_flight: Option<u64>,
}

impl AggregationWorker {
    /// `threads` sizes the worker's own rayon pool; None uses one per core.
    pub fn spawn(threads: Option<usize>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .thread_name(|i| format!("aggregate-{i}"))
            .build()?;
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<AggregationRequest>();
        let (response_tx, response_rx) = crossbeam_channel::unbounded();

        let thread = std::thread::Builder::new()
            .name("aggregation".to_string())
            .spawn(move || {
                info!(
                    "Aggregation worker started with {} threads",
                    pool.current_num_threads()
                );
                for request in request_rx.iter() {
                    let AggregationRequest {
                        generation,
                        grid,
                        submissions,
                    } = request;
                    debug!("Aggregation pass {generation} started");
                    let result = pool.install(|| aggregate(&grid, &submissions));
                    let response = AggregationResponse {
                        generation,
                        grid,
                        result,
                    };
                    if response_tx.send(response).is_err() {
                        break;
                    }
                }
                debug!("Aggregation worker shutting down");
            })?;

        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            thread: Some(thread),
            in_flight: None,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The generation of the request still being worked on
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn send(&mut self, request: AggregationRequest) -> Result<(), Rejected> {
        if self.in_flight.is_some() {
            return Err(Rejected {
                error: SessionError::AggregationInFlight,
                request,
            });
        }
        let Some(requests) = &self.requests else {
            return Err(Rejected {
                error: SessionError::WorkerGone,
                request,
            });
        };
        let generation = request.generation;
        match requests.send(request) {
            Ok(()) => {
                self.in_flight = Some(generation);
                Ok(())
            }
            Err(err) => Err(Rejected {
                error: SessionError::WorkerGone,
                request: err.into_inner(),
            }),
        }
    }

    /// Doesn't block. Ok(None) means nothing has finished yet.
    pub fn try_recv(&mut self) -> Result<Option<AggregationResponse>, SessionError> {
        match self.responses.try_recv() {
            Ok(response) => {
                self.in_flight = None;
                Ok(Some(response))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SessionError::WorkerGone),
        }
    }

    /// Blocks until the in-flight request finishes
    pub fn recv(&mut self) -> Result<AggregationResponse, SessionError> {
        if self.in_flight.is_none() {
            return Err(SessionError::InvalidTransition {
                action: "wait for aggregation",
                phase: "no aggregation is running",
            });
        }
        let response = self
            .responses
            .recv()
            .map_err(|_| SessionError::WorkerGone)?;
        self.in_flight = None;
        Ok(response)
    }
}

impl Drop for AggregationWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker's loop
        self.requests = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon, Polygon};

    use crate::split;

    fn unit_square() -> Polygon {
        polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 1.)]
    }

    fn request(generation: u64) -> AggregationRequest {
        let square = unit_square();
        let submission = split(&square, &[coord! { x: 0.5, y: -1. }, coord! { x: 0.5, y: 2. }])
            .unwrap()
            .into();
        AggregationRequest {
            generation,
            grid: SamplingGrid::new(&square, 2, 1).unwrap(),
            submissions: vec![submission],
        }
    }

    #[test]
    fn test_round_trip_returns_grid() {
        let mut worker = AggregationWorker::spawn(Some(2)).unwrap();
        assert!(!worker.is_busy());
        worker.send(request(7)).ok().unwrap();
        assert_eq!(Some(7), worker.in_flight());

        let response = worker.recv().unwrap();
        assert_eq!(7, response.generation);
        assert_eq!(2, response.grid.len());
        assert_eq!(vec![0, 1], response.result.counts.east.data);
        assert_eq!(vec![1, 0], response.result.counts.west.data);
        assert!(!worker.is_busy());
    }

    #[test]
    fn test_single_slot() {
        let mut worker = AggregationWorker::spawn(Some(1)).unwrap();
        worker.send(request(1)).ok().unwrap();
        let rejected = worker.send(request(2)).err().unwrap();
        assert_eq!(SessionError::AggregationInFlight, rejected.error);
        assert_eq!(2, rejected.request.generation);

        assert_eq!(1, worker.recv().unwrap().generation);
        worker.send(rejected.request).ok().unwrap();
        assert_eq!(2, worker.recv().unwrap().generation);
    }

    #[test]
    fn test_recv_when_idle() {
        let mut worker = AggregationWorker::spawn(Some(1)).unwrap();
        assert!(worker.recv().is_err());
        assert!(worker.try_recv().unwrap().is_none());
    }
}
