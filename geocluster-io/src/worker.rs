//! Background ingestion and clustering.
//!
//! Callers tag each request with a generation from [`LatestGeneration`] and
//! drop replies whose generation has been superseded, so a slow result for an
//! earlier file never overwrites a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::acquire::AcquiredBuffer;
use crate::pipeline::{IngestOutcome, Pipeline, PipelineConfig};
use crate::{Error, Result};

/// Work item for [`ClusterWorker`].
#[derive(Debug)]
pub struct IngestRequest {
    /// Sequence number the reply will carry.
    pub generation: u64,
    /// Complete file contents.
    pub buffer: AcquiredBuffer,
    /// Filename used for format dispatch.
    pub filename_hint: String,
}

/// Reply from [`ClusterWorker`].
#[derive(Debug)]
pub enum WorkerMessage {
    /// Ingestion and clustering succeeded.
    Completed {
        generation: u64,
        outcome: Box<IngestOutcome>,
    },
    /// Ingestion or clustering failed.
    Failed { generation: u64, error: Error },
}

impl WorkerMessage {
    /// Generation of the request this message answers.
    #[must_use]
    pub fn generation(&self) -> u64 {
        match self {
            Self::Completed { generation, .. } | Self::Failed { generation, .. } => *generation,
        }
    }
}

/// Issues generation numbers and remembers the newest one.
#[derive(Debug, Default)]
pub struct LatestGeneration {
    current: AtomicU64,
}

impl LatestGeneration {
    /// Create a counter with no requests issued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding all earlier ones.
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Most recently issued generation (0 before the first request).
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Whether a reply for `generation` is still wanted.
    #[must_use]
    pub fn accepts(&self, generation: u64) -> bool {
        generation == self.current()
    }
}

/// Runs the pipeline on a dedicated thread.
///
/// Requests are processed in submission order. Dropping the worker closes
/// its queue and waits for the in-flight request to finish.
pub struct ClusterWorker {
    requests: Option<Sender<IngestRequest>>,
    handle: Option<JoinHandle<()>>,
}

impl ClusterWorker {
    /// Spawn a worker that replies on `replies`.
    ///
    /// # Errors
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn spawn(config: PipelineConfig, replies: Sender<WorkerMessage>) -> Result<Self> {
        let (tx, rx) = channel::<IngestRequest>();
        let handle = thread::Builder::new()
            .name("geocluster-worker".to_string())
            .spawn(move || run_worker(&Pipeline::new(config), &rx, &replies))?;
        Ok(Self {
            requests: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a request.
    ///
    /// # Errors
    /// Returns [`Error::WorkerDisconnected`] if the worker thread has exited.
    pub fn submit(&self, request: IngestRequest) -> Result<()> {
        self.requests
            .as_ref()
            .ok_or(Error::WorkerDisconnected)?
            .send(request)
            .map_err(|_| Error::WorkerDisconnected)
    }
}

impl Drop for ClusterWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("cluster worker panicked");
            }
        }
    }
}

fn run_worker(pipeline: &Pipeline, requests: &Receiver<IngestRequest>, replies: &Sender<WorkerMessage>) {
    for request in requests {
        let generation = request.generation;
        log::debug!("worker: generation {generation}, '{}'", request.filename_hint);
        let message = match pipeline.run(&request.buffer, &request.filename_hint) {
            Ok(outcome) => WorkerMessage::Completed {
                generation,
                outcome: Box::new(outcome),
            },
            Err(error) => WorkerMessage::Failed { generation, error },
        };
        if replies.send(message).is_err() {
            log::debug!("worker: reply receiver dropped, stopping");
            break;
        }
    }
}
