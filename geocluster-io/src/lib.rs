//! geocluster-io: Format parsing, ingestion pipeline and output for geocluster.
//!
//! Buffers are routed to a parser by filename extension, normalized into a
//! [`geocluster_core::FeatureCollection`] and clustered with DBSCAN. File
//! acquisition with progress and a background worker are provided for
//! interactive callers.

pub mod acquire;
mod error;
pub mod formats;
mod pipeline;
mod registry;
pub mod worker;
mod writer;

pub use acquire::{read_with_progress, AcquireEvent, AcquiredBuffer, DEFAULT_CHUNK_SIZE};
pub use error::{Error, FormatKind, Result};
pub use formats::{ArrowParser, CsvParser, FormatParser, GeoJsonParser, KmlParser};
pub use pipeline::{ingest_and_cluster, IngestOutcome, Pipeline, PipelineConfig};
pub use registry::{route, FormatRegistry};
pub use worker::{ClusterWorker, IngestRequest, LatestGeneration, WorkerMessage};
pub use writer::{to_geojson, LabeledWriter, OutputFormat, CLUSTER_KEY};
