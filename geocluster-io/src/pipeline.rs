//! Ingest-then-cluster orchestration.

use geocluster_algorithms::{
    cluster_with_metric, DbscanClustering, DbscanConfig, DistanceMetric, MetricKind,
};
use geocluster_core::{ClusterAssignment, ClusterParams, DecodeWarning, FeatureCollection, Normalized};

use crate::registry::FormatRegistry;
use crate::{FormatKind, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pipeline configuration.
///
/// The default clusters with planar Euclidean distance, `epsilon = 0.05` and
/// `min_points = 2`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipelineConfig {
    /// Density parameters and neighbor-search strategy.
    pub dbscan: DbscanConfig,
    /// Distance metric.
    pub metric: MetricKind,
}

impl PipelineConfig {
    /// Set the density parameters.
    #[must_use]
    pub fn with_params(mut self, params: ClusterParams) -> Self {
        self.dbscan.params = params;
        self
    }

    /// Set the distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: MetricKind) -> Self {
        self.metric = metric;
        self
    }
}

/// Everything produced by one ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// Format that decoded the buffer.
    pub format: FormatKind,
    /// Surviving features in source order.
    pub collection: FeatureCollection,
    /// One label per feature.
    pub assignment: ClusterAssignment,
    /// One entry per dropped record.
    pub warnings: Vec<DecodeWarning>,
}

/// Routes, normalizes and clusters buffers.
#[derive(Debug, Default)]
pub struct Pipeline {
    registry: FormatRegistry,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline with the built-in parsers.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            registry: FormatRegistry::new(),
            config,
        }
    }

    /// Use a custom parser registry.
    #[must_use]
    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Parses and normalizes without clustering.
    ///
    /// # Errors
    /// Returns a structural error if the buffer cannot be ingested.
    pub fn ingest(&self, buffer: &[u8], filename_hint: &str) -> Result<(FormatKind, Normalized)> {
        self.registry.route(buffer, filename_hint)
    }

    /// Ingests `buffer` and clusters the result with the configured metric.
    ///
    /// # Errors
    /// Returns an error if the parameters are invalid or ingestion fails. No
    /// clustering happens in either case.
    pub fn run(&self, buffer: &[u8], filename_hint: &str) -> Result<IngestOutcome> {
        self.config.dbscan.params.validate()?;
        let (format, normalized) = self.ingest(buffer, filename_hint)?;
        let assignment = cluster_with_metric(&normalized.collection, &self.config.dbscan, self.config.metric)?;
        Ok(Self::outcome(format, normalized, assignment))
    }

    /// Like [`Self::run`] but with a caller-supplied metric.
    ///
    /// # Errors
    /// See [`Self::run`].
    pub fn run_with_metric<M>(&self, buffer: &[u8], filename_hint: &str, metric: &M) -> Result<IngestOutcome>
    where
        M: DistanceMetric + ?Sized,
    {
        self.config.dbscan.params.validate()?;
        let (format, normalized) = self.ingest(buffer, filename_hint)?;
        let assignment =
            DbscanClustering::new(self.config.dbscan.clone()).cluster(&normalized.collection, metric)?;
        Ok(Self::outcome(format, normalized, assignment))
    }

    fn outcome(format: FormatKind, normalized: Normalized, assignment: ClusterAssignment) -> IngestOutcome {
        let stats = assignment.statistics();
        log::debug!(
            "pipeline: {} feature(s) -> {} cluster(s), {} noise",
            normalized.collection.len(),
            stats.clusters,
            stats.noise
        );
        IngestOutcome {
            format,
            collection: normalized.collection,
            assignment,
            warnings: normalized.warnings,
        }
    }
}

/// One-shot ingestion and clustering with the default Euclidean metric.
///
/// `params` defaults to `epsilon = 0.05`, `min_points = 2`.
///
/// # Errors
/// See [`Pipeline::run`].
pub fn ingest_and_cluster(
    buffer: &[u8],
    filename_hint: &str,
    params: Option<ClusterParams>,
) -> Result<IngestOutcome> {
    let config = PipelineConfig::default().with_params(params.unwrap_or_default());
    Pipeline::new(config).run(buffer, filename_hint)
}
