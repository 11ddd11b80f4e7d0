//! Scoring engine: embeds reference and degraded sets and reduces their distances.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::audio::{self, AudioItem};
use crate::config::{DEFAULT_CACHE_DIR, NomadSettings, WeightSettings};
use crate::distance::DistanceMatrix;
use crate::embedding::{self, Embedder, EmbeddingSet};
use crate::error::{NomadError, Result};
use crate::model::{DeviceRequest, LoadedProjector, resolve_device};
use crate::weights::{Fetcher, HttpFetcher, Provisioner};

/// How to build a [`Nomad`] engine backed by the pretrained model.
#[derive(Clone, Debug)]
pub struct NomadOptions {
    pub device: DeviceRequest,
    pub cache_dir: PathBuf,
    pub workers: usize,
    pub weights: WeightSettings,
}

impl Default for NomadOptions {
    fn default() -> Self {
        Self {
            device: DeviceRequest::Auto,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            workers: 1,
            weights: WeightSettings::default(),
        }
    }
}

impl From<&NomadSettings> for NomadOptions {
    fn from(settings: &NomadSettings) -> Self {
        Self {
            device: settings.device,
            cache_dir: settings.cache_dir.clone(),
            workers: settings.workers,
            weights: settings.weights.clone(),
        }
    }
}

/// Quality score of one degraded file against the whole reference set.
#[derive(Clone, Debug, PartialEq)]
pub struct FileScore {
    pub name: String,
    pub score: f64,
}

/// Pooled score plus the per-file breakdown, in degraded input order.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreReport {
    pub score: f64,
    pub files: Vec<FileScore>,
}

/// Non-intrusive quality scorer.
///
/// Lower scores mean the degraded set sits closer to the reference set in
/// the embedding space. Scores are not rescaled.
#[derive(Clone, Debug)]
pub struct Nomad<E = LoadedProjector> {
    embedder: E,
    workers: usize,
}

impl Nomad<LoadedProjector> {
    /// Fetch missing checkpoints over HTTPS and load the model.
    pub fn new(options: &NomadOptions) -> Result<Self> {
        Self::with_fetcher(options, HttpFetcher)
    }

    /// Like [`Nomad::new`] with a caller-supplied download backend.
    pub fn with_fetcher<F: Fetcher>(options: &NomadOptions, fetcher: F) -> Result<Self> {
        let device = resolve_device(options.device)?;
        let provisioner = Provisioner::with_fetcher(fetcher, &options.weights.extra_allowed_hosts);
        let weights = provisioner.ensure_weights(&options.weights, &options.cache_dir)?;
        let projector = LoadedProjector::load(device, &weights)?;
        info!("NOMAD engine ready on {}", projector.device());
        Ok(Self::from_embedder(projector).with_workers(options.workers))
    }
}

impl<E: Embedder + Clone + Send> Nomad<E> {
    pub fn from_embedder(embedder: E) -> Self {
        Self {
            embedder,
            workers: 1,
        }
    }

    /// Embed with up to `workers` threads; 0 is treated as 1.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// One embedding per item, in input order.
    pub fn embed<W: AsRef<[f32]> + Sync>(&self, items: &[W]) -> Result<EmbeddingSet> {
        embedding::embed_parallel(&self.embedder, items, self.workers)
    }

    /// Score `degraded` against `reference`.
    ///
    /// Both sets are required; a missing set is rejected before any
    /// embedding work is done.
    pub fn predict<W: AsRef<[f32]> + Sync>(
        &self,
        reference: Option<&[W]>,
        degraded: Option<&[W]>,
    ) -> Result<f64> {
        let (reference, degraded) = require_inputs(reference, degraded)?;
        Ok(self.distance_matrix(reference, degraded)?.pooled_mean())
    }

    /// Degraded-by-reference distance matrix.
    pub fn distance_matrix<W: AsRef<[f32]> + Sync>(
        &self,
        reference: &[W],
        degraded: &[W],
    ) -> Result<DistanceMatrix> {
        if reference.is_empty() {
            return Err(NomadError::EmptyInput("no reference items".into()));
        }
        if degraded.is_empty() {
            return Err(NomadError::EmptyInput("no degraded items".into()));
        }
        info!(
            "Embedding {} reference and {} degraded items",
            reference.len(),
            degraded.len()
        );
        let reference = self.embed(reference)?;
        let degraded = self.embed(degraded)?;
        DistanceMatrix::pairwise(&degraded, &reference)
    }

    /// Pooled score and per-file scores for named degraded items.
    pub fn score_report(
        &self,
        reference: &[AudioItem],
        degraded: &[AudioItem],
    ) -> Result<ScoreReport> {
        let matrix = self.distance_matrix(reference, degraded)?;
        let files = degraded
            .iter()
            .zip(matrix.row_means())
            .map(|(item, score)| FileScore {
                name: item.name.clone(),
                score,
            })
            .collect();
        Ok(ScoreReport {
            score: matrix.pooled_mean(),
            files,
        })
    }

    /// Per-file scores only.
    pub fn predict_per_file(
        &self,
        reference: &[AudioItem],
        degraded: &[AudioItem],
    ) -> Result<Vec<FileScore>> {
        Ok(self.score_report(reference, degraded)?.files)
    }

    /// Load both paths (a `.wav` file or a directory of them) and score them.
    pub fn score_directories(
        &self,
        reference: &Path,
        degraded: &Path,
        trim_seconds: Option<f32>,
    ) -> Result<ScoreReport> {
        let reference = audio::load_audio_items(reference, trim_seconds)?;
        let degraded = audio::load_audio_items(degraded, trim_seconds)?;
        self.score_report(&reference, &degraded)
    }
}

fn require_inputs<'a, W>(
    reference: Option<&'a [W]>,
    degraded: Option<&'a [W]>,
) -> Result<(&'a [W], &'a [W])> {
    match (reference, degraded) {
        (Some(reference), Some(degraded)) => Ok((reference, degraded)),
        (None, _) => Err(NomadError::invalid("reference (nmr) input is required")),
        (_, None) => Err(NomadError::invalid("degraded (deg) input is required")),
    }
}
