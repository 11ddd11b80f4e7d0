//! NOMAD: non-matching reference audio quality assessment.
//!
//! Audio is embedded with a frozen wav2vec 2.0 extractor and a trained
//! projection head. The score of a degraded set is the mean Euclidean
//! distance between its embeddings and those of an unrelated clean
//! reference set.

/// Per-user application directories.
pub mod app_dirs;
/// WAV decoding and resampling for file inputs.
pub mod audio;
/// Command-line front end.
pub mod cli;
/// TOML settings and environment overrides.
pub mod config;
/// Distance matrix and score reduction.
pub mod distance;
/// Embedding vectors and extraction loops.
pub mod embedding;
/// Scoring engine.
pub mod engine;
/// Error types.
pub mod error;
mod http_client;
/// Tracing subscriber setup.
pub mod logging;
/// burn implementation of the embedding network.
pub mod model;
/// Checkpoint download and caching.
pub mod weights;

pub use distance::{DistanceMatrix, nomad_score};
pub use embedding::{Embedder, Embedding, EmbeddingSet};
pub use engine::{FileScore, Nomad, NomadOptions, ScoreReport};
pub use error::{NomadError, Result};
