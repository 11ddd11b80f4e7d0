//! wav2vec 2.0 extractor and NOMAD projection head implemented as burn modules.
//!
//! The modules mirror the fairseq parameter layout closely enough that the
//! published checkpoints load with a handful of key remaps (see `checkpoint`).
//! Inference runs on the ndarray backend by default, with optional `wgpu` and
//! `cuda` backends behind cargo features.

pub mod backend;
pub mod checkpoint;
pub mod feature_encoder;
pub mod projector;
mod runtime;
pub mod transformer;
pub mod wav2vec2;

pub use backend::{ComputeDevice, CpuBackend, DeviceRequest, resolve_device};
pub use projector::{EmbeddingProjector, EmbeddingProjectorConfig};
pub use runtime::LoadedProjector;
pub use wav2vec2::{Wav2Vec2, Wav2Vec2Config};

/// Width of the projected embedding space.
pub const EMBEDDING_DIM: usize = 256;
/// Width of the wav2vec 2.0 BASE frame embeddings.
pub const SSL_OUT_DIM: usize = 768;
