use burn::prelude::*;
use tracing::{debug, info};

use super::backend::{ComputeDevice, CpuBackend, CpuDevice};
#[cfg(feature = "cuda")]
use super::backend::{CudaBackend, CudaComputeDevice};
#[cfg(feature = "wgpu")]
use super::backend::{WgpuBackend, WgpuComputeDevice};
use super::checkpoint;
use super::projector::{EmbeddingProjector, EmbeddingProjectorConfig};
use super::wav2vec2::Wav2Vec2Config;
use crate::embedding::{Embedder, Embedding};
use crate::error::{NomadError, Result};
use crate::weights::WeightPaths;

#[derive(Clone, Debug)]
enum ProjectorInner {
    Cpu {
        model: EmbeddingProjector<CpuBackend>,
        device: CpuDevice,
    },
    #[cfg(feature = "wgpu")]
    Wgpu {
        model: EmbeddingProjector<WgpuBackend>,
        device: WgpuComputeDevice,
    },
    #[cfg(feature = "cuda")]
    Cuda {
        model: EmbeddingProjector<CudaBackend>,
        device: CudaComputeDevice,
    },
}

/// Embedding projector placed on a concrete backend, ready for inference.
///
/// Cloning shares the read-only parameters, which lets embedding workers each
/// own a handle.
#[derive(Clone, Debug)]
pub struct LoadedProjector {
    inner: ProjectorInner,
    min_samples: usize,
}

impl LoadedProjector {
    /// Build the BASE projector on `device` and load both checkpoints into it.
    pub fn load(device: ComputeDevice, weights: &WeightPaths) -> Result<Self> {
        let config = EmbeddingProjectorConfig::new(Wav2Vec2Config::new());
        let inner = match device {
            ComputeDevice::Cpu => {
                let device = CpuDevice::default();
                let model = build_projector::<CpuBackend>(&config, weights, &device)?;
                ProjectorInner::Cpu { model, device }
            }
            #[cfg(feature = "wgpu")]
            ComputeDevice::Wgpu => {
                let device = WgpuComputeDevice::default();
                let model = build_projector::<WgpuBackend>(&config, weights, &device)?;
                ProjectorInner::Wgpu { model, device }
            }
            #[cfg(feature = "cuda")]
            ComputeDevice::Cuda => {
                let device = CudaComputeDevice::default();
                let model = build_projector::<CudaBackend>(&config, weights, &device)?;
                ProjectorInner::Cuda { model, device }
            }
        };
        Ok(Self::from_inner(inner))
    }

    /// Wrap an already-built CPU projector.
    pub fn cpu(model: EmbeddingProjector<CpuBackend>) -> Self {
        Self::from_inner(ProjectorInner::Cpu {
            model,
            device: CpuDevice::default(),
        })
    }

    fn from_inner(inner: ProjectorInner) -> Self {
        let min_samples = match &inner {
            ProjectorInner::Cpu { model, .. } => model.min_samples(),
            #[cfg(feature = "wgpu")]
            ProjectorInner::Wgpu { model, .. } => model.min_samples(),
            #[cfg(feature = "cuda")]
            ProjectorInner::Cuda { model, .. } => model.min_samples(),
        };
        Self { inner, min_samples }
    }

    pub fn device(&self) -> ComputeDevice {
        match &self.inner {
            ProjectorInner::Cpu { .. } => ComputeDevice::Cpu,
            #[cfg(feature = "wgpu")]
            ProjectorInner::Wgpu { .. } => ComputeDevice::Wgpu,
            #[cfg(feature = "cuda")]
            ProjectorInner::Cuda { .. } => ComputeDevice::Cuda,
        }
    }

    /// Shortest waveform, in samples, the extractor accepts.
    pub fn min_samples(&self) -> usize {
        self.min_samples
    }
}

impl Embedder for LoadedProjector {
    fn embed_one(&self, waveform: &[f32]) -> Result<Embedding> {
        if waveform.len() < self.min_samples {
            return Err(NomadError::invalid(format!(
                "waveform has {} samples; at least {} are required",
                waveform.len(),
                self.min_samples
            )));
        }
        match &self.inner {
            ProjectorInner::Cpu { model, device } => run_projector(model, device, waveform),
            #[cfg(feature = "wgpu")]
            ProjectorInner::Wgpu { model, device } => run_projector(model, device, waveform),
            #[cfg(feature = "cuda")]
            ProjectorInner::Cuda { model, device } => run_projector(model, device, waveform),
        }
    }
}

fn build_projector<B: Backend>(
    config: &EmbeddingProjectorConfig,
    weights: &WeightPaths,
    device: &B::Device,
) -> Result<EmbeddingProjector<B>> {
    let mut model = config.init::<B>(device);
    checkpoint::load_extractor(&mut model.extractor, &weights.wav2vec)?;
    checkpoint::load_projector(&mut model, &weights.nomad)?;
    info!("NOMAD projector ready");
    Ok(model.no_grad())
}

fn run_projector<B: Backend>(
    model: &EmbeddingProjector<B>,
    device: &B::Device,
    waveform: &[f32],
) -> Result<Embedding> {
    let data = TensorData::new(waveform.to_vec(), [1, waveform.len()]);
    let wave = Tensor::<B, 2>::from_data(data, device);
    let output = model.forward(wave);
    let [batch, dim] = output.dims();
    debug!("Projector output shape [{batch}, {dim}]");
    if batch != 1 {
        return Err(NomadError::invalid(format!(
            "projector returned batch {batch}, expected 1"
        )));
    }
    // A single-item batch flattens to exactly one embedding.
    let values = output
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| NomadError::invalid(format!("failed to read projector output: {err:?}")))?;
    Embedding::normalized(values)
}
