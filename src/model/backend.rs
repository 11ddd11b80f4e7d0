use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
#[cfg(any(feature = "cuda", feature = "wgpu"))]
use std::sync::OnceLock;

use burn::backend::ndarray::{NdArray, NdArrayDevice};
use burn::prelude::*;
#[cfg(feature = "cuda")]
use burn::backend::{Cuda, cuda::CudaDevice};
#[cfg(feature = "wgpu")]
use burn::backend::{Wgpu, wgpu::WgpuDevice};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NomadError, Result};

pub type CpuBackend = NdArray;
pub type CpuDevice = NdArrayDevice;
#[cfg(feature = "wgpu")]
pub(crate) type WgpuBackend = Wgpu;
#[cfg(feature = "wgpu")]
pub(crate) type WgpuComputeDevice = WgpuDevice;
#[cfg(feature = "cuda")]
pub(crate) type CudaBackend = Cuda;
#[cfg(feature = "cuda")]
pub(crate) type CudaComputeDevice = CudaDevice;

/// Device preference supplied by the caller.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRequest {
    /// Use the first working accelerator compiled in, falling back to the CPU.
    #[default]
    Auto,
    Cpu,
    Cuda,
    Wgpu,
}

impl FromStr for DeviceRequest {
    type Err = NomadError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "cpu" | "ndarray" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "wgpu" | "vulkan" | "metal" => Ok(Self::Wgpu),
            other => Err(NomadError::invalid(format!("unknown device '{other}'"))),
        }
    }
}

/// Backend the models are placed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputeDevice {
    Cpu,
    #[cfg(feature = "wgpu")]
    Wgpu,
    #[cfg(feature = "cuda")]
    Cuda,
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            #[cfg(feature = "wgpu")]
            Self::Wgpu => f.write_str("wgpu"),
            #[cfg(feature = "cuda")]
            Self::Cuda => f.write_str("cuda"),
        }
    }
}

/// GPU backends `auto` may pick, in preference order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Accelerator {
    Cuda,
    Wgpu,
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cuda => f.write_str("cuda"),
            Self::Wgpu => f.write_str("wgpu"),
        }
    }
}

const COMPILED_ACCELERATORS: &[Accelerator] = &[
    #[cfg(feature = "cuda")]
    Accelerator::Cuda,
    #[cfg(feature = "wgpu")]
    Accelerator::Wgpu,
];

/// Resolve a device request against the backends compiled into this build.
///
/// `auto` only settles on an accelerator that completes a small tensor round
/// trip; otherwise it falls back to the CPU. An explicit accelerator request
/// that is missing or unusable is an error.
pub fn resolve_device(request: DeviceRequest) -> Result<ComputeDevice> {
    let choice = select_device(request, COMPILED_ACCELERATORS, accelerator_usable)?;
    let device = compute_device(choice);
    info!("Resolved compute device {device} for request {request:?}");
    Ok(device)
}

/// `None` means the CPU.
fn select_device(
    request: DeviceRequest,
    compiled: &[Accelerator],
    usable: impl Fn(Accelerator) -> bool,
) -> Result<Option<Accelerator>> {
    let wanted = match request {
        DeviceRequest::Cpu => return Ok(None),
        DeviceRequest::Auto => {
            for &accelerator in compiled {
                if usable(accelerator) {
                    return Ok(Some(accelerator));
                }
                warn!("{accelerator} backend is compiled in but no usable device answered");
            }
            return Ok(None);
        }
        DeviceRequest::Cuda => Accelerator::Cuda,
        DeviceRequest::Wgpu => Accelerator::Wgpu,
    };
    if !compiled.contains(&wanted) {
        return Err(NomadError::invalid(format!(
            "{wanted} requested but this build has no {wanted} support (enable the `{wanted}` feature)"
        )));
    }
    if !usable(wanted) {
        return Err(NomadError::invalid(format!(
            "{wanted} requested but no usable {wanted} device was found"
        )));
    }
    Ok(Some(wanted))
}

fn compute_device(choice: Option<Accelerator>) -> ComputeDevice {
    match choice {
        None => ComputeDevice::Cpu,
        #[cfg(feature = "cuda")]
        Some(Accelerator::Cuda) => ComputeDevice::Cuda,
        #[cfg(feature = "wgpu")]
        Some(Accelerator::Wgpu) => ComputeDevice::Wgpu,
        #[allow(unreachable_patterns)]
        Some(_) => ComputeDevice::Cpu,
    }
}

/// Cached per process; a missing driver can panic inside the runtime.
fn accelerator_usable(accelerator: Accelerator) -> bool {
    match accelerator {
        #[cfg(feature = "cuda")]
        Accelerator::Cuda => {
            static CUDA_USABLE: OnceLock<bool> = OnceLock::new();
            *CUDA_USABLE
                .get_or_init(|| tensor_round_trip::<CudaBackend>(&CudaComputeDevice::default()))
        }
        #[cfg(feature = "wgpu")]
        Accelerator::Wgpu => {
            static WGPU_USABLE: OnceLock<bool> = OnceLock::new();
            *WGPU_USABLE
                .get_or_init(|| tensor_round_trip::<WgpuBackend>(&WgpuComputeDevice::default()))
        }
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

#[cfg_attr(not(any(feature = "cuda", feature = "wgpu")), allow(dead_code))]
fn tensor_round_trip<B: Backend>(device: &B::Device) -> bool {
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        let summed = Tensor::<B, 1>::ones([4], device).sum().into_data();
        summed
            .to_vec::<f32>()
            .map(|values| values.first().copied() == Some(4.0))
            .unwrap_or(false)
    }));
    outcome.unwrap_or(false)
}
