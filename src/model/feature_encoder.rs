use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::{GroupNorm, GroupNormConfig};
use burn::prelude::*;
use burn::tensor::activation::gelu;

/// Strided convolution stack turning raw samples into latent frames.
#[derive(Config, Debug)]
pub struct ConvFeatureEncoderConfig {
    /// `(channels, kernel, stride)` for each layer, input first.
    pub layers: Vec<(usize, usize, usize)>,
}

impl ConvFeatureEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvFeatureEncoder<B> {
        let mut in_channels = 1;
        let conv_layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(idx, &(channels, kernel, stride))| {
                let conv = Conv1dConfig::new(in_channels, channels, kernel)
                    .with_stride(stride)
                    .with_bias(false)
                    .init(device);
                // Only the first layer is group-normalised (one group per channel).
                let norm = (idx == 0).then(|| GroupNormConfig::new(channels, channels).init(device));
                in_channels = channels;
                ConvBlock { conv, norm }
            })
            .collect();
        ConvFeatureEncoder {
            conv_layers,
            receptive_field: self.receptive_field(),
        }
    }

    /// Number of input samples covered by one output frame.
    pub fn receptive_field(&self) -> usize {
        let mut field = 1usize;
        let mut jump = 1usize;
        for &(_, kernel, stride) in &self.layers {
            field += kernel.saturating_sub(1) * jump;
            jump *= stride.max(1);
        }
        field
    }

    /// Output frame count for `samples` inputs; zero when the input is too short.
    pub fn output_frames(&self, samples: usize) -> usize {
        let mut len = samples;
        for &(_, kernel, stride) in &self.layers {
            if len < kernel {
                return 0;
            }
            len = (len - kernel) / stride.max(1) + 1;
        }
        len
    }

    pub fn output_channels(&self) -> usize {
        self.layers.last().map(|&(channels, _, _)| channels).unwrap_or(1)
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv1d<B>,
    pub norm: Option<GroupNorm<B>>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.conv.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        gelu(x)
    }
}

#[derive(Module, Debug)]
pub struct ConvFeatureEncoder<B: Backend> {
    pub conv_layers: Vec<ConvBlock<B>>,
    pub receptive_field: usize,
}

impl<B: Backend> ConvFeatureEncoder<B> {
    /// `[batch, 1, samples]` to `[batch, channels, frames]`.
    pub fn forward(&self, wave: Tensor<B, 3>) -> Tensor<B, 3> {
        self.conv_layers
            .iter()
            .fold(wave, |x, layer| layer.forward(x))
    }

    /// Shortest input that yields at least one frame.
    pub fn min_samples(&self) -> usize {
        self.receptive_field
    }
}
