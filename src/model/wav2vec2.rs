use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;

use super::feature_encoder::{ConvFeatureEncoder, ConvFeatureEncoderConfig};
use super::transformer::{TransformerEncoder, TransformerEncoderConfig};

/// wav2vec 2.0 feature extractor, inference path only (no masking, no quantizer).
///
/// Defaults describe the BASE checkpoint: seven conv layers at 512 channels,
/// twelve 768-wide transformer layers with twelve heads.
#[derive(Config, Debug)]
pub struct Wav2Vec2Config {
    #[config(
        default = "vec![(512, 10, 5), (512, 3, 2), (512, 3, 2), (512, 3, 2), (512, 3, 2), (512, 2, 2), (512, 2, 2)]"
    )]
    pub conv_layers: Vec<(usize, usize, usize)>,
    #[config(default = 768)]
    pub embed_dim: usize,
    #[config(default = 3072)]
    pub ffn_dim: usize,
    #[config(default = 12)]
    pub layers: usize,
    #[config(default = 12)]
    pub heads: usize,
    #[config(default = 128)]
    pub pos_conv_kernel: usize,
    #[config(default = 16)]
    pub pos_conv_groups: usize,
}

impl Wav2Vec2Config {
    pub fn conv_encoder(&self) -> ConvFeatureEncoderConfig {
        ConvFeatureEncoderConfig::new(self.conv_layers.clone())
    }

    pub fn transformer(&self) -> TransformerEncoderConfig {
        TransformerEncoderConfig::new(
            self.embed_dim,
            self.ffn_dim,
            self.layers,
            self.heads,
            self.pos_conv_kernel,
            self.pos_conv_groups,
        )
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Wav2Vec2<B> {
        let conv = self.conv_encoder();
        let conv_dim = conv.output_channels();
        Wav2Vec2 {
            feature_extractor: conv.init(device),
            layer_norm: LayerNormConfig::new(conv_dim).init(device),
            post_extract_proj: LinearConfig::new(conv_dim, self.embed_dim).init(device),
            encoder: self.transformer().init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct Wav2Vec2<B: Backend> {
    pub feature_extractor: ConvFeatureEncoder<B>,
    pub layer_norm: LayerNorm<B>,
    pub post_extract_proj: Linear<B>,
    pub encoder: TransformerEncoder<B>,
}

impl<B: Backend> Wav2Vec2<B> {
    /// `[batch, samples]` to contextual frames `[batch, frames, embed_dim]`.
    pub fn forward(&self, wave: Tensor<B, 2>) -> Tensor<B, 3> {
        let features = self.feature_extractor.forward(wave.unsqueeze_dim(1));
        let features = self.layer_norm.forward(features.swap_dims(1, 2));
        let x = self.post_extract_proj.forward(features);
        self.encoder.forward(x)
    }

    pub fn min_samples(&self) -> usize {
        self.feature_extractor.min_samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_defaults_match_checkpoint_layout() {
        let config = Wav2Vec2Config::new();
        assert_eq!(config.conv_layers.len(), 7);
        assert_eq!(config.embed_dim, 768);
        assert_eq!(config.transformer().heads, 12);
        assert_eq!(config.conv_encoder().receptive_field(), 400);
    }

    #[test]
    fn forward_yields_one_vector_per_frame() {
        type B = burn::backend::NdArray;
        let device = Default::default();
        let config = Wav2Vec2Config::new()
            .with_conv_layers(vec![(8, 10, 5), (8, 3, 2), (8, 2, 2)])
            .with_embed_dim(16)
            .with_ffn_dim(32)
            .with_layers(2)
            .with_heads(4)
            .with_pos_conv_kernel(8)
            .with_pos_conv_groups(4);
        let model = config.init::<B>(&device);
        let wave = Tensor::<B, 2>::ones([1, 1600], &device);
        let frames = model.forward(wave);
        assert_eq!(frames.dims(), [1, config.conv_encoder().output_frames(1600), 16]);
        assert_eq!(frames.dims()[1], 79);
        assert_eq!(model.min_samples(), 30);
    }
}
