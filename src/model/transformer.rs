use burn::module::Param;
use burn::nn::{LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::Distribution;
use burn::tensor::activation::{gelu, softmax};
use burn::tensor::module::conv1d;
use burn::tensor::ops::ConvOptions;

#[derive(Config, Debug)]
pub struct TransformerEncoderConfig {
    pub embed_dim: usize,
    pub ffn_dim: usize,
    pub layers: usize,
    pub heads: usize,
    pub pos_conv_kernel: usize,
    pub pos_conv_groups: usize,
}

impl TransformerEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerEncoder<B> {
        let layers = (0..self.layers)
            .map(|_| EncoderLayer {
                self_attn: SelfAttention {
                    q_proj: LinearConfig::new(self.embed_dim, self.embed_dim).init(device),
                    k_proj: LinearConfig::new(self.embed_dim, self.embed_dim).init(device),
                    v_proj: LinearConfig::new(self.embed_dim, self.embed_dim).init(device),
                    out_proj: LinearConfig::new(self.embed_dim, self.embed_dim).init(device),
                    n_heads: self.heads,
                },
                self_attn_layer_norm: LayerNormConfig::new(self.embed_dim).init(device),
                fc1: LinearConfig::new(self.embed_dim, self.ffn_dim).init(device),
                fc2: LinearConfig::new(self.ffn_dim, self.embed_dim).init(device),
                final_layer_norm: LayerNormConfig::new(self.embed_dim).init(device),
            })
            .collect();
        TransformerEncoder {
            pos_conv: PositionalConv::new(
                self.embed_dim,
                self.pos_conv_kernel,
                self.pos_conv_groups,
                device,
            ),
            layer_norm: LayerNormConfig::new(self.embed_dim).init(device),
            layers,
        }
    }
}

/// Post-norm transformer stack with a convolutional relative position embedding.
#[derive(Module, Debug)]
pub struct TransformerEncoder<B: Backend> {
    pub pos_conv: PositionalConv<B>,
    pub layer_norm: LayerNorm<B>,
    pub layers: Vec<EncoderLayer<B>>,
}

impl<B: Backend> TransformerEncoder<B> {
    /// `[batch, frames, dim]` in and out.
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = x.clone() + self.pos_conv.forward(x);
        let x = self.layer_norm.forward(x);
        self.layers.iter().fold(x, |x, layer| layer.forward(x))
    }
}

/// Grouped convolution over time with a weight-normalised kernel.
///
/// The kernel is `weight_g * weight_v / ||weight_v||`, with the norm taken per
/// kernel tap (over output and input channels).
#[derive(Module, Debug)]
pub struct PositionalConv<B: Backend> {
    pub weight_g: Param<Tensor<B, 3>>,
    pub weight_v: Param<Tensor<B, 3>>,
    pub bias: Param<Tensor<B, 1>>,
    pub groups: usize,
    pub padding: usize,
}

impl<B: Backend> PositionalConv<B> {
    fn new(channels: usize, kernel: usize, groups: usize, device: &B::Device) -> Self {
        let groups = groups.max(1);
        let weight_v = Tensor::random(
            [channels, channels / groups, kernel],
            Distribution::Normal(0.0, 0.02),
            device,
        );
        Self {
            weight_g: Param::from_tensor(Tensor::ones([1, 1, kernel], device)),
            weight_v: Param::from_tensor(weight_v),
            bias: Param::from_tensor(Tensor::zeros([channels], device)),
            groups,
            padding: kernel / 2,
        }
    }

    pub fn weight(&self) -> Tensor<B, 3> {
        let v = self.weight_v.val();
        let norm = v.clone().powf_scalar(2.0).sum_dim(0).sum_dim(1).sqrt();
        v * (self.weight_g.val() / norm)
    }

    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [_, frames, _] = x.dims();
        let out = conv1d(
            x.swap_dims(1, 2),
            self.weight(),
            Some(self.bias.val()),
            ConvOptions::new([1], [self.padding], [1], self.groups),
        );
        // Even kernels produce one extra trailing frame.
        let out = out.narrow(2, 0, frames);
        gelu(out).swap_dims(1, 2)
    }
}

#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    pub self_attn: SelfAttention<B>,
    pub self_attn_layer_norm: LayerNorm<B>,
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub final_layer_norm: LayerNorm<B>,
}

impl<B: Backend> EncoderLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let residual = x.clone();
        let x = self.self_attn.forward(x);
        let x = self.self_attn_layer_norm.forward(residual + x);

        let residual = x.clone();
        let x = gelu(self.fc1.forward(x));
        let x = self.fc2.forward(x);
        self.final_layer_norm.forward(residual + x)
    }
}

#[derive(Module, Debug)]
pub struct SelfAttention<B: Backend> {
    pub q_proj: Linear<B>,
    pub k_proj: Linear<B>,
    pub v_proj: Linear<B>,
    pub out_proj: Linear<B>,
    pub n_heads: usize,
}

impl<B: Backend> SelfAttention<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, frames, dim] = x.dims();
        let heads = self.n_heads.max(1);
        let head_dim = dim / heads;
        let scaling = (head_dim as f64).powf(-0.5);

        let split = |t: Tensor<B, 3>| {
            t.reshape([batch, frames, heads, head_dim])
                .swap_dims(1, 2)
        };
        let q = split(self.q_proj.forward(x.clone()).mul_scalar(scaling));
        let k = split(self.k_proj.forward(x.clone()));
        let v = split(self.v_proj.forward(x));

        let weights = softmax(q.matmul(k.swap_dims(2, 3)), 3);
        let context = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, frames, dim]);
        self.out_proj.forward(context)
    }
}
