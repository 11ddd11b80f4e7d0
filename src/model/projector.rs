use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;

use super::wav2vec2::{Wav2Vec2, Wav2Vec2Config};
use super::EMBEDDING_DIM;

#[derive(Config, Debug)]
pub struct EmbeddingProjectorConfig {
    pub extractor: Wav2Vec2Config,
    #[config(default = "EMBEDDING_DIM")]
    pub embedding_dim: usize,
}

impl EmbeddingProjectorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EmbeddingProjector<B> {
        EmbeddingProjector {
            extractor: self.extractor.init(device),
            head: ProjectionHead {
                linear: LinearConfig::new(self.extractor.embed_dim, self.embedding_dim)
                    .init(device),
            },
        }
    }
}

/// Trainable head: ReLU then a linear map into the metric space.
#[derive(Module, Debug)]
pub struct ProjectionHead<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> ProjectionHead<B> {
    pub fn forward(&self, pooled: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(relu(pooled))
    }
}

/// Frozen wav2vec 2.0 extractor composed with the projection head.
#[derive(Module, Debug)]
pub struct EmbeddingProjector<B: Backend> {
    pub extractor: Wav2Vec2<B>,
    pub head: ProjectionHead<B>,
}

impl<B: Backend> EmbeddingProjector<B> {
    /// `[batch, samples]` to un-normalised embeddings `[batch, embedding_dim]`.
    ///
    /// Frames are mean-pooled over time before the head. L2 normalisation is
    /// applied on the host so a zero norm can be reported instead of yielding NaN.
    pub fn forward(&self, wave: Tensor<B, 2>) -> Tensor<B, 2> {
        let frames = self.extractor.forward(wave);
        let [batch, _, dim] = frames.dims();
        let pooled = frames.mean_dim(1).reshape([batch, dim]);
        self.head.forward(pooled)
    }

    pub fn min_samples(&self) -> usize {
        self.extractor.min_samples()
    }
}
