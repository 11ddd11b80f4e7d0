//! Embedding vectors and the per-item extraction loop.

use std::ops::Deref;

use tracing::debug;

use crate::error::{NomadError, Result};

/// A unit-length embedding produced for one audio item.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Normalize `values` to unit L2 norm, rejecting zero or non-finite norms.
    pub fn normalized(mut values: Vec<f32>) -> Result<Self> {
        normalize_l2_in_place(&mut values)?;
        Ok(Self(values))
    }

    /// Wrap values that are already normalized.
    #[cfg(test)]
    pub(crate) fn from_normalized(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Deref for Embedding {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

/// Ordered embeddings, one per input item in input order.
pub type EmbeddingSet = Vec<Embedding>;

/// Maps one waveform to one embedding.
///
/// Implementations must not keep state between calls so items can be
/// processed in any order or in parallel without changing results.
pub trait Embedder {
    fn embed_one(&self, waveform: &[f32]) -> Result<Embedding>;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn embed_one(&self, waveform: &[f32]) -> Result<Embedding> {
        (**self).embed_one(waveform)
    }
}

/// Embed every item sequentially, preserving input order.
pub fn embed<E, W>(embedder: &E, items: &[W]) -> Result<EmbeddingSet>
where
    E: Embedder + ?Sized,
    W: AsRef<[f32]>,
{
    let mut embeddings = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        embeddings.push(embedder.embed_one(item.as_ref())?);
        debug!("Embedded item {}/{}", idx + 1, items.len());
    }
    Ok(embeddings)
}

/// Embed items across `workers` threads, each owning a clone of the embedder.
///
/// Results are written to indexed slots so the output order matches `items`.
pub fn embed_parallel<E, W>(embedder: &E, items: &[W], workers: usize) -> Result<EmbeddingSet>
where
    E: Embedder + Clone + Send,
    W: AsRef<[f32]> + Sync,
{
    let workers = workers.max(1).min(items.len().max(1));
    if workers <= 1 {
        return embed(embedder, items);
    }
    let chunk_len = items.len().div_ceil(workers);
    let mut slots: Vec<Option<Result<Embedding>>> = Vec::with_capacity(items.len());
    slots.resize_with(items.len(), || None);

    std::thread::scope(|scope| {
        for (chunk_items, chunk_slots) in items.chunks(chunk_len).zip(slots.chunks_mut(chunk_len)) {
            let worker = embedder.clone();
            scope.spawn(move || {
                for (item, slot) in chunk_items.iter().zip(chunk_slots.iter_mut()) {
                    *slot = Some(worker.embed_one(item.as_ref()));
                }
            });
        }
    });

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| Err(NomadError::invalid("embedding worker produced no output")))
        })
        .collect()
}

/// Normalize in place; a zero or non-finite norm is an error instead of NaN output.
pub fn normalize_l2_in_place(values: &mut [f32]) -> Result<()> {
    let norm = l2_norm(values);
    if !norm.is_finite() || norm <= 0.0 {
        return Err(NomadError::ZeroNorm { norm });
    }
    for value in values.iter_mut() {
        *value /= norm;
    }
    Ok(())
}

pub fn l2_norm(values: &[f32]) -> f32 {
    let mut sum = 0.0_f32;
    for value in values {
        sum += value * value;
    }
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Encodes the first sample and the length so order mistakes are visible.
    #[derive(Clone, Default)]
    struct TaggingEmbedder {
        calls: Arc<AtomicUsize>,
    }

    impl Embedder for TaggingEmbedder {
        fn embed_one(&self, waveform: &[f32]) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let first = waveform.first().copied().unwrap_or(0.0);
            Embedding::normalized(vec![first, waveform.len() as f32, 1.0])
        }
    }

    fn items() -> Vec<Vec<f32>> {
        (0..7).map(|idx| vec![idx as f32 + 1.0; idx + 3]).collect()
    }

    #[test]
    fn normalized_embedding_has_unit_norm() {
        let embedding = Embedding::normalized(vec![3.0, 4.0]).unwrap();
        assert!((l2_norm(&embedding) - 1.0).abs() < 1e-6);
        assert_eq!(embedding.as_slice(), &[0.6, 0.8]);
    }

    #[test]
    fn zero_vector_is_rejected() {
        let err = Embedding::normalized(vec![0.0; 4]).unwrap_err();
        assert!(matches!(err, NomadError::ZeroNorm { .. }));
    }

    #[test]
    fn non_finite_vector_is_rejected() {
        let err = Embedding::normalized(vec![f32::NAN, 1.0]).unwrap_err();
        assert!(matches!(err, NomadError::ZeroNorm { .. }));
    }

    #[test]
    fn parallel_embedding_matches_sequential_order() {
        let embedder = TaggingEmbedder::default();
        let items = items();
        let sequential = embed(&embedder, &items).unwrap();
        for workers in [1, 2, 3, 16] {
            let parallel = embed_parallel(&embedder, &items, workers).unwrap();
            assert_eq!(parallel, sequential, "workers = {workers}");
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), items.len() * 5);
    }

    #[test]
    fn embed_keeps_item_order() {
        let embedder = TaggingEmbedder::default();
        let items = vec![vec![0.5_f32; 4], vec![0.25; 4], vec![0.75; 4]];
        let set = embed(&embedder, &items).unwrap();
        let firsts: Vec<f32> = set
            .iter()
            .zip(&items)
            .map(|(embedding, item)| {
                let expected = Embedding::normalized(vec![item[0], 4.0, 1.0]).unwrap();
                assert_eq!(embedding, &expected);
                embedding[0]
            })
            .collect();
        assert!(firsts[1] < firsts[0] && firsts[0] < firsts[2]);
    }

    #[test]
    fn parallel_embedding_propagates_errors() {
        #[derive(Clone)]
        struct PassThrough;
        impl Embedder for PassThrough {
            fn embed_one(&self, waveform: &[f32]) -> Result<Embedding> {
                Embedding::normalized(waveform.to_vec())
            }
        }
        let items = vec![vec![1.0_f32; 2], Vec::new()];
        let err = embed_parallel(&PassThrough, &items, 2).unwrap_err();
        assert!(matches!(err, NomadError::ZeroNorm { .. }));
    }

    #[test]
    fn empty_items_produce_empty_set() {
        let embedder = TaggingEmbedder::default();
        let items: Vec<Vec<f32>> = Vec::new();
        assert!(embed_parallel(&embedder, &items, 4).unwrap().is_empty());
    }
}
