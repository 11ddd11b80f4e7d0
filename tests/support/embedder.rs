use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use nomad::{Embedder, Embedding, Result};

/// Stand-in for the network: maps the ratio of first-difference energy to
/// signal energy onto an angle on the unit circle.
///
/// Pure tones have a small ratio and white noise a ratio near sqrt(2), so
/// added noise moves an embedding steadily away from clean tones.
#[derive(Clone, Default)]
pub struct RoughnessEmbedder {
    pub calls: Arc<AtomicUsize>,
}

impl RoughnessEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for RoughnessEmbedder {
    fn embed_one(&self, waveform: &[f32]) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let energy: f64 = waveform.iter().map(|&s| (s as f64).powi(2)).sum();
        let diff_energy: f64 = waveform
            .windows(2)
            .map(|pair| (pair[1] as f64 - pair[0] as f64).powi(2))
            .sum();
        let ratio = if energy > 0.0 {
            (diff_energy / energy).sqrt()
        } else {
            0.0
        };
        let angle = ratio.atan();
        Embedding::normalized(vec![angle.cos() as f32, angle.sin() as f32])
    }
}
