use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

pub const SAMPLE_RATE: u32 = 16_000;

pub fn sine(freq: f32, seconds: f32, amplitude: f32) -> Vec<f32> {
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

/// Add zero-mean Gaussian noise with standard deviation `sigma`.
pub fn with_noise(clean: &[f32], sigma: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0_f32, sigma).expect("finite, non-negative sigma");
    clean
        .iter()
        .map(|&sample| sample + noise.sample(&mut rng))
        .collect()
}

pub fn reference_tones() -> Vec<Vec<f32>> {
    [220.0, 440.0, 880.0]
        .iter()
        .map(|&freq| sine(freq, 1.0, 0.5))
        .collect()
}
