//! Gaussian Noise Source
//!
//! White Gaussian noise via the Box-Muller transform with a cached spare
//! normal: each draw of two uniforms yields two independent normals, so
//! every other call is free. The uniform source is any [`rand::Rng`], which
//! keeps tests reproducible with a seeded generator.
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::noise::GaussianNoise;
//!
//! let mut noise = GaussianNoise::seeded(42);
//! let x = noise.sample(0.1);
//! assert!(x.is_finite());
//!
//! // A zero sigma short-circuits without consuming randomness.
//! assert_eq!(noise.sample(0.0), 0.0);
//! ```

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Box-Muller Gaussian noise generator over a pluggable uniform source.
#[derive(Debug, Clone)]
pub struct GaussianNoise<R = StdRng> {
    rng: R,
    /// Second normal from the last Box-Muller draw, scaled on use.
    spare: Option<f64>,
}

impl GaussianNoise<StdRng> {
    /// Create a generator seeded from system entropy.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a reproducible generator from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> GaussianNoise<R> {
    /// Create a generator over an arbitrary uniform source.
    pub fn with_rng(rng: R) -> Self {
        Self { rng, spare: None }
    }

    /// Draw one sample of N(0, sigma²).
    ///
    /// Returns exactly 0.0 without consuming any uniforms when `sigma` is
    /// zero, so a muted noise source leaves the rng sequence untouched.
    pub fn sample(&mut self, sigma: f64) -> f64 {
        if sigma == 0.0 {
            return 0.0;
        }
        if let Some(z1) = self.spare.take() {
            return sigma * z1;
        }
        // u1 must be in (0, 1] for the log; gen() yields [0, 1).
        let u1 = 1.0 - self.rng.gen::<f64>();
        let u2 = self.rng.gen::<f64>();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = TAU * u2;
        self.spare = Some(r * theta.sin());
        sigma * r * theta.cos()
    }

    /// Drop the cached spare normal.
    pub fn reset(&mut self) {
        self.spare = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rng wrapper that counts how many words were consumed.
    struct CountingRng {
        inner: StdRng,
        draws: u64,
    }

    impl rand::RngCore for CountingRng {
        fn next_u32(&mut self) -> u32 {
            self.draws += 1;
            self.inner.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.draws += 1;
            self.inner.next_u64()
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.draws += 1;
            self.inner.fill_bytes(dest)
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.draws += 1;
            self.inner.try_fill_bytes(dest)
        }
    }

    #[test]
    fn test_zero_sigma_draws_nothing() {
        let mut noise = GaussianNoise::with_rng(CountingRng {
            inner: StdRng::seed_from_u64(7),
            draws: 0,
        });
        for _ in 0..1000 {
            assert_eq!(noise.sample(0.0), 0.0);
        }
        assert_eq!(noise.rng.draws, 0, "sigma=0 must not consume uniforms");
    }

    #[test]
    fn test_zero_mean_unit_variance() {
        let mut noise = GaussianNoise::seeded(42);
        let samples: Vec<f64> = (0..100_000).map(|_| noise.sample(1.0)).collect();

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let variance =
            samples.iter().map(|&s| (s - mean).powi(2)).sum::<f64>() / samples.len() as f64;

        assert!(mean.abs() < 0.02, "mean should be ~0: got {mean:.4}");
        assert!(
            (variance - 1.0).abs() < 0.05,
            "variance should be ~1: got {variance:.4}"
        );
    }

    #[test]
    fn test_sigma_scales_spread() {
        let mut noise = GaussianNoise::seeded(42);
        let samples: Vec<f64> = (0..100_000).map(|_| noise.sample(0.5)).collect();
        let variance = samples.iter().map(|&s| s * s).sum::<f64>() / samples.len() as f64;
        assert!(
            (variance - 0.25).abs() < 0.02,
            "sigma=0.5 should give variance ~0.25: got {variance:.4}"
        );
    }

    #[test]
    fn test_seeded_reproducibility() {
        let mut a = GaussianNoise::seeded(123);
        let mut b = GaussianNoise::seeded(123);
        for _ in 0..1000 {
            assert_eq!(a.sample(1.0), b.sample(1.0));
        }
    }

    #[test]
    fn test_spare_is_scaled_on_use() {
        // The cached second normal must be scaled with the sigma of the call
        // that consumes it, not the one that produced it.
        let mut unit = GaussianNoise::seeded(9);
        let _ = unit.sample(1.0);
        let second_unit = unit.sample(1.0);

        let mut scaled = GaussianNoise::seeded(9);
        let _ = scaled.sample(1.0);
        let second_scaled = scaled.sample(2.0);

        assert!((second_scaled - 2.0 * second_unit).abs() < 1e-12);
    }

    #[test]
    fn test_matches_reference_normal_distribution() {
        // Compare tail mass against rand_distr's Normal at the same sigma.
        use rand_distr::{Distribution, Normal};

        let sigma = 0.7;
        let n = 100_000;

        let mut ours = GaussianNoise::seeded(11);
        let our_tail = (0..n)
            .filter(|_| ours.sample(sigma).abs() > sigma)
            .count() as f64
            / n as f64;

        let normal = Normal::new(0.0, sigma).unwrap();
        let mut rng = StdRng::seed_from_u64(12);
        let ref_tail = (0..n)
            .filter(|_| normal.sample(&mut rng).abs() > sigma)
            .count() as f64
            / n as f64;

        // P(|X| > sigma) is ~31.7% for a normal distribution.
        assert!(
            (our_tail - ref_tail).abs() < 0.01,
            "tail mass {our_tail:.4} should match reference {ref_tail:.4}"
        );
    }

    #[test]
    fn test_reset_drops_spare() {
        let mut noise = GaussianNoise::seeded(5);
        let _ = noise.sample(1.0);
        assert!(noise.spare.is_some());
        noise.reset();
        assert!(noise.spare.is_none());
    }
}
