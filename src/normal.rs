//! `NormalDistribution`: a 1-D Gaussian with weighted-moment fitting.

use std::f64::consts::PI;

use crate::distribution::{validate_eta, Distribution};
use crate::error::{IohmmError, Result};
use crate::rng::RngCapability;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalDistribution {
    mu: f64,
    sigma: f64,
}

impl NormalDistribution {
    pub fn new(mu: f64, sigma: f64) -> Result<Self> {
        if sigma <= 0.0 {
            return Err(IohmmError::InvalidInput(format!(
                "sigma must be positive, got {sigma}"
            )));
        }
        Ok(Self { mu, sigma })
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn set_mu(&mut self, mu: f64) {
        self.mu = mu;
    }

    pub fn set_sigma(&mut self, sigma: f64) -> Result<()> {
        if sigma <= 0.0 {
            return Err(IohmmError::InvalidInput(format!(
                "sigma must be positive, got {sigma}"
            )));
        }
        self.sigma = sigma;
        Ok(())
    }
}

impl Default for NormalDistribution {
    fn default() -> Self {
        Self { mu: 0.0, sigma: 1.0 }
    }
}

impl Distribution<f64> for NormalDistribution {
    fn pdf(&self, x: &f64) -> Result<f64> {
        let z = (x - self.mu) / self.sigma;
        Ok((1.0 / (self.sigma * (2.0 * PI).sqrt())) * (-0.5 * z * z).exp())
    }

    fn sample(&self, rng: &mut dyn RngCapability) -> f64 {
        // Box-Muller.
        let u1 = rng.next_unit().max(f64::MIN_POSITIVE);
        let u2 = rng.next_unit();
        self.mu + self.sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).sin()
    }

    fn fit(&mut self, weighted: &[(f64, f64)], eta: f64) -> Result<()> {
        validate_eta(eta)?;
        if weighted.is_empty() {
            return Ok(());
        }
        let total_w: f64 = weighted.iter().map(|(_, w)| *w).sum();
        if (total_w - 1.0).abs() > 1e-3 {
            return Err(IohmmError::InvalidInput(format!(
                "weights must sum to 1 for fit(); got {total_w} (use fit_unnormalized)"
            )));
        }
        let mu_new: f64 = weighted.iter().map(|(x, w)| w * x).sum();
        let var_new: f64 = weighted
            .iter()
            .map(|(x, w)| w * (x - mu_new) * (x - mu_new))
            .sum();
        let sigma_new = var_new.sqrt();
        // Blends sigma linearly, not variance, matching the documented
        // (if statistically loose) behavior of the source this is derived from.
        self.mu = eta * mu_new + (1.0 - eta) * self.mu;
        self.sigma = eta * sigma_new + (1.0 - eta) * self.sigma;
        Ok(())
    }

    fn fit_unnormalized(&mut self, weighted: &[(f64, f64)], eta: f64) -> Result<()> {
        // Gaussian MLE is scale-invariant in the weights: renormalizing and
        // delegating to `fit` gives the same mu/sigma as computing the
        // weighted moments directly against the raw weights.
        validate_eta(eta)?;
        if weighted.is_empty() {
            return Ok(());
        }
        let total: f64 = weighted.iter().map(|(_, w)| *w).sum();
        if total <= 0.0 {
            return Ok(());
        }
        let normalized: Vec<(f64, f64)> =
            weighted.iter().map(|(x, w)| (*x, w / total)).collect();
        self.fit(&normalized, eta)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
