//! The `Distribution<T>` capability and its finite-categorical leaves:
//! `FiniteDistribution` and `IntegerRangeDistribution`.

use crate::error::{IohmmError, Result};
use crate::rng::{default_rng, RngCapability};

/// Tolerance used for probability-sum validation.
pub const EPS: f64 = 1e-6;

pub(crate) fn validate_eta(eta: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&eta) {
        return Err(IohmmError::InvalidInput(format!(
            "eta must be in [0,1], got {eta}"
        )));
    }
    Ok(())
}

/// A probability distribution over a domain `T`: evaluate, sample, fit to
/// weighted observations, and reset to a canonical state.
pub trait Distribution<T: Clone> {
    /// Probability (density or mass) at `x`. `OutOfDomain` if `x` is
    /// outside the declared support.
    fn pdf(&self, x: &T) -> Result<f64>;

    /// Draw a sample distributed according to `pdf`.
    fn sample(&self, rng: &mut dyn RngCapability) -> T;

    /// `sample` using the process-default RNG.
    fn sample_default(&self) -> T {
        self.sample(&mut default_rng())
    }

    /// Blend the distribution towards the MLE of `weighted` (a sequence of
    /// `(x, w)` pairs with `w >= 0` and `sum(w) = 1 +/- EPS`):
    /// `self <- (1 - eta) * self + eta * mle(weighted)`. A no-op if
    /// `weighted` is empty.
    fn fit(&mut self, weighted: &[(T, f64)], eta: f64) -> Result<()>;

    /// Like `fit`, but `weighted`'s weights need not sum to one; they are
    /// renormalized internally before blending. The default renormalizes
    /// and delegates to `fit` (the scale-invariant mixin); distribution
    /// families whose fit is already scale-invariant may override this to
    /// skip the extra pass.
    fn fit_unnormalized(&mut self, weighted: &[(T, f64)], eta: f64) -> Result<()> {
        validate_eta(eta)?;
        if weighted.is_empty() {
            return Ok(());
        }
        let total: f64 = weighted.iter().map(|(_, w)| *w).sum();
        if total <= 0.0 {
            return Ok(());
        }
        let normalized: Vec<(T, f64)> = weighted
            .iter()
            .map(|(x, w)| (x.clone(), w / total))
            .collect();
        self.fit(&normalized, eta)
    }

    /// Return to the canonical initial state (uniform for categorical
    /// families, `N(0,1)` for Gaussian).
    fn reset(&mut self);

    /// Strong perturbation used to escape degenerate models. The only
    /// contract is that the distribution remains valid afterwards; the
    /// default simply resets.
    fn randomize(&mut self, rng: &mut dyn RngCapability) {
        let _ = rng;
        self.reset();
    }
}

/// A discrete distribution over `{0..n-1}`, stored as cumulative
/// probabilities of the first `n-1` categories (category `n-1` is implied).
#[derive(Debug, Clone, PartialEq)]
pub struct FiniteDistribution {
    cum: Vec<f64>,
}

impl FiniteDistribution {
    /// The uniform distribution over `n` categories.
    pub fn uniform(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(IohmmError::InvalidInput("n must be >= 1".into()));
        }
        Ok(Self {
            cum: (1..n).map(|k| k as f64 / n as f64).collect(),
        })
    }

    /// Construct from an explicit probability vector. Must sum to one
    /// within `EPS` and contain no negative entries.
    pub fn from_probabilities(probabilities: &[f64]) -> Result<Self> {
        let n = probabilities.len();
        if n == 0 {
            return Err(IohmmError::InvalidInput("n must be >= 1".into()));
        }
        if probabilities.iter().any(|&p| p < 0.0) {
            return Err(IohmmError::InvalidInput(
                "probabilities must be non-negative".into(),
            ));
        }
        let total: f64 = probabilities.iter().sum();
        if (total - 1.0).abs() > EPS {
            return Err(IohmmError::InvalidInput(format!(
                "probabilities must sum to 1 (got {total})"
            )));
        }
        let mut cum = Vec::with_capacity(n - 1);
        let mut running = 0.0;
        for &p in &probabilities[..n - 1] {
            running += p;
            cum.push(running);
        }
        Ok(Self { cum })
    }

    pub fn n_categories(&self) -> usize {
        self.cum.len() + 1
    }

    /// The mass of every category, in order.
    pub fn probabilities(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.n_categories()).map(move |k| self.mass(k))
    }

    fn mass(&self, k: usize) -> f64 {
        let n = self.n_categories();
        if k == n - 1 {
            1.0 - self.cum.last().copied().unwrap_or(0.0)
        } else {
            let prev = if k == 0 { 0.0 } else { self.cum[k - 1] };
            self.cum[k] - prev
        }
    }
}

impl Distribution<usize> for FiniteDistribution {
    fn pdf(&self, x: &usize) -> Result<f64> {
        let k = *x;
        if k >= self.n_categories() {
            return Err(IohmmError::OutOfDomain(format!(
                "category {k} not in [0,{})",
                self.n_categories()
            )));
        }
        Ok(self.mass(k))
    }

    fn sample(&self, rng: &mut dyn RngCapability) -> usize {
        let u = rng.next_unit();
        // Smallest k with u < cum[k]; cum[n-1] is implicitly 1.
        let k = self.cum.partition_point(|&c| c <= u);
        k.min(self.n_categories() - 1)
    }

    fn fit(&mut self, weighted: &[(usize, f64)], eta: f64) -> Result<()> {
        validate_eta(eta)?;
        if weighted.is_empty() {
            return Ok(());
        }
        let n = self.n_categories();
        let mut mass = vec![0.0; n];
        let mut total = 0.0;
        for (k, w) in weighted {
            if *k >= n {
                return Err(IohmmError::InvalidInput(format!(
                    "category {k} not in [0,{n}) during fit"
                )));
            }
            if *w < 0.0 {
                return Err(IohmmError::InvalidInput(
                    "weight must be non-negative".into(),
                ));
            }
            mass[*k] += w;
            total += w;
        }
        if total == 0.0 {
            return Ok(());
        }
        let mut new_cum = Vec::with_capacity(n.saturating_sub(1));
        let mut running = 0.0;
        for m in mass.iter().take(n.saturating_sub(1)) {
            running += m / total;
            new_cum.push(running);
        }
        for (c, new_c) in self.cum.iter_mut().zip(new_cum) {
            *c = (1.0 - eta) * *c + eta * new_c;
        }
        Ok(())
    }

    fn reset(&mut self) {
        let n = self.n_categories();
        self.cum = (1..n).map(|k| k as f64 / n as f64).collect();
    }
}

/// A `FiniteDistribution` bijected onto the integer range `[lower..upper]`
/// by `index = value - lower`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerRangeDistribution {
    lower: i64,
    inner: FiniteDistribution,
}

impl IntegerRangeDistribution {
    pub fn new(lower: i64, upper: i64) -> Result<Self> {
        if upper < lower {
            return Err(IohmmError::InvalidInput(format!(
                "upper ({upper}) must be >= lower ({lower})"
            )));
        }
        let n = (upper - lower + 1) as usize;
        Ok(Self {
            lower,
            inner: FiniteDistribution::uniform(n)?,
        })
    }

    pub fn from_probabilities(lower: i64, probabilities: &[f64]) -> Result<Self> {
        Ok(Self {
            lower,
            inner: FiniteDistribution::from_probabilities(probabilities)?,
        })
    }

    pub fn lower(&self) -> i64 {
        self.lower
    }

    pub fn upper(&self) -> i64 {
        self.lower + self.inner.n_categories() as i64 - 1
    }

    pub fn probabilities(&self) -> impl Iterator<Item = f64> + '_ {
        self.inner.probabilities()
    }

    fn index_of(&self, x: i64) -> Result<usize> {
        let idx = x - self.lower;
        if idx < 0 || idx >= self.inner.n_categories() as i64 {
            return Err(IohmmError::OutOfDomain(format!(
                "{x} not in [{},{}]",
                self.lower(),
                self.upper()
            )));
        }
        Ok(idx as usize)
    }

    /// Like `index_of`, but for use during fitting: out-of-range observations
    /// are rejected as `InvalidInput` rather than `OutOfDomain`.
    fn fit_index_of(&self, x: i64) -> Result<usize> {
        let idx = x - self.lower;
        if idx < 0 || idx >= self.inner.n_categories() as i64 {
            return Err(IohmmError::InvalidInput(format!(
                "{x} not in [{},{}] during fit",
                self.lower(),
                self.upper()
            )));
        }
        Ok(idx as usize)
    }
}

impl Distribution<i64> for IntegerRangeDistribution {
    fn pdf(&self, x: &i64) -> Result<f64> {
        let idx = self.index_of(*x)?;
        self.inner.pdf(&idx)
    }

    fn sample(&self, rng: &mut dyn RngCapability) -> i64 {
        self.lower + self.inner.sample(rng) as i64
    }

    fn fit(&mut self, weighted: &[(i64, f64)], eta: f64) -> Result<()> {
        validate_eta(eta)?;
        let mut mapped = Vec::with_capacity(weighted.len());
        for (x, w) in weighted {
            mapped.push((self.fit_index_of(*x)?, *w));
        }
        self.inner.fit(&mapped, eta)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}
