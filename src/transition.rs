//! Input-conditioned transition distributions: a joint distribution
//! over `(I, O)` exposed only in its input-conditioned form, and the
//! finite-index-mapped implementation that backs `A_i`/`B_i` inside the
//! Mealy engine.

use std::marker::PhantomData;
use std::sync::Arc;

use dyn_clone::{clone_trait_object, DynClone};

use crate::distribution::{validate_eta, Distribution};
use crate::error::{IohmmError, Result};
use crate::rng::{default_rng, RngCapability};

/// A joint distribution over `(I, O)`, queried and sampled in its
/// input-conditioned form: `pdf(x, y)` and `sample(x, rng)`. Sampling a
/// joint pair without a given input is left unimplemented: a principled
/// implementation would need a prior over inputs, which this core does not
/// carry.
///
/// `DynClone` is the supertrait that lets `Box<dyn TransitionDistribution<I, O>>`
/// itself be cloned (see `clone_trait_object!` below); `MealyIOHMM::train`
/// clones `A`/`B` up front so a failed re-estimation never leaves partially
/// mutated state.
pub trait TransitionDistribution<I, O: Clone>: DynClone {
    fn pdf(&self, x: &I, y: &O) -> Result<f64>;

    fn sample(&self, x: &I, rng: &mut dyn RngCapability) -> Result<O>;

    fn sample_default(&self, x: &I) -> Result<O> {
        self.sample(x, &mut default_rng())
    }

    /// For each input index `k`, filter `weighted` to the `(y, w)` pairs
    /// whose input maps to `k` and fit that slice independently.
    fn fit(&mut self, weighted: &[(I, O, f64)], eta: f64) -> Result<()>;

    /// As `fit`, but each slice's weights need not sum to one (each
    /// sub-distribution renormalizes its own slice).
    fn fit_unnormalized(&mut self, weighted: &[(I, O, f64)], eta: f64) -> Result<()>;
}

clone_trait_object!(<I, O: Clone> TransitionDistribution<I, O>);

type ToIndex<I> = Arc<dyn Fn(&I) -> Option<usize> + Send + Sync>;
type ToInput<I> = Arc<dyn Fn(usize) -> I + Send + Sync>;

/// One sub-distribution of `O` per input index. The index<->input mapping
/// is stored as two function values rather than a tagged enum, so the
/// struct stays generic over arbitrary `I` without resorting to a deep
/// class hierarchy.
pub struct FiniteTransitionDistribution<I, O, D> {
    sub: Vec<D>,
    to_index: ToIndex<I>,
    to_input: ToInput<I>,
    _output: PhantomData<O>,
}

impl<I, O, D> FiniteTransitionDistribution<I, O, D>
where
    D: Distribution<O> + Clone + 'static,
    O: Clone,
{
    pub fn new(
        sub: Vec<D>,
        to_index: impl Fn(&I) -> Option<usize> + Send + Sync + 'static,
        to_input: impl Fn(usize) -> I + Send + Sync + 'static,
    ) -> Result<Self> {
        if sub.is_empty() {
            return Err(IohmmError::InvalidInput(
                "a transition distribution needs at least one input index".into(),
            ));
        }
        Ok(Self {
            sub,
            to_index: Arc::new(to_index),
            to_input: Arc::new(to_input),
            _output: PhantomData,
        })
    }

    pub fn num_inputs(&self) -> usize {
        self.sub.len()
    }

    pub fn input_for_index(&self, k: usize) -> I {
        (self.to_input)(k)
    }

    pub fn sub_distribution(&self, k: usize) -> Option<&D> {
        self.sub.get(k)
    }

    fn index_of(&self, x: &I) -> Result<usize> {
        (self.to_index)(x).ok_or_else(|| {
            IohmmError::OutOfDomain("input does not map to a known index".into())
        })
    }

    fn bucket(&self, weighted: &[(I, O, f64)]) -> Result<Vec<Vec<(O, f64)>>> {
        let mut buckets: Vec<Vec<(O, f64)>> = vec![Vec::new(); self.sub.len()];
        for (x, y, w) in weighted {
            let k = self.index_of(x)?;
            buckets[k].push((y.clone(), *w));
        }
        Ok(buckets)
    }
}

impl<I, O, D: Clone> Clone for FiniteTransitionDistribution<I, O, D> {
    fn clone(&self) -> Self {
        Self {
            sub: self.sub.clone(),
            to_index: self.to_index.clone(),
            to_input: self.to_input.clone(),
            _output: PhantomData,
        }
    }
}

impl<I, O, D> TransitionDistribution<I, O> for FiniteTransitionDistribution<I, O, D>
where
    I: 'static,
    O: Clone + 'static,
    D: Distribution<O> + Clone + 'static,
{
    fn pdf(&self, x: &I, y: &O) -> Result<f64> {
        let k = self.index_of(x)?;
        self.sub[k].pdf(y)
    }

    fn sample(&self, x: &I, rng: &mut dyn RngCapability) -> Result<O> {
        let k = self.index_of(x)?;
        Ok(self.sub[k].sample(rng))
    }

    fn fit(&mut self, weighted: &[(I, O, f64)], eta: f64) -> Result<()> {
        validate_eta(eta)?;
        let buckets = self.bucket(weighted)?;
        let mut new_sub = self.sub.clone();
        for (k, bucket) in buckets.into_iter().enumerate() {
            new_sub[k].fit(&bucket, eta)?;
        }
        self.sub = new_sub;
        Ok(())
    }

    fn fit_unnormalized(&mut self, weighted: &[(I, O, f64)], eta: f64) -> Result<()> {
        validate_eta(eta)?;
        let buckets = self.bucket(weighted)?;
        let mut new_sub = self.sub.clone();
        for (k, bucket) in buckets.into_iter().enumerate() {
            new_sub[k].fit_unnormalized(&bucket, eta)?;
        }
        self.sub = new_sub;
        Ok(())
    }
}

/// `FiniteTransitionDistribution` specialized to integer inputs, with
/// `index = input - lower`. Mirrors how `IntegerRangeDistribution` wraps
/// `FiniteDistribution`.
pub struct IntegerRangeTransitionDistribution<O, D> {
    lower: i64,
    inner: FiniteTransitionDistribution<i64, O, D>,
}

impl<O, D> IntegerRangeTransitionDistribution<O, D>
where
    D: Distribution<O> + Clone + 'static,
    O: Clone,
{
    pub fn from_sub_distributions(lower: i64, sub: Vec<D>) -> Result<Self> {
        let n = sub.len();
        let inner = FiniteTransitionDistribution::new(
            sub,
            move |x: &i64| {
                let idx = x - lower;
                if idx >= 0 && (idx as usize) < n {
                    Some(idx as usize)
                } else {
                    None
                }
            },
            move |k: usize| lower + k as i64,
        )?;
        Ok(Self { lower, inner })
    }

    pub fn new(lower: i64, upper: i64, generator: impl Fn(usize) -> D) -> Result<Self> {
        if upper < lower {
            return Err(IohmmError::InvalidInput(format!(
                "upper ({upper}) must be >= lower ({lower})"
            )));
        }
        let n = (upper - lower + 1) as usize;
        let sub: Vec<D> = (0..n).map(generator).collect();
        Self::from_sub_distributions(lower, sub)
    }

    pub fn lower(&self) -> i64 {
        self.lower
    }

    pub fn upper(&self) -> i64 {
        self.lower + self.inner.num_inputs() as i64 - 1
    }
}

impl<O, D: Clone> Clone for IntegerRangeTransitionDistribution<O, D> {
    fn clone(&self) -> Self {
        Self {
            lower: self.lower,
            inner: self.inner.clone(),
        }
    }
}

impl<O, D> TransitionDistribution<i64, O> for IntegerRangeTransitionDistribution<O, D>
where
    O: Clone + 'static,
    D: Distribution<O> + Clone + 'static,
{
    fn pdf(&self, x: &i64, y: &O) -> Result<f64> {
        self.inner.pdf(x, y)
    }

    fn sample(&self, x: &i64, rng: &mut dyn RngCapability) -> Result<O> {
        self.inner.sample(x, rng)
    }

    fn fit(&mut self, weighted: &[(i64, O, f64)], eta: f64) -> Result<()> {
        self.inner.fit(weighted, eta)
    }

    fn fit_unnormalized(&mut self, weighted: &[(i64, O, f64)], eta: f64) -> Result<()> {
        self.inner.fit_unnormalized(weighted, eta)
    }
}
