//! The Mealy-flavored IOHMM engine: forward/backward recurrences,
//! joint-sequence probability, and transactional Baum-Welch re-estimation.

use crate::distribution::{validate_eta, Distribution, FiniteDistribution};
use crate::error::{IohmmError, Result};
use crate::rng::RngCapability;
use crate::transition::TransitionDistribution;

/// Threshold below which a forward/backward normalizer `S_t` is treated as
/// zero. A degenerate time step is never a hard error: it is logged and its
/// contribution to the re-estimation is skipped.
const DEGENERATE_EPS: f64 = 1e-12;

/// `pi`: initial-state distribution. `a[i]`: input-conditioned distribution
/// over the next state, given the chain is currently in state `i`. `b[i]`:
/// input-conditioned distribution over the emitted output, given the chain
/// is currently in state `i`. Emissions are Mealy-style: `b[i]` depends on
/// the input at the *same* time step as the emission, not the prior one.
#[derive(Clone)]
pub struct MealyIOHMM<I, O> {
    pi: FiniteDistribution,
    a: Vec<Box<dyn TransitionDistribution<I, usize>>>,
    b: Vec<Box<dyn TransitionDistribution<I, O>>>,
}

impl<I, O> MealyIOHMM<I, O>
where
    I: Clone + 'static,
    O: Clone + 'static,
{
    pub fn new(
        pi: FiniteDistribution,
        a: Vec<Box<dyn TransitionDistribution<I, usize>>>,
        b: Vec<Box<dyn TransitionDistribution<I, O>>>,
    ) -> Result<Self> {
        let n = pi.n_categories();
        if a.len() != n || b.len() != n {
            return Err(IohmmError::InvalidInput(format!(
                "pi has {n} states but a has {} and b has {}",
                a.len(),
                b.len()
            )));
        }
        Ok(Self { pi, a, b })
    }

    /// Build a model with `num_states` states, generating `a[i]`/`b[i]`
    /// from per-state constructors and an initially-uniform `pi`.
    pub fn new_with_generators(
        num_states: usize,
        mut a_generator: impl FnMut(usize) -> Box<dyn TransitionDistribution<I, usize>>,
        mut b_generator: impl FnMut(usize) -> Box<dyn TransitionDistribution<I, O>>,
    ) -> Result<Self> {
        if num_states == 0 {
            return Err(IohmmError::InvalidInput("num_states must be >= 1".into()));
        }
        let pi = FiniteDistribution::uniform(num_states)?;
        let a = (0..num_states).map(&mut a_generator).collect();
        let b = (0..num_states).map(&mut b_generator).collect();
        Self::new(pi, a, b)
    }

    pub fn num_states(&self) -> usize {
        self.pi.n_categories()
    }

    pub fn pi(&self) -> &FiniteDistribution {
        &self.pi
    }

    pub fn a(&self, state: usize) -> Result<&dyn TransitionDistribution<I, usize>> {
        self.a
            .get(state)
            .map(|d| d.as_ref())
            .ok_or_else(|| IohmmError::OutOfDomain(format!("state {state} does not exist")))
    }

    pub fn b(&self, state: usize) -> Result<&dyn TransitionDistribution<I, O>> {
        self.b
            .get(state)
            .map(|d| d.as_ref())
            .ok_or_else(|| IohmmError::OutOfDomain(format!("state {state} does not exist")))
    }

    /// Reset the initial-state distribution to uniform. Used to recover
    /// from a chain that has collapsed onto a single state.
    pub fn reset_pi(&mut self) {
        self.pi.reset();
    }

    /// Lazy forward recurrence. Consumes `inputs`/`outputs` in lockstep,
    /// one time step per `next()` call, so it can be driven by unbounded
    /// streams; it never buffers more than the previous alpha vector.
    pub fn alphas<II, OI>(&self, inputs: II, outputs: OI) -> AlphaIter<'_, I, O, II::IntoIter, OI::IntoIter>
    where
        II: IntoIterator<Item = I>,
        OI: IntoIterator<Item = O>,
    {
        AlphaIter {
            model: self,
            inputs: inputs.into_iter(),
            outputs: outputs.into_iter(),
            previous: None,
            previous_x: None,
        }
    }

    /// Lazy backward recurrence, yielded in reverse time order
    /// (`beta_{T-1}, beta_{T-2}, ..., beta_0`). Unlike `alphas`, this
    /// requires a known sequence end, so it takes slices rather than
    /// arbitrary iterators.
    pub fn betas_reverse<'m>(&'m self, inputs: &'m [I], outputs: &'m [O]) -> Result<BetaReverseIter<'m, I, O>> {
        if inputs.len() != outputs.len() || inputs.is_empty() {
            return Err(IohmmError::InvalidInput(
                "inputs and outputs must be equal-length and non-empty".into(),
            ));
        }
        Ok(BetaReverseIter {
            model: self,
            inputs,
            outputs,
            next_t: Some(inputs.len() - 1),
            previous: vec![1.0; self.num_states()],
        })
    }

    /// Forward-ordered betas, built by materializing and reversing
    /// `betas_reverse` rather than a second recursion.
    pub fn betas(&self, inputs: &[I], outputs: &[O]) -> Result<Vec<Vec<f64>>> {
        let mut rows = self
            .betas_reverse(inputs, outputs)?
            .collect::<Result<Vec<_>>>()?;
        rows.reverse();
        Ok(rows)
    }

    /// The joint probability `P(inputs, outputs)` under the model: the sum
    /// of the final forward vector.
    pub fn probability(&self, inputs: &[I], outputs: &[O]) -> Result<f64> {
        if inputs.len() != outputs.len() || inputs.is_empty() {
            return Err(IohmmError::InvalidInput(
                "inputs and outputs must be equal-length and non-empty".into(),
            ));
        }
        let mut last = None;
        for row in self.alphas(inputs.iter().cloned(), outputs.iter().cloned()) {
            last = Some(row?);
        }
        Ok(last.expect("non-empty inputs yield at least one alpha row").iter().sum())
    }

    /// Sample a state/output sequence for a given input sequence. The
    /// model has no prior over inputs (Mealy flavor): `inputs` always
    /// comes from the caller.
    pub fn generate(&self, inputs: &[I], rng: &mut dyn RngCapability) -> Result<(Vec<usize>, Vec<O>)> {
        if inputs.is_empty() {
            return Err(IohmmError::InvalidInput("inputs must be non-empty".into()));
        }
        let mut states = Vec::with_capacity(inputs.len());
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut state = self.pi.sample(rng);
        for (t, x) in inputs.iter().enumerate() {
            if t > 0 {
                state = self.a[state].sample(x, rng)?;
            }
            let y = self.b[state].sample(x, rng)?;
            states.push(state);
            outputs.push(y);
        }
        Ok((states, outputs))
    }

    /// One Baum-Welch re-estimation pass over a single sequence, blending
    /// `pi`/`a`/`b` towards this sequence's MLE with weight `eta`.
    /// Transactional: on any error, `self` is left completely untouched.
    /// Time steps with a degenerate normalizer (`S_t ~= 0`) are logged and
    /// excluded from the update rather than failing the call.
    pub fn train(&mut self, inputs: &[I], outputs: &[O], eta: f64) -> Result<()> {
        validate_eta(eta)?;
        if inputs.len() != outputs.len() || inputs.is_empty() {
            return Err(IohmmError::InvalidInput(
                "inputs and outputs must be equal-length and non-empty".into(),
            ));
        }
        let t_len = inputs.len();
        let n = self.num_states();

        let alpha: Vec<Vec<f64>> = self
            .alphas(inputs.iter().cloned(), outputs.iter().cloned())
            .collect::<Result<Vec<_>>>()?;
        let beta = self.betas(inputs, outputs)?;

        let mut s = vec![0.0; t_len];
        for t in 0..t_len {
            s[t] = alpha[t].iter().zip(&beta[t]).map(|(a, b)| a * b).sum();
            if s[t] <= DEGENERATE_EPS {
                log::warn!("train: degenerate time step t={t} (S_t ~= 0), skipping");
            }
        }

        let mut gamma = vec![vec![0.0; n]; t_len];
        for t in 0..t_len {
            if s[t] <= DEGENERATE_EPS {
                continue;
            }
            for i in 0..n {
                gamma[t][i] = alpha[t][i] * beta[t][i] / s[t];
            }
        }

        let mut pi_weighted: Vec<(usize, f64)> = Vec::new();
        if s[0] > DEGENERATE_EPS {
            for i in 0..n {
                pi_weighted.push((i, gamma[0][i]));
            }
        } else {
            log::warn!("train: skipping pi update, S_0 ~= 0");
        }

        let mut a_weighted: Vec<Vec<(I, usize, f64)>> = vec![Vec::new(); n];
        let mut b_weighted: Vec<Vec<(I, O, f64)>> = vec![Vec::new(); n];
        for t in 0..t_len {
            if s[t] > DEGENERATE_EPS {
                for i in 0..n {
                    b_weighted[i].push((inputs[t].clone(), outputs[t].clone(), gamma[t][i]));
                }
            }
            if t + 1 < t_len && s[t] > DEGENERATE_EPS {
                for i in 0..n {
                    for j in 0..n {
                        // a_ij is conditioned on the departure-time input
                        // `inputs[t]`; only the emission term uses `t + 1`.
                        let a_ij = self.a[i].pdf(&inputs[t], &j)?;
                        let b_j = self.b[j].pdf(&inputs[t + 1], &outputs[t + 1])?;
                        let xi = alpha[t][i] * a_ij * b_j * beta[t + 1][j];
                        a_weighted[i].push((inputs[t].clone(), j, xi));
                    }
                }
            }
        }

        let mut new_pi = self.pi.clone();
        if !pi_weighted.is_empty() {
            new_pi.fit(&pi_weighted, eta)?;
        }

        let mut new_a = self.a.clone();
        for (i, weighted) in a_weighted.iter().enumerate() {
            if !weighted.is_empty() {
                new_a[i].fit_unnormalized(weighted, eta)?;
            }
        }

        let mut new_b = self.b.clone();
        for (i, weighted) in b_weighted.iter().enumerate() {
            if !weighted.is_empty() {
                new_b[i].fit_unnormalized(weighted, eta)?;
            }
        }

        self.pi = new_pi;
        self.a = new_a;
        self.b = new_b;
        Ok(())
    }

    /// Apply `train` sequentially over several sequences. Not pooled
    /// multi-sequence EM: each sequence's re-estimation is committed before
    /// the next one starts.
    pub fn train_many(&mut self, sequences: &[(Vec<I>, Vec<O>)], eta: f64) -> Result<()> {
        for (inputs, outputs) in sequences {
            self.train(inputs, outputs, eta)?;
        }
        Ok(())
    }
}

pub struct AlphaIter<'m, I, O, II, OI> {
    model: &'m MealyIOHMM<I, O>,
    inputs: II,
    outputs: OI,
    previous: Option<Vec<f64>>,
    previous_x: Option<I>,
}

impl<'m, I, O, II, OI> Iterator for AlphaIter<'m, I, O, II, OI>
where
    I: Clone + 'static,
    O: Clone + 'static,
    II: Iterator<Item = I>,
    OI: Iterator<Item = O>,
{
    type Item = Result<Vec<f64>>;

    fn next(&mut self) -> Option<Self::Item> {
        let x = self.inputs.next()?;
        let y = self.outputs.next()?;
        let n = self.model.num_states();
        let mut alpha = vec![0.0; n];
        match (&self.previous, &self.previous_x) {
            (None, _) => {
                for (i, slot) in alpha.iter_mut().enumerate() {
                    let pi_i = match self.model.pi.pdf(&i) {
                        Ok(v) => v,
                        Err(e) => return Some(Err(e)),
                    };
                    let b_i = match self.model.b[i].pdf(&x, &y) {
                        Ok(v) => v,
                        Err(e) => return Some(Err(e)),
                    };
                    *slot = pi_i * b_i;
                }
            }
            (Some(prev), Some(prev_x)) => {
                for (i, slot) in alpha.iter_mut().enumerate() {
                    let mut sum = 0.0;
                    for (j, prev_j) in prev.iter().enumerate() {
                        // a_ji is conditioned on the departure-time input (the
                        // previous step's), not the arrival-time input `x`.
                        let a_ji = match self.model.a[j].pdf(prev_x, &i) {
                            Ok(v) => v,
                            Err(e) => return Some(Err(e)),
                        };
                        sum += prev_j * a_ji;
                    }
                    let b_i = match self.model.b[i].pdf(&x, &y) {
                        Ok(v) => v,
                        Err(e) => return Some(Err(e)),
                    };
                    *slot = sum * b_i;
                }
            }
            (Some(_), None) => unreachable!("previous alpha is always paired with previous_x"),
        }
        self.previous = Some(alpha.clone());
        self.previous_x = Some(x);
        Some(Ok(alpha))
    }
}

pub struct BetaReverseIter<'m, I, O> {
    model: &'m MealyIOHMM<I, O>,
    inputs: &'m [I],
    outputs: &'m [O],
    next_t: Option<usize>,
    previous: Vec<f64>,
}

impl<'m, I, O> Iterator for BetaReverseIter<'m, I, O>
where
    I: Clone + 'static,
    O: Clone + 'static,
{
    type Item = Result<Vec<f64>>;

    fn next(&mut self) -> Option<Self::Item> {
        let t = self.next_t?;
        let n = self.model.num_states();
        let last = self.inputs.len() - 1;
        let beta = if t == last {
            vec![1.0; n]
        } else {
            // The hidden transition out of t is conditioned on the
            // departure-time input `x_t`; the emission at t+1 is conditioned
            // on the arrival-time input `x_{t+1}`.
            let x_t = &self.inputs[t];
            let x_next = &self.inputs[t + 1];
            let y_next = &self.outputs[t + 1];
            let mut beta = vec![0.0; n];
            for (i, slot) in beta.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (j, prev_j) in self.previous.iter().enumerate() {
                    let a_ij = match self.model.a[i].pdf(x_t, &j) {
                        Ok(v) => v,
                        Err(e) => return Some(Err(e)),
                    };
                    let b_j = match self.model.b[j].pdf(x_next, y_next) {
                        Ok(v) => v,
                        Err(e) => return Some(Err(e)),
                    };
                    sum += a_ij * b_j * prev_j;
                }
                *slot = sum;
            }
            beta
        };
        self.previous = beta.clone();
        self.next_t = if t == 0 { None } else { Some(t - 1) };
        Some(Ok(beta))
    }
}
