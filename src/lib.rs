//! Input-Output Hidden Markov Model (Mealy flavor).
//!
//! Three layers, each built on the one below:
//!
//! - [`distribution`]: the [`Distribution`] capability and its finite
//!   (categorical / integer-range) implementations, plus [`NormalDistribution`].
//! - [`transition`]: [`TransitionDistribution`], an input-conditioned
//!   distribution built by partitioning a [`Distribution`] per input index.
//! - [`mealy`]: [`MealyIOHMM`], the engine tying an initial-state
//!   distribution and per-state transition/emission distributions together
//!   with forward/backward recurrences and Baum-Welch re-estimation.
//!
//! Sampling never holds implicit RNG state; every entry point takes an
//! [`rng::RngCapability`] (or uses [`rng::default_rng`] for convenience).
//! Fitting methods are transactional: a call either fully commits or
//! leaves the receiver untouched, reported via [`error::IohmmError`].

pub mod distribution;
pub mod error;
pub mod mealy;
pub mod normal;
pub mod rng;
pub mod transition;

pub use distribution::{Distribution, FiniteDistribution, IntegerRangeDistribution};
pub use error::{IohmmError, Result};
pub use mealy::{AlphaIter, BetaReverseIter, MealyIOHMM};
pub use normal::NormalDistribution;
pub use rng::{default_rng, RngCapability};
pub use transition::{
    FiniteTransitionDistribution, IntegerRangeTransitionDistribution, TransitionDistribution,
};
