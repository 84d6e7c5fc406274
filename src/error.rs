//! Error taxonomy for the IOHMM core.
//!
//! `Degenerate` conditions (an `S_t = 0` encountered during `train`) are not
//! represented here — they are surfaced only diagnostically via
//! `log::warn!`, and the affected time step is skipped rather than failing
//! the whole call.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IohmmError {
    /// A structural invariant was violated at construction time, or a
    /// fitting call was given malformed input (wrong length, negative
    /// weight, `eta` outside `[0,1]`, non-positive sigma, probabilities not
    /// summing to one, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A runtime query (`pdf`, `sample`, `a`, `b`, ...) was made at a value
    /// outside the distribution's declared support.
    #[error("value out of domain: {0}")]
    OutOfDomain(String),
}

pub type Result<T> = std::result::Result<T, IohmmError>;
