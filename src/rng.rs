//! RNG capability.
//!
//! The core never holds its own RNG state. Every sampling entry point takes
//! an `&mut dyn RngCapability`; callers who don't care use
//! [`default_rng`], which is backed by `rand::thread_rng()` — already a
//! shared, thread-local singleton, so no additional global state is
//! introduced here.

use rand::RngCore;

/// Produces uniform `[0,1)` samples and bounded integers.
///
/// Blanket-implemented for anything that implements `rand::RngCore`
/// (including `dyn RngCore` trait objects), so any `rand`-compatible RNG
/// works as-is.
pub trait RngCapability {
    /// A uniform sample in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// A uniform integer in `[0, n)`. `n` must be greater than zero.
    fn next_below(&mut self, n: usize) -> usize;
}

impl<R: RngCore + ?Sized> RngCapability for R {
    fn next_unit(&mut self) -> f64 {
        rand::Rng::gen(self)
    }

    fn next_below(&mut self, n: usize) -> usize {
        rand::Rng::gen_range(self, 0..n)
    }
}

/// The process-default RNG: `rand`'s thread-local generator.
pub fn default_rng() -> rand::rngs::ThreadRng {
    rand::thread_rng()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_unit_is_in_unit_interval() {
        let mut rng = default_rng();
        for _ in 0..1000 {
            let u = rng.next_unit();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn next_below_respects_bound() {
        let mut rng = default_rng();
        for _ in 0..1000 {
            assert!(rng.next_below(7) < 7);
        }
        assert_eq!(rng.next_below(1), 0);
    }

    #[test]
    fn dyn_rngcore_works_through_the_capability() {
        let mut rng = default_rng();
        let dyn_rng: &mut dyn RngCore = &mut rng;
        let u = dyn_rng.next_unit();
        assert!((0.0..1.0).contains(&u));
    }
}
