//! End-to-end scenarios, run as integration tests against the public API
//! rather than colocated unit tests, mirroring the `tests/integration_tests.rs`
//! convention used elsewhere in this corpus.

use mealy_iohmm::{
    Distribution, FiniteDistribution, IntegerRangeDistribution, IntegerRangeTransitionDistribution,
    MealyIOHMM, TransitionDistribution,
};

fn close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() < tol, "{a} !~= {b} (tol {tol})");
}

#[test]
fn integer_range_uniform_construction() {
    let d = IntegerRangeDistribution::new(1, 5).unwrap();
    assert_eq!(d.lower(), 1);
    assert_eq!(d.upper(), 5);
    for k in 1..=5 {
        close(d.pdf(&k).unwrap(), 0.2, 1e-6);
    }

    let d = IntegerRangeDistribution::new(1, 8).unwrap();
    for k in 1..=8 {
        close(d.pdf(&k).unwrap(), 0.125, 1e-6);
    }
}

#[test]
fn point_mass_fit() {
    let mut d = IntegerRangeDistribution::new(1, 5).unwrap();
    d.fit(&[(3, 1.0)], 1.0).unwrap();
    close(d.pdf(&1).unwrap(), 0.0, 1e-6);
    close(d.pdf(&2).unwrap(), 0.0, 1e-6);
    close(d.pdf(&3).unwrap(), 1.0, 1e-6);
    close(d.pdf(&4).unwrap(), 0.0, 1e-6);
    close(d.pdf(&5).unwrap(), 0.0, 1e-6);

    d.fit(&[(2, 1.0)], 0.25).unwrap();
    close(d.pdf(&1).unwrap(), 0.0, 1e-6);
    close(d.pdf(&2).unwrap(), 0.25, 1e-6);
    close(d.pdf(&3).unwrap(), 0.75, 1e-6);
    close(d.pdf(&4).unwrap(), 0.0, 1e-6);
    close(d.pdf(&5).unwrap(), 0.0, 1e-6);
}

/// `N=2`, inputs `{1,2}`, outputs `{0,1}`; `A_i(x)`/`B_i(x)` are the same
/// regardless of which of the two inputs is supplied, so the model reduces
/// to the textbook two-state example with matrices
/// `A = [[0.5,0.5],[0.3,0.7]]`, `B = [[0.3,0.7],[0.8,0.2]]`.
fn textbook_model() -> MealyIOHMM<i64, usize> {
    let pi = FiniteDistribution::from_probabilities(&[0.2, 0.8]).unwrap();
    let a_row = [[0.5, 0.5], [0.3, 0.7]];
    let b_row = [[0.3, 0.7], [0.8, 0.2]];

    let a: Vec<Box<dyn TransitionDistribution<i64, usize>>> = a_row
        .iter()
        .map(|row| {
            let row = *row;
            Box::new(
                IntegerRangeTransitionDistribution::<usize, FiniteDistribution>::new(1, 2, move |_| {
                    FiniteDistribution::from_probabilities(&row).unwrap()
                })
                .unwrap(),
            ) as Box<dyn TransitionDistribution<i64, usize>>
        })
        .collect();
    let b: Vec<Box<dyn TransitionDistribution<i64, usize>>> = b_row
        .iter()
        .map(|row| {
            let row = *row;
            Box::new(
                IntegerRangeTransitionDistribution::<usize, FiniteDistribution>::new(1, 2, move |_| {
                    FiniteDistribution::from_probabilities(&row).unwrap()
                })
                .unwrap(),
            ) as Box<dyn TransitionDistribution<i64, usize>>
        })
        .collect();

    MealyIOHMM::new(pi, a, b).unwrap()
}

#[test]
fn mealy_short_sequence_probability() {
    let m = textbook_model();

    close(m.probability(&[1], &[0]).unwrap(), 0.70, 1e-6);
    close(m.probability(&[1], &[1]).unwrap(), 0.30, 1e-6);
    close(m.probability(&[1, 1], &[0, 0]).unwrap(), 0.449, 1e-3);
    close(m.probability(&[1, 1], &[0, 1]).unwrap(), 0.251, 1e-3);
    close(m.probability(&[1, 1], &[1, 0]).unwrap(), 0.181, 1e-3);
    close(m.probability(&[1, 1], &[1, 1]).unwrap(), 0.119, 1e-3);
}

#[test]
fn mealy_alpha_values() {
    let m = textbook_model();

    let rows: Vec<Vec<f64>> = m
        .alphas([1_i64, 1].into_iter(), [0_usize, 0].into_iter())
        .collect::<mealy_iohmm::Result<Vec<_>>>()
        .unwrap();
    close(rows[0][0], 0.06, 1e-6);
    close(rows[0][1], 0.64, 1e-6);
    close(rows[1][0], 0.0666, 1e-4);
    close(rows[1][1], 0.3824, 1e-4);

    let rows: Vec<Vec<f64>> = m
        .alphas([1_i64, 1].into_iter(), [0_usize, 1].into_iter())
        .collect::<mealy_iohmm::Result<Vec<_>>>()
        .unwrap();
    close(rows[0][0], 0.06, 1e-6);
    close(rows[0][1], 0.64, 1e-6);
    close(rows[1][0], 0.1554, 1e-4);
    close(rows[1][1], 0.0956, 1e-4);
}

#[test]
fn mealy_beta_values() {
    let m = textbook_model();

    let betas = m.betas(&[1_i64, 1], &[0_usize, 0]).unwrap();
    close(betas[0][0], 0.55, 1e-6);
    close(betas[0][1], 0.65, 1e-6);
    close(betas[1][0], 1.0, 1e-6);
    close(betas[1][1], 1.0, 1e-6);

    let betas = m.betas(&[1_i64, 1], &[0_usize, 1]).unwrap();
    close(betas[0][0], 0.45, 1e-6);
    close(betas[0][1], 0.35, 1e-6);
    close(betas[1][0], 1.0, 1e-6);
    close(betas[1][1], 1.0, 1e-6);
}

#[test]
fn mealy_one_training_step_invariants() {
    let mut m = textbook_model();
    let inputs = [1_i64, 1, 1, 1];
    let outputs = [0_usize, 1, 0, 1];

    // Before training, alpha_0 only depends on pi/B, both untouched so far.
    let rows: Vec<Vec<f64>> = m
        .alphas(inputs.iter().cloned(), outputs.iter().cloned())
        .collect::<mealy_iohmm::Result<Vec<_>>>()
        .unwrap();
    close(rows[0][0], 0.06, 1e-6);
    close(rows[0][1], 0.64, 1e-6);

    m.train(&inputs, &outputs, 1.0).unwrap();

    let pi_sum: f64 = m.pi().probabilities().sum();
    close(pi_sum, 1.0, 1e-6);

    for i in 0..m.num_states() {
        for x in [1_i64, 2] {
            let a_i0 = m.a(i).unwrap().pdf(&x, &0).unwrap();
            let a_i1 = m.a(i).unwrap().pdf(&x, &1).unwrap();
            close(a_i0 + a_i1, 1.0, 1e-6);

            let b_i0 = m.b(i).unwrap().pdf(&x, &0).unwrap();
            let b_i1 = m.b(i).unwrap().pdf(&x, &1).unwrap();
            close(b_i0 + b_i1, 1.0, 1e-6);
        }
    }
}

#[test]
fn generate_then_recompute_probability_is_consistent() {
    let m = textbook_model();
    let inputs = vec![1_i64, 2, 1, 2, 1];
    let mut rng = rand::rngs::mock::StepRng::new(7, 1 << 24);
    let (_, outputs) = m.generate(&inputs, &mut rng).unwrap();
    let p = m.probability(&inputs, &outputs).unwrap();
    assert!(p > 0.0 && p <= 1.0);
}

/// Both states assign zero mass to output `0`, so any time step observing
/// `0` drives `S_t` to exactly zero and must be skipped rather than
/// corrupting the fit.
fn degenerate_model() -> MealyIOHMM<i64, usize> {
    let pi = FiniteDistribution::from_probabilities(&[0.5, 0.5]).unwrap();
    let a_row = [[0.6, 0.4], [0.4, 0.6]];
    let a: Vec<Box<dyn TransitionDistribution<i64, usize>>> = a_row
        .iter()
        .map(|row| {
            let row = *row;
            Box::new(
                IntegerRangeTransitionDistribution::<usize, FiniteDistribution>::new(1, 2, move |_| {
                    FiniteDistribution::from_probabilities(&row).unwrap()
                })
                .unwrap(),
            ) as Box<dyn TransitionDistribution<i64, usize>>
        })
        .collect();
    let b: Vec<Box<dyn TransitionDistribution<i64, usize>>> = (0..2)
        .map(|_| {
            Box::new(
                IntegerRangeTransitionDistribution::<usize, FiniteDistribution>::new(1, 2, |_| {
                    FiniteDistribution::from_probabilities(&[0.0, 1.0]).unwrap()
                })
                .unwrap(),
            ) as Box<dyn TransitionDistribution<i64, usize>>
        })
        .collect();
    MealyIOHMM::new(pi, a, b).unwrap()
}

#[test]
fn train_skips_degenerate_time_step() {
    let _ = env_logger::try_init();
    let mut m = degenerate_model();
    let inputs = [1_i64, 1, 1];
    let outputs = [1_usize, 0, 1]; // the middle step is degenerate under this model
    m.train(&inputs, &outputs, 0.5).unwrap();

    let pi_sum: f64 = m.pi().probabilities().sum();
    close(pi_sum, 1.0, 1e-6);
    for i in 0..m.num_states() {
        let a_sum = m.a(i).unwrap().pdf(&1, &0).unwrap() + m.a(i).unwrap().pdf(&1, &1).unwrap();
        close(a_sum, 1.0, 1e-6);
        let b_sum = m.b(i).unwrap().pdf(&1, &0).unwrap() + m.b(i).unwrap().pdf(&1, &1).unwrap();
        close(b_sum, 1.0, 1e-6);
    }
}
