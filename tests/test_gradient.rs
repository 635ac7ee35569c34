use crfseg::train::{read_corpus, Objective, Trainer, TrainingState};
use rand::prelude::*;
use rand::rngs::StdRng;

const CORPUS: &str = "今 B\n晚 E\n月 S\n\n色 B\n真 I\n美 E\n\n今 S\n美 S\n";

fn state(theta: f64) -> TrainingState {
    let mut trainer = Trainer::new().with_theta(theta).unwrap();
    let sentences = read_corpus(CORPUS.as_bytes()).unwrap();
    trainer.append_corpus(&sentences).unwrap();
    trainer.prepare().unwrap()
}

#[test]
fn test_gradient_matches_finite_differences() {
    let state = state(1e-2);
    let mut rng = StdRng::seed_from_u64(2024);
    let w: Vec<f64> = (0..state.num_features())
        .map(|_| rng.gen_range(-0.5..0.5))
        .collect();
    let g = state.gradient(&w);
    let h = 1e-5;

    for k in (0..state.num_features()).step_by(7) {
        let mut plus = w.clone();
        let mut minus = w.clone();
        plus[k] += h;
        minus[k] -= h;
        let numeric = (state.log_likelihood(&plus) - state.log_likelihood(&minus)) / (2.0 * h);
        let tolerance = 1e-4 * g[k].abs().max(1.0);
        assert!(
            (numeric - g[k]).abs() < tolerance,
            "feature {}: analytic {} numeric {}",
            k,
            g[k],
            numeric
        );
    }
}

#[test]
fn test_negated_objective() {
    let state = state(1e-4);
    let w = state.initial_weights();
    assert!((state.value(&w) + state.log_likelihood(&w)).abs() < 1e-9);

    let mut gx = vec![0.0; state.dimension()];
    let fx = state.evaluate(&w, &mut gx);
    assert!((fx + state.log_likelihood(&w)).abs() < 1e-9);
    for (a, b) in gx.iter().zip(state.gradient(&w)) {
        assert!((a + b).abs() < 1e-12);
    }
}

#[test]
fn test_log_likelihood_is_bounded_by_regularizer() {
    let state = state(0.5);
    let w = vec![0.3; state.num_features()];
    let penalty = 0.5 / 2.0 * w.iter().map(|x| x * x).sum::<f64>();
    assert!(state.log_likelihood(&w) < -penalty);
}

#[test]
fn test_zero_theta_gradient_is_prior_minus_expected() {
    let state = state(0.0);
    let w = vec![0.0; state.num_features()];
    let g = state.gradient(&w);
    // Under zero weights every tag is equally likely, so no feature the gold
    // labels use is expected more often than it was observed.
    for (k, &prior) in state.prior_counts().iter().enumerate() {
        if prior > 0.0 {
            assert!(g[k] > -1e-9, "feature {}", k);
        }
    }
}
