use std::path::Path;

use log::{info, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::corpus::{read_corpus_file, Sentence};
use super::gradient::{expected_counts_into, observed_counts_into};
use crate::context::{Context, Flag};
use crate::dataset::Instance;
use crate::error::{Error, Result};
use crate::feature::{FeatureSpace, PositionFeatures};
use crate::model::Model;
use crate::tag::Tag;
use crate::vocabulary::Vocabulary;

mod lbfgs;

pub use self::lbfgs::{Lbfgs, LbfgsParams, LineSearchAlgorithm};

/// A differentiable function to minimize
pub trait Objective {
    /// Number of variables
    fn dimension(&self) -> usize;

    /// Function value at `x`
    fn value(&self, x: &[f64]) -> f64;

    /// Gradient at `x`, written into `gx`
    fn gradient(&self, x: &[f64], gx: &mut [f64]);

    /// Function value and gradient at `x` in one pass
    fn evaluate(&self, x: &[f64], gx: &mut [f64]) -> f64 {
        self.gradient(x, gx);
        self.value(x)
    }
}

/// Outcome of a minimization
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Final point
    pub x: Vec<f64>,
    /// Function value at `x`
    pub fx: f64,
    /// Whether a convergence test was met
    pub converged: bool,
}

/// Unconstrained minimizer driving the training.
///
/// Only the [`Objective`] contract is assumed; line search and curvature
/// handling are up to the implementation.
pub trait Optimizer {
    fn minimize(&self, initial: &[f64], objective: &dyn Objective, max_iterations: usize)
        -> Minimum;
}

/// Log-likelihood and expected counts summed over some sequences
struct Partial {
    log_likelihood: f64,
    expected: Vec<f64>,
}

impl Partial {
    fn new(num_features: usize) -> Self {
        Self {
            log_likelihood: 0.0,
            expected: vec![0.0; num_features],
        }
    }

    #[cfg(feature = "parallel")]
    fn merge(mut self, other: Partial) -> Partial {
        self.log_likelihood += other.log_likelihood;
        for (a, b) in self.expected.iter_mut().zip(&other.expected) {
            *a += b;
        }
        self
    }
}

/// Everything needed to evaluate the training objective.
///
/// Built once from the corpus and never mutated while the optimizer runs.
#[derive(Debug, Clone)]
pub struct TrainingState {
    features: FeatureSpace,
    instances: Vec<Instance>,
    /// Resolved feature ids of every instance
    positions: Vec<Vec<PositionFeatures>>,
    /// Empirical feature counts of the gold labels
    prior_counts: Vec<f64>,
    /// L2 regularization coefficient
    theta: f64,
}

impl TrainingState {
    /// Enumerate the features over `num_words` words and count them on the gold labels
    pub fn new(num_words: usize, instances: Vec<Instance>, theta: f64) -> Result<Self> {
        if instances.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let features = FeatureSpace::enumerate(num_words)?;
        let positions: Vec<_> = instances
            .iter()
            .map(|inst| features.observe(&inst.items))
            .collect();
        let mut prior_counts = vec![0.0; features.len()];
        for (inst, pos) in instances.iter().zip(&positions) {
            observed_counts_into(inst, pos, &mut prior_counts);
        }
        Ok(Self {
            features,
            instances,
            positions,
            prior_counts,
            theta,
        })
    }

    pub fn features(&self) -> &FeatureSpace {
        &self.features
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn prior_counts(&self) -> &[f64] {
        &self.prior_counts
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Uniform starting point `1 / num_features`
    pub fn initial_weights(&self) -> Vec<f64> {
        let n = self.num_features();
        vec![1.0 / n as f64; n]
    }

    /// Run forward-backward on one instance and add its contribution into `partial`
    fn accumulate_instance(
        &self,
        ctx: &mut Context,
        weights: &[f64],
        index: usize,
        want_expected: bool,
        partial: &mut Partial,
    ) {
        let inst = &self.instances[index];
        let positions = &self.positions[index];
        ctx.compute_potentials(weights, positions);
        ctx.forward();
        partial.log_likelihood += ctx.log_probability(&inst.labels);
        if want_expected {
            ctx.backward();
            expected_counts_into(ctx, positions, &mut partial.expected);
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn accumulate(&self, weights: &[f64], want_expected: bool) -> Partial {
        let n = if want_expected { self.num_features() } else { 0 };
        let mut ctx = Context::new(Flag::MARGINALS);
        let mut partial = Partial::new(n);
        for index in 0..self.instances.len() {
            self.accumulate_instance(&mut ctx, weights, index, want_expected, &mut partial);
        }
        partial
    }

    /// Each worker owns its lattice and partial sums; they are merged once at the end.
    #[cfg(feature = "parallel")]
    fn accumulate(&self, weights: &[f64], want_expected: bool) -> Partial {
        let n = if want_expected { self.num_features() } else { 0 };
        (0..self.instances.len())
            .into_par_iter()
            .fold(
                || (Context::new(Flag::MARGINALS), Partial::new(n)),
                |(mut ctx, mut partial), index| {
                    self.accumulate_instance(&mut ctx, weights, index, want_expected, &mut partial);
                    (ctx, partial)
                },
            )
            .map(|(_, partial)| partial)
            .reduce(|| Partial::new(n), Partial::merge)
    }

    fn l2_norm_sq(weights: &[f64]) -> f64 {
        weights.iter().map(|w| w * w).sum()
    }

    /// `sum log p(y|x) - theta / 2 * |w|^2`
    pub fn log_likelihood(&self, weights: &[f64]) -> f64 {
        let partial = self.accumulate(weights, false);
        partial.log_likelihood - self.theta / 2.0 * Self::l2_norm_sq(weights)
    }

    /// `prior - theta * w - sum expected`
    pub fn gradient(&self, weights: &[f64]) -> Vec<f64> {
        let mut gx = vec![0.0; self.num_features()];
        self.neg_gradient_into(weights, &mut gx);
        for g in gx.iter_mut() {
            *g = -*g;
        }
        gx
    }

    pub fn neg_log_likelihood(&self, weights: &[f64]) -> f64 {
        -self.log_likelihood(weights)
    }

    pub fn neg_gradient(&self, weights: &[f64]) -> Vec<f64> {
        let mut gx = vec![0.0; self.num_features()];
        self.neg_gradient_into(weights, &mut gx);
        gx
    }

    /// Negative gradient into `gx`; returns the negative log-likelihood of the same pass
    fn neg_gradient_into(&self, weights: &[f64], gx: &mut [f64]) -> f64 {
        debug_assert_eq!(weights.len(), self.num_features());
        let partial = self.accumulate(weights, true);
        for (k, g) in gx.iter_mut().enumerate() {
            *g = partial.expected[k] + self.theta * weights[k] - self.prior_counts[k];
        }
        -(partial.log_likelihood - self.theta / 2.0 * Self::l2_norm_sq(weights))
    }
}

impl Objective for TrainingState {
    fn dimension(&self) -> usize {
        self.num_features()
    }

    fn value(&self, x: &[f64]) -> f64 {
        self.neg_log_likelihood(x)
    }

    fn gradient(&self, x: &[f64], gx: &mut [f64]) {
        self.neg_gradient_into(x, gx);
    }

    fn evaluate(&self, x: &[f64], gx: &mut [f64]) -> f64 {
        self.neg_gradient_into(x, gx)
    }
}

/// CRF Trainer
#[derive(Debug, Clone)]
pub struct Trainer {
    /// Training instances
    instances: Vec<Instance>,
    /// Word dictionary
    words: Vocabulary,
    /// L2 regularization coefficient
    theta: f64,
    /// Iteration cap handed to the optimizer
    max_iterations: usize,
}

impl Trainer {
    /// Create a new trainer
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            words: Vocabulary::new(),
            theta: 1e-4,
            max_iterations: 1000,
        }
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Set the L2 regularization coefficient
    pub fn set_theta(&mut self, theta: f64) -> Result<()> {
        if !(theta >= 0.0) || !theta.is_finite() {
            return Err(Error::InvalidParameter(
                "theta must be non-negative".to_string(),
            ));
        }
        self.theta = theta;
        Ok(())
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<()> {
        if max_iterations < 1 {
            return Err(Error::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    /// Set the L2 regularization coefficient (builder pattern)
    pub fn with_theta(mut self, theta: f64) -> Result<Self> {
        self.set_theta(theta)?;
        Ok(self)
    }

    /// Set maximum iterations (builder pattern)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Result<Self> {
        self.set_max_iterations(max_iterations)?;
        Ok(self)
    }

    /// Number of sentences appended so far
    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn words(&self) -> &Vocabulary {
        &self.words
    }

    /// Append a tagged sentence
    pub fn append<S: AsRef<str>>(&mut self, chars: &[S], tags: &[Tag]) -> Result<()> {
        if chars.len() != tags.len() {
            return Err(Error::InvalidInput(
                "chars and tags must have the same length".to_string(),
            ));
        }
        if chars.is_empty() {
            return Err(Error::InvalidInput(
                "empty sequences are not allowed".to_string(),
            ));
        }
        let items: Vec<u32> = chars
            .iter()
            .map(|c| self.words.get_or_insert(c.as_ref()))
            .collect();
        self.instances.push(Instance::new(&items, tags)?);
        Ok(())
    }

    /// Append every sentence of a corpus
    pub fn append_corpus(&mut self, sentences: &[Sentence]) -> Result<()> {
        for sentence in sentences {
            self.append(&sentence.chars, &sentence.tags)?;
        }
        Ok(())
    }

    /// Clear all training data
    pub fn clear(&mut self) {
        self.instances.clear();
        self.words = Vocabulary::new();
    }

    /// Enumerate the features and count them on the appended sentences
    pub fn prepare(&self) -> Result<TrainingState> {
        let state = TrainingState::new(self.words.len(), self.instances.clone(), self.theta)?;
        info!("Number of sentences: {}", self.instances.len());
        info!("Number of words: {}", self.words.len());
        info!("Number of features: {}", state.num_features());
        Ok(state)
    }

    /// Fit the weights with `optimizer` and return the trained model.
    ///
    /// Nothing is returned when the optimizer does not converge or hands
    /// back a non-finite weight.
    pub fn train<O: Optimizer + ?Sized>(&self, optimizer: &O) -> Result<Model> {
        let state = self.prepare()?;
        let initial = state.initial_weights();

        info!("Start training");
        let minimum = optimizer.minimize(&initial, &state, self.max_iterations);
        if !minimum.converged {
            warn!("Fail to optimize CRF, keeping the initial weights");
            return Err(Error::NotConverged(format!(
                "no convergence within {} iterations",
                self.max_iterations
            )));
        }
        if let Some(index) = minimum.x.iter().position(|w| !w.is_finite()) {
            return Err(Error::NonFiniteWeight { index });
        }
        info!("Final loss: {:.6}", minimum.fx);

        let TrainingState {
            features,
            prior_counts,
            ..
        } = state;
        Model::new(self.words.clone(), features, minimum.x, prior_counts)
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new()
    }
}

/// Train on a corpus file with L-BFGS and save the model to `model_path`.
///
/// The model file is only written when training succeeds.
pub fn train_file<P, Q>(corpus: P, model_path: Q, mut trainer: Trainer) -> Result<Model>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let sentences = read_corpus_file(corpus.as_ref())?;
    info!(
        "Read {} sentences from {}",
        sentences.len(),
        corpus.as_ref().display()
    );
    trainer.append_corpus(&sentences)?;
    let model = trainer.train(&Lbfgs::default())?;
    model.save(model_path)?;
    Ok(model)
}
