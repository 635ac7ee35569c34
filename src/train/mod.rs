//! Training of segmentation models
//!
//! A corpus of `<character> <tag>` lines is turned into bracketed
//! instances, the feature space is enumerated over the vocabulary, and the
//! weights are fitted by minimizing the L2-regularized negative
//! log-likelihood.

mod corpus;
mod gradient;
mod trainer;

pub use self::corpus::{read_corpus, read_corpus_file, Sentence};
pub use self::gradient::{expected_counts_into, observed_counts_into};
pub use self::trainer::{
    train_file, Lbfgs, LbfgsParams, LineSearchAlgorithm, Minimum, Objective, Optimizer, Trainer,
    TrainingState,
};
