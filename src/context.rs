use bitflags::bitflags;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

use crate::feature::PositionFeatures;
use crate::tag::{Tag, NUM_TAGS};

bitflags! {
    /// Functionality flags for contexts
    pub struct Flag: u32 {
        /// Keep backward edges for Viterbi decoding
        const VITERBI = 0x01;
        /// Keep backward scores for marginals
        const MARGINALS = 0x02;
    }
}

/// Log-sum-exp trick for numerical stability.
///
/// Computes `log(sum(exp(values)))` without overflowing for large inputs.
/// Returns `NEG_INFINITY` for empty arrays or arrays where all values are `NEG_INFINITY`.
pub fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    let sum: f64 = values.iter().map(|&v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Context maintains the lattice of one sequence.
///
/// For a sequence of `n` tokens between the sentinels, positions run from
/// `0` (start sentinel) to `n + 1` (end sentinel). All scores are kept in
/// log space.
#[derive(Debug, Clone)]
pub struct Context {
    /// Flag specifying the functionality
    flag: Flag,
    /// The number of tokens between the sentinels
    num_items: usize,
    /// Log potentials
    ///
    /// This is a `[n+2][L][L]` tensor whose element `[i][p][c]` is the total
    /// weight of the features firing for the transition `p -> c` into
    /// position `i`. `[0]` is unused.
    potential: Array3<f64>,
    /// Forward scores
    ///
    /// This is a `[n+2][L]` matrix whose element `[i][l]` is the log of the
    /// total potential of all paths starting at the start sentinel and
    /// arriving at (i, l). Viterbi decoding reuses it for the max-sum scores.
    alpha: Array2<f64>,
    /// Backward scores
    ///
    /// This is a `[n+2][L]` matrix whose element `[i][l]` is the log of the
    /// total potential of all paths leaving (i, l) and reaching the end
    /// sentinel. Only available with [`Flag::MARGINALS`].
    beta: Array2<f64>,
    /// Logarithm of the normalization factor for the sequence
    log_norm: f64,
    /// Backward edges
    ///
    /// This is a `[n+2][L]` matrix whose element `[i][c]` is the label at
    /// `i - 1` on the best path arriving at (i, c). Only available with
    /// [`Flag::VITERBI`].
    backward_edge: Array2<usize>,
}

impl Context {
    pub fn new(flag: Flag) -> Self {
        Self {
            flag,
            num_items: 0,
            potential: Array3::zeros((0, NUM_TAGS, NUM_TAGS)),
            alpha: Array2::zeros((0, NUM_TAGS)),
            beta: Array2::zeros((0, NUM_TAGS)),
            log_norm: 0.0,
            backward_edge: Array2::zeros((0, NUM_TAGS)),
        }
    }

    /// Size the lattice for `n` tokens between the sentinels
    pub fn set_num_items(&mut self, n: usize) {
        self.num_items = n;
        let t = n + 2;
        if self.potential.dim().0 != t {
            self.potential = Array3::zeros((t, NUM_TAGS, NUM_TAGS));
            self.alpha = Array2::zeros((t, NUM_TAGS));
            if self.flag.contains(Flag::MARGINALS) {
                self.beta = Array2::zeros((t, NUM_TAGS));
            }
            if self.flag.contains(Flag::VITERBI) {
                self.backward_edge = Array2::zeros((t, NUM_TAGS));
            }
        }
        self.log_norm = 0.0;
    }

    /// The number of tokens between the sentinels
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Fill the potential tensor from per-position features and a weight vector.
    ///
    /// `positions` holds one entry per token of the bracketed sequence, as
    /// returned by [`FeatureSpace::observe`](crate::feature::FeatureSpace::observe).
    /// A slice without both sentinels leaves an empty lattice with zero potentials.
    pub fn compute_potentials(&mut self, weights: &[f64], positions: &[PositionFeatures]) {
        if positions.len() < 2 {
            self.set_num_items(0);
            self.potential.fill(0.0);
            return;
        }
        self.set_num_items(positions.len() - 2);
        for i in 1..positions.len() {
            for &prev in &Tag::ALL {
                for &cur in &Tag::ALL {
                    self.potential[[i, prev.index(), cur.index()]] =
                        positions[i].score(weights, prev, cur);
                }
            }
        }
    }

    /// Log potential of the transition `prev -> cur` into position `i`
    #[inline]
    pub fn potential(&self, i: usize, prev: Tag, cur: Tag) -> f64 {
        self.potential[[i, prev.index(), cur.index()]]
    }

    /// The full `[n+2][L][L]` potential tensor
    pub fn potentials(&self) -> ArrayView3<'_, f64> {
        self.potential.view()
    }

    /// Forward algorithm in log space.
    ///
    /// Returns the log partition function.
    pub fn forward(&mut self) -> f64 {
        let t = self.num_items + 2;
        let start = Tag::START.index();
        let end = Tag::END.index();
        let mut row = [0.0; NUM_TAGS];

        self.alpha.fill(f64::NEG_INFINITY);
        self.alpha[[0, start]] = 0.0;

        for i in 1..t {
            for cur in 0..NUM_TAGS {
                // The end sentinel only carries the end tag
                if i == t - 1 && cur != end {
                    continue;
                }
                for (prev, value) in row.iter_mut().enumerate() {
                    *value = self.alpha[[i - 1, prev]] + self.potential[[i, prev, cur]];
                }
                self.alpha[[i, cur]] = logsumexp(&row);
            }
        }

        self.log_norm = self.alpha[[t - 1, end]];
        self.log_norm
    }

    /// Backward algorithm in log space
    pub fn backward(&mut self) {
        debug_assert!(self.flag.contains(Flag::MARGINALS));
        let t = self.num_items + 2;
        let mut row = [0.0; NUM_TAGS];

        self.beta.fill(f64::NEG_INFINITY);
        self.beta[[t - 1, Tag::END.index()]] = 0.0;

        for i in (0..t - 1).rev() {
            for prev in 0..NUM_TAGS {
                for (cur, value) in row.iter_mut().enumerate() {
                    *value = self.beta[[i + 1, cur]] + self.potential[[i + 1, prev, cur]];
                }
                self.beta[[i, prev]] = logsumexp(&row);
            }
        }
    }

    /// Log partition function computed by the last [`forward`](Self::forward)
    pub fn log_norm(&self) -> f64 {
        self.log_norm
    }

    pub fn alpha(&self) -> ArrayView2<'_, f64> {
        self.alpha.view()
    }

    pub fn beta(&self) -> ArrayView2<'_, f64> {
        self.beta.view()
    }

    /// Marginal probability of the transition `prev -> cur` into position `i`.
    ///
    /// Requires [`forward`](Self::forward) and [`backward`](Self::backward).
    #[inline]
    pub fn marginal(&self, i: usize, prev: Tag, cur: Tag) -> f64 {
        let (p, c) = (prev.index(), cur.index());
        (self.alpha[[i - 1, p]] + self.potential[[i, p, c]] + self.beta[[i, c]] - self.log_norm)
            .exp()
    }

    /// Unnormalized log score of a bracketed label sequence
    pub fn path_score(&self, labels: &[Tag]) -> f64 {
        debug_assert_eq!(labels.len(), self.num_items + 2);
        labels
            .windows(2)
            .enumerate()
            .map(|(i, pair)| self.potential(i + 1, pair[0], pair[1]))
            .sum()
    }

    /// `log p(labels | x)`; requires [`forward`](Self::forward)
    pub fn log_probability(&self, labels: &[Tag]) -> f64 {
        self.path_score(labels) - self.log_norm
    }

    /// Find the label sequence with the highest score.
    ///
    /// Returns the labels of the tokens between the sentinels and the
    /// unnormalized score of the whole path. Ties go to the lowest tag id.
    /// Overwrites the forward scores.
    pub fn viterbi(&mut self) -> (Vec<Tag>, f64) {
        debug_assert!(self.flag.contains(Flag::VITERBI));
        let n = self.num_items;
        let start = Tag::START.index();
        let end = Tag::END.index();

        if n == 0 {
            return (Vec::new(), self.potential[[1, start, end]]);
        }

        // Compute the scores at (1, *)
        for j in 0..NUM_TAGS {
            self.alpha[[1, j]] = self.potential[[1, start, j]];
        }

        // Compute the scores at (t, *)
        for t in 2..=n {
            for j in 0..NUM_TAGS {
                let mut max_score = f64::NEG_INFINITY;
                let mut argmax_score = 0;

                for i in 0..NUM_TAGS {
                    // Transit from (t-1, i) to (t, j)
                    let score = self.alpha[[t - 1, i]] + self.potential[[t, i, j]];
                    if max_score < score {
                        max_score = score;
                        argmax_score = i;
                    }
                }

                // Backward link (#t, #j) -> (#t-1, #i)
                self.backward_edge[[t, j]] = argmax_score;
                self.alpha[[t, j]] = max_score;
            }
        }

        // Find the node (#n, i) that reaches the end sentinel with the maximum score
        let mut max_score = f64::NEG_INFINITY;
        let mut best = 0;
        for i in 0..NUM_TAGS {
            let score = self.alpha[[n, i]] + self.potential[[n + 1, i, end]];
            if max_score < score {
                max_score = score;
                best = i;
            }
        }

        // Tag labels by tracing the backward links
        let mut labels = vec![0usize; n];
        labels[n - 1] = best;
        for t in (1..n).rev() {
            labels[t - 1] = self.backward_edge[[t + 1, labels[t]]];
        }

        let labels = labels.into_iter().map(|l| Tag::ALL[l]).collect();
        (labels, max_score)
    }
}
