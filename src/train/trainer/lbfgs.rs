use log::{debug, warn};

use super::{Minimum, Objective, Optimizer};
use crate::error::{Error, Result};

/// Line search algorithm for L-BFGS optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineSearchAlgorithm {
    /// More-Thuente line search
    #[default]
    MoreThuente,
    /// Backtracking with Armijo condition
    BacktrackingArmijo,
    /// Backtracking with Wolfe condition
    BacktrackingWolfe,
    /// Backtracking with strong Wolfe condition
    BacktrackingStrongWolfe,
}

impl LineSearchAlgorithm {
    fn to_liblbfgs_str(self) -> &'static str {
        match self {
            Self::MoreThuente => "MoreThuente",
            Self::BacktrackingArmijo => "BacktrackingArmijo",
            Self::BacktrackingWolfe => "BacktrackingWolfe",
            Self::BacktrackingStrongWolfe => "BacktrackingStrongWolfe",
        }
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidParameter(message.to_string())
}

/// L-BFGS stopping and line search parameters.
///
/// The iteration cap is not part of these; it comes from the caller of
/// [`Optimizer::minimize`].
#[derive(Debug, Clone)]
pub struct LbfgsParams {
    epsilon: f64,
    period: usize,
    delta: f64,
    linesearch: LineSearchAlgorithm,
    max_linesearch: usize,
}

impl Default for LbfgsParams {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            period: 10,
            delta: 1e-5,
            linesearch: LineSearchAlgorithm::default(),
            max_linesearch: 20,
        }
    }
}

impl LbfgsParams {
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        if !(epsilon >= 0.0) {
            return Err(invalid("epsilon must be non-negative"));
        }
        self.epsilon = epsilon;
        Ok(())
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Set the period handed to `liblbfgs` along with [`delta`](Self::delta).
    ///
    /// The library accepts both but only stops on the gradient test, so
    /// neither decides convergence here.
    pub fn set_period(&mut self, period: usize) {
        self.period = period;
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn set_delta(&mut self, delta: f64) -> Result<()> {
        if !(delta >= 0.0) {
            return Err(invalid("delta must be non-negative"));
        }
        self.delta = delta;
        Ok(())
    }

    pub fn linesearch(&self) -> LineSearchAlgorithm {
        self.linesearch
    }

    pub fn set_linesearch(&mut self, linesearch: LineSearchAlgorithm) {
        self.linesearch = linesearch;
    }

    pub fn max_linesearch(&self) -> usize {
        self.max_linesearch
    }

    pub fn set_max_linesearch(&mut self, max_linesearch: usize) -> Result<()> {
        if max_linesearch == 0 {
            return Err(invalid("max_linesearch must be positive"));
        }
        self.max_linesearch = max_linesearch;
        Ok(())
    }
}

/// Limited-memory BFGS backed by `liblbfgs`
#[derive(Debug, Clone, Default)]
pub struct Lbfgs {
    params: LbfgsParams,
}

impl Lbfgs {
    pub fn new(params: LbfgsParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LbfgsParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut LbfgsParams {
        &mut self.params
    }
}

impl Optimizer for Lbfgs {
    fn minimize(
        &self,
        initial: &[f64],
        objective: &dyn Objective,
        max_iterations: usize,
    ) -> Minimum {
        let mut x = initial.to_vec();
        let epsilon = self.params.epsilon;

        let evaluate = |x: &[f64], gx: &mut [f64]| -> anyhow::Result<f64> {
            let fx = objective.evaluate(x, gx);
            if !fx.is_finite() {
                anyhow::bail!("objective is not finite: {}", fx);
            }
            Ok(fx)
        };

        let progress = |prgr: &liblbfgs::Progress| -> bool {
            debug!(
                "Iteration {}: loss = {:.6}, ||x|| = {:.6}, ||g|| = {:.6}",
                prgr.niter, prgr.fx, prgr.xnorm, prgr.gnorm
            );
            false
        };

        let result = liblbfgs::lbfgs()
            .with_max_iterations(max_iterations)
            .with_epsilon(epsilon)
            .with_fx_delta(self.params.delta, self.params.period)
            .with_max_linesearch(self.params.max_linesearch)
            .with_linesearch_algorithm(self.params.linesearch.to_liblbfgs_str())
            .minimize(&mut x, evaluate, progress);

        match result {
            // The run also ends without error at the iteration cap, so the
            // gradient test is repeated on the final point.
            Ok(report) => {
                let converged = report.gnorm / report.xnorm.max(1.0) <= epsilon;
                if !converged {
                    warn!(
                        "L-BFGS stopped within {} iterations with ||g|| = {:.6}",
                        max_iterations, report.gnorm
                    );
                }
                Minimum {
                    fx: report.fx,
                    converged,
                    x,
                }
            }
            Err(e) => {
                warn!("L-BFGS error: {}", e);
                let fx = objective.value(&x);
                Minimum {
                    x,
                    fx,
                    converged: false,
                }
            }
        }
    }
}
