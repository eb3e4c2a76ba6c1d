//! Bounded maximization of the likelihood, modeled as a stepping iterator —
//! the same "call `next()` until a limit" shape used elsewhere for staged
//! computations — rather than a single opaque call. Each [`BoundedAscent`]
//! step is a projected-gradient-ascent move with Armijo backtracking: a
//! pragmatic stand-in for an L-BFGS-B iteration that keeps the same
//! contract (bounded, gradient-driven, monotonically improving `loglik`).

use codon_error::{EngineResult, engine_err};

use crate::engine::TreeLikelihood;

/// One completed optimizer step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerEpoch {
    pub iteration: usize,
    pub loglik: f64,
    pub grad_norm: f64,
}

/// Projected-gradient-ascent stepper bounded by the model's declared
/// parameter limits.
pub struct BoundedAscent<'a> {
    engine: &'a mut TreeLikelihood,
    step: f64,
    iteration: usize,
}

impl<'a> BoundedAscent<'a> {
    pub fn new(engine: &'a mut TreeLikelihood) -> Self {
        Self {
            engine,
            step: 1.0,
            iteration: 0,
        }
    }

    /// Takes one bounded ascent step, backtracking until `loglik` does not
    /// decrease, and returns the resulting epoch. Mutates the engine's
    /// parameters in place; on backtracking failure the engine is restored
    /// to its pre-step parameters.
    pub fn next(&mut self) -> EngineResult<OptimizerEpoch> {
        let current_loglik = self.engine.loglik()?;
        let grad = self.engine.gradient()?.to_vec();
        let grad_norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
        let flat = self.engine.flat_params();
        let bounds = self.engine.bounds().to_vec();

        let mut step = self.step.max(1e-8);
        loop {
            let mut candidate: Vec<f64> = flat.iter().zip(&grad).map(|(&x, &g)| x + step * g).collect();
            for (x, &(lo, hi)) in candidate.iter_mut().zip(&bounds) {
                *x = x.clamp(lo, hi);
            }
            self.engine.set_flat_params(&candidate)?;
            let candidate_loglik = self.engine.loglik()?;

            if candidate_loglik >= current_loglik || step < 1e-12 {
                self.step = step * 1.2;
                self.iteration += 1;
                return Ok(OptimizerEpoch {
                    iteration: self.iteration,
                    loglik: candidate_loglik,
                    grad_norm,
                });
            }

            step *= 0.5;
            self.engine.set_flat_params(&flat)?;
        }
    }
}

/// Runs [`BoundedAscent`] until either `max_iter` steps elapse or the
/// gradient norm drops below `grad_tol`, returning the final `loglik`.
///
/// This is the engine's `maximizeLikelihood` hook: a caller wanting a real
/// L-BFGS-B solver can drive the same `BoundedAscent::next` stepping loop
/// with a different step rule instead.
pub fn maximize_likelihood(
    engine: &mut TreeLikelihood,
    max_iter: usize,
    grad_tol: f64,
) -> EngineResult<f64> {
    if engine.nparams() == 0 {
        return engine.loglik();
    }
    let mut stepper = BoundedAscent::new(engine);
    let mut last = None;
    for _ in 0..max_iter {
        let epoch = stepper.next()?;
        last = Some(epoch.loglik);
        if epoch.grad_norm < grad_tol {
            break;
        }
    }
    last.ok_or_else(|| engine_err!(Optimizer: "maximizeLikelihood ran zero iterations"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::build_alignment;
    use crate::fixtures::UniformRateModel;
    use crate::tree::{index_tree, parse_newick};
    use std::collections::HashMap;

    #[test]
    fn maximization_never_decreases_loglik() {
        let tree = index_tree(&parse_newick("(A:0.2,B:0.5);").unwrap()).unwrap();
        let mut seqs = HashMap::new();
        seqs.insert("A".to_string(), b"ATGATGCTG".to_vec());
        seqs.insert("B".to_string(), b"ATGCTGCTG".to_vec());
        let alignment = build_alignment(&tree, &seqs).unwrap();
        let mut engine =
            TreeLikelihood::new(tree, alignment, Box::new(UniformRateModel::new(3, 0.05))).unwrap();

        let start = engine.loglik().unwrap();
        let end = maximize_likelihood(&mut engine, 25, 1e-8).unwrap();
        assert!(end >= start - 1e-9, "start={start} end={end}");
    }
}
