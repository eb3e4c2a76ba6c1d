//! The substitution-model contract the kernel drives: stationary state,
//! transition probabilities and their parameter derivatives, and the
//! `updateParams` mutation hook.

use codon_utils::Tensor;

use codon_error::EngineResult;

use crate::codon::N_CODONS;
use crate::params::{ParamSlot, ParamValue};

/// A codon-substitution process the likelihood kernel can evaluate along any
/// branch length, at any site, and differentiate with respect to any of its
/// own free parameters.
///
/// Implementors own their parameter state; [`SubstitutionModel::update_params`]
/// is the single mutation path, called by the Update Coordinator whenever the
/// optimizer proposes a new flat parameter vector.
pub trait SubstitutionModel {
    /// Number of alignment columns (codon sites) this model was built for.
    fn nsites(&self) -> usize;

    /// A branch-length scaling divisor for callers to apply when they build
    /// the tree's branch lengths from some other unit (e.g. substitutions
    /// per site). The engine itself never reads this: `tree.branch_length`
    /// reaches `m`/`dm`/`m_tip`/`dm_tip` verbatim, already in the model's
    /// own time unit.
    fn branch_scale(&self) -> f64;

    /// The model's free parameters, scalar or vector, in a stable order.
    fn freeparams(&self) -> Vec<(String, ParamValue)>;

    /// `(lower, upper)` bound for every named free parameter.
    fn param_limits(&self) -> std::collections::HashMap<String, (f64, f64)>;

    /// Stationary codon distribution at `site`, length [`N_CODONS`].
    fn stationary_state(&self, site: usize) -> Vec<f64>;

    /// Derivative of the stationary distribution at `site` with respect to
    /// `slot`. `None` if `slot` does not affect the stationary state.
    fn dstationary_state(&self, slot: &ParamSlot, site: usize) -> Option<Vec<f64>>;

    /// Transition probability matrix `M(t)` for `site`, shape
    /// `[N_CODONS, N_CODONS]`, `M[x][y] = P(y | x, t)`.
    fn m(&self, t: f64, site: usize) -> Tensor<f64>;

    /// The column of `M(t)` matching a tip's observed codon: `Mc[x] = M[x][tipcodon]`.
    /// A gap (`tipcodon = None`) is fully ambiguous, so every entry is `1.0`
    /// (the tip-column trick: a column of ones leaves the parent's sum over
    /// that child unconstrained).
    fn m_tip(&self, t: f64, site: usize, tipcodon: Option<usize>) -> Vec<f64> {
        match tipcodon {
            None => vec![1.0; N_CODONS],
            Some(y) => {
                let m = self.m(t, site);
                (0..N_CODONS).map(|x| m[[x, y]]).collect()
            }
        }
    }

    /// `d M(t) / d slot`, same shape as [`SubstitutionModel::m`].
    fn dm(&self, slot: &ParamSlot, t: f64, site: usize) -> Tensor<f64>;

    /// The tip-column derivative counterpart of [`SubstitutionModel::m_tip`].
    /// A gap's derivative is all zeros: an unconstrained column has no
    /// sensitivity to any parameter.
    fn dm_tip(&self, slot: &ParamSlot, t: f64, site: usize, tipcodon: Option<usize>) -> Vec<f64> {
        match tipcodon {
            None => vec![0.0; N_CODONS],
            Some(y) => {
                let dm = self.dm(slot, t, site);
                (0..N_CODONS).map(|x| dm[[x, y]]).collect()
            }
        }
    }

    /// Applies a new flat parameter vector (already inverted back into named
    /// values by the Parameter Projector) to the model's internal state.
    fn update_params(&mut self, freeparams: Vec<(String, ParamValue)>) -> EngineResult<()>;
}
