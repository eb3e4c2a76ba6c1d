//! The Update Coordinator: owns the tree, alignment, model, and Parameter
//! Projector, and is the single path through which a new parameter vector
//! reaches the Likelihood Kernel. Keeps `loglik`/gradient caches consistent
//! with the model's current parameters, and poisons itself on any fatal
//! arithmetic error so a caller can never read a stale or half-updated
//! cache.

use tracing::{debug, instrument, warn};

use codon_error::{EngineResult, engine_err};

use crate::alignment::Alignment;
use crate::kernel::{self, KernelOutput};
use crate::model::SubstitutionModel;
use crate::params::{ParamProjector, ParamSlot, ParamValue};
use crate::tree::IndexedTree;

/// Coordinates a [`crate::model::SubstitutionModel`] against a fixed tree
/// and alignment, keeping the kernel's `L`/`dL`/log-likelihood/gradient
/// caches in lockstep with `updateParams`/`paramsarray`-style mutation.
pub struct TreeLikelihood {
    tree: IndexedTree,
    alignment: Alignment,
    model: Box<dyn SubstitutionModel>,
    projector: ParamProjector,
    slots: Vec<ParamSlot>,
    cache: Option<KernelOutput>,
    poisoned: bool,
}

impl TreeLikelihood {
    /// Builds the coordinator and evaluates the kernel once against the
    /// model's current parameters.
    pub fn new(
        tree: IndexedTree,
        alignment: Alignment,
        model: Box<dyn SubstitutionModel>,
    ) -> EngineResult<Self> {
        if alignment.ntips() != tree.ntips() {
            return Err(engine_err!(
                Structural: "alignment has {} tips, tree has {}",
                alignment.ntips(),
                tree.ntips()
            ));
        }
        if alignment.nsites() != model.nsites() {
            return Err(engine_err!(
                Structural: "alignment has {} sites, model was built for {}",
                alignment.nsites(),
                model.nsites()
            ));
        }

        let freeparams = model.freeparams();
        let limits = model.param_limits();
        let mut projector = ParamProjector::new(&freeparams, &limits)?;
        let slots = projector.slots().to_vec();

        let mut engine = Self {
            tree,
            alignment,
            model,
            projector,
            slots,
            cache: None,
            poisoned: false,
        };
        let flat = engine.projector.extract(&engine.model.freeparams())?;
        engine.projector.snapshot_changed(&flat);
        engine.recompute()?;
        Ok(engine)
    }

    fn check_poisoned(&self) -> EngineResult<()> {
        if self.poisoned {
            return Err(engine_err!(
                Numerical: "engine is poisoned by a prior fatal arithmetic error"
            ));
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn recompute(&mut self) -> EngineResult<()> {
        match kernel::evaluate(
            &self.tree,
            &self.alignment,
            self.model.as_ref(),
            &self.slots,
        ) {
            Ok(output) => {
                debug!(loglik = output.loglik, "recomputed likelihood kernel");
                self.cache = Some(output);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "kernel recomputation failed, poisoning engine");
                self.poisoned = true;
                Err(err)
            }
        }
    }

    /// Applies a new named parameter set (as the model's `updateParams`
    /// would), recomputing the kernel only if the resulting flat vector
    /// actually differs from the last one evaluated.
    ///
    /// Every key in `freeparams` must already be one of the model's declared
    /// free parameters (`model.freeparams()`); anything else is a fatal
    /// `InvalidParameter` error, not silently forwarded to the model.
    pub fn update_params(&mut self, freeparams: Vec<(String, ParamValue)>) -> EngineResult<()> {
        self.check_poisoned()?;
        let declared = self.model.freeparams();
        for (name, _) in &freeparams {
            if !declared.iter().any(|(n, _)| n == name) {
                return Err(engine_err!(
                    InvalidParameter: "'{}' is not a declared free parameter of this model",
                    name
                ));
            }
        }
        self.model.update_params(freeparams)?;
        let flat = self.projector.extract(&self.model.freeparams())?;
        if self.projector.snapshot_changed(&flat) {
            self.recompute()?;
        }
        Ok(())
    }

    /// Applies a new flat parameter vector (the optimizer's `paramsarray`),
    /// inverting it back to named parameters before handing it to the model.
    pub fn set_flat_params(&mut self, flat: &[f64]) -> EngineResult<()> {
        self.check_poisoned()?;
        if flat.len() != self.projector.len() {
            return Err(engine_err!(
                InvalidParameter: "flat parameter vector has {} elements, expected {}",
                flat.len(),
                self.projector.len()
            ));
        }
        let freeparams = self.projector.inject(flat)?;
        self.model.update_params(freeparams)?;
        if self.projector.snapshot_changed(flat) {
            self.recompute()?;
        }
        Ok(())
    }

    pub fn flat_params(&self) -> Vec<f64> {
        self.projector
            .cached()
            .map(|c| c.to_vec())
            .unwrap_or_default()
    }

    pub fn bounds(&self) -> &[(f64, f64)] {
        self.projector.bounds()
    }

    pub fn nparams(&self) -> usize {
        self.projector.len()
    }

    pub fn loglik(&self) -> EngineResult<f64> {
        self.check_poisoned()?;
        self.cache
            .as_ref()
            .map(|c| c.loglik)
            .ok_or_else(|| engine_err!(Numerical: "likelihood not yet computed"))
    }

    pub fn siteloglik(&self) -> EngineResult<&[f64]> {
        self.check_poisoned()?;
        self.cache
            .as_ref()
            .map(|c| c.siteloglik.as_slice())
            .ok_or_else(|| engine_err!(Numerical: "likelihood not yet computed"))
    }

    pub fn gradient(&self) -> EngineResult<&[f64]> {
        self.check_poisoned()?;
        self.cache
            .as_ref()
            .map(|c| c.dloglik.as_slice())
            .ok_or_else(|| engine_err!(Numerical: "likelihood not yet computed"))
    }

    pub fn tree(&self) -> &IndexedTree {
        &self.tree
    }

    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::UniformRateModel;
    use crate::tree::{index_tree, parse_newick};
    use std::collections::HashMap;

    fn build() -> TreeLikelihood {
        let tree = index_tree(&parse_newick("(A:0.2,B:0.3);").unwrap()).unwrap();
        let mut seqs = HashMap::new();
        seqs.insert("A".to_string(), b"ATGATG".to_vec());
        seqs.insert("B".to_string(), b"ATGCTG".to_vec());
        let alignment = crate::alignment::build_alignment(&tree, &seqs).unwrap();
        TreeLikelihood::new(tree, alignment, Box::new(UniformRateModel::new(2, 0.4))).unwrap()
    }

    #[test]
    fn constructs_and_evaluates() {
        let engine = build();
        assert!(engine.loglik().unwrap().is_finite());
        assert_eq!(engine.gradient().unwrap().len(), 1);
    }

    #[test]
    fn idempotent_update_skips_recompute() {
        let mut engine = build();
        let flat = engine.flat_params();
        let before = engine.loglik().unwrap();
        engine.set_flat_params(&flat).unwrap();
        assert_eq!(engine.loglik().unwrap(), before);
    }

    #[test]
    fn rejects_wrong_length_flat_update() {
        let mut engine = build();
        assert!(engine.set_flat_params(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn update_changes_loglik() {
        let mut engine = build();
        let before = engine.loglik().unwrap();
        engine.set_flat_params(&[2.0]).unwrap();
        let after = engine.loglik().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn rejects_undeclared_parameter_name() {
        let mut engine = build();
        let err = engine.update_params(vec![("not_a_param".to_string(), ParamValue::Scalar(1.0))]);
        assert!(err.is_err());
    }
}
