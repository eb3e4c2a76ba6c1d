//! The Likelihood Kernel: the post-order Felsenstein partial-likelihood
//! recursion and its analytic derivative, evaluated once per
//! [`crate::engine::TreeLikelihood::update_params`] call and cached until
//! the next one.

use codon_utils::Tensor;

use codon_error::EngineResult;

use crate::alignment::Alignment;
use crate::codon::N_CODONS;
use crate::fptrap::{check, checked_div, checked_ln};
use crate::model::SubstitutionModel;
use crate::params::ParamSlot;
use crate::tree::IndexedTree;

/// The filled `L`/`dL` tables plus the reduced per-site and total
/// log-likelihoods, for one parameter vector.
pub struct KernelOutput {
    /// `l[[i, site, x]]`, `i = node - ntips`, partial likelihood of the
    /// subtree rooted at internal node `i + ntips`, conditional on state `x`.
    pub l: Tensor<f64>,
    /// `dl[[slot, i, site, x]]`, derivative of `l` with respect to free
    /// parameter slot `slot`.
    pub dl: Tensor<f64>,
    pub siteloglik: Vec<f64>,
    pub loglik: f64,
    /// `dloglik[slot]`, the gradient of `loglik` with respect to every slot.
    pub dloglik: Vec<f64>,
}

/// Runs the full post-order recursion, derivative recursion, and root
/// reduction for the given tree/alignment/model/parameter-slot set.
pub fn evaluate(
    tree: &IndexedTree,
    alignment: &Alignment,
    model: &dyn SubstitutionModel,
    slots: &[ParamSlot],
) -> EngineResult<KernelOutput> {
    let ntips = tree.ntips();
    let n_internal = tree.nnodes() - ntips;
    let nsites = alignment.nsites();
    let nparams = slots.len();

    let mut l = Tensor::from_shape_fn((n_internal, nsites, N_CODONS), |_| 0.0);
    let mut dl = Tensor::from_shape_fn((nparams.max(1), n_internal, nsites, N_CODONS), |_| 0.0);

    for m in tree.internal_nodes() {
        let i = m - ntips;
        let (left, right) = tree.children(m);

        for site in 0..nsites {
            let (ml_left, dml_left) = child_message(tree, alignment, model, slots, left, site, &l, &dl)?;
            let (ml_right, dml_right) =
                child_message(tree, alignment, model, slots, right, site, &l, &dl)?;

            for x in 0..N_CODONS {
                let value = check(ml_left[x] * ml_right[x], "L[m][r][x]")?;
                l[[i, site, x]] = value;
                for p in 0..nparams {
                    dl[[p, i, site, x]] =
                        dml_left[p][x] * ml_right[x] + ml_left[x] * dml_right[p][x];
                }
            }
        }
    }

    let root = tree.root();
    let root_i = root - ntips;
    let mut siteloglik = Vec::with_capacity(nsites);
    let mut dloglik = vec![0.0; nparams];

    for site in 0..nsites {
        let pi = model.stationary_state(site);
        let mut sitelik = 0.0;
        for x in 0..N_CODONS {
            sitelik += l[[root_i, site, x]] * pi[x];
        }
        let sitelik = check(sitelik, "sitelik")?;
        siteloglik.push(checked_ln(sitelik)?);

        for (p, slot) in slots.iter().enumerate() {
            let dpi = model.dstationary_state(slot, site);
            let mut numerator = 0.0;
            for x in 0..N_CODONS {
                let dpi_x = dpi.as_ref().map(|v| v[x]).unwrap_or(0.0);
                numerator += dl[[p, root_i, site, x]] * pi[x] + l[[root_i, site, x]] * dpi_x;
            }
            dloglik[p] += checked_div(numerator, sitelik)?;
        }
    }

    let loglik = siteloglik.iter().sum();

    Ok(KernelOutput {
        l,
        dl,
        siteloglik,
        loglik,
        dloglik,
    })
}

/// The message a child (tip or internal) sends to its parent for one site:
/// `MLc[x]` and its derivative with respect to every parameter slot.
#[allow(clippy::too_many_arguments)]
fn child_message(
    tree: &IndexedTree,
    alignment: &Alignment,
    model: &dyn SubstitutionModel,
    slots: &[ParamSlot],
    child: usize,
    site: usize,
    l: &Tensor<f64>,
    dl: &Tensor<f64>,
) -> EngineResult<(Vec<f64>, Vec<[f64; N_CODONS]>)> {
    let t = tree.branch_length(child);
    let nparams = slots.len();

    if tree.is_tip(child) {
        let tipcodon = alignment.codon(child, site);
        let mc = model.m_tip(t, site, tipcodon);
        let mut dmc = Vec::with_capacity(nparams);
        for slot in slots {
            let mut row = [0.0; N_CODONS];
            let d = model.dm_tip(slot, t, site, tipcodon);
            row.copy_from_slice(&d);
            dmc.push(row);
        }
        return Ok((mc, dmc));
    }

    let ntips = tree.ntips();
    let i = child - ntips;
    let m = model.m(t, site);

    let mut ml = vec![0.0; N_CODONS];
    for x in 0..N_CODONS {
        let mut sum = 0.0;
        for y in 0..N_CODONS {
            sum += m[[x, y]] * l[[i, site, y]];
        }
        ml[x] = check(sum, "MLc[r][x]")?;
    }

    let mut dml = Vec::with_capacity(nparams);
    for (p, slot) in slots.iter().enumerate() {
        let dm = model.dm(slot, t, site);
        let mut row = [0.0; N_CODONS];
        for x in 0..N_CODONS {
            let mut sum = 0.0;
            for y in 0..N_CODONS {
                sum += dm[[x, y]] * l[[i, site, y]] + m[[x, y]] * dl[[p, i, site, y]];
            }
            row[x] = sum;
        }
        dml.push(row);
    }

    Ok((ml, dml))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::UniformRateModel;
    use crate::tree::{index_tree, parse_newick};
    use std::collections::HashMap;

    fn two_tip_alignment(tree: &IndexedTree) -> Alignment {
        let mut seqs = HashMap::new();
        seqs.insert(tree.tip_name(0).to_string(), b"ATG".to_vec());
        seqs.insert(tree.tip_name(1).to_string(), b"ATG".to_vec());
        crate::alignment::build_alignment(tree, &seqs).unwrap()
    }

    #[test]
    fn identical_tips_give_a_finite_loglik() {
        let tree = index_tree(&parse_newick("(A:0.1,B:0.1);").unwrap()).unwrap();
        let alignment = two_tip_alignment(&tree);
        let model = UniformRateModel::new(1, 0.3);
        let slots = model.freeparams();
        let slot_refs: Vec<ParamSlot> = slots
            .into_iter()
            .map(|(name, _)| ParamSlot::Scalar(name))
            .collect();
        let out = evaluate(&tree, &alignment, &model, &slot_refs).unwrap();
        assert!(out.loglik.is_finite());
        assert_eq!(out.dloglik.len(), 1);
    }

    #[test]
    fn sibling_order_does_not_change_loglik() {
        let tree_ab = index_tree(&parse_newick("(A:0.2,B:0.1);").unwrap()).unwrap();
        let tree_ba = index_tree(&parse_newick("(B:0.1,A:0.2);").unwrap()).unwrap();
        let aln_ab = two_tip_alignment(&tree_ab);
        let aln_ba = two_tip_alignment(&tree_ba);
        let model = UniformRateModel::new(1, 0.3);
        let out_ab = evaluate(&tree_ab, &aln_ab, &model, &[]).unwrap();
        let out_ba = evaluate(&tree_ba, &aln_ba, &model, &[]).unwrap();
        assert!((out_ab.loglik - out_ba.loglik).abs() < 1e-12);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let tree = index_tree(&parse_newick("(A:0.3,B:0.4);").unwrap()).unwrap();
        let alignment = two_tip_alignment(&tree);
        let base_rate = 0.5;
        let model = UniformRateModel::new(1, base_rate);
        let slot = ParamSlot::Scalar("rate".to_string());

        let analytic = evaluate(&tree, &alignment, &model, &[slot.clone()])
            .unwrap()
            .dloglik[0];

        let h = 1e-6;
        let plus = evaluate(
            &tree,
            &alignment,
            &UniformRateModel::new(1, base_rate + h),
            &[],
        )
        .unwrap()
        .loglik;
        let minus = evaluate(
            &tree,
            &alignment,
            &UniformRateModel::new(1, base_rate - h),
            &[],
        )
        .unwrap()
        .loglik;
        let numeric = (plus - minus) / (2.0 * h);

        assert!(
            (analytic - numeric).abs() < 1e-3,
            "analytic={analytic} numeric={numeric}"
        );
    }
}
