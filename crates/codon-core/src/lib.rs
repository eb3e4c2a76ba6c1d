//! Tree indexing, codon encoding, and the Felsenstein likelihood/gradient
//! kernel for fitting codon-substitution models.

pub mod adequacy;
pub mod alignment;
pub mod codon;
pub mod engine;
pub mod fptrap;
pub mod kernel;
pub mod model;
pub mod optimize;
pub mod params;
pub mod random;
pub mod simulate;
pub mod tree;

#[cfg(test)]
mod fixtures;

pub use alignment::{Alignment, build_alignment};
pub use codon::{N_CODONS, decode_codon, encode_codon};
pub use engine::TreeLikelihood;
pub use model::SubstitutionModel;
pub use optimize::{BoundedAscent, OptimizerEpoch, maximize_likelihood};
pub use params::{ParamProjector, ParamSlot, ParamValue};
pub use simulate::{calculate_pvalue, simulate_alignment};
pub use tree::{IndexedTree, RawTree, index_tree, parse_newick};
