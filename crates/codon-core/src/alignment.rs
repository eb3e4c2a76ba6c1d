//! Tip codon encoding: turns raw per-tip nucleotide sequences into the
//! alignment the kernel reads, matched up against a tree's tip indices.

use std::collections::HashMap;

use codon_error::{EngineResult, engine_err};

use crate::codon::encode_codon;
use crate::tree::IndexedTree;

/// Encoded codon sequences for every tip, indexed `[tip][site]`.
/// A gap is `None`; a recognized sense codon is `Some(alphabet index)`.
#[derive(Debug, Clone)]
pub struct Alignment {
    nsites: usize,
    codons: Vec<Vec<Option<usize>>>,
}

impl Alignment {
    pub fn nsites(&self) -> usize {
        self.nsites
    }

    pub fn ntips(&self) -> usize {
        self.codons.len()
    }

    /// The codon index at `tip`/`site`, or `None` for a gap.
    pub fn codon(&self, tip: usize, site: usize) -> Option<usize> {
        self.codons[tip][site]
    }

    pub fn row(&self, tip: usize) -> &[Option<usize>] {
        &self.codons[tip]
    }
}

/// Builds an [`Alignment`] from raw `name -> nucleotide sequence` pairs,
/// reordering rows to match the tree's tip indexing.
///
/// Each sequence's length must be `3 * nsites` for a common `nsites`, and
/// every tree tip name must have exactly one matching sequence.
pub fn build_alignment(
    tree: &IndexedTree,
    sequences: &HashMap<String, Vec<u8>>,
) -> EngineResult<Alignment> {
    if sequences.len() != tree.ntips() {
        return Err(engine_err!(
            Structural: "tree has {} tips but alignment has {} sequences",
            tree.ntips(),
            sequences.len()
        ));
    }

    let mut nsites = None;
    let mut codons = Vec::with_capacity(tree.ntips());
    for tip in 0..tree.ntips() {
        let name = tree.tip_name(tip);
        let seq = sequences
            .get(name)
            .ok_or_else(|| engine_err!(Structural: "no alignment sequence for tip '{}'", name))?;

        if seq.len() % 3 != 0 {
            return Err(engine_err!(
                Structural: "sequence for tip '{}' has length {} which is not a multiple of 3",
                name,
                seq.len()
            ));
        }
        let row_nsites = seq.len() / 3;
        match nsites {
            None => nsites = Some(row_nsites),
            Some(n) if n != row_nsites => {
                return Err(engine_err!(
                    Structural: "tip '{}' has {} sites, expected {}",
                    name,
                    row_nsites,
                    n
                ));
            }
            _ => {}
        }

        let mut row = Vec::with_capacity(row_nsites);
        for site in 0..row_nsites {
            let triplet = &seq[site * 3..site * 3 + 3];
            row.push(encode_codon(triplet)?);
        }
        codons.push(row);
    }

    Ok(Alignment {
        nsites: nsites.unwrap_or(0),
        codons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{index_tree, parse_newick};

    fn seqs() -> HashMap<String, Vec<u8>> {
        let mut m = HashMap::new();
        m.insert("A".to_string(), b"ATGATG".to_vec());
        m.insert("B".to_string(), b"ATG---".to_vec());
        m
    }

    #[test]
    fn builds_alignment_matching_tip_order() {
        let tree = index_tree(&parse_newick("(A,B);").unwrap()).unwrap();
        let aln = build_alignment(&tree, &seqs()).unwrap();
        assert_eq!(aln.nsites(), 2);
        assert!(aln.codon(0, 0).is_some());
        assert_eq!(aln.codon(1, 1), None);
    }

    #[test]
    fn rejects_mismatched_tip_count() {
        let tree = index_tree(&parse_newick("((A,B),(C,D));").unwrap()).unwrap();
        assert!(build_alignment(&tree, &seqs()).is_err());
    }

    #[test]
    fn rejects_length_not_multiple_of_three() {
        let tree = index_tree(&parse_newick("(A,B);").unwrap()).unwrap();
        let mut s = seqs();
        s.insert("A".to_string(), b"ATGAT".to_vec());
        assert!(build_alignment(&tree, &s).is_err());
    }
}
