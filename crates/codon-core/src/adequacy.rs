//! Model-adequacy peripherals for comparing amino-acid preferences:
//! translation with gap-awareness, empirical frequency tallies, and two
//! preference-distance metrics (absolute-difference and Jensen-Shannon).
//! These sit alongside the likelihood engine rather than inside it — a
//! model's fit can be evaluated this way without touching the kernel.

use std::collections::BTreeMap;

use codon_error::{EngineResult, engine_err};

/// Standard genetic code, all 64 triplets including the three stops (`*`).
const CODE_TABLE: &[(&[u8; 3], u8)] = &[
    (b"TTT", b'F'), (b"TTC", b'F'), (b"TTA", b'L'), (b"TTG", b'L'),
    (b"CTT", b'L'), (b"CTC", b'L'), (b"CTA", b'L'), (b"CTG", b'L'),
    (b"ATT", b'I'), (b"ATC", b'I'), (b"ATA", b'I'), (b"ATG", b'M'),
    (b"GTT", b'V'), (b"GTC", b'V'), (b"GTA", b'V'), (b"GTG", b'V'),
    (b"TCT", b'S'), (b"TCC", b'S'), (b"TCA", b'S'), (b"TCG", b'S'),
    (b"CCT", b'P'), (b"CCC", b'P'), (b"CCA", b'P'), (b"CCG", b'P'),
    (b"ACT", b'T'), (b"ACC", b'T'), (b"ACA", b'T'), (b"ACG", b'T'),
    (b"GCT", b'A'), (b"GCC", b'A'), (b"GCA", b'A'), (b"GCG", b'A'),
    (b"TAT", b'Y'), (b"TAC", b'Y'), (b"TAA", b'*'), (b"TAG", b'*'),
    (b"CAT", b'H'), (b"CAC", b'H'), (b"CAA", b'Q'), (b"CAG", b'Q'),
    (b"AAT", b'N'), (b"AAC", b'N'), (b"AAA", b'K'), (b"AAG", b'K'),
    (b"GAT", b'D'), (b"GAC", b'D'), (b"GAA", b'E'), (b"GAG", b'E'),
    (b"TGT", b'C'), (b"TGC", b'C'), (b"TGA", b'*'), (b"TGG", b'W'),
    (b"CGT", b'R'), (b"CGC", b'R'), (b"CGA", b'R'), (b"CGG", b'R'),
    (b"AGT", b'S'), (b"AGC", b'S'), (b"AGA", b'R'), (b"AGG", b'R'),
    (b"GGT", b'G'), (b"GGC", b'G'), (b"GGA", b'G'), (b"GGG", b'G'),
];

fn translate_codon(triplet: &[u8; 3]) -> Option<u8> {
    let upper = [
        triplet[0].to_ascii_uppercase(),
        triplet[1].to_ascii_uppercase(),
        triplet[2].to_ascii_uppercase(),
    ];
    CODE_TABLE
        .iter()
        .find(|(c, _)| **c == upper)
        .map(|(_, aa)| *aa)
}

/// Translates a nucleotide sequence to amino acids, mapping an all-gap
/// codon to `-` rather than erroring.
///
/// ```
/// use codon_core::adequacy::translate_with_gaps;
/// assert_eq!(translate_with_gaps(b"ATGATG").unwrap(), "MM");
/// assert_eq!(translate_with_gaps(b"CTT---ATG").unwrap(), "L-M");
/// ```
pub fn translate_with_gaps(seq: &[u8]) -> EngineResult<String> {
    if seq.len() % 3 != 0 {
        return Err(engine_err!(
            Structural: "sequence length {} is not a multiple of 3",
            seq.len()
        ));
    }
    let mut out = String::with_capacity(seq.len() / 3);
    for chunk in seq.chunks(3) {
        let upper: Vec<u8> = chunk.iter().map(|b| b.to_ascii_uppercase()).collect();
        if upper.iter().all(|&b| b == b'-') {
            out.push('-');
            continue;
        }
        let triplet = [upper[0], upper[1], upper[2]];
        match translate_codon(&triplet) {
            Some(aa) => out.push(aa as char),
            None => {
                return Err(engine_err!(
                    Structural: "unrecognized codon '{}'",
                    String::from_utf8_lossy(&triplet)
                ));
            }
        }
    }
    Ok(out)
}

/// Empirical amino-acid frequencies across a set of (already translated)
/// sequences, ignoring gaps. Keys are amino-acid letters.
pub fn calc_aa_frequencies(translated: &[String]) -> BTreeMap<char, f64> {
    let mut counts: BTreeMap<char, usize> = BTreeMap::new();
    let mut total = 0usize;
    for seq in translated {
        for aa in seq.chars() {
            if aa == '-' || aa == '*' {
                continue;
            }
            *counts.entry(aa).or_insert(0) += 1;
            total += 1;
        }
    }
    counts
        .into_iter()
        .map(|(aa, n)| (aa, n as f64 / total.max(1) as f64))
        .collect()
}

/// How [`pref_distance`] compares two amino-acid preference distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Half the sum of absolute per-amino-acid differences (in `[0, 1]`).
    HalfSumAbsDiff,
    /// The Jensen-Shannon distance (square root of the divergence).
    JensenShannon,
}

/// Distance between two preference vectors over the same ordered set of
/// amino acids.
pub fn pref_distance(p: &[f64], q: &[f64], metric: DistanceMetric) -> EngineResult<f64> {
    if p.len() != q.len() {
        return Err(engine_err!(
            Structural: "preference vectors have different lengths ({} vs {})",
            p.len(),
            q.len()
        ));
    }
    Ok(match metric {
        DistanceMetric::HalfSumAbsDiff => {
            0.5 * p.iter().zip(q).map(|(a, b)| (a - b).abs()).sum::<f64>()
        }
        DistanceMetric::JensenShannon => div_jensen_shannon(p, q).sqrt(),
    })
}

/// Base-2 Jensen-Shannon divergence between two discrete distributions:
/// `0.5 * KL(p || m) + 0.5 * KL(q || m)`, `m = (p + q) / 2`. Zero terms in
/// `p`/`q` contribute nothing to their own KL term, per the usual `0 log 0 = 0`
/// convention.
pub fn div_jensen_shannon(p: &[f64], q: &[f64]) -> f64 {
    let m: Vec<f64> = p.iter().zip(q).map(|(a, b)| 0.5 * (a + b)).collect();
    0.5 * kl_divergence(p, &m) + 0.5 * kl_divergence(q, &m)
}

fn kl_divergence(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(&ai, _)| ai > 0.0)
        .map(|(&ai, &bi)| ai * (ai / bi).log2())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_codons() {
        assert_eq!(translate_with_gaps(b"ATGATG").unwrap(), "MM");
        assert_eq!(translate_with_gaps(b"CTT---ATG").unwrap(), "L-M");
    }

    #[test]
    fn translate_rejects_bad_length() {
        assert!(translate_with_gaps(b"ATGA").is_err());
    }

    #[test]
    fn aa_frequencies_ignore_gaps() {
        let freqs = calc_aa_frequencies(&["MM".to_string(), "M-".to_string()]);
        assert_eq!(freqs[&'M'], 1.0);
        assert_eq!(freqs.len(), 1);
    }

    #[test]
    fn identical_distributions_have_zero_distance() {
        let p = [0.25, 0.25, 0.25, 0.25];
        assert_eq!(
            pref_distance(&p, &p, DistanceMetric::HalfSumAbsDiff).unwrap(),
            0.0
        );
        assert!(pref_distance(&p, &p, DistanceMetric::JensenShannon).unwrap() < 1e-12);
    }

    #[test]
    fn half_sum_abs_diff_matches_hand_computation() {
        let p = [0.5, 0.5, 0.0, 0.0];
        let q = [0.2, 0.2, 0.3, 0.3];
        // 0.5 * (0.3 + 0.3 + 0.3 + 0.3) = 0.6
        assert!((pref_distance(&p, &q, DistanceMetric::HalfSumAbsDiff).unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn jensen_shannon_distance_is_symmetric() {
        let p = [0.7, 0.1, 0.1, 0.1];
        let q = [0.1, 0.7, 0.1, 0.1];
        let d1 = pref_distance(&p, &q, DistanceMetric::JensenShannon).unwrap();
        let d2 = pref_distance(&q, &p, DistanceMetric::JensenShannon).unwrap();
        assert!((d1 - d2).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(pref_distance(&[0.5, 0.5], &[1.0], DistanceMetric::HalfSumAbsDiff).is_err());
    }
}
