//! The 61-sense-codon alphabet used throughout the kernel.
//!
//! Stop codons (`TAA`, `TAG`, `TGA`) are excluded: every index `0..N_CODONS`
//! names exactly one sense codon, in the fixed order produced by
//! [`CODONS`]. Tip sequences are encoded against this table; an unrecognized
//! triplet is a structural error, a gap is encoded as `None`.

use codon_error::{EngineError, EngineResult, engine_err};

/// Number of sense codons in the standard genetic code (64 total - 3 stop).
pub const N_CODONS: usize = 61;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

const STOP_CODONS: [[u8; 3]; 3] = [*b"TAA", *b"TAG", *b"TGA"];

/// All 61 sense codons, in lexicographic base order with stops removed.
/// `CODONS[i]` is the triplet assigned index `i`.
pub fn codons() -> Vec<[u8; 3]> {
    let mut out = Vec::with_capacity(N_CODONS);
    for &a in &BASES {
        for &b in &BASES {
            for &c in &BASES {
                let triplet = [a, b, c];
                if !STOP_CODONS.contains(&triplet) {
                    out.push(triplet);
                }
            }
        }
    }
    out
}

/// Encodes a single codon triplet to its alphabet index.
///
/// Returns `Ok(None)` only for the literal full-codon gap `---`, and a
/// [`EngineError::Structural`] for anything else that isn't a recognized
/// sense codon — including a stop triplet, a partial gap (`A-G`), or an
/// ambiguity code (`NNN`). Ambiguity codes other than a full-codon gap are
/// out of scope for this alphabet.
pub fn encode_codon(triplet: &[u8]) -> EngineResult<Option<usize>> {
    if triplet.len() != 3 {
        return Err(engine_err!(
            Structural: "codon triplet must be 3 bases, got {}",
            triplet.len()
        ));
    }
    let upper: Vec<u8> = triplet.iter().map(|b| b.to_ascii_uppercase()).collect();
    if upper.iter().all(|&b| b == b'-') {
        return Ok(None);
    }
    let arr: [u8; 3] = [upper[0], upper[1], upper[2]];
    if STOP_CODONS.contains(&arr) {
        return Err(engine_err!(
            Structural: "stop codon {} cannot appear in an alignment",
            String::from_utf8_lossy(&arr)
        ));
    }
    codons()
        .iter()
        .position(|c| *c == arr)
        .map(Some)
        .ok_or_else(|| {
            engine_err!(
                Structural: "unrecognized codon triplet {}",
                String::from_utf8_lossy(&arr)
            )
        })
}

/// Decodes an alphabet index back to its triplet, for diagnostics.
pub fn decode_codon(index: usize) -> EngineResult<[u8; 3]> {
    codons()
        .get(index)
        .copied()
        .ok_or_else(|| engine_err!(Structural: "codon index {} out of range", index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_61_sense_codons() {
        assert_eq!(codons().len(), N_CODONS);
    }

    #[test]
    fn encodes_known_codon() {
        let idx = encode_codon(b"ATG").unwrap().unwrap();
        assert_eq!(decode_codon(idx).unwrap(), *b"ATG");
    }

    #[test]
    fn rejects_stop_codon() {
        assert!(matches!(
            encode_codon(b"TAA"),
            Err(EngineError::Structural { .. })
        ));
    }

    #[test]
    fn gap_encodes_to_none() {
        assert_eq!(encode_codon(b"---").unwrap(), None);
    }

    #[test]
    fn rejects_nonsense_triplet() {
        assert!(encode_codon(b"XYZ").is_err());
    }

    #[test]
    fn rejects_partial_gap() {
        assert!(matches!(
            encode_codon(b"A-G"),
            Err(EngineError::Structural { .. })
        ));
    }

    #[test]
    fn rejects_ambiguity_code() {
        assert!(matches!(
            encode_codon(b"NNN"),
            Err(EngineError::Structural { .. })
        ));
    }
}
