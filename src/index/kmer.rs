use std::sync::Arc;

use rayon::prelude::*;

use crate::core::error::DesignError;
use crate::core::sequence::contains_any;
use crate::core::transcript::Transcript;
use crate::core::types::{RegionMask, MAX_KMER_LENGTH, NUCLEOTIDES};

/// Base-4 code of a k-mer (A=0, C=1, G=2, U=3, first base most significant).
///
/// # Errors
///
/// Returns `DesignError::InvalidSymbol` for anything outside {A, C, G, U}.
pub fn kmer_to_int(kmer: &str) -> Result<usize, DesignError> {
    kmer.chars().try_fold(0usize, |code, c| {
        let digit = match c {
            'A' => 0,
            'C' => 1,
            'G' => 2,
            'U' => 3,
            symbol => {
                return Err(DesignError::InvalidSymbol {
                    symbol,
                    sequence: kmer.to_string(),
                })
            }
        };
        Ok(code * 4 + digit)
    })
}

/// Inverse of [`kmer_to_int`]. Only the low `k` base-4 digits of `code` are read.
#[must_use]
pub fn int_to_kmer(code: usize, k: usize) -> String {
    let mut bases = vec!['A'; k];
    let mut rest = code;
    for slot in bases.iter_mut().rev() {
        *slot = NUCLEOTIDES[rest % 4];
        rest /= 4;
    }
    bases.into_iter().collect()
}

/// Number of distinct k-mers of length `k`
pub fn kmer_count(k: usize) -> usize {
    1 << (2 * k)
}

/// Occurrence index of every k-mer in every transcript of a working set.
///
/// Offsets are 0-based starts, ascending, overlapping occurrences included.
/// An offset is stored only when the whole k-mer lies in the region mask, and
/// k-mers containing an exclusion motif are never stored at all.
#[derive(Debug, Clone)]
pub struct KMerIndex {
    k: usize,
    region: RegionMask,
    exclusions: Vec<String>,
    transcripts: Vec<Arc<dyn Transcript>>,
    /// `positions[transcript][code]`
    positions: Vec<Vec<Vec<usize>>>,
}

impl KMerIndex {
    /// Index every transcript in parallel.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::InvalidKmerLength` when `k` is outside `1..=7` and
    /// `DesignError::InvalidSymbol` when a transcript holds a non-ACGU base.
    pub fn build(
        transcripts: &[Arc<dyn Transcript>],
        region: RegionMask,
        exclusions: &[String],
        k: usize,
    ) -> Result<Self, DesignError> {
        if k == 0 || k > MAX_KMER_LENGTH {
            return Err(DesignError::InvalidKmerLength(k));
        }

        let positions = transcripts
            .par_iter()
            .map(|t| index_transcript(t.as_ref(), region, exclusions, k))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            k,
            transcripts = transcripts.len(),
            region = %region,
            "built k-mer index"
        );

        Ok(Self {
            k,
            region,
            exclusions: exclusions.to_vec(),
            transcripts: transcripts.to_vec(),
            positions,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn region(&self) -> RegionMask {
        self.region
    }

    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    pub fn transcripts(&self) -> &[Arc<dyn Transcript>] {
        &self.transcripts
    }

    /// Stored offsets of `kmer` in transcript `transcript`; empty when the
    /// k-mer is absent, malformed, of the wrong length, or the index unknown
    pub fn positions_of(&self, kmer: &str, transcript: usize) -> &[usize] {
        if kmer.len() != self.k {
            return &[];
        }
        match (kmer_to_int(kmer), self.positions.get(transcript)) {
            (Ok(code), Some(buckets)) => buckets.get(code).map_or(&[], Vec::as_slice),
            _ => &[],
        }
    }

    /// True when `kmer` has at least one stored offset in every transcript of `set`
    pub fn is_in_all(&self, kmer: &str, set: &[usize]) -> bool {
        set.iter().all(|&t| !self.positions_of(kmer, t).is_empty())
    }

    /// K-mers stored in every transcript of `in_set` that never occur in the
    /// targetable sequence of any transcript of `not_in_set`, in code order
    pub fn exclusive_kmers(&self, in_set: &[usize], not_in_set: &[usize]) -> Vec<String> {
        let forbidden: Vec<String> = not_in_set
            .iter()
            .filter_map(|&t| self.transcripts.get(t))
            .map(|t| t.targetable_sequence(self.region))
            .collect();

        (0..kmer_count(self.k))
            .map(|code| int_to_kmer(code, self.k))
            .filter(|kmer| self.is_in_all(kmer, in_set))
            .filter(|kmer| !forbidden.iter().any(|seq| seq.contains(kmer.as_str())))
            .collect()
    }
}

fn index_transcript(
    transcript: &dyn Transcript,
    region: RegionMask,
    exclusions: &[String],
    k: usize,
) -> Result<Vec<Vec<usize>>, DesignError> {
    let sequence = transcript.sequence();
    if let Some(symbol) = sequence
        .chars()
        .find(|c| !matches!(c, 'A' | 'C' | 'G' | 'U'))
    {
        return Err(DesignError::InvalidSymbol {
            symbol,
            sequence: transcript.name().to_string(),
        });
    }

    // ACGU only from here on, so byte offsets are base offsets
    let mut buckets = vec![Vec::new(); kmer_count(k)];
    if sequence.len() < k {
        return Ok(buckets);
    }
    for start in 0..=sequence.len() - k {
        let kmer = &sequence[start..start + k];
        let code = kmer_to_int(kmer)?;
        if contains_any(kmer, exclusions) {
            continue;
        }
        if transcript.validate_region(region, start, start + k - 1) {
            buckets[code].push(start);
        }
    }
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transcript::CodingTranscript;

    fn transcripts(seqs: &[&str]) -> Vec<Arc<dyn Transcript>> {
        seqs.iter()
            .enumerate()
            .map(|(i, s)| {
                Arc::new(CodingTranscript::utr3_only(format!("t{i}"), *s)) as Arc<dyn Transcript>
            })
            .collect()
    }

    #[test]
    fn test_kmer_round_trip() {
        for k in 1..=5 {
            for code in 0..kmer_count(k) {
                let kmer = int_to_kmer(code, k);
                assert_eq!(kmer.len(), k);
                assert_eq!(kmer_to_int(&kmer).unwrap(), code);
            }
        }
    }

    #[test]
    fn test_kmer_to_int_values() {
        assert_eq!(kmer_to_int("A").unwrap(), 0);
        assert_eq!(kmer_to_int("U").unwrap(), 3);
        assert_eq!(kmer_to_int("CA").unwrap(), 4);
        assert_eq!(kmer_to_int("UUUU").unwrap(), 255);
    }

    #[test]
    fn test_kmer_to_int_invalid_symbol() {
        let err = kmer_to_int("ACTG").unwrap_err();
        assert_eq!(
            err,
            DesignError::InvalidSymbol {
                symbol: 'T',
                sequence: "ACTG".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_k() {
        let ts = transcripts(&["ACGU"]);
        assert!(matches!(
            KMerIndex::build(&ts, RegionMask::ALL, &[], 0),
            Err(DesignError::InvalidKmerLength(0))
        ));
        assert!(matches!(
            KMerIndex::build(&ts, RegionMask::ALL, &[], 8),
            Err(DesignError::InvalidKmerLength(8))
        ));
    }

    #[test]
    fn test_build_rejects_bad_base() {
        let ts = transcripts(&["ACGNACGU"]);
        assert!(matches!(
            KMerIndex::build(&ts, RegionMask::ALL, &[], 2),
            Err(DesignError::InvalidSymbol { symbol: 'N', .. })
        ));
    }

    #[test]
    fn test_build_rejects_multibyte_base() {
        let ts = transcripts(&["ACGÜACGU"]);
        let err = KMerIndex::build(&ts, RegionMask::ALL, &[], 3).unwrap_err();
        assert_eq!(
            err,
            DesignError::InvalidSymbol {
                symbol: 'Ü',
                sequence: "t0".to_string(),
            }
        );
    }

    #[test]
    fn test_overlapping_positions() {
        let ts = transcripts(&["AAAAC"]);
        let index = KMerIndex::build(&ts, RegionMask::ALL, &[], 2).unwrap();
        assert_eq!(index.positions_of("AA", 0), &[0, 1, 2]);
        assert_eq!(index.positions_of("AC", 0), &[3]);
        assert!(index.positions_of("GG", 0).is_empty());
        assert!(index.positions_of("AA", 7).is_empty());
        assert!(index.positions_of("AAA", 0).is_empty());
    }

    #[test]
    fn test_excluded_kmers_left_empty() {
        let ts = transcripts(&["GGGGACGU"]);
        let exclusions = vec!["GGG".to_string()];
        let index = KMerIndex::build(&ts, RegionMask::ALL, &exclusions, 4).unwrap();
        assert!(index.positions_of("GGGG", 0).is_empty());
        assert!(index.positions_of("GGGA", 0).is_empty());
        assert_eq!(index.positions_of("GGAC", 0), &[2]);
    }

    #[test]
    fn test_region_containment() {
        // 5'UTR 6 nt, CDS 6 nt, 3'UTR 8 nt
        let t: Arc<dyn Transcript> = Arc::new(CodingTranscript::new(
            "t",
            "ACGUACACGUACACGUACGU",
            6,
            6,
        ));
        let ts = vec![t.clone()];
        let index = KMerIndex::build(&ts, RegionMask::UTR3, &[], 3).unwrap();
        let mut total = 0;
        for code in 0..kmer_count(3) {
            let kmer = int_to_kmer(code, 3);
            for &pos in index.positions_of(&kmer, 0) {
                assert!(pos >= 12, "{kmer} stored at {pos} outside the 3'UTR");
                assert!(t.validate_region(RegionMask::UTR3, pos, pos + 2));
                total += 1;
            }
        }
        assert_eq!(total, 6);
    }

    #[test]
    fn test_exclusive_kmers() {
        let ts = transcripts(&["AACGUU", "CAACGA", "GGGACG"]);
        let index = KMerIndex::build(&ts, RegionMask::ALL, &[], 3).unwrap();
        let shared = index.exclusive_kmers(&[0, 1], &[]);
        assert_eq!(shared, vec!["AAC".to_string(), "ACG".to_string()]);
        let exclusive = index.exclusive_kmers(&[0, 1], &[2]);
        assert_eq!(exclusive, vec!["AAC".to_string()]);
        assert!(index.is_in_all("ACG", &[0, 1, 2]));
        assert!(!index.is_in_all("AAC", &[0, 1, 2]));
    }
}
