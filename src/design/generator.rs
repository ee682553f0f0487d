use std::collections::HashSet;

use crate::core::error::DesignError;
use crate::core::sequence::CompositionFilter;
use crate::core::types::{NUCLEOTIDES, SEED_END};

/// Bases of the 3' flank (guide positions 2-5)
pub const FLANK3_LENGTH: usize = 4;

/// Bases of the 5' flank (guide positions 13-15)
pub const FLANK5_LENGTH: usize = 3;

const FLANK3_START: usize = 1;
const FLANK5_START: usize = 12;

/// Template before flanks are placed; the free positions start at A
const TEMPLATE: &str = "CAAAAAAAAAAAAAAAAAGCA";

/// Free positions, least significant digit first
const FREE_POSITIONS: [usize; 9] = [5, 6, 7, 8, 9, 10, 11, 15, 16];

/// Lazy enumerator of 21-nt guide candidates around two frozen flanks.
///
/// The nine free positions form a base-4 odometer whose most significant digit
/// is the rightmost free position, so the leftmost free base changes fastest.
/// The first candidate considered is the all-A filling. A candidate is emitted
/// only when it passes the composition filter and its seed window (positions
/// 2-8) has not been registered with [`CandidateGenerator::avoid_seed`].
///
/// Single pass: once exhausted the generator stays exhausted.
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    bases: Vec<char>,
    digits: [usize; FREE_POSITIONS.len()],
    started: bool,
    exhausted: bool,
    pending: Option<String>,
    filter: CompositionFilter,
    avoided: HashSet<String>,
    examined: u64,
    produced: u64,
}

impl CandidateGenerator {
    /// # Errors
    ///
    /// Returns `DesignError::InvalidFlank` when a flank has the wrong length and
    /// `DesignError::InvalidSymbol` when it holds a non-ACGU base.
    pub fn new(flank3: &str, flank5: &str, filter: CompositionFilter) -> Result<Self, DesignError> {
        check_flank(flank3, FLANK3_LENGTH)?;
        check_flank(flank5, FLANK5_LENGTH)?;

        let mut bases: Vec<char> = TEMPLATE.chars().collect();
        for (i, c) in flank3.chars().enumerate() {
            bases[FLANK3_START + i] = c;
        }
        for (i, c) in flank5.chars().enumerate() {
            bases[FLANK5_START + i] = c;
        }

        Ok(Self {
            bases,
            digits: [0; FREE_POSITIONS.len()],
            started: false,
            exhausted: false,
            pending: None,
            filter,
            avoided: HashSet::new(),
            examined: 0,
            produced: 0,
        })
    }

    /// Never emit a candidate whose positions 2-8 equal `seed` from now on
    pub fn avoid_seed(&mut self, seed: &str) {
        self.avoided.insert(seed.to_string());
    }

    pub fn avoided_seeds(&self) -> usize {
        self.avoided.len()
    }

    /// Step the odometer; false once every combination has been visited
    pub fn advance(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        if !self.started {
            self.started = true;
        } else if !self.increment() {
            self.exhausted = true;
            return false;
        }
        for (slot, &position) in FREE_POSITIONS.iter().enumerate() {
            self.bases[position] = NUCLEOTIDES[self.digits[slot]];
        }
        self.examined += 1;
        true
    }

    pub fn has_next(&mut self) -> bool {
        self.fill();
        self.pending.is_some()
    }

    /// Next accepted candidate.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::NoMoreCandidates` once the odometer has overflowed.
    pub fn next_candidate(&mut self) -> Result<String, DesignError> {
        self.fill();
        let candidate = self.pending.take().ok_or(DesignError::NoMoreCandidates)?;
        self.produced += 1;
        Ok(candidate)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.pending.is_none()
    }

    /// Odometer positions visited so far
    pub fn examined(&self) -> u64 {
        self.examined
    }

    /// Candidates handed out so far
    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn fill(&mut self) {
        if let Some(pending) = &self.pending {
            if !self.is_avoided(pending) {
                return;
            }
            self.pending = None;
        }
        while self.advance() {
            let candidate: String = self.bases.iter().collect();
            if !self.is_avoided(&candidate) && self.filter.accepts(&candidate) {
                self.pending = Some(candidate);
                return;
            }
        }
    }

    fn is_avoided(&self, candidate: &str) -> bool {
        candidate
            .get(1..SEED_END)
            .is_some_and(|seed| self.avoided.contains(seed))
    }

    fn increment(&mut self) -> bool {
        for slot in 0..self.digits.len() {
            if self.digits[slot] < NUCLEOTIDES.len() - 1 {
                self.digits[slot] += 1;
                for lower in &mut self.digits[..slot] {
                    *lower = 0;
                }
                return true;
            }
        }
        false
    }
}

impl Iterator for CandidateGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_candidate().ok()
    }
}

fn check_flank(flank: &str, expected: usize) -> Result<(), DesignError> {
    if flank.len() != expected {
        return Err(DesignError::InvalidFlank {
            flank: flank.to_string(),
            expected,
        });
    }
    if let Some(symbol) = flank.chars().find(|c| !NUCLEOTIDES.contains(c)) {
        return Err(DesignError::InvalidSymbol {
            symbol,
            sequence: flank.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> CompositionFilter {
        CompositionFilter::new(vec![], 0.3, 0.64)
    }

    #[test]
    fn test_template_layout() {
        let mut generator =
            CandidateGenerator::new("ACGU", "UGC", CompositionFilter::new(vec![], 0.0, 1.0))
                .unwrap();
        let first = generator.next_candidate().unwrap();
        assert_eq!(first.len(), 21);
        assert_eq!(first, "CACGUAAAAAAAUGCAAAGCA");
        // leftmost free position changes fastest
        let second = generator.next_candidate().unwrap();
        assert_eq!(second, "CACGUCAAAAAAUGCAAAGCA");
    }

    #[test]
    fn test_invalid_flanks() {
        assert!(matches!(
            CandidateGenerator::new("ACG", "UGC", filter()),
            Err(DesignError::InvalidFlank { expected: 4, .. })
        ));
        assert!(matches!(
            CandidateGenerator::new("ACGU", "UGCA", filter()),
            Err(DesignError::InvalidFlank { expected: 3, .. })
        ));
        assert!(matches!(
            CandidateGenerator::new("ACGT", "UGC", filter()),
            Err(DesignError::InvalidSymbol { symbol: 'T', .. })
        ));
    }

    #[test]
    fn test_no_terminal_u_and_gc_bounds() {
        let generator = CandidateGenerator::new("ACGU", "UGC", filter()).unwrap();
        for candidate in generator.take(2000) {
            assert!(!candidate.ends_with('U'));
            let gc = crate::core::sequence::gc_fraction(&candidate);
            assert!((0.3..=0.64).contains(&gc), "{candidate} gc {gc}");
            assert_eq!(&candidate[1..5], "ACGU");
            assert_eq!(&candidate[12..15], "UGC");
            assert_eq!(&candidate[17..], "AGCA");
        }
    }

    #[test]
    fn test_refiltering_candidates_keeps_them_all() {
        let strict = CompositionFilter::new(vec!["AAAA".to_string(), "GGGG".to_string()], 0.35, 0.6);
        let generator = CandidateGenerator::new("ACGU", "UGC", strict.clone()).unwrap();
        let once: Vec<String> = generator.take(3000).collect();
        assert_eq!(once.len(), 3000);
        let twice: Vec<String> = once.iter().filter(|c| strict.accepts(c)).cloned().collect();
        assert_eq!(twice, once);
        assert!(once.iter().all(|c| !c.contains("AAAA") && !c.contains("GGGG")));
    }

    #[test]
    fn test_avoided_seed_never_reproduced() {
        let mut generator = CandidateGenerator::new("ACGU", "UGC", filter()).unwrap();
        let first = generator.next_candidate().unwrap();
        let seed = first[1..8].to_string();
        // buffer the next candidate before registering the seed
        assert!(generator.has_next());
        generator.avoid_seed(&seed);
        for candidate in generator.by_ref().take(5000) {
            assert_ne!(&candidate[1..8], seed.as_str());
        }
        assert_eq!(generator.avoided_seeds(), 1);
    }

    #[test]
    fn test_exhaustion() {
        // nothing passes: GC window is empty for a 21-mer
        let mut generator =
            CandidateGenerator::new("ACGU", "UGC", CompositionFilter::new(vec![], 0.99, 1.0))
                .unwrap();
        assert!(!generator.has_next());
        assert!(generator.is_exhausted());
        assert_eq!(generator.examined(), 1 << 18);
        assert_eq!(generator.next_candidate(), Err(DesignError::NoMoreCandidates));
        assert_eq!(generator.next(), None);
    }
}
