//! Nucleotide helpers shared by the index, generator and engine.

use crate::core::types::NUCLEOTIDES;

/// Watson-Crick complement; anything outside the alphabet maps to `N`
#[must_use]
pub fn complement(base: char) -> char {
    match base {
        'A' => 'U',
        'U' => 'A',
        'C' => 'G',
        'G' => 'C',
        _ => 'N',
    }
}

#[must_use]
pub fn reverse_complement(strand: &str) -> String {
    strand.chars().rev().map(complement).collect()
}

/// How two bases pair in an RNA duplex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    WatsonCrick,
    Wobble,
    Mismatch,
}

#[must_use]
pub fn pairing(a: char, b: char) -> Pairing {
    match (a, b) {
        ('A', 'U') | ('U', 'A') | ('C', 'G') | ('G', 'C') => Pairing::WatsonCrick,
        ('G', 'U') | ('U', 'G') => Pairing::Wobble,
        _ => Pairing::Mismatch,
    }
}

/// Fraction of G and C bases; 0.0 for an empty sequence
#[must_use]
pub fn gc_fraction(sequence: &str) -> f64 {
    if sequence.is_empty() {
        return 0.0;
    }
    let gc = sequence.chars().filter(|c| matches!(c, 'G' | 'C')).count();
    #[allow(clippy::cast_precision_loss)] // guide-sized sequences
    {
        gc as f64 / sequence.len() as f64
    }
}

#[must_use]
pub fn contains_any(sequence: &str, motifs: &[String]) -> bool {
    motifs.iter().any(|m| sequence.contains(m.as_str()))
}

/// Every k-mer over the alphabet, lexicographic in code order, skipping those
/// that contain an excluded motif. `k == 0` yields the single empty string.
#[must_use]
pub fn generate_kmers(k: usize, exclusions: &[String]) -> Vec<String> {
    let mut kmers = vec![String::new()];
    for _ in 0..k {
        kmers = kmers
            .iter()
            .flat_map(|prefix| {
                NUCLEOTIDES.iter().map(move |&n| {
                    let mut next = prefix.clone();
                    next.push(n);
                    next
                })
            })
            .collect();
    }
    kmers.retain(|kmer| !contains_any(kmer, exclusions));
    kmers
}

/// Replace `replacement.len()` bases starting at `index`
#[must_use]
pub fn splice(sequence: &str, index: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(sequence.len());
    out.push_str(&sequence[..index]);
    out.push_str(replacement);
    out.push_str(&sequence[index + replacement.len()..]);
    out
}

/// Composition rules every accepted guide sequence satisfies:
/// no terminal U, none of the exclusion motifs, GC fraction inside the bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionFilter {
    pub exclusions: Vec<String>,
    pub gc_min: f64,
    pub gc_max: f64,
}

impl CompositionFilter {
    pub fn new(exclusions: Vec<String>, gc_min: f64, gc_max: f64) -> Self {
        Self {
            exclusions,
            gc_min,
            gc_max,
        }
    }

    #[must_use]
    pub fn accepts(&self, sequence: &str) -> bool {
        let gc = gc_fraction(sequence);
        !sequence.is_empty()
            && !sequence.ends_with('U')
            && !contains_any(sequence, &self.exclusions)
            && gc >= self.gc_min
            && gc <= self.gc_max
    }
}
