use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::DesignError;
use crate::core::sequence::reverse_complement;
use crate::core::types::{RegionMask, RegionTag, G12_INDEX};

/// A target sequence with named sub-regions.
///
/// Implementations are immutable once constructed and are shared read-only
/// across worker threads. Coordinates are 0-based; intervals passed as
/// `(start, end)` are inclusive on both ends.
pub trait Transcript: Send + Sync + std::fmt::Debug {
    /// Stable identity
    fn name(&self) -> &str;

    /// Full sequence over {A, C, G, U}
    fn sequence(&self) -> &str;

    /// Region containing `position`, `None` past the end
    fn region_of(&self, position: usize) -> Option<RegionTag>;

    fn len(&self) -> usize {
        self.sequence().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence slice `[start, end)`, `None` when out of range
    fn substring(&self, start: usize, end: usize) -> Option<&str> {
        self.sequence().get(start..end)
    }

    /// True when `[start, end]` lies inside the transcript
    fn in_transcript(&self, start: usize, end: usize) -> bool {
        start <= end && end < self.len()
    }

    /// True when every base of `[start, end]` lies in a region of `mask`
    fn validate_region(&self, mask: RegionMask, start: usize, end: usize) -> bool {
        if !self.in_transcript(start, end) {
            return false;
        }
        match (self.region_of(start), self.region_of(end)) {
            (Some(first), Some(last)) => RegionTag::ALL
                .iter()
                .filter(|t| **t >= first && **t <= last)
                .all(|t| mask.contains(*t)),
            _ => false,
        }
    }

    /// Concatenation of the regions of `mask`, 5' to 3'
    fn targetable_sequence(&self, mask: RegionMask) -> String {
        self.sequence()
            .char_indices()
            .filter(|(i, _)| self.region_of(*i).is_some_and(|t| mask.contains(t)))
            .map(|(_, c)| c)
            .collect()
    }

    /// Antisense guide for the site whose seed anchor ends at `last` and whose
    /// window starts at `first`.
    ///
    /// g1-g11 pair with `last` down to `last - 10`; g12 onward pair with the
    /// bases upstream of the bridge, starting at `last - 7 - bridge`. Returns
    /// `None` when the window leaves the transcript or the allowed regions.
    fn antisense_window(
        &self,
        last: usize,
        first: usize,
        bridge: usize,
        mask: RegionMask,
        guide_length: usize,
    ) -> Option<String> {
        if guide_length <= G12_INDEX || !self.validate_region(mask, first, last) {
            return None;
        }
        let head_start = last.checked_sub(G12_INDEX - 1)?;
        let g12 = last.checked_sub(7 + bridge)?;
        let tail_start = g12.checked_sub(guide_length - G12_INDEX - 1)?;
        if tail_start < first || g12 >= head_start {
            return None;
        }
        let head = self.substring(head_start, last + 1)?;
        let tail = self.substring(tail_start, g12 + 1)?;
        let mut guide = reverse_complement(head);
        guide.push_str(&reverse_complement(tail));
        Some(guide)
    }
}

/// A protein-coding transcript: 5'UTR, CDS and 3'UTR laid out back to back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingTranscript {
    pub name: String,
    pub sequence: String,
    pub utr5_length: usize,
    pub cds_length: usize,
}

impl CodingTranscript {
    pub fn new(
        name: impl Into<String>,
        sequence: impl Into<String>,
        utr5_length: usize,
        cds_length: usize,
    ) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into(),
            utr5_length,
            cds_length,
        }
    }

    /// A transcript that is entirely 3'UTR (the usual miRNA target space)
    pub fn utr3_only(name: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self::new(name, sequence, 0, 0)
    }

    pub fn utr3_length(&self) -> usize {
        self.sequence
            .len()
            .saturating_sub(self.utr5_length + self.cds_length)
    }
}

impl Transcript for CodingTranscript {
    fn name(&self) -> &str {
        &self.name
    }

    fn sequence(&self) -> &str {
        &self.sequence
    }

    fn region_of(&self, position: usize) -> Option<RegionTag> {
        if position >= self.sequence.len() {
            None
        } else if position < self.utr5_length {
            Some(RegionTag::Utr5)
        } else if position < self.utr5_length + self.cds_length {
            Some(RegionTag::Cds)
        } else {
            Some(RegionTag::Utr3)
        }
    }
}

/// The working set: required, optional and excluded transcripts laid out in
/// one list so every component addresses a transcript by its index.
#[derive(Debug, Clone)]
pub struct TranscriptSet {
    transcripts: Vec<Arc<dyn Transcript>>,
    required: Vec<usize>,
    optional: Vec<usize>,
    excluded: Vec<usize>,
}

impl TranscriptSet {
    /// Build the working set.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::InsufficientTargets` with fewer than two required
    /// transcripts, or `DesignError::DuplicateTranscript` when a name appears twice.
    pub fn new(
        required: Vec<Arc<dyn Transcript>>,
        optional: Vec<Arc<dyn Transcript>>,
        excluded: Vec<Arc<dyn Transcript>>,
    ) -> Result<Self, DesignError> {
        if required.len() < 2 {
            return Err(DesignError::InsufficientTargets(required.len()));
        }

        let mut names = HashSet::new();
        for t in required.iter().chain(&optional).chain(&excluded) {
            if !names.insert(t.name().to_string()) {
                return Err(DesignError::DuplicateTranscript(t.name().to_string()));
            }
        }

        let n_required = required.len();
        let n_optional = optional.len();
        let n_excluded = excluded.len();
        let mut transcripts = required;
        transcripts.extend(optional);
        transcripts.extend(excluded);

        Ok(Self {
            transcripts,
            required: (0..n_required).collect(),
            optional: (n_required..n_required + n_optional).collect(),
            excluded: (n_required + n_optional..n_required + n_optional + n_excluded).collect(),
        })
    }

    pub fn all(&self) -> &[Arc<dyn Transcript>] {
        &self.transcripts
    }

    pub fn get(&self, index: usize) -> Option<&dyn Transcript> {
        self.transcripts.get(index).map(AsRef::as_ref)
    }

    pub fn name(&self, index: usize) -> &str {
        self.get(index).map_or("?", |t| t.name())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.transcripts.iter().position(|t| t.name() == name)
    }

    pub fn required(&self) -> &[usize] {
        &self.required
    }

    pub fn optional(&self) -> &[usize] {
        &self.optional
    }

    pub fn excluded(&self) -> &[usize] {
        &self.excluded
    }

    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(t: CodingTranscript) -> Arc<dyn Transcript> {
        Arc::new(t)
    }

    #[test]
    fn test_region_of() {
        let t = CodingTranscript::new("t", "AAACCCGGG", 3, 3);
        assert_eq!(t.region_of(0), Some(RegionTag::Utr5));
        assert_eq!(t.region_of(3), Some(RegionTag::Cds));
        assert_eq!(t.region_of(8), Some(RegionTag::Utr3));
        assert_eq!(t.region_of(9), None);
        assert_eq!(t.utr3_length(), 3);
    }

    #[test]
    fn test_validate_region() {
        let t = CodingTranscript::new("t", "AAACCCGGG", 3, 3);
        assert!(t.validate_region(RegionMask::UTR3, 6, 8));
        assert!(!t.validate_region(RegionMask::UTR3, 5, 8));
        // spanning utr5 -> utr3 needs the CDS too
        assert!(!t.validate_region(RegionMask::UTR5.union(RegionMask::UTR3), 2, 6));
        assert!(t.validate_region(RegionMask::ALL, 0, 8));
        assert!(!t.validate_region(RegionMask::ALL, 0, 9));
    }

    #[test]
    fn test_targetable_sequence() {
        let t = CodingTranscript::new("t", "AAACCCGGG", 3, 3);
        assert_eq!(t.targetable_sequence(RegionMask::CDS), "CCC");
        assert_eq!(
            t.targetable_sequence(RegionMask::UTR5.union(RegionMask::UTR3)),
            "AAAGGG"
        );
    }

    #[test]
    fn test_antisense_window_geometry() {
        // 40 distinct-ish bases so the pairing can be checked position by position
        let seq = "ACGUUGCAAGCUAGCUAGGCUAACGUAGCUAGCAUCGAUC";
        let t = CodingTranscript::utr3_only("t", seq);
        let last = 35;
        let bridge = 6;
        let first = last - (21 + bridge - 4);
        let guide = t
            .antisense_window(last, first, bridge, RegionMask::ALL, 21)
            .unwrap();
        assert_eq!(guide.len(), 21);

        let target: Vec<char> = seq.chars().collect();
        let g: Vec<char> = guide.chars().collect();
        // g1..g11 pair with last, last-1, ...
        for i in 0..11 {
            assert_eq!(g[i], crate::core::sequence::complement(target[last - i]));
        }
        // g12 pairs with last - 7 - bridge
        let g12 = last - 7 - bridge;
        for i in 0..10 {
            assert_eq!(g[11 + i], crate::core::sequence::complement(target[g12 - i]));
        }
    }

    #[test]
    fn test_antisense_window_out_of_range() {
        let t = CodingTranscript::utr3_only("t", "ACGUACGUACGUACGU");
        assert!(t.antisense_window(15, 0, 6, RegionMask::ALL, 21).is_none());
        assert!(t.antisense_window(30, 5, 6, RegionMask::ALL, 21).is_none());
    }

    #[test]
    fn test_transcript_set_requires_two_targets() {
        let one = vec![arc(CodingTranscript::utr3_only("a", "ACGU"))];
        let err = TranscriptSet::new(one, vec![], vec![]).unwrap_err();
        assert_eq!(err, DesignError::InsufficientTargets(1));
    }

    #[test]
    fn test_transcript_set_layout() {
        let set = TranscriptSet::new(
            vec![
                arc(CodingTranscript::utr3_only("a", "ACGU")),
                arc(CodingTranscript::utr3_only("b", "ACGU")),
            ],
            vec![arc(CodingTranscript::utr3_only("c", "ACGU"))],
            vec![arc(CodingTranscript::utr3_only("d", "ACGU"))],
        )
        .unwrap();
        assert_eq!(set.required(), &[0, 1]);
        assert_eq!(set.optional(), &[2]);
        assert_eq!(set.excluded(), &[3]);
        assert_eq!(set.index_of("d"), Some(3));
        assert_eq!(set.name(2), "c");
    }

    #[test]
    fn test_transcript_set_rejects_duplicates() {
        let result = TranscriptSet::new(
            vec![
                arc(CodingTranscript::utr3_only("a", "ACGU")),
                arc(CodingTranscript::utr3_only("a", "ACGU")),
            ],
            vec![],
            vec![],
        );
        assert_eq!(
            result.unwrap_err(),
            DesignError::DuplicateTranscript("a".to_string())
        );
    }
}
