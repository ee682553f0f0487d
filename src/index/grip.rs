use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::core::error::DesignError;
use crate::core::transcript::TranscriptSet;
use crate::core::types::{GripKey, RegionMask, SEED_LENGTH};
use crate::index::kmer::KMerIndex;

/// One occurrence of a grip key on one transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Grip {
    pub transcript: usize,
    pub pos3p: usize,
    pub pos5p: usize,
    pub bridge: usize,
}

/// Spacer between the base facing g8 and the base facing g12.
///
/// `pos3p - (7 - len3p) - (pos5p + len5p)`, with no further offset. Every
/// bridge in the crate goes through this function. `None` when the anchors
/// overlap or are out of order.
#[must_use]
pub fn bridge_length(pos3p: usize, len3p: usize, pos5p: usize, len5p: usize) -> Option<usize> {
    let facing_g8 = (pos3p + len3p).checked_sub(SEED_LENGTH)?;
    facing_g8.checked_sub(pos5p + len5p)
}

/// Every (pos3p, pos5p) pairing of `key` on `transcript` whose bridge lies in
/// `[min_bridge, max_distance]`
pub fn find_grips(
    index3p: &KMerIndex,
    index5p: &KMerIndex,
    key: &GripKey,
    transcript: usize,
    min_bridge: usize,
    max_distance: usize,
) -> Vec<Grip> {
    let positions3p = index3p.positions_of(key.kmer3p(), transcript);
    let positions5p = index5p.positions_of(key.kmer5p(), transcript);
    let mut grips = Vec::new();
    for &pos3p in positions3p {
        for &pos5p in positions5p {
            let Some(bridge) =
                bridge_length(pos3p, key.kmer3p().len(), pos5p, key.kmer5p().len())
            else {
                continue;
            };
            if (min_bridge..=max_distance).contains(&bridge) {
                grips.push(Grip {
                    transcript,
                    pos3p,
                    pos5p,
                    bridge,
                });
            }
        }
    }
    grips
}

/// Grip occurrences across the required, optional and excluded partitions.
///
/// A key survives in the required map only while every required transcript
/// carries at least one occurrence; the optional and excluded maps only hold
/// keys that are also in the required map.
#[derive(Debug, Clone)]
pub struct GripTable {
    required_grips: BTreeMap<GripKey, Vec<Grip>>,
    optional_grips: BTreeMap<GripKey, Vec<Grip>>,
    excluded_grips: BTreeMap<GripKey, Vec<Grip>>,
    required: Vec<usize>,
    min_bridge: usize,
    max_distance: usize,
    region: RegionMask,
}

impl GripTable {
    /// Discover grips from the two anchor indices.
    ///
    /// Anchor k-mers are those present in every required transcript. With
    /// `strict_anchor_exclusion` they must also be absent from every excluded
    /// transcript.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::InsufficientTargets` with fewer than two required
    /// transcripts.
    pub fn build(
        index3p: &KMerIndex,
        index5p: &KMerIndex,
        transcripts: &TranscriptSet,
        min_bridge: usize,
        max_distance: usize,
        strict_anchor_exclusion: bool,
    ) -> Result<Self, DesignError> {
        let required = transcripts.required();
        if required.len() < 2 {
            return Err(DesignError::InsufficientTargets(required.len()));
        }
        let not_in: &[usize] = if strict_anchor_exclusion {
            transcripts.excluded()
        } else {
            &[]
        };

        let anchors3p = index3p.exclusive_kmers(required, not_in);
        let anchors5p = index5p.exclusive_kmers(required, not_in);

        let found: Vec<(GripKey, Vec<Grip>, Vec<Grip>, Vec<Grip>)> = anchors3p
            .par_iter()
            .flat_map_iter(|kmer3p| {
                anchors5p.iter().filter_map(move |kmer5p| {
                    let key = GripKey::new(kmer3p.as_str(), kmer5p.as_str());
                    let collect = |set: &[usize]| -> Vec<Grip> {
                        set.iter()
                            .flat_map(|&t| {
                                find_grips(index3p, index5p, &key, t, min_bridge, max_distance)
                            })
                            .collect()
                    };
                    let on_required = collect(required);
                    let complete = required
                        .iter()
                        .all(|&t| on_required.iter().any(|g| g.transcript == t));
                    if !complete {
                        return None;
                    }
                    let on_optional = collect(transcripts.optional());
                    let on_excluded = collect(transcripts.excluded());
                    Some((key, on_required, on_optional, on_excluded))
                })
            })
            .collect();

        let mut table = Self {
            required_grips: BTreeMap::new(),
            optional_grips: BTreeMap::new(),
            excluded_grips: BTreeMap::new(),
            required: required.to_vec(),
            min_bridge,
            max_distance,
            region: index3p.region(),
        };
        for (key, on_required, on_optional, on_excluded) in found {
            if !on_optional.is_empty() {
                table.optional_grips.insert(key.clone(), on_optional);
            }
            if !on_excluded.is_empty() {
                table.excluded_grips.insert(key.clone(), on_excluded);
            }
            table.required_grips.insert(key, on_required);
        }

        tracing::info!(
            anchors3p = anchors3p.len(),
            anchors5p = anchors5p.len(),
            grips = table.required_grips.len(),
            optional = table.optional_grips.len(),
            excluded = table.excluded_grips.len(),
            "grip discovery complete"
        );
        Ok(table)
    }

    /// Re-apply the all-required-present rule; returns the number of keys dropped
    pub fn retain_complete(&mut self) -> usize {
        let before = self.required_grips.len();
        let required = &self.required;
        self.required_grips.retain(|_, grips| {
            required
                .iter()
                .all(|&t| grips.iter().any(|g| g.transcript == t))
        });
        let kept = &self.required_grips;
        self.optional_grips.retain(|key, _| kept.contains_key(key));
        self.excluded_grips.retain(|key, _| kept.contains_key(key));
        before - self.required_grips.len()
    }

    /// Keep only keys accepted by `keep`, then re-validate completeness
    pub fn retain_keys(&mut self, mut keep: impl FnMut(&GripKey) -> bool) -> usize {
        let before = self.required_grips.len();
        self.required_grips.retain(|key, _| keep(key));
        self.retain_complete();
        before - self.required_grips.len()
    }

    pub fn required_grips(&self) -> &BTreeMap<GripKey, Vec<Grip>> {
        &self.required_grips
    }

    pub fn optional_grips(&self) -> &BTreeMap<GripKey, Vec<Grip>> {
        &self.optional_grips
    }

    pub fn excluded_grips(&self) -> &BTreeMap<GripKey, Vec<Grip>> {
        &self.excluded_grips
    }

    pub fn keys(&self) -> impl Iterator<Item = &GripKey> {
        self.required_grips.keys()
    }

    pub fn contains(&self, key: &GripKey) -> bool {
        self.required_grips.contains_key(key)
    }

    pub fn grip_count(&self) -> usize {
        self.required_grips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.required_grips.is_empty()
    }

    pub fn required(&self) -> &[usize] {
        &self.required
    }

    pub fn min_bridge(&self) -> usize {
        self.min_bridge
    }

    pub fn max_distance(&self) -> usize {
        self.max_distance
    }

    pub fn region(&self) -> RegionMask {
        self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transcript::{CodingTranscript, Transcript};
    use std::sync::Arc;

    /// `AACG` at `pos3p`, `GGUUA` ending `bridge` bases before the base facing g8
    fn site(bridge: usize) -> String {
        // facing_g8 = pos3p + 4 - 7; g12 = facing_g8 - bridge; pos5p = g12 - 5
        let pos5p = 3;
        let pos3p = pos5p + 5 + bridge + 3;
        let mut seq = vec!['C'; pos3p + 4 + 3];
        for (i, c) in "GGUUA".chars().enumerate() {
            seq[pos5p + i] = c;
        }
        for (i, c) in "AACG".chars().enumerate() {
            seq[pos3p + i] = c;
        }
        seq.into_iter().collect()
    }

    fn set(required: &[String], excluded: &[String]) -> TranscriptSet {
        let make = |prefix: &str, seqs: &[String]| -> Vec<Arc<dyn Transcript>> {
            seqs.iter()
                .enumerate()
                .map(|(i, s)| {
                    Arc::new(CodingTranscript::utr3_only(format!("{prefix}{i}"), s.clone()))
                        as Arc<dyn Transcript>
                })
                .collect()
        };
        TranscriptSet::new(make("r", required), vec![], make("x", excluded)).unwrap()
    }

    fn table(set: &TranscriptSet, strict: bool) -> GripTable {
        let exclusions = vec!["CCCC".to_string()];
        let i3 = KMerIndex::build(set.all(), RegionMask::ALL, &exclusions, 4).unwrap();
        let i5 = KMerIndex::build(set.all(), RegionMask::ALL, &exclusions, 5).unwrap();
        GripTable::build(&i3, &i5, set, 4, 15, strict).unwrap()
    }

    #[test]
    fn test_bridge_length_convention() {
        // facing g8 = 30 + 4 - 7 = 27; g12 = 16 + 5 = 21
        assert_eq!(bridge_length(30, 4, 16, 5), Some(6));
        assert_eq!(bridge_length(2, 4, 0, 5), None);
        assert_eq!(bridge_length(10, 7, 0, 3), Some(7));
    }

    #[test]
    fn test_site_helper_bridge() {
        let seq = site(6);
        let pos3p = seq.find("AACG").unwrap();
        let pos5p = seq.find("GGUUA").unwrap();
        assert_eq!(bridge_length(pos3p, 4, pos5p, 5), Some(6));
    }

    #[test]
    fn test_shared_grip_found() {
        let s = set(&[site(6), site(8)], &[]);
        let t = table(&s, false);
        let key = GripKey::new("AACG", "GGUUA");
        let grips = t.required_grips().get(&key).unwrap();
        assert_eq!(grips.len(), 2);
        assert_eq!(grips[0].bridge, 6);
        assert_eq!(grips[1].bridge, 8);
        for grips in t.required_grips().values() {
            for g in grips {
                assert!((4..=15).contains(&g.bridge));
            }
        }
    }

    #[test]
    fn test_bridge_outside_window_drops_key() {
        let s = set(&[site(6), site(20)], &[]);
        let t = table(&s, false);
        assert!(!t.contains(&GripKey::new("AACG", "GGUUA")));
    }

    #[test]
    fn test_excluded_partition() {
        let s = set(&[site(6), site(7)], &[site(9)]);
        let loose = table(&s, false);
        let key = GripKey::new("AACG", "GGUUA");
        assert!(loose.contains(&key));
        assert_eq!(loose.excluded_grips().get(&key).map(Vec::len), Some(1));

        let strict = table(&s, true);
        assert!(!strict.contains(&key));
        assert!(strict.excluded_grips().is_empty());
    }

    #[test]
    fn test_retain_complete_after_shrink() {
        let s = set(&[site(6), site(7)], &[site(9)]);
        let mut t = table(&s, false);
        assert!(t.grip_count() > 0);
        for grips in t.required_grips.values_mut() {
            grips.retain(|g| g.transcript != 1);
        }
        let dropped = t.retain_complete();
        assert!(dropped > 0);
        assert!(t.is_empty());
        assert!(t.excluded_grips().is_empty());
    }

    #[test]
    fn test_requires_two_targets() {
        let s = set(&[site(6), site(7)], &[]);
        let i3 = KMerIndex::build(s.all(), RegionMask::ALL, &[], 4).unwrap();
        let i5 = KMerIndex::build(s.all(), RegionMask::ALL, &[], 5).unwrap();
        let t = GripTable::build(&i3, &i5, &s, 4, 15, false).unwrap();
        assert_eq!(t.required(), &[0, 1]);
        assert_eq!(t.max_distance(), 15);
    }
}
