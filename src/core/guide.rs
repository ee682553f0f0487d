use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::core::types::{GripKey, GuideId, SEED_END, SUPP_START};

/// Which pass produced a guide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideOrigin {
    /// Antisense of a grip occurrence on a required transcript
    Design,
    /// Seed, g12 or supplementary substitution of an existing guide
    Extension,
    /// Another guide's sequence carried onto this location
    CrossHybrid,
    /// Designed on an optional transcript over a fixed grip key
    Optional,
    /// Coupling-only map over every partition
    Coupling,
}

impl std::fmt::Display for GuideOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Design => "design",
            Self::Extension => "extension",
            Self::CrossHybrid => "cross_hybrid",
            Self::Optional => "optional",
            Self::Coupling => "coupling",
        };
        write!(f, "{name}")
    }
}

/// Where on its target a guide sits.
///
/// `g2` is the target offset facing guide position 2 (last base of the 3'
/// anchor), `g12` the offset facing guide position 12 (first base past the 5'
/// anchor). The window `[t1, tlast]` is what the guide covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Anchors {
    pub grip: GripKey,
    pub transcript: usize,
    pub g2: usize,
    pub g12: usize,
    pub t1: usize,
    pub tlast: usize,
    pub bridge: usize,
}

impl Anchors {
    /// Anchor geometry for one grip occurrence.
    ///
    /// Returns `None` when the window would start before the transcript.
    pub fn from_occurrence(
        grip: GripKey,
        transcript: usize,
        pos3p: usize,
        pos5p: usize,
        bridge: usize,
        guide_length: usize,
    ) -> Option<Self> {
        let tlast = pos3p + grip.kmer3p().len();
        let g2 = tlast.checked_sub(1)?;
        let g12 = pos5p + grip.kmer5p().len();
        let t1 = tlast.checked_sub((guide_length + bridge).checked_sub(4)?)?;
        Some(Self {
            grip,
            transcript,
            g2,
            g12,
            t1,
            tlast,
            bridge,
        })
    }

    pub fn location(&self) -> Location {
        Location {
            transcript: self.transcript,
            g2: self.g2,
            g12: self.g12,
        }
    }
}

/// Transcript plus the two anchor-facing offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub transcript: usize,
    pub g2: usize,
    pub g12: usize,
}

/// Outcome of one oracle call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldResult {
    pub is_folded: bool,
    pub bridge_length_after_fold: usize,
    pub seed_binds: bool,
    pub supp_binds: bool,
}

impl FoldResult {
    /// Result recorded when the oracle produced nothing usable
    pub fn infeasible() -> Self {
        Self {
            is_folded: false,
            bridge_length_after_fold: usize::MAX,
            seed_binds: false,
            supp_binds: false,
        }
    }

    /// Folded, bridge still inside the window, and at least one region binds
    #[must_use]
    pub fn is_feasible(&self, max_distance: usize) -> bool {
        self.is_folded
            && self.bridge_length_after_fold <= max_distance
            && (self.seed_binds || self.supp_binds)
    }
}

/// One candidate duplex.
///
/// Everything but the fold outcome is fixed at construction. The outcome is
/// written at most once; later folds of the same guide return the stored value.
#[derive(Debug, Clone)]
pub struct Guide {
    id: GuideId,
    origin: GuideOrigin,
    sequence: String,
    anchors: Anchors,
    fold: OnceLock<FoldResult>,
}

impl Guide {
    pub fn new(id: GuideId, origin: GuideOrigin, sequence: String, anchors: Anchors) -> Self {
        Self {
            id,
            origin,
            sequence,
            anchors,
            fold: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &GuideId {
        &self.id
    }

    pub fn origin(&self) -> GuideOrigin {
        self.origin
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn anchors(&self) -> &Anchors {
        &self.anchors
    }

    pub fn grip(&self) -> &GripKey {
        &self.anchors.grip
    }

    pub fn transcript(&self) -> usize {
        self.anchors.transcript
    }

    pub fn bridge(&self) -> usize {
        self.anchors.bridge
    }

    pub fn location(&self) -> Location {
        self.anchors.location()
    }

    /// Guide positions 2 through 8
    pub fn seed(&self) -> &str {
        self.sequence.get(1..SEED_END).unwrap_or("")
    }

    /// Guide positions 13 through 17
    pub fn supp(&self) -> &str {
        self.sequence.get(SUPP_START..SUPP_START + 5).unwrap_or("")
    }

    /// Fold through `oracle` unless already folded
    pub fn fold_with(&self, oracle: impl FnOnce(&Guide) -> FoldResult) -> FoldResult {
        *self.fold.get_or_init(|| oracle(self))
    }

    pub fn fold_result(&self) -> Option<&FoldResult> {
        self.fold.get()
    }

    pub fn is_folded(&self) -> bool {
        self.fold.get().is_some()
    }

    /// Folded and feasible under `max_distance`
    pub fn is_feasible(&self, max_distance: usize) -> bool {
        self.fold
            .get()
            .is_some_and(|result| result.is_feasible(max_distance))
    }
}

/// A guide proposed by a parallel worker, numbered when committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideDraft {
    pub root: String,
    pub origin: GuideOrigin,
    pub sequence: String,
    pub anchors: Anchors,
}

impl GuideDraft {
    pub fn into_guide(self, reference: u64) -> Guide {
        Guide::new(
            GuideId::new(self.root, reference),
            self.origin,
            self.sequence,
            self.anchors,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn anchors() -> Anchors {
        Anchors::from_occurrence(GripKey::new("AACG", "GGUUA"), 0, 30, 16, 6, 21).unwrap()
    }

    #[test]
    fn test_anchors_from_occurrence() {
        let a = anchors();
        assert_eq!(a.tlast, 34);
        assert_eq!(a.g2, 33);
        assert_eq!(a.g12, 21);
        assert_eq!(a.t1, 34 - 23);
        // g12 sits bridge bases upstream of the base facing g8
        assert_eq!(a.tlast - 7 - a.bridge, a.g12);
    }

    #[test]
    fn test_anchors_serialize_grip_as_key() {
        let json = serde_json::to_value(anchors()).unwrap();
        assert_eq!(json["grip"], "AACG/GGUUA");
        assert_eq!(json["g12"], 21);
    }

    #[test]
    fn test_anchors_before_start() {
        assert!(Anchors::from_occurrence(GripKey::new("AACG", "GGUUA"), 0, 2, 0, 6, 21).is_none());
    }

    #[test]
    fn test_fold_is_write_once() {
        let guide = GuideDraft {
            root: "r".to_string(),
            origin: GuideOrigin::Design,
            sequence: "CAACGUAGCAUGGUUAACAGC".to_string(),
            anchors: anchors(),
        }
        .into_guide(3);
        assert_eq!(guide.id().to_string(), "r.3");
        assert!(!guide.is_folded());

        let calls = AtomicUsize::new(0);
        let fold = |_: &Guide| {
            calls.fetch_add(1, Ordering::SeqCst);
            FoldResult {
                is_folded: true,
                bridge_length_after_fold: 6,
                seed_binds: true,
                supp_binds: false,
            }
        };
        let first = guide.fold_with(fold);
        let second = guide.fold_with(fold);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(guide.is_feasible(15));
        assert!(!guide.is_feasible(5));
    }

    #[test]
    fn test_infeasible_result() {
        assert!(!FoldResult::infeasible().is_feasible(usize::MAX));
        let unbound = FoldResult {
            is_folded: true,
            bridge_length_after_fold: 6,
            seed_binds: false,
            supp_binds: false,
        };
        assert!(!unbound.is_feasible(15));
    }

    #[test]
    fn test_seed_and_supp_windows() {
        let guide = Guide::new(
            GuideId::new("r", 0),
            GuideOrigin::Design,
            "CAACGUAGCAUGGUUAACAGC".to_string(),
            anchors(),
        );
        assert_eq!(guide.seed(), "AACGUAG");
        assert_eq!(guide.supp(), "GUUAA");
    }
}
