use serde::{Deserialize, Serialize};

use crate::core::guide::{FoldResult, Guide, GuideOrigin};
use crate::core::transcript::TranscriptSet;

/// One step of a design run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// Guides for every grip occurrence on the required transcripts
    Build,
    /// Substitute the seed tail past the 3' anchor
    ExtendSeeds,
    /// Substitute g12
    ExtendG12,
    /// Substitute the supplementary tail past the 5' anchor
    ExtendSupp,
    /// Carry each sequence onto every other location of its grip
    CrossHybridize,
    /// Fold unfolded guides and drop the infeasible ones
    FoldAndFilter,
    /// Drop sequences lacking a feasible guide on some required transcript
    RemoveIncompleteSequences,
    /// Design on the optional transcripts over the surviving grip keys
    AddOptional,
    /// Drop sequences that bind an excluded transcript
    DropExcludedBinders,
    /// Guides for every grip occurrence in every partition, unfiltered
    Coupling,
    /// Draw candidates from the per-grip generators
    Generate,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Build => "build",
            Self::ExtendSeeds => "extend-seeds",
            Self::ExtendG12 => "extend-g12",
            Self::ExtendSupp => "extend-supp",
            Self::CrossHybridize => "cross-hybridize",
            Self::FoldAndFilter => "fold-and-filter",
            Self::RemoveIncompleteSequences => "remove-incomplete-sequences",
            Self::AddOptional => "add-optional",
            Self::DropExcludedBinders => "drop-excluded-binders",
            Self::Coupling => "coupling",
            Self::Generate => "generate",
        };
        write!(f, "{name}")
    }
}

/// Ordered passes; each listed occurrence runs exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignPlan {
    passes: Vec<Pass>,
}

impl DesignPlan {
    pub fn new(passes: Vec<Pass>) -> Self {
        Self { passes }
    }

    /// Build, extend, cross-hybridize, prune, add optional targets, fold, prune
    pub fn standard() -> Self {
        Self::new(vec![
            Pass::Build,
            Pass::ExtendSeeds,
            Pass::ExtendG12,
            Pass::ExtendSupp,
            Pass::CrossHybridize,
            Pass::RemoveIncompleteSequences,
            Pass::AddOptional,
            Pass::FoldAndFilter,
            Pass::RemoveIncompleteSequences,
        ])
    }

    /// Cross-hybridize, fold and prune twice before adding optional targets
    pub fn two_round() -> Self {
        Self::new(vec![
            Pass::Build,
            Pass::ExtendSeeds,
            Pass::ExtendG12,
            Pass::ExtendSupp,
            Pass::CrossHybridize,
            Pass::FoldAndFilter,
            Pass::RemoveIncompleteSequences,
            Pass::CrossHybridize,
            Pass::FoldAndFilter,
            Pass::RemoveIncompleteSequences,
            Pass::AddOptional,
        ])
    }

    /// Grip coupling only
    pub fn coupling() -> Self {
        Self::new(vec![Pass::Coupling])
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn then(mut self, pass: Pass) -> Self {
        self.passes.push(pass);
        self
    }
}

impl Default for DesignPlan {
    fn default() -> Self {
        Self::standard()
    }
}

/// Counts reported after every pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass: Pass,
    /// Guides, occurrences or candidates inspected
    pub examined: usize,
    pub added: usize,
    pub removed: usize,
    /// Population after the pass
    pub guides: usize,
    pub sequences: usize,
    pub grips: usize,
    pub elapsed_ms: u64,
}

impl PassReport {
    /// True when the pass left no guides behind
    pub fn is_empty(&self) -> bool {
        self.guides == 0
    }
}

/// Population statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSummary {
    pub guides: usize,
    pub sequences: usize,
    pub grips: usize,
    pub unfolded: usize,
    pub average_guides_per_grip: f64,
    pub guides_added: usize,
    pub guides_removed: usize,
}

/// Flat, serializable view of one guide
#[derive(Debug, Clone, Serialize)]
pub struct GuideRecord {
    pub id: String,
    pub origin: GuideOrigin,
    pub sequence: String,
    pub grip: String,
    pub transcript: String,
    pub g2: usize,
    pub g12: usize,
    pub t1: usize,
    pub tlast: usize,
    pub bridge: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fold: Option<FoldResult>,
}

impl GuideRecord {
    pub fn from_guide(guide: &Guide, transcripts: &TranscriptSet) -> Self {
        let anchors = guide.anchors();
        Self {
            id: guide.id().to_string(),
            origin: guide.origin(),
            sequence: guide.sequence().to_string(),
            grip: anchors.grip.to_string(),
            transcript: transcripts.name(anchors.transcript).to_string(),
            g2: anchors.g2,
            g12: anchors.g12,
            t1: anchors.t1,
            tlast: anchors.tlast,
            bridge: anchors.bridge,
            fold: guide.fold_result().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_plan_order() {
        let plan = DesignPlan::standard();
        assert_eq!(plan.passes().first(), Some(&Pass::Build));
        assert_eq!(plan.passes().last(), Some(&Pass::RemoveIncompleteSequences));
        assert_eq!(plan.passes().len(), 9);
    }

    #[test]
    fn test_two_round_prunes_after_each_fold() {
        let passes = DesignPlan::two_round().passes().to_vec();
        for (i, pass) in passes.iter().enumerate() {
            if *pass == Pass::FoldAndFilter {
                assert_eq!(passes.get(i + 1), Some(&Pass::RemoveIncompleteSequences));
            }
        }
        assert_eq!(passes.last(), Some(&Pass::AddOptional));
    }

    #[test]
    fn test_plan_then() {
        let plan = DesignPlan::coupling().then(Pass::DropExcludedBinders);
        assert_eq!(plan.passes(), &[Pass::Coupling, Pass::DropExcludedBinders]);
    }

    #[test]
    fn test_pass_serde_names() {
        let json = serde_json::to_string(&Pass::RemoveIncompleteSequences).unwrap();
        assert_eq!(json, "\"remove_incomplete_sequences\"");
        assert_eq!(Pass::ExtendG12.to_string(), "extend-g12");
    }
}
