//! The guide map and its passes.
//!
//! Every pass follows the same discipline: workers read the population as it
//! stood when the pass began and return proposals (new [`GuideDraft`]s or ids
//! to drop); the engine then applies them in one single-threaded commit. No
//! worker ever touches `by_id`, `by_grip` or `by_sequence`.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::error::DesignError;
use crate::core::guide::{Anchors, Guide, GuideDraft, GuideOrigin, Location};
use crate::core::sequence::{generate_kmers, reverse_complement, splice, CompositionFilter};
use crate::core::transcript::TranscriptSet;
use crate::core::types::{
    GripKey, GuideId, G12_INDEX, SEED_END, SEED_LENGTH, SUPP_LENGTH, SUPP_START, TARGET_WINDOW,
};
use crate::design::config::DesignConfig;
use crate::design::generator::CandidateGenerator;
use crate::design::numbering::{AtomicReferenceSequence, ReferenceSequence};
use crate::design::oracle::{fold_guide, fold_query, DuplexQuery, FoldingOracle};
use crate::design::report::{DesignPlan, EngineSummary, Pass, PassReport};
use crate::index::grip::{find_grips, Grip, GripTable};
use crate::index::kmer::KMerIndex;

/// Substitution alphabets used when expanding an antisense into all variants
struct ExtensionAlphabets {
    seeds: Vec<String>,
    g12: Vec<String>,
    supps: Vec<String>,
}

/// Guide population over a fixed working set of transcripts.
///
/// Holds three indices kept in lockstep: `by_id` owns every guide, `by_grip`
/// and `by_sequence` group guide ids. A bucket is dropped as soon as it empties.
#[derive(Debug)]
pub struct GuideDesignEngine {
    config: DesignConfig,
    composition: CompositionFilter,
    transcripts: TranscriptSet,
    index3p: KMerIndex,
    index5p: KMerIndex,
    grips: GripTable,
    references: Arc<dyn ReferenceSequence>,
    by_id: BTreeMap<GuideId, Guide>,
    by_grip: BTreeMap<GripKey, BTreeSet<GuideId>>,
    by_sequence: BTreeMap<String, BTreeSet<GuideId>>,
    generators: BTreeMap<GripKey, CandidateGenerator>,
    designs: BTreeMap<GripKey, BTreeSet<String>>,
    sequences_filtered: bool,
    reports: Vec<PassReport>,
    guides_added: usize,
    guides_removed: usize,
}

impl GuideDesignEngine {
    /// Index the working set and discover its grips.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::InsufficientTargets` with fewer than two required
    /// transcripts (before any indexing), `DesignError::InvalidKmerLength` for
    /// anchor lengths the guide geometry cannot hold, and
    /// `DesignError::InvalidSymbol` for transcripts with non-ACGU bases.
    pub fn new(transcripts: TranscriptSet, config: DesignConfig) -> Result<Self, DesignError> {
        if transcripts.required().len() < 2 {
            return Err(DesignError::InsufficientTargets(transcripts.required().len()));
        }
        if config.k3 > SEED_LENGTH {
            return Err(DesignError::InvalidKmerLength(config.k3));
        }
        if config.k5 > SUPP_LENGTH {
            return Err(DesignError::InvalidKmerLength(config.k5));
        }

        let index3p =
            KMerIndex::build(transcripts.all(), config.region, &config.exclusions, config.k3)?;
        let index5p =
            KMerIndex::build(transcripts.all(), config.region, &config.exclusions, config.k5)?;
        let grips = GripTable::build(
            &index3p,
            &index5p,
            &transcripts,
            config.min_bridge,
            config.max_distance,
            config.strict_anchor_exclusion,
        )?;

        Ok(Self {
            composition: config.composition(),
            config,
            transcripts,
            index3p,
            index5p,
            grips,
            references: Arc::new(AtomicReferenceSequence::new()),
            by_id: BTreeMap::new(),
            by_grip: BTreeMap::new(),
            by_sequence: BTreeMap::new(),
            generators: BTreeMap::new(),
            designs: BTreeMap::new(),
            sequences_filtered: false,
            reports: Vec::new(),
            guides_added: 0,
            guides_removed: 0,
        })
    }

    /// Draw reference numbers from `references` instead of a private counter
    #[must_use]
    pub fn with_reference_sequence(mut self, references: Arc<dyn ReferenceSequence>) -> Self {
        self.references = references;
        self
    }

    /// Run every pass of `plan` in order.
    ///
    /// The reference sequence is reset first when the population is empty, so
    /// two runs over the same input produce the same ids.
    ///
    /// # Errors
    ///
    /// Stops at the first pass that reports a structural error; the failing
    /// pass commits nothing.
    pub fn run(
        &mut self,
        plan: &DesignPlan,
        oracle: &dyn FoldingOracle,
    ) -> Result<&[PassReport], DesignError> {
        if self.by_id.is_empty() {
            self.references.reset();
        }
        let first = self.reports.len();
        for &pass in plan.passes() {
            self.apply(pass, oracle)?;
        }
        Ok(&self.reports[first..])
    }

    /// Run a single pass
    ///
    /// # Errors
    ///
    /// See the individual pass methods.
    pub fn apply(
        &mut self,
        pass: Pass,
        oracle: &dyn FoldingOracle,
    ) -> Result<PassReport, DesignError> {
        match pass {
            Pass::Build => self.build_map_ab(),
            Pass::ExtendSeeds => self.extend_seeds(),
            Pass::ExtendG12 => self.extend_g12(),
            Pass::ExtendSupp => self.extend_supp(),
            Pass::CrossHybridize => self.cross_hybridize(),
            Pass::FoldAndFilter => Ok(self.fold_and_filter(oracle)),
            Pass::RemoveIncompleteSequences => Ok(self.remove_incomplete_sequences(oracle)),
            Pass::AddOptional => self.add_optional_transcripts(oracle),
            Pass::DropExcludedBinders => Ok(self.drop_excluded_binders(oracle)),
            Pass::Coupling => self.build_coupling_map(),
            Pass::Generate => self.design_from_generators(oracle),
        }
    }

    // ------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------

    /// Design one guide per grip occurrence on the required transcripts, then
    /// drop grips that did not produce a guide on every required transcript.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::DuplicateGuideId` if the reference sequence repeats.
    pub fn build_map_ab(&mut self) -> Result<PassReport, DesignError> {
        let start = Instant::now();
        let occurrences: Vec<(&GripKey, &Grip)> = self
            .grips
            .required_grips()
            .iter()
            .flat_map(|(key, grips)| grips.iter().map(move |grip| (key, grip)))
            .collect();
        let examined = occurrences.len();

        let drafts: Vec<GuideDraft> = occurrences
            .par_iter()
            .filter_map(|&(key, grip)| self.design_on(key, grip, GuideOrigin::Design))
            .collect();

        let added = self.commit(drafts)?.len();
        let removed = self.remove_incomplete_grips();
        Ok(self.finish(Pass::Build, start, examined, added, removed))
    }

    /// Vary the seed past the 3' anchor (guide positions k3+2 through 8)
    ///
    /// # Errors
    ///
    /// Returns `DesignError::DuplicateGuideId` if the reference sequence repeats.
    pub fn extend_seeds(&mut self) -> Result<PassReport, DesignError> {
        let k3 = self.config.k3;
        let alphabet = extension_kmers(SEED_LENGTH.saturating_sub(k3), &self.config.exclusions);
        self.extend_at(Pass::ExtendSeeds, k3 + 1, &alphabet)
    }

    /// Vary g12
    ///
    /// # Errors
    ///
    /// Returns `DesignError::DuplicateGuideId` if the reference sequence repeats.
    pub fn extend_g12(&mut self) -> Result<PassReport, DesignError> {
        let alphabet = extension_kmers(1, &self.config.exclusions);
        self.extend_at(Pass::ExtendG12, G12_INDEX, &alphabet)
    }

    /// Vary the supplementary region past the 5' anchor (positions k5+13 through 17)
    ///
    /// # Errors
    ///
    /// Returns `DesignError::DuplicateGuideId` if the reference sequence repeats.
    pub fn extend_supp(&mut self) -> Result<PassReport, DesignError> {
        let k5 = self.config.k5;
        let alphabet = extension_kmers(SUPP_LENGTH.saturating_sub(k5), &self.config.exclusions);
        self.extend_at(Pass::ExtendSupp, SUPP_START + k5, &alphabet)
    }

    /// Carry every sequence onto every other location of its grip.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::DuplicateGuideId` if the reference sequence repeats.
    pub fn cross_hybridize(&mut self) -> Result<PassReport, DesignError> {
        let start = Instant::now();
        let (examined, added) = self.cross_hybridize_from(None)?;
        Ok(self.finish(Pass::CrossHybridize, start, examined, added, 0))
    }

    /// Fold every unfolded guide and drop those that are not feasible
    pub fn fold_and_filter(&mut self, oracle: &dyn FoldingOracle) -> PassReport {
        let start = Instant::now();
        let (examined, removed) = self.fold_and_filter_inner(oracle);
        self.finish(Pass::FoldAndFilter, start, examined, 0, removed)
    }

    /// Drop every sequence without a feasible guide on each required transcript
    pub fn remove_incomplete_sequences(&mut self, oracle: &dyn FoldingOracle) -> PassReport {
        let start = Instant::now();
        let (examined, removed) = self.remove_incomplete_sequences_inner(oracle);
        self.finish(Pass::RemoveIncompleteSequences, start, examined, 0, removed)
    }

    /// Extend the population to the optional transcripts.
    ///
    /// Only grip keys already in the population are searched. Every variant of
    /// each antisense is tried and a sequence new to the population is added at
    /// its first location; the new guides are then cross-hybridized within
    /// their grips, folded and filtered.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::DuplicateGuideId` if the reference sequence repeats.
    pub fn add_optional_transcripts(
        &mut self,
        oracle: &dyn FoldingOracle,
    ) -> Result<PassReport, DesignError> {
        let start = Instant::now();
        if self.transcripts.optional().is_empty() || self.by_grip.is_empty() {
            return Ok(self.finish(Pass::AddOptional, start, 0, 0, 0));
        }

        let alphabets = ExtensionAlphabets {
            seeds: generate_kmers(SEED_LENGTH.saturating_sub(self.config.k3), &self.config.exclusions),
            g12: generate_kmers(1, &self.config.exclusions),
            supps: generate_kmers(SUPP_LENGTH.saturating_sub(self.config.k5), &self.config.exclusions),
        };
        let work: Vec<(&GripKey, usize)> = self
            .by_grip
            .keys()
            .flat_map(|key| self.transcripts.optional().iter().map(move |&t| (key, t)))
            .collect();
        let examined = work.len();

        let proposals: Vec<GuideDraft> = work
            .par_iter()
            .flat_map_iter(|&(key, transcript)| self.optional_designs(key, transcript, &alphabets))
            .collect();

        let mut seen = HashSet::new();
        let drafts: Vec<GuideDraft> = proposals
            .into_iter()
            .filter(|d| !self.by_sequence.contains_key(&d.sequence) && seen.insert(d.sequence.clone()))
            .collect();

        let new_ids: BTreeSet<GuideId> = self.commit(drafts)?.into_iter().collect();
        debug!(new = new_ids.len(), "optional transcript designs committed");
        let crossed = match self.cross_hybridize_from(Some(&new_ids)) {
            Ok((_, crossed)) => crossed,
            Err(err) => {
                self.rollback(&new_ids);
                return Err(err);
            }
        };
        let (_, infeasible) = self.fold_and_filter_inner(oracle);
        let (_, incomplete) = self.remove_incomplete_sequences_inner(oracle);

        Ok(self.finish(
            Pass::AddOptional,
            start,
            examined,
            new_ids.len() + crossed,
            infeasible + incomplete,
        ))
    }

    /// Drop every sequence that binds an excluded transcript
    pub fn drop_excluded_binders(&mut self, oracle: &dyn FoldingOracle) -> PassReport {
        let start = Instant::now();
        let examined = self.by_sequence.len();
        let binders = self.excluded_binders(oracle);
        let doomed: Vec<GuideId> = binders
            .iter()
            .filter_map(|sequence| self.by_sequence.get(sequence))
            .flat_map(|ids| ids.iter().cloned())
            .collect();
        let mut removed = self.remove_guides(doomed);
        removed += self.enforce_completeness();
        self.finish(Pass::DropExcludedBinders, start, examined, 0, removed)
    }

    /// Design a guide on every grip occurrence of every partition, with no
    /// completeness or folding filter
    ///
    /// # Errors
    ///
    /// Returns `DesignError::DuplicateGuideId` if the reference sequence repeats.
    pub fn build_coupling_map(&mut self) -> Result<PassReport, DesignError> {
        let start = Instant::now();
        let occurrences: Vec<(&GripKey, &Grip)> = self
            .grips
            .required_grips()
            .iter()
            .chain(self.grips.optional_grips())
            .chain(self.grips.excluded_grips())
            .flat_map(|(key, grips)| grips.iter().map(move |grip| (key, grip)))
            .collect();
        let examined = occurrences.len();

        let drafts: Vec<GuideDraft> = occurrences
            .par_iter()
            .filter_map(|&(key, grip)| self.design_on(key, grip, GuideOrigin::Coupling))
            .collect();

        let added = self.commit(drafts)?.len();
        Ok(self.finish(Pass::Coupling, start, examined, added, 0))
    }

    /// Draw up to `generator_budget` candidates from each grip's generator and
    /// keep those feasible on every required transcript over a 31-nt window.
    ///
    /// Generators are created on first use and keep their position between
    /// calls. A candidate that fails on any required transcript has its seed
    /// registered with the generator so no later candidate repeats it. Accepted
    /// sequences accumulate in [`GuideDesignEngine::designs`].
    ///
    /// # Errors
    ///
    /// Returns `DesignError::InvalidFlank` when the anchor lengths do not match
    /// the generator template.
    pub fn design_from_generators(
        &mut self,
        oracle: &dyn FoldingOracle,
    ) -> Result<PassReport, DesignError> {
        let start = Instant::now();
        if self.generators.is_empty() {
            self.generators = self.generator_pool()?;
        }

        let budget = self.config.generator_budget;
        let grips = &self.grips;
        let transcripts = &self.transcripts;
        let config = &self.config;
        let required = transcripts.required().len();

        let outcomes: Vec<(GripKey, usize, BTreeSet<String>)> = self
            .generators
            .par_iter_mut()
            .map(|(key, generator)| {
                let mut accepted = BTreeSet::new();
                let Some(occurrences) = grips.required_grips().get(key) else {
                    return (key.clone(), 0, accepted);
                };
                let mut drawn = 0;
                while drawn < budget {
                    let Ok(candidate) = generator.next_candidate() else {
                        break;
                    };
                    drawn += 1;
                    let mut targeted = BTreeSet::new();
                    for grip in occurrences {
                        if targeted.contains(&grip.transcript) {
                            continue;
                        }
                        if window_binds(oracle, transcripts, config, key, grip, &candidate) {
                            targeted.insert(grip.transcript);
                            if targeted.len() == required {
                                break;
                            }
                        }
                    }
                    if targeted.len() == required {
                        accepted.insert(candidate);
                    } else if let Some(seed) = candidate.get(1..SEED_END) {
                        generator.avoid_seed(seed);
                    }
                }
                debug!(grip = %key, drawn, accepted = accepted.len(), "generator advanced");
                (key.clone(), drawn, accepted)
            })
            .collect();

        let mut examined = 0;
        let mut added = 0;
        for (key, drawn, accepted) in outcomes {
            examined += drawn;
            if accepted.is_empty() {
                continue;
            }
            let designs = self.designs.entry(key).or_default();
            let before = designs.len();
            designs.extend(accepted);
            added += designs.len() - before;
        }
        Ok(self.finish(Pass::Generate, start, examined, added, 0))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Sequences with a feasible duplex on any excluded transcript.
    ///
    /// Each sequence is placed on every occurrence of its grip key in every
    /// excluded transcript and folded there.
    pub fn excluded_binders(&self, oracle: &dyn FoldingOracle) -> BTreeSet<String> {
        let excluded = self.transcripts.excluded();
        if excluded.is_empty() {
            return BTreeSet::new();
        }
        self.by_sequence
            .par_iter()
            .filter(|(sequence, ids)| {
                let keys: BTreeSet<&GripKey> = ids
                    .iter()
                    .filter_map(|id| self.by_id.get(id))
                    .map(Guide::grip)
                    .collect();
                keys.into_iter().any(|key| {
                    excluded
                        .iter()
                        .any(|&t| self.binds_on(oracle, sequence.as_str(), key, t))
                })
            })
            .map(|(sequence, _)| sequence.clone())
            .collect()
    }

    /// Verify that `by_grip` and `by_sequence` reach exactly the guides of `by_id`.
    ///
    /// # Errors
    ///
    /// Returns `DesignError::IndexDesync` describing the first mismatch.
    pub fn check_consistency(&self) -> Result<(), DesignError> {
        let mut via_grips = BTreeSet::new();
        for (key, ids) in &self.by_grip {
            if ids.is_empty() {
                return Err(DesignError::IndexDesync(format!("grip {key} has an empty bucket")));
            }
            for id in ids {
                match self.by_id.get(id) {
                    Some(guide) if guide.grip() == key => {}
                    _ => {
                        return Err(DesignError::IndexDesync(format!(
                            "{id} is filed under grip {key}"
                        )))
                    }
                }
                if !via_grips.insert(id) {
                    return Err(DesignError::IndexDesync(format!("{id} is under two grips")));
                }
            }
        }

        let mut via_sequences = BTreeSet::new();
        for (sequence, ids) in &self.by_sequence {
            if ids.is_empty() {
                return Err(DesignError::IndexDesync(format!(
                    "sequence {sequence} has an empty bucket"
                )));
            }
            for id in ids {
                match self.by_id.get(id) {
                    Some(guide) if guide.sequence() == sequence => {}
                    _ => {
                        return Err(DesignError::IndexDesync(format!(
                            "{id} is filed under sequence {sequence}"
                        )))
                    }
                }
                if !via_sequences.insert(id) {
                    return Err(DesignError::IndexDesync(format!("{id} is under two sequences")));
                }
            }
        }

        if via_grips.len() != self.by_id.len() || via_sequences.len() != self.by_id.len() {
            return Err(DesignError::IndexDesync(format!(
                "{} guides, {} reachable by grip, {} reachable by sequence",
                self.by_id.len(),
                via_grips.len(),
                via_sequences.len()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn sequence_count(&self) -> usize {
        self.by_sequence.len()
    }

    pub fn grip_count(&self) -> usize {
        self.by_grip.len()
    }

    pub fn unfolded_count(&self) -> usize {
        self.by_id.values().filter(|g| !g.is_folded()).count()
    }

    pub fn average_guides_per_grip(&self) -> f64 {
        if self.by_grip.is_empty() {
            return 0.0;
        }
        let total: usize = self.by_grip.values().map(BTreeSet::len).sum();
        #[allow(clippy::cast_precision_loss)]
        {
            total as f64 / self.by_grip.len() as f64
        }
    }

    pub fn guides_added(&self) -> usize {
        self.guides_added
    }

    pub fn guides_removed(&self) -> usize {
        self.guides_removed
    }

    pub fn summary(&self) -> EngineSummary {
        EngineSummary {
            guides: self.len(),
            sequences: self.sequence_count(),
            grips: self.grip_count(),
            unfolded: self.unfolded_count(),
            average_guides_per_grip: self.average_guides_per_grip(),
            guides_added: self.guides_added,
            guides_removed: self.guides_removed,
        }
    }

    pub fn get(&self, id: &GuideId) -> Option<&Guide> {
        self.by_id.get(id)
    }

    /// Guides in id order
    pub fn guides(&self) -> impl Iterator<Item = &Guide> {
        self.by_id.values()
    }

    pub fn grip_keys(&self) -> impl Iterator<Item = &GripKey> {
        self.by_grip.keys()
    }

    pub fn sequences(&self) -> impl Iterator<Item = &str> {
        self.by_sequence.keys().map(String::as_str)
    }

    pub fn guides_for_grip(&self, key: &GripKey) -> Vec<&Guide> {
        self.bucket(self.by_grip.get(key))
    }

    pub fn guides_for_sequence(&self, sequence: &str) -> Vec<&Guide> {
        self.bucket(self.by_sequence.get(sequence))
    }

    pub fn designs(&self) -> &BTreeMap<GripKey, BTreeSet<String>> {
        &self.designs
    }

    pub fn reports(&self) -> &[PassReport] {
        &self.reports
    }

    pub fn transcripts(&self) -> &TranscriptSet {
        &self.transcripts
    }

    pub fn grip_table(&self) -> &GripTable {
        &self.grips
    }

    pub fn config(&self) -> &DesignConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Commit phase
    // ------------------------------------------------------------------

    /// Number and insert a single draft
    ///
    /// # Errors
    ///
    /// Returns `DesignError::DuplicateGuideId` if the drawn id is taken.
    pub fn add_guide(&mut self, draft: GuideDraft) -> Result<Option<GuideId>, DesignError> {
        Ok(self.commit(vec![draft])?.into_iter().next())
    }

    /// Remove a guide from all three indices
    pub fn remove_guide(&mut self, id: &GuideId) -> Option<Guide> {
        let guide = self.by_id.remove(id)?;
        if let Some(bucket) = self.by_grip.get_mut(guide.grip()) {
            bucket.remove(id);
            if bucket.is_empty() {
                self.by_grip.remove(guide.grip());
            }
        }
        if let Some(bucket) = self.by_sequence.get_mut(guide.sequence()) {
            bucket.remove(id);
            if bucket.is_empty() {
                self.by_sequence.remove(guide.sequence());
            }
        }
        self.guides_removed += 1;
        Some(guide)
    }

    /// Number drafts in order and insert them.
    ///
    /// Drafts whose sequence already sits at the same location are skipped
    /// without drawing a number. Ids are checked before anything is inserted,
    /// so a collision leaves the population untouched.
    fn commit(&mut self, drafts: Vec<GuideDraft>) -> Result<Vec<GuideId>, DesignError> {
        let mut staged: Vec<Guide> = Vec::new();
        let mut staged_sites: HashSet<(String, Location)> = HashSet::new();
        let mut staged_ids: HashSet<GuideId> = HashSet::new();

        for draft in drafts {
            let location = draft.anchors.location();
            if self.has_duplex(&draft.sequence, location)
                || !staged_sites.insert((draft.sequence.clone(), location))
            {
                continue;
            }
            let guide = draft.into_guide(self.references.next_reference());
            if self.by_id.contains_key(guide.id()) || !staged_ids.insert(guide.id().clone()) {
                return Err(DesignError::DuplicateGuideId(guide.id().to_string()));
            }
            staged.push(guide);
        }

        let ids: Vec<GuideId> = staged.iter().map(|g| g.id().clone()).collect();
        for guide in staged {
            self.insert_guide(guide);
        }
        Ok(ids)
    }

    fn insert_guide(&mut self, guide: Guide) {
        let id = guide.id().clone();
        self.by_grip
            .entry(guide.grip().clone())
            .or_default()
            .insert(id.clone());
        self.by_sequence
            .entry(guide.sequence().to_string())
            .or_default()
            .insert(id.clone());
        self.by_id.insert(id, guide);
        self.guides_added += 1;
    }

    /// Take back guides committed earlier in a pass that then failed
    fn rollback(&mut self, ids: &BTreeSet<GuideId>) {
        let undone = ids
            .iter()
            .filter(|id| self.remove_guide(id).is_some())
            .count();
        self.guides_added -= undone;
        self.guides_removed -= undone;
    }

    fn remove_guides(&mut self, ids: impl IntoIterator<Item = GuideId>) -> usize {
        ids.into_iter()
            .filter(|id| self.remove_guide(id).is_some())
            .count()
    }

    fn has_duplex(&self, sequence: &str, location: Location) -> bool {
        self.by_sequence.get(sequence).is_some_and(|ids| {
            ids.iter()
                .filter_map(|id| self.by_id.get(id))
                .any(|g| g.location() == location)
        })
    }

    // ------------------------------------------------------------------
    // Completeness
    // ------------------------------------------------------------------

    /// Drop every grip lacking a guide on some required transcript
    fn remove_incomplete_grips(&mut self) -> usize {
        let doomed: Vec<GuideId> = self
            .by_grip
            .values()
            .filter(|ids| !self.covers_required(ids))
            .flat_map(|ids| ids.iter().cloned())
            .collect();
        let removed = self.remove_guides(doomed);
        let by_grip = &self.by_grip;
        self.grips.retain_keys(|key| by_grip.contains_key(key));
        removed
    }

    /// Drop every sequence lacking a guide on some required transcript
    fn remove_uncovered_sequences(&mut self) -> usize {
        let doomed: Vec<GuideId> = self
            .by_sequence
            .values()
            .filter(|ids| !self.covers_required(ids))
            .flat_map(|ids| ids.iter().cloned())
            .collect();
        self.remove_guides(doomed)
    }

    /// Re-apply grip completeness, and sequence completeness once sequences
    /// have been filtered, until neither removes anything
    fn enforce_completeness(&mut self) -> usize {
        let mut removed = 0;
        loop {
            let mut round = self.remove_incomplete_grips();
            if self.sequences_filtered {
                round += self.remove_uncovered_sequences();
            }
            removed += round;
            if round == 0 {
                return removed;
            }
        }
    }

    fn covers_required(&self, ids: &BTreeSet<GuideId>) -> bool {
        let covered: HashSet<usize> = ids
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .map(Guide::transcript)
            .collect();
        self.transcripts
            .required()
            .iter()
            .all(|t| covered.contains(t))
    }

    // ------------------------------------------------------------------
    // Pass internals
    // ------------------------------------------------------------------

    fn fold_and_filter_inner(&mut self, oracle: &dyn FoldingOracle) -> (usize, usize) {
        let examined = self.unfolded_count();
        let max_distance = self.config.max_distance;
        let transcripts = &self.transcripts;
        let infeasible: Vec<GuideId> = self
            .by_id
            .par_iter()
            .filter_map(|(id, guide)| {
                let result = fold_guide(oracle, transcripts, guide);
                (!result.is_feasible(max_distance)).then(|| id.clone())
            })
            .collect();
        let mut removed = self.remove_guides(infeasible);
        removed += self.enforce_completeness();
        (examined, removed)
    }

    fn remove_incomplete_sequences_inner(&mut self, oracle: &dyn FoldingOracle) -> (usize, usize) {
        let examined = self.by_sequence.len();
        let max_distance = self.config.max_distance;
        let transcripts = &self.transcripts;
        let by_id = &self.by_id;
        let doomed: Vec<GuideId> = self
            .by_sequence
            .par_iter()
            .filter(|(_, ids)| {
                !transcripts.required().iter().all(|&t| {
                    ids.iter()
                        .filter_map(|id| by_id.get(id))
                        .filter(|g| g.transcript() == t)
                        .any(|g| fold_guide(oracle, transcripts, g).is_feasible(max_distance))
                })
            })
            .flat_map_iter(|(_, ids)| ids.iter().cloned())
            .collect();
        let mut removed = self.remove_guides(doomed);
        self.sequences_filtered = true;
        removed += self.enforce_completeness();
        (examined, removed)
    }

    fn extend_at(
        &mut self,
        pass: Pass,
        index: usize,
        alphabet: &[String],
    ) -> Result<PassReport, DesignError> {
        let start = Instant::now();
        let this = &*self;
        let guides: Vec<&Guide> = this.by_id.values().collect();
        let examined = guides.len();
        let drafts: Vec<GuideDraft> = guides
            .par_iter()
            .flat_map_iter(|&guide| {
                alphabet
                    .iter()
                    .filter_map(move |kmer| this.mutate(guide, index, kmer))
            })
            .collect();
        let added = self.commit(drafts)?.len();
        Ok(self.finish(pass, start, examined, added, 0))
    }

    fn mutate(&self, guide: &Guide, index: usize, kmer: &str) -> Option<GuideDraft> {
        let current = guide.sequence().get(index..index + kmer.len())?;
        if kmer.is_empty() || current == kmer {
            return None;
        }
        let sequence = splice(guide.sequence(), index, kmer);
        if !self.composition.accepts(&sequence) {
            return None;
        }
        Some(GuideDraft {
            root: guide.id().root().to_string(),
            origin: GuideOrigin::Extension,
            sequence,
            anchors: guide.anchors().clone(),
        })
    }

    /// Cross-hybridize within each grip; with `sources`, only those guides'
    /// sequences are carried
    fn cross_hybridize_from(
        &mut self,
        sources: Option<&BTreeSet<GuideId>>,
    ) -> Result<(usize, usize), DesignError> {
        let buckets: Vec<(&GripKey, Vec<&Guide>)> = self
            .by_grip
            .iter()
            .map(|(key, ids)| (key, ids.iter().filter_map(|id| self.by_id.get(id)).collect()))
            .collect();
        let drafts: Vec<GuideDraft> = buckets
            .par_iter()
            .flat_map_iter(|(key, bucket)| {
                let proposals = self.cross_proposals(bucket, sources);
                debug!(grip = %key, guides = bucket.len(), proposals = proposals.len(), "cross-hybridized grip");
                proposals
            })
            .collect();
        let examined = drafts.len();
        let added = self.commit(drafts)?.len();
        Ok((examined, added))
    }

    fn cross_proposals(
        &self,
        bucket: &[&Guide],
        sources: Option<&BTreeSet<GuideId>>,
    ) -> Vec<GuideDraft> {
        let mut drafts = Vec::new();
        for source in bucket
            .iter()
            .filter(|g| sources.map_or(true, |s| s.contains(g.id())))
        {
            let mut locations = HashSet::from([source.location()]);
            for other in bucket {
                let location = other.location();
                if !locations.insert(location) {
                    continue;
                }
                drafts.push(GuideDraft {
                    root: GuideId::cross_root(
                        source.id(),
                        self.transcripts.name(location.transcript),
                        location.g2,
                        location.g12,
                    ),
                    origin: GuideOrigin::CrossHybrid,
                    sequence: source.sequence().to_string(),
                    anchors: other.anchors().clone(),
                });
            }
        }
        drafts
    }

    /// Anchors and antisense for one grip occurrence
    fn site(&self, key: &GripKey, grip: &Grip) -> Option<(Anchors, String)> {
        let guide_length = self.config.guide_length;
        let transcript = self.transcripts.get(grip.transcript)?;
        let anchors = Anchors::from_occurrence(
            key.clone(),
            grip.transcript,
            grip.pos3p,
            grip.pos5p,
            grip.bridge,
            guide_length,
        )?;
        let antisense = transcript.antisense_window(
            anchors.tlast,
            anchors.t1,
            grip.bridge,
            self.config.region,
            guide_length,
        )?;
        Some((anchors, antisense))
    }

    fn design_on(&self, key: &GripKey, grip: &Grip, origin: GuideOrigin) -> Option<GuideDraft> {
        let (anchors, sequence) = self.site(key, grip)?;
        if !self.composition.accepts(&sequence) {
            return None;
        }
        Some(GuideDraft {
            root: GuideId::grip_root(
                key,
                self.transcripts.name(grip.transcript),
                grip.pos3p,
                grip.pos5p,
            ),
            origin,
            sequence,
            anchors,
        })
    }

    fn optional_designs(
        &self,
        key: &GripKey,
        transcript: usize,
        alphabets: &ExtensionAlphabets,
    ) -> Vec<GuideDraft> {
        let grips = find_grips(
            &self.index3p,
            &self.index5p,
            key,
            transcript,
            self.config.min_bridge,
            self.config.max_distance,
        );
        let mut drafts = Vec::new();
        for grip in grips {
            let Some((anchors, antisense)) = self.site(key, &grip) else {
                continue;
            };
            let root = GuideId::grip_root(
                key,
                self.transcripts.name(transcript),
                grip.pos3p,
                grip.pos5p,
            );
            for sequence in self.all_extensions(&antisense, alphabets) {
                if self.composition.accepts(&sequence) {
                    drafts.push(GuideDraft {
                        root: root.clone(),
                        origin: GuideOrigin::Optional,
                        sequence,
                        anchors: anchors.clone(),
                    });
                }
            }
        }
        drafts
    }

    /// Every seed x g12 x supplementary variant of `antisense`, anchors kept
    fn all_extensions(&self, antisense: &str, alphabets: &ExtensionAlphabets) -> BTreeSet<String> {
        let k3 = self.config.k3;
        let k5 = self.config.k5;
        let parts = (
            antisense.get(..=k3),
            antisense.get(SEED_END..G12_INDEX),
            antisense.get(SUPP_START..SUPP_START + k5),
            antisense.get(SUPP_START + SUPP_LENGTH..),
        );
        let (Some(head), Some(central), Some(supp_head), Some(tail)) = parts else {
            return BTreeSet::new();
        };

        let mut variants = BTreeSet::new();
        for seed in &alphabets.seeds {
            for g12 in &alphabets.g12 {
                for supp in &alphabets.supps {
                    variants.insert(format!("{head}{seed}{central}{g12}{supp_head}{supp}{tail}"));
                }
            }
        }
        variants
    }

    /// True when `sequence` folds feasibly on some occurrence of `key` in `transcript`
    fn binds_on(
        &self,
        oracle: &dyn FoldingOracle,
        sequence: &str,
        key: &GripKey,
        transcript: usize,
    ) -> bool {
        let Some(target) = self.transcripts.get(transcript) else {
            return false;
        };
        find_grips(
            &self.index3p,
            &self.index5p,
            key,
            transcript,
            self.config.min_bridge,
            self.config.max_distance,
        )
        .iter()
        .any(|grip| {
            let Some(anchors) = Anchors::from_occurrence(
                key.clone(),
                transcript,
                grip.pos3p,
                grip.pos5p,
                grip.bridge,
                self.config.guide_length,
            ) else {
                return false;
            };
            let query = DuplexQuery {
                guide: sequence,
                target,
                anchors: &anchors,
            };
            fold_query(oracle, &query).is_feasible(self.config.max_distance)
        })
    }

    fn generator_pool(&self) -> Result<BTreeMap<GripKey, CandidateGenerator>, DesignError> {
        self.grips
            .keys()
            .map(|key| {
                let generator = CandidateGenerator::new(
                    &reverse_complement(key.kmer3p()),
                    &reverse_complement(key.kmer5p()),
                    self.composition.clone(),
                )?;
                Ok((key.clone(), generator))
            })
            .collect()
    }

    fn bucket(&self, ids: Option<&BTreeSet<GuideId>>) -> Vec<&Guide> {
        ids.map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    fn finish(
        &mut self,
        pass: Pass,
        start: Instant,
        examined: usize,
        added: usize,
        removed: usize,
    ) -> PassReport {
        let report = PassReport {
            pass,
            examined,
            added,
            removed,
            guides: self.by_id.len(),
            sequences: self.by_sequence.len(),
            grips: self.by_grip.len(),
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            pass = %pass,
            examined,
            added,
            removed,
            guides = report.guides,
            sequences = report.sequences,
            grips = report.grips,
            elapsed_ms = report.elapsed_ms,
            "pass complete"
        );
        if report.is_empty() && removed > 0 {
            warn!(pass = %pass, removed, "no guides survived");
        }
        self.reports.push(report.clone());
        report
    }
}

/// Substitution k-mers of length `k`; nothing when there is no room to vary
fn extension_kmers(k: usize, exclusions: &[String]) -> Vec<String> {
    if k == 0 {
        return Vec::new();
    }
    generate_kmers(k, exclusions)
}

/// Fold `candidate` on a 31-nt window ending at the grip's last base
fn window_binds(
    oracle: &dyn FoldingOracle,
    transcripts: &TranscriptSet,
    config: &DesignConfig,
    key: &GripKey,
    grip: &Grip,
    candidate: &str,
) -> bool {
    let Some(target) = transcripts.get(grip.transcript) else {
        return false;
    };
    let Some(mut anchors) = Anchors::from_occurrence(
        key.clone(),
        grip.transcript,
        grip.pos3p,
        grip.pos5p,
        grip.bridge,
        config.guide_length,
    ) else {
        return false;
    };
    let Some(t1) = anchors.tlast.checked_sub(TARGET_WINDOW - 1) else {
        return false;
    };
    if !target.in_transcript(t1, anchors.tlast) {
        return false;
    }
    anchors.t1 = t1;
    let query = DuplexQuery {
        guide: candidate,
        target,
        anchors: &anchors,
    };
    fold_query(oracle, &query).is_feasible(config.max_distance)
}
