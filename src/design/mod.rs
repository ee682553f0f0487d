//! Guide design over an indexed working set.
//!
//! - [`GuideDesignEngine`]: guide population plus the passes that grow and prune it
//! - [`FoldingOracle`]: the folding capability the engine consumes
//! - [`CandidateGenerator`]: lazy enumeration of candidates around two flanks
//! - [`DesignConfig`]: run parameters, loadable from JSON
//! - [`DesignPlan`], [`PassReport`]: what to run and what each pass did
//!
//! ## Passes
//!
//! A run is a sequence of passes. Each pass proposes changes in parallel from
//! a read-only view of the population and commits them in one step, so reference
//! numbers (and therefore guide ids) depend only on the input and the plan.
//!
//! After any pass that removes guides, grip completeness is restored: a grip
//! without a guide on every required transcript is dropped entirely. Once
//! sequences have been filtered, the same rule applies per sequence.
//!
//! [`GuideDesignEngine`]: engine::GuideDesignEngine
//! [`FoldingOracle`]: oracle::FoldingOracle
//! [`CandidateGenerator`]: generator::CandidateGenerator
//! [`DesignConfig`]: config::DesignConfig
//! [`DesignPlan`]: report::DesignPlan
//! [`PassReport`]: report::PassReport

pub mod config;
pub mod engine;
pub mod generator;
pub mod numbering;
pub mod oracle;
pub mod report;
