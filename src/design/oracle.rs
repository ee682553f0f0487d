//! The folding capability the engine consumes.
//!
//! The engine never folds anything itself. It hands a [`DuplexQuery`] to a
//! [`FoldingOracle`] supplied by the caller and records the [`FoldResult`].

use thiserror::Error;

use crate::core::error::DesignError;
use crate::core::guide::{Anchors, FoldResult, Guide};
use crate::core::sequence::{pairing, Pairing};
use crate::core::transcript::{Transcript, TranscriptSet};
use crate::core::types::{SEED_LENGTH, SUPP_START};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct OracleError(pub String);

impl From<OracleError> for DesignError {
    fn from(err: OracleError) -> Self {
        DesignError::OracleFailure(err.0)
    }
}

/// One guide placed on one target site
#[derive(Debug, Clone, Copy)]
pub struct DuplexQuery<'a> {
    pub guide: &'a str,
    pub target: &'a dyn Transcript,
    pub anchors: &'a Anchors,
}

impl<'a> DuplexQuery<'a> {
    /// Target bases `[t1, tlast]`
    pub fn target_window(&self) -> Option<&'a str> {
        self.target.substring(self.anchors.t1, self.anchors.tlast + 1)
    }
}

/// Synchronous duplex folding.
///
/// Called from worker threads, at most once per guide.
pub trait FoldingOracle: Send + Sync {
    /// Fold `query`
    ///
    /// # Errors
    ///
    /// Returns `OracleError` when no usable structure could be produced. The
    /// engine records such a guide as infeasible.
    fn fold(&self, query: &DuplexQuery<'_>) -> Result<FoldResult, OracleError>;
}

/// Fold `guide` against its own transcript, storing the outcome in the guide
pub fn fold_guide(
    oracle: &dyn FoldingOracle,
    transcripts: &TranscriptSet,
    guide: &Guide,
) -> FoldResult {
    guide.fold_with(|g| {
        let Some(target) = transcripts.get(g.transcript()) else {
            return FoldResult::infeasible();
        };
        let query = DuplexQuery {
            guide: g.sequence(),
            target,
            anchors: g.anchors(),
        };
        fold_query(oracle, &query)
    })
}

/// Fold a query that is not backed by a stored guide
pub fn fold_query(oracle: &dyn FoldingOracle, query: &DuplexQuery<'_>) -> FoldResult {
    match oracle.fold(query) {
        Ok(result) => result,
        Err(err) => {
            tracing::debug!(guide = query.guide, error = %err, "fold failed, marking infeasible");
            FoldResult::infeasible()
        }
    }
}

/// Base-pairing stand-in for a thermodynamic folder.
///
/// The seed (g2-g8) binds when all seven positions pair with the target with
/// at most one G:U wobble. The supplementary region (g13-g16) binds when at
/// least `min_binding` of its positions form Watson-Crick pairs. The bridge is
/// reported unchanged.
#[derive(Debug, Clone)]
pub struct ComplementarityOracle {
    pub min_binding: usize,
    pub max_wobbles: usize,
}

impl ComplementarityOracle {
    pub fn new(min_binding: usize) -> Self {
        Self {
            min_binding,
            max_wobbles: 1,
        }
    }
}

impl Default for ComplementarityOracle {
    fn default() -> Self {
        Self::new(3)
    }
}

impl FoldingOracle for ComplementarityOracle {
    fn fold(&self, query: &DuplexQuery<'_>) -> Result<FoldResult, OracleError> {
        let guide: Vec<char> = query.guide.chars().collect();
        let target: Vec<char> = query.target.sequence().chars().collect();
        let anchors = query.anchors;

        if guide.len() < SUPP_START + 4 {
            return Err(OracleError(format!(
                "guide of {} nt is too short to fold",
                guide.len()
            )));
        }
        if anchors.tlast >= target.len() || anchors.tlast < SEED_LENGTH || anchors.g12 < 4 {
            return Err(OracleError(format!(
                "site {}..{} lies outside {}",
                anchors.t1,
                anchors.tlast,
                query.target.name()
            )));
        }

        let mut wobbles = 0;
        let mut seed_paired = true;
        for i in 1..=SEED_LENGTH {
            match pairing(guide[i], target[anchors.tlast - i]) {
                Pairing::WatsonCrick => {}
                Pairing::Wobble => wobbles += 1,
                Pairing::Mismatch => seed_paired = false,
            }
        }
        let seed_binds = seed_paired && wobbles <= self.max_wobbles;

        let supp_pairs = (1..=4)
            .filter(|&j| {
                pairing(guide[SUPP_START - 1 + j], target[anchors.g12 - j]) == Pairing::WatsonCrick
            })
            .count();
        let supp_binds = supp_pairs >= self.min_binding;

        Ok(FoldResult {
            is_folded: true,
            bridge_length_after_fold: anchors.bridge,
            seed_binds,
            supp_binds,
        })
    }
}
