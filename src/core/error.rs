use thiserror::Error;

/// Errors raised by the index, generator and design engine.
///
/// Per-guide and per-candidate failures never surface here: they are recovered
/// locally by excluding the guide. Only configuration problems and structural
/// invariant violations are reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DesignError {
    #[error("Invalid nucleotide '{symbol}' in '{sequence}' (expected A, C, G or U)")]
    InvalidSymbol { symbol: char, sequence: String },

    #[error("Invalid k-mer length {0}: must be between 1 and {max}", max = crate::core::types::MAX_KMER_LENGTH)]
    InvalidKmerLength(usize),

    #[error("Invalid flank '{flank}': expected {expected} bases")]
    InvalidFlank { flank: String, expected: usize },

    #[error("At least 2 required targets are needed, got {0}")]
    InsufficientTargets(usize),

    #[error("Guide id {0} is already in the guide map")]
    DuplicateGuideId(String),

    #[error("Guide indices are out of sync: {0}")]
    IndexDesync(String),

    #[error("Transcript {0} is listed more than once")]
    DuplicateTranscript(String),

    #[error("Unknown transcript: {0}")]
    UnknownTranscript(String),

    #[error("Candidate generator is exhausted")]
    NoMoreCandidates,

    #[error("Folding oracle failed: {0}")]
    OracleFailure(String),
}
