//! # duplex-designer
//!
//! A library for designing antisense guides that bind a chosen set of
//! transcripts through a shared pair of anchors.
//!
//! A guide duplex holds its target at two places: the seed (guide positions
//! 2-8) and the supplementary region (positions 13-17), separated on the target
//! by a bridge of unpaired bases. When the same pair of anchor k-mers (a
//! *grip*) occurs in every required transcript with a bridge inside the allowed
//! window, one guide sequence can be tuned to bind them all.
//!
//! `duplex-designer` indexes the transcripts, finds their common grips, designs
//! the antisense for every grip occurrence and then grows and prunes that
//! population pass by pass until every surviving sequence binds each required
//! transcript.
//!
//! ## Features
//!
//! - **Grip discovery**: anchor pairs present in every required transcript
//! - **Extension passes**: seed, g12 and supplementary substitutions
//! - **Cross-hybridization**: each sequence placed on every location of its grip
//! - **Folding filter**: pluggable [`FoldingOracle`] with a stored, write-once result
//! - **Target partitions**: optional transcripts to reach, excluded ones to avoid
//! - **Candidate generation**: lazy enumeration around two frozen flanks
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use duplex_designer::{CodingTranscript, DesignConfig, DesignPlan, GuideDesignEngine, Transcript, TranscriptSet};
//! use duplex_designer::design::oracle::ComplementarityOracle;
//!
//! let tx1: Arc<dyn Transcript> = Arc::new(CodingTranscript::utr3_only("tx1", "UUUGCAAUUCCAGGUUAGAACCCUAGAACGUCGCUC"));
//! let tx2: Arc<dyn Transcript> = Arc::new(CodingTranscript::utr3_only("tx2", "UUAUUUGCAAUUCAAGGUUAGAACACUAGAACGUCGAUC"));
//! let set = TranscriptSet::new(vec![tx1, tx2], vec![], vec![]).unwrap();
//!
//! let mut engine = GuideDesignEngine::new(set, DesignConfig::default()).unwrap();
//! engine.run(&DesignPlan::standard(), &ComplementarityOracle::default()).unwrap();
//!
//! for guide in engine.guides() {
//!     println!("{} {}", guide.id(), guide.sequence());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Transcripts, guides, keys and sequence helpers
//! - [`index`]: K-mer index and grip table
//! - [`design`]: Design engine, passes, generator and folding oracle
//! - [`parsing`]: Transcript table reader
//! - [`cli`]: Command-line interface implementation
//!
//! [`FoldingOracle`]: design::oracle::FoldingOracle

pub mod cli;
pub mod core;
pub mod design;
pub mod index;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::error::DesignError;
pub use core::guide::{FoldResult, Guide, GuideOrigin};
pub use core::transcript::{CodingTranscript, Transcript, TranscriptSet};
pub use core::types::*;
pub use design::config::DesignConfig;
pub use design::engine::GuideDesignEngine;
pub use design::oracle::FoldingOracle;
pub use design::report::{DesignPlan, Pass, PassReport};
