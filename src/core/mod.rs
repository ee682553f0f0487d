//! Core data types for guide duplex design.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`Transcript`]: The target sequence abstraction consumed by the index and engine
//! - [`CodingTranscript`]: A concrete transcript with 5'UTR / CDS / 3'UTR boundaries
//! - [`Guide`]: A candidate duplex designed against one transcript location
//! - [`GripKey`], [`GuideId`]: Opaque keys with documented construction rules
//! - [`RegionTag`], [`RegionMask`]: Sub-region selection for indexing
//! - [`DesignError`]: The error taxonomy shared by every component
//!
//! ## Guide Geometry
//!
//! Positions are 1-based along the guide (g1 is the 5' end of the guide) and
//! 0-based along the target. The guide's 5' end pairs with the target's 3' side:
//!
//! | Guide region | Positions | Target partner |
//! |--------------|-----------|----------------|
//! | seed         | g2-g8     | `tlast - 1` down to `tlast - 7` |
//! | central      | g9-g11    | first three bases of the bridge |
//! | g12          | g12       | `g12` coordinate |
//! | supplementary| g13-g17   | `g12 - 1` down to `g12 - 5` |
//!
//! [`Transcript`]: transcript::Transcript
//! [`CodingTranscript`]: transcript::CodingTranscript
//! [`Guide`]: guide::Guide
//! [`GripKey`]: types::GripKey
//! [`GuideId`]: types::GuideId
//! [`RegionTag`]: types::RegionTag
//! [`RegionMask`]: types::RegionMask
//! [`DesignError`]: error::DesignError

pub mod error;
pub mod guide;
pub mod sequence;
pub mod transcript;
pub mod types;
