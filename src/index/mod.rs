//! Anchor discovery.
//!
//! - [`KMerIndex`]: occurrence lists for every k-mer of one length
//! - [`GripTable`]: anchor pairs spaced by an allowed bridge, per transcript partition
//!
//! Both are built once and are read-only afterwards, so they are shared by
//! reference across the engine's worker threads.
//!
//! [`KMerIndex`]: kmer::KMerIndex
//! [`GripTable`]: grip::GripTable

pub mod grip;
pub mod kmer;
