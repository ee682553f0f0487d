//! Readers for transcript tables.
//!
//! A table has one transcript per line with the columns
//!
//! | Column | Description |
//! |--------|-------------|
//! | name   | Transcript identifier, unique within the table |
//! | utr5_len | Length of the 5'UTR |
//! | cds_len  | Length of the coding sequence |
//! | utr3_len | Length of the 3'UTR |
//! | sequence | Bases, DNA or RNA alphabet |
//!
//! Tab-separated by default, comma-separated for `.csv`, optionally gzipped.
//!
//! ## Example
//!
//! ```rust,no_run
//! use duplex_designer::parsing::tsv::parse_tsv_file;
//! use std::path::Path;
//!
//! let transcripts = parse_tsv_file(Path::new("transcripts.tsv.gz")).unwrap();
//! println!("{} transcripts", transcripts.len());
//! ```

pub mod tsv;
