//! Command-line interface for duplex-designer.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **design**: Run design passes over a transcript table and report the guides
//! - **grips**: List the grips shared by the required transcripts
//! - **candidates**: Enumerate generator candidates around two anchor flanks
//!
//! ## Usage
//!
//! ```text
//! # Design guides gripping tx1 and tx2 but not off1
//! duplex-designer design transcripts.tsv --required tx1,tx2 --excluded off1
//!
//! # JSON output for scripting, parameters from a file
//! duplex-designer design transcripts.tsv --config design.json --format json
//!
//! # Grip table only
//! duplex-designer grips transcripts.tsv --required tx1,tx2 --k3 4 --k5 3
//!
//! # First 20 candidates for a grip
//! duplex-designer candidates --flank3 CGUU --flank5 UAA -n 20
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::core::error::DesignError;
use crate::core::transcript::{Transcript, TranscriptSet};
use crate::core::types::RegionMask;
use crate::design::config::DesignConfig;
use crate::parsing::tsv::parse_tsv_file;
use crate::utils::validation::split_names;

pub mod candidates;
pub mod design;
pub mod grips;

#[derive(Parser)]
#[command(name = "duplex-designer")]
#[command(author = "Major Lab")]
#[command(version)]
#[command(about = "Design antisense guide duplexes that grip every required transcript")]
#[command(
    long_about = "duplex-designer finds anchor pairs (grips) shared by a set of required transcripts and designs 21-nt antisense guides around them.\n\nGuides are extended, cross-hybridized across every location of their grip, folded and filtered so that each surviving sequence binds every required transcript, optionally reaches optional transcripts, and avoids excluded ones."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Design guides over a transcript table
    Design(design::DesignArgs),

    /// List the grips shared by the required transcripts
    Grips(grips::GripsArgs),

    /// Enumerate candidates around two anchor flanks
    Candidates(candidates::CandidatesArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Transcript table and its partition into required, optional and excluded
#[derive(Args)]
pub struct TargetArgs {
    /// Transcript table (TSV, CSV, optionally .gz) with columns
    /// name, utr5_len, cds_len, utr3_len, sequence
    #[arg(required = true)]
    pub table: PathBuf,

    /// Comma-separated transcripts every guide must bind
    /// (default: every transcript not listed as optional or excluded)
    #[arg(short, long)]
    pub required: Option<String>,

    /// Comma-separated transcripts guides may also bind
    #[arg(short, long)]
    pub optional: Option<String>,

    /// Comma-separated transcripts guides must not bind
    #[arg(short, long)]
    pub excluded: Option<String>,
}

/// Design parameters: a JSON file, then individual overrides
#[derive(Args)]
pub struct ConfigArgs {
    /// JSON design config; absent fields take their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Length of the 3' anchor k-mer (seed side)
    #[arg(long)]
    pub k3: Option<usize>,

    /// Length of the 5' anchor k-mer (supplementary side)
    #[arg(long)]
    pub k5: Option<usize>,

    /// Shortest accepted bridge
    #[arg(long)]
    pub min_bridge: Option<usize>,

    /// Longest accepted bridge, before and after folding
    #[arg(long)]
    pub max_distance: Option<usize>,

    /// Lower GC bound for guides (0-1)
    #[arg(long)]
    pub gc_min: Option<f64>,

    /// Upper GC bound for guides (0-1)
    #[arg(long)]
    pub gc_max: Option<f64>,

    /// Regions anchors and windows may use, e.g. `utr3` or `cds,utr3`
    #[arg(long)]
    pub region: Option<RegionMask>,

    /// Supplementary Watson-Crick pairs the reference oracle requires
    #[arg(long)]
    pub min_binding: Option<usize>,

    /// Candidates drawn per grip by the generate pass
    #[arg(long)]
    pub generator_budget: Option<usize>,

    /// Also require anchors to be absent from every excluded transcript
    #[arg(long)]
    pub strict_anchor_exclusion: bool,
}

impl ConfigArgs {
    /// Load the config file (if any), apply overrides and validate
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or the result is invalid.
    pub fn resolve(&self) -> anyhow::Result<DesignConfig> {
        let mut config = match &self.config {
            Some(path) => DesignConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => DesignConfig::default(),
        };

        if let Some(k3) = self.k3 {
            config.k3 = k3;
        }
        if let Some(k5) = self.k5 {
            config.k5 = k5;
        }
        if let Some(min_bridge) = self.min_bridge {
            config.min_bridge = min_bridge;
        }
        if let Some(max_distance) = self.max_distance {
            config.max_distance = max_distance;
        }
        if let Some(gc_min) = self.gc_min {
            config.gc_min = gc_min;
        }
        if let Some(gc_max) = self.gc_max {
            config.gc_max = gc_max;
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if let Some(min_binding) = self.min_binding {
            config.min_binding = min_binding;
        }
        if let Some(budget) = self.generator_budget {
            config.generator_budget = budget;
        }
        if self.strict_anchor_exclusion {
            config.strict_anchor_exclusion = true;
        }

        config.validate()?;
        Ok(config)
    }
}

impl TargetArgs {
    /// Read the table and partition it.
    ///
    /// Transcripts named in no list are required unless `--required` is given,
    /// in which case they are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be parsed, a listed name is not in
    /// the table, a name is listed twice, or fewer than two transcripts end up
    /// required.
    pub fn load(&self, verbose: bool) -> anyhow::Result<TranscriptSet> {
        let transcripts = parse_tsv_file(&self.table)
            .with_context(|| format!("reading {}", self.table.display()))?;
        if verbose {
            eprintln!(
                "Loaded {} transcripts from {}",
                transcripts.len(),
                self.table.display()
            );
        }

        let optional = split_names(self.optional.as_deref().unwrap_or_default());
        let excluded = split_names(self.excluded.as_deref().unwrap_or_default());
        let required = match &self.required {
            Some(list) => split_names(list),
            None => transcripts
                .iter()
                .map(|t| t.name.clone())
                .filter(|name| !optional.contains(name) && !excluded.contains(name))
                .collect(),
        };

        let mut pool: Vec<Option<Arc<dyn Transcript>>> = transcripts
            .into_iter()
            .map(|t| Some(Arc::new(t) as Arc<dyn Transcript>))
            .collect();
        let mut take = |names: &[String]| -> anyhow::Result<Vec<Arc<dyn Transcript>>> {
            names
                .iter()
                .map(|name| {
                    let slot = pool
                        .iter_mut()
                        .find(|slot| slot.as_ref().is_some_and(|t| t.name() == name.as_str()));
                    match slot.and_then(Option::take) {
                        Some(t) => Ok(t),
                        None => Err(DesignError::UnknownTranscript(format!(
                            "'{name}' is not in the table or is listed twice"
                        ))
                        .into()),
                    }
                })
                .collect()
        };

        let required = take(&required)?;
        let optional = take(&optional)?;
        let excluded = take(&excluded)?;
        Ok(TranscriptSet::new(required, optional, excluded)?)
    }
}
