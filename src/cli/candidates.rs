//! Candidates command - enumerate generator output for one pair of flanks.

use anyhow::Context;
use clap::Args;

use crate::cli::{ConfigArgs, OutputFormat};
use crate::core::sequence::gc_fraction;
use crate::design::generator::CandidateGenerator;
use crate::utils::validation::normalize_nucleotides;

#[derive(Args)]
pub struct CandidatesArgs {
    /// Guide positions 2-5, i.e. the reverse complement of the 3' anchor
    #[arg(long, required = true)]
    pub flank3: String,

    /// Guide positions 13-15, i.e. the reverse complement of the 5' anchor
    #[arg(long, required = true)]
    pub flank5: String,

    /// Number of candidates to print
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Seeds (guide positions 2-8) never to emit; may be repeated
    #[arg(long = "avoid-seed")]
    pub avoid_seeds: Vec<String>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Execute the candidates command
///
/// # Errors
///
/// Returns an error if the flanks are malformed or the configuration is invalid.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: CandidatesArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = args.config.resolve()?;
    let flank3 = normalize_nucleotides(&args.flank3);
    let flank5 = normalize_nucleotides(&args.flank5);
    let mut generator = CandidateGenerator::new(&flank3, &flank5, config.composition())
        .context("invalid flanks")?;
    for seed in &args.avoid_seeds {
        generator.avoid_seed(&normalize_nucleotides(seed));
    }

    let candidates: Vec<String> = generator.by_ref().take(args.count).collect();
    if verbose {
        eprintln!(
            "Examined {} fillings, produced {}{}",
            generator.examined(),
            generator.produced(),
            if generator.is_exhausted() {
                " (exhausted)"
            } else {
                ""
            }
        );
    }

    match format {
        OutputFormat::Text => {
            if candidates.is_empty() {
                println!("No candidates pass the composition filter.");
            }
            for (i, candidate) in candidates.iter().enumerate() {
                println!(
                    "{:>4}  {}  GC {:.2}",
                    i + 1,
                    candidate,
                    gc_fraction(candidate)
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "flank3": flank3,
                "flank5": flank5,
                "examined": generator.examined(),
                "exhausted": generator.is_exhausted(),
                "candidates": candidates,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("rank\tsequence\tgc");
            for (i, candidate) in candidates.iter().enumerate() {
                println!("{}\t{}\t{:.4}", i + 1, candidate, gc_fraction(candidate));
            }
        }
    }

    Ok(())
}
