//! Grips command - list anchor pairs shared by the required transcripts.

use clap::Args;

use crate::cli::{ConfigArgs, OutputFormat, TargetArgs};
use crate::core::transcript::TranscriptSet;
use crate::core::types::GripKey;
use crate::index::grip::{Grip, GripTable};
use crate::index::kmer::KMerIndex;

#[derive(Args)]
pub struct GripsArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Maximum number of grips to print (0 for all)
    #[arg(short = 'n', long, default_value = "0")]
    pub max_grips: usize,
}

/// Execute the grips command
///
/// # Errors
///
/// Returns an error if the inputs cannot be loaded or indexing fails.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: GripsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = args.config.resolve()?;
    let transcripts = args.targets.load(verbose)?;

    let index3p =
        KMerIndex::build(transcripts.all(), config.region, &config.exclusions, config.k3)?;
    let index5p =
        KMerIndex::build(transcripts.all(), config.region, &config.exclusions, config.k5)?;
    let table = GripTable::build(
        &index3p,
        &index5p,
        &transcripts,
        config.min_bridge,
        config.max_distance,
        config.strict_anchor_exclusion,
    )?;

    let limit = if args.max_grips == 0 {
        usize::MAX
    } else {
        args.max_grips
    };

    match format {
        OutputFormat::Text => print_text(&table, &transcripts, limit),
        OutputFormat::Json => print_json(&table, &transcripts, limit)?,
        OutputFormat::Tsv => print_tsv(&table, &transcripts, limit),
    }

    Ok(())
}

/// Every occurrence of a key with the partition it came from
fn occurrences<'a>(table: &'a GripTable, key: &GripKey) -> Vec<(&'static str, &'a Grip)> {
    let mut all = Vec::new();
    for (partition, map) in [
        ("required", table.required_grips()),
        ("optional", table.optional_grips()),
        ("excluded", table.excluded_grips()),
    ] {
        if let Some(grips) = map.get(key) {
            all.extend(grips.iter().map(|g| (partition, g)));
        }
    }
    all
}

fn print_text(table: &GripTable, transcripts: &TranscriptSet, limit: usize) {
    println!(
        "\n{} grips (bridge {}-{}, regions {})",
        table.grip_count(),
        table.min_bridge(),
        table.max_distance(),
        table.region()
    );
    for key in table.keys().take(limit) {
        println!("\n  {key}");
        for (partition, grip) in occurrences(table, key) {
            println!(
                "    {:<10} {:<16} 3' at {:<6} 5' at {:<6} bridge {}",
                partition,
                transcripts.name(grip.transcript),
                grip.pos3p,
                grip.pos5p,
                grip.bridge
            );
        }
    }
    if table.grip_count() > limit {
        println!("\n  ... {} more", table.grip_count() - limit);
    }
}

fn print_json(table: &GripTable, transcripts: &TranscriptSet, limit: usize) -> anyhow::Result<()> {
    let output: Vec<serde_json::Value> = table
        .keys()
        .take(limit)
        .map(|key| {
            let sites: Vec<serde_json::Value> = occurrences(table, key)
                .into_iter()
                .map(|(partition, grip)| {
                    serde_json::json!({
                        "partition": partition,
                        "transcript": transcripts.name(grip.transcript),
                        "pos3p": grip.pos3p,
                        "pos5p": grip.pos5p,
                        "bridge": grip.bridge,
                    })
                })
                .collect();
            serde_json::json!({
                "grip": key,
                "kmer3p": key.kmer3p(),
                "kmer5p": key.kmer5p(),
                "occurrences": sites,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv(table: &GripTable, transcripts: &TranscriptSet, limit: usize) {
    println!("grip\tpartition\ttranscript\tpos3p\tpos5p\tbridge");
    for key in table.keys().take(limit) {
        for (partition, grip) in occurrences(table, key) {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                key,
                partition,
                transcripts.name(grip.transcript),
                grip.pos3p,
                grip.pos5p,
                grip.bridge
            );
        }
    }
}
