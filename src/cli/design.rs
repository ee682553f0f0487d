//! Design command - run design passes over a transcript table.

use clap::Args;

use crate::cli::{ConfigArgs, OutputFormat, TargetArgs};
use crate::design::engine::GuideDesignEngine;
use crate::design::oracle::ComplementarityOracle;
use crate::design::report::{DesignPlan, GuideRecord, Pass, PassReport};

/// Preset pass sequences
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum PlanPreset {
    /// Build, extend, cross-hybridize, prune, add optional targets, fold, prune
    #[default]
    Standard,
    /// Cross-hybridize, fold and prune twice before adding optional targets
    TwoRound,
    /// Unfiltered guides on every grip occurrence of every partition
    Coupling,
}

impl PlanPreset {
    fn plan(self) -> DesignPlan {
        match self {
            Self::Standard => DesignPlan::standard(),
            Self::TwoRound => DesignPlan::two_round(),
            Self::Coupling => DesignPlan::coupling(),
        }
    }
}

#[derive(Args)]
pub struct DesignArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Preset pass sequence
    #[arg(long, value_enum, default_value = "standard")]
    pub plan: PlanPreset,

    /// Explicit comma-separated passes, replacing the preset
    #[arg(long, value_enum, value_delimiter = ',')]
    pub passes: Vec<Pass>,

    /// Finish by dropping sequences that bind an excluded transcript
    #[arg(long)]
    pub drop_excluded: bool,

    /// Finish with a generate pass over every surviving grip
    #[arg(long)]
    pub generate: bool,

    /// Maximum number of guides to print (0 for all)
    #[arg(short = 'n', long, default_value = "0")]
    pub max_guides: usize,
}

/// Execute the design command
///
/// # Errors
///
/// Returns an error if the inputs cannot be loaded, the configuration is
/// invalid, or a pass fails.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: DesignArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = args.config.resolve()?;
    let transcripts = args.targets.load(verbose)?;
    if verbose {
        eprintln!(
            "Targets: {} required, {} optional, {} excluded",
            transcripts.required().len(),
            transcripts.optional().len(),
            transcripts.excluded().len(),
        );
    }

    let mut plan = if args.passes.is_empty() {
        args.plan.plan()
    } else {
        DesignPlan::new(args.passes.clone())
    };
    if args.drop_excluded {
        plan = plan.then(Pass::DropExcludedBinders);
    }
    if args.generate {
        plan = plan.then(Pass::Generate);
    }

    let oracle = ComplementarityOracle::new(config.min_binding);
    let mut engine = GuideDesignEngine::new(transcripts, config)?;
    if verbose {
        eprintln!("Grips: {}", engine.grip_table().grip_count());
    }
    engine.run(&plan, &oracle)?;
    engine.check_consistency()?;

    let records: Vec<GuideRecord> = engine
        .guides()
        .map(|g| GuideRecord::from_guide(g, engine.transcripts()))
        .take(if args.max_guides == 0 {
            usize::MAX
        } else {
            args.max_guides
        })
        .collect();

    match format {
        OutputFormat::Text => print_text(&engine, &records),
        OutputFormat::Json => print_json(&engine, &records)?,
        OutputFormat::Tsv => print_tsv(&records),
    }

    Ok(())
}

fn print_text(engine: &GuideDesignEngine, records: &[GuideRecord]) {
    let summary = engine.summary();
    println!("\nPasses:");
    for report in engine.reports() {
        print_report(report);
    }

    println!(
        "\nSurviving: {} guides, {} sequences, {} grips ({:.1} guides per grip)",
        summary.guides, summary.sequences, summary.grips, summary.average_guides_per_grip
    );

    if records.is_empty() {
        println!("\nNo guides survived.");
    } else {
        println!("\nGuides:");
        let mut current_grip = "";
        for record in records {
            if record.grip != current_grip {
                current_grip = &record.grip;
                println!("  {current_grip}");
            }
            println!(
                "    {}  {}:{}-{}  bridge {}  {}  [{}]",
                record.sequence,
                record.transcript,
                record.t1,
                record.tlast,
                record.bridge,
                record.origin,
                record.id
            );
        }
        if records.len() < summary.guides {
            println!("  ... {} more", summary.guides - records.len());
        }
    }

    let designs = engine.designs();
    if !designs.is_empty() {
        println!("\nGenerated designs:");
        for (grip, sequences) in designs {
            println!("  {grip}: {} sequences", sequences.len());
            for sequence in sequences {
                println!("    {sequence}");
            }
        }
    }
}

fn print_report(report: &PassReport) {
    println!(
        "  {:<28} examined {:>7}  +{:<6} -{:<6} -> {} guides / {} sequences / {} grips ({} ms)",
        report.pass.to_string(),
        report.examined,
        report.added,
        report.removed,
        report.guides,
        report.sequences,
        report.grips,
        report.elapsed_ms
    );
}

fn print_json(engine: &GuideDesignEngine, records: &[GuideRecord]) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "config": engine.config(),
        "summary": engine.summary(),
        "passes": engine.reports(),
        "guides": records,
        "designs": engine.designs().iter().map(|(grip, sequences)| {
            serde_json::json!({ "grip": grip, "sequences": sequences })
        }).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv(records: &[GuideRecord]) {
    println!("id\torigin\tsequence\tgrip\ttranscript\tg2\tg12\tt1\ttlast\tbridge\tfolded\tseed_binds\tsupp_binds");
    for r in records {
        let (folded, seed, supp) = r.fold.map_or(("", "", ""), |f| {
            (
                bool_str(f.is_folded),
                bool_str(f.seed_binds),
                bool_str(f.supp_binds),
            )
        });
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.id,
            r.origin,
            r.sequence,
            r.grip,
            r.transcript,
            r.g2,
            r.g12,
            r.t1,
            r.tlast,
            r.bridge,
            folded,
            seed,
            supp
        );
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
