use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use summary_test_support::{Replay, Scenario, diff_lines};

/// Replay a TOML scenario batch by batch and print what each delivery
/// reported.
#[derive(Parser, Debug)]
#[command(name = "summary-replay", version)]
struct Cli {
    /// Scenario file.
    scenario: PathBuf,

    /// Print one JSON document with every batch instead of text lines.
    #[arg(long)]
    json: bool,

    /// Cross-check every summary against snapshots of the tree.
    #[arg(long)]
    validate: bool,

    /// Print the observed tree after every batch.
    #[arg(long)]
    dump: bool,

    /// Log more; repeat for trace output.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let scenario = Scenario::load(&cli.scenario)?;
    log::info!(
        target: "summary_replay",
        "replaying {} ({} batches)",
        scenario.name.as_deref().unwrap_or("unnamed scenario"),
        scenario.batches.len()
    );
    let mut replay = Replay::start(&scenario).context("failed to set up the scenario")?;

    let mut json = Vec::new();
    let mut mismatches = 0usize;
    for (index, batch) in scenario.batches.iter().enumerate() {
        let outcome = replay
            .run_batch(batch, cli.validate)
            .with_context(|| format!("batch {index} failed"))?;
        let lines = outcome.lines();

        if cli.json {
            json.push(outcome.to_json());
        } else {
            println!("batch {}:", outcome.batch);
            if lines.is_empty() {
                println!("  (nothing reported)");
            }
            for line in &lines {
                println!("  {line}");
            }
        }
        if cli.dump {
            eprintln!("{}", replay.dump());
        }

        if let Some(expected) = &batch.expect {
            if *expected != lines {
                mismatches += 1;
                eprintln!(
                    "batch {}: reported summaries differ from the expectation:\n{}",
                    outcome.batch,
                    diff_lines(expected, &lines)
                );
            }
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    if mismatches > 0 {
        bail!("{mismatches} batch(es) did not match their expectation");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(&cli)
}
