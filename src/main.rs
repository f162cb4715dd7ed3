//! gpu-bench - staged GPU load benchmark
//!
//! Each test renders a workload that grows in fixed stages, samples frame times
//! into half-second windows and appends one row per window to its record log.
//! The suite runs the tests one after another, scores the logs and reports a
//! single result.

mod benchmark;
mod config;
mod error;
mod hardware;
mod record;
mod render;
mod report;
mod scoring;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use crate::benchmark::suite::{ChildProcessLauncher, SuiteRunner, TestOutcome, TestStatus};
use crate::benchmark::{StagedBenchmarkRunner, StopSignal};
use crate::config::{Config, TestKind};
use crate::report::store;
use crate::report::submit::ResultSubmitter;
use crate::report::{BenchmarkResult, ResultAssembler};
use crate::scoring::{score_suite, SuiteInput, SuiteScores, TotalPolicy};

/// gpu-bench - Staged GPU benchmark
#[derive(Parser)]
#[command(name = "gpu-bench")]
#[command(version)]
#[command(about = "Measure how rendering throughput degrades as the workload grows")]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single test in this process (butterfly, triangles, ocean)
    Run {
        /// Test to run
        test: TestKind,
    },

    /// Run every test in sequence, then score and report the result
    Suite {
        /// Save the result locally without submitting it
        #[arg(long)]
        no_submit: bool,

        /// Report a partial total when a test has no usable record log
        #[arg(long)]
        partial: bool,
    },

    /// Score the existing record logs
    Score {
        /// Report a partial total when a test has no usable record log
        #[arg(long)]
        partial: bool,
    },

    /// Assemble a result from the existing record logs, save and submit it
    Report {
        /// Report a partial total when a test has no usable record log
        #[arg(long)]
        partial: bool,

        /// Save the result locally without submitting it
        #[arg(long)]
        no_submit: bool,
    },

    /// Detect and display the hardware attached to results
    Detect,

    /// Show configuration file location and effective settings
    Config {
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { test } => {
            let config = Config::load()?;
            run_test(&config, test)?;
        }
        Commands::Suite { no_submit, partial } => {
            let config = Config::load()?;
            run_suite(&config, partial, no_submit)?;
        }
        Commands::Score { partial } => {
            let config = Config::load()?;
            let scores = score_configured_suite(&config, partial)?;
            print_scores(&scores);
        }
        Commands::Report { partial, no_submit } => {
            let config = Config::load()?;
            let scores = score_configured_suite(&config, partial)?;
            let result = assemble_result(&scores);
            let rt = Runtime::new()?;
            publish_result(&rt, &config, &result, no_submit)?;
        }
        Commands::Detect => {
            let metadata = hardware::detect();
            println!("{}", hardware::display(&metadata));
        }
        Commands::Config { init } => {
            show_config_info(init)?;
        }
    }

    Ok(())
}

/// Ctrl-C sets the returned signal instead of killing the process, so the
/// runner can stop between frames.
fn install_stop_handler(rt: &Runtime) -> StopSignal {
    let stop = StopSignal::new();
    let handle = stop.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });
    stop
}

fn run_test(config: &Config, kind: TestKind) -> Result<()> {
    let test = config
        .test_config(kind)
        .with_context(|| format!("Invalid configuration for the {} test", kind))?;
    let log_path = config.record_log_path(kind)?;

    let rt = Runtime::new()?;
    let stop = install_stop_handler(&rt);

    println!(
        "{} {} {}",
        "Running".bright_cyan(),
        kind.name().bright_white().bold(),
        format!(
            "({} stages, {:.0}s)",
            test.workload_schedule.len(),
            test.test_duration_secs
        )
        .bright_black()
    );

    let mut runner = StagedBenchmarkRunner::setup(
        test,
        config.output.window_width,
        config.output.window_height,
        &log_path,
        stop,
    )?;
    let summary = runner.run()?;

    if summary.stopped_early {
        println!(
            "{} {}",
            "⚠ Stopped before completion.".bright_yellow(),
            "Rows already written are kept.".bright_black()
        );
    } else {
        println!("{}", "✓ Test completed".bright_green());
    }
    println!(
        "  {} {}",
        "Records:".bright_cyan(),
        summary.records_written.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Frames:".bright_cyan(),
        summary.frames_rendered.to_string().bright_white()
    );
    println!(
        "  {} {} ({} {})",
        "Last stage:".bright_cyan(),
        (summary.final_stage.index + 1).to_string().bright_white(),
        summary.final_stage.workload_size,
        kind.workload_label().to_lowercase()
    );
    println!(
        "  {} {}",
        "Record log:".bright_cyan(),
        log_path.display().to_string().bright_white()
    );

    Ok(())
}

fn run_suite(config: &Config, partial: bool, no_submit: bool) -> Result<()> {
    let rt = Runtime::new()?;
    let stop = install_stop_handler(&rt);

    let mut launcher = ChildProcessLauncher::current_exe()?;
    let outcomes = SuiteRunner::default().run(&mut launcher, &stop);

    println!("\n{}", "Suite:".bright_white().bold());
    for outcome in &outcomes {
        let status = match &outcome.status {
            TestStatus::Completed => "completed".bright_green(),
            TestStatus::Failed(reason) => format!("failed ({})", reason).bright_red(),
            TestStatus::Skipped => "skipped".bright_yellow(),
        };
        println!("  {:<10} {}", outcome.test.name(), status);
    }

    if stop.is_stopped() {
        bail!("Suite interrupted; no result was assembled");
    }

    let mut inputs = suite_inputs(config)?;
    mark_unfinished_runs(&mut inputs, &outcomes);
    let scores = score_inputs(config, &inputs, partial)?;
    let result = assemble_result(&scores);
    publish_result(&rt, config, &result, no_submit)
}

fn suite_inputs(config: &Config) -> Result<Vec<SuiteInput>> {
    TestKind::ALL
        .iter()
        .map(|&kind| {
            let test = config
                .test_config(kind)
                .with_context(|| format!("Invalid configuration for the {} test", kind))?;
            Ok(SuiteInput::new(test, config.record_log_path(kind)?))
        })
        .collect()
}

/// A test that did not complete in this suite run may have left an earlier
/// run's log on disk; it is reported as missing instead of scored.
fn mark_unfinished_runs(inputs: &mut [SuiteInput], outcomes: &[TestOutcome]) {
    for input in inputs.iter_mut() {
        let status = outcomes
            .iter()
            .find(|outcome| outcome.test == input.test.kind)
            .map(|outcome| &outcome.status);
        input.run_failure = match status {
            Some(TestStatus::Completed) => None,
            Some(TestStatus::Failed(reason)) => Some(reason.clone()),
            Some(TestStatus::Skipped) => Some("skipped".to_string()),
            None => Some("not run".to_string()),
        };
    }
}

fn score_configured_suite(config: &Config, partial: bool) -> Result<SuiteScores> {
    score_inputs(config, &suite_inputs(config)?, partial)
}

fn score_inputs(config: &Config, inputs: &[SuiteInput], partial: bool) -> Result<SuiteScores> {
    let policy = TotalPolicy::from_allow_partial(partial || config.scoring.allow_partial);
    let scores = score_suite(inputs, policy).context("Could not compute the total score")?;

    for failure in &scores.failures {
        println!("{} {}", "⚠".bright_yellow(), failure.to_string().bright_yellow());
    }

    Ok(scores)
}

fn assemble_result(scores: &SuiteScores) -> BenchmarkResult {
    let metadata = hardware::detect();
    let result = ResultAssembler::new().assemble(scores, metadata);

    println!("\n{}", hardware::display(result.metadata()));
    println!("\n{}", result);
    result
}

fn print_scores(scores: &SuiteScores) {
    println!(
        "\n{:<12} {:>12} {:>10} {:>10} {:>8}",
        "Test", "Score", "Avg FPS", "Min FPS", "Windows"
    );
    println!("{}", "-".repeat(56));
    for kind in TestKind::ALL {
        match scores.get(kind) {
            Some(scored) => {
                let mut line = format!(
                    "{:<12} {:>12.4} {:>10.1} {:>10.1} {:>8}",
                    kind.name(),
                    scored.score.value,
                    scored.score.mean_avg_fps,
                    scored.score.mean_min_fps,
                    scored.score.windows
                );
                if scored.log.skipped_rows > 0 {
                    line.push_str(&format!("  ({} malformed rows skipped)", scored.log.skipped_rows));
                }
                println!("{}", line);
            }
            None => println!("{:<12} {:>12}", kind.name(), "missing".bright_red()),
        }
    }
    println!("{}", "-".repeat(56));

    let total = format!("{:.4}", scores.total_score);
    if scores.is_complete() {
        println!("{:<12} {:>12}", "Total", total.bright_green().bold());
    } else {
        println!(
            "{:<12} {:>12}  {}",
            "Total",
            total.bright_yellow().bold(),
            "(partial)".bright_yellow()
        );
    }
}

/// Save locally first, then submit when enabled. The local copy survives a
/// failed submission.
fn publish_result(
    rt: &Runtime,
    config: &Config,
    result: &BenchmarkResult,
    no_submit: bool,
) -> Result<()> {
    let dir = store::default_results_dir()?;
    let path = store::save_result(result, &dir)?;
    println!(
        "\n{} {}",
        "Result saved to".bright_cyan(),
        path.display().to_string().bright_white()
    );

    if no_submit || !config.api.enabled {
        println!("{}", "Submission skipped.".bright_black());
        return Ok(());
    }

    println!("{}", "Submitting result...".bright_cyan());
    let submitted = ResultSubmitter::from_config(&config.api)
        .and_then(|submitter| rt.block_on(submitter.submit(result)));

    match submitted {
        Ok(()) => {
            println!("{}", "✓ Result submitted".bright_green());
            Ok(())
        }
        Err(err) => {
            println!(
                "{} {}",
                "✗ Failed to submit:".bright_red(),
                err.to_string().bright_red()
            );
            print_local_copy_hint(&path);
            Err(err).context("Result submission failed")
        }
    }
}

fn print_local_copy_hint(path: &Path) {
    println!(
        "{} {}",
        "The result is kept locally at".bright_yellow(),
        path.display().to_string().bright_white()
    );
}

fn show_config_info(init: bool) -> Result<()> {
    let config = if init { Config::init()? } else { Config::load()? };

    println!("{}", "gpu-bench configuration\n".bright_cyan().bold());

    let path = config::get_config_path()?;
    println!("{} {}", "Config file:".bright_yellow(), path.bright_white());
    if Path::new(&path).exists() {
        println!("  {} {}", "Status:".bright_cyan(), "Exists".bright_green());
    } else {
        println!(
            "  {} {}",
            "Status:".bright_cyan(),
            "Not created yet (using defaults, run `gpu-bench config --init`)".bright_yellow()
        );
    }

    println!("\n{}", "Output:".bright_white().bold());
    println!(
        "  {} {}",
        "Record logs:".bright_cyan(),
        config.results_dir()?.display().to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Saved results:".bright_cyan(),
        store::default_results_dir()?.display().to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Render target:".bright_cyan(),
        format!("{}x{}", config.output.window_width, config.output.window_height).bright_white()
    );

    println!("\n{}", "Tests:".bright_white().bold());
    for kind in TestKind::ALL {
        match config.test_config(kind) {
            Ok(test) => {
                println!("  {}", kind.name().bright_white());
                println!(
                    "    {} {:?}",
                    format!("{}:", kind.workload_label()).bright_cyan(),
                    test.workload_schedule
                );
                println!(
                    "    {} {}s per stage, {}s total, {}s warm-up, {}s windows",
                    "Timing:".bright_cyan(),
                    test.stage_duration_secs,
                    test.test_duration_secs,
                    test.warm_up_secs,
                    test.window_interval_secs
                );
                println!("    {} {}", "Normalize:".bright_cyan(), test.normalize_factor);
            }
            Err(err) => {
                println!(
                    "  {} {}",
                    kind.name().bright_white(),
                    err.to_string().bright_red()
                );
            }
        }
    }

    println!("\n{}", "Scoring:".bright_white().bold());
    println!(
        "  {} {}",
        "Allow partial total:".bright_cyan(),
        if config.scoring.allow_partial {
            "true".bright_yellow()
        } else {
            "false".bright_green()
        }
    );

    println!("\n{}", "Submission:".bright_white().bold());
    println!(
        "  {} {}",
        "Enabled:".bright_cyan(),
        if config.api.enabled {
            "true".bright_green()
        } else {
            "false".bright_yellow()
        }
    );
    println!(
        "  {} {}",
        "Base URL:".bright_cyan(),
        config.api.base_url.bright_white()
    );
    println!("  {} {}", "Table:".bright_cyan(), config.api.table.bright_white());
    println!(
        "  {} {}",
        "API key:".bright_cyan(),
        if config.api.api_key.is_some() {
            "set".bright_green()
        } else {
            "not set".bright_yellow()
        }
    );
    println!(
        "  {} {}",
        "Timeout:".bright_cyan(),
        format!("{}s", config.api.timeout_seconds).bright_white()
    );
    println!(
        "  {} {}",
        "Retry attempts:".bright_cyan(),
        config.api.max_retries.to_string().bright_white()
    );

    Ok(())
}
