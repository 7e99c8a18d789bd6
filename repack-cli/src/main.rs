mod cli;

use std::process;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use repack_engine::{ConversionPipeline, ImageConverter, JobQueue, Phase, QueueEvent};
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    let pipeline = ConversionPipeline::with_converter(ImageConverter::with_quality(args.quality));
    let (queue, mut events) = JobQueue::with_pipeline(pipeline);

    let jobs = queue.enqueue(args.inputs);
    if jobs.is_empty() {
        anyhow::bail!("no .zip inputs to process");
    }

    let total_jobs = jobs.len();
    let mut remaining = total_jobs;
    let mut failed = 0usize;
    let bar = new_progress_bar();

    while remaining > 0 {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                bar.set_message("cancelling...");
                queue.cancel_current();
                continue;
            }
        };

        match event {
            QueueEvent::Progress(progress) => match progress.phase {
                Phase::Scanning => {
                    bar.set_message("scanning archive");
                }
                Phase::Converting => {
                    bar.set_length(progress.total_files as u64);
                    bar.set_position(progress.current_file as u64);
                    bar.set_message(progress.current_filename);
                }
                Phase::Packaging => {
                    bar.set_message("packaging output");
                }
            },
            QueueEvent::JobComplete {
                output_path,
                files_skipped,
                ..
            } => {
                remaining -= 1;
                if files_skipped > 0 {
                    bar.println(format!("✓ {output_path} ({files_skipped} file(s) skipped)"));
                } else {
                    bar.println(format!("✓ {output_path}"));
                }
                bar.reset();
            }
            QueueEvent::JobFailed { job_id, error } => {
                remaining -= 1;
                failed += 1;
                let input = jobs
                    .iter()
                    .find(|job| job.id == job_id)
                    .map(|job| job.input_path.clone())
                    .unwrap_or_default();
                bar.println(format!("✗ {input}: {error}"));
                bar.reset();
            }
        }
    }

    bar.finish_and_clear();
    if failed > 0 {
        anyhow::bail!("{failed} of {total_jobs} job(s) failed");
    }
    Ok(())
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_style(
        ProgressStyle::with_template("{spinner:.blue} [{bar:25.cyan/white}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    bar
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
    Ok(())
}
