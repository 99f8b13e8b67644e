mod config;

use clap::Parser;
use config::Config;
use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use ipcount::{DistinctCounter, Strategy};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cfg = Config::parse();
    let count_cfg = cfg.count_config();
    count_cfg.validate()?;

    let now = || chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    info!(input = ?cfg.input, mode = %cfg.mode, "counting distinct addresses");
    if cfg.mode == Strategy::Parallel {
        info!(
            window_size = count_cfg.window_size,
            workers = count_cfg.worker_count,
            batch_size = count_cfg.batch_size,
            queue_depth = count_cfg.queue_depth,
            aggregation = %count_cfg.aggregation,
            "parallel settings"
        );
    }

    let pb = if cfg.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(format!("scanning {:?}", cfg.input));
    pb.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    let report = cfg
        .mode
        .counter(&count_cfg)
        .report(&cfg.input)
        .wrap_err_with(|| format!("Error processing file {:?}", cfg.input))?;
    let elapsed = start.elapsed();
    pb.finish_and_clear();

    println!("[{}] Found {} unique IP addresses", now(), report.distinct);
    println!(
        "[{}] Lines: {}, malformed: {}, time: {:.2?}",
        now(),
        report.stats.lines,
        report.stats.malformed,
        elapsed
    );

    Ok(())
}
