//! Synthetic input generator for benchmarking and cross-checking the counters.
//!
//! Writes `--lines` addresses drawn uniformly from a pool of `--distinct`
//! random addresses, so the exact expected answer is known up front.

use clap::Parser;
use eyre::{ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ipcount::codec::encode;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a newline-delimited IPv4 address file")]
struct Args {
    /// Output file
    #[arg(long, default_value = "data/addresses.txt")]
    output: PathBuf,

    /// Number of lines to write
    #[arg(long, default_value_t = 10_000_000)]
    lines: u64,

    /// Size of the address pool lines are drawn from
    #[arg(long, default_value_t = 1_000_000)]
    distinct: u32,

    /// Fraction of lines replaced by malformed text
    #[arg(long, default_value_t = 0.0)]
    malformed_ratio: f64,

    /// Terminate lines with \r\n instead of \n
    #[arg(long)]
    crlf: bool,

    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

const MALFORMED: [&str; 4] = ["999.1.1.1", "1.2.3", "a.b.c.d", ""];

fn main() -> Result<()> {
    let args = Args::parse();
    ensure!(args.distinct > 0, "--distinct must be > 0");
    ensure!(
        (0.0..=1.0).contains(&args.malformed_ratio),
        "--malformed-ratio must be within [0, 1]"
    );

    println!("Synthetic Address Generator");
    println!("===========================");
    println!("Lines: {}", args.lines);
    println!("Pool size: {}", args.distinct);
    println!("Malformed ratio: {}", args.malformed_ratio);
    println!("Seed: {}", args.seed);
    println!();

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    let mut pool = HashSet::with_capacity(args.distinct as usize);
    while pool.len() < args.distinct as usize {
        pool.insert(rng.gen::<u32>());
    }
    let pool: Vec<u32> = pool.into_iter().collect();

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&args.output)?;
    let mut writer = BufWriter::with_capacity(1024 * 1024, file);
    let terminator: &[u8] = if args.crlf { b"\r\n" } else { b"\n" };

    let pb = ProgressBar::new(args.lines);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut seen = vec![false; pool.len()];
    let mut malformed = 0u64;
    for i in 0..args.lines {
        if args.malformed_ratio > 0.0 && rng.gen_bool(args.malformed_ratio) {
            writer.write_all(MALFORMED[rng.gen_range(0..MALFORMED.len())].as_bytes())?;
            malformed += 1;
        } else {
            let slot = rng.gen_range(0..pool.len());
            seen[slot] = true;
            write!(writer, "{}", encode(pool[slot]))?;
        }
        writer.write_all(terminator)?;

        if i % 100_000 == 0 {
            pb.set_position(i);
        }
    }
    pb.finish_with_message("Done!");
    writer.flush()?;

    let expected = seen.iter().filter(|&&s| s).count();
    println!();
    println!("Generated: {:?}", args.output);
    println!("  Malformed lines: {}", malformed);
    println!("  Expected distinct: {}", expected);

    Ok(())
}
