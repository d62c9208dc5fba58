//! Fractal engine command line
//!
//! `serve` speaks the JSON-lines worker protocol on stdin/stdout; `bench`
//! runs the node-rate benchmark once and prints the report.

use std::io::{self, BufRead, Write};
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::unbounded;

use fractal::config::EngineConfig;
use fractal::engine::run_ai_benchmark;
use fractal::worker::{parse_request, Response, WorkerPool};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer protocol requests, one JSON object per line
    Serve {
        /// Transposition table size per worker context, in megabytes
        #[arg(long, default_value_t = 16)]
        tt_size_mb: usize,

        /// Maximum number of worker contexts
        #[arg(long, default_value_t = 2)]
        pool_size: usize,

        /// Search every position in its original orientation
        #[arg(long)]
        no_symmetry: bool,
    },
    /// Measure search speed on a board with one random opening move
    Bench {
        /// Board depth (2-4)
        #[arg(long, default_value_t = 4)]
        depth: usize,

        /// Time budget in milliseconds
        #[arg(long, default_value_t = 2000)]
        time_ms: u64,
    },
}

fn main() {
    let args = Args::parse();

    // logs go to stderr; stdout carries protocol replies only
    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
    .write_style(env_logger::WriteStyle::Never)
    .target(env_logger::Target::Stderr)
    .init();

    let outcome = match args.command {
        Command::Serve {
            tt_size_mb,
            pool_size,
            no_symmetry,
        } => serve(EngineConfig {
            tt_size_mb,
            pool_size,
            randomize_symmetry: !no_symmetry,
        }),
        Command::Bench { depth, time_ms } => bench(depth, time_ms),
    };

    if let Err(e) = outcome {
        log::error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn serve(config: EngineConfig) -> Result<()> {
    let pool = WorkerPool::new(config);
    let (out_tx, out_rx) = unbounded::<Response>();

    let writer = thread::spawn(move || -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for response in out_rx {
            let line = serde_json::to_string(&response).map_err(io::Error::other)?;
            writeln!(out, "{line}")?;
            out.flush()?;
        }
        Ok(())
    });

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        log::debug!("Received: {line}");

        match parse_request(line) {
            Ok(request) => pool.submit_to(request, out_tx.clone()),
            Err(e) => {
                log::warn!("Rejected request: {e}");
                let _ = out_tx.send(Response::error(e.to_string()));
            }
        }
    }

    // the writer drains until every queued job has replied
    drop(out_tx);

    match writer.join() {
        Ok(result) => result.context("failed to write reply"),
        Err(_) => anyhow::bail!("writer thread panicked"),
    }
}

fn bench(depth: usize, time_ms: u64) -> Result<()> {
    let report = run_ai_benchmark(depth, time_ms).context("benchmark failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
