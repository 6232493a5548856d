//! # scopetrace - Main Entry Point
//!
//! Supports two subcommands:
//! - **inspect** (`scopetrace inspect <FILE>`): load a profile in the background,
//!   print statistics and trees, optionally export a Chrome trace
//! - **demo** (`scopetrace demo --output <FILE>`): record an instrumented
//!   multi-threaded workload

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::{Duration, Instant};

use scopetrace::analysis::analyze_blocks;
use scopetrace::cli::{demo, report, Args, Command, DemoArgs, InspectArgs};
use scopetrace::domain::LoadError;
use scopetrace::export::ChromeTraceExporter;
use scopetrace::{ProfileLoader, Recorder};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_DATAERR: i32 = 65;

/// Interval between progress updates on stderr
const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<LoadError>() {
        Some(LoadError::Open { source, .. }) if source.kind() == io::ErrorKind::NotFound => EXIT_USAGE,
        Some(e) if e.is_corrupt_data() => EXIT_DATAERR,
        _ => EXIT_ERROR,
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Inspect(inspect_args) => inspect(&inspect_args, args.quiet),
        Command::Demo(demo_args) => record_demo(&demo_args, args.quiet),
    }
}

fn inspect(args: &InspectArgs, quiet: bool) -> Result<()> {
    let mut loader = ProfileLoader::new();
    loader.load_file(&args.file)?;

    let started = Instant::now();
    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));
    let mut last_report = Instant::now();

    while !loader.done() {
        if timeout.is_some_and(|limit| started.elapsed() >= limit) {
            loader.interrupt();
        }
        if !quiet && last_report.elapsed() >= PROGRESS_INTERVAL {
            match loader.percent() {
                Some(pct) => eprint!("\rloading: {pct:>3}%"),
                None => eprint!("\rloading: {} bytes", loader.progress()),
            }
            last_report = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    if !quiet && started.elapsed() >= PROGRESS_INTERVAL {
        eprintln!();
    }

    let profile = loader
        .get()
        .with_context(|| format!("Failed to load profile {}", args.file.display()))?;
    info!("loaded {} in {:.1}ms", args.file.display(), started.elapsed().as_secs_f64() * 1000.0);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if !quiet {
        report::write_summary(&mut out, &profile)?;
        writeln!(out)?;
    }

    let stats = analyze_blocks(&profile);
    report::write_stats(&mut out, &stats, args.top)?;

    if args.tree {
        writeln!(out)?;
        report::write_trees(&mut out, &profile, args.max_depth)?;
    }

    if let Some(ref export_path) = args.export {
        let exporter = ChromeTraceExporter::from_profile(&profile);
        let file = File::create(export_path).context("Failed to create trace output file")?;
        exporter.export(BufWriter::new(file)).context("Failed to export trace")?;

        if !quiet {
            writeln!(out, "\nsaved: {} ({} events)", export_path.display(), exporter.event_count())?;
        }
    }

    Ok(())
}

fn record_demo(args: &DemoArgs, quiet: bool) -> Result<()> {
    let recorder = Recorder::global();
    recorder.set_enabled(true);

    let started = Instant::now();
    let checksum = demo::run_workload(args.threads, args.iterations);
    let elapsed = started.elapsed();

    let summary = recorder
        .flush_to(&args.output)
        .with_context(|| format!("Failed to write profile {}", args.output.display()))?;

    if !quiet {
        println!("scopetrace v{}", env!("CARGO_PKG_VERSION"));
        println!("threads: {}", args.threads);
        println!("elapsed: {:.1}ms (checksum {checksum:016x})", elapsed.as_secs_f64() * 1000.0);
        println!("blocks: {}", summary.blocks);
        println!("saved: {} ({} bytes)", args.output.display(), summary.bytes);
    }

    Ok(())
}
