mod cache;
mod clock;
mod config;
mod replace;
mod sim;
mod stats;
mod trace;

use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

use anyhow::{ensure, Context};
use log::info;

use crate::{
    config::{CacheConfig, Config},
    sim::Simulation,
    trace::{Access, Trace},
};

const COMMAND_LINE_FAIL: i32 = 1;
const FILE_FAIL: i32 = 2;

struct Options {
    verbose: bool,
    caches: Vec<CacheConfig>,
    trace_path: PathBuf,
    stats_path: Option<PathBuf>,
    access_per_block: usize,
    blocks_per_queue: usize,
}

fn main() {
    env_logger::init();

    let prog = env::args().next().unwrap_or_else(|| "csim".to_string());
    let mut args = pico_args::Arguments::from_env();
    if args.contains("-h") {
        print_usage(&prog);
        return;
    }

    let opts = match parse_args(args) {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("{prog}: {err:#}");
            print_usage(&prog);
            process::exit(COMMAND_LINE_FAIL);
        }
    };

    let mut sims = Vec::with_capacity(opts.caches.len());
    for config in opts.caches {
        let name = config.name();
        match Simulation::new(config) {
            Ok(sim) => sims.push(sim),
            Err(err) => {
                eprintln!("{prog}: {name}: {err}");
                print_usage(&prog);
                process::exit(COMMAND_LINE_FAIL);
            }
        }
    }

    let trace = match Trace::read(
        &opts.trace_path,
        opts.access_per_block,
        opts.blocks_per_queue,
    ) {
        Ok(trace) => trace,
        Err(err) => {
            eprintln!("{prog}: cannot open {}: {err}", opts.trace_path.display());
            process::exit(FILE_FAIL);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut n_records = 0u64;
    for block in trace.rec.iter() {
        if let Err(err) = operate(&mut sims, &block, opts.verbose, &mut out) {
            eprintln!("{prog}: cannot write output: {err}");
            process::exit(FILE_FAIL);
        }
        n_records += block.len() as u64;
    }
    info!("Processed {n_records} trace records");

    if let Err(err) = report(&sims, &mut out) {
        eprintln!("{prog}: cannot write output: {err}");
        process::exit(FILE_FAIL);
    }

    if let Some(stats_path) = &opts.stats_path {
        if let Err(err) = write_stats(stats_path, &sims) {
            eprintln!("{prog}: {err:#}");
            process::exit(FILE_FAIL);
        }
    }
}

fn parse_args(mut args: pico_args::Arguments) -> anyhow::Result<Options> {
    let verbose = args.contains("-v");

    let config_str = match args.opt_value_from_str::<_, String>("--config")? {
        Some(config_str) => Some(config_str),
        None => match args.opt_value_from_str::<_, PathBuf>("-p")? {
            Some(config_path) => Some(
                fs::read_to_string(&config_path)
                    .with_context(|| format!("cannot read config {}", config_path.display()))?,
            ),
            None => None,
        },
    };
    let caches = match config_str {
        Some(config_str) => Config::from_json(&config_str)?.caches,
        None => {
            let s: u32 = args.opt_value_from_str("-s")?.context("missing -s <num>")?;
            let lines: usize = args.opt_value_from_str("-E")?.context("missing -E <num>")?;
            let b: u32 = args.opt_value_from_str("-b")?.context("missing -b <num>")?;
            let config = CacheConfig::new(s, lines, b);
            config.require_positive()?;
            vec![config]
        }
    };

    let trace_path: PathBuf = args
        .opt_value_from_str("-t")?
        .context("missing -t <file>")?;
    let stats_path: Option<PathBuf> = args.opt_value_from_str("--json")?;
    let access_per_block: usize = args
        .opt_value_from_str("--buffer-size")?
        .unwrap_or(1024 * 16);
    let blocks_per_queue: usize = args.opt_value_from_str("--queue-size")?.unwrap_or(32);
    ensure!(access_per_block > 0, "--buffer-size must be positive");

    let rest = args.finish();
    ensure!(rest.is_empty(), "unexpected arguments: {rest:?}");

    Ok(Options {
        verbose,
        caches,
        trace_path,
        stats_path,
        access_per_block,
        blocks_per_queue,
    })
}

fn operate(
    sims: &mut [Simulation],
    accesses: &[Access],
    verbose: bool,
    out: &mut impl Write,
) -> io::Result<()> {
    let sweep = sims.len() > 1;
    for access in accesses {
        for sim in sims.iter_mut() {
            let Some(outcome) = sim.process(access) else {
                continue;
            };
            if verbose {
                if sweep {
                    write!(out, "{}: ", sim.config().name())?;
                }
                writeln!(out, "{access} {outcome}")?;
            }
        }
    }
    Ok(())
}

fn report(sims: &[Simulation], out: &mut impl Write) -> io::Result<()> {
    let sweep = sims.len() > 1;
    for sim in sims {
        info!("{}: {} cache accesses", sim.config().name(), sim.clock());
        if sweep {
            write!(out, "{}: ", sim.config().name())?;
        }
        writeln!(out, "{}", sim.stats())?;
    }
    Ok(())
}

fn write_stats(path: &Path, sims: &[Simulation]) -> anyhow::Result<()> {
    let stats = sims.iter().map(|s| s.make_stats()).collect::<Vec<_>>();
    let stats_file = fs::File::create(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    serde_json::to_writer_pretty(stats_file, &stats)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

fn print_usage(prog: &str) {
    println!("Usage: {prog} [-hv] -s <num> -E <num> -b <num> -t <file>");
    println!("       {prog} [-v] (--config <json> | -p <path>) -t <file> [--json <path>]");
    println!("Options:");
    println!("  -h               Print this help message.");
    println!("  -v               Optional verbose flag.");
    println!("  -s <num>         Number of set index bits.");
    println!("  -E <num>         Number of lines per set.");
    println!("  -b <num>         Number of block offset bits.");
    println!("  -t <file>        Trace file (.xz traces are decompressed).");
    println!("  --config <json>  Simulate every cache listed in a JSON config.");
    println!("  -p <path>        Read the JSON config from a file.");
    println!("  --json <path>    Write per-cache statistics as JSON.");
    println!("\nExamples:");
    println!("  {prog} -s 4 -E 1 -b 4 -t traces/yi.trace");
    println!("  {prog} -v -s 8 -E 2 -b 4 -t traces/yi.trace");
}
