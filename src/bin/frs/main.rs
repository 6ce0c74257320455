//! frs-cli - inspect and extract results from `.frs` files.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use frs_rdb::prelude::*;

#[derive(Parser)]
#[command(name = "frs-cli", about = "Inspect and extract results from .frs files", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logs; RUST_LOG overrides
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all logs
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Extractor options as JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-file summary: module, date, layout, time range and warnings
    Info {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the merged hierarchy
    Tree {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the union of time keys
    Times {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Read one result
    Get {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Object group type; omit for top-level results
        #[arg(long = "type", short = 't')]
        og_type: Option<String>,

        /// Object group base id
        #[arg(long, short = 'b', default_value_t = 0)]
        base_id: i32,

        /// `|`-separated description path, `*` matches anything
        #[arg(long, short = 'p')]
        path: String,

        /// Read at this time instead of the first step
        #[arg(long, conflicts_with = "all")]
        time: Option<f64>,

        /// Read every time step
        #[arg(long)]
        all: bool,
    },
}

/// Log filter for the CLI flags. `RUST_LOG` wins unless `-q` is given.
fn log_filter(cli: &Cli, rust_log: Option<&str>) -> EnvFilter {
    if cli.quiet {
        return EnvFilter::new("off");
    }
    let fallback = if cli.verbose { "debug" } else { "warn" };
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

fn init_tracing(cli: &Cli) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli, rust_log.as_deref()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ExtractorConfig::load(path)?,
        None => ExtractorConfig::default(),
    };
    let mut rdb = Extractor::with_config(config);
    let mut out = io::stdout().lock();

    match &cli.command {
        Commands::Info { files } => {
            open(&mut rdb, files)?;
            for (_, c) in rdb.containers() {
                writeln!(out, "{}", c.path().display())?;
                let kind = if c.is_modes_file() { " (eigenmodes)" } else { "" };
                writeln!(out, "  module:    {}{kind}", c.module())?;
                writeln!(out, "  endian:    {:?}", c.endian())?;
                writeln!(out, "  header:    {} bytes", c.header_size())?;
                writeln!(out, "  step size: {} bytes", c.step_size())?;
                writeln!(out, "  steps:     {} ({} indexed)", c.step_count(), c.times().len())?;
                if let (Some(first), Some(last)) = (c.times().first_key(), c.times().last_key()) {
                    writeln!(out, "  time:      {first} .. {last}")?;
                }
                for w in c.warnings() {
                    writeln!(out, "  warning:   {w}")?;
                }
            }
        }
        Commands::Tree { files } => {
            open(&mut rdb, files)?;
            rdb.dump_hierarchy(&mut out)?;
        }
        Commands::Times { files } => {
            open(&mut rdb, files)?;
            for key in rdb.valid_keys() {
                writeln!(out, "{key}")?;
            }
        }
        Commands::Get { files, og_type, base_id, path, time, all } => {
            open(&mut rdb, files)?;
            let descr = ResultDescription::new(og_type.clone().unwrap_or_default())
                .with_base_id(*base_id)
                .with_path(path);
            let entries = if descr.has_wildcards() {
                rdb.search_all(&descr)
            } else {
                rdb.search(&descr).into_iter().collect()
            };
            if entries.is_empty() {
                return Err(Error::other(format!("no result for {descr}")));
            }
            let ops = entries.iter().map(|&e| rdb.read_operation(e)).collect::<Result<Vec<_>>>()?;

            match time {
                Some(t) => {
                    rdb.position(*t);
                }
                None => {
                    rdb.reset_positioning();
                }
            }
            loop {
                for (op, &entry) in ops.iter().zip(&entries) {
                    let value = op.evaluate(&rdb).map_or_else(|| "-".to_string(), |v| v.to_string());
                    let time = rdb.current_time().map_or_else(|| "-".to_string(), |t| t.to_string());
                    writeln!(out, "{time}\t{}\t{value}", rdb.describe(entry))?;
                }
                if !*all || !rdb.step_to_next_time() {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn open(rdb: &mut Extractor, files: &[PathBuf]) -> Result<()> {
    if rdb.add_files(files) {
        Ok(())
    } else {
        Err(Error::other("some files could not be opened"))
    }
}
