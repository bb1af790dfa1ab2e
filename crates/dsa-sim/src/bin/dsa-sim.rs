//! Command line entry point for the DSA sample generator.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dsa_core::replay::DEFAULT_PUR_THRESHOLD;
use dsa_sim::logging::{init_logging, LogConfig, LogLevel};
use dsa_sim::replay::{replay, ReplayOptions, ReplaySettings};
use dsa_sim::SimConfig;
use std::path::PathBuf;

/// Dynamic spectrum access sample generator.
#[derive(Debug, Parser)]
#[command(name = "dsa-sim", version)]
#[command(about = "Generate and evaluate dynamic spectrum access samples")]
struct Cli {
    /// Configuration file; the search path is used when omitted.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    /// Override the configured log level.
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Debug-level pretty logs with source locations.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Errors only.
    #[arg(long, short, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate samples.
    Generate {
        /// Override run.samples.
        #[arg(long)]
        samples: Option<usize>,
        /// Override run.workers.
        #[arg(long)]
        workers: Option<usize>,
        /// Override run.seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Override run.output_dir.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Evaluate the crowd-sourced manager on recorded samples.
    Replay {
        /// PU/SU lines.
        #[arg(long)]
        pus: PathBuf,
        /// Sensor reading lines, paired with the PU lines.
        #[arg(long)]
        readings: PathBuf,
        /// Sensor file, `(x, y), height, std, cost` per line.
        #[arg(long)]
        sensors: PathBuf,
        /// Reading lines start with the sensor count, as `generate` writes
        /// them.
        #[arg(long)]
        counted: bool,
        /// Use only these sensors (0-based indices into the sensor file).
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<usize>>,
        /// Threshold (dB) of the PUR given to every replayed PU.
        #[arg(long, default_value_t = DEFAULT_PUR_THRESHOLD)]
        pur_threshold: f64,
    },
    /// Print an example configuration, or write it to a file.
    ExampleConfig {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<SimConfig> {
    let config = match path {
        Some(p) => SimConfig::load_from(p).with_context(|| format!("loading {}", p.display()))?,
        None => SimConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::ExampleConfig { output } = &cli.command {
        match output {
            Some(path) => {
                SimConfig::parse(&SimConfig::example_yaml())?.save(path)?;
                println!("saved {}", path.display());
            }
            None => print!("{}", SimConfig::example_yaml()),
        }
        return Ok(());
    }

    let mut config = load_config(cli.config.as_ref())?;
    if cli.verbose {
        config.logging = LogConfig::development();
    } else if cli.quiet {
        config.logging = LogConfig::quiet();
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging);

    match cli.command {
        Command::Generate {
            samples,
            workers,
            seed,
            output,
        } => {
            if let Some(n) = samples {
                config.run.samples = n;
            }
            if let Some(n) = workers {
                config.run.workers = n;
            }
            if let Some(s) = seed {
                config.run.seed = s;
            }
            if let Some(dir) = output {
                config.run.output_dir = dir;
            }

            let report = dsa_sim::run(&config)?;
            for file in &report.files {
                println!("saved {}", file.display());
            }
            let s = &report.summary;
            println!("samples recorded: {} of {}", s.recorded, s.samples);
            println!("requests accepted: {}", s.accepted);
            if config.cs.enabled {
                println!("crowd-sourced valid/invalid: {}/{}", s.cs_valid, s.cs_invalid);
                if let (Some(d), Some(fp)) = (s.average_diff, s.average_fp_diff) {
                    println!("average difference: {d:.3} dB (false positive {fp:.3} dB)");
                }
            }
            if let Some(rate) = s.average_data_rate_mbps {
                println!("average data rate: {rate:.2} Mbps");
            }
            if let Some(std) = s.max_power_std {
                println!("max power spread: {std:.3} dB");
            }
        }
        Command::Replay {
            pus,
            readings,
            sensors,
            counted,
            select,
            pur_threshold,
        } => {
            let opts = ReplayOptions {
                pus,
                readings,
                sensors,
                settings: ReplaySettings {
                    counted,
                    pur_threshold,
                    params: config.cs.params(config.run.cell_size),
                    selected: select,
                },
            };
            let report = replay(&opts)?;
            println!("valid samples: {}", report.valid);
            println!("invalid samples: {}", report.invalid);
            if let (Some(d), Some(fp)) = (report.average_diff, report.average_fp_diff) {
                println!("average difference: {d:.3} dB");
                println!("average false positive difference: {fp:.3} dB");
            }
        }
        Command::ExampleConfig { .. } => {}
    }
    Ok(())
}
