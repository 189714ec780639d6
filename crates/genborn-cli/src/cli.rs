use clap::{Args, Parser, Subcommand};
use genborn::engine::config::GbAlgorithm;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "genborn CLI - Generalized Born implicit-solvent energies, Born radii and forces for small molecular systems.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one GB evaluation on a system and report energies, radii and forces.
    Compute(ComputeArgs),
}

/// Arguments for the `compute` subcommand.
#[derive(Args, Debug)]
pub struct ComputeArgs {
    // --- Inputs ---
    /// Path to the system description (atoms, bonds, angles, 1-4 pairs) in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub system: PathBuf,

    /// Path to the per-type GB radii and scale factors in CSV format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub types: PathBuf,

    /// Path to the global GB settings (probe radius, surface tensions) in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Path to a run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Overrides ---
    /// Born radius model: still, hct or obc.
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<GbAlgorithm>,

    /// Cutoff in nm for the short-range pair search.
    #[arg(long, value_name = "FLOAT")]
    pub cutoff: Option<f64>,

    /// Number of in-process ranks to split the evaluation across.
    #[arg(short = 'n', long, value_name = "INT")]
    pub ranks: Option<usize>,

    /// Use the tabulated logarithm in the HCT/OBC overlap integrals.
    #[arg(long)]
    pub log_table: bool,

    // --- Output ---
    /// Write per-atom Born radii and forces to this CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}
