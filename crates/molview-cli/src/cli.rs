use clap::{Args, Parser, Subcommand};
use molview::core::io::format::Format;
use molview::core::surface::SurfaceType;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "molview CLI - inspect molecular structures, evaluate atom selections and extract molecular surfaces.",
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

    /// Set the number of threads for surface computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize the atoms, bonds, chains and residues of a structure file.
    Info(InfoArgs),
    /// Evaluate an atom selection and optionally export the matching atoms as PDB.
    Select(SelectArgs),
    /// Extract a molecular surface and write it as a Wavefront OBJ mesh.
    Surface(SurfaceArgs),
}

/// Input shared by every subcommand.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Path to the input structure file (PDB, SDF, MOL2, XYZ or cube).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Input format. Guessed from the file extension when omitted.
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub format: Option<Format>,
}

/// Arguments for the `info` subcommand.
#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

/// Arguments for the `select` subcommand.
#[derive(Args, Debug)]
pub struct SelectArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Selection terms, e.g. `chain=A` `resi=10-20,42` `elem=C,N`. All terms must hold.
    #[arg(short = 's', long = "select", value_name = "KEY=VALUE", num_args(1..))]
    pub selection: Vec<String>,

    /// Write the selected atoms (and bonds among them) to a PDB file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print one line per selected atom.
    #[arg(short, long)]
    pub list: bool,
}

/// Arguments for the `surface` subcommand.
#[derive(Args, Debug)]
pub struct SurfaceArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Path for the output OBJ mesh.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Surface type: vdw, ms, sas or ses.
    #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "ses")]
    pub surface_type: SurfaceType,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the probe radius in Angstroms.
    #[arg(short = 'p', long, value_name = "FLOAT")]
    pub probe_radius: Option<f64>,

    /// Override the grid spacing in Angstroms.
    #[arg(short = 'r', long, value_name = "FLOAT")]
    pub resolution: Option<f64>,

    /// Compute the surface on a background thread.
    #[arg(long = "async")]
    pub run_async: bool,

    /// Emit one normal per triangle instead of smoothed vertex normals.
    #[arg(long)]
    pub flat_normals: bool,

    /// Atoms whose part of the surface is kept.
    #[arg(long = "display", value_name = "KEY=VALUE", num_args(1..))]
    pub display: Vec<String>,

    /// Atoms that contribute to the surface field.
    #[arg(long = "context", value_name = "KEY=VALUE", num_args(1..))]
    pub context: Vec<String>,

    /// Clip the mesh to the neighbourhood of these atoms.
    #[arg(long = "focus", value_name = "KEY=VALUE", num_args(1..))]
    pub focus: Vec<String>,

    /// Override individual configuration values, e.g. `surface.probe-radius=1.2`.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
