/// Command line interface for `washfit` executable
#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "washfit",
    about = "Fit wash-in / wash-out models to every voxel of a 4-D image volume",
)]
pub (super) struct Cli {
    #[clap(subcommand)]
    pub (super) command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub (super) enum Command {

    /// Fit a raw volume and write the result maps
    Fit(FitArgs),

    /// Generate a synthetic volume with known parameters
    Simulate(SimulateArgs),

    /// Write a configuration file holding every default value
    Config {
        /// Destination; printed to stdout if omitted
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub (super) struct FitArgs {
    /// Raw little-endian f32 volume, x fastest, then y, z and t
    pub volume: PathBuf,

    /// Spatial dimensions of the volume
    #[clap(short, long, value_parser = parse_triplet::<usize>)]
    pub shape: (usize, usize, usize),

    /// Time axis: one value per line, in seconds
    #[clap(short, long)]
    pub time: PathBuf,

    /// The time axis file holds hhmmss.frac acquisition times
    #[clap(long)]
    pub acquisition_times: bool,

    /// Raw f32 masks with the volume's spatial shape, summed into one.
    /// Without masks the volume is masked automatically.
    #[clap(short, long)]
    pub mask: Vec<PathBuf>,

    /// TOML fitting configuration
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Sort inverted bound triples in the configuration instead of rejecting them
    #[clap(long, requires = "config")]
    pub repair_bounds: bool,

    /// Fit only this slice
    #[clap(long, conflicts_with = "voxel")]
    pub slice: Option<usize>,

    /// Fit only this voxel
    #[clap(long, value_parser = parse_triplet::<usize>)]
    pub voxel: Option<(usize, usize, usize)>,

    #[clap(flatten)]
    pub output: OutputArgs,

    #[clap(flatten)]
    pub threads: ThreadArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub (super) struct SimulateArgs {
    /// TOML simulation description; defaults are used if omitted
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Override the seed of the simulation
    #[clap(long)]
    pub seed: Option<u64>,

    /// Fit the simulated volume straight away, with this TOML fitting
    /// configuration or the defaults
    #[clap(long)]
    pub fit: Option<Option<PathBuf>>,

    #[clap(flatten)]
    pub output: OutputArgs,

    #[clap(flatten)]
    pub threads: ThreadArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub (super) struct OutputArgs {
    /// Directory for all output files
    #[clap(short, long, default_value = "washfit-out")]
    pub out: PathBuf,

    /// Study identifier written at the top of CSV tables
    #[clap(long, default_value = "no_id")]
    pub study_uid: String,

    /// Also write a by-slice CSV table for each of these mask labels
    #[clap(short, long)]
    pub label: Vec<i32>,
}

#[derive(clap::Args, Debug, Clone)]
pub (super) struct ThreadArgs {
    /// Fit the voxels of each slice in parallel
    #[clap(short, long)]
    pub parallel: bool,

    /// Maximum number of rayon threads
    #[clap(short = 'j', long, default_value = "4")]
    pub threads: usize,
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::path::PathBuf;
use washfit::utils::parse_triplet;
