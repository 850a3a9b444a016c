//! boxfab: command-line interface for support box fabrication.
//!
//! Runs the orientation pipeline on a mesh, or any single stage of it
//! (seeding, grid preparation, energy evaluation, minimization) on files
//! written by an earlier stage.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=boxfab_field=info` - Orientation and phase logging
//! - `RUST_LOG=boxfab_field=debug` - Per-box and per-step detail
//! - `RUST_LOG=boxfab_field::timing=debug` - Phase timing
//!
//! # Example
//!
//! ```bash
//! # Full run with the in-process sampler
//! boxfab fabricate part.stl -o solutions.bin
//!
//! # Use an external grid generator and keep per-orientation lists
//! boxfab -v fabricate part.obj -o solutions.bin --sampler ./grid_generator \
//!     --orientations-dir out/
//! ```

use std::path::PathBuf;

use anyhow::Result;
use boxfab_field::Direction;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{config, energy, fabricate, grid, info, minimize, seed};

/// boxfab - Grow support boxes around a mesh by energy minimization.
#[derive(Parser)]
#[command(name = "boxfab")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// One of the six canonical directions.
#[derive(Clone, Copy, ValueEnum)]
pub enum TargetArg {
    #[value(name = "+x")]
    PosX,
    #[value(name = "-x")]
    NegX,
    #[value(name = "+y")]
    PosY,
    #[value(name = "-y")]
    NegY,
    #[value(name = "+z")]
    PosZ,
    #[value(name = "-z")]
    NegZ,
}

impl From<TargetArg> for Direction {
    fn from(t: TargetArg) -> Self {
        match t {
            TargetArg::PosX => Direction::PosX,
            TargetArg::NegX => Direction::NegX,
            TargetArg::PosY => Direction::PosY,
            TargetArg::NegY => Direction::NegY,
            TargetArg::PosZ => Direction::PosZ,
            TargetArg::NegZ => Direction::NegZ,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run every orientation on a mesh and write the merged box list
    Fabricate {
        /// Input mesh file (STL or OBJ)
        input: PathBuf,

        /// Output box list
        #[arg(short, long)]
        output: PathBuf,

        /// Parameter file (TOML or JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// External grid generator program; the in-process sampler is used otherwise
        #[arg(long)]
        sampler: Option<PathBuf>,

        /// Extra argument passed to the external sampler before the mesh path
        #[arg(long = "sampler-arg", requires = "sampler")]
        sampler_args: Vec<String>,

        /// Also write one box list per orientation into this directory
        #[arg(long)]
        orientations_dir: Option<PathBuf>,

        /// Seed every face instead of only faces toward each orientation's target
        #[arg(long)]
        all_targets: bool,

        /// Run orientations concurrently
        #[arg(long)]
        parallel_orientations: bool,

        /// Grid cells along the longest mesh extent
        #[arg(long)]
        resolution: Option<u32>,

        /// Frozen band half-width around the surface, in cells
        #[arg(long)]
        kernel_distance: Option<f64>,

        /// Descent iteration cap per box
        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// Write the seed boxes of one orientation without optimizing them
    Seed {
        /// Input mesh file
        input: PathBuf,

        /// Output box list
        #[arg(short, long)]
        output: PathBuf,

        /// Orientation index (0-5)
        #[arg(long, default_value = "0")]
        orientation: usize,

        /// Grid resolution the mesh is scaled to
        #[arg(long, default_value = "50")]
        resolution: u32,

        /// Seed every face regardless of the orientation's target
        #[arg(long)]
        all_targets: bool,
    },

    /// Sample a mesh and write a prepared grid with weights and frozen band
    Grid {
        /// Input mesh file, used as-is
        input: PathBuf,

        /// Output grid state file
        #[arg(short, long)]
        output: PathBuf,

        /// Target direction for weights
        #[arg(long, default_value = "+x")]
        target: TargetArg,

        /// Parameter file supplying weight settings and the kernel distance
        #[arg(long)]
        config: Option<PathBuf>,

        /// Frozen band half-width, in cells (overrides the config)
        #[arg(long)]
        kernel_distance: Option<f64>,

        /// Grid cells of padding around the mesh
        #[arg(long, default_value = "3")]
        padding: i32,

        /// Read an existing grid data file instead of sampling
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Evaluate energy and gradient of stored boxes against a grid
    Energy {
        /// Box list file
        boxes: PathBuf,

        /// Grid state file written by `boxfab grid`
        #[arg(long)]
        grid: PathBuf,

        /// Parameter file supplying the energy settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only this box
        #[arg(long)]
        index: Option<usize>,

        /// Also compute the finite-difference gradient
        #[arg(long)]
        finite_difference: bool,
    },

    /// Run gradient descent on stored boxes
    Minimize {
        /// Box list file
        boxes: PathBuf,

        /// Grid state file written by `boxfab grid`
        #[arg(long)]
        grid: PathBuf,

        /// Output box list
        #[arg(short, long)]
        output: PathBuf,

        /// Parameter file supplying the energy and descent settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only this box
        #[arg(long)]
        index: Option<usize>,

        /// Write every accepted step of the selected box here
        #[arg(long, requires = "index")]
        trajectory: Option<PathBuf>,

        /// Descent iteration cap
        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// Display the contents of a box list or grid file
    Info {
        /// Box list, grid data or grid state file
        input: PathBuf,

        /// List every box
        #[arg(long)]
        detailed: bool,
    },

    /// Print or check fabrication parameters
    Config {
        /// Validate this parameter file instead of printing defaults
        #[arg(long)]
        check: Option<PathBuf>,

        /// Print TOML instead of JSON
        #[arg(long)]
        toml: bool,

        /// Start from a preset (fast or high-quality)
        #[arg(long)]
        preset: Option<Preset>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Preset {
    /// Coarse grid, short descents
    Fast,
    /// Fine grid, tight tolerances
    HighQuality,
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "boxfab_field=info,boxfab_mesh=info",
            2 => "boxfab_field=debug,boxfab_mesh=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Fabricate {
            input,
            output,
            config,
            sampler,
            sampler_args,
            orientations_dir,
            all_targets,
            parallel_orientations,
            resolution,
            kernel_distance,
            max_iterations,
        } => fabricate::run(
            fabricate::FabricateArgs {
                input,
                output,
                config: config.as_deref(),
                sampler: sampler.as_deref(),
                sampler_args,
                orientations_dir: orientations_dir.as_deref(),
                all_targets: *all_targets,
                parallel_orientations: *parallel_orientations,
                resolution: *resolution,
                kernel_distance: *kernel_distance,
                max_iterations: *max_iterations,
            },
            &cli,
        ),
        Commands::Seed {
            input,
            output,
            orientation,
            resolution,
            all_targets,
        } => seed::run(input, output, *orientation, *resolution, *all_targets, &cli),
        Commands::Grid {
            input,
            output,
            target,
            config,
            kernel_distance,
            padding,
            data,
        } => grid::run(
            input,
            output,
            (*target).into(),
            config.as_deref(),
            *kernel_distance,
            *padding,
            data.as_deref(),
            &cli,
        ),
        Commands::Energy {
            boxes,
            grid,
            config,
            index,
            finite_difference,
        } => energy::run(boxes, grid, config.as_deref(), *index, *finite_difference, &cli),
        Commands::Minimize {
            boxes,
            grid,
            output,
            config,
            index,
            trajectory,
            max_iterations,
        } => minimize::run(
            boxes,
            grid,
            output,
            config.as_deref(),
            *index,
            trajectory.as_deref(),
            *max_iterations,
            &cli,
        ),
        Commands::Info { input, detailed } => info::run(input, *detailed, &cli),
        Commands::Config {
            check,
            toml,
            preset,
        } => config::run(check.as_deref(), *toml, *preset, &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(field_err) = e.downcast_ref::<boxfab_field::FieldError>() {
                eprintln!("{}: {}", "Error".red().bold(), field_err);
                eprintln!("  {}: {}", "Code".cyan(), field_err.code());
                eprintln!("  {}: {:?}", "Category".cyan(), field_err.category());
            } else if let Some(mesh_err) = e.downcast_ref::<boxfab_mesh::MeshError>() {
                eprintln!("{}: {}", "Error".red().bold(), mesh_err);
                eprintln!("  {}: {}", "Code".cyan(), mesh_err.code());
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
