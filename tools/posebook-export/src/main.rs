//! posebook-export - pose book conversion tool
//!
//! Converts pose books between JSON, PMX Editor CSV, VPD and pose clips, and
//! runs batch edits (categorize, clean, rename, capture, blend) on book files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use posebook_export::BookFormat;
use posebook_export::commands::{self, PlacementArg, Settings};

#[derive(Parser)]
#[command(name = "posebook-export")]
#[command(about = "Pose book conversion tool")]
#[command(version)]
struct Cli {
    /// Settings file (default: ./posebook.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Rig file (JSON or TOML)
    #[arg(long, global = true)]
    rig: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a book between formats
    Convert {
        /// Input book file
        input: PathBuf,

        /// Output book file
        output: PathBuf,

        /// Input format (default: from extension)
        #[arg(long, value_enum)]
        from: Option<BookFormat>,

        /// Output format (default: from extension)
        #[arg(long, value_enum)]
        to: Option<BookFormat>,

        /// Pose written to a VPD file (default: active pose)
        #[arg(long)]
        pose: Option<String>,
    },

    /// List the poses of a book
    Info {
        /// Input book file
        input: PathBuf,

        /// Input format (default: from extension)
        #[arg(short, long, value_enum)]
        format: Option<BookFormat>,
    },

    /// Guess pose categories from their names
    Categorize {
        /// Input book file
        input: PathBuf,

        /// Output book file (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Book format (default: from extension)
        #[arg(short, long, value_enum)]
        format: Option<BookFormat>,

        /// Only fill poses without a category
        #[arg(long)]
        missing_only: bool,
    },

    /// Drop bones missing from the rig or without deformation
    Clean {
        /// Input book file
        input: PathBuf,

        /// Output book file (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Book format (default: from extension)
        #[arg(short, long, value_enum)]
        format: Option<BookFormat>,

        /// Identity tolerance (overrides config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Print what would be removed without writing
        #[arg(long)]
        report_only: bool,
    },

    /// Blend weighted poses onto the rig
    Blend {
        /// Input book file
        input: PathBuf,

        /// Book format (default: from extension)
        #[arg(short, long, value_enum)]
        format: Option<BookFormat>,

        /// Pose weight, repeatable
        #[arg(short, long = "weight", value_name = "NAME=WEIGHT", value_parser = commands::parse_weight)]
        weights: Vec<(String, f64)>,

        /// Weight 1 for this pose, 0 for the rest (applied before --weight)
        #[arg(long)]
        solo: Option<String>,

        /// Reset the rig's pose before applying
        #[arg(long)]
        reset: bool,

        /// Write the posed rig here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Batch search / replace over pose or bone names
    Rename {
        /// Input book file
        input: PathBuf,

        /// Output book file (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Book format (default: from extension)
        #[arg(short, long, value_enum)]
        format: Option<BookFormat>,

        #[arg(long)]
        search: String,

        #[arg(long, default_value = "")]
        replace: String,

        /// Treat --search as a regular expression
        #[arg(long)]
        regex: bool,

        /// Rename bone entries instead of poses
        #[arg(long)]
        bones: bool,
    },

    /// Capture the rig's current pose into a book
    Capture {
        /// Book file (created when missing)
        book: PathBuf,

        /// Name of the new pose
        #[arg(short, long)]
        name: String,

        /// Book format (default: from extension)
        #[arg(short, long, value_enum)]
        format: Option<BookFormat>,

        #[arg(long, value_enum, default_value_t = PlacementArg::Append)]
        placement: PlacementArg,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref(), cli.rig.as_deref())?;

    match cli.command {
        Commands::Convert {
            input,
            output,
            from,
            to,
            pose,
        } => {
            commands::convert(&settings, &input, from, &output, to, pose.as_deref())?;
            tracing::info!("Done!");
        }

        Commands::Info { input, format } => {
            commands::info(&settings, &input, format)?;
        }

        Commands::Categorize {
            input,
            output,
            format,
            missing_only,
        } => {
            commands::categorize(&settings, &input, format, output.as_deref(), missing_only)?;
        }

        Commands::Clean {
            input,
            output,
            format,
            threshold,
            report_only,
        } => {
            commands::clean(&settings, &input, format, output.as_deref(), threshold, report_only)?;
        }

        Commands::Blend {
            input,
            format,
            weights,
            solo,
            reset,
            output,
        } => {
            commands::blend_onto_rig(
                &settings,
                &input,
                format,
                &weights,
                solo.as_deref(),
                reset,
                output.as_deref(),
            )?;
        }

        Commands::Rename {
            input,
            output,
            format,
            search,
            replace,
            regex,
            bones,
        } => {
            commands::rename(
                &settings,
                &input,
                format,
                output.as_deref(),
                &search,
                &replace,
                regex,
                bones,
            )?;
        }

        Commands::Capture {
            book,
            name,
            format,
            placement,
        } => {
            commands::capture(&settings, &book, format, &name, placement)?;
        }
    }

    Ok(())
}
