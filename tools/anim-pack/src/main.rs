//! anim-pack - animation converter
//!
//! Packs tool documents (.json) into compressed containers (.anpk) and
//! unpacks containers back into documents.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use anim_pack::{convert, exit_code, load_skeletons, manifest, Format, Space};

#[derive(Parser)]
#[command(name = "anim-pack")]
#[command(about = "Animation pack/unpack tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a tool document into a compressed container
    Pack {
        /// Input document
        input: PathBuf,

        /// Output container
        output: PathBuf,

        /// Skeleton sources, primary first
        #[arg(required = true)]
        skeletons: Vec<PathBuf>,

        #[arg(short, long, value_enum, default_value_t)]
        format: Format,
    },

    /// Unpack a compressed container into a tool document
    Unpack {
        /// Input container
        input: PathBuf,

        /// Output document
        output: PathBuf,

        /// Skeleton sources, primary first
        #[arg(required = true)]
        skeletons: Vec<PathBuf>,

        /// Key space of the written clips
        #[arg(short, long, value_enum, default_value_t)]
        space: Space,
    },

    /// Write the skeletons of a document into a skeleton source
    Skeleton {
        /// Input document
        input: PathBuf,

        /// Output container
        output: PathBuf,

        #[arg(short, long, value_enum, default_value_t)]
        format: Format,
    },

    /// Show the contents of a container
    Info {
        /// Input container
        input: PathBuf,
    },

    /// Run every job of a manifest
    Build {
        /// Path to the batch manifest
        #[arg(default_value = "anim-pack.toml")]
        manifest: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Pack {
            input,
            output,
            skeletons,
            format,
        } => {
            let skeletons = load_skeletons(&skeletons)?;
            convert::pack(&input, &output, &skeletons, format)?;
        }

        Commands::Unpack {
            input,
            output,
            skeletons,
            space,
        } => {
            let skeletons = load_skeletons(&skeletons)?;
            convert::unpack(&input, &output, &skeletons, space)?;
        }

        Commands::Skeleton {
            input,
            output,
            format,
        } => convert::skeleton(&input, &output, format)?,

        Commands::Info { input } => convert::info(&input)?,

        Commands::Build { manifest } => {
            tracing::info!("Building from {:?}", manifest);
            let config = manifest::load_manifest(&manifest)?;
            let base_dir = manifest.parent().unwrap_or(std::path::Path::new(""));
            manifest::build_all(&config, base_dir)?;
            tracing::info!("Build complete!");
        }
    }
    Ok(())
}
