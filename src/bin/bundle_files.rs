use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use file_bundler::{
    commands::{extract::extract_files, list::list_files, pack::pack_files},
    VERBOSE,
};
use glob::Pattern;

#[derive(Debug, Subcommand)]
enum Command {
    /// Pack files into a single bundle
    Pack {
        /// Path of the bundle to create
        output: PathBuf,
        /// Files to pack, in bundle order
        #[arg(num_args = 1..)]
        inputs: Vec<PathBuf>,
    },
    /// Extract matched files to a folder
    Extract {
        /// Path to the bundle
        bundle: PathBuf,
        /// Path to the folder to output the extracted files
        output_folder: PathBuf,
        /// Glob patterns to filter the list of files
        #[clap(default_value = "**")]
        #[arg(num_args = 1..)]
        globs: Vec<Pattern>,
    },
    /// List bundled files
    List {
        /// Path to the bundle
        bundle: PathBuf,
        /// Glob patterns to filter the list of files
        #[clap(default_value = "**")]
        #[arg(num_args = 1..)]
        globs: Vec<Pattern>,
    },
}

/// Packs named files into a single bundle file and extracts them back out.
#[derive(Parser, Debug)]
#[command(name = "bundle_files")]
#[clap(version)]
struct Cli {
    /// Verbose printing of non-fatal error messages
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    VERBOSE.set(cli.verbose).unwrap();

    match cli.command {
        Command::Pack { output, inputs } => {
            pack_files(&output, &inputs).context("Pack command failed")?
        }
        Command::Extract {
            bundle,
            output_folder,
            globs,
        } => extract_files(&bundle, &globs, &output_folder).context("Extract command failed")?,
        Command::List { bundle, globs } => {
            list_files(&bundle, &globs).context("List command failed")?
        }
    }

    Ok(())
}
