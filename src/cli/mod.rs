// src/cli/mod.rs — CLI definition (clap derive)

pub mod convert;
pub mod inspect;
pub mod progress;
pub mod repair;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "manifix", about = "STL repair service and drop-folder watcher", version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API, watcher and session cleanup (default)
    Serve,
    /// Run the drop-folder watcher and session cleanup only
    Watch,
    /// Inspect a mesh and print its issue counts
    Analyze {
        file: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Run the staged repair with live progress
    Repair {
        file: PathBuf,
        /// Where to put the repaired file (defaults to the input's directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// One-shot repair with every flag at once, as the watcher does
    Fix {
        file: PathBuf,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Convert a mesh to another format
    Convert {
        file: PathBuf,
        /// Target format: 3mf, stl, obj, ply, off, glb
        #[arg(long, default_value = "stl")]
        to: String,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

/// The input's own directory when no `--out-dir` was given.
pub(crate) fn output_dir_for(file: &std::path::Path, out_dir: Option<PathBuf>) -> PathBuf {
    out_dir.unwrap_or_else(|| match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_defaults_to_stl() {
        let cli = Cli::parse_from(["manifix", "convert", "part.obj"]);
        match cli.command {
            Some(Commands::Convert { to, .. }) => assert_eq!(to, "stl"),
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::parse_from(["manifix", "--verbose"]);
        assert!(cli.command.is_none());
        assert!(cli.verbose);
    }

    #[test]
    fn test_output_dir_defaults_to_input_dir() {
        assert_eq!(
            output_dir_for(std::path::Path::new("/data/in/part.stl"), None),
            PathBuf::from("/data/in")
        );
        assert_eq!(
            output_dir_for(std::path::Path::new("part.stl"), None),
            PathBuf::from(".")
        );
    }
}
