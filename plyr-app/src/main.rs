//! Plyr command line tool
//!
//! Inspect PLY headers and extract property values:
//! - `plyr info <file>` prints the parsed header (`--json` for JSON)
//! - `plyr extract <file> -e vertex -p x,y,z` prints one row per instance

mod app;
mod errors;

use app::{AppBuilder, Command, ExtractConfig, LoggingConfig};
use clap::{Parser, Subcommand};
use plyr_data::DataType;
use std::path::PathBuf;

/// Plyr - PLY header inspection and property extraction
#[derive(Parser, Debug)]
#[command(name = "plyr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Send spans to Tracy (requires the `tracy` feature)
    #[arg(long, global = true)]
    tracy: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Print the header of a PLY file
    Info {
        file: PathBuf,

        /// Print JSON instead of PLY header text
        #[arg(long)]
        json: bool,
    },
    /// Print property values, one row per element instance
    Extract {
        file: PathBuf,

        /// Element to read
        #[arg(short, long, default_value = "vertex")]
        element: String,

        /// Comma separated property names, in output column order
        #[arg(short, long, value_delimiter = ',', required = true)]
        properties: Vec<String>,

        /// Convert every value to this type (e.g. float, int32, uchar)
        #[arg(long = "as")]
        data_type: Option<DataType>,

        /// Print at most this many rows
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Info { file, json } => Command::Info { path: file, json },
            CliCommand::Extract {
                file,
                element,
                properties,
                data_type,
                limit,
            } => Command::Extract {
                path: file,
                config: ExtractConfig {
                    element,
                    properties,
                    data_type,
                    limit,
                },
            },
        }
    }
}

fn main() {
    let args = Args::parse();

    let result = AppBuilder::new()
        .with_logging(LoggingConfig {
            level: args.log_level,
            enable_tracy: args.tracy,
        })
        .with_command(args.command.into())
        .run();

    if let Err(e) = result {
        eprintln!("plyr failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extract_args() {
        let args = Args::try_parse_from([
            "plyr", "extract", "mesh.ply", "-e", "face", "-p", "vertex_indices,flags", "--as",
            "uint", "--limit", "10",
        ])
        .unwrap();
        assert_eq!(args.log_level, "info");

        match Command::from(args.command) {
            Command::Extract { path, config } => {
                assert_eq!(path, PathBuf::from("mesh.ply"));
                assert_eq!(config.element, "face");
                assert_eq!(config.properties, vec!["vertex_indices", "flags"]);
                assert_eq!(config.data_type, Some(DataType::UInt32));
                assert_eq!(config.limit, Some(10));
            }
            Command::Info { .. } => panic!("expected extract"),
        }
    }

    #[test]
    fn test_parse_info_args() {
        let args =
            Args::try_parse_from(["plyr", "--log-level", "debug", "info", "a.ply", "--json"])
                .unwrap();
        assert_eq!(args.log_level, "debug");
        assert!(matches!(
            Command::from(args.command),
            Command::Info { json: true, .. }
        ));
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert!(
            Args::try_parse_from(["plyr", "extract", "a.ply", "-p", "x", "--as", "int64"])
                .is_err()
        );
    }
}
