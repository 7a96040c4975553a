//! Command-line interface for garden-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and CLI overrides
//! - Translating arguments into export parameters
//! - The `config` subcommand

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, HeaderPolicy, LogLevel};
use crate::error::Result;
use crate::export::{ExportParams, ExportRequest};

/// Export sensing-garden records as CSV
#[derive(Parser, Debug)]
#[command(
    name = "garden-export",
    version,
    about = "Flatten sensing-garden records and export them as CSV",
    long_about = "Reads a JSON array or JSON Lines dump of sensing-garden records, flattens
nested fields into columns and writes a spreadsheet-safe CSV file."
)]
pub struct CliArgs {
    /// Record dump (JSON array or JSON Lines)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Table to export (detections, classifications, models, videos, environment, devices)
    #[arg(short = 't', long, value_name = "TABLE")]
    pub table: Option<String>,

    /// Only export records from this device
    #[arg(long, value_name = "ID")]
    pub device_id: Option<String>,

    /// Earliest timestamp (ISO 8601, e.g. 2023-07-15T10:30:00Z)
    #[arg(long, value_name = "TIME")]
    pub start_time: Option<String>,

    /// Latest timestamp (ISO 8601)
    #[arg(long, value_name = "TIME")]
    pub end_time: Option<String>,

    /// Maximum number of rows
    #[arg(short = 'l', long, value_name = "N")]
    pub limit: Option<String>,

    /// Download filename (sanitised; also the default output path)
    #[arg(long, value_name = "NAME")]
    pub filename: Option<String>,

    /// Comma-separated columns to put first
    #[arg(long, value_name = "A,B,C")]
    pub columns: Option<String>,

    /// Output path, or `-` for stdout
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// When to fix the header (buffered, streaming)
    #[arg(long, value_name = "POLICY", value_parser = ["buffered", "streaming"])]
    pub header_policy: Option<String>,

    /// Leave plain signed numbers such as -74.006 unprefixed
    #[arg(long)]
    pub allow_signed_numbers: bool,

    /// Show a progress bar on stderr
    #[arg(long)]
    pub progress: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (no summary line)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for garden-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Where the CSV goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build from already-parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and environment, then apply arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        config.validate()?;
        Ok(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Explicit config path, if one was given
    pub fn config_path(&self) -> Option<&Path> {
        self.args.config_file.as_deref()
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        if let Some(policy) = args.header_policy.as_deref() {
            config.export.header_policy = match policy {
                "streaming" => HeaderPolicy::Streaming,
                _ => HeaderPolicy::Buffered,
            };
        }

        if args.allow_signed_numbers {
            config.guard.allow_signed_numbers = true;
        }

        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Raw export parameters taken from the arguments
    pub fn export_params(&self) -> ExportParams {
        ExportParams {
            table: self.args.table.clone(),
            device_id: self.args.device_id.clone(),
            start_time: self.args.start_time.clone(),
            end_time: self.args.end_time.clone(),
            limit: self.args.limit.clone(),
            filename: self.args.filename.clone(),
            columns: self.args.columns.clone(),
        }
    }

    /// `--output`, defaulting to the request's filename in the current directory
    pub fn output_target(&self, request: &ExportRequest) -> OutputTarget {
        match self.args.output.as_deref() {
            Some(path) if path == Path::new("-") => OutputTarget::Stdout,
            Some(path) => OutputTarget::File(path.to_path_buf()),
            None => OutputTarget::File(PathBuf::from(&request.filename)),
        }
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Config { show, validate }) => {
                if *validate {
                    self.validate_config_file();
                }
                if *show || !*validate {
                    self.show_config()?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist; defaults apply");
            return;
        }

        match Config::from_file(&path).and_then(|config| config.validate()) {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => println!("Configuration is invalid: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("# Configuration file: {}", self.get_config_path().display());
        println!("{}", self.config.to_toml_string()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.config_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(Config::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::model::ShapeKind;

    fn cli(argv: &[&str]) -> CliInterface {
        let args = CliArgs::try_parse_from(argv).unwrap();
        let mut config = Config::default();
        CliInterface::apply_args_to_config(&mut config, &args);
        CliInterface { args, config }
    }

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::try_parse_from(["garden-export"]).unwrap();
        assert!(args.input.is_none());
        assert!(args.table.is_none());
        assert!(args.command.is_none());
    }

    #[test]
    fn test_export_params_from_args() {
        let cli = cli(&[
            "garden-export",
            "dump.jsonl",
            "--table",
            "classifications",
            "--device-id",
            "garden-01",
            "--start-time",
            "2023-07-01T00:00:00Z",
            "--limit",
            "100",
            "--columns",
            "species,device_id",
        ]);

        let params = cli.export_params();
        assert_eq!(params.table.as_deref(), Some("classifications"));
        assert_eq!(params.device_id.as_deref(), Some("garden-01"));
        assert_eq!(params.limit.as_deref(), Some("100"));
        assert_eq!(cli.args().input, Some(PathBuf::from("dump.jsonl")));

        let request = ExportRequest::from_params(&params, &ExportConfig::default()).unwrap();
        assert_eq!(request.shape, ShapeKind::Classification);
        assert_eq!(request.limit, 100);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = cli(&[
            "garden-export",
            "--header-policy",
            "streaming",
            "--allow-signed-numbers",
            "--vv",
        ]);
        assert_eq!(cli.config().export.header_policy, HeaderPolicy::Streaming);
        assert!(cli.config().guard.allow_signed_numbers);
        assert_eq!(cli.config().logging.level, LogLevel::Trace);
    }

    #[test]
    fn test_unknown_header_policy_is_rejected() {
        assert!(CliArgs::try_parse_from(["garden-export", "--header-policy", "lazy"]).is_err());
    }

    #[test]
    fn test_output_target() {
        let request = ExportRequest {
            filename: "detections_export_20230715T103000Z.csv".into(),
            ..ExportRequest::new(ShapeKind::Detection, &ExportConfig::default())
        };

        assert_eq!(
            cli(&["garden-export", "-o", "-"]).output_target(&request),
            OutputTarget::Stdout
        );
        assert_eq!(
            cli(&["garden-export", "-o", "out.csv"]).output_target(&request),
            OutputTarget::File(PathBuf::from("out.csv"))
        );
        assert_eq!(
            cli(&["garden-export"]).output_target(&request),
            OutputTarget::File(PathBuf::from("detections_export_20230715T103000Z.csv"))
        );
    }

    #[test]
    fn test_config_subcommand() {
        let args = CliArgs::try_parse_from(["garden-export", "config", "--show"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Config {
                show: true,
                validate: false
            })
        ));
    }
}
