//! Command-line argument definitions for the harp processor
//!
//! Defines the CLI using the clap derive API and converts parsed arguments
//! into the library configuration types.

use crate::config::{
    CompressionAlgorithm, DetectorConfig, EvaluationConfig, ExportConfig, ExportFormat,
    ReaderConfig,
};
use crate::constants::{
    COMMENT_MARKER, DEFAULT_GRADIENT_LAG, DEFAULT_MEDIAN_WINDOW, DEFAULT_RESISTANCE_CHANNEL,
};
use crate::error::{HarpError, Result};
use crate::models::HarpLayout;
use crate::salinity::BrineFormula;
use crate::smoothing::SmoothingMethod;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// CLI arguments for the harp processor
///
/// Reads salinity and light harp logs, regularises them onto a
/// (time, module, wire_pair) grid and optionally evaluates brine salinity
/// and phase fractions.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "harp-processor",
    version,
    about = "Read and evaluate salinity and light harp logs",
    long_about = "Reads the line-oriented logs written by salinity harps and light harps in \
                  sea-ice field deployments, reconstructs regular multiplexer scan cycles and \
                  derives reference resistance, brine salinity, liquid/solid fraction and bulk \
                  salinity. Results can be exported to Parquet or CSV."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Read harp logs into regular datasets and print a summary
    Read(ReadArgs),
    /// Read salinity harp logs and derive salinity and phase fractions
    Evaluate(EvaluateArgs),
    /// List harp log files below a directory
    Discover(DiscoverArgs),
}

/// Options shared by all subcommands
#[derive(Debug, Clone, ClapArgs)]
pub struct CommonArgs {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only show errors. Overrides verbose settings.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl CommonArgs {
    /// Log level implied by the verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

/// Output options shared by read and evaluate
#[derive(Debug, Clone, ClapArgs)]
pub struct OutputArgs {
    /// Output file, or directory when several logs are processed
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// Export format (parquet, csv)
    #[arg(long = "format", value_name = "FORMAT", default_value = "parquet")]
    pub format: String,

    /// Parquet compression algorithm (snappy, zstd, lz4, none)
    #[arg(long = "compression", value_name = "ALGORITHM", default_value = "snappy")]
    pub compression: String,
}

impl OutputArgs {
    pub fn export_config(&self) -> Result<ExportConfig> {
        Ok(ExportConfig::default()
            .with_format(self.format.parse::<ExportFormat>()?)
            .with_compression(self.compression.parse::<CompressionAlgorithm>()?))
    }
}

/// Log layouts selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    /// `i:k: time r2 d2 r16 d16 temperature logger_temp`
    Salinity,
    /// `cnt stick:diode:amplifier time C R G B Temp`
    Light,
}

impl From<LayoutArg> for HarpLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Salinity => HarpLayout::Salinity,
            LayoutArg::Light => HarpLayout::Light,
        }
    }
}

/// Arguments for the read command
#[derive(Debug, Clone, Parser)]
pub struct ReadArgs {
    /// Log file or directory containing log files
    #[arg(value_name = "INPUT")]
    pub input_path: PathBuf,

    /// Force a log layout instead of inferring it
    #[arg(short = 'l', long = "layout", value_enum)]
    pub layout: Option<LayoutArg>,

    /// Character marking comment lines
    #[arg(long = "comment-marker", default_value_t = COMMENT_MARKER)]
    pub comment_marker: char,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl ReadArgs {
    pub fn validate(&self) -> Result<()> {
        validate_input(&self.input_path)
    }

    pub fn reader_config(&self) -> ReaderConfig {
        let config = ReaderConfig::default().with_comment_marker(self.comment_marker);
        match self.layout {
            Some(layout) => config.with_layout(layout.into()),
            None => config,
        }
    }
}

/// Arguments for the evaluate command
#[derive(Debug, Clone, Parser)]
pub struct EvaluateArgs {
    /// Salinity harp log file or directory containing log files
    #[arg(value_name = "INPUT")]
    pub input_path: PathBuf,

    /// Only evaluate this module
    #[arg(short = 'm', long = "module", value_name = "ID")]
    pub module: Option<u32>,

    /// Resistance channel used for the reference resistance
    #[arg(long = "channel", default_value = DEFAULT_RESISTANCE_CHANNEL)]
    pub channel: String,

    /// Brine salinity formula (Assur, N&W09, Vancoppenolle)
    #[arg(long = "formula", default_value = "Vancoppenolle")]
    pub formula: String,

    /// Smoothing method for freeze-onset detection (median, butterworth, savgol)
    #[arg(long = "method", default_value = "butterworth")]
    pub method: String,

    /// Derivative tolerance band as LOW,HIGH
    #[arg(long = "tolerance", value_name = "LOW,HIGH", default_value = "1e-4,3e-4")]
    pub tolerance: String,

    /// Centered difference lag in samples
    #[arg(long = "lag", default_value_t = DEFAULT_GRADIENT_LAG)]
    pub lag: usize,

    /// Moving median window applied to the derivative
    #[arg(long = "median-window", default_value_t = DEFAULT_MEDIAN_WINDOW)]
    pub median_window: usize,

    /// Print the reference resistance of every wire pair
    #[arg(long = "show-reference")]
    pub show_reference: bool,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl EvaluateArgs {
    pub fn validate(&self) -> Result<()> {
        validate_input(&self.input_path)?;
        self.evaluation_config()?.detector.validate()
    }

    pub fn evaluation_config(&self) -> Result<EvaluationConfig> {
        let (low, high) = parse_tolerance(&self.tolerance)?;
        let detector = DetectorConfig::default()
            .with_method(self.method.parse::<SmoothingMethod>()?)
            .with_tolerance(low, high)
            .with_lag(self.lag)
            .with_median_window(self.median_window);

        let config = EvaluationConfig::default()
            .with_resistance_channel(self.channel.clone())
            .with_formula(self.formula.parse::<BrineFormula>()?)
            .with_detector(detector);
        Ok(match self.module {
            Some(module) => config.with_module(module),
            None => config,
        })
    }
}

/// Arguments for the discover command
#[derive(Debug, Clone, Parser)]
pub struct DiscoverArgs {
    /// Directory to search
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// File name glob, may be repeated (defaults to *.dat, *.txt, *.log)
    #[arg(short = 'p', long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// Maximum directory depth
    #[arg(long = "max-depth", value_name = "N")]
    pub max_depth: Option<usize>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Parse a `LOW,HIGH` tolerance band
pub fn parse_tolerance(value: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 2 {
        return Err(HarpError::invalid_argument(format!(
            "tolerance must be LOW,HIGH, got '{value}'"
        )));
    }
    let parse = |s: &str| {
        s.trim().parse::<f64>().map_err(|_| {
            HarpError::invalid_argument(format!("invalid tolerance bound '{}'", s.trim()))
        })
    };
    Ok((parse(parts[0])?, parse(parts[1])?))
}

fn validate_input(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(HarpError::Configuration {
            message: format!("Input path does not exist: {}", path.display()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_evaluate_args() {
        let args = Args::parse_from([
            "harp-processor",
            "evaluate",
            "harp.dat",
            "--module",
            "1",
            "--formula",
            "Assur",
            "--method",
            "savgol",
            "--tolerance",
            "3e-4,1e-4",
            "-vv",
        ]);
        let Some(Commands::Evaluate(evaluate)) = args.command else {
            panic!("Expected evaluate command");
        };

        assert_eq!(evaluate.common.get_log_level(), "debug");
        let config = evaluate.evaluation_config().unwrap();
        assert_eq!(config.module, Some(1));
        assert_eq!(config.formula, BrineFormula::Assur);
        assert_eq!(config.detector.method, SmoothingMethod::SavitzkyGolay);
        assert_eq!(config.detector.sorted_tolerance(), (1e-4, 3e-4));
        assert_eq!(config.resistance_channel, "r16");
    }

    #[test]
    fn test_parse_read_args() {
        let args = Args::parse_from([
            "harp-processor",
            "read",
            "logs/",
            "--layout",
            "light",
            "--format",
            "csv",
            "-q",
        ]);
        let Some(Commands::Read(read)) = args.command else {
            panic!("Expected read command");
        };

        assert_eq!(read.reader_config().layout, Some(HarpLayout::Light));
        assert_eq!(read.output.export_config().unwrap().format, ExportFormat::Csv);
        assert_eq!(read.common.get_log_level(), "error");
        assert!(!read.common.show_progress());
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let args = Args::parse_from(["harp-processor", "evaluate", "x", "--method", "kalman"]);
        let Some(Commands::Evaluate(evaluate)) = args.command else {
            panic!("Expected evaluate command");
        };
        assert!(matches!(
            evaluate.evaluation_config(),
            Err(HarpError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_parse_tolerance() {
        assert_eq!(parse_tolerance("1e-4, 3e-4").unwrap(), (1e-4, 3e-4));
        assert!(parse_tolerance("1e-4").is_err());
        assert!(parse_tolerance("a,b").is_err());
    }

    #[test]
    fn test_validate_missing_input() {
        let args = Args::parse_from(["harp-processor", "read", "/nonexistent/harp.dat"]);
        let Some(Commands::Read(read)) = args.command else {
            panic!("Expected read command");
        };
        assert!(matches!(read.validate(), Err(HarpError::Configuration { .. })));
    }
}
