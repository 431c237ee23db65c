//! Command implementations for the harp processor CLI
//!
//! Each subcommand resolves its input to a list of log files, reads each one
//! once and reports a coloured summary.

use crate::cli::args::{Args, Commands, CommonArgs, DiscoverArgs, EvaluateArgs, ReadArgs};
use crate::config::{ExportConfig, ExportFormat, ReaderConfig};
use crate::dataset::HarpDataset;
use crate::discovery::LogDiscovery;
use crate::evaluation::evaluate;
use crate::models::HarpLayout;
use crate::reader::HarpReader;
use crate::writer::DatasetWriter;
use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Totals reported at the end of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub time_steps: usize,
    pub rows_written: usize,
}

/// Main command runner
pub fn run(args: Args) -> Result<RunSummary> {
    match args.command {
        Some(Commands::Read(read)) => run_read(read),
        Some(Commands::Evaluate(evaluate)) => run_evaluate(evaluate),
        Some(Commands::Discover(discover)) => run_discover(discover),
        None => Ok(RunSummary::default()),
    }
}

fn run_read(args: ReadArgs) -> Result<RunSummary> {
    setup_logging(&args.common)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let export = args.output.export_config()?;
    let files = discover_inputs(&args.input_path)?;
    let targets = output_targets(
        args.output.output_path.as_deref(),
        &args.input_path,
        &files,
        export.format,
    )?;
    let reader = HarpReader::new(status_config(args.reader_config(), &args.common, &files));
    let start = Instant::now();

    let mut summary = RunSummary::default();
    let progress = create_progress_bar(&args.common, files.len(), "Reading harp logs");

    for (path, target) in files.iter().zip(&targets) {
        progress.set_message(file_label(path));
        match load(&reader, path) {
            Ok(dataset) => {
                summary.files_processed += 1;
                summary.time_steps += dataset.shape().0;
                progress.suspend(|| println!("{}\n{}", path.display().to_string().bold(), dataset));
                if let Some(target) = target {
                    summary.rows_written += export_dataset(&dataset, target, &export)?;
                }
            }
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                summary.files_failed += 1;
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    finish(summary, start, &args.common)
}

fn run_evaluate(args: EvaluateArgs) -> Result<RunSummary> {
    setup_logging(&args.common)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let config = args.evaluation_config()?;
    let export = args.output.export_config()?;
    let files = discover_inputs(&args.input_path)?;
    let targets = output_targets(
        args.output.output_path.as_deref(),
        &args.input_path,
        &files,
        export.format,
    )?;
    let reader = HarpReader::new(status_config(
        ReaderConfig::default().with_layout(HarpLayout::Salinity),
        &args.common,
        &files,
    ));
    let start = Instant::now();

    if args.common.verbose > 0 {
        println!("{}", config.formula.describe());
    }
    info!(
        "Evaluating {} files with {} smoothing on '{}'",
        files.len(),
        config.detector.method,
        config.resistance_channel
    );

    let mut summary = RunSummary::default();
    let progress = create_progress_bar(&args.common, files.len(), "Evaluating harp logs");

    for (path, target) in files.iter().zip(&targets) {
        progress.set_message(file_label(path));
        let evaluation = load(&reader, path).and_then(|dataset| evaluate(dataset, &config));

        match evaluation {
            Ok(evaluation) => {
                summary.files_processed += 1;
                summary.time_steps += evaluation.dataset.shape().0;

                let reference = &evaluation.reference;
                let total = reference.resistance.len();
                let detected = reference.detected_count();
                progress.suspend(|| {
                    println!(
                        "{} {} of {} freeze onsets detected on {}",
                        path.display().to_string().bold(),
                        detected.to_string().bright_white().bold(),
                        total,
                        reference.channel
                    );
                    if args.show_reference {
                        print_reference(&evaluation.reference);
                    }
                });
                if detected < total {
                    warn!(
                        "{}: {} wire pairs without freeze onset",
                        path.display(),
                        total - detected
                    );
                }

                if let Some(target) = target {
                    summary.rows_written += export_dataset(&evaluation.dataset, target, &export)?;
                }
            }
            Err(e) => {
                error!("Failed to evaluate {}: {}", path.display(), e);
                summary.files_failed += 1;
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    finish(summary, start, &args.common)
}

fn run_discover(args: DiscoverArgs) -> Result<RunSummary> {
    setup_logging(&args.common)?;

    let discovery = if args.patterns.is_empty() {
        LogDiscovery::new(&args.root)?
    } else {
        LogDiscovery::with_patterns(&args.root, &args.patterns)?
    };
    let discovery = match args.max_depth {
        Some(depth) => discovery.with_max_depth(depth),
        None => discovery,
    };

    let files = discovery.discover()?;
    for file in &files {
        println!("{}", file.display());
    }
    if !args.common.quiet {
        eprintln!(
            "{} {} harp logs",
            "Found".bright_green(),
            files.len().to_string().bright_white().bold()
        );
    }

    Ok(RunSummary {
        files_processed: files.len(),
        ..RunSummary::default()
    })
}

fn load(reader: &HarpReader, path: &Path) -> crate::error::Result<HarpDataset> {
    let (dataset, stats) = reader.read_with_stats(path)?;
    if stats.tokenizer.lines_dropped > 0 {
        info!(
            "{}: dropped {} malformed lines",
            path.display(),
            stats.tokenizer.lines_dropped
        );
    }
    Ok(dataset)
}

fn discover_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    let files = LogDiscovery::new(input)?
        .discover()
        .with_context(|| format!("Failed to search {}", input.display()))?;
    if files.is_empty() {
        anyhow::bail!("No harp logs found in {}", input.display());
    }
    Ok(files)
}

/// Per-file status lines only make sense without a progress bar
fn status_config(config: ReaderConfig, common: &CommonArgs, files: &[PathBuf]) -> ReaderConfig {
    if files.len() == 1 && common.show_progress() {
        config.with_status()
    } else {
        config
    }
}

fn export_dataset(dataset: &HarpDataset, target: &Path, config: &ExportConfig) -> Result<usize> {
    let rows = DatasetWriter::new(target, config.clone())
        .write(dataset)
        .with_context(|| format!("Failed to export {}", target.display()))?;
    info!("Exported {} rows to {}", rows, target.display());
    Ok(rows)
}

/// Output target for `input` found below `root`.
///
/// A single input goes to `output` itself, or into it when `output` is a
/// directory. Several inputs mirror their path relative to `root` inside
/// `output`.
pub fn output_file(
    output: &Path,
    root: &Path,
    input: &Path,
    multiple: bool,
    format: ExportFormat,
) -> PathBuf {
    if multiple {
        let relative = input
            .strip_prefix(root)
            .ok()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| input.file_name().map(Path::new))
            .unwrap_or(input);
        output.join(relative).with_extension(format.extension())
    } else if output.is_dir() {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        output.join(format!("{}.{}", stem, format.extension()))
    } else {
        output.to_path_buf()
    }
}

/// Export target per input file, `None` everywhere without `--output`.
///
/// Fails before anything is read when two inputs would write the same file.
pub fn output_targets(
    output: Option<&Path>,
    root: &Path,
    files: &[PathBuf],
    format: ExportFormat,
) -> Result<Vec<Option<PathBuf>>> {
    let Some(output) = output else {
        return Ok(vec![None; files.len()]);
    };

    let multiple = files.len() > 1;
    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(files.len());
    for input in files {
        let target = output_file(output, root, input, multiple, format);
        if !seen.insert(target.clone()) {
            anyhow::bail!(
                "{} and another input would both be exported to {}",
                input.display(),
                target.display()
            );
        }
        debug!("{} -> {}", input.display(), target.display());
        targets.push(Some(target));
    }
    Ok(targets)
}

fn print_reference(reference: &crate::reference::ReferenceResistance) {
    println!(
        "  {:>8}  {:>12}  {}",
        "device".bright_cyan(),
        "R0 [Ohm]".bright_cyan(),
        "onset".bright_cyan()
    );
    for (m, module) in reference.modules.iter().enumerate() {
        for (w, wire_pair) in reference.wire_pairs.iter().enumerate() {
            let onset = reference.transition_time[[m, w]]
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:>8}  {:>12.3}  {}",
                format!("{module}:{wire_pair}"),
                reference.resistance[[m, w]],
                onset
            );
        }
    }
}

fn finish(summary: RunSummary, start: Instant, common: &CommonArgs) -> Result<RunSummary> {
    if !common.quiet {
        println!("\n{}", "Processing Summary".bright_green().bold());
        println!(
            "  {} {}",
            "Time elapsed:".bright_cyan(),
            HumanDuration(start.elapsed()).to_string().bright_white()
        );
        println!(
            "  {} {}",
            "Files processed:".bright_cyan(),
            summary.files_processed.to_string().bright_white()
        );
        if summary.files_failed > 0 {
            println!(
                "  {} {}",
                "Files failed:".bright_red(),
                summary.files_failed.to_string().bright_red().bold()
            );
        }
        println!(
            "  {} {}",
            "Time steps:".bright_cyan(),
            summary.time_steps.to_string().bright_white()
        );
        if summary.rows_written > 0 {
            println!(
                "  {} {}",
                "Rows written:".bright_cyan(),
                summary.rows_written.to_string().bright_white().bold()
            );
        }
    }

    if summary.files_processed == 0 {
        anyhow::bail!("All {} input files failed", summary.files_failed);
    }
    Ok(summary)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Progress bar over files; hidden for single files and in quiet mode
pub fn create_progress_bar(common: &CommonArgs, total: usize, message: &str) -> ProgressBar {
    if total < 2 || !common.show_progress() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}

/// Set up tracing to stderr; `RUST_LOG` overrides the verbosity flags
fn setup_logging(common: &CommonArgs) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = common.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("harp_processor={}", log_level)));

    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .try_init();

    // a second command in the same process keeps the first subscriber
    if initialized.is_ok() {
        debug!("Logging initialized at level: {}", log_level);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_file_single_input() {
        let target = output_file(
            Path::new("/tmp/out.parquet"),
            Path::new("logs/harp.dat"),
            Path::new("logs/harp.dat"),
            false,
            ExportFormat::Parquet,
        );
        assert_eq!(target, PathBuf::from("/tmp/out.parquet"));
    }

    #[test]
    fn test_output_file_directory() {
        let dir = TempDir::new().unwrap();
        let target = output_file(
            dir.path(),
            Path::new("logs/harp.dat"),
            Path::new("logs/harp.dat"),
            false,
            ExportFormat::Csv,
        );
        assert_eq!(target, dir.path().join("harp.csv"));

        let target = output_file(
            Path::new("exports"),
            Path::new("logs"),
            Path::new("logs/2019/b.log"),
            true,
            ExportFormat::Parquet,
        );
        assert_eq!(target, PathBuf::from("exports/2019/b.parquet"));
    }

    #[test]
    fn test_output_targets_keep_same_stems_apart() {
        let files = vec![PathBuf::from("logs/a.dat"), PathBuf::from("logs/2019/a.dat")];
        let targets = output_targets(
            Some(Path::new("out")),
            Path::new("logs"),
            &files,
            ExportFormat::Parquet,
        )
        .unwrap();
        assert_eq!(
            targets,
            vec![
                Some(PathBuf::from("out/a.parquet")),
                Some(PathBuf::from("out/2019/a.parquet")),
            ]
        );

        let targets =
            output_targets(None, Path::new("logs"), &files, ExportFormat::Parquet).unwrap();
        assert_eq!(targets, vec![None, None]);
    }

    #[test]
    fn test_output_targets_reject_collisions() {
        let files = vec![PathBuf::from("logs/a.dat"), PathBuf::from("logs/a.log")];
        let result = output_targets(
            Some(Path::new("out")),
            Path::new("logs"),
            &files,
            ExportFormat::Csv,
        );
        let message = result.unwrap_err().to_string();
        assert!(message.contains("out/a.csv"), "{message}");
    }

    #[test]
    fn test_progress_bar_hidden_for_single_file() {
        let common = CommonArgs {
            verbose: 0,
            quiet: false,
        };
        assert!(create_progress_bar(&common, 1, "x").is_hidden());
    }
}
