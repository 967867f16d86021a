//! # CLI Module
//!
//! Command-line interface for the image curator.
//!
//! ## Usage
//! ```bash
//! # Curate a directory with the stages listed in curation.yaml
//! image-curator run data/original_raw --output data/final --config curation.yaml
//!
//! # See what would survive without copying anything
//! image-curator run data/original_raw --config curation.yaml --dry-run
//!
//! # JSON report on stdout, CSV report on disk
//! image-curator run data/original_raw -o data/final -c curation.yaml \
//!     --output-format json --report report.csv
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use image_curator::core::config::CurationConfig;
use image_curator::core::oracle::AnnotationProvider;
use image_curator::core::pipeline::{PipelineBuilder, PipelineResult};
use image_curator::core::report::{export_to_file, ExportFormat};
use image_curator::error::{ConfigError, CurateError, Result};
use image_curator::events::{Event, EventChannel, PipelineEvent, ScanEvent, StageEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

/// Image Curator - Narrow an image collection down, one auditable stage at a time
#[derive(Parser, Debug)]
#[command(name = "image-curator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the configured stages over an input directory
    Run {
        /// Input directory (defaults to `input` from the config)
        input: Option<PathBuf>,

        /// Output directory for surviving images (defaults to `output` from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// YAML file listing the stages and their options
        #[arg(short, long)]
        config: PathBuf,

        /// How to print results
        #[arg(long, default_value = "pretty")]
        output_format: OutputFormat,

        /// Decide items one at a time instead of in parallel
        #[arg(long)]
        sequential: bool,

        /// Also write the report to this file (.csv for CSV, JSON otherwise)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Run every stage but persist nothing
        #[arg(long)]
        dry_run: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (surviving ids only)
    Minimal,
}

struct RunArgs {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config: PathBuf,
    format: OutputFormat,
    sequential: bool,
    report: Option<PathBuf>,
    dry_run: bool,
    verbose: bool,
}

/// Run the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            config,
            output_format,
            sequential,
            report,
            dry_run,
            verbose,
        } => {
            image_curator::init_tracing(if verbose { "debug" } else { "warn" });
            run_curation(RunArgs {
                input,
                output,
                config,
                format: output_format,
                sequential,
                report,
                dry_run,
                verbose,
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            print_error(&error);
            ExitCode::FAILURE
        }
    }
}

fn run_curation(args: RunArgs) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(args.format, OutputFormat::Pretty);

    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Image Curator").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let config = CurationConfig::load(&args.config)?;

    // Annotation paths in the config are relative to the config file
    let config_dir = args
        .config
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let provider = Arc::new(AnnotationProvider::new().with_base_dir(config_dir));

    let input = args
        .input
        .or_else(|| config.input.clone())
        .ok_or_else(|| ConfigError::Missing("input directory (argument or config)".to_string()))?;

    let mut builder = PipelineBuilder::from_config(&config, provider)
        .input(input)
        .dry_run(args.dry_run);
    if args.sequential {
        builder = builder.parallel(false);
    }
    if let Some(output) = args.output {
        builder = builder.output(output);
    }
    let mut pipeline = builder.build()?;

    let (sender, receiver) = EventChannel::new();

    let progress = pretty.then(|| {
        let pb = ProgressBar::new(0);
        if let Ok(bar) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar.progress_chars("█▓░"));
        }
        pb
    });

    let progress_clone = progress.clone();
    let verbose = args.verbose;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Scan(ScanEvent::Completed { total_items }) => {
                    pb.set_length(total_items as u64);
                }
                Event::Scan(ScanEvent::Error { path, message }) if verbose => {
                    pb.println(format!("  skipped {}: {}", path.display(), message));
                }
                Event::Stage(StageEvent::Started { name, count_in, .. }) => {
                    pb.set_length(count_in as u64);
                    pb.set_position(0);
                    pb.set_message(name);
                }
                Event::Stage(StageEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                }
                Event::Stage(StageEvent::Completed(summary)) if verbose => {
                    pb.println(format!(
                        "  {} {} -> {}",
                        summary.name, summary.count_in, summary.count_out
                    ));
                }
                Event::Pipeline(PipelineEvent::Aborted { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = pipeline.run_with_events(&sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let result = result?;

    if let Some(path) = &args.report {
        export_to_file(&result.report, path, ExportFormat::from_path(path)).map_err(|source| {
            CurateError::Report {
                path: path.clone(),
                source,
            }
        })?;
    }

    match args.format {
        OutputFormat::Pretty => print_pretty_results(&term, &result, args.verbose),
        OutputFormat::Json => print_json_results(&result),
        OutputFormat::Minimal => print_minimal_results(&result),
    }

    Ok(())
}

fn print_error(error: &CurateError) {
    let term = Term::stderr();
    let prefix = match error.stage_name() {
        Some(stage) => format!("Aborted in stage '{}':", stage),
        None => "Aborted:".to_string(),
    };
    term.write_line(&format!("{} {}", style(prefix).red().bold(), error))
        .ok();
    if !matches!(error, CurateError::Persist(_) | CurateError::Report { .. }) {
        term.write_line(&format!(
            "{}",
            style("No files were written to the output directory.").dim()
        ))
        .ok();
    }
}

fn print_pretty_results(term: &Term, result: &PipelineResult, verbose: bool) {
    let report = &result.report;

    term.write_line(&format!("{} Curation Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    let width = report
        .stages
        .iter()
        .map(|s| s.stage_name.len())
        .max()
        .unwrap_or(0)
        .max("Stage".len());

    term.write_line(&format!(
        "  {}",
        style(format!("{:<width$}  {:>8}  {:>8}  {:>8}", "Stage", "In", "Out", "Dropped"))
            .bold()
            .underlined()
    ))
    .ok();

    for stage in &report.stages {
        term.write_line(&format!(
            "  {:<width$}  {:>8}  {:>8}  {:>8}",
            stage.stage_name,
            stage.count_in,
            stage.count_out,
            style(stage.dropped()).yellow()
        ))
        .ok();

        if verbose {
            for (reason, count) in &stage.drop_reasons {
                term.write_line(&format!("      {} {}", style(format!("{count:>5}")).dim(), style(reason).dim()))
                    .ok();
            }
        }
    }

    term.write_line("").ok();
    term.write_line(&format!(
        "  {} -> {} images ({} filtered, {} retained) in {:.1}s",
        style(report.initial_count).cyan(),
        style(report.final_count).cyan(),
        style(report.filtered_count()).yellow(),
        style(format!("{:.1}%", report.retention_percent())).green(),
        report.duration_ms() as f64 / 1000.0
    ))
    .ok();

    match result.persisted {
        Some(summary) => {
            term.write_line(&format!(
                "  {} written, {} already present",
                style(summary.written).cyan(),
                style(summary.already_present).dim()
            ))
            .ok();
        }
        None => {
            term.write_line(&format!(
                "  {}",
                style("Dry run: nothing was written.").dim()
            ))
            .ok();
        }
    }

    if !result.scan_errors.is_empty() {
        term.write_line(&format!(
            "  {} entries skipped during discovery",
            style(result.scan_errors.len()).yellow()
        ))
        .ok();
        if verbose {
            for error in &result.scan_errors {
                term.write_line(&format!("    {}", style(error).dim())).ok();
            }
        }
    }
}

fn print_json_results(result: &PipelineResult) {
    let output = serde_json::json!({
        "report": result.report,
        "retention_percent": result.report.retention_percent(),
        "filtered_count": result.report.filtered_count(),
        "survivors": result.survivors.iter().map(|item| item.id()).collect::<Vec<_>>(),
        "persisted": result.persisted,
        "scan_errors": result.scan_errors,
    });

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to serialize results: {}", e),
    }
}

fn print_minimal_results(result: &PipelineResult) {
    for item in &result.survivors {
        println!("{}", item.id());
    }
}
