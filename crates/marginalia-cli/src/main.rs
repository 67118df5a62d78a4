use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use marginalia_core::{
    AnnotationRecord, PlainSelection, SourceRange, parse_records, prune_records, records_to_json,
    render_with_report, resolve_with,
};
use miette::{IntoDiagnostic, Result};

mod config;

use config::Config;

#[derive(Parser)]
#[command(version, about = "Marginalia - highlight-preserving LaTeX/markdown rendering", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a KDL config file
    #[arg(long, global = true, env = "MARGINALIA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a source document to HTML with its annotations highlighted
    Render {
        /// Source document, `-` for stdin
        source: PathBuf,

        /// Annotation records as a JSON array
        #[arg(short, long)]
        annotations: Option<PathBuf>,

        /// Write HTML here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the placement report as JSON on stderr
        #[arg(long)]
        report: bool,
    },
    /// Map a selection of rendered text back to source offsets
    Resolve {
        /// Source document, `-` for stdin
        source: PathBuf,

        /// The selected text as displayed
        #[arg(long)]
        text: String,

        /// Rendered text immediately before the selection
        #[arg(long, default_value = "")]
        before: String,
    },
    /// Report which annotations fail to anchor against a source document
    Check {
        /// Source document, `-` for stdin
        source: PathBuf,

        /// Annotation records as a JSON array
        #[arg(short, long)]
        annotations: PathBuf,
    },
    /// Drop stale incomplete annotations and migrate records without ranges
    Prune {
        /// Source document, `-` for stdin
        source: PathBuf,

        /// Annotation records as a JSON array
        #[arg(short, long)]
        annotations: PathBuf,

        /// Age in milliseconds after which an incomplete record is dropped
        #[arg(long, default_value_t = marginalia_core::DEFAULT_MAX_INCOMPLETE_AGE_MS)]
        max_age_ms: u64,

        /// Write the pruned records here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_miette();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            source,
            annotations,
            output,
            report,
        } => render_document(&config, &source, annotations.as_deref(), output, report),
        Commands::Resolve {
            source,
            text,
            before,
        } => resolve_selection(&config, &source, text, before),
        Commands::Check {
            source,
            annotations,
        } => check_annotations(&config, &source, &annotations),
        Commands::Prune {
            source,
            annotations,
            max_age_ms,
            output,
        } => prune(&source, &annotations, max_age_ms, output),
    }
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .into_diagnostic()?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .into_diagnostic()
        .map_err(|e| e.wrap_err(format!("could not read {}", path.display())))
}

fn read_records(path: &Path) -> Result<Vec<AnnotationRecord>> {
    let json = read_source(path)?;
    Ok(parse_records(&json)?)
}

fn write_output(output: Option<PathBuf>, text: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(&path, text).into_diagnostic(),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn render_document(
    config: &Config,
    source: &Path,
    annotations: Option<&Path>,
    output: Option<PathBuf>,
    report: bool,
) -> Result<()> {
    let text = read_source(source)?;
    let records = match annotations {
        Some(path) => read_records(path)?,
        None => Vec::new(),
    };

    let start = std::time::Instant::now();
    let rendered = render_with_report(&text, &records, &config.render);
    tracing::info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        annotations = records.len(),
        "rendered"
    );

    if report {
        let json = serde_json::to_string_pretty(&rendered.report).into_diagnostic()?;
        eprintln!("{json}");
    }
    write_output(output, &rendered.html)
}

fn resolve_selection(config: &Config, source: &Path, text: String, before: String) -> Result<()> {
    let source = read_source(source)?;
    let selection = PlainSelection::new(text, before);
    let range: Option<SourceRange> = resolve_with(&selection, &source, &config.resolve);
    println!("{}", serde_json::to_string(&range).into_diagnostic()?);
    Ok(())
}

fn check_annotations(config: &Config, source: &Path, annotations: &Path) -> Result<()> {
    let text = read_source(source)?;
    let records = read_records(annotations)?;
    let report = render_with_report(&text, &records, &config.render).report;

    for id in &report.offset_anchored {
        println!("✓ {id} (offset)");
    }
    for id in &report.text_anchored {
        println!("✓ {id} (text)");
    }
    for skipped in &report.skipped {
        println!("✗ {}: {}", skipped.id, skipped.reason);
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(miette::miette!(
            "{} of {} annotations could not be anchored",
            report.skipped.len(),
            records.len()
        ))
    }
}

fn prune(source: &Path, annotations: &Path, max_age_ms: u64, output: Option<PathBuf>) -> Result<()> {
    let text = read_source(source)?;
    let records = read_records(annotations)?;
    let before = records.len();

    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .into_diagnostic()?
        .as_millis() as u64;
    let kept = prune_records(records, &text, now_ms, max_age_ms);
    tracing::info!(before, after = kept.len(), "pruned annotations");

    write_output(output, &records_to_json(&kept)?)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
