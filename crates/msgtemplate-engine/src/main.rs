use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use msgtemplate::model::DocumentSnapshot;
use msgtemplate::services::tracing_setup;
use msgtemplate::syntax::{SyntaxTreeProvider, TreeSitterProvider};
use msgtemplate::{ClassifiedRegion, ClassifierConfig, TemplateClassifier};
use msgtemplate_languages::Language;
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

/// Classify message-template placeholders in C# logging calls
#[derive(Parser, Debug)]
#[command(name = "msgtemplate")]
#[command(
    about = "Print the classified template regions of a C# source file as JSON lines",
    long_about = None
)]
#[command(version)]
struct Args {
    /// Source file to classify
    #[arg(value_name = "FILE", required_unless_present_any = ["print_schema", "dump_config"])]
    file: Option<PathBuf>,

    /// Only report regions overlapping this byte range (e.g. 120..480)
    #[arg(long, value_name = "START..END", value_parser = parse_span)]
    span: Option<Range<usize>>,

    /// Path to configuration file (JSON)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the JSON Schema of the configuration file and exit
    #[arg(long)]
    print_schema: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn parse_span(value: &str) -> Result<Range<usize>, String> {
    let (start, end) = value
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got '{}'", value))?;
    let start: usize = start
        .trim()
        .parse()
        .map_err(|e| format!("invalid span start '{}': {}", start, e))?;
    let end: usize = end
        .trim()
        .parse()
        .map_err(|e| format!("invalid span end '{}': {}", end, e))?;
    if end < start {
        return Err(format!("span end {} is before start {}", end, start));
    }
    Ok(start..end)
}

/// One output line
#[derive(Serialize)]
struct RegionRecord<'a> {
    /// Zero-based line of the region start
    line: usize,
    /// Zero-based byte column of the region start
    column: usize,
    #[serde(flatten)]
    region: &'a ClassifiedRegion,
}

fn load_config(args: &Args) -> AnyhowResult<ClassifierConfig> {
    match &args.config {
        Some(path) => ClassifierConfig::load(path),
        None => Ok(ClassifierConfig::default()),
    }
}

fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    if args.print_schema {
        println!("{}", serde_json::to_string_pretty(&ClassifierConfig::json_schema())?);
        return Ok(());
    }

    tracing_setup::init_global(args.log_file.as_deref())?;

    let config = load_config(&args)?;
    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let path = args.file.as_ref().context("no input file given")?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let provider: Option<Arc<dyn SyntaxTreeProvider>> = match Language::from_path(path) {
        Some(language) => match TreeSitterProvider::new(language) {
            Ok(provider) => Some(Arc::new(provider)),
            Err(e) => {
                tracing::warn!("{} grammar unavailable: {:#}", language, e);
                None
            }
        },
        None => {
            tracing::warn!(
                "{} is not a recognized source file, using textual recognition",
                path.display()
            );
            None
        }
    };

    let classifier = TemplateClassifier::new(config, provider);
    let snapshot = DocumentSnapshot::from_text(&text);
    let span = args.span.clone().unwrap_or(0..snapshot.len());
    let regions = classifier.classify(&snapshot, span);
    tracing::info!("{}: {} region(s)", path.display(), regions.len());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for region in regions.iter() {
        let line = snapshot.line_of_offset(region.start);
        let record = RegionRecord {
            line,
            column: region.start - snapshot.line_start(line),
            region,
        };
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
