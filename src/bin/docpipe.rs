//! CLI binary for docpipe.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ParseConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docpipe::{
    parse, parse_to_file, CostMapping, PageSelection, ParseConfig, ParseResult, RouterPriority,
    StaticFramework, Strategy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Parse with automatic strategy routing (stdout)
  docpipe document.pdf

  # Parse to a file
  docpipe document.pdf -o output.md

  # Force the vision-LLM strategy with a specific model
  docpipe --strategy llm --model gpt-4.1-nano scan.pdf

  # Fast static extraction of a page range
  docpipe --strategy static --pages 3-15 report.pdf -o report.md

  # Parse a URL, following links one level deep
  docpipe --depth 2 https://example.com/whitepaper.pdf

  # Attach dollar costs from a rate table
  docpipe --cost-table rates.json --strategy llm document.pdf --json

STRATEGIES:
  auto     Route per document: text-heavy PDFs go static, scans go to
           the LLM. A failed routed attempt is retried once with the
           other strategy. (default)
  static   Deterministic text extraction only (pdfium or pdf-extract).
  llm      Vision-LLM transcription only.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY        OpenAI API key
  ANTHROPIC_API_KEY     Anthropic API key
  GEMINI_API_KEY        Google Gemini API key
  DOCPIPE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  DOCPIPE_MODEL         Override model ID

SETUP:
  1. Set API key:   export OPENAI_API_KEY=sk-...
  2. Parse:         docpipe document.pdf -o output.md

  Static-only parsing (--strategy static) needs no API key at all.
"#;

/// Parse documents and URLs to structured Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "docpipe",
    version,
    about = "Parse documents and URLs to structured Markdown",
    long_about = "Parse PDF documents, images, HTML, and plain text (local files or URLs) into \
clean Markdown, routing each document between fast static extraction and vision-LLM \
transcription. Supports OpenAI, Anthropic, Google Gemini, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL.
    input: String,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "DOCPIPE_OUTPUT")]
    output: Option<PathBuf>,

    /// Parsing strategy: auto, static, llm.
    #[arg(long, env = "DOCPIPE_STRATEGY", value_enum, default_value = "auto")]
    strategy: StrategyArg,

    /// Router preference when strategy is auto: speed, cost, accuracy.
    #[arg(long, env = "DOCPIPE_PRIORITY", value_enum, default_value = "speed")]
    priority: PriorityArg,

    /// Static extraction library: pdfium, pdf-extract.
    #[arg(long, env = "DOCPIPE_FRAMEWORK", value_enum, default_value = "pdfium")]
    framework: FrameworkArg,

    /// LLM model ID (e.g. gpt-4.1-nano, claude-sonnet-4-20250514).
    #[arg(long, env = "DOCPIPE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "DOCPIPE_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Pages per chunk when splitting PDFs.
    #[arg(long, env = "DOCPIPE_PAGES_PER_SPLIT", default_value_t = 4,
          value_parser = clap::value_parser!(usize))]
    pages_per_split: usize,

    /// Maximum parallel workers.
    #[arg(short = 'w', long, env = "DOCPIPE_MAX_WORKERS", default_value_t = 4)]
    max_workers: usize,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "DOCPIPE_PAGES", default_value = "all")]
    pages: String,

    /// Link-following recursion depth (1 = no recursion).
    #[arg(long, env = "DOCPIPE_DEPTH", default_value_t = 1)]
    depth: usize,

    /// Convert image inputs to PDF before parsing.
    #[arg(long, env = "DOCPIPE_AS_PDF")]
    as_pdf: bool,

    /// JSON file mapping model names to per-million token rates; enables
    /// cost reporting on the result.
    #[arg(long, env = "DOCPIPE_COST_TABLE")]
    cost_table: Option<PathBuf>,

    /// Max LLM output tokens per chunk.
    #[arg(long, env = "DOCPIPE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCPIPE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Output the full structured result (segments, usage, cost) as JSON.
    #[arg(long, env = "DOCPIPE_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCPIPE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCPIPE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCPIPE_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCPIPE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Auto,
    Static,
    Llm,
}

impl From<StrategyArg> for Strategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Auto => Strategy::Auto,
            StrategyArg::Static => Strategy::Static,
            StrategyArg::Llm => Strategy::Llm,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PriorityArg {
    Speed,
    Cost,
    Accuracy,
}

impl From<PriorityArg> for RouterPriority {
    fn from(v: PriorityArg) -> Self {
        match v {
            PriorityArg::Speed => RouterPriority::Speed,
            PriorityArg::Cost => RouterPriority::Cost,
            PriorityArg::Accuracy => RouterPriority::Accuracy,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FrameworkArg {
    Pdfium,
    PdfExtract,
}

impl From<FrameworkArg> for StaticFramework {
    fn from(v: FrameworkArg) -> Self {
        match v {
            FrameworkArg::Pdfium => StaticFramework::Pdfium,
            FrameworkArg::PdfExtract => StaticFramework::PdfExtract,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active; verbose
    // mode always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    let spinner = if show_progress {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Parsing");
        bar.set_message(cli.input.clone());
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    // ── Run parse ────────────────────────────────────────────────────────
    let outcome = if let Some(ref output_path) = cli.output {
        parse_to_file(&cli.input, output_path, &config).await
    } else {
        parse(&cli.input, &config).await
    };

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    let result = outcome.context("Parsing failed")?;

    // ── Print ────────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(result.raw.as_bytes())
            .context("Failed to write to stdout")?;
        if !result.raw.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        print_summary(&cli, &result);
    }

    Ok(())
}

fn print_summary(cli: &Cli, result: &ParseResult) {
    let destination = cli
        .output
        .as_ref()
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{} {} segment(s) via {} parsing{}",
        green("✔"),
        bold(&result.segments.len().to_string()),
        result.strategy_used,
        destination,
    );
    if result.token_usage.total > 0 {
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&result.token_usage.input.to_string()),
            dim(&result.token_usage.output.to_string()),
        );
    }
    if let Some(cost) = result.token_cost {
        eprintln!("   {}", dim(&format!("estimated cost: ${:.6}", cost.total)));
    }
    if !result.recursive_docs.is_empty() {
        eprintln!(
            "   {} linked document(s) parsed recursively",
            dim(&result.document_count().saturating_sub(1).to_string()),
        );
    }
}

/// Map CLI args to `ParseConfig`.
fn build_config(cli: &Cli) -> Result<ParseConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ParseConfig::builder()
        .strategy(cli.strategy.into())
        .router_priority(cli.priority.into())
        .static_framework(cli.framework.into())
        .pages_per_split(cli.pages_per_split)
        .max_workers(cli.max_workers)
        .page_nums(pages)
        .depth(cli.depth)
        .as_pdf(cli.as_pdf)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.cost_table {
        builder = builder.api_cost_mapping(CostMapping::File(path.clone()));
    }

    let mut config = builder.build().context("Invalid configuration")?;
    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();

    Ok(config)
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start.trim().parse().context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        for &p in &pages {
            if p < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
            }
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
