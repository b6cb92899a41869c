//! txtpub - Convert plain-text novels to EPUB

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use txtpub::{
    BatchReport, ConvertOptions, Converter, EpubConfig, FileOutcome, ImportConfig, MetadataHints,
    OutputNaming, inspect_epub,
};

#[derive(Parser)]
#[command(name = "txtpub")]
#[command(version, about = "Convert plain-text novels to EPUB", long_about = None)]
#[command(after_help = "EXAMPLES:
    txtpub book.txt                 Write book.epub next to book.txt
    txtpub -o out/ -r novels/       Convert every .txt under novels/
    txtpub -t 三体 -a 刘慈欣 a.txt   Override title and author
    txtpub -i book.epub             Show metadata and spine of an EPUB")]
struct Cli {
    /// Text file or directory of text files (an EPUB with --info)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Directory for the generated EPUB files [default: next to the input]
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Book title (single file only)
    #[arg(short, long)]
    title: Option<String>,

    /// Book author (single file only)
    #[arg(short, long)]
    author: Option<String>,

    /// dc:language of the generated books
    #[arg(short, long, default_value = "zh")]
    language: String,

    /// Name outputs "<title> - <author>.epub"
    #[arg(long)]
    name_with_author: bool,

    /// Do not overwrite existing EPUB files
    #[arg(long)]
    skip_existing: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Do not generate a cover image
    #[arg(long)]
    no_cover: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Show metadata of an existing EPUB without converting
    #[arg(short, long)]
    info: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    if cli.info {
        return match show_info(&cli.input) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match convert(&cli) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn convert(cli: &Cli) -> Result<BatchReport, String> {
    let mut hints = MetadataHints::default();
    if let Some(title) = &cli.title {
        hints = hints.with_title(title.clone());
    }
    if let Some(author) = &cli.author {
        hints = hints.with_author(author.clone());
    }

    let naming = if cli.name_with_author {
        OutputNaming::TitleAuthor
    } else {
        OutputNaming::Title
    };
    let mut epub = EpubConfig::default();
    if cli.no_cover {
        epub = epub.with_cover(None);
    }
    let options = ConvertOptions::default()
        .with_import(ImportConfig::default().with_language(cli.language.clone()))
        .with_epub(epub)
        .with_hints(hints)
        .with_naming(naming)
        .with_skip_existing(cli.skip_existing)
        .with_recursive(cli.recursive);

    let report = Converter::new(options)
        .convert_path(&cli.input, cli.output.as_deref())
        .map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{json}");
    } else if !cli.quiet {
        print_report(&report);
    }
    Ok(report)
}

fn print_report(report: &BatchReport) {
    for outcome in &report.outcomes {
        match outcome {
            FileOutcome::Converted {
                source,
                output,
                chapters,
                encoding,
                lossy,
            } => {
                let note = if *lossy { ", lossy" } else { "" };
                println!(
                    "{} -> {} ({chapters} chapters, {encoding}{note})",
                    source.display(),
                    output.display()
                );
            }
            FileOutcome::Skipped { source, output } => {
                println!("{} -> {} (skipped)", source.display(), output.display());
            }
            FileOutcome::Failed { source, error } => {
                println!("{}: FAILED: {error}", source.display());
            }
        }
    }
    println!(
        "{} converted, {} skipped, {} failed",
        report.converted(),
        report.skipped(),
        report.failed()
    );
}

fn show_info(path: &Path) -> Result<(), String> {
    let summary = inspect_epub(path).map_err(|e| e.to_string())?;

    let meta = &summary.metadata;
    println!("File: {}", path.display());
    println!("Title: {}", meta.title);
    if !meta.author.is_empty() {
        println!("Author: {}", meta.author);
    }
    if !meta.language.is_empty() {
        println!("Language: {}", meta.language);
    }
    println!("Identifier: {}", meta.identifier);
    if !meta.modified.is_empty() {
        println!("Modified: {}", meta.modified);
    }
    if let Some(cover) = &summary.cover_href {
        println!("Cover: {cover}");
    }
    println!("Chapters: {}", summary.spine.len());
    println!("TOC entries: {}", summary.toc.len());
    for (i, href) in summary.spine_hrefs().iter().enumerate() {
        let title = summary.toc.get(i).map(|p| p.title.as_str()).unwrap_or("");
        println!("  {:>4}. {href}  {title}", i + 1);
    }

    Ok(())
}
