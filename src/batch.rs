//! Converting files and directories of text files.
//!
//! A [`Converter`] owns the importer, the exporter and the encoding cache
//! for one run. Per-file failures are recorded in the [`BatchReport`] and
//! never stop the run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::book::Metadata;
use crate::error::{Error, Result};
use crate::export::{EpubConfig, EpubExporter};
use crate::import::{EncodingCache, ImportConfig, Imported, MetadataHints, TextImporter};
use crate::util::{is_text_file, sanitize_file_name};

/// How output archives are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputNaming {
    /// `<title>.epub`
    #[default]
    Title,
    /// `<title> - <author>.epub`
    TitleAuthor,
}

/// File name of the archive for a book with `metadata`.
pub fn output_file_name(metadata: &Metadata, naming: OutputNaming) -> String {
    format!("{}.epub", output_stem(metadata, naming))
}

/// `<stem> (<n>).epub`, used when several sources of one run share a name.
pub fn numbered_file_name(metadata: &Metadata, naming: OutputNaming, n: usize) -> String {
    format!("{} ({n}).epub", output_stem(metadata, naming))
}

fn output_stem(metadata: &Metadata, naming: OutputNaming) -> String {
    let stem = match naming {
        OutputNaming::Title => metadata.title.clone(),
        OutputNaming::TitleAuthor => format!("{} - {}", metadata.title, metadata.author),
    };
    sanitize_file_name(&stem)
}

/// Options for a conversion run.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub import: ImportConfig,
    pub epub: EpubConfig,
    /// Title/author overrides. Only used when converting a single file.
    pub hints: MetadataHints,
    pub naming: OutputNaming,
    /// Leave existing archives alone instead of replacing them.
    pub skip_existing: bool,
    /// Descend into subdirectories when the input is a directory.
    pub recursive: bool,
}

impl ConvertOptions {
    pub fn with_import(mut self, import: ImportConfig) -> Self {
        self.import = import;
        self
    }

    pub fn with_epub(mut self, epub: EpubConfig) -> Self {
        self.epub = epub;
        self
    }

    pub fn with_hints(mut self, hints: MetadataHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// Result of converting one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(tag = "status", rename_all = "snake_case"))]
pub enum FileOutcome {
    Converted {
        source: PathBuf,
        output: PathBuf,
        chapters: usize,
        /// Label of the encoding the source was decoded with.
        encoding: String,
        /// Some bytes could not be decoded and were replaced.
        lossy: bool,
    },
    Skipped {
        source: PathBuf,
        output: PathBuf,
    },
    Failed {
        source: PathBuf,
        error: String,
    },
}

impl FileOutcome {
    pub fn source(&self) -> &Path {
        match self {
            FileOutcome::Converted { source, .. }
            | FileOutcome::Skipped { source, .. }
            | FileOutcome::Failed { source, .. } => source,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed { .. })
    }
}

/// Outcomes of a run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn converted(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Converted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(FileOutcome::is_failed)
    }

    /// True if no file failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Converts text files to EPUB archives.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use txtpub::{ConvertOptions, Converter};
///
/// let mut converter = Converter::new(ConvertOptions::default().with_recursive(true));
/// let report = converter.convert_path(Path::new("novels"), Some(Path::new("out")))?;
/// println!("{} converted, {} failed", report.converted(), report.failed());
/// # Ok::<(), txtpub::Error>(())
/// ```
#[derive(Debug)]
pub struct Converter {
    options: ConvertOptions,
    importer: TextImporter,
    exporter: EpubExporter,
    cache: EncodingCache,
    /// Output path to the source that claimed it in this run.
    claimed: HashMap<PathBuf, PathBuf>,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        let importer = TextImporter::new().with_config(options.import.clone());
        let exporter = EpubExporter::new().with_config(options.epub.clone());
        Self {
            options,
            importer,
            exporter,
            cache: EncodingCache::new(),
            claimed: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Encoding detections made so far in this run.
    pub fn cache(&self) -> &EncodingCache {
        &self.cache
    }

    /// Convert one file into `output_dir`, which must exist.
    pub fn convert_file(
        &mut self,
        input: &Path,
        output_dir: &Path,
        hints: &MetadataHints,
    ) -> Result<FileOutcome> {
        let Imported {
            book,
            detection,
            lossy,
        } = self.importer.import_detailed(input, &mut self.cache, hints)?;
        let output = self.claim_output(input, output_dir, &book.metadata);

        if self.options.skip_existing && output.exists() {
            info!(source = %input.display(), output = %output.display(), "skipping, output exists");
            return Ok(FileOutcome::Skipped {
                source: input.to_path_buf(),
                output,
            });
        }

        self.exporter.write_to_path(&book, &output)?;

        info!(
            source = %input.display(),
            output = %output.display(),
            chapters = book.chapters.len(),
            "converted"
        );
        Ok(FileOutcome::Converted {
            source: input.to_path_buf(),
            output,
            chapters: book.chapters.len(),
            encoding: detection.encoding.label().to_string(),
            lossy,
        })
    }

    /// Convert `input`, a text file or a directory of text files.
    ///
    /// Archives go to `output_dir`, or next to the input when `None`. With
    /// a directory input every `*.txt` file is converted in path order and
    /// the title/author hints are ignored. Only failing to create the
    /// output directory aborts the run.
    pub fn convert_path(&mut self, input: &Path, output_dir: Option<&Path>) -> Result<BatchReport> {
        let is_dir = input.is_dir();
        let output_dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None if is_dir => input.to_path_buf(),
            None => match input.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        };
        fs::create_dir_all(&output_dir).map_err(|source| Error::CreateOutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let mut report = BatchReport::default();
        if !is_dir {
            let hints = self.options.hints.clone();
            report.outcomes.push(self.record(input, &output_dir, &hints));
            return Ok(report);
        }

        let sources = collect_sources(input, self.options.recursive);
        debug!(dir = %input.display(), files = sources.len(), "collected text files");

        let hints = MetadataHints::default();
        for source in sources {
            // Mirror the source's subdirectory under the output directory.
            let target_dir = match source.parent().and_then(|p| p.strip_prefix(input).ok()) {
                Some(rel) if !rel.as_os_str().is_empty() => output_dir.join(rel),
                _ => output_dir.clone(),
            };
            if let Err(source_err) = fs::create_dir_all(&target_dir) {
                let err = Error::CreateOutputDir {
                    path: target_dir,
                    source: source_err,
                };
                error!(source = %source.display(), error = %err, "conversion failed");
                report.outcomes.push(FileOutcome::Failed {
                    source,
                    error: err.to_string(),
                });
                continue;
            }
            report.outcomes.push(self.record(&source, &target_dir, &hints));
        }

        info!(
            converted = report.converted(),
            skipped = report.skipped(),
            failed = report.failed(),
            "batch finished"
        );
        Ok(report)
    }

    /// Pick the output path for `input`, numbering it when another source
    /// of this run already owns the plain name.
    fn claim_output(&mut self, input: &Path, output_dir: &Path, metadata: &Metadata) -> PathBuf {
        let naming = self.options.naming;
        let mut output = output_dir.join(output_file_name(metadata, naming));
        let mut n = 1;
        loop {
            match self.claimed.get(&output) {
                Some(owner) if owner != input => {
                    n += 1;
                    output = output_dir.join(numbered_file_name(metadata, naming, n));
                }
                _ => break,
            }
        }
        if n > 1 {
            warn!(
                source = %input.display(),
                output = %output.display(),
                "output name already used in this run, numbering"
            );
        }
        self.claimed.insert(output.clone(), input.to_path_buf());
        output
    }

    fn record(&mut self, input: &Path, output_dir: &Path, hints: &MetadataHints) -> FileOutcome {
        match self.convert_file(input, output_dir, hints) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(source = %input.display(), error = %e, "conversion failed");
                FileOutcome::Failed {
                    source: input.to_path_buf(),
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Text files under `dir`, sorted by path.
fn collect_sources(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        // Symlinks are kept so that dangling ones fail as individual files.
        .filter(|entry| !entry.file_type().is_dir() && is_text_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    sources.sort();
    sources
}
