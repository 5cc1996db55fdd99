use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::extract::Extractor;
use crate::walk::find_html_files;
use crate::{AppError, ResultSet};

/// How discovered pages are turned into JSON files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// One `<stem>.json` per page, written into the root directory.
    #[default]
    OneToOne,
    /// All records combined into a single file.
    ManyToOne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Info,
    Error,
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Saved { output: PathBuf, records: usize },
    Parsed { records: usize },
    NoData,
    Failed { message: String },
}

impl FileOutcome {
    pub fn status(&self) -> Status {
        match self {
            FileOutcome::Saved { .. } | FileOutcome::Parsed { .. } => Status::Success,
            FileOutcome::NoData => Status::Info,
            FileOutcome::Failed { .. } => Status::Error,
        }
    }

    fn from_error(err: AppError) -> Self {
        FileOutcome::Failed {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    /// Nothing under the root matched; no output was produced.
    NoFiles { root: PathBuf },
    OneToOne {
        files: usize,
        written: usize,
        failed: usize,
    },
    ManyToOne {
        files: usize,
        entries: usize,
        failed: usize,
        saved_to: Option<PathBuf>,
    },
}

/// Receives status events from a conversion run.
pub trait Reporter {
    /// `index` is zero-based.
    fn on_file_start(&mut self, _index: usize, _total: usize, _path: &Path) {}
    fn on_file_result(&mut self, path: &Path, outcome: &FileOutcome);
    fn on_progress(&mut self, _done: usize, _total: usize) {}
    fn on_complete(&mut self, summary: &Summary);
    /// The run stopped early; no `on_complete` follows.
    fn on_fatal(&mut self, _error: &AppError) {}
}

/// Result of a many-to-one run. The records are kept even when nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combined {
    pub records: ResultSet,
    pub summary: Summary,
}

/// Writes `<root>/<stem>.json` for every page under `root` that has records.
///
/// Existing files are overwritten. Per-file failures are reported and skipped.
pub fn convert_one_to_one<R>(root: &Path, reporter: &mut R) -> Result<Summary, AppError>
where
    R: Reporter + ?Sized,
{
    let files = discover(root, reporter)?;
    if files.is_empty() {
        return Ok(finish_empty(root, reporter));
    }

    let extractor = Extractor::new();
    let total = files.len();
    let mut written = 0;
    let mut failed = 0;

    for (index, path) in files.iter().enumerate() {
        reporter.on_file_start(index, total, path);
        let outcome = match convert_file(&extractor, root, path) {
            Ok(outcome) => outcome,
            Err(err) => FileOutcome::from_error(err),
        };
        match outcome.status() {
            Status::Success => written += 1,
            Status::Error => failed += 1,
            Status::Info => {}
        }
        reporter.on_file_result(path, &outcome);
        reporter.on_progress(index + 1, total);
    }

    let summary = Summary::OneToOne {
        files: total,
        written,
        failed,
    };
    reporter.on_complete(&summary);
    Ok(summary)
}

/// Collects records from every page under `root` into one set.
///
/// `destination` is asked for an output path once all files are read, and only
/// if at least one record was found. Returning `None` skips writing.
pub fn convert_many_to_one<R, D>(
    root: &Path,
    reporter: &mut R,
    destination: D,
) -> Result<Combined, AppError>
where
    R: Reporter + ?Sized,
    D: FnOnce(&ResultSet) -> Option<PathBuf>,
{
    let files = discover(root, reporter)?;
    if files.is_empty() {
        let summary = finish_empty(root, reporter);
        return Ok(Combined {
            records: ResultSet::new(),
            summary,
        });
    }

    let extractor = Extractor::new();
    let total = files.len();
    let mut combined = ResultSet::new();
    let mut failed = 0;

    for (index, path) in files.iter().enumerate() {
        reporter.on_file_start(index, total, path);
        let outcome = match read_document(path) {
            Ok(html) => {
                let before = combined.len();
                let page = extractor.parse(&html);
                combined.extend(extractor.records(&page));
                FileOutcome::Parsed {
                    records: combined.len() - before,
                }
            }
            Err(err) => {
                failed += 1;
                FileOutcome::from_error(err)
            }
        };
        reporter.on_file_result(path, &outcome);
        reporter.on_progress(index + 1, total);
    }

    let saved_to = if combined.is_empty() {
        None
    } else {
        match destination(&combined) {
            Some(path) => {
                if let Err(err) = combined.write_json(&path) {
                    reporter.on_fatal(&err);
                    return Err(err);
                }
                Some(path)
            }
            None => {
                debug!(
                    entries = combined.len(),
                    "no destination chosen, combined output not written"
                );
                None
            }
        }
    };

    let summary = Summary::ManyToOne {
        files: total,
        entries: combined.len(),
        failed,
        saved_to,
    };
    reporter.on_complete(&summary);
    Ok(Combined {
        records: combined,
        summary,
    })
}

/// Appends `.json` when `path` has no extension.
pub fn with_json_extension(mut path: PathBuf) -> PathBuf {
    if path.extension().is_none() {
        path.set_extension("json");
    }
    path
}

fn discover<R>(root: &Path, reporter: &mut R) -> Result<Vec<PathBuf>, AppError>
where
    R: Reporter + ?Sized,
{
    find_html_files(root).map_err(|err| {
        reporter.on_fatal(&err);
        err
    })
}

fn finish_empty<R: Reporter + ?Sized>(root: &Path, reporter: &mut R) -> Summary {
    let summary = Summary::NoFiles {
        root: root.to_path_buf(),
    };
    reporter.on_complete(&summary);
    summary
}

fn read_document(path: &Path) -> Result<String, AppError> {
    Ok(fs::read_to_string(path)?)
}

fn convert_file(extractor: &Extractor, root: &Path, path: &Path) -> Result<FileOutcome, AppError> {
    let html = read_document(path)?;
    let page = extractor.parse(&html);
    let mut records = ResultSet::new();
    records.extend(extractor.records(&page));
    if records.is_empty() {
        return Ok(FileOutcome::NoData);
    }
    let output = output_path(root, path)?;
    records.write_json(&output)?;
    Ok(FileOutcome::Saved {
        output,
        records: records.len(),
    })
}

fn output_path(root: &Path, path: &Path) -> Result<PathBuf, AppError> {
    let stem = path
        .file_stem()
        .ok_or_else(|| AppError::Invalid(format!("Invalid stem: {}", path.display())))?;
    let mut name = stem.to_os_string();
    name.push(".json");
    Ok(root.join(name))
}
