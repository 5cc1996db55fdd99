use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod convert;
pub mod extract;
pub mod report;
pub mod walk;

pub use convert::{
    convert_many_to_one, convert_one_to_one, with_json_extension, Combined, FileOutcome, Mode,
    Reporter, Status, Summary,
};
pub use extract::{BlockIssue, BlockOutcome, Extractor, ParsedPage};
pub use report::ConsoleReporter;
pub use walk::find_html_files;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid data: {0}")]
    Invalid(String),
}

/// Labelled metadata fields of a gallery item, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Prompt,
    NegativePrompt,
    Seed,
    Size,
    Model,
    Sampler,
    Steps,
    CfgScale,
    Resources,
    ModelHash,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Prompt,
        Field::NegativePrompt,
        Field::Seed,
        Field::Size,
        Field::Model,
        Field::Sampler,
        Field::Steps,
        Field::CfgScale,
        Field::Resources,
        Field::ModelHash,
    ];

    /// Label text shown on the gallery page (`<dt>` content).
    pub fn label(self) -> &'static str {
        match self {
            Field::Prompt => "Prompt",
            Field::NegativePrompt => "Negative prompt",
            Field::Seed => "Seed",
            Field::Size => "Size",
            Field::Model => "Model",
            Field::Sampler => "Sampler",
            Field::Steps => "Steps",
            Field::CfgScale => "CFG scale",
            Field::Resources => "Resources",
            Field::ModelHash => "Model hash",
        }
    }

    /// Case-sensitive reverse lookup of [`Field::label`].
    pub fn from_label(label: &str) -> Option<Field> {
        let field = match label {
            "Prompt" => Field::Prompt,
            "Negative prompt" => Field::NegativePrompt,
            "Seed" => Field::Seed,
            "Size" => Field::Size,
            "Model" => Field::Model,
            "Sampler" => Field::Sampler,
            "Steps" => Field::Steps,
            "CFG scale" => Field::CfgScale,
            "Resources" => Field::Resources,
            "Model hash" => Field::ModelHash,
            _ => return None,
        };
        Some(field)
    }
}

/// One extracted gallery item. Every field is always present; absent labels are "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub image_url: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: String,
    pub size: String,
    pub model: String,
    pub sampler: String,
    pub steps: String,
    pub cfg_scale: String,
    pub resources: String,
    pub model_hash: String,
}

impl Record {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Prompt => &self.prompt,
            Field::NegativePrompt => &self.negative_prompt,
            Field::Seed => &self.seed,
            Field::Size => &self.size,
            Field::Model => &self.model,
            Field::Sampler => &self.sampler,
            Field::Steps => &self.steps,
            Field::CfgScale => &self.cfg_scale,
            Field::Resources => &self.resources,
            Field::ModelHash => &self.model_hash,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Prompt => &mut self.prompt,
            Field::NegativePrompt => &mut self.negative_prompt,
            Field::Seed => &mut self.seed,
            Field::Size => &mut self.size,
            Field::Model => &mut self.model,
            Field::Sampler => &mut self.sampler,
            Field::Steps => &mut self.steps,
            Field::CfgScale => &mut self.cfg_scale,
            Field::Resources => &mut self.resources,
            Field::ModelHash => &mut self.model_hash,
        };
        *slot = value;
    }
}

/// Ordered records collected for one output file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet(Vec<Record>);

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.0
    }

    pub fn into_records(self) -> Vec<Record> {
        self.0
    }

    pub fn push(&mut self, record: Record) {
        self.0.push(record);
    }

    /// JSON array, 4-space indented, no trailing newline.
    pub fn to_json(&self) -> Result<String, AppError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| AppError::Invalid(e.to_string()))
    }

    /// Writes the set to `path`, replacing any existing file.
    pub fn write_json(&self, path: &Path) -> Result<(), AppError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl From<Vec<Record>> for ResultSet {
    fn from(records: Vec<Record>) -> Self {
        Self(records)
    }
}

impl Extend<Record> for ResultSet {
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for ResultSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Converts every HTML file under `root` and reports to the console.
///
/// `output` is the combined destination for [`Mode::ManyToOne`]; `None` means
/// nothing is written for that mode.
pub fn run(
    root: &Path,
    mode: Mode,
    output: Option<&Path>,
    progress: bool,
) -> Result<Summary, AppError> {
    let mut reporter = ConsoleReporter::new(progress);
    match mode {
        Mode::OneToOne => {
            if output.is_some() {
                tracing::warn!("--output is ignored in one-to-one mode");
            }
            convert_one_to_one(root, &mut reporter)
        }
        Mode::ManyToOne => {
            let combined = convert_many_to_one(root, &mut reporter, |_| {
                output.map(|p| with_json_extension(p.to_path_buf()))
            })?;
            Ok(combined.summary)
        }
    }
}
