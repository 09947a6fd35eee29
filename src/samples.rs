use anyhow::{ensure, Context};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};
use strum::Display;
use thiserror::Error;
use tracing::{info, warn};

pub const SAMPLE_TESTS_KEY: &str = "sampleTests";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleTest {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("no sample tests found")]
    NoSamples,
    #[error("could not extract any valid samples")]
    NoValidSamples,
    #[error("problem record is not a JSON object")]
    NotAnObject,
    #[error("invalid problem record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What happened to a single problem record during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum FileOutcome {
    Updated,
    MissingHtml,
    NoSamples,
    NoValidSamples,
    InvalidJson,
    IoError,
}

impl From<&SampleError> for FileOutcome {
    fn from(e: &SampleError) -> Self {
        match e {
            SampleError::NoSamples => FileOutcome::NoSamples,
            SampleError::NoValidSamples => FileOutcome::NoValidSamples,
            SampleError::NotAnObject | SampleError::Json(_) => FileOutcome::InvalidJson,
            SampleError::Io { .. } => FileOutcome::IoError,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tally {
    pub total: usize,
    outcomes: BTreeMap<FileOutcome, usize>,
}

impl Tally {
    pub fn record(&mut self, outcome: FileOutcome) {
        self.total += 1;
        *self.outcomes.entry(outcome).or_default() += 1;
    }

    pub fn count(&self, outcome: FileOutcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or_default()
    }

    pub fn updated(&self) -> usize {
        self.count(FileOutcome::Updated)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Updated {} out of {} files.", self.updated(), self.total)?;
        for (outcome, count) in self.outcomes.iter().filter(|(o, _)| **o != FileOutcome::Updated) {
            write!(f, " {outcome}: {count}.")?;
        }
        Ok(())
    }
}

/// Sample tests of a problem page, in page order.
///
/// Blocks without an input or output `<pre>` are skipped. Input lines wrapped
/// in `<div>`s are joined with newlines, otherwise the raw `<pre>` text is used.
pub fn extract_samples(html: &str) -> Result<Vec<SampleTest>, SampleError> {
    let fragment = Html::parse_document(html);
    let blocks = fragment
        .select(&Selector::parse("div.sample-test").unwrap())
        .collect::<Vec<_>>();
    if blocks.is_empty() {
        return Err(SampleError::NoSamples);
    }

    let selectors = BlockSelectors::new();
    let samples = blocks
        .into_iter()
        .enumerate()
        .filter_map(|(idx, block)| {
            let sample = selectors.parse_block(block);
            if sample.is_none() {
                warn!("Incomplete sample block #{}", idx + 1);
            }
            sample
        })
        .collect::<Vec<_>>();

    if samples.is_empty() {
        return Err(SampleError::NoValidSamples);
    }
    Ok(samples)
}

struct BlockSelectors {
    input: Selector,
    output: Selector,
    pre: Selector,
    line: Selector,
}

impl BlockSelectors {
    fn new() -> Self {
        Self {
            input: Selector::parse("div.input").unwrap(),
            output: Selector::parse("div.output").unwrap(),
            pre: Selector::parse("pre").unwrap(),
            line: Selector::parse("div").unwrap(),
        }
    }

    fn parse_block(&self, block: ElementRef) -> Option<SampleTest> {
        let input = self.find_pre(block, &self.input)?;
        let output = self.find_pre(block, &self.output)?;

        let lines = input
            .select(&self.line)
            .map(|line| line.text().collect::<String>())
            .collect::<Vec<_>>();
        let input = if lines.is_empty() {
            input.text().collect::<String>()
        } else {
            lines.join("\n")
        };
        let output = output.text().collect::<String>();

        Some(SampleTest {
            input: input.trim().to_string(),
            output: output.trim().to_string(),
        })
    }

    fn find_pre<'a>(&self, block: ElementRef<'a>, section: &Selector) -> Option<ElementRef<'a>> {
        block.select(section).next()?.select(&self.pre).next()
    }
}

/// Replaces `sampleTests`, leaving every other field where it was.
pub fn apply_samples(record: &mut Value, samples: &[SampleTest]) -> Result<(), SampleError> {
    let record = record.as_object_mut().ok_or(SampleError::NotAnObject)?;
    record.insert(SAMPLE_TESTS_KEY.to_string(), serde_json::to_value(samples)?);
    Ok(())
}

pub fn render_record(record: &Value) -> Result<String, SampleError> {
    Ok(serde_json::to_string_pretty(record)?)
}

/// Refreshes the record at `json_path` from the page at `html_path`.
///
/// The record is only rewritten once at least one sample was extracted.
/// Returns the number of samples written.
pub fn update_problem_json(json_path: &Path, html_path: &Path) -> Result<usize, SampleError> {
    let html = read_file(html_path)?;
    let samples = extract_samples(&html)?;

    let mut record: Value = serde_json::from_str(&read_file(json_path)?)?;
    apply_samples(&mut record, &samples)?;

    fs::write(json_path, render_record(&record)?).map_err(|source| SampleError::Io {
        path: json_path.to_path_buf(),
        source,
    })?;
    Ok(samples.len())
}

fn read_file(path: &Path) -> Result<String, SampleError> {
    fs::read_to_string(path).map_err(|source| SampleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Updates every `*.json` record in `json_dir` that has a `<stem>.html` page in `html_dir`.
pub fn process_directories(json_dir: &Path, html_dir: &Path) -> anyhow::Result<Tally> {
    ensure!(
        json_dir.is_dir(),
        "the JSON directory '{}' does not exist",
        json_dir.display()
    );
    ensure!(
        html_dir.is_dir(),
        "the HTML directory '{}' does not exist",
        html_dir.display()
    );

    info!(
        "Processing records in '{}' against pages in '{}'",
        json_dir.display(),
        html_dir.display()
    );

    let json_files = list_json_files(json_dir)?;
    if json_files.is_empty() {
        warn!("No JSON files found in '{}'", json_dir.display());
    }

    let mut tally = Tally::default();
    for json_path in json_files {
        let name = json_path.file_name().unwrap_or_default().to_string_lossy();
        let stem = json_path.file_stem().unwrap_or_default().to_string_lossy();
        let html_path = html_dir.join(format!("{stem}.html"));

        let outcome = if !html_path.is_file() {
            info!("Skipping {name}, corresponding HTML file not found");
            FileOutcome::MissingHtml
        } else {
            match update_problem_json(&json_path, &html_path) {
                Ok(count) => {
                    info!("Updated {name} with {count} sample tests");
                    FileOutcome::Updated
                }
                Err(e) => {
                    warn!("Failed to update {name}: {e}");
                    FileOutcome::from(&e)
                }
            }
        };
        tally.record(outcome);
    }

    Ok(tally)
}

fn list_json_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;

    files.retain(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"));
    files.sort();
    Ok(files)
}
