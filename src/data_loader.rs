//! JSONL usage event loader
//!
//! Reads usage events from newline-delimited JSON files. Each line holds one
//! event:
//!
//! ```json
//! {"id":"evt-1","model":"gpt-4o","timestamp":"2025-01-15T10:30:00Z","user_id":"alice","input_tokens":1000,"output_tokens":500}
//! ```
//!
//! `user_id`, `input_tokens` and `output_tokens` may be omitted. The data
//! location is either a single `.jsonl` file or a directory searched
//! recursively for `*.jsonl` files. It defaults to `METERBILL_DATA_PATH`, then
//! `~/.meterbill/usage`.

use crate::error::{MeterbillError, Result};
use crate::repository::{EventStream, UsageEventSource};
use crate::types::UsageEvent;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Environment variable overriding the data location
pub const DATA_PATH_ENV: &str = "METERBILL_DATA_PATH";

/// Loads usage events from JSONL files
#[derive(Debug, Clone)]
pub struct DataLoader {
    data_path: PathBuf,
}

impl DataLoader {
    /// Create a loader for the default data location
    ///
    /// # Errors
    ///
    /// Returns a configuration error if neither `METERBILL_DATA_PATH` is set
    /// nor a home directory can be determined.
    pub fn new() -> Result<Self> {
        let data_path = if let Ok(path) = std::env::var(DATA_PATH_ENV) {
            PathBuf::from(path)
        } else {
            dirs::home_dir()
                .ok_or_else(|| MeterbillError::Config("Cannot determine home directory".into()))?
                .join(".meterbill")
                .join("usage")
        };

        Ok(Self::from_path(data_path))
    }

    /// Create a loader for an explicit file or directory
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: path.into(),
        }
    }

    /// The file or directory events are read from
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// All JSONL files to read, sorted by path
    pub fn discover_files(&self) -> Vec<PathBuf> {
        if self.data_path.is_file() {
            return vec![self.data_path.clone()];
        }

        if !self.data_path.exists() {
            debug!("Data path not found: {}", self.data_path.display());
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&self.data_path)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        files.sort();

        debug!(
            "Found {} usage files under {}",
            files.len(),
            self.data_path.display()
        );
        files
    }

    /// Stream every event from every discovered file
    ///
    /// Files are read line by line and each event is yielded as soon as it
    /// is parsed. Lines that are not valid JSON events, including lines that
    /// are not valid UTF-8, are skipped with a warning. A file that cannot be
    /// opened or read ends the stream with an error.
    pub fn load_usage_events(&self) -> EventStream<'_> {
        Box::pin(async_stream::stream! {
            'files: for path in self.discover_files() {
                let mut reader = match open_events_file(&path).await {
                    Ok(reader) => reader,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                let mut buf = Vec::new();
                let mut parsed = 0usize;
                let mut skipped = 0usize;
                let mut line_number = 0usize;

                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf).await {
                        Ok(0) => break,
                        Ok(_) => {}
                        Err(e) => {
                            yield Err(with_path(&path, e));
                            break 'files;
                        }
                    }
                    line_number += 1;

                    let line = buf.trim_ascii();
                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_slice::<UsageEvent>(line) {
                        Ok(event) => {
                            parsed += 1;
                            yield Ok(event);
                        }
                        Err(e) => {
                            skipped += 1;
                            warn!(
                                "Skipping malformed event at {}:{}: {}",
                                path.display(),
                                line_number,
                                e
                            );
                        }
                    }
                }

                debug!(
                    "Parsed {} events from {} ({} skipped)",
                    parsed,
                    path.display(),
                    skipped
                );
            }
        })
    }
}

impl UsageEventSource for DataLoader {
    fn load_events(&self) -> EventStream<'_> {
        self.load_usage_events()
    }
}

async fn open_events_file(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).await.map_err(|e| with_path(path, e))?;
    Ok(BufReader::new(file))
}

fn with_path(path: &Path, e: std::io::Error) -> MeterbillError {
    MeterbillError::Io(std::io::Error::new(
        e.kind(),
        format!("{}: {}", path.display(), e),
    ))
}
