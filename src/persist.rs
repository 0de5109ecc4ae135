//! Incremental, per-record persistence.
//!
//! Each valid record is written to its own JSON file the moment it is
//! complete, and the index of record files is rewritten after every write.
//! An interrupted crawl therefore leaves every finished record on disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Settings, INDEX_FILENAME};
use crate::error::StorageError;
use crate::merge::merge;
use crate::models::ProfileRecord;
use crate::storage::{sanitize_filename, write_json_atomic};

const INDEX_DESCRIPTION: &str = "List of individual employee JSON files";

/// Names tried per record before giving up.
const MAX_STEM_CANDIDATES: usize = 50;

/// Contents of the index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIndex {
    pub employee_files: Vec<String>,
    pub total_count: usize,
    pub generated_at: String,
    pub description: String,
}

impl RecordIndex {
    fn new(files: &BTreeSet<String>) -> Self {
        Self {
            employee_files: files.iter().cloned().collect(),
            total_count: files.len(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            description: INDEX_DESCRIPTION.to_string(),
        }
    }
}

/// What [`IncrementalPersister::persist`] did with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Created(String),
    /// An existing file for the same person was merged and rewritten.
    Updated(String),
    /// Neither name nor email; nothing written.
    Rejected,
}

impl PersistOutcome {
    pub fn file_name(&self) -> Option<&str> {
        match self {
            PersistOutcome::Created(name) | PersistOutcome::Updated(name) => Some(name),
            PersistOutcome::Rejected => None,
        }
    }
}

pub struct IncrementalPersister {
    records_dir: PathBuf,
    files: BTreeSet<String>,
}

impl IncrementalPersister {
    pub fn open(settings: &Settings) -> Result<Self, StorageError> {
        Self::open_dir(settings.records_dir())
    }

    /// Open `records_dir`, creating it, and seed the index from its files.
    pub fn open_dir(records_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let records_dir = records_dir.into();
        std::fs::create_dir_all(&records_dir)?;
        let files = scan_records(&records_dir)?;
        debug!(
            "Opened {} with {} existing records",
            records_dir.display(),
            files.len()
        );
        Ok(Self { records_dir, files })
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.records_dir.join(INDEX_FILENAME)
    }

    /// Record files currently listed in the index.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// File stem `record` will be written under.
    ///
    /// Namesakes of someone already on disk get `{name}_{profile_id}`, with a
    /// counter appended if that is taken too. Images use the same stem.
    pub fn record_stem(&self, record: &ProfileRecord) -> Result<String, StorageError> {
        self.resolve(record).map(|target| target.stem)
    }

    /// Write `record` to its own file and refresh the index.
    pub fn persist(&mut self, record: ProfileRecord) -> Result<PersistOutcome, StorageError> {
        if !record.is_valid() {
            debug!("Rejecting record without name or email: {}", record.profile_url);
            return Ok(PersistOutcome::Rejected);
        }

        let target = self.resolve(&record)?;
        let to_write = match target.existing {
            Some(ref existing) => merge(existing, record),
            None => record,
        };
        let file_name = format!("{}.json", target.stem);

        write_json_atomic(&self.records_dir.join(&file_name), &to_write)?;
        self.files.insert(file_name.clone());
        self.write_index()?;

        debug!("Saved {} to {}", to_write.display_name(), file_name);
        Ok(if target.existed {
            PersistOutcome::Updated(file_name)
        } else {
            PersistOutcome::Created(file_name)
        })
    }

    fn resolve(&self, record: &ProfileRecord) -> Result<Target, StorageError> {
        let display_name = record.display_name();
        let id = if record.profile_id.is_empty() {
            "unknown"
        } else {
            record.profile_id.as_str()
        };
        let fallback = sanitize_filename(&format!("{}_{}", display_name, id));
        let candidates = std::iter::once(sanitize_filename(&display_name))
            .chain(std::iter::once(fallback.clone()))
            .chain((2..).map(|n| format!("{}_{}", fallback, n)))
            .take(MAX_STEM_CANDIDATES);

        for stem in candidates {
            match self.load(&format!("{}.json", stem)) {
                Loaded::Missing => {
                    return Ok(Target {
                        stem,
                        existing: None,
                        existed: false,
                    })
                }
                Loaded::Record(existing) if existing.same_identity(record) => {
                    return Ok(Target {
                        stem,
                        existing: Some(existing),
                        existed: true,
                    })
                }
                Loaded::Record(_) => {
                    info!("{}.json belongs to someone else, trying the next name", stem);
                }
                Loaded::Unreadable(reason) => {
                    warn!("Overwriting unreadable {}.json: {}", stem, reason);
                    return Ok(Target {
                        stem,
                        existing: None,
                        existed: true,
                    });
                }
            }
        }

        Err(StorageError::NameExhausted(display_name))
    }

    fn load(&self, file_name: &str) -> Loaded {
        let path = self.records_dir.join(file_name);
        if !path.is_file() {
            return Loaded::Missing;
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => return Loaded::Unreadable(e.to_string()),
        };
        match serde_json::from_str(&contents) {
            Ok(record) => Loaded::Record(Box::new(record)),
            Err(e) => Loaded::Unreadable(e.to_string()),
        }
    }

    fn write_index(&self) -> Result<(), StorageError> {
        write_json_atomic(&self.index_path(), &RecordIndex::new(&self.files))
    }
}

/// Where a record goes and what is already there.
struct Target {
    stem: String,
    existing: Option<Box<ProfileRecord>>,
    existed: bool,
}

enum Loaded {
    Missing,
    Record(Box<ProfileRecord>),
    Unreadable(String),
}

/// Record files in `dir`, excluding the index itself.
fn scan_records(dir: &Path) -> Result<BTreeSet<String>, StorageError> {
    let mut files = BTreeSet::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name != INDEX_FILENAME {
                files.insert(name.to_string());
            }
        }
    }
    Ok(files)
}

/// Rewrite the index from the record files present in `records_dir`.
pub fn rebuild_index(records_dir: &Path) -> Result<RecordIndex, StorageError> {
    std::fs::create_dir_all(records_dir)?;
    let files = scan_records(records_dir)?;
    let index = RecordIndex::new(&files);
    write_json_atomic(&records_dir.join(INDEX_FILENAME), &index)?;
    info!("Indexed {} record files in {}", index.total_count, records_dir.display());
    Ok(index)
}
