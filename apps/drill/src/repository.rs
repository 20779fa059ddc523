//! File-backed mastery persistence and the logging attempt sink.

use construe_core::mastery::merge_into;
use construe_core::{AttemptEvent, AttemptSink, MasteryBucket, MasteryError, MasteryRepository, MasterySet};
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, MasteryError>;

/// Mastered set stored as a JSON object of bucket -> ids.
#[derive(Debug)]
pub struct JsonMasteryRepository {
    path: PathBuf,
    mastered: MasterySet,
}

impl JsonMasteryRepository {
    /// Open the file at `path`; a missing file is an empty set.
    pub fn open(path: &Path) -> Result<Self> {
        let mastered = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(storage)?;
            if raw.trim().is_empty() {
                MasterySet::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| MasteryError::InvalidData(e.to_string()))?
            }
        } else {
            MasterySet::new()
        };
        tracing::debug!(path = %path.display(), buckets = mastered.len(), "mastery loaded");
        Ok(Self {
            path: path.to_path_buf(),
            mastered,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(storage)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.mastered)
            .map_err(|e| MasteryError::InvalidData(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(storage)?;
        std::fs::rename(&tmp, &self.path).map_err(storage)?;
        Ok(())
    }
}

fn storage(e: std::io::Error) -> MasteryError {
    MasteryError::Storage(e.to_string())
}

impl MasteryRepository for JsonMasteryRepository {
    fn load(&self) -> Result<MasterySet> {
        Ok(self.mastered.clone())
    }

    fn commit(&mut self, additions: &MasterySet) -> Result<()> {
        let mut next = self.mastered.clone();
        merge_into(&mut next, additions);
        let previous = std::mem::replace(&mut self.mastered, next);
        if let Err(e) = self.save() {
            self.mastered = previous;
            return Err(e);
        }
        Ok(())
    }

    fn reset(&mut self, bucket: Option<&MasteryBucket>) -> Result<()> {
        match bucket {
            Some(b) => {
                self.mastered.remove(b);
            }
            None => self.mastered.clear(),
        }
        self.save()
    }
}

/// Attempt sink that writes each event to the log.
#[derive(Debug, Default)]
pub struct LogSink {
    recorded: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }
}

impl AttemptSink for LogSink {
    fn record(&mut self, event: &AttemptEvent) {
        self.recorded += 1;
        tracing::info!(
            bucket = %event.bucket,
            instance = %event.instance_id,
            sid = %event.sid,
            correct = event.correct,
            hinted = event.hinted,
            revealed = event.revealed,
            "attempt"
        );
    }
}
