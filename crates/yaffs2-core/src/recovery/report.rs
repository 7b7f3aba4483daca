/// Per-run recovery report
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One output file written during a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveredFile {
    pub object_id: u32,
    pub block_position: u32,
    /// Image offset of the header occurrence
    pub header_offset: u64,
    pub name: String,
    pub path: PathBuf,
    /// Size field of the header, used to cap the output
    pub declared_size: u64,
    pub chunks_required: u64,
    pub chunks_recovered: u64,
    pub bytes_written: u64,
    pub sha256: Option<String>,
}

impl RecoveredFile {
    /// Fewer payload units were left than the header asked for
    pub fn is_truncated(&self) -> bool {
        self.chunks_recovered < self.chunks_required
    }
}

/// A header occurrence whose output could not be written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRecovery {
    pub object_id: u32,
    pub header_offset: u64,
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub output_directory: PathBuf,
    pub files: Vec<RecoveredFile>,
    pub failures: Vec<FailedRecovery>,
    /// Header occurrences declaring a zero-byte file
    pub skipped_empty: usize,
    /// Header occurrences whose object had no payload left
    pub skipped_no_payload: usize,
    pub total_bytes: u64,
}

impl RecoveryReport {
    pub fn new(output_directory: PathBuf) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            output_directory,
            files: Vec::new(),
            failures: Vec::new(),
            skipped_empty: 0,
            skipped_no_payload: 0,
            total_bytes: 0,
        }
    }

    pub fn files_written(&self) -> usize {
        self.files.len()
    }

    pub fn truncated_files(&self) -> usize {
        self.files.iter().filter(|f| f.is_truncated()).count()
    }

    pub(crate) fn record(&mut self, file: RecoveredFile) {
        self.total_bytes += file.bytes_written;
        self.files.push(file);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
