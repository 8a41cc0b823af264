//! Result recorder: persistence of terminal task reports.
//!
//! Two forms per report: an atomic per-task snapshot (written to a temp
//! file, then renamed, so a reader never observes a partial report) and an
//! append to the shared JSONL log consumed downstream. Recording the same
//! terminated conversation again is a no-op: the snapshot bytes match and
//! nothing is re-appended.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::report::TaskReport;
use crate::error::{GridpilotError, Result};

pub struct ResultRecorder {
    report_dir: PathBuf,
    append_lock: Mutex<()>,
}

impl ResultRecorder {
    pub fn new(report_dir: impl AsRef<Path>) -> Result<Self> {
        let report_dir = report_dir.as_ref().to_path_buf();
        fs::create_dir_all(&report_dir)?;
        Ok(Self {
            report_dir,
            append_lock: Mutex::new(()),
        })
    }

    fn snapshot_path(&self, task_id: &str) -> PathBuf {
        self.report_dir.join(format!("{}.json", task_id))
    }

    fn log_path(&self) -> PathBuf {
        self.report_dir.join("reports.jsonl")
    }

    /// Persist a report. Returns the snapshot path.
    pub fn record(&self, report: &TaskReport) -> Result<PathBuf> {
        let serialized = serde_json::to_string(report)?;
        let path = self.snapshot_path(&report.task_id);

        // Re-recording a terminated conversation yields identical bytes;
        // skip the write and the log append entirely
        if let Ok(existing) = fs::read_to_string(&path) {
            if existing == serialized {
                return Ok(path);
            }
        }

        let tmp = self.report_dir.join(format!(".{}.json.tmp", report.task_id));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serialized.as_bytes())?;
        }
        fs::rename(&tmp, &path)?;

        let _guard = self
            .append_lock
            .lock()
            .map_err(|e| GridpilotError::Storage(e.to_string()))?;
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())?;
        writeln!(log, "{}", serialized)?;

        tracing::debug!(task_id = %report.task_id, path = %path.display(), "Report recorded");
        Ok(path)
    }

    /// Load a previously recorded report snapshot.
    pub fn load(&self, task_id: &str) -> Result<Option<TaskReport>> {
        let path = self.snapshot_path(task_id);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}
