//! Habit collection backed by a JSON file

use nudge_api::HabitSummary;
use nudge_host_api::HabitSource;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads a JSON array of habit summaries on every snapshot.
///
/// A missing file is an empty collection; an unreadable one is logged and
/// treated as empty so reminders for the remaining categories still work.
#[derive(Debug, Clone)]
pub struct JsonHabitSource {
    path: PathBuf,
}

impl JsonHabitSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<HabitSummary>, String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.to_string()),
        };
        serde_json::from_str(&content).map_err(|e| e.to_string())
    }
}

impl HabitSource for JsonHabitSource {
    fn list_habits(&self) -> Vec<HabitSummary> {
        match self.read() {
            Ok(habits) => {
                debug!(path = %self.path.display(), count = habits.len(), "Habits loaded");
                habits
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read habits file");
                Vec::new()
            }
        }
    }
}
