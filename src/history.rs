use chrono::Local;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use crate::clock::format_duration;
use crate::timer::TimerState;

/// One finished run, as written to `history.csv`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub date: String,
    pub run: String,
    pub splits_total: usize,
    pub splits_done: usize,
    pub final_time_ms: u64,
    pub final_time: String,
}

impl HistoryRecord {
    pub fn from_state(state: &TimerState) -> Self {
        Self {
            date: Local::now().format("%c").to_string(),
            run: state.run_name.clone(),
            splits_total: state.splits.len(),
            splits_done: state.splits.iter().filter(|s| s.is_recorded()).count(),
            final_time_ms: state.current_time_ms,
            final_time: format_duration(state.current_time_ms),
        }
    }
}

/// Append a record, emitting the header when the file is new
pub fn append(path: &Path, record: &HistoryRecord) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let needs_header = !path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(record)?;
    writer.flush()?;
    Ok(())
}
