//! Output formatting.

use ldata_core::NotificationRecord;
use ldata_durability::NotificationReader;
use std::path::Path;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Aligned key/value block
    Human,
    /// One JSON document
    Json,
}

impl OutputMode {
    /// Pick the mode from the `--json` flag.
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

/// Format the reader's current record with its resolved data file.
pub fn format_notification(reader: &NotificationReader, mode: OutputMode) -> String {
    let record = reader.record();
    let data_path = reader.data_path();
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&serde_json::json!({
            "record": record,
            "latest_valid_time": record.latest_valid_time(),
            "data_path": data_path.as_ref().map(|p| p.display().to_string()),
            "data_type": reader.resolved_data_type(),
            "queue_id": reader.last_queue_message_id(),
        }))
        .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputMode::Human => {
            let mut out = record.to_string();
            if let Some(path) = data_path {
                out.push_str(&format!("\nDataPath    : {}", path.display()));
            }
            if let Some(id) = reader.last_queue_message_id() {
                out.push_str(&format!("\nQueueId     : {}", id));
            }
            out
        }
    }
}

/// One-line confirmation of a publish.
pub fn format_published(dir: &Path, record: &NotificationRecord, queue_id: Option<u64>) -> String {
    let mut line = format!(
        "Published {} to {}",
        record.latest_calendar(),
        dir.display()
    );
    if let Some(id) = queue_id {
        line.push_str(&format!(" (queue id {})", id));
    }
    line
}

/// Message for a read that found nothing new.
pub fn format_no_new_data(mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => "null".to_string(),
        OutputMode::Human => "(no new data)".to_string(),
    }
}
