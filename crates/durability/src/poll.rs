//! Blocking poll over a reader

use crate::reader::{MaxAge, NotificationReader, ReadOutcome};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Name passed to the heartbeat callback while polling.
pub const HEARTBEAT_LABEL: &str = "NotificationReader::read_blocking";

impl NotificationReader {
    /// Poll until a read returns new data.
    ///
    /// Between attempts `heartbeat` is called with [`HEARTBEAT_LABEL`], then
    /// the thread sleeps for `interval`. Read errors are logged and polling
    /// continues.
    pub fn read_blocking(
        &mut self,
        max_age: impl Into<MaxAge>,
        interval: Duration,
        mut heartbeat: impl FnMut(&str),
    ) {
        let max_age = max_age.into();
        loop {
            match self.read(max_age) {
                Ok(ReadOutcome::NewData) => return,
                Ok(ReadOutcome::NoNewData) => {}
                Err(e) => {
                    debug!(target: "ldata::poll", error = %e, "Read failed while polling");
                }
            }
            heartbeat(HEARTBEAT_LABEL);
            thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LdataConfig;
    use crate::writer::NotificationWriter;
    use ldata_core::NotificationRecord;
    use tempfile::tempdir;

    #[test]
    fn test_returns_at_once_when_data_waiting() {
        let dir = tempdir().unwrap();
        let mut writer = NotificationWriter::new(dir.path(), LdataConfig::for_testing());
        writer
            .publish(&NotificationRecord::new().with_latest_time(100))
            .unwrap();

        let mut reader = NotificationReader::new(dir.path(), LdataConfig::for_testing());
        let mut beats = 0;
        reader.read_blocking(-1, Duration::from_millis(1), |_| beats += 1);
        assert_eq!(beats, 0);
        assert_eq!(reader.record().latest_time(), 100);
    }

    #[test]
    fn test_heartbeat_while_waiting() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let mut reader = NotificationReader::new(&path, LdataConfig::for_testing());

        let mut labels = Vec::new();
        let mut writer = Some(NotificationWriter::new(&path, LdataConfig::for_testing()));
        reader.read_blocking(-1, Duration::from_millis(1), |label| {
            labels.push(label.to_string());
            // publish on the third beat
            if labels.len() == 3 {
                if let Some(mut writer) = writer.take() {
                    writer
                        .publish(&NotificationRecord::new().with_latest_time(7))
                        .unwrap();
                }
            }
        });
        assert_eq!(labels.len(), 3);
        assert!(labels.iter().all(|l| l == HEARTBEAT_LABEL));
        assert_eq!(reader.record().latest_time(), 7);
    }
}
