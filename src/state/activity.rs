use log::{info, warn};

use super::model::{LogEntry, Severity};

/// Append-only, time-ordered record of operator-visible events.
///
/// Entries are mirrored to the process logger as they are appended. The only
/// way to shrink the log is [`ActivityLog::clear`].
#[derive(Debug, Default, Clone)]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new entry stamped with the current wall-clock time.
    ///
    /// # Arguments
    /// * `severity` - The severity class of the event.
    /// * `message` - Operator-facing description.
    ///
    /// # Returns
    /// The entry that was appended.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) -> &LogEntry {
        let entry = LogEntry::new(severity, message);

        match severity {
            Severity::Info | Severity::Success => info!("[{severity}] {}", entry.message()),
            Severity::Error => warn!("[{severity}] {}", entry.message()),
        }

        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_insertion_order() {
        let mut log = ActivityLog::new();
        log.push(Severity::Info, "first");
        log.push(Severity::Success, "second");
        log.push(Severity::Error, "third");

        let messages: Vec<_> = log.entries().iter().map(LogEntry::message).collect();
        assert_eq!(messages, ["first", "second", "third"]);
        assert_eq!(log.last().map(LogEntry::severity), Some(Severity::Error));
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut log = ActivityLog::new();
        for i in 0..16 {
            log.push(Severity::Info, format!("event {i}"));
        }

        let entries = log.entries();
        assert!(entries
            .windows(2)
            .all(|w| w[0].timestamp() <= w[1].timestamp()));
    }

    #[test]
    fn clear_is_the_only_way_to_shrink() {
        let mut log = ActivityLog::new();
        log.push(Severity::Info, "a");
        log.push(Severity::Info, "b");
        assert_eq!(log.len(), 2);

        log.clear();
        assert!(log.is_empty());
    }
}
