// src/session/log.rs — Append-only diagnostic log with a character budget

use serde::Serialize;

pub const TRIM_MARKER: &str = "[trimmed older logs]\n";

/// Entries are joined with a blank line. Once the joined text exceeds the
/// budget, the whole log collapses into one entry holding only the newest
/// `budget` characters behind [`TRIM_MARKER`].
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct SessionLog {
    entries: Vec<String>,
    #[serde(skip)]
    budget: usize,
}

impl SessionLog {
    pub fn new(budget: usize) -> Self {
        Self {
            entries: Vec::new(),
            budget,
        }
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
        self.trim();
    }

    /// Convenience for the `[Stage name]\n<text>` entry shape.
    pub fn push_section(&mut self, title: &str, text: &str) {
        self.push(format!("[{title}]\n{text}"));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn joined(&self) -> String {
        self.entries.join("\n\n")
    }

    fn trim(&mut self) {
        let joined = self.joined();
        let len = joined.chars().count();
        if len <= self.budget {
            return;
        }
        let tail: String = joined.chars().skip(len - self.budget).collect();
        self.entries = vec![format!("{TRIM_MARKER}{tail}")];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_budget_keeps_entries() {
        let mut log = SessionLog::new(100);
        log.push("a");
        log.push("b");
        assert_eq!(log.entries(), ["a", "b"]);
        assert_eq!(log.joined(), "a\n\nb");
    }

    #[test]
    fn test_over_budget_collapses_to_tail() {
        let mut log = SessionLog::new(10);
        log.push("0123456789");
        log.push("abcdef");
        assert_eq!(log.entries().len(), 1);
        let only = &log.entries()[0];
        assert!(only.starts_with(TRIM_MARKER));
        // Newest text is never dropped.
        assert!(only.ends_with("abcdef"));
        assert_eq!(only.chars().count(), TRIM_MARKER.chars().count() + 10);
    }

    #[test]
    fn test_keeps_newest_section_after_repeated_trims() {
        let mut log = SessionLog::new(32);
        for i in 0..20 {
            log.push_section(&format!("Stage {i}"), "ok");
        }
        assert_eq!(log.entries().len(), 1);
        assert!(log.entries()[0].ends_with("[Stage 19]\nok"));
    }

    #[test]
    fn test_budget_counts_chars_not_bytes() {
        let mut log = SessionLog::new(4);
        log.push("ééé");
        assert_eq!(log.entries(), ["ééé"]);
    }

    #[test]
    fn test_serializes_as_list() {
        let mut log = SessionLog::new(100);
        log.push("x");
        assert_eq!(serde_json::to_value(&log).unwrap(), serde_json::json!(["x"]));
    }
}
