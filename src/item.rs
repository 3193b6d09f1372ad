//! Timeline item model consumed by the store.
//!
//! Items are owned by the editor's timeline; [`crate::store::AudioStore`]
//! keeps its own clone and never mutates what the caller supplies.

use serde::{Deserialize, Serialize};

/// Millisecond interval `[from, to)` on the global timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: u64,
    pub to: u64,
}

impl TimeRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Interval length in milliseconds. Zero for malformed ranges.
    pub fn len_ms(&self) -> u64 {
        self.to.saturating_sub(self.from)
    }

    /// A range with `to <= from` never contributes audio.
    pub fn is_valid(&self) -> bool {
        self.to > self.from
    }
}

/// Audio-bearing timeline item (audio clip or the audio of a video clip).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioItem {
    /// Stable identity across edits.
    pub id: String,
    /// Source locator (file path or URL).
    pub src: String,
    /// Visible interval on the global timeline, milliseconds.
    pub display: TimeRange,
    /// In-source trim offset, milliseconds.
    #[serde(default)]
    pub trim_from: u64,
}

impl AudioItem {
    pub fn new(id: impl Into<String>, src: impl Into<String>, display: TimeRange) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            display,
            trim_from: 0,
        }
    }

    pub fn with_trim(mut self, trim_from: u64) -> Self {
        self.trim_from = trim_from;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_validity() {
        assert!(TimeRange::new(0, 1000).is_valid());
        assert!(!TimeRange::new(1000, 1000).is_valid());
        assert!(!TimeRange::new(3000, 1000).is_valid());
        assert_eq!(TimeRange::new(3000, 1000).len_ms(), 0);
        assert_eq!(TimeRange::new(500, 2500).len_ms(), 2000);
    }

    #[test]
    fn test_trim_defaults_when_absent() {
        // Items serialized without a trim carry offset zero
        let json = r#"{"id":"a","src":"a.wav","display":{"from":0,"to":1000}}"#;
        let item: AudioItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.trim_from, 0);
        assert_eq!(item, AudioItem::new("a", "a.wav", TimeRange::new(0, 1000)));
    }
}
