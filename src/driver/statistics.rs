//! Capture and report statistics for a run

use std::{fmt::Display, time::Duration};

use indexmap::IndexMap;

use crate::memory::heap::HeapStats;

#[derive(Default, Debug)]
pub struct Timings {
    timings: IndexMap<String, Duration>,
}

impl Timings {
    pub fn record<T: AsRef<str>>(&mut self, name: T, elapsed: Duration) {
        self.timings.insert(name.as_ref().to_string(), elapsed);
    }

    pub fn get<T: AsRef<str>>(&self, name: T) -> Option<Duration> {
        self.timings.get(name.as_ref()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }
}

impl Display for Timings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.timings.keys().map(|k| k.len()).max().unwrap_or(0) + 1;

        for (k, v) in &self.timings {
            writeln!(f, "{:width$}: {:14.9}s", k, v.as_secs_f64(), width = width)?;
        }
        Ok(())
    }
}

/// The statistics captured during a run
#[derive(Default, Debug)]
pub struct Statistics {
    heap: Option<HeapStats>,
    timings: Timings,
}

impl Statistics {
    pub fn set_heap(&mut self, heap: HeapStats) {
        self.heap = Some(heap);
    }

    pub fn heap(&self) -> Option<&HeapStats> {
        self.heap.as_ref()
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn timings_mut(&mut self) -> &mut Timings {
        &mut self.timings
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(heap) = &self.heap {
            writeln!(f, "{}", heap)?;
        }
        writeln!(f, "{}", self.timings)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_timings_keep_order() {
        let mut timings = Timings::default();
        timings.record("parse", Duration::from_millis(2));
        timings.record("format-output", Duration::from_millis(1));
        let text = timings.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("parse         :"));
        assert!(lines[1].starts_with("format-output :"));
        assert_eq!(timings.get("parse"), Some(Duration::from_millis(2)));
    }

    #[test]
    pub fn test_empty_statistics_display() {
        let stats = Statistics::default();
        assert!(stats.heap().is_none());
        assert!(stats.timings().is_empty());
        assert_eq!(stats.to_string(), "\n");
    }

    #[test]
    pub fn test_heap_section() {
        let mut stats = Statistics::default();
        stats.set_heap(HeapStats::default());
        assert!(stats.to_string().starts_with("Heap Regions   :"));
    }
}
