use std::collections::VecDeque;

use crate::filter::Filter;

/// Undo/redo snapshots of the applied filter list.
#[derive(Debug, Clone)]
pub struct FilterHistory {
    entries: VecDeque<Vec<Filter>>,
    /// Index of the current snapshot in `entries`.
    cursor: Option<usize>,
    limit: usize,
}

impl FilterHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            limit: limit.max(1),
        }
    }

    /// Records a newly applied filter list. Anything after the current
    /// snapshot (the redo branch) is discarded; the oldest snapshot goes once
    /// the limit is reached.
    pub fn record(&mut self, filters: &[Filter]) {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
            if self.entries.back().is_some_and(|last| last.as_slice() == filters) {
                return;
            }
        }
        self.entries.push_back(filters.to_vec());
        if self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor + 1 < self.entries.len())
    }

    pub fn undo(&mut self) -> Option<&[Filter]> {
        let cursor = self.cursor.filter(|&cursor| cursor > 0)? - 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor).map(Vec::as_slice)
    }

    pub fn redo(&mut self) -> Option<&[Filter]> {
        let cursor = self.cursor? + 1;
        let entry = self.entries.get(cursor)?;
        self.cursor = Some(cursor);
        Some(entry.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operator;

    fn filters(value: &str) -> Vec<Filter> {
        vec![Filter::new("a", Operator::Equals, value)]
    }

    #[test]
    fn undo_redo_walks_snapshots() {
        let mut history = FilterHistory::new(50);
        history.record(&filters("1"));
        history.record(&filters("2"));
        history.record(&filters("3"));
        assert_eq!(history.undo().unwrap()[0].value, "2");
        assert_eq!(history.undo().unwrap()[0].value, "1");
        assert!(history.undo().is_none());
        assert_eq!(history.redo().unwrap()[0].value, "2");

        history.record(&filters("4"));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo().unwrap()[0].value, "2");
    }

    #[test]
    fn oldest_snapshot_is_dropped_at_limit() {
        let mut history = FilterHistory::new(2);
        for value in ["1", "2", "3"] {
            history.record(&filters(value));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo().unwrap()[0].value, "2");
        assert!(!history.can_undo());
    }
}
