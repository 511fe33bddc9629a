//! Engine events and the observers that receive them.
//!
//! The engine never talks to a presentation layer directly. Hosts register
//! one or more [`EventSink`]s and react to progress, warnings, fatal errors
//! and completion however they like (log lines, a progress bar, a TUI).

use std::{cell::RefCell, rc::Rc};

use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    Bytes,
    Rows,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress {
        processed: u64,
        total: u64,
        percent: u8,
        unit: ProgressUnit,
    },
    Warning {
        message: String,
    },
    Error {
        kind: &'static str,
        message: String,
    },
    Complete {
        row_count: usize,
        column_count: usize,
        skipped_count: usize,
        degraded: bool,
    },
}

impl EngineEvent {
    pub fn progress(processed: u64, total: u64, unit: ProgressUnit) -> Self {
        EngineEvent::Progress {
            processed,
            total,
            percent: percent_of(processed, total),
            unit,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        EngineEvent::Warning {
            message: message.into(),
        }
    }
}

pub fn percent_of(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed.min(total) as f64 / total as f64) * 100.0).round() as u8
}

/// Observer interface. Every hook defaults to a no-op so sinks only
/// implement what they care about.
pub trait EventSink {
    fn on_progress(&mut self, _processed: u64, _total: u64, _percent: u8, _unit: ProgressUnit) {}
    fn on_warning(&mut self, _message: &str) {}
    fn on_error(&mut self, _kind: &'static str, _message: &str) {}
    fn on_complete(&mut self, _rows: usize, _columns: usize, _skipped: usize, _degraded: bool) {}

    fn emit(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Progress {
                processed,
                total,
                percent,
                unit,
            } => self.on_progress(*processed, *total, *percent, *unit),
            EngineEvent::Warning { message } => self.on_warning(message),
            EngineEvent::Error { kind, message } => self.on_error(kind, message),
            EngineEvent::Complete {
                row_count,
                column_count,
                skipped_count,
                degraded,
            } => self.on_complete(*row_count, *column_count, *skipped_count, *degraded),
        }
    }
}

/// Fan-out over every registered sink.
#[derive(Default)]
pub struct EventBus {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventBus {
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn emit(&mut self, event: EngineEvent) {
        for sink in &mut self.sinks {
            sink.emit(&event);
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.emit(EngineEvent::warning(message));
    }
}

/// Forwards events to the `log` facade.
pub struct LogSink;

impl EventSink for LogSink {
    fn on_progress(&mut self, processed: u64, total: u64, percent: u8, unit: ProgressUnit) {
        let unit = match unit {
            ProgressUnit::Bytes => "bytes",
            ProgressUnit::Rows => "lines",
        };
        info!("Progress: {percent}% ({processed}/{total} {unit})");
    }

    fn on_warning(&mut self, message: &str) {
        warn!("{message}");
    }

    fn on_error(&mut self, kind: &'static str, message: &str) {
        error!("[{kind}] {message}");
    }

    fn on_complete(&mut self, rows: usize, columns: usize, skipped: usize, degraded: bool) {
        if degraded {
            warn!("Loaded {rows} row(s), {columns} column(s) with basic functionality only");
        } else {
            info!("Loaded {rows} row(s), {columns} column(s), {skipped} skipped");
        }
    }
}

/// Keeps every event it receives. Clones share the same buffer, so a host can
/// hand one clone to the engine and inspect the other.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<EngineEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Warning { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl EventSink for EventRecorder {
    fn emit(&mut self, event: &EngineEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
