//! Turning a byte source into text.
//!
//! Strategies are tried in rank order until one succeeds; the plan depends on
//! the declared size. Inputs above the streaming threshold are never turned
//! into a single string; the loader hands them to
//! [`StreamingParser`](crate::parser::StreamingParser) chunk by chunk instead.

use std::fmt;

use log::{debug, info, warn};

use crate::{
    config::EngineConfig,
    error::{EngineError, Result},
    events::{EngineEvent, EventBus, ProgressUnit, percent_of},
    io_utils,
    source::ByteSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One read of the whole input, validated as UTF-8.
    DirectText,
    /// Slice-by-slice read into a buffer, decoded as UTF-8 then ISO-8859-1.
    BufferedDecode,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::DirectText => write!(f, "direct text read"),
            Strategy::BufferedDecode => write!(f, "buffered decode"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestPlan {
    Text(Vec<Strategy>),
    Streaming { chunk_size: u64 },
}

pub fn plan_for(size: u64, config: &EngineConfig) -> Result<IngestPlan> {
    if size == 0 {
        return Err(EngineError::EmptyInput);
    }
    let plan = if size > config.streaming_threshold {
        IngestPlan::Streaming {
            chunk_size: config.stream_chunk_size,
        }
    } else if size < config.direct_read_threshold {
        IngestPlan::Text(vec![Strategy::DirectText, Strategy::BufferedDecode])
    } else {
        IngestPlan::Text(vec![Strategy::BufferedDecode])
    };
    Ok(plan)
}

/// Emits a progress event each time another quarter of the input is read.
#[derive(Debug, Clone)]
pub struct ProgressTicker {
    total: u64,
    next_mark: u8,
    unit: ProgressUnit,
}

impl ProgressTicker {
    const STEP: u8 = 25;

    pub fn new(total: u64, unit: ProgressUnit) -> Self {
        Self {
            total,
            next_mark: Self::STEP,
            unit,
        }
    }

    pub fn update(&mut self, processed: u64, bus: &mut EventBus) {
        let percent = percent_of(processed, self.total);
        if self.next_mark <= 100 && percent >= self.next_mark {
            while self.next_mark <= percent {
                self.next_mark += Self::STEP;
            }
            bus.emit(EngineEvent::progress(processed, self.total, self.unit));
        }
    }
}

/// Reads the whole source as text, trying each strategy of `strategies` in
/// order. Returns the error of the last strategy when every one fails.
pub fn read_text(
    source: &mut dyn ByteSource,
    strategies: &[Strategy],
    config: &EngineConfig,
    bus: &mut EventBus,
) -> Result<String> {
    let size = source.size();
    if size == 0 {
        return Err(EngineError::EmptyInput);
    }
    let mut last_error = EngineError::Decode("no ingestion strategy available".to_string());
    for (rank, strategy) in strategies.iter().enumerate() {
        debug!("Reading {} with {strategy}", source.name());
        let attempt = match strategy {
            Strategy::DirectText => direct_text(source, bus),
            Strategy::BufferedDecode => buffered_decode(source, config.read_chunk_size, bus),
        };
        match attempt {
            Ok(text) => {
                info!("Read {} character(s) with {strategy}", text.len());
                return Ok(text);
            }
            Err(err) => {
                if rank + 1 < strategies.len() {
                    warn!("{strategy} failed: {err}");
                    bus.warn(format!("{strategy} failed ({err}), trying an alternative method"));
                }
                last_error = err;
            }
        }
    }
    Err(last_error)
}

fn direct_text(source: &mut dyn ByteSource, bus: &mut EventBus) -> Result<String> {
    let size = source.size();
    let bytes = source.read_range(0, size)?;
    bus.emit(EngineEvent::progress(bytes.len() as u64, size, ProgressUnit::Bytes));
    let bytes = io_utils::strip_bom(&bytes);
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|err| EngineError::Decode(format!("invalid UTF-8 at byte {}", err.valid_up_to())))
}

fn buffered_decode(
    source: &mut dyn ByteSource,
    chunk_size: u64,
    bus: &mut EventBus,
) -> Result<String> {
    let size = source.size();
    let mut buffer = Vec::with_capacity(size as usize);
    let mut ticker = ProgressTicker::new(size, ProgressUnit::Bytes);
    let mut start = 0;
    while start < size {
        let end = (start + chunk_size).min(size);
        let slice = source.read_range(start, end)?;
        if slice.is_empty() {
            break;
        }
        start += slice.len() as u64;
        buffer.extend_from_slice(&slice);
        ticker.update(start, bus);
    }
    let (text, used_fallback) = io_utils::decode_with_fallback(io_utils::strip_bom(&buffer))?;
    if used_fallback {
        bus.warn("Input is not valid UTF-8, decoded as ISO-8859-1");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::EventRecorder, source::MemorySource};

    fn recording_bus() -> (EventBus, EventRecorder) {
        let recorder = EventRecorder::new();
        let mut bus = EventBus::default();
        bus.subscribe(Box::new(recorder.clone()));
        (bus, recorder)
    }

    #[test]
    fn plan_depends_on_size() {
        let config = EngineConfig {
            direct_read_threshold: 10,
            streaming_threshold: 100,
            stream_chunk_size: 7,
            ..EngineConfig::default()
        };
        assert!(matches!(plan_for(0, &config), Err(EngineError::EmptyInput)));
        assert_eq!(
            plan_for(5, &config).unwrap(),
            IngestPlan::Text(vec![Strategy::DirectText, Strategy::BufferedDecode])
        );
        assert_eq!(
            plan_for(50, &config).unwrap(),
            IngestPlan::Text(vec![Strategy::BufferedDecode])
        );
        assert_eq!(
            plan_for(101, &config).unwrap(),
            IngestPlan::Streaming { chunk_size: 7 }
        );
    }

    #[test]
    fn falls_back_to_latin1_after_direct_read_fails() {
        let (mut bus, recorder) = recording_bus();
        let mut source = MemorySource::new("latin1.csv", b"name\ncaf\xe9\n".to_vec());
        let text = read_text(
            &mut source,
            &[Strategy::DirectText, Strategy::BufferedDecode],
            &EngineConfig::default(),
            &mut bus,
        )
        .unwrap();
        assert_eq!(text, "name\ncafé\n");
        let warnings = recorder.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[1].contains("ISO-8859-1"));
    }

    #[test]
    fn buffered_read_reports_quarter_progress() {
        let (mut bus, recorder) = recording_bus();
        let mut source = MemorySource::new("data", vec![b'x'; 100]);
        let config = EngineConfig {
            read_chunk_size: 10,
            ..EngineConfig::default()
        };
        read_text(&mut source, &[Strategy::BufferedDecode], &config, &mut bus).unwrap();
        let percents: Vec<u8> = recorder
            .events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![30, 50, 80, 100]);
    }
}
