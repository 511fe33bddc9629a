//! Paging and virtual windowing over a view of `len` rows.

use std::time::{Duration, Instant};

use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Paged,
    Virtual,
}

impl DisplayMode {
    /// Large views scroll virtually; everything else is paged.
    pub fn for_len(len: usize, config: &EngineConfig) -> Self {
        if len >= config.virtual_threshold {
            DisplayMode::Virtual
        } else {
            DisplayMode::Paged
        }
    }
}

/// One page of a view. `range` indexes into the view, not the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub total_pages: usize,
    pub range: std::ops::Range<usize>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.number >= self.total_pages
    }
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1))
}

/// Page `requested` (1-based), clamped to `[1, max(total_pages, 1)]`.
pub fn page(len: usize, page_size: usize, requested: usize) -> Page {
    let page_size = page_size.max(1);
    let total_pages = total_pages(len, page_size);
    let number = requested.clamp(1, total_pages.max(1));
    let start = ((number - 1) * page_size).min(len);
    let end = (start + page_size).min(len);
    Page {
        number,
        total_pages,
        range: start..end,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualGeometry {
    pub row_height: u32,
    pub viewport_height: u32,
    pub buffer_rows: usize,
}

impl VirtualGeometry {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            row_height: config.row_height.max(1),
            viewport_height: config.viewport_height,
            buffer_rows: config.buffer_rows,
        }
    }

    pub fn visible_rows(&self) -> usize {
        self.viewport_height.div_ceil(self.row_height.max(1)) as usize
    }

    /// Rows to render for `scroll_top` pixels of scroll, plus the spacer
    /// heights standing in for the rows above and below.
    pub fn window(&self, len: usize, scroll_top: u64) -> VirtualWindow {
        let row_height = u64::from(self.row_height.max(1));
        let start = ((scroll_top / row_height) as usize).min(len);
        let end = (start + self.visible_rows() + self.buffer_rows).min(len);
        VirtualWindow {
            range: start..end,
            top_spacer: start as u64 * row_height,
            bottom_spacer: (len - end) as u64 * row_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualWindow {
    pub range: std::ops::Range<usize>,
    pub top_spacer: u64,
    pub bottom_spacer: u64,
}

/// Drops scroll updates that arrive within `interval` of the last accepted one.
#[derive(Debug, Clone)]
pub struct ScrollThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ScrollThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_are_clamped() {
        assert_eq!(page(45, 20, 0).number, 1);
        let last = page(45, 20, 99);
        assert_eq!(last.number, 3);
        assert_eq!(last.range, 40..45);
        assert!(last.is_last());

        let empty = page(0, 20, 3);
        assert_eq!(empty.number, 1);
        assert_eq!(empty.total_pages, 0);
        assert_eq!(empty.range, 0..0);
    }

    #[test]
    fn window_includes_buffer_and_spacers() {
        let geometry = VirtualGeometry::from_config(&EngineConfig::default());
        let window = geometry.window(2000, 4000);
        assert_eq!(window.range, 100..115);
        assert_eq!(window.top_spacer, 4000);
        assert_eq!(window.bottom_spacer, 1885 * 40);

        let tail = geometry.window(2000, 1_000_000);
        assert_eq!(tail.range, 2000..2000);
        assert_eq!(tail.bottom_spacer, 0);
    }

    #[test]
    fn throttle_drops_rapid_updates() {
        let mut throttle = ScrollThrottle::new(Duration::from_millis(16));
        let start = Instant::now();
        assert!(throttle.accept(start));
        assert!(!throttle.accept(start + Duration::from_millis(5)));
        assert!(throttle.accept(start + Duration::from_millis(20)));
    }

    #[test]
    fn display_mode_switches_at_threshold() {
        let config = EngineConfig::default();
        assert_eq!(DisplayMode::for_len(999, &config), DisplayMode::Paged);
        assert_eq!(DisplayMode::for_len(1000, &config), DisplayMode::Virtual);
    }
}
