//! The per-session engine and its cooperative loader.
//!
//! A load runs as a sequence of bounded steps: reading the text, each parse
//! batch (or each streaming chunk), then type inference. Hosts either drive
//! [`Loader::step`] themselves, interleaving their own work between steps, or
//! call [`Engine::load`] to run every step back to back. The loader holds the
//! engine mutably, so no filter, sort or second load can run mid-parse.

use std::{
    borrow::Cow,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use chrono::Utc;
use log::{debug, info, warn};

use crate::{
    config::EngineConfig,
    dataset::{Dataset, Row},
    error::{EngineError, Result},
    events::{EngineEvent, EventBus, EventSink, ProgressUnit},
    export::{self, ExportFormat},
    filter::{self, Filter, Selection},
    history::FilterHistory,
    inference::{self, ColumnType},
    ingest::{self, IngestPlan, ProgressTicker},
    pagination::{self, DisplayMode, Page, ScrollThrottle, VirtualGeometry, VirtualWindow},
    parser::{DatasetBuilder, StreamingParser, TextBatches},
    source::ByteSource,
    suggest::{self, Suggestion},
    view::{FilteredView, SortDirection},
};

/// Counters reported between load steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseProgress {
    pub rows: usize,
    pub skipped: usize,
    pub bytes_read: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Whole text parsed in one step.
    SinglePass,
    /// Text parsed `batch_size` lines per step.
    Batched,
    /// Raw chunks parsed as they are read.
    Streaming,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub rows: usize,
    pub columns: usize,
    pub skipped: usize,
    pub mode: LoadMode,
    /// The deadline passed; types and suggestions were skipped.
    pub degraded: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Pending(ParseProgress),
    Complete(LoadSummary),
}

/// Rows of one page, in view order.
#[derive(Debug)]
pub struct PageView<'a> {
    pub page: Page,
    pub rows: Vec<&'a Row>,
}

/// Rows of one virtual window, in view order.
#[derive(Debug)]
pub struct WindowView<'a> {
    pub window: VirtualWindow,
    pub rows: Vec<&'a Row>,
}

pub struct Engine {
    config: EngineConfig,
    bus: EventBus,
    dataset: Option<Dataset>,
    column_types: Vec<ColumnType>,
    suggestions: Vec<Suggestion>,
    filters: Vec<Filter>,
    view: FilteredView,
    last_limit: Option<usize>,
    history: FilterHistory,
    throttle: ScrollThrottle,
    degraded: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            history: FilterHistory::new(config.history_limit),
            throttle: ScrollThrottle::new(config.scroll_throttle()),
            config,
            bus: EventBus::default(),
            dataset: None,
            column_types: Vec::new(),
            suggestions: Vec::new(),
            filters: Vec::new(),
            view: FilteredView::default(),
            last_limit: None,
            degraded: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.bus.subscribe(sink);
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    fn loaded(&self) -> Result<&Dataset> {
        self.dataset.as_ref().ok_or(EngineError::NotLoaded)
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }

    pub fn column_type(&self, column: &str) -> Result<ColumnType> {
        let index = self.column_index(column)?;
        Ok(self.column_types.get(index).copied().unwrap_or_default())
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn view(&self) -> &FilteredView {
        &self.view
    }

    /// True when the last load hit the processing deadline.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.loaded()?
            .column_index(column)
            .ok_or_else(|| EngineError::UnknownColumn(column.to_string()))
    }

    /// Starts a load. Any previous dataset, filters and view are dropped
    /// immediately, so a failed load leaves the engine without a dataset.
    pub fn begin_load(&mut self, source: Box<dyn ByteSource>) -> Loader<'_> {
        self.dataset = None;
        self.column_types.clear();
        self.suggestions.clear();
        self.filters.clear();
        self.view = FilteredView::default();
        self.last_limit = None;
        self.history.clear();
        self.degraded = false;
        info!("Loading {} ({} byte(s))", source.name(), source.size());
        Loader {
            engine: self,
            source,
            stage: Stage::Start,
            started: Instant::now(),
            progress: ParseProgress::default(),
        }
    }

    /// Runs every load step back to back.
    pub fn load(&mut self, source: Box<dyn ByteSource>) -> Result<LoadSummary> {
        let mut loader = self.begin_load(source);
        loop {
            if let LoadStatus::Complete(summary) = loader.step()? {
                return Ok(summary);
            }
        }
    }

    /// Replaces the filter list. Filters without a value (other than the
    /// unary operators) are dropped; unknown columns are rejected.
    pub fn set_filters(&mut self, filters: Vec<Filter>) -> Result<()> {
        let dataset = self.loaded()?;
        let active: Vec<Filter> = filters.into_iter().filter(Filter::is_active).collect();
        if let Some(unknown) = active
            .iter()
            .find(|f| dataset.column_index(&f.column).is_none())
        {
            return Err(EngineError::UnknownColumn(unknown.column.clone()));
        }
        debug!("Active filters: {}", active.len());
        self.filters = active;
        Ok(())
    }

    /// Evaluates the current filters. `limit` caps the result for previews;
    /// `None` scans the whole dataset.
    pub fn apply_filters(&mut self, limit: Option<usize>) -> Result<&FilteredView> {
        self.run_filters(limit)?;
        self.history.record(&self.filters);
        Ok(&self.view)
    }

    /// Re-runs the current filters without a cap.
    pub fn show_all(&mut self) -> Result<&FilteredView> {
        self.apply_filters(None)
    }

    fn run_filters(&mut self, limit: Option<usize>) -> Result<()> {
        let dataset = self.dataset.as_ref().ok_or(EngineError::NotLoaded)?;
        let bus = &mut self.bus;
        let compiled = filter::compile_filters(dataset, &self.filters, |message| bus.warn(message));
        let selection = filter::evaluate(dataset, &compiled, limit);
        if selection.truncated {
            info!(
                "Showing the first {} matching row(s), more are available",
                selection.rows.len()
            );
        }
        self.view = FilteredView::from_selection(selection).with_filters(self.filters.clone());
        self.last_limit = limit;
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Restores the previous filter list and re-applies it. Returns `None`
    /// when there is nothing to undo.
    pub fn undo(&mut self) -> Result<Option<&FilteredView>> {
        self.loaded()?;
        match self.history.undo() {
            Some(filters) => {
                self.filters = filters.to_vec();
                self.run_filters(self.last_limit)?;
                Ok(Some(&self.view))
            }
            None => Ok(None),
        }
    }

    pub fn redo(&mut self) -> Result<Option<&FilteredView>> {
        self.loaded()?;
        match self.history.redo() {
            Some(filters) => {
                self.filters = filters.to_vec();
                self.run_filters(self.last_limit)?;
                Ok(Some(&self.view))
            }
            None => Ok(None),
        }
    }

    /// Sets and applies a saved filter list as a capped preview.
    pub fn apply_preset(&mut self, filters: &[Filter]) -> Result<&FilteredView> {
        self.set_filters(filters.to_vec())?;
        self.apply_filters(Some(self.config.preview_limit))
    }

    /// Sorts the current view by `column`. Without a direction the current
    /// one is toggled (ascending on a new column). Returns the direction used.
    pub fn sort(&mut self, column: &str, direction: Option<SortDirection>) -> Result<SortDirection> {
        let index = self.column_index(column)?;
        let column_type = self.column_types.get(index).copied().unwrap_or_default();
        let direction = direction.unwrap_or_else(|| self.view.next_direction(index));
        let dataset = self.dataset.as_ref().ok_or(EngineError::NotLoaded)?;
        self.view.sort_by(dataset, index, column_type, direction);
        Ok(direction)
    }

    /// Narrows the view to rows containing `term` in a visible column. An
    /// empty term restores the filtered view. Returns the new row count.
    pub fn search_within(&mut self, term: &str) -> Result<usize> {
        let columns = self.visible_columns()?;
        let dataset = self.dataset.as_ref().ok_or(EngineError::NotLoaded)?;
        self.view.search_within(dataset, &columns, term);
        Ok(self.view.len())
    }

    pub fn visible_columns(&self) -> Result<Vec<usize>> {
        Ok(export::visible_columns(self.loaded()?.headers(), &self.config))
    }

    pub fn visible_headers(&self) -> Result<Vec<&str>> {
        let dataset = self.loaded()?;
        Ok(self
            .visible_columns()?
            .into_iter()
            .map(|idx| dataset.headers()[idx].as_str())
            .collect())
    }

    pub fn display_mode(&self) -> DisplayMode {
        DisplayMode::for_len(self.view.len(), &self.config)
    }

    pub fn get_page(&self, number: usize) -> Result<PageView<'_>> {
        let dataset = self.loaded()?;
        let page = pagination::page(self.view.len(), self.config.page_size, number);
        let rows = self.view.rows()[page.range.clone()]
            .iter()
            .filter_map(|&idx| dataset.row(idx))
            .collect();
        Ok(PageView { page, rows })
    }

    pub fn window(&self, scroll_top: u64) -> Result<WindowView<'_>> {
        let dataset = self.loaded()?;
        let window = VirtualGeometry::from_config(&self.config).window(self.view.len(), scroll_top);
        let rows = self.view.rows()[window.range.clone()]
            .iter()
            .filter_map(|&idx| dataset.row(idx))
            .collect();
        Ok(WindowView { window, rows })
    }

    /// Throttled variant of [`Engine::window`] for scroll events. Returns
    /// `None` when the update arrives too soon after the previous one.
    pub fn on_scroll(&mut self, scroll_top: u64, now: Instant) -> Result<Option<WindowView<'_>>> {
        self.loaded()?;
        if !self.throttle.accept(now) {
            return Ok(None);
        }
        self.window(scroll_top).map(Some)
    }

    /// Row indices an export covers. A capped view is widened to every row
    /// matching the filters it was evaluated from, keeping its sort and search.
    fn export_rows(&self) -> Result<Cow<'_, [usize]>> {
        let dataset = self.loaded()?;
        if !self.view.truncated() {
            return Ok(Cow::Borrowed(self.view.rows()));
        }
        let compiled = filter::compile_filters(dataset, self.view.filters(), |_| {});
        let mut view = FilteredView::from_selection(filter::evaluate(dataset, &compiled, None));
        if let Some((column, direction)) = self.view.sort_state() {
            let column_type = self.column_types.get(column).copied().unwrap_or_default();
            view.sort_by(dataset, column, column_type, direction);
        }
        if let Some(term) = self.view.search_term() {
            view.search_within(dataset, &self.visible_columns()?, term);
        }
        Ok(Cow::Owned(view.rows().to_vec()))
    }

    /// Writes the current view to `writer`. Returns the number of rows written.
    pub fn export_view<W: Write>(&self, writer: W, format: ExportFormat) -> Result<usize> {
        let dataset = self.loaded()?;
        let rows = self.export_rows()?;
        export::write_view(writer, dataset, &rows, &self.visible_columns()?, format)
    }

    /// Exports into `dir` under a timestamped `filtered_data_*` name.
    pub fn export_to_dir(&self, dir: &Path, format: ExportFormat) -> Result<PathBuf> {
        if self.export_rows()?.is_empty() {
            return Err(EngineError::NothingToExport);
        }
        let path = dir.join(export::export_filename(format, Utc::now()));
        let file = File::create(&path)?;
        self.export_view(BufWriter::new(file), format)?;
        Ok(path)
    }
}

enum Stage {
    Start,
    Batches {
        batches: TextBatches,
        builder: DatasetBuilder,
        batch_size: usize,
        ticker: ProgressTicker,
    },
    Streaming {
        parser: StreamingParser,
        offset: u64,
        chunk_size: u64,
        ticker: ProgressTicker,
    },
    Inference {
        dataset: Dataset,
        mode: LoadMode,
        degraded: bool,
    },
    Finished(LoadSummary),
    Failed,
}

/// Drives one load. See the module docs.
pub struct Loader<'e> {
    engine: &'e mut Engine,
    source: Box<dyn ByteSource>,
    stage: Stage,
    started: Instant,
    progress: ParseProgress,
}

impl Loader<'_> {
    pub fn progress(&self) -> ParseProgress {
        self.progress
    }

    fn deadline_passed(&self) -> bool {
        self.started.elapsed() >= self.engine.config.timeout()
    }

    /// Performs one bounded unit of work. Errors are reported through an
    /// `error` event before they are returned; the engine keeps no dataset.
    pub fn step(&mut self) -> Result<LoadStatus> {
        if matches!(self.stage, Stage::Failed) {
            return Err(EngineError::NotLoaded);
        }
        match self.advance() {
            Ok(status) => Ok(status),
            Err(err) => {
                warn!("Load of {} failed: {err}", self.source.name());
                self.engine.bus.emit(EngineEvent::Error {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                self.stage = Stage::Failed;
                Err(err)
            }
        }
    }

    fn advance(&mut self) -> Result<LoadStatus> {
        let stage = std::mem::replace(&mut self.stage, Stage::Failed);
        let next = match stage {
            Stage::Start => self.start()?,
            Stage::Batches {
                mut batches,
                mut builder,
                batch_size,
                mut ticker,
            } => {
                let degraded = self.deadline_passed();
                if degraded {
                    self.report_timeout();
                    batches.next_batch(&mut builder, usize::MAX)?;
                } else {
                    batches.next_batch(&mut builder, batch_size)?;
                    ticker.update(batches.consumed_lines() as u64, &mut self.engine.bus);
                }
                self.forward_warnings(builder.take_warnings());
                self.progress.rows = builder.row_count();
                self.progress.skipped = builder.skipped_count();
                if batches.is_done() || degraded {
                    let mode = if batch_size == usize::MAX {
                        LoadMode::SinglePass
                    } else {
                        LoadMode::Batched
                    };
                    let (dataset, warnings) = builder.finish()?;
                    self.forward_warnings(warnings);
                    Stage::Inference {
                        dataset,
                        mode,
                        degraded,
                    }
                } else {
                    Stage::Batches {
                        batches,
                        builder,
                        batch_size,
                        ticker,
                    }
                }
            }
            Stage::Streaming {
                mut parser,
                mut offset,
                chunk_size,
                mut ticker,
            } => {
                let size = self.source.size();
                let degraded = self.deadline_passed();
                if degraded {
                    self.report_timeout();
                }
                loop {
                    let end = (offset + chunk_size).min(size);
                    let chunk = self.source.read_range(offset, end)?;
                    if chunk.is_empty() {
                        offset = size;
                    } else {
                        offset += chunk.len() as u64;
                        parser.feed(&chunk)?;
                    }
                    if !degraded || offset >= size {
                        break;
                    }
                }
                if !degraded {
                    ticker.update(offset, &mut self.engine.bus);
                }
                self.forward_warnings(parser.builder_mut().take_warnings());
                self.progress.bytes_read = offset;
                self.progress.rows = parser.row_count();
                self.progress.skipped = parser.builder_mut().skipped_count();
                if offset >= size {
                    let (dataset, warnings) = parser.finish()?;
                    self.forward_warnings(warnings);
                    Stage::Inference {
                        dataset,
                        mode: LoadMode::Streaming,
                        degraded,
                    }
                } else {
                    Stage::Streaming {
                        parser,
                        offset,
                        chunk_size,
                        ticker,
                    }
                }
            }
            Stage::Inference {
                dataset,
                mode,
                degraded,
            } => {
                let degraded = degraded || {
                    let late = self.deadline_passed();
                    if late {
                        self.report_timeout();
                    }
                    late
                };
                let summary = self.install(dataset, mode, degraded);
                self.stage = Stage::Finished(summary.clone());
                return Ok(LoadStatus::Complete(summary));
            }
            Stage::Finished(summary) => {
                self.stage = Stage::Finished(summary.clone());
                return Ok(LoadStatus::Complete(summary));
            }
            Stage::Failed => return Err(EngineError::NotLoaded),
        };
        self.stage = next;
        Ok(LoadStatus::Pending(self.progress))
    }

    fn start(&mut self) -> Result<Stage> {
        let config = &self.engine.config;
        let size = self.source.size();
        match ingest::plan_for(size, config)? {
            IngestPlan::Text(strategies) => {
                let text = ingest::read_text(
                    self.source.as_mut(),
                    &strategies,
                    &self.engine.config,
                    &mut self.engine.bus,
                )?;
                self.progress.bytes_read = size;
                let batches = TextBatches::new(text);
                let total = batches.total_lines();
                let config = &self.engine.config;
                let batch_size = if total > config.batch_threshold {
                    info!(
                        "Parsing {total} line(s) in batches of {}",
                        config.batch_size
                    );
                    config.batch_size
                } else {
                    usize::MAX
                };
                Ok(Stage::Batches {
                    batches,
                    builder: DatasetBuilder::new(),
                    batch_size,
                    ticker: ProgressTicker::new(total as u64, ProgressUnit::Rows),
                })
            }
            IngestPlan::Streaming { chunk_size } => {
                info!("Streaming {size} byte(s) in chunks of {chunk_size}");
                Ok(Stage::Streaming {
                    parser: StreamingParser::new(),
                    offset: 0,
                    chunk_size,
                    ticker: ProgressTicker::new(size, ProgressUnit::Bytes),
                })
            }
        }
    }

    fn report_timeout(&mut self) {
        let err = EngineError::ProcessingTimeout(self.engine.config.timeout_secs);
        warn!("{err}, completing without type detection");
        self.engine.bus.warn(format!(
            "{err}; finishing the load with basic functionality (all columns treated as text)"
        ));
    }

    fn forward_warnings(&mut self, warnings: Vec<String>) {
        for message in warnings {
            self.engine.bus.warn(message);
        }
    }

    /// Hands the parsed dataset to the engine and announces completion.
    fn install(&mut self, dataset: Dataset, mode: LoadMode, degraded: bool) -> LoadSummary {
        let engine = &mut *self.engine;
        if degraded {
            engine.column_types = vec![ColumnType::Text; dataset.column_count()];
            engine.suggestions.clear();
        } else {
            let bus = &mut engine.bus;
            engine.column_types =
                inference::infer_column_types(&dataset, &engine.config, |message| {
                    bus.warn(message)
                });
            engine.suggestions = suggest::suggest_filters(&dataset, &engine.column_types);
        }

        engine.view = FilteredView::from_selection(Selection {
            rows: (0..dataset.len()).collect(),
            truncated: false,
        });
        engine.degraded = degraded;

        let summary = LoadSummary {
            rows: dataset.len(),
            columns: dataset.column_count(),
            skipped: dataset.skipped_count(),
            mode,
            degraded,
            elapsed: self.started.elapsed(),
        };
        engine.bus.emit(EngineEvent::Complete {
            row_count: summary.rows,
            column_count: summary.columns,
            skipped_count: summary.skipped,
            degraded,
        });
        engine.dataset = Some(dataset);
        summary
    }
}
