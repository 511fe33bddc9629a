pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod filter;
pub mod history;
pub mod inference;
pub mod ingest;
pub mod io_utils;
pub mod pagination;
pub mod parser;
pub mod presets;
pub mod source;
pub mod suggest;
pub mod table;
pub mod view;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{AnalyzeArgs, Cli, Commands, ConfigInitArgs, FilterArgs, InputArgs, LoadArgs, PresetAction, PresetArgs},
    config::EngineConfig,
    dataset::Row,
    engine::Engine,
    events::LogSink,
    presets::PresetStore,
    table::TableStyle,
    view::SortDirective,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_sieve", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Filter(args) => handle_filter(&args),
        Commands::Types(args) => handle_types(&args),
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::Suggest(args) => handle_suggest(&args),
        Commands::Preset(args) => handle_preset(&args),
        Commands::ConfigInit(args) => handle_config_init(&args),
    }
}

fn build_config(args: &LoadArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = timeout;
    }
    Ok(config)
}

fn load_engine(input: &Path, config: EngineConfig) -> Result<Engine> {
    let mut engine = Engine::new(config);
    engine.subscribe(Box::new(LogSink));
    let source =
        source::open_source(input).with_context(|| format!("Opening input file {input:?}"))?;
    engine
        .load(source)
        .with_context(|| format!("Loading {input:?}"))?;
    Ok(engine)
}

fn handle_filter(args: &FilterArgs) -> Result<()> {
    let mut config = build_config(&args.load)?;
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    config.hide_internal_fields |= args.hide_internal;
    config.validate()?;

    let mut filters = args
        .filters
        .iter()
        .map(|expr| filter::parse_filter(expr))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if let Some(name) = &args.preset {
        let store = PresetStore::load(&args.presets)?;
        let preset = store
            .get(name)
            .ok_or_else(|| anyhow!("Preset '{name}' not found in {:?}", args.presets))?;
        debug!("Preset '{name}' adds {} filter(s)", preset.len());
        filters.extend_from_slice(preset);
    }

    let mut engine = load_engine(&args.load.input, config)?;
    engine.set_filters(filters)?;
    engine.apply_filters(args.limit)?;
    if let Some(raw) = &args.sort {
        let directive = SortDirective::parse(raw)?;
        engine.sort(&directive.column, Some(directive.direction))?;
    }
    if let Some(term) = &args.search {
        engine.search_within(term)?;
    }

    if let Some(format) = args.export {
        return export_result(&engine, format, args.output.as_deref());
    }

    let headers = engine.visible_headers()?;
    let columns = engine.visible_columns()?;
    let (first_row, rows) = match args.scroll_top {
        Some(scroll_top) => {
            let window = engine.window(scroll_top)?;
            (window.window.range.start, window.rows)
        }
        None => {
            let page = engine.get_page(args.page)?;
            info!(
                "Page {} of {} ({} row(s) in view)",
                page.page.number,
                page.page.total_pages.max(1),
                engine.view().len()
            );
            (page.page.range.start, page.rows)
        }
    };
    let body = rows
        .iter()
        .map(|row| visible_cells(row, &columns))
        .collect::<Vec<_>>();
    let style = TableStyle {
        row_numbers_from: Some(first_row + 1),
        ..TableStyle::default()
    };
    print!("{}", table::render_table(&headers, &body, style));
    if engine.view().truncated() {
        println!(
            "Showing the first {} matching row(s); raise --limit or drop it to see all",
            engine.view().len()
        );
    }
    Ok(())
}

fn visible_cells<'a>(row: &'a Row, columns: &[usize]) -> Vec<&'a str> {
    columns.iter().map(|&idx| row.get(idx)).collect()
}

fn export_result(engine: &Engine, format: export::ExportFormat, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let writer = io_utils::open_output(Some(path))?;
            let written = engine
                .export_view(writer, format)
                .with_context(|| format!("Exporting to {path:?}"))?;
            info!("Wrote {written} row(s) to {path:?}");
        }
        None => {
            let dir = env::current_dir().context("Resolving current directory")?;
            let path = engine.export_to_dir(&dir, format)?;
            info!("Wrote {path:?}");
        }
    }
    Ok(())
}

fn handle_types(args: &InputArgs) -> Result<()> {
    let engine = load_engine(&args.load.input, build_config(&args.load)?)?;
    let dataset = engine.dataset().ok_or(error::EngineError::NotLoaded)?;
    let rows = dataset
        .headers()
        .iter()
        .zip(engine.column_types())
        .map(|(header, ty)| vec![header.clone(), ty.to_string()])
        .collect::<Vec<_>>();
    let headers = vec!["column".to_string(), "type".to_string()];
    print!("{}", table::render_table(&headers, &rows, TableStyle::default()));
    Ok(())
}

fn handle_analyze(args: &AnalyzeArgs) -> Result<()> {
    let engine = load_engine(&args.load.input, build_config(&args.load)?)?;
    let dataset = engine.dataset().ok_or(error::EngineError::NotLoaded)?;
    let columns = args
        .columns
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>();
    let analyses = analysis::analyze_columns(dataset, &columns, args.top)?;
    let rows = analyses
        .iter()
        .flat_map(|analysis| analysis.render_rows())
        .collect::<Vec<_>>();
    let headers = ["column", "value", "count", "percent"].map(String::from);
    print!("{}", table::render_table(&headers, &rows, TableStyle::default()));
    Ok(())
}

fn handle_suggest(args: &InputArgs) -> Result<()> {
    let engine = load_engine(&args.load.input, build_config(&args.load)?)?;
    if engine.suggestions().is_empty() {
        println!("No filter suggestions");
        return Ok(());
    }
    let rows = engine
        .suggestions()
        .iter()
        .map(|s| {
            vec![
                s.filter.to_string(),
                format!("{:.1}%", s.confidence),
                s.reason.clone(),
            ]
        })
        .collect::<Vec<_>>();
    let headers = ["filter", "confidence", "reason"].map(String::from);
    let style = TableStyle {
        max_cell_width: 60,
        ..TableStyle::default()
    };
    print!("{}", table::render_table(&headers, &rows, style));
    Ok(())
}

fn handle_preset(args: &PresetArgs) -> Result<()> {
    let mut store = PresetStore::load(&args.presets)?;
    match &args.action {
        PresetAction::Save { name, filters } => {
            let filters = filters
                .iter()
                .map(|expr| filter::parse_filter(expr))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            store.insert(name, &filters)?;
            store.save(&args.presets)?;
        }
        PresetAction::List => {
            if store.is_empty() {
                println!("No presets saved in {:?}", args.presets);
            }
            for name in store.names() {
                let filters = store.get(name).unwrap_or_default();
                let rendered = filters.iter().map(ToString::to_string).collect::<Vec<_>>();
                println!("{name}: {}", rendered.join(" AND "));
            }
        }
        PresetAction::Remove { name } => {
            store.remove(name)?;
            store.save(&args.presets)?;
            info!("Removed preset '{name}'");
        }
    }
    Ok(())
}

fn handle_config_init(args: &ConfigInitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "{:?} already exists; pass --force to overwrite it",
            args.output
        );
    }
    EngineConfig::default().save(&args.output)?;
    info!("Wrote default configuration to {:?}", args.output);
    Ok(())
}
