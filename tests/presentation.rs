mod common;

use std::time::{Duration, Instant};

use common::{PEOPLE_CSV, TestWorkspace, loaded_engine, recorded_engine, load_text, view_column};
use csv_sieve::{
    config::EngineConfig,
    error::EngineError,
    export::ExportFormat,
    filter::{Filter, Operator},
    pagination::DisplayMode,
    view::SortDirection,
};
use serde_json::Value;

fn numbered(rows: usize) -> String {
    let mut text = String::from("n,parity\n");
    for i in 1..=rows {
        text.push_str(&format!("{i},{}\n", if i % 2 == 0 { "even" } else { "odd" }));
    }
    text
}

#[test]
fn pages_are_clamped_to_available_range() {
    let (engine, _) = loaded_engine(&numbered(45));
    let first = engine.get_page(0).unwrap();
    assert_eq!(first.page.number, 1);
    assert_eq!(first.page.total_pages, 3);
    assert_eq!(first.rows.len(), 20);

    let last = engine.get_page(10).unwrap();
    assert_eq!(last.page.number, 3);
    assert_eq!(last.rows.len(), 5);
    assert_eq!(last.rows[0].get(0), "41");
}

#[test]
fn empty_view_has_a_single_empty_page() {
    let (mut engine, _) = loaded_engine(&numbered(5));
    engine
        .set_filters(vec![Filter::new("parity", Operator::Equals, "none")])
        .unwrap();
    engine.apply_filters(None).unwrap();
    let page = engine.get_page(4).unwrap();
    assert_eq!(page.page.number, 1);
    assert!(page.rows.is_empty());
}

#[test]
fn sort_uses_inferred_types_and_toggles() {
    let (mut engine, _) = loaded_engine(PEOPLE_CSV);
    let direction = engine.sort("amount", None).unwrap();
    assert_eq!(direction, SortDirection::Asc);
    // The empty amount sorts as zero.
    assert_eq!(view_column(&engine, "name"), vec!["dave", "Carol", "Alice", "Bob", "Eve"]);

    assert_eq!(engine.sort("amount", None).unwrap(), SortDirection::Desc);
    assert_eq!(view_column(&engine, "name"), vec!["Eve", "Bob", "Alice", "Carol", "dave"]);

    engine.sort("joined", Some(SortDirection::Asc)).unwrap();
    assert_eq!(view_column(&engine, "name"), vec!["dave", "Bob", "Alice", "Eve", "Carol"]);

    engine.sort("name", None).unwrap();
    assert_eq!(view_column(&engine, "name"), vec!["Alice", "Bob", "Carol", "dave", "Eve"]);

    assert!(matches!(
        engine.sort("missing", None),
        Err(EngineError::UnknownColumn(_))
    ));
}

#[test]
fn sort_keeps_filters_and_is_stable() {
    let (mut engine, _) = loaded_engine("k,v\nb,1\na,2\nb,3\na,4\n");
    engine.sort("k", Some(SortDirection::Asc)).unwrap();
    assert_eq!(view_column(&engine, "v"), vec!["2", "4", "1", "3"]);
}

#[test]
fn search_narrows_and_clears() {
    let (mut engine, _) = loaded_engine(PEOPLE_CSV);
    assert_eq!(engine.search_within("PAR").unwrap(), 2);
    assert_eq!(engine.search_within("ali").unwrap(), 1);
    assert_eq!(engine.search_within("").unwrap(), 5);
}

#[test]
fn search_skips_hidden_internal_columns() {
    let config = EngineConfig {
        hide_internal_fields: true,
        ..EngineConfig::default()
    };
    let (mut engine, _) = recorded_engine(config);
    load_text(&mut engine, "id,gateway\n1,alpha\n2,beta\n").unwrap();
    assert_eq!(engine.visible_headers().unwrap(), vec!["id"]);
    assert_eq!(engine.search_within("alpha").unwrap(), 0);
}

#[test]
fn csv_export_covers_whole_filtered_view() {
    let (mut engine, _) = loaded_engine(&numbered(30));
    engine
        .set_filters(vec![Filter::new("parity", Operator::Equals, "even")])
        .unwrap();
    let view = engine.apply_filters(Some(5)).unwrap();
    assert!(view.truncated());
    engine.sort("n", Some(SortDirection::Desc)).unwrap();

    let mut out = Vec::new();
    let written = engine.export_view(&mut out, ExportFormat::Csv).unwrap();
    assert_eq!(written, 15);
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("n,parity"));
    assert_eq!(lines.next(), Some("30,even"));
    assert_eq!(text.lines().count(), 16);
}

#[test]
fn export_widens_with_filters_that_built_the_view() {
    let (mut engine, _) = loaded_engine(&numbered(30));
    engine
        .set_filters(vec![Filter::new("parity", Operator::Equals, "even")])
        .unwrap();
    engine.apply_filters(Some(5)).unwrap();
    engine
        .set_filters(vec![Filter::new("parity", Operator::Equals, "odd")])
        .unwrap();

    let mut out = Vec::new();
    let written = engine.export_view(&mut out, ExportFormat::Csv).unwrap();
    assert_eq!(written, 15);
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().skip(1).all(|line| line.ends_with(",even")));
}

#[test]
fn search_term_whitespace_is_significant() {
    let (mut engine, _) = loaded_engine("name\nAnn Lee\nBob\nLeeds\n");
    assert_eq!(engine.search_within(" ").unwrap(), 1);
    assert_eq!(engine.search_within("").unwrap(), 3);
    assert_eq!(engine.search_within(" lee").unwrap(), 1);
}

#[test]
fn csv_export_quotes_special_characters() {
    let (engine, _) = loaded_engine("name,quote\n\"Doe, J\",\"he said \"\"hi\"\"\"\n");
    let mut out = Vec::new();
    engine.export_view(&mut out, ExportFormat::Csv).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "name,quote\n\"Doe, J\",\"he said \"\"hi\"\"\"\n"
    );
}

#[test]
fn json_export_is_array_of_ordered_objects() {
    let (mut engine, _) = loaded_engine(PEOPLE_CSV);
    engine.search_within("rome").unwrap();
    let mut out = Vec::new();
    engine.export_view(&mut out, ExportFormat::Json).unwrap();
    let parsed: Value = serde_json::from_slice(&out).unwrap();
    let records = parsed.as_array().unwrap();
    assert_eq!(records.len(), 1);
    let keys: Vec<&String> = records[0].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["name", "amount", "joined", "city"]);
    assert_eq!(records[0]["amount"], "");
}

#[test]
fn export_of_empty_view_fails() {
    let (mut engine, _) = loaded_engine(PEOPLE_CSV);
    engine.search_within("nobody").unwrap();
    let result = engine.export_view(Vec::new(), ExportFormat::Csv);
    assert!(matches!(result, Err(EngineError::NothingToExport)));
}

#[test]
fn export_to_dir_uses_timestamped_name() {
    let workspace = TestWorkspace::new();
    let (engine, _) = loaded_engine(PEOPLE_CSV);
    let path = engine
        .export_to_dir(workspace.path(), ExportFormat::Json)
        .unwrap();
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("filtered_data_"));
    assert!(name.ends_with("Z.json"));
    assert!(!name.contains(':'));
    assert!(path.exists());
}

#[test]
fn large_views_switch_to_virtual_windows() {
    let (mut engine, _) = loaded_engine(&numbered(1500));
    assert_eq!(engine.display_mode(), DisplayMode::Virtual);

    let window = engine.window(400).unwrap();
    assert_eq!(window.window.range, 10..25);
    assert_eq!(window.window.top_spacer, 400);
    assert_eq!(window.rows[0].get(0), "11");

    let now = Instant::now();
    assert!(engine.on_scroll(800, now).unwrap().is_some());
    assert!(engine.on_scroll(840, now + Duration::from_millis(4)).unwrap().is_none());
    let late = engine
        .on_scroll(840, now + Duration::from_millis(40))
        .unwrap()
        .unwrap();
    assert_eq!(late.window.range.start, 21);

    engine
        .set_filters(vec![Filter::new("n", Operator::StartsWith, "14")])
        .unwrap();
    engine.apply_filters(None).unwrap();
    assert_eq!(engine.display_mode(), DisplayMode::Paged);
}
