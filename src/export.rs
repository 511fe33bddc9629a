use std::{fmt, io::Write};

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    config::EngineConfig,
    dataset::Dataset,
    error::{EngineError, Result},
    io_utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Column indices that are shown and exported, in header order.
pub fn visible_columns(headers: &[String], config: &EngineConfig) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, header)| {
            !config.hide_internal_fields
                || !config
                    .internal_fields
                    .iter()
                    .any(|internal| internal == *header)
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// `filtered_data_2024-03-01T10-15-30-123Z.csv`
pub fn export_filename(format: ExportFormat, at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("filtered_data_{stamp}.{}", format.extension())
}

/// Writes `rows` (indices into `dataset`) restricted to `columns`. Returns the
/// number of data rows written.
pub fn write_view<W: Write>(
    writer: W,
    dataset: &Dataset,
    rows: &[usize],
    columns: &[usize],
    format: ExportFormat,
) -> Result<usize> {
    if rows.is_empty() {
        return Err(EngineError::NothingToExport);
    }
    let written = match format {
        ExportFormat::Csv => write_csv(writer, dataset, rows, columns)?,
        ExportFormat::Json => write_json(writer, dataset, rows, columns)?,
    };
    info!(
        "Exported {written} row(s) across {} column(s) as {format}",
        columns.len()
    );
    Ok(written)
}

fn write_csv<W: Write>(
    writer: W,
    dataset: &Dataset,
    rows: &[usize],
    columns: &[usize],
) -> Result<usize> {
    let mut writer = io_utils::csv_writer(writer);
    writer.write_record(columns.iter().map(|&idx| dataset.headers()[idx].as_str()))?;
    let mut written = 0;
    for row in rows.iter().filter_map(|&idx| dataset.row(idx)) {
        writer.write_record(columns.iter().map(|&idx| row.get(idx)))?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

fn write_json<W: Write>(
    mut writer: W,
    dataset: &Dataset,
    rows: &[usize],
    columns: &[usize],
) -> Result<usize> {
    let records: Vec<_> = rows
        .iter()
        .filter_map(|&idx| dataset.row(idx))
        .map(|row| dataset.record(row, columns))
        .collect();
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::parser::parse_text;

    #[test]
    fn filename_replaces_separators() {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 1, 10, 15, 30)
            .unwrap();
        assert_eq!(
            export_filename(ExportFormat::Json, at),
            "filtered_data_2024-03-01T10-15-30-000Z.json"
        );
    }

    #[test]
    fn internal_fields_hidden_on_request() {
        let headers = vec!["id".to_string(), "gateway".to_string(), "srr".to_string()];
        let mut config = EngineConfig::default();
        assert_eq!(visible_columns(&headers, &config), vec![0, 1, 2]);
        config.hide_internal_fields = true;
        assert_eq!(visible_columns(&headers, &config), vec![0]);
    }

    #[test]
    fn csv_quotes_only_when_needed() {
        let (dataset, _) = parse_text("a,b\n\"x, y\",\"say \"\"hi\"\"\"\nplain,2\n").unwrap();
        let mut out = Vec::new();
        let written = write_view(&mut out, &dataset, &[0, 1], &[0, 1], ExportFormat::Csv).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "a,b\n\"x, y\",\"say \"\"hi\"\"\"\nplain,2\n"
        );
    }

    #[test]
    fn json_keeps_column_order() {
        let (dataset, _) = parse_text("zeta,alpha\n1,2\n").unwrap();
        let mut out = Vec::new();
        write_view(&mut out, &dataset, &[0], &[0, 1], ExportFormat::Json).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
        assert!(text.starts_with("[\n  {\n    \"zeta\": \"1\""));
    }

    #[test]
    fn empty_view_is_an_error() {
        let (dataset, _) = parse_text("a\n1\n").unwrap();
        let result = write_view(Vec::new(), &dataset, &[], &[0], ExportFormat::Csv);
        assert!(matches!(result, Err(EngineError::NothingToExport)));
    }
}
