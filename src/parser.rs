//! Line-oriented CSV parsing.
//!
//! Input is split into lines before fields are parsed, so a record always
//! occupies exactly one physical line. Two drivers feed the shared
//! [`DatasetBuilder`]:
//!
//! - [`TextBatches`] walks an in-memory text body a bounded number of lines at
//!   a time, so the caller can hand control back to its host between batches.
//! - [`StreamingParser`] consumes raw byte chunks, carrying the trailing
//!   partial line over to the next chunk. At most one chunk plus the carry-over
//!   is held in memory.

use std::borrow::Cow;

use itertools::Itertools;
use log::debug;

use crate::{
    dataset::{Dataset, Row, dedupe_headers},
    error::{EngineError, Result},
    io_utils::{self, UTF8_BOM},
};

/// How many individual arity mismatches are reported before only the
/// summary warning remains.
const REPORTED_MISMATCHES: usize = 3;

/// Converts `\r\n` and bare `\r` to `\n`.
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Quote-aware split of one line. A blank line yields no fields.
///
/// `""` inside a quoted section produces a literal quote; commas only
/// separate fields outside quotes. Every field is trimmed afterwards. The
/// quoting itself is consumed by the scan and no extra layer of surrounding
/// quotes is stripped: a field written as `"\"x\""` must read back as `"x"`,
/// so any row serialized with `io_utils::csv_writer` parses back unchanged.
pub fn parse_line(line: &str) -> Vec<String> {
    if is_blank(line) {
        return Vec::new();
    }

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);

    fields
        .into_iter()
        .map(|field| field.trim().to_string())
        .collect()
}

/// Plain comma split with one layer of surrounding quotes stripped per field.
pub fn naive_split(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| strip_outer_quotes(field.trim()).to_string())
        .collect()
}

fn strip_outer_quotes(field: &str) -> &str {
    field
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(field)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Header,
    Retained,
    Skipped,
}

/// Accumulates header and rows, enforcing the arity invariant.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    headers: Option<Vec<String>>,
    rows: Vec<Row>,
    skipped: usize,
    lines_seen: usize,
    warnings: Vec<String>,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_headers(&self) -> bool {
        self.headers.is_some()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    /// Warnings collected since the last call.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Feeds one line. Blank lines are ignored and return `None`.
    pub fn push_line(&mut self, line: &str) -> Result<Option<LineOutcome>> {
        if is_blank(line) {
            return Ok(None);
        }
        self.lines_seen += 1;

        let Some(headers) = &self.headers else {
            self.set_headers(line)?;
            return Ok(Some(LineOutcome::Header));
        };
        let expected = headers.len();

        let mut fields = parse_line(line);
        if fields.len() != expected && !fields.is_empty() {
            let fallback = naive_split(line);
            if fallback.len() == expected {
                fields = fallback;
            }
        }

        if fields.len() == expected {
            self.rows.push(Row::new(fields));
            Ok(Some(LineOutcome::Retained))
        } else {
            self.skipped += 1;
            if self.skipped <= REPORTED_MISMATCHES {
                let preview: String = line.chars().take(50).collect();
                self.warnings.push(format!(
                    "Row {}: expected {expected} columns, got {} - line: \"{preview}\"",
                    self.lines_seen,
                    fields.len()
                ));
            }
            Ok(Some(LineOutcome::Skipped))
        }
    }

    fn set_headers(&mut self, line: &str) -> Result<()> {
        let mut headers = parse_line(line);
        if headers.is_empty() {
            self.warnings
                .push("Quote-aware header parsing failed, using a plain comma split".to_string());
            headers = naive_split(line);
        }
        if headers.is_empty() {
            return Err(EngineError::StructuralParse(line.chars().take(100).collect()));
        }
        let (headers, renamed) = dedupe_headers(headers);
        if !renamed.is_empty() {
            self.warnings.push(format!(
                "Renamed duplicate header(s): {}",
                renamed.iter().join(", ")
            ));
        }
        debug!(
            "Parsed {} header(s): {}{}",
            headers.len(),
            headers.iter().take(5).join(", "),
            if headers.len() > 5 { "..." } else { "" }
        );
        self.headers = Some(headers);
        Ok(())
    }

    pub fn finish(mut self) -> Result<(Dataset, Vec<String>)> {
        let headers = self.headers.take().ok_or_else(|| {
            EngineError::StructuralParse("input contains no non-blank lines".to_string())
        })?;
        if self.skipped > 0 {
            self.warnings.push(format!(
                "Skipped {} row(s) due to column count mismatch",
                self.skipped
            ));
        }
        let dataset = Dataset::from_parts(headers, self.rows, self.skipped);
        Ok((dataset, self.warnings))
    }
}

/// Batched walk over an in-memory body of text.
#[derive(Debug)]
pub struct TextBatches {
    text: String,
    pos: usize,
    total_lines: usize,
    consumed_lines: usize,
}

impl TextBatches {
    pub fn new(text: String) -> Self {
        let text = if text.contains('\r') {
            normalize_line_endings(&text).into_owned()
        } else {
            text
        };
        let total_lines = text.split('\n').filter(|line| !is_blank(line)).count();
        Self {
            text,
            pos: 0,
            total_lines,
            consumed_lines: 0,
        }
    }

    /// Non-blank lines in the body, header included.
    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn consumed_lines(&self) -> usize {
        self.consumed_lines
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Parses up to `max_lines` non-blank lines and returns how many were consumed.
    pub fn next_batch(&mut self, builder: &mut DatasetBuilder, max_lines: usize) -> Result<usize> {
        let mut consumed = 0;
        while consumed < max_lines && self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            let (line, advance) = match rest.find('\n') {
                Some(idx) => (&rest[..idx], idx + 1),
                None => (rest, rest.len()),
            };
            self.pos += advance;
            if builder.push_line(line)?.is_some() {
                consumed += 1;
            }
        }
        self.consumed_lines += consumed;
        Ok(consumed)
    }
}

/// Incremental parser over raw byte chunks.
#[derive(Debug, Default)]
pub struct StreamingParser {
    carry: Vec<u8>,
    builder: DatasetBuilder,
    latin1_fallback: bool,
    bom_checked: bool,
}

impl StreamingParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder_mut(&mut self) -> &mut DatasetBuilder {
        &mut self.builder
    }

    pub fn row_count(&self) -> usize {
        self.builder.row_count()
    }

    /// Parses every complete line in `carry + chunk`, keeping the trailing
    /// partial line for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        let mut buffer = std::mem::take(&mut self.carry);
        buffer.extend_from_slice(chunk);
        if !self.bom_checked {
            // Wait until the first three bytes are in; the BOM may span chunks.
            if buffer.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(&buffer) {
                self.carry = buffer;
                return Ok(());
            }
            buffer = self.strip_leading_bom(buffer);
        }

        let Some(last_newline) = buffer.iter().rposition(|&b| b == b'\n') else {
            self.carry = buffer;
            return Ok(());
        };
        self.carry = buffer.split_off(last_newline + 1);
        self.parse_block(&buffer)
    }

    /// Flushes the carry-over and returns the dataset with all warnings.
    pub fn finish(mut self) -> Result<(Dataset, Vec<String>)> {
        let mut rest = std::mem::take(&mut self.carry);
        if !self.bom_checked {
            rest = self.strip_leading_bom(rest);
        }
        if !rest.is_empty() {
            self.parse_block(&rest)?;
        }
        self.builder.finish()
    }

    fn strip_leading_bom(&mut self, mut buffer: Vec<u8>) -> Vec<u8> {
        self.bom_checked = true;
        if buffer.starts_with(UTF8_BOM) {
            buffer.drain(..UTF8_BOM.len());
        }
        buffer
    }

    fn parse_block(&mut self, block: &[u8]) -> Result<()> {
        let (text, used_fallback) = io_utils::decode_with_fallback(block)?;
        if used_fallback && !self.latin1_fallback {
            self.latin1_fallback = true;
            self.builder
                .warnings
                .push("Input is not valid UTF-8, decoded as ISO-8859-1".to_string());
        }
        for line in normalize_line_endings(&text).split('\n') {
            self.builder.push_line(line)?;
        }
        Ok(())
    }
}

/// Parses a whole text body in one pass.
pub fn parse_text(text: &str) -> Result<(Dataset, Vec<String>)> {
    let mut batches = TextBatches::new(text.to_string());
    let mut builder = DatasetBuilder::new();
    batches.next_batch(&mut builder, usize::MAX)?;
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_handles_quotes_and_escapes() {
        assert_eq!(
            parse_line(r#"a,"b,c","say ""hi""",  d  "#),
            vec!["a", "b,c", r#"say "hi""#, "d"]
        );
    }

    #[test]
    fn parse_line_keeps_trailing_empty_field() {
        assert_eq!(parse_line("a,b,"), vec!["a", "b", ""]);
        assert!(parse_line("   ").is_empty());
    }

    #[test]
    fn naive_split_strips_one_quote_layer() {
        assert_eq!(naive_split(r#""a", b ,"c""#), vec!["a", "b", "c"]);
        assert_eq!(naive_split("\"\"\"x\"\"\""), vec!["\"\"x\"\""]);
    }

    #[test]
    fn normalize_converts_all_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
        assert!(matches!(normalize_line_endings("a\nb"), Cow::Borrowed(_)));
    }

    #[test]
    fn builder_uses_naive_fallback_for_unbalanced_quotes() {
        let mut builder = DatasetBuilder::new();
        builder.push_line("a,b").unwrap();
        // The stray quote swallows the comma in the quote-aware scan.
        let outcome = builder.push_line(r#"5"in,x"#).unwrap();
        assert_eq!(outcome, Some(LineOutcome::Retained));
        let (dataset, _) = builder.finish().unwrap();
        assert_eq!(dataset.rows()[0].fields(), &["5\"in", "x"]);
    }

    #[test]
    fn streaming_parser_carries_partial_lines() {
        let mut parser = StreamingParser::new();
        parser.feed(b"id,na").unwrap();
        parser.feed(b"me\r\n1,al").unwrap();
        parser.feed(b"ice\n2,bob").unwrap();
        let (dataset, warnings) = parser.finish().unwrap();
        assert_eq!(dataset.headers(), &["id", "name"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[1].fields(), &["2", "bob"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn batches_count_only_non_blank_lines() {
        let mut batches = TextBatches::new("a,b\n\n1,2\n  \n3,4\n".to_string());
        assert_eq!(batches.total_lines(), 3);
        let mut builder = DatasetBuilder::new();
        assert_eq!(batches.next_batch(&mut builder, 2).unwrap(), 2);
        assert_eq!(batches.next_batch(&mut builder, 2).unwrap(), 1);
        assert!(batches.is_done());
        assert_eq!(builder.row_count(), 2);
    }
}
