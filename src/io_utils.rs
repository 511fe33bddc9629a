//! I/O helpers shared by ingestion, export and the CLI.
//!
//! - **Decoding**: strict decoding through `encoding_rs`, UTF-8 first with
//!   ISO-8859-1 as the last resort.
//! - **Writers**: `open_output` routes `-` (or no path) to stdout.
//! - **Quoting**: CSV output uses `QuoteStyle::Necessary`, so a field is only
//!   quoted when it holds the delimiter, a quote or a line break.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::error::EngineError;

pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// `encoding_rs` follows the WHATWG mapping, where the `iso-8859-1` label
/// resolves to windows-1252.
pub fn latin1() -> &'static Encoding {
    Encoding::for_label(b"iso-8859-1").unwrap_or(WINDOWS_1252)
}

pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String, EngineError> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        Err(EngineError::Decode(format!(
            "input is not valid {}",
            encoding.name()
        )))
    } else {
        Ok(text.into_owned())
    }
}

/// Decodes `bytes` as UTF-8, falling back to ISO-8859-1. The flag reports
/// whether the fallback was used.
pub fn decode_with_fallback(bytes: &[u8]) -> Result<(String, bool), EngineError> {
    match decode_bytes(bytes, UTF_8) {
        Ok(text) => Ok((text, false)),
        Err(_) => decode_bytes(bytes, latin1()).map(|text| (text, true)),
    }
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if !is_dash(p) => Ok(Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        ))),
        _ => Ok(Box::new(std::io::stdout())),
    }
}

pub fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(b',')
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .terminator(csv::Terminator::Any(b'\n'));
    builder.from_writer(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_label_resolves() {
        assert_eq!(latin1(), WINDOWS_1252);
    }

    #[test]
    fn fallback_decodes_latin1_bytes() {
        let bytes = b"caf\xe9";
        assert!(decode_bytes(bytes, UTF_8).is_err());
        let (text, fallback) = decode_with_fallback(bytes).unwrap();
        assert!(fallback);
        assert_eq!(text, "café");
    }

    #[test]
    fn strip_bom_only_removes_prefix() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBFa,b"), b"a,b");
        assert_eq!(strip_bom(b"a,b"), b"a,b");
    }
}
