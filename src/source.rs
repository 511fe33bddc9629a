//! Byte sources the engine can ingest from.
//!
//! A source only needs to report its size and serve byte ranges; this keeps
//! ingestion independent of where the bytes live (a file on disk, stdin
//! captured into memory, a buffer handed over by an embedding host).

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use crate::io_utils::is_dash;

pub trait ByteSource {
    /// Declared length in bytes.
    fn size(&self) -> u64;

    /// Reads `[start, end)`. `end` is clamped to `size()`.
    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>>;

    /// Human-readable name for log lines.
    fn name(&self) -> String {
        "<input>".to_string()
    }
}

pub struct FileSource {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }
}

impl ByteSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let end = end.min(self.size);
        if start >= end {
            return Ok(Vec::new());
        }
        self.file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; (end - start) as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new("<memory>", text.as_bytes().to_vec())
    }
}

impl ByteSource for MemorySource {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_range(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let len = self.bytes.len();
        let end = (end as usize).min(len);
        let start = (start as usize).min(end);
        Ok(self.bytes[start..end].to_vec())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Opens `path`, treating `-` as standard input (buffered into memory since
/// stdin cannot serve random ranges).
pub fn open_source(path: &Path) -> io::Result<Box<dyn ByteSource>> {
    if is_dash(path) {
        let mut bytes = Vec::new();
        io::stdin().lock().read_to_end(&mut bytes)?;
        return Ok(Box::new(MemorySource::new("<stdin>", bytes)));
    }
    Ok(Box::new(FileSource::open(path)?))
}
