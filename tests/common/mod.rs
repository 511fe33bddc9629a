#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_sieve::{
    config::EngineConfig,
    engine::{Engine, LoadSummary},
    error::Result,
    events::EventRecorder,
    source::MemorySource,
};
use tempfile::{TempDir, tempdir};

pub const PEOPLE_CSV: &str = "\
name,amount,joined,city
Alice,10,2024-01-05,Paris
Bob,20,2023-11-30,berlin
Carol,5.5,2024-03-01,Paris
dave,,2022-07-14,Rome
Eve,100,2024-02-29,
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

/// Engine with an attached recorder; the recorder shares its buffer with the
/// sink registered on the engine.
pub fn recorded_engine(config: EngineConfig) -> (Engine, EventRecorder) {
    let recorder = EventRecorder::new();
    let mut engine = Engine::new(config);
    engine.subscribe(Box::new(recorder.clone()));
    (engine, recorder)
}

pub fn load_text(engine: &mut Engine, text: &str) -> Result<LoadSummary> {
    engine.load(Box::new(MemorySource::new("test.csv", text.as_bytes().to_vec())))
}

pub fn loaded_engine(text: &str) -> (Engine, EventRecorder) {
    let (mut engine, recorder) = recorded_engine(EngineConfig::default());
    load_text(&mut engine, text).expect("load test data");
    (engine, recorder)
}

/// Values of `column` for every row of the current view, in view order.
pub fn view_column(engine: &Engine, column: &str) -> Vec<String> {
    let dataset = engine.dataset().expect("dataset loaded");
    engine
        .view()
        .rows()
        .iter()
        .map(|&idx| {
            let row = dataset.row(idx).expect("row in range");
            dataset.cell(row, column).to_string()
        })
        .collect()
}
