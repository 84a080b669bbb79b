//! Result file handling
//!
//! The file is truncated once when a run starts in erase mode. After that every case
//! opens it for append, writes one line and closes it again, so a fatal error loses
//! at most the case in progress.

use super::DriverError;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use synthbench_record::TestResult;

/// What to do with an existing result file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Truncate before the first write
    Erase,
    /// Keep existing records
    Append,
}

/// Append-only writer of encoded results
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    /// Prepare `path` for a run in `mode`
    pub fn open(path: impl Into<PathBuf>, mode: OutputMode) -> std::io::Result<Self> {
        let path = path.into();
        match mode {
            OutputMode::Erase => {
                std::fs::File::create(&path)?;
            }
            OutputMode::Append => {
                OpenOptions::new().create(true).append(true).open(&path)?;
            }
        }
        Ok(Self { path })
    }

    /// Result file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one result as one line
    pub fn append(&self, result: &TestResult) -> Result<(), DriverError> {
        let line = result.get_encoded()?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthbench_core::ElementType;
    use synthbench_record::{CaseRecord, decode_results};

    fn result(name: &str) -> TestResult {
        let mut r = TestResult::new(name, "f");
        r.add_case(ElementType::Int32, CaseRecord::shaped(5, &[2, 2], 0, Some(0.1)));
        r
    }

    #[test]
    fn test_erase_truncates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        std::fs::write(&path, "stale\n").unwrap();

        let sink = ResultSink::open(&path, OutputMode::Erase).unwrap();
        sink.append(&result("a")).unwrap();
        sink.append(&result("b")).unwrap();

        let decoded = decode_results(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let names: Vec<&str> = decoded.iter().map(|r| r.test_name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_append_keeps_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");

        ResultSink::open(&path, OutputMode::Erase)
            .unwrap()
            .append(&result("first"))
            .unwrap();
        ResultSink::open(&path, OutputMode::Append)
            .unwrap()
            .append(&result("second"))
            .unwrap();

        let decoded = decode_results(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1], result("second"));
    }
}
