//! Result Data Structures

use crate::codec::{RecordError, encode_result};
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use synthbench_core::ElementType;

/// One timed (pattern, element type) combination.
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize, Serialize, Deserialize)]
#[archive(check_bytes)]
pub struct CaseRecord {
    /// Calls inside the timed region
    pub repeat_count: u64,
    /// Number of elements per container (or explicit size for convolution runs)
    pub size: u64,
    /// Container shape; empty when only a size is known
    pub shape: Vec<u64>,
    /// Seed the generated data was drawn with
    pub seed: u64,
    /// Wall-clock seconds, `None` when the timing line could not be parsed
    pub elapsed: Option<f64>,
}

impl CaseRecord {
    /// Record for a shaped run; the size is the product of the dimensions,
    /// saturating at `u64::MAX`
    pub fn shaped(repeat_count: u64, shape: &[u64], seed: u64, elapsed: Option<f64>) -> Self {
        Self {
            repeat_count,
            size: shape.iter().fold(1, |acc: u64, &d| acc.saturating_mul(d)),
            shape: shape.to_vec(),
            seed,
            elapsed,
        }
    }

    /// Record for a run described only by its size
    pub fn sized(repeat_count: u64, size: u64, seed: u64, elapsed: Option<f64>) -> Self {
        Self {
            repeat_count,
            size,
            shape: Vec::new(),
            seed,
            elapsed,
        }
    }
}

/// All records of one element type, in insertion order.
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize, Serialize, Deserialize)]
#[archive(check_bytes)]
pub struct TypeSeries {
    /// Element type of every record
    pub element_type: ElementType,
    /// Records
    pub cases: Vec<CaseRecord>,
}

/// Results of one benchmark case across patterns and element types.
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize, Serialize, Deserialize)]
#[archive(check_bytes)]
pub struct TestResult {
    /// Label distinguishing runs of the same tests (build flags, machine, ...)
    pub series_name: String,
    /// Unique test name
    pub test_name: String,
    /// Function that was timed
    pub function_name: String,
    /// Per-type records, types in first-seen order
    pub data: Vec<TypeSeries>,
}

/// One point of a sorted sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    /// Elements per container
    pub size: u64,
    /// Wall-clock seconds for all repeats
    pub elapsed: Option<f64>,
    /// Calls inside the timed region
    pub repeat_count: u64,
}

impl SamplePoint {
    /// Seconds per call
    pub fn time_per_call(&self) -> Option<f64> {
        self.elapsed.map(|t| t / self.repeat_count.max(1) as f64)
    }

    /// Order by size, then elapsed time (missing first), then repeat count
    fn sample_order(&self, other: &Self) -> Ordering {
        self.size
            .cmp(&other.size)
            .then_with(|| match (self.elapsed, other.elapsed) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            })
            .then_with(|| self.repeat_count.cmp(&other.repeat_count))
    }
}

impl TestResult {
    /// Empty result for a test
    pub fn new(test_name: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            series_name: String::new(),
            test_name: test_name.into(),
            function_name: function_name.into(),
            data: Vec::new(),
        }
    }

    /// Set the series label
    pub fn with_series(mut self, series_name: impl Into<String>) -> Self {
        self.series_name = series_name.into();
        self
    }

    /// Append a record under its element type
    pub fn add_case(&mut self, element_type: ElementType, case: CaseRecord) {
        match self
            .data
            .iter_mut()
            .find(|series| series.element_type == element_type)
        {
            Some(series) => series.cases.push(case),
            None => self.data.push(TypeSeries {
                element_type,
                cases: vec![case],
            }),
        }
    }

    /// Element types with at least one record
    pub fn types(&self) -> impl Iterator<Item = ElementType> + '_ {
        self.data.iter().map(|series| series.element_type)
    }

    /// Records of one element type, in insertion order
    pub fn cases(&self, element_type: ElementType) -> &[CaseRecord] {
        self.data
            .iter()
            .find(|series| series.element_type == element_type)
            .map(|series| series.cases.as_slice())
            .unwrap_or_default()
    }

    /// Total number of records across types
    pub fn case_count(&self) -> usize {
        self.data.iter().map(|series| series.cases.len()).sum()
    }

    /// Records of one type as `(size, elapsed, repeat_count)`, ascending.
    pub fn get_sorted_sample(&self, element_type: ElementType) -> Vec<SamplePoint> {
        let mut sample: Vec<SamplePoint> = self
            .cases(element_type)
            .iter()
            .map(|case| SamplePoint {
                size: case.size,
                elapsed: case.elapsed,
                repeat_count: case.repeat_count,
            })
            .collect();
        sample.sort_by(SamplePoint::sample_order);
        sample
    }

    /// Transport line for this result (no trailing newline)
    pub fn get_encoded(&self) -> Result<String, RecordError> {
        encode_result(self)
    }
}
