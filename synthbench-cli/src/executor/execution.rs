//! Benchmark Execution
//!
//! Sequential driver for both passes. One combination at a time goes through the
//! harness; nothing overlaps, because timings are only comparable when the build
//! and the timed binary have the machine to themselves.
//!
//! ## Data Flow
//!
//! ```text
//! for case in cases:                       TestResult::new(test, function)
//!     for pattern in patterns:
//!         for type in case.element_types:
//!             rng = ChaCha8Rng(case.seed)  same data for every rerun
//!             Harness::time_function       Option<f64>
//!             TestResult::add_case
//!     ResultSink::append                   one line, file closed again
//! ```

use super::ResultSink;
use crate::harness::{Harness, HarnessError, Toolchain};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use synthbench_core::{BenchmarkCase, ConvolutionPlan, Pattern};
use synthbench_record::{CaseRecord, RecordError, TestResult};
use thiserror::Error;

/// Seed stored with convolution records
pub const CONVOLUTION_SEED: u64 = 1;

/// Fatal driver failures
#[derive(Debug, Error)]
pub enum DriverError {
    /// Synthesis, build or launch failed
    #[error("Harness error: {0}")]
    Harness(#[from] HarnessError),

    /// A result could not be encoded
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// The result file could not be written
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs benchmark passes and streams each finished case to the sink
pub struct Driver<T: Toolchain> {
    harness: Harness<T>,
    sink: ResultSink,
    series: String,
    show_progress: bool,
}

impl<T: Toolchain> Driver<T> {
    /// Create a driver writing to `sink`
    pub fn new(harness: Harness<T>, sink: ResultSink) -> Self {
        Self {
            harness,
            sink,
            series: String::new(),
            show_progress: true,
        }
    }

    /// Label every result with `series`
    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = series.into();
        self
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Underlying harness
    pub fn harness(&self) -> &Harness<T> {
        &self.harness
    }

    /// Result sink
    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }

    /// Function pass: time every case for every pattern and element type.
    ///
    /// The generator is reseeded with the case's seed before each combination.
    /// Each case is written to the sink as soon as it completes.
    pub fn time_functions(
        &mut self,
        patterns: &[Pattern],
        cases: &[BenchmarkCase],
    ) -> Result<Vec<TestResult>, DriverError> {
        let combinations: usize = cases.iter().map(|c| c.element_types.len()).sum();
        let pb = self.progress_bar((combinations * patterns.len()) as u64);
        tracing::debug!(
            "function pass: {} cases, {} patterns",
            cases.len(),
            patterns.len()
        );

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let mut result =
                TestResult::new(&case.test_name, &case.function_name).with_series(&self.series);

            for pattern in patterns {
                for &element_type in &case.element_types {
                    let label = format!(
                        "{} ({}) {} {} {}",
                        case.test_name,
                        case.function_name,
                        pattern.repeat_count,
                        pattern.shape,
                        element_type
                    );
                    pb.set_message(label.clone());
                    pb.suspend(|| tracing::info!("Test {}", label));

                    let mut rng = ChaCha8Rng::seed_from_u64(case.seed);
                    let elapsed = self
                        .harness
                        .time_function(case, pattern, element_type, &mut rng)
                        .inspect_err(|_| pb.abandon())?;
                    result.add_case(
                        element_type,
                        CaseRecord::shaped(
                            pattern.repeat_count,
                            pattern.shape.dims(),
                            case.seed,
                            elapsed,
                        ),
                    );
                    pb.inc(1);
                }
            }

            self.sink.append(&result)?;
            results.push(result);
        }

        pb.finish_with_message("Complete");
        Ok(results)
    }

    /// Convolution pass: build the fixed program once, then time every pattern
    /// for every element type into a single `convolution` result.
    pub fn time_convolution(&mut self, plan: &ConvolutionPlan) -> Result<TestResult, DriverError> {
        tracing::debug!("convolution pass: {} patterns", plan.patterns.len());
        self.harness.prepare_convolution()?;

        let pb = self.progress_bar((plan.patterns.len() * plan.element_types.len()) as u64);
        let mut result = TestResult::new("convolution", "convolution").with_series(&self.series);

        for pattern in &plan.patterns {
            for &element_type in &plan.element_types {
                let label = format!(
                    "convolution {} {} {}",
                    pattern.repeat_count, pattern.size, element_type
                );
                pb.set_message(label.clone());
                pb.suspend(|| tracing::info!("Test {}", label));

                let elapsed = self
                    .harness
                    .time_convolution(pattern)
                    .inspect_err(|_| pb.abandon())?;
                result.add_case(
                    element_type,
                    CaseRecord::sized(
                        pattern.repeat_count,
                        pattern.size,
                        CONVOLUTION_SEED,
                        elapsed,
                    ),
                );
                pb.inc(1);
            }
        }

        self.sink.append(&result)?;
        pb.finish_with_message("Complete");
        Ok(result)
    }
}
