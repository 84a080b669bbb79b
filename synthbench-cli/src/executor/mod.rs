//! Benchmark Driver
//!
//! Runs every case of a plan through the harness and streams results to disk.
//!
//! ## Pipeline Overview
//!
//! ```text
//! BenchmarkPlan (parsed from the plan file)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  case × pattern × type, reseeded per combination
//! └──────┬──────┘
//!        │  one TestResult per case
//!        ▼
//! ┌─────────────┐
//! │   output    │  append one encoded line, close the file
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  human / json / csv views of stored results
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Sequential driver for the function and convolution passes
//! - [`output`] - Result file modes and the per-case sink
//! - [`formatting`] - Presentation of decoded results

mod execution;
mod formatting;
mod output;

// Re-export public API
pub use execution::{CONVOLUTION_SEED, Driver, DriverError};
pub use formatting::{ShowFormat, format_csv_output, format_human_output, format_json_output};
pub use output::{OutputMode, ResultSink};
