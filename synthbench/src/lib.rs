#![warn(missing_docs)]
//! # Synthbench
//!
//! Micro-benchmarks for the routines of a numeric tensor library, written as
//! generated programs rather than hand-written harness code.
//!
//! For every function listed in a benchmark plan, every element type and every
//! container shape, synthbench:
//! - **Synthesizes** a self-contained program that fills its containers with
//!   deterministic, type-safe values and calls the function `repeat_count` times
//! - **Builds** it with the external toolchain (build failures stop the run)
//! - **Runs** it and reads the elapsed time from the last line of its output
//! - **Records** one `TestResult` per function as one base64 line in the result file
//!
//! ## Quick Start
//!
//! ```text
//! $ synthbench init > synthbench.toml
//! $ synthbench list -c conf
//! $ synthbench -c conf -o out --mode erase
//! $ synthbench show out --format csv
//! ```
//!
//! ## Library use
//!
//! ```ignore
//! use synthbench::prelude::*;
//!
//! let plan = BenchmarkPlan::load("conf")?;
//! let harness = Harness::new(toolchain, "tmp", 0);
//! let sink = ResultSink::open("out", OutputMode::Erase)?;
//! let mut driver = Driver::new(harness, sink);
//! driver.time_functions(&plan.patterns, &plan.functions)?;
//! ```

// Re-export synthesis types
pub use synthbench_core::{
    BenchmarkCase, BenchmarkPlan, ConfigurationError, ContainerFlags, ConvolutionPattern,
    ConvolutionPlan, ElementType, IdxBackend, Invocation, NamedContainer, ParamRole, Pattern,
    ProgramBackend, ProgramSpec, Scalar, Shape, ValueExpr, build_invocation, decode_type_codes,
    derive_pattern, emit_program, parse_roles,
};

// Re-export result model
pub use synthbench_record::{
    CaseRecord, RecordError, SamplePoint, TestResult, TypeSeries, decode_result, decode_results,
    encode_result,
};

// Re-export harness and driver
pub use synthbench_cli::{
    BuildFlags, BuildTarget, Driver, DriverError, Harness, HarnessError, MalformedOutput,
    OutputMode, ResultSink, ShellSettings, ShellToolchain, SynthConfig, Toolchain,
    parse_timer_output, run,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BenchmarkPlan, Driver, ElementType, Harness, OutputMode, ResultSink, ShellToolchain,
        TestResult, Toolchain,
    };
}
