#![warn(missing_docs)]
//! Synthbench Core - Program Synthesis
//!
//! Everything needed to turn an abstract benchmark description into the text of a
//! timed program, without touching a compiler:
//! - `ElementType` table (ranges, reductions, type codes)
//! - Deterministic value expressions baked from pre-drawn coefficients
//! - Parameter roles and the repeated call statement
//! - Program emission behind a swappable `ProgramBackend`
//! - Parsing of the block-structured benchmark plan

mod element;
mod error;
mod invocation;
mod plan;
mod program;
mod shape;
mod value;

pub use element::{ElementType, Reduction, TypeInfo, decode_type_codes};
pub use error::ConfigurationError;
pub use invocation::{Invocation, ParamRole, build_invocation, parse_roles};
pub use plan::{
    BenchmarkCase, BenchmarkPlan, ConvolutionPattern, ConvolutionPlan, Pattern, derive_pattern,
};
pub use program::{
    ContainerFlags, IdxBackend, NamedContainer, ProgramBackend, ProgramSpec, emit_program,
};
pub use shape::Shape;
pub use value::{COEFFICIENT_COUNT, Scalar, ValueExpr, draw_scalar};

/// Name of the loop counter used by the repeated call statement.
pub const REPEAT_VAR: &str = "rep";

/// Name of the volatile temporary receiving each call's result.
pub const SINK_VAR: &str = "sink";
