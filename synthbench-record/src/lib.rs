#![warn(missing_docs)]
//! Synthbench Record - Result Model
//!
//! Accumulates timings per element type for one benchmark case and moves them
//! between runs as one ASCII line per record: rkyv bytes, base64 encoded.
//! Lines from several runs can be concatenated into one valid file.

mod codec;
mod result;

pub use codec::{RecordError, decode_result, decode_results, encode_result};
pub use result::{CaseRecord, SamplePoint, TestResult, TypeSeries};
