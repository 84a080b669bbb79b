//! Configuration Errors
//!
//! Anything that would make the generated numeric data or the measured call wrong
//! is rejected here, before a single program is built.

use thiserror::Error;

/// Malformed or missing configuration, or a synthesis request that cannot produce
/// a valid program.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("\"(\" missing at the start of block: {0}")]
    MissingOpenParen(String),

    #[error("empty block in configuration")]
    EmptyBlock,

    #[error("\"{0}\" block missing in configuration")]
    MissingBlock(&'static str),

    #[error("\"{block}\" block is empty")]
    EmptyBlockBody { block: &'static str },

    #[error("invalid integer {token:?} in \"{block}\" block")]
    InvalidInteger { block: &'static str, token: String },

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("n_tests_min must be at least 1")]
    ZeroRepeatFloor,

    #[error("malformed functions row (expected `test function roles types`): {0}")]
    MalformedFunction(String),

    #[error("malformed convolution row (expected `repeat size n_examples size_param`): {0}")]
    MalformedConvolution(String),

    #[error("duplicate test name: {0}")]
    DuplicateTestName(String),

    #[error("wrong type code: {0}")]
    UnknownTypeCode(String),

    #[error("unknown parameter role {role:?} in {roles:?}")]
    UnknownRole { role: char, roles: String },

    #[error("name {0:?} collides with generated program names")]
    ReservedName(String),

    #[error("invalid function name: {0:?}")]
    InvalidIdentifier(String),

    #[error("shape has {rank} dimensions, at most {max} are supported")]
    TooManyDimensions { rank: usize, max: usize },

    #[error("cannot synthesize a program over an empty shape")]
    EmptyShape,

    #[error("cannot synthesize a program without containers")]
    NoContainers,

    #[error("duplicate container name: {0}")]
    DuplicateContainer(String),
}
