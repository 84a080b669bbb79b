//! Container shapes

use crate::ConfigurationError;
use std::fmt;

/// Ordered, non-empty list of positive dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<u64>);

impl Shape {
    /// Build a shape, rejecting empty lists, zero-sized dimensions and element
    /// counts that do not fit in a `u64`.
    pub fn new(dims: Vec<u64>) -> Result<Self, ConfigurationError> {
        if dims.is_empty() {
            return Err(ConfigurationError::EmptyShape);
        }
        if dims.contains(&0) {
            return Err(ConfigurationError::InvalidShape(format!(
                "{:?} has a zero dimension",
                dims
            )));
        }
        if dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d)).is_none() {
            return Err(ConfigurationError::InvalidShape(format!(
                "{:?} has more than {} elements",
                dims,
                u64::MAX
            )));
        }
        Ok(Self(dims))
    }

    /// Dimensions in declaration order
    pub fn dims(&self) -> &[u64] {
        &self.0
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of elements (product of all dimensions, checked on construction)
    pub fn size(&self) -> u64 {
        self.0.iter().product()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}
