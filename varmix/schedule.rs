use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Schedule entry {position} refers to variable {index}, but there are only {num_variables} variables.")]
pub struct ScheduleError {
    pub position: usize,
    pub index: usize,
    pub num_variables: usize,
}

/// An ordered list of variable indices to revisit, repeats allowed.
///
/// The order is the caller's decision; the engine applies it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schedule {
    indices: Vec<usize>,
}

impl Schedule {
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    /// `0, 1, ..., p - 1`
    pub fn forward(num_variables: usize) -> Self {
        Self::new((0..num_variables).collect())
    }

    /// `p - 1, ..., 1, 0`
    pub fn backward(num_variables: usize) -> Self {
        Self::new((0..num_variables).rev().collect())
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Checks every entry against `num_variables`.
    pub fn validate(&self, num_variables: usize) -> Result<(), ScheduleError> {
        validate_indices(&self.indices, num_variables)
    }
}

impl From<Vec<usize>> for Schedule {
    fn from(indices: Vec<usize>) -> Self {
        Self::new(indices)
    }
}

impl AsRef<[usize]> for Schedule {
    fn as_ref(&self) -> &[usize] {
        self.as_slice()
    }
}

/// Reports the first out-of-range entry of `indices`.
pub fn validate_indices(indices: &[usize], num_variables: usize) -> Result<(), ScheduleError> {
    match indices.iter().position(|&i| i >= num_variables) {
        Some(position) => Err(ScheduleError {
            position,
            index: indices[position],
            num_variables,
        }),
        None => Ok(()),
    }
}
