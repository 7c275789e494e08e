/// Arithmetic operation type and evaluation
///
/// A closed enumeration with an exhaustive match: adding an operation is a
/// compile-time extension, not a runtime string lookup. Results are always
/// computed here on the server, never trusted from client input.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Minimum number of operands a calculation must carry.
pub const MIN_OPERANDS: usize = 2;

/// Supported operations.
///
/// The wire form is lowercase (`add`/`sub`/`mul`/`div`); the aliases accept
/// the historic capitalized names still used by older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[serde(alias = "Add")]
    Add,
    #[serde(alias = "Sub", alias = "Subtract")]
    Sub,
    #[serde(alias = "Mul", alias = "Multiply")]
    Mul,
    #[serde(alias = "Div", alias = "Divide")]
    Div,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Mul => "mul",
            Operation::Div => "div",
        }
    }

    /// Parse an operation stored in the database.
    pub fn parse(value: &str) -> Result<Operation, ValidationError> {
        match value {
            "add" => Ok(Operation::Add),
            "sub" => Ok(Operation::Sub),
            "mul" => Ok(Operation::Mul),
            "div" => Ok(Operation::Div),
            _ => Err(ValidationError::InvalidFormat("operation".to_string())),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluate an operation over its operand list, folding left.
///
/// Division rejects a zero divisor before anything is persisted.
pub fn compute(operation: Operation, operands: &[f64]) -> Result<f64, ValidationError> {
    if operands.len() < MIN_OPERANDS {
        return Err(ValidationError::TooFewOperands(MIN_OPERANDS));
    }

    let mut acc = operands[0];
    for &value in &operands[1..] {
        acc = match operation {
            Operation::Add => acc + value,
            Operation::Sub => acc - value,
            Operation::Mul => acc * value,
            Operation::Div => {
                if value == 0.0 {
                    return Err(ValidationError::DivisionByZero);
                }
                acc / value
            }
        };
    }
    Ok(acc)
}

/// Two-operand convenience used by the public arithmetic endpoints.
pub fn compute_pair(operation: Operation, a: f64, b: f64) -> Result<f64, ValidationError> {
    compute(operation, &[a, b])
}
