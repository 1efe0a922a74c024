//! Input validation utilities.
//!
//! Common validation for command-line parameters and file paths with
//! consistent, typed error messages.

use std::path::Path;

use crate::errors::{Result, TriocallError};

/// Validates that a file exists.
///
/// # Errors
/// Returns an error naming the missing file and its role.
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TriocallError::InvalidParameter {
            parameter: description.to_string(),
            reason: format!("file '{}' does not exist", path.display()),
        });
    }
    Ok(())
}

/// Validates that a ploidy is positive.
///
/// # Errors
/// Returns an error when `ploidy` is zero.
pub fn validate_ploidy(ploidy: usize, role: &str) -> Result<()> {
    if ploidy == 0 {
        return Err(TriocallError::LogicError {
            context: "validate_ploidy",
            reason: format!("{role} ploidy must be > 0"),
        });
    }
    Ok(())
}

/// Validates that a probability lies in `[0, 1]`.
///
/// # Errors
/// Returns an error naming the offending parameter.
pub fn validate_probability(value: f64, parameter: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(TriocallError::InvalidParameter {
            parameter: parameter.to_string(),
            reason: format!("{value} is not a probability"),
        });
    }
    Ok(())
}

/// Validates that a rate parameter lies in `(0, 1]`: a probability whose
/// logarithm is taken downstream, so zero is as fatal as out-of-range.
///
/// # Errors
/// Returns an error naming the offending parameter.
pub fn validate_positive_probability(value: f64, parameter: &str) -> Result<()> {
    validate_probability(value, parameter)?;
    if value == 0.0 {
        return Err(TriocallError::InvalidParameter {
            parameter: parameter.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Validates that a Phred threshold is non-negative and finite.
///
/// # Errors
/// Returns an error naming the offending parameter.
pub fn validate_phred(value: f64, parameter: &str) -> Result<()> {
    if value < 0.0 || !value.is_finite() {
        return Err(TriocallError::InvalidParameter {
            parameter: parameter.to_string(),
            reason: format!("{value} is not a valid Phred value"),
        });
    }
    Ok(())
}
