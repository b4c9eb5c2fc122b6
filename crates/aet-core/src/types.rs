//! Core type definitions with validation.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A coordinate was outside its valid range or was NaN.
    #[error("{axis} must be between -{limit} and {limit} degrees, got {value}")]
    CoordinateOutOfRange {
        axis: &'static str,
        limit: f64,
        value: f64,
    },
}

/// A validated identifier for an activity source (usually a file path).
///
/// Source IDs must be non-empty. The full location is kept for loading, while
/// [`SourceId::display_name`] gives the short name used in result tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    /// Creates a new ID after validation.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty { field: "source ID" });
        }
        Ok(Self(id))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the ID as a filesystem path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Returns the final path component, or the whole ID if it has none.
    pub fn display_name(&self) -> &str {
        self.as_path()
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.0)
    }
}

impl TryFrom<String> for SourceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
}

impl Position {
    /// Creates a position after checking both coordinates are in range.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, ValidationError> {
        check_coordinate("longitude", 180.0, longitude)?;
        check_coordinate("latitude", 90.0, latitude)?;
        Ok(Self {
            longitude,
            latitude,
        })
    }
}

fn check_coordinate(axis: &'static str, limit: f64, value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || !(-limit..=limit).contains(&value) {
        return Err(ValidationError::CoordinateOutOfRange { axis, limit, value });
    }
    Ok(())
}
