//! Error types for zone storage and the record codec

use std::fmt;

#[derive(Debug)]
pub enum ZoneError {
    /// Malformed or ambiguous subdomain ownership; never retried.
    Validation(String),
    /// Stored content failed to parse back into a record.
    Decode(serde_json::Error),
    /// A record type code with no registered shape.
    UnsupportedType(u16),
    /// Stored content decoded to a different type than the stored code.
    TypeMismatch { stored: u16, decoded: u16 },
    /// Update or delete against an id that does not exist.
    NotFound(i64),
    /// Transaction or connection failure; the enclosing transaction has
    /// already rolled back, including any serial bump.
    Storage(sqlx::Error),
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneError::Validation(reason) => write!(f, "Validation error: {}", reason),
            ZoneError::Decode(e) => write!(f, "Record decode error: {}", e),
            ZoneError::UnsupportedType(code) => {
                write!(f, "Unsupported record type code: {}", code)
            }
            ZoneError::TypeMismatch { stored, decoded } => write!(
                f,
                "Stored type code {} does not match decoded record type {}",
                stored, decoded
            ),
            ZoneError::NotFound(id) => write!(f, "Record not found: {}", id),
            ZoneError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for ZoneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZoneError::Decode(e) => Some(e),
            ZoneError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ZoneError {
    fn from(err: sqlx::Error) -> Self {
        ZoneError::Storage(err)
    }
}

impl From<serde_json::Error> for ZoneError {
    fn from(err: serde_json::Error) -> Self {
        ZoneError::Decode(err)
    }
}

pub type Result<T> = std::result::Result<T, ZoneError>;
