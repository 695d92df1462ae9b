use std::io;

use ulid::Ulid;

use super::CollectionKind;

#[derive(Debug)]
pub enum StoreError {
    NotFound { collection: CollectionKind, id: Ulid },
    Corrupt { collection: CollectionKind, reason: String },
    Seed(String),
    Io(io::Error),
    WriterClosed,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { collection, id } => write!(f, "{collection} record not found: {id}"),
            StoreError::Corrupt { collection, reason } => {
                write!(f, "{collection} snapshot corrupt: {reason}")
            }
            StoreError::Seed(e) => write!(f, "bundled seed data invalid: {e}"),
            StoreError::Io(e) => write!(f, "snapshot I/O error: {e}"),
            StoreError::WriterClosed => write!(f, "snapshot writer shut down"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
