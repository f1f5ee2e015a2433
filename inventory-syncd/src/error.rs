//! Error taxonomy for storage, remote sync and reconciliation.

use std::fmt;
use shared::types::{EntityKind, NaturalKey};
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// An observed item could not be decoded. The item is skipped.
    #[error("malformed {kind} item: {message}")]
    Parse { kind: &'static str, message: String },

    /// A local record lookup missed.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// The owning device has not been pushed yet; retried on the next
    /// observation or when the device syncs.
    #[error("{kind} {key} waits on device {device}")]
    UnresolvedDependency {
        kind: EntityKind,
        key: NaturalKey,
        device: NaturalKey,
    },

    /// The inventory system rejected the call or could not be reached.
    #[error("remote call {operation} failed{}: {message}", status_suffix(.status))]
    RemoteCall {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    /// A concurrent writer created the same taxonomy object first.
    #[error("{kind} with slug '{slug}' already exists remotely")]
    DuplicateTaxonomy { kind: &'static str, slug: String },

    /// A record could not be mapped onto the remote schema.
    #[error("cannot translate {kind} {key}: {message}")]
    Translation {
        kind: EntityKind,
        key: NaturalKey,
        message: String,
    },

    #[error("refusing to set remote id {remote_id} on {kind} {id}")]
    InvalidRemoteId {
        kind: EntityKind,
        id: String,
        remote_id: i64,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("store thread is gone")]
    StoreClosed,

    #[error("operation cancelled")]
    Cancelled,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {}", s)).unwrap_or_default()
}

impl SyncError {
    pub fn remote(operation: impl Into<String>, err: reqwest::Error) -> Self {
        SyncError::RemoteCall {
            operation: operation.into(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Per-item failures collected while a batch keeps going.
#[derive(Debug, Default)]
pub struct BatchErrors(Vec<SyncError>);

impl BatchErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: SyncError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncError> {
        self.0.iter()
    }

    pub fn into_result(self) -> Result<(), BatchErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for BatchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchErrors {}
