// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Collaborator traits
//!
//! The pipeline only sequences and tracks work; listing a unit's items,
//! reading bytes, writing bytes and notifying downstream consumers are all
//! delegated to implementations of the traits in this module. Concrete
//! implementations live in [`crate::http`] and [`crate::fs_target`]; tests
//! provide in-memory fakes.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of the input list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitRef {
    pub group_id: String,
    pub unit_id: String,
}

impl UnitRef {
    pub fn new(group_id: impl Into<String>, unit_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            unit_id: unit_id.into(),
        }
    }
}

/// One transferable object as reported by the item lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub filename: String,
    pub source_locator: String,
}

impl ItemEntry {
    pub fn new(filename: impl Into<String>, source_locator: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            source_locator: source_locator.into(),
        }
    }
}

/// Streamed object content.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Result of a target write that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The object was written; byte count and base64 MD5 of the content
    Written { bytes: u64, md5: String },
    /// An object with that name already existed and was left untouched
    AlreadyExists,
}

/// Failure of a source read or a target write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("source object not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid target object name: {0}")]
    InvalidName(String),

    #[error("{0}")]
    Other(String),
}

impl TransferError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Throttled(_) | Self::Network(_) | Self::Io(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            Self::NotFound(_)
            | Self::PermissionDenied(_)
            | Self::InvalidName(_)
            | Self::Other(_) => false,
        }
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Throttled(_) => "throttled",
            Self::Network(_) => "network",
            Self::HttpStatus { .. } => "http_status",
            Self::Io(_) => "io",
            Self::InvalidName(_) => "invalid_name",
            Self::Other(_) => "other",
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(e.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(e.to_string()),
            // ENAMETOOLONG and friends fail the same way on every attempt.
            std::io::ErrorKind::InvalidFilename => Self::InvalidName(e.to_string()),
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Failure of the item lookup. Always fatal to the unit once retries are spent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Request(String),

    #[error("lookup returned HTTP {status}")]
    Status { status: u16 },

    #[error("lookup response could not be decoded: {0}")]
    Decode(String),
}

impl LookupError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status } => *status == 429 || *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// Failure to deliver a notification. Never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("notify failed: {0}")]
pub struct NotifyError(pub String);

/// Resolves the items belonging to a unit.
#[async_trait]
pub trait ItemLookup: Send + Sync {
    async fn items(&self, unit: &UnitRef) -> Result<Vec<ItemEntry>, LookupError>;
}

/// Reads object content by locator.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn open(&self, locator: &str) -> Result<ByteStream, TransferError>;
}

/// Writes objects by name, never overwriting.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Longest object name, in bytes, this target accepts.
    fn max_name_len(&self) -> usize {
        crate::naming::MAX_TARGET_NAME_LEN
    }

    async fn exists(&self, name: &str) -> Result<bool, TransferError>;

    /// Write `body` under `name` unless an object of that name exists.
    async fn write(&self, name: &str, body: ByteStream) -> Result<WriteOutcome, TransferError>;
}

/// Best-effort downstream signal for written objects.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, name: &str) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(TransferError::Network("reset".into()).is_transient());
        assert!(TransferError::Throttled("429".into()).is_transient());
        assert!(
            TransferError::HttpStatus {
                status: 503,
                url: "u".into()
            }
            .is_transient()
        );
        assert!(
            !TransferError::HttpStatus {
                status: 400,
                url: "u".into()
            }
            .is_transient()
        );
        assert!(!TransferError::NotFound("x".into()).is_transient());
        assert!(!TransferError::PermissionDenied("x".into()).is_transient());
    }

    #[test]
    fn io_errors_map_to_kinds() {
        let e: TransferError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert_eq!(e.kind(), "not_found");
        let e: TransferError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(e.kind(), "permission_denied");
        let e: TransferError = std::io::Error::from(std::io::ErrorKind::Interrupted).into();
        assert!(e.is_transient());
        let e: TransferError = std::io::Error::from(std::io::ErrorKind::InvalidFilename).into();
        assert_eq!(e.kind(), "invalid_name");
        assert!(!e.is_transient());
    }

    #[test]
    fn lookup_transient_classification() {
        assert!(LookupError::Request("timeout".into()).is_transient());
        assert!(LookupError::Status { status: 503 }.is_transient());
        assert!(LookupError::Status { status: 429 }.is_transient());
        assert!(!LookupError::Status { status: 404 }.is_transient());
        assert!(!LookupError::Decode("eof".into()).is_transient());
    }
}
