// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Error taxonomy shared by every component.

use std::path::PathBuf;

/// Boxed lower-level cause carried by transport and hardware errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected locally, never sent over the wire.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The device answered with a nonzero status.
    #[error("remote error: {message}")]
    Remote { status: i64, message: String },

    #[error("{op} failed: {source}")]
    Transport {
        op: String,
        #[source]
        source: BoxError,
    },

    /// A line write failed; the boot sequence must be restarted from the top.
    #[error("{step}: {source}")]
    HardwareIo {
        step: String,
        #[source]
        source: BoxError,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("build service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse error class, stable across variants' payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Remote,
    Transport,
    HardwareIo,
    Protocol,
    Service,
    Cancelled,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Remote { .. } => ErrorKind::Remote,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::HardwareIo { .. } => ErrorKind::HardwareIo,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Service { .. } => ErrorKind::Service,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn transport(op: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Transport {
            op: op.into(),
            source: source.into(),
        }
    }

    pub fn hardware(step: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::HardwareIo {
            step: step.into(),
            source: source.into(),
        }
    }

    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            Error::InvalidArgument("x".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Error::Service {
                status: 500,
                body: String::new()
            }
            .kind(),
            ErrorKind::Service
        );
        assert_eq!(
            Error::transport("connect", "refused").kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn test_transport_message_names_operation() {
        let err = Error::transport("FS.Get", "link dropped");
        assert_eq!(err.to_string(), "FS.Get failed: link dropped");
    }

    #[test]
    fn test_remote_message_is_verbatim() {
        let err = Error::Remote {
            status: 404,
            message: "file not found".into(),
        };
        assert_eq!(err.to_string(), "remote error: file not found");
    }
}
