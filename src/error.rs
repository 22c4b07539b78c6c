use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single GET against one candidate URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Certificate or handshake failure. The probe moves on to the next scheme.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Refused, unreachable, DNS failure, timeout or an unusable URL.
    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn reason(&self) -> &str {
        match self {
            FetchError::Tls(reason) | FetchError::Transport(reason) => reason,
        }
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("could not write finding: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode finding: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("could not read fingerprint table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fingerprint table {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("fingerprint table {0} has no entries")]
    Empty(PathBuf),
}
