//! Error types for the gNMI client helpers.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`GnmiError`].
pub type Result<T> = std::result::Result<T, GnmiError>;

/// Errors raised while configuring, connecting to, or querying a gNMI target.
#[derive(Error, Debug)]
pub enum GnmiError {
    /// Missing or malformed command-line input, detected before any I/O.
    #[error("{0}")]
    Usage(String),

    /// Profile or logging configuration problem.
    #[error(transparent)]
    Config(#[from] gnmi_common::Error),

    /// Missing or invalid TLS material.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// A TLS file could not be read or decoded.
    #[error("TLS setup failed: can't load {what} from '{}': {source}", .path.display())]
    TlsFile {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Channel establishment or TLS handshake failure.
    #[error("can't connect to {addr}: {reason}")]
    Dial { addr: String, reason: String },

    /// Credentials can't be carried as gRPC metadata.
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// The target answered the RPC with a non-OK status.
    #[error("{rpc} RPC failed: {:?}: {}", .status.code(), .status.message())]
    Rpc {
        rpc: &'static str,
        #[source]
        status: tonic::Status,
    },

    /// The request deadline expired on the client side.
    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),

    /// An xpath expression could not be parsed.
    #[error("invalid path expression {expr:?}: {reason}")]
    Path { expr: String, reason: String },

    /// The response lacks the structure needed to render it.
    #[error("unexpected response: {0}")]
    EmptyResponse(&'static str),

    /// A message could not be rendered in protobuf text format.
    #[error("can't render {message} as text: {reason}")]
    TextFormat {
        message: &'static str,
        reason: String,
    },

    /// A JSON value returned by the target could not be re-indented.
    #[error("can't indent returned JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GnmiError {
    /// Create a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Create a TLS configuration error.
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Create a path parse error.
    pub fn path(expr: &str, reason: impl Into<String>) -> Self {
        Self::Path {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a dial error, flattening the source chain into one line.
    ///
    /// tonic's transport errors only say "transport error" at the top level;
    /// the useful part (refused, handshake failure) sits further down.
    pub fn dial(addr: &str, source: &(dyn std::error::Error + 'static)) -> Self {
        let mut reason = source.to_string();
        let mut next = source.source();
        while let Some(cause) = next {
            reason.push_str(": ");
            reason.push_str(&cause.to_string());
            next = cause.source();
        }
        Self::Dial {
            addr: addr.to_string(),
            reason,
        }
    }

    /// Wrap a non-OK status returned by `rpc`.
    pub fn rpc(rpc: &'static str, status: tonic::Status) -> Self {
        Self::Rpc { rpc, status }
    }

    /// Whether the error was caused by the request deadline, on either side.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Rpc { status, .. } => matches!(
                status.code(),
                tonic::Code::DeadlineExceeded | tonic::Code::Cancelled
            ),
            _ => false,
        }
    }

    /// Whether the error is a usage error.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}
