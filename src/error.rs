//! Error types.

/// Errors surfaced by the clock endpoint.
///
/// Only transport and hardware faults ever reach the caller; protocol
/// errors (bad packets, missing peers) are absorbed as drop counters
/// and shape future master elections through timeouts instead.
#[derive(Debug, thiserror::Error)]
pub enum PtpError {
    /// Binding a socket, joining multicast, or sending failed.
    #[error("transport failure during {op}")]
    Transport {
        /// The operation that failed.
        op: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The hardware tick counter could not be initialized or driven.
    #[error("hardware clock fault: {0}")]
    Hardware(&'static str),
}

impl PtpError {
    /// Wrap an I/O error from a named transport operation.
    #[must_use]
    pub fn transport(op: &'static str, source: std::io::Error) -> Self {
        Self::Transport { op, source }
    }
}
