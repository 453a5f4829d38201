//! Fatal-error reporting.
//!
//! The watch engine collapses the whole supervised group on the first
//! fatal error (§4.4); this is the one place that logs the resulting
//! error and its causes before the process exits non-zero.

use tracing::error;

/// Logs `err` and every wrapped cause.
pub fn report(err: &anyhow::Error) {
    error!(error = %err, "fatal error, shutting down");
    for (depth, cause) in err.chain().skip(1).enumerate() {
        error!(depth = depth + 1, cause = %cause, "caused by");
    }
}
