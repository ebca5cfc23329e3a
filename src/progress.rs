//! Progress reporting for the setup pipeline.

/// Sink for user-facing pipeline status lines.
///
/// The pipeline emits one line per completed stage; diagnostics go through
/// `tracing` instead, so callers can separate the two streams.
pub trait ProgressReporter: Send + Sync {
    /// Report a completed step with overall progress.
    fn emit(&self, percentage: u32, message: String);

    /// Report a failed step. The pipeline aborts right after.
    fn emit_failure(&self, message: String);
}

/// Prints checkmark-prefixed status lines to stdout.
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn emit(&self, percentage: u32, message: String) {
        println!("\u{2713} [{percentage:>3}%] {message}");
    }

    fn emit_failure(&self, message: String) {
        println!("\u{2717} {message}");
    }
}
