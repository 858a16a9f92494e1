//! Process-wide logging setup shared by binaries, tests and benches.

/// Initialize structured logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    if tracing::try_init().is_ok() {
        ::tracing::debug!("structured logging installed");
    }
}

/// Subscriber configuration (filters, output format).
pub mod tracing;
