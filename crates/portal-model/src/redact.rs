//! MRN redaction for log lines and warning messages.
//!
//! MRNs are protected identifiers and never leave the pipeline: they are
//! excluded from every artifact, and any diagnostic that would carry one
//! passes through [`redact_value`] first. Operators opt in to raw values
//! with an explicit flag, set once at process start.

use std::sync::atomic::{AtomicBool, Ordering};

static LOG_DATA_ENABLED: AtomicBool = AtomicBool::new(false);

/// Placeholder used when row-level logging is disabled.
pub const REDACTED_VALUE: &str = "[REDACTED]";

/// Enable or disable raw identifier values in diagnostics.
pub fn set_log_data(enabled: bool) {
    LOG_DATA_ENABLED.store(enabled, Ordering::Release);
}

/// Returns true if row-level logging is explicitly enabled.
pub fn log_data_enabled() -> bool {
    LOG_DATA_ENABLED.load(Ordering::Acquire)
}

/// Returns the input value when row-level logging is enabled, otherwise a
/// redacted token. Applied to MRNs before any log line or warning message.
pub fn redact_value(value: &str) -> &str {
    if log_data_enabled() {
        value
    } else {
        REDACTED_VALUE
    }
}
