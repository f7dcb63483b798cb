//! Utility modules.

/// `X-Sdk-Date` formatting and timestamp serde helpers.
pub mod datetime;

/// Log sanitization utilities to prevent sensitive data exposure.
pub mod log_sanitizer;
