//! Permanent-error classification for upstream failures.
//!
//! Upstream services report most of their hard failures only through the
//! error text, so classification is a best-effort substring match against
//! [`PERMANENT_ERROR_PATTERNS`]. Anything that does not match is treated as
//! transient by the caller.
use serde::Serialize;

/// Failure causes that retrying cannot fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermanentCause {
    /// TLS certificate could not be verified.
    Certificate,
    /// Server certificate does not cover the requested host.
    HostnameMismatch,
    /// The store or resolution script rejected a field name.
    UnknownField,
    /// Credentials lack permission for the table or script.
    PermissionDenied,
    /// The resolution script hit its execution-time limit.
    ExecutionTimeLimit,
}

impl PermanentCause {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PermanentCause::Certificate => "certificate",
            PermanentCause::HostnameMismatch => "hostname_mismatch",
            PermanentCause::UnknownField => "unknown_field",
            PermanentCause::PermissionDenied => "permission_denied",
            PermanentCause::ExecutionTimeLimit => "execution_time_limit",
        }
    }
}

/// Lower-case substrings mapped to the cause they indicate. Order matters:
/// the first match wins.
pub const PERMANENT_ERROR_PATTERNS: &[(&str, PermanentCause)] = &[
    ("hostname/ip does not match", PermanentCause::HostnameMismatch),
    ("err_tls_cert_altname_invalid", PermanentCause::HostnameMismatch),
    ("certificate", PermanentCause::Certificate),
    ("cert_has_expired", PermanentCause::Certificate),
    ("unable_to_verify_leaf_signature", PermanentCause::Certificate),
    ("self signed", PermanentCause::Certificate),
    ("ssl routines", PermanentCause::Certificate),
    ("ssl_error", PermanentCause::Certificate),
    ("tls handshake", PermanentCause::Certificate),
    ("unknown_field_name", PermanentCause::UnknownField),
    ("unknown field name", PermanentCause::UnknownField),
    ("field not found", PermanentCause::UnknownField),
    ("invalid_permissions", PermanentCause::PermissionDenied),
    ("not_authorized", PermanentCause::PermissionDenied),
    ("insufficient permissions", PermanentCause::PermissionDenied),
    ("exceeded maximum execution time", PermanentCause::ExecutionTimeLimit),
    ("execution time limit", PermanentCause::ExecutionTimeLimit),
];

/// Classifies an error message against [`PERMANENT_ERROR_PATTERNS`].
#[must_use]
pub fn classify_message(message: &str) -> Option<PermanentCause> {
    let lowered = message.to_lowercase();
    PERMANENT_ERROR_PATTERNS
        .iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map(|(_, cause)| *cause)
}

/// Classifies an `anyhow` error by walking its whole context chain.
#[must_use]
pub fn classify_error(error: &anyhow::Error) -> Option<PermanentCause> {
    classify_message(&format!("{error:#}"))
}
