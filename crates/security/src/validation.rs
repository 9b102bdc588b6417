//! Input validation for values that reach the network or the filesystem.
//!
//! These checks run before anything is stored in the vault or sent through
//! the rate-limited transport, so bad input fails with a readable message
//! instead of an opaque remote error.

use std::sync::LazyLock;

use keyward_core::ValidationError;
use regex_lite::Regex;

/// Minimum accepted length for an API key.
pub const MIN_API_KEY_LEN: usize = 10;

/// Validate an outbound URL.
///
/// Rules:
/// - must be non-empty
/// - scheme must be `http` or `https`
/// - must have a non-empty host
pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::Empty { field: "URL" });
    }

    let invalid = |reason: &str| ValidationError::InvalidUrl {
        url: url.into(),
        reason: reason.into(),
    };

    if url.chars().any(char::is_whitespace) {
        return Err(invalid("URL cannot contain whitespace"));
    }

    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| invalid("missing scheme"))?;
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return Err(invalid("URL must use HTTP or HTTPS scheme"));
    }

    // Authority ends at the first path, query or fragment delimiter.
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = if let Some(bracketed) = host_port.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or_default()
    } else {
        host_port.split(':').next().unwrap_or_default()
    };

    if host.is_empty() {
        return Err(invalid("URL must have a host"));
    }

    Ok(())
}

/// Jira-style ticket key: uppercase project, dash, issue number.
static TICKET_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]+-\d+$").expect("ticket key pattern is valid"));

/// Validate a Jira-style ticket key (`PROJECT-123`).
pub fn validate_ticket_key(ticket_key: &str) -> Result<(), ValidationError> {
    if ticket_key.is_empty() {
        return Err(ValidationError::Empty {
            field: "ticket key",
        });
    }

    if TICKET_KEY.is_match(ticket_key) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTicketKey(ticket_key.into()))
    }
}

/// Validate an API key before it is stored.
pub fn validate_api_key(api_key: &str) -> Result<(), ValidationError> {
    if api_key.is_empty() {
        return Err(ValidationError::Empty { field: "API key" });
    }
    if api_key.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidApiKey(
            "API key cannot contain whitespace",
        ));
    }
    if api_key.chars().count() < MIN_API_KEY_LEN {
        return Err(ValidationError::InvalidApiKey("API key is too short"));
    }
    Ok(())
}

/// Cheap pre-check for a caller-relative file path.
///
/// Rejects empty input, `..` anywhere, and absolute paths (including
/// `C:`-style drive prefixes). [`crate::PathGuard`] still performs the
/// authoritative containment check.
pub fn validate_relative_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::Empty { field: "file path" });
    }
    if path.contains("..") {
        return Err(ValidationError::InvalidFilePath(
            "file path contains forbidden path traversal pattern",
        ));
    }
    let bytes = path.as_bytes();
    if path.starts_with('/')
        || path.starts_with('\\')
        || (bytes.len() > 1 && bytes[1] == b':')
    {
        return Err(ValidationError::InvalidFilePath(
            "absolute file paths are not allowed",
        ));
    }
    Ok(())
}

/// Replace characters commonly used for markup or quoting injection
/// (`< > " ' &`) with spaces.
pub fn sanitize_input(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '\'' | '&' => ' ',
            other => other,
        })
        .collect()
}
