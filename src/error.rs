//! Custom error types for chirp.
//!
//! Distinguishes "nothing found" from "operation failed" so the session
//! layer can keep running after recoverable problems.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for chirp operations.
#[derive(Error, Debug)]
pub enum ChirpError {
    // =========================================================================
    // Authentication Errors
    // =========================================================================
    /// User id / password pair did not verify. Deliberately carries no
    /// detail about which half was wrong.
    #[error("Invalid login credentials")]
    AuthenticationFailed,

    /// Password hashing or verification machinery failed.
    #[error("Password hashing error: {reason}")]
    PasswordHash { reason: String },

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database file not found (not yet initialized).
    #[error(
        "No chirp database found. Run 'chirp init' first.\nExpected database at: {path}"
    )]
    DatabaseNotFound { path: PathBuf },

    /// Database schema version mismatch.
    #[error(
        "Database schema version mismatch: expected {expected}, found {found}. Re-run 'chirp init --force'."
    )]
    SchemaMismatch { expected: i32, found: i32 },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// A referenced row does not exist.
    #[error("{item_type} with id {id} not found")]
    NotFound { item_type: &'static str, id: i64 },

    /// User input failed validation (non-numeric id, empty text, ...).
    #[error("Invalid input: {reason}")]
    Validation { reason: String },

    // =========================================================================
    // IO / Configuration Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    /// Wrapped anyhow error for the binary boundary.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for chirp operations.
pub type Result<T> = std::result::Result<T, ChirpError>;

impl ChirpError {
    /// Create a not found error.
    #[must_use]
    pub const fn not_found(item_type: &'static str, id: i64) -> Self {
        Self::NotFound { item_type, id }
    }

    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a password hashing error.
    pub fn password_hash(reason: impl Into<String>) -> Self {
        Self::PasswordHash {
            reason: reason.into(),
        }
    }

    /// Create a database not found error.
    pub fn database_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DatabaseNotFound { path: path.into() }
    }

    /// Whether the interactive session should keep running after printing
    /// this error. Store-level failures during a write are reported and
    /// rolled back, never fatal.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Other(_))
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::AuthenticationFailed => {
                Some("Check your user id and password, or register a new account.")
            }
            Self::DatabaseNotFound { .. } => Some("Run 'chirp init' to create the database."),
            Self::SchemaMismatch { .. } => {
                Some("Run 'chirp init --force' to recreate the schema (destroys data).")
            }
            _ => None,
        }
    }
}

// =============================================================================
// "Did you mean?" support for session commands
// =============================================================================

use colored::Colorize;

/// Edit distance between two strings, used to suggest session commands
/// when the user mistypes one.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    // Two-row rolling computation; the full matrix is never needed.
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr: Vec<usize> = vec![0; b_chars.len() + 1];

    for (i, ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Find the closest command to `input` among `candidates`, if any is
/// within edit distance 2. Exact matches return `None` (nothing to
/// suggest).
#[must_use]
pub fn find_closest_match<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let input_lower = input.to_lowercase();

    candidates
        .iter()
        .map(|&candidate| {
            (
                candidate,
                levenshtein_distance(&input_lower, &candidate.to_lowercase()),
            )
        })
        .filter(|&(_, distance)| distance > 0 && distance <= 2)
        .min_by_key(|&(_, distance)| distance)
        .map(|(candidate, _)| candidate)
}

/// Format a "did you mean?" suggestion.
#[must_use]
pub fn format_did_you_mean(suggestion: &str) -> String {
    format!("Did you mean '{}'?", suggestion.green())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_carries_context() {
        let err = ChirpError::not_found("Tweet", 42);
        assert!(err.to_string().contains("Tweet"));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn auth_failure_is_opaque() {
        let err = ChirpError::AuthenticationFailed;
        assert!(!err.to_string().contains("password"));
        assert!(err.suggestion().is_some());
        assert!(err.is_recoverable());
    }

    #[test]
    fn database_errors_are_recoverable() {
        let err = ChirpError::Database(rusqlite::Error::InvalidQuery);
        assert!(err.is_recoverable());
    }

    #[test]
    fn io_errors_are_fatal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ChirpError = io_err.into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein_distance("follow", "follow"), 0);
        assert_eq!(levenshtein_distance("folow", "follow"), 1);
        assert_eq!(levenshtein_distance("", "feed"), 4);
        assert_eq!(levenshtein_distance("cat", "cats"), 1);
    }

    #[test]
    fn closest_match_for_session_commands() {
        let commands = ["feed", "compose", "followers", "logout"];
        assert_eq!(find_closest_match("fede", &commands), Some("feed"));
        assert_eq!(find_closest_match("compse", &commands), Some("compose"));
        // Exact matches are not suggestions
        assert_eq!(find_closest_match("logout", &commands), None);
        assert_eq!(find_closest_match("xyz", &commands), None);
    }
}
