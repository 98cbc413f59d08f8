//! Hashtag extraction from tweet text.

/// Extract hashtag terms from tweet text.
///
/// A hashtag is any whitespace-delimited token starting with `#`; the
/// term is everything after the `#`. Bare `#` tokens are skipped, and a
/// term repeated in one tweet is returned once so mention rows stay
/// unique per (tweet, term).
#[must_use]
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();

    for token in text.split_whitespace() {
        if let Some(term) = token.strip_prefix('#') {
            if !term.is_empty() && !terms.iter().any(|t| t == term) {
                terms.push(term.to_string());
            }
        }
    }

    terms
}
