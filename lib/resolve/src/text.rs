//! Text normalization shared by the resolvers and handlers.

/// Words that carry no identifying information in a device description.
const DEVICE_STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "at", "can", "check", "cpu", "current", "device", "disk", "for",
    "get", "give", "health", "how", "i", "in", "is", "it", "its", "kiosk", "me", "memory", "metrics",
    "now", "of", "on", "please", "s", "screen", "show", "stats", "status", "tell", "temp",
    "temperature", "telemetry", "that", "the", "this", "today", "uptime", "usage", "what", "whats",
    "with",
];

/// Lower-cases and splits on anything that is not a letter or digit.
///
/// `"What's dart2's CPU?"` yields `["what", "s", "dart2", "s", "cpu"]`.
#[must_use]
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns true if `word` appears as a standalone word of `text`.
#[must_use]
pub fn has_word(text: &str, word: &str) -> bool {
    words(text).iter().any(|w| w == word)
}

/// Splits into matching tokens: words are further split at letter/digit
/// boundaries and numeric runs lose leading zeros.
///
/// `"DART-002"` and `"dart2"` both yield `["dart", "2"]`.
#[must_use]
pub fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in words(text) {
        let mut current = String::new();
        let mut current_is_digit = None;
        for c in word.chars() {
            let is_digit = c.is_ascii_digit();
            if current_is_digit.is_some_and(|d| d != is_digit) {
                out.push(finish_token(&current));
                current.clear();
            }
            current.push(c);
            current_is_digit = Some(is_digit);
        }
        if !current.is_empty() {
            out.push(finish_token(&current));
        }
    }
    out
}

fn finish_token(token: &str) -> String {
    if token.chars().all(|c| c.is_ascii_digit()) {
        let trimmed = token.trim_start_matches('0');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        token.to_string()
    }
}

/// Tokens joined without separators, for whole-string comparisons.
#[must_use]
pub fn compact(text: &str) -> String {
    tokens(text).concat()
}

/// Matching tokens of a device description with stopwords removed and
/// duplicates dropped, in first-seen order.
#[must_use]
pub fn device_tokens(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in words(text) {
        if DEVICE_STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        for token in tokens(&word) {
            if !out.contains(&token) {
                out.push(token);
            }
        }
    }
    out
}

/// Returns true for canonical UUID text (8-4-4-4-12 hex digits).
#[must_use]
pub fn is_uuid(text: &str) -> bool {
    let groups: Vec<&str> = text.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Finds the first UUID in free text, lower-cased.
#[must_use]
pub fn find_uuid(text: &str) -> Option<String> {
    text.split(|c: char| !(c.is_ascii_hexdigit() || c == '-'))
        .find(|candidate| is_uuid(candidate))
        .map(str::to_lowercase)
}

/// Finds a token shaped like a canonical host, e.g. `moco-brt-briggs-001`:
/// at least three dash-separated alphanumeric parts, ending in digits.
#[must_use]
pub fn find_host_token(text: &str) -> Option<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | '?' | '!' | '(' | ')' | '"' | '\''))
        .map(|t| t.trim_end_matches('.').to_lowercase())
        .find(|candidate| {
            let parts: Vec<&str> = candidate.split('-').collect();
            parts.len() >= 3
                && !is_uuid(candidate)
                && parts
                    .iter()
                    .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric()))
                && parts
                    .last()
                    .is_some_and(|p| p.chars().all(|c| c.is_ascii_digit()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_fold_punctuation() {
        assert_eq!(words("What's dart2's CPU?"), ["what", "s", "dart2", "s", "cpu"]);
    }

    #[test]
    fn tokens_split_letter_digit_boundaries() {
        assert_eq!(tokens("DART-002"), ["dart", "2"]);
        assert_eq!(tokens("dart2"), ["dart", "2"]);
        assert_eq!(tokens("Stop 00"), ["stop", "0"]);
    }

    #[test]
    fn compact_ignores_separators() {
        assert_eq!(compact("Briggs Ave / 01"), compact("briggs-ave-1"));
    }

    #[test]
    fn device_tokens_drop_stopwords_and_duplicates() {
        assert_eq!(device_tokens("show telemetry for dart2 dart"), ["dart", "2"]);
        assert!(device_tokens("what's the cpu temp").is_empty());
    }

    #[test]
    fn has_word_is_token_based() {
        assert!(has_word("top posters region brt", "region"));
        assert!(!has_word("regional posters", "region"));
    }

    #[test]
    fn uuid_detection() {
        let id = "3F2504E0-4F89-11D3-9A0C-0305E82C3301";
        assert!(is_uuid(id));
        assert_eq!(
            find_uuid(&format!("plays for poster {id} today")),
            Some(id.to_lowercase())
        );
        assert!(find_uuid("no ids here").is_none());
    }

    #[test]
    fn host_token_detection() {
        assert_eq!(
            find_host_token("telemetry for moco-brt-briggs-001."),
            Some("moco-brt-briggs-001".to_string())
        );
        assert!(find_host_token("state-of-the-art").is_none());
        assert!(find_host_token("3f2504e0-4f89-11d3-9a0c-0305e82c3301").is_none());
    }
}
