//! Tokenizer for archived notes
//!
//! Two token classes, unioned:
//! - Words: maximal runs of letters/digits (3+ chars) in scripts that put
//!   spaces between words.
//! - Trigrams: every 3-char window over runs of scripts written without
//!   spaces (Han, kana, Thai, ...), since word boundaries can't be found
//!   lexically there.
//!
//! Pure functions of the input text; all tokens are lower-cased.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum length (in chars) of a word token
pub const MIN_WORD_CHARS: usize = 3;

/// Window size for unspaced scripts
pub const NGRAM_CHARS: usize = 3;

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        (?P<unspaced>[\p{Han}\p{Hiragana}\p{Katakana}\p{Thai}\p{Lao}\p{Khmer}\p{Myanmar}\x{30FC}]+)
        |(?P<word>[[\p{L}\p{N}\p{M}]&&[^\p{Han}\p{Hiragana}\p{Katakana}\p{Thai}\p{Lao}\p{Khmer}\p{Myanmar}\x{30FC}]]+)
        ",
    )
    .unwrap()
});

// Leading [HH:MM] stamps written by the note taker
static TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d{2}:\d{2}\]").unwrap());

/// Tokens of one batch plus a context snippet per distinct token
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenizedBatch {
    /// Every token occurrence, in text order
    pub tokens: Vec<String>,
    /// First line each distinct token appeared on
    pub contexts: BTreeMap<String, String>,
}

/// Split text into lower-cased candidate patterns
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    push_tokens(text, &mut tokens);
    tokens
}

/// Tokenize line by line, keeping the source line of each token's first occurrence
pub fn tokenize_batch(text: &str, context_chars: usize) -> TokenizedBatch {
    let mut batch = TokenizedBatch::default();
    let mut line_tokens = Vec::new();

    for line in text.lines() {
        line_tokens.clear();
        push_tokens(line, &mut line_tokens);
        if line_tokens.is_empty() {
            continue;
        }

        let snippet = snippet(line, context_chars);
        for token in &line_tokens {
            if !batch.contexts.contains_key(token) {
                batch.contexts.insert(token.clone(), snippet.clone());
            }
        }
        batch.tokens.append(&mut line_tokens);
    }

    batch
}

fn push_tokens(text: &str, out: &mut Vec<String>) {
    for caps in TOKEN_PATTERN.captures_iter(text) {
        if let Some(word) = caps.name("word") {
            let lower = word.as_str().to_lowercase();
            if lower.chars().count() >= MIN_WORD_CHARS {
                out.push(lower);
            }
        } else if let Some(run) = caps.name("unspaced") {
            let chars: Vec<char> = run.as_str().chars().collect();
            for window in chars.windows(NGRAM_CHARS) {
                out.push(window.iter().collect::<String>().to_lowercase());
            }
        }
    }
}

/// Trimmed line without timestamps, truncated to `max_chars`
fn snippet(line: &str, max_chars: usize) -> String {
    let cleaned = TIMESTAMP_PATTERN.replace_all(line, "");
    let trimmed = cleaned.trim();

    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }

    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_words_are_lowercased_and_filtered() {
        assert_eq!(
            tokenize("Deploy to Staging, ok? v2 CI"),
            vec!["deploy", "staging"]
        );
    }

    #[test]
    fn test_digits_count_as_letters() {
        assert_eq!(tokenize("http2 and bm25"), vec!["http2", "and", "bm25"]);
    }

    #[test]
    fn test_punctuation_splits_words() {
        assert_eq!(
            tokenize("pattern_tracker.json"),
            vec!["pattern", "tracker", "json"]
        );
    }

    #[test]
    fn test_unspaced_script_trigrams() {
        assert_eq!(tokenize("設計書作成"), vec!["設計書", "計書作", "書作成"]);
    }

    #[test]
    fn test_short_unspaced_run_yields_nothing() {
        assert!(tokenize("設計").is_empty());
    }

    #[test]
    fn test_mixed_scripts() {
        let tokens = tokenize("Rustで設計する");
        assert_eq!(tokens, vec!["rust", "で設計", "設計す", "計する"]);
    }

    #[test]
    fn test_spaced_non_latin_script() {
        assert_eq!(tokenize("Привет мир тест"), vec!["привет", "мир", "тест"]);
    }

    #[test]
    fn test_timestamps_do_not_produce_tokens() {
        assert_eq!(tokenize("[09:30] deploy"), vec!["deploy"]);
    }

    #[test]
    fn test_tokenize_batch_contexts() {
        let batch = tokenize_batch("[09:30] deploy staging\nrollback deploy\n", 160);
        assert_eq!(batch.tokens, vec!["deploy", "staging", "rollback", "deploy"]);
        assert_eq!(batch.contexts["deploy"], "deploy staging");
        assert_eq!(batch.contexts["rollback"], "rollback deploy");
    }

    #[test]
    fn test_snippet_truncation() {
        let batch = tokenize_batch("abcdefghij klmnop", 5);
        assert_eq!(batch.contexts["abcdefghij"], "abcde...");
    }

    #[test]
    fn test_empty_text() {
        assert!(tokenize("").is_empty());
        assert_eq!(tokenize_batch("", 10), TokenizedBatch::default());
    }
}
