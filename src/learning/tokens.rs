//! Keyword extraction for lexical retrieval.
//!
//! Status texts are Portuguese; the stopword list covers the function words
//! that dominate INSS movement phrasing. Tokens must be longer than
//! `LEARNING_MIN_TOKEN_LEN` after lowercasing.

use crate::config::defaults::LEARNING_MIN_TOKEN_LEN;
use std::collections::HashSet;

/// Portuguese stopwords seen in portal status texts.
const STOPWORDS: &[&str] = &[
    "para", "pela", "pelo", "pelos", "pelas", "como", "pois", "porque",
    "esse", "essa", "este", "esta", "isso", "isto", "aquele", "aquela",
    "seu", "sua", "seus", "suas", "nos", "nas", "dos", "das", "uma", "umas",
    "mais", "menos", "muito", "sobre", "entre", "quando", "onde", "ainda",
    "ser", "estar", "foi", "sido", "sendo", "são", "será", "está", "estão",
    "deve", "devem", "deverá", "favor", "conforme", "através", "mediante",
];

/// Extract ranked-retrieval keywords from free text.
///
/// Lowercases, splits on non-alphanumeric boundaries, drops stopwords and
/// tokens at or below the minimum length, dedups preserving first occurrence.
pub fn keyword_tokens(text: &str) -> Vec<String> {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for raw in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if raw.chars().count() <= LEARNING_MIN_TOKEN_LEN || stopwords.contains(raw) {
            continue;
        }
        if seen.insert(raw.to_string()) {
            tokens.push(raw.to_string());
        }
    }
    tokens
}
