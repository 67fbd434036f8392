//! Word tokens for contact prefix search.
//!
//! A contact is indexed by the lower-cased words of its email and name,
//! keeping only words that are not a prefix of another word of the same
//! contact. A prefix query against the longest word matches every shorter
//! one anyway, so the dropped words would only bloat the index.

use std::collections::BTreeSet;

/// Tag marking full-word entries in the search index.
pub const FULL_WORD_TAG: &str = "f:";

/// Split every part into distinct lower-case alphanumeric words.
pub fn tokenize<'a>(parts: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    parts
        .into_iter()
        .flat_map(|part| {
            part.to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|word| !word.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Drop every word that is a proper prefix of another word in the set.
///
/// In a sorted set a word's extensions sort directly after it, so only the
/// next element has to be inspected.
pub fn collapse_prefixes(words: &BTreeSet<String>) -> BTreeSet<String> {
    let mut kept = BTreeSet::new();
    let mut iter = words.iter().peekable();
    while let Some(word) = iter.next() {
        match iter.peek() {
            Some(next) if next.starts_with(word.as_str()) => {}
            _ => {
                kept.insert(word.clone());
            }
        }
    }
    kept
}

/// Tagged, prefix-collapsed index entries for a contact.
pub fn index_entries(email: &str, name: Option<&str>) -> BTreeSet<String> {
    let words = tokenize(std::iter::once(email).chain(name));
    collapse_prefixes(&words)
        .into_iter()
        .map(|word| format!("{}{}", FULL_WORD_TAG, word))
        .collect()
}

/// Words of a search query, in the order they appear.
///
/// Queries are tokenized like contacts, so `"Abcd.Vw"` searches for
/// contacts having words starting with `abcd` and with `vw`.
pub fn query_words(query: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        if !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }
    words
}

/// Inclusive lower and exclusive upper bound of the index range holding
/// every entry that starts with `word`.
pub fn word_range(word: &str) -> (String, String) {
    let lower = format!("{}{}", FULL_WORD_TAG, word);
    let upper = format!("{}{}", lower, char::MAX);
    (lower, upper)
}
