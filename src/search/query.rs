//! Turning free text into an FTS5 match expression.
//!
//! Terms are cut with the same rule the full-text index uses: Unicode word
//! segmentation, with `-` kept inside a term so "Haupt-Straße" stays one
//! term. Each term is quoted, which keeps FTS5 operators and punctuation in
//! user input from being interpreted, and the quoted terms are ANDed.

use unicode_segmentation::UnicodeSegmentation;

/// Split `text` into search terms.
///
/// ```
/// use geoaddress::search::query::query_terms;
///
/// assert_eq!(query_terms("München, Schillerstraße 5"), vec!["München", "Schillerstraße", "5"]);
/// assert_eq!(query_terms("Haupt-Straße"), vec!["Haupt-Straße"]);
/// ```
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();

    for segment in text.split_word_bounds() {
        let is_word = segment.chars().any(char::is_alphanumeric);
        let is_hyphen = segment.chars().all(|c| c == '-');
        if is_word || (is_hyphen && !current.is_empty()) {
            current.push_str(segment);
        } else if !current.is_empty() {
            terms.push(finish_term(std::mem::take(&mut current)));
        }
    }
    if !current.is_empty() {
        terms.push(finish_term(current));
    }
    terms.retain(|t| !t.is_empty());
    terms
}

/// Drop hyphens left dangling at the end of a term ("Haupt-").
fn finish_term(mut term: String) -> String {
    while term.ends_with('-') {
        term.pop();
    }
    term
}

/// Quote one term for the FTS5 query grammar.
pub fn quote_term(term: &str) -> String {
    format!("\"{}\"", term.replace('"', "\"\""))
}

/// Build an AND match expression from free text, or `None` when the text
/// holds no searchable term.
pub fn match_expression(text: &str) -> Option<String> {
    let terms = query_terms(text);
    if terms.is_empty() {
        return None;
    }
    let quoted: Vec<String> = terms.iter().map(|t| quote_term(t)).collect();
    Some(quoted.join(" "))
}
