//! Listing-count extraction from free page text.
//!
//! A bare "first number on the page" picks up dates and prices, so every
//! pattern requires a listing keyword next to the number. Patterns run in
//! order and the first match wins.

use crate::codec::ascii_fold;
use regex::Regex;
use std::sync::LazyLock;

/// Integer with optional `.`/`,` thousands groups: `37`, `1.234`, `12,500`
const NUM: &str = r"(\d{1,3}(?:[.,]\d{3})+|\d+)";

/// Ordered from most specific phrasing to most generic.
/// Input is already ASCII-folded and lowercased.
static COUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // "Showing 1-10 of 37 items"
        format!(r"showing\s+\d+\s*(?:-|to)?\s*\d*\s+of\s+{NUM}\s+(?:items?|listings?|homes?|results?)"),
        // "Mostrando 1-10 de 37 itens"
        format!(r"mostrando\s+\d+\s*(?:-|a|ate)?\s*\d*\s+de\s+{NUM}\s+(?:itens|item|anuncios?|acomodac(?:oes|ao)|resultados?)"),
        // "42 acomodações", "12 listings"
        format!(r"{NUM}\s+(?:acomodac(?:oes|ao)|anuncios?|listings?|accommodations?|imove(?:is|l)|homes?)\b"),
        // "Acomodações (12)"
        format!(r"(?:acomodacoes|anuncios|listings)\s*\(\s*{NUM}\s*\)"),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid count pattern"))
    .collect()
});

/// Host listing count stated in `text`, or `None` when no phrasing matched.
///
/// `None` is "unknown", never zero; a page saying "0 listings" yields
/// `Some(0)`.
pub fn parse_listing_count(text: &str) -> Option<u32> {
    let folded = ascii_fold(text).to_lowercase();

    COUNT_PATTERNS.iter().find_map(|pattern| {
        let captured = pattern.captures(&folded)?.get(1)?.as_str();
        let digits: String = captured.chars().filter(char::is_ascii_digit).collect();
        Some(digits.parse::<u32>().ok())
    })?
}
