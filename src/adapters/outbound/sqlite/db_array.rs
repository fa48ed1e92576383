//! Text encoding for string sets: `|a||b|`, elements sorted.
//!
//! `LIKE '%|a|%'` matches an element exactly, which is what the aggregate
//! views and ad-hoc queries rely on.

use std::collections::BTreeSet;
use tracing::warn;

const DELIMITER: char = '|';

pub fn encode<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let mut elements: Vec<String> = Vec::new();
    for item in items {
        let element = if item.contains(DELIMITER) {
            warn!(element = %item, "stripping delimiter from db array element");
            item.replace(DELIMITER, "")
        } else {
            item.clone()
        };
        if !element.is_empty() {
            elements.push(element);
        }
    }
    elements.sort();
    elements.dedup();
    elements
        .iter()
        .map(|e| format!("{}{}{}", DELIMITER, e, DELIMITER))
        .collect()
}

pub fn decode(encoded: &str) -> BTreeSet<String> {
    encoded
        .split(DELIMITER)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}
