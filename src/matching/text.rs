// src/matching/text.rs
// Text similarity: longest-matching-blocks ratio plus a labeled-attribute bonus.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const ATTRIBUTE_BONUS_FLOOR: f64 = 0.5;
const ATTRIBUTE_BONUS_WEIGHT: f64 = 0.2;
const ATTRIBUTE_KEYS: [&str; 4] = ["brand", "model", "color", "size"];

// One `key:value` / `key=value` pattern per attribute key.
static ATTRIBUTE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ATTRIBUTE_KEYS
        .iter()
        .map(|key| {
            Regex::new(&format!(r"(?i)\b{}[:=]\s*([^\s,]+)\b", key))
                .unwrap_or_else(|e| unreachable!("attribute pattern for {key} is invalid: {e}"))
        })
        .collect()
});

/// Similarity of two canonical strings in [0, 1]. An empty side scores 0.
pub fn compare_text(text1: &str, text2: &str) -> f64 {
    if text1.is_empty() || text2.is_empty() {
        return 0.0;
    }

    let similarity = sequence_ratio(text1, text2);
    if similarity <= ATTRIBUTE_BONUS_FLOOR {
        return similarity;
    }

    let mut attempted = 0usize;
    let mut matched = 0usize;
    for pattern in ATTRIBUTE_PATTERNS.iter() {
        if let (Some(v1), Some(v2)) = (attribute_value(pattern, text1), attribute_value(pattern, text2)) {
            attempted += 1;
            if v1.to_lowercase() == v2.to_lowercase() {
                matched += 1;
            }
        }
    }

    if attempted == 0 {
        return similarity;
    }
    let bonus = matched as f64 / attempted as f64 * ATTRIBUTE_BONUS_WEIGHT;
    (similarity + bonus).min(1.0)
}

fn attribute_value<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// `2 * M / (len(a) + len(b))` over characters, where M is the total size of
/// the matching blocks found by recursively taking the longest common
/// substring and recursing on both sides of it.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_characters(&a, &b) as f64 / total as f64
}

fn matched_characters(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = find_longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a`
/// (then in `b`) on ties. Returns (start in a, start in b, length).
fn find_longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // Length of the match ending at a[i-1], b[j] keyed by j.
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_j2len = HashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j.checked_sub(1).and_then(|prev| j2len.get(&prev)).copied().unwrap_or(0) + 1;
                next_j2len.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = next_j2len;
    }
    (best_i, best_j, best_size)
}
