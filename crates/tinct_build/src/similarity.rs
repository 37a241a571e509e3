//! N-gram similarity used for "did you mean" suggestions.

use std::collections::HashMap;

/// Names scoring above this are offered as suggestions.
pub const SUGGESTION_THRESHOLD: f64 = 0.8;

fn ngrams(s: &str) -> HashMap<&str, usize> {
    let bounds: Vec<usize> = s
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .collect();
    let mut grams = HashMap::new();
    for n in 1..=3 {
        for w in bounds.windows(n + 1) {
            *grams.entry(&s[w[0]..w[n]]).or_insert(0) += 1;
        }
    }
    grams
}

/// Cosine similarity of the 1-, 2- and 3-gram count vectors of `a` and `b`.
///
/// Case-sensitive. Identical strings score `1.0`; strings sharing no
/// characters score `0.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    let ga = ngrams(a);
    let gb = ngrams(b);

    let dot: usize = ga
        .iter()
        .filter_map(|(g, ca)| gb.get(g).map(|cb| ca * cb))
        .sum();
    let norm = |g: &HashMap<&str, usize>| (g.values().map(|c| c * c).sum::<usize>() as f64).sqrt();
    dot as f64 / (norm(&ga) * norm(&gb))
}

/// Every candidate scoring above [`SUGGESTION_THRESHOLD`] against `query`,
/// best first.
pub fn suggestions<I, S>(query: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut scored: Vec<(f64, String)> = candidates
        .into_iter()
        .map(Into::into)
        .filter(|c| c != query)
        .map(|c| (similarity(query, &c), c))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.dedup_by(|a, b| a.1 == b.1);
    scored.into_iter().map(|(_, name)| name).collect()
}
