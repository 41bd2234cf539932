//! TF-IDF + proximity + tag-weight + authority ranker.

mod normalize;

pub use normalize::{normalize, NormalizationMethod};

use crate::extract::{default_tag_weights, tag_weight};
use crate::storage::Storage;
use crate::url::base_url;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct RankerWeights {
    pub idf: f64,
    pub proximity: f64,
    pub weights: f64,
    pub authority: f64,
}

impl Default for RankerWeights {
    fn default() -> Self {
        Self {
            idf: 0.8,
            proximity: 0.5,
            weights: 0.3,
            authority: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct WordFrequency {
    word: String,
    frequency: u64,
    location: u64,
    tag: String,
}

#[derive(Debug, Clone)]
struct Candidate {
    url: String,
    word_frequencies: Vec<WordFrequency>,
}

/// Tokenizes a raw query string into query words: lowercase, strip
/// non-alphanumeric, split on whitespace.
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Ranks the corpus against `query`, returning the top `k` results plus the
/// total candidate count (after the pinning re-insert).
pub fn rank(
    storage: &impl Storage,
    query: &str,
    weights: RankerWeights,
    method: NormalizationMethod,
    k: usize,
) -> crate::Result<(Vec<SearchResult>, usize)> {
    let words = tokenize_query(query);
    if words.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let mut candidates: HashMap<String, Candidate> = HashMap::new();
    for word in &words {
        let rows = storage.get_document_index_for_word(word)?;
        for row in rows {
            let candidate = candidates.entry(row.document_url.clone()).or_insert_with(|| Candidate {
                url: row.document_url.clone(),
                word_frequencies: Vec::new(),
            });
            if candidate.word_frequencies.iter().any(|wf| wf.word == *word) {
                continue;
            }
            candidate.word_frequencies.push(WordFrequency {
                word: word.clone(),
                frequency: row.frequency,
                location: row.location,
                tag: row.tag,
            });
        }
    }

    let total_candidate_count = candidates.len();
    if total_candidate_count == 0 {
        return Ok((Vec::new(), 0));
    }

    let n = candidates.len() as f64;
    let mut df: HashMap<&str, u64> = HashMap::new();
    for word in &words {
        let count = candidates
            .values()
            .filter(|c| c.word_frequencies.iter().any(|wf| wf.word == *word))
            .count() as u64;
        df.insert(word.as_str(), count);
    }

    let mut ordered: Vec<Candidate> = candidates.into_values().collect();
    ordered.sort_by(|a, b| a.url.cmp(&b.url));

    let idf_of = |c: &Candidate| -> f64 {
        c.word_frequencies
            .iter()
            .filter(|wf| df.get(wf.word.as_str()).copied().unwrap_or(0) > 0)
            .map(|wf| {
                let d = df[wf.word.as_str()] as f64;
                wf.frequency as f64 * (n / d).log10()
            })
            .sum()
    };

    let pinned_idx = ordered
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let af = a.word_frequencies.first().map(|wf| wf.frequency).unwrap_or(0);
            let bf = b.word_frequencies.first().map(|wf| wf.frequency).unwrap_or(0);
            af.cmp(&bf)
        })
        .map(|(i, _)| i);

    let pinned = pinned_idx.map(|i| ordered.remove(i));

    let idf_list: Vec<f64> = ordered.iter().map(idf_of).collect();

    let authority_list: Vec<f64> = ordered
        .iter()
        .map(|c| {
            base_url(&c.url)
                .ok()
                .and_then(|b| storage.get_domain_authority(&b).ok())
                .unwrap_or(0.0)
        })
        .collect();

    let tag_weights = default_tag_weights();
    let tag_weight_list: Vec<f64> = ordered
        .iter()
        .map(|c| {
            if c.word_frequencies.is_empty() {
                1.0
            } else {
                c.word_frequencies
                    .iter()
                    .map(|wf| tag_weight(&tag_weights, &wf.tag))
                    .sum::<f64>()
                    / c.word_frequencies.len() as f64
            }
        })
        .collect();

    let proximity_list: Vec<f64> = ordered
        .iter()
        .map(|c| {
            if c.word_frequencies.len() < 2 {
                1.0
            } else {
                let mut min_distance = u64::MAX;
                for i in 0..c.word_frequencies.len() {
                    for j in (i + 1)..c.word_frequencies.len() {
                        let d = c.word_frequencies[i]
                            .location
                            .abs_diff(c.word_frequencies[j].location);
                        min_distance = min_distance.min(d);
                    }
                }
                1.0 / (1.0 + min_distance as f64)
            }
        })
        .collect();

    let idf_norm = normalize(&idf_list, method);
    let authority_norm = normalize(&authority_list, method);
    let tag_norm = normalize(&tag_weight_list, method);
    let proximity_norm = normalize(&proximity_list, method);

    let mut scored: Vec<(Candidate, f64)> = ordered
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let score = weights.idf * idf_norm.get(i).copied().unwrap_or(0.0)
                + weights.authority * authority_norm.get(i).copied().unwrap_or(0.0)
                + weights.weights * tag_norm.get(i).copied().unwrap_or(0.0)
                + weights.proximity * proximity_norm.get(i).copied().unwrap_or(0.0);
            (c, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

    let mut final_order: Vec<(Candidate, f64)> = Vec::with_capacity(total_candidate_count);
    if let Some(pinned) = pinned {
        final_order.push((pinned, f64::INFINITY));
    }
    final_order.extend(scored);

    let results = final_order
        .into_iter()
        .take(k)
        .map(|(c, score)| {
            let page = storage.get_page(&c.url).ok().flatten();
            SearchResult {
                url: c.url,
                title: page.as_ref().and_then(|p| p.title.clone()),
                description: page.as_ref().and_then(|p| p.description.clone()),
                score: if score.is_infinite() { f64::MAX } else { score },
            }
        })
        .collect();

    Ok((results, total_candidate_count))
}
