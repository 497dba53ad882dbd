//! The tiered search ranker.
//!
//! A query is answered by strict tier precedence: a query equal to a
//! tagged face name short-circuits everything; otherwise exact keyword
//! containment, then fuzzy keyword similarity, then semantic cosine
//! similarity. Each record is claimed by the first tier that matches it
//! and never appears again.

use std::collections::HashSet;

use serde::Serialize;

use crate::extract::{ExtractError, TextEmbedder};
use crate::faces::{euclidean_distance, KnownFaces};
use crate::records::{IndexRecord, IndexStore};

pub const MATCH_EXACT: &str = "Exact Keyword";
pub const MATCH_FUZZY: &str = "Fuzzy Keyword";
pub const MATCH_SEMANTIC: &str = "Semantic";

/// One ranked result: the matched record plus which tier claimed it and
/// that tier's score, on the tier's own scale.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: IndexRecord,
    pub match_type: String,
    pub score: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub top_k: usize,
    pub fuzzy_threshold: f64,
    pub face_tolerance: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("the index is empty; run `snapscout index` first")]
    IndexNotReady,

    #[error(transparent)]
    Embedding(#[from] ExtractError),
}

pub fn search(
    query: &str,
    store: &IndexStore,
    known_faces: &KnownFaces,
    embedder: &dyn TextEmbedder,
    params: &SearchParams,
) -> Result<Vec<SearchHit>, SearchError> {
    if store.is_empty() {
        return Err(SearchError::IndexNotReady);
    }

    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let needle = query.to_lowercase();

    // A query naming a tagged identity is a face search and nothing else.
    if let Some((name, reference)) = known_faces.get(&needle) {
        return Ok(face_matches(store, name, reference, params.face_tolerance));
    }

    let mut claimed: HashSet<&str> = HashSet::new();
    let mut hits = Vec::new();

    // Tier 1: literal containment, store order. All matches are
    // definitionally equal quality.
    for record in store.iter() {
        if record.text.to_lowercase().contains(&needle) {
            claimed.insert(record.file_path.as_str());
            hits.push(SearchHit {
                record: record.clone(),
                match_type: MATCH_EXACT.to_string(),
                score: "100%".to_string(),
            });
        }
    }

    // Tier 2: best-aligned substring similarity, highest first. The sort
    // is stable, so equal scores keep store order.
    let mut fuzzy: Vec<(f64, &IndexRecord)> = store
        .iter()
        .filter(|record| !claimed.contains(record.file_path.as_str()))
        .filter(|record| !record.text.is_empty())
        .filter_map(|record| {
            let score = fuzzy_score(&needle, &record.text.to_lowercase());
            (score >= params.fuzzy_threshold).then_some((score, record))
        })
        .collect();
    fuzzy.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    for (score, record) in fuzzy {
        claimed.insert(record.file_path.as_str());
        hits.push(SearchHit {
            record: record.clone(),
            match_type: MATCH_FUZZY.to_string(),
            score: format!("{}%", score.round() as i64),
        });
    }

    // Tier 3: cosine similarity over what's left, exact top-k. The query
    // is only embedded when something is left to rank.
    let has_candidates = store.iter().any(|record| {
        !claimed.contains(record.file_path.as_str()) && !record.embedding.is_empty()
    });
    if has_candidates {
        let query_embedding = embedder.embed_text(query)?;
        let mut semantic: Vec<(f32, &IndexRecord)> = store
            .iter()
            .filter(|record| !claimed.contains(record.file_path.as_str()))
            .filter(|record| !record.embedding.is_empty())
            .map(|record| (cosine_similarity(&query_embedding, &record.embedding), record))
            .collect();
        semantic.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        semantic.truncate(params.top_k);
        for (score, record) in semantic {
            hits.push(SearchHit {
                record: record.clone(),
                match_type: MATCH_SEMANTIC.to_string(),
                score: format!("{score:.2}"),
            });
        }
    }

    Ok(hits)
}

/// Every record with at least one face within `tolerance` of the reference
/// embedding, in store order. Scores are binary: a face either matches the
/// identity or it does not.
fn face_matches(
    store: &IndexStore,
    name: &str,
    reference: &[f32],
    tolerance: f32,
) -> Vec<SearchHit> {
    let match_type = format!("Face Match: {name}");
    store
        .iter()
        .filter(|record| {
            record
                .face_embeddings
                .iter()
                .any(|embedding| euclidean_distance(embedding, reference) <= tolerance)
        })
        .map(|record| SearchHit {
            record: record.clone(),
            match_type: match_type.clone(),
            score: "High".to_string(),
        })
        .collect()
}

/// Best-aligned substring similarity between `query` and `text`, 0-100.
pub fn fuzzy_score(query: &str, text: &str) -> f64 {
    rapidfuzz::fuzz::partial_ratio(query.chars(), text.chars())
}

fn cosine_similarity(query: &[f32], target: &[f32]) -> f32 {
    // Vectors from a different index generation can have a different
    // dimensionality; they never match.
    if query.len() != target.len() {
        return 0.0;
    }
    let query_norm = l2_norm(query);
    let target_norm = l2_norm(target);
    if query_norm < f32::EPSILON || target_norm < f32::EPSILON {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot / (query_norm * target_norm)
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
