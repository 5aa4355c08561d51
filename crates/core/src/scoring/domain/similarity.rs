use serde::{Deserialize, Serialize};

use crate::error::{VerificationError, VerificationResult};
use crate::shared::constants::{DEFAULT_COSINE_THRESHOLD, DEFAULT_EUCLIDEAN_TOLERANCE};
use crate::shared::embedding::Embedding;

/// Similarity metric for comparing two embeddings.
///
/// Cosine is a similarity (higher is closer, range [-1, 1]); euclidean is a
/// distance (lower is closer). The two are never mixed within one decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
}

impl Metric {
    pub fn default_threshold(self) -> f64 {
        match self {
            Metric::Cosine => DEFAULT_COSINE_THRESHOLD,
            Metric::Euclidean => DEFAULT_EUCLIDEAN_TOLERANCE,
        }
    }

    /// True when `candidate` is a closer match than `incumbent`.
    pub(crate) fn closer(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Metric::Cosine => candidate > incumbent,
            Metric::Euclidean => candidate < incumbent,
        }
    }
}

/// Scalar similarity/distance between two embeddings under `metric`.
pub fn score(a: &Embedding, b: &Embedding, metric: Metric) -> VerificationResult<f64> {
    if a.dimension() != b.dimension() {
        return Err(VerificationError::DimensionMismatch {
            left: a.dimension(),
            right: b.dimension(),
        });
    }

    match metric {
        Metric::Cosine => cosine(a, b),
        Metric::Euclidean => Ok(euclidean(a, b)),
    }
}

/// Accept/reject at `threshold`. Both bounds are inclusive: a cosine score
/// exactly at the threshold matches, as does an exactly-tolerated distance.
pub fn decide(score: f64, metric: Metric, threshold: f64) -> bool {
    match metric {
        Metric::Cosine => score >= threshold,
        Metric::Euclidean => score <= threshold,
    }
}

/// The winning reference for a probe, with the index that won.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BestMatch {
    pub score: f64,
    pub reference_index: usize,
}

/// Scores `probe` against every reference and keeps the best (max cosine,
/// min euclidean). Any one enrollment photo matching is sufficient proof of
/// identity, so this is never an average.
pub fn best_of_references(
    probe: &Embedding,
    references: &[Embedding],
    metric: Metric,
) -> VerificationResult<BestMatch> {
    let mut best: Option<BestMatch> = None;
    for (index, reference) in references.iter().enumerate() {
        let value = score(probe, reference, metric)?;
        let improves = best.map_or(true, |b| metric.closer(value, b.score));
        if improves {
            best = Some(BestMatch {
                score: value,
                reference_index: index,
            });
        }
    }
    best.ok_or_else(|| VerificationError::InvalidEmbedding {
        message: "empty reference set".to_string(),
    })
}

fn cosine(a: &Embedding, b: &Embedding) -> VerificationResult<f64> {
    let norm_a = a.l2_norm();
    let norm_b = b.l2_norm();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(VerificationError::InvalidEmbedding {
            message: "zero-norm vector under cosine metric".to_string(),
        });
    }

    let dot: f64 = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    Ok(dot / (norm_a * norm_b))
}

fn euclidean(a: &Embedding, b: &Embedding) -> f64 {
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
