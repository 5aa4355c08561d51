use serde::{Deserialize, Serialize};

use crate::scoring::domain::similarity::Metric;

/// The outcome of one captured frame within a verification attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameObservation {
    /// A face was found and its best-of-references score passed `decide`.
    Match { score: f64 },
    /// A face was found but the score failed the threshold.
    Mismatch { score: f64 },
    /// The embedder found no face in the frame.
    NoFace,
    /// The frame source produced nothing; distinguished from `NoFace` in
    /// diagnostics but treated the same by the policies.
    CaptureFailed,
}

impl FrameObservation {
    pub fn score(&self) -> Option<f64> {
        match self {
            FrameObservation::Match { score } | FrameObservation::Mismatch { score } => {
                Some(*score)
            }
            _ => None,
        }
    }
}

/// How per-frame outcomes fold into one verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// Strict: every face-bearing frame must match, and at least one frame
    /// must bear a face. Faceless frames are skipped, never counted against
    /// the attempt.
    AllFramesMatch,
    /// Lenient: one matching frame anywhere in the burst is enough.
    SingleBestFrame,
}

/// Why a verdict rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// Not a single captured frame bore a face.
    NoFaceDetected,
    /// Faces were seen but the policy's threshold requirement failed.
    ThresholdNotMet,
}

/// Frame-level diagnostics for audit and logging. Callers never use these
/// for the accept/reject decision itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub attempted: usize,
    pub faces_detected: usize,
    pub matched: usize,
    pub capture_failures: usize,
}

/// Final outcome of a verification attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Verdict {
    pub identity: String,
    pub matched: bool,
    /// Best score among face-bearing frames (metric-best: max cosine,
    /// min euclidean). `None` when no face was ever seen.
    pub best_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    pub stats: FrameStats,
}

/// Folds the attempt's observations into a verdict under `policy`.
///
/// An empty observation list (cancelled before any capture, or a zero
/// frame budget) is a `NoFaceDetected` reject, never a pass-by-default.
pub fn aggregate(
    identity: &str,
    observations: &[FrameObservation],
    policy: AggregationPolicy,
    metric: Metric,
) -> Verdict {
    let mut stats = FrameStats {
        attempted: observations.len(),
        ..FrameStats::default()
    };
    let mut best_score: Option<f64> = None;

    for observation in observations {
        match observation {
            FrameObservation::Match { .. } => {
                stats.faces_detected += 1;
                stats.matched += 1;
            }
            FrameObservation::Mismatch { .. } => stats.faces_detected += 1,
            FrameObservation::NoFace => {}
            FrameObservation::CaptureFailed => stats.capture_failures += 1,
        }
        if let Some(score) = observation.score() {
            let improves = best_score.map_or(true, |b| metric.closer(score, b));
            if improves {
                best_score = Some(score);
            }
        }
    }

    let (matched, reason) = if stats.faces_detected == 0 {
        (false, Some(RejectReason::NoFaceDetected))
    } else {
        let matched = match policy {
            AggregationPolicy::AllFramesMatch => stats.matched == stats.faces_detected,
            AggregationPolicy::SingleBestFrame => stats.matched > 0,
        };
        (matched, (!matched).then_some(RejectReason::ThresholdNotMet))
    };

    Verdict {
        identity: identity.to_string(),
        matched,
        best_score,
        reason,
        stats,
    }
}
