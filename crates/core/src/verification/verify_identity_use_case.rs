use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::embedder::domain::face_embedder::FaceEmbedder;
use crate::embedder::domain::frame_source::FrameSource;
use crate::error::{VerificationError, VerificationResult};
use crate::scoring::domain::similarity::{best_of_references, decide, Metric};
use crate::shared::constants::DEFAULT_FRAME_COUNT;
use crate::store::domain::reference_store::ReferenceStore;
use crate::verification::frame_aggregator::{aggregate, AggregationPolicy, FrameObservation, Verdict};
use crate::verification::verification_logger::VerificationLogger;

/// Configuration for one verification attempt.
pub struct VerificationConfig {
    pub metric: Metric,
    pub threshold: f64,
    pub frame_count: usize,
    pub aggregation: AggregationPolicy,
    /// Cooperative cancellation: set from another thread to abort the
    /// remaining frame budget. Frames already collected still produce a
    /// best-effort verdict.
    pub cancelled: Arc<AtomicBool>,
}

impl VerificationConfig {
    pub fn new(metric: Metric, aggregation: AggregationPolicy) -> Self {
        Self {
            metric,
            threshold: metric.default_threshold(),
            frame_count: DEFAULT_FRAME_COUNT,
            aggregation,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }
}

/// Orchestrates one verification attempt: resolve the identity's
/// references, run the capture/embed/score loop, aggregate into a verdict.
///
/// Per-frame faceless frames and capture failures are recorded and
/// skipped; every other failure aborts the attempt with its specific
/// error. A failed verdict is a final answer for the attempt; callers
/// wanting another try start a fresh attempt.
pub struct VerifyIdentityUseCase {
    store: Arc<dyn ReferenceStore>,
    embedder: Box<dyn FaceEmbedder>,
    logger: Box<dyn VerificationLogger>,
}

impl VerifyIdentityUseCase {
    pub fn new(
        store: Arc<dyn ReferenceStore>,
        embedder: Box<dyn FaceEmbedder>,
        logger: Box<dyn VerificationLogger>,
    ) -> Self {
        Self {
            store,
            embedder,
            logger,
        }
    }

    pub fn execute(
        &mut self,
        identity: &str,
        source: &mut dyn FrameSource,
        config: &VerificationConfig,
    ) -> VerificationResult<Verdict> {
        let references = self.store.lookup(identity)?;
        let mut observations = Vec::with_capacity(config.frame_count);

        for sequence in 0..config.frame_count {
            if config.cancelled.load(Ordering::Relaxed) {
                self.logger
                    .info("attempt cancelled; aggregating frames collected so far");
                break;
            }

            let observation = match source.capture() {
                None => FrameObservation::CaptureFailed,
                Some(frame) => {
                    let embedded = self.embedder.embed(&frame).map_err(|err| {
                        VerificationError::Embedder {
                            message: err.to_string(),
                        }
                    })?;
                    match embedded {
                        None => FrameObservation::NoFace,
                        Some(probe) => {
                            let best = best_of_references(&probe, &references, config.metric)?;
                            if decide(best.score, config.metric, config.threshold) {
                                FrameObservation::Match { score: best.score }
                            } else {
                                FrameObservation::Mismatch { score: best.score }
                            }
                        }
                    }
                }
            };

            self.logger.frame(sequence, &observation);
            let matched_frame = matches!(observation, FrameObservation::Match { .. });
            observations.push(observation);

            // One matching frame settles a single-best attempt.
            if matched_frame && config.aggregation == AggregationPolicy::SingleBestFrame {
                break;
            }
        }

        let verdict = aggregate(identity, &observations, config.aggregation, config.metric);
        self.logger.summary(&verdict);
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::embedding::Embedding;
    use crate::shared::frame::Frame;
    use crate::store::infrastructure::in_memory_store::InMemoryReferenceStore;
    use crate::verification::frame_aggregator::RejectReason;
    use crate::verification::verification_logger::NullVerificationLogger;
    use approx::assert_relative_eq;

    // --- Stubs ---

    /// Yields one scripted outcome per frame: an embedding, a faceless
    /// frame (None), or a capture failure (skipped at the source).
    #[derive(Clone)]
    enum Scripted {
        Face(Vec<f32>),
        NoFace,
        CaptureFail,
    }

    struct ScriptedSource {
        script: Vec<Scripted>,
        next: usize,
    }

    impl FrameSource for ScriptedSource {
        fn capture(&mut self) -> Option<Frame> {
            let step = self.script.get(self.next)?.clone();
            let sequence = self.next;
            self.next += 1;
            match step {
                // The stub embedder reads the script by sequence number,
                // so the frame payload itself is a placeholder.
                Scripted::Face(_) | Scripted::NoFace => {
                    Some(Frame::new(vec![0u8; 3], 1, 1, sequence))
                }
                Scripted::CaptureFail => None,
            }
        }
    }

    struct ScriptedEmbedder {
        script: Vec<Scripted>,
    }

    impl FaceEmbedder for ScriptedEmbedder {
        fn embed(
            &mut self,
            frame: &Frame,
        ) -> Result<Option<Embedding>, Box<dyn std::error::Error>> {
            match self.script.get(frame.sequence()) {
                Some(Scripted::Face(components)) => {
                    Ok(Some(Embedding::new(components.clone())))
                }
                Some(Scripted::NoFace) => Ok(None),
                _ => Ok(None),
            }
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    struct FailingEmbedder;

    impl FaceEmbedder for FailingEmbedder {
        fn embed(
            &mut self,
            _frame: &Frame,
        ) -> Result<Option<Embedding>, Box<dyn std::error::Error>> {
            Err("inference session died".into())
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    // --- Helpers ---

    fn store_with_alice(references: &[&[f32]]) -> Arc<InMemoryReferenceStore> {
        let store = Arc::new(InMemoryReferenceStore::new());
        for reference in references {
            store
                .enroll("alice", Embedding::new(reference.to_vec()))
                .unwrap();
        }
        store
    }

    fn use_case(
        store: Arc<InMemoryReferenceStore>,
        script: Vec<Scripted>,
    ) -> (VerifyIdentityUseCase, ScriptedSource) {
        let source = ScriptedSource {
            script: script.clone(),
            next: 0,
        };
        let uc = VerifyIdentityUseCase::new(
            store,
            Box::new(ScriptedEmbedder { script }),
            Box::new(NullVerificationLogger),
        );
        (uc, source)
    }

    fn cosine_config(aggregation: AggregationPolicy) -> VerificationConfig {
        VerificationConfig::new(Metric::Cosine, aggregation).with_threshold(0.9)
    }

    // --- Tests ---

    #[test]
    fn test_unknown_identity_fails_before_capturing() {
        let store = Arc::new(InMemoryReferenceStore::new());
        let (mut uc, mut source) = use_case(store, vec![Scripted::Face(vec![1.0, 0.0, 0.0])]);
        let err = uc
            .execute("alice", &mut source, &cosine_config(AggregationPolicy::AllFramesMatch))
            .unwrap_err();
        assert!(matches!(err, VerificationError::UnknownIdentity { .. }));
    }

    #[test]
    fn test_end_to_end_identical_probe_matches_with_perfect_score() {
        // Enroll a unit vector, verify with an identical probe: score 1.0.
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let (mut uc, mut source) = use_case(
            store,
            vec![Scripted::Face(vec![1.0, 0.0, 0.0]); 3],
        );

        let verdict = uc
            .execute("alice", &mut source, &cosine_config(AggregationPolicy::AllFramesMatch))
            .unwrap();
        assert!(verdict.matched);
        assert_relative_eq!(verdict.best_score.unwrap(), 1.0, epsilon = 1e-9);
        assert_eq!(verdict.stats.matched, 3);
    }

    #[test]
    fn test_faceless_frames_skipped_not_fatal() {
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let (mut uc, mut source) = use_case(
            store,
            vec![
                Scripted::Face(vec![1.0, 0.0, 0.0]),
                Scripted::NoFace,
                Scripted::Face(vec![1.0, 0.0, 0.0]),
            ],
        );

        let verdict = uc
            .execute("alice", &mut source, &cosine_config(AggregationPolicy::AllFramesMatch))
            .unwrap();
        assert!(verdict.matched);
        assert_eq!(verdict.stats.faces_detected, 2);
    }

    #[test]
    fn test_all_faceless_attempt_rejects_with_no_face() {
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let (mut uc, mut source) = use_case(store, vec![Scripted::NoFace; 3]);

        let verdict = uc
            .execute("alice", &mut source, &cosine_config(AggregationPolicy::AllFramesMatch))
            .unwrap();
        assert!(!verdict.matched);
        assert_eq!(verdict.reason, Some(RejectReason::NoFaceDetected));
    }

    #[test]
    fn test_capture_failures_absorbed_into_diagnostics() {
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let (mut uc, mut source) = use_case(
            store,
            vec![
                Scripted::CaptureFail,
                Scripted::Face(vec![1.0, 0.0, 0.0]),
                Scripted::Face(vec![1.0, 0.0, 0.0]),
            ],
        );

        let verdict = uc
            .execute("alice", &mut source, &cosine_config(AggregationPolicy::AllFramesMatch))
            .unwrap();
        assert!(verdict.matched);
        assert_eq!(verdict.stats.capture_failures, 1);
    }

    #[test]
    fn test_best_of_references_uses_nearest_enrollment() {
        // Probe is the second reference exactly; best score must be 1.0
        // regardless of enrollment order.
        let store = store_with_alice(&[&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]]);
        let (mut uc, mut source) = use_case(store, vec![Scripted::Face(vec![0.0, 1.0, 0.0])]);

        let config = cosine_config(AggregationPolicy::SingleBestFrame).with_frame_count(1);
        let verdict = uc.execute("alice", &mut source, &config).unwrap();
        assert!(verdict.matched);
        assert_relative_eq!(verdict.best_score.unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_best_short_circuits_after_match() {
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let (mut uc, mut source) = use_case(
            store,
            vec![
                Scripted::Face(vec![1.0, 0.0, 0.0]),
                Scripted::Face(vec![1.0, 0.0, 0.0]),
                Scripted::Face(vec![1.0, 0.0, 0.0]),
            ],
        );

        let verdict = uc
            .execute("alice", &mut source, &cosine_config(AggregationPolicy::SingleBestFrame))
            .unwrap();
        assert!(verdict.matched);
        // Stopped at the first match; remaining frames never captured.
        assert_eq!(verdict.stats.attempted, 1);
        assert_eq!(source.next, 1);
    }

    #[test]
    fn test_single_best_only_last_frame_matches() {
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let (mut uc, mut source) = use_case(
            store,
            vec![
                Scripted::Face(vec![0.0, 1.0, 0.0]),
                Scripted::Face(vec![0.0, 0.0, 1.0]),
                Scripted::Face(vec![1.0, 0.0, 0.0]),
            ],
        );

        let verdict = uc
            .execute("alice", &mut source, &cosine_config(AggregationPolicy::SingleBestFrame))
            .unwrap();
        assert!(verdict.matched);
    }

    #[test]
    fn test_euclidean_metric_with_tolerance() {
        let store = store_with_alice(&[&[0.0, 0.0, 0.0]]);
        let (mut uc, mut source) = use_case(store, vec![Scripted::Face(vec![0.3, 0.0, 0.0])]);

        let config = VerificationConfig::new(Metric::Euclidean, AggregationPolicy::AllFramesMatch)
            .with_threshold(0.6)
            .with_frame_count(1);
        let verdict = uc.execute("alice", &mut source, &config).unwrap();
        assert!(verdict.matched);
        // Components are f32, so the distance only approximates 0.3.
        assert_relative_eq!(verdict.best_score.unwrap(), 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_embedder_failure_aborts_attempt() {
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let mut uc = VerifyIdentityUseCase::new(
            store,
            Box::new(FailingEmbedder),
            Box::new(NullVerificationLogger),
        );
        let mut source = ScriptedSource {
            script: vec![Scripted::Face(vec![1.0, 0.0, 0.0])],
            next: 0,
        };

        let err = uc
            .execute("alice", &mut source, &cosine_config(AggregationPolicy::AllFramesMatch))
            .unwrap_err();
        assert!(matches!(err, VerificationError::Embedder { .. }));
    }

    #[test]
    fn test_dimension_mismatch_surfaces_loudly() {
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        // Probe has 2 components against 3-component references.
        let (mut uc, mut source) = use_case(store, vec![Scripted::Face(vec![1.0, 0.0])]);

        let err = uc
            .execute("alice", &mut source, &cosine_config(AggregationPolicy::AllFramesMatch))
            .unwrap_err();
        assert!(matches!(err, VerificationError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_cancellation_mid_attempt_yields_best_effort_verdict() {
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let cancelled = Arc::new(AtomicBool::new(false));

        // A source that trips the cancel flag after the first capture.
        struct CancellingSource {
            inner: ScriptedSource,
            cancelled: Arc<AtomicBool>,
        }
        impl FrameSource for CancellingSource {
            fn capture(&mut self) -> Option<Frame> {
                let frame = self.inner.capture();
                self.cancelled.store(true, Ordering::Relaxed);
                frame
            }
        }

        let script = vec![Scripted::Face(vec![1.0, 0.0, 0.0]); 5];
        let mut uc = VerifyIdentityUseCase::new(
            store,
            Box::new(ScriptedEmbedder {
                script: script.clone(),
            }),
            Box::new(NullVerificationLogger),
        );
        let mut source = CancellingSource {
            inner: ScriptedSource { script, next: 0 },
            cancelled: cancelled.clone(),
        };

        let config = VerificationConfig::new(Metric::Cosine, AggregationPolicy::AllFramesMatch)
            .with_threshold(0.9)
            .with_frame_count(5)
            .with_cancel_flag(cancelled);
        let verdict = uc.execute("alice", &mut source, &config).unwrap();

        // One frame collected before the flag tripped; still a verdict.
        assert!(verdict.matched);
        assert_eq!(verdict.stats.attempted, 1);
    }

    #[test]
    fn test_cancellation_before_any_frame_is_no_face_reject() {
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let (mut uc, mut source) =
            use_case(store, vec![Scripted::Face(vec![1.0, 0.0, 0.0]); 3]);

        let cancelled = Arc::new(AtomicBool::new(true));
        let config = cosine_config(AggregationPolicy::AllFramesMatch).with_cancel_flag(cancelled);
        let verdict = uc.execute("alice", &mut source, &config).unwrap();
        assert!(!verdict.matched);
        assert_eq!(verdict.reason, Some(RejectReason::NoFaceDetected));
        assert_eq!(verdict.stats.attempted, 0);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        // Orthogonal probe: cosine is exactly 0.0, and a threshold of 0.0
        // must still accept (inclusive comparison).
        let store = store_with_alice(&[&[1.0, 0.0, 0.0]]);
        let (mut uc, mut source) = use_case(store, vec![Scripted::Face(vec![0.0, 1.0, 0.0])]);

        let config = VerificationConfig::new(Metric::Cosine, AggregationPolicy::AllFramesMatch)
            .with_threshold(0.0)
            .with_frame_count(1);
        let verdict = uc.execute("alice", &mut source, &config).unwrap();
        assert!(verdict.matched);

        // Euclidean: distance exactly at the tolerance also accepts.
        let store = store_with_alice(&[&[0.0, 0.0, 0.0]]);
        let (mut uc, mut source) = use_case(store, vec![Scripted::Face(vec![0.5, 0.0, 0.0])]);
        let config = VerificationConfig::new(Metric::Euclidean, AggregationPolicy::AllFramesMatch)
            .with_threshold(0.5)
            .with_frame_count(1);
        let verdict = uc.execute("alice", &mut source, &config).unwrap();
        assert!(verdict.matched);
    }
}
