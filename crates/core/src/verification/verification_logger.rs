use std::time::Instant;

use crate::verification::frame_aggregator::{FrameObservation, Verdict};

/// Cross-cutting observer for verification attempts.
///
/// Decouples the orchestrator from specific output mechanisms (log crate,
/// GUI signals, audit sinks) so callers can watch an attempt unfold
/// without changing the orchestration code. Scores logged here are for
/// diagnostics only; the verdict is the sole decision output.
pub trait VerificationLogger: Send {
    /// Report the outcome of one captured frame.
    fn frame(&mut self, sequence: usize, observation: &FrameObservation);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-attempt summary. Default: no-op.
    fn summary(&self, _verdict: &Verdict) {}
}

/// Silent logger that discards all events. Used where the caller has its
/// own reporting, and by tests where logger output is irrelevant.
pub struct NullVerificationLogger;

impl VerificationLogger for NullVerificationLogger {
    fn frame(&mut self, _sequence: usize, _observation: &FrameObservation) {}
    fn info(&mut self, _message: &str) {}
}

/// Logger that reports attempt progress through the `log` facade and
/// tracks timing for the end-of-attempt summary.
pub struct AttemptLogger {
    start_time: Instant,
    frames_seen: usize,
    messages: Vec<String>,
}

impl AttemptLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            frames_seen: 0,
            messages: Vec::new(),
        }
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }
}

impl Default for AttemptLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationLogger for AttemptLogger {
    fn frame(&mut self, sequence: usize, observation: &FrameObservation) {
        self.frames_seen += 1;
        match observation {
            FrameObservation::Match { score } => {
                log::debug!("frame {sequence}: match (score {score:.4})");
            }
            FrameObservation::Mismatch { score } => {
                log::debug!("frame {sequence}: below threshold (score {score:.4})");
            }
            FrameObservation::NoFace => log::debug!("frame {sequence}: no face"),
            FrameObservation::CaptureFailed => {
                log::warn!("frame {sequence}: capture failed");
            }
        }
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self, verdict: &Verdict) {
        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let outcome = if verdict.matched { "MATCH" } else { "REJECT" };
        log::info!(
            "{outcome} for '{}': {}/{} frames matched ({} with a face, {} capture failures) in {elapsed_ms:.0}ms",
            verdict.identity,
            verdict.stats.matched,
            verdict.stats.attempted,
            verdict.stats.faces_detected,
            verdict.stats.capture_failures,
        );
    }
}
