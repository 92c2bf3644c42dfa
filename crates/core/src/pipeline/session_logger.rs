use std::collections::HashMap;
use std::time::Instant;

use crate::quality::domain::face_record::Verdict;
use crate::session::domain::event_sink::EventSink;
use crate::session::domain::state_machine::SessionEvent;

/// Observer for the detection process.
///
/// Receives the session events the detector produces (it has no bus) plus
/// capture attempts, stage timings and gate verdicts.
pub trait SessionLogger: EventSink + Send {
    /// A frame was scanned while capturing.
    fn attempt(&mut self, faces_found: usize, needed: usize);

    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn verdict(&mut self, verdict: &Verdict);

    /// End-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. For tests and callers with their own reporting.
pub struct NullSessionLogger;

impl EventSink for NullSessionLogger {
    fn emit(&mut self, _event: &SessionEvent) {}
}

impl SessionLogger for NullSessionLogger {
    fn attempt(&mut self, _faces_found: usize, _needed: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn verdict(&mut self, _verdict: &Verdict) {}
}

/// Logs events through the `log` facade and keeps counters for a summary
/// at shutdown.
pub struct LogSessionLogger {
    start_time: Instant,
    frames_scanned: usize,
    batches_found: usize,
    accepted: usize,
    rejected: usize,
    sessions: usize,
    timings: HashMap<String, Vec<f64>>,
}

impl LogSessionLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            frames_scanned: 0,
            batches_found: 0,
            accepted: 0,
            rejected: 0,
            sessions: 0,
            timings: HashMap::new(),
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Returns the formatted summary, or `None` if nothing happened.
    pub fn summary_string(&self) -> Option<String> {
        if self.sessions == 0 && self.frames_scanned == 0 {
            return None;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![
            format!("Capture summary ({elapsed:.1}s):"),
            format!("  sessions      : {}", self.sessions),
            format!("  frames scanned: {}", self.frames_scanned),
            format!(
                "  batches       : {} found, {} accepted, {} rejected",
                self.batches_found, self.accepted, self.rejected
            ),
        ];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let avg_ms = durations.iter().sum::<f64>() / durations.len() as f64;
            lines.push(format!("  {stage:14}: avg {avg_ms:6.1}ms over {}", durations.len()));
        }

        Some(lines.join("\n"))
    }
}

impl Default for LogSessionLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogSessionLogger {
    fn emit(&mut self, event: &SessionEvent) {
        if matches!(event, SessionEvent::SessionStarted { .. }) {
            self.sessions += 1;
        }
        log::info!("Session event: {event:?}");
    }
}

impl SessionLogger for LogSessionLogger {
    fn attempt(&mut self, faces_found: usize, needed: usize) {
        self.frames_scanned += 1;
        if faces_found >= needed {
            self.batches_found += 1;
        } else {
            log::debug!("Found {faces_found} of {needed} faces");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn verdict(&mut self, verdict: &Verdict) {
        if verdict.accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullSessionLogger;
        logger.emit(&SessionEvent::SessionReset);
        logger.attempt(1, 2);
        logger.timing("detect", 5.0);
        logger.verdict(&Verdict::default());
        logger.summary();
    }

    #[test]
    fn test_counts_verdicts() {
        let mut logger = LogSessionLogger::new();
        logger.verdict(&Verdict {
            accepted: false,
            rejected_indices: vec![1],
        });
        logger.verdict(&Verdict {
            accepted: true,
            rejected_indices: Vec::new(),
        });
        assert_eq!((logger.accepted(), logger.rejected()), (1, 1));
    }

    #[test]
    fn test_summary_reports_counters_and_timings() {
        let mut logger = LogSessionLogger::new();
        logger.emit(&SessionEvent::SessionStarted {
            session_id: 1,
            num_players: 2,
        });
        logger.attempt(1, 2);
        logger.attempt(2, 2);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("sessions      : 1"));
        assert!(summary.contains("frames scanned: 2"));
        assert!(summary.contains("1 found"));
        assert!(summary.contains("avg   25.0ms over 2"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogSessionLogger::new().summary_string().is_none());
    }
}
