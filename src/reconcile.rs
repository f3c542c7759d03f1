use crate::backend::BackendError;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One recognized face, as reported by the recognition service.
///
/// `duplicate` means the identity was already marked present earlier today;
/// it only affects presentation, never reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub name: String,
    pub department: String,
    pub confidence: f32,
    #[serde(default)]
    pub duplicate: bool,
}

/// The single authoritative detection state shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionView {
    Empty,
    Detected {
        records: Vec<DetectionRecord>,
        observed_at: Instant,
    },
}

/// Grace window during which transient empty results do not clear a prior
/// non-empty detection.
#[derive(Debug, Clone)]
pub struct HoldState {
    last_nonempty_at: Option<Instant>,
    hold_duration: Duration,
}

impl HoldState {
    pub fn new(hold_duration: Duration) -> Self {
        Self {
            last_nonempty_at: None,
            hold_duration,
        }
    }

    /// True while a previous non-empty result is still within its grace
    /// window and must keep suppressing transitions to `Empty`.
    pub fn is_holding(&self, now: Instant) -> bool {
        match self.last_nonempty_at {
            Some(at) => now.duration_since(at) < self.hold_duration,
            None => false,
        }
    }

    fn record_nonempty(&mut self, now: Instant) {
        self.last_nonempty_at = Some(now);
    }
}

/// Result of one submission round trip, tagged with its sequence number by
/// the sampler at dispatch time.
#[derive(Debug)]
pub enum Outcome {
    Ok(Vec<DetectionRecord>),
    Failed(BackendError),
}

/// What `apply` did with a response; used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Detected,
    EmptyHeld,
    EmptyCleared,
    FailureRecorded,
    Stale,
}

/// Consumes submission outcomes as they arrive, in any order, and maintains
/// the one `DetectionView`.
///
/// Ticks fire independently of prior round trips, so any number of
/// submissions race each other; a response is only allowed to update state
/// if its sequence number is newer than the last one applied. Without this
/// check a slow response for an old frame could overwrite a newer frame's
/// result.
pub struct ReconciliationEngine {
    last_applied_seq: Option<u64>,
    view: DetectionView,
    hold: HoldState,
}

impl ReconciliationEngine {
    pub fn new(hold_duration: Duration) -> Self {
        Self {
            last_applied_seq: None,
            view: DetectionView::Empty,
            hold: HoldState::new(hold_duration),
        }
    }

    pub fn last_applied_seq(&self) -> Option<u64> {
        self.last_applied_seq
    }

    pub fn apply(&mut self, seq: u64, outcome: Outcome, now: Instant) -> Applied {
        if let Some(last) = self.last_applied_seq {
            if seq <= last {
                return Applied::Stale;
            }
        }
        self.last_applied_seq = Some(seq);

        match outcome {
            Outcome::Ok(records) if !records.is_empty() => {
                self.hold.record_nonempty(now);
                self.view = DetectionView::Detected {
                    records,
                    observed_at: now,
                };
                Applied::Detected
            }
            Outcome::Ok(_) => {
                if self.hold.is_holding(now) {
                    Applied::EmptyHeld
                } else {
                    self.view = DetectionView::Empty;
                    Applied::EmptyCleared
                }
            }
            // Sequence bookkeeping still advances so that this failure's
            // successor is not later mistaken for a stale response, but the
            // view and hold state stay untouched.
            Outcome::Failed(_) => Applied::FailureRecorded,
        }
    }

    /// The view as it must be rendered at `now`.
    ///
    /// The hold window is evaluated at read time as well: a held detection
    /// lapses into `Empty` exactly when the window expires, even if no
    /// further response ever arrives.
    pub fn current_view(&self, now: Instant) -> DetectionView {
        match &self.view {
            DetectionView::Empty => DetectionView::Empty,
            detected if self.hold.is_holding(now) => detected.clone(),
            _ => DetectionView::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_secs(20);

    fn record(name: &str, confidence: f32) -> DetectionRecord {
        DetectionRecord {
            name: name.to_string(),
            department: "CSE".to_string(),
            confidence,
            duplicate: false,
        }
    }

    fn detected_names(view: &DetectionView) -> Vec<String> {
        match view {
            DetectionView::Empty => vec![],
            DetectionView::Detected { records, .. } => {
                records.iter().map(|r| r.name.clone()).collect()
            }
        }
    }

    #[test]
    fn nonempty_response_updates_view_and_hold() {
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();

        let applied = engine.apply(1, Outcome::Ok(vec![record("Alice", 91.2)]), t0);

        assert_eq!(applied, Applied::Detected);
        assert_eq!(detected_names(&engine.current_view(t0)), vec!["Alice"]);
        assert_eq!(engine.last_applied_seq(), Some(1));
    }

    #[test]
    fn late_response_for_older_frame_is_discarded() {
        // The core race: seq 1 (frame A) and seq 2 (frame B) in flight at once.
        // B's answer arrives first and is applied; A's slow answer must not
        // overwrite it.
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();

        engine.apply(2, Outcome::Ok(vec![record("Alice", 91.2)]), t0);
        let applied = engine.apply(
            1,
            Outcome::Ok(vec![record("Bob", 80.0)]),
            t0 + Duration::from_millis(200),
        );

        assert_eq!(applied, Applied::Stale);
        assert_eq!(engine.last_applied_seq(), Some(2));
        assert_eq!(
            detected_names(&engine.current_view(t0 + Duration::from_millis(200))),
            vec!["Alice"]
        );
    }

    #[test]
    fn stale_response_mutates_nothing_regardless_of_content() {
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();

        engine.apply(5, Outcome::Ok(vec![]), t0);
        assert_eq!(engine.current_view(t0), DetectionView::Empty);

        // Same sequence, then an older one; neither may resurrect a view or
        // start a hold window.
        assert_eq!(
            engine.apply(5, Outcome::Ok(vec![record("Eve", 99.0)]), t0),
            Applied::Stale
        );
        assert_eq!(
            engine.apply(3, Outcome::Ok(vec![record("Eve", 99.0)]), t0),
            Applied::Stale
        );
        assert_eq!(engine.current_view(t0), DetectionView::Empty);
        assert_eq!(engine.last_applied_seq(), Some(5));
    }

    #[test]
    fn arrival_order_does_not_change_the_surviving_view() {
        let t0 = Instant::now();
        let newer = || Outcome::Ok(vec![record("Alice", 91.2)]);
        let older = || Outcome::Ok(vec![record("Bob", 80.0)]);

        let mut in_order = ReconciliationEngine::new(HOLD);
        in_order.apply(1, older(), t0);
        in_order.apply(2, newer(), t0 + Duration::from_millis(100));

        let mut reversed = ReconciliationEngine::new(HOLD);
        reversed.apply(2, newer(), t0 + Duration::from_millis(100));
        reversed.apply(1, older(), t0 + Duration::from_millis(500));

        let at = t0 + Duration::from_secs(1);
        assert_eq!(
            detected_names(&in_order.current_view(at)),
            detected_names(&reversed.current_view(at))
        );
        assert_eq!(in_order.last_applied_seq(), reversed.last_applied_seq());
    }

    #[test]
    fn empty_response_within_hold_window_keeps_the_view() {
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();

        engine.apply(1, Outcome::Ok(vec![record("Alice", 91.2)]), t0);
        let applied = engine.apply(2, Outcome::Ok(vec![]), t0 + Duration::from_secs(5));

        assert_eq!(applied, Applied::EmptyHeld);
        assert_eq!(
            detected_names(&engine.current_view(t0 + Duration::from_secs(5))),
            vec!["Alice"]
        );
    }

    #[test]
    fn empty_response_after_hold_window_clears_the_view() {
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();

        engine.apply(1, Outcome::Ok(vec![record("Alice", 91.2)]), t0);
        let applied = engine.apply(2, Outcome::Ok(vec![]), t0 + Duration::from_secs(20));

        assert_eq!(applied, Applied::EmptyCleared);
        assert_eq!(
            engine.current_view(t0 + Duration::from_secs(20)),
            DetectionView::Empty
        );
    }

    #[test]
    fn view_lapses_at_exactly_hold_expiry_without_further_responses() {
        // Last non-empty at t=10s, empties at 15/20/25s: the detection must
        // survive through 29.999s and read as Empty from 30.000s on, with no
        // response arriving at the flip instant.
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();
        let t10 = t0 + Duration::from_secs(10);

        engine.apply(1, Outcome::Ok(vec![record("Alice", 91.2)]), t10);
        engine.apply(2, Outcome::Ok(vec![]), t0 + Duration::from_secs(15));
        engine.apply(3, Outcome::Ok(vec![]), t0 + Duration::from_secs(20));
        engine.apply(4, Outcome::Ok(vec![]), t0 + Duration::from_secs(25));

        let just_before = t0 + Duration::from_secs(30) - Duration::from_millis(1);
        assert_eq!(detected_names(&engine.current_view(just_before)), vec!["Alice"]);

        let at_expiry = t0 + Duration::from_secs(30);
        assert_eq!(engine.current_view(at_expiry), DetectionView::Empty);
    }

    #[test]
    fn failure_advances_sequence_but_leaves_state_alone() {
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();

        engine.apply(1, Outcome::Ok(vec![record("Alice", 91.2)]), t0);
        let applied = engine.apply(
            2,
            Outcome::Failed(BackendError::InvalidResponse("truncated body".into())),
            t0 + Duration::from_secs(1),
        );

        assert_eq!(applied, Applied::FailureRecorded);
        assert_eq!(engine.last_applied_seq(), Some(2));
        assert_eq!(
            detected_names(&engine.current_view(t0 + Duration::from_secs(1))),
            vec!["Alice"]
        );

        // A genuine result after the failure is not itself rejected.
        let applied = engine.apply(
            3,
            Outcome::Ok(vec![record("Bob", 88.0)]),
            t0 + Duration::from_secs(2),
        );
        assert_eq!(applied, Applied::Detected);
    }

    #[test]
    fn stale_failure_is_discarded_too() {
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();

        engine.apply(4, Outcome::Ok(vec![]), t0);
        let applied = engine.apply(
            2,
            Outcome::Failed(BackendError::InvalidResponse("late".into())),
            t0,
        );

        assert_eq!(applied, Applied::Stale);
        assert_eq!(engine.last_applied_seq(), Some(4));
    }

    #[test]
    fn empty_before_any_detection_reads_empty() {
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();

        assert_eq!(engine.apply(1, Outcome::Ok(vec![]), t0), Applied::EmptyCleared);
        assert_eq!(engine.current_view(t0), DetectionView::Empty);
    }

    #[test]
    fn fresh_detection_restarts_the_hold_window() {
        let mut engine = ReconciliationEngine::new(HOLD);
        let t0 = Instant::now();

        engine.apply(1, Outcome::Ok(vec![record("Alice", 91.2)]), t0);
        engine.apply(
            2,
            Outcome::Ok(vec![record("Bob", 85.0)]),
            t0 + Duration::from_secs(19),
        );

        // Alice's window alone would have lapsed at t0+20s.
        let at = t0 + Duration::from_secs(30);
        assert_eq!(detected_names(&engine.current_view(at)), vec!["Bob"]);
    }
}
