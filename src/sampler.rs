use crate::backend::RecognitionApi;
use crate::camera::FrameSource;
use crate::reconcile::{Applied, Outcome, ReconciliationEngine};
use crate::telemetry::Metrics;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

/// The engine is the single writer of the detection view; completions and
/// readers take this lock for short, non-awaiting critical sections.
pub type SharedEngine = Arc<Mutex<ReconciliationEngine>>;

#[derive(Debug)]
pub enum Tick {
    /// A frame was dispatched under this sequence number. The submission
    /// runs to completion on its own; nothing awaits it.
    Dispatched { seq: u64, submission: JoinHandle<()> },
    /// The frame source was not ready (or failed); no sequence number was
    /// consumed and nothing was sent.
    Skipped,
}

/// Fires capture-and-submit cycles on a fixed cadence, independent of
/// whether earlier round trips have completed. Under a slow backend this
/// overlaps in-flight requests instead of falling behind real time; the
/// engine's staleness check sorts out the races.
pub struct Sampler<F, R> {
    source: Arc<F>,
    recognizer: Arc<R>,
    engine: SharedEngine,
    metrics: Arc<Metrics>,
    sample_interval: Duration,
}

impl<F, R> Sampler<F, R>
where
    F: FrameSource,
    R: RecognitionApi,
{
    pub fn new(
        source: Arc<F>,
        recognizer: Arc<R>,
        engine: SharedEngine,
        metrics: Arc<Metrics>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            source,
            recognizer,
            engine,
            metrics,
            sample_interval,
        }
    }

    pub fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.sample_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Owned by this task; incremented exactly once per dispatched
            // tick, never reused.
            let mut next_seq: u64 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick(&mut next_seq).await;
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Sampler received shutdown signal");
                        break;
                    }
                }
            }
            tracing::info!("Sampler stopped");
        })
    }

    async fn tick(&self, next_seq: &mut u64) -> Tick {
        let frame = match self.source.current_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::trace!("Frame source not ready, skipping tick");
                return Tick::Skipped;
            }
            Err(e) => {
                tracing::warn!("Failed to read frame: {e}");
                return Tick::Skipped;
            }
        };

        *next_seq += 1;
        let seq = *next_seq;
        self.metrics.record_submission();

        let recognizer = self.recognizer.clone();
        let engine = self.engine.clone();
        let metrics = self.metrics.clone();
        let submission = tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match recognizer.recognize(frame).await {
                Ok(records) => Outcome::Ok(records),
                Err(e) => {
                    tracing::error!(seq, "Recognition request failed: {e}");
                    Outcome::Failed(e)
                }
            };
            metrics.record_recognition_duration(started.elapsed().as_millis() as u64);

            let applied = engine.lock().apply(seq, outcome, Instant::now());
            if applied == Applied::Stale {
                tracing::debug!(seq, "Discarded stale recognition response");
            }
            metrics.record_response(applied);
        });

        Tick::Dispatched { seq, submission }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::camera::{CameraError, Frame};
    use crate::reconcile::{DetectionRecord, DetectionView};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    /// Frame source that follows a script of ready/not-ready answers.
    struct ScriptedSource {
        script: Vec<bool>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<bool>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn current_frame(&self) -> Result<Option<Frame>, CameraError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let ready = self.script.get(i).copied().unwrap_or(false);
            Ok(ready.then(|| Frame {
                bytes: Bytes::from_static(b"jpeg"),
                captured_at: Instant::now(),
            }))
        }
    }

    /// Recognizer that answers each call with a scripted (delay, records)
    /// pair, in call order.
    struct ScriptedRecognizer {
        script: Vec<(Duration, Vec<DetectionRecord>)>,
        calls: AtomicUsize,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<(Duration, Vec<DetectionRecord>)>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecognitionApi for ScriptedRecognizer {
        async fn recognize(&self, _frame: Frame) -> Result<Vec<DetectionRecord>, BackendError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, records) = self.script[i].clone();
            sleep(delay).await;
            Ok(records)
        }
    }

    fn record(name: &str) -> DetectionRecord {
        DetectionRecord {
            name: name.to_string(),
            department: "CSE".to_string(),
            confidence: 90.0,
            duplicate: false,
        }
    }

    fn sampler<F: FrameSource, R: RecognitionApi>(
        source: F,
        recognizer: R,
    ) -> (Sampler<F, R>, SharedEngine) {
        let engine: SharedEngine = Arc::new(Mutex::new(ReconciliationEngine::new(
            Duration::from_secs(20),
        )));
        let sampler = Sampler::new(
            Arc::new(source),
            Arc::new(recognizer),
            engine.clone(),
            Arc::new(Metrics::new()),
            Duration::from_millis(1200),
        );
        (sampler, engine)
    }

    #[tokio::test]
    async fn not_ready_tick_is_skipped_without_consuming_a_sequence() {
        let recognizer = ScriptedRecognizer::new(vec![(Duration::ZERO, vec![record("Alice")])]);
        let (sampler, engine) = sampler(ScriptedSource::new(vec![false, true]), recognizer);

        let mut next_seq = 0;
        assert!(matches!(sampler.tick(&mut next_seq).await, Tick::Skipped));
        assert_eq!(next_seq, 0);
        assert_eq!(sampler.recognizer.calls(), 0);

        // The first ready tick gets sequence 1.
        match sampler.tick(&mut next_seq).await {
            Tick::Dispatched { seq, submission } => {
                assert_eq!(seq, 1);
                submission.await.unwrap();
            }
            Tick::Skipped => panic!("expected a dispatch"),
        }
        assert_eq!(engine.lock().last_applied_seq(), Some(1));
    }

    #[tokio::test]
    async fn sequence_numbers_increase_per_dispatched_tick() {
        let recognizer = ScriptedRecognizer::new(vec![
            (Duration::ZERO, vec![]),
            (Duration::ZERO, vec![]),
            (Duration::ZERO, vec![]),
        ]);
        let (sampler, _engine) =
            sampler(ScriptedSource::new(vec![true, false, true, true]), recognizer);

        let mut next_seq = 0;
        let mut seen = Vec::new();
        for _ in 0..4 {
            if let Tick::Dispatched { seq, submission } = sampler.tick(&mut next_seq).await {
                submission.await.unwrap();
                seen.push(seq);
            }
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn slow_response_for_an_old_frame_cannot_overwrite_a_newer_one() {
        // Frame A (seq 1) answers "Bob" slowly; frame B (seq 2) answers
        // "Alice" quickly. Both submissions run concurrently; the final view
        // must show Alice only.
        let recognizer = ScriptedRecognizer::new(vec![
            (Duration::from_millis(50), vec![record("Bob")]),
            (Duration::from_millis(1), vec![record("Alice")]),
        ]);
        let (sampler, engine) = sampler(ScriptedSource::new(vec![true, true]), recognizer);

        let mut next_seq = 0;
        let first = match sampler.tick(&mut next_seq).await {
            Tick::Dispatched { submission, .. } => submission,
            Tick::Skipped => panic!("expected a dispatch"),
        };
        let second = match sampler.tick(&mut next_seq).await {
            Tick::Dispatched { submission, .. } => submission,
            Tick::Skipped => panic!("expected a dispatch"),
        };

        second.await.unwrap();
        first.await.unwrap();

        let view = engine.lock().current_view(Instant::now());
        match view {
            DetectionView::Detected { records, .. } => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].name, "Alice");
            }
            DetectionView::Empty => panic!("expected a detection"),
        }
        assert_eq!(engine.lock().last_applied_seq(), Some(2));
    }
}
