//! Synthetic text injection
//!
//! Turns a submitted line of text into an ordered batch of press/release
//! keystroke events carrying raw UTF-16 code units, submits the batch
//! through an [`InputBackend`], and retries the whole batch when the
//! platform accepts fewer events than expected. The platform only ever
//! reports how many events it took, never which, so a shortfall can only be
//! recovered by resending the complete sequence.

use std::time::Duration;

use tracing::{debug, error, info, warn};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::SendInputBackend;

/// Direction of one synthetic keystroke event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Press,
    Release,
}

/// One synthetic keyboard event carrying a raw UTF-16 code unit
///
/// The code unit bypasses virtual-key and layout mapping entirely, so the
/// replayed text is independent of the active keyboard layout. Surrogate
/// halves travel as two independent units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticKey {
    pub code_unit: u16,
    pub direction: KeyDirection,
}

/// Capability interface over the platform's synthetic-input primitive
///
/// `submit` delivers the full ordered batch in one platform call and
/// returns how many events the platform accepted.
pub trait InputBackend {
    fn submit(&self, batch: &[SyntheticKey]) -> usize;
}

/// Parameters for one text injection
///
/// Ephemeral; lives only for the duration of one [`TextInjector::send_text`]
/// call.
#[derive(Debug, Clone)]
pub struct InjectionRequest {
    pub text: String,
    /// Wait before the first attempt, for callers sequencing after a focus
    /// change
    pub lead_delay: Duration,
    /// Full-batch retries after the first attempt
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl InjectionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lead_delay: Duration::ZERO,
            retry_count: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// What one `send_text` call accomplished
///
/// Callers may log, assert on, or ignore this; injection failure is never
/// raised as an error because the capture surface is long dismissed by the
/// time the outcome is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionOutcome {
    /// 2 x UTF-16 code-unit count
    pub events_expected: usize,
    /// Accepted count reported by the platform on the final attempt
    pub events_accepted: usize,
    pub attempts: u32,
    pub succeeded: bool,
}

/// Build the ordered press/release batch for a line of text
pub fn build_batch(text: &str) -> Vec<SyntheticKey> {
    let mut batch = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        batch.push(SyntheticKey {
            code_unit: unit,
            direction: KeyDirection::Press,
        });
        batch.push(SyntheticKey {
            code_unit: unit,
            direction: KeyDirection::Release,
        });
    }
    batch
}

/// Replays text as synthetic keystrokes with whole-batch retry
pub struct TextInjector<B: InputBackend> {
    backend: B,
}

impl<B: InputBackend> TextInjector<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Inject `request.text` into the currently focused window
    ///
    /// Suspends cooperatively for the lead delay and between attempts.
    /// Returns after the first fully accepted attempt, or after
    /// `retry_count + 1` attempts without one.
    pub async fn send_text(&self, request: &InjectionRequest) -> InjectionOutcome {
        if request.text.is_empty() {
            debug!("empty injection request, nothing to send");
            return InjectionOutcome {
                events_expected: 0,
                events_accepted: 0,
                attempts: 0,
                succeeded: true,
            };
        }

        if !request.lead_delay.is_zero() {
            tokio::time::sleep(request.lead_delay).await;
        }

        let batch = build_batch(&request.text);
        let expected = batch.len();
        let max_attempts = request.retry_count + 1;
        let mut accepted = 0;

        for attempt in 1..=max_attempts {
            accepted = self.backend.submit(&batch);
            info!(attempt, accepted, expected, "injection attempt");

            if accepted == expected {
                return InjectionOutcome {
                    events_expected: expected,
                    events_accepted: accepted,
                    attempts: attempt,
                    succeeded: true,
                };
            }

            warn!(attempt, accepted, expected, "partial injection, will resend full batch");
            if attempt < max_attempts {
                tokio::time::sleep(request.retry_delay).await;
            }
        }

        error!(
            attempts = max_attempts,
            accepted, expected, "injection retries exhausted, giving up"
        );
        InjectionOutcome {
            events_expected: expected,
            events_accepted: accepted,
            attempts: max_attempts,
            succeeded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Backend that accepts a scripted number of events per attempt
    struct ScriptedBackend {
        accept: Box<dyn Fn(usize) -> usize + Send + Sync>,
        calls: Arc<AtomicU32>,
    }

    impl ScriptedBackend {
        fn new(accept: impl Fn(usize) -> usize + Send + Sync + 'static) -> Self {
            Self {
                accept: Box::new(accept),
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn calls(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.calls)
        }
    }

    impl InputBackend for ScriptedBackend {
        fn submit(&self, batch: &[SyntheticKey]) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.accept)(batch.len())
        }
    }

    #[test]
    fn test_batch_is_press_release_pairs_in_order() {
        let batch = build_batch("ab");
        assert_eq!(batch.len(), 4);
        assert_eq!(batch[0].code_unit, 'a' as u16);
        assert_eq!(batch[0].direction, KeyDirection::Press);
        assert_eq!(batch[1].code_unit, 'a' as u16);
        assert_eq!(batch[1].direction, KeyDirection::Release);
        assert_eq!(batch[2].code_unit, 'b' as u16);
        assert_eq!(batch[2].direction, KeyDirection::Press);
        assert_eq!(batch[3].code_unit, 'b' as u16);
        assert_eq!(batch[3].direction, KeyDirection::Release);
    }

    #[test]
    fn test_batch_splits_surrogate_pairs() {
        // One astral-plane character is two code units, so four events
        let batch = build_batch("\u{1F600}");
        assert_eq!(batch.len(), 4);
        assert_eq!(batch[0].code_unit, 0xD83D);
        assert_eq!(batch[2].code_unit, 0xDE00);
    }

    #[test]
    fn test_batch_matches_code_unit_sequence() {
        let text = "héllo";
        let units: Vec<u16> = text.encode_utf16().collect();
        let batch = build_batch(text);
        assert_eq!(batch.len(), units.len() * 2);
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(batch[2 * i].code_unit, *unit);
            assert_eq!(batch[2 * i + 1].code_unit, *unit);
        }
    }

    #[tokio::test]
    async fn test_full_acceptance_takes_one_attempt() {
        let backend = ScriptedBackend::new(|len| len);
        let calls = backend.calls();
        let injector = TextInjector::new(backend);

        let outcome = injector.send_text(&InjectionRequest::new("héllo")).await;

        assert_eq!(outcome.events_expected, 10);
        assert_eq!(outcome.events_accepted, 10);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_shortfall_exhausts_retries() {
        // 6 of 10 accepted on every attempt, retry_count = 3
        let backend = ScriptedBackend::new(|_| 6);
        let calls = backend.calls();
        let injector = TextInjector::new(backend);

        let outcome = injector.send_text(&InjectionRequest::new("héllo")).await;

        assert_eq!(outcome.events_expected, 10);
        assert_eq!(outcome.events_accepted, 6);
        assert_eq!(outcome.attempts, 4);
        assert!(!outcome.succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_on_later_attempt() {
        let calls_seen = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls_seen);
        let backend = ScriptedBackend::new(move |len| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                len / 2
            } else {
                len
            }
        });
        let injector = TextInjector::new(backend);

        let outcome = injector.send_text(&InjectionRequest::new("hi")).await;

        assert_eq!(outcome.attempts, 2);
        assert!(outcome.succeeded);
    }

    #[test]
    fn test_empty_text_is_a_no_op() {
        let backend = ScriptedBackend::new(|len| len);
        let calls = backend.calls();
        let injector = TextInjector::new(backend);

        let outcome = tokio_test::block_on(injector.send_text(&InjectionRequest::new("")));

        assert!(outcome.succeeded);
        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.events_expected, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
