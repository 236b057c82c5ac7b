/// Shared "poll until quiet or deadline" loop
///
/// Both automation-driven backends have no completion signal and infer "done"
/// from snapshots of visible terminal state. This is the one loop they share:
/// fetch a snapshot, ask a change detector what it saw, stop on explicit
/// completion, on a quiet period with no change, or on the deadline.
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// What the change detector concluded about one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The snapshot proves the command finished.
    Done,
    /// The snapshot differs from the previous one; keep waiting.
    Changed,
    /// Nothing new; counts toward the quiet period.
    Unchanged,
}

/// How the polling loop ended.
#[derive(Debug)]
pub enum PollOutcome<S> {
    /// The detector reported [`PollStatus::Done`].
    Completed(S),
    /// No change for the configured quiet period.
    Quiet(S),
    /// Deadline elapsed first; carries the last snapshot if any was taken.
    DeadlineElapsed(Option<S>),
}

impl<S> PollOutcome<S> {
    /// The final snapshot, however the loop ended.
    pub fn into_snapshot(self) -> Option<S> {
        match self {
            Self::Completed(s) | Self::Quiet(s) => Some(s),
            Self::DeadlineElapsed(s) => s,
        }
    }
}

/// Poll `fetch` every `interval` until `detect` reports done, until no change
/// has been seen for `quiet_period` (when set), or until `deadline` elapses.
///
/// Fetch failures propagate; the callers convert them into structured results
/// at their own boundary.
pub async fn poll_until_settled<S, F, Fut, D>(
    mut fetch: F,
    mut detect: D,
    deadline: Duration,
    quiet_period: Option<Duration>,
    interval: Duration,
) -> Result<PollOutcome<S>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S>>,
    D: FnMut(&S) -> PollStatus,
{
    let started = Instant::now();
    let mut last_change = started;
    let mut last_snapshot: Option<S> = None;

    loop {
        if started.elapsed() >= deadline {
            return Ok(PollOutcome::DeadlineElapsed(last_snapshot));
        }

        let snapshot = fetch().await?;
        match detect(&snapshot) {
            PollStatus::Done => return Ok(PollOutcome::Completed(snapshot)),
            PollStatus::Changed => last_change = Instant::now(),
            PollStatus::Unchanged => {
                if let Some(quiet) = quiet_period {
                    if last_change.elapsed() >= quiet {
                        return Ok(PollOutcome::Quiet(snapshot));
                    }
                }
            }
        }
        last_snapshot = Some(snapshot);

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn stops_when_detector_reports_done() {
        let calls = AtomicUsize::new(0);
        let outcome = poll_until_settled(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(n)
            },
            |n| {
                if *n >= 2 {
                    PollStatus::Done
                } else {
                    PollStatus::Changed
                }
            },
            Duration::from_secs(5),
            None,
            Duration::from_millis(1),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Completed(2)));
    }

    #[tokio::test]
    async fn stops_after_quiet_period_without_change() {
        let outcome = poll_until_settled(
            || async { Ok(42usize) },
            |_| PollStatus::Unchanged,
            Duration::from_secs(5),
            Some(Duration::from_millis(30)),
            Duration::from_millis(5),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Quiet(42)));
    }

    #[tokio::test]
    async fn deadline_wins_when_output_keeps_changing() {
        let calls = AtomicUsize::new(0);
        let outcome = poll_until_settled(
            || async { Ok(calls.fetch_add(1, Ordering::SeqCst)) },
            |_| PollStatus::Changed,
            Duration::from_millis(50),
            Some(Duration::from_millis(200)),
            Duration::from_millis(5),
        )
        .await
        .unwrap();

        match outcome {
            PollOutcome::DeadlineElapsed(Some(last)) => assert!(last > 0),
            other => panic!("expected deadline, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_deadline_returns_without_fetching() {
        let outcome = poll_until_settled(
            || async { anyhow::bail!("fetch must not run") },
            |_: &usize| PollStatus::Done,
            Duration::ZERO,
            None,
            Duration::from_millis(1),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::DeadlineElapsed(None)));
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let result = poll_until_settled(
            || async { anyhow::bail!("screen went away") },
            |_: &usize| PollStatus::Unchanged,
            Duration::from_secs(1),
            None,
            Duration::from_millis(1),
        )
        .await;

        assert!(result.is_err());
    }
}
