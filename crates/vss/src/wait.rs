//! Bounded waiting on asynchronous native operations
//!
//! Every asynchronous step uses the same protocol:
//!
//! ```text
//! loop:
//!   1. query the status
//!      - finished  -> Ok
//!      - cancelled -> AsyncCancelled
//!      - failed    -> Step { status }
//!      - query failure -> treated as "not yet finished"
//!   2. elapsed > budget -> Timeout { step, budget }
//!   3. wait up to one poll interval
//! ```
//!
//! The elapsed check runs on every iteration, so a stream of transient status
//! failures can never keep the loop alive past its budget.

use crate::session::{AsyncOperation, AsyncStatus, NativeResult};
use snapvol_core::{Result, Step, VssError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Poll `operation` until it finishes or `timeout` elapses.
pub fn wait_for_completion<O: AsyncOperation>(
    operation: &mut O,
    step: Step,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start = Instant::now();

    loop {
        match operation.query_status() {
            Ok(AsyncStatus::Finished) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                debug!(target: "snapvol::vss", %step, elapsed_ms, "Asynchronous step finished");
                return Ok(());
            }
            Ok(AsyncStatus::Cancelled) => return Err(VssError::AsyncCancelled { step }),
            Ok(AsyncStatus::Failed(status)) => return Err(VssError::step(step, status)),
            Ok(AsyncStatus::Pending) | Ok(AsyncStatus::Other(_)) => {}
            Err(status) => {
                debug!(target: "snapvol::vss", %step, %status, "Status query failed; still waiting");
            }
        }

        if start.elapsed() > timeout {
            return Err(VssError::Timeout { step, timeout });
        }

        let before = Instant::now();
        if let Err(status) = operation.wait(poll_interval) {
            debug!(target: "snapvol::vss", %step, %status, "Wait failed; sleeping instead");
            let spent = before.elapsed();
            if spent < poll_interval {
                std::thread::sleep(poll_interval - spent);
            }
        }
    }
}

/// Check the result of starting an asynchronous step, then wait for it.
///
/// The operation object is released when this returns.
pub fn run_async_step<O: AsyncOperation>(
    step: Step,
    started: NativeResult<Option<O>>,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let mut operation = started
        .map_err(|status| VssError::step(step, status))?
        .ok_or(VssError::MissingAsyncHandle { step })?;
    wait_for_completion(&mut operation, step, timeout, poll_interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapvol_core::HResult;
    use std::collections::VecDeque;

    /// Replays a fixed list of query results, then repeats the last one
    struct Scripted {
        statuses: VecDeque<NativeResult<AsyncStatus>>,
        last: NativeResult<AsyncStatus>,
        wait_result: NativeResult<()>,
        queries: usize,
    }

    impl Scripted {
        fn new(statuses: Vec<NativeResult<AsyncStatus>>) -> Self {
            let last = *statuses.last().unwrap_or(&Ok(AsyncStatus::Pending));
            Self {
                statuses: statuses.into(),
                last,
                wait_result: Ok(()),
                queries: 0,
            }
        }
    }

    impl AsyncOperation for Scripted {
        fn wait(&mut self, interval: Duration) -> NativeResult<()> {
            std::thread::sleep(interval);
            self.wait_result
        }

        fn query_status(&mut self) -> NativeResult<AsyncStatus> {
            self.queries += 1;
            self.statuses.pop_front().unwrap_or(self.last)
        }
    }

    const POLL: Duration = Duration::from_millis(2);

    #[test]
    fn finishes_after_pending() {
        let mut op = Scripted::new(vec![
            Ok(AsyncStatus::Pending),
            Ok(AsyncStatus::Pending),
            Ok(AsyncStatus::Finished),
        ]);
        wait_for_completion(&mut op, Step::DoSnapshotSet, Duration::from_secs(5), POLL).unwrap();
        assert_eq!(op.queries, 3);
    }

    #[test]
    fn transient_query_failures_keep_polling() {
        let mut op = Scripted::new(vec![
            Err(HResult::E_UNEXPECTED),
            Err(HResult::E_UNEXPECTED),
            Ok(AsyncStatus::Finished),
        ]);
        wait_for_completion(&mut op, Step::PrepareForBackup, Duration::from_secs(5), POLL)
            .unwrap();
        assert_eq!(op.queries, 3);
    }

    #[test]
    fn never_finishing_operation_times_out() {
        let mut op = Scripted::new(vec![Ok(AsyncStatus::Pending)]);
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let err =
            wait_for_completion(&mut op, Step::GatherWriterMetadata, timeout, POLL).unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(
            err,
            VssError::Timeout {
                step: Step::GatherWriterMetadata,
                ..
            }
        ));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + 20 * POLL, "overshot budget: {:?}", elapsed);
    }

    #[test]
    fn persistent_query_failures_still_time_out() {
        let mut op = Scripted::new(vec![Err(HResult::E_UNEXPECTED)]);
        let err = wait_for_completion(
            &mut op,
            Step::BackupComplete,
            Duration::from_millis(30),
            POLL,
        )
        .unwrap_err();
        assert!(matches!(err, VssError::Timeout { .. }));
    }

    #[test]
    fn failing_wait_call_is_bounded_by_timeout() {
        let mut op = Scripted::new(vec![Ok(AsyncStatus::Pending)]);
        op.wait_result = Err(HResult::E_UNEXPECTED);
        let err = wait_for_completion(
            &mut op,
            Step::DoSnapshotSet,
            Duration::from_millis(30),
            POLL,
        )
        .unwrap_err();
        assert!(matches!(err, VssError::Timeout { .. }));
    }

    #[test]
    fn cancelled_and_failed_operations_stop_immediately() {
        let mut op = Scripted::new(vec![Ok(AsyncStatus::Cancelled)]);
        let err = wait_for_completion(&mut op, Step::DoSnapshotSet, Duration::from_secs(5), POLL)
            .unwrap_err();
        assert!(matches!(err, VssError::AsyncCancelled { step: Step::DoSnapshotSet }));

        let mut op = Scripted::new(vec![Ok(AsyncStatus::Failed(HResult::VSS_E_PROVIDER_VETO))]);
        let err = wait_for_completion(&mut op, Step::DoSnapshotSet, Duration::from_secs(5), POLL)
            .unwrap_err();
        assert_eq!(err.status(), Some(HResult::VSS_E_PROVIDER_VETO));
        assert_eq!(op.queries, 1);
    }

    #[test]
    fn run_async_step_maps_start_failures() {
        let err = run_async_step::<Scripted>(
            Step::PrepareForBackup,
            Err(HResult::VSS_E_BAD_STATE),
            Duration::from_secs(1),
            POLL,
        )
        .unwrap_err();
        assert_eq!(err.failed_step(), Some(Step::PrepareForBackup));
        assert_eq!(err.status(), Some(HResult::VSS_E_BAD_STATE));

        let err = run_async_step::<Scripted>(
            Step::GatherWriterMetadata,
            Ok(None),
            Duration::from_secs(1),
            POLL,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            VssError::MissingAsyncHandle {
                step: Step::GatherWriterMetadata
            }
        ));
    }
}
