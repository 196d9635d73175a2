//! 완료 감시 -- 실행 단위가 종료 상태에 도달할 때까지 폴링
//!
//! [`CompletionWatcher`]는 고정 주기로 관찰 경계를 폴링합니다.
//! 일시적 관찰 에러는 상한이 있는 지수 백오프로 재시도하며, 전체 제한 시간을
//! 넘기면 `TimedOut`을 보고합니다. 각 관찰 호출 자체도 남은 시간으로 제한되므로
//! 응답하지 않는 API 호출이 마감 시각을 넘길 수 없습니다.
//!
//! 재시작 횟수가 0보다 큰 실행 단위는 프로토콜 위반이며 `Failed`로 보고합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use podcheck_core::metrics as m;
use podcheck_core::types::{TerminalState, UnitPhase, UnitStatus};

use crate::config::WorkloadHarnessConfig;
use crate::control_plane::{ControlPlane, ExecutionHandle};
use crate::error::HarnessError;

/// 상한이 있는 지수 백오프
///
/// `attempt`번째 재시도의 대기 시간은 `base * 2^attempt`이며 `max`를 넘지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// 새 백오프를 생성합니다.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// 하네스 설정에서 생성합니다.
    pub fn from_config(config: &WorkloadHarnessConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// `attempt`(0부터)번째 재시도 전 대기 시간
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// 감시 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOutcome {
    /// 종료 상태
    pub state: TerminalState,
    /// 감시에 걸린 시간
    pub elapsed: Duration,
    /// 마지막으로 관찰한 상태
    pub last_status: Option<UnitStatus>,
    /// 관찰 시도 횟수
    pub polls: u32,
    /// 재시도된 일시적 에러 수
    pub transient_errors: u32,
}

impl WatchOutcome {
    /// 경과 시간 (밀리초)
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// 완료 감시자
pub struct CompletionWatcher<C: ControlPlane> {
    plane: Arc<C>,
    poll_interval: Duration,
    backoff: Backoff,
}

impl<C: ControlPlane> CompletionWatcher<C> {
    /// 새 감시자를 생성합니다.
    pub fn new(plane: Arc<C>, poll_interval: Duration, backoff: Backoff) -> Self {
        Self {
            plane,
            poll_interval,
            backoff,
        }
    }

    /// 하네스 설정에서 생성합니다.
    pub fn from_config(plane: Arc<C>, config: &WorkloadHarnessConfig) -> Self {
        Self::new(plane, config.poll_interval(), Backoff::from_config(config))
    }

    /// 실행 단위가 종료 상태에 도달하거나 `timeout`이 지날 때까지 대기합니다.
    ///
    /// # Errors
    ///
    /// 일시적이지 않은 관찰 에러(예: 실행 단위가 사라짐)는 그대로 반환합니다.
    pub async fn await_terminal(
        &self,
        handle: &ExecutionHandle,
        timeout: Duration,
    ) -> Result<WatchOutcome, HarnessError> {
        let started = Instant::now();
        let deadline = started + timeout;

        let mut last_status: Option<UnitStatus> = None;
        let mut polls: u32 = 0;
        let mut transient_errors: u32 = 0;
        let mut consecutive_errors: u32 = 0;

        let finish = |state: TerminalState,
                      last_status: Option<UnitStatus>,
                      polls: u32,
                      transient_errors: u32| WatchOutcome {
            state,
            elapsed: started.elapsed(),
            last_status,
            polls,
            transient_errors,
        };

        loop {
            let now = Instant::now();
            if now >= deadline {
                warn!(unit = %handle.name, polls, "execution unit timed out");
                return Ok(finish(
                    TerminalState::TimedOut,
                    last_status,
                    polls,
                    transient_errors,
                ));
            }

            polls = polls.saturating_add(1);
            let delay = match tokio::time::timeout(deadline - now, self.plane.unit_status(handle))
                .await
            {
                Ok(Ok(status)) => {
                    consecutive_errors = 0;
                    debug!(unit = %handle.name, status = %status, "observed unit status");

                    if status.restart_count > 0 {
                        warn!(
                            unit = %handle.name,
                            restart_count = status.restart_count,
                            "execution unit was restarted, reporting failure"
                        );
                        return Ok(finish(
                            TerminalState::Failed,
                            Some(status),
                            polls,
                            transient_errors,
                        ));
                    }

                    let terminal = match status.phase {
                        UnitPhase::Succeeded => Some(TerminalState::Succeeded),
                        UnitPhase::Failed => Some(TerminalState::Failed),
                        UnitPhase::Pending | UnitPhase::Running => None,
                    };
                    last_status = Some(status);
                    if let Some(state) = terminal {
                        return Ok(finish(state, last_status, polls, transient_errors));
                    }
                    self.poll_interval
                }
                Ok(Err(e)) if e.is_transient() => {
                    transient_errors = transient_errors.saturating_add(1);
                    metrics::counter!(m::TRANSIENT_ERRORS_TOTAL).increment(1);

                    let backoff = self.backoff.delay(consecutive_errors);
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    warn!(
                        unit = %handle.name,
                        error = %e,
                        attempt = consecutive_errors,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "transient observation error, retrying"
                    );
                    backoff
                }
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => {
                    warn!(unit = %handle.name, "status call outlived the deadline");
                    return Ok(finish(
                        TerminalState::TimedOut,
                        last_status,
                        polls,
                        transient_errors,
                    ));
                }
            };

            let wake = (Instant::now() + delay).min(deadline);
            tokio::time::sleep_until(wake).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::{MockControlPlane, MockObservation};
    use crate::descriptor::{self, ImageRef};

    fn backoff() -> Backoff {
        Backoff::new(Duration::from_millis(100), Duration::from_millis(1000))
    }

    async fn submitted(plane: &MockControlPlane) -> ExecutionHandle {
        let desc = descriptor::build(ImageRef::default(), None, None);
        plane.create_unit(&desc).await.unwrap()
    }

    fn assert_elapsed(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(10),
            "elapsed {actual:?}, expected about {expected:?}"
        );
    }

    fn watcher(plane: &Arc<MockControlPlane>) -> CompletionWatcher<MockControlPlane> {
        CompletionWatcher::new(Arc::clone(plane), Duration::from_millis(500), backoff())
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let b = backoff();
        assert_eq!(b.delay(0), Duration::from_millis(100));
        assert_eq!(b.delay(1), Duration::from_millis(200));
        assert_eq!(b.delay(3), Duration::from_millis(800));
        assert_eq!(b.delay(4), Duration::from_millis(1000));
        assert_eq!(b.delay(40), Duration::from_millis(1000));
    }

    #[test]
    fn backoff_max_never_below_base() {
        let b = Backoff::new(Duration::from_millis(500), Duration::from_millis(10));
        assert_eq!(b.delay(0), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_succeeded_after_running() {
        let plane = Arc::new(MockControlPlane::new().with_observations(vec![
            MockObservation::Status(UnitStatus::new(UnitPhase::Pending)),
            MockObservation::Status(UnitStatus::new(UnitPhase::Running)),
            MockObservation::Status(UnitStatus::new(UnitPhase::Succeeded).with_exit_code(0)),
        ]));
        let handle = submitted(&plane).await;

        let outcome = watcher(&plane)
            .await_terminal(&handle, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::Succeeded);
        assert_eq!(outcome.polls, 3);
        assert_eq!(outcome.transient_errors, 0);
        assert_elapsed(outcome.elapsed, Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_failed_verbatim() {
        let plane = Arc::new(MockControlPlane::new().with_observations(vec![
            MockObservation::Status(UnitStatus::new(UnitPhase::Failed).with_exit_code(2)),
        ]));
        let handle = submitted(&plane).await;

        let outcome = watcher(&plane)
            .await_terminal(&handle, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::Failed);
        assert_eq!(outcome.last_status.and_then(|s| s.exit_code), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_never_terminal() {
        let plane = Arc::new(MockControlPlane::new().never_terminal());
        let handle = submitted(&plane).await;

        let outcome = watcher(&plane)
            .await_terminal(&handle, Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::TimedOut);
        assert_elapsed(outcome.elapsed, Duration::from_secs(3));
        assert_eq!(
            outcome.last_status.map(|s| s.phase),
            Some(UnitPhase::Running)
        );
        // polls at 0, 0.5, ..., 2.5s
        assert_eq!(outcome.polls, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_status_call_is_bounded_by_deadline() {
        let plane = Arc::new(
            MockControlPlane::new().with_observations(vec![MockObservation::Hang]),
        );
        let handle = submitted(&plane).await;

        let outcome = watcher(&plane)
            .await_terminal(&handle, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::TimedOut);
        assert_elapsed(outcome.elapsed, Duration::from_secs(2));
        assert!(outcome.last_status.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_with_backoff() {
        let plane = Arc::new(MockControlPlane::new().with_observations(vec![
            MockObservation::Transient,
            MockObservation::Transient,
            MockObservation::Transient,
            MockObservation::Status(UnitStatus::new(UnitPhase::Succeeded).with_exit_code(0)),
        ]));
        let handle = submitted(&plane).await;

        let outcome = watcher(&plane)
            .await_terminal(&handle, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::Succeeded);
        assert_eq!(outcome.transient_errors, 3);
        // 100 + 200 + 400 ms
        assert_elapsed(outcome.elapsed, Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_is_returned() {
        let plane = Arc::new(
            MockControlPlane::new().with_observations(vec![MockObservation::Gone]),
        );
        let handle = submitted(&plane).await;

        let result = watcher(&plane)
            .await_terminal(&handle, Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(HarnessError::UnitNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_is_reported_as_failure() {
        let plane = Arc::new(MockControlPlane::new().with_observations(vec![
            MockObservation::Status(UnitStatus::new(UnitPhase::Running).with_restart_count(1)),
        ]));
        let handle = submitted(&plane).await;

        let outcome = watcher(&plane)
            .await_terminal(&handle, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::Failed);
        assert_eq!(outcome.last_status.map(|s| s.restart_count), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_times_out_without_polling() {
        let plane = Arc::new(MockControlPlane::new());
        let handle = submitted(&plane).await;

        let outcome = watcher(&plane)
            .await_terminal(&handle, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::TimedOut);
        assert_eq!(outcome.polls, 0);
        assert_eq!(plane.status_calls(), 0);
    }
}
