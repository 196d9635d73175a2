//! 출력 조회 -- 종료된 실행 단위의 stdout 읽기

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use podcheck_core::types::TerminalState;

use crate::control_plane::{ControlPlane, ExecutionHandle};
use crate::error::HarnessError;

/// 출력 조회기
///
/// 조회는 `timeout`으로 제한됩니다. `TimedOut` 상태의 실행 단위는
/// 백엔드를 호출하지 않고 바로 `HarnessError::UnitTimedOut`을 반환합니다.
pub struct OutputRetriever<C: ControlPlane> {
    plane: Arc<C>,
    timeout: Duration,
}

impl<C: ControlPlane> OutputRetriever<C> {
    /// 새 조회기를 생성합니다.
    pub fn new(plane: Arc<C>, timeout: Duration) -> Self {
        Self { plane, timeout }
    }

    /// 실행 단위의 주 출력 스트림을 읽습니다.
    pub async fn fetch_output(
        &self,
        handle: &ExecutionHandle,
        state: TerminalState,
    ) -> Result<String, HarnessError> {
        if state == TerminalState::TimedOut {
            return Err(HarnessError::UnitTimedOut(handle.name.clone()));
        }

        let output = tokio::time::timeout(self.timeout, self.plane.unit_logs(handle))
            .await
            .map_err(|_elapsed| HarnessError::Retrieval {
                unit: handle.name.clone(),
                reason: format!(
                    "log retrieval timed out after {}ms",
                    u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
                ),
            })?
            .map_err(|e| match e {
                HarnessError::Retrieval { .. } => e,
                other => HarnessError::Retrieval {
                    unit: handle.name.clone(),
                    reason: other.to_string(),
                },
            })?;

        debug!(unit = %handle.name, bytes = output.len(), "retrieved unit output");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::MockControlPlane;
    use crate::descriptor::{self, ImageRef};

    async fn setup(plane: MockControlPlane) -> (Arc<MockControlPlane>, ExecutionHandle) {
        let plane = Arc::new(plane);
        let desc = descriptor::build(
            ImageRef::default(),
            Some(vec!["/ep-2".to_owned()]),
            None,
        );
        let handle = plane.create_unit(&desc).await.unwrap();
        (plane, handle)
    }

    #[tokio::test]
    async fn fetches_output_of_terminal_unit() {
        let (plane, handle) = setup(MockControlPlane::new()).await;
        let retriever = OutputRetriever::new(plane, Duration::from_secs(5));
        let output = retriever
            .fetch_output(&handle, TerminalState::Succeeded)
            .await
            .unwrap();
        assert_eq!(output, "[/ep-2]\n");
    }

    #[tokio::test]
    async fn timed_out_unit_short_circuits() {
        let (plane, handle) = setup(MockControlPlane::new().with_failing_logs()).await;
        let retriever = OutputRetriever::new(plane, Duration::from_secs(5));
        let err = retriever
            .fetch_output(&handle, TerminalState::TimedOut)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::UnitTimedOut(_)));
    }

    #[tokio::test]
    async fn backend_failure_is_retrieval_error() {
        let (plane, handle) = setup(MockControlPlane::new().with_failing_logs()).await;
        let retriever = OutputRetriever::new(plane, Duration::from_secs(5));
        let err = retriever
            .fetch_output(&handle, TerminalState::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Retrieval { .. }));
    }

    #[tokio::test]
    async fn removed_unit_is_retrieval_error() {
        let (plane, handle) = setup(MockControlPlane::new()).await;
        plane.remove_unit(&handle).await.unwrap();
        let retriever = OutputRetriever::new(plane, Duration::from_secs(5));
        let err = retriever
            .fetch_output(&handle, TerminalState::Succeeded)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Retrieval { .. }));
    }
}
