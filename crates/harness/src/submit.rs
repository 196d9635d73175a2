//! 제출 클라이언트 -- 중복 없는 워크로드 제출
//!
//! 일시적 전송 에러(연결 거부, 시간 초과)가 발생하면 제출 결과를 알 수 없습니다.
//! 재시도 전에 디스크립터 이름으로 실행 단위를 조회하고, 이미 존재하면 다시
//! 제출하지 않고 그 실행 단위를 채택합니다. 컨트롤 플레인의 명시적 거부는
//! 재시도하지 않습니다.

use std::sync::Arc;

use tracing::{info, warn};

use podcheck_core::metrics as m;

use crate::config::WorkloadHarnessConfig;
use crate::control_plane::{ControlPlane, ExecutionHandle};
use crate::descriptor::WorkloadDescriptor;
use crate::error::HarnessError;
use crate::watcher::Backoff;

/// 제출 클라이언트
pub struct SubmissionClient<C: ControlPlane> {
    plane: Arc<C>,
    max_retries: u32,
    backoff: Backoff,
}

impl<C: ControlPlane> SubmissionClient<C> {
    /// 새 제출 클라이언트를 생성합니다.
    pub fn new(plane: Arc<C>, max_retries: u32, backoff: Backoff) -> Self {
        Self {
            plane,
            max_retries,
            backoff,
        }
    }

    /// 하네스 설정에서 생성합니다.
    pub fn from_config(plane: Arc<C>, config: &WorkloadHarnessConfig) -> Self {
        Self::new(plane, config.submit_retries, Backoff::from_config(config))
    }

    /// 디스크립터를 제출하고 실행 단위 핸들을 반환합니다.
    ///
    /// # Errors
    ///
    /// - `HarnessError::SubmissionRejected`: 컨트롤 플레인이 거부함
    /// - `HarnessError::IdentityCollision`: 첫 제출에서 같은 이름이 이미 존재함
    /// - 일시적 에러: 재시도가 모두 소진됨
    pub async fn submit(
        &self,
        descriptor: &WorkloadDescriptor,
    ) -> Result<ExecutionHandle, HarnessError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.backoff.delay(attempt - 1);
                warn!(
                    unit = %descriptor.name,
                    attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "submission outcome unknown, checking before retry"
                );
                tokio::time::sleep(backoff).await;

                match self.adopt_existing(descriptor).await {
                    Ok(Some(handle)) => return Ok(handle),
                    Ok(None) => {}
                    Err(e) if e.is_transient() => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => return Err(self.rejected(e)),
                }
            }

            match self.plane.create_unit(descriptor).await {
                Ok(handle) => {
                    metrics::counter!(m::SUBMISSIONS_TOTAL, m::LABEL_RESULT => "accepted")
                        .increment(1);
                    info!(unit = %handle.name, id = %handle.id, "workload submitted");
                    return Ok(handle);
                }
                // an earlier ambiguous attempt may have created the unit
                Err(HarnessError::IdentityCollision(name)) if attempt > 0 => {
                    return match self.adopt_existing(descriptor).await {
                        Ok(Some(handle)) => Ok(handle),
                        Ok(None) => Err(self.rejected(HarnessError::IdentityCollision(name))),
                        Err(e) => Err(self.rejected(e)),
                    };
                }
                Err(e) if e.is_transient() => {
                    last_error = Some(e);
                }
                Err(e) => return Err(self.rejected(e)),
            }
        }

        metrics::counter!(m::SUBMISSIONS_TOTAL, m::LABEL_RESULT => "exhausted").increment(1);
        Err(last_error.unwrap_or_else(|| {
            HarnessError::Connection(format!(
                "submission of '{}' failed after {} retries",
                descriptor.name, self.max_retries
            ))
        }))
    }

    /// 같은 이름의 실행 단위가 있으면 시작을 보장하고 채택합니다.
    async fn adopt_existing(
        &self,
        descriptor: &WorkloadDescriptor,
    ) -> Result<Option<ExecutionHandle>, HarnessError> {
        let Some(handle) = self.plane.find_unit(&descriptor.name).await? else {
            return Ok(None);
        };
        self.plane.start_unit(&handle).await?;

        metrics::counter!(m::SUBMISSIONS_TOTAL, m::LABEL_RESULT => "adopted").increment(1);
        info!(
            unit = %handle.name,
            id = %handle.id,
            "adopted execution unit created by an earlier attempt"
        );
        Ok(Some(handle))
    }

    fn rejected(&self, err: HarnessError) -> HarnessError {
        metrics::counter!(m::SUBMISSIONS_TOTAL, m::LABEL_RESULT => "rejected").increment(1);
        warn!(error = %err, "workload submission failed");
        err
    }
}
