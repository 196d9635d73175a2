//! 하네스 에러 타입
//!
//! [`HarnessError`]는 컨트롤 플레인 경계와 하네스 내부에서 발생하는 모든
//! 인프라 에러를 표현합니다. 케이스의 판정 실패는 에러가 아니라
//! [`Verdict`](crate::verdict::Verdict) 데이터로 표현됩니다.
//!
//! `From<HarnessError> for PodcheckError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use podcheck_core::error::{ConfigError, PodcheckError, WorkloadError};

/// 하네스 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// 컨트롤 플레인이 디스크립터를 거부함 (재시도하지 않음)
    #[error("submission rejected for '{name}': {reason}")]
    SubmissionRejected {
        /// 디스크립터 이름
        name: String,
        /// 거부 사유
        reason: String,
    },

    /// 동일한 이름의 실행 단위가 이미 존재함
    #[error("identity collision: execution unit '{0}' already exists")]
    IdentityCollision(String),

    /// 백엔드 연결 실패 (일시적)
    #[error("control plane connection error: {0}")]
    Connection(String),

    /// 백엔드 API가 에러 상태 코드를 반환함
    #[error("control plane api error (status {status}): {message}")]
    Api {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 메시지
        message: String,
    },

    /// 실행 단위를 찾을 수 없음
    #[error("execution unit not found: {0}")]
    UnitNotFound(String),

    /// 출력 조회 실패
    #[error("failed to retrieve output of '{unit}': {reason}")]
    Retrieval {
        /// 실행 단위 이름
        unit: String,
        /// 실패 사유
        reason: String,
    },

    /// 시간 초과된 실행 단위에 대해 출력 조회를 시도함
    #[error("execution unit '{0}' timed out before reaching a terminal state")]
    UnitTimedOut(String),

    /// 개별 API 호출 시간 초과
    #[error("{operation} timed out after {elapsed_ms}ms")]
    OperationTimeout {
        /// 호출한 작업 이름
        operation: &'static str,
        /// 경과 시간 (밀리초)
        elapsed_ms: u64,
    },

    /// 잘못된 기대 출력 패턴
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// 패턴 원문
        pattern: String,
        /// 에러 사유
        reason: String,
    },

    /// 테스트 케이스 파일 로딩 실패
    #[error("case load error: {path}: {reason}")]
    CaseLoad {
        /// 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl HarnessError {
    /// 재시도로 회복될 수 있는 일시적 에러인지 확인합니다.
    ///
    /// 연결 실패, 개별 호출 시간 초과, 5xx 응답과 429 응답이 해당합니다.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::OperationTimeout { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<HarnessError> for PodcheckError {
    fn from(err: HarnessError) -> Self {
        match &err {
            HarnessError::SubmissionRejected { .. } | HarnessError::IdentityCollision(_) => {
                PodcheckError::Workload(WorkloadError::Submission(err.to_string()))
            }
            HarnessError::Connection(msg) => {
                PodcheckError::Workload(WorkloadError::Backend(msg.clone()))
            }
            HarnessError::Api { .. } | HarnessError::OperationTimeout { .. } => {
                PodcheckError::Workload(WorkloadError::Observation(err.to_string()))
            }
            HarnessError::UnitNotFound(name) => {
                PodcheckError::Workload(WorkloadError::NotFound(name.clone()))
            }
            HarnessError::Retrieval { .. } | HarnessError::UnitTimedOut(_) => {
                PodcheckError::Workload(WorkloadError::Retrieval(err.to_string()))
            }
            HarnessError::InvalidPattern { pattern, reason } => {
                PodcheckError::Config(ConfigError::InvalidValue {
                    field: format!("pattern '{pattern}'"),
                    reason: reason.clone(),
                })
            }
            HarnessError::CaseLoad { path, reason } => {
                PodcheckError::Config(ConfigError::ParseFailed {
                    reason: format!("{path}: {reason}"),
                })
            }
            HarnessError::Config { field, reason } => {
                PodcheckError::Config(ConfigError::InvalidValue {
                    field: field.clone(),
                    reason: reason.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_rejected_display() {
        let err = HarnessError::SubmissionRejected {
            name: "client-containers-abc".to_owned(),
            reason: "exceeded quota".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("client-containers-abc"));
        assert!(msg.contains("exceeded quota"));
    }

    #[test]
    fn api_error_display() {
        let err = HarnessError::Api {
            status: 503,
            message: "service unavailable".to_owned(),
        };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn transient_classification() {
        assert!(HarnessError::Connection("refused".to_owned()).is_transient());
        assert!(
            HarnessError::OperationTimeout {
                operation: "inspect",
                elapsed_ms: 1000,
            }
            .is_transient()
        );
        assert!(
            HarnessError::Api {
                status: 500,
                message: String::new(),
            }
            .is_transient()
        );
        assert!(
            HarnessError::Api {
                status: 429,
                message: String::new(),
            }
            .is_transient()
        );
        assert!(
            !HarnessError::Api {
                status: 400,
                message: String::new(),
            }
            .is_transient()
        );
        assert!(!HarnessError::UnitNotFound("x".to_owned()).is_transient());
        assert!(!HarnessError::IdentityCollision("x".to_owned()).is_transient());
        assert!(
            !HarnessError::SubmissionRejected {
                name: "x".to_owned(),
                reason: "bad".to_owned(),
            }
            .is_transient()
        );
    }

    #[test]
    fn converts_to_podcheck_error_submission() {
        let err: PodcheckError = HarnessError::IdentityCollision("dup".to_owned()).into();
        assert!(matches!(
            err,
            PodcheckError::Workload(WorkloadError::Submission(_))
        ));
    }

    #[test]
    fn converts_to_podcheck_error_not_found() {
        let err: PodcheckError = HarnessError::UnitNotFound("gone".to_owned()).into();
        assert!(matches!(
            err,
            PodcheckError::Workload(WorkloadError::NotFound(_))
        ));
    }

    #[test]
    fn converts_to_podcheck_error_config() {
        let err: PodcheckError = HarnessError::Config {
            field: "poll_interval_ms".to_owned(),
            reason: "must be 1-60000".to_owned(),
        }
        .into();
        assert!(matches!(
            err,
            PodcheckError::Config(ConfigError::InvalidValue { .. })
        ));
    }
}
