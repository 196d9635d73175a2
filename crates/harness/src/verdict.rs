//! 케이스 판정 -- 통과 또는 실패 사유
//!
//! 판정 실패는 Rust 에러가 아니라 데이터입니다. 하네스는 인프라 문제를
//! 포함한 모든 케이스 결과를 [`Verdict`]로 보고하며, 각 실패 사유는
//! 진단에 필요한 문맥(실행 단위 이름, 경과 시간, 마지막 상태 등)을 담습니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use podcheck_core::types::UnitStatus;

/// 케이스 판정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// 모든 기대 패턴이 순서대로 일치함
    Pass,
    /// 실패
    Fail(FailureReason),
}

impl Verdict {
    /// 통과 여부
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// 실패 사유 (통과이면 `None`)
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Pass => None,
            Self::Fail(reason) => Some(reason),
        }
    }

    /// 메트릭 레이블용 결과 이름
    pub fn result_name(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail(_) => "fail",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail(reason) => write!(f, "FAIL: {reason}"),
        }
    }
}

/// 판정 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// 컨트롤 플레인이 제출을 거부했거나 재시도가 소진됨
    SubmissionError {
        /// 디스크립터 이름
        name: String,
        /// 사유
        reason: String,
    },
    /// 제한 시간 안에 종료 상태에 도달하지 못함
    TimedOut {
        /// 실행 단위 이름
        unit: String,
        /// 대기한 시간 (밀리초)
        elapsed_ms: u64,
        /// 마지막으로 관찰한 상태
        last_status: Option<UnitStatus>,
    },
    /// 출력을 읽을 수 없음
    RetrievalError {
        /// 실행 단위 이름
        unit: String,
        /// 사유
        reason: String,
    },
    /// 기대 패턴이 출력에서 순서대로 발견되지 않음
    PatternMismatch {
        /// 일치하지 않은 첫 번째 패턴
        expected: String,
        /// 커서 위치부터의 출력 발췌
        excerpt: String,
        /// 검색을 시작한 바이트 오프셋
        offset: usize,
    },
    /// 성공이 요구되는 케이스에서 실행 단위가 실패로 종료됨
    UnitFailed {
        /// 실행 단위 이름
        unit: String,
        /// 종료 코드
        exit_code: Option<i64>,
        /// 재시작 횟수
        restart_count: u32,
        /// 출력 발췌 (읽을 수 있었던 경우)
        excerpt: String,
    },
    /// 상태 관찰 중 회복할 수 없는 에러가 발생함
    ObservationError {
        /// 실행 단위 이름
        unit: String,
        /// 사유
        reason: String,
    },
}

impl FailureReason {
    /// 메트릭 레이블용 사유 이름
    pub fn reason_name(&self) -> &'static str {
        match self {
            Self::SubmissionError { .. } => "submission_error",
            Self::TimedOut { .. } => "timed_out",
            Self::RetrievalError { .. } => "retrieval_error",
            Self::PatternMismatch { .. } => "pattern_mismatch",
            Self::UnitFailed { .. } => "unit_failed",
            Self::ObservationError { .. } => "observation_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubmissionError { name, reason } => {
                write!(f, "submission of '{name}' failed: {reason}")
            }
            Self::TimedOut {
                unit,
                elapsed_ms,
                last_status,
            } => {
                write!(f, "'{unit}' timed out after {elapsed_ms}ms")?;
                match last_status {
                    Some(status) => write!(f, " (last status: {status})"),
                    None => write!(f, " (never observed)"),
                }
            }
            Self::RetrievalError { unit, reason } => {
                write!(f, "could not read output of '{unit}': {reason}")
            }
            Self::PatternMismatch {
                expected,
                excerpt,
                offset,
            } => write!(
                f,
                "expected {expected:?} at or after offset {offset}, found {excerpt:?}"
            ),
            Self::UnitFailed {
                unit,
                exit_code,
                restart_count,
                ..
            } => {
                write!(f, "'{unit}' failed")?;
                if let Some(code) = exit_code {
                    write!(f, " with exit code {code}")?;
                }
                if *restart_count > 0 {
                    write!(f, " after {restart_count} restart(s)")?;
                }
                Ok(())
            }
            Self::ObservationError { unit, reason } => {
                write!(f, "observing '{unit}' failed: {reason}")
            }
        }
    }
}
