//! 도메인 타입 -- 실행 단위 상태와 종료 상태
//!
//! 하네스와 CLI가 공유하는 데이터 구조를 정의합니다.
//! 컨트롤 플레인이 보고하는 상태([`UnitStatus`])와 감시자가 내리는
//! 최종 판정([`TerminalState`])은 서로 다른 타입으로 구분됩니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 컨트롤 플레인이 보고하는 실행 단위의 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPhase {
    /// 생성되었지만 아직 실행되지 않음
    Pending,
    /// 실행 중
    Running,
    /// 종료 코드 0으로 종료
    Succeeded,
    /// 0이 아닌 코드로 종료되었거나 런타임이 실패를 보고함
    Failed,
}

impl UnitPhase {
    /// 더 이상 전이하지 않는 단계인지 확인합니다.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for UnitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// 관찰 경계에서 한 번 조회한 실행 단위 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    /// 현재 단계
    pub phase: UnitPhase,
    /// 종료 코드 (종료된 경우)
    pub exit_code: Option<i64>,
    /// 런타임이 실행 단위를 재시작한 횟수
    pub restart_count: u32,
}

impl UnitStatus {
    /// 재시작 이력이 없는 상태를 생성합니다.
    pub fn new(phase: UnitPhase) -> Self {
        Self {
            phase,
            exit_code: None,
            restart_count: 0,
        }
    }

    /// 종료 코드를 설정합니다.
    pub fn with_exit_code(mut self, code: i64) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// 재시작 횟수를 설정합니다.
    pub fn with_restart_count(mut self, count: u32) -> Self {
        self.restart_count = count;
        self
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phase)?;
        if let Some(code) = self.exit_code {
            write!(f, " (exit {code})")?;
        }
        if self.restart_count > 0 {
            write!(f, " restarts={}", self.restart_count)?;
        }
        Ok(())
    }
}

/// 완료 감시자가 내리는 최종 상태
///
/// 한 번 결정되면 변경되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// 실행 단위가 성공적으로 종료됨
    Succeeded,
    /// 실행 단위가 실패로 종료됨 (재시작 감지 포함)
    Failed,
    /// 제한 시간 내에 종료 상태에 도달하지 못함
    TimedOut,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}
