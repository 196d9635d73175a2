//! 케이스 실행기 -- 제출부터 정리까지 한 케이스의 전체 흐름
//!
//! [`Harness`]는 하나의 케이스에 대해 다음 순서로 동작합니다:
//!
//! 1. 디스크립터 생성 (`Built`)
//! 2. 제출 (`Submitted`)
//! 3. 종료 대기 (`Polling` → `Terminal` | `TimedOut`)
//! 4. 출력 조회 (`Retrieved` | `RetrievalError`)
//! 5. 검증 (`Pass` | `PatternMismatch`)
//! 6. 실행 단위 제거 (판정과 무관하게, 별도 제한 시간 안에서 최선 노력)
//!
//! 어느 단계에서든 실패 판정으로 바로 끝날 수 있으며, 이전 단계로 되돌아가는
//! 전이는 없습니다. 보고서에는 도달한 가장 먼 단계가 기록됩니다.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use podcheck_core::metrics as m;
use podcheck_core::types::TerminalState;

use crate::config::WorkloadHarnessConfig;
use crate::control_plane::{ControlPlane, ExecutionHandle};
use crate::descriptor::{LABEL_CASE, LABEL_NAMESPACE, WorkloadDescriptor};
use crate::error::HarnessError;
use crate::retriever::OutputRetriever;
use crate::submit::SubmissionClient;
use crate::suite::TestCase;
use crate::verdict::{FailureReason, Verdict};
use crate::verifier::{OutputVerifier, excerpt};
use crate::watcher::{CompletionWatcher, WatchOutcome};

/// 케이스 진행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 디스크립터 생성됨
    Built,
    /// 제출됨
    Submitted,
    /// 종료 대기 중
    Polling,
    /// 종료 상태 도달
    Terminal,
    /// 제한 시간 초과
    TimedOut,
    /// 출력 조회됨
    Retrieved,
    /// 출력 조회 실패
    RetrievalError,
    /// 검증 통과
    Pass,
    /// 패턴 불일치
    PatternMismatch,
}

impl Stage {
    fn rank(self) -> u8 {
        match self {
            Self::Built => 0,
            Self::Submitted => 1,
            Self::Polling => 2,
            Self::Terminal | Self::TimedOut => 3,
            Self::Retrieved | Self::RetrievalError => 4,
            Self::Pass | Self::PatternMismatch => 5,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Built => "built",
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Terminal => "terminal",
            Self::TimedOut => "timed_out",
            Self::Retrieved => "retrieved",
            Self::RetrievalError => "retrieval_error",
            Self::Pass => "pass",
            Self::PatternMismatch => "pattern_mismatch",
        };
        f.write_str(name)
    }
}

/// 단계 전이 추적기. 이전 단계로의 전이는 무시합니다.
#[derive(Debug)]
struct StageTracker {
    current: Stage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: Stage::Built,
        }
    }

    fn advance(&mut self, next: Stage) -> bool {
        if next.rank() <= self.current.rank() {
            warn!(from = %self.current, to = %next, "ignored backward stage transition");
            return false;
        }
        debug!(from = %self.current, to = %next, "stage transition");
        self.current = next;
        true
    }

    fn current(&self) -> Stage {
        self.current
    }
}

/// 케이스 실행 보고서
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    /// 케이스 이름
    pub case: String,
    /// 실행 단위 이름
    pub unit_name: String,
    /// 실행 단위 ID (제출에 성공한 경우)
    pub unit_id: Option<String>,
    /// 판정
    pub verdict: Verdict,
    /// 도달한 가장 먼 단계
    pub stage: Stage,
    /// 종료 상태 (감시가 끝난 경우)
    pub terminal_state: Option<TerminalState>,
    /// 케이스 소요 시간 (밀리초)
    pub elapsed_ms: u64,
    /// 조회한 출력
    pub output: Option<String>,
    /// 남은 실행 단위가 없는지 여부 (제거했거나 생성되지 않음)
    pub cleaned_up: bool,
}

impl CaseReport {
    fn new(case: &TestCase, unit_name: &str) -> Self {
        Self {
            case: case.name.clone(),
            unit_name: unit_name.to_owned(),
            unit_id: None,
            verdict: Verdict::Pass,
            stage: Stage::Built,
            terminal_state: None,
            elapsed_ms: 0,
            output: None,
            cleaned_up: false,
        }
    }

    /// 태스크가 비정상 종료되어 결과가 없는 케이스의 보고서
    pub fn aborted(case: &str, reason: &str) -> Self {
        Self {
            case: case.to_owned(),
            unit_name: String::new(),
            unit_id: None,
            verdict: Verdict::Fail(FailureReason::ObservationError {
                unit: String::new(),
                reason: format!("case aborted: {reason}"),
            }),
            stage: Stage::Built,
            terminal_state: None,
            elapsed_ms: 0,
            output: None,
            cleaned_up: false,
        }
    }
}

/// 케이스 실행기
pub struct Harness<C: ControlPlane> {
    plane: Arc<C>,
    config: WorkloadHarnessConfig,
    submitter: SubmissionClient<C>,
    watcher: CompletionWatcher<C>,
    retriever: OutputRetriever<C>,
    verifier: OutputVerifier,
}

impl<C: ControlPlane> Harness<C> {
    /// 새 실행기를 생성합니다.
    ///
    /// # Errors
    ///
    /// 설정이 유효하지 않으면 `HarnessError::Config`를 반환합니다.
    pub fn new(plane: Arc<C>, config: WorkloadHarnessConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Self {
            submitter: SubmissionClient::from_config(Arc::clone(&plane), &config),
            watcher: CompletionWatcher::from_config(Arc::clone(&plane), &config),
            retriever: OutputRetriever::new(Arc::clone(&plane), config.retrieval_timeout()),
            verifier: OutputVerifier::new(config.excerpt_len),
            plane,
            config,
        })
    }

    /// 하네스 설정
    pub fn config(&self) -> &WorkloadHarnessConfig {
        &self.config
    }

    /// 컨트롤 플레인
    pub fn plane(&self) -> &Arc<C> {
        &self.plane
    }

    /// 케이스에 대한 디스크립터를 생성합니다.
    pub fn descriptor_for(&self, case: &TestCase) -> WorkloadDescriptor {
        let mut builder = WorkloadDescriptor::builder(self.config.image.clone())
            .grace_period(self.config.grace_period())
            .label(LABEL_NAMESPACE, &self.config.namespace)
            .label(LABEL_CASE, &case.name);
        if let Some(command) = &case.command {
            builder = builder.command(command.iter().cloned());
        }
        if let Some(args) = &case.args {
            builder = builder.args(args.iter().cloned());
        }
        builder.build()
    }

    /// 케이스 하나를 실행합니다.
    ///
    /// 인프라 문제를 포함한 모든 결과는 보고서의 판정으로 표현됩니다.
    pub async fn run_case(&self, case: &TestCase) -> CaseReport {
        let started = Instant::now();
        let mut stage = StageTracker::new();

        let descriptor = self.descriptor_for(case);
        let mut report = CaseReport::new(case, &descriptor.name);
        debug!(case = %case.name, unit = %descriptor.name, "descriptor built");

        let verdict = match self.submitter.submit(&descriptor).await {
            Ok(handle) => {
                stage.advance(Stage::Submitted);
                report.unit_id = Some(handle.id.clone());

                let verdict = self.observe(case, &handle, &mut stage, &mut report).await;
                report.cleaned_up = self.teardown(&handle).await;
                verdict
            }
            Err(e) => {
                let cleaned_up = self.teardown_orphan(&descriptor.name, &mut report).await;
                report.cleaned_up = cleaned_up;
                Verdict::Fail(FailureReason::SubmissionError {
                    name: descriptor.name.clone(),
                    reason: e.to_string(),
                })
            }
        };

        self.finish(report, verdict, stage.current(), started)
    }

    async fn observe(
        &self,
        case: &TestCase,
        handle: &ExecutionHandle,
        stage: &mut StageTracker,
        report: &mut CaseReport,
    ) -> Verdict {
        stage.advance(Stage::Polling);
        let outcome = match self
            .watcher
            .await_terminal(handle, self.config.timeout())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                return Verdict::Fail(FailureReason::ObservationError {
                    unit: handle.name.clone(),
                    reason: e.to_string(),
                });
            }
        };
        report.terminal_state = Some(outcome.state);

        if outcome.state == TerminalState::TimedOut {
            stage.advance(Stage::TimedOut);
            return Verdict::Fail(FailureReason::TimedOut {
                unit: handle.name.clone(),
                elapsed_ms: outcome.elapsed_ms(),
                last_status: outcome.last_status,
            });
        }
        stage.advance(Stage::Terminal);

        let output = match self.retriever.fetch_output(handle, outcome.state).await {
            Ok(output) => {
                stage.advance(Stage::Retrieved);
                output
            }
            Err(e) => {
                stage.advance(Stage::RetrievalError);
                if self.requires_success(&outcome) {
                    return self.unit_failed(handle, &outcome, "");
                }
                return Verdict::Fail(FailureReason::RetrievalError {
                    unit: handle.name.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let verdict = if self.requires_success(&outcome) {
            self.unit_failed(handle, &outcome, &output)
        } else {
            let verdict = self.verifier.verify(&output, &case.expected);
            stage.advance(if verdict.is_pass() {
                Stage::Pass
            } else {
                Stage::PatternMismatch
            });
            verdict
        };
        report.output = Some(output);
        verdict
    }

    fn requires_success(&self, outcome: &WatchOutcome) -> bool {
        self.config.require_success && outcome.state == TerminalState::Failed
    }

    fn unit_failed(&self, handle: &ExecutionHandle, outcome: &WatchOutcome, output: &str) -> Verdict {
        let status = outcome.last_status.as_ref();
        Verdict::Fail(FailureReason::UnitFailed {
            unit: handle.name.clone(),
            exit_code: status.and_then(|s| s.exit_code),
            restart_count: status.map_or(0, |s| s.restart_count),
            excerpt: excerpt(output, 0, self.config.excerpt_len),
        })
    }

    /// 실행 단위를 제거합니다. 실패해도 판정에는 영향이 없습니다.
    async fn teardown(&self, handle: &ExecutionHandle) -> bool {
        match tokio::time::timeout(
            self.config.teardown_timeout(),
            self.plane.remove_unit(handle),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(unit = %handle.name, "execution unit removed");
                true
            }
            Ok(Err(e)) => {
                warn!(unit = %handle.name, error = %e, "failed to remove execution unit");
                metrics::counter!(m::CLEANUP_FAILURES_TOTAL).increment(1);
                false
            }
            Err(_elapsed) => {
                warn!(
                    unit = %handle.name,
                    timeout_secs = self.config.teardown_timeout_secs,
                    "removal of execution unit timed out"
                );
                metrics::counter!(m::CLEANUP_FAILURES_TOTAL).increment(1);
                false
            }
        }
    }

    /// 제출이 실패한 뒤 남았을 수 있는 실행 단위를 이름으로 찾아 제거합니다.
    ///
    /// 남은 실행 단위가 없으면 `true`입니다.
    async fn teardown_orphan(&self, name: &str, report: &mut CaseReport) -> bool {
        let found =
            tokio::time::timeout(self.config.teardown_timeout(), self.plane.find_unit(name)).await;
        match found {
            Ok(Ok(None)) => true,
            Ok(Ok(Some(handle))) => {
                warn!(unit = %handle.name, id = %handle.id, "removing unit left by failed submission");
                report.unit_id = Some(handle.id.clone());
                self.teardown(&handle).await
            }
            Ok(Err(e)) => {
                warn!(unit = %name, error = %e, "could not look up unit after failed submission");
                metrics::counter!(m::CLEANUP_FAILURES_TOTAL).increment(1);
                false
            }
            Err(_elapsed) => {
                warn!(
                    unit = %name,
                    timeout_secs = self.config.teardown_timeout_secs,
                    "lookup of unit after failed submission timed out"
                );
                metrics::counter!(m::CLEANUP_FAILURES_TOTAL).increment(1);
                false
            }
        }
    }

    fn finish(
        &self,
        mut report: CaseReport,
        verdict: Verdict,
        stage: Stage,
        started: Instant,
    ) -> CaseReport {
        let elapsed = started.elapsed();
        report.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        report.stage = stage;

        let reason = verdict.failure().map_or("none", FailureReason::reason_name);
        metrics::counter!(
            m::CASES_TOTAL,
            m::LABEL_RESULT => verdict.result_name(),
            m::LABEL_REASON => reason
        )
        .increment(1);
        metrics::histogram!(m::CASE_DURATION_SECONDS).record(elapsed.as_secs_f64());

        match &verdict {
            Verdict::Pass => info!(
                case = %report.case,
                unit = %report.unit_name,
                elapsed_ms = report.elapsed_ms,
                "case passed"
            ),
            Verdict::Fail(failure) => warn!(
                case = %report.case,
                unit = %report.unit_name,
                stage = %stage,
                reason = reason,
                detail = %failure,
                elapsed_ms = report.elapsed_ms,
                "case failed"
            ),
        }

        report.verdict = verdict;
        report
    }
}
