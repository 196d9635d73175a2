//! 검증 케이스 스위트
//!
//! - [`TestCase`]: 명령/인자 오버라이드와 기대 출력으로 이루어진 케이스
//! - [`entrypoint_suite`]: entrypoint-tester 이미지에 대한 기본 4개 케이스
//! - [`load_cases_from_file`]: TOML 파일의 `[[case]]` 항목 로딩
//! - [`SuiteRunner`]: 세마포어로 동시 실행 수를 제한하여 케이스를 병렬 실행
//!
//! # 케이스 파일 형식
//!
//! ```toml
//! [[case]]
//! name = "override all"
//! command = ["/ep-2"]
//! args = ["override", "arguments"]
//! expect = ["[/ep-2 override arguments]"]
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info};

use crate::control_plane::ControlPlane;
use crate::error::HarnessError;
use crate::harness::{CaseReport, Harness};
use crate::verifier::ExpectedOutput;

/// 케이스 파일 최대 크기 (1 MB)
const MAX_CASE_FILE_SIZE: u64 = 1024 * 1024;

/// 케이스 파일당 최대 케이스 수
const MAX_CASES: usize = 1000;

/// 검증 케이스
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    /// 케이스 이름 (스위트 안에서 고유)
    pub name: String,
    /// 설명
    pub description: String,
    /// entrypoint 오버라이드
    pub command: Option<Vec<String>>,
    /// 인자 오버라이드
    pub args: Option<Vec<String>>,
    /// 기대 출력
    pub expected: ExpectedOutput,
}

impl TestCase {
    /// 오버라이드 없는 케이스를 생성합니다.
    pub fn new(name: impl Into<String>, expected: ExpectedOutput) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            command: None,
            args: None,
            expected,
        }
    }

    /// 설명을 설정합니다.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// entrypoint 오버라이드를 설정합니다.
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = Some(command.into_iter().map(Into::into).collect());
        self
    }

    /// 인자 오버라이드를 설정합니다.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }
}

/// entrypoint-tester 이미지의 명령/인자 우선순위를 검증하는 4개 케이스
pub fn entrypoint_suite() -> Vec<TestCase> {
    vec![
        TestCase::new(
            "use defaults",
            ExpectedOutput::literals(["[/ep default arguments]"]),
        )
        .description("image entrypoint and arguments are used when nothing is overridden"),
        TestCase::new(
            "override arguments",
            ExpectedOutput::literals(["[/ep override arguments]"]),
        )
        .description("args replace the image arguments")
        .args(["override", "arguments"]),
        TestCase::new("override command", ExpectedOutput::literals(["[/ep-2]"]))
            .description("command replaces the entrypoint and drops the image arguments")
            .command(["/ep-2"]),
        TestCase::new(
            "override all",
            ExpectedOutput::literals(["[/ep-2 override arguments]"]),
        )
        .description("command and args replace both image defaults")
        .command(["/ep-2"])
        .args(["override", "arguments"]),
    ]
}

#[derive(Debug, Deserialize)]
struct CaseFile {
    #[serde(default, rename = "case")]
    cases: Vec<CaseEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseEntry {
    name: String,
    #[serde(default)]
    description: String,
    command: Option<Vec<String>>,
    args: Option<Vec<String>>,
    expect: Vec<String>,
}

/// TOML 문자열에서 케이스 목록을 파싱합니다.
///
/// `origin`은 에러 메시지에 표시할 출처입니다.
pub fn parse_cases(content: &str, origin: &str) -> Result<Vec<TestCase>, HarnessError> {
    let load_error = |reason: String| HarnessError::CaseLoad {
        path: origin.to_owned(),
        reason,
    };

    let file: CaseFile =
        toml::from_str(content).map_err(|e| load_error(format!("failed to parse TOML: {e}")))?;

    if file.cases.is_empty() {
        return Err(load_error("no [[case]] entries".to_owned()));
    }
    if file.cases.len() > MAX_CASES {
        return Err(load_error(format!(
            "too many cases: {} (max: {MAX_CASES})",
            file.cases.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut cases = Vec::with_capacity(file.cases.len());
    for entry in file.cases {
        if entry.name.trim().is_empty() {
            return Err(load_error("case name must not be empty".to_owned()));
        }
        if !seen.insert(entry.name.clone()) {
            return Err(load_error(format!("duplicate case name '{}'", entry.name)));
        }
        if entry.expect.is_empty() {
            return Err(load_error(format!(
                "case '{}' has no expected patterns",
                entry.name
            )));
        }

        let expected = ExpectedOutput::parse(&entry.expect)
            .map_err(|e| load_error(format!("case '{}': {e}", entry.name)))?;

        cases.push(TestCase {
            name: entry.name,
            description: entry.description,
            command: entry.command,
            args: entry.args,
            expected,
        });
    }
    Ok(cases)
}

/// TOML 파일에서 케이스 목록을 로드합니다.
///
/// # Errors
///
/// 파일을 읽을 수 없거나, 너무 크거나, 형식이 잘못된 경우
/// `HarnessError::CaseLoad`를 반환합니다.
pub fn load_cases_from_file(path: &Path) -> Result<Vec<TestCase>, HarnessError> {
    let origin = path.display().to_string();

    // 읽기 전에 크기 상한 확인
    let metadata = std::fs::metadata(path).map_err(|e| HarnessError::CaseLoad {
        path: origin.clone(),
        reason: format!("failed to read metadata: {e}"),
    })?;
    if metadata.len() > MAX_CASE_FILE_SIZE {
        return Err(HarnessError::CaseLoad {
            path: origin,
            reason: format!(
                "file too large: {} bytes (max: {MAX_CASE_FILE_SIZE})",
                metadata.len()
            ),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| HarnessError::CaseLoad {
        path: origin.clone(),
        reason: format!("failed to read file: {e}"),
    })?;

    parse_cases(&content, &origin)
}

/// 이름으로 케이스를 선택합니다. `names`가 비어 있으면 전부 반환합니다.
///
/// # Errors
///
/// 존재하지 않는 이름이 있으면 `HarnessError::Config`를 반환합니다.
pub fn select_cases(cases: Vec<TestCase>, names: &[String]) -> Result<Vec<TestCase>, HarnessError> {
    if names.is_empty() {
        return Ok(cases);
    }
    if let Some(unknown) = names.iter().find(|n| !cases.iter().any(|c| &c.name == *n)) {
        return Err(HarnessError::Config {
            field: "case".to_owned(),
            reason: format!("unknown case '{unknown}'"),
        });
    }
    Ok(cases
        .into_iter()
        .filter(|c| names.contains(&c.name))
        .collect())
}

/// 스위트 실행 결과
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// 케이스별 결과 (입력 순서)
    pub reports: Vec<CaseReport>,
    /// 통과한 케이스 수
    pub passed: usize,
    /// 실패한 케이스 수
    pub failed: usize,
    /// 전체 소요 시간 (밀리초)
    pub elapsed_ms: u64,
}

impl SuiteReport {
    fn from_reports(reports: Vec<CaseReport>, elapsed_ms: u64) -> Self {
        let passed = reports.iter().filter(|r| r.verdict.is_pass()).count();
        let failed = reports.len() - passed;
        Self {
            reports,
            passed,
            failed,
            elapsed_ms,
        }
    }

    /// 모든 케이스가 통과했는지 확인합니다.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// 스위트 실행기
///
/// 케이스마다 tokio 태스크를 하나씩 생성하고, 동시에 실행되는 케이스 수는
/// 세마포어로 제한합니다. 케이스끼리는 컨트롤 플레인 클라이언트 외에
/// 공유하는 상태가 없습니다.
pub struct SuiteRunner<C: ControlPlane> {
    harness: Arc<Harness<C>>,
    max_concurrent: usize,
}

impl<C: ControlPlane> SuiteRunner<C> {
    /// 새 실행기를 생성합니다. 동시 실행 수는 하네스 설정을 따릅니다.
    pub fn new(harness: Arc<Harness<C>>) -> Self {
        let max_concurrent = harness.config().max_concurrent_cases.max(1);
        Self {
            harness,
            max_concurrent,
        }
    }

    /// 동시 실행 수를 변경합니다.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// 케이스들을 실행하고 결과를 입력 순서대로 모읍니다.
    pub async fn run(&self, cases: Vec<TestCase>) -> SuiteReport {
        let started = Instant::now();
        let total = cases.len();
        info!(cases = total, max_concurrent = self.max_concurrent, "running suite");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let names: Vec<String> = cases.iter().map(|c| c.name.clone()).collect();
        let mut slots: Vec<Option<CaseReport>> = (0..total).map(|_| None).collect();
        let mut task_index = std::collections::HashMap::new();

        let mut tasks = JoinSet::new();
        for (index, case) in cases.into_iter().enumerate() {
            let harness = Arc::clone(&self.harness);
            let semaphore = Arc::clone(&semaphore);
            let handle = tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                (index, harness.run_case(&case).await)
            });
            task_index.insert(handle.id(), index);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => {
                    error!(error = %e, "case task failed");
                    if let Some(&index) = task_index.get(&e.id()) {
                        slots[index] = Some(CaseReport::aborted(&names[index], &e.to_string()));
                    }
                }
            }
        }

        let reports: Vec<CaseReport> = slots
            .into_iter()
            .zip(&names)
            .map(|(slot, name)| slot.unwrap_or_else(|| CaseReport::aborted(name, "no report")))
            .collect();

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = SuiteReport::from_reports(reports, elapsed_ms);
        info!(
            passed = report.passed,
            failed = report.failed,
            elapsed_ms,
            "suite finished"
        );
        report
    }
}
