//! 메트릭 상수 및 설명 등록
//!
//! 하네스가 기록하는 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 레코더가 설치되지 않으면 `metrics` 매크로는 아무 동작도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `podcheck_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use podcheck_core::metrics as m;
//!
//! metrics::counter!(m::CASES_TOTAL, m::LABEL_RESULT => "pass").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (pass, fail / accepted, rejected)
pub const LABEL_RESULT: &str = "result";

/// 실패 사유 레이블 키 (timed_out, pattern_mismatch, ...)
pub const LABEL_REASON: &str = "reason";

// ─── 하네스 메트릭 ────────────────────────────────────────────────

/// 실행된 케이스 수 (counter, label: result, reason)
pub const CASES_TOTAL: &str = "podcheck_cases_total";

/// 제출 시도 수 (counter, label: result)
pub const SUBMISSIONS_TOTAL: &str = "podcheck_submissions_total";

/// 완료 감시 중 재시도된 일시적 에러 수 (counter)
pub const TRANSIENT_ERRORS_TOTAL: &str = "podcheck_transient_errors_total";

/// 정리(teardown) 실패 수 (counter)
pub const CLEANUP_FAILURES_TOTAL: &str = "podcheck_cleanup_failures_total";

/// 케이스 전체 소요 시간 (histogram, 초)
pub const CASE_DURATION_SECONDS: &str = "podcheck_case_duration_seconds";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더를 설치한 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(CASES_TOTAL, "Verification cases run, by verdict");
    describe_counter!(
        SUBMISSIONS_TOTAL,
        "Workload submissions sent to the control plane"
    );
    describe_counter!(
        TRANSIENT_ERRORS_TOTAL,
        "Transient observation errors retried by the completion watcher"
    );
    describe_counter!(
        CLEANUP_FAILURES_TOTAL,
        "Execution units that could not be removed after a verdict"
    );
    describe_histogram!(
        CASE_DURATION_SECONDS,
        "Wall-clock duration of a verification case"
    );
}
