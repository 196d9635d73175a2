//! 에러 타입 -- 도메인별 에러 정의

/// podcheck 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum PodcheckError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 워크로드 제출/관찰/로그 조회 에러
    #[error("workload error: {0}")]
    Workload(#[from] WorkloadError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨트롤 플레인 경계에서 발생하는 에러
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    /// 컨트롤 플레인이 디스크립터를 거부함
    #[error("submission rejected: {0}")]
    Submission(String),

    /// 상태 관찰 실패
    #[error("observation failed: {0}")]
    Observation(String),

    /// 출력 조회 실패
    #[error("output retrieval failed: {0}")]
    Retrieval(String),

    /// 실행 단위를 찾을 수 없음
    #[error("execution unit not found: {0}")]
    NotFound(String),

    /// 백엔드 연결 에러
    #[error("backend unavailable: {0}")]
    Backend(String),
}
