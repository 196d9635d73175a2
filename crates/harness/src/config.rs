//! 하네스 설정
//!
//! [`WorkloadHarnessConfig`]는 core의 [`PodcheckConfig`](podcheck_core::config::PodcheckConfig)
//! `[harness]`/`[image]` 섹션을 기반으로 하네스 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use podcheck_core::config::PodcheckConfig;
//! use podcheck_harness::config::WorkloadHarnessConfig;
//!
//! let core_config = PodcheckConfig::default();
//! let config = WorkloadHarnessConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::descriptor::ImageRef;
use crate::error::HarnessError;

/// 하네스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadHarnessConfig {
    /// Docker 소켓 경로
    pub docker_socket: String,
    /// 실행 단위에 붙는 네임스페이스 레이블 값
    pub namespace: String,
    /// 검증용 이미지
    pub image: ImageRef,
    /// 상태 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 종료 대기 제한 시간 (초)
    pub timeout_secs: u64,
    /// 정리 제한 시간 (초)
    pub teardown_timeout_secs: u64,
    /// 동시 실행 케이스 최대 수
    pub max_concurrent_cases: usize,
    /// 실패로 종료된 실행 단위를 판정 실패로 처리할지 여부
    pub require_success: bool,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 일시적 에러 백오프 기본 간격 (밀리초)
    pub backoff_base_ms: u64,
    /// 일시적 에러 백오프 상한 (밀리초)
    pub backoff_max_ms: u64,
    /// 모호한 제출 실패 시 재시도 최대 횟수
    pub submit_retries: u32,
    /// 출력 조회 제한 시간 (초)
    pub retrieval_timeout_secs: u64,
    /// 실행 단위 종료 유예 시간 (초)
    pub grace_period_secs: u64,
    /// 패턴 불일치 시 보고할 출력 발췌 길이 (문자)
    pub excerpt_len: usize,
}

impl Default for WorkloadHarnessConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_owned(),
            namespace: "podcheck".to_owned(),
            image: ImageRef::default(),
            poll_interval_ms: 500,
            timeout_secs: 300,
            teardown_timeout_secs: 10,
            max_concurrent_cases: 4,
            require_success: true,
            backoff_base_ms: 200,
            backoff_max_ms: 5_000,
            submit_retries: 3,
            retrieval_timeout_secs: 30,
            grace_period_secs: 1,
            excerpt_len: 256,
        }
    }
}

/// 설정 상한값 상수
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const MAX_TIMEOUT_SECS: u64 = 3600;
const MAX_TEARDOWN_TIMEOUT_SECS: u64 = 300;
const MAX_CONCURRENT_CASES: usize = 64;
const MAX_BACKOFF_MS: u64 = 60_000;
const MAX_SUBMIT_RETRIES: u32 = 10;
const MAX_RETRIEVAL_TIMEOUT_SECS: u64 = 600;
const MAX_GRACE_PERIOD_SECS: u64 = 300;
const MAX_EXCERPT_LEN: usize = 64 * 1024;

impl WorkloadHarnessConfig {
    /// core 설정에서 하네스 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &podcheck_core::config::PodcheckConfig) -> Self {
        Self {
            docker_socket: core.harness.docker_socket.clone(),
            namespace: core.harness.namespace.clone(),
            image: ImageRef::from_core(&core.image),
            poll_interval_ms: core.harness.poll_interval_ms,
            timeout_secs: core.harness.timeout_secs,
            teardown_timeout_secs: core.harness.teardown_timeout_secs,
            max_concurrent_cases: core.harness.max_concurrent_cases,
            require_success: core.harness.require_success,
            ..Self::default()
        }
    }

    /// 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 종료 대기 제한 시간
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 정리 제한 시간
    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs(self.teardown_timeout_secs)
    }

    /// 출력 조회 제한 시간
    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval_timeout_secs)
    }

    /// 종료 유예 시간
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(config_error(
                "poll_interval_ms",
                format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            ));
        }

        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(config_error(
                "timeout_secs",
                format!("must be 1-{MAX_TIMEOUT_SECS}"),
            ));
        }

        if self.teardown_timeout_secs == 0 || self.teardown_timeout_secs > MAX_TEARDOWN_TIMEOUT_SECS
        {
            return Err(config_error(
                "teardown_timeout_secs",
                format!("must be 1-{MAX_TEARDOWN_TIMEOUT_SECS}"),
            ));
        }

        if self.teardown_timeout_secs >= self.timeout_secs {
            return Err(config_error(
                "teardown_timeout_secs",
                format!("must be shorter than timeout_secs ({})", self.timeout_secs),
            ));
        }

        if self.max_concurrent_cases == 0 || self.max_concurrent_cases > MAX_CONCURRENT_CASES {
            return Err(config_error(
                "max_concurrent_cases",
                format!("must be 1-{MAX_CONCURRENT_CASES}"),
            ));
        }

        if self.backoff_base_ms == 0 || self.backoff_base_ms > MAX_BACKOFF_MS {
            return Err(config_error(
                "backoff_base_ms",
                format!("must be 1-{MAX_BACKOFF_MS}"),
            ));
        }

        if self.backoff_max_ms < self.backoff_base_ms || self.backoff_max_ms > MAX_BACKOFF_MS {
            return Err(config_error(
                "backoff_max_ms",
                format!("must be backoff_base_ms-{MAX_BACKOFF_MS}"),
            ));
        }

        if self.submit_retries > MAX_SUBMIT_RETRIES {
            return Err(config_error(
                "submit_retries",
                format!("must be 0-{MAX_SUBMIT_RETRIES}"),
            ));
        }

        if self.retrieval_timeout_secs == 0 || self.retrieval_timeout_secs > MAX_RETRIEVAL_TIMEOUT_SECS
        {
            return Err(config_error(
                "retrieval_timeout_secs",
                format!("must be 1-{MAX_RETRIEVAL_TIMEOUT_SECS}"),
            ));
        }

        if self.grace_period_secs > MAX_GRACE_PERIOD_SECS {
            return Err(config_error(
                "grace_period_secs",
                format!("must be 0-{MAX_GRACE_PERIOD_SECS}"),
            ));
        }

        if self.excerpt_len == 0 || self.excerpt_len > MAX_EXCERPT_LEN {
            return Err(config_error(
                "excerpt_len",
                format!("must be 1-{MAX_EXCERPT_LEN}"),
            ));
        }

        if self.namespace.is_empty() {
            return Err(config_error("namespace", "must not be empty".to_owned()));
        }

        if self.image.name.is_empty() || self.image.version.is_empty() {
            return Err(config_error(
                "image",
                "image name and version must not be empty".to_owned(),
            ));
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: String) -> HarnessError {
    HarnessError::Config {
        field: field.to_owned(),
        reason,
    }
}

/// 하네스 설정 빌더
#[derive(Default)]
pub struct WorkloadHarnessConfigBuilder {
    config: WorkloadHarnessConfig,
}

impl WorkloadHarnessConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// Docker 소켓 경로를 설정합니다.
    pub fn docker_socket(mut self, socket: impl Into<String>) -> Self {
        self.config.docker_socket = socket.into();
        self
    }

    /// 네임스페이스 레이블 값을 설정합니다.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// 검증용 이미지를 설정합니다.
    pub fn image(mut self, image: ImageRef) -> Self {
        self.config.image = image;
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 종료 대기 제한 시간(초)을 설정합니다.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// 정리 제한 시간(초)을 설정합니다.
    pub fn teardown_timeout_secs(mut self, secs: u64) -> Self {
        self.config.teardown_timeout_secs = secs;
        self
    }

    /// 동시 실행 케이스 최대 수를 설정합니다.
    pub fn max_concurrent_cases(mut self, max: usize) -> Self {
        self.config.max_concurrent_cases = max;
        self
    }

    /// 실패 종료를 판정 실패로 처리할지 설정합니다.
    pub fn require_success(mut self, require: bool) -> Self {
        self.config.require_success = require;
        self
    }

    /// 백오프 기본 간격과 상한(밀리초)을 설정합니다.
    pub fn backoff_ms(mut self, base: u64, max: u64) -> Self {
        self.config.backoff_base_ms = base;
        self.config.backoff_max_ms = max;
        self
    }

    /// 제출 재시도 최대 횟수를 설정합니다.
    pub fn submit_retries(mut self, retries: u32) -> Self {
        self.config.submit_retries = retries;
        self
    }

    /// 출력 조회 제한 시간(초)을 설정합니다.
    pub fn retrieval_timeout_secs(mut self, secs: u64) -> Self {
        self.config.retrieval_timeout_secs = secs;
        self
    }

    /// 종료 유예 시간(초)을 설정합니다.
    pub fn grace_period_secs(mut self, secs: u64) -> Self {
        self.config.grace_period_secs = secs;
        self
    }

    /// 출력 발췌 길이를 설정합니다.
    pub fn excerpt_len(mut self, len: usize) -> Self {
        self.config.excerpt_len = len;
        self
    }

    /// 설정을 검증하고 `WorkloadHarnessConfig`를 생성합니다.
    pub fn build(self) -> Result<WorkloadHarnessConfig, HarnessError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
