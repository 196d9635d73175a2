//! 설정 관리 -- podcheck.toml 파싱 및 런타임 설정
//!
//! [`PodcheckConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PODCHECK_HARNESS_TIMEOUT_SECS=60` 형식)
//! 3. 설정 파일 (`podcheck.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), podcheck_core::error::PodcheckError> {
//! use podcheck_core::config::PodcheckConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PodcheckConfig::load("podcheck.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PodcheckConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PodcheckError};

/// 폴링 주기 상한 (밀리초)
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// 케이스 제한 시간 상한 (초)
const MAX_TIMEOUT_SECS: u64 = 3600;
/// 정리 제한 시간 상한 (초)
const MAX_TEARDOWN_TIMEOUT_SECS: u64 = 300;
/// 동시 실행 케이스 수 상한
const MAX_CONCURRENT_CASES: usize = 64;

/// podcheck 통합 설정
///
/// `podcheck.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodcheckConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 하네스 실행 설정
    #[serde(default)]
    pub harness: HarnessConfig,
    /// 검증용 이미지 설정
    #[serde(default)]
    pub image: ImageConfig,
}

impl PodcheckConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PodcheckError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PodcheckError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PodcheckError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PodcheckError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PodcheckError> {
        toml::from_str(toml_str).map_err(|e| {
            PodcheckError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PODCHECK_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PODCHECK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PODCHECK_GENERAL_LOG_FORMAT");

        // Harness
        override_string(
            &mut self.harness.docker_socket,
            "PODCHECK_HARNESS_DOCKER_SOCKET",
        );
        override_string(&mut self.harness.namespace, "PODCHECK_HARNESS_NAMESPACE");
        override_u64(
            &mut self.harness.poll_interval_ms,
            "PODCHECK_HARNESS_POLL_INTERVAL_MS",
        );
        override_u64(&mut self.harness.timeout_secs, "PODCHECK_HARNESS_TIMEOUT_SECS");
        override_u64(
            &mut self.harness.teardown_timeout_secs,
            "PODCHECK_HARNESS_TEARDOWN_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.harness.max_concurrent_cases,
            "PODCHECK_HARNESS_MAX_CONCURRENT_CASES",
        );
        override_bool(
            &mut self.harness.require_success,
            "PODCHECK_HARNESS_REQUIRE_SUCCESS",
        );

        // Image
        override_string(&mut self.image.registry, "PODCHECK_IMAGE_REGISTRY");
        override_string(&mut self.image.name, "PODCHECK_IMAGE_NAME");
        override_string(&mut self.image.version, "PODCHECK_IMAGE_VERSION");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PodcheckError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.harness.docker_socket.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "harness.docker_socket".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.harness.namespace.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "harness.namespace".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.harness.poll_interval_ms == 0 || self.harness.poll_interval_ms > MAX_POLL_INTERVAL_MS
        {
            return Err(ConfigError::InvalidValue {
                field: "harness.poll_interval_ms".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            }
            .into());
        }

        if self.harness.timeout_secs == 0 || self.harness.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "harness.timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_TIMEOUT_SECS}"),
            }
            .into());
        }

        if self.harness.teardown_timeout_secs == 0
            || self.harness.teardown_timeout_secs > MAX_TEARDOWN_TIMEOUT_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "harness.teardown_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_TEARDOWN_TIMEOUT_SECS}"),
            }
            .into());
        }

        if self.harness.teardown_timeout_secs >= self.harness.timeout_secs {
            return Err(ConfigError::InvalidValue {
                field: "harness.teardown_timeout_secs".to_owned(),
                reason: format!(
                    "must be shorter than harness.timeout_secs ({})",
                    self.harness.timeout_secs
                ),
            }
            .into());
        }

        if self.harness.max_concurrent_cases == 0
            || self.harness.max_concurrent_cases > MAX_CONCURRENT_CASES
        {
            return Err(ConfigError::InvalidValue {
                field: "harness.max_concurrent_cases".to_owned(),
                reason: format!("must be 1-{MAX_CONCURRENT_CASES}"),
            }
            .into());
        }

        for (field, value) in [
            ("image.registry", &self.image.registry),
            ("image.name", &self.image.name),
            ("image.version", &self.image.version),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must not be empty".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 하네스 실행 설정
///
/// 하네스 크레이트는 이 섹션에서 자신의 설정을 파생하고
/// 여기에 없는 세부 값(백오프 등)은 기본값을 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Docker 소켓 경로
    pub docker_socket: String,
    /// 하네스가 생성한 실행 단위에 붙는 네임스페이스 레이블 값
    pub namespace: String,
    /// 상태 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 케이스당 종료 대기 제한 시간 (초)
    pub timeout_secs: u64,
    /// 실행 단위 정리 제한 시간 (초)
    pub teardown_timeout_secs: u64,
    /// 동시에 실행할 최대 케이스 수
    pub max_concurrent_cases: usize,
    /// 실패로 종료된 실행 단위를 판정 실패로 처리할지 여부
    pub require_success: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_owned(),
            namespace: "podcheck".to_owned(),
            poll_interval_ms: 500,
            timeout_secs: 300,
            teardown_timeout_secs: 10,
            max_concurrent_cases: 4,
            require_success: true,
        }
    }
}

/// 검증용 이미지 설정
///
/// `registry/name:version` 형태의 참조로 조합됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// 레지스트리
    pub registry: String,
    /// 이미지 이름
    pub name: String,
    /// 이미지 버전 태그
    pub version: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            registry: "gcr.io/kubernetes-e2e-test-images".to_owned(),
            name: "entrypoint-tester".to_owned(),
            version: "1.0".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
