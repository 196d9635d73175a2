//! 워크로드 디스크립터 -- 제출할 실행 단위의 선언
//!
//! [`WorkloadDescriptor`]는 하나의 실행 단위(컨테이너 하나)만 가지며,
//! 재시작 정책은 항상 [`RestartPolicy::Never`]입니다. 실패한 실행의 재시도는
//! 워크로드가 아니라 하네스의 책임입니다.
//!
//! 명령/인자 오버라이드가 없으면 이미지 기본값(entrypoint/cmd)이 사용됩니다.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 생성되는 워크로드 이름의 접두어
pub const NAME_PREFIX: &str = "client-containers-";

/// 실행 단위 안의 컨테이너 이름
pub const TEST_CONTAINER_NAME: &str = "test-container";

/// 기본 종료 유예 시간
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// 하네스가 생성했음을 표시하는 레이블 키
pub const LABEL_MANAGED_BY: &str = "podcheck.managed-by";

/// 네임스페이스 레이블 키
pub const LABEL_NAMESPACE: &str = "podcheck.namespace";

/// 케이스 이름 레이블 키
pub const LABEL_CASE: &str = "podcheck.case";

/// 버전이 지정된 컨테이너 이미지 참조
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// 레지스트리 (예: `gcr.io/kubernetes-e2e-test-images`)
    pub registry: String,
    /// 이미지 이름
    pub name: String,
    /// 버전 태그
    pub version: String,
}

impl ImageRef {
    /// 새 이미지 참조를 생성합니다.
    pub fn new(
        registry: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// core 설정의 `[image]` 섹션에서 생성합니다.
    pub fn from_core(core: &podcheck_core::config::ImageConfig) -> Self {
        Self::new(&core.registry, &core.name, &core.version)
    }

    /// entrypoint-tester 이미지 참조
    ///
    /// 이 이미지는 `[<entrypoint> <args...>]`를 출력하고 0으로 종료합니다.
    /// entrypoint 기본값은 `/ep`, 인자 기본값은 `default arguments`입니다.
    pub fn entrypoint_tester() -> Self {
        Self::new("gcr.io/kubernetes-e2e-test-images", "entrypoint-tester", "1.0")
    }

    /// `registry/name:version` 형식의 전체 참조를 반환합니다.
    pub fn reference(&self) -> String {
        self.to_string()
    }
}

impl Default for ImageRef {
    fn default() -> Self {
        Self::entrypoint_tester()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.trim_end_matches('/');
        if registry.is_empty() {
            write!(f, "{}:{}", self.name, self.version)
        } else {
            write!(f, "{registry}/{}:{}", self.name, self.version)
        }
    }
}

/// 실행 단위 재시작 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// 재시작하지 않음
    #[default]
    Never,
    /// 실패 시 재시작
    OnFailure,
    /// 항상 재시작
    Always,
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "never"),
            Self::OnFailure => write!(f, "on_failure"),
            Self::Always => write!(f, "always"),
        }
    }
}

/// 실행 단위 명세
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnitSpec {
    /// 컨테이너 이름
    pub container_name: String,
    /// 이미지 참조
    pub image: ImageRef,
    /// entrypoint 오버라이드 (`None`이면 이미지 기본값)
    pub command: Option<Vec<String>>,
    /// 인자 오버라이드 (`None`이면 이미지 기본값)
    pub args: Option<Vec<String>>,
    /// 재시작 정책
    pub restart_policy: RestartPolicy,
    /// 종료 유예 시간
    pub termination_grace_period: Duration,
}

/// 컨트롤 플레인에 제출하는 워크로드 선언
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    /// 제출마다 고유하게 생성되는 이름
    pub name: String,
    /// 실행 단위 명세
    pub unit: ExecutionUnitSpec,
    /// 실행 단위에 붙일 레이블
    pub labels: BTreeMap<String, String>,
}

impl WorkloadDescriptor {
    /// 이미지 참조를 받아 빌더를 생성합니다.
    pub fn builder(image: ImageRef) -> WorkloadDescriptorBuilder {
        WorkloadDescriptorBuilder::new(image)
    }
}

/// 오버라이드만 받아 디스크립터를 생성합니다.
///
/// 재시작 정책은 `Never`, 유예 시간은 [`DEFAULT_GRACE_PERIOD`]로 고정됩니다.
pub fn build(
    image: ImageRef,
    override_command: Option<Vec<String>>,
    override_args: Option<Vec<String>>,
) -> WorkloadDescriptor {
    let mut builder = WorkloadDescriptorBuilder::new(image);
    if let Some(command) = override_command {
        builder = builder.command(command);
    }
    if let Some(args) = override_args {
        builder = builder.args(args);
    }
    builder.build()
}

/// 충돌 가능성이 무시할 만한 고유 이름을 생성합니다.
pub fn generate_name(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::new_v4())
}

/// 워크로드 디스크립터 빌더
///
/// 빈 명령/인자 목록은 오버라이드가 없는 것으로 취급합니다.
pub struct WorkloadDescriptorBuilder {
    name_prefix: String,
    image: ImageRef,
    command: Option<Vec<String>>,
    args: Option<Vec<String>>,
    grace_period: Duration,
    labels: BTreeMap<String, String>,
}

impl WorkloadDescriptorBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new(image: ImageRef) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_MANAGED_BY.to_owned(), "podcheck".to_owned());
        Self {
            name_prefix: NAME_PREFIX.to_owned(),
            image,
            command: None,
            args: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            labels,
        }
    }

    /// 이름 접두어를 설정합니다.
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// entrypoint 오버라이드를 설정합니다.
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command: Vec<String> = command.into_iter().map(Into::into).collect();
        self.command = (!command.is_empty()).then_some(command);
        self
    }

    /// 인자 오버라이드를 설정합니다.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.args = (!args.is_empty()).then_some(args);
        self
    }

    /// 종료 유예 시간을 설정합니다.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// 레이블을 추가합니다.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// 고유 이름을 생성하여 디스크립터를 완성합니다.
    pub fn build(self) -> WorkloadDescriptor {
        WorkloadDescriptor {
            name: generate_name(&self.name_prefix),
            unit: ExecutionUnitSpec {
                container_name: TEST_CONTAINER_NAME.to_owned(),
                image: self.image,
                command: self.command,
                args: self.args,
                restart_policy: RestartPolicy::Never,
                termination_grace_period: self.grace_period,
            },
            labels: self.labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_ref_display() {
        assert_eq!(
            ImageRef::entrypoint_tester().to_string(),
            "gcr.io/kubernetes-e2e-test-images/entrypoint-tester:1.0"
        );
        assert_eq!(
            ImageRef::new("mirror.local/", "tester", "2").reference(),
            "mirror.local/tester:2"
        );
        assert_eq!(ImageRef::new("", "tester", "2").to_string(), "tester:2");
    }

    #[test]
    fn build_without_overrides_uses_image_defaults() {
        let desc = build(ImageRef::default(), None, None);
        assert!(desc.unit.command.is_none());
        assert!(desc.unit.args.is_none());
        assert_eq!(desc.unit.restart_policy, RestartPolicy::Never);
        assert_eq!(desc.unit.termination_grace_period, Duration::from_secs(1));
        assert_eq!(desc.unit.container_name, TEST_CONTAINER_NAME);
        assert!(desc.name.starts_with(NAME_PREFIX));
    }

    #[test]
    fn build_with_overrides() {
        let desc = build(
            ImageRef::default(),
            Some(vec!["/ep-2".to_owned()]),
            Some(vec!["override".to_owned(), "arguments".to_owned()]),
        );
        assert_eq!(desc.unit.command, Some(vec!["/ep-2".to_owned()]));
        assert_eq!(
            desc.unit.args,
            Some(vec!["override".to_owned(), "arguments".to_owned()])
        );
    }

    #[test]
    fn names_are_unique_per_build() {
        let a = build(ImageRef::default(), None, None);
        let b = build(ImageRef::default(), None, None);
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn empty_overrides_mean_image_defaults() {
        let desc = WorkloadDescriptorBuilder::new(ImageRef::default())
            .command(Vec::<String>::new())
            .args(Vec::<String>::new())
            .build();
        assert!(desc.unit.command.is_none());
        assert!(desc.unit.args.is_none());
    }

    #[test]
    fn builder_sets_labels_and_grace_period() {
        let desc = WorkloadDescriptor::builder(ImageRef::default())
            .name_prefix("custom-")
            .label(LABEL_CASE, "override all")
            .grace_period(Duration::from_secs(5))
            .build();
        assert!(desc.name.starts_with("custom-"));
        assert_eq!(desc.labels.get(LABEL_MANAGED_BY).map(String::as_str), Some("podcheck"));
        assert_eq!(desc.labels.get(LABEL_CASE).map(String::as_str), Some("override all"));
        assert_eq!(desc.unit.termination_grace_period, Duration::from_secs(5));
    }

    #[test]
    fn restart_policy_defaults_to_never() {
        assert_eq!(RestartPolicy::default(), RestartPolicy::Never);
        assert_eq!(RestartPolicy::OnFailure.to_string(), "on_failure");
    }
}
