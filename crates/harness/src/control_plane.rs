//! Control plane abstraction for testability.
//!
//! The [`ControlPlane`] trait is the only way the harness reaches the system
//! that schedules and runs execution units. Production code uses
//! [`BollardControlPlane`], which drives a Docker daemon through `bollard`;
//! tests use `MockControlPlane`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │     Harness      │
//! └────────┬─────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │ControlPlane │ (trait)
//!   └─────────────┘
//!        │     │
//!        ▼     ▼
//!   ┌───────┐ ┌────┐
//!   │Bollard│ │Mock│
//!   └───┬───┘ └────┘
//!       │
//!       ▼
//!   Docker Daemon
//! ```
//!
//! # Docker mapping
//!
//! | descriptor                 | container                         |
//! |----------------------------|-----------------------------------|
//! | `name`                     | container name                    |
//! | `unit.command`             | `Entrypoint`                      |
//! | `unit.args`                | `Cmd`                             |
//! | `unit.restart_policy`      | `HostConfig.RestartPolicy`        |
//! | `unit.termination_grace_period` | `StopTimeout`                |
//! | `labels`                   | container labels                  |

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use podcheck_core::types::{UnitPhase, UnitStatus};

use crate::descriptor::{RestartPolicy, WorkloadDescriptor};
use crate::error::HarnessError;

/// Label carrying the container name inside the execution unit.
const LABEL_CONTAINER: &str = "podcheck.container";

/// 시작에 실패한 컨테이너 제거 제한 시간
const START_FAILURE_CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Opaque identity of a submitted execution unit.
///
/// Created by [`ControlPlane::create_unit`] (or adopted through
/// [`ControlPlane::find_unit`]) and owned by the case that submitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHandle {
    /// Backend identifier (a container ID for Docker)
    pub id: String,
    /// Descriptor name the unit was created with
    pub name: String,
    /// When the harness obtained the handle
    pub submitted_at: SystemTime,
}

impl ExecutionHandle {
    /// Creates a handle from a backend ID and descriptor name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            submitted_at: SystemTime::now(),
        }
    }
}

/// Validates a Docker container ID before it is put into a request path.
///
/// Docker container IDs are 64-character hex strings (or shorter prefix forms).
fn validate_unit_id(id: &str) -> Result<(), HarnessError> {
    if id.is_empty() || id.len() > 64 {
        return Err(HarnessError::Api {
            status: 400,
            message: format!("invalid unit ID: length {} (must be 1-64)", id.len()),
        });
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HarnessError::Api {
            status: 400,
            message: "invalid unit ID: contains non-hex characters".to_owned(),
        });
    }
    Ok(())
}

/// Validates a unit name against Docker's container name rules
/// (`[a-zA-Z0-9][a-zA-Z0-9_.-]*`).
fn validate_unit_name(name: &str) -> Result<(), HarnessError> {
    let mut chars = name.chars();
    let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid_first || !valid_rest || name.len() > 253 {
        return Err(HarnessError::SubmissionRejected {
            name: name.to_owned(),
            reason: "invalid unit name".to_owned(),
        });
    }
    Ok(())
}

/// Trait abstracting the control plane boundary.
///
/// The trait is `Send + Sync + 'static` so one client can be shared by every
/// concurrently running case behind an `Arc`.
///
/// # Error Handling
///
/// - **Not found**: `HarnessError::UnitNotFound`
/// - **Rejected descriptor**: `HarnessError::SubmissionRejected`
/// - **Name already taken**: `HarnessError::IdentityCollision`
/// - **Transport failures**: `HarnessError::Connection` (transient)
pub trait ControlPlane: Send + Sync + 'static {
    /// Creates and starts an execution unit for the descriptor.
    ///
    /// # Errors
    ///
    /// - `HarnessError::SubmissionRejected`: the descriptor was refused
    /// - `HarnessError::IdentityCollision`: a unit with this name exists
    /// - `HarnessError::Connection`: outcome unknown, the unit may exist
    fn create_unit(
        &self,
        descriptor: &WorkloadDescriptor,
    ) -> impl Future<Output = Result<ExecutionHandle, HarnessError>> + Send;

    /// Looks up a unit by descriptor name.
    ///
    /// Returns `Ok(None)` when no unit with that name exists.
    fn find_unit(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ExecutionHandle>, HarnessError>> + Send;

    /// Starts a created unit. Starting a running unit is not an error.
    fn start_unit(
        &self,
        handle: &ExecutionHandle,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;

    /// Observes the unit's current status.
    fn unit_status(
        &self,
        handle: &ExecutionHandle,
    ) -> impl Future<Output = Result<UnitStatus, HarnessError>> + Send;

    /// Returns the concatenated primary output stream (stdout) of the unit.
    fn unit_logs(
        &self,
        handle: &ExecutionHandle,
    ) -> impl Future<Output = Result<String, HarnessError>> + Send;

    /// Removes the unit. Removing a unit that no longer exists is not an error.
    fn remove_unit(
        &self,
        handle: &ExecutionHandle,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;

    /// Checks control plane connectivity.
    fn ping(&self) -> impl Future<Output = Result<(), HarnessError>> + Send;
}

/// Production control plane backed by a Docker daemon.
///
/// Internally uses `Arc<bollard::Docker>` for safe sharing across async tasks.
///
/// # Examples
///
/// ```ignore
/// use podcheck_harness::BollardControlPlane;
///
/// let plane = BollardControlPlane::connect_with_socket("/var/run/docker.sock")?;
/// plane.ping().await?;
/// # Ok::<(), podcheck_harness::HarnessError>(())
/// ```
pub struct BollardControlPlane {
    docker: Arc<bollard::Docker>,
}

impl BollardControlPlane {
    /// Connects to Docker using the default local socket.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Connection` if the client cannot be created.
    pub fn connect_local() -> Result<Self, HarnessError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            HarnessError::Connection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Connection` if the client cannot be created.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, HarnessError> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    HarnessError::Connection(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    async fn create_container(
        &self,
        descriptor: &WorkloadDescriptor,
    ) -> Result<String, bollard::errors::Error> {
        use bollard::container::CreateContainerOptions;

        let options = CreateContainerOptions {
            name: descriptor.name.clone(),
            ..Default::default()
        };
        let response = self
            .docker
            .create_container(Some(options), container_config(descriptor))
            .await?;
        for warning in &response.warnings {
            debug!(unit = %descriptor.name, warning = %warning, "create warning");
        }
        Ok(response.id)
    }

    /// 시작에 실패한 컨테이너를 제한 시간 안에서 제거합니다.
    async fn discard_unstarted(&self, handle: &ExecutionHandle) {
        match tokio::time::timeout(START_FAILURE_CLEANUP_TIMEOUT, self.remove_unit(handle)).await {
            Ok(Ok(())) => debug!(unit = %handle.name, "removed container that failed to start"),
            Ok(Err(e)) => {
                warn!(unit = %handle.name, error = %e, "failed to remove container that failed to start");
            }
            Err(_elapsed) => {
                warn!(unit = %handle.name, "removal of container that failed to start timed out");
            }
        }
    }

    async fn pull_image(&self, descriptor: &WorkloadDescriptor) -> Result<(), HarnessError> {
        use bollard::image::CreateImageOptions;

        let reference = descriptor.unit.image.reference();
        info!(image = %reference, "image not present, pulling");

        let options = CreateImageOptions {
            from_image: reference.clone(),
            ..Default::default()
        };
        self.docker
            .create_image(Some(options), None, None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| match map_bollard_error(e, "pull image") {
                HarnessError::Api { status: 404, message } => HarnessError::SubmissionRejected {
                    name: descriptor.name.clone(),
                    reason: format!("image {reference} not found: {message}"),
                },
                other => other,
            })?;
        Ok(())
    }
}

impl ControlPlane for BollardControlPlane {
    async fn create_unit(
        &self,
        descriptor: &WorkloadDescriptor,
    ) -> Result<ExecutionHandle, HarnessError> {
        validate_unit_name(&descriptor.name)?;

        let id = match self.create_container(descriptor).await {
            Ok(id) => id,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                self.pull_image(descriptor).await?;
                self.create_container(descriptor)
                    .await
                    .map_err(|e| create_error(&descriptor.name, e))?
            }
            Err(e) => return Err(create_error(&descriptor.name, e)),
        };

        let handle = ExecutionHandle::new(id, &descriptor.name);
        if let Err(e) = self.start_unit(&handle).await {
            self.discard_unstarted(&handle).await;
            return Err(e);
        }
        debug!(unit = %handle.name, id = %handle.id, "execution unit started");
        Ok(handle)
    }

    async fn find_unit(&self, name: &str) -> Result<Option<ExecutionHandle>, HarnessError> {
        use bollard::container::InspectContainerOptions;

        validate_unit_name(name)?;

        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => Ok(details.id.map(|id| ExecutionHandle::new(id, name))),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(map_bollard_error(e, "inspect unit")),
        }
    }

    async fn start_unit(&self, handle: &ExecutionHandle) -> Result<(), HarnessError> {
        use bollard::container::StartContainerOptions;

        validate_unit_id(&handle.id)?;

        match self
            .docker
            .start_container(&handle.id, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            // 304: already started
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(not_found_or(e, &handle.name, "start unit")),
        }
    }

    async fn unit_status(&self, handle: &ExecutionHandle) -> Result<UnitStatus, HarnessError> {
        use bollard::container::InspectContainerOptions;

        validate_unit_id(&handle.id)?;

        let details = self
            .docker
            .inspect_container(&handle.id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| not_found_or(e, &handle.name, "inspect unit"))?;

        Ok(status_from_inspect(&details))
    }

    async fn unit_logs(&self, handle: &ExecutionHandle) -> Result<String, HarnessError> {
        use bollard::container::{LogOutput, LogsOptions};

        validate_unit_id(&handle.id)?;

        let options = LogsOptions::<String> {
            stdout: true,
            stderr: false,
            follow: false,
            ..Default::default()
        };

        let chunks: Vec<LogOutput> = self
            .docker
            .logs(&handle.id, Some(options))
            .try_collect()
            .await
            .map_err(|e| match not_found_or(e, &handle.name, "read logs") {
                HarnessError::UnitNotFound(name) => HarnessError::Retrieval {
                    unit: name,
                    reason: "unit was removed before its output was read".to_owned(),
                },
                other => HarnessError::Retrieval {
                    unit: handle.name.clone(),
                    reason: other.to_string(),
                },
            })?;

        let mut output = String::new();
        for chunk in chunks {
            if let LogOutput::StdOut { message } | LogOutput::Console { message } = chunk {
                output.push_str(&String::from_utf8_lossy(&message));
            }
        }
        Ok(output)
    }

    async fn remove_unit(&self, handle: &ExecutionHandle) -> Result<(), HarnessError> {
        use bollard::container::RemoveContainerOptions;

        validate_unit_id(&handle.id)?;

        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self
            .docker
            .remove_container(&handle.id, Some(options))
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(map_bollard_error(e, "remove unit")),
        }
    }

    async fn ping(&self) -> Result<(), HarnessError> {
        self.docker
            .ping()
            .await
            .map_err(|e| HarnessError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }
}

/// Builds the Docker container configuration for a descriptor.
///
/// The image CMD is dropped whenever the entrypoint is overridden, so a
/// command override without args runs with no arguments.
fn container_config(descriptor: &WorkloadDescriptor) -> bollard::container::Config<String> {
    use bollard::models::HostConfig;

    let unit = &descriptor.unit;
    let cmd = match (&unit.command, &unit.args) {
        (_, Some(args)) => Some(args.clone()),
        (Some(_), None) => Some(Vec::new()),
        (None, None) => None,
    };

    let mut labels: HashMap<String, String> = descriptor
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    labels.insert(LABEL_CONTAINER.to_owned(), unit.container_name.clone());

    bollard::container::Config {
        image: Some(unit.image.reference()),
        entrypoint: unit.command.clone(),
        cmd,
        labels: Some(labels),
        stop_timeout: Some(
            i64::try_from(unit.termination_grace_period.as_secs()).unwrap_or(i64::MAX),
        ),
        host_config: Some(HostConfig {
            restart_policy: Some(restart_policy(unit.restart_policy)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn restart_policy(policy: RestartPolicy) -> bollard::models::RestartPolicy {
    use bollard::models::RestartPolicyNameEnum;

    let name = match policy {
        RestartPolicy::Never => RestartPolicyNameEnum::NO,
        RestartPolicy::OnFailure => RestartPolicyNameEnum::ON_FAILURE,
        RestartPolicy::Always => RestartPolicyNameEnum::ALWAYS,
    };
    bollard::models::RestartPolicy {
        name: Some(name),
        maximum_retry_count: None,
    }
}

/// Maps a Docker inspect response onto the observation boundary's status.
fn status_from_inspect(details: &bollard::models::ContainerInspectResponse) -> UnitStatus {
    use bollard::models::ContainerStateStatusEnum as S;

    let state = details.state.as_ref();
    let exit_code = state.and_then(|s| s.exit_code);
    let status = state.and_then(|s| s.status.as_ref());

    let phase = match status {
        None | Some(S::EMPTY) | Some(S::CREATED) => UnitPhase::Pending,
        Some(S::RUNNING) | Some(S::PAUSED) | Some(S::RESTARTING) | Some(S::REMOVING) => {
            UnitPhase::Running
        }
        Some(S::EXITED) if exit_code == Some(0) => UnitPhase::Succeeded,
        Some(S::EXITED) | Some(S::DEAD) => UnitPhase::Failed,
    };

    let mut restart_count = details
        .restart_count
        .and_then(|c| u32::try_from(c).ok())
        .unwrap_or(0);
    if matches!(status, Some(S::RESTARTING)) {
        restart_count = restart_count.max(1);
    }

    UnitStatus {
        phase,
        exit_code: if phase.is_terminal() { exit_code } else { None },
        restart_count,
    }
}

fn map_bollard_error(err: bollard::errors::Error, context: &str) -> HarnessError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => HarnessError::Api {
            status: status_code,
            message: format!("{context}: {message}"),
        },
        bollard::errors::Error::RequestTimeoutError => HarnessError::OperationTimeout {
            operation: "docker request",
            elapsed_ms: 120_000,
        },
        other => HarnessError::Connection(format!("{context}: {other}")),
    }
}

fn not_found_or(err: bollard::errors::Error, name: &str, context: &str) -> HarnessError {
    match map_bollard_error(err, context) {
        HarnessError::Api { status: 404, .. } => HarnessError::UnitNotFound(name.to_owned()),
        other => other,
    }
}

fn create_error(name: &str, err: bollard::errors::Error) -> HarnessError {
    match map_bollard_error(err, "create unit") {
        HarnessError::Api { status: 409, .. } => HarnessError::IdentityCollision(name.to_owned()),
        HarnessError::Api {
            status: status @ (400 | 403 | 404 | 422),
            message,
        } => HarnessError::SubmissionRejected {
            name: name.to_owned(),
            reason: format!("status {status}: {message}"),
        },
        other => other,
    }
}

/// Output of the entrypoint-tester image for a unit spec.
///
/// The image prints `[<entrypoint> <args...>]`; its defaults are `/ep` and
/// `default arguments`, and the default arguments are dropped when the
/// entrypoint is overridden.
#[cfg(test)]
pub(crate) fn emulate_entrypoint_tester(unit: &crate::descriptor::ExecutionUnitSpec) -> String {
    let (entrypoint, default_args): (Vec<String>, Vec<String>) = match &unit.command {
        Some(command) => (command.clone(), Vec::new()),
        None => (
            vec!["/ep".to_owned()],
            vec!["default".to_owned(), "arguments".to_owned()],
        ),
    };
    let args = unit.args.clone().unwrap_or(default_args);
    let words: Vec<String> = entrypoint.into_iter().chain(args).collect();
    format!("[{}]\n", words.join(" "))
}

/// Scripted observation returned by `MockControlPlane::unit_status`.
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum MockObservation {
    /// Report this status
    Status(UnitStatus),
    /// Fail with a transient connection error
    Transient,
    /// Fail with a non-transient not-found error
    Gone,
    /// Never return
    Hang,
}

/// Scripted failure returned by `MockControlPlane::create_unit`.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCreateFailure {
    /// Connection error before the unit exists
    TransientBeforeCreate,
    /// Connection error after the unit was created (ambiguous outcome)
    TransientAfterCreate,
    /// Unit created, then the start was rejected (e.g. missing entrypoint binary)
    RejectedAfterCreate,
}

/// 테스트용 Mock 컨트롤 플레인
///
/// 상태 관찰 결과를 스크립트로 지정할 수 있고, 스크립트가 비면
/// `never_terminal` 설정에 따라 Running 또는 Succeeded(0)를 보고합니다.
/// 로그는 entrypoint-tester 이미지의 출력을 흉내 냅니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockControlPlane {
    observations: std::sync::Mutex<std::collections::VecDeque<MockObservation>>,
    create_failures: std::sync::Mutex<std::collections::VecDeque<MockCreateFailure>>,
    units: std::sync::Mutex<HashMap<String, WorkloadDescriptor>>,
    started: std::sync::Mutex<Vec<String>>,
    removed: std::sync::Mutex<Vec<String>>,
    create_calls: std::sync::atomic::AtomicU32,
    status_calls: std::sync::atomic::AtomicU32,
    next_id: std::sync::atomic::AtomicU64,
    /// 제출을 거부할 사유
    pub reject_reason: Option<String>,
    /// 로그 조회를 실패시킬지 여부
    pub fail_logs: bool,
    /// 고정 출력 (설정 시 이미지 흉내 대신 사용)
    pub fixed_output: Option<String>,
    /// 스크립트가 빈 뒤 계속 Running을 보고할지 여부
    pub never_terminal: bool,
    /// 정리 호출을 실패시킬지 여부
    pub fail_remove: bool,
    /// 시작 호출을 실패시킬지 여부 (5xx)
    pub fail_start: bool,
}

#[cfg(test)]
impl MockControlPlane {
    /// 즉시 성공하는 mock을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 상태 관찰 스크립트를 설정합니다.
    pub fn with_observations(self, observations: Vec<MockObservation>) -> Self {
        *self.observations.lock().unwrap() = observations.into();
        self
    }

    /// 제출 실패 스크립트를 설정합니다.
    pub fn with_create_failures(self, failures: Vec<MockCreateFailure>) -> Self {
        *self.create_failures.lock().unwrap() = failures.into();
        self
    }

    /// 제출을 거부하도록 설정합니다.
    pub fn rejecting(mut self, reason: &str) -> Self {
        self.reject_reason = Some(reason.to_owned());
        self
    }

    /// 로그 조회가 실패하도록 설정합니다.
    pub fn with_failing_logs(mut self) -> Self {
        self.fail_logs = true;
        self
    }

    /// 고정 출력을 설정합니다.
    pub fn with_output(mut self, output: &str) -> Self {
        self.fixed_output = Some(output.to_owned());
        self
    }

    /// 종료 상태에 도달하지 않도록 설정합니다.
    pub fn never_terminal(mut self) -> Self {
        self.never_terminal = true;
        self
    }

    /// 정리가 실패하도록 설정합니다.
    pub fn with_failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    /// 시작 호출이 항상 5xx로 실패하도록 설정합니다.
    pub fn with_failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// 디스크립터를 등록하지 않은 채로 이미 존재하는 이름을 만듭니다.
    pub fn with_existing_unit(self, descriptor: WorkloadDescriptor) -> Self {
        self.units
            .lock()
            .unwrap()
            .insert("0000existing".to_owned(), descriptor);
        self
    }

    /// `create_unit` 호출 횟수
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// `unit_status` 호출 횟수
    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// 현재 존재하는 실행 단위 수
    pub fn live_units(&self) -> usize {
        self.units.lock().unwrap().len()
    }

    /// 제거된 실행 단위 ID 목록
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    /// 시작된 실행 단위 ID 목록
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    fn descriptor(&self, handle: &ExecutionHandle) -> Result<WorkloadDescriptor, HarnessError> {
        self.units
            .lock()
            .unwrap()
            .get(&handle.id)
            .cloned()
            .ok_or_else(|| HarnessError::UnitNotFound(handle.name.clone()))
    }
}

#[cfg(test)]
impl ControlPlane for MockControlPlane {
    async fn create_unit(
        &self,
        descriptor: &WorkloadDescriptor,
    ) -> Result<ExecutionHandle, HarnessError> {
        use std::sync::atomic::Ordering;

        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.reject_reason {
            return Err(HarnessError::SubmissionRejected {
                name: descriptor.name.clone(),
                reason: reason.clone(),
            });
        }

        let failure = self.create_failures.lock().unwrap().pop_front();
        if failure == Some(MockCreateFailure::TransientBeforeCreate) {
            return Err(HarnessError::Connection("mock connection reset".to_owned()));
        }

        let mut units = self.units.lock().unwrap();
        if units.values().any(|d| d.name == descriptor.name) {
            return Err(HarnessError::IdentityCollision(descriptor.name.clone()));
        }
        let id = format!("{:012x}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        units.insert(id.clone(), descriptor.clone());
        drop(units);

        match failure {
            Some(MockCreateFailure::TransientAfterCreate) => {
                return Err(HarnessError::Connection("mock response lost".to_owned()));
            }
            Some(MockCreateFailure::RejectedAfterCreate) => {
                return Err(HarnessError::Api {
                    status: 400,
                    message: "start unit: exec: \"/missing\": no such file or directory"
                        .to_owned(),
                });
            }
            _ => {}
        }

        self.started.lock().unwrap().push(id.clone());
        Ok(ExecutionHandle::new(id, &descriptor.name))
    }

    async fn find_unit(&self, name: &str) -> Result<Option<ExecutionHandle>, HarnessError> {
        Ok(self
            .units
            .lock()
            .unwrap()
            .iter()
            .find(|(_, d)| d.name == name)
            .map(|(id, d)| ExecutionHandle::new(id.clone(), &d.name)))
    }

    async fn start_unit(&self, handle: &ExecutionHandle) -> Result<(), HarnessError> {
        self.descriptor(handle)?;
        if self.fail_start {
            return Err(HarnessError::Api {
                status: 500,
                message: "mock start failed".to_owned(),
            });
        }
        let mut started = self.started.lock().unwrap();
        if !started.contains(&handle.id) {
            started.push(handle.id.clone());
        }
        Ok(())
    }

    async fn unit_status(&self, handle: &ExecutionHandle) -> Result<UnitStatus, HarnessError> {
        self.status_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.descriptor(handle)?;

        let next = self.observations.lock().unwrap().pop_front();
        match next {
            Some(MockObservation::Status(status)) => Ok(status),
            Some(MockObservation::Transient) => {
                Err(HarnessError::Connection("mock api unavailable".to_owned()))
            }
            Some(MockObservation::Gone) => Err(HarnessError::UnitNotFound(handle.name.clone())),
            Some(MockObservation::Hang) => std::future::pending().await,
            None if self.never_terminal => Ok(UnitStatus::new(UnitPhase::Running)),
            None => Ok(UnitStatus::new(UnitPhase::Succeeded).with_exit_code(0)),
        }
    }

    async fn unit_logs(&self, handle: &ExecutionHandle) -> Result<String, HarnessError> {
        if self.fail_logs {
            return Err(HarnessError::Retrieval {
                unit: handle.name.clone(),
                reason: "mock log backend unavailable".to_owned(),
            });
        }
        let descriptor = self.descriptor(handle)?;
        Ok(self
            .fixed_output
            .clone()
            .unwrap_or_else(|| emulate_entrypoint_tester(&descriptor.unit)))
    }

    async fn remove_unit(&self, handle: &ExecutionHandle) -> Result<(), HarnessError> {
        if self.fail_remove {
            return Err(HarnessError::Connection("mock remove failed".to_owned()));
        }
        self.units.lock().unwrap().remove(&handle.id);
        self.removed.lock().unwrap().push(handle.id.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), HarnessError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{self, ImageRef};
    use bollard::models::{ContainerInspectResponse, ContainerState, ContainerStateStatusEnum};

    fn inspect(status: ContainerStateStatusEnum, exit_code: Option<i64>) -> ContainerInspectResponse {
        ContainerInspectResponse {
            state: Some(ContainerState {
                status: Some(status),
                exit_code,
                ..Default::default()
            }),
            restart_count: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn validate_unit_id_accepts_hex() {
        assert!(validate_unit_id("abc123def456").is_ok());
        assert!(validate_unit_id("").is_err());
        assert!(validate_unit_id("../containers").is_err());
        assert!(validate_unit_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn validate_unit_name_follows_docker_rules() {
        assert!(validate_unit_name("client-containers-0b7e").is_ok());
        assert!(validate_unit_name("a.b_c-d").is_ok());
        assert!(validate_unit_name("").is_err());
        assert!(validate_unit_name("-leading-dash").is_err());
        assert!(validate_unit_name("has space").is_err());
        assert!(validate_unit_name("slash/name").is_err());
    }

    #[test]
    fn container_config_without_overrides_keeps_image_defaults() {
        let desc = descriptor::build(ImageRef::default(), None, None);
        let config = container_config(&desc);
        assert_eq!(
            config.image.as_deref(),
            Some("gcr.io/kubernetes-e2e-test-images/entrypoint-tester:1.0")
        );
        assert!(config.entrypoint.is_none());
        assert!(config.cmd.is_none());
        assert_eq!(config.stop_timeout, Some(1));
    }

    #[test]
    fn container_config_command_override_clears_cmd() {
        let desc = descriptor::build(ImageRef::default(), Some(vec!["/ep-2".to_owned()]), None);
        let config = container_config(&desc);
        assert_eq!(config.entrypoint, Some(vec!["/ep-2".to_owned()]));
        assert_eq!(config.cmd, Some(Vec::new()));
    }

    #[test]
    fn container_config_args_override_keeps_entrypoint() {
        let desc = descriptor::build(
            ImageRef::default(),
            None,
            Some(vec!["override".to_owned(), "arguments".to_owned()]),
        );
        let config = container_config(&desc);
        assert!(config.entrypoint.is_none());
        assert_eq!(
            config.cmd,
            Some(vec!["override".to_owned(), "arguments".to_owned()])
        );
    }

    #[test]
    fn container_config_restart_policy_and_labels() {
        let desc = descriptor::build(ImageRef::default(), None, None);
        let config = container_config(&desc);
        let policy = config
            .host_config
            .and_then(|h| h.restart_policy)
            .and_then(|p| p.name);
        assert_eq!(policy, Some(bollard::models::RestartPolicyNameEnum::NO));
        let labels = config.labels.unwrap_or_default();
        assert_eq!(
            labels.get(LABEL_CONTAINER).map(String::as_str),
            Some("test-container")
        );
        assert_eq!(
            labels
                .get(crate::descriptor::LABEL_MANAGED_BY)
                .map(String::as_str),
            Some("podcheck")
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_from_inspect(&inspect(ContainerStateStatusEnum::CREATED, None)).phase,
            UnitPhase::Pending
        );
        assert_eq!(
            status_from_inspect(&inspect(ContainerStateStatusEnum::RUNNING, Some(0))).phase,
            UnitPhase::Running
        );
        let succeeded = status_from_inspect(&inspect(ContainerStateStatusEnum::EXITED, Some(0)));
        assert_eq!(succeeded.phase, UnitPhase::Succeeded);
        assert_eq!(succeeded.exit_code, Some(0));
        let failed = status_from_inspect(&inspect(ContainerStateStatusEnum::EXITED, Some(3)));
        assert_eq!(failed.phase, UnitPhase::Failed);
        assert_eq!(failed.exit_code, Some(3));
        assert_eq!(
            status_from_inspect(&inspect(ContainerStateStatusEnum::DEAD, None)).phase,
            UnitPhase::Failed
        );
        assert_eq!(
            status_from_inspect(&ContainerInspectResponse::default()).phase,
            UnitPhase::Pending
        );
    }

    #[test]
    fn restarting_counts_as_restart() {
        let status = status_from_inspect(&inspect(ContainerStateStatusEnum::RESTARTING, None));
        assert_eq!(status.phase, UnitPhase::Running);
        assert_eq!(status.restart_count, 1);
    }

    #[test]
    fn error_mapping() {
        let conflict = bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message: "name in use".to_owned(),
        };
        assert!(matches!(
            create_error("dup", conflict),
            HarnessError::IdentityCollision(_)
        ));

        let bad = bollard::errors::Error::DockerResponseServerError {
            status_code: 400,
            message: "invalid".to_owned(),
        };
        assert!(matches!(
            create_error("x", bad),
            HarnessError::SubmissionRejected { .. }
        ));

        let missing = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "no such container".to_owned(),
        };
        assert!(matches!(
            not_found_or(missing, "gone", "inspect"),
            HarnessError::UnitNotFound(_)
        ));

        let busy = bollard::errors::Error::DockerResponseServerError {
            status_code: 503,
            message: "busy".to_owned(),
        };
        assert!(map_bollard_error(busy, "inspect").is_transient());
    }

    #[test]
    fn emulated_output_follows_precedence_rules() {
        let spec = |command: Option<Vec<&str>>, args: Option<Vec<&str>>| {
            descriptor::build(
                ImageRef::default(),
                command.map(|c| c.into_iter().map(str::to_owned).collect()),
                args.map(|a| a.into_iter().map(str::to_owned).collect()),
            )
            .unit
        };
        assert_eq!(
            emulate_entrypoint_tester(&spec(None, None)),
            "[/ep default arguments]\n"
        );
        assert_eq!(
            emulate_entrypoint_tester(&spec(None, Some(vec!["override", "arguments"]))),
            "[/ep override arguments]\n"
        );
        assert_eq!(
            emulate_entrypoint_tester(&spec(Some(vec!["/ep-2"]), None)),
            "[/ep-2]\n"
        );
        assert_eq!(
            emulate_entrypoint_tester(&spec(
                Some(vec!["/ep-2"]),
                Some(vec!["override", "arguments"])
            )),
            "[/ep-2 override arguments]\n"
        );
    }

    #[tokio::test]
    async fn mock_create_and_find() {
        let plane = MockControlPlane::new();
        let desc = descriptor::build(ImageRef::default(), None, None);
        let handle = plane.create_unit(&desc).await.unwrap();
        assert_eq!(handle.name, desc.name);

        let found = plane.find_unit(&desc.name).await.unwrap();
        assert_eq!(found.map(|h| h.id), Some(handle.id.clone()));
        assert!(plane.find_unit("missing").await.unwrap().is_none());

        let collision = plane.create_unit(&desc).await;
        assert!(matches!(collision, Err(HarnessError::IdentityCollision(_))));
    }

    #[tokio::test]
    async fn mock_scripted_observations() {
        let plane = MockControlPlane::new().with_observations(vec![
            MockObservation::Status(UnitStatus::new(UnitPhase::Pending)),
            MockObservation::Transient,
            MockObservation::Gone,
        ]);
        let desc = descriptor::build(ImageRef::default(), None, None);
        let handle = plane.create_unit(&desc).await.unwrap();

        assert_eq!(
            plane.unit_status(&handle).await.unwrap().phase,
            UnitPhase::Pending
        );
        assert!(plane.unit_status(&handle).await.unwrap_err().is_transient());
        assert!(matches!(
            plane.unit_status(&handle).await,
            Err(HarnessError::UnitNotFound(_))
        ));
        assert_eq!(
            plane.unit_status(&handle).await.unwrap().phase,
            UnitPhase::Succeeded
        );
        assert_eq!(plane.status_calls(), 4);
    }

    #[tokio::test]
    async fn mock_remove_then_logs_fail() {
        let plane = MockControlPlane::new();
        let desc = descriptor::build(ImageRef::default(), None, None);
        let handle = plane.create_unit(&desc).await.unwrap();
        assert_eq!(
            plane.unit_logs(&handle).await.unwrap(),
            "[/ep default arguments]\n"
        );
        plane.remove_unit(&handle).await.unwrap();
        assert_eq!(plane.live_units(), 0);
        assert!(plane.unit_logs(&handle).await.is_err());
    }

    #[test]
    fn control_plane_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<MockControlPlane>();
        assert_send_sync::<BollardControlPlane>();
    }
}
