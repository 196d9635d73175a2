//! `podcheck run` command handler

use std::io::Write;
use std::sync::Arc;

use tracing::info;

use podcheck_core::config::PodcheckConfig;
use podcheck_harness::{
    BollardControlPlane, ControlPlane, Harness, SuiteReport, SuiteRunner, WorkloadHarnessConfig,
    select_cases,
};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
///
/// Connects to the Docker daemon, runs the selected cases and renders
/// the suite report.
///
/// # Errors
///
/// * `CliError::Core` (config) - invalid overrides, unknown case names or a bad cases file
/// * `CliError::DaemonUnavailable` - the daemon cannot be reached
/// * `CliError::VerificationFailed` - at least one case did not pass
pub async fn execute(
    args: RunArgs,
    config: &PodcheckConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let harness_config = harness_config(&args, config)?;
    let cases = super::resolve_cases(args.cases_file.as_deref())?;
    let cases = select_cases(cases, &args.cases)?;

    info!(
        socket = %harness_config.docker_socket,
        cases = cases.len(),
        concurrency = harness_config.max_concurrent_cases,
        "starting suite"
    );

    let plane = BollardControlPlane::connect_with_socket(&harness_config.docker_socket)
        .map_err(|e| CliError::DaemonUnavailable(e.to_string()))?;
    plane
        .ping()
        .await
        .map_err(|e| CliError::DaemonUnavailable(e.to_string()))?;

    let max_concurrent = harness_config.max_concurrent_cases;
    let harness = Harness::new(Arc::new(plane), harness_config)?;
    let report = SuiteRunner::new(Arc::new(harness))
        .with_max_concurrent(max_concurrent)
        .run(cases)
        .await;

    writer.render(&report)?;

    if !report.all_passed() {
        return Err(CliError::VerificationFailed(format!(
            "{} of {} cases failed",
            report.failed,
            report.reports.len()
        )));
    }

    Ok(())
}

/// core 설정에 CLI 오버라이드를 적용해 하네스 설정을 만듭니다.
fn harness_config(
    args: &RunArgs,
    config: &PodcheckConfig,
) -> Result<WorkloadHarnessConfig, CliError> {
    let mut harness_config = WorkloadHarnessConfig::from_core(config);
    if let Some(timeout) = args.timeout {
        harness_config.timeout_secs = timeout;
    }
    if let Some(concurrency) = args.concurrency {
        harness_config.max_concurrent_cases = concurrency;
    }
    if let Some(socket) = &args.socket {
        harness_config.docker_socket = socket.clone();
    }
    harness_config.validate()?;
    Ok(harness_config)
}

impl Render for SuiteReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{:<24} {:<8} {:<18} {:>10}",
            "Case", "Verdict", "Stage", "Elapsed"
        )?;
        writeln!(w, "{}", "-".repeat(63))?;

        for report in &self.reports {
            let verdict = if report.verdict.is_pass() {
                format!("{:<8}", "PASS").green().bold()
            } else {
                format!("{:<8}", "FAIL").red().bold()
            };
            writeln!(
                w,
                "{:<24} {} {:<18} {:>8}ms",
                report.case,
                verdict,
                report.stage.to_string(),
                report.elapsed_ms
            )?;
            if let Some(reason) = report.verdict.failure() {
                writeln!(w, "  {}", reason.to_string().dimmed())?;
            }
            if !report.cleaned_up && !report.unit_name.is_empty() {
                writeln!(
                    w,
                    "  {}",
                    format!("unit '{}' was not removed", report.unit_name).yellow()
                )?;
            }
        }

        writeln!(w)?;
        let summary = format!(
            "{} passed, {} failed ({}ms)",
            self.passed, self.failed, self.elapsed_ms
        );
        if self.all_passed() {
            writeln!(w, "{}", summary.green())?;
        } else {
            writeln!(w, "{}", summary.red())?;
        }

        Ok(())
    }
}
