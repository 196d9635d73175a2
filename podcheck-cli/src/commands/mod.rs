//! Subcommand handlers

pub mod config;
pub mod list;
pub mod run;
pub mod verify;

use std::path::Path;

use podcheck_harness::{TestCase, entrypoint_suite, load_cases_from_file};

use crate::error::CliError;

/// 케이스 파일이 주어지면 파일에서, 아니면 내장 스위트를 사용합니다.
pub(crate) fn resolve_cases(cases_file: Option<&Path>) -> Result<Vec<TestCase>, CliError> {
    match cases_file {
        Some(path) => Ok(load_cases_from_file(path)?),
        None => Ok(entrypoint_suite()),
    }
}
