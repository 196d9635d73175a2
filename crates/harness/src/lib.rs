#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`HarnessError`)
//! - [`config`]: Harness configuration (`WorkloadHarnessConfig`, builder)
//! - [`descriptor`]: Workload declaration (`WorkloadDescriptor`, `ImageRef`, builder)
//! - [`control_plane`]: Control plane abstraction (`ControlPlane` trait, `BollardControlPlane`)
//! - [`submit`]: Duplicate-free submission (`SubmissionClient`)
//! - [`watcher`]: Terminal state polling (`CompletionWatcher`, `Backoff`)
//! - [`retriever`]: Output retrieval (`OutputRetriever`)
//! - [`verifier`]: Ordered pattern matching (`OutputVerifier`, `ExpectedOutput`)
//! - [`verdict`]: Case outcome (`Verdict`, `FailureReason`)
//! - [`harness`]: Per-case runner (`Harness`, `CaseReport`)
//! - [`suite`]: Test cases and concurrent suite runner (`TestCase`, `SuiteRunner`)

pub mod config;
pub mod control_plane;
pub mod descriptor;
pub mod error;
pub mod harness;
pub mod retriever;
pub mod submit;
pub mod suite;
pub mod verdict;
pub mod verifier;
pub mod watcher;

// --- Public API Re-exports ---

// Runner
pub use harness::{CaseReport, Harness, Stage};

// Configuration
pub use config::{WorkloadHarnessConfig, WorkloadHarnessConfigBuilder};

// Error
pub use error::HarnessError;

// Descriptor
pub use descriptor::{
    ExecutionUnitSpec, ImageRef, RestartPolicy, WorkloadDescriptor, WorkloadDescriptorBuilder,
};

// Control plane
pub use control_plane::{BollardControlPlane, ControlPlane, ExecutionHandle};

// Pipeline stages
pub use retriever::OutputRetriever;
pub use submit::SubmissionClient;
pub use watcher::{Backoff, CompletionWatcher, WatchOutcome};

// Verification
pub use verdict::{FailureReason, Verdict};
pub use verifier::{ExpectedOutput, OutputVerifier, Pattern, verify};

// Suite
pub use suite::{
    SuiteReport, SuiteRunner, TestCase, entrypoint_suite, load_cases_from_file, parse_cases,
    select_cases,
};
