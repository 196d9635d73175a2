//! `podcheck verify` command handler
//!
//! Checks already-captured output against expected patterns, without a daemon.

use std::io::{Read, Write};

use serde::Serialize;
use tracing::debug;

use podcheck_harness::verifier::DEFAULT_EXCERPT_LEN;
use podcheck_harness::{ExpectedOutput, OutputVerifier, Verdict};

use crate::cli::VerifyArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `verify` command.
///
/// # Errors
///
/// * `CliError::Core` (config) - a pattern failed to compile
/// * `CliError::Io` - the input could not be read
/// * `CliError::VerificationFailed` - the input did not match
pub async fn execute(args: VerifyArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let expected = ExpectedOutput::parse(&args.expect)?;
    let actual = read_input(&args.input).await?;
    debug!(
        input = %args.input,
        bytes = actual.len(),
        patterns = expected.len(),
        "verifying input"
    );

    let report = verify_input(
        &args.input,
        &actual,
        &expected,
        args.excerpt_len.unwrap_or(DEFAULT_EXCERPT_LEN),
    );
    writer.render(&report)?;

    match report.verdict {
        Verdict::Pass => Ok(()),
        Verdict::Fail(reason) => Err(CliError::VerificationFailed(reason.to_string())),
    }
}

/// 입력을 읽습니다. 잘못된 UTF-8은 파일과 stdin 모두 손실 변환합니다.
async fn read_input(input: &str) -> Result<String, CliError> {
    let bytes = if input == "-" {
        // stdin 읽기는 블로킹이므로 전용 스레드에서 수행
        tokio::task::spawn_blocking(|| read_all(std::io::stdin().lock()))
            .await
            .map_err(|e| CliError::Command(format!("stdin reader failed: {e}")))??
    } else {
        tokio::fs::read(input).await?
    };
    Ok(decode_lossy(bytes))
}

fn read_all(mut reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn verify_input(
    source: &str,
    actual: &str,
    expected: &ExpectedOutput,
    excerpt_len: usize,
) -> VerifyReport {
    VerifyReport {
        source: source.to_owned(),
        expected: expected.patterns().iter().map(ToString::to_string).collect(),
        verdict: OutputVerifier::new(excerpt_len).verify(actual, expected),
    }
}

/// 검증 결과
#[derive(Serialize)]
pub struct VerifyReport {
    pub source: String,
    pub expected: Vec<String>,
    pub verdict: Verdict,
}

impl Render for VerifyReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let source = if self.source == "-" {
            "<stdin>"
        } else {
            self.source.as_str()
        };
        writeln!(w, "Verify: {}", source.bold())?;
        writeln!(w, "  Expected: {:?}", self.expected)?;
        match &self.verdict {
            Verdict::Pass => writeln!(w, "  Result: {}", "PASS".green().bold())?,
            Verdict::Fail(reason) => {
                writeln!(w, "  Result: {}", "FAIL".red().bold())?;
                writeln!(w, "  Reason: {}", reason.to_string().red())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcheck_harness::FailureReason;

    #[test]
    fn test_in_order_input_passes() {
        let expected = ExpectedOutput::literals(["a", "b"]);
        let report = verify_input("-", "a then b", &expected, 16);
        assert!(report.verdict.is_pass());
    }

    #[test]
    fn test_out_of_order_input_fails() {
        let expected = ExpectedOutput::literals(["a", "b"]);
        let report = verify_input("out.txt", "b a", &expected, 16);
        match report.verdict {
            Verdict::Fail(FailureReason::PatternMismatch { expected, offset, .. }) => {
                assert_eq!(expected, "b");
                assert_eq!(offset, 3);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_render_failure() {
        let expected = ExpectedOutput::literals(["missing"]);
        let report = verify_input("-", "nothing here", &expected, 16);

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("<stdin>"));
        assert!(output.contains("FAIL"));
        assert!(output.contains("missing"));
    }

    #[tokio::test]
    async fn test_read_input_from_file() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "[/ep default arguments]\n").expect("should write");

        let content = read_input(path.to_str().expect("utf-8 path"))
            .await
            .expect("should read");
        assert_eq!(content, "[/ep default arguments]\n");
    }

    #[test]
    fn test_invalid_utf8_from_reader_is_decoded_lossily() {
        let raw: &[u8] = b"[/ep \xff default arguments]\n";
        let content = decode_lossy(read_all(raw).expect("should read"));
        assert_eq!(content, "[/ep \u{fffd} default arguments]\n");

        let expected = ExpectedOutput::literals(["[/ep", "default arguments]"]);
        assert!(verify_input("-", &content, &expected, 16).verdict.is_pass());
    }

    #[tokio::test]
    async fn test_invalid_utf8_file_matches_reader_decoding() {
        let dir = tempfile::TempDir::new().expect("should create temp dir");
        let path = dir.path().join("out.bin");
        let raw: &[u8] = b"ok \xc3\x28 done";
        std::fs::write(&path, raw).expect("should write");

        let from_file = read_input(path.to_str().expect("utf-8 path"))
            .await
            .expect("should read");
        let from_reader = decode_lossy(read_all(raw).expect("should read"));
        assert_eq!(from_file, from_reader);
    }

    #[tokio::test]
    async fn test_read_missing_input_is_io_error() {
        let err = read_input("/nonexistent/podcheck/out.txt").await.unwrap_err();
        assert_eq!(err.exit_code(), 10);
    }
}
