//! `podcheck list` command handler

use std::io::Write;

use serde::Serialize;

use podcheck_harness::TestCase;

use crate::cli::ListArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub fn execute(args: ListArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let cases = super::resolve_cases(args.cases_file.as_deref())?;
    let report = CaseListReport::from_cases(&cases);
    writer.render(&report)
}

/// 케이스 목록
#[derive(Serialize)]
pub struct CaseListReport {
    pub cases: Vec<CaseEntry>,
}

/// 케이스 한 건의 요약
#[derive(Serialize)]
pub struct CaseEntry {
    pub name: String,
    pub description: String,
    pub command: Option<Vec<String>>,
    pub args: Option<Vec<String>>,
    pub expected: Vec<String>,
}

impl CaseListReport {
    fn from_cases(cases: &[TestCase]) -> Self {
        let cases = cases
            .iter()
            .map(|case| CaseEntry {
                name: case.name.clone(),
                description: case.description.clone(),
                command: case.command.clone(),
                args: case.args.clone(),
                expected: case
                    .expected
                    .patterns()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            })
            .collect();
        Self { cases }
    }
}

fn render_override(value: Option<&Vec<String>>) -> String {
    match value {
        Some(items) => format!("{items:?}"),
        None => "(image default)".to_owned(),
    }
}

impl Render for CaseListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.cases.is_empty() {
            writeln!(w, "No cases defined.")?;
            return Ok(());
        }

        for case in &self.cases {
            writeln!(w, "{}", case.name.bold())?;
            if !case.description.is_empty() {
                writeln!(w, "  {}", case.description.dimmed())?;
            }
            writeln!(w, "  command:  {}", render_override(case.command.as_ref()))?;
            writeln!(w, "  args:     {}", render_override(case.args.as_ref()))?;
            writeln!(w, "  expected: {:?}", case.expected)?;
        }
        writeln!(w)?;
        writeln!(w, "Total: {} cases", self.cases.len())?;

        Ok(())
    }
}
