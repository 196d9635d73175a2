//! 출력 검증 -- 순서가 있는 패턴 매칭
//!
//! [`OutputVerifier`]는 기대 패턴들을 실제 출력에서 순서대로 찾습니다.
//! 커서는 직전 패턴이 일치한 위치의 끝으로 이동하며 뒤로 돌아가지 않습니다.
//! 처음으로 일치하지 않는 패턴에서 커서 위치부터의 출력 발췌와 함께
//! [`FailureReason::PatternMismatch`]를 반환합니다.
//!
//! 패턴 문자열 표기:
//! - `re:<regex>`: 정규식 (로딩 시 한 번만 컴파일)
//! - `lit:<text>`: 리터럴 (`re:`로 시작하는 리터럴을 쓸 때)
//! - 그 외: 리터럴 부분 문자열

use std::fmt;

use regex::Regex;

use crate::error::HarnessError;
use crate::verdict::{FailureReason, Verdict};

/// 기본 발췌 길이 (문자 수)
pub const DEFAULT_EXCERPT_LEN: usize = 256;

const REGEX_PREFIX: &str = "re:";
const LITERAL_PREFIX: &str = "lit:";

/// 기대 출력 패턴
#[derive(Debug, Clone)]
pub enum Pattern {
    /// 리터럴 부분 문자열
    Literal(String),
    /// 컴파일된 정규식
    Regex(Regex),
}

impl Pattern {
    /// 리터럴 패턴을 생성합니다.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// 정규식 패턴을 컴파일합니다.
    pub fn regex(source: &str) -> Result<Self, HarnessError> {
        Regex::new(source)
            .map(Self::Regex)
            .map_err(|e| HarnessError::InvalidPattern {
                pattern: source.to_owned(),
                reason: e.to_string(),
            })
    }

    /// 접두어 표기(`re:`, `lit:`)를 해석하여 패턴을 생성합니다.
    pub fn parse(spec: &str) -> Result<Self, HarnessError> {
        if let Some(source) = spec.strip_prefix(REGEX_PREFIX) {
            Self::regex(source)
        } else if let Some(text) = spec.strip_prefix(LITERAL_PREFIX) {
            Ok(Self::literal(text))
        } else {
            Ok(Self::literal(spec))
        }
    }

    /// 패턴 원문
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Regex(re) => re.as_str(),
        }
    }

    /// `start` 이후 첫 일치의 끝 바이트 오프셋을 반환합니다.
    fn match_end(&self, haystack: &str, start: usize) -> Option<usize> {
        match self {
            Self::Literal(text) => haystack
                .get(start..)?
                .find(text.as_str())
                .map(|pos| start + pos + text.len()),
            Self::Regex(re) => re.find_at(haystack, start).map(|m| m.end()),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Regex(a), Self::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // 접두어 표기로 다시 파싱해도 같은 패턴이 되도록
            Self::Literal(text)
                if text.starts_with(REGEX_PREFIX) || text.starts_with(LITERAL_PREFIX) =>
            {
                write!(f, "{LITERAL_PREFIX}{text}")
            }
            Self::Literal(text) => write!(f, "{text}"),
            Self::Regex(re) => write!(f, "{REGEX_PREFIX}{}", re.as_str()),
        }
    }
}

/// 순서가 있는 기대 패턴 목록
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectedOutput {
    patterns: Vec<Pattern>,
}

impl ExpectedOutput {
    /// 패턴 목록으로 생성합니다.
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// 리터럴 목록으로 생성합니다.
    pub fn literals<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(Pattern::literal).collect())
    }

    /// 접두어 표기 문자열 목록을 해석합니다.
    ///
    /// # Errors
    ///
    /// 정규식이 잘못된 경우 `HarnessError::InvalidPattern`을 반환합니다.
    pub fn parse<I, S>(specs: I) -> Result<Self, HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = specs
            .into_iter()
            .map(|spec| Pattern::parse(spec.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(patterns))
    }

    /// 패턴 목록
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// 패턴 수
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// 패턴이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl fmt::Display for ExpectedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pattern) in self.patterns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", pattern.to_string())?;
        }
        Ok(())
    }
}

/// 출력 검증기
#[derive(Debug, Clone, Copy)]
pub struct OutputVerifier {
    excerpt_len: usize,
}

impl Default for OutputVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_EXCERPT_LEN)
    }
}

impl OutputVerifier {
    /// 발췌 길이를 지정하여 생성합니다.
    pub fn new(excerpt_len: usize) -> Self {
        Self { excerpt_len }
    }

    /// 실제 출력에서 기대 패턴을 순서대로 찾습니다.
    ///
    /// 패턴 목록이 비어 있으면 항상 `Pass`입니다.
    pub fn verify(&self, actual: &str, expected: &ExpectedOutput) -> Verdict {
        let mut cursor = 0;
        for pattern in expected.patterns() {
            match pattern.match_end(actual, cursor) {
                Some(end) => cursor = end,
                None => {
                    return Verdict::Fail(FailureReason::PatternMismatch {
                        expected: pattern.to_string(),
                        excerpt: excerpt(actual, cursor, self.excerpt_len),
                        offset: cursor,
                    });
                }
            }
        }
        Verdict::Pass
    }
}

/// 기본 발췌 길이로 검증합니다.
pub fn verify(actual: &str, expected: &ExpectedOutput) -> Verdict {
    OutputVerifier::default().verify(actual, expected)
}

/// `offset`부터 최대 `max_chars` 문자를 잘라냅니다.
///
/// `offset`이 문자 경계가 아니면 다음 경계로 이동합니다.
pub fn excerpt(text: &str, offset: usize, max_chars: usize) -> String {
    let mut start = offset.min(text.len());
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mismatch(verdict: Verdict) -> (String, String, usize) {
        match verdict {
            Verdict::Fail(FailureReason::PatternMismatch {
                expected,
                excerpt,
                offset,
            }) => (expected, excerpt, offset),
            other => panic!("expected pattern mismatch, got {other:?}"),
        }
    }

    #[test]
    fn single_literal_pass() {
        let expected = ExpectedOutput::literals(["[/ep default arguments]"]);
        assert!(verify("[/ep default arguments]\n", &expected).is_pass());
    }

    #[test]
    fn patterns_must_appear_in_order() {
        let expected = ExpectedOutput::literals(["a", "b"]);
        assert!(verify("a b", &expected).is_pass());

        let (pattern, excerpt, offset) = mismatch(verify("b a", &expected));
        assert_eq!(pattern, "b");
        assert_eq!(offset, 3);
        assert_eq!(excerpt, "");
    }

    #[test]
    fn patterns_do_not_overlap() {
        let expected = ExpectedOutput::literals(["ab", "b"]);
        let (pattern, _, offset) = mismatch(verify("ab", &expected));
        assert_eq!(pattern, "b");
        assert_eq!(offset, 2);
    }

    #[test]
    fn empty_expected_passes() {
        assert!(verify("anything", &ExpectedOutput::default()).is_pass());
        assert!(verify("", &ExpectedOutput::default()).is_pass());
    }

    #[test]
    fn mismatch_reports_excerpt_from_cursor() {
        let expected = ExpectedOutput::literals(["[/ep", "override"]);
        let (pattern, excerpt, offset) = mismatch(verify("[/ep default arguments]", &expected));
        assert_eq!(pattern, "override");
        assert_eq!(offset, 4);
        assert_eq!(excerpt, " default arguments]");
    }

    #[test]
    fn excerpt_is_bounded() {
        let verifier = OutputVerifier::new(8);
        let expected = ExpectedOutput::literals(["missing"]);
        let (_, excerpt, _) = mismatch(verifier.verify(&"x".repeat(1000), &expected));
        assert_eq!(excerpt.chars().count(), 8);
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let text = "검증 출력";
        assert_eq!(excerpt(text, 0, 2), "검증");
        // offset 1 is inside the first character
        assert_eq!(excerpt(text, 1, 1), "증");
        assert_eq!(excerpt(text, 100, 5), "");
    }

    #[test]
    fn regex_pattern_searches_from_cursor() {
        let expected = ExpectedOutput::parse(["[/ep", r"re:override\s+arguments"]).unwrap();
        assert!(verify("[/ep override   arguments]", &expected).is_pass());

        let expected = ExpectedOutput::parse(["arguments", r"re:\[/ep"]).unwrap();
        let (pattern, _, _) = mismatch(verify("[/ep default arguments]", &expected));
        assert_eq!(pattern, r"re:\[/ep");
    }

    #[test]
    fn pattern_prefix_parsing() {
        assert_eq!(Pattern::parse("plain").unwrap(), Pattern::literal("plain"));
        assert_eq!(Pattern::parse("lit:re:x").unwrap(), Pattern::literal("re:x"));
        assert!(matches!(Pattern::parse("re:a+").unwrap(), Pattern::Regex(_)));
        assert!(matches!(
            Pattern::parse("re:(unclosed"),
            Err(HarnessError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn expected_output_display() {
        let expected = ExpectedOutput::parse(["[/ep-2]", "re:\\d+"]).unwrap();
        assert_eq!(expected.to_string(), r#""[/ep-2]", "re:\\d+""#);
        assert_eq!(expected.len(), 2);
    }

    #[test]
    fn prefixed_literals_display_with_literal_prefix() {
        for text in ["re:x", "lit:y", "plain"] {
            let pattern = Pattern::literal(text);
            let shown = pattern.to_string();
            assert_eq!(Pattern::parse(&shown).unwrap(), pattern, "{shown}");
        }
        assert_eq!(Pattern::literal("re:x").to_string(), "lit:re:x");
        assert_eq!(Pattern::literal("plain").to_string(), "plain");
        assert_eq!(Pattern::regex(r"\d+").unwrap().to_string(), r"re:\d+");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn concatenated_pieces_always_pass(pieces in prop::collection::vec(".{0,12}", 0..8)) {
                let actual: String = pieces.concat();
                let expected = ExpectedOutput::literals(pieces.clone());
                prop_assert!(verify(&actual, &expected).is_pass());
            }

            #[test]
            fn reversed_distinct_tokens_never_pass(
                words in prop::collection::vec("[a-z]{1,8}", 2..8),
                separator in "[ \n]{0,2}",
            ) {
                // 인덱스가 들어간 구분 토큰은 출력 안에서 정확히 한 번씩만 나타남
                let tokens: Vec<String> = words
                    .iter()
                    .enumerate()
                    .map(|(i, word)| format!("<{i}:{word}>"))
                    .collect();
                let reversed: Vec<&str> = tokens.iter().rev().map(String::as_str).collect();
                let actual = reversed.join(&separator);
                let expected = ExpectedOutput::literals(tokens.clone());

                match verify(&actual, &expected) {
                    Verdict::Fail(FailureReason::PatternMismatch { expected, .. }) => {
                        prop_assert_eq!(expected, tokens[1].clone());
                    }
                    other => prop_assert!(false, "expected mismatch, got {:?}", other),
                }
            }

            #[test]
            fn mismatch_offset_and_excerpt_are_bounded(
                actual in ".{0,200}",
                patterns in prop::collection::vec(".{1,6}", 1..5),
                excerpt_len in 1usize..64,
            ) {
                let verifier = OutputVerifier::new(excerpt_len);
                let expected = ExpectedOutput::literals(patterns);
                if let Verdict::Fail(FailureReason::PatternMismatch { excerpt, offset, .. }) =
                    verifier.verify(&actual, &expected)
                {
                    prop_assert!(offset <= actual.len());
                    prop_assert!(excerpt.chars().count() <= excerpt_len);
                    prop_assert!(actual[offset..].starts_with(&excerpt));
                }
            }
        }
    }
}
