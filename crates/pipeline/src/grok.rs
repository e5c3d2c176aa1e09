//! Grok 패턴 컴파일러 -- `%{PATTERN:name}` 문법의 네임드 캡처 추출
//!
//! 룰의 `pattern` 필드를 정규식으로 확장해 컴파일하고, 로그 라인에서
//! 이름 붙은 필드를 추출합니다. 컴파일된 정규식은 패턴 문자열을 키로
//! 캐싱하여 라인마다 재컴파일하지 않습니다.
//!
//! # 문법
//! - `%{WORD:level}` — 내장 패턴 `WORD`를 `level` 캡처로 확장
//! - `%{NUMBER}` — 캡처 없이 내장 패턴만 확장
//! - 토큰 밖의 텍스트는 정규식 그대로 해석됩니다
//!
//! 내장 패턴 표는 `regex` 크레이트로 표현 가능한 부분집합입니다
//! (룩어라운드/백레퍼런스 없음). 매칭은 앵커 없이 라인 내 탐색입니다.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use regex::Regex;

use crate::error::PipelineError;

/// 내장 grok 패턴 표
///
/// 패턴 본문은 다른 내장 패턴을 `%{NAME}`으로 참조할 수 있습니다.
const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    ("WORD", r"\b\w+\b"),
    ("NOTSPACE", r"\S+"),
    ("SPACE", r"\s*"),
    ("DATA", r".*?"),
    ("GREEDYDATA", r".*"),
    ("INT", r"[+-]?\d+"),
    ("NONNEGINT", r"\d+"),
    ("POSINT", r"[1-9]\d*"),
    ("BASE10NUM", r"[+-]?(?:\d+(?:\.\d+)?|\.\d+)"),
    ("NUMBER", r"%{BASE10NUM}"),
    ("USERNAME", r"[a-zA-Z0-9._-]+"),
    ("HOSTNAME", r"\b[0-9A-Za-z][0-9A-Za-z-]{0,62}(?:\.[0-9A-Za-z][0-9A-Za-z-]{0,62})*\b"),
    ("IPV4", r"(?:\d{1,3}\.){3}\d{1,3}"),
    ("IP", r"%{IPV4}"),
    ("IPORHOST", r"(?:%{IP}|%{HOSTNAME})"),
    (
        "UUID",
        r"[A-Fa-f0-9]{8}-(?:[A-Fa-f0-9]{4}-){3}[A-Fa-f0-9]{12}",
    ),
    (
        "LOGLEVEL",
        r"(?i:trace|debug|info|notice|warn(?:ing)?|err(?:or)?|crit(?:ical)?|fatal|severe|emerg(?:ency)?)",
    ),
    (
        "TIMESTAMP_ISO8601",
        r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?",
    ),
    ("UNIXPATH", r"(?:/[\w.-]+)+"),
    (
        "HTTPMETHOD",
        r"(?:GET|POST|PUT|DELETE|HEAD|OPTIONS|PATCH|TRACE|CONNECT)",
    ),
];

/// 중첩 패턴 참조의 최대 확장 깊이
const MAX_EXPANSION_DEPTH: usize = 8;

/// Grok 컴파일러 -- 패턴 확장, 컴파일, 캐싱, 필드 추출
pub struct GrokCompiler {
    /// 컴파일된 정규식 캐시: 원본 패턴 문자열 -> Regex
    cache: HashMap<String, Regex>,
}

impl GrokCompiler {
    /// 새 컴파일러를 생성합니다.
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// 패턴을 컴파일하거나 캐시에서 가져옵니다.
    pub fn compile(&mut self, pattern: &str) -> Result<&Regex, PipelineError> {
        match self.cache.entry(pattern.to_owned()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let expanded = expand_pattern(pattern, 0)?;
                let regex =
                    Regex::new(&expanded).map_err(|e| PipelineError::GrokCompile {
                        pattern: pattern.to_owned(),
                        reason: e.to_string(),
                    })?;
                Ok(entry.insert(regex))
            }
        }
    }

    /// 라인을 패턴에 매칭시켜 이름 붙은 필드를 추출합니다.
    ///
    /// 매칭 실패는 [`PipelineError::PatternMismatch`]를 반환합니다.
    /// 매칭에 참여하지 않은 선택적 캡처는 결과에 포함되지 않습니다.
    pub fn parse(
        &mut self,
        pattern: &str,
        line: &str,
    ) -> Result<HashMap<String, String>, PipelineError> {
        let regex = self.compile(pattern)?;

        let captures = regex
            .captures(line)
            .ok_or_else(|| PipelineError::PatternMismatch {
                pattern: pattern.to_owned(),
            })?;

        let mut fields = HashMap::new();
        for name in regex.capture_names().flatten() {
            if let Some(matched) = captures.name(name) {
                fields.insert(name.to_owned(), matched.as_str().to_owned());
            }
        }
        Ok(fields)
    }

    /// 캐시에 들어 있는 패턴 수를 반환합니다.
    pub fn cached_patterns(&self) -> usize {
        self.cache.len()
    }
}

impl Default for GrokCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// 내장 패턴 표에서 이름으로 본문을 찾습니다.
fn lookup_builtin(name: &str) -> Option<&'static str> {
    BUILTIN_PATTERNS
        .iter()
        .find(|(pattern_name, _)| *pattern_name == name)
        .map(|(_, body)| *body)
}

/// 캡처 이름이 정규식 그룹 이름으로 유효한지 검사합니다.
fn valid_capture_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `%{NAME}` / `%{NAME:alias}` 토큰을 정규식으로 확장합니다.
fn expand_pattern(pattern: &str, depth: usize) -> Result<String, PipelineError> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err(PipelineError::GrokCompile {
            pattern: pattern.to_owned(),
            reason: format!("pattern expansion exceeds depth {MAX_EXPANSION_DEPTH}"),
        });
    }

    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| PipelineError::GrokCompile {
            pattern: pattern.to_owned(),
            reason: "unterminated %{ token".to_owned(),
        })?;
        let token = &after[..end];

        let (name, alias) = match token.split_once(':') {
            Some((name, alias)) => (name, Some(alias)),
            None => (token, None),
        };

        let body = lookup_builtin(name).ok_or_else(|| PipelineError::UnknownGrokPattern {
            name: name.to_owned(),
        })?;

        // 내장 패턴 본문의 중첩 참조를 재귀 확장
        let body = if body.contains("%{") {
            expand_pattern(body, depth + 1)?
        } else {
            body.to_owned()
        };

        match alias {
            Some(alias) => {
                if !valid_capture_name(alias) {
                    return Err(PipelineError::GrokCompile {
                        pattern: pattern.to_owned(),
                        reason: format!("invalid capture name '{alias}'"),
                    });
                }
                out.push_str("(?P<");
                out.push_str(alias);
                out.push('>');
                out.push_str(&body);
                out.push(')');
            }
            None => {
                out.push_str("(?:");
                out.push_str(&body);
                out.push(')');
            }
        }

        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
