//! 설정 관리 — tailforge.toml 파싱 및 런타임 설정
//!
//! [`TailforgeConfig`]는 데몬과 파이프라인의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TAILFORGE_PIPELINE_RESOURCE_DIR=/etc/tailforge/resources` 형식)
//! 3. 설정 파일 (`tailforge.toml`)
//! 4. 기본값 (`Default` 구현)

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TailforgeError};

/// Tailforge 통합 설정
///
/// `tailforge.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TailforgeConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 파이프라인 설정
    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// 일반 설정 (`[general]` 섹션)
#[derive(Debug, Clone, Serialize, Deserialize)]
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
            log_format: "json".to_owned(),
        }
    }
}

/// 파이프라인 설정 (`[pipeline]` 섹션)
///
/// 파이프라인 크레이트는 이 섹션을 자기 설정 타입으로 변환해 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// 활성화 여부
    pub enabled: bool,
    /// 리소스 정의 디렉토리 (LogSource / RuleSet YAML)
    pub resource_dir: String,
    /// 소스별 드레인 주기 (초)
    pub drain_interval_secs: u64,
    /// 리소스 스냅샷 재조정 주기 (초)
    pub reconcile_interval_secs: u64,
    /// 스트리밍 연결 재시도 횟수
    pub stream_retry_attempts: u32,
    /// 스트리밍 재시도 지연 (초)
    pub stream_retry_delay_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            enabled: true,
            resource_dir: "/etc/tailforge/resources".to_owned(),
            drain_interval_secs: 10,
            reconcile_interval_secs: 30,
            stream_retry_attempts: 5,
            stream_retry_delay_secs: 2,
        }
    }
}

impl TailforgeConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TailforgeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TailforgeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TailforgeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TailforgeError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TailforgeError> {
        toml::from_str(toml_str).map_err(|e| {
            TailforgeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TAILFORGE_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TAILFORGE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TAILFORGE_GENERAL_LOG_FORMAT");

        // Pipeline
        override_bool(&mut self.pipeline.enabled, "TAILFORGE_PIPELINE_ENABLED");
        override_string(
            &mut self.pipeline.resource_dir,
            "TAILFORGE_PIPELINE_RESOURCE_DIR",
        );
        override_u64(
            &mut self.pipeline.drain_interval_secs,
            "TAILFORGE_PIPELINE_DRAIN_INTERVAL_SECS",
        );
        override_u64(
            &mut self.pipeline.reconcile_interval_secs,
            "TAILFORGE_PIPELINE_RECONCILE_INTERVAL_SECS",
        );
        override_u32(
            &mut self.pipeline.stream_retry_attempts,
            "TAILFORGE_PIPELINE_STREAM_RETRY_ATTEMPTS",
        );
        override_u64(
            &mut self.pipeline.stream_retry_delay_secs,
            "TAILFORGE_PIPELINE_STREAM_RETRY_DELAY_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TailforgeError> {
        const VALID_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        const VALID_FORMATS: &[&str] = &["json", "pretty"];
        const MAX_INTERVAL_SECS: u64 = 3600;

        if !VALID_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(invalid("general.log_level", "expected one of trace/debug/info/warn/error"));
        }

        if !VALID_FORMATS.contains(&self.general.log_format.as_str()) {
            return Err(invalid("general.log_format", "expected 'json' or 'pretty'"));
        }

        if self.pipeline.enabled && self.pipeline.resource_dir.is_empty() {
            return Err(invalid("pipeline.resource_dir", "must not be empty when enabled"));
        }

        if self.pipeline.drain_interval_secs == 0
            || self.pipeline.drain_interval_secs > MAX_INTERVAL_SECS
        {
            return Err(invalid("pipeline.drain_interval_secs", "must be 1-3600"));
        }

        if self.pipeline.reconcile_interval_secs == 0
            || self.pipeline.reconcile_interval_secs > MAX_INTERVAL_SECS
        {
            return Err(invalid("pipeline.reconcile_interval_secs", "must be 1-3600"));
        }

        if self.pipeline.stream_retry_attempts == 0 {
            return Err(invalid("pipeline.stream_retry_attempts", "must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> TailforgeError {
    TailforgeError::Config(ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    })
}

fn override_string(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_bool(target: &mut bool, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(var, value, "ignoring unparseable bool override"),
        }
    }
}

fn override_u64(target: &mut u64, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(var, value, "ignoring unparseable u64 override"),
        }
    }
}

fn override_u32(target: &mut u32, var: &str) {
    if let Ok(value) = std::env::var(var) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(var, value, "ignoring unparseable u32 override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TailforgeConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_toml_sections() {
        let toml_str = r#"
[general]
log_level = "debug"
log_format = "pretty"

[pipeline]
enabled = true
resource_dir = "/tmp/resources"
drain_interval_secs = 5
reconcile_interval_secs = 15
stream_retry_attempts = 3
stream_retry_delay_secs = 1
"#;
        let config = TailforgeConfig::parse(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.pipeline.resource_dir, "/tmp/resources");
        assert_eq!(config.pipeline.drain_interval_secs, 5);
    }

    #[test]
    fn parse_empty_uses_defaults() {
        let config = TailforgeConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.pipeline.drain_interval_secs, 10);
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let mut config = TailforgeConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_drain_interval() {
        let mut config = TailforgeConfig::default();
        config.pipeline.drain_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_resource_dir_when_enabled() {
        let mut config = TailforgeConfig::default();
        config.pipeline.resource_dir.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn disabled_pipeline_allows_empty_resource_dir() {
        let mut config = TailforgeConfig::default();
        config.pipeline.enabled = false;
        config.pipeline.resource_dir.clear();
        config.validate().unwrap();
    }

    #[test]
    fn parse_invalid_toml_fails() {
        assert!(TailforgeConfig::parse("[general\nlog_level=").is_err());
    }

    #[tokio::test]
    async fn from_file_missing_returns_not_found() {
        let result = TailforgeConfig::from_file("/nonexistent/tailforge.toml").await;
        assert!(matches!(
            result,
            Err(TailforgeError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn load_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tailforge.toml");
        tokio::fs::write(
            &path,
            "[pipeline]\nresource_dir = \"/tmp/r\"\ndrain_interval_secs = 2\n",
        )
        .await
        .unwrap();

        let config = TailforgeConfig::from_file(&path).await.unwrap();
        assert_eq!(config.pipeline.resource_dir, "/tmp/r");
        assert_eq!(config.pipeline.drain_interval_secs, 2);
    }
}
