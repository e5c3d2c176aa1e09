//! 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`PipelineSection`](tailforge_core::config::PipelineSection)을
//! 기반으로 파이프라인 전용 설정을 제공합니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// 파이프라인 설정
///
/// core의 `[pipeline]` 섹션에서 파생되며, 파이프라인 내부에서
/// 사용하는 추가 설정을 포함합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리소스 정의 디렉토리 (LogSource / RuleSet YAML)
    pub resource_dir: String,
    /// 소스별 드레인 주기 (초)
    pub drain_interval_secs: u64,
    /// 스트리밍 연결 재시도 횟수
    pub stream_retry_attempts: u32,
    /// 스트리밍 재시도 지연 (초)
    pub stream_retry_delay_secs: u64,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 로컬 파일 소스 폴링 주기 (밀리초)
    pub file_poll_interval_ms: u64,
    /// 라인 버퍼당 최대 보관 라인 수
    pub line_buffer_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resource_dir: "/etc/tailforge/resources".to_owned(),
            drain_interval_secs: 10,
            stream_retry_attempts: 5,
            stream_retry_delay_secs: 2,
            file_poll_interval_ms: 1000,
            line_buffer_capacity: 100_000,
        }
    }
}

impl PipelineConfig {
    /// core의 `[pipeline]` 섹션에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &tailforge_core::config::PipelineSection) -> Self {
        Self {
            enabled: core.enabled,
            resource_dir: core.resource_dir.clone(),
            drain_interval_secs: core.drain_interval_secs,
            stream_retry_attempts: core.stream_retry_attempts,
            stream_retry_delay_secs: core.stream_retry_delay_secs,
            ..Self::default()
        }
    }

    /// 드레인 주기를 `Duration`으로 반환합니다.
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    /// 스트리밍 재시도 지연을 `Duration`으로 반환합니다.
    pub fn stream_retry_delay(&self) -> Duration {
        Duration::from_secs(self.stream_retry_delay_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        const MAX_INTERVAL_SECS: u64 = 3600;
        const MAX_RETRY_ATTEMPTS: u32 = 100;
        const MAX_BUFFER_CAPACITY: usize = 10_000_000;

        if self.enabled && self.resource_dir.is_empty() {
            return Err(PipelineError::Config {
                field: "resource_dir".to_owned(),
                reason: "must not be empty when enabled".to_owned(),
            });
        }

        if self.drain_interval_secs == 0 || self.drain_interval_secs > MAX_INTERVAL_SECS {
            return Err(PipelineError::Config {
                field: "drain_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_INTERVAL_SECS}"),
            });
        }

        if self.stream_retry_attempts == 0 || self.stream_retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(PipelineError::Config {
                field: "stream_retry_attempts".to_owned(),
                reason: format!("must be 1-{MAX_RETRY_ATTEMPTS}"),
            });
        }

        if self.file_poll_interval_ms == 0 {
            return Err(PipelineError::Config {
                field: "file_poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.line_buffer_capacity == 0 || self.line_buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(PipelineError::Config {
                field: "line_buffer_capacity".to_owned(),
                reason: format!("must be 1-{MAX_BUFFER_CAPACITY}"),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 리소스 디렉토리를 설정합니다.
    pub fn resource_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.resource_dir = dir.into();
        self
    }

    /// 드레인 주기(초)를 설정합니다.
    pub fn drain_interval_secs(mut self, secs: u64) -> Self {
        self.config.drain_interval_secs = secs;
        self
    }

    /// 스트리밍 재시도 횟수를 설정합니다.
    pub fn stream_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.stream_retry_attempts = attempts;
        self
    }

    /// 스트리밍 재시도 지연(초)을 설정합니다.
    pub fn stream_retry_delay_secs(mut self, secs: u64) -> Self {
        self.config.stream_retry_delay_secs = secs;
        self
    }

    /// 로컬 파일 폴링 주기(밀리초)를 설정합니다.
    pub fn file_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.file_poll_interval_ms = ms;
        self
    }

    /// 라인 버퍼 용량을 설정합니다.
    pub fn line_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.line_buffer_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
