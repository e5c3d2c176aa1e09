//! 로그 소스 모듈 -- 소스 추상화와 구체 구현
//!
//! # 소스 종류
//! - [`PodLineSource`]: 클러스터 pod 컨테이너 로그 스트림
//! - [`LocalLineSource`]: 로컬 파일 테일링 (오프셋 폴링)
//! - [`PvcLineSource`]: 마운트된 볼륨 파일 (스텁)
//! - [`CmdLineSource`]: 커맨드 출력 (스텁)
//!
//! # 아키텍처
//! 각 소스는 `start_stream()`으로 자체 tokio 태스크를 스폰해 내부
//! [`LineBuffer`]에 라인을 밀어 넣고, 인제스트 태스크가 주기마다
//! `drain_new_lines()`로 마지막 드레인 이후의 라인을 가져갑니다.
//! 스트리밍은 취소 신호까지 best-effort로 유지되며, 일시적 실패는
//! 고정 지연의 제한된 재시도 후 포기합니다.

pub mod cmd;
pub mod local;
pub mod pod;
pub mod pvc;

pub use cmd::CmdLineSource;
pub use local::LocalLineSource;
pub use pod::PodLineSource;
pub use pvc::PvcLineSource;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::resource::{LogSourceDef, SourceType};

/// 스트리밍 재시도 정책 (제한된 횟수 + 고정 지연)
#[derive(Debug, Clone, Copy)]
pub struct StreamRetry {
    /// 최대 연속 실패 허용 횟수
    pub attempts: u32,
    /// 재시도 간 지연
    pub delay: Duration,
}

impl StreamRetry {
    /// 파이프라인 설정에서 재시도 정책을 만듭니다.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            attempts: config.stream_retry_attempts,
            delay: config.stream_retry_delay(),
        }
    }
}

/// 스트리밍 가능한 로그 소스
///
/// 구현체는 `start_stream()`에서 자체 태스크를 스폰해 내부 버퍼에
/// 라인을 쌓고, `drain_new_lines()`는 마지막 호출 이후 버퍼링된
/// 라인을 원자적으로 반환하며 비웁니다. `source_info()`는 스펙에서
/// 파생되는 안정적 식별 문자열로, 바인딩 조회의 키입니다.
pub trait LineSource: Send + Sync {
    /// 안정적 소스 식별 문자열
    fn source_info(&self) -> String;

    /// 백그라운드 스트리밍 태스크를 시작합니다.
    ///
    /// 태스크는 취소 신호를 받으면 즉시 종료합니다.
    fn start_stream(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()>;

    /// 마지막 호출 이후 버퍼링된 라인을 반환하고 버퍼를 비웁니다.
    fn drain_new_lines(&self) -> Vec<String>;
}

/// 소스 내부 라인 버퍼
///
/// 스트리밍 태스크가 쌓고 인제스트 태스크가 드레인하는 일시적
/// 우편함입니다. 용량 초과 시 가장 오래된 라인을 드롭합니다.
pub struct LineBuffer {
    /// 버퍼 내부 저장소
    lines: Mutex<Vec<String>>,
    /// 최대 보관 라인 수
    capacity: usize,
}

impl LineBuffer {
    /// 새 라인 버퍼를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// 라인을 버퍼에 추가합니다.
    ///
    /// 용량이 가득 찬 경우 가장 오래된 라인을 드롭하고 `true`를
    /// 반환합니다.
    pub fn push(&self, line: String) -> bool {
        let mut lines = self.lines.lock();
        let mut dropped = false;
        if lines.len() >= self.capacity {
            lines.remove(0);
            dropped = true;
            tracing::warn!(capacity = self.capacity, "line buffer full, dropped oldest line");
        }
        lines.push(line);
        dropped
    }

    /// 버퍼의 모든 라인을 반환하고 비웁니다.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// 현재 버퍼에 쌓인 라인 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

/// 소스 정의를 구체 스트리밍 캐퍼빌리티로 해석합니다.
///
/// 소스 종류의 닫힌 집합에 대해 디스패치합니다. 스펙 페이로드 누락과
/// (PodSource의 경우) 클러스터 클라이언트 부재는 해당 소스만의 설정
/// 에러입니다.
pub fn resolve_source(
    def: &LogSourceDef,
    config: &PipelineConfig,
    kube_client: Option<kube::Client>,
) -> Result<Arc<dyn LineSource>, PipelineError> {
    let retry = StreamRetry::from_config(config);
    let buffer = Arc::new(LineBuffer::new(config.line_buffer_capacity));

    match def.spec.source_type {
        SourceType::PodSource => {
            let spec =
                def.spec
                    .pod_source
                    .as_ref()
                    .ok_or_else(|| PipelineError::SourceConfig {
                        src: def.metadata.name.clone(),
                        reason: "type is PodSource but spec.podSource is missing".to_owned(),
                    })?;
            let client = kube_client.ok_or_else(|| PipelineError::SourceConfig {
                src: def.metadata.name.clone(),
                reason: "PodSource requires a Kubernetes client".to_owned(),
            })?;
            let namespace = if def.metadata.namespace.is_empty() {
                "default".to_owned()
            } else {
                def.metadata.namespace.clone()
            };
            Ok(Arc::new(PodLineSource::new(
                client, namespace, spec, buffer, retry,
            )))
        }
        SourceType::LocalSource => {
            let spec =
                def.spec
                    .local_source
                    .as_ref()
                    .ok_or_else(|| PipelineError::SourceConfig {
                        src: def.metadata.name.clone(),
                        reason: "type is LocalSource but spec.localSource is missing".to_owned(),
                    })?;
            Ok(Arc::new(LocalLineSource::new(
                spec,
                buffer,
                retry,
                Duration::from_millis(config.file_poll_interval_ms),
            )))
        }
        SourceType::PvcSource => {
            let spec =
                def.spec
                    .pvc_source
                    .as_ref()
                    .ok_or_else(|| PipelineError::SourceConfig {
                        src: def.metadata.name.clone(),
                        reason: "type is PVCSource but spec.pvcSource is missing".to_owned(),
                    })?;
            Ok(Arc::new(PvcLineSource::new(spec, buffer)))
        }
        SourceType::CmdSource => {
            let spec =
                def.spec
                    .cmd_source
                    .as_ref()
                    .ok_or_else(|| PipelineError::SourceConfig {
                        src: def.metadata.name.clone(),
                        reason: "type is CmdSource but spec.cmdSource is missing".to_owned(),
                    })?;
            Ok(Arc::new(CmdLineSource::new(spec, buffer)))
        }
    }
}
