//! 리소스 정의 -- LogSource / RuleSet 문서 타입
//!
//! 설정 입력은 `apiVersion`/`kind`/`metadata`/`spec` 엔벨로프를 가진
//! YAML 문서의 전체 스냅샷으로 도착합니다. 이 모듈은 문서 타입과
//! 유효성 검증을 정의하고, [`loader`]가 디렉토리에서 스냅샷을 읽습니다.

pub mod loader;

pub use loader::{ResourceLoader, ResourceSnapshot};

use serde::{Deserialize, Serialize};

use tailforge_core::types::{Metadata, Selector};

use crate::error::PipelineError;
use crate::rule::Rule;

/// LogSource 문서의 `kind` 값
pub const KIND_LOG_SOURCE: &str = "LogSource";
/// RuleSet 문서의 `kind` 값
pub const KIND_RULE_SET: &str = "RuleSet";

/// 로그 소스 정의 문서
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSourceDef {
    /// API 버전 (예: "tailforge.dev/v1")
    pub api_version: String,
    /// 문서 종류 ("LogSource")
    pub kind: String,
    /// 메타데이터 (이름, 네임스페이스, 라벨)
    pub metadata: Metadata,
    /// 소스 스펙
    pub spec: LogSourceSpec,
}

impl LogSourceDef {
    /// 문서의 유효성을 검증합니다.
    ///
    /// `spec.type`이 가리키는 페이로드가 실제로 존재해야 합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.metadata.name.is_empty() {
            return Err(PipelineError::ResourceValidation {
                name: "(unnamed)".to_owned(),
                reason: "metadata.name must not be empty".to_owned(),
            });
        }

        let present = match self.spec.source_type {
            SourceType::PodSource => self.spec.pod_source.is_some(),
            SourceType::PvcSource => self.spec.pvc_source.is_some(),
            SourceType::LocalSource => self.spec.local_source.is_some(),
            SourceType::CmdSource => self.spec.cmd_source.is_some(),
        };

        if !present {
            return Err(PipelineError::ResourceValidation {
                name: self.metadata.name.clone(),
                reason: format!(
                    "spec.type is {:?} but the matching source payload is missing",
                    self.spec.source_type
                ),
            });
        }

        Ok(())
    }

    /// 소스 식별 문자열을 반환합니다.
    ///
    /// 바인딩 조회의 매칭 키이며, 같은 스펙의 스트리밍 캐퍼빌리티가
    /// 반환하는 `source_info()`와 정확히 일치합니다.
    pub fn identity(&self) -> String {
        self.spec.identity()
    }
}

/// 로그 소스 스펙
///
/// `type` 필드가 소스 종류를 판별하고 같은 이름의 페이로드가 구성을
/// 담습니다. 알 수 없는 `type` 값은 역직렬화 단계에서 해당 소스만의
/// 설정 에러로 처리됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSourceSpec {
    /// 소스 종류 판별자
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// 클러스터 pod 컨테이너 로그 스트림
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_source: Option<PodSourceSpec>,
    /// 마운트된 볼륨 파일 (스텁)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc_source: Option<PvcSourceSpec>,
    /// 로컬 파일 경로
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_source: Option<LocalSourceSpec>,
    /// 커맨드 출력 (스텁)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_source: Option<CmdSourceSpec>,
}

impl LogSourceSpec {
    /// 스펙에서 파생되는 소스 식별 문자열
    pub fn identity(&self) -> String {
        match self.source_type {
            SourceType::PodSource => match &self.pod_source {
                Some(pod) => format!("pod: {}/{}", pod.pod.name, pod.pod.container),
                None => "pod: (unconfigured)".to_owned(),
            },
            SourceType::PvcSource => match &self.pvc_source {
                Some(pvc) => format!("pvc: {}:{}", pvc.pvc.name, pvc.log_file_path),
                None => "pvc: (unconfigured)".to_owned(),
            },
            SourceType::LocalSource => match &self.local_source {
                Some(local) => format!("local: {}", local.path),
                None => "local: (unconfigured)".to_owned(),
            },
            SourceType::CmdSource => match &self.cmd_source {
                Some(cmd) => format!("cmd: {}", cmd.command),
                None => "cmd: (unconfigured)".to_owned(),
            },
        }
    }
}

/// 소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    /// 클러스터 pod 컨테이너 로그 스트림
    PodSource,
    /// 마운트된 볼륨 파일
    #[serde(rename = "PVCSource")]
    PvcSource,
    /// 로컬 파일
    LocalSource,
    /// 커맨드 출력
    CmdSource,
}

/// Pod 소스 구성
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodSourceSpec {
    /// 대상 pod
    pub pod: PodRef,
}

/// Pod / 컨테이너 참조
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodRef {
    /// pod 이름
    pub name: String,
    /// 컨테이너 이름
    pub container: String,
}

/// PVC 소스 구성
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvcSourceSpec {
    /// 대상 PVC
    pub pvc: PvcRef,
    /// 볼륨 내 로그 파일 경로
    pub log_file_path: String,
}

/// PVC 참조
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvcRef {
    /// PVC 이름
    pub name: String,
}

/// 로컬 파일 소스 구성
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSourceSpec {
    /// 파일 경로
    pub path: String,
}

/// 커맨드 소스 구성
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdSourceSpec {
    /// 실행할 커맨드
    pub command: String,
}

/// 룰 셋 정의 문서
///
/// 라벨 셀렉터로 소스에 묶이는 순서 있는 룰 목록입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetDef {
    /// API 버전
    pub api_version: String,
    /// 문서 종류 ("RuleSet")
    pub kind: String,
    /// 메타데이터
    pub metadata: Metadata,
    /// 룰 셋 스펙
    pub spec: RuleSetSpec,
}

impl RuleSetDef {
    /// 문서와 포함된 모든 룰의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.metadata.name.is_empty() {
            return Err(PipelineError::ResourceValidation {
                name: "(unnamed)".to_owned(),
                reason: "metadata.name must not be empty".to_owned(),
            });
        }

        if self.spec.rules.is_empty() {
            return Err(PipelineError::ResourceValidation {
                name: self.metadata.name.clone(),
                reason: "spec.rules must not be empty".to_owned(),
            });
        }

        for rule in &self.spec.rules {
            rule.validate().map_err(|e| PipelineError::ResourceValidation {
                name: self.metadata.name.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}

/// 룰 셋 스펙
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetSpec {
    /// 소스 선택용 라벨 셀렉터 (비어 있으면 모든 소스에 매칭)
    #[serde(default)]
    pub selector: Selector,
    /// 순서 있는 룰 목록
    pub rules: Vec<Rule>,
}
