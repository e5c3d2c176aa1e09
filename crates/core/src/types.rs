//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 리소스 정의(`LogSource`, `RuleSet`)가 공유하는 메타데이터 엔벨로프와
//! 라벨 셀렉터를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 리소스 메타데이터
///
/// 모든 리소스 정의가 공통으로 가지는 `metadata` 엔벨로프입니다.
/// 라벨은 `BTreeMap`으로 보관하여 스냅샷 비교와 로그 출력이 결정적입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// 리소스 이름 (소스 식별의 기본 키)
    pub name: String,
    /// 네임스페이스
    #[serde(default)]
    pub namespace: String,
    /// 셀렉터 매칭에 사용되는 라벨
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// 라벨 셀렉터
///
/// `match_labels`의 모든 키/값 쌍이 대상 라벨에 동일하게 존재해야
/// 매칭됩니다 (부분집합 AND 매칭). 빈 셀렉터는 모든 대상에 매칭됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    /// 요구 라벨 집합
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl Selector {
    /// 대상 라벨이 이 셀렉터에 매칭되는지 평가합니다.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }

    /// 요구 라벨이 하나도 없는 셀렉터인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }
}

/// 로그 소스 귀속 정보
///
/// 파이프라인 출력 아이템에 태깅되어 다운스트림 라우팅에 사용됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// 소스 리소스 이름
    pub name: String,
    /// 소스 리소스 네임스페이스
    pub namespace: String,
}

impl SourceInfo {
    /// 메타데이터에서 귀속 정보를 만듭니다.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            name: metadata.name.clone(),
            namespace: metadata.namespace.clone(),
        }
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
