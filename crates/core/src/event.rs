//! 파이프라인 출력 단위 — 익스포터 레이어와의 교환 타입
//!
//! 룰 평가가 만들어내는 [`ProcessedDataItem`]과 그 안의 타입 지정 메트릭
//! [`MetricData`]를 정의합니다. 아이템은 소스별 인제스트 태스크가 생성해
//! 공유 출력 버퍼에 쌓고, 익스포터 레이어가 드레인해 소비합니다.
//! 버퍼는 일시적인 우편함이며 드레인은 파괴적입니다 (드레인된 아이템은
//! 버퍼에서 제거됩니다).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::SourceInfo;

/// 메트릭 계측 종류
///
/// 템플릿의 `kind`를 그대로 보존합니다. 값 타입과의 교차 검증은
/// 이 레이어에서 수행하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// 정수 카운터
    Int64Counter,
    /// 실수 카운터
    Float64Counter,
    /// 정수 게이지
    Int64Gauge,
    /// 실수 게이지
    Float64Gauge,
    /// 정수 히스토그램
    Int64Histogram,
    /// 실수 히스토그램
    Float64Histogram,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Int64Counter => "Int64Counter",
            MetricKind::Float64Counter => "Float64Counter",
            MetricKind::Int64Gauge => "Int64Gauge",
            MetricKind::Float64Gauge => "Float64Gauge",
            MetricKind::Int64Histogram => "Int64Histogram",
            MetricKind::Float64Histogram => "Float64Histogram",
        };
        write!(f, "{name}")
    }
}

/// 타입이 확정된 속성 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// 정수 값
    Int64(i64),
    /// 실수 값
    Float64(f64),
    /// 문자열 값
    String(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int64(v) => write!(f, "{v}"),
            AttributeValue::Float64(v) => write!(f, "{v}"),
            AttributeValue::String(v) => write!(f, "{v}"),
        }
    }
}

/// 메트릭 속성 (키 + 타입 지정 값)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAttribute {
    /// 속성 키
    pub key: String,
    /// 속성 값
    pub value: AttributeValue,
}

/// 하나의 로그 라인에 대해 완전히 해석된 메트릭 데이터 포인트
///
/// `MetricTemplate`의 타입 지정 대응물입니다. 값은 템플릿의 타입에 따라
/// `value_int` 또는 `value_float` 중 하나에 채워집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    /// 메트릭 이름 (템플릿 그대로)
    pub name: String,
    /// 계측 종류 (템플릿 그대로)
    pub kind: MetricKind,
    /// 정수 값 (`Int64` 타입일 때)
    #[serde(default)]
    pub value_int: i64,
    /// 실수 값 (`Float64` 타입일 때)
    #[serde(default)]
    pub value_float: f64,
    /// 타입 지정 속성 목록 (템플릿 선언 순서 유지)
    #[serde(default)]
    pub attributes: Vec<MetricAttribute>,
}

impl fmt::Display for MetricData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} kind={} int={} float={} attrs={}",
            self.name,
            self.kind,
            self.value_int,
            self.value_float,
            self.attributes.len(),
        )
    }
}

/// 파이프라인 출력의 원자 단위
///
/// 전달할 로그 텍스트와 메트릭 중 하나 이상을 담고 소스 귀속 정보로
/// 태깅됩니다. `forward_log`가 비어 있으면 전달할 로그가 없다는 뜻입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDataItem {
    /// 전달할 로그 텍스트 (비어 있으면 전달 없음)
    pub forward_log: String,
    /// 해석된 메트릭 (없을 수 있음)
    pub metric: Option<MetricData>,
    /// 소스 귀속 정보
    pub source: SourceInfo,
}

impl ProcessedDataItem {
    /// 전달할 로그가 있는지 확인합니다.
    pub fn has_forward_log(&self) -> bool {
        !self.forward_log.is_empty()
    }
}
