//! 룰 데이터 타입
//!
//! RuleSet 리소스의 `spec.rules` 항목으로 역직렬화되는 구조체들을
//! 정의합니다. 필드 이름은 리소스 YAML의 camelCase 표기를 따릅니다.
//!
//! # YAML 스키마
//! ```yaml
//! pattern: "%{WORD:level} %{NUMBER:code}"
//! action: conditional
//! conditional:
//!   field1: { type: Int64, grokKey: code }
//!   operator: GreaterThanOrEqualTo
//!   field2: { type: Int64, manualValue: "500" }
//!   actionTrue: forward
//!   actionFalse: discard
//!   metricsTrue:
//!     - name: http.server_errors
//!       kind: Int64Counter
//!       value: { type: Int64, manualValue: "1" }
//!       attributes:
//!         - key: code
//!           value: { type: Int64, grokKey: code }
//! ```

use serde::{Deserialize, Serialize};

use tailforge_core::event::MetricKind;

use crate::error::PipelineError;

/// 하나의 처리 룰
///
/// 액션이 `conditional`이면 `conditional` 트리가 반드시 존재해야 하고,
/// `forward`/`discard`이면 트리는 무시됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// grok 패턴 (네임드 캡처 추출)
    pub pattern: String,
    /// 라인에 적용할 액션
    pub action: RuleAction,
    /// `conditional` 액션일 때 평가할 조건 트리
    #[serde(default)]
    pub conditional: Option<Conditional>,
    /// 룰 수준 메트릭 생성 여부 (기본값 true)
    #[serde(default = "default_true")]
    pub create_metrics: bool,
    /// 룰 수준 메트릭 템플릿 목록 (선언 순서 유지)
    #[serde(default)]
    pub metrics: Vec<MetricTemplate>,
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// 룰의 유효성을 검증합니다.
    ///
    /// 조건 트리의 구조 위반(`conditional` 액션에 중첩 노드 누락)은
    /// 평가 시점이 아니라 여기서 즉시 실패합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.pattern.is_empty() {
            return Err(PipelineError::ResourceValidation {
                name: "(rule)".to_owned(),
                reason: "rule pattern must not be empty".to_owned(),
            });
        }

        if self.action == RuleAction::Conditional {
            let conditional =
                self.conditional
                    .as_ref()
                    .ok_or_else(|| PipelineError::ResourceValidation {
                        name: "(rule)".to_owned(),
                        reason: "action is 'conditional' but no conditional tree is defined"
                            .to_owned(),
                    })?;
            conditional.validate()?;
        }

        for template in &self.metrics {
            template.validate()?;
        }

        Ok(())
    }
}

/// 룰 액션
///
/// `conditional`은 유일한 비종결 상태이며, 트리는 모든 도달 가능한
/// 경로에서 결국 `forward` 또는 `discard`로 끝나야 합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// 원본 라인을 그대로 전달
    Forward,
    /// 전달하지 않음
    Discard,
    /// 조건 트리를 평가해 결정
    Conditional,
}

/// 조건 트리 노드
///
/// 두 필드 값을 비교해 true/false 분기의 액션과 메트릭을 선택합니다.
/// 분기 액션이 `conditional`이면 해당 분기의 중첩 노드로 재귀합니다.
/// 트리는 설정 로딩 시 한 번 만들어지고 평가 중에는 불변입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conditional {
    /// 좌측 피연산자
    pub field1: FieldValue,
    /// 비교 연산자
    pub operator: Operator,
    /// 우측 피연산자 (`Exists`/`DoesNotExist`에서는 불필요)
    #[serde(default)]
    pub field2: FieldValue,
    /// 조건이 참일 때의 액션
    pub action_true: RuleAction,
    /// 조건이 거짓일 때의 액션
    pub action_false: RuleAction,
    /// 참 분기에서 생성할 메트릭
    #[serde(default)]
    pub metrics_true: Vec<MetricTemplate>,
    /// 거짓 분기에서 생성할 메트릭
    #[serde(default)]
    pub metrics_false: Vec<MetricTemplate>,
    /// 참 분기의 중첩 조건 (`action_true == conditional`일 때 필수)
    #[serde(default)]
    pub conditional_true: Option<Box<Conditional>>,
    /// 거짓 분기의 중첩 조건 (`action_false == conditional`일 때 필수)
    #[serde(default)]
    pub conditional_false: Option<Box<Conditional>>,
}

impl Conditional {
    /// 조건 트리의 구조 불변식을 재귀적으로 검증합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.action_true == RuleAction::Conditional {
            match &self.conditional_true {
                Some(nested) => nested.validate()?,
                None => {
                    return Err(PipelineError::ResourceValidation {
                        name: "(conditional)".to_owned(),
                        reason: "actionTrue is 'conditional' but conditionalTrue is missing"
                            .to_owned(),
                    });
                }
            }
        }

        if self.action_false == RuleAction::Conditional {
            match &self.conditional_false {
                Some(nested) => nested.validate()?,
                None => {
                    return Err(PipelineError::ResourceValidation {
                        name: "(conditional)".to_owned(),
                        reason: "actionFalse is 'conditional' but conditionalFalse is missing"
                            .to_owned(),
                    });
                }
            }
        }

        for template in self.metrics_true.iter().chain(&self.metrics_false) {
            template.validate()?;
        }

        Ok(())
    }
}

/// 비교 연산자
///
/// 순서 비교 연산자는 두 피연산자를 10진 정수로 해석합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// 문자열 동등
    Equals,
    /// 문자열 비동등
    DoesNotEqual,
    /// field1이 비어 있지 않음
    Exists,
    /// field1이 비어 있음
    DoesNotExist,
    /// 정수 비교: field1 < field2
    LessThan,
    /// 정수 비교: field1 > field2
    GreaterThan,
    /// 정수 비교: field1 >= field2
    GreaterThanOrEqualTo,
    /// 정수 비교: field1 <= field2
    LessThanOrEqualTo,
}

impl Operator {
    /// 순서 비교 연산자인지 확인합니다.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::LessThan
                | Operator::GreaterThan
                | Operator::GreaterThanOrEqualTo
                | Operator::LessThanOrEqualTo
        )
    }
}

/// 필드 값의 타입
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// 10진 정수
    Int64,
    /// 부동소수점
    Float64,
    /// 문자열 (숫자 해석 없음)
    #[default]
    String,
}

/// grok 캡처 또는 리터럴에서 오는 필드 값
///
/// `grok_key`가 설정되어 있으면 평가 시점에 추출 필드에서 값을 찾고
/// (없으면 빈 문자열), 아니면 `manual_value` 리터럴을 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    /// 값의 타입
    #[serde(rename = "type", default)]
    pub value_type: FieldType,
    /// 추출 필드 키 (설정 시 우선)
    #[serde(default)]
    pub grok_key: Option<String>,
    /// 리터럴 값
    #[serde(default)]
    pub manual_value: Option<String>,
}

impl FieldValue {
    /// grok 캡처에서 값을 가져오는 필드인지 확인합니다.
    pub fn is_grok(&self) -> bool {
        self.grok_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}

/// 메트릭 템플릿
///
/// 라인마다 [`MetricData`](tailforge_core::event::MetricData)로
/// 해석됩니다. `kind`는 해석 값의 타입과 교차 검증하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTemplate {
    /// 메트릭 이름
    pub name: String,
    /// 계측 종류
    pub kind: MetricKind,
    /// 메트릭 값 (Int64 또는 Float64 타입이어야 함)
    pub value: FieldValue,
    /// 속성 템플릿 목록 (선언 순서 유지)
    #[serde(default)]
    pub attributes: Vec<AttributeTemplate>,
}

impl MetricTemplate {
    /// 템플릿의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.is_empty() {
            return Err(PipelineError::ResourceValidation {
                name: "(metric)".to_owned(),
                reason: "metric name must not be empty".to_owned(),
            });
        }

        if self.value.value_type == FieldType::String {
            return Err(PipelineError::ResourceValidation {
                name: self.name.clone(),
                reason: "metric value type must be Int64 or Float64".to_owned(),
            });
        }

        for attribute in &self.attributes {
            if attribute.key.is_empty() {
                return Err(PipelineError::ResourceValidation {
                    name: self.name.clone(),
                    reason: "attribute key must not be empty".to_owned(),
                });
            }
        }

        Ok(())
    }
}

/// 메트릭 속성 템플릿 (키 + 필드 값)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeTemplate {
    /// 속성 키
    pub key: String,
    /// 속성 값
    pub value: FieldValue,
}
