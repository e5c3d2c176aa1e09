//! 메트릭 템플레이팅 -- 템플릿과 추출 필드를 타입 지정 데이터 포인트로 해석
//!
//! 템플릿의 값/속성을 [`FieldValue`] 해석 규칙(grok 키 우선, 없으면
//! 리터럴)으로 문자열로 만들고, 선언된 타입에 따라 파싱합니다.
//! 개별 메트릭의 파싱 실패는 그 메트릭만 건너뛰며 나머지 메트릭
//! 해석을 중단하지 않습니다.

use std::collections::HashMap;

use tailforge_core::event::{AttributeValue, MetricAttribute, MetricData};

use crate::error::PipelineError;

use super::types::{AttributeTemplate, FieldType, FieldValue, MetricTemplate};

/// 필드 값을 문자열로 해석합니다.
///
/// `grok_key`가 설정되어 있으면 추출 필드에서 찾고 (없는 키는 빈
/// 문자열), 아니면 `manual_value` 리터럴을 사용합니다.
pub fn resolve_field(fields: &HashMap<String, String>, value: &FieldValue) -> String {
    if value.is_grok() {
        let key = value.grok_key.as_deref().unwrap_or_default();
        fields.get(key).cloned().unwrap_or_default()
    } else {
        value.manual_value.clone().unwrap_or_default()
    }
}

/// 템플릿 목록을 해석합니다.
///
/// 실패한 템플릿은 경고 로그를 남기고 건너뜁니다 (결과에서 제외).
pub fn render_metrics(
    fields: &HashMap<String, String>,
    templates: &[MetricTemplate],
) -> Vec<MetricData> {
    templates
        .iter()
        .filter_map(|template| match render_metric(fields, template) {
            Ok(metric) => Some(metric),
            Err(e) => {
                tracing::warn!(metric = %template.name, error = %e, "skipping metric");
                None
            }
        })
        .collect()
}

/// 단일 템플릿을 [`MetricData`]로 해석합니다.
///
/// `name`/`kind`는 템플릿 그대로 보존되며, `kind`와 값 타입의 교차
/// 검증은 수행하지 않습니다.
pub fn render_metric(
    fields: &HashMap<String, String>,
    template: &MetricTemplate,
) -> Result<MetricData, PipelineError> {
    let raw = resolve_field(fields, &template.value);

    let mut metric = MetricData {
        name: template.name.clone(),
        kind: template.kind,
        value_int: 0,
        value_float: 0.0,
        attributes: Vec::with_capacity(template.attributes.len()),
    };

    match template.value.value_type {
        FieldType::Int64 => {
            metric.value_int = raw.parse().map_err(|e| PipelineError::MetricValue {
                name: template.name.clone(),
                reason: format!("failed to parse int64 value '{raw}': {e}"),
            })?;
        }
        FieldType::Float64 => {
            metric.value_float = raw.parse().map_err(|e| PipelineError::MetricValue {
                name: template.name.clone(),
                reason: format!("failed to parse float64 value '{raw}': {e}"),
            })?;
        }
        FieldType::String => {
            return Err(PipelineError::MetricValue {
                name: template.name.clone(),
                reason: "metric value type must be Int64 or Float64".to_owned(),
            });
        }
    }

    for attribute in &template.attributes {
        metric
            .attributes
            .push(render_attribute(fields, attribute, &template.name)?);
    }

    Ok(metric)
}

/// 속성 템플릿을 타입 지정 속성으로 해석합니다.
fn render_attribute(
    fields: &HashMap<String, String>,
    template: &AttributeTemplate,
    metric_name: &str,
) -> Result<MetricAttribute, PipelineError> {
    let raw = resolve_field(fields, &template.value);

    let value = match template.value.value_type {
        FieldType::Int64 => {
            AttributeValue::Int64(raw.parse().map_err(|e| PipelineError::MetricValue {
                name: metric_name.to_owned(),
                reason: format!(
                    "failed to parse int64 attribute '{}' value '{raw}': {e}",
                    template.key
                ),
            })?)
        }
        FieldType::Float64 => {
            AttributeValue::Float64(raw.parse().map_err(|e| PipelineError::MetricValue {
                name: metric_name.to_owned(),
                reason: format!(
                    "failed to parse float64 attribute '{}' value '{raw}': {e}",
                    template.key
                ),
            })?)
        }
        FieldType::String => AttributeValue::String(raw),
    };

    Ok(MetricAttribute {
        key: template.key.clone(),
        value,
    })
}
