//! 라인 평가 -- (라인, 룰) 쌍을 출력 아이템으로 변환
//!
//! [`LineEvaluator`]는 라인을 grok 패턴으로 파싱하고, 룰의 액션과
//! 조건 트리를 평가해 0개 이상의 [`ProcessedDataItem`]을 만들어 냅니다.
//!
//! # 에러 범위
//! 패턴 불일치, 피연산자 검증 실패, 알 수 없는 구성은 모두 해당
//! (라인, 룰) 쌍의 에러로 끝납니다. 같은 라인에 대한 다른 룰과 다른
//! 라인의 처리는 계속됩니다.

use std::collections::HashMap;

use tailforge_core::event::{MetricData, ProcessedDataItem};
use tailforge_core::metrics as metric_names;
use tailforge_core::types::SourceInfo;

use crate::error::PipelineError;
use crate::grok::GrokCompiler;

use super::binding::Binding;
use super::metric::{render_metrics, resolve_field};
use super::types::{Conditional, Operator, Rule, RuleAction};

/// 라인 평가기
///
/// grok 컴파일 캐시를 내부에 가지므로 소스 태스크마다 하나씩
/// 만들어 재사용합니다. 평가 자체는 추출 필드와 트리의 순수 함수라
/// 같은 입력에 대해 항상 같은 결과를 냅니다.
pub struct LineEvaluator {
    grok: GrokCompiler,
}

impl LineEvaluator {
    /// 새 평가기를 생성합니다.
    pub fn new() -> Self {
        Self {
            grok: GrokCompiler::new(),
        }
    }

    /// 드레인된 라인 배치를 바인딩의 모든 룰로 평가합니다.
    ///
    /// 라인은 버퍼링된 순서대로, 룰은 바인딩의 선언 순서대로
    /// 평가됩니다. (라인, 룰) 단위 에러는 로그만 남기고 건너뜁니다.
    pub fn process_batch(
        &mut self,
        binding: &Binding,
        lines: &[String],
        source: &SourceInfo,
    ) -> Vec<ProcessedDataItem> {
        let mut items = Vec::new();

        for line in lines {
            for rule in &binding.rules {
                match self.process_line(line, rule, source) {
                    Ok(mut produced) => items.append(&mut produced),
                    Err(e) => {
                        metrics::counter!(metric_names::PIPELINE_PROCESS_ERRORS_TOTAL)
                            .increment(1);
                        tracing::warn!(
                            source = %binding.source,
                            pattern = %rule.pattern,
                            error = %e,
                            "failed to process line against rule"
                        );
                    }
                }
            }
        }

        items
    }

    /// 하나의 (라인, 룰) 쌍을 평가합니다.
    ///
    /// 생성된 메트릭마다 하나의 아이템이 만들어지고, 메트릭 없이
    /// 전달 텍스트만 있으면 `forward_log`만 담은 아이템 하나를
    /// 만듭니다. 전달도 메트릭도 없으면 아무것도 내지 않습니다.
    pub fn process_line(
        &mut self,
        line: &str,
        rule: &Rule,
        source: &SourceInfo,
    ) -> Result<Vec<ProcessedDataItem>, PipelineError> {
        let fields = self.grok.parse(&rule.pattern, line)?;

        let mut metric_data = if rule.create_metrics && !rule.metrics.is_empty() {
            render_metrics(&fields, &rule.metrics)
        } else {
            Vec::new()
        };

        let forward_log = match rule.action {
            RuleAction::Forward => line.to_owned(),
            RuleAction::Discard => String::new(),
            RuleAction::Conditional => {
                let node = rule
                    .conditional
                    .as_ref()
                    .ok_or(PipelineError::MissingConditional)?;
                let (forward_log, branch_metrics) = eval_conditional(&fields, node, line)?;
                metric_data.extend(branch_metrics);
                forward_log
            }
        };

        let mut items: Vec<ProcessedDataItem> = metric_data
            .into_iter()
            .map(|metric| ProcessedDataItem {
                forward_log: forward_log.clone(),
                metric: Some(metric),
                source: source.clone(),
            })
            .collect();

        // 메트릭 없는 forward도 전달 텍스트를 잃지 않고 아이템 하나를 낸다
        if items.is_empty() && !forward_log.is_empty() {
            items.push(ProcessedDataItem {
                forward_log,
                metric: None,
                source: source.clone(),
            });
        }

        Ok(items)
    }
}

impl Default for LineEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// 조건 트리 노드를 재귀 평가합니다.
///
/// 반환값은 (전달 텍스트, 경로에서 선택된 분기 메트릭)입니다.
/// 중첩 노드의 메트릭은 현재 노드의 분기 메트릭 뒤에 이어집니다.
fn eval_conditional(
    fields: &HashMap<String, String>,
    node: &Conditional,
    line: &str,
) -> Result<(String, Vec<MetricData>), PipelineError> {
    let field1 = resolve_field(fields, &node.field1);
    let field2 = resolve_field(fields, &node.field2);

    validate_operands(node.operator, &field1, &field2)?;
    let result = apply_operator(node.operator, &field1, &field2)?;

    let selected_action = if result {
        node.action_true
    } else {
        node.action_false
    };
    let selected_metrics = if result {
        &node.metrics_true
    } else {
        &node.metrics_false
    };

    let mut metric_data = render_metrics(fields, selected_metrics);

    let forward_log = match selected_action {
        RuleAction::Forward => line.to_owned(),
        RuleAction::Discard => String::new(),
        RuleAction::Conditional => {
            let nested = if result {
                node.conditional_true.as_deref()
            } else {
                node.conditional_false.as_deref()
            };
            let nested = nested.ok_or(PipelineError::MissingConditional)?;
            let (forward_log, nested_metrics) = eval_conditional(fields, nested, line)?;
            metric_data.extend(nested_metrics);
            forward_log
        }
    };

    Ok((forward_log, metric_data))
}

/// 연산자별 피연산자 요구사항을 검증합니다.
fn validate_operands(
    operator: Operator,
    field1: &str,
    field2: &str,
) -> Result<(), PipelineError> {
    match operator {
        Operator::Equals | Operator::DoesNotEqual => {
            if field1.is_empty() {
                return Err(PipelineError::Conditional {
                    reason: format!("field1 is required for operator {operator:?}"),
                });
            }
            if field2.is_empty() {
                return Err(PipelineError::Conditional {
                    reason: format!("field2 is required for operator {operator:?}"),
                });
            }
            Ok(())
        }
        Operator::Exists | Operator::DoesNotExist => Ok(()),
        _ => {
            if field1.is_empty() || field2.is_empty() {
                return Err(PipelineError::Conditional {
                    reason: format!("both fields are required for operator {operator:?}"),
                });
            }
            if field1.parse::<i64>().is_err() || field2.parse::<i64>().is_err() {
                return Err(PipelineError::Conditional {
                    reason: format!(
                        "fields must be parseable as integers for operator {operator:?}: \
                         '{field1}', '{field2}'"
                    ),
                });
            }
            Ok(())
        }
    }
}

/// 연산자를 적용해 불리언 결과를 냅니다.
///
/// 순서 비교는 10진 정수 비교입니다 (사전식 아님).
fn apply_operator(operator: Operator, field1: &str, field2: &str) -> Result<bool, PipelineError> {
    match operator {
        Operator::Equals => Ok(field1 == field2),
        Operator::DoesNotEqual => Ok(field1 != field2),
        Operator::Exists => Ok(!field1.is_empty()),
        Operator::DoesNotExist => Ok(field1.is_empty()),
        Operator::LessThan => parse_pair(field1, field2).map(|(l, r)| l < r),
        Operator::GreaterThan => parse_pair(field1, field2).map(|(l, r)| l > r),
        Operator::GreaterThanOrEqualTo => parse_pair(field1, field2).map(|(l, r)| l >= r),
        Operator::LessThanOrEqualTo => parse_pair(field1, field2).map(|(l, r)| l <= r),
    }
}

/// 순서 비교를 위해 두 피연산자를 10진 정수로 파싱합니다.
fn parse_pair(field1: &str, field2: &str) -> Result<(i64, i64), PipelineError> {
    let left: i64 = field1.parse().map_err(|_| PipelineError::Conditional {
        reason: format!("cannot compare non-numeric value '{field1}'"),
    })?;
    let right: i64 = field2.parse().map_err(|_| PipelineError::Conditional {
        reason: format!("cannot compare non-numeric value '{field2}'"),
    })?;
    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailforge_core::event::MetricKind;

    use crate::rule::types::{FieldType, FieldValue, MetricTemplate};

    fn source() -> SourceInfo {
        SourceInfo {
            name: "test-source".to_owned(),
            namespace: "default".to_owned(),
        }
    }

    fn grok_field(value_type: FieldType, key: &str) -> FieldValue {
        FieldValue {
            value_type,
            grok_key: Some(key.to_owned()),
            manual_value: None,
        }
    }

    fn manual_field(value_type: FieldType, value: &str) -> FieldValue {
        FieldValue {
            value_type,
            grok_key: None,
            manual_value: Some(value.to_owned()),
        }
    }

    fn count_metric(name: &str) -> MetricTemplate {
        MetricTemplate {
            name: name.to_owned(),
            kind: MetricKind::Int64Counter,
            value: manual_field(FieldType::Int64, "1"),
            attributes: vec![],
        }
    }

    fn forward_rule(pattern: &str) -> Rule {
        Rule {
            pattern: pattern.to_owned(),
            action: RuleAction::Forward,
            conditional: None,
            create_metrics: true,
            metrics: vec![],
        }
    }

    fn code_conditional(operator: Operator, threshold: &str) -> Conditional {
        Conditional {
            field1: grok_field(FieldType::Int64, "code"),
            operator,
            field2: manual_field(FieldType::Int64, threshold),
            action_true: RuleAction::Forward,
            action_false: RuleAction::Discard,
            metrics_true: vec![],
            metrics_false: vec![],
            conditional_true: None,
            conditional_false: None,
        }
    }

    // --- 스펙 종단 시나리오 ---

    #[test]
    fn forward_rule_emits_single_item() {
        let mut evaluator = LineEvaluator::new();
        let rule = forward_rule("%{WORD:level} %{NUMBER:code}");

        let items = evaluator
            .process_line("ERROR 500", &rule, &source())
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].forward_log, "ERROR 500");
        assert!(items[0].metric.is_none());
        assert_eq!(items[0].source.name, "test-source");
    }

    #[test]
    fn conditional_forwards_above_threshold() {
        let mut evaluator = LineEvaluator::new();
        let rule = Rule {
            pattern: "%{WORD:level} %{NUMBER:code}".to_owned(),
            action: RuleAction::Conditional,
            conditional: Some(code_conditional(Operator::GreaterThanOrEqualTo, "500")),
            create_metrics: true,
            metrics: vec![],
        };

        let items = evaluator
            .process_line("ERROR 500", &rule, &source())
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].forward_log, "ERROR 500");

        // 임계값 미만 라인은 버려짐 (아이템 없음)
        let items = evaluator.process_line("INFO 200", &rule, &source()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn manual_metric_resolves_to_value() {
        let mut evaluator = LineEvaluator::new();
        let rule = Rule {
            pattern: "%{WORD:level} %{NUMBER:code}".to_owned(),
            action: RuleAction::Forward,
            conditional: None,
            create_metrics: true,
            metrics: vec![count_metric("req.count")],
        };

        let items = evaluator
            .process_line("ERROR 500", &rule, &source())
            .unwrap();
        assert_eq!(items.len(), 1);
        let metric = items[0].metric.as_ref().unwrap();
        assert_eq!(metric.name, "req.count");
        assert_eq!(metric.value_int, 1);
        assert_eq!(items[0].forward_log, "ERROR 500");
    }

    // --- 숫자 비교 계약 ---

    #[test]
    fn ordering_is_numeric_not_lexicographic() {
        // 사전식이면 "5" > "10"이지만 정수 비교로는 5 < 10
        assert!(apply_operator(Operator::LessThan, "5", "10").unwrap());
        assert!(!apply_operator(Operator::GreaterThan, "5", "10").unwrap());
    }

    #[test]
    fn equals_is_string_equality() {
        assert!(!apply_operator(Operator::Equals, "5", "05").unwrap());
        assert!(apply_operator(Operator::Equals, "abc", "abc").unwrap());
    }

    #[test]
    fn ordering_on_non_numeric_is_validation_error() {
        let result = validate_operands(Operator::LessThan, "abc", "10");
        assert!(matches!(result, Err(PipelineError::Conditional { .. })));
    }

    #[test]
    fn equals_requires_both_operands() {
        assert!(validate_operands(Operator::Equals, "", "x").is_err());
        assert!(validate_operands(Operator::Equals, "x", "").is_err());
        assert!(validate_operands(Operator::Equals, "x", "y").is_ok());
    }

    #[test]
    fn exists_needs_no_operands() {
        assert!(validate_operands(Operator::Exists, "", "").is_ok());
        assert!(apply_operator(Operator::Exists, "value", "").unwrap());
        assert!(!apply_operator(Operator::Exists, "", "").unwrap());
        assert!(apply_operator(Operator::DoesNotExist, "", "").unwrap());
    }

    // --- 조건 트리 ---

    #[test]
    fn branch_metrics_follow_taken_branch() {
        let mut evaluator = LineEvaluator::new();
        let mut conditional = code_conditional(Operator::GreaterThanOrEqualTo, "500");
        conditional.metrics_true = vec![count_metric("errors.server")];
        conditional.metrics_false = vec![count_metric("errors.other")];
        let rule = Rule {
            pattern: "%{WORD:level} %{NUMBER:code}".to_owned(),
            action: RuleAction::Conditional,
            conditional: Some(conditional),
            create_metrics: true,
            metrics: vec![],
        };

        let items = evaluator
            .process_line("ERROR 503", &rule, &source())
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].metric.as_ref().unwrap().name,
            "errors.server"
        );

        let items = evaluator.process_line("WARN 404", &rule, &source()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].metric.as_ref().unwrap().name, "errors.other");
        // false 분기는 discard이므로 전달 텍스트 없음
        assert!(items[0].forward_log.is_empty());
    }

    #[test]
    fn nested_conditional_concatenates_metrics() {
        // code > 399 이면 한 단계 더: code < 500 이면 forward(클라이언트 에러),
        // 아니면 discard(서버 에러)
        let nested = Conditional {
            field1: grok_field(FieldType::Int64, "code"),
            operator: Operator::LessThan,
            field2: manual_field(FieldType::Int64, "500"),
            action_true: RuleAction::Forward,
            action_false: RuleAction::Discard,
            metrics_true: vec![count_metric("errors.client")],
            metrics_false: vec![count_metric("errors.server")],
            conditional_true: None,
            conditional_false: None,
        };
        let root = Conditional {
            field1: grok_field(FieldType::Int64, "code"),
            operator: Operator::GreaterThan,
            field2: manual_field(FieldType::Int64, "399"),
            action_true: RuleAction::Conditional,
            action_false: RuleAction::Discard,
            metrics_true: vec![count_metric("errors.total")],
            metrics_false: vec![],
            conditional_true: Some(Box::new(nested)),
            conditional_false: None,
        };
        let rule = Rule {
            pattern: "%{WORD:level} %{NUMBER:code}".to_owned(),
            action: RuleAction::Conditional,
            conditional: Some(root),
            create_metrics: true,
            metrics: vec![],
        };

        let mut evaluator = LineEvaluator::new();
        let items = evaluator
            .process_line("WARN 404", &rule, &source())
            .unwrap();
        // 루트 true 분기 메트릭 + 중첩 true 분기 메트릭, 선언 순서대로
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].metric.as_ref().unwrap().name, "errors.total");
        assert_eq!(items[1].metric.as_ref().unwrap().name, "errors.client");
        // 최종 전달 텍스트는 중첩 노드의 결과
        assert!(items.iter().all(|i| i.forward_log == "WARN 404"));

        let items = evaluator
            .process_line("ERROR 503", &rule, &source())
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].metric.as_ref().unwrap().name, "errors.server");
        assert!(items.iter().all(|i| i.forward_log.is_empty()));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let mut conditional = code_conditional(Operator::GreaterThanOrEqualTo, "500");
        conditional.metrics_true = vec![count_metric("errors.server")];
        let rule = Rule {
            pattern: "%{WORD:level} %{NUMBER:code}".to_owned(),
            action: RuleAction::Conditional,
            conditional: Some(conditional),
            create_metrics: true,
            metrics: vec![],
        };

        let mut evaluator = LineEvaluator::new();
        let first = evaluator
            .process_line("ERROR 500", &rule, &source())
            .unwrap();
        for _ in 0..10 {
            let again = evaluator
                .process_line("ERROR 500", &rule, &source())
                .unwrap();
            assert_eq!(again, first);
        }
    }

    // --- 에러 범위 ---

    #[test]
    fn pattern_mismatch_is_error_for_pair() {
        let mut evaluator = LineEvaluator::new();
        let rule = forward_rule("%{INT:code}");
        let result = evaluator.process_line("no digits", &rule, &source());
        assert!(matches!(result, Err(PipelineError::PatternMismatch { .. })));
    }

    #[test]
    fn discard_rule_emits_nothing() {
        let mut evaluator = LineEvaluator::new();
        let rule = Rule {
            pattern: "%{WORD:level}".to_owned(),
            action: RuleAction::Discard,
            conditional: None,
            create_metrics: true,
            metrics: vec![],
        };
        let items = evaluator.process_line("ERROR", &rule, &source()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn discard_with_metrics_still_emits_metrics() {
        let mut evaluator = LineEvaluator::new();
        let rule = Rule {
            pattern: "%{WORD:level}".to_owned(),
            action: RuleAction::Discard,
            conditional: None,
            create_metrics: true,
            metrics: vec![count_metric("lines.seen")],
        };
        let items = evaluator.process_line("ERROR", &rule, &source()).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].forward_log.is_empty());
        assert!(items[0].metric.is_some());
    }

    #[test]
    fn create_metrics_false_suppresses_rule_metrics() {
        let mut evaluator = LineEvaluator::new();
        let rule = Rule {
            pattern: "%{WORD:level}".to_owned(),
            action: RuleAction::Forward,
            conditional: None,
            create_metrics: false,
            metrics: vec![count_metric("lines.seen")],
        };
        let items = evaluator.process_line("ERROR", &rule, &source()).unwrap();
        // 메트릭은 억제되지만 전달 텍스트는 살아남음
        assert_eq!(items.len(), 1);
        assert!(items[0].metric.is_none());
    }

    #[test]
    fn missing_grok_key_resolves_empty_and_fails_validation() {
        let mut evaluator = LineEvaluator::new();
        let conditional = Conditional {
            field1: grok_field(FieldType::String, "absent"),
            operator: Operator::Equals,
            field2: manual_field(FieldType::String, "x"),
            action_true: RuleAction::Forward,
            action_false: RuleAction::Discard,
            metrics_true: vec![],
            metrics_false: vec![],
            conditional_true: None,
            conditional_false: None,
        };
        let rule = Rule {
            pattern: "%{WORD:level}".to_owned(),
            action: RuleAction::Conditional,
            conditional: Some(conditional),
            create_metrics: true,
            metrics: vec![],
        };
        let result = evaluator.process_line("ERROR", &rule, &source());
        assert!(matches!(result, Err(PipelineError::Conditional { .. })));
    }

    #[test]
    fn batch_continues_after_bad_pair() {
        let mut evaluator = LineEvaluator::new();
        let binding = Binding {
            source: "local: /tmp/x".to_owned(),
            rules: vec![forward_rule("%{INT:code}"), forward_rule("%{WORD:word}")],
        };
        let lines = vec!["no digits here".to_owned(), "42".to_owned()];

        let items = evaluator.process_batch(&binding, &lines, &source());
        // 첫 라인은 INT 룰에 실패하지만 WORD 룰에 매칭, 둘째 라인은 둘 다 매칭
        assert_eq!(items.len(), 3);
    }
}
