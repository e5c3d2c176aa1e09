//! 바인딩 해석 -- 어떤 룰이 어떤 소스에 적용되는지 계산
//!
//! [`BindingResolver`]는 룰 셋의 라벨 셀렉터를 소스의 라벨에 매칭시켜
//! 소스 식별 문자열 하나당 하나의 [`Binding`]을 만듭니다. 여러 룰 셋에
//! 매칭되는 소스는 모든 룰을 룰 셋 선언 순서대로 병합한 하나의
//! 바인딩을 갖습니다.
//!
//! 바인딩 목록은 업데이트마다 자체 락 아래에서 통째로 재구축되고,
//! 라인 평가 중에는 읽기 전용입니다. 평가 중인 룰/바인딩 객체를 제자리
//! 변경하는 일은 없습니다.

use parking_lot::RwLock;

use crate::resource::{LogSourceDef, RuleSetDef};

use super::types::Rule;

/// 소스 하나와 적용 룰 목록의 결합
///
/// `source`는 소스 스펙에서 파생된 식별 문자열이며, 스트리밍
/// 캐퍼빌리티의 `source_info()`와 정확히 일치합니다. 조회는 이
/// 문자열의 완전 일치로 수행됩니다.
#[derive(Debug, Clone)]
pub struct Binding {
    /// 소스 식별 문자열 (조회 키)
    pub source: String,
    /// 적용 룰 목록 (룰 셋 선언 순서 유지)
    pub rules: Vec<Rule>,
}

/// 바인딩 해석기
pub struct BindingResolver {
    /// 현재 바인딩 목록 (업데이트마다 통째로 교체)
    bindings: RwLock<Vec<Binding>>,
}

impl BindingResolver {
    /// 새 해석기를 생성합니다.
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(Vec::new()),
        }
    }

    /// 현재 스냅샷으로 바인딩을 처음부터 다시 계산합니다.
    ///
    /// 증분 갱신이 아닙니다. 소스/룰 셋 수가 수십~수백 규모이므로
    /// 전체 재계산으로 충분합니다.
    pub fn update(&self, sources: &[LogSourceDef], rule_sets: &[RuleSetDef]) {
        let mut rebuilt = Vec::new();

        for source in sources {
            let mut rules = Vec::new();

            for rule_set in rule_sets {
                if rule_set.spec.selector.matches(&source.metadata.labels) {
                    tracing::debug!(
                        rule_set = %rule_set.metadata.name,
                        source = %source.metadata.name,
                        rules = rule_set.spec.rules.len(),
                        "rule set matched source"
                    );
                    rules.extend(rule_set.spec.rules.iter().cloned());
                }
            }

            if rules.is_empty() {
                tracing::debug!(
                    source = %source.metadata.name,
                    "no rule set matched source"
                );
                continue;
            }

            rebuilt.push(Binding {
                source: source.identity(),
                rules,
            });
        }

        tracing::info!(bindings = rebuilt.len(), "rebuilt source bindings");
        *self.bindings.write() = rebuilt;
    }

    /// 소스 식별 문자열로 바인딩을 찾습니다.
    ///
    /// 식별 문자열이 정확히 일치하는 첫 바인딩의 복제본을 반환합니다.
    pub fn find_binding(&self, source_identity: &str) -> Option<Binding> {
        self.bindings
            .read()
            .iter()
            .find(|binding| binding.source == source_identity)
            .cloned()
    }

    /// 현재 바인딩 수를 반환합니다.
    pub fn binding_count(&self) -> usize {
        self.bindings.read().len()
    }
}

impl Default for BindingResolver {
    fn default() -> Self {
        Self::new()
    }
}
