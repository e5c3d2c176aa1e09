//! 소스 생명주기 관리 -- 소스당 하나의 인제스트 태스크 유지
//!
//! [`SourceManager`]는 현재 구성된 소스마다 정확히 하나의 인제스트
//! 태스크를 유지합니다. 스냅샷 갱신마다 추가/제거를 재조정하고,
//! 종료 시 모든 태스크의 취소와 합류(join)를 보장합니다.
//!
//! # 동시성 모델
//! - 소스마다 장수 tokio 태스크 하나 (스레드 풀 아님). 태스크 간
//!   블로킹 의존 없음.
//! - 활성 소스 장부(이름 → 취소 토큰)와 공유 출력 버퍼는 하나의
//!   reader/writer 락으로 보호됩니다.
//! - 취소는 협조적입니다: 태스크는 드레인 주기마다 취소 신호를
//!   확인하고, 신호 후에는 더 이상 라인을 처리하지 않습니다.
//!
//! # 실패 범위
//! 바인딩 조회 실패는 해당 소스의 태스크만 종료시키고 (로그만 남김),
//! 라인/룰 단위 에러는 해당 아이템만 건너뜁니다. 어떤 처리 에러도
//! 프로세스를 종료시키지 않습니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use tailforge_core::event::ProcessedDataItem;
use tailforge_core::metrics as metric_names;
use tailforge_core::types::SourceInfo;

use crate::config::PipelineConfig;
use crate::resource::{LogSourceDef, RuleSetDef};
use crate::rule::{BindingResolver, LineEvaluator};
use crate::source::{LineSource, resolve_source};

/// 활성 소스의 태스크 핸들
struct SourceHandle {
    /// 소스 전용 취소 토큰
    cancel: CancellationToken,
    /// 인제스트 태스크 핸들
    task: tokio::task::JoinHandle<()>,
}

/// 락 하나로 보호되는 공유 상태
#[derive(Default)]
struct ManagerState {
    /// 활성 소스 장부: 소스 이름 → 핸들
    active: HashMap<String, SourceHandle>,
    /// 제거/중지된 소스의 태스크 (종료 시 합류 대상)
    retired: Vec<tokio::task::JoinHandle<()>>,
    /// 공유 출력 버퍼 (익스포터 레이어가 드레인)
    output: Vec<ProcessedDataItem>,
}

/// 소스 생명주기 관리자
pub struct SourceManager {
    /// 파이프라인 설정
    config: PipelineConfig,
    /// 바인딩 해석기
    resolver: Arc<BindingResolver>,
    /// 클러스터 클라이언트 (PodSource에만 필요)
    kube_client: Option<kube::Client>,
    /// 공유 상태
    state: Arc<RwLock<ManagerState>>,
    /// 1회 초기화 가드
    initialized: AtomicBool,
}

impl SourceManager {
    /// 새 관리자를 생성합니다.
    pub fn new(
        config: PipelineConfig,
        resolver: Arc<BindingResolver>,
        kube_client: Option<kube::Client>,
    ) -> Self {
        Self {
            config,
            resolver,
            kube_client,
            state: Arc::new(RwLock::new(ManagerState::default())),
            initialized: AtomicBool::new(false),
        }
    }

    /// 1회 초기 설정을 수행합니다.
    ///
    /// 바인딩 해석기 상태를 구축한 뒤 초기 `update`를 수행합니다.
    /// 멱등합니다: 두 번째 이후 호출은 no-op입니다.
    pub fn initialize(&self, sources: &[LogSourceDef], rule_sets: &[RuleSetDef]) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("source manager already initialized, skipping");
            return;
        }

        tracing::info!(
            sources = sources.len(),
            rule_sets = rule_sets.len(),
            "initializing source manager"
        );
        self.resolver.update(sources, rule_sets);
        self.update(sources);
    }

    /// 현재 소스 스냅샷으로 활성 태스크를 재조정합니다.
    ///
    /// 스냅샷에 없는 활성 소스는 취소하고 장부에서 제거하며,
    /// 새 소스는 취소 토큰을 할당하고 인제스트 태스크를 시작합니다.
    /// 이미 활성인 소스는 건드리지 않으므로 같은 스냅샷으로 반복
    /// 호출해도 태스크가 중복되거나 재시작되지 않습니다.
    ///
    /// 바인딩은 해석기의 현재 상태에서 조회되므로, 룰 셋이 바뀌었다면
    /// 이 호출 전에 해석기를 먼저 갱신해야 합니다.
    pub fn update(&self, sources: &[LogSourceDef]) {
        tracing::debug!(sources = sources.len(), "source manager update");

        let current: HashSet<&str> = sources
            .iter()
            .map(|def| def.metadata.name.as_str())
            .collect();

        // 스냅샷에서 사라진 소스 중지
        let removed: Vec<(String, SourceHandle)> = {
            let mut state = self.state.write();
            let absent: Vec<String> = state
                .active
                .keys()
                .filter(|name| !current.contains(name.as_str()))
                .cloned()
                .collect();
            absent
                .into_iter()
                .filter_map(|name| state.active.remove(&name).map(|handle| (name, handle)))
                .collect()
        };

        for (name, handle) in removed {
            tracing::info!(source = %name, "stopping removed source");
            handle.cancel.cancel();
            self.state.write().retired.push(handle.task);
        }

        // 새 소스 시작 (이미 활성인 소스는 그대로 둠)
        for def in sources {
            if self.state.read().active.contains_key(&def.metadata.name) {
                tracing::debug!(source = %def.metadata.name, "source already active, skipping");
                continue;
            }

            let source = match resolve_source(def, &self.config, self.kube_client.clone()) {
                Ok(source) => source,
                Err(e) => {
                    // 잘못 구성된 소스는 그 소스만 건너뜀
                    tracing::error!(source = %def.metadata.name, error = %e, "failed to resolve source");
                    continue;
                }
            };

            let cancel = CancellationToken::new();
            let task = tokio::spawn(run_ingest(
                source,
                SourceInfo::from_metadata(&def.metadata),
                Arc::clone(&self.resolver),
                Arc::clone(&self.state),
                self.config.drain_interval(),
                cancel.clone(),
            ));

            tracing::info!(source = %def.metadata.name, "started ingestion task");
            self.state
                .write()
                .active
                .insert(def.metadata.name.clone(), SourceHandle { cancel, task });
        }

        let active = self.state.read().active.len();
        metrics::gauge!(metric_names::PIPELINE_ACTIVE_SOURCES).set(active_as_f64(active));
    }

    /// 모든 태스크를 취소하고 전부 종료될 때까지 기다립니다.
    ///
    /// 반환 후에는 살아 있는 태스크가 없고 장부가 비어 있습니다.
    /// 전체 프로세스 teardown에 사용합니다.
    pub async fn shut_down(&self) {
        let (handles, retired) = {
            let mut state = self.state.write();
            let handles: Vec<SourceHandle> = state.active.drain().map(|(_, h)| h).collect();
            let retired = std::mem::take(&mut state.retired);
            (handles, retired)
        };

        tracing::info!(
            active = handles.len(),
            retired = retired.len(),
            "shutting down source manager"
        );

        for handle in &handles {
            handle.cancel.cancel();
        }

        // 합류 장벽: 스폰된 모든 태스크의 종료를 기다림
        for handle in handles {
            if let Err(e) = handle.task.await {
                tracing::warn!(error = %e, "ingestion task join failed");
            }
        }
        for task in retired {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "retired task join failed");
            }
        }

        metrics::gauge!(metric_names::PIPELINE_ACTIVE_SOURCES).set(0.0);
        tracing::info!("source manager shut down");
    }

    /// 이름으로 단일 소스를 취소하고 제거합니다.
    ///
    /// 소스가 장부에 있었으면 `true`를 반환합니다.
    pub fn stop_source(&self, name: &str) -> bool {
        let handle = self.state.write().active.remove(name);
        match handle {
            Some(handle) => {
                tracing::info!(source = %name, "stopping source");
                handle.cancel.cancel();
                let mut state = self.state.write();
                state.retired.push(handle.task);
                metrics::gauge!(metric_names::PIPELINE_ACTIVE_SOURCES)
                    .set(active_as_f64(state.active.len()));
                true
            }
            None => false,
        }
    }

    /// 공유 출력 버퍼를 원자적으로 복사하고 비웁니다.
    ///
    /// 마지막 드레인 이후 쌓인 모든 아이템을 반환합니다.
    pub fn drain_output(&self) -> Vec<ProcessedDataItem> {
        let mut state = self.state.write();
        let items = std::mem::take(&mut state.output);
        metrics::gauge!(metric_names::PIPELINE_OUTPUT_BUFFER_SIZE).set(0.0);
        items
    }

    /// 현재 활성 소스 이름 목록을 반환합니다 (정렬됨).
    pub fn active_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().active.keys().cloned().collect();
        names.sort();
        names
    }

    /// 이름의 소스가 활성인지 확인합니다.
    pub fn is_active(&self, name: &str) -> bool {
        self.state.read().active.contains_key(name)
    }

    /// 활성 소스 수를 반환합니다.
    pub fn active_count(&self) -> usize {
        self.state.read().active.len()
    }

    /// 드레인되지 않은 출력 아이템 수를 반환합니다.
    pub fn pending_output(&self) -> usize {
        self.state.read().output.len()
    }
}

#[allow(clippy::cast_precision_loss)]
fn active_as_f64(count: usize) -> f64 {
    count as f64
}

/// 소스 하나의 인제스트 루프
///
/// 스트리밍을 시작하고 바인딩을 조회한 뒤, 취소될 때까지 고정 주기로
/// 새 라인을 드레인해 평가하고 결과를 공유 출력 버퍼에 추가합니다.
async fn run_ingest(
    source: Arc<dyn LineSource>,
    source_info: SourceInfo,
    resolver: Arc<BindingResolver>,
    state: Arc<RwLock<ManagerState>>,
    drain_interval: Duration,
    cancel: CancellationToken,
) {
    let identity = source.source_info();
    let stream_task = source.start_stream(cancel.clone());

    let Some(binding) = resolver.find_binding(&identity) else {
        // 매칭 룰 셋 없음: 이 소스의 태스크만 중단
        tracing::error!(source = %identity, "no binding found for source, stopping ingestion task");
        cancel.cancel();
        let _ = stream_task.await;
        return;
    };

    tracing::info!(
        source = %identity,
        rules = binding.rules.len(),
        "ingestion task running"
    );

    let mut evaluator = LineEvaluator::new();
    let mut ticker = tokio::time::interval(drain_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = ticker.tick() => {
                let lines = source.drain_new_lines();
                if lines.is_empty() {
                    continue;
                }

                metrics::counter!(metric_names::PIPELINE_LINES_DRAINED_TOTAL)
                    .increment(lines.len() as u64);
                tracing::debug!(source = %identity, lines = lines.len(), "processing drained lines");

                let items = evaluator.process_batch(&binding, &lines, &source_info);
                if items.is_empty() {
                    continue;
                }

                metrics::counter!(metric_names::PIPELINE_ITEMS_EMITTED_TOTAL)
                    .increment(items.len() as u64);

                let mut state = state.write();
                state.output.extend(items);
                metrics::gauge!(metric_names::PIPELINE_OUTPUT_BUFFER_SIZE)
                    .set(active_as_f64(state.output.len()));
            }
        }
    }

    // 스트리밍 태스크도 같은 토큰을 공유하므로 취소 후 합류
    cancel.cancel();
    let _ = stream_task.await;
    tracing::info!(source = %identity, "ingestion task stopped");
}
