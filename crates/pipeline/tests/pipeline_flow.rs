//! 통합 테스트 -- 파이프라인 전체 흐름 검증
//!
//! 로컬 파일 소스에서 라인 수집부터 출력 버퍼 드레인까지의 전체
//! 흐름을 검증합니다. 타이밍 의존 구간은 드레인 주기(1초)보다 넉넉한
//! 대기 시간을 사용합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use tailforge_pipeline::{
    BindingResolver, PipelineConfigBuilder, ResourceLoader, ResourceSnapshot, SourceManager,
};

const SOURCE_DOC: &str = r#"
apiVersion: tailforge.dev/v1
kind: LogSource
metadata:
  name: app-logs
  namespace: testns
  labels:
    app: demo
spec:
  type: LocalSource
  localSource:
    path: __PATH__
"#;

const FORWARD_RULES_DOC: &str = r#"
apiVersion: tailforge.dev/v1
kind: RuleSet
metadata:
  name: forward-errors
spec:
  selector:
    matchLabels:
      app: demo
  rules:
    - pattern: "%{WORD:level} %{NUMBER:code}"
      action: forward
"#;

const CONDITIONAL_RULES_DOC: &str = r#"
apiVersion: tailforge.dev/v1
kind: RuleSet
metadata:
  name: server-errors
spec:
  selector:
    matchLabels:
      app: demo
  rules:
    - pattern: "%{WORD:level} %{NUMBER:code}"
      action: conditional
      conditional:
        field1: { type: Int64, grokKey: code }
        operator: GreaterThanOrEqualTo
        field2: { type: Int64, manualValue: "500" }
        actionTrue: forward
        actionFalse: discard
        metricsTrue:
          - name: http.server_errors
            kind: Int64Counter
            value: { type: Int64, manualValue: "1" }
            attributes:
              - key: code
                value: { type: Int64, grokKey: code }
"#;

/// 드레인 주기 1초, 파일 폴링 50ms의 테스트 설정
fn test_config(resource_dir: &std::path::Path) -> tailforge_pipeline::PipelineConfig {
    PipelineConfigBuilder::new()
        .resource_dir(resource_dir.display().to_string())
        .drain_interval_secs(1)
        .file_poll_interval_ms(50)
        .stream_retry_attempts(2)
        .stream_retry_delay_secs(1)
        .build()
        .expect("test config should be valid")
}

/// 리소스 디렉토리에 문서를 쓰고 스냅샷을 로드합니다.
async fn write_and_load(
    dir: &std::path::Path,
    docs: &[(&str, String)],
) -> ResourceSnapshot {
    for (name, content) in docs {
        tokio::fs::write(dir.join(name), content).await.unwrap();
    }
    ResourceLoader::load_directory(dir).await.unwrap()
}

/// 파일에 라인을 추가합니다.
async fn append_line(path: &std::path::Path, line: &str) {
    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .unwrap();
    file.write_all(format!("{line}\n").as_bytes()).await.unwrap();
    file.flush().await.unwrap();
}

/// forward 룰: 매칭 라인이 ForwardLog로 그대로 전달됨
#[tokio::test(flavor = "multi_thread")]
async fn forward_rule_emits_forward_log() {
    let resource_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("app.log");
    tokio::fs::write(&log_path, "").await.unwrap();

    // 1. 리소스 스냅샷 준비
    let snapshot = write_and_load(
        resource_dir.path(),
        &[
            (
                "source.yaml",
                SOURCE_DOC.replace("__PATH__", &log_path.display().to_string()),
            ),
            ("rules.yaml", FORWARD_RULES_DOC.to_owned()),
        ],
    )
    .await;

    // 2. 관리자 초기화
    let resolver = Arc::new(BindingResolver::new());
    let manager = SourceManager::new(test_config(resource_dir.path()), resolver, None);
    manager.initialize(&snapshot.sources, &snapshot.rule_sets);
    assert_eq!(manager.active_count(), 1);

    // 3. 라인 기록 후 드레인 주기 대기
    append_line(&log_path, "ERROR 500").await;
    tokio::time::sleep(Duration::from_millis(2500)).await;

    // 4. 출력 검증
    let items = manager.drain_output();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].forward_log, "ERROR 500");
    assert!(items[0].metric.is_none());
    assert_eq!(items[0].source.name, "app-logs");
    assert_eq!(items[0].source.namespace, "testns");

    // 5. 드레인은 파괴적
    assert!(manager.drain_output().is_empty());

    manager.shut_down().await;
}

/// conditional 룰: 임계값 이상만 전달되고 분기 메트릭이 붙음
#[tokio::test(flavor = "multi_thread")]
async fn conditional_rule_filters_and_attaches_metrics() {
    let resource_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("app.log");
    tokio::fs::write(&log_path, "").await.unwrap();

    let snapshot = write_and_load(
        resource_dir.path(),
        &[
            (
                "source.yaml",
                SOURCE_DOC.replace("__PATH__", &log_path.display().to_string()),
            ),
            ("rules.yaml", CONDITIONAL_RULES_DOC.to_owned()),
        ],
    )
    .await;

    let resolver = Arc::new(BindingResolver::new());
    let manager = SourceManager::new(test_config(resource_dir.path()), resolver, None);
    manager.initialize(&snapshot.sources, &snapshot.rule_sets);

    append_line(&log_path, "ERROR 503").await;
    append_line(&log_path, "INFO 200").await;
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let items = manager.drain_output();
    // "INFO 200"은 discard 분기(메트릭 없음)라 아이템을 내지 않음
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].forward_log, "ERROR 503");

    let metric = items[0].metric.as_ref().expect("metric should be attached");
    assert_eq!(metric.name, "http.server_errors");
    assert_eq!(metric.value_int, 1);
    assert_eq!(metric.attributes.len(), 1);
    assert_eq!(metric.attributes[0].key, "code");

    manager.shut_down().await;
}

/// 라인 순서 보존: 한 소스 안에서는 버퍼링된 순서대로 처리됨
#[tokio::test(flavor = "multi_thread")]
async fn lines_are_processed_in_order() {
    let resource_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("app.log");
    tokio::fs::write(&log_path, "").await.unwrap();

    let snapshot = write_and_load(
        resource_dir.path(),
        &[
            (
                "source.yaml",
                SOURCE_DOC.replace("__PATH__", &log_path.display().to_string()),
            ),
            ("rules.yaml", FORWARD_RULES_DOC.to_owned()),
        ],
    )
    .await;

    let resolver = Arc::new(BindingResolver::new());
    let manager = SourceManager::new(test_config(resource_dir.path()), resolver, None);
    manager.initialize(&snapshot.sources, &snapshot.rule_sets);

    for i in 0..5 {
        append_line(&log_path, &format!("ERROR 50{i}")).await;
    }
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let items = manager.drain_output();
    assert_eq!(items.len(), 5);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item.forward_log, format!("ERROR 50{i}"));
    }

    manager.shut_down().await;
}

/// 바인딩이 없는 소스의 태스크는 종료되지만 다른 소스는 영향 없음
#[tokio::test(flavor = "multi_thread")]
async fn unbound_source_does_not_affect_others() {
    let resource_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let bound_path = log_dir.path().join("bound.log");
    let unbound_path = log_dir.path().join("unbound.log");
    tokio::fs::write(&bound_path, "").await.unwrap();
    tokio::fs::write(&unbound_path, "").await.unwrap();

    let unbound_doc = r#"
apiVersion: tailforge.dev/v1
kind: LogSource
metadata:
  name: unbound-logs
  labels:
    app: nothing-matches-this
spec:
  type: LocalSource
  localSource:
    path: __PATH__
"#;

    let snapshot = write_and_load(
        resource_dir.path(),
        &[
            (
                "bound.yaml",
                SOURCE_DOC.replace("__PATH__", &bound_path.display().to_string()),
            ),
            (
                "unbound.yaml",
                unbound_doc.replace("__PATH__", &unbound_path.display().to_string()),
            ),
            ("rules.yaml", FORWARD_RULES_DOC.to_owned()),
        ],
    )
    .await;

    let resolver = Arc::new(BindingResolver::new());
    let manager = SourceManager::new(test_config(resource_dir.path()), resolver, None);
    manager.initialize(&snapshot.sources, &snapshot.rule_sets);

    append_line(&bound_path, "ERROR 500").await;
    append_line(&unbound_path, "ERROR 999").await;
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let items = manager.drain_output();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source.name, "app-logs");

    manager.shut_down().await;
}

/// 동적 재조정: 소스 제거 후에는 새 라인이 처리되지 않음
#[tokio::test(flavor = "multi_thread")]
async fn removed_source_stops_producing() {
    let resource_dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("app.log");
    tokio::fs::write(&log_path, "").await.unwrap();

    let snapshot = write_and_load(
        resource_dir.path(),
        &[
            (
                "source.yaml",
                SOURCE_DOC.replace("__PATH__", &log_path.display().to_string()),
            ),
            ("rules.yaml", FORWARD_RULES_DOC.to_owned()),
        ],
    )
    .await;

    let resolver = Arc::new(BindingResolver::new());
    let manager = SourceManager::new(test_config(resource_dir.path()), resolver, None);
    manager.initialize(&snapshot.sources, &snapshot.rule_sets);

    // 빈 스냅샷으로 갱신 → 소스 제거
    manager.update(&[]);
    assert_eq!(manager.active_count(), 0);

    append_line(&log_path, "ERROR 500").await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(manager.drain_output().is_empty());

    manager.shut_down().await;
}
