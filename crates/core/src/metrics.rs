//! 메트릭 상수 및 설명 등록
//!
//! 자기 계측 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tailforge_`
//! - 모듈명: `pipeline_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (시간), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 소스 이름 레이블 키
pub const LABEL_SOURCE: &str = "source";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Pipeline 메트릭 ────────────────────────────────────────────────

/// Pipeline: 소스에서 드레인한 전체 로그 라인 수 (counter)
pub const PIPELINE_LINES_DRAINED_TOTAL: &str = "tailforge_pipeline_lines_drained_total";

/// Pipeline: 생성된 출력 아이템 수 (counter)
pub const PIPELINE_ITEMS_EMITTED_TOTAL: &str = "tailforge_pipeline_items_emitted_total";

/// Pipeline: 라인/룰 처리 에러 수 (counter)
pub const PIPELINE_PROCESS_ERRORS_TOTAL: &str = "tailforge_pipeline_process_errors_total";

/// Pipeline: 현재 활성 소스 수 (gauge)
pub const PIPELINE_ACTIVE_SOURCES: &str = "tailforge_pipeline_active_sources";

/// Pipeline: 출력 버퍼에 대기 중인 아이템 수 (gauge)
pub const PIPELINE_OUTPUT_BUFFER_SIZE: &str = "tailforge_pipeline_output_buffer_size";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "tailforge_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "tailforge_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        PIPELINE_LINES_DRAINED_TOTAL,
        "Total number of log lines drained from all sources"
    );
    describe_counter!(
        PIPELINE_ITEMS_EMITTED_TOTAL,
        "Total number of processed data items appended to the output buffer"
    );
    describe_counter!(
        PIPELINE_PROCESS_ERRORS_TOTAL,
        "Total number of per-line or per-rule processing errors"
    );
    describe_gauge!(
        PIPELINE_ACTIVE_SOURCES,
        "Number of sources with a live ingestion task"
    );
    describe_gauge!(
        PIPELINE_OUTPUT_BUFFER_SIZE,
        "Number of processed data items waiting to be drained"
    );
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Tailforge daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
