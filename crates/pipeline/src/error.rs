//! 파이프라인 도메인 에러 타입
//!
//! [`PipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<PipelineError> for TailforgeError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use tailforge_core::error::TailforgeError;

/// 파이프라인 도메인 에러
///
/// grok 컴파일, 패턴 매칭, 조건 평가, 메트릭 해석, 리소스 로딩,
/// 소스 구성 등 파이프라인 내부의 모든 에러 상황을 포괄합니다.
/// 처리 에러는 해당 라인/룰/소스 범위에서만 처리되고 프로세스를
/// 종료시키지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// grok 패턴 컴파일 실패
    #[error("grok compile error: pattern '{pattern}': {reason}")]
    GrokCompile {
        /// 문제가 된 패턴
        pattern: String,
        /// 실패 사유
        reason: String,
    },

    /// 알 수 없는 내장 grok 패턴 참조
    #[error("unknown grok pattern: %{{{name}}}")]
    UnknownGrokPattern {
        /// 참조된 패턴 이름
        name: String,
    },

    /// 라인이 패턴에 매칭되지 않음
    #[error("line does not match pattern '{pattern}'")]
    PatternMismatch {
        /// 매칭을 시도한 패턴
        pattern: String,
    },

    /// 조건 평가 실패 (피연산자 누락, 숫자 아님 등)
    #[error("conditional evaluation failed: {reason}")]
    Conditional {
        /// 실패 사유
        reason: String,
    },

    /// `conditional` 액션에 중첩 조건 노드가 없음
    #[error("action is 'conditional' but no nested conditional is defined")]
    MissingConditional,

    /// 메트릭 값/속성 해석 실패
    #[error("metric '{name}': {reason}")]
    MetricValue {
        /// 메트릭 이름
        name: String,
        /// 실패 사유
        reason: String,
    },

    /// 리소스 파일/디렉토리 로딩 실패
    #[error("resource load error: {path}: {reason}")]
    ResourceLoad {
        /// 리소스 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 리소스 유효성 검증 실패
    #[error("resource validation error: '{name}': {reason}")]
    ResourceValidation {
        /// 문제가 된 리소스 이름
        name: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 소스에 매칭되는 바인딩 없음
    #[error("no binding found for source: {src}")]
    BindingNotFound {
        /// 소스 식별 문자열
        src: String,
    },

    /// 소스 구성 에러 (알 수 없는 타입, 누락된 스펙 등)
    #[error("source config error: '{src}': {reason}")]
    SourceConfig {
        /// 소스 이름
        src: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<PipelineError> for TailforgeError {
    fn from(err: PipelineError) -> Self {
        TailforgeError::Pipeline(tailforge_core::error::PipelineError::InitFailed(
            err.to_string(),
        ))
    }
}
