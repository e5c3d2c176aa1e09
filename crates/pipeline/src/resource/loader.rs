//! 리소스 파일 로더 -- YAML 리소스 문서를 디스크에서 로드합니다.
//!
//! 리소스 디렉토리 내의 `.yml`/`.yaml` 파일을 스캔하고 `kind` 필드로
//! LogSource / RuleSet을 판별합니다. 개별 파일 파싱/검증 실패는 경고
//! 로그를 남기고 건너뛰므로, 하나의 잘못된 문서가 나머지 스냅샷 로딩을
//! 막지 않습니다.

use std::path::Path;

use crate::error::PipelineError;

use super::{KIND_LOG_SOURCE, KIND_RULE_SET, LogSourceDef, RuleSetDef};

const MAX_RESOURCE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_RESOURCES_COUNT: usize = 10_000;

/// 디렉토리에서 로드한 리소스 전체 스냅샷
///
/// `update()`가 소비하는 현재 구성의 완전한 집합입니다 (델타 아님).
#[derive(Debug, Default)]
pub struct ResourceSnapshot {
    /// 로그 소스 정의 목록
    pub sources: Vec<LogSourceDef>,
    /// 룰 셋 정의 목록
    pub rule_sets: Vec<RuleSetDef>,
}

impl ResourceSnapshot {
    /// 스냅샷이 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.rule_sets.is_empty()
    }
}

/// 리소스 파일 로더
pub struct ResourceLoader;

impl ResourceLoader {
    /// 디렉토리에서 모든 YAML 리소스 문서를 로드합니다.
    ///
    /// `.yml` 또는 `.yaml` 확장자를 가진 파일만 처리하며, 파일당 하나의
    /// 문서를 기대합니다. 개별 파일 로딩 실패는 경고 로그를 남기고
    /// 건너뜁니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 리소스 수가 `MAX_RESOURCES_COUNT`를 초과하는 경우
    pub async fn load_directory(
        dir: impl AsRef<Path>,
    ) -> Result<ResourceSnapshot, PipelineError> {
        let dir = dir.as_ref();

        let mut entries =
            tokio::fs::read_dir(dir)
                .await
                .map_err(|e| PipelineError::ResourceLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory: {e}"),
                })?;

        let mut snapshot = ResourceSnapshot::default();

        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| PipelineError::ResourceLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory entry: {e}"),
                })?
        {
            let path = entry.path();

            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");

            if !is_yaml {
                continue;
            }

            if let Err(e) = Self::load_file(&path, &mut snapshot).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to load resource file, skipping"
                );
            }

            if snapshot.sources.len() + snapshot.rule_sets.len() > MAX_RESOURCES_COUNT {
                return Err(PipelineError::ResourceLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many resources: max {MAX_RESOURCES_COUNT}"),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            sources = snapshot.sources.len(),
            rule_sets = snapshot.rule_sets.len(),
            "loaded resource snapshot"
        );

        Ok(snapshot)
    }

    /// 단일 YAML 파일을 파싱해 스냅샷에 추가합니다.
    async fn load_file(
        path: &Path,
        snapshot: &mut ResourceSnapshot,
    ) -> Result<(), PipelineError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PipelineError::ResourceLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RESOURCE_FILE_SIZE {
            return Err(PipelineError::ResourceLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RESOURCE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| PipelineError::ResourceLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        Self::parse_yaml(&content, &path.display().to_string(), snapshot)
    }

    /// YAML 문자열을 `kind`로 판별해 타입 지정 문서로 파싱합니다.
    pub fn parse_yaml(
        yaml_str: &str,
        source: &str,
        snapshot: &mut ResourceSnapshot,
    ) -> Result<(), PipelineError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(yaml_str).map_err(|e| PipelineError::ResourceLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or_else(|| PipelineError::ResourceLoad {
                path: source.to_owned(),
                reason: "document has no 'kind' field".to_owned(),
            })?
            .to_owned();

        match kind.as_str() {
            KIND_LOG_SOURCE => {
                let def: LogSourceDef =
                    serde_yaml::from_value(value).map_err(|e| PipelineError::ResourceLoad {
                        path: source.to_owned(),
                        reason: format!("invalid LogSource document: {e}"),
                    })?;
                def.validate()?;
                snapshot.sources.push(def);
            }
            KIND_RULE_SET => {
                let def: RuleSetDef =
                    serde_yaml::from_value(value).map_err(|e| PipelineError::ResourceLoad {
                        path: source.to_owned(),
                        reason: format!("invalid RuleSet document: {e}"),
                    })?;
                def.validate()?;
                snapshot.rule_sets.push(def);
            }
            other => {
                return Err(PipelineError::ResourceLoad {
                    path: source.to_owned(),
                    reason: format!("unknown resource kind '{other}'"),
                });
            }
        }

        Ok(())
    }
}
