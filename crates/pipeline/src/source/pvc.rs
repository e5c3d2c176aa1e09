//! PVC 로그 소스 -- 마운트된 볼륨 파일 (스텁)
//!
//! 볼륨 마운트 연동이 구현될 때까지 라인을 생산하지 않습니다.
//! 식별 문자열과 드레인 계약은 유효하므로 생명주기 관리에는 정상
//! 참여합니다.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{LineBuffer, LineSource};
use crate::resource::PvcSourceSpec;

/// PVC 로그 소스 (스텁)
pub struct PvcLineSource {
    /// PVC 이름
    pvc_name: String,
    /// 볼륨 내 로그 파일 경로
    log_file_path: String,
    /// 수집 라인 버퍼 (항상 비어 있음)
    buffer: Arc<LineBuffer>,
}

impl PvcLineSource {
    /// 새 PVC 소스를 생성합니다.
    pub fn new(spec: &PvcSourceSpec, buffer: Arc<LineBuffer>) -> Self {
        Self {
            pvc_name: spec.pvc.name.clone(),
            log_file_path: spec.log_file_path.clone(),
            buffer,
        }
    }
}

impl LineSource for PvcLineSource {
    fn source_info(&self) -> String {
        format!("pvc: {}:{}", self.pvc_name, self.log_file_path)
    }

    fn start_stream(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let info = self.source_info();
        tokio::spawn(async move {
            tracing::warn!(
                source = %info,
                "PVC source streaming is not implemented; no lines will be produced"
            );
            cancel.cancelled().await;
        })
    }

    fn drain_new_lines(&self) -> Vec<String> {
        self.buffer.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::PvcRef;

    #[tokio::test]
    async fn stub_streams_nothing_and_stops_on_cancel() {
        let spec = PvcSourceSpec {
            pvc: PvcRef {
                name: "shared".to_owned(),
            },
            log_file_path: "/data/app.log".to_owned(),
        };
        let source = PvcLineSource::new(&spec, Arc::new(LineBuffer::new(10)));
        assert_eq!(source.source_info(), "pvc: shared:/data/app.log");

        let cancel = CancellationToken::new();
        let task = source.start_stream(cancel.clone());

        assert!(source.drain_new_lines().is_empty());

        cancel.cancel();
        task.await.unwrap();
    }
}
