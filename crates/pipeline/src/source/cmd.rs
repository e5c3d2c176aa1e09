//! 커맨드 로그 소스 -- 커맨드 출력 수집 (스텁)
//!
//! 대상 pod/컨테이너에서의 커맨드 실행이 구현될 때까지 라인을
//! 생산하지 않습니다.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{LineBuffer, LineSource};
use crate::resource::CmdSourceSpec;

/// 커맨드 로그 소스 (스텁)
pub struct CmdLineSource {
    /// 실행할 커맨드
    command: String,
    /// 수집 라인 버퍼 (항상 비어 있음)
    buffer: Arc<LineBuffer>,
}

impl CmdLineSource {
    /// 새 커맨드 소스를 생성합니다.
    pub fn new(spec: &CmdSourceSpec, buffer: Arc<LineBuffer>) -> Self {
        Self {
            command: spec.command.clone(),
            buffer,
        }
    }
}

impl LineSource for CmdLineSource {
    fn source_info(&self) -> String {
        format!("cmd: {}", self.command)
    }

    fn start_stream(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let info = self.source_info();
        tokio::spawn(async move {
            tracing::warn!(
                source = %info,
                "command source streaming is not implemented; no lines will be produced"
            );
            cancel.cancelled().await;
        })
    }

    fn drain_new_lines(&self) -> Vec<String> {
        self.buffer.drain()
    }
}
