//! 로컬 파일 로그 소스 -- 파일 테일링
//!
//! 파일을 오프셋 폴링으로 추적하며 새로 추가된 라인을 수집합니다.
//! `tail -f`와 유사한 동작을 비동기 방식으로 구현합니다.
//!
//! # 동작
//! - 시작 시 파일 처음부터 읽어 기존 내용도 수집
//! - 파일 크기 축소(truncation) 감지 시 오프셋 리셋
//! - 개행으로 끝나지 않은 부분 라인은 완성될 때까지 대기
//! - 연속 실패가 재시도 한도에 도달하면 스트리밍 태스크 종료

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio_util::sync::CancellationToken;

use super::{LineBuffer, LineSource, StreamRetry};
use crate::resource::LocalSourceSpec;

/// 로컬 파일 로그 소스
pub struct LocalLineSource {
    /// 추적할 파일 경로
    path: PathBuf,
    /// 수집 라인 버퍼
    buffer: Arc<LineBuffer>,
    /// 실패 재시도 정책
    retry: StreamRetry,
    /// 파일 폴링 주기
    poll_interval: Duration,
}

impl LocalLineSource {
    /// 새 로컬 파일 소스를 생성합니다.
    pub fn new(
        spec: &LocalSourceSpec,
        buffer: Arc<LineBuffer>,
        retry: StreamRetry,
        poll_interval: Duration,
    ) -> Self {
        Self {
            path: PathBuf::from(&spec.path),
            buffer,
            retry,
            poll_interval,
        }
    }
}

impl LineSource for LocalLineSource {
    fn source_info(&self) -> String {
        format!("local: {}", self.path.display())
    }

    fn start_stream(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let path = self.path.clone();
        let buffer = Arc::clone(&self.buffer);
        let retry = self.retry;
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut offset: u64 = 0;
            let mut failures: u32 = 0;

            loop {
                match read_new_lines(&path, offset).await {
                    Ok((lines, new_offset)) => {
                        failures = 0;
                        offset = new_offset;
                        for line in lines {
                            buffer.push(line);
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            failures,
                            "failed to read log file"
                        );
                        if failures >= retry.attempts {
                            tracing::error!(
                                path = %path.display(),
                                attempts = retry.attempts,
                                "giving up on log file after repeated failures"
                            );
                            return;
                        }
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            _ = tokio::time::sleep(retry.delay) => {}
                        }
                        continue;
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        })
    }

    fn drain_new_lines(&self) -> Vec<String> {
        self.buffer.drain()
    }
}

/// 오프셋 이후의 완성된 라인들을 읽습니다.
///
/// 반환값은 (라인 목록, 새 오프셋)입니다. 개행으로 끝나지 않은 마지막
/// 부분 라인은 소비하지 않고 오프셋도 전진시키지 않습니다.
async fn read_new_lines(
    path: &std::path::Path,
    offset: u64,
) -> std::io::Result<(Vec<String>, u64)> {
    let metadata = tokio::fs::metadata(path).await?;
    let len = metadata.len();

    // truncation 감지: 파일이 줄어들면 처음부터 다시 읽음
    let mut start = offset;
    if len < offset {
        tracing::warn!(path = %path.display(), "log file truncated, resetting offset");
        start = 0;
    }

    if len == start {
        return Ok((Vec::new(), start));
    }

    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut reader = BufReader::new(file);

    let mut lines = Vec::new();
    let mut consumed = start;
    let mut line_buf = String::new();

    loop {
        line_buf.clear();
        let bytes_read = reader.read_line(&mut line_buf).await?;
        if bytes_read == 0 {
            break;
        }
        if !line_buf.ends_with('\n') {
            // 부분 라인: 다음 폴링에서 다시 읽음
            break;
        }
        consumed += bytes_read as u64;

        let line = line_buf.trim_end_matches(['\r', '\n']);
        if !line.is_empty() {
            lines.push(line.to_owned());
        }
    }

    Ok((lines, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncWriteExt;

    fn test_retry() -> StreamRetry {
        StreamRetry {
            attempts: 3,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn reads_complete_lines_from_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        tokio::fs::write(&path, "one\ntwo\npartial").await.unwrap();

        let (lines, offset) = read_new_lines(&path, 0).await.unwrap();
        assert_eq!(lines, vec!["one".to_owned(), "two".to_owned()]);
        assert_eq!(offset, 8); // "one\ntwo\n"

        // 부분 라인이 완성되면 다음 읽기에서 수집됨
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap();
        file.write_all(b" line\n").await.unwrap();
        file.flush().await.unwrap();

        let (lines, _) = read_new_lines(&path, offset).await.unwrap();
        assert_eq!(lines, vec!["partial line".to_owned()]);
    }

    #[tokio::test]
    async fn truncation_resets_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        tokio::fs::write(&path, "a long first generation\n").await.unwrap();

        let (_, offset) = read_new_lines(&path, 0).await.unwrap();
        assert!(offset > 0);

        // logrotate 등으로 파일이 짧아진 경우
        tokio::fs::write(&path, "new\n").await.unwrap();
        let (lines, _) = read_new_lines(&path, offset).await.unwrap();
        assert_eq!(lines, vec!["new".to_owned()]);
    }

    #[tokio::test]
    async fn stream_collects_appended_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        tokio::fs::write(&path, "first\n").await.unwrap();

        let spec = LocalSourceSpec {
            path: path.display().to_string(),
        };
        let buffer = Arc::new(LineBuffer::new(1000));
        let source = LocalLineSource::new(
            &spec,
            buffer,
            test_retry(),
            Duration::from_millis(20),
        );
        assert_eq!(source.source_info(), format!("local: {}", path.display()));

        let cancel = CancellationToken::new();
        let task = source.start_stream(cancel.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap();
        file.write_all(b"second\n").await.unwrap();
        file.flush().await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let lines = source.drain_new_lines();
        assert!(lines.contains(&"first".to_owned()));
        assert!(lines.contains(&"second".to_owned()));

        // 드레인은 파괴적: 새 라인이 없으면 두 번째 드레인은 비어 있음
        assert!(source.drain_new_lines().is_empty());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_gives_up_after_retries() {
        let spec = LocalSourceSpec {
            path: "/nonexistent/dir/app.log".to_owned(),
        };
        let buffer = Arc::new(LineBuffer::new(10));
        let source = LocalLineSource::new(
            &spec,
            buffer,
            test_retry(),
            Duration::from_millis(10),
        );

        let cancel = CancellationToken::new();
        let task = source.start_stream(cancel.clone());

        // 재시도 한도 소진 후 태스크가 스스로 종료해야 함
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("stream task should give up")
            .unwrap();
    }
}
