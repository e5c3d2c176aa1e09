//! Pod 로그 소스 -- 클러스터 pod 컨테이너의 로그 스트림 추적
//!
//! Kubernetes API의 follow 로그 스트림을 열어 라인 단위로 내부 버퍼에
//! 쌓습니다. 스트림이 끊기거나 열기에 실패하면 고정 지연으로 제한된
//! 횟수만큼 재연결을 시도하고, 소진되면 태스크를 종료합니다.

use std::sync::Arc;

use futures::{AsyncBufReadExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::LogParams;
use tokio_util::sync::CancellationToken;

use super::{LineBuffer, LineSource, StreamRetry};
use crate::resource::PodSourceSpec;

/// Pod 컨테이너 로그 소스
pub struct PodLineSource {
    /// 클러스터 클라이언트
    client: kube::Client,
    /// pod 네임스페이스
    namespace: String,
    /// pod 이름
    pod: String,
    /// 컨테이너 이름
    container: String,
    /// 수집 라인 버퍼
    buffer: Arc<LineBuffer>,
    /// 재연결 정책
    retry: StreamRetry,
}

impl PodLineSource {
    /// 새 pod 로그 소스를 생성합니다.
    pub fn new(
        client: kube::Client,
        namespace: String,
        spec: &PodSourceSpec,
        buffer: Arc<LineBuffer>,
        retry: StreamRetry,
    ) -> Self {
        Self {
            client,
            namespace,
            pod: spec.pod.name.clone(),
            container: spec.pod.container.clone(),
            buffer,
            retry,
        }
    }
}

impl LineSource for PodLineSource {
    fn source_info(&self) -> String {
        format!("pod: {}/{}", self.pod, self.container)
    }

    fn start_stream(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        let pod = self.pod.clone();
        let container = self.container.clone();
        let buffer = Arc::clone(&self.buffer);
        let retry = self.retry;

        tokio::spawn(async move {
            let mut failures: u32 = 0;

            loop {
                if cancel.is_cancelled() {
                    return;
                }

                let params = LogParams {
                    follow: true,
                    container: Some(container.clone()),
                    ..Default::default()
                };

                match api.log_stream(&pod, &params).await {
                    Ok(stream) => {
                        failures = 0;
                        let mut lines = stream.lines();

                        loop {
                            tokio::select! {
                                _ = cancel.cancelled() => return,

                                result = lines.try_next() => {
                                    match result {
                                        Ok(Some(line)) => {
                                            buffer.push(line);
                                        }
                                        Ok(None) => {
                                            // 스트림 종료 (pod 재시작 등) -- 재연결 시도
                                            tracing::warn!(pod = %pod, "pod log stream ended");
                                            break;
                                        }
                                        Err(e) => {
                                            tracing::warn!(
                                                pod = %pod,
                                                error = %e,
                                                "pod log stream read failed"
                                            );
                                            break;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            pod = %pod,
                            container = %container,
                            error = %e,
                            "failed to open pod log stream"
                        );
                    }
                }

                failures += 1;
                if failures >= retry.attempts {
                    tracing::error!(
                        pod = %pod,
                        attempts = retry.attempts,
                        "giving up on pod log stream after repeated failures"
                    );
                    return;
                }

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(retry.delay) => {}
                }
            }
        })
    }

    fn drain_new_lines(&self) -> Vec<String> {
        self.buffer.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::PodRef;

    #[test]
    fn source_info_matches_spec_identity() {
        let spec = PodSourceSpec {
            pod: PodRef {
                name: "nginx-7d4b".to_owned(),
                container: "nginx".to_owned(),
            },
        };
        // client 생성 없이 식별 문자열 형식만 검증
        assert_eq!(
            format!("pod: {}/{}", spec.pod.name, spec.pod.container),
            "pod: nginx-7d4b/nginx"
        );
    }
}
