//! Pipeline assembly and lifecycle management.
//!
//! The [`Runner`] is the central coordinator of `tailforge-daemon`.
//! It loads the initial resource snapshot, wires the binding resolver
//! and source manager together, runs the reconcile and export-drain
//! loops, and performs ordered shutdown.
//!
//! # Background loops
//!
//! * **Reconcile loop**: periodically re-reads the resource directory
//!   and applies the whole-set snapshot (resolver first, then manager).
//! * **Drain loop**: periodically performs a destructive drain of the
//!   shared output buffer and hands the items to the downstream
//!   channel (the exporter boundary), or logs them when no consumer
//!   is wired.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tailforge_core::config::TailforgeConfig;
use tailforge_core::event::ProcessedDataItem;
use tailforge_core::metrics as metric_names;
use tailforge_core::types::SourceInfo;
use tailforge_pipeline::resource::{ResourceLoader, SourceType};
use tailforge_pipeline::{BindingResolver, PipelineConfig, SourceManager};

/// The main daemon runner.
///
/// Owns the binding resolver, the source manager, and the background
/// loops. `run()` blocks until a shutdown signal is received.
pub struct Runner {
    /// Loaded and validated configuration.
    config: TailforgeConfig,
    /// Binding resolver shared with the manager.
    resolver: Arc<BindingResolver>,
    /// Source lifecycle manager.
    manager: Arc<SourceManager>,
    /// Optional downstream consumer of drained items.
    item_tx: Option<mpsc::Sender<ProcessedDataItem>>,
    /// Cancellation for the background loops.
    loop_cancel: CancellationToken,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

/// Builder for [`Runner`].
///
/// Wires an optional downstream item channel before assembly.
pub struct RunnerBuilder {
    config: TailforgeConfig,
    item_tx: Option<mpsc::Sender<ProcessedDataItem>>,
}

impl RunnerBuilder {
    /// Create a new builder from a loaded configuration.
    pub fn new(config: TailforgeConfig) -> Self {
        Self {
            config,
            item_tx: None,
        }
    }

    /// Set an external consumer for drained output items.
    ///
    /// Without a consumer, drained items are logged and discarded at
    /// the exporter boundary.
    pub fn item_sender(mut self, tx: mpsc::Sender<ProcessedDataItem>) -> Self {
        self.item_tx = Some(tx);
        self
    }

    /// Load the initial resource snapshot and assemble the runner.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the
    /// resource directory cannot be read. These are the only fatal
    /// startup conditions; per-source misconfiguration is logged and
    /// skipped by the manager.
    pub async fn build(self) -> Result<Runner> {
        self.config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let pipeline_config = PipelineConfig::from_core(&self.config.pipeline);
        pipeline_config
            .validate()
            .map_err(|e| anyhow::anyhow!("pipeline config validation failed: {}", e))?;

        let snapshot = ResourceLoader::load_directory(&pipeline_config.resource_dir)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load resource snapshot: {}", e))?;

        // Connect to the cluster only when a pod source is configured.
        // A connection failure degrades those sources, not the process.
        let needs_cluster = snapshot
            .sources
            .iter()
            .any(|def| def.spec.source_type == SourceType::PodSource);
        let kube_client = if needs_cluster {
            match kube::Client::try_default().await {
                Ok(client) => {
                    tracing::info!("connected to Kubernetes cluster for pod sources");
                    Some(client)
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "failed to create Kubernetes client, pod sources will be skipped"
                    );
                    None
                }
            }
        } else {
            None
        };

        let resolver = Arc::new(BindingResolver::new());
        let manager = Arc::new(SourceManager::new(
            pipeline_config,
            Arc::clone(&resolver),
            kube_client,
        ));

        manager.initialize(&snapshot.sources, &snapshot.rule_sets);
        tracing::info!(
            sources = snapshot.sources.len(),
            rule_sets = snapshot.rule_sets.len(),
            active = manager.active_count(),
            "runner initialized"
        );

        Ok(Runner {
            config: self.config,
            resolver,
            manager,
            item_tx: self.item_tx,
            loop_cancel: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }
}

impl Runner {
    /// Start the background loops and block until a shutdown signal.
    pub async fn run(&self) -> Result<()> {
        let reconcile_task = spawn_reconcile_loop(
            self.config.pipeline.resource_dir.clone(),
            Duration::from_secs(self.config.pipeline.reconcile_interval_secs),
            Arc::clone(&self.resolver),
            Arc::clone(&self.manager),
            self.loop_cancel.clone(),
        );

        let drain_task = spawn_drain_loop(
            Duration::from_secs(self.config.pipeline.drain_interval_secs),
            Arc::clone(&self.manager),
            self.item_tx.clone(),
            self.start_time,
            self.loop_cancel.clone(),
        );

        tracing::info!("tailforge-daemon running");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown_with_tasks(vec![reconcile_task, drain_task])
            .await;
        Ok(())
    }

    /// Stop the background loops and the source manager.
    ///
    /// After this returns, no ingestion task is left running and a
    /// final destructive drain has been forwarded.
    pub async fn shutdown(&self) {
        self.shutdown_with_tasks(Vec::new()).await;
    }

    async fn shutdown_with_tasks(&self, tasks: Vec<tokio::task::JoinHandle<()>>) {
        self.loop_cancel.cancel();
        for task in tasks {
            let _ = task.await;
        }

        self.manager.shut_down().await;

        // Final drain so nothing accumulated during shutdown is lost.
        let remaining = self.manager.drain_output();
        if !remaining.is_empty() {
            tracing::info!(count = remaining.len(), "forwarding final drained items");
            forward_items(remaining, self.item_tx.as_ref()).await;
        }

        tracing::info!("tailforge-daemon shut down");
    }

    /// Get a reference to the source manager (for introspection).
    pub fn manager(&self) -> &Arc<SourceManager> {
        &self.manager
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &TailforgeConfig {
        &self.config
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Spawn the periodic resource reconcile loop.
///
/// Each tick re-reads the resource directory and applies the snapshot:
/// resolver first (bindings), then manager (task lifecycle). A failed
/// read keeps the previous snapshot active.
fn spawn_reconcile_loop(
    resource_dir: String,
    interval: Duration,
    resolver: Arc<BindingResolver>,
    manager: Arc<SourceManager>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The immediate first tick would re-apply the initial snapshot.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("reconcile loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match ResourceLoader::load_directory(&resource_dir).await {
                        Ok(snapshot) => {
                            resolver.update(&snapshot.sources, &snapshot.rule_sets);
                            manager.update(&snapshot.sources);
                        }
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                "failed to reload resource snapshot, keeping previous"
                            );
                        }
                    }
                }
            }
        }
    })
}

/// Spawn the periodic output drain loop.
///
/// Each tick performs a destructive drain of the shared output buffer
/// and hands the items downstream. Also refreshes the uptime gauge.
fn spawn_drain_loop(
    interval: Duration,
    manager: Arc<SourceManager>,
    item_tx: Option<mpsc::Sender<ProcessedDataItem>>,
    start_time: Instant,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("drain loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(metric_names::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);

                    let items = manager.drain_output();
                    if items.is_empty() {
                        continue;
                    }
                    tracing::debug!(count = items.len(), "drained output items");
                    forward_items(items, item_tx.as_ref()).await;
                }
            }
        }
    })
}

/// Hand drained items to the downstream consumer.
///
/// Without a consumer this is the exporter boundary: forwarded text
/// and metrics are logged at debug level and dropped.
async fn forward_items(
    items: Vec<ProcessedDataItem>,
    item_tx: Option<&mpsc::Sender<ProcessedDataItem>>,
) {
    match item_tx {
        Some(tx) => {
            for item in items {
                if tx.send(item).await.is_err() {
                    tracing::warn!("item consumer closed, dropping remaining items");
                    break;
                }
            }
        }
        None => {
            for item in items {
                log_item(&item);
            }
        }
    }
}

/// Log one item at the exporter boundary.
fn log_item(item: &ProcessedDataItem) {
    let SourceInfo { name, namespace } = &item.source;
    if item.has_forward_log() {
        tracing::debug!(
            source = %name,
            namespace = %namespace,
            log = %item.forward_log,
            "no exporter wired, dropping forwarded log"
        );
    }
    if let Some(metric) = &item.metric {
        tracing::debug!(
            source = %name,
            namespace = %namespace,
            metric = %metric,
            "no exporter wired, dropping metric"
        );
    }
}
