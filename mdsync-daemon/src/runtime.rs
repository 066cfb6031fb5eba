use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use mdsync_core::{ErrorMode, SyncConfig};
use mdsync_mirror::{GitMirror, Mirror, Refresh};
use mdsync_sync::{convert_all, ConvertOptions, ConvertReport};

use crate::error::{io_err, DaemonError, ErrorClass};

/// Where the loop is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Syncing,
    Converting,
    Stopped,
}

/// Result of one successful refresh + convert cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub refresh: Refresh,
    pub conversion: ConvertReport,
    pub duration_ms: u128,
}

/// Periodic mirror-then-convert loop.
pub struct SyncLoop<M: Mirror> {
    config: SyncConfig,
    mirror: M,
    state: LoopState,
    cycle: u64,
    consecutive_failures: u32,
    reports: Option<mpsc::UnboundedSender<CycleReport>>,
}

impl<M: Mirror> SyncLoop<M> {
    pub fn new(config: SyncConfig, mirror: M) -> Self {
        SyncLoop {
            config,
            mirror,
            state: LoopState::Idle,
            cycle: 0,
            consecutive_failures: 0,
            reports: None,
        }
    }

    /// Deliver every successful cycle's report to `observer`.
    pub fn with_reports(mut self, observer: mpsc::UnboundedSender<CycleReport>) -> Self {
        self.reports = Some(observer);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn transition(&mut self, next: LoopState) {
        if self.state == LoopState::Stopped {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?next, "sync loop state");
        self.state = next;
    }

    /// Refresh the mirror, then convert the input directory.
    ///
    /// The refresh always completes before conversion starts. On error the
    /// loop is left in the state the failure happened in.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, DaemonError> {
        self.cycle += 1;
        let started = Instant::now();
        tracing::info!(
            cycle = self.cycle,
            repo = %self.config.repo_url,
            established = self.mirror.is_established(),
            "syncing repository",
        );

        self.transition(LoopState::Syncing);
        let refresh = self.mirror.refresh().await?;

        self.transition(LoopState::Converting);
        let input = self.config.input_dir.clone();
        let output = self.config.output_dir.clone();
        let template = self.config.template_file.clone();
        let options = ConvertOptions {
            workers: self.config.workers,
            dry_run: false,
        };
        let conversion =
            tokio::task::spawn_blocking(move || convert_all(&input, &output, &template, &options))
                .await
                .map_err(|err| DaemonError::Task(format!("conversion task join error: {err}")))??;

        self.transition(LoopState::Idle);
        let report = CycleReport {
            cycle: self.cycle,
            refresh,
            conversion,
            duration_ms: started.elapsed().as_millis(),
        };
        tracing::info!(
            cycle = report.cycle,
            commit = %report.refresh.head.short_id(),
            written = report.conversion.written(),
            failed = report.conversion.failed(),
            duration_ms = report.duration_ms,
            "sync cycle completed",
        );
        Ok(report)
    }

    /// Run cycles until shutdown or a failure the policy does not retry.
    ///
    /// Shutdown is observed while waiting and while a cycle is in flight;
    /// either way the loop ends in [`LoopState::Stopped`] and returns `Ok`.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), DaemonError> {
        let interval = self.config.interval();
        let mut delay = if self.config.sync_on_start {
            Duration::ZERO
        } else {
            interval
        };

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    self.stop("shutdown requested while idle");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let attempt = tokio::select! {
                _ = shutdown.recv() => None,
                result = self.run_cycle() => Some(result),
            };
            let Some(result) = attempt else {
                self.stop("shutdown requested during cycle");
                return Ok(());
            };

            delay = match result {
                Ok(report) => {
                    self.consecutive_failures = 0;
                    if let Some(observer) = &self.reports {
                        let _ = observer.send(report);
                    }
                    interval
                }
                Err(err) => match self.on_failure(err) {
                    Ok(backoff) => {
                        self.transition(LoopState::Idle);
                        backoff
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "sync loop stopping");
                        self.stop("fatal error");
                        return Err(err);
                    }
                },
            };
        }
    }

    /// Decide between retrying (returns the backoff) and stopping.
    fn on_failure(&mut self, err: DaemonError) -> Result<Duration, DaemonError> {
        let policy = &self.config.failure;
        if policy.on_error == ErrorMode::Fatal || err.class() == ErrorClass::Structural {
            return Err(err);
        }

        self.consecutive_failures += 1;
        if let Some(max) = policy.max_consecutive_failures {
            if self.consecutive_failures >= max {
                return Err(DaemonError::RetriesExhausted {
                    failures: self.consecutive_failures,
                    last: Box::new(err),
                });
            }
        }

        let backoff = policy.backoff(self.consecutive_failures);
        tracing::warn!(
            error = %err,
            failures = self.consecutive_failures,
            retry_in_secs = backoff.as_secs(),
            "sync cycle failed; retrying",
        );
        Ok(backoff)
    }

    fn stop(&mut self, reason: &str) {
        tracing::info!(reason, cycles = self.cycle, "sync loop stopped");
        self.transition(LoopState::Stopped);
    }
}

fn git_mirror(config: &SyncConfig) -> GitMirror {
    GitMirror::new(config.repo_url.clone(), config.input_dir.clone())
        .with_reference(config.reference.clone())
}

/// One refresh + convert cycle against the configured repository.
pub async fn run_once(config: SyncConfig) -> Result<CycleReport, DaemonError> {
    let mirror = git_mirror(&config);
    let mut sync_loop = SyncLoop::new(config, mirror);
    sync_loop.run_cycle().await
}

/// [`run_once`] on a private single-threaded runtime.
pub fn once_blocking(config: SyncConfig) -> Result<CycleReport, DaemonError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run_once(config))
}

/// Start the sync loop and block the current thread until it exits.
pub fn start_blocking(config: SyncConfig) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the sync loop alongside a signal handler until either ends.
pub async fn run(config: SyncConfig) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    tracing::info!(
        repo = %config.repo_url,
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        interval_secs = config.interval_secs,
        "starting sync loop",
    );

    let loop_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mirror = git_mirror(&config);
            let result = SyncLoop::new(config, mirror).run(shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = shutdown_signal() => {
                    match signal {
                        Ok(name) => {
                            tracing::info!(signal = name, "shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Task(format!("signal handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (loop_result, signal_result) = tokio::join!(loop_handle, signal_handle);
    handle_join("sync_loop", loop_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "ctrl-c"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task(format!("{task} task join failure: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use mdsync_core::CommitInfo;
    use mdsync_mirror::{MirrorError, RefreshOutcome};
    use mdsync_sync::SyncError;

    use super::*;

    /// Scripted mirror. Once the script runs out every refresh is up to date.
    struct FakeMirror {
        script: VecDeque<Result<RefreshOutcome, MirrorError>>,
        calls: Arc<AtomicUsize>,
        /// Written into the input directory on every successful refresh.
        drop_document: Option<(PathBuf, String)>,
        established: bool,
    }

    impl FakeMirror {
        fn new(script: Vec<Result<RefreshOutcome, MirrorError>>) -> Self {
            FakeMirror {
                script: script.into(),
                calls: Arc::new(AtomicUsize::new(0)),
                drop_document: None,
                established: false,
            }
        }

        fn failing_forever() -> Self {
            let mut mirror = FakeMirror::new(Vec::new());
            mirror.script = std::iter::repeat_with(|| Err(pull_error())).take(64).collect();
            mirror
        }
    }

    #[async_trait]
    impl Mirror for FakeMirror {
        async fn refresh(&mut self) -> Result<Refresh, MirrorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .script
                .pop_front()
                .unwrap_or(Ok(RefreshOutcome::AlreadyUpToDate))?;
            if let Some((path, content)) = &self.drop_document {
                fs::write(path, content).unwrap();
            }
            self.established = true;
            Ok(Refresh {
                outcome,
                head: head(),
            })
        }

        fn is_established(&self) -> bool {
            self.established
        }
    }

    fn head() -> CommitInfo {
        CommitInfo {
            id: "0123456789abcdef".to_string(),
            author: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            committed_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            summary: "docs".to_string(),
        }
    }

    fn pull_error() -> MirrorError {
        MirrorError::Pull {
            path: PathBuf::from("./input"),
            detail: "could not resolve host".to_string(),
        }
    }

    struct Workspace {
        _root: TempDir,
        config: SyncConfig,
    }

    fn workspace() -> Workspace {
        let root = TempDir::new().unwrap();
        let input = root.path().join("input");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.md"), "# Title").unwrap();
        let template = root.path().join("template.html");
        fs::write(&template, "<body>{{.}}</body>").unwrap();
        let config = SyncConfig {
            input_dir: input,
            output_dir: root.path().join("output"),
            template_file: template,
            sync_on_start: true,
            ..SyncConfig::default()
        };
        Workspace {
            _root: root,
            config,
        }
    }

    #[tokio::test]
    async fn cycle_refreshes_before_converting() {
        let ws = workspace();
        let mut mirror = FakeMirror::new(vec![Ok(RefreshOutcome::Cloned)]);
        mirror.drop_document = Some((ws.config.input_dir.join("b.md"), "# Pulled".to_string()));
        let mut sync_loop = SyncLoop::new(ws.config.clone(), mirror);

        let report = sync_loop.run_cycle().await.expect("cycle");

        assert_eq!(report.cycle, 1);
        assert_eq!(report.refresh.outcome, RefreshOutcome::Cloned);
        assert_eq!(report.conversion.written(), 2);
        let page = fs::read_to_string(ws.config.output_dir.join("b.md.html")).unwrap();
        assert_eq!(page, "<body><h1>Pulled</h1>\n</body>");
        assert_eq!(sync_loop.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn up_to_date_mirror_still_converts() {
        let ws = workspace();
        let mut sync_loop =
            SyncLoop::new(ws.config.clone(), FakeMirror::new(vec![Ok(RefreshOutcome::AlreadyUpToDate)]));

        let report = sync_loop.run_cycle().await.expect("benign pull is not an error");
        assert_eq!(report.refresh.outcome, RefreshOutcome::AlreadyUpToDate);
        assert!(ws.config.output_dir.join("a.md.html").is_file());
    }

    #[tokio::test]
    async fn failed_refresh_leaves_loop_in_syncing() {
        let ws = workspace();
        let mut sync_loop = SyncLoop::new(ws.config.clone(), FakeMirror::new(vec![Err(pull_error())]));

        let err = sync_loop.run_cycle().await.expect_err("refresh fails");
        assert!(matches!(err, DaemonError::Mirror(MirrorError::Pull { .. })));
        assert_eq!(sync_loop.state(), LoopState::Syncing);
        assert!(!ws.config.output_dir.exists(), "no conversion after a failed refresh");
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_mode_stops_on_first_mirror_error() {
        let mut ws = workspace();
        ws.config.failure.on_error = ErrorMode::Fatal;
        let mirror = FakeMirror::new(vec![Err(pull_error())]);
        let calls = mirror.calls.clone();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let mut sync_loop = SyncLoop::new(ws.config, mirror);
        let err = sync_loop.run(shutdown_rx).await.expect_err("fatal");

        assert!(matches!(err, DaemonError::Mirror(_)));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(sync_loop.state(), LoopState::Stopped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_mode_recovers_after_backoff() {
        let ws = workspace();
        let initial = Duration::from_secs(ws.config.failure.initial_backoff_secs);
        let mirror = FakeMirror::new(vec![Err(pull_error()), Ok(RefreshOutcome::Cloned)]);
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let mut sync_loop = SyncLoop::new(ws.config, mirror).with_reports(report_tx);
            let result = sync_loop.run(shutdown_rx).await;
            (result, sync_loop.state(), sync_loop.consecutive_failures(), ws._root)
        });

        let report = report_rx.recv().await.expect("report after retry");
        assert_eq!(report.cycle, 2);
        assert_eq!(report.refresh.outcome, RefreshOutcome::Cloned);
        assert!(started.elapsed() >= initial, "retry waits for the backoff");

        shutdown_tx.send(()).unwrap();
        let (result, state, failures, _root) = handle.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(state, LoopState::Stopped);
        assert_eq!(failures, 0, "a successful cycle resets the streak");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_input_directory_stops_even_when_retrying() {
        let ws = workspace();
        fs::remove_dir_all(&ws.config.input_dir).unwrap();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let mut sync_loop = SyncLoop::new(ws.config.clone(), FakeMirror::new(Vec::new()));
        let err = sync_loop.run(shutdown_rx).await.expect_err("structural");

        assert!(matches!(err, DaemonError::Sync(SyncError::DirectoryMissing { .. })));
        assert_eq!(err.exit_code(), 4);
        assert_eq!(sync_loop.state(), LoopState::Stopped);
        assert!(!ws.config.output_dir.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_failure_cap_stops_the_loop() {
        let mut ws = workspace();
        ws.config.failure.max_consecutive_failures = Some(3);
        let mirror = FakeMirror::failing_forever();
        let calls = mirror.calls.clone();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let mut sync_loop = SyncLoop::new(ws.config, mirror);
        let err = sync_loop.run(shutdown_rx).await.expect_err("gives up");

        assert!(matches!(err, DaemonError::RetriesExhausted { failures: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sync_loop.state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_first_wait_never_syncs() {
        let mut ws = workspace();
        ws.config.sync_on_start = false;
        let mirror = FakeMirror::new(Vec::new());
        let calls = mirror.calls.clone();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        let mut sync_loop = SyncLoop::new(ws.config, mirror);
        sync_loop.run(shutdown_rx).await.expect("clean shutdown");

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sync_loop.state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_repeat_on_the_interval() {
        let mut ws = workspace();
        ws.config.sync_on_start = false;
        let interval = ws.config.interval();
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let mut sync_loop =
                SyncLoop::new(ws.config, FakeMirror::new(Vec::new())).with_reports(report_tx);
            let result = sync_loop.run(shutdown_rx).await;
            (result, ws._root)
        });

        let first = report_rx.recv().await.unwrap();
        assert!(started.elapsed() >= interval, "first cycle waits one interval");
        let second = report_rx.recv().await.unwrap();
        assert_eq!((first.cycle, second.cycle), (1, 2));
        assert!(started.elapsed() >= interval * 2);

        shutdown_tx.send(()).unwrap();
        let (result, _root) = handle.await.unwrap();
        assert!(result.is_ok());
    }
}
