use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use bootmirror_core::Config;
use bootmirror_sync::notifier::SUBJECT_CRITICAL;
use bootmirror_sync::{apply_event, initial_sync, CommandChannel, Dispatch, Mirror, ReconcileReport, Severity};

use crate::error::{io_err, DaemonError};
use crate::mounts::{Availability, AvailabilityChecker};
use crate::watcher::{self, RawEvents};

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing(config.debug);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run until Ctrl-C / SIGTERM or a fatal error.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    run_until(config, shutdown_signal()).await
}

/// Gate on availability, reconcile once, then watch until `shutdown` resolves.
pub async fn run_until<F>(config: Config, shutdown: F) -> Result<(), DaemonError>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    if config.dry_run {
        tracing::info!("Running in DRY RUN mode - no changes will be made");
    }
    tracing::debug!(path = %config.primary_root.display(), "Boot Device");
    tracing::debug!(path = %config.backup_root.display(), "Backup Destination");

    let mirror = Arc::new(Mirror::from_config(
        &config,
        Box::new(CommandChannel::new(&config.notify_command)),
    ));
    let checker = AvailabilityChecker::from_config(&config);

    // Polling `shutdown` here installs the signal handlers before the first
    // pass starts.
    tokio::pin!(shutdown);
    let startup = async {
        ensure_available(&checker, &mirror).await?;
        reconcile(mirror.clone()).await
    };
    tokio::select! {
        biased;
        _ = &mut shutdown => {
            tracing::info!("Stopped by user during startup");
            return Ok(());
        }
        result = startup => {
            result?;
        }
    }

    let (_watcher, events) = watcher::watch(&config.primary_root)?;
    tracing::info!(
        root = %config.primary_root.display(),
        "Starting inotify monitoring",
    );

    monitor(
        mirror,
        checker,
        events,
        config.availability_check_interval(),
        shutdown,
    )
    .await
}

/// Availability gate plus one reconciliation pass, for `bootmirror sync`.
pub fn sync_once(config: &Config) -> Result<ReconcileReport, DaemonError> {
    config.validate()?;
    let mirror = Mirror::from_config(config, Box::new(CommandChannel::new(&config.notify_command)));
    let checker = AvailabilityChecker::from_config(config);
    let availability = checker.check_available(mirror.notifier());
    if !availability.is_available() {
        return Err(DaemonError::Unavailable(availability));
    }
    Ok(initial_sync(&mirror))
}

/// Consume change notifications until `shutdown` resolves.
///
/// Events are applied strictly one at a time in delivery order. Every
/// `check_interval` the availability checker runs again; losing a mount is
/// fatal. Watcher errors, rescan requests (queue overflow), a closed event
/// channel and panicking actions are unknown conditions: critical alert,
/// then error out.
pub async fn monitor<F>(
    mirror: Arc<Mirror>,
    checker: AvailabilityChecker,
    mut events: RawEvents,
    check_interval: Duration,
    shutdown: F,
) -> Result<(), DaemonError>
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + check_interval, check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Monitoring stopped by user");
                return Ok(());
            }
            _ = ticker.tick() => {
                ensure_available(&checker, &mirror).await?;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    return Err(fail_fast(&mirror, DaemonError::ChannelClosed("watcher events")));
                };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => return Err(fail_fast(&mirror, err.into())),
                };
                if event.need_rescan() {
                    return Err(fail_fast(&mirror, DaemonError::EventsLost));
                }
                for change in watcher::translate(&event) {
                    let m = mirror.clone();
                    let kinds = change.kinds_label();
                    let path = change.path.clone();
                    let dispatch = tokio::task::spawn_blocking(move || apply_event(&m, &change))
                        .await
                        .map_err(|err| {
                            fail_fast(
                                &mirror,
                                DaemonError::Join { task: "apply_event", message: err.to_string() },
                            )
                        })?;
                    log_dispatch(&kinds, &path, &dispatch);
                }
            }
        }
    }
}

async fn ensure_available(
    checker: &AvailabilityChecker,
    mirror: &Arc<Mirror>,
) -> Result<(), DaemonError> {
    let checker = checker.clone();
    let m = mirror.clone();
    let availability = tokio::task::spawn_blocking(move || checker.check_available(m.notifier()))
        .await
        .map_err(|err| DaemonError::Join {
            task: "availability_check",
            message: err.to_string(),
        })?;
    match availability {
        Availability::Available => Ok(()),
        other => Err(DaemonError::Unavailable(other)),
    }
}

async fn reconcile(mirror: Arc<Mirror>) -> Result<ReconcileReport, DaemonError> {
    let report = tokio::task::spawn_blocking(move || initial_sync(&mirror))
        .await
        .map_err(|err| DaemonError::Join {
            task: "initial_sync",
            message: err.to_string(),
        })?;
    tracing::info!(
        synced = report.synced,
        removed = report.removed,
        created_dirs = report.created_dirs,
        removed_dirs = report.removed_dirs,
        failed = report.failed,
        duration_ms = report.duration_ms,
        "reconciliation finished",
    );
    Ok(report)
}

fn log_dispatch(kinds: &str, path: &std::path::Path, dispatch: &Dispatch) {
    match dispatch {
        Dispatch::Excluded | Dispatch::Ignored => {
            tracing::trace!(kinds, path = %path.display(), outcome = ?dispatch, "event skipped");
        }
        Dispatch::Applied(rule, outcome) => {
            tracing::debug!(kinds, path = %path.display(), ?rule, ?outcome, "event applied");
        }
        Dispatch::Failed(rule) => {
            tracing::warn!(kinds, path = %path.display(), ?rule, "event failed");
        }
    }
}

fn fail_fast(mirror: &Mirror, err: DaemonError) -> DaemonError {
    tracing::error!(error = %err, "Unexpected error");
    mirror.notifier().notify(
        SUBJECT_CRITICAL,
        &format!("Service crashed with error: {err}"),
        Severity::Alert,
    );
    err
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => Some(term),
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                None
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => ctrl_c_result(result).await,
            _ = async {
                match term.as_mut() {
                    Some(term) => { term.recv().await; }
                    None => std::future::pending::<()>().await,
                }
            } => tracing::info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    ctrl_c_result(tokio::signal::ctrl_c().await).await;
}

async fn ctrl_c_result(result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::info!("received ctrl-c"),
        Err(err) => {
            // Without a handler the process can only be stopped by a fatal error.
            tracing::warn!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the debug flag.
pub fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    tracing::debug!("Debug logging enabled.");
}
