//! Backend selection with circuit breaking and background reconnection.
//!
//! The controller owns the only mutable view of which backend is serving.
//! Callers hand it an operation as a closure over `Arc<dyn Backend>`; the
//! closure may be invoked twice (remote, then file) when the remote attempt
//! fails transiently.

use super::{now_millis, Backend, BackendError, BackendKind, TransientClass};
use crate::config::Config;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use roster_engine::{Error, Timestamp};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Remote first.
    Healthy,
    /// Remote failed; file serves until the window elapses.
    Degraded,
    /// Pinned to the file backend for the process lifetime.
    Disabled,
}

/// Whether an operation mutates the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Reconnect backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// First delay after an ordinary network failure
    pub base: Duration,
    /// First delay after a name-resolution failure
    pub name_resolution: Duration,
    /// Cap for any delay
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base: config.reconnect_base,
            name_resolution: config.reconnect_dns,
            max: config.reconnect_max,
        }
    }

    /// Delay before the next reconnect after `failures` consecutive failures.
    pub fn delay(&self, class: TransientClass, failures: u32) -> Duration {
        let base = match class {
            TransientClass::NameResolution => self.name_resolution,
            _ => self.base,
        };
        let factor = 1u32 << failures.min(16);
        base.saturating_mul(factor).min(self.max)
    }
}

/// Point-in-time view of the controller, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub mode: Mode,
    pub active: BackendKind,
    /// End of the current circuit-open window, epoch millis
    pub open_until: Option<Timestamp>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct BackendState {
    mode: Mode,
    open_until: Option<Instant>,
    open_until_ms: Option<Timestamp>,
    last_error: Option<String>,
    failures: u32,
    /// Bumped on every transition; a reconnect task only acts while its
    /// generation is current.
    generation: u64,
    /// Writes the file backend absorbed since the last demotion.
    file_writes: u64,
    /// A caller holds the half-open probe.
    probing: bool,
}

struct Inner {
    remote: Option<Arc<dyn Backend>>,
    file: Arc<dyn Backend>,
    policy: BackoffPolicy,
    state: Mutex<BackendState>,
}

/// Decides which adapter serves each call.
#[derive(Clone)]
pub struct FailoverController {
    inner: Arc<Inner>,
}

impl FailoverController {
    /// Build a controller. Without a remote backend, or with `force_file`,
    /// the controller starts and stays `Disabled`.
    pub fn new(
        remote: Option<Arc<dyn Backend>>,
        file: Arc<dyn Backend>,
        policy: BackoffPolicy,
        force_file: bool,
    ) -> Self {
        let remote = remote.filter(|_| !force_file);
        let mode = if remote.is_some() {
            Mode::Healthy
        } else {
            Mode::Disabled
        };

        if force_file {
            tracing::info!("File store forced; remote backend disabled");
        }

        Self {
            inner: Arc::new(Inner {
                remote,
                file,
                policy,
                state: Mutex::new(BackendState {
                    mode,
                    open_until: None,
                    open_until_ms: None,
                    last_error: None,
                    failures: 0,
                    generation: 0,
                    file_writes: 0,
                    probing: false,
                }),
            }),
        }
    }

    /// Execute `call` against the selected backend.
    ///
    /// Transient remote failures demote the controller and re-run `call` on
    /// the file backend. Fatal errors propagate from whichever backend raised
    /// them.
    pub async fn run<'a, T, F>(&self, op: &'static str, access: Access, call: F) -> Result<T, Error>
    where
        F: Fn(Arc<dyn Backend>) -> BoxFuture<'a, Result<T, BackendError>>,
    {
        let Some((remote, _probe)) = self.inner.remote_target() else {
            return self.on_file(access, &call).await;
        };

        match call(remote).await {
            Ok(value) => {
                self.inner.record_success();
                Ok(value)
            }
            Err(BackendError::Transient { class, message }) => {
                tracing::warn!(
                    op,
                    class = %class,
                    error = %message,
                    "Remote backend failed; retrying on file store"
                );
                Inner::demote(&self.inner, class, &message);
                self.on_file(access, &call).await
            }
            Err(BackendError::Fatal(err)) => Err(err),
        }
    }

    async fn on_file<'a, T, F>(&self, access: Access, call: &F) -> Result<T, Error>
    where
        F: Fn(Arc<dyn Backend>) -> BoxFuture<'a, Result<T, BackendError>>,
    {
        let value = call(self.inner.file.clone())
            .await
            .map_err(BackendError::into_store_error)?;

        if access == Access::Write && self.inner.remote.is_some() {
            self.inner.state.lock().file_writes += 1;
        }
        Ok(value)
    }

    /// Check the remote once at boot so an unreachable database demotes the
    /// controller before the first request.
    pub async fn probe(&self) {
        let Some(remote) = self.inner.remote.clone() else {
            return;
        };

        match remote.ping().await {
            Ok(()) => {
                tracing::info!("Remote backend reachable");
                self.inner.record_success();
            }
            Err(BackendError::Transient { class, message }) => {
                Inner::demote(&self.inner, class, &message);
            }
            Err(BackendError::Fatal(err)) => {
                tracing::error!(error = %err, "Remote backend rejected startup probe");
                Inner::demote(&self.inner, TransientClass::Network, &err.to_string());
            }
        }
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.inner.state.lock().mode
    }

    /// Snapshot for health reporting.
    pub fn status(&self) -> BackendStatus {
        let state = self.inner.state.lock();
        BackendStatus {
            mode: state.mode,
            active: match state.mode {
                Mode::Healthy => BackendKind::Remote,
                Mode::Degraded | Mode::Disabled => BackendKind::File,
            },
            open_until: state.open_until_ms,
            last_error: state.last_error.clone(),
            consecutive_failures: state.failures,
        }
    }
}

impl Inner {
    /// The remote backend, when it should be tried for the next call.
    ///
    /// Once the window has elapsed exactly one caller at a time gets the
    /// remote, carrying a [`ProbeClaim`]; everyone else stays on the file
    /// backend until that probe resolves.
    fn remote_target(&self) -> Option<(Arc<dyn Backend>, Option<ProbeClaim<'_>>)> {
        let remote = self.remote.as_ref()?;
        let mut state = self.state.lock();
        match state.mode {
            Mode::Healthy => Some((remote.clone(), None)),
            Mode::Degraded => {
                let elapsed = state.open_until.map_or(true, |until| Instant::now() >= until);
                if !elapsed || state.probing {
                    return None;
                }
                state.probing = true;
                Some((remote.clone(), Some(ProbeClaim(self))))
            }
            Mode::Disabled => None,
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock();
        if state.mode != Mode::Degraded {
            return;
        }

        let file_writes = state.file_writes;
        state.mode = Mode::Healthy;
        state.open_until = None;
        state.open_until_ms = None;
        state.failures = 0;
        state.file_writes = 0;
        state.generation += 1;
        drop(state);

        // Writes absorbed by the file store stay there; there is no replay.
        tracing::info!(file_writes, "Remote backend recovered");
    }

    fn demote(inner: &Arc<Inner>, class: TransientClass, message: &str) {
        let (delay, generation) = {
            let mut state = inner.state.lock();
            if state.mode == Mode::Disabled {
                return;
            }

            state.last_error = Some(format!("{}: {}", class, message));
            let window_open = state.mode == Mode::Degraded
                && state.open_until.is_some_and(|until| Instant::now() < until);
            if window_open {
                // A reconnect is already scheduled for this window
                return;
            }

            if state.mode == Mode::Healthy {
                state.file_writes = 0;
            }

            let delay = inner.policy.delay(class, state.failures);
            state.failures = state.failures.saturating_add(1);
            state.mode = Mode::Degraded;
            state.open_until = Some(Instant::now() + delay);
            state.open_until_ms = Some(now_millis() + delay.as_millis() as Timestamp);
            state.generation += 1;
            (delay, state.generation)
        };

        tracing::warn!(
            class = %class,
            error = %message,
            "Remote backend demoted; file store serving"
        );
        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            generation,
            "Reconnect scheduled"
        );

        schedule_reconnect(Arc::downgrade(inner), generation, delay);
    }
}

/// Releases the half-open probe when the probing call finishes, whatever
/// its outcome, or when its future is dropped.
struct ProbeClaim<'a>(&'a Inner);

impl Drop for ProbeClaim<'_> {
    fn drop(&mut self) {
        self.0.state.lock().probing = false;
    }
}

fn schedule_reconnect(inner: Weak<Inner>, generation: u64, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        if inner.state.lock().generation != generation {
            tracing::debug!(generation, "Reconnect superseded");
            return;
        }
        let Some(remote) = inner.remote.clone() else {
            return;
        };

        match remote.ping().await {
            Ok(()) => inner.record_success(),
            Err(BackendError::Transient { class, message }) => {
                Inner::demote(&inner, class, &message);
            }
            Err(BackendError::Fatal(err)) => {
                Inner::demote(&inner, TransientClass::Network, &err.to_string());
            }
        }
    });
}
