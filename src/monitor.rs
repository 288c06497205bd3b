//! Background load monitor.
//!
//! A tokio task probes the server's own `GET /healthz` endpoint at a fixed
//! interval and keeps a rolling average of how long the probes take. When the
//! average exceeds the probe timeout the server reports itself as under high
//! load.
//!
//! The state lives in an [`Arc<LoadState>`] created by the caller and shared
//! with the HTTP layer. [`LoadMonitor::start`] returns a [`MonitorHandle`];
//! dropping the handle stops the task.
//!
//! ## Rolling average
//!
//! ```text
//! total += elapsed; count += 1
//! average = total / count
//! high_load = average > max_wait
//! if count > window { total = average; count = 1 }
//! ```
//!
//! Failed probes are not errors. Their elapsed time, up to the timeout, is
//! recorded like any other.

use crate::config::MonitorConfig;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Running sum over the current window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadWindow {
    total_ms: f64,
    count: u32,
    average_ms: Option<f64>,
}

impl LoadWindow {
    /// Add one probe time and return whether the new average exceeds `max_wait`.
    pub fn record(&mut self, elapsed: Duration, window: u32, max_wait: Duration) -> bool {
        self.total_ms += elapsed.as_secs_f64() * 1000.0;
        self.count += 1;
        let average = self.total_ms / f64::from(self.count);
        self.average_ms = Some(average);

        if self.count > window {
            self.total_ms = average;
            self.count = 1;
        }
        average > max_wait.as_secs_f64() * 1000.0
    }

    /// Average over the current window, `None` before the first probe.
    pub fn average_ms(&self) -> Option<f64> {
        self.average_ms
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Shared monitor state.
#[derive(Debug)]
pub struct LoadState {
    window: Mutex<LoadWindow>,
    high_load: AtomicBool,
    window_size: u32,
    max_wait: Duration,
}

/// Point-in-time view of [`LoadState`], served by `/healthz`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSnapshot {
    pub status: &'static str,
    pub average_ms: Option<f64>,
    pub high_load: bool,
}

impl LoadState {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            window: Mutex::new(LoadWindow::default()),
            high_load: AtomicBool::new(false),
            window_size: config.window,
            max_wait: config.max_wait(),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        let high_load = self
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(elapsed, self.window_size, self.max_wait);
        let was_high = self.high_load.swap(high_load, Ordering::Relaxed);
        if high_load != was_high {
            info!(high_load, "load state changed");
        }
    }

    pub fn is_high_load(&self) -> bool {
        self.high_load.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> LoadSnapshot {
        let average_ms = self
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .average_ms();
        let high_load = self.is_high_load();
        LoadSnapshot {
            status: if high_load { "busy" } else { "ok" },
            average_ms,
            high_load,
        }
    }
}

/// Polls a server and feeds probe times into a [`LoadState`].
pub struct LoadMonitor {
    state: Arc<LoadState>,
    target: SocketAddr,
    poll_interval: Duration,
    max_wait: Duration,
}

impl LoadMonitor {
    pub fn new(state: Arc<LoadState>, target: SocketAddr, config: &MonitorConfig) -> Self {
        Self {
            state,
            target: probe_address(target),
            poll_interval: config.poll_interval(),
            max_wait: config.max_wait(),
        }
    }

    /// Spawn the polling task on the current tokio runtime.
    pub fn start(self) -> MonitorHandle {
        info!(
            probe = %self.target,
            interval_ms = self.poll_interval.as_millis() as u64,
            "load monitor started"
        );
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.poll_interval).await;
                let elapsed = probe(self.target, self.max_wait).await;
                self.state.record(elapsed);
            }
        });
        MonitorHandle { task }
    }
}

/// Owns the polling task. Dropping it stops the monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
        debug!("load monitor stopped");
    }
}

/// Time one `GET /healthz` round trip, giving up after `max_wait`.
///
/// Always returns the elapsed time, whatever the outcome.
pub async fn probe(target: SocketAddr, max_wait: Duration) -> Duration {
    let started = Instant::now();
    match tokio::time::timeout(max_wait, request_healthz(target)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "load probe failed"),
        Err(_) => warn!(timeout_ms = max_wait.as_millis() as u64, "load probe timed out"),
    }
    started.elapsed()
}

async fn request_healthz(target: SocketAddr) -> std::io::Result<()> {
    let mut stream = TcpStream::connect(target).await?;
    let request = format!("GET /healthz HTTP/1.1\r\nHost: {target}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(())
}

/// A wildcard bind address cannot be connected to; probe loopback instead.
pub fn probe_address(bound: SocketAddr) -> SocketAddr {
    match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), bound.port())
        }
        _ => bound,
    }
}
