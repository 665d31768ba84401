//! The environment the client runs in: navigation, user notifications and
//! file downloads.
//!
//! # Design
//! Side effects that a browser page would perform on its DOM (redirects,
//! alert boxes, triggering a download) go through the `Host` trait, which is
//! injected into `HttpClient`. Request logic can then be exercised without a
//! browser. `HeadlessHost` is the implementation for programs that have no
//! page at all; it records what happened and logs it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::ApiError;

/// How prominent an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effects the client asks its environment to perform.
pub trait Host: Send + Sync {
    /// Path of the page currently shown.
    fn current_path(&self) -> String;

    fn navigate(&self, path: &str);

    /// Navigate once `delay` has elapsed.
    fn navigate_after(&self, path: &str, delay: Duration);

    fn alert(&self, message: &str, severity: Severity);

    /// Offer `contents` to the user as a file named `filename`.
    fn save_file(&self, filename: &str, contents: &[u8]) -> Result<(), ApiError>;
}

/// A side effect recorded by `HeadlessHost`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Navigate { path: String, delay: Option<Duration> },
    Alert { message: String, severity: Severity },
    SaveFile { filename: String, size: usize },
}

/// Host for programs without a page.
///
/// Navigation only updates the in-memory location; delayed navigation takes
/// effect immediately since there is nothing to render in between. Downloads
/// are written into `download_dir`.
#[derive(Debug)]
pub struct HeadlessHost {
    location: Mutex<String>,
    download_dir: PathBuf,
    events: Mutex<Vec<HostEvent>>,
}

impl HeadlessHost {
    pub fn new(current_path: &str, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            location: Mutex::new(current_path.to_string()),
            download_dir: download_dir.into(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Everything recorded so far, oldest first.
    pub fn events(&self) -> Vec<HostEvent> {
        lock(&self.events).clone()
    }

    /// Paths navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                HostEvent::Navigate { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: HostEvent) {
        lock(&self.events).push(event);
    }

    fn set_location(&self, path: &str) {
        *lock(&self.location) = path.to_string();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Host for HeadlessHost {
    fn current_path(&self) -> String {
        lock(&self.location).clone()
    }

    fn navigate(&self, path: &str) {
        tracing::info!(path, "navigating");
        self.set_location(path);
        self.record(HostEvent::Navigate {
            path: path.to_string(),
            delay: None,
        });
    }

    fn navigate_after(&self, path: &str, delay: Duration) {
        tracing::info!(path, delay_ms = delay.as_millis() as u64, "navigating after delay");
        self.set_location(path);
        self.record(HostEvent::Navigate {
            path: path.to_string(),
            delay: Some(delay),
        });
    }

    fn alert(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => tracing::error!(%severity, "{message}"),
            Severity::Warning => tracing::warn!(%severity, "{message}"),
            Severity::Info | Severity::Success => tracing::info!(%severity, "{message}"),
        }
        self.record(HostEvent::Alert {
            message: message.to_string(),
            severity,
        });
    }

    fn save_file(&self, filename: &str, contents: &[u8]) -> Result<(), ApiError> {
        // Server-supplied names must not escape the download directory.
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "download".into());
        fs::create_dir_all(&self.download_dir)?;
        let target = self.download_dir.join(name);
        fs::write(&target, contents)?;
        tracing::info!(path = %target.display(), size = contents.len(), "saved download");
        self.record(HostEvent::SaveFile {
            filename: filename.to_string(),
            size: contents.len(),
        });
        Ok(())
    }
}
