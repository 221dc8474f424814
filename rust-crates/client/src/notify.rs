//! Alerts and confirmations surfaced to the player.

use std::{
    fmt,
    future::Future,
};
use tracing::{
    error,
    info,
    warn,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}")
    }
}

pub trait Notifier: Send + Sync {
    fn alert(&self, severity: Severity, message: &str);

    /// Resolves to `true` once the player accepts.
    fn confirm(&self, title: &str, message: &str) -> impl Future<Output = bool> + Send;
}

/// Headless notifier: alerts become log lines, confirmations get a fixed
/// answer.
#[derive(Clone, Copy, Debug)]
pub struct LogNotifier {
    auto_confirm: bool,
}

impl LogNotifier {
    pub fn new(auto_confirm: bool) -> Self {
        Self { auto_confirm }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Notifier for LogNotifier {
    fn alert(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!(target: "notify", "{message}"),
            Severity::Warning => warn!(target: "notify", "{message}"),
            Severity::Error => error!(target: "notify", "{message}"),
        }
    }

    async fn confirm(&self, title: &str, message: &str) -> bool {
        info!(
            target: "notify",
            answer = self.auto_confirm,
            "{title}: {message}"
        );
        self.auto_confirm
    }
}
