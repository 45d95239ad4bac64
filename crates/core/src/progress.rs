//! Progress reporting and cooperative cancellation
//!
//! Long-running operations accept a [`Monitor`], which bundles an optional
//! progress callback and an optional [`CancellationToken`]. Both are
//! optional: `Monitor::none()` turns reporting and cancellation off.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::error::{Error, Result};

/// Named processing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parsing,
    Triangulating,
    Interpolating,
    ValidatingQuality,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parsing => "parsing",
            Stage::Triangulating => "triangulating",
            Stage::Interpolating => "interpolating",
            Stage::ValidatingQuality => "validating_quality",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub stage: Stage,
    /// Completion in percent, 0–100
    pub percent: f64,
    pub message: String,
}

/// Shared flag checked between rows and folds.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress callback type. Must not block.
pub type ProgressFn<'a> = &'a (dyn Fn(Progress) + Sync);

/// Progress sink and cancellation source for one invocation.
#[derive(Clone, Copy, Default)]
pub struct Monitor<'a> {
    progress: Option<ProgressFn<'a>>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> Monitor<'a> {
    /// No reporting, no cancellation
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Emit a report; a no-op without a callback
    pub fn report(&self, stage: Stage, percent: f64, message: impl Into<String>) {
        if let Some(cb) = self.progress {
            cb(Progress {
                stage,
                percent: percent.clamp(0.0, 100.0),
                message: message.into(),
            });
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|t| t.is_cancelled())
    }

    /// `Err(Error::Cancelled)` once the token has been triggered
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Monitor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}
