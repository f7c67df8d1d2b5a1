//! Progress reporting from the update worker to the presentation layer.
//!
//! The update session runs on its own worker task and never touches terminal
//! state directly. Instead every stage receives a [`ProgressSink`] and posts
//! `(label, fraction)` events into a channel. The presentation loop owns the
//! [`ProgressReceiver`] and forwards each event to a [`ProgressRenderer`].
//!
//! ```text
//! worker task                         presentation task
//! ───────────                         ─────────────────
//! sink.label("Applying patch 12 → 13")
//! sink.progress(0.25)   ──channel──▶  receiver.run(&renderer)
//! drop(sink)                            └─ returns once every sink is dropped
//! ```
//!
//! Label and fraction are independent: an event may carry either or both.
//!
//! # Lifecycle
//!
//! [`ProgressSink::channel`] is called when a session starts. The sink is
//! cloned into each stage (including blocking archive work on other threads);
//! when the session ends and the last clone is dropped, the receiver's loop
//! ends and the renderer is finished.
//!
//! # Examples
//!
//! ```rust,no_run
//! use patchlaunch::progress::{LogRenderer, ProgressSink};
//!
//! # async fn example() {
//! let (sink, receiver) = ProgressSink::channel();
//! let presenter = tokio::spawn(async move { receiver.run(&LogRenderer).await });
//!
//! sink.label("Downloading update");
//! sink.progress(0.5);
//! drop(sink);
//!
//! presenter.await.unwrap();
//! # }
//! ```

mod console;

pub use console::ConsoleRenderer;

use tokio::sync::mpsc;
use tracing::{debug, info};

/// One progress update posted by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// New label, if the label changed.
    pub label: Option<String>,
    /// New completion fraction in `0.0..=1.0`, if known.
    pub fraction: Option<f32>,
}

/// Thread-safe handle for posting progress from the update worker.
///
/// Cloning is cheap; all clones feed the same receiver. Posting never blocks
/// and never fails: if the presentation side has gone away the event is
/// dropped.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSink {
    /// Create a connected sink/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, ProgressReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
            },
            ProgressReceiver {
                rx,
            },
        )
    }

    /// A sink whose events go nowhere, for dry runs.
    #[must_use]
    pub fn disconnected() -> Self {
        let (sink, receiver) = Self::channel();
        drop(receiver);
        sink
    }

    /// Post a label and/or completion fraction.
    ///
    /// Fractions are clamped into `0.0..=1.0`; NaN is dropped.
    pub fn report(&self, label: Option<String>, fraction: Option<f32>) {
        let fraction = fraction.filter(|f| !f.is_nan()).map(|f| f.clamp(0.0, 1.0));
        if label.is_none() && fraction.is_none() {
            return;
        }
        // Receiver gone means nobody is rendering; the update carries on.
        let _ = self.tx.send(ProgressEvent {
            label,
            fraction,
        });
    }

    /// Post a new label.
    pub fn label(&self, label: impl Into<String>) {
        self.report(Some(label.into()), None);
    }

    /// Post a completion fraction.
    pub fn progress(&self, fraction: f32) {
        self.report(None, Some(fraction));
    }

    /// Post `done / total`, treating an empty total as complete.
    pub fn ratio(&self, done: u64, total: u64) {
        let fraction = if total == 0 { 1.0 } else { done as f32 / total as f32 };
        self.progress(fraction);
    }
}

/// Presentation-side end of the progress channel.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Receive the next event, or `None` once every sink has been dropped.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Forward events to `renderer` until every sink is dropped, then finish it.
    pub async fn run(mut self, renderer: &dyn ProgressRenderer) {
        while let Some(event) = self.rx.recv().await {
            renderer.render(&event);
        }
        renderer.finish();
    }
}

/// Something that can display progress events.
///
/// Implementations must tolerate being called from any thread.
pub trait ProgressRenderer: Send + Sync {
    /// Show a new label.
    fn label(&self, label: &str);

    /// Show a completion fraction for the current label.
    fn progress(&self, fraction: f32);

    /// Tear down any live display.
    fn finish(&self) {}

    /// Dispatch one event to [`label`](Self::label) and [`progress`](Self::progress).
    fn render(&self, event: &ProgressEvent) {
        if let Some(label) = &event.label {
            self.label(label);
        }
        if let Some(fraction) = event.fraction {
            self.progress(fraction);
        }
    }
}

/// Labels naming a single file inside a larger stage.
///
/// The console renderer overwrites one line with these instead of starting a
/// new stage for each.
#[must_use]
pub fn is_per_file_label(label: &str) -> bool {
    label.starts_with("Extracting ") || label.starts_with("Patching ")
}

/// Renderer that writes labels to the log instead of drawing bars.
///
/// Used with `--no-progress` and when stdout is not interactive.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRenderer;

impl ProgressRenderer for LogRenderer {
    fn label(&self, label: &str) {
        if is_per_file_label(label) {
            debug!("{label}");
        } else {
            info!("{label}");
        }
    }

    fn progress(&self, _fraction: f32) {}
}
