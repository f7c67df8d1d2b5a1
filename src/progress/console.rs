//! Terminal progress display built on `indicatif`.

use super::{ProgressRenderer, is_per_file_label};
use crate::constants::{NO_PROGRESS_ENV, PROGRESS_RESOLUTION};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Mutex, MutexGuard};

fn is_progress_disabled() -> bool {
    std::env::var(NO_PROGRESS_ENV).is_ok()
}

/// Console renderer with one bar per stage and a single coalesced detail line.
///
/// A stage label ("Downloading update", "Applying patch 12 -> 13") finishes the
/// previous bar and starts a fresh one at zero. Per-file labels ("Extracting …",
/// "Patching …") do not start a stage; they overwrite one detail line under
/// the current bar so hundreds of files do not scroll the terminal.
///
/// All terminal updates happen under one mutex, so events arriving from
/// different threads cannot interleave their cursor movements.
pub struct ConsoleRenderer {
    multi: MultiProgress,
    state: Mutex<ConsoleState>,
}

#[derive(Default)]
struct ConsoleState {
    stage: Option<ProgressBar>,
    stage_label: Option<String>,
    detail: Option<ProgressBar>,
    detail_label: Option<String>,
}

impl ConsoleRenderer {
    /// Renderer drawing to stdout, or hidden when `PATCHLAUNCH_NO_PROGRESS` is set.
    #[must_use]
    pub fn new() -> Self {
        if is_progress_disabled() {
            Self::hidden()
        } else {
            Self::with_draw_target(ProgressDrawTarget::stdout())
        }
    }

    /// Renderer that tracks state without drawing anything.
    #[must_use]
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            state: Mutex::new(ConsoleState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Label of the current stage bar.
    #[must_use]
    pub fn stage_label(&self) -> Option<String> {
        self.lock().stage_label.clone()
    }

    /// Text on the coalesced per-file line.
    #[must_use]
    pub fn detail_label(&self) -> Option<String> {
        self.lock().detail_label.clone()
    }

    /// Position of the current stage bar, in `0..=1000`.
    #[must_use]
    pub fn position(&self) -> Option<u64> {
        self.lock().stage.as_ref().map(ProgressBar::position)
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressRenderer for ConsoleRenderer {
    fn label(&self, label: &str) {
        let mut state = self.lock();

        if is_per_file_label(label) {
            let detail = match state.detail.take() {
                Some(bar) => bar,
                None => self.multi.add(ProgressBar::new_spinner().with_style(detail_style())),
            };
            detail.set_message(label.to_string());
            state.detail = Some(detail);
            state.detail_label = Some(label.to_string());
            return;
        }

        if let Some(detail) = state.detail.take() {
            detail.finish_and_clear();
        }
        state.detail_label = None;
        if let Some(stage) = state.stage.take() {
            stage.finish();
        }

        let bar = self.multi.add(ProgressBar::new(PROGRESS_RESOLUTION).with_style(stage_style()));
        bar.set_prefix(label.to_string());
        bar.set_position(0);
        state.stage = Some(bar);
        state.stage_label = Some(label.to_string());
    }

    fn progress(&self, fraction: f32) {
        let state = self.lock();
        if let Some(stage) = &state.stage {
            stage.set_position((f64::from(fraction) * PROGRESS_RESOLUTION as f64).round() as u64);
        }
    }

    fn finish(&self) {
        let mut state = self.lock();
        if let Some(detail) = state.detail.take() {
            detail.finish_and_clear();
        }
        if let Some(stage) = state.stage.take() {
            stage.finish();
        }
    }
}

fn stage_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {percent:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

fn detail_style() -> ProgressStyle {
    ProgressStyle::with_template("  {msg:.dim}").unwrap_or_else(|_| ProgressStyle::default_spinner())
}
