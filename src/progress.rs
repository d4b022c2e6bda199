//! Extraction progress.
//!
//! Engines are constructed with a [`ProgressReporter`], and call
//! [`ProgressReporter::report`] with a fraction that is local to whatever
//! step they're running. The session tells the reporter which slice of the
//! overall run each step occupies, so what comes out of the channel is a
//! single fraction for the whole run that never goes backwards.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::prelude::*;

/// Label shown before any extraction has started.
pub const IDLE_LABEL: &str = "idle";

/// Label shown at the start of every extraction.
pub const STARTING_LABEL: &str = "starting";

/// Label shown once the overall fraction reaches 1.0, whatever the engine
/// says.
pub const DONE_LABEL: &str = "done";

/// How far along the current extraction is.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressState {
    /// Overall completion, from 0.0 to 1.0.
    pub fraction: f32,

    /// Coarse description of the current phase.
    pub label: String,
}

impl ProgressState {
    /// Nothing has happened yet.
    pub fn idle() -> Self {
        Self {
            fraction: 0.0,
            label: IDLE_LABEL.to_owned(),
        }
    }

    /// An extraction has just begun.
    pub fn starting() -> Self {
        Self {
            fraction: 0.0,
            label: STARTING_LABEL.to_owned(),
        }
    }

    /// Build a state, normalizing the label once we're complete.
    pub fn new(fraction: f32, label: &str) -> Self {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let label = if fraction >= 1.0 { DONE_LABEL } else { label };
        Self {
            fraction,
            label: label.to_owned(),
        }
    }

    /// The fraction scaled to 0-100.
    pub fn percent(&self) -> u64 {
        (self.fraction * 100.0).round() as u64
    }

    /// The label, formatted for display.
    pub fn display_label(&self) -> String {
        self.label.to_uppercase()
    }

    /// Have we finished?
    pub fn is_done(&self) -> bool {
        self.fraction >= 1.0
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Shared state behind a [`ProgressReporter`].
struct ReporterState {
    /// Where events go. `None` once the reporter has been closed.
    sink: Option<mpsc::UnboundedSender<ProgressState>>,

    /// The slice of the overall run covered by the current step.
    step_start: f32,
    step_end: f32,

    /// The last overall fraction we sent.
    last: f32,
}

impl ReporterState {
    fn send(&mut self, state: ProgressState) {
        self.last = state.fraction;
        if let Some(sink) = &self.sink {
            if sink.send(state).is_err() {
                trace!("Progress receiver has gone away");
                self.sink = None;
            }
        }
    }
}

/// Progress callback handed to a recognition engine.
#[derive(Clone)]
pub struct ProgressReporter {
    state: Arc<Mutex<ReporterState>>,
}

impl ProgressReporter {
    /// Create a reporter and the receiving end of its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Self {
            state: Arc::new(Mutex::new(ReporterState {
                sink: Some(tx),
                step_start: 0.0,
                step_end: 1.0,
                last: 0.0,
            })),
        };
        (reporter, rx)
    }

    /// Report progress within the current step. `fraction` runs from 0.0 to
    /// 1.0 within that step.
    pub fn report(&self, label: &str, fraction: f32) {
        let mut state = self.state.lock().expect("lock poisoned");
        let local = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let overall = state.step_start + (state.step_end - state.step_start) * local;
        // Engines may restart their own counters. We never go backwards.
        let overall = overall.max(state.last);
        trace!(label, local, overall, "Progress");
        state.send(ProgressState::new(overall, label));
    }

    /// Start a new run from zero.
    pub(crate) fn begin_run(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.step_start = 0.0;
        state.step_end = 1.0;
        state.last = 0.0;
        state.send(ProgressState::starting());
    }

    /// Map subsequent reports onto `start..end` of the overall run.
    pub(crate) fn enter_step(&self, start: f32, end: f32) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.step_start = start;
        state.step_end = end;
    }

    /// Mark the run as finished.
    pub(crate) fn complete(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.last < 1.0 {
            state.send(ProgressState::new(1.0, DONE_LABEL));
        }
    }

    /// Stop delivering events. Used during teardown.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.sink = None;
    }
}
