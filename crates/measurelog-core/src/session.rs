//! Capture session: the per-frame render loop and its single shutdown path.
//!
//! A session renders one frame per incoming sample through a [`LoggedOverlay`],
//! checks a [`ShutdownSignal`] before every frame, and persists the log exactly
//! once in [`MeasurementSession::finish`], whether the loop ran out of samples
//! or was interrupted.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::canvas::{Frame, Point};
use crate::error::Result;
use crate::logger::{LoggedOverlay, MeasurementLog};
use crate::models::{Labels, MeasureConfig, Sample2D};
use crate::overlay::{ErrorBoxRenderer, ErrorOverlay};

/// Cooperative cancellation flag shared between a signal handler and the loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Frame geometry and overlay placement for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub anchor: Point,
    pub labels: Labels,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::from(&MeasureConfig::default())
    }
}

impl From<&MeasureConfig> for FrameLayout {
    fn from(config: &MeasureConfig) -> Self {
        Self {
            width: config.frame_width,
            height: config.frame_height,
            anchor: Point::new(config.anchor_x, config.anchor_y),
            labels: config.labels(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOutcome {
    /// Frames rendered
    pub frames: usize,
    /// Records appended to the log during this run
    pub logged: usize,
    pub interrupted: bool,
}

pub struct MeasurementSession<R = ErrorBoxRenderer> {
    overlay: R,
    log: MeasurementLog,
    shutdown: ShutdownSignal,
    layout: FrameLayout,
}

impl MeasurementSession<ErrorBoxRenderer> {
    pub fn new(config: &MeasureConfig, shutdown: ShutdownSignal) -> Self {
        Self::with_overlay(
            ErrorBoxRenderer::new(),
            MeasurementLog::open(config),
            shutdown,
            FrameLayout::from(config),
        )
    }
}

impl<R: ErrorOverlay> MeasurementSession<R> {
    pub fn with_overlay(
        overlay: R,
        log: MeasurementLog,
        shutdown: ShutdownSignal,
        layout: FrameLayout,
    ) -> Self {
        Self {
            overlay,
            log,
            shutdown,
            layout,
        }
    }

    pub fn log(&self) -> &MeasurementLog {
        &self.log
    }

    /// Render every sample until the samples run out or shutdown is signalled.
    ///
    /// `on_frame` sees each finished frame (display, encoding, ...).
    pub fn run<I, F>(&mut self, samples: I, mut on_frame: F) -> SessionOutcome
    where
        I: IntoIterator<Item = Sample2D>,
        F: FnMut(&Frame),
    {
        let before = self.log.len();
        let mut outcome = SessionOutcome::default();
        let mut overlay = LoggedOverlay::new(&mut self.overlay, &mut self.log);

        for sample in samples {
            if self.shutdown.is_triggered() {
                outcome.interrupted = true;
                break;
            }
            let mut frame = Frame::new(self.layout.width, self.layout.height);
            overlay.draw_2d_error_box(&mut frame, self.layout.anchor, &sample, &self.layout.labels);
            on_frame(&frame);
            outcome.frames += 1;
        }
        // Interrupt may also arrive after the last sample was taken.
        outcome.interrupted |= self.shutdown.is_triggered();

        outcome.logged = self.log.len() - before;
        info!(
            frames = outcome.frames,
            logged = outcome.logged,
            interrupted = outcome.interrupted,
            "Measurement session ended"
        );
        outcome
    }

    /// The single final flush; the written log file, if any.
    pub fn finish(self) -> Option<PathBuf> {
        let mut log = self.log;
        log.persist()
    }
}

/// Parse JSON-lines samples, one object per line; blank lines are skipped.
pub fn read_samples<R: BufRead>(reader: R) -> impl Iterator<Item = Result<Sample2D>> {
    reader.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(serde_json::from_str(&line).map_err(Into::into)),
        Err(e) => Some(Err(e.into())),
    })
}

/// [`read_samples`], reporting and dropping lines that fail to parse.
pub fn read_samples_lossy<R: BufRead>(reader: R) -> impl Iterator<Item = Sample2D> {
    read_samples(reader).enumerate().filter_map(|(i, sample)| match sample {
        Ok(sample) => Some(sample),
        Err(e) => {
            warn!(sample = i + 1, "Skipping unreadable sample: {}", e);
            None
        }
    })
}
