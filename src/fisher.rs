use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::capture::FrameSource;
use crate::config::FisherConfig;
use crate::detector::{BiteDetector, Detection, Holdoff};
use crate::mouse::InputSink;
use crate::preprocess;
use crate::preview::DebugView;
use crate::timer::Timers;

/// Cancellation token for the fishing loop, checked once per frame.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    triggered: Arc<Mutex<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        *self.triggered.lock() = true;
    }

    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Shutdown was triggered (Ctrl+C or the preview window went away).
    Interrupted,
    /// Quit key pressed in the preview window.
    QuitKey,
    /// The frame source ran dry.
    CaptureFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub frames: u64,
    pub bites: u64,
    /// Timers still pending at shutdown, cancelled without firing.
    pub cancelled_timers: usize,
    pub exit: ExitReason,
}

/// The polling loop: grab, binarize, detect, react.
pub struct Fisher {
    config: FisherConfig,
    source: Box<dyn FrameSource>,
    sink: Arc<dyn InputSink>,
    view: Option<Box<dyn DebugView>>,
    detector: BiteDetector,
    timers: Timers,
    shutdown: Shutdown,
}

impl Fisher {
    pub fn new(
        config: FisherConfig,
        source: Box<dyn FrameSource>,
        sink: Arc<dyn InputSink>,
        timers: Timers,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            view: None,
            detector: BiteDetector::new(Holdoff::new()),
            timers,
            shutdown,
        }
    }

    pub fn with_view(mut self, view: Box<dyn DebugView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn holdoff(&self) -> Holdoff {
        self.detector.holdoff().clone()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run until interrupted, the quit key is pressed or capture fails.
    /// Pending timers are cancelled, the view closed and the source stopped
    /// on every exit path.
    pub fn run(&mut self) -> RunReport {
        let mut frames = 0u64;
        let mut bites = 0u64;

        let exit = loop {
            if self.shutdown.is_triggered() {
                info!("Shutdown requested, stopping");
                break ExitReason::Interrupted;
            }

            let Some(frame) = self.source.read() else {
                error!("Error grabbing frame data! Exiting.");
                break ExitReason::CaptureFailed;
            };

            let frame = preprocess::binarize(&frame, self.config.threshold);
            frames += 1;

            match self.detector.observe(&frame) {
                Detection::Bite => {
                    bites += 1;
                    self.on_bite(bites);
                }
                Detection::Clear(sum) => trace!("Frame {} sum {}", frames, sum),
                Detection::Suppressed => {}
            }

            if let Some(view) = self.view.as_mut() {
                if view.show(&frame) {
                    info!("Quit key pressed, stopping");
                    break ExitReason::QuitKey;
                }
            }
        };

        let cancelled_timers = self.teardown();

        RunReport {
            frames,
            bites,
            cancelled_timers,
            exit,
        }
    }

    fn on_bite(&mut self, bite: u64) {
        info!("🎣 Bite #{} - reeling in", bite);

        if let Err(e) = self.sink.click() {
            warn!("Reel-in click failed: {}", e);
        }

        let holdoff = self.detector.holdoff().clone();
        self.timers.schedule("re-arm", self.config.delay, move || {
            if holdoff.arm() {
                debug!("Holdoff over, watching for bites again");
            }
        });

        let sink = Arc::clone(&self.sink);
        self.timers.schedule("recast", self.config.recast, move || match sink.click() {
            Ok(()) => info!("Recast"),
            Err(e) => warn!("Recast click failed: {}", e),
        });
    }

    fn teardown(&mut self) -> usize {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            debug!("Cancelled {} pending timer(s)", cancelled);
        }

        if let Some(view) = self.view.as_mut() {
            view.close();
        }
        self.source.stop();

        info!("Fishing loop stopped");
        cancelled
    }
}
