// src/lib.rs
pub mod capture;
pub mod config;
pub mod detector;
pub mod fisher;
pub mod mouse;
pub mod preprocess;
pub mod preview;
pub mod timer;

pub use capture::{Capture, CaptureError, CaptureRegion, FrameSource};
pub use config::{Args, FisherConfig};
pub use detector::{BiteDetector, Detection, Holdoff};
pub use fisher::{ExitReason, Fisher, RunReport, Shutdown};
pub use mouse::{InputError, InputSink, Mouse, MouseButton};
pub use preview::{DebugView, PreviewHandle, PreviewWindow};
pub use timer::Timers;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
