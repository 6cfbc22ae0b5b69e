use clap::Parser;
use std::time::Duration;

use crate::capture::CaptureRegion;

/// Command-line flags.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "autofisher",
    version,
    about = "Automatically reels in and re-casts a fishing rod in Minecraft based on screen capture.",
    long_about = r#"
Automatically reels in and re-casts a fishing rod in Minecraft based on screen capture.

Before starting:
    - turn off your HUD with F1
    - cast your fishing rod so the bobber sits inside the capture region
    - press Ctrl+C to stop"#
)]
pub struct Args {
    /// Show the captured region of the screen after the RGB->BW color cut and
    /// thresholding. Useful for debugging undesired casts. Press Q in the
    /// window to quit.
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Cutoff at or below which a captured pixel is set to 0. Will likely
    /// need adjusting for the background of the scene.
    #[arg(short = 't', long, default_value_t = 150, value_name = "0-255")]
    pub threshold: u8,

    /// Holdoff in seconds between detecting a bite and looking again.
    #[arg(short = 'd', long, default_value = "3.0", value_parser = parse_seconds, value_name = "SECONDS")]
    pub delay: Duration,

    /// Monitor the game is running on. 0 is the whole desktop, 1.. are
    /// individual displays.
    #[arg(short = 'm', long, default_value_t = 2)]
    pub monitor: usize,

    /// Pixels down from the top of the monitor to start capturing from.
    #[arg(short = 'y', long, default_value_t = 500)]
    pub top: u32,

    /// Pixels right from the left of the monitor to start capturing from.
    #[arg(short = 'x', long, default_value_t = 900)]
    pub left: u32,

    /// Height of the capture region. Enough to track the bobber even if it
    /// touches a fish on re-cast.
    #[arg(short = 'l', long, default_value_t = 500, value_parser = clap::value_parser!(u32).range(1..))]
    pub length: u32,

    /// Width of the capture region. Enough to follow the bobber side to side
    /// while cutting down on noise.
    #[arg(short = 'w', long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Delay in seconds between reeling the rod in and casting it again.
    #[arg(short = 'r', long, default_value = "1.0", value_parser = parse_seconds, value_name = "SECONDS")]
    pub recast: Duration,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a number of seconds"))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("`{s}` must be a non-negative number of seconds"));
    }

    Ok(Duration::from_secs_f64(secs))
}

/// Effective settings for a fishing run.
#[derive(Debug, Clone, PartialEq)]
pub struct FisherConfig {
    pub threshold: u8,
    pub delay: Duration,
    pub recast: Duration,
    pub region: CaptureRegion,
    pub debug: bool,
}

impl Default for FisherConfig {
    fn default() -> Self {
        Self {
            threshold: 150,
            delay: Duration::from_secs(3),
            recast: Duration::from_secs(1),
            region: CaptureRegion::default(),
            debug: false,
        }
    }
}

impl From<Args> for FisherConfig {
    fn from(args: Args) -> Self {
        Self {
            threshold: args.threshold,
            delay: args.delay,
            recast: args.recast,
            region: CaptureRegion {
                monitor: args.monitor,
                top: args.top,
                left: args.left,
                width: args.width,
                height: args.length,
            },
            debug: args.debug,
        }
    }
}
