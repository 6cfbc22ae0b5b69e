use anyhow::{anyhow, bail, Context, Result};
use autofisher::*;
use clap::Parser;
use log::{info, warn, LevelFilter};
use std::sync::Arc;
use std::time::Duration;

fn setup_logging(debug: bool) {
    env_logger::Builder::new()
        .filter_level(if debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn print_banner(config: &FisherConfig) {
    let region = &config.region;

    println!("==========================================");
    println!("🎣 AutoFisher v{}", VERSION);
    println!("==========================================");
    println!("📋 Configuration:");
    println!("   Monitor: {}", region.monitor);
    println!(
        "   Region: {}x{} at x:{}, y:{}",
        region.width, region.height, region.left, region.top
    );
    println!("   Threshold: {}", config.threshold);
    println!("   Holdoff: {:.2}s", config.delay.as_secs_f64());
    println!("   Recast: {:.2}s", config.recast.as_secs_f64());
    println!(
        "   Debug window: {}",
        if config.debug { "ON" } else { "OFF" }
    );
    println!("\n🎮 Turn off the HUD (F1) and cast your rod");
    println!("🎮 Press Ctrl+C to exit");
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug);

    let config = FisherConfig::from(args);
    print_banner(&config);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start timer runtime")?;
    let shutdown = Shutdown::new();

    {
        let shutdown = shutdown.clone();
        runtime.spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl+C received");
                    shutdown.trigger();
                }
                Err(e) => warn!("Unable to listen for Ctrl+C: {}", e),
            }
        });
    }

    let capture = Capture::new(config.region).context("Failed to initialize screen capture")?;
    let mouse = Mouse::new(MouseButton::Right).context("Failed to initialize mouse input")?;

    let mut fisher = Fisher::new(
        config.clone(),
        Box::new(capture),
        Arc::new(mouse),
        Timers::new(runtime.handle().clone()),
        shutdown,
    );

    let report = if config.debug {
        // The window owns the main thread, the loop gets its own
        let preview = PreviewHandle::new();
        let mut fisher = fisher.with_view(Box::new(preview.clone()));
        let worker = std::thread::spawn(move || fisher.run());

        if let Err(e) = PreviewWindow::new(preview.clone()).run() {
            warn!("Preview window failed: {}", e);
        }
        preview.request_quit();

        worker
            .join()
            .map_err(|_| anyhow!("Fishing loop panicked"))?
    } else {
        fisher.run()
    };

    println!(
        "\n[SYSTEM] {} frames, {} bites, stopped: {:?}",
        report.frames, report.bites, report.exit
    );
    runtime.shutdown_timeout(Duration::from_millis(100));

    if report.exit == ExitReason::CaptureFailed {
        bail!("Screen capture stopped delivering frames");
    }

    Ok(())
}
