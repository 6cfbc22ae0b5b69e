//! Live preview of the thresholded capture region for debugging
use eframe::egui;
use image::GrayImage;
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where the fishing loop shows its processed frames.
pub trait DebugView: Send {
    /// Publish a frame. Returns `true` once the user asked to quit.
    fn show(&mut self, frame: &GrayImage) -> bool;

    fn close(&mut self);
}

/// Loop-side handle to a [`PreviewWindow`].
#[derive(Clone, Default)]
pub struct PreviewHandle {
    latest_frame: Arc<Mutex<Option<GrayImage>>>,
    quit: Arc<Mutex<bool>>,
    closed: Arc<Mutex<bool>>,
}

impl PreviewHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_quit(&self) {
        *self.quit.lock() = true;
    }

    pub fn quit_requested(&self) -> bool {
        *self.quit.lock()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    fn take_frame(&self) -> Option<GrayImage> {
        self.latest_frame.lock().take()
    }
}

impl DebugView for PreviewHandle {
    fn show(&mut self, frame: &GrayImage) -> bool {
        *self.latest_frame.lock() = Some(frame.clone());
        self.quit_requested()
    }

    fn close(&mut self) {
        *self.closed.lock() = true;
    }
}

/// Preview window. Must run on the main thread.
pub struct PreviewWindow {
    handle: PreviewHandle,
    texture: Option<egui::TextureHandle>,
    resolution: [usize; 2],
    frames_shown: u64,
    fps_counter: f32,
    frame_count: u32,
    last_update: Instant,
}

impl PreviewWindow {
    pub fn new(handle: PreviewHandle) -> Self {
        Self {
            handle,
            texture: None,
            resolution: [0, 0],
            frames_shown: 0,
            fps_counter: 0.0,
            frame_count: 0,
            last_update: Instant::now(),
        }
    }

    /// Blocks until the window is closed.
    pub fn run(self) -> Result<(), eframe::Error> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([320.0, 640.0])
                .with_min_inner_size([100.0, 100.0])
                .with_title("Output Frame")
                .with_resizable(true),
            ..Default::default()
        };

        eframe::run_native("Output Frame", options, Box::new(|_cc| Ok(Box::new(self))))
    }

    fn pull_frame(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.handle.take_frame() else {
            return;
        };

        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_gray(size, frame.as_raw());

        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
            None => {
                self.texture =
                    Some(ctx.load_texture("output_frame", image, egui::TextureOptions::NEAREST))
            }
        }

        self.resolution = size;
        self.frames_shown += 1;
        self.frame_count += 1;

        let elapsed = self.last_update.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            self.fps_counter = self.frame_count as f32 / elapsed;
            self.frame_count = 0;
            self.last_update = Instant::now();
        }
    }
}

impl eframe::App for PreviewWindow {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.handle.is_closed() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Q)) {
            info!("[PREVIEW] Q pressed, stopping");
            self.handle.request_quit();
        }

        self.pull_frame(ctx);
        ctx.request_repaint_after(Duration::from_millis(16));

        egui::TopBottomPanel::bottom("stats").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.monospace(format!("{}x{}", self.resolution[0], self.resolution[1]));
                ui.label(format!("| frames: {}", self.frames_shown));
                ui.label(format!("| {:.1} FPS", self.fps_counter));
                ui.label("| Q to quit");
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match &self.texture {
            Some(texture) => {
                let [width, height] = self.resolution;
                let available = ui.available_size();
                let aspect = width as f32 / height.max(1) as f32;

                let size = if available.x / available.y > aspect {
                    egui::vec2(available.y * aspect, available.y)
                } else {
                    egui::vec2(available.x, available.x / aspect)
                };

                ui.centered_and_justified(|ui| {
                    ui.add(egui::Image::new(texture).fit_to_exact_size(size));
                });
            }
            None => {
                ui.centered_and_justified(|ui| {
                    ui.spinner();
                });
            }
        });
    }
}
