use image::RgbImage;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How long `read` waits for the grab thread before giving up.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(1);

const GRAB_INTERVAL: Duration = Duration::from_millis(10);
const GRAB_RETRY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screen capture is not supported on this platform")]
    Unsupported,
    #[error("monitor {index} does not exist ({available} monitors, 0 = whole desktop)")]
    NoSuchMonitor { index: usize, available: usize },
    #[error("capture region must be at least 1x1 pixels")]
    EmptyRegion,
    #[error("region {width}x{height} at ({left}, {top}) does not fit monitor {monitor} ({monitor_width}x{monitor_height})")]
    OutOfBounds {
        monitor: usize,
        top: u32,
        left: u32,
        width: u32,
        height: u32,
        monitor_width: u32,
        monitor_height: u32,
    },
    #[error("GDI call {call} failed: {detail}")]
    Gdi { call: &'static str, detail: String },
}

/// Something that produces frames for the fishing loop.
pub trait FrameSource: Send {
    /// Next frame, or `None` when no data can be had.
    fn read(&mut self) -> Option<RgbImage>;

    fn stop(&mut self);
}

/// Rectangle in absolute desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            x: left,
            y: top,
            width: right.saturating_sub(left).max(0) as u32,
            height: bottom.saturating_sub(top).max(0) as u32,
        }
    }
}

/// The part of a monitor to watch, offsets relative to that monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub monitor: usize,
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureRegion {
    fn default() -> Self {
        Self {
            monitor: 2,
            top: 500,
            left: 900,
            width: 100,
            height: 500,
        }
    }
}

impl CaptureRegion {
    /// Map the region onto the desktop. `monitors[0]` is the whole virtual
    /// desktop, the rest are individual displays in enumeration order.
    pub fn resolve(&self, monitors: &[ScreenRect]) -> Result<ScreenRect, CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::EmptyRegion);
        }

        let screen = monitors
            .get(self.monitor)
            .ok_or(CaptureError::NoSuchMonitor {
                index: self.monitor,
                available: monitors.len().saturating_sub(1),
            })?;

        let fits_x = self.left as u64 + self.width as u64 <= screen.width as u64;
        let fits_y = self.top as u64 + self.height as u64 <= screen.height as u64;
        if !fits_x || !fits_y {
            return Err(CaptureError::OutOfBounds {
                monitor: self.monitor,
                top: self.top,
                left: self.left,
                width: self.width,
                height: self.height,
                monitor_width: screen.width,
                monitor_height: screen.height,
            });
        }

        Ok(ScreenRect {
            x: screen.x + self.left as i32,
            y: screen.y + self.top as i32,
            width: self.width,
            height: self.height,
        })
    }
}

/// Background screen grabber for a fixed desktop rectangle.
pub struct Capture {
    rect: ScreenRect,
    latest_frame: Arc<Mutex<Option<RgbImage>>>,
    running: Arc<Mutex<bool>>,
    worker: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl Capture {
    pub fn new(region: CaptureRegion) -> Result<Self, CaptureError> {
        let monitors = platform::monitors()?;
        for (index, screen) in monitors.iter().enumerate() {
            debug!("[CAPTURE] Monitor {}: {:?}", index, screen);
        }

        let rect = region.resolve(&monitors)?;
        info!(
            "[CAPTURE] Watching monitor {} at x:{}, y:{}, {}x{}",
            region.monitor, rect.x, rect.y, rect.width, rect.height
        );

        let mut capture = Self {
            rect,
            latest_frame: Arc::new(Mutex::new(None)),
            running: Arc::new(Mutex::new(true)),
            worker: None,
            timeout: FRAME_TIMEOUT,
        };

        capture.start_capture_thread();

        Ok(capture)
    }

    pub fn rect(&self) -> ScreenRect {
        self.rect
    }

    fn start_capture_thread(&mut self) {
        let frame_clone = Arc::clone(&self.latest_frame);
        let running_clone = Arc::clone(&self.running);
        let rect = self.rect;

        self.worker = Some(std::thread::spawn(move || {
            while *running_clone.lock() {
                match platform::grab(rect) {
                    Ok(image) => {
                        *frame_clone.lock() = Some(image);
                        std::thread::sleep(GRAB_INTERVAL);
                    }
                    Err(CaptureError::Unsupported) => {
                        error!("[CAPTURE] Grabbing is unsupported here, stopping");
                        *running_clone.lock() = false;
                    }
                    Err(e) => {
                        warn!("[CAPTURE] {}", e);
                        std::thread::sleep(GRAB_RETRY);
                    }
                }
            }
            debug!("[CAPTURE] Grab thread exited");
        }));
    }

    fn is_running(&self) -> bool {
        *self.running.lock()
    }
}

impl FrameSource for Capture {
    fn read(&mut self) -> Option<RgbImage> {
        let start = Instant::now();

        while start.elapsed() < self.timeout {
            if let Some(frame) = self.latest_frame.lock().take() {
                return Some(frame);
            }
            if !self.is_running() {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        None
    }

    fn stop(&mut self) {
        *self.running.lock() = false;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("[CAPTURE] Grab thread panicked");
            }
        }
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Turn a top-down, DWORD-aligned 24-bit BGR DIB into an RGB image.
#[cfg_attr(not(windows), allow(dead_code))]
fn bgr_rows_to_rgb(buffer: &[u8], width: u32, height: u32) -> Option<RgbImage> {
    let row_bytes = width as usize * 3;
    let stride = (row_bytes + 3) & !3;
    if buffer.len() < stride * height as usize {
        return None;
    }

    let mut rgb = Vec::with_capacity(row_bytes * height as usize);
    for row in buffer.chunks_exact(stride).take(height as usize) {
        for bgr in row[..row_bytes].chunks_exact(3) {
            rgb.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
        }
    }

    RgbImage::from_raw(width, height, rgb)
}

#[cfg(windows)]
mod platform {
    use super::{bgr_rows_to_rgb, CaptureError, ScreenRect};
    use image::RgbImage;
    use windows::Win32::Foundation::{GetLastError, BOOL, HWND, LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject,
        EnumDisplayMonitors, GetDC, GetDIBits, ReleaseDC, SelectObject, BITMAPINFO,
        BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HDC, HMONITOR, RGBQUAD, SRCCOPY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
        SM_YVIRTUALSCREEN,
    };

    unsafe extern "system" fn collect_monitor(
        _monitor: HMONITOR,
        _hdc: HDC,
        rect: *mut RECT,
        data: LPARAM,
    ) -> BOOL {
        let monitors = &mut *(data.0 as *mut Vec<ScreenRect>);
        let r = *rect;
        monitors.push(ScreenRect::from_edges(r.left, r.top, r.right, r.bottom));
        BOOL(1)
    }

    pub fn monitors() -> Result<Vec<ScreenRect>, CaptureError> {
        let desktop = unsafe {
            ScreenRect {
                x: GetSystemMetrics(SM_XVIRTUALSCREEN),
                y: GetSystemMetrics(SM_YVIRTUALSCREEN),
                width: GetSystemMetrics(SM_CXVIRTUALSCREEN).max(0) as u32,
                height: GetSystemMetrics(SM_CYVIRTUALSCREEN).max(0) as u32,
            }
        };

        let mut monitors = vec![desktop];
        let ok = unsafe {
            EnumDisplayMonitors(
                HDC(0),
                None,
                Some(collect_monitor),
                LPARAM(&mut monitors as *mut Vec<ScreenRect> as isize),
            )
        };
        if !ok.as_bool() {
            return Err(CaptureError::Gdi {
                call: "EnumDisplayMonitors",
                detail: format!("{:?}", unsafe { GetLastError() }),
            });
        }

        Ok(monitors)
    }

    fn gdi_error(call: &'static str) -> CaptureError {
        CaptureError::Gdi {
            call,
            detail: format!("{:?}", unsafe { GetLastError() }),
        }
    }

    pub fn grab(rect: ScreenRect) -> Result<RgbImage, CaptureError> {
        unsafe {
            // NULL = desktop window
            let hwnd = HWND(0);
            let hdc_screen = GetDC(hwnd);
            if hdc_screen.0 == 0 {
                return Err(gdi_error("GetDC"));
            }

            let hdc_mem = CreateCompatibleDC(hdc_screen);
            if hdc_mem.0 == 0 {
                ReleaseDC(hwnd, hdc_screen);
                return Err(gdi_error("CreateCompatibleDC"));
            }

            let hbitmap =
                CreateCompatibleBitmap(hdc_screen, rect.width as i32, rect.height as i32);
            if hbitmap.0 == 0 {
                DeleteDC(hdc_mem);
                ReleaseDC(hwnd, hdc_screen);
                return Err(gdi_error("CreateCompatibleBitmap"));
            }

            let old_bitmap = SelectObject(hdc_mem, hbitmap);

            let result = BitBlt(
                hdc_mem,
                0,
                0,
                rect.width as i32,
                rect.height as i32,
                hdc_screen,
                rect.x,
                rect.y,
                SRCCOPY,
            )
            .map_err(|e| CaptureError::Gdi {
                call: "BitBlt",
                detail: e.to_string(),
            })
            .and_then(|()| {
                let mut bmi = BITMAPINFO {
                    bmiHeader: BITMAPINFOHEADER {
                        biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                        biWidth: rect.width as i32,
                        // Negative for top-down
                        biHeight: -(rect.height as i32),
                        biPlanes: 1,
                        biBitCount: 24,
                        biCompression: BI_RGB.0,
                        biSizeImage: 0,
                        biXPelsPerMeter: 0,
                        biYPelsPerMeter: 0,
                        biClrUsed: 0,
                        biClrImportant: 0,
                    },
                    bmiColors: [RGBQUAD::default(); 1],
                };

                let stride = (rect.width as usize * 3 + 3) & !3;
                let mut buffer = vec![0u8; stride * rect.height as usize];

                let lines = GetDIBits(
                    hdc_mem,
                    hbitmap,
                    0,
                    rect.height,
                    Some(buffer.as_mut_ptr() as *mut std::ffi::c_void),
                    &mut bmi,
                    DIB_RGB_COLORS,
                );
                if lines != rect.height as i32 {
                    return Err(gdi_error("GetDIBits"));
                }

                bgr_rows_to_rgb(&buffer, rect.width, rect.height).ok_or(CaptureError::Gdi {
                    call: "GetDIBits",
                    detail: "short pixel buffer".into(),
                })
            });

            SelectObject(hdc_mem, old_bitmap);
            DeleteObject(hbitmap);
            DeleteDC(hdc_mem);
            ReleaseDC(hwnd, hdc_screen);

            result
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use super::{CaptureError, ScreenRect};
    use image::RgbImage;

    pub fn monitors() -> Result<Vec<ScreenRect>, CaptureError> {
        Err(CaptureError::Unsupported)
    }

    pub fn grab(_rect: ScreenRect) -> Result<RgbImage, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop() -> Vec<ScreenRect> {
        vec![
            ScreenRect::from_edges(-1920, 0, 1920, 1080),
            ScreenRect::from_edges(0, 0, 1920, 1080),
            ScreenRect::from_edges(-1920, 0, 0, 1080),
        ]
    }

    #[test]
    fn default_region_on_second_monitor() {
        let rect = CaptureRegion::default().resolve(&desktop()).unwrap();
        assert_eq!(
            rect,
            ScreenRect {
                x: -1920 + 900,
                y: 500,
                width: 100,
                height: 500,
            }
        );
    }

    #[test]
    fn monitor_zero_is_whole_desktop() {
        let region = CaptureRegion {
            monitor: 0,
            top: 10,
            left: 3000,
            width: 200,
            height: 100,
        };
        let rect = region.resolve(&desktop()).unwrap();
        assert_eq!((rect.x, rect.y), (-1920 + 3000, 10));
    }

    #[test]
    fn missing_monitor_is_rejected() {
        let region = CaptureRegion {
            monitor: 3,
            ..CaptureRegion::default()
        };
        match region.resolve(&desktop()) {
            Err(CaptureError::NoSuchMonitor { index, available }) => {
                assert_eq!(index, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_and_oversized_regions_are_rejected() {
        let empty = CaptureRegion {
            width: 0,
            ..CaptureRegion::default()
        };
        assert!(matches!(empty.resolve(&desktop()), Err(CaptureError::EmptyRegion)));

        let tall = CaptureRegion {
            monitor: 1,
            top: 600,
            height: 500,
            ..CaptureRegion::default()
        };
        assert!(matches!(
            tall.resolve(&desktop()),
            Err(CaptureError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn bgr_rows_respect_dword_padding() {
        // 1x2 image: each 3-byte row is padded to 4 bytes
        let buffer = [1, 2, 3, 0, 4, 5, 6, 0];
        let image = bgr_rows_to_rgb(&buffer, 1, 2).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [3, 2, 1]);
        assert_eq!(image.get_pixel(0, 1).0, [6, 5, 4]);

        assert!(bgr_rows_to_rgb(&buffer[..6], 1, 2).is_none());
    }

    #[cfg(not(windows))]
    #[test]
    fn capture_is_unsupported_off_windows() {
        assert!(matches!(
            Capture::new(CaptureRegion::default()),
            Err(CaptureError::Unsupported)
        ));
    }
}
