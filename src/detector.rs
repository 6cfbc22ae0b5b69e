use image::GrayImage;
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::preprocess::pixel_sum;

/// Shared armed/cool-down flag.
///
/// `true` means detection is armed. A bite disarms it and a deferred re-arm
/// sets it back, so clones are handed to the timer that performs the re-arm.
#[derive(Debug, Clone)]
pub struct Holdoff {
    armed: Arc<Mutex<bool>>,
}

impl Holdoff {
    pub fn new() -> Self {
        Self {
            armed: Arc::new(Mutex::new(true)),
        }
    }

    pub fn is_armed(&self) -> bool {
        *self.armed.lock()
    }

    /// Returns `true` if this call changed the state.
    pub fn arm(&self) -> bool {
        let mut armed = self.armed.lock();
        let changed = !*armed;
        *armed = true;
        changed
    }

    /// Returns `true` if this call changed the state.
    pub fn disarm(&self) -> bool {
        let mut armed = self.armed.lock();
        let changed = *armed;
        *armed = false;
        changed
    }
}

impl Default for Holdoff {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Holdoff is active, the frame was not inspected.
    Suppressed,
    /// Something bright is still in the region.
    Clear(u64),
    /// The whole region went dark.
    Bite,
}

/// Zero-sum bite detector over thresholded frames.
pub struct BiteDetector {
    holdoff: Holdoff,
}

impl BiteDetector {
    pub fn new(holdoff: Holdoff) -> Self {
        Self { holdoff }
    }

    pub fn holdoff(&self) -> &Holdoff {
        &self.holdoff
    }

    pub fn observe(&self, frame: &GrayImage) -> Detection {
        if !self.holdoff.is_armed() {
            return Detection::Suppressed;
        }

        // When the bobber is underwater the scene should be all 0s
        let sum = pixel_sum(frame);
        if sum != 0 {
            return Detection::Clear(sum);
        }

        self.holdoff.disarm();
        debug!("Frame sum hit zero, holdoff engaged");
        Detection::Bite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn dark() -> GrayImage {
        GrayImage::new(4, 4)
    }

    fn with_speck() -> GrayImage {
        let mut frame = dark();
        frame.put_pixel(2, 1, Luma([255]));
        frame
    }

    #[test]
    fn holdoff_transitions_report_changes() {
        let holdoff = Holdoff::new();
        assert!(holdoff.is_armed());
        assert!(!holdoff.arm());
        assert!(holdoff.disarm());
        assert!(!holdoff.disarm());
        assert!(!holdoff.is_armed());
        assert!(holdoff.arm());
        assert!(holdoff.is_armed());
    }

    #[test]
    fn clones_share_state() {
        let holdoff = Holdoff::new();
        let timer_side = holdoff.clone();
        holdoff.disarm();
        assert!(!timer_side.is_armed());
        timer_side.arm();
        assert!(holdoff.is_armed());
    }

    #[test]
    fn nonzero_frame_never_bites() {
        let detector = BiteDetector::new(Holdoff::new());
        assert_eq!(detector.observe(&with_speck()), Detection::Clear(255));
        assert!(detector.holdoff().is_armed());

        detector.holdoff().disarm();
        assert_eq!(detector.observe(&with_speck()), Detection::Suppressed);
    }

    #[test]
    fn zero_frame_bites_once_and_disarms() {
        let detector = BiteDetector::new(Holdoff::new());
        assert_eq!(detector.observe(&dark()), Detection::Bite);
        assert!(!detector.holdoff().is_armed());

        // Inert until re-armed, even though the frame is still dark
        assert_eq!(detector.observe(&dark()), Detection::Suppressed);
        assert_eq!(detector.observe(&dark()), Detection::Suppressed);

        detector.holdoff().arm();
        assert_eq!(detector.observe(&dark()), Detection::Bite);
    }
}
