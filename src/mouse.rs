// src/mouse.rs - synthetic clicks
use log::info;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("SendInput injected {sent} of {expected} events")]
    Partial { sent: u32, expected: u32 },
    #[error("input injection is not supported on this platform")]
    Unsupported,
}

/// Anything that can click on behalf of the player.
pub trait InputSink: Send + Sync {
    fn click(&self) -> Result<(), InputError>;
}

/// Clicks through the OS input queue at the current cursor position.
pub struct Mouse {
    button: MouseButton,
}

impl Mouse {
    pub fn new(button: MouseButton) -> Result<Self, InputError> {
        if !cfg!(windows) {
            return Err(InputError::Unsupported);
        }

        info!("Mouse ready ({:?} button)", button);
        Ok(Self { button })
    }

    pub fn button(&self) -> MouseButton {
        self.button
    }
}

#[cfg(windows)]
impl InputSink for Mouse {
    fn click(&self) -> Result<(), InputError> {
        use windows::Win32::UI::Input::KeyboardAndMouse::{
            SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
            MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEINPUT,
        };

        let (down, up) = match self.button {
            MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP),
            MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP),
        };

        let event = |flags| INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dwFlags: flags,
                    ..Default::default()
                },
            },
        };
        let inputs = [event(down), event(up)];

        let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(InputError::Partial {
                sent,
                expected: inputs.len() as u32,
            });
        }

        Ok(())
    }
}

#[cfg(not(windows))]
impl InputSink for Mouse {
    fn click(&self) -> Result<(), InputError> {
        Err(InputError::Unsupported)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Counts clicks instead of sending them.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub clicks: Arc<Mutex<u32>>,
    }

    impl RecordingSink {
        pub fn count(&self) -> u32 {
            *self.clicks.lock()
        }
    }

    impl InputSink for RecordingSink {
        fn click(&self) -> Result<(), InputError> {
            *self.clicks.lock() += 1;
            Ok(())
        }
    }

    #[test]
    fn recording_sink_counts() {
        let sink = RecordingSink::default();
        let shared: Arc<dyn InputSink> = Arc::new(sink.clone());
        shared.click().unwrap();
        shared.click().unwrap();
        assert_eq!(sink.count(), 2);
    }

    #[cfg(not(windows))]
    #[test]
    fn mouse_is_unsupported_off_windows() {
        assert!(matches!(
            Mouse::new(MouseButton::Right),
            Err(InputError::Unsupported)
        ));
    }

    #[test]
    fn partial_injection_message() {
        let err = InputError::Partial { sent: 1, expected: 2 };
        assert_eq!(err.to_string(), "SendInput injected 1 of 2 events");
    }
}
