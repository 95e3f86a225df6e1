use crate::midi::{MidiEngine, MidiError, MidiMessage, Result};
use log::{info, warn};
use std::sync::{Arc, Mutex};

/// Shared handle to the output device.
///
/// The device is swapped in and out only at subsystem start/stop. Every
/// transmit is fire-and-forget: with no device attached it does nothing,
/// and a failed write is logged and dropped.
#[derive(Clone, Default)]
pub struct MidiOut {
    device: Arc<Mutex<Option<Box<dyn MidiEngine>>>>,
}

impl MidiOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device<E: MidiEngine + 'static>(engine: E) -> Self {
        let out = Self::new();
        out.attach(engine);
        out
    }

    pub fn attach<E: MidiEngine + 'static>(&self, engine: E) {
        if let Ok(mut device) = self.device.lock() {
            *device = Some(Box::new(engine));
            info!("MIDI output attached");
        }
    }

    pub fn detach(&self) {
        if let Ok(mut device) = self.device.lock() {
            if device.take().is_some() {
                info!("MIDI output detached");
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.device
            .lock()
            .map(|device| device.is_some())
            .unwrap_or(false)
    }

    /// Sends and swallows any failure.
    pub fn transmit(&self, msg: MidiMessage) {
        match self.try_send(msg) {
            Ok(()) | Err(MidiError::DeviceUnavailable) => {}
            Err(e) => warn!("{}", e),
        }
    }

    fn try_send(&self, msg: MidiMessage) -> Result<()> {
        let mut device = self
            .device
            .lock()
            .map_err(|_| MidiError::DeviceUnavailable)?;
        match device.as_mut() {
            Some(engine) => engine.send(msg),
            None => Err(MidiError::DeviceUnavailable),
        }
    }
}

impl MidiEngine for MidiOut {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        self.try_send(msg)
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        Err(MidiError::RecvError("output handle has no input".to_string()))
    }

    fn list_devices(&self) -> Vec<String> {
        self.device
            .lock()
            .ok()
            .and_then(|device| device.as_ref().map(|engine| engine.list_devices()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MockMidiEngine;

    #[test]
    fn test_transmit_without_device_is_a_no_op() {
        let out = MidiOut::new();
        out.transmit(MidiMessage::Clock);
        assert!(!out.is_attached());
    }

    #[test]
    fn test_detach_stops_delivery() {
        let mock = MockMidiEngine::new();
        let out = MidiOut::with_device(mock.clone());
        out.transmit(MidiMessage::Start);
        out.detach();
        out.transmit(MidiMessage::Stop);
        assert_eq!(mock.sent(), vec![MidiMessage::Start]);
    }
}
