use crate::midi::{MidiEngine, MidiError, MidiMessage, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Records everything sent to it. Clones share the same log, so a test can
/// hand one clone to the code under test and inspect the other.
#[derive(Clone, Default)]
pub struct MockMidiEngine {
    sent: Arc<Mutex<Vec<MidiMessage>>>,
    incoming: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl MockMidiEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a raw packet to be returned by `recv`.
    pub fn push_incoming(&self, bytes: &[u8]) {
        if let Ok(mut queue) = self.incoming.lock() {
            queue.push_back(bytes.to_vec());
        }
    }

    pub fn sent(&self) -> Vec<MidiMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn take_sent(&self) -> Vec<MidiMessage> {
        self.sent
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }

    pub fn count(&self, wanted: &MidiMessage) -> usize {
        self.sent().iter().filter(|m| *m == wanted).count()
    }
}

impl MidiEngine for MockMidiEngine {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|e| MidiError::SendError(e.to_string()))?;
        sent.push(msg);
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        let mut queue = self
            .incoming
            .lock()
            .map_err(|e| MidiError::RecvError(e.to_string()))?;
        queue
            .pop_front()
            .ok_or_else(|| MidiError::RecvError("no pending input".to_string()))
    }

    fn list_devices(&self) -> Vec<String> {
        vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()]
    }
}
