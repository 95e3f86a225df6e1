use crate::midi::{MidiEngine, MidiError, MidiMessage, Result};
use crossbeam::channel::{unbounded, Receiver};
use log::{debug, info};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "rowsyncrs";

pub struct MidirEngine {
    #[allow(dead_code)]
    input: Option<MidiInputConnection<()>>,
    output: Option<MidiOutputConnection>,
    rx: Option<Receiver<Vec<u8>>>,
}

impl MidirEngine {
    /// Connects to the first output and input ports whose names contain the
    /// given substrings. Either side may be omitted.
    pub fn new(output_name: Option<&str>, input_name: Option<&str>) -> Result<Self> {
        let (input, rx) = match input_name {
            Some(name) => {
                let mut midi_in = MidiInput::new(&format!("{}-in", CLIENT_NAME))?;
                // SysEx is filtered by default; the control protocols need it.
                midi_in.ignore(Ignore::None);

                let in_ports = midi_in.ports();
                let in_port = in_ports
                    .iter()
                    .find(|p| midi_in.port_name(p).unwrap_or_default().contains(name))
                    .ok_or_else(|| {
                        MidiError::ConnectionError(format!("input device '{}' not found", name))
                    })?;
                let port_name = midi_in.port_name(in_port)?;

                let (tx, rx) = unbounded();
                let input = midi_in.connect(
                    in_port,
                    &format!("{}-input", CLIENT_NAME),
                    move |stamp, message, _| {
                        debug!("MIDI in @{}: {:02X?}", stamp, message);
                        let _ = tx.send(message.to_vec());
                    },
                    (),
                )?;
                info!("Connected MIDI input: {}", port_name);
                (Some(input), Some(rx))
            }
            None => (None, None),
        };

        let output = match output_name {
            Some(name) => {
                let midi_out = MidiOutput::new(&format!("{}-out", CLIENT_NAME))?;
                let out_ports = midi_out.ports();
                let out_port = out_ports
                    .iter()
                    .find(|p| midi_out.port_name(p).unwrap_or_default().contains(name))
                    .ok_or_else(|| {
                        MidiError::ConnectionError(format!("output device '{}' not found", name))
                    })?;
                let port_name = midi_out.port_name(out_port)?;
                let connection = midi_out.connect(out_port, &format!("{}-output", CLIENT_NAME))?;
                info!("Connected MIDI output: {}", port_name);
                Some(connection)
            }
            None => None,
        };

        Ok(MidirEngine { input, output, rx })
    }

    /// Receiver for raw input packets, for callers that want to select on it
    /// instead of blocking in `recv`.
    pub fn input_receiver(&self) -> Option<Receiver<Vec<u8>>> {
        self.rx.clone()
    }

    pub fn list_output_ports() -> Vec<String> {
        MidiOutput::new(&format!("{}-lister", CLIENT_NAME))
            .map(|midi_out| {
                midi_out
                    .ports()
                    .iter()
                    .filter_map(|p| midi_out.port_name(p).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn list_input_ports() -> Vec<String> {
        MidiInput::new(&format!("{}-lister", CLIENT_NAME))
            .map(|midi_in| {
                midi_in
                    .ports()
                    .iter()
                    .filter_map(|p| midi_in.port_name(p).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl MidiEngine for MidirEngine {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        let output = self.output.as_mut().ok_or(MidiError::DeviceUnavailable)?;
        msg.with_bytes(|bytes| output.send(bytes))?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        match &self.rx {
            Some(rx) => Ok(rx.recv()?),
            None => Err(MidiError::RecvError("No input connection".to_string())),
        }
    }

    fn list_devices(&self) -> Vec<String> {
        Self::list_output_ports()
    }
}
