use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// List available MIDI devices
    #[arg(long)]
    pub device_list: bool,

    /// MIDI output port (substring match)
    #[arg(long)]
    pub output: Option<String>,

    /// MIDI input port for SysEx/MMC control (substring match)
    #[arg(long)]
    pub input: Option<String>,

    /// Pick ports interactively
    #[arg(long)]
    pub select: bool,

    /// Local protocol device id (0-127)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=127))]
    pub device_id: Option<u8>,

    /// Starting tempo in BPM
    #[arg(long)]
    pub tempo: Option<f64>,

    /// Do not emit MIDI clock
    #[arg(long)]
    pub no_clock: bool,

    /// Settings file
    #[arg(long)]
    pub config: Option<String>,
}

pub fn validate_device(device_name: &str, devices: &[String]) -> Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}
