// config.rs

use crate::cli::Args;
use ::config::{Config, ConfigError, Environment, File};
use log::{debug, info, LevelFilter};

pub const PULSES_PER_QUARTER: u64 = 24;
pub const ROWS_PER_BEAT: u32 = 4;
pub const MAX_TRACKER_CHANNELS: usize = 64;
pub const MIDI_CHANNELS: usize = 16;

pub const DEFAULT_CONFIG_FILE: &str = "rowsyncrs";
pub const ENV_PREFIX: &str = "ROWSYNC";

pub struct Settings {
    pub device_id: u8,
    pub midi_output: Option<String>,
    pub midi_input: Option<String>,
    pub send_clock: bool,
    pub tempo: f64,
    pub channels: usize,
    pub log_level: LevelFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            device_id: 0,
            midi_output: None,
            midi_input: None,
            send_clock: true,
            tempo: 125.0,
            channels: 8,
            log_level: LevelFilter::Debug,
        }
    }
}

impl Settings {
    /// Defaults, then the optional config file, then `ROWSYNC_*` variables.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let file = path.unwrap_or(DEFAULT_CONFIG_FILE);
        debug!("Loading settings from '{}' and {}_*", file, ENV_PREFIX);

        let cfg = Config::builder()
            .set_default("device_id", i64::from(defaults.device_id))?
            .set_default("send_clock", defaults.send_clock)?
            .set_default("tempo", defaults.tempo)?
            .set_default("channels", defaults.channels as i64)?
            .set_default("log_level", "debug")?
            .add_source(File::with_name(file).required(path.is_some()))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Self::from_config(&cfg)
    }

    fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let device_id = cfg.get_int("device_id")?;
        if !(0..=127).contains(&device_id) {
            return Err(ConfigError::Message(format!(
                "device_id must be 0-127, got {}",
                device_id
            )));
        }

        let channels = cfg.get_int("channels")?;
        if !(1..=MAX_TRACKER_CHANNELS as i64).contains(&channels) {
            return Err(ConfigError::Message(format!(
                "channels must be 1-{}, got {}",
                MAX_TRACKER_CHANNELS, channels
            )));
        }

        let log_level = parse_level(&cfg.get_string("log_level")?);

        Ok(Settings {
            device_id: device_id as u8,
            midi_output: cfg.get_string("midi_output").ok(),
            midi_input: cfg.get_string("midi_input").ok(),
            send_clock: cfg.get_bool("send_clock")?,
            tempo: cfg.get_float("tempo")?,
            channels: channels as usize,
            log_level,
        })
    }

    /// Command-line flags win over file and environment.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(id) = args.device_id {
            self.device_id = id;
        }
        if let Some(output) = &args.output {
            self.midi_output = Some(output.clone());
        }
        if let Some(input) = &args.input {
            self.midi_input = Some(input.clone());
        }
        if let Some(tempo) = args.tempo {
            self.tempo = tempo;
        }
        if args.no_clock {
            info!("MIDI clock output disabled from the command line");
            self.send_clock = false;
        }
    }
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Debug,
    }
}
