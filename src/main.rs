use clap::Parser;
use crossbeam::channel::Receiver;
use dialoguer::Select;
use rowsyncrs::{
    cli::{validate_device, Args},
    config::Settings,
    handle_device_list, handle_input_device_list, logging,
    midi::DefaultMidiEngine,
    transport::{run_render_simulation, SharedPlayer, SimulatedPlayer},
    ui::StatusDisplay,
    ControlRouter, DeviceId, MidiSync, PlaybackControl, Scheduler, ThreadScheduler,
};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

fn main() {
    let args = parse_command_line_arguments();
    let mut settings = load_settings(&args);
    initialize_logging(&settings);

    let outputs = handle_device_list();
    let inputs = handle_input_device_list();

    if args.device_list {
        list_available_devices(&outputs, &inputs);
        return;
    }

    if args.select {
        settings.midi_output = select_port("MIDI output", &outputs).or(settings.midi_output);
        settings.midi_input = select_port("MIDI control input", &inputs).or(settings.midi_input);
    }

    if let Some(name) = &settings.midi_output {
        exit_on_error(validate_device(name, &outputs));
    }
    if let Some(name) = &settings.midi_input {
        exit_on_error(validate_device(name, &inputs));
    }

    let scheduler = ThreadScheduler::new();
    let device_id = DeviceId::new(settings.device_id).unwrap_or_default();
    let mut sync = match MidiSync::new(device_id, settings.channels) {
        Ok(sync) => sync,
        Err(e) => fail(&format!("Invalid channel configuration: {}", e)),
    };

    let input_rx = initialize_midi_engine(&settings, &sync);

    if settings.send_clock {
        sync.start_clock();
    } else {
        log::info!("MIDI clock disabled");
    }

    let player = SimulatedPlayer::shared(settings.channels, settings.tempo);
    sync.publish(settings.tempo, false, 0);
    let transport = sync.transport();

    if let Some(rx) = input_rx {
        let router = sync.router().clone();
        let input_player = player.clone();
        exit_on_error(
            scheduler
                .spawn("midi-input", move || run_control_input(rx, router, input_player))
                .map_err(|e| e.to_string()),
        );
    } else {
        // Nothing can send Play without an input port
        if let Ok(mut player) = player.lock() {
            player.play();
        }
    }

    let shutdown = exit_on_error(register_shutdown_signals());
    let render_player = player.clone();
    let render_shutdown = shutdown.clone();
    let render = exit_on_error(
        scheduler
            .spawn("render", move || {
                run_render_simulation(sync, render_player, render_shutdown)
            })
            .map_err(|e| e.to_string()),
    );

    run_application_loop(StatusDisplay::new(transport, player), &shutdown);

    // Covers the display exiting on its own as well as a signal
    shutdown.store(true, Ordering::SeqCst);
    if render.join().is_err() {
        log::error!("Render thread panicked");
    }
    log::info!("Shutdown complete");
}

/// SIGINT and SIGTERM set the returned flag instead of killing the process,
/// so the render thread can stop the clock and release notes.
fn register_shutdown_signals() -> Result<Arc<AtomicBool>, String> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        flag::register(signal, Arc::clone(&shutdown))
            .map_err(|e| format!("Failed to register signal handler: {}", e))?;
    }
    Ok(shutdown)
}

fn parse_command_line_arguments() -> Args {
    Args::parse()
}

fn load_settings(args: &Args) -> Settings {
    let mut settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };
    settings.apply_args(args);
    settings
}

fn initialize_logging(settings: &Settings) {
    if let Err(e) = logging::init_logger(settings.log_level) {
        eprintln!("Logger initialization failed: {}", e);
    }
    log::info!("Application starting");
}

fn list_available_devices(outputs: &[String], inputs: &[String]) {
    println!("Available MIDI output devices:");
    for device in outputs {
        println!("  - {}", device);
    }
    println!("Available MIDI input devices:");
    for device in inputs {
        println!("  - {}", device);
    }
}

fn select_port(prompt: &str, ports: &[String]) -> Option<String> {
    if ports.is_empty() {
        println!("No {} ports available", prompt);
        return None;
    }
    match Select::new()
        .with_prompt(prompt)
        .items(ports)
        .default(0)
        .interact_opt()
    {
        Ok(choice) => choice.map(|index| ports[index].clone()),
        Err(e) => {
            log::warn!("Port selection failed: {}", e);
            None
        }
    }
}

/// Binds the configured ports. Returns the control input receiver when an
/// input port was opened.
fn initialize_midi_engine(settings: &Settings, sync: &MidiSync) -> Option<Receiver<Vec<u8>>> {
    if settings.midi_output.is_none() && settings.midi_input.is_none() {
        log::info!("No MIDI ports configured, running without a device");
        println!("No MIDI ports configured, running without a device");
        return None;
    }

    match DefaultMidiEngine::new(settings.midi_output.as_deref(), settings.midi_input.as_deref()) {
        Ok(engine) => {
            let rx = engine.input_receiver();
            sync.attach_output(engine);
            println!("Successfully connected to MIDI device");
            rx
        }
        Err(e) => fail(&format!("Error connecting to MIDI device: {}", e)),
    }
}

fn run_control_input(rx: Receiver<Vec<u8>>, router: ControlRouter, player: SharedPlayer) {
    log::info!(
        "Control input listening as device {}",
        router.device_id().get()
    );
    for packet in rx.iter() {
        match player.lock() {
            Ok(mut player) => {
                router.handle(&packet, &mut *player);
            }
            Err(_) => break,
        }
    }
    log::info!("Control input closed");
}

fn run_application_loop(display: StatusDisplay, shutdown: &AtomicBool) {
    log::info!("Application running. Press Ctrl+C to exit...");
    println!("\nPress Ctrl+C to exit...");
    display.run(shutdown);
}

fn exit_on_error<T>(result: Result<T, String>) -> T {
    match result {
        Ok(value) => value,
        Err(error_msg) => fail(&error_msg),
    }
}

fn fail(error_msg: &str) -> ! {
    log::error!("{}", error_msg);
    eprintln!("{}", error_msg);
    std::process::exit(1);
}
